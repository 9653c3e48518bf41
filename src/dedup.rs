// Duplicate detection within one source

use crate::record::NetworkRecord;

/// Indices of the records that duplicate an older record with the same SSID.
///
/// Every pair `(i, j)` with `i < j` is compared; the record with the earlier
/// `created_at` survives, and on equal timestamps the one loaded first does.
/// Returned indices are ascending and unique.
pub fn find_duplicates(records: &[NetworkRecord]) -> Vec<usize> {
    let mut doomed = vec![false; records.len()];

    for (i, first) in records.iter().enumerate() {
        for (offset, second) in records[i + 1..].iter().enumerate() {
            let j = i + 1 + offset;
            if !first.same_network(second) {
                continue;
            }
            if second.created_at() < first.created_at() {
                doomed[i] = true;
            } else {
                doomed[j] = true;
            }
        }
    }

    doomed
        .iter()
        .enumerate()
        .filter_map(|(idx, &d)| d.then_some(idx))
        .collect()
}
