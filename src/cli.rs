use clap::{Command, arg, crate_version, value_parser};
use std::path::PathBuf;

pub fn cli() -> Command {
    Command::new("wlsync")
        .about("Sync saved WiFi networks between NetworkManager, Android and a JSON file")
        .version(crate_version!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            arg!(--file <path>)
                .short('f')
                .required(false)
                .global(true)
                .help("Use this JSON store instead of the configured one")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(--transport <transport>)
                .short('t')
                .required(false)
                .global(true)
                .help("Live source to sync with")
                .value_parser(["nm", "adb"]),
        )
        .arg(
            arg!(--serial <serial>)
                .short('s')
                .required(false)
                .global(true)
                .help("adb device serial (implies --transport adb)"),
        )
        .arg(
            arg!(-v --verbose ...)
                .global(true)
                .help("More log output, repeat for debug"),
        )
        .subcommand(Command::new("import").about("Add networks from the JSON store to the live source"))
        .subcommand(Command::new("export").about("Add networks from the live source to the JSON store"))
        .subcommand(
            Command::new("update")
                .about("Export, then import, so both sides end up with the union"),
        )
        .subcommand(Command::new("show").about("Preview what import and export would change"))
        .subcommand(
            Command::new("dedup")
                .about("Remove duplicate SSIDs from one side, keeping the oldest")
                .arg(
                    arg!(<side>)
                        .help("Which side to clean up")
                        .value_parser(["file", "system"]),
                ),
        )
}
