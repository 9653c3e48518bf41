// Rooted Android device reached through adb

use log::debug;
use tokio::process::Command;

use crate::error::{Result, StoreError};

pub mod config_store;
pub mod wifi;

pub use wifi::AdbBackend;

/// Where the WiFi service keeps saved networks on Android 8+.
pub const CONFIG_STORE_PATH: &str = "/data/misc/wifi/WifiConfigStore.xml";

/// Quote one argument for the device's `sh`.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Build a remote command line from separate arguments.
pub fn shell_line<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|a| shell_quote(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
pub struct AdbClient {
    binary: String,
    serial: Option<String>,
}

impl AdbClient {
    pub fn new(binary: impl Into<String>, serial: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            serial,
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Run `command_line` through `adb shell` and return its stdout.
    pub async fn shell(&self, command_line: &str) -> Result<String> {
        self.shell_described(command_line, command_line).await
    }

    /// Like [`AdbClient::shell`], but logs and reports `described` in place
    /// of the real command line, which may carry a secret.
    pub async fn shell_described(&self, command_line: &str, described: &str) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.arg("shell").arg(command_line);

        let described = format!("{} shell {described}", self.binary);
        debug!("Running `{described}`");

        let output = cmd.output().await.map_err(|source| StoreError::Io {
            path: self.binary.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StoreError::Command {
                command: described,
                code: output.status.code().unwrap_or(-1),
                output: format!("{stdout}{stderr}").trim().to_string(),
            });
        }
        Ok(stdout)
    }

    /// Run `command_line` as root through `su -c`.
    pub async fn root_shell(&self, command_line: &str) -> Result<String> {
        self.shell(&shell_line(&["su", "-c", command_line])).await
    }
}
