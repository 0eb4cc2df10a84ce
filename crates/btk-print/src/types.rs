// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Status of a print job, in the order a job normally moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrintStatus {
    Initial,
    Preparing,
    GeneratingData,
    SendingData,
    /// Queued by the destination
    Pending,
    /// Queued, but the destination reported a problem (out of paper, ...)
    PendingIssue,
    Printing,
    Finished,
    FinishedAborted,
}

impl PrintStatus {
    /// Finished and FinishedAborted are reached at most once per job
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::FinishedAborted)
    }
}

impl fmt::Display for PrintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initial => "initial",
            Self::Preparing => "preparing",
            Self::GeneratingData => "generating data",
            Self::SendingData => "sending data",
            Self::Pending => "pending",
            Self::PendingIssue => "pending issue",
            Self::Printing => "printing",
            Self::Finished => "finished",
            Self::FinishedAborted => "finished (aborted)",
        };
        f.write_str(label)
    }
}

/// Availability of a print backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    #[default]
    Unknown,
    Ok,
    Unavailable,
}

/// Print subsystem configuration (persisted by [`crate::ConfigStore`])
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintConfig {
    /// Backends to load, by name ("file", "lpr", "test")
    #[serde(default = "default_backends")]
    pub backends: Vec<String>,
    /// Directory for spool files. None means the OS temp directory.
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,
    /// Keep spool files on disk instead of unlinking them right after creation
    #[serde(default)]
    pub keep_spool_files: bool,
    /// Command used by the lpr backend when the settings don't name one
    #[serde(default = "default_lpr_command")]
    pub lpr_command: String,
    /// Number of fake printers synthesized by the test backend
    #[serde(default = "default_test_printer_count")]
    pub test_printer_count: usize,
    /// Chance (in percent) that the test backend acquires printer details
    #[serde(default = "default_test_details_success_weight")]
    pub test_details_success_weight: u32,
}

fn default_backends() -> Vec<String> {
    vec!["file".to_string(), "lpr".to_string()]
}

fn default_lpr_command() -> String {
    "lpr".to_string()
}

fn default_test_printer_count() -> usize {
    100
}

fn default_test_details_success_weight() -> u32 {
    75
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            spool_dir: None,
            keep_spool_files: false,
            lpr_command: default_lpr_command(),
            test_printer_count: default_test_printer_count(),
            test_details_success_weight: default_test_details_success_weight(),
        }
    }
}

impl PrintConfig {
    /// Spool file options for jobs created under this configuration
    pub fn spool_options(&self) -> crate::spool::SpoolOptions {
        crate::spool::SpoolOptions {
            dir: self.spool_dir.clone(),
            keep_files: self.keep_spool_files,
        }
    }
}

/// Error types for the print subsystem
#[derive(Debug, Clone, thiserror::Error)]
pub enum PrintError {
    #[error("File I/O error: {0}")]
    FileIo(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Spool channel conflict: {0}")]
    SpoolConflict(String),

    #[error("No spool data: call set_source_file or surface before sending")]
    NoSpoolData,

    #[error("Print job was already sent")]
    AlreadySent,

    #[error("Printer not known to its backend: {0}")]
    UnknownPrinter(String),

    #[error("Print backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Unknown print backend: {0}")]
    UnknownBackend(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PrintError {
    /// True when the error only reports a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::io::Error> for PrintError {
    fn from(err: std::io::Error) -> Self {
        PrintError::FileIo(err.to_string())
    }
}

impl From<serde_json::Error> for PrintError {
    fn from(err: serde_json::Error) -> Self {
        PrintError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PrintConfig::default();
        assert_eq!(config.backends, vec!["file", "lpr"]);
        assert_eq!(config.lpr_command, "lpr");
        assert!(!config.keep_spool_files);
        assert_eq!(config.test_details_success_weight, 75);
    }

    #[test]
    fn test_config_fills_missing_fields() {
        let config: PrintConfig = serde_json::from_str(r#"{"backends":["test"]}"#).unwrap();
        assert_eq!(config.backends, vec!["test"]);
        assert_eq!(config.test_printer_count, 100);
        assert_eq!(config.spool_dir, None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(PrintStatus::Finished.is_terminal());
        assert!(PrintStatus::FinishedAborted.is_terminal());
        assert!(!PrintStatus::SendingData.is_terminal());
        assert!(!PrintStatus::Initial.is_terminal());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: PrintError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, PrintError::FileIo(ref msg) if msg.contains("gone")));
        assert!(!err.is_cancelled());
        assert!(PrintError::Cancelled.is_cancelled());
    }
}
