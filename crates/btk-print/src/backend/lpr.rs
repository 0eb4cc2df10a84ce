// SPDX-License-Identifier: AGPL-3.0
// BTK Print - lpr backend
//
// Pipes PostScript into an lpr style command. The command line comes from
// the job settings and falls back to the configured default.

use super::{create_file_surface, PrintBackend, PrintBackendBase};
use crate::job::PrintJob;
use crate::options::{
    OptionType, PrinterOption, PrinterOptionSet, GROUP_DIALOG_EXTENSION,
    OPTION_MAIN_PAGE_CUSTOM_INPUT, OPTION_N_UP, OPTION_N_UP_LAYOUT,
};
use crate::page_setup::PageSetup;
use crate::print_settings::{self, OutputFormat, PrintSettings};
use crate::printer::{PrintCapabilities, Printer};
use crate::spool::{SpoolChannel, SpoolSink};
use crate::surface::Surface;
use crate::types::PrintError;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Weak};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};

pub const LPR_PRINTER_NAME: &str = "Print to LPR";

const N_UP_CHOICES: [&str; 6] = ["1", "2", "4", "6", "9", "16"];

pub struct LprBackend {
    base: PrintBackendBase,
    default_command: String,
}

impl LprBackend {
    pub fn new(default_command: &str) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<LprBackend>| {
            let backend = LprBackend {
                base: PrintBackendBase::new("lpr"),
                default_command: default_command.to_string(),
            };

            let owner: Weak<dyn PrintBackend> = weak.clone();
            let printer = Printer::new(LPR_PRINTER_NAME, owner, true);
            printer.set_has_details(true);
            printer.set_icon_name("btk-print");
            printer.set_is_active(true);
            printer.set_is_default(true);

            backend.base.add_printer(Arc::new(printer));
            backend.base.set_list_done();
            backend
        })
    }

    /// Command line for a job with these settings
    pub fn command_line<'a>(&'a self, settings: &'a PrintSettings) -> &'a str {
        settings
            .get(print_settings::LPR_COMMANDLINE)
            .filter(|cmd| !cmd.trim().is_empty())
            .unwrap_or(self.default_command.as_str())
    }
}

/// Stdin of a running lpr process
struct LprSink {
    command: String,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl LprSink {
    fn spawn(command_line: &str) -> Result<Self, PrintError> {
        let mut argv = command_line.split_whitespace();
        let program = argv
            .next()
            .ok_or_else(|| PrintError::InvalidSetting("empty lpr command line".to_string()))?;

        let mut child = Command::new(program)
            .args(argv)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PrintError::Transport(format!("Failed to run '{}': {}", command_line, e))
            })?;

        let stdin = child.stdin.take();
        Ok(Self {
            command: command_line.to_string(),
            child,
            stdin,
        })
    }
}

#[async_trait]
impl SpoolSink for LprSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), PrintError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| PrintError::Transport(format!("'{}' has no stdin", self.command)))?;
        stdin
            .write_all(chunk)
            .await
            .map_err(|e| {
                PrintError::Transport(format!("Failed to write to '{}': {}", self.command, e))
            })
    }

    async fn finish(self: Box<Self>) -> Result<(), PrintError> {
        let mut this = self;
        if let Some(mut stdin) = this.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| {
                    PrintError::Transport(format!("Failed to close '{}': {}", this.command, e))
                })?;
        }

        let status = this
            .child
            .wait()
            .await
            .map_err(|e| {
                PrintError::Transport(format!("Failed to wait for '{}': {}", this.command, e))
            })?;

        if !status.success() {
            return Err(PrintError::Transport(format!(
                "'{}' exited with {}",
                this.command, status
            )));
        }
        Ok(())
    }

    async fn abort(self: Box<Self>) {
        let mut this = self;
        this.stdin.take();
        if let Err(e) = this.child.kill().await {
            tracing::warn!("Failed to stop '{}': {}", this.command, e);
        }
    }
}

#[async_trait]
impl PrintBackend for LprBackend {
    fn base(&self) -> &PrintBackendBase {
        &self.base
    }

    fn printer_create_surface(
        &self,
        _printer: &Printer,
        settings: &PrintSettings,
        width: f64,
        height: f64,
        spool: &SpoolChannel,
    ) -> Result<Surface, PrintError> {
        create_file_surface(OutputFormat::Ps, settings, width, height, spool)
    }

    fn printer_get_options(
        &self,
        _printer: &Printer,
        settings: &PrintSettings,
        _page_setup: &PageSetup,
        _capabilities: PrintCapabilities,
    ) -> PrinterOptionSet {
        let mut set = PrinterOptionSet::new();
        set.add(
            PrinterOption::new(OPTION_N_UP, "Pages Per Sheet", OptionType::PickOne)
                .with_choices(&N_UP_CHOICES, &N_UP_CHOICES)
                .with_value("1"),
        );
        set.add(
            PrinterOption::new(OPTION_MAIN_PAGE_CUSTOM_INPUT, "Command Line", OptionType::String)
                .with_activates_default(true)
                .with_group(GROUP_DIALOG_EXTENSION)
                .with_value(self.command_line(settings)),
        );
        set
    }

    fn printer_get_settings_from_options(
        &self,
        _printer: &Printer,
        options: &PrinterOptionSet,
        settings: &mut PrintSettings,
    ) {
        if let Some(command) = options.value(OPTION_MAIN_PAGE_CUSTOM_INPUT) {
            settings.set(print_settings::LPR_COMMANDLINE, command);
        }
        if let Some(n_up) = options.value(OPTION_N_UP) {
            settings.set(print_settings::NUMBER_UP, n_up);
        }
        if let Some(layout) = options.value(OPTION_N_UP_LAYOUT) {
            settings.set(print_settings::NUMBER_UP_LAYOUT, layout);
        }
    }

    async fn open_sink(&self, job: &PrintJob) -> Result<Box<dyn SpoolSink>, PrintError> {
        let command = self.command_line(job.settings());
        tracing::debug!("lpr backend: piping '{}' into {}", job.title(), command);
        Ok(Box::new(LprSink::spawn(command)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_printer_listed_at_construction() {
        let backend = LprBackend::new("lpr");
        assert!(backend.base().is_list_done());

        let printer = backend.find_printer(LPR_PRINTER_NAME).unwrap();
        assert!(printer.is_default());
        assert!(printer.is_virtual());
        assert_eq!(printer.icon_name(), "btk-print");
        assert!(printer.capabilities().is_empty());
    }

    #[test]
    fn command_line_option_round_trips() {
        let backend = LprBackend::new("lpr -P office");
        let printer = backend.find_printer(LPR_PRINTER_NAME).unwrap();

        let options = backend.printer_get_options(
            &printer,
            &PrintSettings::new(),
            &PageSetup::default(),
            PrintCapabilities::empty(),
        );
        assert_eq!(options.value(OPTION_MAIN_PAGE_CUSTOM_INPUT), Some("lpr -P office"));
        assert_eq!(options.value(OPTION_N_UP), Some("1"));

        let mut options = options;
        options.lookup_mut(OPTION_MAIN_PAGE_CUSTOM_INPUT).unwrap().set("lpr -P lab");
        let mut settings = PrintSettings::new();
        backend.printer_get_settings_from_options(&printer, &options, &mut settings);

        assert_eq!(settings.get(print_settings::LPR_COMMANDLINE), Some("lpr -P lab"));
        assert_eq!(backend.command_line(&settings), "lpr -P lab");
    }

    #[test]
    fn surfaces_are_postscript() {
        let backend = LprBackend::new("lpr");
        let printer = backend.find_printer(LPR_PRINTER_NAME).unwrap();
        let spool = SpoolChannel::create_temporary(&Default::default()).unwrap();
        let mut settings = PrintSettings::new();
        settings.set(print_settings::OUTPUT_FILE_FORMAT, "pdf");

        let surface = backend
            .printer_create_surface(&printer, &settings, 612.0, 792.0, &spool)
            .unwrap();
        assert_eq!(surface.kind(), OutputFormat::Ps);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sink_reports_failing_command() {
        let mut sink = Box::new(LprSink::spawn("false").unwrap());
        // The write may race with the process exiting; either way the
        // delivery as a whole must fail.
        let wrote = sink.write_chunk(b"%!PS").await;
        let finished = sink.finish().await;
        assert!(wrote.is_err() || matches!(finished, Err(PrintError::Transport(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sink_accepts_data_for_successful_command() {
        let mut sink = Box::new(LprSink::spawn("cat").unwrap());
        sink.write_chunk(b"%!PS-Adobe-3.0\n").await.unwrap();
        sink.finish().await.unwrap();
    }

    #[test]
    fn missing_command_is_reported() {
        assert!(matches!(LprSink::spawn("   "), Err(PrintError::InvalidSetting(_))));
    }
}
