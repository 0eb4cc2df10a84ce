// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Print to file backend
//
// One virtual printer that renders to PDF or PostScript and writes the
// document to a local file.

use super::{create_file_surface, output_path, requested_format, PrintBackend, PrintBackendBase};
use crate::job::PrintJob;
use crate::options::{
    OptionType, PrinterOption, PrinterOptionSet, GROUP_DIALOG_EXTENSION,
    OPTION_MAIN_PAGE_CUSTOM_INPUT, OPTION_N_UP, OPTION_N_UP_LAYOUT, OPTION_OUTPUT_FILE_FORMAT,
};
use crate::page_setup::{PageSetup, PaperSize};
use crate::print_settings::{self, OutputFormat, PrintSettings};
use crate::printer::{PrintCapabilities, Printer};
use crate::spool::{self, FileReplaceSink, SpoolChannel, SpoolSink};
use crate::surface::Surface;
use crate::types::PrintError;
use async_trait::async_trait;
use std::sync::{Arc, Weak};

pub const FILE_PRINTER_NAME: &str = "Print to File";

const N_UP_CHOICES: [&str; 6] = ["1", "2", "4", "6", "9", "16"];

pub struct FileBackend {
    base: PrintBackendBase,
}

impl FileBackend {
    /// Create the backend with its single printer already listed
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<FileBackend>| {
            let backend = FileBackend {
                base: PrintBackendBase::new("file"),
            };

            let owner: Weak<dyn PrintBackend> = weak.clone();
            let printer = Printer::new(FILE_PRINTER_NAME, owner, true);
            printer.set_accepts_pdf(true);
            printer.set_has_details(true);
            printer.set_icon_name("btk-save");
            printer.set_is_active(true);

            backend.base.add_printer(Arc::new(printer));
            backend.base.set_list_done();
            backend
        })
    }

    /// Follow a change of the output format option: fix up the file name
    /// extension and the printer's accepted formats. Returns true when the
    /// file name changed.
    pub fn apply_output_format(&self, printer: &Printer, options: &mut PrinterOptionSet) -> bool {
        let Some(format) = options
            .value(OPTION_OUTPUT_FILE_FORMAT)
            .and_then(OutputFormat::from_nick)
        else {
            return false;
        };

        printer.set_accepts_pdf(format == OutputFormat::Pdf);
        printer.set_accepts_ps(format == OutputFormat::Ps);

        let Some(uri_option) = options.lookup_mut(OPTION_MAIN_PAGE_CUSTOM_INPUT) else {
            return false;
        };
        if uri_option.value.is_empty() {
            return false;
        }

        let uri = uri_option.value.clone();
        let base = match uri.rfind('.') {
            Some(dot) => match OutputFormat::from_nick(&uri[dot + 1..]) {
                // Known extension that doesn't match: strip it
                Some(ext) if ext != format => &uri[..dot],
                Some(_) => return false,
                // Unknown extension, keep it and append
                None => return false,
            },
            None => uri.as_str(),
        };

        let renamed = format!("{}.{}", base, format.nick());
        uri_option.set(&renamed)
    }
}

fn file_capabilities() -> PrintCapabilities {
    PrintCapabilities::PAGE_SET
        | PrintCapabilities::COPIES
        | PrintCapabilities::COLLATE
        | PrintCapabilities::REVERSE
        | PrintCapabilities::SCALE
        | PrintCapabilities::GENERATE_PDF
        | PrintCapabilities::GENERATE_PS
        | PrintCapabilities::PREVIEW
        | PrintCapabilities::NUMBER_UP
        | PrintCapabilities::NUMBER_UP_LAYOUT
}

#[async_trait]
impl PrintBackend for FileBackend {
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
        create_file_surface(requested_format(settings)?, settings, width, height, spool)
    }

    fn printer_get_options(
        &self,
        printer: &Printer,
        settings: &PrintSettings,
        _page_setup: &PageSetup,
        capabilities: PrintCapabilities,
    ) -> PrinterOptionSet {
        let mut set = PrinterOptionSet::new();

        let n_up = settings.get(print_settings::NUMBER_UP).unwrap_or("1");
        set.add(
            PrinterOption::new(OPTION_N_UP, "Pages per sheet:", OptionType::PickOne)
                .with_choices(&N_UP_CHOICES, &N_UP_CHOICES)
                .with_value(n_up),
        );

        let mut supported: Vec<OutputFormat> = OutputFormat::ALL
            .into_iter()
            .filter(|format| match format {
                OutputFormat::Pdf => capabilities.contains(PrintCapabilities::GENERATE_PDF),
                OutputFormat::Ps => capabilities.contains(PrintCapabilities::GENERATE_PS),
            })
            .collect();
        if supported.is_empty() {
            supported = OutputFormat::ALL.to_vec();
        }

        let wanted = settings.output_file_format().ok().flatten();
        let current = wanted
            .filter(|format| supported.contains(format))
            .unwrap_or(supported[0]);

        let uri = match settings.output_uri() {
            Some(uri) => uri.to_string(),
            None => std::env::current_dir()
                .map(|dir| spool::path_to_uri(&dir.join(format!("output.{}", current.nick()))))
                .unwrap_or_else(|_| format!("output.{}", current.nick())),
        };

        set.add(
            PrinterOption::new(OPTION_MAIN_PAGE_CUSTOM_INPUT, "File", OptionType::FileSave)
                .with_activates_default(true)
                .with_value(&uri)
                .with_group(GROUP_DIALOG_EXTENSION),
        );

        if supported.len() > 1 {
            let values: Vec<&str> = supported.iter().map(|f| f.nick()).collect();
            let displays: Vec<&str> = supported.iter().map(|f| f.display_name()).collect();
            set.add(
                PrinterOption::new(
                    OPTION_OUTPUT_FILE_FORMAT,
                    "Output format",
                    OptionType::Alternative,
                )
                .with_group(GROUP_DIALOG_EXTENSION)
                .with_choices(&values, &displays)
                .with_value(current.nick()),
            );
            printer.set_accepts_pdf(current == OutputFormat::Pdf);
            printer.set_accepts_ps(current == OutputFormat::Ps);
        }

        set
    }

    fn printer_get_settings_from_options(
        &self,
        _printer: &Printer,
        options: &PrinterOptionSet,
        settings: &mut PrintSettings,
    ) {
        if let Some(uri) = options.value(OPTION_MAIN_PAGE_CUSTOM_INPUT) {
            settings.set(print_settings::OUTPUT_URI, uri);
        }
        if let Some(format) = options.value(OPTION_OUTPUT_FILE_FORMAT) {
            settings.set(print_settings::OUTPUT_FILE_FORMAT, format);
        }
        if let Some(n_up) = options.value(OPTION_N_UP) {
            settings.set(print_settings::NUMBER_UP, n_up);
        }
        if let Some(layout) = options.value(OPTION_N_UP_LAYOUT) {
            settings.set(print_settings::NUMBER_UP_LAYOUT, layout);
        }
    }

    fn printer_list_papers(&self, _printer: &Printer) -> Vec<PageSetup> {
        PaperSize::standard_sizes()
            .into_iter()
            .map(PageSetup::new)
            .collect()
    }

    fn printer_get_capabilities(&self, _printer: &Printer) -> PrintCapabilities {
        file_capabilities()
    }

    async fn open_sink(&self, job: &PrintJob) -> Result<Box<dyn SpoolSink>, PrintError> {
        let destination = output_path(job.settings(), "output")?;
        tracing::debug!("File backend: writing '{}' to {}", job.title(), destination.display());
        Ok(Box::new(FileReplaceSink::create(&destination)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_printer(backend: &FileBackend) -> Arc<Printer> {
        backend.find_printer(FILE_PRINTER_NAME).unwrap()
    }

    #[test]
    fn single_virtual_printer_listed_at_construction() {
        let backend = FileBackend::new();
        assert!(backend.base().is_list_done());

        let printers = backend.printers();
        assert_eq!(printers.len(), 1);
        let printer = &printers[0];
        assert!(printer.is_virtual());
        assert!(printer.has_details());
        assert!(printer.accepts_pdf());
        assert_eq!(printer.icon_name(), "btk-save");
        assert!(printer.hard_margins().is_none());
        assert_eq!(printer.list_papers().len(), PaperSize::standard_sizes().len());
        assert!(printer.default_page_size().is_none());
    }

    #[test]
    fn options_offer_format_when_both_are_possible() {
        let backend = FileBackend::new();
        let printer = file_printer(&backend);
        let mut settings = PrintSettings::new();
        settings.set(print_settings::OUTPUT_FILE_FORMAT, "ps");
        settings.set(print_settings::NUMBER_UP, "4");

        let options = backend.printer_get_options(
            &printer,
            &settings,
            &PageSetup::default(),
            file_capabilities(),
        );

        assert_eq!(options.value(OPTION_N_UP), Some("4"));
        assert_eq!(options.value(OPTION_OUTPUT_FILE_FORMAT), Some("ps"));
        assert!(options
            .value(OPTION_MAIN_PAGE_CUSTOM_INPUT)
            .unwrap()
            .ends_with("/output.ps"));
        assert!(printer.accepts_ps());
        assert!(!printer.accepts_pdf());

        let pdf_only = backend.printer_get_options(
            &printer,
            &PrintSettings::new(),
            &PageSetup::default(),
            PrintCapabilities::GENERATE_PDF,
        );
        assert!(pdf_only.lookup(OPTION_OUTPUT_FILE_FORMAT).is_none());
    }

    #[test]
    fn changing_format_rewrites_extension() {
        let backend = FileBackend::new();
        let printer = file_printer(&backend);
        let mut settings = PrintSettings::new();
        settings.set(print_settings::OUTPUT_URI, "file:///tmp/report.pdf");

        let mut options = backend.printer_get_options(
            &printer,
            &settings,
            &PageSetup::default(),
            file_capabilities(),
        );
        options.lookup_mut(OPTION_OUTPUT_FILE_FORMAT).unwrap().set("ps");

        assert!(backend.apply_output_format(&printer, &mut options));
        assert_eq!(
            options.value(OPTION_MAIN_PAGE_CUSTOM_INPUT),
            Some("file:///tmp/report.ps")
        );
        assert!(printer.accepts_ps());
        assert!(!printer.accepts_pdf());

        let mut copy = PrintSettings::new();
        backend.printer_get_settings_from_options(&printer, &options, &mut copy);
        assert_eq!(copy.output_uri(), Some("file:///tmp/report.ps"));
        assert_eq!(copy.get(print_settings::OUTPUT_FILE_FORMAT), Some("ps"));
        assert_eq!(copy.get(print_settings::NUMBER_UP), Some("1"));
    }

    #[test]
    fn extension_appended_when_missing() {
        let backend = FileBackend::new();
        let printer = file_printer(&backend);
        let mut options = PrinterOptionSet::new();
        options.add(
            PrinterOption::new(OPTION_MAIN_PAGE_CUSTOM_INPUT, "File", OptionType::FileSave)
                .with_value("/tmp/noext"),
        );
        options.add(
            PrinterOption::new(OPTION_OUTPUT_FILE_FORMAT, "Output format", OptionType::Alternative)
                .with_value("pdf"),
        );

        assert!(backend.apply_output_format(&printer, &mut options));
        assert_eq!(options.value(OPTION_MAIN_PAGE_CUSTOM_INPUT), Some("/tmp/noext.pdf"));
    }

    #[test]
    fn surface_format_follows_settings() {
        let backend = FileBackend::new();
        let printer = file_printer(&backend);
        let spool = SpoolChannel::create_temporary(&Default::default()).unwrap();

        let mut settings = PrintSettings::new();
        let surface = backend
            .printer_create_surface(&printer, &settings, 612.0, 792.0, &spool)
            .unwrap();
        assert_eq!(surface.kind(), OutputFormat::Pdf);
        assert_eq!(surface.fallback_resolution(), 300.0);

        settings.set(print_settings::OUTPUT_FILE_FORMAT, "ps");
        let surface = backend
            .printer_create_surface(&printer, &settings, 612.0, 792.0, &spool)
            .unwrap();
        assert_eq!(surface.kind(), OutputFormat::Ps);
    }
}
