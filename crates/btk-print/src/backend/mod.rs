// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Print backends
//
// A backend discovers printers for one transport and delivers finished jobs
// to it. Shared bookkeeping (printer table, list-done flag, status, event
// channel) lives in PrintBackendBase; transports implement PrintBackend.

pub mod file;
pub mod lpr;
pub mod test;

use crate::events::{EventReceiver, EventSubscribers};
use crate::job::{PrintJob, PrintParameters};
use crate::options::PrinterOptionSet;
use crate::page_setup::{Margins, PageSetup};
use crate::print_settings::{OutputFormat, PrintSettings};
use crate::printer::{PrintCapabilities, Printer};
use crate::spool::{self, SpoolChannel, SpoolSink};
use crate::surface::Surface;
use crate::types::{BackendStatus, PrintConfig, PrintError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

pub use file::FileBackend;
pub use lpr::LprBackend;
pub use test::{DetailsPolicy, TestBackend};

/// Events emitted by a backend
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// A printer was discovered during the initial listing
    PrinterAdded(Arc<Printer>),
    PrinterRemoved(Arc<Printer>),
    /// The initial listing is complete. Sent exactly once.
    PrinterListDone,
    /// The printer set changed after the initial listing
    PrinterListChanged,
    PrinterStatusChanged(Arc<Printer>),
    DetailsAcquired {
        printer: Arc<Printer>,
        success: bool,
    },
}

/// State shared by all backends
pub struct PrintBackendBase {
    name: String,
    printers: RwLock<HashMap<String, Arc<Printer>>>,
    list_requested: AtomicBool,
    list_done: AtomicBool,
    status: RwLock<BackendStatus>,
    subscribers: EventSubscribers<BackendEvent>,
}

impl PrintBackendBase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            printers: RwLock::new(HashMap::new()),
            list_requested: AtomicBool::new(false),
            list_done: AtomicBool::new(false),
            status: RwLock::new(BackendStatus::Unknown),
            subscribers: EventSubscribers::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receive printer discovery and status events
    pub fn subscribe(&self) -> EventReceiver<BackendEvent> {
        self.subscribers.subscribe()
    }

    fn emit(&self, event: BackendEvent) {
        self.subscribers.emit(event);
    }

    /// Register a printer. Replaces any printer with the same name.
    pub fn add_printer(&self, printer: Arc<Printer>) {
        let name = printer.name().to_string();
        self.printers
            .write()
            .unwrap()
            .insert(name.clone(), printer.clone());

        tracing::debug!("Backend {}: added printer {}", self.name, name);

        if self.is_list_done() {
            self.emit(BackendEvent::PrinterListChanged);
        } else {
            self.emit(BackendEvent::PrinterAdded(printer));
        }
    }

    pub fn remove_printer(&self, name: &str) -> Option<Arc<Printer>> {
        let removed = self.printers.write().unwrap().remove(name)?;
        tracing::debug!("Backend {}: removed printer {}", self.name, name);

        self.emit(BackendEvent::PrinterRemoved(removed.clone()));
        if self.is_list_done() {
            self.emit(BackendEvent::PrinterListChanged);
        }
        Some(removed)
    }

    pub fn find_printer(&self, name: &str) -> Option<Arc<Printer>> {
        self.printers.read().unwrap().get(name).cloned()
    }

    /// Active printers sorted by name. Safe to iterate while the backend
    /// keeps adding or removing printers.
    pub fn printers(&self) -> Vec<Arc<Printer>> {
        let mut printers: Vec<_> = self
            .printers
            .read()
            .unwrap()
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect();
        printers.sort_by(|a, b| a.compare(b));
        printers
    }

    /// True while `printer` is the record listed under its name
    pub fn owns_printer(&self, printer: &Arc<Printer>) -> bool {
        self.find_printer(printer.name())
            .is_some_and(|p| Arc::ptr_eq(&p, printer))
    }

    pub fn printer_count(&self) -> usize {
        self.printers.read().unwrap().len()
    }

    /// Mark the initial listing complete. Only the first call has an effect.
    pub fn set_list_done(&self) -> bool {
        if self.list_done.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::debug!("Backend {}: printer list done", self.name);
        self.emit(BackendEvent::PrinterListDone);
        true
    }

    pub fn is_list_done(&self) -> bool {
        self.list_done.load(Ordering::SeqCst)
    }

    /// Returns true for the first caller only
    fn mark_list_requested(&self) -> bool {
        !self.list_requested.swap(true, Ordering::SeqCst)
    }

    pub fn status(&self) -> BackendStatus {
        *self.status.read().unwrap()
    }

    pub fn set_status(&self, status: BackendStatus) {
        *self.status.write().unwrap() = status;
    }

    pub fn printer_status_changed(&self, printer: &Arc<Printer>) {
        self.emit(BackendEvent::PrinterStatusChanged(printer.clone()));
    }

    pub fn details_acquired(&self, printer: &Arc<Printer>, success: bool) {
        self.emit(BackendEvent::DetailsAcquired {
            printer: printer.clone(),
            success,
        });
    }

    /// Release every printer. Printers still held elsewhere keep working as
    /// plain records but no longer resolve through this backend.
    pub fn destroy(&self) {
        let removed: Vec<_> = self.printers.write().unwrap().drain().map(|(_, p)| p).collect();
        for printer in removed {
            self.emit(BackendEvent::PrinterRemoved(printer));
        }
        tracing::debug!("Backend {} destroyed", self.name);
    }
}

/// A pluggable provider of printers and job delivery
#[async_trait]
pub trait PrintBackend: Send + Sync {
    fn base(&self) -> &PrintBackendBase;

    fn name(&self) -> &str {
        self.base().name()
    }

    /// Start discovering printers. Discovered printers are announced through
    /// the base, which also receives the list-done mark.
    async fn request_printer_list(&self) {}

    /// Fetch the extended attributes of `printer`.
    ///
    /// Returns whether details are now available. A failed acquisition is a
    /// normal outcome, not an error; only cancellation returns `Err`.
    async fn printer_request_details(
        &self,
        printer: &Arc<Printer>,
        cancel: &CancellationToken,
    ) -> Result<bool, PrintError> {
        if cancel.is_cancelled() {
            return Err(PrintError::Cancelled);
        }
        let success = printer.has_details();
        self.base().details_acquired(printer, success);
        Ok(success)
    }

    /// Wrap the spool channel in a surface of the format the settings ask for
    fn printer_create_surface(
        &self,
        printer: &Printer,
        settings: &PrintSettings,
        width: f64,
        height: f64,
        spool: &SpoolChannel,
    ) -> Result<Surface, PrintError>;

    fn printer_get_options(
        &self,
        _printer: &Printer,
        _settings: &PrintSettings,
        _page_setup: &PageSetup,
        _capabilities: PrintCapabilities,
    ) -> PrinterOptionSet {
        PrinterOptionSet::new()
    }

    /// Flag option combinations the printer can't satisfy
    fn printer_mark_conflicts(&self, _printer: &Printer, _options: &mut PrinterOptionSet) -> bool {
        false
    }

    fn printer_get_settings_from_options(
        &self,
        _printer: &Printer,
        _options: &PrinterOptionSet,
        _settings: &mut PrintSettings,
    ) {
    }

    /// Derive the job's print parameters from the settings
    fn printer_prepare_for_print(
        &self,
        _printer: &Printer,
        params: &mut PrintParameters,
        settings: &PrintSettings,
        _page_setup: &PageSetup,
    ) {
        params.apply_settings(settings);
        params.apply_number_up(settings);
    }

    fn printer_list_papers(&self, _printer: &Printer) -> Vec<PageSetup> {
        Vec::new()
    }

    fn printer_get_default_page_size(&self, _printer: &Printer) -> Option<PageSetup> {
        None
    }

    fn printer_get_hard_margins(&self, _printer: &Printer) -> Option<Margins> {
        None
    }

    fn printer_get_capabilities(&self, _printer: &Printer) -> PrintCapabilities {
        PrintCapabilities::empty()
    }

    /// Open the transport for one job
    async fn open_sink(&self, job: &PrintJob) -> Result<Box<dyn SpoolSink>, PrintError>;

    /// Follow a delivered job through the destination queue
    async fn track_job(
        &self,
        _job: &PrintJob,
        _cancel: &CancellationToken,
    ) -> Result<(), PrintError> {
        Ok(())
    }

    /// Deliver the spool channel to the job's printer.
    ///
    /// Returns the number of bytes delivered. On failure or cancellation the
    /// sink is aborted so the destination never sees a truncated document.
    async fn print_stream(
        &self,
        job: &PrintJob,
        spool: SpoolChannel,
        cancel: &CancellationToken,
    ) -> Result<u64, PrintError> {
        let printer = job.printer();
        if !self.base().owns_printer(printer) {
            return Err(PrintError::UnknownPrinter(printer.name().to_string()));
        }

        let mut sink = self.open_sink(job).await?;

        let total = match spool::copy_to_sink(spool, &mut *sink, cancel).await {
            Ok(total) => total,
            Err(e) => {
                tracing::warn!("Delivery of '{}' to {} failed: {}", job.title(), printer.name(), e);
                sink.abort().await;
                return Err(e);
            }
        };
        sink.finish().await?;

        tracing::info!(
            "Delivered '{}' to {} ({} bytes)",
            job.title(),
            printer.name(),
            total
        );

        if job.track_print_status() {
            self.track_job(job, cancel).await?;
        }
        Ok(total)
    }

    /// Request the printer list once per backend instance
    async fn ensure_printer_list(&self) {
        if self.base().mark_list_requested() {
            self.request_printer_list().await;
        }
    }

    fn printers(&self) -> Vec<Arc<Printer>> {
        self.base().printers()
    }

    fn find_printer(&self, name: &str) -> Option<Arc<Printer>> {
        self.base().find_printer(name)
    }

    fn destroy(&self) {
        self.base().destroy();
    }
}

/// Instantiate one backend by name
/// Backend names `create_backend` understands
pub const BACKEND_NAMES: &[&str] = &["file", "lpr", "test"];

pub fn create_backend(
    name: &str,
    config: &PrintConfig,
) -> Result<Arc<dyn PrintBackend>, PrintError> {
    let backend: Arc<dyn PrintBackend> = match name {
        "file" => FileBackend::new(),
        "lpr" => LprBackend::new(&config.lpr_command),
        "test" => TestBackend::new(
            config.test_printer_count,
            DetailsPolicy::Random {
                success_weight: config.test_details_success_weight,
            },
        ),
        other => return Err(PrintError::UnknownBackend(other.to_string())),
    };
    Ok(backend)
}

/// Instantiate every backend the configuration names. Unknown names are
/// skipped with a warning.
pub fn load_backends(config: &PrintConfig) -> Vec<Arc<dyn PrintBackend>> {
    config
        .backends
        .iter()
        .filter_map(|name| match create_backend(name, config) {
            Ok(backend) => {
                tracing::info!("Loaded print backend {}", name);
                Some(backend)
            }
            Err(e) => {
                tracing::warn!("Skipping print backend: {}", e);
                None
            }
        })
        .collect()
}

/// Call `func` for every active printer of every backend until it returns
/// true. With `wait`, each backend's listing is requested and awaited first.
///
/// Returns true when `func` stopped the enumeration.
pub async fn enumerate_printers<F>(
    backends: &[Arc<dyn PrintBackend>],
    wait: bool,
    mut func: F,
) -> bool
where
    F: FnMut(&Arc<Printer>) -> bool,
{
    for backend in backends {
        if wait {
            let mut events = backend.base().subscribe();
            backend.ensure_printer_list().await;
            while !backend.base().is_list_done() {
                match events.recv().await {
                    Some(BackendEvent::PrinterListDone) | None => break,
                    Some(_) => continue,
                }
            }
        } else {
            let backend = backend.clone();
            tokio::spawn(async move { backend.ensure_printer_list().await });
        }

        for printer in backend.printers() {
            if func(&printer) {
                return true;
            }
        }
    }
    false
}

/// Output format requested by the settings, PDF when unset
pub(crate) fn requested_format(settings: &PrintSettings) -> Result<OutputFormat, PrintError> {
    Ok(settings.output_file_format()?.unwrap_or(OutputFormat::Pdf))
}

/// Surface for a file-like destination, with fallback resolution from the lpi
pub(crate) fn create_file_surface(
    format: OutputFormat,
    settings: &PrintSettings,
    width: f64,
    height: f64,
    spool: &SpoolChannel,
) -> Result<Surface, PrintError> {
    let mut surface = Surface::new(format, spool.writer()?, width, height)?;
    surface.set_fallback_resolution(2.0 * settings.printer_lpi());
    Ok(surface)
}

/// Destination of a file-like backend: `output-uri`, else `<cwd>/<stem>.<ext>`
pub(crate) fn output_path(
    settings: &PrintSettings,
    default_stem: &str,
) -> Result<PathBuf, PrintError> {
    if let Some(uri) = settings.output_uri() {
        return spool::uri_to_path(uri);
    }
    let format = requested_format(settings)?;
    let cwd = std::env::current_dir()
        .map_err(|e| PrintError::FileIo(format!("Failed to resolve current directory: {}", e)))?;
    Ok(cwd.join(format!("{}.{}", default_stem, format.nick())))
}
