// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Print jobs
//
// A job bundles a printer, a private copy of the print settings and a page
// setup with the spooled page data. It walks an explicit status machine and
// broadcasts every status change to its subscribers.

use crate::backend::PrintBackend;
use crate::events::{EventReceiver, EventSubscribers};
use crate::page_setup::PageSetup;
use crate::print_settings::{NumberUpLayout, PageRange, PageSet, PrintPages, PrintSettings};
use crate::printer::Printer;
use crate::spool::{SpoolChannel, SpoolOptions};
use crate::surface::Surface;
use crate::types::{PrintError, PrintStatus};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Events emitted by a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    StatusChanged(PrintStatus),
    TrackPrintStatusChanged(bool),
}

/// How the pages of a job are to be printed, filled in by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct PrintParameters {
    pub print_pages: PrintPages,
    pub page_ranges: Vec<PageRange>,
    pub num_copies: i32,
    pub collate: bool,
    pub reverse: bool,
    /// Fraction, 1.0 is unscaled
    pub scale: f64,
    pub page_set: PageSet,
    pub rotate_to_orientation: bool,
    pub number_up: i32,
    pub number_up_layout: NumberUpLayout,
}

impl Default for PrintParameters {
    fn default() -> Self {
        Self {
            print_pages: PrintPages::All,
            page_ranges: Vec::new(),
            num_copies: 1,
            collate: false,
            reverse: false,
            scale: 1.0,
            page_set: PageSet::All,
            rotate_to_orientation: false,
            number_up: 1,
            number_up_layout: NumberUpLayout::LeftToRightTopToBottom,
        }
    }
}

impl PrintParameters {
    /// Page selection, copies, ordering and scale
    pub fn apply_settings(&mut self, settings: &PrintSettings) {
        self.print_pages = settings.print_pages();
        self.page_ranges = if self.print_pages == PrintPages::Ranges {
            settings.page_ranges()
        } else {
            Vec::new()
        };
        self.collate = settings.collate();
        self.reverse = settings.reverse();
        self.num_copies = settings.n_copies();

        let scale = settings.scale();
        if scale != 100.0 {
            self.scale = scale / 100.0;
        }

        self.page_set = settings.page_set();
        self.rotate_to_orientation = true;
    }

    pub fn apply_number_up(&mut self, settings: &PrintSettings) {
        self.number_up = settings.number_up();
        self.number_up_layout = settings.number_up_layout();
    }
}

pub struct PrintJob {
    id: Uuid,
    created_at: DateTime<Utc>,
    title: String,
    printer: Arc<Printer>,
    backend: Arc<dyn PrintBackend>,
    settings: PrintSettings,
    page_setup: Arc<PageSetup>,
    params: PrintParameters,
    spool_options: SpoolOptions,
    spool: Option<SpoolChannel>,
    surface: Option<Arc<Surface>>,
    sent: bool,
    status: Mutex<PrintStatus>,
    track_print_status: AtomicBool,
    subscribers: EventSubscribers<JobEvent>,
}

impl PrintJob {
    /// Create a job for `printer`. The settings are copied; the backend
    /// fills in the print parameters right away.
    pub fn new(
        title: &str,
        printer: Arc<Printer>,
        settings: &PrintSettings,
        page_setup: Arc<PageSetup>,
    ) -> Result<Self, PrintError> {
        let backend = printer.backend().ok_or_else(|| {
            PrintError::BackendUnavailable(format!("printer {} has no backend", printer.name()))
        })?;

        let settings = settings.clone();
        let mut params = PrintParameters::default();
        backend.printer_prepare_for_print(&printer, &mut params, &settings, &page_setup);

        let job = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            title: title.to_string(),
            printer,
            backend,
            settings,
            page_setup,
            params,
            spool_options: SpoolOptions::default(),
            spool: None,
            surface: None,
            sent: false,
            status: Mutex::new(PrintStatus::Initial),
            track_print_status: AtomicBool::new(false),
            subscribers: EventSubscribers::new(),
        };

        tracing::debug!("Created print job {} '{}' for {}", job.id, job.title, job.printer.name());
        Ok(job)
    }

    /// Where temporary spool files go
    pub fn with_spool_options(mut self, options: SpoolOptions) -> Self {
        self.spool_options = options;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn printer(&self) -> &Arc<Printer> {
        &self.printer
    }

    pub fn backend(&self) -> &Arc<dyn PrintBackend> {
        &self.backend
    }

    pub fn settings(&self) -> &PrintSettings {
        &self.settings
    }

    pub fn page_setup(&self) -> &Arc<PageSetup> {
        &self.page_setup
    }

    pub fn params(&self) -> &PrintParameters {
        &self.params
    }

    pub fn status(&self) -> PrintStatus {
        *self.status.lock().unwrap()
    }

    pub fn has_spool(&self) -> bool {
        self.spool.is_some()
    }

    pub fn subscribe(&self) -> EventReceiver<JobEvent> {
        self.subscribers.subscribe()
    }

    /// Move to `status`. Setting the current status again does nothing, and
    /// a terminal status is final.
    pub fn set_status(&self, status: PrintStatus) {
        let mut current = self.status.lock().unwrap();
        if *current == status {
            return;
        }
        if current.is_terminal() {
            tracing::warn!(
                "Job {}: ignoring status {} after {}",
                self.id,
                status,
                *current
            );
            return;
        }

        *current = status;
        // Under the lock: events stay in status order
        self.subscribers.emit(JobEvent::StatusChanged(status));
        tracing::debug!("Job {} status: {}", self.id, status);
    }

    pub fn track_print_status(&self) -> bool {
        self.track_print_status.load(Ordering::SeqCst)
    }

    /// Keep reporting status after the data has been handed to the printer
    pub fn set_track_print_status(&self, track: bool) {
        if self.track_print_status.swap(track, Ordering::SeqCst) != track {
            self.subscribers.emit(JobEvent::TrackPrintStatusChanged(track));
        }
    }

    /// Print an existing document verbatim instead of rendering pages
    pub fn set_source_file(&mut self, path: impl AsRef<Path>) -> Result<(), PrintError> {
        if self.sent || self.spool.is_some() || self.surface.is_some() {
            return Err(PrintError::SpoolConflict(
                "job already has spool data".to_string(),
            ));
        }
        self.check_printer()?;
        self.spool = Some(SpoolChannel::open_source(path.as_ref())?);
        Ok(())
    }

    fn check_printer(&self) -> Result<(), PrintError> {
        if self.backend.base().owns_printer(&self.printer) {
            Ok(())
        } else {
            Err(PrintError::UnknownPrinter(self.printer.name().to_string()))
        }
    }

    /// Surface to draw the pages on, created on first use
    pub fn surface(&mut self) -> Result<Arc<Surface>, PrintError> {
        if let Some(surface) = &self.surface {
            return Ok(surface.clone());
        }
        if self.sent || self.spool.is_some() {
            return Err(PrintError::SpoolConflict(
                "job prints a source file".to_string(),
            ));
        }

        self.check_printer()?;

        let spool = SpoolChannel::create_temporary(&self.spool_options)?;
        let paper = self.page_setup.paper_size();
        let surface = Arc::new(self.backend.printer_create_surface(
            &self.printer,
            &self.settings,
            paper.width_points(),
            paper.height_points(),
            &spool,
        )?);

        self.spool = Some(spool);
        self.surface = Some(surface.clone());
        Ok(surface)
    }

    /// Deliver the spooled data to the printer.
    ///
    /// `on_complete` runs exactly once, after the job reached its terminal
    /// status. Calling `send` without spool data, or a second time, fails
    /// right away without touching the status or calling `on_complete`.
    pub async fn send<F>(
        &mut self,
        cancel: CancellationToken,
        on_complete: F,
    ) -> Result<(), PrintError>
    where
        F: FnOnce(&PrintJob, Option<&PrintError>),
    {
        if self.sent {
            return Err(PrintError::AlreadySent);
        }
        let mut spool = self.spool.take().ok_or(PrintError::NoSpoolData)?;
        self.sent = true;

        self.set_status(PrintStatus::SendingData);

        let backend = self.backend.clone();
        let result = match self.prepare_spool(&mut spool) {
            Ok(()) => backend.print_stream(&*self, spool, &cancel).await.map(|_| ()),
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => self.set_status(PrintStatus::Finished),
            Err(e) => {
                if e.is_cancelled() {
                    tracing::info!("Job {} cancelled", self.id);
                } else {
                    tracing::error!("Job {} failed: {}", self.id, e);
                }
                self.set_status(PrintStatus::FinishedAborted);
            }
        }

        on_complete(self, result.as_ref().err());
        result
    }

    fn prepare_spool(&self, spool: &mut SpoolChannel) -> Result<(), PrintError> {
        if let Some(surface) = &self.surface {
            surface.finish()?;
        }
        spool.rewind()
    }
}

impl std::fmt::Debug for PrintJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintJob")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("printer", &self.printer.name())
            .field("status", &self.status())
            .finish()
    }
}
