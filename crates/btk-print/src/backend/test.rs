// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Test backend
//
// Synthesizes a batch of fake printers whose details arrive after a delay
// and may fail to arrive at all. Jobs are written to a local file, so the
// whole pipeline can be exercised without hardware.

use super::{create_file_surface, output_path, requested_format, PrintBackend, PrintBackendBase};
use crate::job::{PrintJob, PrintParameters};
use crate::options::{OptionType, PrinterOption, PrinterOptionSet, OPTION_N_UP};
use crate::page_setup::PageSetup;
use crate::print_settings::PrintSettings;
use crate::printer::{PrintCapabilities, Printer};
use crate::spool::{FileReplaceSink, SpoolChannel, SpoolSink};
use crate::surface::Surface;
use crate::types::{PrintError, PrintStatus};
use async_trait::async_trait;
use rand::Rng;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const TEST_PRINTER_PREFIX: &str = "Print to Test Printer";

/// Pause between the queue states reported for tracked jobs
const TRACK_STEP: Duration = Duration::from_millis(20);

/// How printer detail requests resolve
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetailsPolicy {
    /// Random delay weighted towards short waits; succeeds `success_weight`
    /// percent of the time
    Random { success_weight: u32 },
    /// Always the same outcome after the same delay
    Fixed { delay: Duration, success: bool },
}

impl DetailsPolicy {
    /// Delay and outcome of one request
    fn draw(&self) -> (Duration, bool) {
        match *self {
            DetailsPolicy::Fixed { delay, success } => (delay, success),
            DetailsPolicy::Random { success_weight } => {
                let mut rng = rand::rng();
                let weight = rng.random_range(0..100);
                let seconds = if weight < 50 {
                    rng.random_range(0..2)
                } else if weight < 75 {
                    rng.random_range(1..5)
                } else {
                    rng.random_range(1..10)
                };
                let delay = if seconds == 0 {
                    Duration::from_millis(10)
                } else {
                    Duration::from_secs(seconds)
                };
                let success = rng.random_range(0..100) < success_weight;
                (delay, success)
            }
        }
    }
}

pub struct TestBackend {
    base: PrintBackendBase,
    weak_self: Weak<TestBackend>,
    printer_count: usize,
    details_policy: DetailsPolicy,
}

impl TestBackend {
    pub fn new(printer_count: usize, details_policy: DetailsPolicy) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<TestBackend>| TestBackend {
            base: PrintBackendBase::new("test"),
            weak_self: weak.clone(),
            printer_count,
            details_policy,
        })
    }

    pub fn details_policy(&self) -> DetailsPolicy {
        self.details_policy
    }

    /// Add fake printer number `index`
    pub fn add_test_printer(&self, index: usize) -> Arc<Printer> {
        let owner: Weak<dyn PrintBackend> = self.weak_self.clone();
        let name = format!("{} {}", TEST_PRINTER_PREFIX, index);
        let printer = Printer::new(&name, owner, false);
        printer.set_has_details(false);
        printer.set_icon_name("btk-delete");
        printer.set_is_active(true);

        let printer = Arc::new(printer);
        self.base.add_printer(printer.clone());
        printer
    }
}

#[async_trait]
impl PrintBackend for TestBackend {
    fn base(&self) -> &PrintBackendBase {
        &self.base
    }

    async fn request_printer_list(&self) {
        for index in 0..self.printer_count {
            tracing::debug!("Test backend: adding printer {}", index);
            self.add_test_printer(index);
            tokio::task::yield_now().await;
        }
        self.base.set_list_done();
    }

    async fn printer_request_details(
        &self,
        printer: &Arc<Printer>,
        cancel: &CancellationToken,
    ) -> Result<bool, PrintError> {
        let (delay, success) = self.details_policy.draw();
        tracing::debug!("Gathering details for {} in {:?}", printer.name(), delay);

        tokio::select! {
            _ = cancel.cancelled() => return Err(PrintError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        tracing::debug!("Details for {}: success {}", printer.name(), success);
        printer.set_has_details(success);
        self.base.details_acquired(printer, success);
        Ok(success)
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
        _printer: &Printer,
        _settings: &PrintSettings,
        _page_setup: &PageSetup,
        _capabilities: PrintCapabilities,
    ) -> PrinterOptionSet {
        let mut set = PrinterOptionSet::new();
        set.add(
            PrinterOption::new(OPTION_N_UP, "Pages per sheet:", OptionType::PickOne)
                .with_choices(&["1"], &["1"])
                .with_value("1"),
        );
        set
    }

    fn printer_prepare_for_print(
        &self,
        _printer: &Printer,
        params: &mut PrintParameters,
        settings: &PrintSettings,
        _page_setup: &PageSetup,
    ) {
        params.apply_settings(settings);
    }

    async fn open_sink(&self, job: &PrintJob) -> Result<Box<dyn SpoolSink>, PrintError> {
        let destination = output_path(job.settings(), "test-output")?;
        Ok(Box::new(FileReplaceSink::create(&destination)?))
    }

    async fn track_job(
        &self,
        job: &PrintJob,
        cancel: &CancellationToken,
    ) -> Result<(), PrintError> {
        for status in [PrintStatus::Pending, PrintStatus::Printing] {
            job.set_status(status);
            tokio::select! {
                _ = cancel.cancelled() => return Err(PrintError::Cancelled),
                _ = tokio::time::sleep(TRACK_STEP) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendEvent;
    use crate::print_settings::NUMBER_UP;

    fn fixed(success: bool) -> DetailsPolicy {
        DetailsPolicy::Fixed {
            delay: Duration::from_millis(5),
            success,
        }
    }

    #[tokio::test]
    async fn listing_adds_every_printer_then_finishes_once() {
        let backend = TestBackend::new(5, fixed(true));
        let mut events = backend.base().subscribe();

        backend.ensure_printer_list().await;
        backend.ensure_printer_list().await;

        let mut added = 0;
        let mut done = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                BackendEvent::PrinterAdded(_) => {
                    assert_eq!(done, 0, "printer added after list done");
                    added += 1;
                }
                BackendEvent::PrinterListDone => done += 1,
                _ => {}
            }
        }
        assert_eq!(added, 5);
        assert_eq!(done, 1);

        let printers = backend.printers();
        assert_eq!(printers[0].name(), "Print to Test Printer 0");
        assert!(!printers[0].is_virtual());
        assert!(!printers[0].has_details());
        assert_eq!(printers[0].icon_name(), "btk-delete");
    }

    #[tokio::test]
    async fn empty_listing_still_finishes() {
        let backend = TestBackend::new(0, fixed(true));
        backend.ensure_printer_list().await;
        assert!(backend.base().is_list_done());
        assert!(backend.printers().is_empty());
    }

    #[tokio::test]
    async fn successful_details_are_recorded() {
        let backend = TestBackend::new(1, fixed(true));
        let printer = backend.add_test_printer(0);
        let mut events = backend.base().subscribe();

        let ok = backend
            .printer_request_details(&printer, &CancellationToken::new())
            .await
            .unwrap();

        assert!(ok);
        assert!(printer.has_details());
        assert!(matches!(
            events.try_recv(),
            Ok(BackendEvent::DetailsAcquired { success: true, .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_details_request_emits_nothing() {
        let backend = TestBackend::new(1, fixed(true));
        let printer = backend.add_test_printer(0);
        let mut events = backend.base().subscribe();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = backend.printer_request_details(&printer, &cancel).await;

        assert!(matches!(result, Err(PrintError::Cancelled)));
        assert!(!printer.has_details());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_during_the_delay_leaves_no_details() {
        let backend = TestBackend::new(
            1,
            DetailsPolicy::Fixed {
                delay: Duration::from_millis(200),
                success: true,
            },
        );
        let printer = backend.add_test_printer(0);
        let mut events = backend.base().subscribe();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let result = backend.printer_request_details(&printer, &cancel).await;

        assert!(matches!(result, Err(PrintError::Cancelled)));
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(!printer.has_details());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn large_listing_announces_every_printer() {
        let backend = TestBackend::new(
            300,
            DetailsPolicy::Fixed {
                delay: Duration::ZERO,
                success: true,
            },
        );
        let mut events = backend.base().subscribe();

        backend.ensure_printer_list().await;

        let mut added = 0;
        let mut done = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                BackendEvent::PrinterAdded(_) => added += 1,
                BackendEvent::PrinterListDone => done += 1,
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(added, 300);
        assert_eq!(done, 1);
        assert_eq!(backend.printers().len(), 300);
    }

    #[test]
    fn random_policy_draws_within_bounds() {
        let always = DetailsPolicy::Random { success_weight: 100 };
        let never = DetailsPolicy::Random { success_weight: 0 };
        for _ in 0..50 {
            let (delay, success) = always.draw();
            assert!(success);
            assert!(delay < Duration::from_secs(10));
            assert!(!never.draw().1);
        }
    }

    #[test]
    fn number_up_is_not_applied() {
        let backend = TestBackend::new(1, fixed(true));
        let printer = backend.add_test_printer(0);
        let mut settings = PrintSettings::new();
        settings.set(NUMBER_UP, "4");

        let mut params = PrintParameters::default();
        backend.printer_prepare_for_print(&printer, &mut params, &settings, &PageSetup::default());
        assert_eq!(params.number_up, 1);
        assert!(params.rotate_to_orientation);
    }
}
