// SPDX-License-Identifier: AGPL-3.0
// BTK Print Demo - Command-line driver for the print subsystem
//
// Usage: btk-print-demo [--enable-backend NAME] [--disable-backend NAME]
//                       [FILE [PRINTER [OUTPUT-URI]]]
//
// Backend toggles are saved to the config before anything else runs.
// Without a file the available printers are listed. With a file, the
// file is sent verbatim to PRINTER (default "Print to File").

use btk_print::backend::file::FILE_PRINTER_NAME;
use btk_print::print_settings;
use btk_print::{
    enumerate_printers, load_backends, ConfigStore, JobEvent, PageSetup, PrintJob, PrintSettings,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("btk_print_demo=info".parse().unwrap())
                .add_directive("btk_print=info".parse().unwrap()),
        )
        .init();

    tracing::info!("Starting BTK print demo v{}", env!("CARGO_PKG_VERSION"));

    let store = match ConfigStore::new() {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to load print config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut args = Vec::new();
    let mut raw = std::env::args().skip(1);
    while let Some(arg) = raw.next() {
        let enabled = match arg.as_str() {
            "--enable-backend" => true,
            "--disable-backend" => false,
            _ => {
                args.push(arg);
                continue;
            }
        };
        let Some(name) = raw.next() else {
            tracing::error!("{} needs a backend name", arg);
            return ExitCode::FAILURE;
        };
        if let Err(e) = store.set_backend_enabled(&name, enabled) {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    }
    let config = store.get();
    let backends = load_backends(&config);

    let mut printers = Vec::new();
    enumerate_printers(&backends, true, |printer| {
        printers.push(printer.clone());
        false
    })
    .await;

    let Some(source) = args.first() else {
        for printer in &printers {
            println!(
                "{}{}",
                printer.name(),
                if printer.is_default() { " (default)" } else { "" }
            );
        }
        return ExitCode::SUCCESS;
    };

    let printer_name = args.get(1).map(String::as_str).unwrap_or(FILE_PRINTER_NAME);
    let Some(printer) = printers.iter().find(|p| p.name() == printer_name).cloned() else {
        tracing::error!("No printer named '{}'", printer_name);
        return ExitCode::FAILURE;
    };

    let mut settings = PrintSettings::new();
    settings.set_printer(printer.name());
    if let Some(uri) = args.get(2) {
        settings.set(print_settings::OUTPUT_URI, uri.as_str());
    }

    let mut job = match PrintJob::new(source, printer, &settings, Arc::new(PageSetup::default())) {
        Ok(job) => job.with_spool_options(config.spool_options()),
        Err(e) => {
            tracing::error!("Failed to create job: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = job.set_source_file(source) {
        tracing::error!("{}", e);
        return ExitCode::FAILURE;
    }

    let mut events = job.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let JobEvent::StatusChanged(status) = event {
                tracing::info!("Job status: {}", status);
            }
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let result = job
        .send(cancel, |job, error| match error {
            None => tracing::info!("'{}' printed", job.title()),
            Some(e) if e.is_cancelled() => tracing::warn!("'{}' cancelled", job.title()),
            Some(e) => tracing::error!("'{}' failed: {}", job.title(), e),
        })
        .await;

    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
