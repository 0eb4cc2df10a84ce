// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Print job spooling and backend dispatch
//
// This crate provides:
// - PrintJob with its status machine and spool channel
// - The PrintBackend trait and the file, lpr and test backends
// - Printer records, printer options and print settings
// - PrintConfig and ConfigStore for persistent configuration
//
// Dialogs and other front-end code live outside this crate.

pub mod backend;
pub mod events;
pub mod job;
pub mod options;
pub mod page_setup;
pub mod print_settings;
pub mod printer;
pub mod settings;
pub mod spool;
pub mod surface;
pub mod types;

// Re-export commonly used items
pub use backend::{
    create_backend, enumerate_printers, load_backends, BackendEvent, DetailsPolicy, FileBackend,
    LprBackend, PrintBackend, PrintBackendBase, TestBackend,
};
pub use events::{EventReceiver, EventSubscribers};
pub use job::{JobEvent, PrintJob, PrintParameters};
pub use options::{OptionType, PrinterOption, PrinterOptionSet};
pub use page_setup::{Margins, Orientation, PageSetup, PaperSize};
pub use print_settings::{OutputFormat, PrintSettings};
pub use printer::{PrintCapabilities, Printer};
pub use settings::ConfigStore;
pub use spool::{SpoolChannel, SpoolOptions, SpoolSink};
pub use surface::Surface;
pub use types::{BackendStatus, PrintConfig, PrintError, PrintStatus};
