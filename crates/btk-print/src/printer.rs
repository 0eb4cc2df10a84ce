// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Printer records
//
// A printer is owned by the backend that created it. It keeps a weak
// reference back to that backend for dispatch, so dropping (or destroying)
// the backend never leaves a printer pointing at freed state.

use crate::backend::PrintBackend;
use crate::page_setup::{Margins, PageSetup};
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

bitflags::bitflags! {
    /// Features a printer handles natively
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct PrintCapabilities: u32 {
        const PAGE_SET = 1 << 0;
        const COPIES = 1 << 1;
        const COLLATE = 1 << 2;
        const REVERSE = 1 << 3;
        const SCALE = 1 << 4;
        const GENERATE_PDF = 1 << 5;
        const GENERATE_PS = 1 << 6;
        const PREVIEW = 1 << 7;
        const NUMBER_UP = 1 << 8;
        const NUMBER_UP_LAYOUT = 1 << 9;
    }
}

/// Mutable part of a printer record
#[derive(Debug, Clone, Default)]
pub struct PrinterState {
    pub location: String,
    pub description: String,
    pub icon_name: String,
    pub state_message: String,
    pub job_count: u32,
    pub is_active: bool,
    pub is_paused: bool,
    pub is_accepting_jobs: bool,
    pub is_new: bool,
    pub is_default: bool,
    pub has_details: bool,
    pub accepts_pdf: bool,
    pub accepts_ps: bool,
}

/// One print destination
pub struct Printer {
    name: String,
    is_virtual: bool,
    backend: Weak<dyn PrintBackend>,
    state: RwLock<PrinterState>,
}

macro_rules! flag_accessors {
    ($($get:ident, $set:ident, $field:ident;)*) => {
        $(
            pub fn $get(&self) -> bool {
                self.state.read().unwrap().$field
            }

            /// Returns true when the value changed
            pub fn $set(&self, value: bool) -> bool {
                let mut state = self.state.write().unwrap();
                if state.$field == value {
                    return false;
                }
                state.$field = value;
                true
            }
        )*
    };
}

macro_rules! string_accessors {
    ($($get:ident, $set:ident, $field:ident;)*) => {
        $(
            pub fn $get(&self) -> String {
                self.state.read().unwrap().$field.clone()
            }

            /// Returns true when the value changed
            pub fn $set(&self, value: &str) -> bool {
                let mut state = self.state.write().unwrap();
                if state.$field == value {
                    return false;
                }
                state.$field = value.to_string();
                true
            }
        )*
    };
}

impl Printer {
    /// Create a printer owned by `backend`. New printers are accepting jobs
    /// and marked new until the backend finishes populating them.
    pub fn new(name: &str, backend: Weak<dyn PrintBackend>, is_virtual: bool) -> Self {
        Self {
            name: name.to_string(),
            is_virtual,
            backend,
            state: RwLock::new(PrinterState {
                is_accepting_jobs: true,
                is_new: true,
                accepts_ps: true,
                ..PrinterState::default()
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Virtual printers (print to file, ...) never represent hardware
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// The owning backend, or None once it has been dropped
    pub fn backend(&self) -> Option<Arc<dyn PrintBackend>> {
        self.backend.upgrade()
    }

    /// Snapshot of the mutable state
    pub fn state(&self) -> PrinterState {
        self.state.read().unwrap().clone()
    }

    flag_accessors! {
        is_active, set_is_active, is_active;
        is_paused, set_is_paused, is_paused;
        is_accepting_jobs, set_is_accepting_jobs, is_accepting_jobs;
        is_new, set_is_new, is_new;
        is_default, set_is_default, is_default;
        has_details, set_has_details, has_details;
        accepts_pdf, set_accepts_pdf, accepts_pdf;
        accepts_ps, set_accepts_ps, accepts_ps;
    }

    string_accessors! {
        location, set_location, location;
        description, set_description, description;
        icon_name, set_icon_name, icon_name;
        state_message, set_state_message, state_message;
    }

    pub fn job_count(&self) -> u32 {
        self.state.read().unwrap().job_count
    }

    pub fn set_job_count(&self, count: u32) -> bool {
        let mut state = self.state.write().unwrap();
        if state.job_count == count {
            return false;
        }
        state.job_count = count;
        true
    }

    /// Paper sizes known for this printer; empty until details are available
    pub fn list_papers(&self) -> Vec<PageSetup> {
        match self.backend() {
            Some(backend) if self.has_details() => backend.printer_list_papers(self),
            _ => Vec::new(),
        }
    }

    pub fn default_page_size(&self) -> Option<PageSetup> {
        self.backend()
            .and_then(|backend| backend.printer_get_default_page_size(self))
    }

    /// Hardware margins. Virtual printers have none.
    pub fn hard_margins(&self) -> Option<Margins> {
        if self.is_virtual {
            return None;
        }
        self.backend()
            .and_then(|backend| backend.printer_get_hard_margins(self))
    }

    pub fn capabilities(&self) -> PrintCapabilities {
        self.backend()
            .map(|backend| backend.printer_get_capabilities(self))
            .unwrap_or_default()
    }

    /// Case-insensitive ordering by name
    pub fn compare(&self, other: &Printer) -> Ordering {
        self.name
            .to_ascii_lowercase()
            .cmp(&other.name.to_ascii_lowercase())
    }
}

impl fmt::Debug for Printer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Printer")
            .field("name", &self.name)
            .field("is_virtual", &self.is_virtual)
            .field("state", &*self.state.read().unwrap())
            .finish()
    }
}
