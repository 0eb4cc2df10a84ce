// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Printer options
//
// Named, typed options a backend offers for one printer. Front ends render
// them; backends read the chosen values back into the print settings.

use serde::{Deserialize, Serialize};

/// Option names shared between backends
pub const OPTION_N_UP: &str = "btk-n-up";
pub const OPTION_N_UP_LAYOUT: &str = "btk-n-up-layout";
pub const OPTION_MAIN_PAGE_CUSTOM_INPUT: &str = "btk-main-page-custom-input";
pub const OPTION_OUTPUT_FILE_FORMAT: &str = "output-file-format";

/// Group for options shown on the main page of a print dialog
pub const GROUP_DIALOG_EXTENSION: &str = "BtkPrintDialogExtension";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    Boolean,
    PickOne,
    PickOneString,
    Alternative,
    String,
    FileSave,
}

/// One choice of an enumerated option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub value: String,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterOption {
    pub name: String,
    pub display_text: String,
    pub option_type: OptionType,
    pub value: String,
    pub choices: Vec<OptionChoice>,
    pub group: Option<String>,
    pub has_conflict: bool,
    pub activates_default: bool,
}

impl PrinterOption {
    pub fn new(name: &str, display_text: &str, option_type: OptionType) -> Self {
        Self {
            name: name.to_string(),
            display_text: display_text.to_string(),
            option_type,
            value: String::new(),
            choices: Vec::new(),
            group: None,
            has_conflict: false,
            activates_default: false,
        }
    }

    /// Replace the choices; values and display names are paired by position
    pub fn with_choices(mut self, values: &[&str], displays: &[&str]) -> Self {
        self.choices = values
            .iter()
            .zip(displays.iter())
            .map(|(value, display)| OptionChoice {
                value: value.to_string(),
                display: display.to_string(),
            })
            .collect();
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn with_activates_default(mut self, activates: bool) -> Self {
        self.activates_default = activates;
        self
    }

    /// Set the value. Returns true when it changed.
    pub fn set(&mut self, value: &str) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value.to_string();
        true
    }

    pub fn has_choice(&self, value: &str) -> bool {
        self.choices.iter().any(|c| c.value == value)
    }
}

/// Ordered set of options, unique by name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrinterOptionSet {
    options: Vec<PrinterOption>,
}

impl PrinterOptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option, replacing any option with the same name in place
    pub fn add(&mut self, option: PrinterOption) {
        match self.options.iter_mut().find(|o| o.name == option.name) {
            Some(existing) => *existing = option,
            None => self.options.push(option),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<PrinterOption> {
        let index = self.options.iter().position(|o| o.name == name)?;
        Some(self.options.remove(index))
    }

    pub fn lookup(&self, name: &str) -> Option<&PrinterOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut PrinterOption> {
        self.options.iter_mut().find(|o| o.name == name)
    }

    /// Value of the named option, if present
    pub fn value(&self, name: &str) -> Option<&str> {
        self.lookup(name).map(|o| o.value.as_str())
    }

    pub fn clear_conflicts(&mut self) {
        for option in &mut self.options {
            option.has_conflict = false;
        }
    }

    pub fn has_conflicts(&self) -> bool {
        self.options.iter().any(|o| o.has_conflict)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrinterOption> {
        self.options.iter()
    }

    /// Options belonging to one group
    pub fn group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a PrinterOption> {
        self.options
            .iter()
            .filter(move |o| o.group.as_deref() == Some(group))
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_replaces_by_name() {
        let mut set = PrinterOptionSet::new();
        let n_up = PrinterOption::new(OPTION_N_UP, "Pages per sheet", OptionType::PickOne);
        set.add(n_up.clone().with_value("1"));
        set.add(n_up.with_value("4"));

        assert_eq!(set.len(), 1);
        assert_eq!(set.value(OPTION_N_UP), Some("4"));
    }

    #[test]
    fn set_reports_changes() {
        let mut option = PrinterOption::new("x", "X", OptionType::String);
        assert!(option.set("a"));
        assert!(!option.set("a"));
    }

    #[test]
    fn conflicts_and_groups() {
        let mut set = PrinterOptionSet::new();
        set.add(
            PrinterOption::new(OPTION_MAIN_PAGE_CUSTOM_INPUT, "File", OptionType::FileSave)
                .with_group(GROUP_DIALOG_EXTENSION),
        );
        set.add(PrinterOption::new(OPTION_N_UP, "Pages per sheet", OptionType::PickOne));

        set.lookup_mut(OPTION_N_UP).unwrap().has_conflict = true;
        assert!(set.has_conflicts());
        set.clear_conflicts();
        assert!(!set.has_conflicts());

        let names: Vec<_> = set.group(GROUP_DIALOG_EXTENSION).map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec![OPTION_MAIN_PAGE_CUSTOM_INPUT]);
    }
}
