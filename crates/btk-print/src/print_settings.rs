// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Print settings
//
// A string key/value bag with typed accessors for the well-known keys.
// Saved to disk as a JSON object.

use crate::types::PrintError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const PRINTER: &str = "printer";
pub const ORIENTATION: &str = "orientation";
pub const PAPER_FORMAT: &str = "paper-format";
pub const N_COPIES: &str = "n-copies";
pub const COLLATE: &str = "collate";
pub const REVERSE: &str = "reverse";
pub const SCALE: &str = "scale";
pub const PRINT_PAGES: &str = "print-pages";
pub const PAGE_RANGES: &str = "page-ranges";
pub const PAGE_SET: &str = "page-set";
pub const NUMBER_UP: &str = "number-up";
pub const NUMBER_UP_LAYOUT: &str = "number-up-layout";
pub const PRINTER_LPI: &str = "printer-lpi";
pub const OUTPUT_FILE_FORMAT: &str = "output-file-format";
pub const OUTPUT_URI: &str = "output-uri";
pub const LPR_COMMANDLINE: &str = "lpr-commandline";

/// Page-description format of the spooled data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Ps,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Pdf, OutputFormat::Ps];

    pub fn from_nick(nick: &str) -> Option<Self> {
        match nick {
            "pdf" => Some(Self::Pdf),
            "ps" => Some(Self::Ps),
            _ => None,
        }
    }

    /// Settings value and file extension
    pub fn nick(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Ps => "ps",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Ps => "Postscript",
        }
    }
}

/// Which pages of the document to print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrintPages {
    #[default]
    All,
    Current,
    Ranges,
    Selection,
}

/// Which of the selected pages end up on paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSet {
    #[default]
    All,
    Even,
    Odd,
}

/// Inclusive range of pages, as stored in the settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: i32,
    pub end: i32,
}

/// Order in which pages are placed on a sheet when printing several per sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NumberUpLayout {
    #[default]
    LeftToRightTopToBottom,
    LeftToRightBottomToTop,
    RightToLeftTopToBottom,
    RightToLeftBottomToTop,
    TopToBottomLeftToRight,
    TopToBottomRightToLeft,
    BottomToTopLeftToRight,
    BottomToTopRightToLeft,
}

impl NumberUpLayout {
    const NICKS: [(&'static str, NumberUpLayout); 8] = [
        ("lrtb", NumberUpLayout::LeftToRightTopToBottom),
        ("lrbt", NumberUpLayout::LeftToRightBottomToTop),
        ("rltb", NumberUpLayout::RightToLeftTopToBottom),
        ("rlbt", NumberUpLayout::RightToLeftBottomToTop),
        ("tblr", NumberUpLayout::TopToBottomLeftToRight),
        ("tbrl", NumberUpLayout::TopToBottomRightToLeft),
        ("btlr", NumberUpLayout::BottomToTopLeftToRight),
        ("btrl", NumberUpLayout::BottomToTopRightToLeft),
    ];

    pub fn from_nick(nick: &str) -> Option<Self> {
        Self::NICKS
            .iter()
            .find(|(n, _)| *n == nick)
            .map(|(_, layout)| *layout)
    }

    pub fn nick(&self) -> &'static str {
        Self::NICKS
            .iter()
            .find(|(_, layout)| layout == self)
            .map(|(n, _)| *n)
            .unwrap_or("lrtb")
    }
}

/// Key/value print settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrintSettings {
    values: BTreeMap<String, String>,
}

impl PrintSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn unset(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterate over all key/value pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get_bool_with_default(key, false)
    }

    pub fn get_bool_with_default(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    pub fn get_int_with_default(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn set_int(&mut self, key: &str, value: i32) {
        self.set(key, value.to_string());
    }

    pub fn get_double_with_default(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn set_double(&mut self, key: &str, value: f64) {
        self.set(key, value.to_string());
    }

    pub fn printer(&self) -> Option<&str> {
        self.get(PRINTER)
    }

    pub fn set_printer(&mut self, name: &str) {
        self.set(PRINTER, name);
    }

    pub fn n_copies(&self) -> i32 {
        self.get_int_with_default(N_COPIES, 1)
    }

    pub fn set_n_copies(&mut self, copies: i32) {
        self.set_int(N_COPIES, copies);
    }

    pub fn collate(&self) -> bool {
        self.get_bool(COLLATE)
    }

    pub fn set_collate(&mut self, collate: bool) {
        self.set_bool(COLLATE, collate);
    }

    pub fn reverse(&self) -> bool {
        self.get_bool(REVERSE)
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.set_bool(REVERSE, reverse);
    }

    /// Scale in percent
    pub fn scale(&self) -> f64 {
        self.get_double_with_default(SCALE, 100.0)
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.set_double(SCALE, scale);
    }

    pub fn printer_lpi(&self) -> f64 {
        self.get_double_with_default(PRINTER_LPI, 150.0)
    }

    pub fn number_up(&self) -> i32 {
        self.get_int_with_default(NUMBER_UP, 1)
    }

    pub fn set_number_up(&mut self, number_up: i32) {
        self.set_int(NUMBER_UP, number_up);
    }

    pub fn number_up_layout(&self) -> NumberUpLayout {
        self.get(NUMBER_UP_LAYOUT)
            .and_then(NumberUpLayout::from_nick)
            .unwrap_or_default()
    }

    pub fn set_number_up_layout(&mut self, layout: NumberUpLayout) {
        self.set(NUMBER_UP_LAYOUT, layout.nick());
    }

    pub fn print_pages(&self) -> PrintPages {
        match self.get(PRINT_PAGES) {
            Some("selection") => PrintPages::Selection,
            Some("current") => PrintPages::Current,
            Some("ranges") => PrintPages::Ranges,
            _ => PrintPages::All,
        }
    }

    pub fn set_print_pages(&mut self, pages: PrintPages) {
        let value = match pages {
            PrintPages::All => "all",
            PrintPages::Current => "current",
            PrintPages::Ranges => "ranges",
            PrintPages::Selection => "selection",
        };
        self.set(PRINT_PAGES, value);
    }

    pub fn page_set(&self) -> PageSet {
        match self.get(PAGE_SET) {
            Some("even") => PageSet::Even,
            Some("odd") => PageSet::Odd,
            _ => PageSet::All,
        }
    }

    pub fn set_page_set(&mut self, page_set: PageSet) {
        let value = match page_set {
            PageSet::All => "all",
            PageSet::Even => "even",
            PageSet::Odd => "odd",
        };
        self.set(PAGE_SET, value);
    }

    /// Ranges stored as "a-b,c,d-e"; an item without a dash is a single page
    pub fn page_ranges(&self) -> Vec<PageRange> {
        let Some(value) = self.get(PAGE_RANGES) else {
            return Vec::new();
        };

        value
            .split(',')
            .filter_map(|item| {
                let item = item.trim();
                if item.is_empty() {
                    return None;
                }
                let (start, end) = match item.split_once('-') {
                    Some((start, end)) => (leading_int(start), leading_int(end)),
                    None => {
                        let page = leading_int(item);
                        (page, page)
                    }
                };
                Some(PageRange { start, end })
            })
            .collect()
    }

    pub fn set_page_ranges(&mut self, ranges: &[PageRange]) {
        let value = ranges
            .iter()
            .map(|r| {
                if r.start == r.end {
                    r.start.to_string()
                } else {
                    format!("{}-{}", r.start, r.end)
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        self.set(PAGE_RANGES, value);
    }

    /// Explicit output format. Ok(None) when the key is absent.
    pub fn output_file_format(&self) -> Result<Option<OutputFormat>, PrintError> {
        match self.get(OUTPUT_FILE_FORMAT) {
            None => Ok(None),
            Some(value) => OutputFormat::from_nick(value).map(Some).ok_or_else(|| {
                PrintError::InvalidSetting(format!("unsupported output format '{}'", value))
            }),
        }
    }

    pub fn set_output_file_format(&mut self, format: OutputFormat) {
        self.set(OUTPUT_FILE_FORMAT, format.nick());
    }

    pub fn output_uri(&self) -> Option<&str> {
        self.get(OUTPUT_URI)
    }

    pub fn set_output_uri(&mut self, uri: &str) {
        self.set(OUTPUT_URI, uri);
    }

    /// Load settings from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, PrintError> {
        let content = fs::read_to_string(path)
            .map_err(|e| PrintError::FileIo(format!("Failed to read print settings: {}", e)))?;
        serde_json::from_str(&content).map_err(|e| {
            PrintError::Serialization(format!("Failed to parse print settings: {}", e))
        })
    }

    /// Save settings to a JSON file
    pub fn to_file(&self, path: &Path) -> Result<(), PrintError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            PrintError::Serialization(format!("Failed to serialize print settings: {}", e))
        })?;
        fs::write(path, content)
            .map_err(|e| PrintError::FileIo(format!("Failed to write print settings: {}", e)))
    }
}

/// Parse the leading integer of a string the way strtol does, 0 when absent
fn leading_int(s: &str) -> i32 {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_missing_keys() {
        let settings = PrintSettings::new();
        assert_eq!(settings.n_copies(), 1);
        assert_eq!(settings.scale(), 100.0);
        assert_eq!(settings.number_up(), 1);
        assert_eq!(settings.print_pages(), PrintPages::All);
        assert_eq!(settings.page_set(), PageSet::All);
        assert_eq!(settings.number_up_layout(), NumberUpLayout::LeftToRightTopToBottom);
        assert!(settings.page_ranges().is_empty());
        assert_eq!(settings.output_file_format().unwrap(), None);
    }

    #[test]
    fn page_ranges_parse_like_strtol() {
        let mut settings = PrintSettings::new();
        settings.set(PAGE_RANGES, "0-2,5, 7-9");
        assert_eq!(
            settings.page_ranges(),
            vec![
                PageRange { start: 0, end: 2 },
                PageRange { start: 5, end: 5 },
                PageRange { start: 7, end: 9 },
            ]
        );

        settings.set_page_ranges(&[PageRange { start: 1, end: 1 }, PageRange { start: 3, end: 4 }]);
        assert_eq!(settings.get(PAGE_RANGES), Some("1,3-4"));
    }

    #[test]
    fn unknown_output_format_is_rejected() {
        let mut settings = PrintSettings::new();
        settings.set(OUTPUT_FILE_FORMAT, "svg");
        assert!(matches!(
            settings.output_file_format(),
            Err(PrintError::InvalidSetting(_))
        ));

        settings.set_output_file_format(OutputFormat::Ps);
        assert_eq!(settings.output_file_format().unwrap(), Some(OutputFormat::Ps));
    }

    #[test]
    fn number_up_layout_nicks() {
        for (nick, layout) in NumberUpLayout::NICKS {
            assert_eq!(NumberUpLayout::from_nick(nick), Some(layout));
            assert_eq!(layout.nick(), nick);
        }
    }

    #[test]
    fn settings_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = PrintSettings::new();
        settings.set_n_copies(3);
        settings.set_collate(true);
        settings.to_file(&path).unwrap();

        let loaded = PrintSettings::from_file(&path).unwrap();
        assert_eq!(loaded, settings);
        assert!(loaded.collate());
        assert_eq!(loaded.n_copies(), 3);
    }
}
