// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Paper sizes and page setup

use serde::{Deserialize, Serialize};

const POINTS_PER_MM: f64 = 72.0 / 25.4;

/// Page orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
    ReversePortrait,
    ReverseLandscape,
}

impl Orientation {
    pub fn from_nick(nick: &str) -> Option<Self> {
        match nick {
            "portrait" => Some(Self::Portrait),
            "landscape" => Some(Self::Landscape),
            "reverse-portrait" => Some(Self::ReversePortrait),
            "reverse-landscape" => Some(Self::ReverseLandscape),
            _ => None,
        }
    }

    pub fn nick(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
            Self::ReversePortrait => "reverse-portrait",
            Self::ReverseLandscape => "reverse-landscape",
        }
    }

    pub fn is_landscape(&self) -> bool {
        matches!(self, Self::Landscape | Self::ReverseLandscape)
    }
}

/// Margins in points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Margins {
    pub const fn uniform(value: f64) -> Self {
        Self {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }
}

/// A named paper size, stored in millimetres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSize {
    name: String,
    display_name: String,
    width_mm: f64,
    height_mm: f64,
}

/// (name, display name, width mm, height mm)
const STANDARD_SIZES: &[(&str, &str, f64, f64)] = &[
    ("iso_a3", "A3", 297.0, 420.0),
    ("iso_a4", "A4", 210.0, 297.0),
    ("iso_a5", "A5", 148.0, 210.0),
    ("iso_b5", "B5", 176.0, 250.0),
    ("na_letter", "US Letter", 215.9, 279.4),
    ("na_legal", "US Legal", 215.9, 355.6),
    ("na_executive", "Executive", 184.15, 266.7),
];

impl PaperSize {
    pub fn new(name: &str, display_name: &str, width_mm: f64, height_mm: f64) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            width_mm,
            height_mm,
        }
    }

    /// Custom size given in points
    pub fn custom_points(name: &str, width_pt: f64, height_pt: f64) -> Self {
        Self::new(name, name, width_pt / POINTS_PER_MM, height_pt / POINTS_PER_MM)
    }

    /// Look up a standard size by its name ("iso_a4", "na_letter", ...)
    pub fn standard(name: &str) -> Option<Self> {
        STANDARD_SIZES
            .iter()
            .find(|(n, ..)| *n == name)
            .map(|(n, display, w, h)| Self::new(n, display, *w, *h))
    }

    /// All standard sizes, in catalogue order
    pub fn standard_sizes() -> Vec<Self> {
        STANDARD_SIZES
            .iter()
            .map(|(n, display, w, h)| Self::new(n, display, *w, *h))
            .collect()
    }

    pub fn a4() -> Self {
        Self::new("iso_a4", "A4", 210.0, 297.0)
    }

    pub fn letter() -> Self {
        Self::new("na_letter", "US Letter", 215.9, 279.4)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn width_mm(&self) -> f64 {
        self.width_mm
    }

    pub fn height_mm(&self) -> f64 {
        self.height_mm
    }

    pub fn width_points(&self) -> f64 {
        self.width_mm * POINTS_PER_MM
    }

    pub fn height_points(&self) -> f64 {
        self.height_mm * POINTS_PER_MM
    }
}

impl Default for PaperSize {
    fn default() -> Self {
        Self::a4()
    }
}

/// Paper size, orientation and margins of a page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageSetup {
    paper_size: PaperSize,
    orientation: Orientation,
    margins: Margins,
}

impl PageSetup {
    pub fn new(paper_size: PaperSize) -> Self {
        Self {
            paper_size,
            ..Self::default()
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn paper_size(&self) -> &PaperSize {
        &self.paper_size
    }

    pub fn set_paper_size(&mut self, paper_size: PaperSize) {
        self.paper_size = paper_size;
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn margins(&self) -> Margins {
        self.margins
    }

    /// Page size in points with the orientation applied
    pub fn page_size_points(&self) -> (f64, f64) {
        let (w, h) = (self.paper_size.width_points(), self.paper_size.height_points());
        if self.orientation.is_landscape() {
            (h, w)
        } else {
            (w, h)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_is_612_by_792_points() {
        let letter = PaperSize::letter();
        assert!((letter.width_points() - 612.0).abs() < 0.01);
        assert!((letter.height_points() - 792.0).abs() < 0.01);
    }

    #[test]
    fn custom_points_keeps_dimensions() {
        let paper = PaperSize::custom_points("custom", 300.0, 400.0);
        assert!((paper.width_points() - 300.0).abs() < 1e-9);
        assert!((paper.height_points() - 400.0).abs() < 1e-9);
    }

    #[test]
    fn landscape_swaps_page_size() {
        let setup = PageSetup::new(PaperSize::a4()).with_orientation(Orientation::Landscape);
        let (w, h) = setup.page_size_points();
        assert!(w > h);
        assert_eq!(setup.paper_size().name(), "iso_a4");
    }

    #[test]
    fn standard_lookup() {
        assert_eq!(PaperSize::standard("na_legal").unwrap().display_name(), "US Legal");
        assert!(PaperSize::standard("nope").is_none());
        assert_eq!(PaperSize::standard_sizes().len(), 7);
    }
}
