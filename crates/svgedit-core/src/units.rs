//! Unit-aware lengths.
//!
//! A [`Length`] stores the literal magnitude in its source unit. Conversion
//! to and from absolute pixels is always explicit and depends on where the
//! element sits in the tree: `%` resolves against the nearest ancestor
//! `<svg>` viewport, font-relative units against the element's computed font.

use crate::error::LengthParseError;
use crate::model::{Document, ElementKind};
use crate::syntax::strict_number_text;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use winnow::prelude::*;

// ─── Length ──────────────────────────────────────────────────────────────

/// Length unit. `None` on a [`Length`] means unitless user units (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LengthUnit {
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "ch")]
    Ch,
    #[serde(rename = "cm")]
    Cm,
    #[serde(rename = "em")]
    Em,
    #[serde(rename = "ex")]
    Ex,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "mm")]
    Mm,
    #[serde(rename = "pc")]
    Pc,
    #[serde(rename = "pt")]
    Pt,
    #[serde(rename = "px")]
    Px,
}

impl LengthUnit {
    pub const ALL: [LengthUnit; 10] = [
        LengthUnit::Percent,
        LengthUnit::Ch,
        LengthUnit::Cm,
        LengthUnit::Em,
        LengthUnit::Ex,
        LengthUnit::In,
        LengthUnit::Mm,
        LengthUnit::Pc,
        LengthUnit::Pt,
        LengthUnit::Px,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LengthUnit::Percent => "%",
            LengthUnit::Ch => "ch",
            LengthUnit::Cm => "cm",
            LengthUnit::Em => "em",
            LengthUnit::Ex => "ex",
            LengthUnit::In => "in",
            LengthUnit::Mm => "mm",
            LengthUnit::Pc => "pc",
            LengthUnit::Pt => "pt",
            LengthUnit::Px => "px",
        }
    }

    pub fn from_suffix(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.as_str() == s)
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A number with an optional unit, tagged with the attribute it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub value: f64,
    pub unit: Option<LengthUnit>,
    #[serde(rename = "attrName")]
    pub attr_name: String,
}

impl Length {
    pub fn new(value: f64, unit: Option<LengthUnit>, attr_name: impl Into<String>) -> Self {
        Self {
            value,
            unit,
            attr_name: attr_name.into(),
        }
    }

    /// Unitless user-space length.
    pub fn px(value: f64, attr_name: impl Into<String>) -> Self {
        Self::new(value, None, attr_name)
    }

    /// Parse `<number><unit>?` for the given attribute.
    ///
    /// Accepts `^[+-]?[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?(unit)?$` only.
    pub fn parse(text: &str, attr_name: &str) -> Result<Self, LengthParseError> {
        let invalid = || LengthParseError {
            value: text.to_string(),
        };
        let mut rest = text;
        let number = strict_number_text
            .parse_next(&mut rest)
            .map_err(|_| invalid())?;
        let value = number.parse::<f64>().map_err(|_| invalid())?;
        let unit = if rest.is_empty() {
            None
        } else {
            Some(LengthUnit::from_suffix(rest).ok_or_else(invalid)?)
        };
        Ok(Self::new(value, unit, attr_name))
    }

    /// Format with `places` decimal places, trailing zeros trimmed.
    pub fn to_string_with(&self, places: u32) -> String {
        let mut out = format_number(self.value, places);
        if let Some(unit) = self.unit {
            out.push_str(unit.as_str());
        }
        out
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)?;
        if let Some(unit) = self.unit {
            f.write_str(unit.as_str())?;
        }
        Ok(())
    }
}

/// Round to `places` decimals and print without trailing zeros or `-0`.
pub fn format_number(value: f64, places: u32) -> String {
    let factor = 10f64.powi(places as i32);
    let rounded = (value * factor).round() / factor;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    let text = format!("{rounded:.prec$}", prec = places as usize);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

// ─── Attribute axis ──────────────────────────────────────────────────────

/// Which percentage basis an attribute resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrAxis {
    Horizontal,
    Vertical,
    FontSize,
}

impl AttrAxis {
    pub fn of(attr_name: &str) -> Self {
        match attr_name {
            "width" | "textLength" | "x1" | "x2" => AttrAxis::Horizontal,
            "font-size" => AttrAxis::FontSize,
            name if name == "x" || (name.len() == 2 && name.ends_with('x')) => {
                AttrAxis::Horizontal
            }
            _ => AttrAxis::Vertical,
        }
    }
}

// ─── Fonts & measurement ─────────────────────────────────────────────────

/// Inherited font of an element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedFont {
    pub size_px: f64,
    pub family: String,
    pub weight: String,
    pub style: String,
}

impl Default for ComputedFont {
    fn default() -> Self {
        Self {
            size_px: 16.0,
            family: "sans-serif".into(),
            weight: "normal".into(),
            style: "normal".into(),
        }
    }
}

impl ComputedFont {
    /// CSS `font` shorthand, used as the measurement memo key.
    pub fn css(&self) -> String {
        format!(
            "{} {} {}px {}",
            self.style, self.weight, self.size_px, self.family
        )
    }
}

/// Text box metrics in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: f64,
    pub line_height: f64,
    /// Distance from the top of the line box to the baseline.
    pub baseline: f64,
}

/// Font measurement backend. Font enumeration and real glyph metrics live in
/// the host; the core only needs these numbers.
pub trait FontMetrics {
    /// Pixel length of one `unit` under `font`. Never called with `%`.
    fn unit_px(&self, font: &ComputedFont, unit: LengthUnit) -> f64;

    /// Metrics of a single line of `text` set in `font`.
    fn text_metrics(&self, text: &str, font: &ComputedFont) -> TextMetrics;

    /// Font size whose line height equals `line_height`.
    fn font_size_for_line_height(&self, line_height: f64, font: &ComputedFont) -> f64;
}

/// CSS absolute units exactly, font-relative units and text boxes
/// approximated from the font size.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssFontMetrics;

const LINE_HEIGHT_RATIO: f64 = 1.2;
const BASELINE_RATIO: f64 = 0.8;
const ADVANCE_RATIO: f64 = 0.6;

impl FontMetrics for CssFontMetrics {
    fn unit_px(&self, font: &ComputedFont, unit: LengthUnit) -> f64 {
        match unit {
            LengthUnit::Px | LengthUnit::Percent => 1.0,
            LengthUnit::In => 96.0,
            LengthUnit::Cm => 96.0 / 2.54,
            LengthUnit::Mm => 96.0 / 25.4,
            LengthUnit::Pt => 96.0 / 72.0,
            LengthUnit::Pc => 16.0,
            LengthUnit::Em => font.size_px,
            LengthUnit::Ex | LengthUnit::Ch => font.size_px / 2.0,
        }
    }

    fn text_metrics(&self, text: &str, font: &ComputedFont) -> TextMetrics {
        TextMetrics {
            width: text.chars().count() as f64 * font.size_px * ADVANCE_RATIO,
            line_height: font.size_px * LINE_HEIGHT_RATIO,
            baseline: font.size_px * BASELINE_RATIO,
        }
    }

    fn font_size_for_line_height(&self, line_height: f64, _font: &ComputedFont) -> f64 {
        line_height / LINE_HEIGHT_RATIO
    }
}

/// Memoizing front for a [`FontMetrics`] backend plus the percentage fallback.
///
/// Unit measurement is keyed by (font shorthand, unit); sibling shapes share
/// fonts heavily so the cache hit rate is high.
#[derive(Clone)]
pub struct UnitResolver {
    metrics: Rc<dyn FontMetrics>,
    cache: RefCell<HashMap<(String, LengthUnit), f64>>,
    /// Basis for `%` lengths when no ancestor `<svg>` resolves.
    pub percentage_fallback_px: f64,
}

impl UnitResolver {
    pub fn new(metrics: Rc<dyn FontMetrics>) -> Self {
        Self {
            metrics,
            cache: RefCell::new(HashMap::new()),
            percentage_fallback_px: 400.0,
        }
    }

    pub fn metrics(&self) -> &dyn FontMetrics {
        self.metrics.as_ref()
    }

    /// Pixel length of one `unit`, memoized.
    pub fn measure(&self, font: &ComputedFont, unit: LengthUnit) -> f64 {
        let key = (font.css(), unit);
        if let Some(px) = self.cache.borrow().get(&key) {
            return *px;
        }
        let px = self.metrics.unit_px(font, unit);
        log::trace!("measure miss: 1{} under `{}` = {px}px", unit, key.0);
        self.cache.borrow_mut().insert(key, px);
        px
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl Default for UnitResolver {
    fn default() -> Self {
        Self::new(Rc::new(CssFontMetrics))
    }
}

impl fmt::Debug for UnitResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitResolver")
            .field("cached", &self.cached_entries())
            .field("percentage_fallback_px", &self.percentage_fallback_px)
            .finish()
    }
}

// ─── Conversion ──────────────────────────────────────────────────────────

/// Resolve `length` to pixels in the context of element `at`.
pub fn to_pixels(length: &Length, doc: &Document, at: NodeIndex) -> f64 {
    let axis = AttrAxis::of(&length.attr_name);
    match length.unit {
        None => length.value,
        Some(LengthUnit::Percent) => percentage_basis(doc, at, axis) * length.value / 100.0,
        Some(unit) => length.value * doc.units.measure(&measuring_font(doc, at, axis), unit),
    }
}

/// Express `px` in `target` units in the context of element `at`.
pub fn from_pixels(
    px: f64,
    target: Option<LengthUnit>,
    doc: &Document,
    at: NodeIndex,
    attr_name: &str,
) -> Length {
    let axis = AttrAxis::of(attr_name);
    let value = match target {
        None => px,
        Some(LengthUnit::Percent) => {
            let basis = percentage_basis(doc, at, axis);
            if basis == 0.0 { 100.0 } else { px / basis * 100.0 }
        }
        Some(unit) => {
            let one = doc.units.measure(&measuring_font(doc, at, axis), unit);
            if one == 0.0 { px } else { px / one }
        }
    };
    Length::new(value, target, attr_name)
}

/// `font-size` itself is measured against the parent's font.
fn measuring_font(doc: &Document, at: NodeIndex, axis: AttrAxis) -> ComputedFont {
    match (axis, doc.parent_index(at)) {
        (AttrAxis::FontSize, Some(parent)) => computed_font(doc, parent),
        (AttrAxis::FontSize, None) => ComputedFont::default(),
        _ => computed_font(doc, at),
    }
}

/// Pixel basis for a `%` length on element `at`.
pub fn percentage_basis(doc: &Document, at: NodeIndex, axis: AttrAxis) -> f64 {
    if axis == AttrAxis::FontSize {
        return match doc.parent_index(at) {
            Some(parent) => computed_font(doc, parent).size_px,
            None => ComputedFont::default().size_px,
        };
    }
    let mut cursor = doc.parent_index(at);
    while let Some(idx) = cursor {
        if let ElementKind::Svg(svg) = &doc.element_at(idx).kind {
            let (own, name) = match axis {
                AttrAxis::Horizontal => (&svg.width, "width"),
                _ => (&svg.height, "height"),
            };
            let full = Length::new(100.0, Some(LengthUnit::Percent), name);
            return to_pixels(own.as_ref().unwrap_or(&full), doc, idx);
        }
        cursor = doc.parent_index(idx);
    }
    log::debug!("no ancestor viewport; using {}px percentage basis", doc.units.percentage_fallback_px);
    doc.units.percentage_fallback_px
}

/// Computed font of element `at`, inherited from its ancestors.
pub fn computed_font(doc: &Document, at: NodeIndex) -> ComputedFont {
    let mut font = match doc.parent_index(at) {
        Some(parent) => computed_font(doc, parent),
        None => ComputedFont::default(),
    };
    let Some(pres) = doc.element_at(at).presentation() else {
        return font;
    };
    if let Some(size) = &pres.font_size {
        font.size_px = match size.unit {
            None => size.value,
            Some(LengthUnit::Percent) => font.size_px * size.value / 100.0,
            Some(unit) => size.value * doc.units.measure(&font, unit),
        };
    }
    if let Some(family) = &pres.font_family {
        font.family = family.clone();
    }
    if let Some(weight) = &pres.font_weight {
        font.weight = weight.clone();
    }
    if let Some(style) = &pres.font_style {
        font.style = style.clone();
    }
    font
}
