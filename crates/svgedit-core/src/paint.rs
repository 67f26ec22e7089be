//! `fill` / `stroke` / `stop-color` paints.
//!
//! Color syntax is delegated to `svgtypes`; the source notation is remembered
//! in [`PaintFormat`] so an edited document re-emits colors the way the
//! author wrote them.

use crate::error::PaintParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Notation a paint was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaintFormat {
    None,
    CurrentColor,
    Inherit,
    Name,
    Hex,
    Hex3,
    Hex4,
    Hex6,
    Hex8,
    Rgb,
    Prgb,
    Hsl,
}

impl PaintFormat {
    /// Keyword paints carry no color channels.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            PaintFormat::None | PaintFormat::CurrentColor | PaintFormat::Inherit
        )
    }
}

/// A solid paint or one of the keyword paints.
///
/// Keyword paints (`none`, `currentColor`, `inherit`) have all channels zeroed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paint {
    pub format: PaintFormat,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Alpha in `0.0..=1.0`.
    pub a: f64,
    /// Source spelling for [`PaintFormat::Name`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Paint {
    fn keyword(format: PaintFormat) -> Self {
        Self {
            format,
            r: 0,
            g: 0,
            b: 0,
            a: 0.0,
            name: None,
        }
    }

    pub fn none() -> Self {
        Self::keyword(PaintFormat::None)
    }

    pub fn current_color() -> Self {
        Self::keyword(PaintFormat::CurrentColor)
    }

    /// Opaque color in 6-digit hex notation.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            format: PaintFormat::Hex6,
            r,
            g,
            b,
            a: 1.0,
            name: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self, PaintParseError> {
        let trimmed = text.trim();
        let parsed = svgtypes::Paint::from_str(trimmed)
            .map_err(|_| PaintParseError::Invalid(trimmed.to_string()))?;
        match parsed {
            svgtypes::Paint::None => Ok(Self::none()),
            svgtypes::Paint::CurrentColor => Ok(Self::current_color()),
            svgtypes::Paint::Inherit => Ok(Self::keyword(PaintFormat::Inherit)),
            svgtypes::Paint::FuncIRI(..) => Err(PaintParseError::PaintServer(trimmed.to_string())),
            svgtypes::Paint::Color(color) => {
                let format = detect_format(trimmed)
                    .ok_or_else(|| PaintParseError::Invalid(trimmed.to_string()))?;
                Ok(Self {
                    format,
                    r: color.red,
                    g: color.green,
                    b: color.blue,
                    a: f64::from(color.alpha) / 255.0,
                    name: (format == PaintFormat::Name).then(|| trimmed.to_string()),
                })
            }
        }
    }

    fn alpha_byte(&self) -> u8 {
        (self.a.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    fn hex6(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn hex8(&self) -> String {
        format!("{}{:02x}", self.hex6(), self.alpha_byte())
    }

    fn rgb_string(&self) -> String {
        if self.a >= 1.0 {
            format!("rgb({}, {}, {})", self.r, self.g, self.b)
        } else {
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha_text(self.a))
        }
    }

    fn prgb_string(&self) -> String {
        let pct = |c: u8| (f64::from(c) / 255.0 * 100.0).round();
        if self.a >= 1.0 {
            format!("rgb({}%, {}%, {}%)", pct(self.r), pct(self.g), pct(self.b))
        } else {
            format!(
                "rgba({}%, {}%, {}%, {})",
                pct(self.r),
                pct(self.g),
                pct(self.b),
                alpha_text(self.a)
            )
        }
    }

    fn hsl_string(&self) -> String {
        let (h, s, l) = rgb_to_hsl(self.r, self.g, self.b);
        let (h, s, l) = (h.round(), (s * 100.0).round(), (l * 100.0).round());
        if self.a >= 1.0 {
            format!("hsl({h}, {s}%, {l}%)")
        } else {
            format!("hsla({h}, {s}%, {l}%, {})", alpha_text(self.a))
        }
    }
}

impl fmt::Display for Paint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format {
            PaintFormat::None => f.write_str("none"),
            PaintFormat::CurrentColor => f.write_str("currentColor"),
            PaintFormat::Inherit => f.write_str("inherit"),
            PaintFormat::Name => match &self.name {
                Some(name) => f.write_str(name),
                None => f.write_str(&self.hex6()),
            },
            PaintFormat::Hex | PaintFormat::Hex6 => f.write_str(&self.hex6()),
            PaintFormat::Hex3 => match short_hex(&[self.r, self.g, self.b]) {
                Some(short) => f.write_str(&short),
                None => f.write_str(&self.hex6()),
            },
            PaintFormat::Hex4 => match short_hex(&[self.r, self.g, self.b, self.alpha_byte()]) {
                Some(short) => f.write_str(&short),
                None => f.write_str(&self.hex8()),
            },
            PaintFormat::Hex8 => f.write_str(&self.hex8()),
            PaintFormat::Rgb => f.write_str(&self.rgb_string()),
            PaintFormat::Prgb => f.write_str(&self.prgb_string()),
            PaintFormat::Hsl => f.write_str(&self.hsl_string()),
        }
    }
}

fn detect_format(text: &str) -> Option<PaintFormat> {
    let lower = text.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix('#') {
        return match hex.len() {
            3 => Some(PaintFormat::Hex3),
            4 => Some(PaintFormat::Hex4),
            6 => Some(PaintFormat::Hex6),
            8 => Some(PaintFormat::Hex8),
            _ => None,
        };
    }
    if lower.starts_with("rgb") {
        return Some(if lower.contains('%') {
            PaintFormat::Prgb
        } else {
            PaintFormat::Rgb
        });
    }
    if lower.starts_with("hsl") {
        return Some(PaintFormat::Hsl);
    }
    Some(PaintFormat::Name)
}

/// `#rgb` / `#rgba` when every channel has identical nibbles.
fn short_hex(channels: &[u8]) -> Option<String> {
    let mut out = String::from("#");
    for c in channels {
        if c >> 4 != c & 0x0f {
            return None;
        }
        out.push_str(&format!("{:x}", c & 0x0f));
    }
    Some(out)
}

fn alpha_text(a: f64) -> String {
    let rounded = (a * 100.0).round() / 100.0;
    format!("{rounded}")
}

/// Hue in degrees, saturation and lightness in `0.0..=1.0`.
fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
    );
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if max == min {
        return (0.0, 0.0, l);
    }
    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h * 60.0, s, l)
}
