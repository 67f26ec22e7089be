//! Transform descriptors and tree-wide matrix composition.
//!
//! A [`Transform`] keeps the decomposed operations of a `transform` attribute
//! next to their resolved matrices. Composition down the tree happens in
//! [`all_transform`]: ancestors first, then the element's own local matrix.

use crate::error::{NumberListError, TransformParseError};
use crate::model::{Document, ElementKind};
use crate::syntax::{number, number_list, skip_comma_wsp, skip_wsp};
use crate::units::{Length, LengthUnit, format_number, to_pixels};
use kurbo::{Affine, Point, Vec2};
use petgraph::graph::NodeIndex;
use std::fmt;
use std::str::FromStr;
use winnow::prelude::*;

const EPSILON: f64 = 1e-9;

// ─── Descriptors ─────────────────────────────────────────────────────────

/// One editable operation of a transform list. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformDescriptor {
    Matrix([f64; 6]),
    Translate { tx: f64, ty: f64 },
    Scale { sx: f64, sy: f64 },
    Rotate { angle: f64, cx: f64, cy: f64 },
    SkewX { angle: f64 },
    SkewY { angle: f64 },
}

impl TransformDescriptor {
    pub fn to_affine(&self) -> Affine {
        match *self {
            TransformDescriptor::Matrix(m) => Affine::new(m),
            TransformDescriptor::Translate { tx, ty } => Affine::translate((tx, ty)),
            TransformDescriptor::Scale { sx, sy } => Affine::scale_non_uniform(sx, sy),
            TransformDescriptor::Rotate { angle, cx, cy } => {
                Affine::rotate_about(angle.to_radians(), Point::new(cx, cy))
            }
            TransformDescriptor::SkewX { angle } => Affine::skew(angle.to_radians().tan(), 0.0),
            TransformDescriptor::SkewY { angle } => Affine::skew(0.0, angle.to_radians().tan()),
        }
    }

    fn write_with(&self, out: &mut String, fmt_num: &dyn Fn(f64) -> String) {
        let join = |nums: &[f64]| {
            nums.iter()
                .map(|n| fmt_num(*n))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let text = match *self {
            TransformDescriptor::Matrix(m) => format!("matrix({})", join(&m)),
            TransformDescriptor::Translate { tx, ty } => format!("translate({})", join(&[tx, ty])),
            TransformDescriptor::Scale { sx, sy } => format!("scale({})", join(&[sx, sy])),
            TransformDescriptor::Rotate { angle, cx, cy } if cx == 0.0 && cy == 0.0 => {
                format!("rotate({})", join(&[angle]))
            }
            TransformDescriptor::Rotate { angle, cx, cy } => {
                format!("rotate({})", join(&[angle, cx, cy]))
            }
            TransformDescriptor::SkewX { angle } => format!("skewX({})", join(&[angle])),
            TransformDescriptor::SkewY { angle } => format!("skewY({})", join(&[angle])),
        };
        out.push_str(&text);
    }
}

// ─── Transform ───────────────────────────────────────────────────────────

/// A transform list: descriptors with their resolved matrices, kept parallel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transform {
    descriptors: Vec<TransformDescriptor>,
    matrices: Vec<Affine>,
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = TransformDescriptor>) -> Self {
        let mut t = Self::new();
        for d in descriptors {
            t.push(d);
        }
        t
    }

    pub fn descriptors(&self) -> &[TransformDescriptor] {
        &self.descriptors
    }

    pub fn matrices(&self) -> &[Affine] {
        &self.matrices
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Append without merging.
    pub fn push(&mut self, descriptor: TransformDescriptor) {
        self.matrices.push(descriptor.to_affine());
        self.descriptors.push(descriptor);
    }

    /// Append, folding a rotation into a trailing rotation about the same
    /// center.
    pub fn append(&mut self, descriptor: TransformDescriptor) {
        if let (
            TransformDescriptor::Rotate { angle, cx, cy },
            Some(TransformDescriptor::Rotate {
                angle: last,
                cx: lx,
                cy: ly,
            }),
        ) = (descriptor, self.descriptors.last().copied())
            && (cx - lx).abs() < EPSILON
            && (cy - ly).abs() < EPSILON
        {
            let merged = TransformDescriptor::Rotate {
                angle: last + angle,
                cx,
                cy,
            };
            self.descriptors.pop();
            self.matrices.pop();
            self.push(merged);
            return;
        }
        self.push(descriptor);
    }

    /// Product of the list, first descriptor outermost.
    pub fn matrix(&self) -> Affine {
        self.matrices
            .iter()
            .fold(Affine::IDENTITY, |acc, m| acc * *m)
    }

    /// Collapse into a single `matrix(...)` descriptor, or `None` when the
    /// product is the identity.
    pub fn collect(&self) -> Option<Transform> {
        let m = self.matrix();
        if is_identity(m) {
            return None;
        }
        Some(Transform::from_descriptors([TransformDescriptor::Matrix(
            m.as_coeffs(),
        )]))
    }

    /// Serialize with every number rounded to `places` decimals.
    pub fn to_string_with(&self, places: u32) -> String {
        let fmt_num = |v: f64| format_number(v, places);
        self.join(&fmt_num)
    }

    fn join(&self, fmt_num: &dyn Fn(f64) -> String) -> String {
        let mut out = String::new();
        for (i, d) in self.descriptors.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            d.write_with(&mut out, fmt_num);
        }
        out
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_num = |v: f64| format!("{v}");
        f.write_str(&self.join(&fmt_num))
    }
}

impl FromStr for Transform {
    type Err = TransformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_transform_list(s)
    }
}

pub fn is_identity(m: Affine) -> bool {
    m.as_coeffs()
        .iter()
        .zip(Affine::IDENTITY.as_coeffs())
        .all(|(a, b)| (a - b).abs() < EPSILON)
}

// ─── Parser ──────────────────────────────────────────────────────────────

/// Parse a `transform` attribute value.
pub fn parse_transform_list(text: &str) -> Result<Transform, TransformParseError> {
    let err = |rest: &str, message: String| TransformParseError {
        offset: text.len() - rest.len(),
        message,
    };
    let mut rest = text;
    let mut transform = Transform::new();
    skip_wsp(&mut rest);

    while !rest.is_empty() {
        let name_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let name = &rest[..name_len];
        if name.is_empty() {
            return Err(err(rest, "expected a transform function".into()));
        }
        let at_name = rest;
        rest = &rest[name_len..];
        skip_wsp(&mut rest);
        let Some(after_paren) = rest.strip_prefix('(') else {
            return Err(err(rest, format!("expected `(` after `{name}`")));
        };
        rest = after_paren;
        skip_wsp(&mut rest);

        let mut args: Vec<f64> = Vec::with_capacity(6);
        while !rest.starts_with(')') {
            if !args.is_empty() {
                skip_comma_wsp(&mut rest);
            }
            match number.parse_next(&mut rest) {
                Ok(n) => args.push(n),
                Err(_) => return Err(err(rest, format!("invalid argument to `{name}`"))),
            }
            skip_wsp(&mut rest);
        }
        rest = &rest[1..];

        let descriptor = match (name, args.as_slice()) {
            ("matrix", &[a, b, c, d, e, f]) => TransformDescriptor::Matrix([a, b, c, d, e, f]),
            ("translate", &[tx]) => TransformDescriptor::Translate { tx, ty: 0.0 },
            ("translate", &[tx, ty]) => TransformDescriptor::Translate { tx, ty },
            ("scale", &[s]) => TransformDescriptor::Scale { sx: s, sy: s },
            ("scale", &[sx, sy]) => TransformDescriptor::Scale { sx, sy },
            ("rotate", &[angle]) => TransformDescriptor::Rotate {
                angle,
                cx: 0.0,
                cy: 0.0,
            },
            ("rotate", &[angle, cx, cy]) => TransformDescriptor::Rotate { angle, cx, cy },
            ("skewX", &[angle]) => TransformDescriptor::SkewX { angle },
            ("skewY", &[angle]) => TransformDescriptor::SkewY { angle },
            ("matrix" | "translate" | "scale" | "rotate" | "skewX" | "skewY", _) => {
                return Err(err(
                    at_name,
                    format!("`{name}` does not take {} arguments", args.len()),
                ));
            }
            _ => return Err(err(at_name, format!("unknown transform function `{name}`"))),
        };
        transform.push(descriptor);
        skip_comma_wsp(&mut rest);
    }
    Ok(transform)
}

// ─── viewBox ─────────────────────────────────────────────────────────────

/// `viewBox="min-x min-y width height"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    pub fn parse(text: &str) -> Result<Self, NumberListError> {
        let invalid = |message: &str| NumberListError {
            value: text.to_string(),
            message: message.to_string(),
        };
        let nums = number_list(text).map_err(|_| invalid("expected four numbers"))?;
        let &[min_x, min_y, width, height] = nums.as_slice() else {
            return Err(invalid("expected four numbers"));
        };
        if width < 0.0 || height < 0.0 {
            return Err(invalid("width and height must not be negative"));
        }
        Ok(Self {
            min_x,
            min_y,
            width,
            height,
        })
    }

    pub fn to_string_with(&self, places: u32) -> String {
        [self.min_x, self.min_y, self.width, self.height]
            .iter()
            .map(|n| format_number(*n, places))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ViewBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.min_x, self.min_y, self.width, self.height
        )
    }
}

/// Map `view_box` into a `width` × `height` viewport, uniformly scaled and
/// centered on the axis with slack. Degenerate sizes give the identity.
pub fn view_box_fit(width: f64, height: f64, view_box: &ViewBox) -> Affine {
    if width == 0.0 || height == 0.0 || view_box.width == 0.0 || view_box.height == 0.0 {
        return Affine::IDENTITY;
    }
    let s = (width / view_box.width).min(height / view_box.height);
    let slack = Vec2::new(
        (width - view_box.width * s) / 2.0,
        (height - view_box.height * s) / 2.0,
    );
    Affine::translate(slack)
        * Affine::scale(s)
        * Affine::translate((-view_box.min_x, -view_box.min_y))
}

// ─── Tree composition ────────────────────────────────────────────────────

/// Matrix from the element's coordinate space to its parent's.
pub fn local_transform(doc: &Document, idx: NodeIndex) -> Affine {
    let element = doc.element_at(idx);
    match &element.kind {
        ElementKind::Svg(svg) => {
            let full = |name: &str| Length::new(100.0, Some(LengthUnit::Percent), name);
            let fit = match &svg.view_box {
                Some(view_box) => {
                    let w = to_pixels(svg.width.as_ref().unwrap_or(&full("width")), doc, idx);
                    let h = to_pixels(svg.height.as_ref().unwrap_or(&full("height")), doc, idx);
                    view_box_fit(w, h, view_box)
                }
                None => Affine::IDENTITY,
            };
            // The outermost viewport ignores its own x/y.
            if doc.parent_index(idx).is_none() {
                return fit;
            }
            let px = |l: &Option<Length>| l.as_ref().map_or(0.0, |l| to_pixels(l, doc, idx));
            Affine::translate((px(&svg.x), px(&svg.y))) * fit
        }
        _ => element
            .presentation()
            .and_then(|p| p.transform.as_ref())
            .map_or(Affine::IDENTITY, Transform::matrix),
    }
}

/// Matrix from the element's coordinate space to the document root's
/// parent space.
pub fn all_transform(doc: &Document, idx: NodeIndex) -> Affine {
    let mut chain = vec![idx];
    let mut cursor = doc.parent_index(idx);
    while let Some(parent) = cursor {
        chain.push(parent);
        cursor = doc.parent_index(parent);
    }
    let m = chain
        .iter()
        .rev()
        .fold(Affine::IDENTITY, |acc, i| acc * local_transform(doc, *i));
    log::trace!("all_transform({idx:?}) = {:?}", m.as_coeffs());
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn close(a: Point, b: Point) -> bool {
        (a - b).hypot() < 1e-9
    }

    #[test]
    fn parse_and_display() {
        let t: Transform = "translate(10,20) rotate(45 5 5)scale(2)".parse().unwrap();
        assert_eq!(t.descriptors().len(), 3);
        assert_eq!(t.matrices().len(), 3);
        assert_eq!(t.to_string(), "translate(10 20) rotate(45 5 5) scale(2 2)");
    }

    #[test]
    fn parse_errors() {
        assert!(parse_transform_list("translate(1 2 3)").is_err());
        assert!(parse_transform_list("spin(10)").is_err());
        assert!(parse_transform_list("rotate(10").is_err());
        assert!(parse_transform_list("").unwrap().is_empty());
    }

    #[test]
    fn composition_order() {
        let t: Transform = "translate(100 0) scale(2)".parse().unwrap();
        assert!(close(t.matrix() * Point::new(1.0, 1.0), Point::new(102.0, 2.0)));
    }

    #[test]
    fn append_merges_same_center_rotations() {
        let mut t = Transform::new();
        t.append(TransformDescriptor::Rotate { angle: 10.0, cx: 5.0, cy: 5.0 });
        t.append(TransformDescriptor::Rotate { angle: 20.0, cx: 5.0, cy: 5.0 });
        assert_eq!(
            t.descriptors(),
            &[TransformDescriptor::Rotate { angle: 30.0, cx: 5.0, cy: 5.0 }]
        );
        t.append(TransformDescriptor::Rotate { angle: 5.0, cx: 0.0, cy: 0.0 });
        assert_eq!(t.descriptors().len(), 2);
        assert_eq!(t.matrices().len(), 2);
    }

    #[test]
    fn collect_to_single_matrix() {
        let t: Transform = "translate(10 0) translate(-10 0)".parse().unwrap();
        assert!(t.collect().is_none());

        let t: Transform = "translate(10 0) scale(2)".parse().unwrap();
        let collected = t.collect().unwrap();
        assert_eq!(collected.to_string(), "matrix(2 0 0 2 10 0)");
    }

    #[test]
    fn rotate_about_center() {
        let t: Transform = "rotate(90 10 10)".parse().unwrap();
        assert!(close(t.matrix() * Point::new(20.0, 10.0), Point::new(10.0, 20.0)));
    }

    #[test]
    fn view_box_meet_centering() {
        let vb = ViewBox::parse("0 0 50 100").unwrap();
        let m = view_box_fit(200.0, 100.0, &vb);
        assert!(close(m * Point::new(0.0, 0.0), Point::new(75.0, 0.0)));
        assert!(close(m * Point::new(50.0, 100.0), Point::new(125.0, 100.0)));

        let vb = ViewBox::parse("10,10,20,20").unwrap();
        let m = view_box_fit(100.0, 100.0, &vb);
        assert!(close(m * Point::new(10.0, 10.0), Point::new(0.0, 0.0)));
        assert!(close(m * Point::new(30.0, 30.0), Point::new(100.0, 100.0)));
    }

    #[test]
    fn degenerate_view_box_is_identity() {
        let vb = ViewBox::parse("0 0 0 10").unwrap();
        assert_eq!(view_box_fit(100.0, 100.0, &vb), Affine::IDENTITY);
        assert!(ViewBox::parse("0 0 -1 10").is_err());
        assert!(ViewBox::parse("0 0 10").is_err());
    }
}
