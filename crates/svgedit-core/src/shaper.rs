//! Uniform geometry over heterogeneous element kinds.
//!
//! [`Shape`] is the one contract every interaction goes through. [`Shaper`]
//! implements it for a single element by dispatching on its kind;
//! [`MultiShaper`] implements it for a set of siblings. Positions and sizes
//! are pixels in the element's own coordinate space (before its
//! `transform`); lengths are written back in the unit they already had.

use crate::error::ShapeError;
use crate::id::ElementId;
use crate::model::*;
use crate::path::PathData;
use crate::transform::{Transform, TransformDescriptor, all_transform, is_identity, local_transform};
use crate::units::{Length, TextMetrics, computed_font, from_pixels, to_pixels};
use kurbo::{Affine, Point, Rect, Vec2};
use petgraph::graph::NodeIndex;

const EPSILON: f64 = 1e-9;

/// Geometry operations shared by every shape kind and by multi-selections.
pub trait Shape {
    fn center(&self) -> Result<Point, ShapeError>;
    fn set_center(&mut self, center: Point) -> Result<(), ShapeError>;
    fn size(&self) -> Result<Vec2, ShapeError>;
    /// Resize keeping the center.
    fn set_size(&mut self, size: Vec2) -> Result<(), ShapeError>;
    fn move_by(&mut self, delta: Vec2) -> Result<(), ShapeError>;
    /// Append a rotation about the current center, in degrees.
    fn rotate(&mut self, degrees: f64) -> Result<(), ShapeError>;
    /// Local matrix into the parent's coordinate space.
    fn transform(&self) -> Result<Affine, ShapeError>;
    fn set_transform(&mut self, matrix: Affine) -> Result<(), ShapeError>;
    /// Matrix into root space.
    fn all_transform(&self) -> Result<Affine, ShapeError>;

    fn left_top(&self) -> Result<Point, ShapeError> {
        Ok(self.center()? - self.size()? / 2.0)
    }

    fn set_left_top(&mut self, left_top: Point) -> Result<(), ShapeError> {
        let size = self.size()?;
        self.set_center(left_top + size / 2.0)
    }

    /// Resize to `new_size` keeping the side nearest `fixed` in place.
    fn size2(&mut self, new_size: Vec2, fixed: Point) -> Result<(), ShapeError> {
        let old = self.size()?;
        let center = self.center()?;
        self.set_size(new_size)?;
        let side = |v: f64| if v > 0.0 { 1.0 } else { -1.0 };
        let half = (old - new_size) / 2.0;
        self.move_by(Vec2::new(
            half.x * side(fixed.x - center.x),
            half.y * side(fixed.y - center.y),
        ))
    }
}

// ─── Read-only geometry ──────────────────────────────────────────────────

fn not_geometric(kind: &ElementKind) -> ShapeError {
    match kind {
        ElementKind::Unknown(u) => ShapeError::UnknownElement { tag: u.tag.clone() },
        other => ShapeError::NotGeometric {
            tag: other.tag_name().to_string(),
        },
    }
}

pub fn is_geometric(kind: &ElementKind) -> bool {
    matches!(
        kind,
        ElementKind::Svg(_)
            | ElementKind::Rect(_)
            | ElementKind::Circle(_)
            | ElementKind::Ellipse(_)
            | ElementKind::Polyline(_)
            | ElementKind::Polygon(_)
            | ElementKind::Path(_)
            | ElementKind::Text(_)
            | ElementKind::G
            | ElementKind::Image(_)
    )
}

fn px(doc: &Document, idx: NodeIndex, length: &Option<Length>) -> f64 {
    length.as_ref().map_or(0.0, |l| to_pixels(l, doc, idx))
}

/// Express `value` pixels in the unit `old` was written in.
fn from_px(doc: &Document, idx: NodeIndex, old: &Option<Length>, name: &str, value: f64) -> Length {
    match old {
        Some(l) => from_pixels(value, l.unit, doc, idx, name),
        None => Length::px(value, name),
    }
}

fn position_attrs(kind: &ElementKind) -> Option<(&Option<Length>, &Option<Length>, [&'static str; 2])> {
    match kind {
        ElementKind::Svg(SvgAttrs { x, y, .. })
        | ElementKind::Rect(RectAttrs { x, y, .. })
        | ElementKind::Image(ImageAttrs { x, y, .. })
        | ElementKind::Text(TextAttrs { x, y, .. }) => Some((x, y, ["x", "y"])),
        ElementKind::Circle(CircleAttrs { cx, cy, .. })
        | ElementKind::Ellipse(EllipseAttrs { cx, cy, .. }) => Some((cx, cy, ["cx", "cy"])),
        _ => None,
    }
}

fn position_attrs_mut(kind: &mut ElementKind) -> Option<(&mut Option<Length>, &mut Option<Length>)> {
    match kind {
        ElementKind::Svg(SvgAttrs { x, y, .. })
        | ElementKind::Rect(RectAttrs { x, y, .. })
        | ElementKind::Image(ImageAttrs { x, y, .. })
        | ElementKind::Text(TextAttrs { x, y, .. })
        | ElementKind::Circle(CircleAttrs { cx: x, cy: y, .. })
        | ElementKind::Ellipse(EllipseAttrs { cx: x, cy: y, .. }) => Some((x, y)),
        _ => None,
    }
}

fn bbox_of_points(points: &[Point]) -> Rect {
    match points.first() {
        Some(first) => points
            .iter()
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p)),
        None => Rect::ZERO,
    }
}

fn path_bbox(d: &Option<PathData>) -> Rect {
    d.as_ref().and_then(PathData::bbox).unwrap_or(Rect::ZERO)
}

fn text_metrics(doc: &Document, idx: NodeIndex, text: &TextAttrs) -> TextMetrics {
    doc.units.metrics().text_metrics(
        text.content.as_deref().unwrap_or_default(),
        &computed_font(doc, idx),
    )
}

fn ratio(new: Vec2, old: Vec2) -> Vec2 {
    let axis = |n: f64, o: f64| if o.abs() < EPSILON { 1.0 } else { n / o };
    Vec2::new(axis(new.x, old.x), axis(new.y, old.y))
}

fn center_of(doc: &Document, idx: NodeIndex) -> Result<Point, ShapeError> {
    let kind = &doc.element_at(idx).kind;
    match kind {
        ElementKind::Svg(SvgAttrs { x, y, width, height, .. })
        | ElementKind::Rect(RectAttrs { x, y, width, height, .. })
        | ElementKind::Image(ImageAttrs { x, y, width, height, .. }) => Ok(Point::new(
            px(doc, idx, x) + px(doc, idx, width) / 2.0,
            px(doc, idx, y) + px(doc, idx, height) / 2.0,
        )),
        ElementKind::Circle(CircleAttrs { cx, cy, .. })
        | ElementKind::Ellipse(EllipseAttrs { cx, cy, .. }) => {
            Ok(Point::new(px(doc, idx, cx), px(doc, idx, cy)))
        }
        ElementKind::Polyline(p) | ElementKind::Polygon(p) => {
            Ok(bbox_of_points(p.points.as_deref().unwrap_or_default()).center())
        }
        ElementKind::Path(p) => Ok(path_bbox(&p.d).center()),
        ElementKind::Text(t) => {
            let size = size_of(doc, idx)?;
            let baseline = text_metrics(doc, idx, t).baseline;
            Ok(Point::new(
                px(doc, idx, &t.x) + size.x / 2.0,
                px(doc, idx, &t.y) - baseline + size.y / 2.0,
            ))
        }
        ElementKind::G => Ok(aggregate_bbox(doc, &geometric_children(doc, idx))?.center()),
        other => Err(not_geometric(other)),
    }
}

fn size_of(doc: &Document, idx: NodeIndex) -> Result<Vec2, ShapeError> {
    let kind = &doc.element_at(idx).kind;
    match kind {
        ElementKind::Svg(SvgAttrs { width, height, .. })
        | ElementKind::Rect(RectAttrs { width, height, .. })
        | ElementKind::Image(ImageAttrs { width, height, .. }) => {
            Ok(Vec2::new(px(doc, idx, width), px(doc, idx, height)))
        }
        ElementKind::Circle(c) => {
            let d = px(doc, idx, &c.r) * 2.0;
            Ok(Vec2::new(d, d))
        }
        ElementKind::Ellipse(e) => Ok(Vec2::new(
            px(doc, idx, &e.rx) * 2.0,
            px(doc, idx, &e.ry) * 2.0,
        )),
        ElementKind::Polyline(p) | ElementKind::Polygon(p) => Ok(bbox_of_points(
            p.points.as_deref().unwrap_or_default(),
        )
        .size()
        .to_vec2()),
        ElementKind::Path(p) => Ok(path_bbox(&p.d).size().to_vec2()),
        ElementKind::Text(t) => {
            let metrics = text_metrics(doc, idx, t);
            let width = match &t.text_length {
                Some(_) => px(doc, idx, &t.text_length),
                None => metrics.width,
            };
            Ok(Vec2::new(width, metrics.line_height))
        }
        ElementKind::G => Ok(aggregate_bbox(doc, &geometric_children(doc, idx))?
            .size()
            .to_vec2()),
        other => Err(not_geometric(other)),
    }
}

fn transform_of(doc: &Document, idx: NodeIndex) -> Result<Affine, ShapeError> {
    let element = doc.element_at(idx);
    match &element.kind {
        ElementKind::Svg(_) => Ok(local_transform(doc, idx)),
        kind if kind.is_transformable() => Ok(element
            .pres
            .transform
            .as_ref()
            .map_or(Affine::IDENTITY, Transform::matrix)),
        other => Err(not_geometric(other)),
    }
}

/// Matrix placing the element's geometry in its parent's space. A nested
/// `<svg>` is positioned by its own x/y/width/height, so it has none.
fn outer_transform(doc: &Document, idx: NodeIndex) -> Result<Affine, ShapeError> {
    match doc.element_at(idx).kind {
        ElementKind::Svg(_) => Ok(Affine::IDENTITY),
        _ => transform_of(doc, idx),
    }
}

/// Children that carry geometry; metadata and unknown markup are skipped.
fn geometric_children(doc: &Document, idx: NodeIndex) -> Vec<NodeIndex> {
    doc.children(idx)
        .into_iter()
        .filter(|c| is_geometric(&doc.element_at(*c).kind))
        .collect()
}

/// Bounding box of the members' corners in their common parent's space.
fn aggregate_bbox(doc: &Document, members: &[NodeIndex]) -> Result<Rect, ShapeError> {
    let mut bbox: Option<Rect> = None;
    for &member in members {
        let size = size_of(doc, member)?;
        let lt = center_of(doc, member)? - size / 2.0;
        let outer = outer_transform(doc, member)?;
        for corner in [
            lt,
            lt + Vec2::new(size.x, 0.0),
            lt + Vec2::new(0.0, size.y),
            lt + size,
        ] {
            let p = outer * corner;
            bbox = Some(match bbox {
                Some(r) => r.union_pt(p),
                None => Rect::from_points(p, p),
            });
        }
    }
    Ok(bbox.unwrap_or(Rect::ZERO))
}

// ─── Member distribution (groups and multi-selections) ───────────────────

fn move_members(doc: &mut Document, members: &[NodeIndex], delta: Vec2) -> Result<(), ShapeError> {
    let old = aggregate_bbox(doc, members)?.center();
    let new = old + delta;
    for &member in members {
        let inverse = outer_transform(doc, member)?.inverse();
        let local_delta = (inverse * new) - (inverse * old);
        Shaper::at(doc, member).move_by(local_delta)?;
    }
    Ok(())
}

/// Scale the members about their common center by the ratio of `size` to
/// the aggregate size, in the parent's space.
///
/// In a member's own space the scale reads `outer⁻¹ · S · outer`. When that
/// stays axis-aligned it is applied to the member's geometry; otherwise the
/// scale is prepended to the member's transform.
fn resize_members(doc: &mut Document, members: &[NodeIndex], size: Vec2) -> Result<(), ShapeError> {
    let bbox = aggregate_bbox(doc, members)?;
    let center = bbox.center().to_vec2();
    let r = ratio(size, bbox.size().to_vec2());
    let scale = Affine::translate(center) * Affine::scale_non_uniform(r.x, r.y) * Affine::translate(-center);
    for &member in members {
        let outer = outer_transform(doc, member)?;
        let local = outer.inverse() * scale * outer;
        let [a, b, c, d, _, _] = local.as_coeffs();
        if b.abs() < EPSILON && c.abs() < EPSILON {
            let target = local * center_of(doc, member)?;
            let old_size = size_of(doc, member)?;
            let mut shaper = Shaper::at(doc, member);
            shaper.set_size(Vec2::new(old_size.x * a.abs(), old_size.y * d.abs()))?;
            shaper.set_center(target)?;
        } else {
            log::debug!("resize: skewed member {member:?}, scaling its transform");
            let element = doc.element_at_mut(member);
            let existing = element.pres.transform.take().unwrap_or_default();
            element.pres.transform = Some(Transform::from_descriptors(
                std::iter::once(TransformDescriptor::Matrix(scale.as_coeffs()))
                    .chain(existing.descriptors().iter().copied()),
            ));
        }
    }
    Ok(())
}

// ─── Single element ──────────────────────────────────────────────────────

/// [`Shape`] over one element.
pub struct Shaper<'a> {
    doc: &'a mut Document,
    idx: NodeIndex,
}

impl<'a> Shaper<'a> {
    pub fn new(doc: &'a mut Document, id: ElementId) -> Result<Self, ShapeError> {
        let idx = doc.index_of(id).ok_or(ShapeError::MissingElement(id))?;
        Ok(Self { doc, idx })
    }

    pub fn at(doc: &'a mut Document, idx: NodeIndex) -> Self {
        Self { doc, idx }
    }

    pub fn index(&self) -> NodeIndex {
        self.idx
    }

    fn element_mut(&mut self) -> &mut Element {
        self.doc.element_at_mut(self.idx)
    }

    fn write_position(&mut self, nx: Length, ny: Length) {
        if let Some((x, y)) = position_attrs_mut(&mut self.element_mut().kind) {
            *x = Some(nx);
            *y = Some(ny);
        }
    }

    /// Collapse the transform list into one matrix, dropping it when it is
    /// the identity. No-op for kinds without a `transform` attribute.
    pub fn collect_transform(&mut self) {
        let element = self.element_mut();
        if element.kind.is_transformable() {
            element.pres.transform = element.pres.transform.as_ref().and_then(Transform::collect);
        }
    }
}

impl Shape for Shaper<'_> {
    fn center(&self) -> Result<Point, ShapeError> {
        center_of(self.doc, self.idx)
    }

    fn size(&self) -> Result<Vec2, ShapeError> {
        size_of(self.doc, self.idx)
    }

    fn transform(&self) -> Result<Affine, ShapeError> {
        transform_of(self.doc, self.idx)
    }

    fn all_transform(&self) -> Result<Affine, ShapeError> {
        let kind = &self.doc.element_at(self.idx).kind;
        if !is_geometric(kind) {
            return Err(not_geometric(kind));
        }
        Ok(all_transform(self.doc, self.idx))
    }

    fn set_center(&mut self, center: Point) -> Result<(), ShapeError> {
        let (doc, idx) = (&*self.doc, self.idx);
        let kind = &doc.element_at(idx).kind;
        let position = match kind {
            ElementKind::Svg(SvgAttrs { x, y, width, height, .. })
            | ElementKind::Rect(RectAttrs { x, y, width, height, .. })
            | ElementKind::Image(ImageAttrs { x, y, width, height, .. }) => Some((
                from_px(doc, idx, x, "x", center.x - px(doc, idx, width) / 2.0),
                from_px(doc, idx, y, "y", center.y - px(doc, idx, height) / 2.0),
            )),
            ElementKind::Circle(CircleAttrs { cx, cy, .. })
            | ElementKind::Ellipse(EllipseAttrs { cx, cy, .. }) => Some((
                from_px(doc, idx, cx, "cx", center.x),
                from_px(doc, idx, cy, "cy", center.y),
            )),
            kind if is_geometric(kind) => None,
            other => return Err(not_geometric(other)),
        };
        match position {
            Some((nx, ny)) => {
                self.write_position(nx, ny);
                Ok(())
            }
            None => {
                let old = self.center()?;
                self.move_by(center - old)
            }
        }
    }

    fn move_by(&mut self, delta: Vec2) -> Result<(), ShapeError> {
        let (doc, idx) = (&*self.doc, self.idx);
        let kind = &doc.element_at(idx).kind;
        if let Some((x, y, [x_name, y_name])) = position_attrs(kind) {
            let nx = from_px(doc, idx, x, x_name, px(doc, idx, x) + delta.x);
            let ny = from_px(doc, idx, y, y_name, px(doc, idx, y) + delta.y);
            self.write_position(nx, ny);
            return Ok(());
        }
        match kind {
            ElementKind::Polyline(p) | ElementKind::Polygon(p) => {
                let moved: Option<Vec<Point>> = p
                    .points
                    .as_ref()
                    .map(|pts| pts.iter().map(|q| *q + delta).collect());
                if let ElementKind::Polyline(p) | ElementKind::Polygon(p) = &mut self.element_mut().kind {
                    p.points = moved;
                }
            }
            ElementKind::Path(p) => {
                let mut d = p.d.clone();
                if let Some(d) = &mut d {
                    d.unarc();
                    d.translate(delta);
                }
                if let ElementKind::Path(p) = &mut self.element_mut().kind {
                    p.d = d;
                }
            }
            ElementKind::G => {
                let children = geometric_children(doc, idx);
                move_members(self.doc, &children, delta)?;
            }
            other => return Err(not_geometric(other)),
        }
        Ok(())
    }

    fn set_size(&mut self, size: Vec2) -> Result<(), ShapeError> {
        let (doc, idx) = (&*self.doc, self.idx);
        let kind = &doc.element_at(idx).kind;
        match kind {
            ElementKind::Svg(SvgAttrs { width, height, .. })
            | ElementKind::Rect(RectAttrs { width, height, .. })
            | ElementKind::Image(ImageAttrs { width, height, .. }) => {
                let center = center_of(doc, idx)?;
                let nw = from_px(doc, idx, width, "width", size.x);
                let nh = from_px(doc, idx, height, "height", size.y);
                match &mut self.element_mut().kind {
                    ElementKind::Svg(SvgAttrs { width, height, .. })
                    | ElementKind::Rect(RectAttrs { width, height, .. })
                    | ElementKind::Image(ImageAttrs { width, height, .. }) => {
                        *width = Some(nw);
                        *height = Some(nh);
                    }
                    _ => {}
                }
                self.set_center(center)
            }
            ElementKind::Circle(c) => {
                if (size.x - size.y).abs() < EPSILON {
                    let r = from_px(doc, idx, &c.r, "r", size.x / 2.0);
                    if let ElementKind::Circle(c) = &mut self.element_mut().kind {
                        c.r = Some(r);
                    }
                } else {
                    let promoted = EllipseAttrs {
                        cx: c.cx.clone(),
                        cy: c.cy.clone(),
                        rx: Some(from_px(doc, idx, &c.r, "rx", size.x / 2.0)),
                        ry: Some(from_px(doc, idx, &c.r, "ry", size.y / 2.0)),
                    };
                    let element = self.element_mut();
                    log::debug!("circle {:?} promoted to ellipse", element.id);
                    element.kind = ElementKind::Ellipse(promoted);
                }
                Ok(())
            }
            ElementKind::Ellipse(e) => {
                let rx = from_px(doc, idx, &e.rx, "rx", size.x / 2.0);
                let ry = from_px(doc, idx, &e.ry, "ry", size.y / 2.0);
                if let ElementKind::Ellipse(e) = &mut self.element_mut().kind {
                    e.rx = Some(rx);
                    e.ry = Some(ry);
                }
                Ok(())
            }
            ElementKind::Polyline(p) | ElementKind::Polygon(p) => {
                let points = p.points.as_deref().unwrap_or_default();
                let bbox = bbox_of_points(points);
                let (center, lt) = (bbox.center(), bbox.origin());
                let r = ratio(size, bbox.size().to_vec2());
                let scaled: Option<Vec<Point>> = p.points.as_ref().map(|pts| {
                    pts.iter()
                        .map(|q| {
                            let d = *q - lt;
                            lt + Vec2::new(d.x * r.x, d.y * r.y)
                        })
                        .collect()
                });
                if let ElementKind::Polyline(p) | ElementKind::Polygon(p) = &mut self.element_mut().kind {
                    p.points = scaled;
                }
                self.set_center(center)
            }
            ElementKind::Path(p) => {
                let Some(mut d) = p.d.clone() else {
                    return Ok(());
                };
                d.unarc();
                let bbox = d.bbox().unwrap_or(Rect::ZERO);
                d.scale_about(bbox.origin(), ratio(size, bbox.size().to_vec2()));
                if let ElementKind::Path(p) = &mut self.element_mut().kind {
                    p.d = Some(d);
                }
                self.set_center(bbox.center())
            }
            ElementKind::Text(t) => {
                let center = center_of(doc, idx)?;
                let font = computed_font(doc, idx);
                let font_px = match doc.units.metrics().font_size_for_line_height(size.y, &font) {
                    s if s > 0.0 => s,
                    _ => 1.0,
                };
                let font_size = from_px(doc, idx, &doc.element_at(idx).pres.font_size, "font-size", font_px);
                let text_length = from_px(doc, idx, &t.text_length, "textLength", size.x);
                let element = self.element_mut();
                element.pres.font_size = Some(font_size);
                if let ElementKind::Text(t) = &mut element.kind {
                    t.text_length = Some(text_length);
                }
                self.set_center(center)
            }
            ElementKind::G => {
                let children = geometric_children(doc, idx);
                resize_members(self.doc, &children, size)
            }
            other => Err(not_geometric(other)),
        }
    }

    fn rotate(&mut self, degrees: f64) -> Result<(), ShapeError> {
        let kind = &self.doc.element_at(self.idx).kind;
        match kind {
            ElementKind::Svg(_) => Ok(()),
            kind if kind.is_transformable() => {
                let center = self.center()?;
                self.element_mut()
                    .pres
                    .transform
                    .get_or_insert_with(Transform::new)
                    .append(TransformDescriptor::Rotate {
                        angle: degrees,
                        cx: center.x,
                        cy: center.y,
                    });
                Ok(())
            }
            other => Err(not_geometric(other)),
        }
    }

    fn set_transform(&mut self, matrix: Affine) -> Result<(), ShapeError> {
        let kind = &self.doc.element_at(self.idx).kind;
        match kind {
            ElementKind::Svg(_) => Err(ShapeError::Unsupported {
                tag: "svg".into(),
                operation: "set_transform",
            }),
            kind if kind.is_transformable() => {
                self.element_mut().pres.transform = (!is_identity(matrix)).then(|| {
                    Transform::from_descriptors([TransformDescriptor::Matrix(matrix.as_coeffs())])
                });
                Ok(())
            }
            other => Err(not_geometric(other)),
        }
    }
}

// ─── Multi-selection ─────────────────────────────────────────────────────

/// [`Shape`] over several siblings, treated as one box in their parent's
/// coordinate space.
pub struct MultiShaper<'a> {
    doc: &'a mut Document,
    members: Vec<NodeIndex>,
    parent: Option<NodeIndex>,
}

impl<'a> MultiShaper<'a> {
    /// All members must exist and share a parent.
    pub fn new(doc: &'a mut Document, ids: &[ElementId]) -> Result<Self, ShapeError> {
        let (members, parent) = resolve_members(doc, ids)?;
        Ok(Self {
            doc,
            members,
            parent,
        })
    }

    pub fn members(&self) -> &[NodeIndex] {
        &self.members
    }
}

/// Indices of `ids` and their common parent.
fn resolve_members(
    doc: &Document,
    ids: &[ElementId],
) -> Result<(Vec<NodeIndex>, Option<NodeIndex>), ShapeError> {
    let mut members = Vec::with_capacity(ids.len());
    for id in ids {
        members.push(doc.index_of(*id).ok_or(ShapeError::MissingElement(*id))?);
    }
    let first = members.first().ok_or(ShapeError::EmptySelection)?;
    let parent = doc.parent_index(*first);
    if members.iter().any(|m| doc.parent_index(*m) != parent) {
        return Err(ShapeError::MixedParents);
    }
    for &m in &members {
        let kind = &doc.element_at(m).kind;
        if !is_geometric(kind) {
            return Err(not_geometric(kind));
        }
    }
    Ok((members, parent))
}

impl Shape for MultiShaper<'_> {
    fn center(&self) -> Result<Point, ShapeError> {
        Ok(aggregate_bbox(self.doc, &self.members)?.center())
    }

    fn size(&self) -> Result<Vec2, ShapeError> {
        Ok(aggregate_bbox(self.doc, &self.members)?.size().to_vec2())
    }

    fn set_center(&mut self, center: Point) -> Result<(), ShapeError> {
        let old = self.center()?;
        self.move_by(center - old)
    }

    fn move_by(&mut self, delta: Vec2) -> Result<(), ShapeError> {
        move_members(self.doc, &self.members, delta)
    }

    fn set_size(&mut self, size: Vec2) -> Result<(), ShapeError> {
        resize_members(self.doc, &self.members, size)
    }

    fn rotate(&mut self, degrees: f64) -> Result<(), ShapeError> {
        let center = self.center()?;
        for &member in &self.members {
            if !self.doc.element_at(member).kind.is_transformable() {
                continue;
            }
            let local = outer_transform(self.doc, member)?.inverse() * center;
            self.doc
                .element_at_mut(member)
                .pres
                .transform
                .get_or_insert_with(Transform::new)
                .append(TransformDescriptor::Rotate {
                    angle: degrees,
                    cx: local.x,
                    cy: local.y,
                });
        }
        Ok(())
    }

    fn transform(&self) -> Result<Affine, ShapeError> {
        Err(ShapeError::MultiSelectionTransform)
    }

    fn set_transform(&mut self, _matrix: Affine) -> Result<(), ShapeError> {
        Err(ShapeError::MultiSelectionTransform)
    }

    fn all_transform(&self) -> Result<Affine, ShapeError> {
        Ok(self
            .parent
            .map_or(Affine::IDENTITY, |p| all_transform(self.doc, p)))
    }
}

/// Shape over a selection: the element itself when there is one, a
/// [`MultiShaper`] otherwise.
pub fn selection_shaper<'a>(
    doc: &'a mut Document,
    ids: &[ElementId],
) -> Result<Box<dyn Shape + 'a>, ShapeError> {
    match ids {
        [] => Err(ShapeError::EmptySelection),
        [id] => Ok(Box::new(Shaper::new(doc, *id)?)),
        _ => Ok(Box::new(MultiShaper::new(doc, ids)?)),
    }
}

/// A selection's box and the matrix from the box's space to root space.
///
/// A single element is framed in its own coordinates, so a rotated shape
/// gets a rotated frame. Several siblings are framed in their parent's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub bounds: Rect,
    pub to_root: Affine,
}

impl Frame {
    /// Map a root-space point into the frame's space.
    pub fn to_local(&self, p: Point) -> Point {
        self.to_root.inverse() * p
    }
}

/// Read-only geometry of a selection, as [`selection_shaper`] sees it.
pub fn selection_frame(doc: &Document, ids: &[ElementId]) -> Result<Frame, ShapeError> {
    let (members, parent) = resolve_members(doc, ids)?;
    let parent_to_root = parent.map_or(Affine::IDENTITY, |p| all_transform(doc, p));
    match members.as_slice() {
        [single] => {
            let size = size_of(doc, *single)?;
            let center = center_of(doc, *single)?;
            Ok(Frame {
                bounds: Rect::from_center_size(center, size.to_size()),
                to_root: parent_to_root * outer_transform(doc, *single)?,
            })
        }
        _ => Ok(Frame {
            bounds: aggregate_bbox(doc, &members)?,
            to_root: parent_to_root,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;
    use crate::units::LengthUnit;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn close_pt(a: Point, b: Point) -> bool {
        close(a.x, b.x) && close(a.y, b.y)
    }

    fn doc(markup: &str) -> Document {
        parse_document(markup).unwrap().document
    }

    fn child(doc: &Document, n: usize) -> NodeIndex {
        doc.children(doc.root)[n]
    }

    #[test]
    fn circle_scenario() {
        let mut d = doc(r#"<svg width="100" height="100"><circle cx="50" cy="50" r="40"/></svg>"#);
        let c = child(&d, 0);
        let mut s = Shaper::at(&mut d, c);
        assert_eq!(s.size().unwrap(), Vec2::new(80.0, 80.0));
        s.move_by(Vec2::new(10.0, 0.0)).unwrap();
        let ElementKind::Circle(circle) = &d.element_at(c).kind else {
            panic!("still a circle");
        };
        assert_eq!(circle.cx.as_ref().map(|l| l.value), Some(60.0));
    }

    #[test]
    fn circle_promotes_to_ellipse() {
        let mut d = doc(r#"<svg><circle cx="10" cy="10" r="5mm"/></svg>"#);
        let c = child(&d, 0);
        Shaper::at(&mut d, c).set_size(Vec2::new(20.0, 10.0)).unwrap();
        let ElementKind::Ellipse(e) = &d.element_at(c).kind else {
            panic!("expected ellipse");
        };
        let rx = e.rx.as_ref().unwrap();
        assert_eq!(rx.unit, Some(LengthUnit::Mm));
        assert_eq!(rx.attr_name, "rx");
        assert!(close(to_pixels(rx, &d, c), 10.0));
        assert_eq!(d.element_at(c).tag_name(), "ellipse");
    }

    #[test]
    fn left_top_is_consistent_with_center() {
        let mut d = doc(
            r#"<svg><rect x="10" y="20" width="30" height="40"/><circle cx="5" cy="5" r="2"/><ellipse cx="1" cy="2" rx="3" ry="4"/></svg>"#,
        );
        for n in 0..3 {
            let idx = child(&d, n);
            let mut s = Shaper::at(&mut d, idx);
            let center = s.center().unwrap();
            let lt = s.left_top().unwrap();
            let size = s.size().unwrap();
            s.set_center(lt + size / 2.0).unwrap();
            assert!(close_pt(s.center().unwrap(), center));
            s.set_left_top(lt).unwrap();
            assert!(close_pt(s.left_top().unwrap(), lt));
        }
    }

    #[test]
    fn size2_keeps_fixed_corner() {
        let mut d = doc(r#"<svg><rect x="0" y="0" width="100" height="100"/></svg>"#);
        let r = child(&d, 0);
        let mut s = Shaper::at(&mut d, r);
        s.size2(Vec2::new(50.0, 30.0), Point::new(0.0, 0.0)).unwrap();
        assert!(close_pt(s.left_top().unwrap(), Point::new(0.0, 0.0)));
        assert_eq!(s.size().unwrap(), Vec2::new(50.0, 30.0));

        s.size2(Vec2::new(80.0, 80.0), Point::new(50.0, 30.0)).unwrap();
        let lt = s.left_top().unwrap();
        assert!(close_pt(lt + Vec2::new(80.0, 80.0), Point::new(50.0, 30.0)));
    }

    #[test]
    fn percentage_x_resolves_against_viewport() {
        let d = doc(r#"<svg width="200"><rect x="50%" width="10" height="10"/></svg>"#);
        let r = child(&d, 0);
        let ElementKind::Rect(rect) = &d.element_at(r).kind else {
            panic!("expected rect");
        };
        assert_eq!(to_pixels(rect.x.as_ref().unwrap(), &d, r), 100.0);
    }

    #[test]
    fn polyline_resize_scales_points() {
        let mut d = doc(r#"<svg><polyline points="0,0 10,0 10,20"/></svg>"#);
        let p = child(&d, 0);
        let mut s = Shaper::at(&mut d, p);
        assert_eq!(s.center().unwrap(), Point::new(5.0, 10.0));
        s.set_size(Vec2::new(20.0, 10.0)).unwrap();
        assert!(close_pt(s.center().unwrap(), Point::new(5.0, 10.0)));
        assert_eq!(s.size().unwrap(), Vec2::new(20.0, 10.0));
    }

    #[test]
    fn path_move_unarcs_and_translates() {
        let mut d = doc(r#"<svg><path d="M 0 0 A 10 10 0 0 1 20 0 h 5"/></svg>"#);
        let p = child(&d, 0);
        let before = center_of(&d, p).unwrap();
        Shaper::at(&mut d, p).move_by(Vec2::new(5.0, 5.0)).unwrap();
        let ElementKind::Path(path) = &d.element_at(p).kind else {
            panic!("expected path");
        };
        assert!(!path.d.as_ref().unwrap().has_arcs());
        assert!(close_pt(center_of(&d, p).unwrap(), before + Vec2::new(5.0, 5.0)));
    }

    #[test]
    fn path_resize_keeps_center() {
        let mut d = doc(r#"<svg><path d="M 10 10 L 30 10 V 50 Z"/></svg>"#);
        let p = child(&d, 0);
        let mut s = Shaper::at(&mut d, p);
        s.set_size(Vec2::new(40.0, 20.0)).unwrap();
        assert!(close_pt(s.center().unwrap(), Point::new(20.0, 30.0)));
        let size = s.size().unwrap();
        assert!(close(size.x, 40.0) && close(size.y, 20.0));
    }

    #[test]
    fn text_geometry_uses_metrics() {
        let mut d = doc(r#"<svg><text x="10" y="20" font-size="10">abcd</text></svg>"#);
        let t = child(&d, 0);
        let mut s = Shaper::at(&mut d, t);
        // 4 chars × 0.6 × 10px, line height 1.2 × 10px
        assert!(close(s.size().unwrap().x, 24.0));
        assert!(close(s.size().unwrap().y, 12.0));
        s.set_size(Vec2::new(48.0, 24.0)).unwrap();
        let el = d.element_at(t);
        assert!(close(el.pres.font_size.as_ref().unwrap().value, 20.0));
        let ElementKind::Text(text) = &el.kind else {
            panic!("expected text");
        };
        assert!(close(text.text_length.as_ref().unwrap().value, 48.0));
    }

    #[test]
    fn group_moves_children_through_their_transforms() {
        let mut d = doc(
            r#"<svg><g><rect x="0" y="0" width="10" height="10" transform="scale(2)"/><rect x="30" y="0" width="10" height="10"/></g></svg>"#,
        );
        let g = child(&d, 0);
        let mut s = Shaper::at(&mut d, g);
        assert!(close_pt(s.center().unwrap(), Point::new(20.0, 10.0)));
        s.move_by(Vec2::new(10.0, 0.0)).unwrap();
        let kids = d.children(g);
        let ElementKind::Rect(scaled) = &d.element_at(kids[0]).kind else {
            panic!("expected rect");
        };
        assert!(close(scaled.x.as_ref().unwrap().value, 5.0));
        let ElementKind::Rect(plain) = &d.element_at(kids[1]).kind else {
            panic!("expected rect");
        };
        assert!(close(plain.x.as_ref().unwrap().value, 40.0));
    }

    #[test]
    fn group_resize_is_proportional() {
        let mut d = doc(
            r#"<svg><g><rect x="0" y="0" width="10" height="10"/><rect x="30" y="30" width="10" height="10"/></g></svg>"#,
        );
        let g = child(&d, 0);
        let mut s = Shaper::at(&mut d, g);
        s.set_size(Vec2::new(80.0, 80.0)).unwrap();
        let size = s.size().unwrap();
        assert!(close(size.x, 80.0) && close(size.y, 80.0));
        assert!(close_pt(s.center().unwrap(), Point::new(20.0, 20.0)));
    }

    #[test]
    fn group_resize_scales_rotated_child_along_parent_axes() {
        let mut d = doc(
            r#"<svg><g><rect x="0" y="0" width="10" height="20" transform="rotate(90 5 10)"/></g></svg>"#,
        );
        let g = child(&d, 0);
        let mut s = Shaper::at(&mut d, g);
        let size = s.size().unwrap();
        assert!(close(size.x, 20.0) && close(size.y, 10.0));
        s.set_size(Vec2::new(40.0, 10.0)).unwrap();
        let size = s.size().unwrap();
        assert!(close(size.x, 40.0) && close(size.y, 10.0));
        assert!(close_pt(s.center().unwrap(), Point::new(5.0, 10.0)));

        // A quarter turn maps the group's x onto the rect's height.
        let rect = d.children(g)[0];
        let ElementKind::Rect(r) = &d.element_at(rect).kind else {
            panic!("expected rect");
        };
        assert!(close(r.width.as_ref().unwrap().value, 10.0));
        assert!(close(r.height.as_ref().unwrap().value, 40.0));
    }

    #[test]
    fn group_resize_folds_skew_into_child_transform() {
        let mut d = doc(r#"<svg><g><rect width="10" height="10" transform="rotate(45)"/></g></svg>"#);
        let g = child(&d, 0);
        let mut s = Shaper::at(&mut d, g);
        let before = s.size().unwrap();
        s.set_size(Vec2::new(before.x * 2.0, before.y)).unwrap();
        let after = s.size().unwrap();
        assert!(close(after.x, before.x * 2.0) && close(after.y, before.y));

        let rect = d.children(g)[0];
        let element = d.element_at(rect);
        let ElementKind::Rect(r) = &element.kind else {
            panic!("expected rect");
        };
        assert_eq!(r.width.as_ref().map(|l| l.value), Some(10.0));
        let descriptors = element.pres.transform.as_ref().unwrap().descriptors();
        assert_eq!(descriptors.len(), 2);
        assert!(matches!(descriptors[0], TransformDescriptor::Matrix(_)));
        assert!(matches!(descriptors[1], TransformDescriptor::Rotate { angle, .. } if angle == 45.0));
    }

    #[test]
    fn rotation_composes_into_one_descriptor() {
        let mut d = doc(r#"<svg><rect x="0" y="0" width="10" height="10"/></svg>"#);
        let r = child(&d, 0);
        let mut s = Shaper::at(&mut d, r);
        s.rotate(10.0).unwrap();
        s.rotate(20.0).unwrap();
        let t = d.element_at(r).pres.transform.as_ref().unwrap();
        assert_eq!(
            t.descriptors(),
            &[TransformDescriptor::Rotate { angle: 30.0, cx: 5.0, cy: 5.0 }]
        );
    }

    #[test]
    fn unknown_and_gradient_elements_refuse_geometry() {
        let mut d = doc(r#"<svg><foo/><linearGradient/></svg>"#);
        let foo = child(&d, 0);
        assert!(matches!(
            Shaper::at(&mut d, foo).size(),
            Err(ShapeError::UnknownElement { .. })
        ));
        let grad = child(&d, 1);
        assert!(matches!(
            Shaper::at(&mut d, grad).move_by(Vec2::new(1.0, 1.0)),
            Err(ShapeError::NotGeometric { .. })
        ));
    }

    #[test]
    fn svg_transform_setter_is_unsupported() {
        let mut d = doc(r#"<svg width="10" height="10"/>"#);
        let root = d.root;
        let mut s = Shaper::at(&mut d, root);
        assert!(s.rotate(45.0).is_ok());
        assert!(matches!(
            s.set_transform(Affine::scale(2.0)),
            Err(ShapeError::Unsupported { .. })
        ));
    }

    #[test]
    fn multi_selection() {
        let mut d = doc(
            r#"<svg><rect x="0" y="0" width="10" height="10"/><circle cx="25" cy="5" r="5"/><g><rect/></g></svg>"#,
        );
        let ids: Vec<ElementId> = d
            .children(d.root)
            .iter()
            .take(2)
            .map(|i| d.element_at(*i).id)
            .collect();
        let mut multi = selection_shaper(&mut d, &ids).unwrap();
        assert!(close_pt(multi.center().unwrap(), Point::new(15.0, 5.0)));
        assert!(matches!(
            multi.set_transform(Affine::IDENTITY),
            Err(ShapeError::MultiSelectionTransform)
        ));
        multi.move_by(Vec2::new(0.0, 10.0)).unwrap();
        assert!(close_pt(multi.center().unwrap(), Point::new(15.0, 15.0)));
        drop(multi);

        let nested = d.children(d.children(d.root)[2])[0];
        let nested_id = d.element_at(nested).id;
        assert!(matches!(
            MultiShaper::new(&mut d, &[ids[0], nested_id]),
            Err(ShapeError::MixedParents)
        ));
        assert!(matches!(
            selection_shaper(&mut d, &[]),
            Err(ShapeError::EmptySelection)
        ));
    }

    #[test]
    fn frame_of_rotated_shape_stays_local() {
        let d = doc(
            r#"<svg><g transform="translate(100 0)"><rect x="0" y="0" width="10" height="20" transform="rotate(90 5 10)"/></g></svg>"#,
        );
        let rect = d.children(child(&d, 0))[0];
        let frame = selection_frame(&d, &[d.element_at(rect).id]).unwrap();
        assert_eq!(frame.bounds, Rect::new(0.0, 0.0, 10.0, 20.0));
        let top_left = frame.to_root * Point::new(0.0, 0.0);
        assert!(close_pt(top_left, Point::new(115.0, 5.0)));
        assert!(close_pt(frame.to_local(top_left), Point::ZERO));
    }

    #[test]
    fn collect_transform_folds_or_drops() {
        let mut d = doc(
            r#"<svg><rect transform="translate(5 0) translate(-5 0)"/><rect transform="translate(5 0) scale(2)"/></svg>"#,
        );
        let a = child(&d, 0);
        let b = child(&d, 1);
        Shaper::at(&mut d, a).collect_transform();
        Shaper::at(&mut d, b).collect_transform();
        assert!(d.element_at(a).pres.transform.is_none());
        assert_eq!(d.element_at(b).pres.transform.as_ref().unwrap().descriptors().len(), 1);
    }
}
