//! One-shot document operators that are not pointer interactions.

use kurbo::Vec2;
use svgedit_core::error::ShapeError;
use svgedit_core::model::Document;
use svgedit_core::shaper::{Shape, Shaper, is_geometric};
use svgedit_core::units::{AttrAxis, percentage_basis};
use svgedit_core::ElementId;

/// Offset of a duplicate, as a fraction of its viewport.
pub const DUPLICATE_OFFSET: f64 = 0.04;

/// Deep-copy each element next to its original with fresh identities,
/// nudged by [`DUPLICATE_OFFSET`] of the enclosing viewport on both axes.
/// Returns the copies in the order of `ids`.
pub fn duplicate(doc: &mut Document, ids: &[ElementId]) -> Result<Vec<ElementId>, ShapeError> {
    let mut copies = Vec::with_capacity(ids.len());
    for &id in ids {
        let idx = doc.index_of(id).ok_or(ShapeError::MissingElement(id))?;
        let Some(parent) = doc.parent_index(idx) else {
            return Err(ShapeError::Unsupported {
                tag: doc.element_at(idx).tag_name().to_string(),
                operation: "duplicate",
            });
        };
        let copy = doc.duplicate_subtree(idx, parent);
        if is_geometric(&doc.element_at(copy).kind) {
            let offset = Vec2::new(
                percentage_basis(doc, copy, AttrAxis::Horizontal),
                percentage_basis(doc, copy, AttrAxis::Vertical),
            ) * DUPLICATE_OFFSET;
            Shaper::at(doc, copy).move_by(offset)?;
        }
        copies.push(doc.element_at(copy).id);
    }
    log::debug!("duplicated {} element(s)", copies.len());
    Ok(copies)
}
