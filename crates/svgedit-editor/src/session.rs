//! Editing session: document ↔ markup.
//!
//! The session holds the authoritative document and keeps the host's markup
//! in sync with it:
//!
//! - **Markup → Document**: the host sends the whole text whenever it
//!   changes; the session reparses, records warnings and resets to select
//!   mode. Element identities do not survive a reparse.
//!
//! - **Document → Markup**: tools produce `Edit`s that are applied through
//!   the shaper as they arrive. Markup is only re-emitted on commit (end of
//!   a gesture or an explicit operator), not on every pointer move.

use crate::error::EditorError;
use crate::input::InputEvent;
use crate::operators::duplicate;
use crate::tools::{DrawSettings, Edit, HANDLE_COUNT, Hit, Tool, ToolContext, ToolKind, handle_positions, tool_for};
use kurbo::Point;
use svgedit_core::emitter::emit_document;
use svgedit_core::error::ShapeError;
use svgedit_core::model::{Document, ElementKind};
use svgedit_core::parser::parse_document;
use svgedit_core::shaper::{Frame, Shape, Shaper, selection_frame, selection_shaper};
use svgedit_core::{EditorConfig, ElementId, Warning};

pub struct EditorSession {
    /// The current document (single source of truth).
    pub document: Document,

    config: EditorConfig,

    /// Markup as of the last parse or commit.
    markup: String,

    /// Warnings from the last parse.
    warnings: Vec<Warning>,

    selection: Vec<ElementId>,

    settings: DrawSettings,

    tool: Box<dyn Tool>,

    /// Set when the document changed since the markup was produced.
    dirty: bool,
}

impl EditorSession {
    /// Create a session from host markup.
    pub fn from_markup(markup: &str, config: EditorConfig) -> Result<Self, EditorError> {
        config.validate()?;
        let parsed = parse_document(markup)?;
        let mut session = Self {
            document: parsed.document,
            config,
            markup: markup.to_string(),
            warnings: parsed.warnings,
            selection: Vec::new(),
            settings: DrawSettings::default(),
            tool: tool_for(ToolKind::Select),
            dirty: false,
        };
        session.apply_config();
        Ok(session)
    }

    fn apply_config(&mut self) {
        self.document.units.percentage_fallback_px = self.config.percentage_fallback_px;
    }

    // ─── Markup → Document direction ─────────────────────────────────────

    /// Replace the markup and reparse. On failure the session is unchanged.
    pub fn set_markup(&mut self, markup: &str) -> Result<(), EditorError> {
        let parsed = parse_document(markup)?;
        self.document = parsed.document;
        self.warnings = parsed.warnings;
        self.markup = markup.to_string();
        self.selection.clear();
        self.tool = tool_for(ToolKind::Select);
        self.dirty = false;
        self.apply_config();
        log::debug!("markup replaced; {} warning(s)", self.warnings.len());
        Ok(())
    }

    pub fn set_config(&mut self, config: EditorConfig) -> Result<(), EditorError> {
        config.validate()?;
        self.config = config;
        self.apply_config();
        Ok(())
    }

    // ─── Document → Markup direction ─────────────────────────────────────

    /// Feed one input event to the active tool and apply its edits.
    /// Returns whether the markup was re-emitted.
    pub fn handle(&mut self, event: &InputEvent, hit: Option<Hit>) -> Result<bool, EditorError> {
        let ctx = ToolContext {
            doc: &self.document,
            config: &self.config,
            selection: &self.selection,
            settings: &self.settings,
        };
        let edits = self.tool.handle(event, hit, &ctx);
        self.apply_all(edits)
    }

    /// Apply a batch of edits. A failing edit does not stop the batch, so a
    /// trailing commit still runs; the first error is returned afterwards.
    fn apply_all(&mut self, edits: Vec<Edit>) -> Result<bool, EditorError> {
        let mut committed = false;
        let mut first_error = None;
        for edit in edits {
            committed |= matches!(edit, Edit::Commit);
            if let Err(err) = self.apply(edit) {
                log::warn!("edit failed: {err}");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(committed),
        }
    }

    /// Apply a single edit to the document.
    pub fn apply(&mut self, edit: Edit) -> Result<(), EditorError> {
        match edit {
            Edit::Select(ids) => {
                log::debug!("selection: {} element(s)", ids.len());
                self.selection = ids;
                return Ok(());
            }
            Edit::Commit => {
                self.commit();
                return Ok(());
            }
            Edit::Append { parent, element } => {
                let parent = self
                    .document
                    .index_of(parent)
                    .ok_or(ShapeError::MissingElement(parent))?;
                log::debug!("appending <{}> {:?}", element.tag_name(), element.id);
                self.document.append_child(parent, *element);
            }
            Edit::MoveBy { ids, delta } => {
                selection_shaper(&mut self.document, &ids)?.move_by(delta)?;
            }
            Edit::Size2 { ids, size, fixed } => {
                selection_shaper(&mut self.document, &ids)?.size2(size, fixed)?;
            }
            Edit::Reshape { id, left_top, size } => {
                let mut shaper = Shaper::new(&mut self.document, id)?;
                shaper.set_size(size)?;
                shaper.set_left_top(left_top)?;
            }
            Edit::Rotate { ids, degrees } => {
                selection_shaper(&mut self.document, &ids)?.rotate(degrees)?;
            }
            Edit::SetPoints { id, points } => {
                let element = self
                    .document
                    .get_mut(id)
                    .ok_or(ShapeError::MissingElement(id))?;
                match &mut element.kind {
                    ElementKind::Polyline(p) | ElementKind::Polygon(p) => p.points = Some(points),
                    other => {
                        return Err(ShapeError::Unsupported {
                            tag: other.tag_name().to_string(),
                            operation: "set_points",
                        }
                        .into());
                    }
                }
            }
        }
        self.dirty = true;
        Ok(())
    }

    /// End an interaction: collapse the selection's transforms if configured,
    /// then re-emit the markup.
    pub fn commit(&mut self) -> &str {
        if self.config.collect_transform_on_commit {
            for id in &self.selection {
                if let Ok(mut shaper) = Shaper::new(&mut self.document, *id) {
                    shaper.collect_transform();
                }
            }
        }
        self.markup = emit_document(&self.document, &self.config.emit_options());
        self.dirty = false;
        log::debug!("committed {} bytes of markup", self.markup.len());
        &self.markup
    }

    /// Duplicate the selection, select the copies and commit.
    pub fn duplicate_selection(&mut self) -> Result<&[ElementId], EditorError> {
        if self.selection.is_empty() {
            return Err(ShapeError::EmptySelection.into());
        }
        self.selection = duplicate(&mut self.document, &self.selection)?;
        self.commit();
        Ok(&self.selection)
    }

    // ─── Tools and settings ──────────────────────────────────────────────

    pub fn set_tool(&mut self, kind: ToolKind) {
        if self.tool.kind() != kind {
            log::debug!("tool: {:?} -> {kind:?}", self.tool.kind());
            self.tool = tool_for(kind);
        }
    }

    pub fn tool_kind(&self) -> ToolKind {
        self.tool.kind()
    }

    pub fn settings_mut(&mut self) -> &mut DrawSettings {
        &mut self.settings
    }

    pub fn select(&mut self, ids: Vec<ElementId>) {
        self.selection = ids;
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn selection(&self) -> &[ElementId] {
        &self.selection
    }

    /// Frame of the current selection, if it has one.
    pub fn frame(&self) -> Option<Frame> {
        if self.selection.is_empty() {
            return None;
        }
        selection_frame(&self.document, &self.selection).ok()
    }

    /// Screen positions of the selection handles.
    pub fn handles(&self) -> Option<[Point; HANDLE_COUNT]> {
        self.frame().map(|frame| handle_positions(&frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PointerButton;
    use kurbo::Vec2;

    const BOX: &str = r#"<svg width="100" height="100"><rect id="box" x="10" y="10" width="20" height="20"/></svg>"#;

    #[test]
    fn from_markup_keeps_source_text() {
        let session = EditorSession::from_markup(BOX, EditorConfig::default()).unwrap();
        assert_eq!(session.markup(), BOX);
        assert!(session.warnings().is_empty());
        assert_eq!(session.tool_kind(), ToolKind::Select);
    }

    #[test]
    fn drag_commits_new_markup() {
        let mut session = EditorSession::from_markup(BOX, EditorConfig::default()).unwrap();
        let id = session.document.lookup_id_attr("box").unwrap();
        let down = InputEvent::PointerDown {
            x: 15.0,
            y: 15.0,
            button: PointerButton::Primary,
        };
        assert!(!session.handle(&down, Some(Hit::Element(id))).unwrap());
        assert_eq!(session.selection(), &[id]);
        session
            .handle(&InputEvent::PointerMove { x: 20.0, y: 25.0 }, None)
            .unwrap();
        assert!(session.is_dirty());
        assert!(session.handle(&InputEvent::PointerUp { x: 20.0, y: 25.0 }, None).unwrap());
        assert!(session.markup().contains(r#"x="15" y="20""#));
        assert!(!session.is_dirty());
    }

    #[test]
    fn set_markup_resets_tool_and_selection() {
        let mut session = EditorSession::from_markup(BOX, EditorConfig::default()).unwrap();
        session.set_tool(ToolKind::Rect);
        let id = session.document.lookup_id_attr("box").unwrap();
        session.select(vec![id]);
        session.set_markup("<svg><foo/></svg>").unwrap();
        assert_eq!(session.tool_kind(), ToolKind::Select);
        assert!(session.selection().is_empty());
        assert_eq!(session.warnings().len(), 1);
    }

    #[test]
    fn bad_markup_leaves_session_untouched() {
        let mut session = EditorSession::from_markup(BOX, EditorConfig::default()).unwrap();
        assert!(session.set_markup("<svg>").is_err());
        assert_eq!(session.markup(), BOX);
        assert!(session.document.lookup_id_attr("box").is_some());
    }

    #[test]
    fn failed_edit_still_commits_the_batch() {
        let mut session = EditorSession::from_markup(BOX, EditorConfig::default()).unwrap();
        let id = session.document.lookup_id_attr("box").unwrap();
        let edits = vec![
            Edit::MoveBy {
                ids: vec![id],
                delta: Vec2::new(5.0, 5.0),
            },
            Edit::SetPoints {
                id,
                points: vec![Point::new(0.0, 0.0)],
            },
            Edit::MoveBy {
                ids: vec![id],
                delta: Vec2::new(1.0, 0.0),
            },
            Edit::Commit,
        ];
        assert!(matches!(
            session.apply_all(edits),
            Err(EditorError::Shape(ShapeError::Unsupported { .. }))
        ));
        assert!(!session.is_dirty());
        assert!(session.markup().contains(r#"x="16" y="15""#), "{}", session.markup());
    }

    #[test]
    fn fallback_basis_comes_from_config() {
        let config = EditorConfig {
            percentage_fallback_px: 1000.0,
            ..EditorConfig::default()
        };
        let session = EditorSession::from_markup(BOX, config).unwrap();
        assert_eq!(session.document.units.percentage_fallback_px, 1000.0);
    }
}
