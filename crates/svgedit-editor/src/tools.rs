//! Tool system for canvas interactions.
//!
//! Each tool is an explicit state machine that translates input events into
//! `Edit` commands; the `EditorSession` applies them through the shaper.
//! Tools read the document but never mutate it.

use crate::input::{InputEvent, PointerButton};
use kurbo::{Affine, Point, Rect, Vec2};
use svgedit_core::model::*;
use svgedit_core::shaper::{Frame, selection_frame};
use svgedit_core::transform::all_transform;
use svgedit_core::units::Length;
use svgedit_core::{EditorConfig, ElementId, Paint};

/// The active tool determines how input events are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolKind {
    #[default]
    Select,
    Rect,
    Ellipse,
    Polyline,
    Text,
}

/// What the host's hit test found under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Element(ElementId),
    /// One of the nine selection handles, see [`handle_positions`].
    Handle(usize),
}

/// Attributes given to newly drawn elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawSettings {
    pub fill: Option<Paint>,
    pub stroke: Option<Paint>,
    /// Content of placed `<text>` elements.
    pub text: String,
}

/// Read-only view of the session handed to a tool.
pub struct ToolContext<'a> {
    pub doc: &'a Document,
    pub config: &'a EditorConfig,
    pub selection: &'a [ElementId],
    pub settings: &'a DrawSettings,
}

impl ToolContext<'_> {
    /// Whether `hit` is empty canvas, i.e. nothing or the root viewport.
    fn on_canvas(&self, hit: Option<Hit>) -> bool {
        match hit {
            None => true,
            Some(Hit::Element(id)) => id == self.doc.root_id(),
            Some(Hit::Handle(_)) => false,
        }
    }

    /// Screen → root content coordinates, where new elements are drawn.
    fn drawing_space(&self) -> Affine {
        all_transform(self.doc, self.doc.root).inverse()
    }

    fn zero(&self, attr_name: &str) -> Option<Length> {
        Some(Length::new(0.0, self.config.default_unit, attr_name))
    }

    fn drawn(&self, kind: ElementKind) -> Element {
        let mut element = Element::new(kind);
        element.pres.fill = self.settings.fill.clone();
        element.pres.stroke = self.settings.stroke.clone();
        element
    }
}

/// A document change requested by a tool.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Select(Vec<ElementId>),
    Append {
        parent: ElementId,
        element: Box<Element>,
    },
    MoveBy {
        ids: Vec<ElementId>,
        delta: Vec2,
    },
    Size2 {
        ids: Vec<ElementId>,
        size: Vec2,
        fixed: Point,
    },
    /// Set size, then left-top, of one element.
    Reshape {
        id: ElementId,
        left_top: Point,
        size: Vec2,
    },
    Rotate {
        ids: Vec<ElementId>,
        degrees: f64,
    },
    SetPoints {
        id: ElementId,
        points: Vec<Point>,
    },
    /// The interaction ended; re-serialize.
    Commit,
}

/// Trait for tools that handle input and produce edits.
pub trait Tool {
    fn kind(&self) -> ToolKind;

    /// Handle an input event, returning zero or more edits.
    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, ctx: &ToolContext<'_>) -> Vec<Edit>;
}

pub fn tool_for(kind: ToolKind) -> Box<dyn Tool> {
    match kind {
        ToolKind::Select => Box::new(SelectTool::new()),
        ToolKind::Rect => Box::new(RectTool::new()),
        ToolKind::Ellipse => Box::new(EllipseTool::new()),
        ToolKind::Polyline => Box::new(PolylineTool::new()),
        ToolKind::Text => Box::new(TextTool),
    }
}

// ─── Select Tool ─────────────────────────────────────────────────────────

pub const HANDLE_COUNT: usize = 9;
/// The middle slot of the 3×3 handle grid rotates instead of resizing.
pub const ROTATION_HANDLE: usize = 4;
/// Screen distance of the rotation handle above the top edge.
pub const ROTATION_HANDLE_OFFSET: f64 = 20.0;
const DEGREES_PER_PX: f64 = 1.0;

/// Handle `index` in frame space: row-major over corners and edge midpoints.
fn handle_point(bounds: Rect, index: usize) -> Point {
    let (col, row) = (index % 3, index / 3);
    Point::new(
        bounds.x0 + bounds.width() * col as f64 / 2.0,
        bounds.y0 + bounds.height() * row as f64 / 2.0,
    )
}

/// Screen positions of the nine handles around `frame`.
pub fn handle_positions(frame: &Frame) -> [Point; HANDLE_COUNT] {
    std::array::from_fn(|i| {
        if i == ROTATION_HANDLE {
            frame.to_root * handle_point(frame.bounds, 1) - Vec2::new(0.0, ROTATION_HANDLE_OFFSET)
        } else {
            frame.to_root * handle_point(frame.bounds, i)
        }
    })
}

#[derive(Debug, Clone, PartialEq)]
enum SelectState {
    Idle,
    Dragging { ids: Vec<ElementId>, last: Point },
    Resizing { ids: Vec<ElementId>, handle: usize },
    Rotating { ids: Vec<ElementId>, last_x: f64 },
}

pub struct SelectTool {
    state: SelectState,
}

impl Default for SelectTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectTool {
    pub fn new() -> Self {
        Self {
            state: SelectState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == SelectState::Idle
    }

    fn frame(ids: &[ElementId], ctx: &ToolContext<'_>) -> Option<Frame> {
        selection_frame(ctx.doc, ids)
            .inspect_err(|e| log::warn!("select: no frame for selection: {e}"))
            .ok()
    }
}

impl Tool for SelectTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Select
    }

    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, ctx: &ToolContext<'_>) -> Vec<Edit> {
        match event {
            InputEvent::PointerDown { x, y, button } => {
                if *button != PointerButton::Primary {
                    return vec![];
                }
                let selection = ctx.selection.to_vec();
                match hit {
                    Some(Hit::Handle(ROTATION_HANDLE)) if !selection.is_empty() => {
                        log::debug!("select: rotating");
                        self.state = SelectState::Rotating {
                            ids: selection,
                            last_x: *x,
                        };
                        vec![]
                    }
                    Some(Hit::Handle(handle)) if handle < HANDLE_COUNT && !selection.is_empty() => {
                        log::debug!("select: resizing from handle {handle}");
                        self.state = SelectState::Resizing {
                            ids: selection,
                            handle,
                        };
                        vec![]
                    }
                    Some(Hit::Element(id)) if !ctx.on_canvas(hit) => {
                        let ids = if selection.contains(&id) {
                            selection.clone()
                        } else {
                            vec![id]
                        };
                        self.state = SelectState::Dragging {
                            ids: ids.clone(),
                            last: Point::new(*x, *y),
                        };
                        if ids == selection {
                            vec![]
                        } else {
                            vec![Edit::Select(ids)]
                        }
                    }
                    _ => {
                        self.state = SelectState::Idle;
                        if selection.is_empty() {
                            vec![]
                        } else {
                            vec![Edit::Select(vec![])]
                        }
                    }
                }
            }
            InputEvent::PointerMove { x, y } => {
                let p = Point::new(*x, *y);
                match &mut self.state {
                    SelectState::Idle => vec![],
                    SelectState::Dragging { ids, last } => {
                        let Some(frame) = Self::frame(ids, ctx) else {
                            return vec![];
                        };
                        let delta = frame.to_local(p) - frame.to_local(*last);
                        *last = p;
                        vec![Edit::MoveBy {
                            ids: ids.clone(),
                            delta,
                        }]
                    }
                    SelectState::Resizing { ids, handle } => {
                        let Some(frame) = Self::frame(ids, ctx) else {
                            return vec![];
                        };
                        let fixed = handle_point(frame.bounds, HANDLE_COUNT - 1 - *handle);
                        let local = frame.to_local(p);
                        // Edge handles keep the other axis.
                        let width = match *handle % 3 {
                            0 => (fixed.x - local.x).max(0.0),
                            2 => (local.x - fixed.x).max(0.0),
                            _ => frame.bounds.width(),
                        };
                        let height = match *handle / 3 {
                            0 => (fixed.y - local.y).max(0.0),
                            2 => (local.y - fixed.y).max(0.0),
                            _ => frame.bounds.height(),
                        };
                        vec![Edit::Size2 {
                            ids: ids.clone(),
                            size: Vec2::new(width, height),
                            fixed,
                        }]
                    }
                    SelectState::Rotating { ids, last_x } => {
                        let degrees = (*x - *last_x) * DEGREES_PER_PX;
                        *last_x = *x;
                        vec![Edit::Rotate {
                            ids: ids.clone(),
                            degrees,
                        }]
                    }
                }
            }
            InputEvent::PointerUp { .. } | InputEvent::PointerLeave => {
                if self.is_idle() {
                    return vec![];
                }
                log::debug!("select: interaction ended");
                self.state = SelectState::Idle;
                vec![Edit::Commit]
            }
        }
    }
}

// ─── Rect / Ellipse Tools ────────────────────────────────────────────────

/// A shape being dragged out from `origin` (root content coordinates).
#[derive(Debug, Clone, Copy)]
struct DragOut {
    id: ElementId,
    origin: Point,
}

impl DragOut {
    /// Append `element` as a zero-size shape at the pointer.
    fn start(element: Element, p: Point, ctx: &ToolContext<'_>) -> (Self, Vec<Edit>) {
        let origin = ctx.drawing_space() * p;
        let id = element.id;
        log::debug!("drawing <{}> at {origin:?}", element.tag_name());
        let edits = vec![
            Edit::Append {
                parent: ctx.doc.root_id(),
                element: Box::new(element),
            },
            Edit::MoveBy {
                ids: vec![id],
                delta: origin.to_vec2(),
            },
        ];
        (Self { id, origin }, edits)
    }

    fn reshape(&self, p: Point, ctx: &ToolContext<'_>) -> Edit {
        let current = ctx.drawing_space() * p;
        let bounds = Rect::from_points(self.origin, current);
        Edit::Reshape {
            id: self.id,
            left_top: bounds.origin(),
            size: bounds.size().to_vec2(),
        }
    }
}

/// Shared state machine of the drag-out tools.
fn drag_out(
    state: &mut Option<DragOut>,
    event: &InputEvent,
    hit: Option<Hit>,
    ctx: &ToolContext<'_>,
    make: impl FnOnce(&ToolContext<'_>) -> Element,
) -> Vec<Edit> {
    match event {
        InputEvent::PointerDown { x, y, button } => {
            if *button != PointerButton::Primary || !ctx.on_canvas(hit) {
                return vec![];
            }
            let (drag, edits) = DragOut::start(make(ctx), Point::new(*x, *y), ctx);
            *state = Some(drag);
            edits
        }
        InputEvent::PointerMove { x, y } => match state {
            Some(drag) => vec![drag.reshape(Point::new(*x, *y), ctx)],
            None => vec![],
        },
        InputEvent::PointerUp { .. } | InputEvent::PointerLeave => match state.take() {
            Some(drag) => vec![Edit::Select(vec![drag.id]), Edit::Commit],
            None => vec![],
        },
    }
}

#[derive(Default)]
pub struct RectTool {
    drawing: Option<DragOut>,
}

impl RectTool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tool for RectTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Rect
    }

    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, ctx: &ToolContext<'_>) -> Vec<Edit> {
        drag_out(&mut self.drawing, event, hit, ctx, |ctx| {
            ctx.drawn(ElementKind::Rect(RectAttrs {
                x: ctx.zero("x"),
                y: ctx.zero("y"),
                width: ctx.zero("width"),
                height: ctx.zero("height"),
                ..RectAttrs::default()
            }))
        })
    }
}

#[derive(Default)]
pub struct EllipseTool {
    drawing: Option<DragOut>,
}

impl EllipseTool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tool for EllipseTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Ellipse
    }

    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, ctx: &ToolContext<'_>) -> Vec<Edit> {
        drag_out(&mut self.drawing, event, hit, ctx, |ctx| {
            ctx.drawn(ElementKind::Ellipse(EllipseAttrs {
                cx: ctx.zero("cx"),
                cy: ctx.zero("cy"),
                rx: ctx.zero("rx"),
                ry: ctx.zero("ry"),
            }))
        })
    }
}

// ─── Polyline Tool ───────────────────────────────────────────────────────

/// Click to add vertices; the last vertex follows the pointer until a
/// secondary click drops it and finishes the shape.
#[derive(Default)]
pub struct PolylineTool {
    current: Option<ElementId>,
    points: Vec<Point>,
}

impl PolylineTool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tool for PolylineTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Polyline
    }

    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, ctx: &ToolContext<'_>) -> Vec<Edit> {
        match event {
            InputEvent::PointerDown {
                x,
                y,
                button: PointerButton::Primary,
            } => {
                let q = ctx.drawing_space() * Point::new(*x, *y);
                match self.current {
                    Some(id) => {
                        self.points.push(q);
                        vec![Edit::SetPoints {
                            id,
                            points: self.points.clone(),
                        }]
                    }
                    None if ctx.on_canvas(hit) => {
                        self.points = vec![q, q];
                        let element = ctx.drawn(ElementKind::Polyline(PointsAttrs {
                            points: Some(self.points.clone()),
                        }));
                        self.current = Some(element.id);
                        log::debug!("drawing <polyline> from {q:?}");
                        vec![Edit::Append {
                            parent: ctx.doc.root_id(),
                            element: Box::new(element),
                        }]
                    }
                    None => vec![],
                }
            }
            InputEvent::PointerDown {
                button: PointerButton::Secondary,
                ..
            } => {
                let Some(id) = self.current.take() else {
                    return vec![];
                };
                self.points.pop();
                let points = std::mem::take(&mut self.points);
                vec![
                    Edit::SetPoints { id, points },
                    Edit::Select(vec![id]),
                    Edit::Commit,
                ]
            }
            InputEvent::PointerMove { x, y } => {
                let Some(id) = self.current else {
                    return vec![];
                };
                let q = ctx.drawing_space() * Point::new(*x, *y);
                if let Some(last) = self.points.last_mut() {
                    *last = q;
                }
                vec![Edit::SetPoints {
                    id,
                    points: self.points.clone(),
                }]
            }
            _ => vec![],
        }
    }
}

// ─── Text Tool ───────────────────────────────────────────────────────────

/// Places a `<text>` element with the configured content at the click.
pub struct TextTool;

impl Tool for TextTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Text
    }

    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, ctx: &ToolContext<'_>) -> Vec<Edit> {
        let InputEvent::PointerDown {
            x,
            y,
            button: PointerButton::Primary,
        } = event
        else {
            return vec![];
        };
        if !ctx.on_canvas(hit) || ctx.settings.text.is_empty() {
            return vec![];
        }
        let element = ctx.drawn(ElementKind::Text(TextAttrs {
            x: ctx.zero("x"),
            y: ctx.zero("y"),
            content: Some(ctx.settings.text.clone()),
            ..TextAttrs::default()
        }));
        let (drag, mut edits) = DragOut::start(element, Point::new(*x, *y), ctx);
        edits.push(Edit::Select(vec![drag.id]));
        edits.push(Edit::Commit);
        edits
    }
}
