//! Parsed SVG document.
//!
//! Elements live in a `StableDiGraph` arena; edges go parent → child and
//! carry the child's position. An element's `parent` is its parent's
//! [`ElementId`], resolved through the lookup index, never a graph pointer.
//! Both lookup maps are caches rebuilt after every structural mutation.

use crate::id::ElementId;
use crate::paint::Paint;
use crate::path::PathData;
use crate::transform::{Transform, ViewBox};
use crate::units::{Length, UnitResolver};
use indexmap::IndexMap;
use kurbo::Point;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

// ─── Attributes ──────────────────────────────────────────────────────────

/// Global attributes plus whatever the parser did not recognize.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseAttrs {
    pub id: Option<String>,
    pub class: Option<Vec<String>>,
    /// Unrecognized attributes, verbatim and in source order.
    pub unknown: IndexMap<String, String>,
}

/// Presentation attributes shared by drawable kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Presentation {
    pub fill: Option<Paint>,
    pub stroke: Option<Paint>,
    /// Never set on `<svg>`, whose matrix comes from its viewBox.
    pub transform: Option<Transform>,
    pub font_family: Option<String>,
    pub font_size: Option<Length>,
    pub font_style: Option<String>,
    pub font_weight: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvgAttrs {
    pub xmlns: Option<String>,
    pub xmlns_xlink: Option<String>,
    pub version: Option<f64>,
    pub x: Option<Length>,
    pub y: Option<Length>,
    pub width: Option<Length>,
    pub height: Option<Length>,
    pub view_box: Option<ViewBox>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RectAttrs {
    pub x: Option<Length>,
    pub y: Option<Length>,
    pub width: Option<Length>,
    pub height: Option<Length>,
    pub rx: Option<Length>,
    pub ry: Option<Length>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CircleAttrs {
    pub cx: Option<Length>,
    pub cy: Option<Length>,
    pub r: Option<Length>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EllipseAttrs {
    pub cx: Option<Length>,
    pub cy: Option<Length>,
    pub rx: Option<Length>,
    pub ry: Option<Length>,
}

/// `<polyline>` and `<polygon>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointsAttrs {
    pub points: Option<Vec<Point>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathAttrs {
    pub d: Option<PathData>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextAttrs {
    pub x: Option<Length>,
    pub y: Option<Length>,
    pub text_length: Option<Length>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageAttrs {
    pub x: Option<Length>,
    pub y: Option<Length>,
    pub width: Option<Length>,
    pub height: Option<Length>,
    pub href: Option<String>,
    pub xlink_href: Option<String>,
    pub preserve_aspect_ratio: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearGradientAttrs {
    pub x1: Option<Length>,
    pub y1: Option<Length>,
    pub x2: Option<Length>,
    pub y2: Option<Length>,
    pub gradient_units: Option<String>,
    pub href: Option<String>,
    pub xlink_href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadialGradientAttrs {
    pub cx: Option<Length>,
    pub cy: Option<Length>,
    pub r: Option<Length>,
    pub fx: Option<Length>,
    pub fy: Option<Length>,
    pub gradient_units: Option<String>,
    pub href: Option<String>,
    pub xlink_href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopAttrs {
    /// Unitless or `%`.
    pub offset: Option<Length>,
    pub stop_color: Option<Paint>,
    pub stop_opacity: Option<f64>,
}

/// Markup the parser does not model, kept verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnknownElement {
    pub tag: String,
    pub attrs: IndexMap<String, String>,
    pub text: Option<String>,
}

// ─── Elements ────────────────────────────────────────────────────────────

/// Closed set of element kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Svg(SvgAttrs),
    Rect(RectAttrs),
    Circle(CircleAttrs),
    Ellipse(EllipseAttrs),
    Polyline(PointsAttrs),
    Polygon(PointsAttrs),
    Path(PathAttrs),
    Text(TextAttrs),
    G,
    LinearGradient(LinearGradientAttrs),
    RadialGradient(RadialGradientAttrs),
    Stop(StopAttrs),
    Image(ImageAttrs),
    Unknown(UnknownElement),
}

impl ElementKind {
    pub fn tag_name(&self) -> &str {
        match self {
            ElementKind::Svg(_) => "svg",
            ElementKind::Rect(_) => "rect",
            ElementKind::Circle(_) => "circle",
            ElementKind::Ellipse(_) => "ellipse",
            ElementKind::Polyline(_) => "polyline",
            ElementKind::Polygon(_) => "polygon",
            ElementKind::Path(_) => "path",
            ElementKind::Text(_) => "text",
            ElementKind::G => "g",
            ElementKind::LinearGradient(_) => "linearGradient",
            ElementKind::RadialGradient(_) => "radialGradient",
            ElementKind::Stop(_) => "stop",
            ElementKind::Image(_) => "image",
            ElementKind::Unknown(u) => &u.tag,
        }
    }

    /// Whether the kind accepts a `transform` attribute.
    pub fn is_transformable(&self) -> bool {
        matches!(
            self,
            ElementKind::Rect(_)
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
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    /// Non-owning back-reference.
    pub parent: Option<ElementId>,
    pub kind: ElementKind,
    pub base: BaseAttrs,
    pub pres: Presentation,
    /// Byte offset of the start tag in the source markup; 0 when synthesized.
    pub source_offset: usize,
}

impl Element {
    /// A detached element with a fresh identity.
    pub fn new(kind: ElementKind) -> Self {
        Self {
            id: ElementId::fresh(),
            parent: None,
            kind,
            base: BaseAttrs::default(),
            pres: Presentation::default(),
            source_offset: 0,
        }
    }

    pub fn tag_name(&self) -> &str {
        self.kind.tag_name()
    }

    /// Presentation attributes, absent for unknown markup.
    pub fn presentation(&self) -> Option<&Presentation> {
        match self.kind {
            ElementKind::Unknown(_) => None,
            _ => Some(&self.pres),
        }
    }
}

// ─── Document ────────────────────────────────────────────────────────────

/// The document tree: an element arena with derived lookup maps.
#[derive(Debug, Clone)]
pub struct Document {
    /// Parent → child edges weighted by child position. Structural changes
    /// go through the methods below so the lookup maps stay current.
    pub(crate) graph: StableDiGraph<Element, u32>,
    pub root: NodeIndex,
    /// Unit measurement shared by every conversion on this document.
    pub units: UnitResolver,
    uuid_index: HashMap<ElementId, NodeIndex>,
    id_index: HashMap<String, ElementId>,
}

impl Document {
    pub fn new(mut root: Element) -> Self {
        root.parent = None;
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(root);
        let mut doc = Self {
            graph,
            root,
            units: UnitResolver::default(),
            uuid_index: HashMap::new(),
            id_index: HashMap::new(),
        };
        doc.rebuild_index();
        doc
    }

    pub fn root_id(&self) -> ElementId {
        self.graph[self.root].id
    }

    /// Element at an arena index. Panics on a stale index.
    pub fn element_at(&self, idx: NodeIndex) -> &Element {
        &self.graph[idx]
    }

    pub fn element_at_mut(&mut self, idx: NodeIndex) -> &mut Element {
        &mut self.graph[idx]
    }

    pub fn index_of(&self, id: ElementId) -> Option<NodeIndex> {
        self.uuid_index.get(&id).copied()
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.index_of(id).map(|idx| &mut self.graph[idx])
    }

    /// Resolve an `id="..."` attribute value.
    pub fn lookup_id_attr(&self, id_attr: &str) -> Option<ElementId> {
        self.id_index.get(id_attr).copied()
    }

    /// Parent index, resolved through the element's `parent` identity.
    pub fn parent_index(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph[idx].parent.and_then(|p| self.index_of(p))
    }

    /// Number of elements in the tree, the root included.
    pub fn element_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Children in document order.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<(u32, NodeIndex)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (*e.weight(), e.target()))
            .collect();
        edges.sort();
        edges.into_iter().map(|(_, child)| child).collect()
    }

    /// Append `element` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeIndex, element: Element) -> NodeIndex {
        let idx = self.attach(parent, element);
        self.rebuild_index();
        idx
    }

    /// Attach without rebuilding the lookup maps. Callers must rebuild.
    pub(crate) fn attach(&mut self, parent: NodeIndex, mut element: Element) -> NodeIndex {
        let position = self
            .graph
            .edges_directed(parent, Direction::Outgoing)
            .map(|e| *e.weight() + 1)
            .max()
            .unwrap_or(0);
        element.parent = Some(self.graph[parent].id);
        log::debug!(
            "attach <{}> {:?} under {:?} at {position}",
            element.tag_name(),
            element.id,
            self.graph[parent].id
        );
        let idx = self.graph.add_node(element);
        self.graph.add_edge(parent, idx, position);
        idx
    }

    /// Remove an element and its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, idx: NodeIndex) -> Option<Element> {
        if idx == self.root {
            return None;
        }
        let mut stack = self.children(idx);
        while let Some(child) = stack.pop() {
            stack.extend(self.children(child));
            self.graph.remove_node(child);
        }
        let removed = self.graph.remove_node(idx);
        if let Some(element) = &removed {
            log::debug!("removed <{}> {:?}", element.tag_name(), element.id);
        }
        self.rebuild_index();
        removed
    }

    /// Deep-copy the subtree at `idx` under `parent` with fresh identities.
    pub fn duplicate_subtree(&mut self, idx: NodeIndex, parent: NodeIndex) -> NodeIndex {
        let copy = self.copy_into(idx, parent);
        self.rebuild_index();
        copy
    }

    fn copy_into(&mut self, idx: NodeIndex, parent: NodeIndex) -> NodeIndex {
        let mut element = self.graph[idx].clone();
        element.id = ElementId::fresh();
        let copy = self.attach(parent, element);
        for child in self.children(idx) {
            self.copy_into(child, copy);
        }
        copy
    }

    /// Depth-first pre-order walk from the root.
    pub fn descendants(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            out.push(current);
            let mut children = self.children(current);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Recompute the uuid and `id` attribute maps from the tree.
    pub fn rebuild_index(&mut self) {
        self.uuid_index.clear();
        self.id_index.clear();
        for idx in self.graph.node_indices() {
            let element = &self.graph[idx];
            self.uuid_index.insert(element.id, idx);
        }
        for idx in self.descendants(self.root) {
            let element = &self.graph[idx];
            if let Some(id_attr) = &element.base.id {
                self.id_index.entry(id_attr.clone()).or_insert(element.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_children(n: usize) -> (Document, Vec<NodeIndex>) {
        let mut doc = Document::new(Element::new(ElementKind::Svg(SvgAttrs::default())));
        let root = doc.root;
        let children = (0..n)
            .map(|_| doc.append_child(root, Element::new(ElementKind::G)))
            .collect();
        (doc, children)
    }

    #[test]
    fn children_keep_insertion_order() {
        let (doc, children) = doc_with_children(3);
        assert_eq!(doc.children(doc.root), children);
    }

    #[test]
    fn parent_resolves_through_identity() {
        let (doc, children) = doc_with_children(1);
        assert_eq!(doc.parent_index(children[0]), Some(doc.root));
        assert_eq!(doc.element_at(children[0]).parent, Some(doc.root_id()));
        assert_eq!(doc.parent_index(doc.root), None);
    }

    #[test]
    fn remove_drops_subtree_and_index() {
        let (mut doc, children) = doc_with_children(2);
        let grandchild = doc.append_child(children[0], Element::new(ElementKind::G));
        let grandchild_id = doc.element_at(grandchild).id;

        doc.remove(children[0]);
        assert!(doc.get(grandchild_id).is_none());
        assert_eq!(doc.children(doc.root), vec![children[1]]);
        assert!(doc.remove(doc.root).is_none());
        assert_eq!(doc.element_count(), 2);
    }

    #[test]
    fn id_attribute_index_tracks_mutations() {
        let (mut doc, children) = doc_with_children(1);
        let mut rect = Element::new(ElementKind::Rect(RectAttrs::default()));
        rect.base.id = Some("box".into());
        let rect_id = rect.id;
        let idx = doc.append_child(children[0], rect);
        assert_eq!(doc.lookup_id_attr("box"), Some(rect_id));
        doc.remove(idx);
        assert_eq!(doc.lookup_id_attr("box"), None);
    }

    #[test]
    fn duplicate_assigns_fresh_ids() {
        let (mut doc, children) = doc_with_children(1);
        doc.append_child(children[0], Element::new(ElementKind::G));
        let copy = doc.duplicate_subtree(children[0], doc.root);

        assert_ne!(doc.element_at(copy).id, doc.element_at(children[0]).id);
        let copied_child = doc.children(copy)[0];
        assert_eq!(doc.element_at(copied_child).parent, Some(doc.element_at(copy).id));
        assert_eq!(doc.children(doc.root).len(), 2);
    }
}
