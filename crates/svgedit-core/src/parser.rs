//! Markup → [`Document`].
//!
//! `roxmltree` tokenizes; this module turns raw attribute maps into typed
//! attributes. Known names are popped off the raw map, the rest is kept
//! verbatim and reported. Nothing short of malformed XML aborts a parse:
//! invalid values become warnings and read as absent.

use crate::diagnostics::{SourceRange, Warning};
use crate::error::{NumberListError, ParseError};
use crate::model::{
    CircleAttrs, Document, Element, ElementKind, EllipseAttrs, ImageAttrs,
    LinearGradientAttrs, PathAttrs, PointsAttrs, Presentation, RadialGradientAttrs, RectAttrs,
    StopAttrs, SvgAttrs, TextAttrs, UnknownElement,
};
use crate::paint::Paint;
use crate::path::{PathData, parse_path_data};
use crate::syntax::number_list;
use crate::transform::{Transform, ViewBox, parse_transform_list};
use crate::units::{Length, LengthUnit};
use indexmap::IndexMap;
use kurbo::Point;
use petgraph::graph::NodeIndex;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// A parsed document with everything the parser had to skip or degrade.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub document: Document,
    pub warnings: Vec<Warning>,
}

/// Parse SVG markup.
///
/// # Errors
/// Only when the markup is not well-formed XML.
pub fn parse_document(markup: &str) -> Result<Parsed, ParseError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let xml = roxmltree::Document::parse_with_options(markup, options)?;
    let mut ctx = Ctx {
        source: markup,
        warnings: Vec::new(),
    };
    let root_node = xml.root_element();
    let mut document = Document::new(parse_element(root_node, &mut ctx));
    let root = document.root;
    parse_children(root_node, root, &mut document, &mut ctx);
    document.rebuild_index();
    log::debug!(
        "parsed {} elements with {} warnings",
        document.element_count(),
        ctx.warnings.len()
    );
    Ok(Parsed {
        document,
        warnings: ctx.warnings,
    })
}

struct Ctx<'s> {
    source: &'s str,
    warnings: Vec<Warning>,
}

fn parse_children(
    node: roxmltree::Node<'_, '_>,
    parent: NodeIndex,
    document: &mut Document,
    ctx: &mut Ctx<'_>,
) {
    for child in node.children().filter(roxmltree::Node::is_element) {
        let element = parse_element(child, ctx);
        let idx = document.attach(parent, element);
        parse_children(child, idx, document, ctx);
    }
}

/// `prefix:local` for namespaced names, `local` otherwise.
fn qualified_name(node: roxmltree::Node<'_, '_>, namespace: Option<&str>, local: &str) -> String {
    match namespace.and_then(|uri| node.lookup_prefix(uri)) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

/// Attributes as written, namespace declarations first.
fn raw_attributes(node: roxmltree::Node<'_, '_>) -> IndexMap<String, String> {
    let mut raw = IndexMap::new();
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    for ns in node.namespaces() {
        if ns.name() == Some("xml") || inherited.contains(&(ns.name(), ns.uri())) {
            continue;
        }
        let name = match ns.name() {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        };
        raw.insert(name, ns.uri().to_string());
    }
    for attr in node.attributes() {
        raw.insert(
            qualified_name(node, attr.namespace(), attr.name()),
            attr.value().to_string(),
        );
    }
    raw
}

/// Character data of `node`. With element children around it the text is
/// layout, so each run is trimmed and blank runs are dropped; the emitter
/// re-indents children itself.
fn text_content(node: roxmltree::Node<'_, '_>) -> Option<String> {
    let mixed = node.children().any(|n| n.is_element());
    let text: String = node
        .children()
        .filter(roxmltree::Node::is_text)
        .filter_map(|n| n.text())
        .map(|t| if mixed { t.trim() } else { t })
        .collect();
    (!text.is_empty()).then_some(text)
}

fn parse_element(node: roxmltree::Node<'_, '_>, ctx: &mut Ctx<'_>) -> Element {
    let offset = node.range().start;
    let range = SourceRange::at(ctx.source, offset);
    let tag = node.tag_name();
    let in_svg_ns = matches!(tag.namespace(), None | Some(SVG_NS));
    let mut attrs = AttrReader {
        raw: raw_attributes(node),
        range,
        warnings: &mut ctx.warnings,
    };

    let kind = match (in_svg_ns, tag.name()) {
        (true, "svg") => ElementKind::Svg(SvgAttrs {
            xmlns: attrs.take("xmlns"),
            xmlns_xlink: attrs.take("xmlns:xlink"),
            version: attrs.number("version"),
            x: attrs.length("x"),
            y: attrs.length("y"),
            width: attrs.length("width"),
            height: attrs.length("height"),
            view_box: attrs.view_box("viewBox"),
        }),
        (true, "rect") => ElementKind::Rect(RectAttrs {
            x: attrs.length("x"),
            y: attrs.length("y"),
            width: attrs.length("width"),
            height: attrs.length("height"),
            rx: attrs.length("rx"),
            ry: attrs.length("ry"),
        }),
        (true, "circle") => ElementKind::Circle(CircleAttrs {
            cx: attrs.length("cx"),
            cy: attrs.length("cy"),
            r: attrs.length("r"),
        }),
        (true, "ellipse") => ElementKind::Ellipse(EllipseAttrs {
            cx: attrs.length("cx"),
            cy: attrs.length("cy"),
            rx: attrs.length("rx"),
            ry: attrs.length("ry"),
        }),
        (true, "polyline") => ElementKind::Polyline(PointsAttrs {
            points: attrs.points("points"),
        }),
        (true, "polygon") => ElementKind::Polygon(PointsAttrs {
            points: attrs.points("points"),
        }),
        (true, "path") => ElementKind::Path(PathAttrs { d: attrs.path("d") }),
        (true, "text") => ElementKind::Text(TextAttrs {
            x: attrs.length("x"),
            y: attrs.length("y"),
            text_length: attrs.length("textLength"),
            content: text_content(node),
        }),
        (true, "g") => ElementKind::G,
        (true, "image") => ElementKind::Image(ImageAttrs {
            x: attrs.length("x"),
            y: attrs.length("y"),
            width: attrs.length("width"),
            height: attrs.length("height"),
            href: attrs.take("href"),
            xlink_href: attrs.take("xlink:href"),
            preserve_aspect_ratio: attrs.take("preserveAspectRatio"),
        }),
        (true, "linearGradient") => ElementKind::LinearGradient(LinearGradientAttrs {
            x1: attrs.length("x1"),
            y1: attrs.length("y1"),
            x2: attrs.length("x2"),
            y2: attrs.length("y2"),
            gradient_units: attrs.take("gradientUnits"),
            href: attrs.take("href"),
            xlink_href: attrs.take("xlink:href"),
        }),
        (true, "radialGradient") => ElementKind::RadialGradient(RadialGradientAttrs {
            cx: attrs.length("cx"),
            cy: attrs.length("cy"),
            r: attrs.length("r"),
            fx: attrs.length("fx"),
            fy: attrs.length("fy"),
            gradient_units: attrs.take("gradientUnits"),
            href: attrs.take("href"),
            xlink_href: attrs.take("xlink:href"),
        }),
        (true, "stop") => ElementKind::Stop(StopAttrs {
            offset: attrs.stop_offset("offset"),
            stop_color: attrs.paint("stop-color"),
            stop_opacity: attrs.number("stop-opacity"),
        }),
        _ => {
            let tag = qualified_name(node, tag.namespace(), tag.name());
            attrs.warn(format!("`{tag}` is unsupported element."));
            let mut element = Element::new(ElementKind::Unknown(UnknownElement {
                tag,
                attrs: attrs.raw,
                text: text_content(node),
            }));
            element.source_offset = offset;
            return element;
        }
    };

    let mut element = Element::new(kind);
    element.source_offset = offset;
    element.base.id = attrs.take("id");
    element.base.class = attrs
        .take("class")
        .map(|c| c.split_whitespace().map(str::to_string).collect());
    match &element.kind {
        ElementKind::Svg(_) => element.pres = attrs.presentation(false),
        kind if kind.is_transformable() => element.pres = attrs.presentation(true),
        _ => {}
    }
    element.base.unknown = attrs.finish();
    element
}

// ─── Attribute reader ────────────────────────────────────────────────────

struct AttrReader<'w> {
    raw: IndexMap<String, String>,
    range: SourceRange,
    warnings: &'w mut Vec<Warning>,
}

impl AttrReader<'_> {
    fn warn(&mut self, message: String) {
        log::warn!("line {}: {message}", self.range.line + 1);
        self.warnings.push(Warning::new(self.range, message));
    }

    fn take(&mut self, name: &str) -> Option<String> {
        self.raw.shift_remove(name)
    }

    /// Pop `name` and convert it, warning and yielding `None` on failure.
    fn convert<T, E: std::fmt::Display>(
        &mut self,
        name: &str,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> Option<T> {
        let value = self.take(name)?;
        match parse(&value) {
            Ok(v) => Some(v),
            Err(e) => {
                self.warn(format!("`{name}`: {e}"));
                None
            }
        }
    }

    fn length(&mut self, name: &str) -> Option<Length> {
        self.convert(name, |v| Length::parse(v, name))
    }

    fn number(&mut self, name: &str) -> Option<f64> {
        self.convert(name, |v| match Length::parse(v, name) {
            Ok(Length { value, unit: None, .. }) => Ok(value),
            _ => Err(format!("`{v}` is not a number")),
        })
    }

    fn stop_offset(&mut self, name: &str) -> Option<Length> {
        self.convert(name, |v| match Length::parse(v, name) {
            Ok(l) if matches!(l.unit, None | Some(LengthUnit::Percent)) => Ok(l),
            _ => Err(format!("`{v}` is not a number or percentage")),
        })
    }

    fn paint(&mut self, name: &str) -> Option<Paint> {
        self.convert(name, Paint::parse)
    }

    fn path(&mut self, name: &str) -> Option<PathData> {
        self.convert(name, parse_path_data)
    }

    fn transform(&mut self, name: &str) -> Option<Transform> {
        self.convert(name, parse_transform_list)
    }

    fn view_box(&mut self, name: &str) -> Option<ViewBox> {
        self.convert(name, ViewBox::parse)
    }

    fn points(&mut self, name: &str) -> Option<Vec<Point>> {
        self.convert(name, parse_points)
    }

    fn presentation(&mut self, with_transform: bool) -> Presentation {
        Presentation {
            fill: self.paint("fill"),
            stroke: self.paint("stroke"),
            transform: if with_transform {
                self.transform("transform")
            } else {
                None
            },
            font_family: self.take("font-family"),
            font_size: self.length("font-size"),
            font_style: self.take("font-style"),
            font_weight: self.take("font-weight"),
        }
    }

    /// Report and return whatever was not consumed.
    fn finish(mut self) -> IndexMap<String, String> {
        let names: Vec<String> = self.raw.keys().cloned().collect();
        for name in names {
            self.warn(format!("`{name}` is unsupported property."));
        }
        self.raw
    }
}

/// `points` grammar: whitespace/comma separated coordinate pairs.
pub fn parse_points(text: &str) -> Result<Vec<Point>, NumberListError> {
    let invalid = |message: String| NumberListError {
        value: text.to_string(),
        message,
    };
    let nums = number_list(text).map_err(|at| invalid(format!("unexpected input at offset {at}")))?;
    if nums.len() % 2 != 0 {
        return Err(invalid("odd number of coordinates".into()));
    }
    Ok(nums.chunks_exact(2).map(|c| Point::new(c[0], c[1])).collect())
}
