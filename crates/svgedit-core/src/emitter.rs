//! Emitter: [`Document`] → SVG markup.
//!
//! Typed attributes are re-serialized with the configured precision;
//! unknown attributes and unknown elements are written back verbatim.

use crate::model::*;
use crate::units::{Length, format_number};
use petgraph::graph::NodeIndex;

/// Output options, usually derived from [`crate::EditorConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitOptions {
    /// Decimal places for lengths, coordinates and matrices.
    pub decimal_places: u32,
    /// Emit elements the parser did not model.
    pub show_unresolved: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            decimal_places: 1,
            show_unresolved: true,
        }
    }
}

/// Emit the whole document.
#[must_use]
pub fn emit_document(doc: &Document, options: &EmitOptions) -> String {
    let mut out = String::with_capacity(1024);
    emit_element(&mut out, doc, doc.root, 0, options);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn emit_element(out: &mut String, doc: &Document, idx: NodeIndex, depth: usize, options: &EmitOptions) {
    let element = doc.element_at(idx);
    if matches!(element.kind, ElementKind::Unknown(_)) && !options.show_unresolved {
        return;
    }

    let mut attrs = AttrWriter {
        out: Vec::new(),
        places: options.decimal_places,
    };
    attrs.str("id", element.base.id.as_deref());
    if let Some(class) = &element.base.class {
        attrs.push("class", class.join(" "));
    }
    let text = write_kind_attrs(&mut attrs, &element.kind);
    if element.presentation().is_some() {
        write_presentation(&mut attrs, &element.pres);
    }
    for (name, value) in &element.base.unknown {
        attrs.push(name, value.clone());
    }

    let tag = element.tag_name();
    let children: Vec<NodeIndex> = doc
        .children(idx)
        .into_iter()
        .filter(|c| {
            options.show_unresolved || !matches!(doc.element_at(*c).kind, ElementKind::Unknown(_))
        })
        .collect();
    indent(out, depth);
    out.push('<');
    out.push_str(tag);
    for (name, value) in &attrs.out {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }

    if children.is_empty() && text.is_none() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if let Some(text) = text {
        out.push_str(&escape_text(text));
    }
    if !children.is_empty() {
        for child in children {
            out.push('\n');
            emit_element(out, doc, child, depth + 1, options);
        }
        out.push('\n');
        indent(out, depth);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// Write kind-specific attributes; returns the text content, if any.
fn write_kind_attrs<'e>(attrs: &mut AttrWriter, kind: &'e ElementKind) -> Option<&'e str> {
    match kind {
        ElementKind::Svg(svg) => {
            attrs.str("xmlns", svg.xmlns.as_deref());
            attrs.str("xmlns:xlink", svg.xmlns_xlink.as_deref());
            if let Some(version) = svg.version {
                attrs.push("version", format!("{version}"));
            }
            attrs.length("x", &svg.x);
            attrs.length("y", &svg.y);
            attrs.length("width", &svg.width);
            attrs.length("height", &svg.height);
            if let Some(vb) = &svg.view_box {
                attrs.push("viewBox", vb.to_string_with(attrs.places));
            }
            None
        }
        ElementKind::Rect(r) => {
            attrs.length("x", &r.x);
            attrs.length("y", &r.y);
            attrs.length("width", &r.width);
            attrs.length("height", &r.height);
            attrs.length("rx", &r.rx);
            attrs.length("ry", &r.ry);
            None
        }
        ElementKind::Circle(c) => {
            attrs.length("cx", &c.cx);
            attrs.length("cy", &c.cy);
            attrs.length("r", &c.r);
            None
        }
        ElementKind::Ellipse(e) => {
            attrs.length("cx", &e.cx);
            attrs.length("cy", &e.cy);
            attrs.length("rx", &e.rx);
            attrs.length("ry", &e.ry);
            None
        }
        ElementKind::Polyline(p) | ElementKind::Polygon(p) => {
            if let Some(points) = &p.points {
                let text = points
                    .iter()
                    .map(|pt| {
                        format!(
                            "{},{}",
                            format_number(pt.x, attrs.places),
                            format_number(pt.y, attrs.places)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                attrs.push("points", text);
            }
            None
        }
        ElementKind::Path(p) => {
            if let Some(d) = &p.d {
                attrs.push("d", d.to_string_with(attrs.places));
            }
            None
        }
        ElementKind::Text(t) => {
            attrs.length("x", &t.x);
            attrs.length("y", &t.y);
            attrs.length("textLength", &t.text_length);
            t.content.as_deref()
        }
        ElementKind::G => None,
        ElementKind::Image(i) => {
            attrs.length("x", &i.x);
            attrs.length("y", &i.y);
            attrs.length("width", &i.width);
            attrs.length("height", &i.height);
            attrs.str("href", i.href.as_deref());
            attrs.str("xlink:href", i.xlink_href.as_deref());
            attrs.str("preserveAspectRatio", i.preserve_aspect_ratio.as_deref());
            None
        }
        ElementKind::LinearGradient(g) => {
            attrs.length("x1", &g.x1);
            attrs.length("y1", &g.y1);
            attrs.length("x2", &g.x2);
            attrs.length("y2", &g.y2);
            attrs.str("gradientUnits", g.gradient_units.as_deref());
            attrs.str("href", g.href.as_deref());
            attrs.str("xlink:href", g.xlink_href.as_deref());
            None
        }
        ElementKind::RadialGradient(g) => {
            attrs.length("cx", &g.cx);
            attrs.length("cy", &g.cy);
            attrs.length("r", &g.r);
            attrs.length("fx", &g.fx);
            attrs.length("fy", &g.fy);
            attrs.str("gradientUnits", g.gradient_units.as_deref());
            attrs.str("href", g.href.as_deref());
            attrs.str("xlink:href", g.xlink_href.as_deref());
            None
        }
        ElementKind::Stop(s) => {
            attrs.length("offset", &s.offset);
            if let Some(color) = &s.stop_color {
                attrs.push("stop-color", color.to_string());
            }
            if let Some(opacity) = s.stop_opacity {
                attrs.push("stop-opacity", format_number(opacity, attrs.places));
            }
            None
        }
        ElementKind::Unknown(u) => {
            for (name, value) in &u.attrs {
                attrs.push(name, value.clone());
            }
            u.text.as_deref()
        }
    }
}

fn write_presentation(attrs: &mut AttrWriter, pres: &Presentation) {
    if let Some(fill) = &pres.fill {
        attrs.push("fill", fill.to_string());
    }
    if let Some(stroke) = &pres.stroke {
        attrs.push("stroke", stroke.to_string());
    }
    if let Some(transform) = &pres.transform
        && !transform.is_empty()
    {
        attrs.push("transform", transform.to_string_with(attrs.places));
    }
    attrs.str("font-family", pres.font_family.as_deref());
    attrs.length("font-size", &pres.font_size);
    attrs.str("font-style", pres.font_style.as_deref());
    attrs.str("font-weight", pres.font_weight.as_deref());
}

struct AttrWriter {
    out: Vec<(String, String)>,
    places: u32,
}

impl AttrWriter {
    fn push(&mut self, name: &str, value: String) {
        self.out.push((name.to_string(), value));
    }

    fn str(&mut self, name: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.push(name, v.to_string());
        }
    }

    fn length(&mut self, name: &str, value: &Option<Length>) {
        if let Some(l) = value {
            self.push(name, l.to_string_with(self.places));
        }
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;
    use pretty_assertions::assert_eq;

    fn roundtrip(markup: &str, options: &EmitOptions) -> String {
        let parsed = parse_document(markup).unwrap();
        emit_document(&parsed.document, options)
    }

    #[test]
    fn emits_nested_markup() {
        let out = roundtrip(
            r#"<svg width="100" height="100"><g transform="translate(10 0)"><circle cx="50" cy="50" r="40" fill="red"/></g></svg>"#,
            &EmitOptions::default(),
        );
        assert_eq!(
            out,
            "<svg width=\"100\" height=\"100\">\n  <g transform=\"translate(10 0)\">\n    <circle cx=\"50\" cy=\"50\" r=\"40\" fill=\"red\"/>\n  </g>\n</svg>"
        );
    }

    #[test]
    fn unknown_markup_is_verbatim_or_hidden() {
        let markup = r#"<svg><foo bar="1 &amp; 2">hi</foo><rect data-x="y"/></svg>"#;
        let shown = roundtrip(markup, &EmitOptions::default());
        assert_eq!(
            shown,
            "<svg>\n  <foo bar=\"1 &amp; 2\">hi</foo>\n  <rect data-x=\"y\"/>\n</svg>"
        );
        let hidden = roundtrip(
            markup,
            &EmitOptions {
                show_unresolved: false,
                ..EmitOptions::default()
            },
        );
        assert_eq!(hidden, "<svg>\n  <rect data-x=\"y\"/>\n</svg>");
    }

    #[test]
    fn stop_numbers_use_configured_precision() {
        let out = roundtrip(
            r#"<svg><linearGradient><stop offset="33.333%" stop-opacity="0.125"/></linearGradient></svg>"#,
            &EmitOptions::default(),
        );
        assert!(out.contains(r#"<stop offset="33.3%" stop-opacity="0.1"/>"#), "{out}");
    }

    #[test]
    fn nested_unknown_markup_is_a_fixed_point() {
        let markup = "<svg>\n  <metadata>\n    <creator>gen</creator>\n  </metadata>\n</svg>";
        let once = roundtrip(markup, &EmitOptions::default());
        let twice = roundtrip(&once, &EmitOptions::default());
        assert_eq!(once, markup);
        assert_eq!(twice, once);
    }

    #[test]
    fn text_content_stays_inline() {
        let out = roundtrip(r#"<svg><text x="1" y="2">a &lt; b</text></svg>"#, &EmitOptions::default());
        assert_eq!(out, "<svg>\n  <text x=\"1\" y=\"2\">a &lt; b</text>\n</svg>");
    }

    #[test]
    fn numbers_use_configured_precision() {
        let out = roundtrip(
            r#"<svg><path d="M 0.123 1.987 L 2 2"/><polyline points="0.25,1 2,3"/></svg>"#,
            &EmitOptions {
                decimal_places: 2,
                show_unresolved: true,
            },
        );
        assert_eq!(
            out,
            "<svg>\n  <path d=\"M 0.12 1.99 L 2 2\"/>\n  <polyline points=\"0.25,1 2,3\"/>\n</svg>"
        );
    }
}
