//! Path data (`d` attribute).
//!
//! Commands keep the case they were written in. Geometry helpers track the
//! absolute current point themselves, so relative commands work without
//! normalizing the whole path first.

use crate::error::PathParseError;
use crate::syntax::{flag, number, skip_comma_wsp, skip_wsp};
use crate::units::format_number;
use kurbo::{Arc, Point, Rect, SvgArc, Vec2};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use winnow::prelude::*;

/// Tolerance used when flattening arcs into cubic segments.
const ARC_TOLERANCE: f64 = 0.1;

/// Number of arguments an SVG path command letter takes.
pub fn arity(letter: char) -> Option<usize> {
    match letter.to_ascii_uppercase() {
        'M' | 'L' | 'T' => Some(2),
        'H' | 'V' => Some(1),
        'S' | 'Q' => Some(4),
        'C' => Some(6),
        'A' => Some(7),
        'Z' => Some(0),
        _ => None,
    }
}

/// One path command. The argument count always matches the letter.
#[derive(Debug, Clone, PartialEq)]
pub struct PathCommand {
    letter: char,
    args: SmallVec<[f64; 7]>,
}

impl PathCommand {
    /// Build a command, or `None` if the letter is unknown or `args` has the
    /// wrong length.
    pub fn new(letter: char, args: &[f64]) -> Option<Self> {
        (arity(letter)? == args.len()).then(|| Self {
            letter,
            args: SmallVec::from_slice(args),
        })
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    pub fn args(&self) -> &[f64] {
        &self.args
    }

    /// Arguments are editable in place; their count is fixed.
    pub fn args_mut(&mut self) -> &mut [f64] {
        &mut self.args
    }

    pub fn is_relative(&self) -> bool {
        self.letter.is_ascii_lowercase()
    }

    fn upper(&self) -> char {
        self.letter.to_ascii_uppercase()
    }

    fn write_with(&self, out: &mut String, fmt_num: &dyn Fn(f64) -> String) {
        out.push(self.letter);
        for arg in &self.args {
            out.push(' ');
            out.push_str(&fmt_num(*arg));
        }
    }
}

/// Parsed `d` attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathData {
    commands: Vec<PathCommand>,
}

impl PathData {
    pub fn new(commands: Vec<PathCommand>) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<PathCommand> {
        self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn has_arcs(&self) -> bool {
        self.commands.iter().any(|c| c.upper() == 'A')
    }

    /// Serialize with every number rounded to `places` decimals.
    pub fn to_string_with(&self, places: u32) -> String {
        let fmt_num = |v: f64| format_number(v, places);
        self.join(&fmt_num)
    }

    fn join(&self, fmt_num: &dyn Fn(f64) -> String) -> String {
        let mut out = String::new();
        for (i, cmd) in self.commands.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            cmd.write_with(&mut out, fmt_num);
        }
        out
    }

    /// Visit each command with the absolute current point before it.
    ///
    /// Current points are computed from the commands as they were before the
    /// visitor touched them.
    pub fn iterate<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut PathCommand, Point, usize),
    {
        let mut pen = Pen::default();
        for (i, cmd) in self.commands.iter_mut().enumerate() {
            let before = pen.current;
            pen.advance(cmd);
            f(cmd, before, i);
        }
    }

    /// Every anchor and control point in absolute coordinates.
    pub fn vertexes(&self) -> Vec<Point> {
        let mut out = Vec::with_capacity(self.commands.len() * 2);
        let mut pen = Pen::default();
        for cmd in &self.commands {
            let origin = if cmd.is_relative() {
                pen.current.to_vec2()
            } else {
                Vec2::ZERO
            };
            let a = cmd.args();
            match cmd.upper() {
                'H' | 'V' => {}
                'C' => {
                    out.push(Point::new(a[0], a[1]) + origin);
                    out.push(Point::new(a[2], a[3]) + origin);
                }
                'S' | 'Q' => out.push(Point::new(a[0], a[1]) + origin),
                _ => {}
            }
            pen.advance(cmd);
            if cmd.upper() != 'Z' {
                out.push(pen.current);
            }
        }
        out
    }

    /// Bounding box of the vertexes after arc normalization.
    pub fn bbox(&self) -> Option<Rect> {
        let vertexes = if self.has_arcs() {
            let mut flat = self.clone();
            flat.unarc();
            flat.vertexes()
        } else {
            self.vertexes()
        };
        let first = *vertexes.first()?;
        Some(
            vertexes
                .iter()
                .fold(Rect::from_points(first, first), |r, p| r.union_pt(*p)),
        )
    }

    /// Replace every elliptical arc with cubic Béziers, keeping case.
    ///
    /// Zero-radius arcs become lines; arcs whose endpoints coincide are
    /// dropped. A path without arcs is left untouched.
    pub fn unarc(&mut self) {
        if !self.has_arcs() {
            return;
        }
        let mut out = Vec::with_capacity(self.commands.len());
        let mut pen = Pen::default();
        for cmd in self.commands.drain(..) {
            let start = pen.current;
            pen.advance(&cmd);
            if cmd.upper() != 'A' {
                out.push(cmd);
                continue;
            }
            let a = cmd.args();
            let relative = cmd.is_relative();
            let svg_arc = SvgArc {
                from: start,
                to: pen.current,
                radii: Vec2::new(a[0], a[1]),
                x_rotation: a[2].to_radians(),
                large_arc: a[3] != 0.0,
                sweep: a[4] != 0.0,
            };
            match Arc::from_svg_arc(&svg_arc) {
                Some(arc) => {
                    let mut seg_start = start;
                    arc.to_cubic_beziers(ARC_TOLERANCE, |p1, p2, p| {
                        let o = if relative { seg_start.to_vec2() } else { Vec2::ZERO };
                        let args = [p1.x - o.x, p1.y - o.y, p2.x - o.x, p2.y - o.y, p.x - o.x, p.y - o.y];
                        out.push(PathCommand {
                            letter: if relative { 'c' } else { 'C' },
                            args: SmallVec::from_slice(&args),
                        });
                        seg_start = p;
                    });
                }
                None if start != pen.current => {
                    let (x, y) = if relative { (a[5], a[6]) } else { (pen.current.x, pen.current.y) };
                    out.push(PathCommand {
                        letter: if relative { 'l' } else { 'L' },
                        args: SmallVec::from_slice(&[x, y]),
                    });
                }
                None => {}
            }
        }
        log::trace!("unarc: {} commands after normalization", out.len());
        self.commands = out;
    }

    /// Translate every absolute coordinate. Relative offsets are unchanged,
    /// except a leading `m`, which is absolute by definition.
    pub fn translate(&mut self, delta: Vec2) {
        self.iterate(|cmd, _, i| {
            let leading_move = i == 0 && cmd.letter == 'm';
            if cmd.is_relative() && !leading_move {
                return;
            }
            match cmd.upper() {
                'H' => cmd.args[0] += delta.x,
                'V' => cmd.args[0] += delta.y,
                'A' => {
                    cmd.args[5] += delta.x;
                    cmd.args[6] += delta.y;
                }
                'Z' => {}
                _ => {
                    let n = if leading_move { 2 } else { cmd.args.len() };
                    for j in (0..n).step_by(2) {
                        cmd.args[j] += delta.x;
                        cmd.args[j + 1] += delta.y;
                    }
                }
            }
        });
    }

    /// Scale about `origin` by `ratio` per axis.
    pub fn scale_about(&mut self, origin: Point, ratio: Vec2) {
        self.iterate(|cmd, _, i| {
            let absolute = !cmd.is_relative() || (i == 0 && cmd.letter == 'm');
            let sx = |x: f64| if absolute { origin.x + (x - origin.x) * ratio.x } else { x * ratio.x };
            let sy = |y: f64| if absolute { origin.y + (y - origin.y) * ratio.y } else { y * ratio.y };
            match cmd.upper() {
                'H' => cmd.args[0] = sx(cmd.args[0]),
                'V' => cmd.args[0] = sy(cmd.args[0]),
                'A' => {
                    cmd.args[0] *= ratio.x.abs();
                    cmd.args[1] *= ratio.y.abs();
                    cmd.args[5] = sx(cmd.args[5]);
                    cmd.args[6] = sy(cmd.args[6]);
                }
                'Z' => {}
                _ => {
                    for j in (0..cmd.args.len()).step_by(2) {
                        cmd.args[j] = sx(cmd.args[j]);
                        cmd.args[j + 1] = sy(cmd.args[j + 1]);
                    }
                }
            }
        });
    }
}

/// Lossless form: numbers print with full precision.
impl fmt::Display for PathData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_num = |v: f64| format!("{v}");
        f.write_str(&self.join(&fmt_num))
    }
}

impl FromStr for PathData {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_path_data(s)
    }
}

/// Current point bookkeeping shared by the geometry helpers.
#[derive(Debug, Default)]
struct Pen {
    current: Point,
    subpath_start: Point,
}

impl Pen {
    fn advance(&mut self, cmd: &PathCommand) {
        let a = cmd.args();
        let base = if cmd.is_relative() {
            self.current.to_vec2()
        } else {
            Vec2::ZERO
        };
        match cmd.upper() {
            'M' => {
                self.current = Point::new(a[0], a[1]) + base;
                self.subpath_start = self.current;
            }
            'L' | 'T' => self.current = Point::new(a[0], a[1]) + base,
            'H' => self.current.x = a[0] + base.x,
            'V' => self.current.y = a[0] + base.y,
            'C' => self.current = Point::new(a[4], a[5]) + base,
            'S' | 'Q' => self.current = Point::new(a[2], a[3]) + base,
            'A' => self.current = Point::new(a[5], a[6]) + base,
            _ => self.current = self.subpath_start,
        }
    }
}

// ─── Parser ──────────────────────────────────────────────────────────────

fn starts_number(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
}

/// Parse a `d` attribute.
///
/// Implicit repeats expand to separate commands; the repeat of a moveto is a
/// lineto of the same case. An empty string is an empty path.
pub fn parse_path_data(text: &str) -> Result<PathData, PathParseError> {
    let offset = |rest: &str| text.len() - rest.len();
    let mut rest = text;
    let mut commands = Vec::new();
    skip_wsp(&mut rest);

    while let Some(letter) = rest.chars().next() {
        let Some(n) = arity(letter) else {
            return Err(PathParseError::new(
                offset(rest),
                format!("unexpected `{letter}`"),
            ));
        };
        if commands.is_empty() && letter.to_ascii_uppercase() != 'M' {
            return Err(PathParseError::new(
                offset(rest),
                "path data must begin with a moveto",
            ));
        }
        rest = &rest[letter.len_utf8()..];
        skip_wsp(&mut rest);

        if n == 0 {
            commands.push(PathCommand {
                letter,
                args: SmallVec::new(),
            });
            skip_comma_wsp(&mut rest);
            continue;
        }

        let mut current = letter;
        loop {
            let mut args: SmallVec<[f64; 7]> = SmallVec::new();
            for k in 0..n {
                if k > 0 {
                    skip_comma_wsp(&mut rest);
                }
                let arc_flag = current.eq_ignore_ascii_case(&'a') && (k == 3 || k == 4);
                let parsed = if arc_flag {
                    flag.parse_next(&mut rest).map(|b| if b { 1.0 } else { 0.0 })
                } else {
                    number.parse_next(&mut rest)
                };
                match parsed {
                    Ok(v) => args.push(v),
                    Err(_) => {
                        return Err(PathParseError::new(
                            offset(rest),
                            format!("`{letter}` expects {n} arguments, found {k}"),
                        ));
                    }
                }
            }
            commands.push(PathCommand {
                letter: current,
                args,
            });
            skip_comma_wsp(&mut rest);
            if !starts_number(rest) {
                break;
            }
            current = match current {
                'M' => 'L',
                'm' => 'l',
                other => other,
            };
        }
    }
    Ok(PathData { commands })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn letters(p: &PathData) -> String {
        p.commands().iter().map(|c| c.letter()).collect()
    }

    #[test]
    fn parse_basic() {
        let p = parse_path_data("M 10 20 L 30,40 h5 v-5 Z").unwrap();
        assert_eq!(letters(&p), "MLhvZ");
        assert_eq!(p.commands()[1].args(), &[30.0, 40.0]);
    }

    #[test]
    fn implicit_repeats_expand() {
        let p = parse_path_data("M0 0 10 10 20 0 l 1 1 2 2").unwrap();
        assert_eq!(letters(&p), "MLLll");
        let p = parse_path_data("m0 0 5 5").unwrap();
        assert_eq!(letters(&p), "ml");
    }

    #[test]
    fn compact_arc_flags() {
        let p = parse_path_data("M0 0a25 25 0 1050 0").unwrap();
        assert_eq!(p.commands()[1].args(), &[25.0, 25.0, 0.0, 1.0, 0.0, 50.0, 0.0]);
    }

    #[test]
    fn errors_carry_offsets() {
        let err = parse_path_data("M 0 0 L").unwrap_err();
        assert_eq!(err.offset, 7);
        assert!(parse_path_data("L 0 0").is_err());
        assert!(parse_path_data("M 0 0 X 1").is_err());
        assert!(parse_path_data("M 0 0 C 1 2 3").is_err());
    }

    #[test]
    fn display_roundtrips_numerically() {
        let p = parse_path_data("M.5-1.25C1e2 2 3 4 5 6s1 2 3 4zm1 1").unwrap();
        let again = parse_path_data(&p.to_string()).unwrap();
        assert_eq!(p, again);
    }

    #[test]
    fn vertexes_handle_single_axis_commands() {
        let p = parse_path_data("M 10 10 H 50 V 30 h -10 Z").unwrap();
        assert_eq!(
            p.vertexes(),
            vec![
                Point::new(10.0, 10.0),
                Point::new(50.0, 10.0),
                Point::new(50.0, 30.0),
                Point::new(40.0, 30.0),
            ]
        );
    }

    #[test]
    fn unarc_without_arcs_is_noop() {
        let mut p = parse_path_data("M0 0 C 1 1 2 2 3 3 Q 4 4 5 5").unwrap();
        let before = p.clone();
        p.unarc();
        assert_eq!(p, before);
    }

    #[test]
    fn unarc_keeps_endpoint() {
        let mut p = parse_path_data("M 0 0 A 50 50 0 0 1 100 0").unwrap();
        p.unarc();
        assert!(!p.has_arcs());
        assert!(p.commands()[1..].iter().all(|c| c.letter() == 'C'));
        let end = *p.vertexes().last().unwrap();
        assert!((end - Point::new(100.0, 0.0)).hypot() < 1e-9);

        let mut rel = parse_path_data("M 0 0 a 50 50 0 0 1 100 0").unwrap();
        rel.unarc();
        assert!(rel.commands()[1..].iter().all(|c| c.letter() == 'c'));
        let end = *rel.vertexes().last().unwrap();
        assert!((end - Point::new(100.0, 0.0)).hypot() < 1e-9);
    }

    #[test]
    fn degenerate_arcs() {
        let mut p = parse_path_data("M 0 0 A 0 0 0 0 1 10 0 A 5 5 0 0 1 10 0").unwrap();
        p.unarc();
        assert_eq!(letters(&p), "ML");
    }

    #[test]
    fn translate_leaves_relative_offsets() {
        let mut p = parse_path_data("m 1 1 l 5 5 H 10 V 20").unwrap();
        p.translate(Vec2::new(10.0, 100.0));
        assert_eq!(p.to_string(), "m 11 101 l 5 5 H 20 V 120");
    }

    #[test]
    fn scale_about_origin() {
        let mut p = parse_path_data("M 10 10 L 20 30 l 10 10").unwrap();
        p.scale_about(Point::new(10.0, 10.0), Vec2::new(2.0, 0.5));
        assert_eq!(p.to_string(), "M 10 10 L 30 20 l 20 5");
    }

    #[test]
    fn bbox_uses_flattened_arcs() {
        let p = parse_path_data("M 0 0 A 50 50 0 0 1 100 0").unwrap();
        let bbox = p.bbox().unwrap();
        assert!((bbox.x0 - 0.0).abs() < 1e-9);
        assert!((bbox.x1 - 100.0).abs() < 1e-9);
        assert!(bbox.y0 < -40.0);
    }
}
