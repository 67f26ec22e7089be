//! Shared `winnow` token parsers for SVG micro-syntaxes.
//!
//! Lengths, path data, transform lists and number lists all sit on top of
//! these. Every parser has a concrete `ModalResult` signature so callers never
//! need turbofish annotations on the error type.

use winnow::ascii::{digit0, digit1};
use winnow::combinator::{alt, opt};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

fn sign(input: &mut &str) -> ModalResult<char> {
    one_of(['+', '-']).parse_next(input)
}

fn exponent<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (one_of(['e', 'E']), opt(sign), digit1)
        .take()
        .parse_next(input)
}

/// `[+-]?[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?`: the attribute number form.
/// A leading dot is not accepted here.
pub fn strict_number_text<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (opt(sign), digit1, opt(('.', digit0)), opt(exponent))
        .take()
        .parse_next(input)
}

/// Path/transform number form: also accepts `.5` and `5.`.
pub fn number_text<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        opt(sign),
        alt(((digit1, opt(('.', digit0))).void(), ('.', digit1).void())),
        opt(exponent),
    )
        .take()
        .parse_next(input)
}

/// Parse a path/transform number into `f64`.
pub fn number(input: &mut &str) -> ModalResult<f64> {
    let text = number_text.parse_next(input)?;
    text.parse::<f64>()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

/// An arc flag: exactly one `0` or `1`, no separator required after it.
pub fn flag(input: &mut &str) -> ModalResult<bool> {
    one_of(['0', '1']).map(|c| c == '1').parse_next(input)
}

/// Skip whitespace.
pub fn skip_wsp(input: &mut &str) {
    let _: ModalResult<&str> = take_while(0.., char::is_whitespace).parse_next(input);
}

/// Skip whitespace with at most one comma inside it.
pub fn skip_comma_wsp(input: &mut &str) {
    skip_wsp(input);
    if input.starts_with(',') {
        *input = &input[1..];
        skip_wsp(input);
    }
}

/// Parse a whitespace/comma separated list of numbers that spans the whole input.
pub fn number_list(text: &str) -> Result<Vec<f64>, usize> {
    let mut rest = text;
    let mut out = Vec::new();
    skip_wsp(&mut rest);
    while !rest.is_empty() {
        match number.parse_next(&mut rest) {
            Ok(n) => out.push(n),
            Err(_) => return Err(text.len() - rest.len()),
        }
        skip_comma_wsp(&mut rest);
    }
    Ok(out)
}
