//! Literal notation reader.
//!
//! Every composite is parsed into a scratch frame first and only assigned to
//! its destination once the whole text has been accepted, so a failed parse
//! leaves the destination untouched.

use crate::error::try_bytes;
use crate::primitives::{ListBuilder, dict_insert};
use crate::{ErrorKind, Loc, ObjType, OpResult, Ovm};

/// Strips leading and trailing ASCII whitespace.
#[must_use]
pub fn trim(bytes: &[u8]) -> &[u8] {
    bytes.trim_ascii()
}

/// Finds the first `delim` at bracket depth zero outside a quoted string.
///
/// A backslash skips the following byte. Brackets inside quotes do not
/// count towards the depth.
#[must_use]
pub fn delim_find(bytes: &[u8], delim: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == delim && !quoted && depth == 0 {
            return Some(i);
        }
        match c {
            b'\\' => i += 1,
            b'"' => quoted = !quoted,
            b'<' | b'(' | b'[' | b'{' if !quoted => depth += 1,
            b'>' | b')' | b']' | b'}' if !quoted => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Splits on every top-level `delim`. Always yields at least one piece.
#[must_use]
pub fn split_top_level(bytes: &[u8], delim: u8) -> Vec<&[u8]> {
    let mut pieces = Vec::new();
    let mut rest = bytes;
    while let Some(i) = delim_find(rest, delim) {
        pieces.push(&rest[..i]);
        rest = &rest[i + 1..];
    }
    pieces.push(rest);
    pieces
}

pub(crate) fn parse_bool(text: &[u8]) -> Option<bool> {
    match trim(text) {
        b"#true" => Some(true),
        b"#false" => Some(false),
        _ => None,
    }
}

/// Decimal with an optional leading `-`, `0x` hex, or `0`-prefixed octal.
/// Hex and octal wrap into the signed range.
pub(crate) fn parse_int(text: &[u8]) -> Option<i64> {
    let text = trim(text);
    let (digits, radix) = match text {
        [b'0', x, hex @ ..] if (x | 0x20) == b'x' => (hex, 16),
        [b'0', oct @ ..] if !oct.is_empty() => (oct, 8),
        _ => (text, 10),
    };
    if radix != 10 {
        if digits.is_empty() || !digits.iter().all(|&c| (c as char).is_digit(radix)) {
            return None;
        }
        let digits = std::str::from_utf8(digits).ok()?;
        return u64::from_str_radix(digits, radix).ok().map(|v| v as i64);
    }
    let unsigned = digits.strip_prefix(b"-").unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// `[-]digits[.digits][(e|E)[+|-]digits]`.
pub(crate) fn parse_float(text: &[u8]) -> Option<f64> {
    let text = trim(text);
    let body = text.strip_prefix(b"-").unwrap_or(text);
    let (mantissa, exponent) = match body.iter().position(|&c| (c | 0x20) == b'e') {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };
    let (whole, frac) = match mantissa.iter().position(|&c| c == b'.') {
        Some(i) => (&mantissa[..i], Some(&mantissa[i + 1..])),
        None => (mantissa, None),
    };
    let all_digits = |s: &[u8]| !s.is_empty() && s.iter().all(u8::is_ascii_digit);
    if !all_digits(whole) || frac.is_some_and(|f| !all_digits(f)) {
        return None;
    }
    if let Some(exp) = exponent {
        let exp = exp
            .strip_prefix(b"-")
            .or_else(|| exp.strip_prefix(b"+"))
            .unwrap_or(exp);
        if !all_digits(exp) {
            return None;
        }
    }
    std::str::from_utf8(text).ok()?.parse().ok()
}

/// Body of a quoted string with `\"` and `\\` resolved. Other backslash
/// sequences are kept as written.
fn unquote(text: &[u8]) -> OpResult<Vec<u8>> {
    let body = match text {
        [b'"', body @ .., b'"'] => body,
        _ => return Err(ErrorKind::BadValue),
    };
    let mut out = try_bytes(body.len())?;
    let mut bytes = body.iter().copied();
    while let Some(c) = bytes.next() {
        match c {
            b'\\' => match bytes.next() {
                Some(e @ (b'"' | b'\\')) => out.push(e),
                Some(other) => out.extend_from_slice(&[b'\\', other]),
                None => return Err(ErrorKind::BadValue),
            },
            b'"' => return Err(ErrorKind::BadValue),
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Inside of `open ... close`, trimmed.
fn enclosed(text: &[u8], open: u8, close: u8) -> OpResult<&[u8]> {
    match text {
        [first, inner @ .., last] if *first == open && *last == close => Ok(trim(inner)),
        _ => Err(ErrorKind::BadValue),
    }
}

/// Comma-separated elements; an empty body has none.
fn elements(inner: &[u8]) -> Vec<&[u8]> {
    if inner.is_empty() {
        Vec::new()
    } else {
        split_top_level(inner, b',')
    }
}

impl Ovm {
    /// Parses any literal into `loc`. BAD_VALUE on malformed text.
    pub(crate) fn parse_literal(&mut self, loc: Loc, text: &[u8]) -> OpResult {
        let text = trim(text);
        match text.first() {
            None => Err(ErrorKind::BadValue),
            Some(b'<') => self.parse_pair(loc, text),
            Some(b'(') => self.parse_list(loc, text),
            Some(b'[') => self.parse_array(loc, text),
            Some(b'{') => self.parse_dict(loc, text),
            Some(b'"') => {
                let bytes = unquote(text)?;
                self.make_string(loc, bytes);
                Ok(())
            }
            Some(b'#') if text == b"#nil" => {
                self.put(loc, None);
                Ok(())
            }
            Some(_) => {
                if let Some(b) = parse_bool(text) {
                    self.make_bool(loc, b);
                } else if let Some(i) = parse_int(text) {
                    self.make_int(loc, i);
                } else if let Some(f) = parse_float(text) {
                    self.make_float(loc, f);
                } else {
                    return Err(ErrorKind::BadValue);
                }
                Ok(())
            }
        }
    }

    /// Parses `text` as a literal of type `ty` only.
    pub(crate) fn parse_as(&mut self, loc: Loc, ty: ObjType, text: &[u8]) -> OpResult {
        let text = trim(text);
        match ty {
            ObjType::Pair => self.parse_pair(loc, text),
            ObjType::List => self.parse_list(loc, text),
            ObjType::Array => self.parse_array(loc, text),
            ObjType::Dict => self.parse_dict(loc, text),
            _ => self.framed(1, |vm, frame| {
                vm.parse_literal(frame.at(0), text)?;
                let v = vm.get(frame.at(0));
                if vm.type_of(v) != ty {
                    return Err(ErrorKind::BadValue);
                }
                vm.assign(loc, v);
                Ok(())
            }),
        }
    }

    fn parse_pair(&mut self, loc: Loc, text: &[u8]) -> OpResult {
        let inner = enclosed(text, b'<', b'>')?;
        let comma = delim_find(inner, b',').ok_or(ErrorKind::BadValue)?;
        self.framed(1, |vm, frame| {
            let pair = vm.make_pair(frame.at(0), None, None);
            vm.parse_literal(Loc::Car(pair), &inner[..comma])?;
            vm.parse_literal(Loc::Cdr(pair), &inner[comma + 1..])?;
            vm.assign(loc, Some(pair));
            Ok(())
        })
    }

    fn parse_list(&mut self, loc: Loc, text: &[u8]) -> OpResult {
        let items = elements(enclosed(text, b'(', b')')?);
        self.framed(2, |vm, frame| {
            let mut list = ListBuilder::new(frame.at(0));
            for item in items {
                vm.parse_literal(frame.at(1), item)?;
                let v = vm.get(frame.at(1));
                list.push(vm, v);
            }
            list.finish(vm, None);
            let head = vm.get(frame.at(0));
            vm.assign(loc, head);
            Ok(())
        })
    }

    fn parse_array(&mut self, loc: Loc, text: &[u8]) -> OpResult {
        let items = elements(enclosed(text, b'[', b']')?);
        self.framed(1, |vm, frame| {
            let arr = vm.make_array(frame.at(0), items.len())?;
            for (i, item) in items.into_iter().enumerate() {
                vm.parse_literal(Loc::Elem(arr, i), item)?;
            }
            vm.assign(loc, Some(arr));
            Ok(())
        })
    }

    fn parse_dict(&mut self, loc: Loc, text: &[u8]) -> OpResult {
        let entries = elements(enclosed(text, b'{', b'}')?);
        self.framed(3, |vm, frame| {
            let dict = vm.make_dict(frame.at(0), 0)?;
            for entry in entries {
                let colon = delim_find(entry, b':').ok_or(ErrorKind::BadValue)?;
                vm.parse_literal(frame.at(1), &entry[..colon])?;
                vm.parse_literal(frame.at(2), &entry[colon + 1..])?;
                let key = vm.get(frame.at(1));
                let value = vm.get(frame.at(2));
                dict_insert(vm, dict, key, value)?;
            }
            vm.assign(loc, Some(dict));
            Ok(())
        })
    }
}
