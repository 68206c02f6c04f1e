//! Literal notation writer and printf-style number templates.

use crate::registry::TOSTRING_FORMAT;
use crate::{ErrorKind, ObjType, OpResult, Ovm, Payload, Value};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Conv {
    Signed,
    Unsigned,
    Octal,
    Hex { upper: bool },
    Fixed { upper: bool },
    Exp { upper: bool },
    General { upper: bool },
}

impl Conv {
    fn from_byte(c: u8) -> Option<Self> {
        Some(match c {
            b'd' | b'i' => Self::Signed,
            b'u' => Self::Unsigned,
            b'o' => Self::Octal,
            b'x' | b'X' => Self::Hex { upper: c == b'X' },
            b'f' | b'F' => Self::Fixed { upper: c == b'F' },
            b'e' | b'E' => Self::Exp { upper: c == b'E' },
            b'g' | b'G' => Self::General { upper: c == b'G' },
            _ => return None,
        })
    }

    fn is_float(self) -> bool {
        matches!(
            self,
            Self::Fixed { .. } | Self::Exp { .. } | Self::General { .. }
        )
    }

    fn upper(self) -> bool {
        match self {
            Self::Hex { upper }
            | Self::Fixed { upper }
            | Self::Exp { upper }
            | Self::General { upper } => upper,
            _ => false,
        }
    }
}

/// A template with exactly one numeric conversion, such as `"%lld"`,
/// `"%08.3f"` or `"<%#x>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    prefix: String,
    suffix: String,
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
    conv: Conv,
}

impl NumberFormat {
    /// `%lld`
    #[must_use]
    pub fn default_int() -> Self {
        Self::bare(Conv::Signed)
    }

    /// `%Lg`
    #[must_use]
    pub fn default_float() -> Self {
        Self::bare(Conv::General { upper: false })
    }

    fn bare(conv: Conv) -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            left: false,
            zero: false,
            plus: false,
            space: false,
            alt: false,
            width: 0,
            precision: None,
            conv,
        }
    }

    /// Parses a template. `None` unless it holds exactly one conversion.
    #[must_use]
    pub fn parse(template: &str) -> Option<Self> {
        let bytes = template.as_bytes();
        let mut found: Option<Self> = None;
        let mut literal = String::new();
        let mut i = 0;
        while i < bytes.len() {
            let Some(rest) = template.get(i..) else {
                return None;
            };
            if rest.starts_with("%%") {
                literal.push('%');
                i += 2;
                continue;
            }
            if bytes[i] != b'%' {
                let Some(c) = rest.chars().next() else {
                    return None;
                };
                literal.push(c);
                i += c.len_utf8();
                continue;
            }
            if found.is_some() {
                return None;
            }
            let (mut spec, used) = Self::parse_spec(&bytes[i + 1..])?;
            spec.prefix = std::mem::take(&mut literal);
            found = Some(spec);
            i += 1 + used;
        }
        let mut spec = found?;
        spec.suffix = literal;
        Some(spec)
    }

    /// Flags, width, precision, length and conversion after a `%`.
    fn parse_spec(bytes: &[u8]) -> Option<(Self, usize)> {
        let mut spec = Self::bare(Conv::Signed);
        let mut i = 0;
        while let Some(&c) = bytes.get(i) {
            match c {
                b'-' => spec.left = true,
                b'0' => spec.zero = true,
                b'+' => spec.plus = true,
                b' ' => spec.space = true,
                b'#' => spec.alt = true,
                _ => break,
            }
            i += 1;
        }
        let (width, used) = digits(&bytes[i..])?;
        spec.width = width;
        i += used;
        if bytes.get(i) == Some(&b'.') {
            i += 1;
            let (precision, used) = digits(&bytes[i..])?;
            spec.precision = Some(precision);
            i += used;
        }
        while bytes
            .get(i)
            .is_some_and(|c| b"hlLqjzt".contains(c))
        {
            i += 1;
        }
        spec.conv = Conv::from_byte(*bytes.get(i)?)?;
        Some((spec, i + 1))
    }

    #[must_use]
    pub fn render_int(&self, value: i64) -> String {
        let (negative, body) = match self.conv {
            Conv::Signed => (value < 0, value.unsigned_abs().to_string()),
            Conv::Unsigned => (false, (value as u64).to_string()),
            Conv::Octal => (false, format!("{:o}", value as u64)),
            Conv::Hex { upper: false } => (false, format!("{:x}", value as u64)),
            Conv::Hex { upper: true } => (false, format!("{:X}", value as u64)),
            Conv::Fixed { .. } | Conv::Exp { .. } | Conv::General { .. } => {
                return self.render_float(value as f64);
            }
        };
        let mut body = match self.precision {
            Some(0) if value == 0 => String::new(),
            Some(p) if p > body.len() => format!("{}{body}", "0".repeat(p - body.len())),
            _ => body,
        };
        let mut lead = self.sign(negative).to_owned();
        match self.conv {
            Conv::Octal if self.alt && !body.starts_with('0') => body.insert(0, '0'),
            Conv::Hex { upper } if self.alt && value != 0 => {
                lead.push_str(if upper { "0X" } else { "0x" });
            }
            _ => {}
        }
        self.pad(&lead, &body, self.precision.is_none())
    }

    #[must_use]
    pub fn render_float(&self, value: f64) -> String {
        if !self.conv.is_float() {
            return self.render_int(value as i64);
        }
        let upper = self.conv.upper();
        let lead = self.sign(value.is_sign_negative() && !value.is_nan());
        if !value.is_finite() {
            let body = match (value.is_nan(), upper) {
                (true, false) => "nan",
                (true, true) => "NAN",
                (false, false) => "inf",
                (false, true) => "INF",
            };
            return self.pad(lead, body, false);
        }
        let magnitude = value.abs();
        let precision = self.precision.unwrap_or(6);
        let body = match self.conv {
            Conv::Fixed { .. } => fixed(magnitude, precision, self.alt),
            Conv::Exp { .. } => exponential(magnitude, precision, self.alt, upper),
            _ => self.general(magnitude, precision, upper),
        };
        self.pad(lead, &body, true)
    }

    fn general(&self, magnitude: f64, precision: usize, upper: bool) -> String {
        let p = precision.max(1);
        let x = if magnitude == 0.0 {
            0
        } else {
            decimal_exponent(magnitude, p - 1)
        };
        let body = if x < -4 || x >= p as i32 {
            exponential(magnitude, p - 1, self.alt, upper)
        } else {
            fixed(magnitude, (p as i32 - 1 - x) as usize, self.alt)
        };
        if self.alt {
            return body;
        }
        match body.find(['e', 'E']) {
            Some(e) => format!("{}{}", strip_fraction(&body[..e]), &body[e..]),
            None => strip_fraction(&body).to_owned(),
        }
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }

    fn pad(&self, lead: &str, body: &str, zero_ok: bool) -> String {
        let len = lead.len() + body.len();
        let fill = self.width.saturating_sub(len);
        let number = if fill == 0 {
            format!("{lead}{body}")
        } else if self.left {
            format!("{lead}{body}{}", " ".repeat(fill))
        } else if self.zero && zero_ok {
            format!("{lead}{}{body}", "0".repeat(fill))
        } else {
            format!("{}{lead}{body}", " ".repeat(fill))
        };
        format!("{}{number}{}", self.prefix, self.suffix)
    }
}

/// Leading run of ASCII digits as a number, with its length.
fn digits(bytes: &[u8]) -> Option<(usize, usize)> {
    let n = bytes.iter().take_while(|c| c.is_ascii_digit()).count();
    if n == 0 {
        return Some((0, 0));
    }
    let text = std::str::from_utf8(&bytes[..n]).ok()?;
    Some((text.parse().ok()?, n))
}

fn fixed(magnitude: f64, precision: usize, alt: bool) -> String {
    let mut s = format!("{magnitude:.precision$}");
    if alt && precision == 0 {
        s.push('.');
    }
    s
}

/// `d.ddde+XX` with at least two exponent digits.
fn exponential(magnitude: f64, precision: usize, alt: bool, upper: bool) -> String {
    let s = format!("{magnitude:.precision$e}");
    let (mantissa, exp) = s.split_once('e').unwrap_or((&s, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let dot = if alt && precision == 0 { "." } else { "" };
    let e = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}{dot}{e}{sign}{:02}", exp.unsigned_abs())
}

/// Exponent of `magnitude` once rounded to `precision` fraction digits in
/// exponential form.
fn decimal_exponent(magnitude: f64, precision: usize) -> i32 {
    let s = format!("{magnitude:.precision$e}");
    s.split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

/// Drops trailing fraction zeros, and the point if nothing follows it.
fn strip_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Number templates in effect for one rendering.
struct Formats {
    int: NumberFormat,
    float: NumberFormat,
}

impl Ovm {
    /// The registry template for `ty`, or the default when absent or
    /// unusable.
    fn number_format(&mut self, ty: ObjType, default: NumberFormat) -> OpResult<NumberFormat> {
        let template = self.class_config(ty, TOSTRING_FORMAT)?;
        let parsed = self
            .string(template)
            .ok()
            .and_then(|s| std::str::from_utf8(s).ok())
            .and_then(NumberFormat::parse);
        Ok(parsed.unwrap_or(default))
    }

    /// Literal rendering of `v`.
    pub(crate) fn tostring(&mut self, v: Value) -> OpResult<Vec<u8>> {
        let formats = Formats {
            int: self.number_format(ObjType::Integer, NumberFormat::default_int())?,
            float: self.number_format(ObjType::Float, NumberFormat::default_float())?,
        };
        let mut out = Vec::new();
        self.write_value(v, &formats, &mut out)?;
        Ok(out)
    }

    fn write_value(&self, v: Value, formats: &Formats, out: &mut Vec<u8>) -> OpResult {
        let Some(r) = v else {
            out.extend_from_slice(b"#nil");
            return Ok(());
        };
        match self.pool.payload(r) {
            Payload::Boolean(true) => out.extend_from_slice(b"#true"),
            Payload::Boolean(false) => out.extend_from_slice(b"#false"),
            Payload::Integer(i) => out.extend_from_slice(formats.int.render_int(*i).as_bytes()),
            Payload::Float(f) => out.extend_from_slice(formats.float.render_float(*f).as_bytes()),
            Payload::String(s) => write_quoted(s, out)?,
            Payload::Pair(car, cdr) => {
                out.push(b'<');
                self.write_value(*car, formats, out)?;
                out.extend_from_slice(b", ");
                self.write_value(*cdr, formats, out)?;
                out.push(b'>');
            }
            Payload::List(..) => {
                out.push(b'(');
                self.write_seq(&self.list_items(v)?, formats, out)?;
                out.push(b')');
            }
            Payload::Array(items) => {
                out.push(b'[');
                self.write_seq(items, formats, out)?;
                out.push(b']');
            }
            Payload::Dict(dict) => {
                out.push(b'{');
                let mut first = true;
                for head in dict.buckets.iter() {
                    for entry in self.list_items(*head)? {
                        if !first {
                            out.extend_from_slice(b", ");
                        }
                        first = false;
                        let (key, value) = self.dptr(entry)?;
                        self.write_value(key, formats, out)?;
                        out.extend_from_slice(b": ");
                        self.write_value(value, formats, out)?;
                    }
                }
                out.push(b'}');
            }
            _ => return Err(ErrorKind::BadType),
        }
        Ok(())
    }

    fn write_seq(&self, items: &[Value], formats: &Formats, out: &mut Vec<u8>) -> OpResult {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(b", ");
            }
            self.write_value(*item, formats, out)?;
        }
        Ok(())
    }
}

fn write_quoted(s: &[u8], out: &mut Vec<u8>) -> OpResult {
    out.try_reserve(s.len() + 2).map_err(|_| ErrorKind::Mem)?;
    out.push(b'"');
    for &c in s {
        if matches!(c, b'"' | b'\\') {
            out.push(b'\\');
        }
        out.push(c);
    }
    out.push(b'"');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Op, OvmCreateInfo, R0, R1, R2};

    fn fmt(template: &str) -> NumberFormat {
        NumberFormat::parse(template).unwrap()
    }

    #[test]
    fn test_default_int() {
        let f = NumberFormat::default_int();
        assert_eq!(f.render_int(0), "0");
        assert_eq!(f.render_int(-42), "-42");
        assert_eq!(f.render_int(i64::MIN), "-9223372036854775808");
    }

    #[test]
    fn test_default_float_is_general() {
        let f = NumberFormat::default_float();
        assert_eq!(f.render_float(2.5), "2.5");
        assert_eq!(f.render_float(1.0), "1");
        assert_eq!(f.render_float(-0.1), "-0.1");
        assert_eq!(f.render_float(100000.0), "100000");
        assert_eq!(f.render_float(1e6), "1e+06");
        assert_eq!(f.render_float(1e20), "1e+20");
        assert_eq!(f.render_float(0.0001), "0.0001");
        assert_eq!(f.render_float(0.00001), "1e-05");
        assert_eq!(f.render_float(3.14159265), "3.14159");
        assert_eq!(f.render_float(0.0), "0");
        assert_eq!(f.render_float(f64::INFINITY), "inf");
        assert_eq!(f.render_float(f64::NAN), "nan");
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(fmt("%x").render_int(255), "ff");
        assert_eq!(fmt("%#X").render_int(255), "0XFF");
        assert_eq!(fmt("%#o").render_int(8), "010");
        assert_eq!(fmt("%u").render_int(-1), "18446744073709551615");
        assert_eq!(fmt("%+d").render_int(5), "+5");
        assert_eq!(fmt("% d").render_int(5), " 5");
        assert_eq!(fmt("%5d").render_int(42), "   42");
        assert_eq!(fmt("%-5d|").render_int(42), "42   |");
        assert_eq!(fmt("%05d").render_int(-42), "-0042");
        assert_eq!(fmt("%.3d").render_int(7), "007");
        assert_eq!(fmt("%08.3d").render_int(7), "     007");
        assert_eq!(fmt("%.0d").render_int(0), "");
    }

    #[test]
    fn test_float_conversions() {
        assert_eq!(fmt("%f").render_float(1.5), "1.500000");
        assert_eq!(fmt("%.2f").render_float(-3.14159), "-3.14");
        assert_eq!(fmt("%#.0f").render_float(3.0), "3.");
        assert_eq!(fmt("%e").render_float(1234.5), "1.234500e+03");
        assert_eq!(fmt("%.1E").render_float(0.000123), "1.2E-04");
        assert_eq!(fmt("%G").render_float(1e-10), "1E-10");
        assert_eq!(fmt("%#g").render_float(1.0), "1.00000");
        assert_eq!(fmt("%.3g").render_float(1234.0), "1.23e+03");
        assert_eq!(fmt("%010.2f").render_float(-1.5), "-000001.50");
        assert_eq!(fmt("%F").render_float(f64::NEG_INFINITY), "-INF");
    }

    #[test]
    fn test_cross_conversions() {
        assert_eq!(fmt("%.1f").render_int(3), "3.0");
        assert_eq!(fmt("%d").render_float(-2.9), "-2");
    }

    #[test]
    fn test_template_text_and_length_modifiers() {
        assert_eq!(fmt("<%lld>").render_int(1), "<1>");
        assert_eq!(fmt("%Lg%%").render_float(0.5), "0.5%");
        assert_eq!(fmt("%zu").render_int(9), "9");
        assert_eq!(fmt("é %hhd").render_int(1), "é 1");
    }

    #[test]
    fn test_rejected_templates() {
        for bad in ["", "plain", "%", "%d %d", "%s", "%*d", "%.f%", "%q"] {
            assert_eq!(NumberFormat::parse(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn test_precision_without_digits() {
        assert_eq!(fmt("%.f").render_float(2.6), "3");
    }

    #[test]
    fn test_registry_templates_apply() {
        let mut vm = Ovm::new(OvmCreateInfo::default());
        vm.newc_str(R2, "%#x");
        vm.set_class_config(ObjType::Integer, TOSTRING_FORMAT, R2);
        vm.newc_str(R2, "%.2f");
        vm.set_class_config(ObjType::Float, TOSTRING_FORMAT, R2);
        vm.news(R0, "[255, 0.5]");
        assert_eq!(vm.to_literal(R0).unwrap(), "[0xff, 0.50]");

        vm.newc_str(R2, "%d and %d");
        vm.set_class_config(ObjType::Integer, TOSTRING_FORMAT, R2);
        vm.newc_int(R0, 255);
        assert_eq!(vm.to_literal(R0).unwrap(), "255");
        assert_eq!(vm.errno(), None);
    }

    #[test]
    fn test_unprintable_values() {
        let mut vm = Ovm::new(OvmCreateInfo::default());
        vm.newc_ptr(R0, 1);
        assert_eq!(vm.to_literal(R0), Err(ErrorKind::BadType));
        vm.newc_bytes(R1, b"ab");
        assert_eq!(vm.to_literal(R1), Err(ErrorKind::BadType));
        vm.newc_array(R0, 1);
        vm.newc_int(R2, 0);
        vm.call(R0, Op::AtPut, &[R2, R1]);
        assert_eq!(vm.errno(), None);
        assert_eq!(vm.to_literal(R0), Err(ErrorKind::BadType));
    }

    #[test]
    fn test_dict_rendering() {
        let mut vm = Ovm::new(OvmCreateInfo::default());
        vm.news(R0, "{\"only\": (1, \"q\\\"\")}");
        assert_eq!(vm.to_literal(R0).unwrap(), "{\"only\": (1, \"q\\\"\")}");
    }
}
