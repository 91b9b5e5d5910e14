//! C-style print formats as used by dictionaries, e.g., `%5.2f V` or `0x%04X`.
use std::fmt::Display;

use crate::error::DefinitionError;
use crate::value::Value;

const CONVERSIONS: &str = "diuxXofFeEgGsc";
const LENGTH_MODIFIERS: &str = "hlLqjzt";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Placeholder {
    /// Byte offset of the `%` in the source format.
    start: usize,
    flags: Flags,
    width: Option<usize>,
    precision: Option<usize>,
    conv: char,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A parsed print format.
///
/// # Example
/// ```
/// use decom::{PrintFormat, Value};
///
/// let fmt = PrintFormat::parse("%d, %5.1f").unwrap();
/// assert_eq!(fmt.placeholders(), 2);
/// assert_eq!(fmt.render(&[Value::Signed(-2), Value::Float(3.14159)]), "-2,   3.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintFormat {
    source: String,
    segments: Vec<Segment>,
}

impl PrintFormat {
    /// Parse a format string.
    ///
    /// # Errors
    /// [DefinitionError::PrintFormat] if a placeholder is incomplete or uses an unknown
    /// conversion.
    pub fn parse(source: &str) -> Result<Self, DefinitionError> {
        let err = |reason: &str| DefinitionError::PrintFormat {
            format: source.to_string(),
            reason: reason.to_string(),
        };
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((start, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if let Some((_, '%')) = chars.peek() {
                chars.next();
                literal.push('%');
                continue;
            }

            let mut flags = Flags::default();
            while let Some((_, c)) = chars.peek() {
                match c {
                    '-' => flags.left = true,
                    '0' => flags.zero = true,
                    '+' => flags.plus = true,
                    ' ' => flags.space = true,
                    '#' => flags.alt = true,
                    _ => break,
                }
                chars.next();
            }
            let width = take_number(&mut chars);
            let precision = if let Some((_, '.')) = chars.peek() {
                chars.next();
                Some(take_number(&mut chars).unwrap_or(0))
            } else {
                None
            };
            while let Some((_, c)) = chars.peek() {
                if !LENGTH_MODIFIERS.contains(*c) {
                    break;
                }
                chars.next();
            }
            let Some((_, conv)) = chars.next() else {
                return Err(err("incomplete placeholder"));
            };
            if !CONVERSIONS.contains(conv) {
                return Err(err(&format!("unsupported conversion '{conv}'")));
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Placeholder(Placeholder {
                start,
                flags,
                width,
                precision,
                conv,
            }));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(PrintFormat {
            source: source.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Number of positional placeholders.
    #[must_use]
    pub fn placeholders(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Placeholder(_)))
            .count()
    }

    /// A format using only the first `count` placeholders; everything from the next
    /// placeholder on is dropped.
    #[must_use]
    pub fn truncated(&self, count: usize) -> PrintFormat {
        let cut = self
            .segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(p) => Some(p.start),
                Segment::Literal(_) => None,
            })
            .nth(count);
        match cut {
            Some(end) => PrintFormat {
                source: self.source[..end].to_string(),
                segments: self
                    .segments
                    .iter()
                    .take_while(|s| !matches!(s, Segment::Placeholder(p) if p.start >= end))
                    .cloned()
                    .collect(),
            },
            None => self.clone(),
        }
    }

    /// Render `values` positionally. Placeholders without a value render empty.
    #[must_use]
    pub fn render(&self, values: &[Value]) -> String {
        let mut out = String::new();
        let mut values = values.iter();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Placeholder(p) => {
                    if let Some(v) = values.next() {
                        out.push_str(&format_one(p, v));
                    }
                }
            }
        }
        out
    }

    /// Render a single value.
    #[must_use]
    pub fn render_one(&self, value: &Value) -> String {
        self.render(std::slice::from_ref(value))
    }
}

impl Display for PrintFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn take_number<I>(chars: &mut std::iter::Peekable<I>) -> Option<usize>
where
    I: Iterator<Item = (usize, char)>,
{
    let mut num: Option<usize> = None;
    while let Some((_, c)) = chars.peek() {
        let Some(d) = c.to_digit(10) else {
            break;
        };
        num = Some(num.unwrap_or(0) * 10 + d as usize);
        chars.next();
    }
    num
}

fn format_one(p: &Placeholder, value: &Value) -> String {
    let (body, numeric) = match p.conv {
        'd' | 'i' => match value {
            Value::Unsigned(v) => (v.to_string(), true),
            v => match v.as_i64() {
                Some(v) => (v.to_string(), true),
                None => (v.to_string(), false),
            },
        },
        'u' | 'x' | 'X' | 'o' => match unsigned_bits(value) {
            Some(v) => (format_unsigned(p, v), true),
            None => (value.to_string(), false),
        },
        'f' | 'F' | 'e' | 'E' | 'g' | 'G' => match value.as_f64() {
            Some(v) => (format_float(p, v), true),
            None => (value.to_string(), false),
        },
        'c' => match value.as_u64().and_then(|v| char::from_u32(v as u32)) {
            Some(c) => (c.to_string(), false),
            None => (value.to_string(), false),
        },
        _ => {
            let s = value.to_string();
            match p.precision {
                Some(n) => (s.chars().take(n).collect(), false),
                None => (s, false),
            }
        }
    };

    let body = if numeric && matches!(p.conv, 'd' | 'i' | 'f' | 'F' | 'e' | 'E' | 'g' | 'G') {
        signed(p, body)
    } else {
        body
    };
    pad(p, body, numeric)
}

/// Two's complement bit pattern for unsigned style conversions.
fn unsigned_bits(value: &Value) -> Option<u64> {
    match value {
        Value::Unsigned(v) => Some(*v),
        Value::Signed(v) => Some(*v as u64),
        Value::Bool(v) => Some(u64::from(*v)),
        Value::Float(v) => Some(*v as i64 as u64),
        Value::Text(_) | Value::Sclk(_) => None,
    }
}

fn format_unsigned(p: &Placeholder, v: u64) -> String {
    match p.conv {
        'x' if p.flags.alt && v != 0 => format!("0x{v:x}"),
        'x' => format!("{v:x}"),
        'X' if p.flags.alt && v != 0 => format!("0X{v:X}"),
        'X' => format!("{v:X}"),
        'o' if p.flags.alt => format!("0{v:o}"),
        'o' => format!("{v:o}"),
        _ => v.to_string(),
    }
}

fn format_float(p: &Placeholder, v: f64) -> String {
    let upper = p.conv.is_ascii_uppercase();
    if !v.is_finite() {
        let s = if v.is_nan() {
            "nan"
        } else if v > 0.0 {
            "inf"
        } else {
            "-inf"
        };
        return if upper { s.to_uppercase() } else { s.to_string() };
    }
    let prec = p.precision.unwrap_or(6);
    match p.conv {
        'e' | 'E' => format_exp(v, prec, upper),
        'g' | 'G' => format_general(v, prec, p.flags.alt, upper),
        _ => format!("{v:.prec$}"),
    }
}

fn split_exp(s: &str) -> (&str, i32) {
    match s.split_once('e') {
        Some((mant, exp)) => (mant, exp.parse().unwrap_or(0)),
        None => (s, 0),
    }
}

fn format_exp(v: f64, prec: usize, upper: bool) -> String {
    let s = format!("{v:.prec$e}");
    let (mant, exp) = split_exp(&s);
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{mant}{e}{sign}{:02}", exp.abs())
}

fn format_general(v: f64, prec: usize, alt: bool, upper: bool) -> String {
    let p = prec.max(1);
    let s = format!("{v:.*e}", p - 1);
    let (_, exp) = split_exp(&s);
    let p = p as i32;
    let s = if exp < -4 || exp >= p {
        format_exp(v, (p - 1) as usize, upper)
    } else {
        format!("{v:.*}", (p - 1 - exp) as usize)
    };
    if alt {
        return s;
    }
    // strip trailing zeros from the mantissa
    let (mant, tail) = match s.find(['e', 'E']) {
        Some(idx) => s.split_at(idx),
        None => (s.as_str(), ""),
    };
    let mant = if mant.contains('.') {
        mant.trim_end_matches('0').trim_end_matches('.')
    } else {
        mant
    };
    format!("{mant}{tail}")
}

fn signed(p: &Placeholder, body: String) -> String {
    if body.starts_with('-') {
        body
    } else if p.flags.plus {
        format!("+{body}")
    } else if p.flags.space {
        format!(" {body}")
    } else {
        body
    }
}

fn pad(p: &Placeholder, body: String, numeric: bool) -> String {
    let len = body.chars().count();
    let Some(width) = p.width.filter(|w| *w > len) else {
        return body;
    };
    let fill = width - len;
    if p.flags.left {
        return format!("{body}{}", " ".repeat(fill));
    }
    if p.flags.zero && numeric {
        // zeros go between any sign or radix prefix and the digits
        let mut split = 0;
        if body.starts_with(['-', '+', ' ']) {
            split = 1;
        }
        if body[split..].starts_with("0x") || body[split..].starts_with("0X") {
            split += 2;
        }
        let (head, digits) = body.split_at(split);
        return format!("{head}{}{digits}", "0".repeat(fill));
    }
    format!("{}{body}", " ".repeat(fill))
}
