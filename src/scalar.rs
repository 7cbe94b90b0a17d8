// SPDX-License-Identifier: Apache-2.0

use crate::{CharsIter, RytError, YamlNodeData};

const CHAR_ESCAPE: char = '\\';

// Escaped ASCII bell (x07) character.
const ESC_BELL: char = 'a';
// Escaped ASCII backspace (x08) character.
const ESC_BACKSPACE: char = 'b';
// Escaped ASCII escape (x1B) character.
const ESC_ESCAPE: char = 'e';
// Escaped ASCII form feed (x0C) character.
const ESC_FORM_FEED: char = 'f';
// Escaped ASCII line feed (x0A) character.
const ESC_LINE_FEED: char = 'n';
// Escaped ASCII carriage return (x0D) character.
const ESC_CARRIAGE_RETURN: char = 'r';
// Escaped ASCII horizontal tab (x09) character.
const ESC_HORIZONTAL_TAB: char = 't';
// Escaped ASCII vertical tab (x0B) character.
const ESC_VERTICAL_TAB: char = 'v';
// Escaped 16-bit Unicode character, 4 hex digits.
const ESC_16_BIT: char = 'u';

/// Classify a trimmed raw scalar token. Order matters: exact `~`,
/// case-insensitive null/bool/inf/nan spellings, signed integer (negative
/// only, `-0` re-classifies unsigned), unsigned integer, double, string.
pub(crate) fn classify_scalar(raw: &str) -> YamlNodeData {
    if raw.is_empty() || raw == "~" {
        return YamlNodeData::Null;
    }
    match raw.to_ascii_lowercase().as_str() {
        "null" => return YamlNodeData::Null,
        "true" => return YamlNodeData::Bool(true),
        "false" => return YamlNodeData::Bool(false),
        ".inf" => return YamlNodeData::Double(f64::INFINITY),
        "-.inf" => return YamlNodeData::Double(f64::NEG_INFINITY),
        ".nan" => return YamlNodeData::Double(f64::NAN),
        _ => (),
    }
    if raw.starts_with('-') {
        if let Ok(i) = raw.parse::<i64>() {
            return if i == 0 {
                YamlNodeData::Uint(0)
            } else {
                YamlNodeData::Int(i)
            };
        }
    } else if let Ok(u) = raw.parse::<u64>() {
        return YamlNodeData::Uint(u);
    }
    // Guard against f64's own `inf`/`nan` spellings: a double must carry
    // at least one digit.
    if raw.chars().any(|c| c.is_ascii_digit()) {
        if let Ok(d) = raw.parse::<f64>() {
            if d.is_finite() {
                return YamlNodeData::Double(d);
            }
        }
    }
    YamlNodeData::String(raw.to_string())
}

/// Read till reach another `"`.
/// The starting `"` has already been drained from CharsIter.
pub(crate) fn read_double_quoted_str(
    iter: &mut CharsIter,
) -> Result<String, RytError> {
    let mut ret = String::new();
    while let Some(c) = iter.next() {
        if c == '"' {
            return Ok(ret);
        } else if c == CHAR_ESCAPE {
            ret.push(read_escaped_char(iter)?);
        } else {
            ret.push(c);
        }
    }
    Err(RytError::expected_string(
        "missing closing quote".to_string(),
        iter.pos(),
    ))
}

fn read_escaped_char(iter: &mut CharsIter) -> Result<char, RytError> {
    let c = if let Some(c) = iter.next() {
        c
    } else {
        return Err(RytError::expected_string(
            "invalid backslash: no character after escape".to_string(),
            iter.pos(),
        ));
    };
    let pos = iter.pos();
    Ok(match c {
        '"' => '"',
        CHAR_ESCAPE => '\\',
        ESC_BELL => '\u{07}',
        ESC_BACKSPACE => '\u{08}',
        ESC_ESCAPE => '\u{1b}',
        ESC_FORM_FEED => '\u{0c}',
        ESC_LINE_FEED => '\n',
        ESC_CARRIAGE_RETURN => '\u{0d}',
        ESC_HORIZONTAL_TAB => '\t',
        ESC_VERTICAL_TAB => '\u{0b}',
        ESC_16_BIT => {
            let mut val = String::new();
            for _ in 0..4 {
                if let Some(i) = iter.next() {
                    val.push(i);
                } else {
                    break;
                }
            }
            if val.chars().count() != 4 {
                return Err(RytError::expected_string(
                    format!(
                        "invalid backslash: expecting 4 hex digits after \
                         \\u, but got `{val}`"
                    ),
                    pos,
                ));
            }
            let val_u32 =
                u32::from_str_radix(val.as_str(), 16).map_err(|_| {
                    RytError::expected_string(
                        format!(
                            "invalid backslash: `\\u{val}` is not a valid \
                             hexadecimal number"
                        ),
                        pos,
                    )
                })?;
            char::from_u32(val_u32).ok_or_else(|| {
                RytError::expected_string(
                    format!(
                        "invalid backslash: `\\u{val}` is not a valid \
                         unicode code point"
                    ),
                    pos,
                )
            })?
        }
        _ => {
            return Err(RytError::expected_string(
                format!("invalid backslash: not supported escape \\{c}"),
                pos,
            ));
        }
    })
}

/// Whether a string scalar must be double quoted on output.
pub(crate) fn needs_quote(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    if let Some(first) = s.chars().next() {
        if matches!(first, '!' | '&' | '*' | '-' | '"' | '{' | '[' | '#' | '.')
        {
            return true;
        }
    }
    if s.starts_with(' ') || s.ends_with(' ') {
        return true;
    }
    if s.chars().any(|c| c == ':' || c == '#' || c.is_control()) {
        return true;
    }
    s == "~" || s.eq_ignore_ascii_case("null")
}

/// Append a double quoted rendering of `s`, escaping the supported escape
/// set and writing code points outside printable ASCII as `\uNNNN`.
pub(crate) fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{1b}' => out.push_str("\\e"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0b}' => out.push_str("\\v"),
            ' '..='~' => out.push(c),
            _ => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
        }
    }
    out.push('"');
}

/// Canonical text of a scalar, without any quoting. This is what the packer
/// emits for non-string scalars and what in-string variable substitution
/// uses to stringify a bound non-string value.
pub(crate) fn scalar_to_string(data: &YamlNodeData) -> String {
    match data {
        YamlNodeData::Null => "~".to_string(),
        YamlNodeData::Bool(v) => {
            if *v { "true" } else { "false" }.to_string()
        }
        YamlNodeData::Uint(v) => v.to_string(),
        YamlNodeData::Int(v) => v.to_string(),
        YamlNodeData::Double(v) => {
            if v.is_nan() {
                ".nan".to_string()
            } else if *v == f64::INFINITY {
                ".inf".to_string()
            } else if *v == f64::NEG_INFINITY {
                "-.inf".to_string()
            } else {
                let s = v.to_string();
                // Keep a double re-classifiable as a double.
                if s.contains('.') || s.contains('e') || s.contains('E') {
                    s
                } else {
                    format!("{s}.0")
                }
            }
        }
        YamlNodeData::String(v) => v.clone(),
        YamlNodeData::Sequence(_) | YamlNodeData::Map(_) => {
            // Callers only pass scalars.
            String::new()
        }
    }
}
