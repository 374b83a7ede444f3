//! URL-safe Base64 and canonical JSON.
//!
//! The MAC is computed over `base64url(header) + "." + base64url(payload)`,
//! so the bytes of `header`/`payload` must be byte-for-byte reproducible
//! between issue and verify. [`canonical_json`] removes every
//! implementation-defined ordering choice that would otherwise produce
//! signature mismatches across processes, languages, or serde_json feature
//! flags (we do not rely on `serde_json`'s default map ordering staying
//! BTreeMap-backed; we sort explicitly).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::InvalidFormat;

/// Encodes `bytes` as unpadded URL-safe Base64.
pub fn base64url_encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes unpadded URL-safe Base64, rejecting any byte outside
/// `[A-Za-z0-9_-]`. Empty input decodes to an empty vector.
pub fn base64url_decode(input: &str) -> Result<Vec<u8>, InvalidFormat> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    if !input
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(InvalidFormat::Base64(
            "character outside [A-Za-z0-9_-]".to_string(),
        ));
    }
    URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|err| InvalidFormat::Base64(err.to_string()))
}

/// Serializes `value` as canonical JSON: object keys sorted ascending by
/// codepoint at every depth, no insignificant whitespace, slashes and
/// unicode left unescaped, non-finite floats rejected.
pub fn canonical_json(value: &Value) -> Result<String, InvalidFormat> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<(), InvalidFormat> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(InvalidFormat::NonFiniteFloat);
                }
            }
            write!(out, "{n}").expect("writing to String cannot fail");
        }
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.push('{');
            for (i, (key, val)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_canonical(val, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

/// Writes a JSON string literal without escaping `/` and without
/// escape-sequencing non-ASCII unicode (pass-through UTF-8).
fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                write!(out, "\\u{:04x}", c as u32).expect("writing to String cannot fail");
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Decodes `bytes` as a JSON object. A top-level array or scalar fails with
/// [`InvalidFormat::NotAnObject`].
pub fn json_decode_object(bytes: &[u8]) -> Result<Map<String, Value>, InvalidFormat> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| InvalidFormat::Base64(format!("malformed JSON: {err}")))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(InvalidFormat::NotAnObject),
    }
}
