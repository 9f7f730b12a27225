//! Cache Key Module
//!
//! Derives stable cache keys from an operation name and its parameter tree.
//!
//! Normalization rules:
//! - null fields are dropped from maps, so an explicit null and an omitted
//!   field produce the same key
//! - map fields are emitted in lexicographic order
//! - list order is preserved
//! - timestamps become RFC 3339 in UTC, dates become `YYYY-MM-DD`
//!
//! The canonical text is prefixed with the operation name and hashed with SHA-256.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::cache::{Param, Params};
use crate::error::{CacheError, Result};

// == Derive Key ==
/// Returns the hex-encoded SHA-256 key for `(operation, params)`.
///
/// # Errors
/// `InvalidParameters` if the operation name is blank or the tree contains a
/// non-finite float.
pub fn derive_key(operation: &str, params: &Params) -> Result<String> {
    if operation.trim().is_empty() {
        return Err(CacheError::InvalidParameters(
            "operation name must not be empty".to_string(),
        ));
    }

    let canonical = canonical_params(params)?;

    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update(b":");
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// == Canonical Params ==
/// Returns the normalized text encoding of a parameter set.
pub fn canonical_params(params: &Params) -> Result<String> {
    let mut out = String::new();
    write_map(params, &mut out)?;
    Ok(out)
}

fn write_map(params: &Params, out: &mut String) -> Result<()> {
    let sorted: BTreeMap<&str, &Param> = params
        .iter()
        .filter(|(_, v)| !matches!(v, Param::Null))
        .collect();

    out.push('{');
    for (i, (name, value)) in sorted.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_str(name, out);
        out.push(':');
        write_param(value, out)?;
    }
    out.push('}');
    Ok(())
}

fn write_param(value: &Param, out: &mut String) -> Result<()> {
    match value {
        Param::Null => out.push_str("null"),
        Param::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Param::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Param::UInt(u) => {
            let _ = write!(out, "{u}");
        }
        Param::Float(f) => {
            let number = serde_json::Number::from_f64(*f).ok_or_else(|| {
                CacheError::InvalidParameters(format!("non-finite float {f} cannot be keyed"))
            })?;
            out.push_str(&number.to_string());
        }
        Param::Text(s) => write_str(s, out),
        Param::Timestamp(ts) => write_str(
            &ts.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            out,
        ),
        Param::Date(d) => write_str(&d.format("%Y-%m-%d").to_string(), out),
        Param::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_param(item, out)?;
            }
            out.push(']');
        }
        Param::Map(params) => write_map(params, out)?,
    }
    Ok(())
}

fn write_str(s: &str, out: &mut String) {
    // JSON string escaping; serializing a &str cannot fail
    match serde_json::to_string(s) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => out.push_str("\"\""),
    }
}
