// SPDX-License-Identifier: MIT
//
// Typed configuration from environment variables, `.env` files and JSON.
//
// The target type's `Default` is serialized to a JSON object and the
// sources are overlaid on it in a fixed order, whatever order they are
// passed in:
//
//   struct default  <  JSON files  <  .env files  <  process environment
//
// Environment keys are the field path in upper snake case behind a prefix:
// with prefix `TESSERA`, field `log_file` is `TESSERA_LOG_FILE` and nested
// `mouse.double_click_ms` is `TESSERA_MOUSE_DOUBLE_CLICK_MS`. A string
// value is coerced to the JSON type the field already has (bool, integer,
// float, string, or comma-separated array), so the result deserializes
// without per-field glue.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{path}:{line}: {message}")]
    EnvFile {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{key}: {message}")]
    InvalidValue { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Where configuration values come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The process environment.
    Env,
    /// A `.env` file. A missing file is skipped.
    EnvFile(PathBuf),
    /// A JSON file holding an object. A missing file is an error.
    Json(PathBuf),
    /// JSON text holding an object.
    JsonText(String),
}

/// Load `T` with keys under `prefix` from `sources`.
///
/// # Errors
///
/// Unreadable files, malformed JSON or `.env` lines, values that cannot be
/// coerced to their field's type, or a merged object that does not
/// deserialize into `T`.
pub fn parse<T>(prefix: &str, sources: &[Source]) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    let env: HashMap<String, String> = std::env::vars().collect();
    parse_with_env(prefix, sources, &env)
}

/// [`parse`] with an explicit environment instead of the process one.
///
/// # Errors
///
/// As [`parse`].
pub fn parse_with_env<T>(prefix: &str, sources: &[Source], env: &HashMap<String, String>) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    let mut merged = serde_json::to_value(T::default())?;
    if !merged.is_object() {
        return Err(ConfigError::InvalidValue {
            key: prefix.to_owned(),
            message: "configuration type must serialize to an object".into(),
        });
    }

    for source in sources {
        let object = match source {
            Source::Json(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                debug!(path = %path.display(), "config json loaded");
                serde_json::from_str::<Value>(&text)?
            }
            Source::JsonText(text) => serde_json::from_str::<Value>(text)?,
            Source::Env | Source::EnvFile(_) => continue,
        };
        merge(&mut merged, object);
    }

    let mut file_vars = HashMap::new();
    for source in sources {
        if let Source::EnvFile(path) = source {
            match std::fs::read_to_string(path) {
                Ok(text) => file_vars.extend(parse_env_file(path, &text)?),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "env file not found, skipped");
                }
                Err(source) => {
                    return Err(ConfigError::Io {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }
    }
    overlay(&mut merged, prefix, &file_vars)?;

    if sources.contains(&Source::Env) {
        overlay(&mut merged, prefix, env)?;
    }

    Ok(serde_json::from_value(merged)?)
}

/// Deep-merge `patch` into `base`; objects merge key by key, anything else
/// replaces.
fn merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn env_key(prefix: &str, field: &str) -> String {
    let field = field.to_uppercase().replace('-', "_");
    if prefix.is_empty() {
        field
    } else {
        format!("{prefix}_{field}")
    }
}

fn overlay(value: &mut Value, prefix: &str, vars: &HashMap<String, String>) -> Result<()> {
    let Value::Object(object) = value else {
        return Ok(());
    };
    for (field, slot) in object.iter_mut() {
        let key = env_key(prefix, field);
        if slot.is_object() {
            overlay(slot, &key, vars)?;
        } else if let Some(raw) = vars.get(&key) {
            trace!(key, "config value from environment");
            *slot = coerce(&key, raw, slot)?;
        }
    }
    Ok(())
}

/// Convert `raw` to the JSON type of `current`.
fn coerce(key: &str, raw: &str, current: &Value) -> Result<Value> {
    let invalid = |message: &str| ConfigError::InvalidValue {
        key: key.to_owned(),
        message: format!("{message}, got {raw:?}"),
    };
    Ok(match current {
        Value::Bool(_) => Value::Bool(parse_bool(raw).ok_or_else(|| invalid("expected a boolean"))?),
        Value::Number(n) if n.is_f64() => {
            let f: f64 = raw.trim().parse().map_err(|_| invalid("expected a number"))?;
            Value::Number(Number::from_f64(f).ok_or_else(|| invalid("expected a finite number"))?)
        }
        Value::Number(n) if n.is_u64() => match raw.trim().parse::<u64>() {
            Ok(u) => Value::from(u),
            Err(_) => Value::from(raw.trim().parse::<i64>().map_err(|_| invalid("expected an integer"))?),
        },
        Value::Number(_) => Value::from(raw.trim().parse::<i64>().map_err(|_| invalid("expected an integer"))?),
        Value::Array(items) => {
            let template = items.first().cloned().unwrap_or(Value::String(String::new()));
            let elements = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| coerce(key, s, &template))
                .collect::<Result<Vec<_>>>()?;
            Value::Array(elements)
        }
        // `null` fields are options; accept JSON, fall back to a string.
        Value::Null => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned())),
        Value::String(_) | Value::Object(_) => Value::String(raw.to_owned()),
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ─── .env Files ─────────────────────────────────────────────────────────────

/// Parse `.env` text: `KEY=value` lines, `#` comments, optional `export`,
/// single quotes taken literally, double quotes with `\n`, `\t`, `\"` and
/// `\\` escapes.
///
/// # Errors
///
/// [`ConfigError::EnvFile`] naming the first malformed line.
pub fn parse_env_file(path: &Path, text: &str) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for (index, line) in text.lines().enumerate() {
        let error = |message: &str| ConfigError::EnvFile {
            path: path.to_owned(),
            line: index + 1,
            message: message.to_owned(),
        };

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map_or(line, str::trim_start);
        let (key, value) = line.split_once('=').ok_or_else(|| error("expected KEY=value"))?;
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(error("invalid key"));
        }
        let value = unquote(value.trim()).ok_or_else(|| error("unterminated quote"))?;
        vars.insert(key.to_owned(), value);
    }
    Ok(vars)
}

fn unquote(value: &str) -> Option<String> {
    if let Some(rest) = value.strip_prefix('\'') {
        let end = rest.find('\'')?;
        return Some(rest[..end].to_owned());
    }
    if let Some(rest) = value.strip_prefix('"') {
        let mut out = String::new();
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            match c {
                '"' => return Some(out),
                '\\' => match chars.next()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    other => out.push(other),
                },
                c => out.push(c),
            }
        }
        return None;
    }
    // Unquoted: a ` #` starts a comment.
    let value = value.find(" #").map_or(value, |i| &value[..i]);
    Some(value.trim_end().to_owned())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
