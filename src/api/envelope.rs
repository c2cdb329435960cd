//! Backend envelope normalization.
//!
//! The backend's endpoints were built inconsistently over time and do not
//! share one envelope shape. Payload extraction is therefore an ordered
//! list of pure strategies, applied in documented priority order; the
//! first strategy that recognizes the envelope wins.

use serde_json::{Map, Value};
use tracing::warn;

use super::Endpoint;
use crate::error::AppError;

/// Diagnostic key carrying the raw envelope alongside object payloads.
/// Must be stripped before a payload is treated as user data.
pub const ENVELOPE_KEY: &str = "_envelope";

/// Envelope metadata fields stripped by the last-resort strategy.
const META_KEYS: &[&str] = &["status", "Status", "message", "Message", "code", "messages"];

type Strategy = fn(Endpoint, &Value) -> Option<Value>;

/// Extraction strategies in priority order. Each is a pure function from
/// envelope to payload; `strip_metadata` always matches, so the chain is
/// total.
const STRATEGIES: &[Strategy] = &[
    login_conflation,
    array_result,
    object_result,
    primitive_result,
    data_field,
    bare_array,
    strip_metadata,
];

/// Validates transport- and application-level success and extracts the
/// logical payload for `endpoint`.
pub fn normalize_response(endpoint: Endpoint, status: u16, body: &str) -> Result<Value, AppError> {
    if !(200..300).contains(&status) {
        return Err(transport_error(status, body));
    }

    let text = body.trim();
    if text.is_empty() {
        warn!(endpoint = %endpoint, "empty response body");
        return Ok(Value::Null);
    }

    let envelope: Value = serde_json::from_str(text).map_err(|_| AppError::InvalidResponseFormat)?;
    check_status_flag(&envelope)?;

    for strategy in STRATEGIES {
        if let Some(payload) = strategy(endpoint, &envelope) {
            return Ok(payload);
        }
    }

    Ok(envelope)
}

/// Maps a non-2xx transport status to one error kind. 401 is always a
/// session expiry, regardless of what the body says.
fn transport_error(status: u16, body: &str) -> AppError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP error: {status}"));

    match status {
        400 => AppError::BadRequest(message),
        401 => AppError::SessionExpired,
        403 => AppError::AccessDenied,
        404 => AppError::NotFound("Resource not found.".to_string()),
        422 => AppError::Validation(message),
        429 => AppError::RateLimited,
        500..=599 => AppError::Server(message),
        _ => AppError::Server(format!("Unexpected status {status}")),
    }
}

/// Object envelopes must carry a passing status flag under `status` or
/// `Status`; `"ok"` and `"success"` pass case-insensitively. Non-object
/// envelopes (bare arrays) have nowhere to carry a flag and pass through.
fn check_status_flag(envelope: &Value) -> Result<(), AppError> {
    let Some(object) = envelope.as_object() else {
        return Ok(());
    };

    let flag = object
        .get("status")
        .or_else(|| object.get("Status"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    if flag.eq_ignore_ascii_case("ok") || flag.eq_ignore_ascii_case("success") {
        return Ok(());
    }

    let message = object
        .get("message")
        .or_else(|| object.get("Message"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("Request failed");

    if message.to_lowercase().contains("not found") {
        return Err(AppError::NotFound(message.to_string()));
    }

    Err(AppError::Backend(message.to_string()))
}

/// Login conflates the access token with the envelope's `message` field.
/// The payload is whatever object sits under `result`, plus a synthetic
/// `message` holding the raw message and the diagnostic envelope copy.
fn login_conflation(endpoint: Endpoint, envelope: &Value) -> Option<Value> {
    if endpoint != Endpoint::Login {
        return None;
    }

    let mut payload = match envelope.get("result") {
        Some(Value::Object(object)) => object.clone(),
        _ => Map::new(),
    };
    payload.insert("message".to_string(), envelope.get("message").cloned().unwrap_or(Value::Null));
    payload.insert(ENVELOPE_KEY.to_string(), envelope.clone());

    Some(Value::Object(payload))
}

/// Array endpoints get their `result` verbatim; callers must not receive
/// extra fields attached to array elements.
fn array_result(_: Endpoint, envelope: &Value) -> Option<Value> {
    match envelope.get("result") {
        Some(result @ Value::Array(_)) => Some(result.clone()),
        _ => None,
    }
}

fn object_result(_: Endpoint, envelope: &Value) -> Option<Value> {
    match envelope.get("result") {
        Some(Value::Object(object)) => {
            let mut payload = object.clone();
            payload.insert(ENVELOPE_KEY.to_string(), envelope.clone());
            Some(Value::Object(payload))
        }
        _ => None,
    }
}

fn primitive_result(_: Endpoint, envelope: &Value) -> Option<Value> {
    match envelope.get("result") {
        Some(Value::Null) | None => None,
        Some(result) => Some(result.clone()),
    }
}

fn data_field(_: Endpoint, envelope: &Value) -> Option<Value> {
    match envelope.get("data") {
        Some(data @ (Value::Array(_) | Value::Object(_))) => Some(data.clone()),
        _ => None,
    }
}

fn bare_array(_: Endpoint, envelope: &Value) -> Option<Value> {
    envelope.is_array().then(|| envelope.clone())
}

/// Last resort: drop known envelope metadata and return whatever is left,
/// or the raw envelope when nothing is.
fn strip_metadata(_: Endpoint, envelope: &Value) -> Option<Value> {
    let Some(object) = envelope.as_object() else {
        return Some(envelope.clone());
    };

    let remainder: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| !META_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if remainder.is_empty() {
        Some(envelope.clone())
    } else {
        Some(Value::Object(remainder))
    }
}

/// Removes the diagnostic envelope copy a payload may carry before it is
/// treated as user data.
pub fn strip_diagnostics(payload: &Value) -> Value {
    match payload {
        Value::Object(object) => {
            let cleaned: Map<String, Value> = object
                .iter()
                .filter(|(key, _)| key.as_str() != ENVELOPE_KEY)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Value::Object(cleaned)
        }
        other => other.clone(),
    }
}
