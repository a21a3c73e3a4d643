use crate::course::SessionType;
use crate::error::EngineError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut v = serde_json::json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(d) = &self.details {
            v["details"] = d.clone();
        }
        v
    }
}

impl From<EngineError> for HandlerErr {
    fn from(e: EngineError) -> Self {
        if let EngineError::Storage(inner) = &e {
            tracing::error!(error = %inner, "storage failure");
        }
        Self {
            code: e.code(),
            message: e.to_string(),
            details: e.details(),
        }
    }
}

impl From<rusqlite::Error> for HandlerErr {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Storage(e).into()
    }
}

/// Runs a handler body against the open workspace and wraps the outcome in
/// the response envelope.
pub fn with_conn<F>(state: &AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr {
        code: "internal",
        message: e.to_string(),
        details: None,
    })
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key))),
    }
}

pub fn get_required_name(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let name = get_required_str(params, key)?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(name)
}

pub fn get_required_bool(params: &serde_json::Value, key: &str) -> Result<bool, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Non-negative integer; `default` applies when the key is absent or null.
pub fn get_count(
    params: &serde_json::Value,
    key: &str,
    default: Option<u32>,
) -> Result<u32, HandlerErr> {
    match params.get(key) {
        Some(v) if !v.is_null() => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a non-negative integer", key))),
        _ => default.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key))),
    }
}

pub fn get_number(
    params: &serde_json::Value,
    key: &str,
    default: Option<f64>,
) -> Result<f64, HandlerErr> {
    match params.get(key) {
        Some(v) if !v.is_null() => v
            .as_f64()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
        _ => default.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key))),
    }
}

/// Accepts `YYYY-MM-DD`, or a timestamp whose date part is in that form.
pub fn parse_date(raw: &str) -> Result<NaiveDate, HandlerErr> {
    let t = raw.trim();
    let day = t.split_once('T').map(|(d, _)| d).unwrap_or(t);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("date must be YYYY-MM-DD, got {:?}", raw)))
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    parse_date(&get_required_str(params, key)?)
}

pub fn get_optional_session_type(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<SessionType>, HandlerErr> {
    let Some(raw) = get_optional_str(params, key)? else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    SessionType::parse(&raw)
        .map(Some)
        .ok_or_else(|| HandlerErr::bad_params("sessionType must be practical or theoretical"))
}
