use serde_json::json;
use tracing::warn;

use crate::error::CoreError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let message = message.into();
    warn!(request_id = id, code, %message, "request failed");
    let mut error = json!({
        "code": code,
        "message": message,
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
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

    pub fn no_workspace() -> Self {
        Self {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut v = json!({ "code": self.code, "message": self.message });
        if let Some(d) = &self.details {
            v["details"] = d.clone();
        }
        v
    }
}

impl From<CoreError> for HandlerErr {
    fn from(e: CoreError) -> Self {
        Self {
            code: e.code(),
            details: e.details(),
            message: e.to_string(),
        }
    }
}

impl From<anyhow::Error> for HandlerErr {
    fn from(e: anyhow::Error) -> Self {
        CoreError::Store(e).into()
    }
}

/// Runs a handler body and wraps its outcome in the response envelope.
pub fn respond<F>(id: &str, f: F) -> serde_json::Value
where
    F: FnOnce() -> Result<serde_json::Value, HandlerErr>,
{
    match f() {
        Ok(result) => ok(id, result),
        Err(e) => e.response(id),
    }
}
