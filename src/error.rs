//! The engine's unified error taxonomy, collected into one enum so the
//! dispatcher can serialize any of it into the wire error payload.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Every failure kind the engine can produce.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("template composition cycle: {path}")]
    Cycle { path: String },

    #[error("no template named {name:?}")]
    MissingTemplate { name: String },

    #[error("evaluation failed: {message}")]
    Eval { message: String },

    #[error("no session for this token")]
    NotFound,

    #[error("session expired")]
    Expired,

    #[error("unknown action {action:?}")]
    UnknownAction { action: String },

    #[error("validation failed")]
    Validation { fields: BTreeMap<String, String> },

    #[error("action failed: {message}")]
    Action { message: String },

    #[error("canceled")]
    Canceled,
}

impl EngineError {
    /// The stable wire identifier the client can match on (not a Rust
    /// type name).
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Syntax { .. } => "SyntaxError",
            EngineError::Cycle { .. } => "CycleError",
            EngineError::MissingTemplate { .. } => "MissingTemplateError",
            EngineError::Eval { .. } => "EvalError",
            EngineError::NotFound => "NotFound",
            EngineError::Expired => "Expired",
            EngineError::UnknownAction { .. } => "UnknownAction",
            EngineError::Validation { .. } => "ValidationError",
            EngineError::Action { .. } => "ActionError",
            EngineError::Canceled => "Canceled",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let fields = match self {
            EngineError::Validation { fields } => Some(fields.clone()),
            _ => None,
        };
        ErrorPayload {
            error: ErrorBody {
                kind: self.kind().to_string(),
                message: self.to_string(),
                fields,
            },
        }
    }
}

/// Wire shape: `{"error": {"kind", "message", "fields"?}}`.
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}
