//! Wire protocol types for the session broker.
//!
//! Messages travel as JSON text frames over the WebSocket. Inbound messages
//! are dispatched by which key is present; outbound messages are typed
//! envelopes with optional fields omitted when unset.

use serde::{Deserialize, Serialize};

use crate::catalog::SchemaPayload;
use crate::codec::Record;

/// Inbound client message. Keys are mutually exclusive; the first one
/// present (in the order below) wins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inbound {
    /// A natural-language question.
    pub user_input: Option<String>,

    /// Request for the exported schema payload.
    pub get_schema_context: Option<bool>,

    /// Table names the generation context should be restricted to.
    pub schema_context_update: Option<Vec<String>>,
}

/// Outbound broker message.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    /// Answer to a `user_input` message.
    Reply {
        reply: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        db_result: Option<Vec<Record>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Answer to a `get_schema_context` request.
    SchemaContext {
        db_schema_context: SchemaPayload,
        get_schema_context: bool,
    },

    /// Answer to a `schema_context_update` request: the table names
    /// actually included in the new context.
    ContextUpdated { schema_context_updated: Vec<String> },

    /// Empty envelope for unrecognized message shapes.
    Empty {},
}

impl Outbound {
    /// Creates a bare text reply.
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply {
            reply: text.into(),
            db_result: None,
            error: None,
        }
    }

    /// Creates a reply carrying query results.
    pub fn reply_with_rows(text: impl Into<String>, rows: Vec<Record>) -> Self {
        Self::Reply {
            reply: text.into(),
            db_result: Some(rows),
            error: None,
        }
    }

    /// Creates a best-effort reply carrying a structured error.
    pub fn reply_with_error(text: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Reply {
            reply: text.into(),
            db_result: None,
            error: Some(error.into()),
        }
    }
}
