//! The uniform `{code, msg, data}` body returned for every request.

use crate::error::MarkifyError;
use serde::{Deserialize, Serialize};

/// Response body of `POST /knowledge_base/doc_parse`.
///
/// `data` is present exactly when `code == 200`. The constructors are the
/// only way to build one, so that holds for every envelope the service emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    code: u16,
    msg: String,
    data: Option<String>,
}

impl ResponseEnvelope {
    /// Successful parse carrying the Markdown.
    pub fn success(msg: impl Into<String>, markdown: String) -> Self {
        Self {
            code: 200,
            msg: msg.into(),
            data: Some(markdown),
        }
    }

    /// Failure envelope for `err`, coded 400 or 500 by its kind.
    pub fn from_error(err: &MarkifyError) -> Self {
        let msg = if err.is_client_error() {
            err.to_string()
        } else {
            format!("Error: {err}")
        };
        Self {
            code: err.status_code(),
            msg,
            data: None,
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_carries_data() {
        let env = ResponseEnvelope::success("Successfully processed a.txt", "hello".into());
        assert_eq!(env.code(), 200);
        assert_eq!(env.data(), Some("hello"));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["code"], 200);
        assert_eq!(json["msg"], "Successfully processed a.txt");
        assert_eq!(json["data"], "hello");
    }

    #[test]
    fn errors_never_carry_data() {
        let client = ResponseEnvelope::from_error(&MarkifyError::UnsupportedFormat {
            file_name: "a.rtf".into(),
        });
        assert_eq!(client.code(), 400);
        assert_eq!(client.msg(), "Format not supported: a.rtf");
        assert!(client.data().is_none());

        let internal = ResponseEnvelope::from_error(&MarkifyError::Internal("boom".into()));
        assert_eq!(internal.code(), 500);
        assert!(internal.msg().starts_with("Error: "));
        let json = serde_json::to_value(&internal).unwrap();
        assert!(json["data"].is_null());
    }
}
