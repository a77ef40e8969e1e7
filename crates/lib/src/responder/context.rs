//! Correlation data captured when an update arrives and carried with its queued item.

use std::fmt;

use crate::channels::TelegramUpdate;

/// Identifiers that tie log lines for one message together, from admission until the
/// worker is done with it. Rendered as `req=.. update=.. chat=.. user=..`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingContext {
    pub request_id: Option<String>,
    pub update_id: Option<i64>,
    pub chat_id: Option<i64>,
    pub user_id: Option<i64>,
}

impl ProcessingContext {
    pub fn from_update(update: &TelegramUpdate) -> Self {
        let message = update.message.as_ref();
        Self {
            request_id: None,
            update_id: Some(update.update_id),
            chat_id: message.map(|m| m.chat.id),
            user_id: message.and_then(|m| m.from.as_ref()).map(|u| u.id),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl fmt::Display for ProcessingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(4);
        if let Some(id) = &self.request_id {
            parts.push(format!("req={}", id));
        }
        if let Some(id) = self.update_id {
            parts.push(format!("update={}", id));
        }
        if let Some(id) = self.chat_id {
            parts.push(format!("chat={}", id));
        }
        if let Some(id) = self.user_id {
            parts.push(format!("user={}", id));
        }
        if parts.is_empty() {
            return f.write_str("-");
        }
        f.write_str(&parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn built_from_update_and_rendered_in_order() {
        let update: TelegramUpdate = serde_json::from_value(json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "chat": { "id": -5, "type": "group" },
                "from": { "id": 77, "is_bot": false, "first_name": "Ada" },
                "text": "hello"
            }
        }))
        .expect("update");
        let ctx = ProcessingContext::from_update(&update).with_request_id("abc");
        assert_eq!(ctx.to_string(), "req=abc update=10 chat=-5 user=77");
    }

    #[test]
    fn empty_context_renders_placeholder() {
        assert_eq!(ProcessingContext::default().to_string(), "-");
    }
}
