use serde::{Deserialize, Serialize};

// Bot API wire types. Only the fields this service sends or reads.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SendMessageRequest {
    pub chat_id: String,
    pub text: String,
    pub parse_mode: String,
    pub reply_markup: InlineKeyboardMarkup,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EditMessageTextRequest {
    pub chat_id: String,
    pub message_id: i64,
    pub text: String,
    pub parse_mode: String,
    pub reply_markup: InlineKeyboardMarkup,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeleteMessageRequest {
    pub chat_id: String,
    pub message_id: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Message {
    pub message_id: i64,
}

/// Envelope shared by every Bot API method.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(result: T) -> Self {
        Self { ok: true, result: Some(result), error_code: None, description: None }
    }

    pub fn failure(error_code: i64, description: &str) -> Self {
        Self {
            ok: false,
            result: None,
            error_code: Some(error_code),
            description: Some(description.to_string()),
        }
    }

    /// `"{code}: {description}"` for logs and errors.
    pub fn error_summary(&self) -> String {
        format!(
            "{}: {}",
            self.error_code.unwrap_or_default(),
            self.description.as_deref().unwrap_or("no description")
        )
    }
}
