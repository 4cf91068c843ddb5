pub mod rest;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use types::*;

/// Outbound messaging channel.
///
/// `Err` means the request never produced a readable API response.
/// API-level rejections come back as `Ok` with `ok == false`.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn send_message(&self, req: &SendMessageRequest) -> Result<ApiResponse<Message>>;
    async fn edit_message(
        &self,
        req: &EditMessageTextRequest,
    ) -> Result<ApiResponse<serde_json::Value>>;
    async fn delete_message(&self, req: &DeleteMessageRequest) -> Result<ApiResponse<bool>>;
}

const IGNORABLE_DELETE_DESCRIPTIONS: [&str; 2] = [
    "message to delete not found",
    "message can't be deleted",
];

/// Delete failures that still mean the record can be dropped: the message is
/// already gone, or it is past the platform's deletion window.
pub fn is_ignorable_delete<T>(resp: &ApiResponse<T>) -> bool {
    if resp.ok || resp.error_code != Some(400) {
        return false;
    }
    let description = resp.description.as_deref().unwrap_or_default();
    IGNORABLE_DELETE_DESCRIPTIONS
        .iter()
        .any(|pattern| description.contains(pattern))
}

/// The Bot API rejects edits that would leave text and markup unchanged.
pub fn is_not_modified<T>(resp: &ApiResponse<T>) -> bool {
    !resp.ok
        && resp
            .description
            .as_deref()
            .is_some_and(|d| d.contains("message is not modified"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_not_found_is_ignorable() {
        let resp: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok":false,"error_code":400,"description":"Bad Request: message to delete not found"}"#,
        )
        .unwrap();
        assert!(is_ignorable_delete(&resp));
    }

    #[test]
    fn test_delete_window_elapsed_is_ignorable() {
        let resp: ApiResponse<bool> =
            ApiResponse::failure(400, "Bad Request: message can't be deleted");
        assert!(is_ignorable_delete(&resp));
    }

    #[test]
    fn test_chat_not_found_is_not_ignorable() {
        let resp: ApiResponse<bool> = ApiResponse::failure(403, "chat not found");
        assert!(!is_ignorable_delete(&resp));
    }

    #[test]
    fn test_matching_description_needs_400() {
        let resp: ApiResponse<bool> = ApiResponse::failure(403, "message to delete not found");
        assert!(!is_ignorable_delete(&resp));
    }

    #[test]
    fn test_success_is_not_ignorable() {
        assert!(!is_ignorable_delete(&ApiResponse::success(true)));
    }

    #[test]
    fn test_not_modified_detected() {
        let resp: ApiResponse<serde_json::Value> = ApiResponse::failure(
            400,
            "Bad Request: message is not modified: specified new message content and reply markup are exactly the same",
        );
        assert!(is_not_modified(&resp));
        assert!(!is_not_modified(&ApiResponse::success(serde_json::Value::Bool(true))));
    }

    #[test]
    fn test_failed_send_response_parses_without_result() {
        let resp: ApiResponse<Message> = serde_json::from_str(
            r#"{"ok":false,"error_code":403,"description":"Forbidden: bot is not a member of the channel chat"}"#,
        )
        .unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.result, None);
        assert_eq!(resp.error_code, Some(403));
    }

    #[test]
    fn test_send_response_parses_message_id() {
        let resp: ApiResponse<Message> = serde_json::from_str(
            r#"{"ok":true,"result":{"message_id":4242,"chat":{"id":-100123},"date":1700000000,"text":"hi"}}"#,
        )
        .unwrap();
        assert!(resp.ok);
        assert_eq!(resp.result.unwrap().message_id, 4242);
    }
}
