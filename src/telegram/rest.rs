use super::types::*;
use super::MessagingChannel;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct TelegramRest {
    client: Client,
    base_url: String,
    token: String,
    dry_run: bool,
}

impl TelegramRest {
    pub fn new(base_url: &str, token: String, dry_run: bool) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            dry_run,
        }
    }

    pub fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// POST a JSON body. 4xx responses still carry an API envelope, so the
    /// body is parsed whatever the status.
    async fn call<B, T>(&self, method: &str, body: &B) -> Result<ApiResponse<T>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .with_context(|| format!("failed to read {} response", method))?;
        match serde_json::from_str::<ApiResponse<T>>(&text) {
            Ok(parsed) => Ok(parsed),
            Err(e) => anyhow::bail!("{} failed ({}): {} ({})", method, status, text, e),
        }
    }
}

#[async_trait]
impl MessagingChannel for TelegramRest {
    async fn send_message(&self, req: &SendMessageRequest) -> Result<ApiResponse<Message>> {
        if self.dry_run {
            tracing::info!(chat_id = %req.chat_id, text = %req.text, "DRY RUN: would send message");
            return Ok(ApiResponse::success(Message { message_id: 0 }));
        }
        self.call("sendMessage", req).await
    }

    async fn edit_message(
        &self,
        req: &EditMessageTextRequest,
    ) -> Result<ApiResponse<serde_json::Value>> {
        if self.dry_run {
            tracing::info!(
                chat_id = %req.chat_id,
                message_id = req.message_id,
                text = %req.text,
                "DRY RUN: would edit message"
            );
            return Ok(ApiResponse::success(serde_json::Value::Bool(true)));
        }
        self.call("editMessageText", req).await
    }

    async fn delete_message(&self, req: &DeleteMessageRequest) -> Result<ApiResponse<bool>> {
        if self.dry_run {
            tracing::info!(
                chat_id = %req.chat_id,
                message_id = req.message_id,
                "DRY RUN: would delete message"
            );
            return Ok(ApiResponse::success(true));
        }
        self.call("deleteMessage", req).await
    }
}
