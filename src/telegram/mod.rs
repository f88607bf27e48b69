//! Telegram Bot API Adapter
//!
//! ## Responsibilities
//!
//! - `Messenger` implementation over the Bot API (sendMessage/sendPhoto)
//! - Long-poll update stream feeding the inbound command handler
//!
//! Bounded timeouts on every call; send failures surface as `Dispatch`
//! errors and are left to the dispatcher's log-don't-retry policy.

mod commands;

pub use commands::CommandListener;

use crate::error::{Error, Result};
use crate::notifier::{MessageHandle, Messenger, SendOptions};
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Long-poll wait passed to getUpdates, seconds
const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

/// Telegram Bot API client
pub struct TelegramClient {
    http: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            http,
            base_url: format!("https://api.telegram.org/bot{}", token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    fn unwrap_reply<T>(reply: ApiReply<T>) -> Result<T> {
        if !reply.ok {
            return Err(Error::Dispatch(
                reply
                    .description
                    .unwrap_or_else(|| "telegram api returned ok=false".to_string()),
            ));
        }
        reply
            .result
            .ok_or_else(|| Error::Dispatch("telegram api reply missing result".to_string()))
    }

    /// Fetch pending updates past `offset` (long poll)
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let resp = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&[("offset", offset), ("timeout", POLL_TIMEOUT_SECS as i64)])
            .send()
            .await?;

        let reply: ApiReply<Vec<Update>> = resp.json().await?;
        Self::unwrap_reply(reply)
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        opts: &SendOptions,
    ) -> Result<MessageHandle> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_notification": opts.silent,
        });
        if let Some(reply_to) = opts.reply_to {
            body["reply_to_message_id"] = json!(reply_to);
        }
        if opts.markdown {
            body["parse_mode"] = json!("Markdown");
        }

        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Dispatch(e.to_string()))?;

        let reply: ApiReply<MessageResult> = resp
            .json()
            .await
            .map_err(|e| Error::Dispatch(e.to_string()))?;
        let message = Self::unwrap_reply(reply)?;

        Ok(MessageHandle {
            message_id: message.message_id,
        })
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: Vec<u8>,
        opts: &SendOptions,
    ) -> Result<MessageHandle> {
        let part = multipart::Part::bytes(photo)
            .file_name("snapshot.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| Error::Dispatch(e.to_string()))?;

        let mut form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("disable_notification", opts.silent.to_string())
            .part("photo", part);
        if let Some(reply_to) = opts.reply_to {
            form = form.text("reply_to_message_id", reply_to.to_string());
        }

        let resp = self
            .http
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Dispatch(e.to_string()))?;

        let reply: ApiReply<MessageResult> = resp
            .json()
            .await
            .map_err(|e| Error::Dispatch(e.to_string()))?;
        let message = Self::unwrap_reply(reply)?;

        Ok(MessageHandle {
            message_id: message.message_id,
        })
    }
}
