//! JSON document assembly.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Settings;
use crate::error::Result;
use crate::extract::Conversation;
use crate::platform::{PlatformKind, Role};

use super::{Assembler, format_timestamp};

/// Configuration for JSON assembly.
#[derive(Debug, Clone)]
pub struct JsonConfig {
    /// Include `source_url`.
    pub include_url: bool,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self { include_url: true }
    }
}

/// Assembler for the JSON record form.
#[derive(Debug, Clone, Default)]
pub struct JsonAssembler {
    config: JsonConfig,
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    title: &'a str,
    platform: PlatformKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_url: Option<&'a str>,
    exported_at: String,
    message_count: usize,
    messages: Vec<JsonMessage<'a>>,
}

#[derive(Serialize)]
struct JsonMessage<'a> {
    role: Role,
    text: &'a str,
    markdown: &'a str,
}

impl JsonAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: JsonConfig) -> Self {
        Self { config }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_config(JsonConfig {
            include_url: settings.include_raw_url,
        })
    }
}

impl Assembler for JsonAssembler {
    fn assemble(&self, conversation: &Conversation, exported_at: DateTime<Utc>) -> Result<String> {
        let doc = JsonDocument {
            title: &conversation.title,
            platform: conversation.platform,
            source_url: self.config.include_url.then_some(conversation.url.as_str()),
            exported_at: format_timestamp(exported_at),
            message_count: conversation.messages.len(),
            messages: conversation
                .messages
                .iter()
                .map(|m| JsonMessage {
                    role: m.role,
                    text: &m.text,
                    markdown: &m.markdown,
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ConversationMessage;
    use chrono::TimeZone;
    use serde_json::Value;

    fn conversation() -> Conversation {
        Conversation {
            platform: PlatformKind::Gemini,
            title: "Plot".to_string(),
            url: "https://gemini.google.com/app/1".to_string(),
            messages: vec![ConversationMessage {
                role: Role::Assistant,
                markdown: "**bold**".to_string(),
                text: "bold".to_string(),
                key: "r1".to_string(),
            }],
        }
    }

    #[test]
    fn test_json_document() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let out = JsonAssembler::new().assemble(&conversation(), at).unwrap();
        assert!(out.starts_with("{\n  \"title\": \"Plot\",\n  \"platform\": \"gemini\",\n"));

        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["source_url"], "https://gemini.google.com/app/1");
        assert_eq!(value["exported_at"], "2024-05-01T12:00:00.000Z");
        assert_eq!(value["message_count"], 1);
        assert_eq!(value["messages"][0]["role"], "assistant");
        assert_eq!(value["messages"][0]["text"], "bold");
        assert_eq!(value["messages"][0]["markdown"], "**bold**");
        assert!(value["messages"][0].get("key").is_none());
    }

    #[test]
    fn test_source_url_omitted() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let out = JsonAssembler::with_config(JsonConfig { include_url: false })
            .assemble(&conversation(), at)
            .unwrap();
        assert!(!out.contains("source_url"));
    }
}
