//! Export settings.
//!
//! Settings are a flat object with camelCase keys. Missing keys take their
//! defaults and unknown keys are ignored, so settings files written by older
//! or newer versions keep loading.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Md,
    Json,
}

/// How message sections are titled in Markdown output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingStyle {
    /// `## User` / `## Assistant`
    #[default]
    Role,
    /// `# Q` / `# A`
    Qa,
}

/// Output form of an embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataUriMode {
    /// `<img alt="..." src="data:..." />`
    #[default]
    Html,
    /// `![alt](data:...)`
    Md,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub export_format: ExportFormat,
    pub include_yaml_front_matter: bool,
    #[serde(rename = "includeTOC")]
    pub include_toc: bool,
    pub heading_style: HeadingStyle,
    pub include_raw_url: bool,

    pub dedupe_consecutive: bool,
    #[serde(rename = "stripUIJunk")]
    pub strip_ui_junk: bool,
    pub compact_blank_lines: bool,
    pub export_visible_only: bool,

    pub prefer_block_math_for_multiline: bool,
    pub normalize_multiline_math: bool,
    pub inline_math_delim: String,
    pub block_math_delim: String,

    pub embed_images_in_markdown: bool,
    pub allow_image_fetch: bool,
    pub max_embed_image_bytes: usize,
    pub data_uri_image_mode: DataUriMode,
    pub attachment_fallback_scan: bool,
    pub relocate_ui_image_blocks: bool,

    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            export_format: ExportFormat::Md,
            include_yaml_front_matter: true,
            include_toc: false,
            heading_style: HeadingStyle::Role,
            include_raw_url: true,

            dedupe_consecutive: true,
            strip_ui_junk: true,
            compact_blank_lines: true,
            export_visible_only: true,

            prefer_block_math_for_multiline: true,
            normalize_multiline_math: true,
            inline_math_delim: "$".to_string(),
            block_math_delim: "$$".to_string(),

            embed_images_in_markdown: false,
            allow_image_fetch: false,
            max_embed_image_bytes: 2_500_000,
            data_uri_image_mode: DataUriMode::Html,
            attachment_fallback_scan: true,
            relocate_ui_image_blocks: true,

            debug: false,
        }
    }
}

/// Keys renamed since earlier releases: (old, new).
const LEGACY_KEYS: &[(&str, &str)] = &[("geminiAttachmentFallbackScan", "attachmentFallbackScan")];

impl Settings {
    /// Parse settings from JSON, migrating legacy keys.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(json)?;
        migrate(&mut value);
        Ok(serde_json::from_value(value)?)
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Move legacy keys to their current names unless the current key is set.
fn migrate(value: &mut Value) {
    let Some(map) = value.as_object_mut() else {
        return;
    };
    for (old, new) in LEGACY_KEYS {
        if let Some(legacy) = map.remove(*old)
            && !map.contains_key(*new)
        {
            tracing::debug!(from = *old, to = *new, "migrated legacy setting");
            map.insert((*new).to_string(), legacy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_embed_image_bytes, 2_500_000);
        assert_eq!(settings.inline_math_delim, "$");
    }

    #[test]
    fn test_camel_case_keys_and_unknown_keys() {
        let settings = Settings::from_json(
            r#"{"exportFormat":"json","headingStyle":"qa","stripUIJunk":false,"dataUriImageMode":"md","somethingNew":1}"#,
        )
        .unwrap();
        assert_eq!(settings.export_format, ExportFormat::Json);
        assert_eq!(settings.heading_style, HeadingStyle::Qa);
        assert!(!settings.strip_ui_junk);
        assert_eq!(settings.data_uri_image_mode, DataUriMode::Md);
        assert!(settings.dedupe_consecutive);
    }

    #[test]
    fn test_legacy_key_migrates() {
        let settings = Settings::from_json(r#"{"geminiAttachmentFallbackScan":false}"#).unwrap();
        assert!(!settings.attachment_fallback_scan);
    }

    #[test]
    fn test_current_key_beats_legacy() {
        let settings = Settings::from_json(
            r#"{"geminiAttachmentFallbackScan":false,"attachmentFallbackScan":true}"#,
        )
        .unwrap();
        assert!(settings.attachment_fallback_scan);
    }

    #[test]
    fn test_json_round_trip_keeps_key_names() {
        let json = Settings::default().to_json().unwrap();
        assert!(json.contains("\"stripUIJunk\""));
        assert!(json.contains("\"includeYamlFrontMatter\""));
        assert_eq!(Settings::from_json(&json).unwrap(), Settings::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"includeTOC":true}"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert!(settings.include_toc);
    }
}
