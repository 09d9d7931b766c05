//! Markdown document assembly.
//!
//! Layout: front-matter (or a plain header), an optional table of contents,
//! then one section per message.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::config::{HeadingStyle, Settings};
use crate::error::Result;
use crate::extract::Conversation;
use crate::markdown::escape_yaml_string;
use crate::patterns::MULTI_NEWLINE_RE;
use crate::platform::Role;

use super::{Assembler, format_timestamp};

/// Configuration for Markdown assembly.
#[derive(Debug, Clone)]
pub struct MarkdownConfig {
    /// YAML front-matter instead of a `# title` header.
    pub front_matter: bool,
    /// `## Table of Contents` with per-message anchors.
    pub toc: bool,
    pub heading_style: HeadingStyle,
    /// Include the page URL.
    pub include_url: bool,
    /// Collapse runs of three or more newlines.
    pub compact: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            front_matter: true,
            toc: false,
            heading_style: HeadingStyle::Role,
            include_url: true,
            compact: true,
        }
    }
}

/// Assembler for Markdown output.
#[derive(Debug, Clone, Default)]
pub struct MarkdownAssembler {
    config: MarkdownConfig,
}

impl MarkdownAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MarkdownConfig) -> Self {
        Self { config }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_config(MarkdownConfig {
            front_matter: settings.include_yaml_front_matter,
            toc: settings.include_toc,
            heading_style: settings.heading_style,
            include_url: settings.include_raw_url,
            compact: settings.compact_blank_lines,
        })
    }

    fn write_front_matter(&self, out: &mut String, conversation: &Conversation, ts: &str) {
        out.push_str("---\n");
        let _ = writeln!(out, "title: \"{}\"", escape_yaml_string(&conversation.title));
        let _ = writeln!(out, "platform: \"{}\"", conversation.platform);
        if self.config.include_url {
            let _ = writeln!(out, "source_url: \"{}\"", conversation.url);
        }
        let _ = writeln!(out, "exported_at: \"{ts}\"");
        let _ = writeln!(out, "message_count: {}", conversation.messages.len());
        out.push_str("---\n\n");
    }

    fn write_header(&self, out: &mut String, conversation: &Conversation, ts: &str) {
        let _ = write!(
            out,
            "# {}\n\n- Platform: {}\n- Exported at: {ts}\n",
            conversation.title, conversation.platform
        );
        if self.config.include_url {
            let _ = writeln!(out, "- Source: {}", conversation.url);
        }
        out.push('\n');
    }

    fn write_toc(&self, out: &mut String, conversation: &Conversation) {
        out.push_str("## Table of Contents\n");
        let entries: Vec<String> = conversation
            .messages
            .iter()
            .enumerate()
            .map(|(i, m)| format!("- [{n}. {role}](#msg-{n})", n = i + 1, role = m.role))
            .collect();
        out.push_str(&entries.join("\n"));
        out.push_str("\n\n");
    }

    fn heading(&self, role: Role) -> String {
        match self.config.heading_style {
            HeadingStyle::Qa if role == Role::User => "# Q".to_string(),
            HeadingStyle::Qa => "# A".to_string(),
            HeadingStyle::Role => format!("## {}", role.label()),
        }
    }
}

impl Assembler for MarkdownAssembler {
    fn assemble(&self, conversation: &Conversation, exported_at: DateTime<Utc>) -> Result<String> {
        let ts = format_timestamp(exported_at);
        let mut out = String::new();

        if self.config.front_matter {
            self.write_front_matter(&mut out, conversation, &ts);
        } else {
            self.write_header(&mut out, conversation, &ts);
        }

        if self.config.toc {
            self.write_toc(&mut out, conversation);
        }

        for (i, message) in conversation.messages.iter().enumerate() {
            if self.config.toc {
                let _ = writeln!(out, "<a id=\"msg-{}\"></a>", i + 1);
            }
            let _ = write!(out, "{}\n\n{}\n\n", self.heading(message.role), message.markdown);
        }

        let out = if self.config.compact {
            MULTI_NEWLINE_RE.replace_all(&out, "\n\n").into_owned()
        } else {
            out
        };
        Ok(format!("{}\n", out.trim()))
    }
}
