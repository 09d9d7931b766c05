//! Site adapters.
//!
//! Each supported chat front-end gets a [`Platform`] implementation that knows
//! where the messages are, who wrote them, and which controls page in older
//! history or reveal hidden reasoning. Everything site-specific lives behind
//! this trait; the rest of the crate only sees [`Message`]s.

mod chatgpt;
mod gemini;
mod grok;

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::patterns::{COLLAPSE_WORD_RE, EXPAND_WORD_RE, LICENSED_IMAGE_RE, TITLE_SUFFIX_RE};

pub use chatgpt::ChatGpt;
pub use gemini::Gemini;
pub use grok::Grok;

/// Minimum overflow before an element counts as scrollable.
const SCROLL_SLACK: f32 = 80.0;

/// The supported front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    ChatGpt,
    Gemini,
    Grok,
}

impl PlatformKind {
    /// Identify the front-end serving `url`.
    pub fn detect(url: &Url) -> Result<Self> {
        let host = url.host_str().unwrap_or("");
        if host.contains("chatgpt.com") || host.contains("chat.openai.com") {
            Ok(PlatformKind::ChatGpt)
        } else if host.contains("gemini.google.com") || host.contains("bard.google.com") {
            Ok(PlatformKind::Gemini)
        } else if host.contains("grok.x.ai") || (host == "x.com" && url.path().starts_with("/i/grok")) {
            Ok(PlatformKind::Grok)
        } else {
            Err(Error::UnsupportedSite(url.to_string()))
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PlatformKind::ChatGpt => "chatgpt",
            PlatformKind::Gemini => "gemini",
            PlatformKind::Grok => "grok",
        }
    }

    /// The adapter for this front-end.
    pub fn adapter(self) -> &'static dyn Platform {
        match self {
            PlatformKind::ChatGpt => &ChatGpt,
            PlatformKind::Gemini => &Gemini,
            PlatformKind::Grok => &Grok,
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Unknown,
}

impl Role {
    pub fn parse(s: &str) -> Self {
        match s {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Unknown => "unknown",
        }
    }

    /// Section heading label.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
            Role::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a message's role was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    /// Markup states the role.
    Explicit,
    /// Inferred from words in the message text.
    Keyword,
    /// Guessed from position, user first. May be wrong.
    Alternating,
}

/// One message located by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content_root: NodeId,
    pub stable_key: String,
    pub role_source: RoleSource,
}

/// Where the conversation scrolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    Element(NodeId),
    Window,
}

/// Site-specific knowledge about one chat front-end.
pub trait Platform: Sync {
    fn kind(&self) -> PlatformKind;

    /// Conversation title.
    fn title(&self, dom: &Document) -> String;

    fn scroll_container(&self, dom: &Document) -> ScrollTarget;

    /// Messages in conversational order.
    fn messages(&self, dom: &Document) -> Vec<Message>;

    /// Buttons that page in older history.
    fn load_more_controls(&self, dom: &Document) -> Vec<NodeId>;

    /// Buttons that show or hide model reasoning.
    fn reasoning_toggles(&self, dom: &Document) -> Vec<NodeId>;

    /// Whether an `<img>` is something the user uploaded.
    fn is_uploaded_image(&self, dom: &Document, el: NodeId, source: &str) -> bool;

    /// Whether an image is licensed search content shown in an answer.
    fn is_licensed_content(&self, _dom: &Document, _el: NodeId, source: &str) -> bool {
        LICENSED_IMAGE_RE.is_match(source)
    }
}

/// `<title>` without its ` - Site` suffix, or `conversation`.
pub fn fallback_title(dom: &Document) -> String {
    let title = dom.title().unwrap_or_default();
    let title = TITLE_SUFFIX_RE.replace(&title, "");
    match title.trim() {
        "" => "conversation".to_string(),
        t => t.to_string(),
    }
}

/// First trimmed non-empty text among the first matches of `selectors`.
fn first_text(dom: &Document, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        dom.query_selector(dom.root(), css)
            .and_then(|el| dom.trimmed_text(el))
    })
}

/// First candidate whose content overflows its box.
fn find_scroll_container(dom: &Document, candidates: &[Option<NodeId>]) -> ScrollTarget {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|&id| {
            dom.geometry(id)
                .is_some_and(|g| g.scroll_height > g.height + SCROLL_SLACK)
        })
        .map_or(ScrollTarget::Window, ScrollTarget::Element)
}

/// Controls under `main` (or `body`) whose trimmed text matches `pattern`.
fn controls_matching(dom: &Document, css: &str, pattern: &regex_lite::Regex) -> Vec<NodeId> {
    dom.query_selector_all(dom.main_or_body(), css)
        .into_iter()
        .filter(|&el| pattern.is_match(dom.text_content(el).trim()))
        .collect()
}

/// Whether a reasoning toggle's label offers to expand rather than collapse.
pub fn looks_like_expand_text(text: &str) -> bool {
    let t = text.trim();
    EXPAND_WORD_RE.is_match(t) && !COLLAPSE_WORD_RE.is_match(t)
}

fn non_empty_attr<'a>(dom: &'a Document, id: NodeId, name: &str) -> Option<&'a str> {
    dom.get_attr(id, name).filter(|v| !v.is_empty())
}

/// Assign user/assistant by position and flag the guess.
fn alternating_role(idx: usize) -> Role {
    if idx % 2 == 0 { Role::User } else { Role::Assistant }
}
