//! grok.x.ai and x.com/i/grok

use std::sync::LazyLock;

use regex_lite::Regex;

use super::{
    Message, Platform, PlatformKind, Role, RoleSource, ScrollTarget, alternating_role,
    controls_matching, fallback_title, find_scroll_container, non_empty_attr,
};
use crate::dom::{Document, NodeId};
use crate::patterns::{GROK_UPLOADED_ALT_RE, GROK_WORD_RE, GROK_YOU_PREFIX_RE, GROK_YOU_WORD_RE};

static LOAD_MORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(show more|load more|more|加载更多|显示更多|展开)").unwrap());

static REASONING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(show reasoning|hide reasoning|thoughts|推理|思路|思考)").unwrap()
});

pub struct Grok;

impl Platform for Grok {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Grok
    }

    fn title(&self, dom: &Document) -> String {
        fallback_title(dom)
    }

    fn scroll_container(&self, dom: &Document) -> ScrollTarget {
        let main = dom.query_selector(dom.root(), "main");
        find_scroll_container(dom, &[main, dom.document_element()])
    }

    /// Message bubbles carry no role markup, so the role comes from speaker
    /// words in the text, else from position.
    fn messages(&self, dom: &Document) -> Vec<Message> {
        let scope = dom.main_or_body();
        let mut bubbles = dom.query_selector_all(scope, "div.message-bubble");
        if bubbles.is_empty() {
            bubbles = dom.query_selector_all(scope, r#"[data-testid*="message"], article"#);
        }

        let messages: Vec<Message> = bubbles
            .into_iter()
            .enumerate()
            .map(|(idx, el)| {
                let (role, role_source) = guess_role(&dom.text_content(el), idx);
                Message {
                    role,
                    content_root: el,
                    stable_key: non_empty_attr(dom, el, "id")
                        .map_or_else(|| format!("g-{idx}"), str::to_string),
                    role_source,
                }
            })
            .collect();

        let guessed = messages
            .iter()
            .filter(|m| m.role_source == RoleSource::Alternating)
            .count();
        if guessed > 0 {
            tracing::warn!(guessed, total = messages.len(), "grok: roles guessed by position");
        }
        messages
    }

    fn load_more_controls(&self, dom: &Document) -> Vec<NodeId> {
        controls_matching(dom, r#"button, [role="button"]"#, &LOAD_MORE_RE)
    }

    fn reasoning_toggles(&self, dom: &Document) -> Vec<NodeId> {
        controls_matching(dom, r#"button, [role="button"]"#, &REASONING_RE)
    }

    fn is_uploaded_image(&self, dom: &Document, el: NodeId, source: &str) -> bool {
        let class = dom.class_name(el).to_lowercase();
        GROK_UPLOADED_ALT_RE.is_match(dom.attr_or_empty(el, "alt"))
            || class.contains("attachment")
            || class.contains("uploaded")
            || source.starts_with("blob:")
    }
}

fn guess_role(text: &str, idx: usize) -> (Role, RoleSource) {
    let text = text.trim();
    if GROK_YOU_PREFIX_RE.is_match(text) || GROK_YOU_WORD_RE.is_match(text) {
        (Role::User, RoleSource::Keyword)
    } else if GROK_WORD_RE.is_match(text) {
        (Role::Assistant, RoleSource::Keyword)
    } else {
        (alternating_role(idx), RoleSource::Alternating)
    }
}
