//! chatgpt.com

use std::sync::LazyLock;

use regex_lite::Regex;

use super::{
    Message, Platform, PlatformKind, Role, RoleSource, ScrollTarget, controls_matching,
    fallback_title, find_scroll_container, first_text, non_empty_attr,
};
use crate::dom::{Document, NodeId};
use crate::patterns::{CHATGPT_FILE_SRC_RE, CHATGPT_IMAGE_ALT_RE, CHATGPT_UPLOADED_ALT_RE};

static LOAD_MORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(show more|load more|显示更多|加载更多|展开)").unwrap());

static REASONING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(已思考|显示思考|显示推理|显示思路|show reasoning|view reasoning)").unwrap()
});

pub struct ChatGpt;

impl Platform for ChatGpt {
    fn kind(&self) -> PlatformKind {
        PlatformKind::ChatGpt
    }

    fn title(&self, dom: &Document) -> String {
        first_text(dom, &["main h1", r#"nav a[aria-current="page"]"#])
            .unwrap_or_else(|| fallback_title(dom))
    }

    fn scroll_container(&self, dom: &Document) -> ScrollTarget {
        let main = dom.query_selector(dom.root(), "main");
        find_scroll_container(dom, &[main, dom.document_element()])
    }

    fn messages(&self, dom: &Document) -> Vec<Message> {
        dom.query_selector_all(dom.main_or_body(), "div[data-message-author-role]")
            .into_iter()
            .enumerate()
            .filter_map(|(idx, turn)| {
                let author = non_empty_attr(dom, turn, "data-message-author-role").unwrap_or("unknown");
                let role = Role::parse(author);
                if role == Role::Unknown {
                    return None;
                }
                let content_root = dom
                    .query_selector(turn, ".markdown")
                    .or_else(|| dom.query_selector(turn, ".prose"))
                    .unwrap_or(turn);
                let stable_key = non_empty_attr(dom, turn, "data-message-id")
                    .or_else(|| non_empty_attr(dom, turn, "id"))
                    .map_or_else(|| format!("{author}-{idx}"), str::to_string);
                Some(Message {
                    role,
                    content_root,
                    stable_key,
                    role_source: RoleSource::Explicit,
                })
            })
            .collect()
    }

    fn load_more_controls(&self, dom: &Document) -> Vec<NodeId> {
        controls_matching(dom, "button", &LOAD_MORE_RE)
    }

    fn reasoning_toggles(&self, dom: &Document) -> Vec<NodeId> {
        controls_matching(dom, r#"button, [role="button"]"#, &REASONING_RE)
    }

    /// Files served from the estuary endpoint, or alt text saying
    /// "uploaded image".
    fn is_uploaded_image(&self, dom: &Document, el: NodeId, source: &str) -> bool {
        if source.is_empty() {
            return false;
        }
        if CHATGPT_FILE_SRC_RE.is_match(source) {
            return true;
        }
        let alt = dom.attr_or_empty(el, "alt");
        CHATGPT_UPLOADED_ALT_RE.is_match(alt) && CHATGPT_IMAGE_ALT_RE.is_match(alt)
    }
}
