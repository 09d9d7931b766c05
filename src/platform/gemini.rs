//! gemini.google.com

use std::sync::LazyLock;

use regex_lite::Regex;

use super::{
    Message, Platform, PlatformKind, Role, RoleSource, ScrollTarget, alternating_role,
    controls_matching, fallback_title, find_scroll_container, first_text, non_empty_attr,
};
use crate::dom::{Document, NodeId};
use crate::patterns::{GEMINI_UPLOADED_LABEL_RE, LICENSED_IMAGE_RE};

static LOAD_MORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(more|load|show|加载|更多|展开|继续|older)").unwrap());

static REASONING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(显示思路|隐藏思路|思考过程|show reasoning|hide reasoning|thoughts)").unwrap()
});

pub struct Gemini;

impl Platform for Gemini {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Gemini
    }

    fn title(&self, dom: &Document) -> String {
        first_text(dom, &["div.conversation-title", "h1"]).unwrap_or_else(|| fallback_title(dom))
    }

    fn scroll_container(&self, dom: &Document) -> ScrollTarget {
        let main = dom.query_selector(dom.root(), "main");
        find_scroll_container(dom, &[dom.document_element(), main])
    }

    /// `user-query` / `model-response` custom elements. Older layouts only
    /// offer a list of items, whose roles are guessed by position.
    fn messages(&self, dom: &Document) -> Vec<Message> {
        let turns = dom.query_selector_all(dom.root(), "user-query, model-response");
        if !turns.is_empty() {
            return turns
                .into_iter()
                .enumerate()
                .map(|(idx, el)| {
                    let tag = dom.tag(el).unwrap_or_default();
                    let role = if tag == "user-query" { Role::User } else { Role::Assistant };
                    let stable_key = non_empty_attr(dom, el, "id")
                        .map_or_else(|| format!("{}-{idx}", tag.to_ascii_uppercase()), str::to_string);
                    Message {
                        role,
                        content_root: el,
                        stable_key,
                        role_source: RoleSource::Explicit,
                    }
                })
                .collect();
        }

        let items = dom.query_selector_all(dom.main_or_body(), r#"[role="listitem"]"#);
        if !items.is_empty() {
            tracing::warn!(count = items.len(), "gemini: no turn elements, guessing roles by position");
        }
        items
            .into_iter()
            .enumerate()
            .map(|(idx, el)| Message {
                role: alternating_role(idx),
                content_root: el,
                stable_key: non_empty_attr(dom, el, "id")
                    .map_or_else(|| format!("li-{idx}"), str::to_string),
                role_source: RoleSource::Alternating,
            })
            .collect()
    }

    fn load_more_controls(&self, dom: &Document) -> Vec<NodeId> {
        controls_matching(dom, r#"button, [role="button"]"#, &LOAD_MORE_RE)
    }

    fn reasoning_toggles(&self, dom: &Document) -> Vec<NodeId> {
        controls_matching(dom, r#"button, [role="button"]"#, &REASONING_RE)
    }

    fn is_uploaded_image(&self, dom: &Document, el: NodeId, _source: &str) -> bool {
        dom.get_attr(el, "data-test-id") == Some("uploaded-img")
            || dom.class_name(el).contains("preview-image")
            || GEMINI_UPLOADED_LABEL_RE.is_match(dom.attr_or_empty(el, "alt"))
            || GEMINI_UPLOADED_LABEL_RE.is_match(dom.attr_or_empty(el, "aria-label"))
    }

    fn is_licensed_content(&self, dom: &Document, el: NodeId, source: &str) -> bool {
        dom.has_class(el, "licensed-image") || LICENSED_IMAGE_RE.is_match(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_elements() {
        let dom = Document::parse_html(
            r#"<div class="conversation-title"> Rust help </div>
               <user-query id="q1">How?</user-query><model-response>Like this.</model-response>
               <div role="listitem">ignored</div>"#,
        );
        assert_eq!(Gemini.title(&dom), "Rust help");
        let messages = Gemini.messages(&dom);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].stable_key, "q1");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].stable_key, "MODEL-RESPONSE-1");
        assert_eq!(messages[1].role_source, RoleSource::Explicit);
    }

    #[test]
    fn test_list_items_alternate() {
        let dom = Document::parse_html(
            r#"<main><div role="listitem">a</div><div role="listitem" id="x">b</div><div role="listitem">c</div></main>"#,
        );
        let messages = Gemini.messages(&dom);
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[1].stable_key, "x");
        assert_eq!(messages[2].stable_key, "li-2");
        assert!(messages.iter().all(|m| m.role_source == RoleSource::Alternating));
    }

    #[test]
    fn test_uploaded_and_licensed() {
        let mut dom = Document::new();
        let a = dom.append_element(dom.root(), "img", &[("data-test-id", "uploaded-img")]);
        let b = dom.append_element(dom.root(), "img", &[("class", "x preview-image")]);
        let c = dom.append_element(dom.root(), "img", &[("aria-label", "上传的图片")]);
        let d = dom.append_element(dom.root(), "img", &[("alt", "chart"), ("class", "licensed-image")]);
        assert!(Gemini.is_uploaded_image(&dom, a, ""));
        assert!(Gemini.is_uploaded_image(&dom, b, ""));
        assert!(Gemini.is_uploaded_image(&dom, c, ""));
        assert!(!Gemini.is_uploaded_image(&dom, d, ""));
        assert!(Gemini.is_licensed_content(&dom, d, "/x"));
        assert!(!Gemini.is_licensed_content(&dom, a, "/x"));
    }

    #[test]
    fn test_untitled_uses_document_title() {
        let dom = Document::parse_html("<title>Gemini</title><h1> </h1>");
        assert_eq!(Gemini.title(&dom), "Gemini");
    }
}
