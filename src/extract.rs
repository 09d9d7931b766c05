//! Conversation extraction.
//!
//! Runs the per-message pipeline over every message an adapter finds:
//! render, relocate galleries, recover missed images, embed, then drop
//! consecutive duplicates.

use url::Url;

use crate::config::Settings;
use crate::context::RunContext;
use crate::dom::{Document, NodeId, Page};
use crate::error::{Error, Result};
use crate::images::{
    ConversionState, EmbedHost, attachments_block, fragment_sources, insert_near_caption,
    relocate_gallery_blocks, resolve_images, scan_for_message, trailing_images_block,
};
use crate::markdown::{Fragment, render_message};
use crate::patterns::{MULTI_NEWLINE_RE, SPACE_BEFORE_NEWLINE_RE};
use crate::platform::{Message, Platform, PlatformKind, Role};

/// One exported message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub role: Role,
    pub markdown: String,
    pub text: String,
    /// Adapter's stable key, for logs.
    pub key: String,
}

/// The extracted conversation, ready for assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub platform: PlatformKind,
    pub title: String,
    pub url: String,
    pub messages: Vec<ConversationMessage>,
}

/// Extract the conversation shown on `page`.
///
/// Fails with [`Error::UnsupportedSite`] when no adapter claims the URL and
/// with [`Error::NoMessages`] when nothing exportable is found.
pub fn extract_conversation(page: &Page, settings: &Settings, host: &dyn EmbedHost) -> Result<Conversation> {
    let kind = PlatformKind::detect(&page.url)?;
    let platform = kind.adapter();
    let dom = &page.document;
    let mut ctx = RunContext::new(dom, settings, kind);

    let title = platform.title(dom);
    let found = platform.messages(dom);
    tracing::debug!(platform = %kind, found = found.len(), "located messages");

    let mut messages = Vec::with_capacity(found.len());
    for message in &found {
        let markdown = message_markdown(&mut ctx, platform, message, &page.url, host);
        let text = plain_text(dom, message.content_root);
        if markdown.trim().is_empty() && text.trim().is_empty() {
            tracing::debug!(key = %message.stable_key, "skipping empty message");
            continue;
        }
        messages.push(ConversationMessage {
            role: message.role,
            markdown,
            text,
            key: message.stable_key.clone(),
        });
    }

    if settings.dedupe_consecutive {
        messages = dedupe(messages);
    }
    if messages.is_empty() {
        return Err(Error::NoMessages);
    }
    tracing::info!(
        platform = %kind,
        messages = messages.len(),
        visibility_checks = ctx.visibility_memo_len(),
        "extracted conversation"
    );

    Ok(Conversation {
        platform: kind,
        title,
        url: page.url.to_string(),
        messages,
    })
}

/// Markdown for one message.
pub fn message_markdown(
    ctx: &mut RunContext<'_>,
    platform: &dyn Platform,
    message: &Message,
    base: &Url,
    host: &dyn EmbedHost,
) -> String {
    let settings = ctx.settings;
    let mut state = ConversionState::new();
    let root = message.content_root;

    let mut fragment = tidy(render_message(ctx, &mut state, root), settings);

    if settings.relocate_ui_image_blocks {
        fragment = relocate_gallery_blocks(fragment, &state);
    }

    if settings.attachment_fallback_scan && !fragment.has_images() {
        let existing = fragment_sources(&fragment, &state);
        let found = scan_for_message(ctx, platform, message.role, root, &mut state, &existing);
        if !found.is_empty() {
            fragment = match message.role {
                Role::Assistant => insert_near_caption(fragment, &found),
                Role::User => {
                    let mut out = fragment;
                    out.append(attachments_block(&found));
                    out
                }
                Role::System | Role::Unknown => {
                    let mut out = fragment;
                    out.append(trailing_images_block(&found));
                    out
                }
            };
        }
    }

    let fragment = tidy(fragment, settings);
    let markdown = resolve_images(&fragment, &state, settings, ctx.dom, base, host);
    if settings.compact_blank_lines {
        MULTI_NEWLINE_RE.replace_all(&markdown, "\n\n").trim().to_string()
    } else {
        markdown.trim().to_string()
    }
}

fn tidy(fragment: Fragment, settings: &Settings) -> Fragment {
    if settings.compact_blank_lines {
        fragment.compact_blank_lines().trim()
    } else {
        fragment.trim()
    }
}

/// Text content of a message: its shadow tree, then its light tree.
pub fn plain_text(dom: &Document, root: NodeId) -> String {
    let mut parts = Vec::with_capacity(2);
    if let Some(shadow) = dom.shadow_root(root)
        && dom.children(shadow).next().is_some()
    {
        parts.push(dom.text_content(shadow));
    }
    parts.push(dom.text_content(root));
    let joined = parts.join("\n");
    SPACE_BEFORE_NEWLINE_RE
        .replace_all(&joined, "\n")
        .trim()
        .to_string()
}

/// Comparison key: role plus whitespace-insensitive, lower-cased text.
pub fn dedup_key(role: Role, text: &str, markdown: &str) -> String {
    let source = if text.is_empty() { markdown } else { text };
    let collapsed = source.split_whitespace().collect::<Vec<_>>().join(" ");
    let normalized = collapsed.replace('\u{200b}', "");
    format!("{role}::{}", normalized.trim().to_lowercase())
}

/// Drop messages equal to the previous kept message.
pub fn dedupe(messages: Vec<ConversationMessage>) -> Vec<ConversationMessage> {
    let mut out: Vec<ConversationMessage> = Vec::with_capacity(messages.len());
    let mut previous: Option<String> = None;
    for message in messages {
        let key = dedup_key(message.role, &message.text, &message.markdown);
        if previous.as_deref() == Some(key.as_str()) {
            tracing::debug!(key = %message.key, "dropping consecutive duplicate");
            continue;
        }
        previous = Some(key);
        out.push(message);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::OfflineHost;

    fn msg(role: Role, text: &str) -> ConversationMessage {
        ConversationMessage {
            role,
            markdown: text.to_string(),
            text: text.to_string(),
            key: String::new(),
        }
    }

    #[test]
    fn test_dedup_key() {
        assert_eq!(dedup_key(Role::User, " Hello\u{200b}\n  World ", ""), "user::hello world");
        assert_eq!(dedup_key(Role::Assistant, "", "**md**"), "assistant::**md**");
    }

    #[test]
    fn test_dedupe_consecutive_only() {
        let out = dedupe(vec![
            msg(Role::User, "hi"),
            msg(Role::Assistant, "hello"),
            msg(Role::Assistant, "Hello "),
            msg(Role::User, "hi"),
            msg(Role::Assistant, "hello"),
        ]);
        let roles: Vec<Role> = out.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    }

    #[test]
    fn test_plain_text_includes_shadow() {
        let mut dom = Document::new();
        let host = dom.append_element(dom.root(), "div", &[]);
        let shadow = dom.attach_shadow(host);
        dom.append_text(shadow, "inner  \n\n");
        dom.append_text(host, "  light ");
        assert_eq!(plain_text(&dom, host), "inner\n  light");
    }

    #[test]
    fn test_unsupported_site() {
        let page = Page::from_html("https://example.com/", "<p>x</p>").unwrap();
        assert!(matches!(
            extract_conversation(&page, &Settings::default(), &OfflineHost),
            Err(Error::UnsupportedSite(_))
        ));
    }

    #[test]
    fn test_no_messages() {
        let page = Page::from_html(
            "https://chatgpt.com/c/1",
            r#"<main><div data-message-author-role="user"><div class="markdown"> </div></div></main>"#,
        )
        .unwrap();
        assert!(matches!(
            extract_conversation(&page, &Settings::default(), &OfflineHost),
            Err(Error::NoMessages)
        ));
    }

    #[test]
    fn test_user_attachment_fallback() {
        let page = Page::from_html(
            "https://chatgpt.com/c/1",
            r#"<main>
<div data-message-author-role="user"><img alt="Uploaded image" src="https://files.oaiusercontent.com/a"><div class="whitespace-pre-wrap">see this</div></div>
</main>"#,
        )
        .unwrap();
        let settings = Settings::default();
        let conversation = extract_conversation(&page, &settings, &OfflineHost).unwrap();
        let message = &conversation.messages[0];
        // The content root is the turn itself, so the walker already sees the image.
        assert_eq!(
            message.markdown,
            "![Uploaded image](https://files.oaiusercontent.com/a)\nsee this"
        );
    }

    #[test]
    fn test_fallback_placement_for_assistant_and_system() {
        let turn = |role: &str| {
            format!(
                r#"<div data-message-author-role="{role}"><div class="markdown"><p>Figure: setup</p></div><img alt="diagram" src="https://example.com/d.png"></div>"#
            )
        };
        let html = format!("<main>{}{}</main>", turn("assistant"), turn("system"));
        let page = Page::from_html("https://chatgpt.com/c/1", &html).unwrap();
        let settings = Settings {
            dedupe_consecutive: false,
            ..Settings::default()
        };
        let conversation = extract_conversation(&page, &settings, &OfflineHost).unwrap();

        assert_eq!(conversation.messages[0].role, Role::Assistant);
        assert_eq!(
            conversation.messages[0].markdown,
            "![diagram](https://example.com/d.png)\n\nFigure: setup"
        );
        assert_eq!(conversation.messages[1].role, Role::System);
        assert_eq!(
            conversation.messages[1].markdown,
            "Figure: setup\n\n![diagram](https://example.com/d.png)"
        );
    }

    #[test]
    fn test_attachments_block_for_user() {
        let page = Page::from_html(
            "https://gemini.google.com/app/1",
            r#"<div class="turn"><img data-test-id="uploaded-img" src="blob:https://gemini.google.com/x"><user-query>what is this?</user-query></div>"#,
        )
        .unwrap();
        let conversation = extract_conversation(&page, &Settings::default(), &OfflineHost).unwrap();
        assert_eq!(
            conversation.messages[0].markdown,
            "what is this?\n\n**Attachments**\n\n- ![image](blob:https://gemini.google.com/x)"
        );
    }
}
