//! Suppression of invisible elements and page chrome.

use crate::context::RunContext;
use crate::dom::NodeId;

/// Interactive and decorative elements that never carry message content.
pub const SKIP_TAGS: &[&str] = &[
    "button", "svg", "path", "textarea", "input", "select", "option", "noscript",
];

/// Whether the walker should drop `id` and everything under it.
pub fn should_skip(ctx: &mut RunContext<'_>, id: NodeId) -> bool {
    let dom = ctx.dom;
    if !dom.is_element(id) {
        return false;
    }
    if !ctx.is_visible(id) {
        return true;
    }
    if !ctx.settings.strip_ui_junk {
        return false;
    }

    let tag = dom.tag(id).unwrap_or("");
    if SKIP_TAGS.contains(&tag) {
        return true;
    }
    is_copy_control(dom.attr_or_empty(id, "aria-label"), dom.class_name(id), tag)
}

/// Copy-to-clipboard affordances, recognized by label or class.
/// Anchors are exempt from the class rule.
fn is_copy_control(aria_label: &str, class_name: &str, tag: &str) -> bool {
    let aria = aria_label.to_lowercase();
    if aria.contains("copy") || aria.contains("复制") {
        return true;
    }
    tag != "a" && class_name.to_lowercase().contains("copy")
}
