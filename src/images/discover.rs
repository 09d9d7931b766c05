//! Finding images in a subtree.

use std::collections::HashSet;

use crate::context::RunContext;
use crate::dom::{Document, NodeId};

/// Resolved source of an `<img>`: the browser's current source, then the
/// lazy-loading attributes, then `src`.
pub fn img_source(dom: &Document, id: NodeId) -> Option<String> {
    dom.current_src(id)
        .into_iter()
        .chain(["data-src", "data-original", "src"].iter().filter_map(|a| dom.get_attr(id, a)))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// An image found by [`deep_collect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected {
    /// The `<img>` element; `None` for CSS background images.
    pub element: Option<NodeId>,
    pub source: String,
    pub alt: String,
}

/// Every image under `root`, entering shadow roots and slot assignments.
///
/// Visits nodes in render order: an element, then its shadow tree, then its
/// light children. Each element is visited once even when it is reachable
/// both as a child and through a slot.
pub fn deep_collect(ctx: &mut RunContext<'_>, root: NodeId) -> Vec<Collected> {
    let dom = ctx.dom;
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        if dom.is_shadow_root(id) {
            push_children(dom, id, &mut stack);
            continue;
        }
        if !dom.is_element(id) || !seen.insert(id) {
            continue;
        }

        let tag = dom.tag(id).unwrap_or("");
        if tag == "img"
            && let Some(source) = img_source(dom, id)
        {
            out.push(Collected {
                element: Some(id),
                source,
                alt: dom.attr_or_empty(id, "alt").to_string(),
            });
        }
        if let Some(source) = ctx.background_image(id)
            && ctx.is_large_box(id)
        {
            out.push(Collected {
                element: None,
                source,
                alt: dom.get_attr(id, "aria-label").unwrap_or("image").to_string(),
            });
        }

        // Pushed in reverse so they pop as: shadow root, slotted, light.
        push_children(dom, id, &mut stack);
        if tag == "slot" {
            stack.extend(dom.assigned_nodes(id).into_iter().rev());
        }
        if let Some(shadow) = dom.shadow_root(id) {
            stack.push(shadow);
        }
    }
    out
}

fn push_children(dom: &Document, id: NodeId, stack: &mut Vec<NodeId>) {
    let children: Vec<NodeId> = dom.children(id).collect();
    stack.extend(children.into_iter().rev());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::dom::Geometry;
    use crate::platform::PlatformKind;

    #[test]
    fn test_img_source_priority() {
        let mut dom = Document::new();
        let a = dom.append_element(dom.root(), "img", &[("src", "/s.png"), ("data-src", "/lazy.png")]);
        let b = dom.append_element(dom.root(), "img", &[("src", "/s.png"), ("data-src", "")]);
        let c = dom.append_element(dom.root(), "img", &[]);
        dom.set_current_src(b, "https://cdn/current.png");
        assert_eq!(img_source(&dom, a).as_deref(), Some("/lazy.png"));
        assert_eq!(img_source(&dom, b).as_deref(), Some("https://cdn/current.png"));
        assert_eq!(img_source(&dom, c), None);
    }

    #[test]
    fn test_collects_through_shadow_and_slot() {
        let mut dom = Document::new();
        let body = dom.append_element(dom.root(), "body", &[]);
        let host = dom.append_element(body, "x-card", &[]);
        let shadow = dom.attach_shadow(host);
        dom.append_element(shadow, "img", &[("src", "/shadow.png"), ("alt", "s")]);
        let slot = dom.element("slot", &[]);
        dom.append(shadow, slot);
        dom.append_element(host, "img", &[("src", "/light.png")]);
        let bg = dom.append_element(
            body,
            "div",
            &[("style", "background-image: url('/bg.jpg')"), ("aria-label", "cover")],
        );
        dom.set_geometry(bg, Geometry::new(100.0, 80.0));
        let small = dom.append_element(body, "div", &[("style", "background: url(/icon.png)")]);
        dom.set_geometry(small, Geometry::new(16.0, 16.0));

        let settings = Settings::default();
        let mut ctx = RunContext::new(&dom, &settings, PlatformKind::Gemini);
        let found = deep_collect(&mut ctx, body);
        let sources: Vec<&str> = found.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["/shadow.png", "/light.png", "/bg.jpg"]);
        assert_eq!(found[2].element, None);
        assert_eq!(found[2].alt, "cover");
        assert_eq!(found[0].alt, "s");
    }
}
