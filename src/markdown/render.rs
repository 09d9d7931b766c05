//! Document tree → Markdown rendering.
//!
//! A depth-first walk over one message's content root. Every element either
//! matches a structural rule (headings, links, lists, tables, ...) or is
//! unwrapped into its inner content. Inner content is the element's shadow
//! tree followed by its light children, so encapsulated components render
//! like ordinary markup.

use crate::context::RunContext;
use crate::dom::{NodeData, NodeId};
use crate::images::{ConversionState, img_source, looks_like_image_url};
use crate::math::{self, MathMatch};
use crate::patterns::{CODE_LANGUAGE_RE, NEWLINES_RE};

use super::escape::{calculate_fence_length, escape_table_cell, inline_code};
use super::fragment::Fragment;
use super::noise::should_skip;

/// Elements rendered as a paragraph-like block.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "aside", "nav", "figure",
    "figcaption",
];

/// Render a message's content root.
///
/// Images met on the way are recorded in `state` and referenced from the
/// returned fragment.
pub fn render_message(ctx: &mut RunContext<'_>, state: &mut ConversionState, root: NodeId) -> Fragment {
    let mut renderer = RenderContext { ctx, state };
    renderer.render_node(root, 0)
}

/// Walk state for one message.
pub struct RenderContext<'r, 'a> {
    ctx: &'r mut RunContext<'a>,
    state: &'r mut ConversionState,
}

impl RenderContext<'_, '_> {
    fn render_node(&mut self, id: NodeId, depth: usize) -> Fragment {
        let dom = self.ctx.dom;
        let Some(node) = dom.get(id) else {
            return Fragment::new();
        };
        match &node.data {
            NodeData::Text(contents) => Fragment::text(contents),
            NodeData::Document | NodeData::ShadowRoot { .. } => self.render_children(id, depth),
            NodeData::Element { .. } => self.render_element(id, depth),
            NodeData::Comment(_) | NodeData::Doctype { .. } => Fragment::new(),
        }
    }

    /// Light children of `id`, unwrapped.
    fn render_children(&mut self, id: NodeId, depth: usize) -> Fragment {
        let children: Vec<NodeId> = self.ctx.dom.children(id).collect();
        self.render_all(&children, depth)
    }

    fn render_all(&mut self, ids: &[NodeId], depth: usize) -> Fragment {
        let mut out = Fragment::new();
        for &child in ids {
            out.append(self.render_node(child, depth));
        }
        out
    }

    /// Shadow tree children (when there are any), then light children.
    fn traversal_children(&self, id: NodeId) -> Vec<NodeId> {
        let dom = self.ctx.dom;
        let mut children: Vec<NodeId> = dom
            .shadow_root(id)
            .map(|root| dom.children(root).collect())
            .unwrap_or_default();
        children.extend(dom.children(id));
        children
    }

    fn render_inner(&mut self, id: NodeId, depth: usize) -> Fragment {
        let children = self.traversal_children(id);
        self.render_all(&children, depth)
    }

    fn render_element(&mut self, id: NodeId, depth: usize) -> Fragment {
        if should_skip(self.ctx, id) {
            return Fragment::new();
        }
        let dom = self.ctx.dom;
        let tag = dom.tag(id).unwrap_or("");

        if tag == "slot" {
            let assigned = dom.assigned_nodes(id);
            return self.render_all(&assigned, depth);
        }

        match math::recognize(dom, id) {
            Some(MathMatch::Formula(formula)) => {
                return Fragment::text(math::wrap(&formula, self.ctx.settings));
            }
            Some(MathMatch::Verbatim(raw)) => return Fragment::text(raw),
            None => {}
        }

        match tag {
            "br" => return Fragment::text("\n"),
            "pre" => return self.code_block(id),
            "code" => return Fragment::text(inline_code(&dom.text_content(id))),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                let text = self.render_inner(id, depth).trim();
                return text.wrap(&format!("\n{} ", "#".repeat(level)), "\n\n");
            }
            "a" => return self.link(id, depth),
            "img" => {
                let Some(source) = img_source(dom, id) else {
                    return Fragment::new();
                };
                let alt = dom.attr_or_empty(id, "alt");
                return Fragment::image(self.state.push(alt, source, Some(id)));
            }
            _ => {}
        }

        if let Some(source) = self.ctx.background_image(id)
            && self.ctx.is_large_box(id)
        {
            let alt = dom.get_attr(id, "aria-label").unwrap_or("image");
            return Fragment::image(self.state.push(alt, source, None));
        }

        match tag {
            "blockquote" => {
                let inner = self.render_inner(id, depth).trim();
                inner.prefix_lines("> ", ">").wrap("\n", "\n\n")
            }
            "hr" => Fragment::text("\n---\n"),
            "ul" | "ol" => {
                let lines = self.list_lines(id, depth);
                Fragment::join(lines, "\n").wrap("\n", "\n")
            }
            "li" => self.render_inner(id, depth),
            "table" => self.table(id),
            "details" => self.details(id, depth),
            "strong" | "b" => self.emphasis(id, depth, "**"),
            "em" | "i" => self.emphasis(id, depth, "*"),
            "del" | "s" => self.emphasis(id, depth, "~~"),
            _ => {
                let inner = self.render_inner(id, depth);
                if BLOCK_TAGS.contains(&tag) || tag.contains('-') {
                    let inner = inner.trim();
                    if inner.is_empty() {
                        inner
                    } else {
                        inner.wrap("\n", "\n")
                    }
                } else {
                    inner
                }
            }
        }
    }

    /// Fenced block; the fence outgrows any backtick run in the code.
    fn code_block(&mut self, pre: NodeId) -> Fragment {
        let dom = self.ctx.dom;
        let code = dom.query_selector(pre, "code");
        let lang = code
            .and_then(|c| {
                CODE_LANGUAGE_RE
                    .captures(dom.class_name(c))
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .or_else(|| dom.get_attr(c, "data-language").map(str::to_string))
            })
            .unwrap_or_default();
        let text = dom.text_content(code.unwrap_or(pre));
        let text = text.trim_end_matches('\n');
        let fence = "`".repeat(calculate_fence_length(text, '`'));
        Fragment::text(format!("\n{fence}{lang}\n{text}\n{fence}\n"))
    }

    fn link(&mut self, id: NodeId, depth: usize) -> Fragment {
        let dom = self.ctx.dom;
        let href = dom.attr_or_empty(id, "href");

        if !href.is_empty() && looks_like_image_url(href) {
            let text = dom.text_content(id);
            let alt = [text.as_str(), dom.attr_or_empty(id, "aria-label")]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or("image")
                .trim();
            return Fragment::image(self.state.push(alt, href, None));
        }

        let text = self.render_inner(id, depth).trim();
        let text = if text.is_empty() { Fragment::text(href) } else { text };
        if href.is_empty() {
            text
        } else {
            text.wrap("[", &format!("]({href})"))
        }
    }

    /// Lines of a list at `depth`, nested lists included.
    ///
    /// Each item's own content is joined onto one line; `ul`/`ol` children
    /// of the item follow on their own lines one level deeper.
    fn list_lines(&mut self, list: NodeId, depth: usize) -> Vec<Fragment> {
        let dom = self.ctx.dom;
        let ordered = dom.tag(list) == Some("ol");
        let items: Vec<NodeId> = dom
            .element_children(list)
            .filter(|&c| dom.tag(c) == Some("li"))
            .collect();
        let items: Vec<NodeId> = items.into_iter().filter(|&li| self.ctx.is_visible(li)).collect();

        let indent = "  ".repeat(depth);
        let mut lines = Vec::new();
        for (i, li) in items.into_iter().enumerate() {
            let marker = if ordered { format!("{}. ", i + 1) } else { "- ".to_string() };
            let mut own = Fragment::new();
            let mut nested = Vec::new();
            for child in self.traversal_children(li) {
                if matches!(dom.tag(child), Some("ul" | "ol")) {
                    if !should_skip(self.ctx, child) {
                        nested.extend(self.list_lines(child, depth + 1));
                    }
                } else {
                    own.append(self.render_node(child, depth + 1));
                }
            }
            let own = own
                .trim()
                .map_text(|t| NEWLINES_RE.replace_all(t, " ").into_owned());
            lines.push(own.wrap(&format!("{indent}{marker}"), ""));
            lines.extend(nested);
        }
        lines
    }

    /// Pipe table from visible rows; the first row is the header.
    fn table(&mut self, table: NodeId) -> Fragment {
        let dom = self.ctx.dom;
        let rows: Vec<NodeId> = dom
            .query_selector_all(table, "tr")
            .into_iter()
            .filter(|&tr| self.ctx.is_visible(tr))
            .collect();
        let Some((&header_row, body)) = rows.split_first() else {
            return Fragment::new();
        };

        let header = self.row_cells(header_row);
        let mut out = vec![
            format!("| {} |", header.join(" | ")),
            format!("| {} |", vec!["---"; header.len()].join(" | ")),
        ];
        for &row in body {
            out.push(format!("| {} |", self.row_cells(row).join(" | ")));
        }
        Fragment::text(format!("\n{}\n\n", out.join("\n")))
    }

    fn row_cells(&mut self, row: NodeId) -> Vec<String> {
        let dom = self.ctx.dom;
        dom.query_selector_all(row, "th, td")
            .into_iter()
            .filter(|&cell| self.ctx.is_visible(cell))
            .map(|cell| escape_table_cell(dom.text_content(cell).trim()))
            .collect()
    }

    /// `> **summary**` callout with the body quoted under it.
    fn details(&mut self, id: NodeId, depth: usize) -> Fragment {
        let dom = self.ctx.dom;
        let summary = dom
            .query_selector(id, "summary")
            .and_then(|s| dom.trimmed_text(s))
            .unwrap_or_else(|| "Details".to_string());
        let body: Vec<NodeId> = dom
            .children(id)
            .filter(|&c| dom.tag(c) != Some("summary"))
            .collect();
        let rest = self.render_all(&body, depth).trim();

        let head = format!("\n> **{summary}**\n");
        if rest.is_empty() {
            return Fragment::text(format!("{head}\n"));
        }
        rest.map_text(|t| t.replace('\n', "\n> "))
            .wrap(&format!("{head}>\n> "), "\n\n")
    }

    fn emphasis(&mut self, id: NodeId, depth: usize, marker: &str) -> Fragment {
        let inner = self.render_inner(id, depth).trim();
        if inner.is_empty() {
            inner
        } else {
            inner.wrap(marker, marker)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::dom::{Document, Geometry};
    use crate::platform::PlatformKind;

    fn render_with(dom: &Document, settings: &Settings, root: NodeId) -> (String, ConversionState) {
        let mut ctx = RunContext::new(dom, settings, PlatformKind::ChatGpt);
        let mut state = ConversionState::new();
        let fragment = render_message(&mut ctx, &mut state, root);
        let out = fragment.render(|id| {
            let img = state.get(id).expect("image recorded");
            format!("![{}]({})", img.alt, img.source)
        });
        (out, state)
    }

    fn render_html(html: &str) -> String {
        let dom = Document::parse_html(html);
        let root = dom.body().expect("body");
        render_with(&dom, &Settings::default(), root).0
    }

    #[test]
    fn test_paragraphs_and_headings() {
        assert_eq!(
            render_html("<h2> Title <b>x</b> </h2><p>One</p><p> </p><div>Two</div>"),
            "\n## Title **x**\n\n\nOne\n\nTwo\n"
        );
    }

    #[test]
    fn test_links() {
        assert_eq!(
            render_html(r#"<a href="https://a.io">site</a> <a href="/b"></a> <a>plain</a>"#),
            "[site](https://a.io) [/b](/b) plain"
        );
        assert_eq!(
            render_html(r#"<a href="/pic.png?x=1" aria-label="label"></a>"#),
            "![label](/pic.png?x=1)"
        );
    }

    #[test]
    fn test_code() {
        assert_eq!(
            render_html(r#"<pre><code class="hljs language-rust">fn main() {}

</code></pre>"#),
            "\n```rust\nfn main() {}\n```\n"
        );
        assert_eq!(
            render_html("<pre><code data-language=\"md\">```\nx\n```</code></pre>"),
            "\n````md\n```\nx\n```\n````\n"
        );
        assert_eq!(render_html("use <code>a`b</code>"), "use ``a`b``");
    }

    #[test]
    fn test_nested_lists() {
        assert_eq!(
            render_html(
                "<ul><li>one\n<b>bold</b></li><li>two<ol><li>a</li><li style=\"display:none\">h</li><li>b</li></ol></li></ul>"
            ),
            "\n- one **bold**\n- two\n  1. a\n  2. b\n"
        );
    }

    #[test]
    fn test_blockquote_and_rule() {
        assert_eq!(
            render_html("<blockquote><p>a</p><p>b</p></blockquote><hr>"),
            "\n> a\n>\n> b\n\n\n---\n"
        );
    }

    #[test]
    fn test_table() {
        assert_eq!(
            render_html(
                "<table><tr><th>k</th><th>v</th></tr><tr><td>a|b</td><td>1\n2</td></tr><tr hidden><td>x</td></tr></table>"
            ),
            "\n| k | v |\n| --- | --- |\n| a\\|b | 1 2 |\n\n"
        );
    }

    #[test]
    fn test_details() {
        assert_eq!(
            render_html("<details><summary> More </summary><p>x</p><p>y</p></details>"),
            "\n> **More**\n>\n> x\n> \n> y\n\n"
        );
        assert_eq!(render_html("<details></details>"), "\n> **Details**\n\n");
    }

    #[test]
    fn test_images() {
        let mut dom = Document::new();
        let body = dom.append_element(dom.root(), "body", &[]);
        dom.append_element(body, "img", &[("src", "/a.png"), ("alt", "A")]);
        dom.append_element(body, "img", &[("alt", "no source")]);
        let bg = dom.append_element(body, "span", &[("style", "background-image:url(/bg.png)")]);
        dom.set_geometry(bg, Geometry::new(60.0, 60.0));
        let (out, state) = render_with(&dom, &Settings::default(), body);
        assert_eq!(out, "![A](/a.png)![image](/bg.png)");
        assert_eq!(state.len(), 2);
        assert!(state.get(0).and_then(|i| i.origin_el).is_some());
        assert!(state.get(1).and_then(|i| i.origin_el).is_none());
    }

    #[test]
    fn test_shadow_then_light_and_slots() {
        let mut dom = Document::new();
        let body = dom.append_element(dom.root(), "body", &[]);
        let host = dom.append_element(body, "span", &[]);
        let root = dom.attach_shadow(host);
        dom.append_text(root, "[shadow]");
        let slot = dom.append_element(root, "slot", &[("name", "s")]);
        dom.append_element(slot, "i", &[]);
        let fallback = dom.create_text("fallback");
        dom.append(slot, fallback);
        let slotted = dom.append_element(host, "span", &[("slot", "s")]);
        dom.append_text(slotted, "[slotted]");
        dom.append_text(host, "[light]");

        let (out, _) = render_with(&dom, &Settings::default(), body);
        assert_eq!(out, "[shadow][slotted][slotted][light]");
    }

    #[test]
    fn test_noise_and_math() {
        assert_eq!(
            render_html(
                r#"<p>Area <span class="katex"><span class="katex-mathml"><math><semantics><annotation encoding="application/x-tex">\pi r^2</annotation></semantics></math></span></span><button>Copy</button></p>"#
            ),
            "\nArea $\\pi r^2$\n"
        );
    }

    #[test]
    fn test_math_without_display_marker_is_inline() {
        assert_eq!(
            render_html(
                r#"<p>Area <math><semantics><annotation encoding="application/x-tex">x^2</annotation></semantics></math> done</p>"#
            ),
            "\nArea $x^2$ done\n"
        );
        assert_eq!(
            render_html(r#"<p>Let <mjx-container aria-label="\alpha"></mjx-container> be</p>"#),
            "\nLet $\\alpha$ be\n"
        );
        assert_eq!(
            render_html(r#"<mjx-container display="true" aria-label="\alpha"></mjx-container>"#),
            "\n$$\n\\alpha\n$$\n"
        );
    }

    #[test]
    fn test_custom_elements_are_blocks() {
        assert_eq!(render_html("a<x-card> b </x-card>c<span> d </span>"), "a\nb\nc d ");
    }
}
