//! Outer-HTML serialization.

use std::fmt::Write;

use super::arena::{Document, NodeData, NodeId};

/// Elements that never have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Escape special XML/HTML characters.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

impl Document {
    /// Serialize a node and its light-tree descendants (the DOM's
    /// `outerHTML`).
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.data {
            NodeData::Text(text) => out.push_str(&escape_html(text)),
            NodeData::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            NodeData::Doctype { name } => {
                let _ = write!(out, "<!DOCTYPE {name}>");
            }
            NodeData::Document | NodeData::ShadowRoot { .. } => {
                for child in self.children(id) {
                    self.write_node(child, out);
                }
            }
            NodeData::Element { name, attrs, .. } => {
                let tag = name.local.as_ref();
                out.push('<');
                out.push_str(tag);
                for attr in attrs {
                    let _ = write!(
                        out,
                        " {}=\"{}\"",
                        attr.name.local.as_ref(),
                        escape_html(&attr.value)
                    );
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag) {
                    return;
                }
                for child in self.children(id) {
                    self.write_node(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_html() {
        let mut dom = Document::new();
        let math = dom.append_element(dom.root(), "math", &[("display", "block")]);
        let mi = dom.append_element(math, "mi", &[]);
        dom.append_text(mi, "x<y");
        dom.append_element(math, "br", &[]);

        assert_eq!(
            dom.outer_html(math),
            r#"<math display="block"><mi>x&lt;y</mi><br></math>"#
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"a "b" & <c>"#), "a &quot;b&quot; &amp; &lt;c&gt;");
    }
}
