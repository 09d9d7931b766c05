//! Formula recognition and TeX normalization.
//!
//! Chat front-ends render math in one of a few ways: MathML with a TeX
//! annotation, KaTeX, MathJax v3 containers, or a plain element carrying the
//! source in an attribute. [`recognize`] finds the TeX for any of these and
//! [`wrap`] turns it into `$...$` or a `$$` block.

use crate::config::Settings;
use crate::dom::{Document, NodeId};
use crate::patterns::{
    BLANK_LINE_RE, MULTI_NEWLINE_RE, TEX_ARRAY_BEGIN_RE, TEX_COMMAND_RE, TEX_ENV_BEGIN_RE,
    TEX_SCRIPT_RE,
};

/// Attributes that may carry formula source, checked in order.
const TEX_ATTRIBUTES: &[&str] = &[
    "data-latex",
    "data-tex",
    "data-math",
    "data-equation",
    "data-formula",
    "latex",
    "tex",
    "math",
    "equation",
];

const MATHML_ANNOTATION: &str =
    r#"annotation[encoding="application/x-tex"], annotation[encoding="application/tex"]"#;
const KATEX_ANNOTATION: &str = r#"span.katex-mathml annotation[encoding="application/x-tex"]"#;
const TEX_ANNOTATION: &str = r#"annotation[encoding="application/x-tex"]"#;

/// Raw TeX plus whether it should be set as a display block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    pub tex: String,
    pub display: bool,
}

impl Formula {
    fn new(tex: &str, display: bool) -> Self {
        Self {
            tex: tex.trim().to_string(),
            display,
        }
    }
}

/// Result of looking at an element as a formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MathMatch {
    Formula(Formula),
    /// A formula construct without recoverable TeX, emitted as-is.
    Verbatim(String),
}

/// Recognize a formula construct rooted at `id`.
///
/// Returns `None` when the element is not math at all, in which case the
/// walker continues with the structural rules.
pub fn recognize(dom: &Document, id: NodeId) -> Option<MathMatch> {
    let tag = dom.tag(id)?;

    if tag == "math" {
        if let Some(tex) = mathml_tex(dom, id) {
            let display = dom.get_attr(id, "display") == Some("block");
            return Some(MathMatch::Formula(Formula::new(&tex, display)));
        }
        tracing::debug!("MathML without TeX annotation, keeping markup");
        return Some(MathMatch::Verbatim(format!(
            "\n<!-- MathML -->\n{}\n",
            dom.outer_html(id)
        )));
    }

    if dom.has_class(id, "katex") || dom.has_class(id, "katex-html") || dom.has_class(id, "katex-mathml")
    {
        let display = dom.closest(id, ".katex-display").is_some();
        return match katex_tex(dom, id) {
            Some(tex) => Some(MathMatch::Formula(Formula::new(&tex, display))),
            None => {
                tracing::debug!("KaTeX element without TeX source, keeping text");
                Some(MathMatch::Verbatim(dom.text_content(id)))
            }
        };
    }

    if tag == "mjx-container" {
        let label = dom.attr_or_empty(id, "aria-label").trim();
        if !label.is_empty() {
            let display = matches!(dom.get_attr(id, "display"), Some("true" | "block"));
            return Some(MathMatch::Formula(Formula::new(label, display)));
        }
    }

    attribute_tex(dom, id).map(|tex| MathMatch::Formula(Formula::new(&tex, false)))
}

fn mathml_tex(dom: &Document, id: NodeId) -> Option<String> {
    if let Some(annotation) = dom.query_selector(id, MATHML_ANNOTATION)
        && let Some(tex) = dom.trimmed_text(annotation)
    {
        return Some(tex);
    }
    dom.get_attr(id, "aria-label")
        .filter(|label| is_tex_like(label))
        .map(|label| label.trim().to_string())
}

fn katex_tex(dom: &Document, id: NodeId) -> Option<String> {
    let host = if dom.has_class(id, "katex") {
        id
    } else {
        dom.closest(id, ".katex").unwrap_or(id)
    };

    let annotation = dom
        .query_selector(host, KATEX_ANNOTATION)
        .or_else(|| dom.query_selector(host, TEX_ANNOTATION))
        .or_else(|| {
            dom.parent_element(host)
                .and_then(|parent| dom.query_selector(parent, KATEX_ANNOTATION))
        });
    if let Some(tex) = annotation.and_then(|a| dom.trimmed_text(a)) {
        return Some(tex);
    }

    ["data-tex", "data-latex", "aria-label"]
        .iter()
        .filter_map(|name| dom.get_attr(host, name))
        .find(|v| !v.is_empty())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn attribute_tex(dom: &Document, id: NodeId) -> Option<String> {
    TEX_ATTRIBUTES
        .iter()
        .chain(["aria-label", "title"].iter())
        .filter_map(|name| dom.get_attr(id, name))
        .find(|v| is_tex_like(v))
        .map(|v| v.trim().to_string())
}

/// Whether `s` reads like TeX: a control sequence, a script marker, or an
/// environment.
pub fn is_tex_like(s: &str) -> bool {
    let t = s.trim();
    !t.is_empty() && (TEX_COMMAND_RE.is_match(t) || TEX_SCRIPT_RE.is_match(t))
}

/// Tidy TeX for output.
///
/// With `array_to_aligned`, `array` environments become `aligned` so that
/// Markdown renderers without `array` support still lay out the rows.
pub fn normalize_tex(tex: &str, array_to_aligned: bool) -> String {
    let t = tex.trim();
    if t.is_empty() {
        return String::new();
    }
    let t = t.replace("\r\n", "\n");
    let mut t = MULTI_NEWLINE_RE.replace_all(&t, "\n\n").into_owned();
    if array_to_aligned {
        t = TEX_ARRAY_BEGIN_RE
            .replace_all(&t, r"\begin{aligned}")
            .replace(r"\end{array}", r"\end{aligned}");
    }
    BLANK_LINE_RE.replace_all(&t, "\n").trim().to_string()
}

pub fn looks_multiline(tex: &str) -> bool {
    let t = tex.trim();
    !t.is_empty()
        && (t.contains('\n')
            || TEX_ENV_BEGIN_RE.is_match(t)
            || t.contains(r"\\")
            || t.chars().count() > 120)
}

/// Render a formula with the configured delimiters.
pub fn wrap(formula: &Formula, settings: &Settings) -> String {
    let tex = normalize_tex(&formula.tex, settings.normalize_multiline_math);
    let block =
        formula.display || (settings.prefer_block_math_for_multiline && looks_multiline(&tex));
    if block {
        let delim = &settings.block_math_delim;
        format!("\n{delim}\n{tex}\n{delim}\n")
    } else {
        let delim = &settings.inline_math_delim;
        format!("{delim}{tex}{delim}")
    }
}
