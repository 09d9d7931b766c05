//! Markdown escaping and code delimiter helpers.

/// Calculate the minimum fence length needed for a code block.
///
/// Returns the smallest number of fence characters (at least 3) that
/// doesn't appear as a run in the content.
///
/// ```
/// use chatmark::markdown::calculate_fence_length;
///
/// assert_eq!(calculate_fence_length("let x = 1;", '`'), 3);
/// assert_eq!(calculate_fence_length("```rust\ncode\n```", '`'), 4);
/// ```
pub fn calculate_fence_length(content: &str, fence_char: char) -> usize {
    longest_run(content, fence_char).max(2) + 1
}

/// Calculate the minimum backtick count needed for inline code.
///
/// ```
/// use chatmark::markdown::calculate_inline_code_ticks;
///
/// assert_eq!(calculate_inline_code_ticks("code"), 1);
/// assert_eq!(calculate_inline_code_ticks("code with ` backtick"), 2);
/// ```
pub fn calculate_inline_code_ticks(content: &str) -> usize {
    longest_run(content, '`') + 1
}

fn longest_run(content: &str, target: char) -> usize {
    let mut max_run = 0;
    let mut current_run = 0;

    for c in content.chars() {
        if c == target {
            current_run += 1;
            max_run = max_run.max(current_run);
        } else {
            current_run = 0;
        }
    }

    max_run
}

/// Wrap text as an inline code span.
///
/// Content that starts or ends with a backtick is padded with a space so
/// the delimiters stay unambiguous.
pub fn inline_code(content: &str) -> String {
    let ticks = "`".repeat(calculate_inline_code_ticks(content));
    if content.starts_with('`') || content.ends_with('`') {
        format!("{ticks} {content} {ticks}")
    } else {
        format!("{ticks}{content}{ticks}")
    }
}

/// Escape a table cell: pipes are escaped and newlines become spaces.
pub fn escape_table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Escape a value for a double-quoted YAML scalar.
pub fn escape_yaml_string(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
