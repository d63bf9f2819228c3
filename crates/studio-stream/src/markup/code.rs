use tracing::debug;

use super::{CodeBlock, Placeholders, escape_html};
use crate::highlight::SyntaxHighlighter;

const FENCE: &str = "```";

/// Info string of an opening fence line, or `None` if the line is not one.
fn opening_fence(line: &str) -> Option<&str> {
    let info = line.trim_start().strip_prefix(FENCE)?;
    let info = info.trim();
    if info.contains('`') {
        return None;
    }
    Some(info)
}

fn is_closing_fence(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= FENCE.len() && trimmed.chars().all(|c| c == '`')
}

/// Replaces each fenced block with a placeholder token.
///
/// A fence with no closing line (the response is still streaming) takes the
/// rest of the text and is marked incomplete.
pub(super) fn extract_fenced_code(text: &str, placeholders: &mut Placeholders) -> String {
    let mut out = String::with_capacity(text.len());
    let mut lines = text.split_inclusive('\n');
    while let Some(line) = lines.next() {
        let Some(info) = opening_fence(line) else {
            out.push_str(line);
            continue;
        };
        let language = info
            .split_whitespace()
            .next()
            .map(ToOwned::to_owned);

        let mut code = String::new();
        let mut complete = false;
        let mut keep_newline = false;
        for inner in lines.by_ref() {
            if is_closing_fence(inner) {
                complete = true;
                keep_newline = inner.ends_with('\n');
                break;
            }
            code.push_str(inner);
        }
        if code.ends_with('\n') {
            code.pop();
            if code.ends_with('\r') {
                code.pop();
            }
        }

        let token = placeholders.push_code_block(CodeBlock {
            language,
            raw_code: code,
            complete,
        });
        out.push_str(&token);
        if keep_newline {
            out.push('\n');
        }
    }
    out
}

fn highlighted_body(block: &CodeBlock, highlighter: Option<&dyn SyntaxHighlighter>) -> String {
    let Some(highlighter) = highlighter else {
        return escape_html(&block.raw_code);
    };
    let result = match block.language.as_deref() {
        Some(language) => highlighter.highlight(&block.raw_code, language),
        None => highlighter.highlight_auto(&block.raw_code),
    };
    result.unwrap_or_else(|e| {
        debug!(error = %e, "highlighting failed; using plain code");
        escape_html(&block.raw_code)
    })
}

/// Markup for one code block: language label, copy button and the code.
pub(super) fn render_code_block(
    index: usize,
    block: &CodeBlock,
    highlighter: Option<&dyn SyntaxHighlighter>,
) -> String {
    let body = highlighted_body(block, highlighter);
    let language = block.language.as_deref().map(escape_html);
    let class = if block.complete {
        "code-block"
    } else {
        "code-block code-block-partial"
    };
    let label = language.as_deref().unwrap_or("text");
    let code_open = match language.as_deref() {
        Some(lang) => format!(r#"<code class="language-{lang}">"#),
        None => "<code>".to_string(),
    };
    format!(
        concat!(
            r#"<div class="{class}">"#,
            r#"<div class="code-header"><span class="code-lang">{label}</span>"#,
            r#"<button type="button" class="copy-code" data-code-index="{index}">Copy</button></div>"#,
            "<pre>{code_open}{body}</code></pre></div>",
        ),
        class = class,
        label = label,
        index = index,
        code_open = code_open,
        body = body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_language_and_code() {
        let mut placeholders = Placeholders::default();
        let out = extract_fenced_code("a\n```rust extra\nfn main() {}\n```\nb", &mut placeholders);
        assert_eq!(placeholders.code_blocks.len(), 1);
        let block = &placeholders.code_blocks[0];
        assert_eq!(block.language.as_deref(), Some("rust"));
        assert_eq!(block.raw_code, "fn main() {}");
        assert!(out.starts_with("a\n"));
        assert!(out.ends_with("\nb"));
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn inline_triple_backticks_are_not_fences() {
        let mut placeholders = Placeholders::default();
        let out = extract_fenced_code("use ```x``` here\n```a```\n", &mut placeholders);
        assert!(placeholders.code_blocks.is_empty());
        assert_eq!(out, "use ```x``` here\n```a```\n");
    }

    #[test]
    fn empty_and_unlabelled_blocks() {
        let mut placeholders = Placeholders::default();
        extract_fenced_code("```\n```\n```\nraw", &mut placeholders);
        assert_eq!(placeholders.code_blocks.len(), 2);
        assert_eq!(placeholders.code_blocks[0].raw_code, "");
        assert!(placeholders.code_blocks[0].complete);
        assert_eq!(placeholders.code_blocks[1].language, None);
        assert!(!placeholders.code_blocks[1].complete);
    }

    #[test]
    fn code_block_markup_has_label_and_copy_button() {
        let block = CodeBlock {
            language: None,
            raw_code: "<x>".into(),
            complete: false,
        };
        let html = render_code_block(2, &block, None);
        assert!(html.starts_with(r#"<div class="code-block code-block-partial">"#));
        assert!(html.contains(r#"<span class="code-lang">text</span>"#));
        assert!(html.contains(r#"data-code-index="2""#));
        assert!(html.contains("<pre><code>&lt;x&gt;</code></pre>"));
    }
}
