//! Text-to-markup transformer for content segments.
//!
//! Rendering is an ordered table of independent rules over the text and a
//! [`Placeholders`] table. Fenced code is lifted out first and only spliced
//! back after every other rule has run, so no formatting rule can see code.
//! The transformer keeps no state between calls.

mod block;
mod code;
mod inline;

use tracing::warn;

use crate::highlight::SyntaxHighlighter;

const TOKEN_START: char = '\u{E000}';
const TOKEN_END: char = '\u{E001}';

/// A fenced code block lifted out of the text.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CodeBlock {
    /// Language label from the opening fence, if any.
    pub language: Option<String>,
    /// Code exactly as written, for the copy affordance.
    pub raw_code: String,
    /// False while the closing fence has not arrived yet.
    pub complete: bool,
}

/// Markup for one content segment plus the code it contains.
///
/// `code_blocks[i]` is the block behind the copy button carrying
/// `data-code-index="i"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderedBlock {
    pub code_blocks: Vec<CodeBlock>,
    pub markup: String,
}

/// Protected regions, addressed by index from tokens in the text.
#[derive(Debug, Default)]
pub(crate) struct Placeholders {
    code_blocks: Vec<CodeBlock>,
    code_markup: Vec<String>,
    inline: Vec<String>,
    link_urls: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    CodeBlock,
    Inline,
    LinkUrl,
}

impl TokenKind {
    fn tag(self) -> char {
        match self {
            Self::CodeBlock => 'B',
            Self::Inline => 'I',
            Self::LinkUrl => 'U',
        }
    }
}

fn token(kind: TokenKind, index: usize) -> String {
    format!("{TOKEN_START}{}{index}{TOKEN_END}", kind.tag())
}

impl Placeholders {
    fn push_code_block(&mut self, block: CodeBlock) -> String {
        self.code_blocks.push(block);
        token(TokenKind::CodeBlock, self.code_blocks.len() - 1)
    }

    fn push_inline(&mut self, markup: String) -> String {
        self.inline.push(markup);
        token(TokenKind::Inline, self.inline.len() - 1)
    }

    fn push_link_url(&mut self, url: String) -> String {
        self.link_urls.push(url);
        token(TokenKind::LinkUrl, self.link_urls.len() - 1)
    }

    fn render_code_blocks(&mut self, highlighter: Option<&dyn SyntaxHighlighter>) {
        self.code_markup = self
            .code_blocks
            .iter()
            .enumerate()
            .map(|(index, block)| code::render_code_block(index, block, highlighter))
            .collect();
    }

    /// Splices protected markup back in. Returns the markup and how many
    /// code-block tokens were resolved.
    fn restore(&self, text: &str) -> (String, usize) {
        let mut out = String::with_capacity(text.len());
        let mut resolved = 0;
        let mut rest = text;
        while let Some(start) = rest.find(TOKEN_START) {
            out.push_str(&rest[..start]);
            let after = &rest[start + TOKEN_START.len_utf8()..];
            let Some(end) = after.find(TOKEN_END) else {
                rest = after;
                continue;
            };
            let body = &after[..end];
            let mut chars = body.chars();
            let kind = chars.next();
            let index = chars.as_str().parse::<usize>().ok();
            let replacement = match (kind, index) {
                (Some('B'), Some(i)) => self.code_markup.get(i).inspect(|_| resolved += 1),
                (Some('I'), Some(i)) => self.inline.get(i),
                (Some('U'), Some(i)) => self.link_urls.get(i),
                _ => None,
            };
            if let Some(replacement) = replacement {
                out.push_str(replacement);
            }
            rest = &after[end + TOKEN_END.len_utf8()..];
        }
        out.push_str(rest);
        (out, resolved)
    }
}

type Rule = fn(&str, &mut Placeholders) -> String;

/// Rules in application order. Each stage only ever sees the output of the
/// stages before it.
const RULES: &[(&str, Rule)] = &[
    ("fenced_code", code::extract_fenced_code),
    ("escape", escape_rule),
    ("headings", block::headings),
    ("horizontal_rules", block::horizontal_rules),
    ("unordered_lists", block::unordered_lists),
    ("ordered_lists", block::ordered_lists),
    ("inline_code", inline::code_spans),
    ("link_targets", inline::link_targets),
    ("bold", inline::bold),
    ("italic", inline::italic),
    ("strikethrough", inline::strikethrough),
    ("links", inline::links),
    ("blockquotes", block::blockquotes),
    ("line_breaks", block::line_breaks),
];

/// Renders one content segment to markup.
pub fn render_markup(text: &str, highlighter: Option<&dyn SyntaxHighlighter>) -> RenderedBlock {
    let mut placeholders = Placeholders::default();
    let mut current: String = text
        .chars()
        .filter(|c| *c != TOKEN_START && *c != TOKEN_END)
        .collect();
    for (_, rule) in RULES {
        current = rule(&current, &mut placeholders);
    }
    placeholders.render_code_blocks(highlighter);

    let (markup, resolved) = placeholders.restore(&current);
    if resolved != placeholders.code_blocks.len() {
        warn!(
            inserted = placeholders.code_blocks.len(),
            resolved, "code placeholder count mismatch"
        );
    }
    RenderedBlock {
        code_blocks: placeholders.code_blocks,
        markup,
    }
}

/// Renders thinking text: escaped, newlines as `<br>`, no formatting.
pub fn render_plain(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

/// Escapes `& < > " '`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_rule(text: &str, _: &mut Placeholders) -> String {
    escape_html(text)
}
