use once_cell::sync::Lazy;
use regex::Regex;

use super::{Placeholders, TOKEN_START, TokenKind};

static UNORDERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-*]\s+(.*)$").expect("valid unordered item regex"));
static ORDERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\.\s+(.*)$").expect("valid ordered item regex"));

/// Opening tags that mark a line as a block element. Literal `<` in user text
/// is escaped before block rules run, so a line starting with one of these
/// was produced by a rule.
const BLOCK_PREFIXES: &[&str] = &[
    "<h1>",
    "<h2>",
    "<h3>",
    "<h4>",
    "<hr>",
    "<ul>",
    "<ol>",
    "<ol ",
    "<blockquote>",
];

fn map_lines(text: &str, mut f: impl FnMut(&str) -> String) -> String {
    text.split('\n').map(&mut f).collect::<Vec<_>>().join("\n")
}

/// `#` to `####` followed by a space.
pub(super) fn headings(text: &str, _: &mut Placeholders) -> String {
    map_lines(text, |line| {
        let level = line.chars().take_while(|c| *c == '#').count();
        match line[level..].strip_prefix(' ') {
            Some(title) if (1..=4).contains(&level) && !title.trim().is_empty() => {
                format!("<h{level}>{}</h{level}>", title.trim())
            }
            _ => line.to_string(),
        }
    })
}

/// `---` or `***` (three or more) alone on a line.
pub(super) fn horizontal_rules(text: &str, _: &mut Placeholders) -> String {
    map_lines(text, |line| {
        let trimmed = line.trim();
        let is_rule = trimmed.len() >= 3
            && (trimmed.chars().all(|c| c == '-') || trimmed.chars().all(|c| c == '*'));
        if is_rule {
            "<hr>".to_string()
        } else {
            line.to_string()
        }
    })
}

/// Groups runs of consecutive lines matching `pattern` into one list line.
fn group_list(
    text: &str,
    pattern: &Regex,
    item_group: usize,
    open_tag: impl Fn(&regex::Captures<'_>) -> String,
    close_tag: &str,
) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    for line in text.split('\n') {
        match pattern.captures(line) {
            Some(caps) => {
                let list = current.get_or_insert_with(|| open_tag(&caps));
                list.push_str("<li>");
                list.push_str(caps.get(item_group).map_or("", |m| m.as_str()).trim());
                list.push_str("</li>");
            }
            None => {
                if let Some(mut list) = current.take() {
                    list.push_str(close_tag);
                    out.push(list);
                }
                out.push(line.to_string());
            }
        }
    }
    if let Some(mut list) = current.take() {
        list.push_str(close_tag);
        out.push(list);
    }
    out.join("\n")
}

pub(super) fn unordered_lists(text: &str, _: &mut Placeholders) -> String {
    group_list(text, &UNORDERED_ITEM, 1, |_| "<ul>".to_string(), "</ul>")
}

pub(super) fn ordered_lists(text: &str, _: &mut Placeholders) -> String {
    group_list(
        text,
        &ORDERED_ITEM,
        2,
        |caps| match caps[1].parse::<u64>() {
            Ok(start) if start != 1 => format!(r#"<ol start="{start}">"#),
            _ => "<ol>".to_string(),
        },
        "</ol>",
    )
}

/// Merges adjacent `>` lines (escaped to `&gt;` by now) into one quote.
pub(super) fn blockquotes(text: &str, _: &mut Placeholders) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut quote: Vec<&str> = Vec::new();
    let flush = |quote: &mut Vec<&str>, out: &mut Vec<String>| {
        if !quote.is_empty() {
            out.push(format!("<blockquote>{}</blockquote>", quote.join("<br>")));
            quote.clear();
        }
    };
    for line in text.split('\n') {
        match line.trim_start().strip_prefix("&gt;") {
            Some(rest) => quote.push(rest.strip_prefix(' ').unwrap_or(rest).trim_end()),
            None => {
                flush(&mut quote, &mut out);
                out.push(line.to_string());
            }
        }
    }
    flush(&mut quote, &mut out);
    out.join("\n")
}

fn is_block_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    BLOCK_PREFIXES.iter().any(|p| trimmed.starts_with(p))
        || line.contains(&format!("{TOKEN_START}{}", TokenKind::CodeBlock.tag()))
}

/// Blank lines become paragraph breaks and single newlines become `<br>`.
/// Block elements are emitted bare, with no break on either side.
pub(super) fn line_breaks(text: &str, _: &mut Placeholders) -> String {
    let mut out = String::with_capacity(text.len());
    let mut paragraph: Vec<&str> = Vec::new();
    let flush = |paragraph: &mut Vec<&str>, out: &mut String| {
        if !paragraph.is_empty() {
            out.push_str("<p>");
            out.push_str(&paragraph.join("<br>"));
            out.push_str("</p>");
            paragraph.clear();
        }
    };
    for line in text.split('\n') {
        let line = line.trim_end();
        if line.trim().is_empty() {
            flush(&mut paragraph, &mut out);
        } else if is_block_line(line) {
            flush(&mut paragraph, &mut out);
            out.push_str(line.trim());
        } else {
            paragraph.push(line);
        }
    }
    flush(&mut paragraph, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(rule: super::super::Rule, text: &str) -> String {
        rule(text, &mut Placeholders::default())
    }

    #[test]
    fn heading_levels() {
        assert_eq!(apply(headings, "## Two"), "<h2>Two</h2>");
        assert_eq!(apply(headings, "#NoSpace"), "#NoSpace");
        assert_eq!(apply(headings, "# "), "# ");
    }

    #[test]
    fn rules_need_three_marks() {
        assert_eq!(apply(horizontal_rules, "--\n---\n*****"), "--\n<hr>\n<hr>");
    }

    #[test]
    fn separate_lists_stay_separate() {
        assert_eq!(
            apply(unordered_lists, "- a\n\n- b"),
            "<ul><li>a</li></ul>\n\n<ul><li>b</li></ul>"
        );
    }

    #[test]
    fn quote_with_empty_line() {
        assert_eq!(
            apply(blockquotes, "&gt; a\n&gt;\n&gt; b"),
            "<blockquote>a<br><br>b</blockquote>"
        );
    }

    #[test]
    fn breaks_next_to_blocks_are_elided() {
        assert_eq!(
            apply(line_breaks, "intro\n<ul><li>x</li></ul>\n\n\nend"),
            "<p>intro</p><ul><li>x</li></ul><p>end</p>"
        );
    }
}
