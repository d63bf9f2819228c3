use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::Placeholders;

static CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("code span regex"));
static BOLD_STARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^\s*](?:[^*\n]*?[^\s*])?)\*\*").expect("bold regex"));
static BOLD_UNDERSCORES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^\w])__([^\s_](?:[^_\n]*?[^\s_])?)__([^\w]|$)").expect("bold regex")
});
static ITALIC_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^\s*](?:[^*\n]*?[^\s*])?)\*").expect("italic regex"));
static ITALIC_UNDERSCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^\w])_([^\s_](?:[^_\n]*?[^\s_])?)_([^\w]|$)").expect("italic regex")
});
static STRIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~~([^\s~](?:[^~\n]*?[^\s~])?)~~").expect("strike regex"));
/// `[text](url)`; the url may hold one level of balanced parentheses.
static LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]\n]+)\]\(((?:[^()\s]|\([^()\s]*\))+)\)").expect("link regex")
});
static LINK_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]\n]+)\]\(\x{E000}U(\d+)\x{E001}\)").expect("link target regex")
});

const BLOCKED_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

/// Inline code spans become protected placeholders so later inline rules
/// cannot format their content.
pub(super) fn code_spans(text: &str, placeholders: &mut Placeholders) -> String {
    CODE_SPAN
        .replace_all(text, |caps: &Captures<'_>| {
            placeholders.push_inline(format!("<code>{}</code>", &caps[1]))
        })
        .into_owned()
}

pub(super) fn bold(text: &str, _: &mut Placeholders) -> String {
    let text = BOLD_STARS.replace_all(text, "<strong>${1}</strong>");
    BOLD_UNDERSCORES
        .replace_all(&text, "${1}<strong>${2}</strong>${3}")
        .into_owned()
}

/// Runs after [`bold`], so the double delimiters are already gone.
pub(super) fn italic(text: &str, _: &mut Placeholders) -> String {
    let text = ITALIC_STAR.replace_all(text, "<em>${1}</em>");
    ITALIC_UNDERSCORE
        .replace_all(&text, "${1}<em>${2}</em>${3}")
        .into_owned()
}

pub(super) fn strikethrough(text: &str, _: &mut Placeholders) -> String {
    STRIKE.replace_all(text, "<del>${1}</del>").into_owned()
}

fn is_blocked_url(url: &str) -> bool {
    let lowered = url.trim().to_ascii_lowercase();
    BLOCKED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme))
}

/// Lifts each link url into the placeholder table so emphasis rules never
/// touch it. The label stays in the text and is formatted as usual.
pub(super) fn link_targets(text: &str, placeholders: &mut Placeholders) -> String {
    LINK.replace_all(text, |caps: &Captures<'_>| {
        let token = placeholders.push_link_url(caps[2].to_string());
        format!("[{}]({token})", &caps[1])
    })
    .into_owned()
}

/// Builds anchors from the urls lifted by [`link_targets`]. Text and url were
/// escaped earlier, so the url is safe inside a quoted attribute.
pub(super) fn links(text: &str, placeholders: &mut Placeholders) -> String {
    LINK_TARGET
        .replace_all(text, |caps: &Captures<'_>| {
            let label = &caps[1];
            let url = caps[2]
                .parse::<usize>()
                .ok()
                .and_then(|i| placeholders.link_urls.get(i));
            match url {
                Some(url) if !is_blocked_url(url) => format!(
                    r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{label}</a>"#
                ),
                _ => label.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(rule: super::super::Rule, text: &str) -> String {
        rule(text, &mut Placeholders::default())
    }

    #[test]
    fn code_spans_are_replaced_by_tokens() {
        let mut placeholders = Placeholders::default();
        let out = code_spans("a `**x**` b", &mut placeholders);
        assert!(!out.contains("**"));
        assert_eq!(placeholders.inline, vec!["<code>**x**</code>".to_string()]);
    }

    #[test]
    fn bold_then_italic_keeps_delimiters_apart() {
        let text = apply(bold, "**a** and *b* and ***c***");
        let text = apply(italic, &text);
        assert_eq!(
            text,
            "<strong>a</strong> and <em>b</em> and <em><strong>c</strong></em>"
        );
    }

    #[test]
    fn bold_spans_do_not_cross_lines() {
        assert_eq!(apply(bold, "**a\nb**"), "**a\nb**");
    }

    #[test]
    fn strikethrough_requires_tight_delimiters() {
        assert_eq!(apply(strikethrough, "~~gone~~ ~~ x ~~"), "<del>gone</del> ~~ x ~~");
    }

    #[test]
    fn bold_pairs_on_one_line_stay_separate() {
        assert_eq!(
            apply(bold, "**A** or **B**"),
            "<strong>A</strong> or <strong>B</strong>"
        );
        assert_eq!(
            apply(bold, "Pick **1** then **22**"),
            "Pick <strong>1</strong> then <strong>22</strong>"
        );
    }

    fn link(text: &str) -> String {
        let mut placeholders = Placeholders::default();
        let text = link_targets(text, &mut placeholders);
        links(&text, &mut placeholders)
    }

    #[test]
    fn blocked_schemes_render_label_only() {
        assert_eq!(link("[a](JavaScript:x)"), "a");
        assert_eq!(link("[a](data:text/html)"), "a");
        assert!(link("[a](/relative)").contains(r#"href="/relative""#));
    }

    #[test]
    fn urls_keep_balanced_parentheses() {
        assert_eq!(
            link("[Rust](https://en.wikipedia.org/wiki/Rust_(programming_language)) x"),
            r#"<a href="https://en.wikipedia.org/wiki/Rust_(programming_language)" target="_blank" rel="noopener noreferrer">Rust</a> x"#
        );
    }

    #[test]
    fn lifted_urls_are_hidden_from_emphasis_rules() {
        let mut placeholders = Placeholders::default();
        let text = link_targets("[init](https://a.org/x#object.__init__)", &mut placeholders);
        assert!(!text.contains("__init__"));
        let text = apply(bold, &text);
        let text = apply(italic, &text);
        assert_eq!(
            links(&text, &mut placeholders),
            r#"<a href="https://a.org/x#object.__init__" target="_blank" rel="noopener noreferrer">init</a>"#
        );
    }
}
