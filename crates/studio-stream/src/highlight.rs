//! Optional syntax highlighting for fenced code blocks.
//!
//! Highlighting is best-effort: the markup transformer treats every
//! [`HighlightError`] as "render the escaped raw code instead".

/// Failure reported by a [`SyntaxHighlighter`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HighlightError {
    #[error("unknown language: {0}")]
    UnknownLanguage(String),
    #[error("could not detect language")]
    Undetected,
    #[error("highlighter failed: {0}")]
    Failed(String),
}

/// Renders code into trusted, already-escaped markup.
pub trait SyntaxHighlighter: Send + Sync {
    /// Highlights `code` as `language`.
    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError>;

    /// Highlights `code`, guessing its language.
    fn highlight_auto(&self, code: &str) -> Result<String, HighlightError>;
}

#[cfg(feature = "syntect")]
pub use self::syntect_impl::SyntectHighlighter;

#[cfg(feature = "syntect")]
mod syntect_impl {
    use once_cell::sync::Lazy;
    use syntect::html::{ClassStyle, ClassedHTMLGenerator};
    use syntect::parsing::{SyntaxReference, SyntaxSet};
    use syntect::util::LinesWithEndings;

    use super::{HighlightError, SyntaxHighlighter};

    static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

    /// Highlighter emitting `<span class="...">` markup from syntect's default
    /// syntax definitions. Colours come from the page stylesheet.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SyntectHighlighter;

    impl SyntectHighlighter {
        pub fn new() -> Self {
            Self
        }

        fn render(code: &str, syntax: &SyntaxReference) -> Result<String, HighlightError> {
            let mut generator = ClassedHTMLGenerator::new_with_class_style(
                syntax,
                &SYNTAX_SET,
                ClassStyle::Spaced,
            );
            for line in LinesWithEndings::from(code) {
                generator
                    .parse_html_for_line_which_includes_newline(line)
                    .map_err(|e| HighlightError::Failed(e.to_string()))?;
            }
            Ok(generator.finalize())
        }
    }

    impl SyntaxHighlighter for SyntectHighlighter {
        fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError> {
            let syntax = SYNTAX_SET
                .find_syntax_by_token(language)
                .ok_or_else(|| HighlightError::UnknownLanguage(language.to_string()))?;
            Self::render(code, syntax)
        }

        fn highlight_auto(&self, code: &str) -> Result<String, HighlightError> {
            let syntax = SYNTAX_SET
                .find_syntax_by_first_line(code)
                .ok_or(HighlightError::Undetected)?;
            Self::render(code, syntax)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn highlights_known_language_with_escaping() {
            let html = SyntectHighlighter::new()
                .highlight("let x = a < b;\n", "rust")
                .expect("rust is bundled");
            assert!(html.contains("<span"));
            assert!(html.contains("&lt;"));
        }

        #[test]
        fn unknown_language_is_an_error() {
            assert!(matches!(
                SyntectHighlighter::new().highlight("x", "no-such-language"),
                Err(HighlightError::UnknownLanguage(_))
            ));
        }
    }
}
