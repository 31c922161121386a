//! Post-processing of converter output before it is returned.
//!
//! Extracted images are persisted to the staging `images/` directory, so the
//! Markdown handed back to the caller drops the `![alt](path)` references to
//! them instead of pointing at files the caller cannot reach.
//!
//! Rules (applied in order):
//! 1. Remove every image reference `![...](...)`
//! 2. Trim surrounding whitespace

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to converter output.
pub fn clean_markdown(input: &str) -> String {
    let s = remove_image_links(input);
    s.trim().to_string()
}

// ── Rule 1: Remove image references ──────────────────────────────────────────

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[.*?\]\(.*?\)").unwrap());

fn remove_image_links(input: &str) -> String {
    RE_IMAGE.replace_all(input, "").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_inline_image() {
        assert_eq!(clean_markdown("A ![alt](img/1.png) B"), "A  B");
    }

    #[test]
    fn strips_empty_alt_and_multiple_images() {
        let input = "![](images/page1_img1.png)\n\n# Title\n\nText ![x](a.png)![y](b.png)\n";
        assert_eq!(clean_markdown(input), "# Title\n\nText");
    }

    #[test]
    fn keeps_plain_links() {
        let input = "See [docs](https://example.org) for more.";
        assert_eq!(clean_markdown(input), input);
    }

    #[test]
    fn trims_surrounding_whitespace_only() {
        assert_eq!(clean_markdown("\n\n  line one\n\nline two  \n\n"), "line one\n\nline two");
    }

    #[test]
    fn image_only_document_becomes_empty() {
        assert_eq!(clean_markdown("![](images/a.png)\n![](images/b.png)"), "");
    }
}
