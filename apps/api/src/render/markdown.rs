//! Markdown Line Renderer: classifies one line of loosely structured markdown
//! into a [`LayoutInstruction`].
//!
//! Pure and stateless: every line is classified on its own, so a report body is
//! rendered with `body.lines().map(classify)`.
//!
//! Inline `**bold**` and `*italic*` markers are stripped, not rendered. The
//! writer has one regular and one bold face per block, which cannot express
//! emphasis nested inside a run of text. Unbalanced markers are left as-is.

use std::sync::OnceLock;

use regex::Regex;

/// An abstract rendering command, independent of markdown syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutInstruction {
    Heading { level: u8, text: String },
    BulletItem(String),
    /// Numbering is part of the text.
    NumberedItem(String),
    Paragraph(String),
    Blank,
}

pub fn classify(line: &str) -> LayoutInstruction {
    let line = line.trim();

    if line.is_empty() {
        return LayoutInstruction::Blank;
    }

    if let Some(rest) = line.strip_prefix("## ") {
        return LayoutInstruction::Heading {
            level: 2,
            text: rest.to_string(),
        };
    }

    if is_top_level_heading(line) {
        // `#` plus one whitespace character, both single-byte.
        return LayoutInstruction::Heading {
            level: 1,
            text: line[2..].to_string(),
        };
    }

    if let Some(rest) = line.strip_prefix("- ") {
        return LayoutInstruction::BulletItem(strip_inline_markers(rest));
    }

    if is_numbered_item(line) {
        return LayoutInstruction::NumberedItem(strip_inline_markers(line));
    }

    LayoutInstruction::Paragraph(strip_inline_markers(line))
}

/// Classifies every line of a report body, in order.
pub fn layout_lines(body: &str) -> Vec<LayoutInstruction> {
    body.lines().map(classify).collect()
}

/// `^#\s`: a single hash followed by ASCII whitespace.
fn is_top_level_heading(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 2 && bytes[0] == b'#' && bytes[1].is_ascii_whitespace()
}

/// `^\d+\.\s`
fn is_numbered_item(line: &str) -> bool {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return false;
    }
    let mut rest = line[digits..].bytes();
    rest.next() == Some(b'.') && rest.next().is_some_and(|b| b.is_ascii_whitespace())
}

/// Removes `**...**` then `*...*` pairs, keeping the enclosed text verbatim.
pub fn strip_inline_markers(text: &str) -> String {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    static ITALIC: OnceLock<Regex> = OnceLock::new();

    let bold = BOLD.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold pattern"));
    let italic = ITALIC.get_or_init(|| Regex::new(r"\*(.+?)\*").expect("valid italic pattern"));

    let without_bold = bold.replace_all(text, "$1");
    italic.replace_all(&without_bold, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lines() {
        assert_eq!(classify(""), LayoutInstruction::Blank);
        assert_eq!(classify("   \t"), LayoutInstruction::Blank);
    }

    #[test]
    fn test_level_two_heading_drops_prefix() {
        for line in ["## Summary", "## Top **Colleges**", "##  spaced"] {
            assert_eq!(
                classify(line),
                LayoutInstruction::Heading {
                    level: 2,
                    text: line[3..].to_string()
                }
            );
        }
    }

    #[test]
    fn test_level_one_heading() {
        assert_eq!(
            classify("# Career Report"),
            LayoutInstruction::Heading {
                level: 1,
                text: "Career Report".to_string()
            }
        );
        assert_eq!(
            classify("#\tTabbed"),
            LayoutInstruction::Heading {
                level: 1,
                text: "Tabbed".to_string()
            }
        );
    }

    #[test]
    fn test_hash_without_space_is_a_paragraph() {
        assert_eq!(
            classify("#hashtag"),
            LayoutInstruction::Paragraph("#hashtag".to_string())
        );
        assert_eq!(
            classify("###Deep"),
            LayoutInstruction::Paragraph("###Deep".to_string())
        );
    }

    #[test]
    fn test_bullet_strips_dash_and_markers() {
        assert_eq!(
            classify("- **Strength:** analytical thinking"),
            LayoutInstruction::BulletItem("Strength: analytical thinking".to_string())
        );
    }

    #[test]
    fn test_numbered_item_keeps_numeral() {
        assert_eq!(
            classify("1. Apply to *IIT Madras*"),
            LayoutInstruction::NumberedItem("1. Apply to IIT Madras".to_string())
        );
        assert_eq!(
            classify("  12. Twelfth step"),
            LayoutInstruction::NumberedItem("12. Twelfth step".to_string())
        );
    }

    #[test]
    fn test_number_without_dot_space_is_a_paragraph() {
        assert_eq!(
            classify("2025 was a good year."),
            LayoutInstruction::Paragraph("2025 was a good year.".to_string())
        );
        assert_eq!(
            classify("3.5 CGPA"),
            LayoutInstruction::Paragraph("3.5 CGPA".to_string())
        );
    }

    #[test]
    fn test_inline_markers_are_stripped() {
        assert_eq!(
            classify("**bold** and *italic*"),
            LayoutInstruction::Paragraph("bold and italic".to_string())
        );
    }

    #[test]
    fn test_unbalanced_markers_pass_through() {
        assert_eq!(strip_inline_markers("**bold"), "**bold");
        assert_eq!(strip_inline_markers("2 * 3 = 6"), "2 * 3 = 6");
        assert_eq!(strip_inline_markers("*"), "*");
    }

    #[test]
    fn test_layout_lines_scenario() {
        let body = "## Summary\n- Point one\nPlain text.";
        assert_eq!(
            layout_lines(body),
            vec![
                LayoutInstruction::Heading {
                    level: 2,
                    text: "Summary".to_string()
                },
                LayoutInstruction::BulletItem("Point one".to_string()),
                LayoutInstruction::Paragraph("Plain text.".to_string()),
            ]
        );
    }
}
