//! System prompts for the vision model acting as OCR engine.
//!
//! Kept in one place so prompt changes never touch retry or routing code,
//! and so tests can inspect them without a live model.

/// Prompt for a rasterised page of a scanned PDF.
///
/// The output is Markdown; image references it might emit are stripped later
/// by post-processing anyway.
pub const PDF_PAGE_PROMPT: &str = r#"You transcribe a scanned document page into Markdown.

Rules:

1. TEXT
   - Transcribe ALL visible text in natural reading order
   - Do not summarise, translate or correct wording

2. STRUCTURE
   - Use # / ## / ### for headings as they appear visually
   - Use - for bullet lists and 1. 2. 3. for numbered lists
   - Convert tables to GFM pipe tables

3. SKIP
   - Page numbers, running headers and footers
   - Purely decorative elements

4. OUTPUT
   - Output ONLY the Markdown
   - No ```markdown fences, no commentary
   - If the page has no text, output nothing"#;

/// Prompt for a standalone image upload: plain text lines only, the same
/// shape a classic OCR engine returns.
pub const IMAGE_OCR_PROMPT: &str = r#"You are an OCR engine. Read every line of text visible in the image.

Rules:
- Output one recognised text line per output line, top to bottom, left to right
- Output plain text only: no Markdown, no numbering, no commentary
- Do not describe the image
- If the image contains no readable text, output nothing at all"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_demand_bare_output() {
        assert!(PDF_PAGE_PROMPT.contains("Output ONLY the Markdown"));
        assert!(IMAGE_OCR_PROMPT.contains("output nothing"));
        assert!(!IMAGE_OCR_PROMPT.contains("Markdown table"));
    }
}
