//! Document → Markdown converters for the generic strategy.
//!
//! | Extension        | Rendering                                          |
//! |------------------|----------------------------------------------------|
//! | `.txt`           | verbatim                                           |
//! | `.tsv` / `.csv`  | one pipe table                                     |
//! | `.json`          | pretty-printed, fenced                             |
//! | `.xml`           | fenced                                             |
//! | `.html`          | headings, paragraphs, lists, tables, links         |
//! | `.docx`          | paragraphs, headings, list items, tables           |
//! | `.pptx`          | per slide, prefixed `<!-- Slide number: N -->`     |
//! | `.xlsx` / `.xls` | `## <sheet>` plus a table per sheet                |
//! | `.epub`          | spine documents in order, each rendered as HTML    |
//!
//! Legacy binary `.ppt` is accepted by the router but cannot be read here.

use crate::document::extension_of;
use crate::error::MarkifyError;
use crate::extract::generic::DocumentConverter;
use calamine::{open_workbook_auto, Reader as _};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::{node::Node, ElementRef, Html};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Converter for every non-PDF format in the allow-list.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupConverter;

impl DocumentConverter for MarkupConverter {
    fn convert(&self, path: &Path) -> Result<String, MarkifyError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match extension_of(&name).as_str() {
            ".txt" => read_text(path),
            ".tsv" => delimited_to_markdown(path, b'\t'),
            ".csv" => delimited_to_markdown(path, b','),
            ".json" => json_to_markdown(&read_text(path)?),
            ".xml" => Ok(fenced("xml", read_text(path)?.trim())),
            ".html" => Ok(html_to_markdown(&read_text(path)?)),
            ".docx" => docx_to_markdown(path),
            ".pptx" => pptx_to_markdown(path),
            ".xlsx" | ".xls" => workbook_to_markdown(path),
            ".epub" => epub_to_markdown(path),
            ".ppt" => Err(conversion_failed(
                "ppt",
                "legacy binary PowerPoint cannot be read; save it as .pptx",
            )),
            other => Err(conversion_failed(other, "no converter for this format")),
        }
    }
}

fn conversion_failed(format: &str, detail: impl ToString) -> MarkifyError {
    MarkifyError::ConversionFailed {
        format: format.trim_start_matches('.').to_string(),
        detail: detail.to_string(),
    }
}

fn read_text(path: &Path) -> Result<String, MarkifyError> {
    let bytes = std::fs::read(path).map_err(|e| MarkifyError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn fenced(lang: &str, body: &str) -> String {
    format!("```{lang}\n{body}\n```")
}

// ── Tables ───────────────────────────────────────────────────────────────────

/// Render rows as a pipe table; the first row is the header.
fn markdown_table(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        out.push('|');
        for c in 0..width {
            let cell = row.get(c).map(|s| escape_cell(s)).unwrap_or_default();
            out.push(' ');
            out.push_str(&cell);
            out.push_str(" |");
        }
        out.push('\n');
        if i == 0 {
            out.push('|');
            out.push_str(&" --- |".repeat(width));
            out.push('\n');
        }
    }
    out.truncate(out.trim_end().len());
    out
}

fn escape_cell(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

fn delimited_to_markdown(path: &Path, delimiter: u8) -> Result<String, MarkifyError> {
    let fmt = if delimiter == b'\t' { "tsv" } else { "csv" };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| conversion_failed(fmt, e))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| conversion_failed(fmt, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(markdown_table(&rows))
}

// ── JSON ─────────────────────────────────────────────────────────────────────

fn json_to_markdown(raw: &str) -> Result<String, MarkifyError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| conversion_failed("json", e))?;
    let pretty = serde_json::to_string_pretty(&value).map_err(|e| conversion_failed("json", e))?;
    Ok(fenced("json", &pretty))
}

// ── Spreadsheets ─────────────────────────────────────────────────────────────

fn workbook_to_markdown(path: &Path) -> Result<String, MarkifyError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| conversion_failed("xlsx", e))?;
    let mut sections = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| conversion_failed("xlsx", e))?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        let table = markdown_table(&rows);
        if table.is_empty() {
            sections.push(format!("## {name}"));
        } else {
            sections.push(format!("## {name}\n\n{table}"));
        }
    }
    Ok(sections.join("\n\n"))
}

// ── Zip containers ───────────────────────────────────────────────────────────

fn open_zip(path: &Path, fmt: &str) -> Result<ZipArchive<File>, MarkifyError> {
    let file = File::open(path).map_err(|e| MarkifyError::io(path, e))?;
    ZipArchive::new(file).map_err(|e| conversion_failed(fmt, e))
}

fn zip_entry(archive: &mut ZipArchive<File>, name: &str, fmt: &str) -> Result<String, MarkifyError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| conversion_failed(fmt, format!("missing {name}: {e}")))?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| conversion_failed(fmt, format!("reading {name}: {e}")))?;
    Ok(content)
}

/// Value of the attribute with local name `key`.
fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

// ── Office Open XML text (docx, pptx) ────────────────────────────────────────

/// Walks WordprocessingML / DrawingML and collects Markdown blocks.
///
/// Both dialects share the element local names used here: `p` paragraph,
/// `t` text run, `tbl`/`tr`/`tc` tables. Paragraphs inside a table cell are
/// joined into the cell; nested tables flatten into their outer cell.
fn ooxml_blocks(xml: &str, fmt: &str) -> Result<Vec<String>, MarkifyError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut blocks = Vec::new();
    let mut buf = Vec::new();
    let mut para = String::new();
    let mut heading: Option<usize> = None;
    let mut list_item = false;
    let mut in_text = false;
    let mut title_shape = false;

    let mut table_depth = 0usize;
    let mut table: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| conversion_failed(fmt, e))?;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => {
                    para.clear();
                    heading = None;
                    list_item = false;
                }
                b"numPr" => list_item = true,
                b"tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        table.clear();
                    }
                }
                b"tr" if table_depth == 1 => row.clear(),
                b"tc" if table_depth == 1 => cell.clear(),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"pStyle" => heading = attr(&e, b"val").and_then(|v| heading_level(&v)),
                b"ph" => {
                    let kind = attr(&e, b"type").unwrap_or_default();
                    title_shape = kind == "title" || kind == "ctrTitle";
                }
                b"tab" => para.push('\t'),
                b"br" => para.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(|e| conversion_failed(fmt, e))?;
                para.push_str(&text);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"sp" => title_shape = false,
                b"p" => {
                    let text = para.trim();
                    if table_depth > 0 {
                        if !text.is_empty() {
                            if !cell.is_empty() {
                                cell.push(' ');
                            }
                            cell.push_str(text);
                        }
                    } else if !text.is_empty() {
                        let level = heading.or(title_shape.then_some(1));
                        blocks.push(render_paragraph(text, level, list_item));
                    }
                    para.clear();
                }
                b"tc" if table_depth == 1 => row.push(std::mem::take(&mut cell)),
                b"tr" if table_depth == 1 => table.push(std::mem::take(&mut row)),
                b"tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        let rendered = markdown_table(&table);
                        if !rendered.is_empty() {
                            blocks.push(rendered);
                        }
                        table.clear();
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(blocks)
}

/// `Heading2` / `heading 2` → 2, `Title` → 1.
fn heading_level(style: &str) -> Option<usize> {
    let s = style.to_ascii_lowercase().replace(' ', "");
    if s == "title" {
        return Some(1);
    }
    s.strip_prefix("heading")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| (1..=6).contains(n))
}

fn render_paragraph(text: &str, heading: Option<usize>, list_item: bool) -> String {
    match heading {
        Some(level) => format!("{} {}", "#".repeat(level), text),
        None if list_item => format!("- {text}"),
        None => text.to_string(),
    }
}

fn docx_to_markdown(path: &Path) -> Result<String, MarkifyError> {
    let mut archive = open_zip(path, "docx")?;
    let xml = zip_entry(&mut archive, "word/document.xml", "docx")?;
    Ok(ooxml_blocks(&xml, "docx")?.join("\n\n"))
}

/// Slide number from `ppt/slides/slideN.xml`.
fn slide_number(entry: &str) -> Option<usize> {
    entry
        .strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

fn pptx_to_markdown(path: &Path) -> Result<String, MarkifyError> {
    let mut archive = open_zip(path, "pptx")?;
    let mut slides: Vec<(usize, String)> = archive
        .file_names()
        .filter_map(|n| slide_number(n).map(|num| (num, n.to_string())))
        .collect();
    slides.sort_by_key(|(num, _)| *num);

    let mut sections = Vec::with_capacity(slides.len());
    for (num, entry) in slides {
        let xml = zip_entry(&mut archive, &entry, "pptx")?;
        let body = ooxml_blocks(&xml, "pptx")?.join("\n\n");
        sections.push(format!("<!-- Slide number: {num} -->\n{body}"));
    }
    Ok(sections.join("\n\n"))
}

// ── EPUB ─────────────────────────────────────────────────────────────────────

fn epub_to_markdown(path: &Path) -> Result<String, MarkifyError> {
    let mut archive = open_zip(path, "epub")?;

    let container = zip_entry(&mut archive, "META-INF/container.xml", "epub")?;
    let opf_path = first_attr(&container, b"rootfile", b"full-path")?
        .ok_or_else(|| conversion_failed("epub", "container.xml names no rootfile"))?;
    let opf = zip_entry(&mut archive, &opf_path, "epub")?;
    let base = match opf_path.rfind('/') {
        Some(i) => &opf_path[..=i],
        None => "",
    };

    let (manifest, spine) = parse_opf(&opf)?;
    let mut chapters = Vec::new();
    for idref in spine {
        let Some(href) = manifest.get(&idref) else {
            continue;
        };
        let html = zip_entry(&mut archive, &format!("{base}{href}"), "epub")?;
        let md = html_to_markdown(&html);
        if !md.is_empty() {
            chapters.push(md);
        }
    }
    Ok(chapters.join("\n\n"))
}

/// First `attr_name` of any element with local name `element`.
fn first_attr(xml: &str, element: &[u8], attr_name: &[u8]) -> Result<Option<String>, MarkifyError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| conversion_failed("epub", e))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == element => {
                return Ok(attr(&e, attr_name));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

/// Manifest `id → href` and the spine `idref` order.
fn parse_opf(xml: &str) -> Result<(HashMap<String, String>, Vec<String>), MarkifyError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut manifest = HashMap::new();
    let mut spine = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| conversion_failed("epub", e))?
        {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"item" => {
                    if let (Some(id), Some(href)) = (attr(&e, b"id"), attr(&e, b"href")) {
                        manifest.insert(id, href);
                    }
                }
                b"itemref" => spine.extend(attr(&e, b"idref")),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok((manifest, spine))
}

// ── HTML ─────────────────────────────────────────────────────────────────────

/// Element nesting below which a subtree is flattened to plain text.
const MAX_HTML_DEPTH: usize = 256;

/// Render an HTML document's body as Markdown blocks.
pub fn html_to_markdown(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut blocks = Vec::new();
    html_blocks(doc.root_element(), 0, &mut blocks);
    blocks.join("\n\n")
}

const SKIPPED_TAGS: [&str; 6] = ["head", "script", "style", "noscript", "template", "title"];

/// All text under `el`, whitespace collapsed. `ElementRef::text` walks the
/// tree iteratively, so this is safe at any depth.
fn flattened(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for t in el.text() {
        push_collapsed(&mut out, t);
    }
    out.trim().to_string()
}

fn html_blocks(el: ElementRef<'_>, depth: usize, blocks: &mut Vec<String>) {
    if depth >= MAX_HTML_DEPTH {
        let text = flattened(el);
        if !text.is_empty() {
            blocks.push(text);
        }
        return;
    }
    let next = depth + 1;
    let mut loose = String::new();
    for child in el.children() {
        if let Node::Text(t) = child.value() {
            push_collapsed(&mut loose, t);
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        let tag = child_el.value().name();
        if SKIPPED_TAGS.contains(&tag) {
            continue;
        }
        if is_inline(tag) {
            inline_into(child_el, next, &mut loose);
            continue;
        }
        flush_loose(&mut loose, blocks);
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                let text = inline_text(child_el, next);
                if !text.is_empty() {
                    blocks.push(format!("{} {}", "#".repeat(level), text));
                }
            }
            "p" => {
                let text = inline_text(child_el, next);
                if !text.is_empty() {
                    blocks.push(text);
                }
            }
            "ul" | "ol" => {
                let mut lines = Vec::new();
                list_lines(child_el, tag == "ol", 0, next, &mut lines);
                if !lines.is_empty() {
                    blocks.push(lines.join("\n"));
                }
            }
            "table" => {
                let mut rows = Vec::new();
                table_rows(child_el, next, &mut rows);
                let table = markdown_table(&rows);
                if !table.is_empty() {
                    blocks.push(table);
                }
            }
            "pre" => {
                let code: String = child_el.text().collect();
                blocks.push(fenced("", code.trim_end_matches('\n')));
            }
            "blockquote" => {
                let mut inner = Vec::new();
                html_blocks(child_el, next, &mut inner);
                let quoted = inner
                    .join("\n\n")
                    .lines()
                    .map(|l| format!("> {l}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                if !quoted.is_empty() {
                    blocks.push(quoted);
                }
            }
            "hr" => blocks.push("---".to_string()),
            _ => html_blocks(child_el, next, blocks),
        }
    }
    flush_loose(&mut loose, blocks);
}

fn flush_loose(loose: &mut String, blocks: &mut Vec<String>) {
    let text = loose.trim();
    if !text.is_empty() {
        blocks.push(text.to_string());
    }
    loose.clear();
}

fn is_inline(tag: &str) -> bool {
    matches!(
        tag,
        "a" | "span" | "strong" | "b" | "em" | "i" | "code" | "br" | "img" | "small" | "sub"
            | "sup" | "u" | "mark" | "abbr" | "label"
    )
}

fn inline_text(el: ElementRef<'_>, depth: usize) -> String {
    if depth >= MAX_HTML_DEPTH {
        return flattened(el);
    }
    let mut out = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(t) => push_collapsed(&mut out, t),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    inline_into(child_el, depth + 1, &mut out);
                }
            }
            _ => {}
        }
    }
    out.trim().to_string()
}

fn inline_into(el: ElementRef<'_>, depth: usize, out: &mut String) {
    let tag = el.value().name();
    match tag {
        "br" => out.push('\n'),
        "img" => {
            let alt = el.value().attr("alt").unwrap_or_default();
            let src = el.value().attr("src").unwrap_or_default();
            out.push_str(&format!("![{alt}]({src})"));
        }
        "ul" | "ol" | "table" | "script" | "style" => {}
        _ => {
            let inner = inline_text(el, depth);
            if inner.is_empty() {
                return;
            }
            let rendered = match tag {
                "a" => match el.value().attr("href") {
                    Some(href) => format!("[{inner}]({href})"),
                    None => inner,
                },
                "strong" | "b" => format!("**{inner}**"),
                "em" | "i" => format!("*{inner}*"),
                "code" => format!("`{inner}`"),
                _ => inner,
            };
            out.push_str(&rendered);
        }
    }
}

/// Append `text` with whitespace runs collapsed to one space.
fn push_collapsed(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !out.ends_with([' ', '\n']) {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
}

/// `indent` is the list nesting level; `depth` the element nesting.
fn list_lines(
    list: ElementRef<'_>,
    ordered: bool,
    indent: usize,
    depth: usize,
    lines: &mut Vec<String>,
) {
    if depth >= MAX_HTML_DEPTH {
        let text = flattened(list);
        if !text.is_empty() {
            lines.push(format!("{}- {}", "  ".repeat(indent), text));
        }
        return;
    }
    let mut n = 0;
    for item in list.children().filter_map(ElementRef::wrap) {
        if item.value().name() != "li" {
            continue;
        }
        n += 1;
        let marker = if ordered { format!("{n}.") } else { "-".to_string() };
        let text = inline_text(item, depth + 1);
        lines.push(format!("{}{} {}", "  ".repeat(indent), marker, text));
        for nested in item.children().filter_map(ElementRef::wrap) {
            let tag = nested.value().name();
            if tag == "ul" || tag == "ol" {
                list_lines(nested, tag == "ol", indent + 1, depth + 2, lines);
            }
        }
    }
}

fn table_rows(el: ElementRef<'_>, depth: usize, rows: &mut Vec<Vec<String>>) {
    if depth >= MAX_HTML_DEPTH {
        return;
    }
    for child in el.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|c| matches!(c.value().name(), "td" | "th"))
                    .map(|cell| inline_text(cell, depth + 2))
                    .collect(),
            ),
            "thead" | "tbody" | "tfoot" => table_rows(child, depth + 1, rows),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn write_zip(dir: &Path, name: &str, entries: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        for (entry, content) in entries {
            zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn txt_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "a.txt", "line 1\n\nline 2\n");
        assert_eq!(MarkupConverter.convert(&p).unwrap(), "line 1\n\nline 2\n");
    }

    #[test]
    fn tsv_becomes_table() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "t.tsv", "name\tqty\nwidget\t3\ngear|box\t\n");
        assert_eq!(
            MarkupConverter.convert(&p).unwrap(),
            "| name | qty |\n| --- | --- |\n| widget | 3 |\n| gear\\|box |  |"
        );
    }

    #[test]
    fn json_is_pretty_and_fenced() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "c.json", r#"{"a":[1,2]}"#);
        let md = MarkupConverter.convert(&p).unwrap();
        assert!(md.starts_with("```json\n{\n"));
        assert!(md.ends_with("\n```"));

        let bad = write_file(dir.path(), "bad.json", "{not json");
        let err = MarkupConverter.convert(&bad).unwrap_err();
        assert!(matches!(err, MarkifyError::ConversionFailed { .. }));
    }

    #[test]
    fn xml_is_fenced() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "d.xml", "<root><a>1</a></root>\n");
        assert_eq!(
            MarkupConverter.convert(&p).unwrap(),
            "```xml\n<root><a>1</a></root>\n```"
        );
    }

    #[test]
    fn html_structure() {
        let md = html_to_markdown(
            r#"<html><head><title>T</title><style>p{}</style></head><body>
            <h1>Quarterly   report</h1>
            <p>Revenue <strong>grew</strong> see <a href="https://x.org/r">details</a>.</p>
            <ul><li>one</li><li>two<ul><li>two.a</li></ul></li></ul>
            <ol><li>first</li><li>second</li></ol>
            <table><thead><tr><th>k</th><th>v</th></tr></thead>
                   <tbody><tr><td>a</td><td>1</td></tr></tbody></table>
            </body></html>"#,
        );
        let expected = "# Quarterly report\n\n\
            Revenue **grew** see [details](https://x.org/r).\n\n\
            - one\n- two\n  - two.a\n\n\
            1. first\n2. second\n\n\
            | k | v |\n| --- | --- |\n| a | 1 |";
        assert_eq!(md, expected);
    }

    #[test]
    fn html_loose_text_and_images() {
        let md = html_to_markdown("<body><div>Hello <img src=\"a.png\" alt=\"x\"> world</div></body>");
        assert_eq!(md, "Hello ![x](a.png) world");
    }

    #[test]
    fn deeply_nested_html_is_flattened_on_a_small_stack() {
        let depth = 10_000;
        let html = format!(
            "<html><body>{}<p>deep <b>text</b></p>{}<ul><li>tail</li></ul></body></html>",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        // Same stack size as tokio's blocking pool threads.
        let md = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || html_to_markdown(&html))
            .unwrap()
            .join()
            .unwrap();
        assert!(md.contains("deep text"), "{md}");
        assert!(md.ends_with("- tail"), "{md}");
    }

    #[test]
    fn deeply_nested_inline_and_lists_stay_bounded() {
        let depth = 5_000;
        let html = format!(
            "<body><p>{}x{}</p>{}<li>y</li>{}</body>",
            "<span>".repeat(depth),
            "</span>".repeat(depth),
            "<ul><li>".repeat(depth),
            "</li></ul>".repeat(depth)
        );
        let md = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || html_to_markdown(&html))
            .unwrap()
            .join()
            .unwrap();
        assert!(md.starts_with('x'), "{md}");
        assert!(md.contains('y'), "{md}");
    }

    #[test]
    fn docx_headings_paragraphs_tables() {
        let dir = tempfile::tempdir().unwrap();
        let document = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Overview</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Plain </w:t></w:r><w:r><w:t>text &amp; more</w:t></w:r></w:p>
<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>bullet</w:t></w:r></w:p>
<w:tbl>
  <w:tr><w:tc><w:p><w:r><w:t>k</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>v</w:t></w:r></w:p></w:tc></w:tr>
  <w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>1</w:t></w:r></w:p></w:tc></w:tr>
</w:tbl>
</w:body></w:document>"#;
        let p = write_zip(dir.path(), "r.docx", &[("word/document.xml", document)]);
        assert_eq!(
            MarkupConverter.convert(&p).unwrap(),
            "# Overview\n\nPlain text & more\n\n- bullet\n\n| k | v |\n| --- | --- |\n| a | 1 |"
        );
    }

    #[test]
    fn pptx_slides_in_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        let slide = |title: &str, body: &str| {
            format!(
                r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree>
<p:sp><p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>{title}</a:t></a:r></a:p></p:txBody></p:sp>
<p:sp><p:txBody><a:p><a:r><a:t>{body}</a:t></a:r></a:p></p:txBody></p:sp>
</p:spTree></p:cSld></p:sld>"#
            )
        };
        let s2 = slide("Second", "b");
        let s10 = slide("Tenth", "c");
        let s1 = slide("First", "a");
        let p = write_zip(
            dir.path(),
            "deck.pptx",
            &[
                ("ppt/slides/slide2.xml", s2.as_str()),
                ("ppt/slides/slide10.xml", s10.as_str()),
                ("ppt/slides/slide1.xml", s1.as_str()),
                ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
            ],
        );
        assert_eq!(
            MarkupConverter.convert(&p).unwrap(),
            "<!-- Slide number: 1 -->\n# First\n\na\n\n\
             <!-- Slide number: 2 -->\n# Second\n\nb\n\n\
             <!-- Slide number: 10 -->\n# Tenth\n\nc"
        );
    }

    #[test]
    fn epub_follows_spine() {
        let dir = tempfile::tempdir().unwrap();
        let container = r#"<container><rootfiles><rootfile full-path="OEBPS/content.opf"/></rootfiles></container>"#;
        let opf = r#"<package><manifest>
            <item id="c1" href="one.xhtml"/><item id="c2" href="two.xhtml"/>
            </manifest><spine><itemref idref="c2"/><itemref idref="c1"/></spine></package>"#;
        let p = write_zip(
            dir.path(),
            "book.epub",
            &[
                ("META-INF/container.xml", container),
                ("OEBPS/content.opf", opf),
                ("OEBPS/one.xhtml", "<html><body><h1>One</h1></body></html>"),
                ("OEBPS/two.xhtml", "<html><body><h1>Two</h1><p>x</p></body></html>"),
            ],
        );
        assert_eq!(MarkupConverter.convert(&p).unwrap(), "# Two\n\nx\n\n# One");
    }

    #[test]
    fn legacy_ppt_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "old.ppt", "binary");
        let err = MarkupConverter.convert(&p).unwrap_err();
        assert!(err.to_string().contains("ppt"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn corrupt_docx_is_conversion_failure() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "broken.docx", "not a zip");
        assert!(matches!(
            MarkupConverter.convert(&p),
            Err(MarkifyError::ConversionFailed { .. })
        ));
    }

    #[test]
    fn heading_styles() {
        assert_eq!(heading_level("Heading2"), Some(2));
        assert_eq!(heading_level("heading 3"), Some(3));
        assert_eq!(heading_level("Title"), Some(1));
        assert_eq!(heading_level("Heading9"), None);
        assert_eq!(heading_level("Normal"), None);
    }
}
