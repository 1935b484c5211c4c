//! Built-in PDF writer, the last link of the backend chain.
//!
//! Produces a plain-text A4 document in Helvetica from the invoice HTML. The
//! layout is lost but every word of the invoice is kept, and it cannot fail.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 50;
const FONT_SIZE: u32 = 10;
const LEADING: u32 = 14;
const WRAP_AT: usize = 95;

static HIDDEN_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<head[^>]*>.*?</head>|<style[^>]*>.*?</style>|<script[^>]*>.*?</script>").expect("Invalid regex")
});
static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|tr|li|h[1-6]|table|thead|tbody)\s*>").expect("Invalid regex")
});
static CELL_BREAKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</t[dh]\s*>").expect("Invalid regex"));
static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r]+").expect("Invalid regex"));

/// Reduce HTML to readable lines of text.
pub fn html_to_text(html: &str) -> Vec<String> {
    let text = HIDDEN_BLOCKS.replace_all(html, "");
    let text = TAGS.replace_all(&CELL_BREAKS.replace_all(&LINE_BREAKS.replace_all(&text, "\n"), "   "), "").into_owned();
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&#x2F;", "/")
        .replace("&amp;", "&");

    let mut lines = Vec::new();
    for raw in text.lines() {
        let line = SPACES.replace_all(raw.trim(), " ").into_owned();
        if line.is_empty() && lines.last().map_or(true, String::is_empty) {
            continue;
        }
        lines.extend(wrap(&line, WRAP_AT));
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.chars().count() <= width {
        return vec![line.to_string()];
    }
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split(' ') {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Encode a line as a PDF literal string in WinAnsi.
fn pdf_string(line: &str) -> Vec<u8> {
    let mut out = vec![b'('];
    for c in line.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            '→' => out.extend_from_slice(b"->"),
            '€' => out.push(0x80),
            c if (c as u32) < 0x20 => out.push(b' '),
            c if (c as u32) < 0x7f || (0xa0..=0xff).contains(&(c as u32)) => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out.push(b')');
    out
}

fn content_stream(lines: &[String]) -> Vec<u8> {
    let mut stream = Vec::new();
    let _ = write!(
        Text(&mut stream),
        "BT\n/F1 {FONT_SIZE} Tf\n{LEADING} TL\n{MARGIN} {} Td\n",
        PAGE_HEIGHT - MARGIN
    );
    for line in lines {
        stream.extend(pdf_string(line));
        stream.extend_from_slice(b" Tj T*\n");
    }
    stream.extend_from_slice(b"ET\n");
    stream
}

struct Text<'a>(&'a mut Vec<u8>);

impl std::fmt::Write for Text<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

/// Write `lines` into a complete PDF document, paginating as needed.
pub fn write_pdf(lines: &[String]) -> Vec<u8> {
    let per_page = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;
    let pages: Vec<&[String]> = if lines.is_empty() { vec![&[]] } else { lines.chunks(per_page).collect() };

    // 1 catalog, 2 page tree, 3 font, then a page and a content stream per page.
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + 2 * i).collect();
    let mut objects: Vec<Vec<u8>> = Vec::with_capacity(3 + 2 * pages.len());
    objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
    let kids = page_ids.iter().map(|id| format!("{id} 0 R")).collect::<Vec<_>>().join(" ");
    objects.push(format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()).into_bytes());
    objects.push(b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_vec());
    for (page, id) in pages.iter().zip(&page_ids) {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            id + 1
        ).into_bytes());
        let stream = content_stream(page);
        let mut obj = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
        obj.extend(stream);
        obj.extend_from_slice(b"endstream");
        objects.push(obj);
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend(format!("{} 0 obj\n", i + 1).into_bytes());
        pdf.extend_from_slice(body);
        pdf.extend_from_slice(b"\nendobj\n");
    }
    let xref_at = pdf.len();
    pdf.extend(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).into_bytes());
    for offset in offsets {
        pdf.extend(format!("{offset:010} 00000 n \n").into_bytes());
    }
    pdf.extend(format!("trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n", objects.len() + 1).into_bytes());
    pdf
}

/// Render HTML to a PDF without any external tool.
pub fn render(html: &str) -> Vec<u8> { write_pdf(&html_to_text(html)) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_framing() {
        let pdf = render("<h1>Invoice</h1><p>Total: 12.34 EUR</p>");
        assert!(pdf.starts_with(b"%PDF-"));
        assert!(pdf.ends_with(b"%%EOF\n"));
        let text = String::from_utf8_lossy(&pdf);
        assert!(text.contains("(Invoice) Tj"));
        assert!(text.contains("(Total: 12.34 EUR) Tj"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let pdf = render("<p>one</p><p>two</p>");
        let text = String::from_utf8_lossy(&pdf).into_owned();
        let xref = text.find("xref\n").unwrap();
        let startxref: usize = text.rsplit("startxref\n").next().unwrap().lines().next().unwrap().parse().unwrap();
        assert_eq!(startxref, xref);
        for (i, entry) in text[xref..].lines().skip(3).take_while(|l| l.ends_with(" n ")).enumerate() {
            let offset: usize = entry[..10].parse().unwrap();
            assert!(text[offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn test_text_extraction() {
        let html = "<html><head><style>body { color: red; }</style></head><body>\
            <p>Ada &amp; Co<br>Paris</p><table><tr><td>Belt</td><td>2</td></tr></table></body></html>";
        assert_eq!(html_to_text(html), vec!["Ada & Co", "Paris", "Belt 2"]);
    }

    #[test]
    fn test_long_documents_paginate() {
        let html: String = (0..200).map(|i| format!("<p>line {i}</p>")).collect();
        let text = String::from_utf8_lossy(&render(&html)).into_owned();
        assert!(text.contains("/Count 4"));
    }

    #[test]
    fn test_special_characters_are_escaped() {
        assert_eq!(pdf_string("a (b) \\ Unpaid → Paid"), b"(a \\(b\\) \\\\ Unpaid -> Paid)".to_vec());
    }

    #[test]
    fn test_wrap_long_lines() {
        let line = "word ".repeat(40);
        let wrapped = wrap(line.trim(), 20);
        assert!(wrapped.iter().all(|l| l.chars().count() <= 20));
        assert_eq!(wrapped.join(" "), line.trim());
    }
}
