use std::path::Path;

use anyhow::{Context, Result};

/// Plain-text header prefixes written by the crawler
const TXT_TITLE_PREFIX: &str = "제목: ";
const TXT_URL_PREFIX: &str = "URL: ";
/// Markdown header prefixes
const MD_TITLE_PREFIX: &str = "# ";
const MD_URL_PREFIX: &str = "**URL**:";
/// Plain-text files separate the header from the body with a rule of '='
const TXT_BODY_SEPARATOR: &str =
    "================================================================================";
/// Markdown files carry the crawl timestamp as the last header line
const MD_CRAWLED_AT_PREFIX: &str = "**크롤링 시간**:";

/// A transcript with its header stripped, addressable by 1-indexed line
/// number. Immutable once built.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub title: String,
    pub source_url: String,
    pub body_lines: Vec<String>,
}

impl SourceDocument {
    /// Inclusive 1-indexed slice of the body; out-of-range bounds are clamped
    /// because model-produced ranges occasionally overshoot by a line or two.
    pub fn slice(&self, line_start: usize, line_end: usize) -> &[String] {
        let start = line_start.max(1) - 1;
        let end = line_end.min(self.body_lines.len());
        if start >= end {
            return &[];
        }
        &self.body_lines[start..end]
    }

    pub fn line_count(&self) -> usize {
        self.body_lines.len()
    }
}

/// Load and parse a stored transcript file (plain-text or markdown header)
pub fn load_transcript_file(path: &Path) -> Result<SourceDocument> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    Ok(parse_source_document(&content))
}

/// Split a raw transcript into `(title, url, body)`. Both header styles are
/// detected by prefix; when no recognizable body separator exists the whole
/// content is treated as body rather than failing.
pub fn parse_source_document(content: &str) -> SourceDocument {
    let lines: Vec<&str> = content.lines().collect();

    let title = match lines.first() {
        Some(first) if first.starts_with(MD_TITLE_PREFIX) => {
            first[MD_TITLE_PREFIX.len()..].trim().to_string()
        }
        Some(first) if first.starts_with(TXT_TITLE_PREFIX) => {
            first[TXT_TITLE_PREFIX.len()..].trim().to_string()
        }
        _ => String::new(),
    };

    // The URL sits somewhere in the first few header lines
    let mut source_url = String::new();
    for line in lines.iter().take(10) {
        if let Some(rest) = line.strip_prefix(MD_URL_PREFIX) {
            source_url = rest.trim().to_string();
            break;
        }
        if let Some(rest) = line.strip_prefix(TXT_URL_PREFIX) {
            source_url = rest.trim().to_string();
            break;
        }
    }

    let body = extract_body(content, &lines);
    let body_lines = body.lines().map(|l| l.to_string()).collect();

    SourceDocument {
        title,
        source_url,
        body_lines,
    }
}

fn extract_body<'a>(content: &'a str, lines: &[&str]) -> &'a str {
    if let Some(idx) = content.find(TXT_BODY_SEPARATOR) {
        return content[idx + TXT_BODY_SEPARATOR.len()..].trim_start_matches(['\r', '\n']);
    }

    // Markdown style: body starts after the crawl-timestamp line
    if lines.iter().any(|l| l.starts_with(MD_CRAWLED_AT_PREFIX)) {
        if let Some(idx) = content.find(MD_CRAWLED_AT_PREFIX) {
            let rest = &content[idx..];
            if let Some(newline) = rest.find('\n') {
                return rest[newline + 1..].trim_start_matches(['\r', '\n']);
            }
        }
    }

    content
}

/// Render body lines in the `{line:>4} | {content}` form the mapping prompt
/// expects. Line numbers are 1-indexed to match `AgendaMapping` ranges.
pub fn number_lines(body_lines: &[String]) -> String {
    let mut numbered = String::new();
    for (i, line) in body_lines.iter().enumerate() {
        numbered.push_str(&format!("{:>4} | {}\n", i + 1, line));
    }
    numbered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_txt_header() {
        let content = format!(
            "제목: 제331회 본회의 제2차\nURL: https://example.com/record/1\n{}\n\n○의장 최호정  개의를 선포합니다.\n감사합니다.",
            TXT_BODY_SEPARATOR
        );

        let doc = parse_source_document(&content);

        assert_eq!(doc.title, "제331회 본회의 제2차");
        assert_eq!(doc.source_url, "https://example.com/record/1");
        assert_eq!(doc.body_lines.len(), 2);
        assert!(doc.body_lines[0].starts_with('○'));
    }

    #[test]
    fn test_parse_md_header() {
        let content = "# 제331회 행정자치위원회 제1차\n\n**URL**: https://example.com/record/2\n**크롤링 시간**: 2024-09-10 12:00\n○위원장 김혜영  회의를 시작하겠습니다.";

        let doc = parse_source_document(content);

        assert_eq!(doc.title, "제331회 행정자치위원회 제1차");
        assert_eq!(doc.source_url, "https://example.com/record/2");
        assert_eq!(doc.body_lines.len(), 1);
    }

    #[test]
    fn test_no_separator_is_all_body() {
        let content = "○의장 최호정  산회를 선포합니다.\n(11시 23분)";

        let doc = parse_source_document(content);

        assert!(doc.title.is_empty());
        assert!(doc.source_url.is_empty());
        assert_eq!(doc.body_lines.len(), 2);
    }

    #[test]
    fn test_slice_is_one_indexed_and_clamped() {
        let doc = SourceDocument {
            title: String::new(),
            source_url: String::new(),
            body_lines: vec!["a".into(), "b".into(), "c".into()],
        };

        assert_eq!(doc.slice(1, 2), &["a".to_string(), "b".to_string()][..]);
        assert_eq!(doc.slice(3, 10), &["c".to_string()][..]);
        assert!(doc.slice(5, 6).is_empty());
    }

    #[test]
    fn test_number_lines_format() {
        let lines = vec!["first".to_string(), "second".to_string()];
        let numbered = number_lines(&lines);
        assert_eq!(numbered, "   1 | first\n   2 | second\n");
    }
}
