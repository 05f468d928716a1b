//! HTML scanner: external references and inlineable regions.
//!
//! A pointer-advancing pass over the byte stream. Only the elements the
//! pipeline cares about are recognized (`<script>`, `<style>`, `<link>`,
//! `<img>`); everything else, comments included, is skipped verbatim.

use memchr::{memchr, memmem};

use galley_graph::{AssetType, LineIndex, Mention, Position, ReferenceKind};

use crate::inline::InlineTag;

/// Scanner failure with the byte offset it happened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub message: String,
    pub offset: usize,
}

impl ScanError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// One inline `<style>`/`<script>` body found in a document.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineRegion {
    pub tag: InlineTag,
    /// Byte span of the whole element, `<` through closing tag.
    pub element_span: (usize, usize),
    pub content: String,
    /// Position of the content start, for the synthetic node's trace.
    pub position: Position,
}

/// Everything one pass over a document found.
#[derive(Debug, Clone, Default)]
pub struct HtmlScan {
    pub mentions: Vec<Mention>,
    pub inline_regions: Vec<InlineRegion>,
}

/// One parsed attribute: name, value, byte offset of the value.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute {
    name: String,
    value: String,
    value_offset: usize,
}

pub fn scan_html(source: &str) -> Result<HtmlScan, ScanError> {
    let bytes = source.as_bytes();
    let index = LineIndex::new(source);
    let mut scan = HtmlScan::default();
    let mut pointer = 0;

    while let Some(rel) = memchr(b'<', &bytes[pointer..]) {
        let tag_start = pointer + rel;
        pointer = tag_start + 1;

        if bytes[pointer..].starts_with(b"!--") {
            pointer = match memmem::find(&bytes[pointer..], b"-->") {
                Some(end) => pointer + end + 3,
                None => bytes.len(),
            };
            continue;
        }

        let Some(name) = element_name(bytes, pointer) else {
            continue;
        };
        if !matches!(name, "script" | "style" | "link" | "img") {
            continue;
        }
        pointer += name.len();

        let Some(open_end) = find_closing_angle(bytes, pointer) else {
            return Err(ScanError::new(format!("unclosed <{name}> tag"), tag_start));
        };
        let attrs = parse_attributes(source, pointer, open_end);
        let self_closing = open_end > pointer && bytes[open_end - 1] == b'/';
        pointer = open_end + 1;

        match name {
            "script" => {
                let type_attr = attr_value(&attrs, "type");
                // importmaps stay physically inline, the browser needs them
                // before any module resolution happens
                if type_attr == Some("importmap") {
                    if !self_closing {
                        pointer = skip_to_closing(bytes, pointer, b"</script>")
                            .ok_or_else(|| ScanError::new("unclosed <script>", tag_start))?;
                    }
                    continue;
                }
                let is_module = type_attr == Some("module");
                let expected = if is_module {
                    AssetType::JsModule
                } else {
                    AssetType::JsClassic
                };
                if let Some(src) = attrs.iter().find(|attr| attr.name == "src") {
                    let mention = Mention::new(
                        ReferenceKind::ScriptSrc,
                        src.value.clone(),
                        index.position_of(src.value_offset),
                    )
                    .expected_type(expected);
                    scan.mentions.push(mention);
                    if !self_closing {
                        pointer = skip_to_closing(bytes, pointer, b"</script>")
                            .ok_or_else(|| ScanError::new("unclosed <script>", tag_start))?;
                    }
                } else if !self_closing {
                    let content_start = pointer;
                    let content_end = memmem::find(&bytes[pointer..], b"</script>")
                        .map(|end| pointer + end)
                        .ok_or_else(|| ScanError::new("unclosed <script>", tag_start))?;
                    pointer = content_end + "</script>".len();
                    scan.inline_regions.push(InlineRegion {
                        tag: InlineTag::Script { is_module },
                        element_span: (tag_start, pointer),
                        content: source[content_start..content_end].to_string(),
                        position: index.position_of(content_start),
                    });
                }
            }
            "style" => {
                if self_closing {
                    continue;
                }
                let content_start = pointer;
                let content_end = memmem::find(&bytes[pointer..], b"</style>")
                    .map(|end| pointer + end)
                    .ok_or_else(|| ScanError::new("unclosed <style>", tag_start))?;
                pointer = content_end + "</style>".len();
                scan.inline_regions.push(InlineRegion {
                    tag: InlineTag::Style,
                    element_span: (tag_start, pointer),
                    content: source[content_start..content_end].to_string(),
                    position: index.position_of(content_start),
                });
            }
            "link" => {
                let Some(href) = attrs.iter().find(|attr| attr.name == "href") else {
                    continue;
                };
                let rel = attr_value(&attrs, "rel").unwrap_or("");
                let mut mention = Mention::new(
                    ReferenceKind::LinkHref,
                    href.value.clone(),
                    index.position_of(href.value_offset),
                )
                .subtype(rel);
                if rel == "stylesheet" {
                    mention = mention.expected_type(AssetType::Css);
                }
                scan.mentions.push(mention);
            }
            "img" => {
                if let Some(src) = attrs.iter().find(|attr| attr.name == "src") {
                    scan.mentions.push(Mention::new(
                        ReferenceKind::ImgSrc,
                        src.value.clone(),
                        index.position_of(src.value_offset),
                    ));
                }
            }
            _ => unreachable!(),
        }
    }

    Ok(scan)
}

/// The element name right after `<`, lowercase letters only, followed by
/// a tag-name boundary.
fn element_name(bytes: &[u8], start: usize) -> Option<&'static str> {
    for candidate in ["script", "style", "link", "img"] {
        if bytes[start..]
            .get(..candidate.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(candidate.as_bytes()))
        {
            let boundary = bytes.get(start + candidate.len());
            if matches!(boundary, None | Some(b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/')) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Closing `>` of an opening tag, quote-aware.
fn find_closing_angle(bytes: &[u8], start: usize) -> Option<usize> {
    let mut in_quote = 0u8;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        match byte {
            b'"' | b'\'' => {
                if in_quote == 0 {
                    in_quote = byte;
                } else if byte == in_quote {
                    in_quote = 0;
                }
            }
            b'>' if in_quote == 0 => return Some(start + offset),
            _ => {}
        }
    }
    None
}

fn skip_to_closing(bytes: &[u8], start: usize, closing: &[u8]) -> Option<usize> {
    memmem::find(&bytes[start..], closing).map(|pos| start + pos + closing.len())
}

/// Attributes between the tag name and the closing `>`. Quoted and
/// unquoted values both handled; bare attributes get an empty value.
fn parse_attributes(source: &str, start: usize, end: usize) -> Vec<Attribute> {
    let bytes = source.as_bytes();
    let mut attrs = Vec::new();
    let mut cursor = start;

    while cursor < end {
        while cursor < end && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= end || bytes[cursor] == b'/' {
            break;
        }

        let name_start = cursor;
        while cursor < end && !bytes[cursor].is_ascii_whitespace() && bytes[cursor] != b'=' {
            cursor += 1;
        }
        let name = source[name_start..cursor].to_ascii_lowercase();

        while cursor < end && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= end || bytes[cursor] != b'=' {
            attrs.push(Attribute {
                name,
                value: String::new(),
                value_offset: name_start,
            });
            continue;
        }
        cursor += 1;
        while cursor < end && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }

        if cursor < end && (bytes[cursor] == b'"' || bytes[cursor] == b'\'') {
            let quote = bytes[cursor];
            cursor += 1;
            let value_start = cursor;
            while cursor < end && bytes[cursor] != quote {
                cursor += 1;
            }
            attrs.push(Attribute {
                name,
                value: source[value_start..cursor].to_string(),
                value_offset: value_start,
            });
            cursor += 1;
        } else {
            let value_start = cursor;
            while cursor < end && !bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            attrs.push(Attribute {
                name,
                value: source[value_start..cursor].to_string(),
                value_offset: value_start,
            });
        }
    }

    attrs
}

fn attr_value<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|attr| attr.name == name)
        .map(|attr| attr.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_references() {
        let html = r#"<!doctype html>
<html>
  <head>
    <link rel="stylesheet" href="./main.css">
    <link rel="icon" href="/favicon.ico">
  </head>
  <body>
    <img src="./logo.png" alt="logo">
    <script type="module" src="./app.js"></script>
    <script src="./legacy.js"></script>
  </body>
</html>"#;
        let scan = scan_html(html).unwrap();
        assert!(scan.inline_regions.is_empty());

        let specs: Vec<_> = scan
            .mentions
            .iter()
            .map(|m| (m.kind, m.specifier.as_str()))
            .collect();
        assert_eq!(
            specs,
            vec![
                (ReferenceKind::LinkHref, "./main.css"),
                (ReferenceKind::LinkHref, "/favicon.ico"),
                (ReferenceKind::ImgSrc, "./logo.png"),
                (ReferenceKind::ScriptSrc, "./app.js"),
                (ReferenceKind::ScriptSrc, "./legacy.js"),
            ]
        );

        assert_eq!(scan.mentions[0].expected_type, Some(AssetType::Css));
        assert_eq!(scan.mentions[0].subtype.as_deref(), Some("stylesheet"));
        assert_eq!(scan.mentions[3].expected_type, Some(AssetType::JsModule));
        assert_eq!(scan.mentions[4].expected_type, Some(AssetType::JsClassic));
        // positions point at the attribute values
        assert_eq!(scan.mentions[0].position, Position::new(3, 33));
    }

    #[test]
    fn test_inline_regions() {
        let html = "<style>body { color: red }</style>\n<script>console.log(1)</script>\n<script type=\"module\">import './x.js'</script>";
        let scan = scan_html(html).unwrap();
        assert_eq!(scan.inline_regions.len(), 3);

        assert_eq!(scan.inline_regions[0].tag, InlineTag::Style);
        assert_eq!(scan.inline_regions[0].content, "body { color: red }");
        assert_eq!(scan.inline_regions[0].element_span.0, 0);

        assert_eq!(
            scan.inline_regions[1].tag,
            InlineTag::Script { is_module: false }
        );
        assert_eq!(
            scan.inline_regions[2].tag,
            InlineTag::Script { is_module: true }
        );
    }

    #[test]
    fn test_importmap_is_not_virtualized() {
        let html = r#"<script type="importmap">{"imports":{}}</script>"#;
        let scan = scan_html(html).unwrap();
        assert!(scan.inline_regions.is_empty());
        assert!(scan.mentions.is_empty());
    }

    #[test]
    fn test_comments_are_skipped() {
        let html = "<!-- <script src=\"./ghost.js\"></script> -->\n<img src=\"./real.png\">";
        let scan = scan_html(html).unwrap();
        assert_eq!(scan.mentions.len(), 1);
        assert_eq!(scan.mentions[0].specifier, "./real.png");
    }

    #[test]
    fn test_quoted_angle_in_attribute() {
        let html = r#"<img src="./a.png" alt="1 > 0">"#;
        let scan = scan_html(html).unwrap();
        assert_eq!(scan.mentions.len(), 1);
        assert_eq!(scan.mentions[0].specifier, "./a.png");
    }

    #[test]
    fn test_unclosed_script_is_an_error() {
        let err = scan_html("<script>let x = 1").unwrap_err();
        assert!(err.message.contains("unclosed"));
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_unknown_elements_ignored() {
        let html = "<scripting src=\"nope\"></scripting><div><p>text</p></div>";
        let scan = scan_html(html).unwrap();
        assert!(scan.mentions.is_empty());
        assert!(scan.inline_regions.is_empty());
    }
}
