//! CSS scanner: `url()` tokens and `@import` rules.

use memchr::memmem;

use galley_graph::{AssetType, LineIndex, Mention, ReferenceKind};

/// Scans a stylesheet for external references. `data:` URLs and empty
/// specifiers are skipped; everything else becomes a mention.
pub fn scan_css(source: &str) -> Vec<Mention> {
    let index = LineIndex::new(source);
    let bytes = source.as_bytes();
    let mut mentions = Vec::new();

    let url_finder = memmem::Finder::new(b"url(");
    let mut at = 0;
    while let Some(found) = url_finder.find(&bytes[at..]) {
        let start = at + found;
        at = start + 4;
        if start > 0 && is_ident_byte(bytes[start - 1]) {
            continue;
        }
        let Some((specifier, offset, end)) = read_url_argument(source, at) else {
            continue;
        };
        at = end;
        if skip_specifier(specifier) {
            continue;
        }
        // `@import url(...)` pulls in a stylesheet, a bare `url(...)` an
        // arbitrary resource
        let kind = if preceded_by_import(bytes, start) {
            ReferenceKind::CssImport
        } else {
            ReferenceKind::CssUrl
        };
        let mut mention = Mention::new(kind, specifier, index.position_of(offset));
        if kind == ReferenceKind::CssImport {
            mention = mention.expected_type(AssetType::Css);
        }
        mentions.push(mention);
    }

    // `@import "x.css"` without url()
    let import_finder = memmem::Finder::new(b"@import");
    let mut at = 0;
    while let Some(found) = import_finder.find(&bytes[at..]) {
        let start = at + found;
        at = start + 7;
        let rest = &bytes[at..];
        let skip = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
        let value_at = at + skip;
        let Some(&quote) = bytes.get(value_at) else { break };
        if quote != b'"' && quote != b'\'' {
            continue;
        }
        let Some(close) = memchr::memchr(quote, &bytes[value_at + 1..]) else {
            continue;
        };
        let specifier = &source[value_at + 1..value_at + 1 + close];
        at = value_at + 1 + close;
        if skip_specifier(specifier) {
            continue;
        }
        mentions.push(
            Mention::new(
                ReferenceKind::CssImport,
                specifier,
                index.position_of(value_at + 1),
            )
            .expected_type(AssetType::Css),
        );
    }

    mentions.sort_by_key(|m| (m.position.line, m.position.column));
    mentions
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn skip_specifier(specifier: &str) -> bool {
    specifier.is_empty()
        || specifier.starts_with("data:")
        || specifier.starts_with('#')
        || specifier.starts_with("http://")
        || specifier.starts_with("https://")
}

/// Reads the argument of `url(`, with or without quotes. Returns the
/// specifier, the byte offset of its first character, and the offset
/// just past the closing parenthesis.
fn read_url_argument(source: &str, after_paren: usize) -> Option<(&str, usize, usize)> {
    let bytes = source.as_bytes();
    let mut at = after_paren;
    while bytes.get(at).is_some_and(|b| b.is_ascii_whitespace()) {
        at += 1;
    }
    match bytes.get(at)? {
        quote @ (b'"' | b'\'') => {
            let close = at + 1 + memchr::memchr(*quote, &bytes[at + 1..])?;
            let end = at + 1 + memchr::memchr(b')', &bytes[at + 1..])?;
            Some((&source[at + 1..close], at + 1, end + 1))
        }
        _ => {
            let close = at + memchr::memchr(b')', &bytes[at..])?;
            Some((source[at..close].trim_end(), at, close + 1))
        }
    }
}

fn preceded_by_import(bytes: &[u8], url_start: usize) -> bool {
    let line_start = bytes[..url_start]
        .iter()
        .rposition(|&b| b == b'\n' || b == b';' || b == b'}')
        .map(|p| p + 1)
        .unwrap_or(0);
    memmem::find(&bytes[line_start..url_start], b"@import").is_some()
}
