//! Source map v3 model, mappings codec and composition.
//!
//! Transform hooks each return a map from their output to their input.
//! [`SourceMap::compose`] folds a chain of those into one map whose
//! original positions always point at the source that was loaded,
//! however many plugins rewrote the content in between.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("invalid base64 vlq character {0:?}")]
    InvalidCharacter(char),

    #[error("truncated vlq value")]
    Truncated,

    #[error("invalid mapping segment with {0} fields")]
    BadSegmentLength(usize),

    #[error("mapping field out of range")]
    OutOfRange,

    #[error("invalid sourcemap json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A source map, v3 wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMap {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(
        rename = "sourcesContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sources_content: Option<Vec<Option<String>>>,

    #[serde(default)]
    pub names: Vec<String>,

    #[serde(default)]
    pub mappings: String,
}

fn default_version() -> u32 {
    3
}

impl Default for SourceMap {
    fn default() -> Self {
        Self {
            version: 3,
            file: None,
            sources: Vec::new(),
            sources_content: None,
            names: Vec::new(),
            mappings: String::new(),
        }
    }
}

impl SourceMap {
    /// A map over a single source file with its content embedded.
    pub fn for_source(source_url: impl Into<String>, content: Option<String>) -> Self {
        Self {
            sources: vec![source_url.into()],
            sources_content: content.map(|text| vec![Some(text)]),
            ..Default::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SourceMapError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_string(&self) -> Result<String, SourceMapError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Composes `self` (newest map, output → intermediate) over `previous`
    /// (intermediate → original), producing output → original.
    ///
    /// Segments whose intermediate position has no mapping in `previous`
    /// lose their source attribution rather than pointing at the wrong
    /// file. `names` resolve against `previous`.
    pub fn compose(&self, previous: &SourceMap) -> Result<SourceMap, SourceMapError> {
        if previous.mappings.is_empty() || previous.sources.is_empty() {
            return Ok(self.clone());
        }
        if self.mappings.is_empty() {
            return Ok(self.clone());
        }

        let prev_lines = decode_mappings(&previous.mappings)?;
        let new_lines = decode_mappings(&self.mappings)?;

        let mut out_lines: Vec<Vec<Segment>> = Vec::with_capacity(new_lines.len());
        for segments in &new_lines {
            let mut out = Vec::with_capacity(segments.len());
            for seg in segments {
                let source = seg
                    .source
                    .as_ref()
                    .and_then(|sref| lookup(&prev_lines, sref.line, sref.column))
                    .cloned();
                out.push(Segment {
                    generated_column: seg.generated_column,
                    source,
                });
            }
            out_lines.push(out);
        }

        Ok(SourceMap {
            version: 3,
            file: self.file.clone(),
            sources: previous.sources.clone(),
            sources_content: previous.sources_content.clone(),
            names: previous.names.clone(),
            mappings: encode_mappings(&out_lines),
        })
    }
}

/// One decoded mapping segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub source: Option<SourceRef>,
}

/// The original-position half of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub source_index: u32,
    pub line: u32,
    pub column: u32,
    pub name_index: Option<u32>,
}

/// Last segment of `line` starting at or before `column`, if it carries
/// a source attribution.
fn lookup(lines: &[Vec<Segment>], line: u32, column: u32) -> Option<&SourceRef> {
    let segments = lines.get(line as usize)?;
    let idx = segments.partition_point(|seg| seg.generated_column <= column);
    if idx == 0 {
        return None;
    }
    segments[idx - 1].source.as_ref()
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_value(ch: u8) -> Result<i64, SourceMapError> {
    match ch {
        b'A'..=b'Z' => Ok((ch - b'A') as i64),
        b'a'..=b'z' => Ok((ch - b'a') as i64 + 26),
        b'0'..=b'9' => Ok((ch - b'0') as i64 + 52),
        b'+' => Ok(62),
        b'/' => Ok(63),
        other => Err(SourceMapError::InvalidCharacter(other as char)),
    }
}

fn decode_vlq(bytes: &[u8], cursor: &mut usize) -> Result<i64, SourceMapError> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;
    loop {
        let ch = *bytes.get(*cursor).ok_or(SourceMapError::Truncated)?;
        *cursor += 1;
        let digit = base64_value(ch)?;
        result += (digit & 31) << shift;
        shift += 5;
        if digit & 32 == 0 {
            break;
        }
    }
    let negative = result & 1 == 1;
    result >>= 1;
    Ok(if negative { -result } else { result })
}

fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq: i64 = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = (vlq & 31) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 32;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Decodes a `mappings` string into per-line segments. State for source
/// index, original line/column and name index persists across lines;
/// the generated column resets on every line, per the format.
pub fn decode_mappings(mappings: &str) -> Result<Vec<Vec<Segment>>, SourceMapError> {
    let mut lines = Vec::new();
    let mut src_idx: i64 = 0;
    let mut src_line: i64 = 0;
    let mut src_col: i64 = 0;
    let mut name_idx: i64 = 0;

    for line in mappings.split(';') {
        let mut segments = Vec::new();
        let mut gen_col: i64 = 0;
        for raw in line.split(',') {
            if raw.is_empty() {
                continue;
            }
            let bytes = raw.as_bytes();
            let mut cursor = 0;
            let mut fields = [0i64; 5];
            let mut count = 0;
            while cursor < bytes.len() {
                if count == 5 {
                    return Err(SourceMapError::BadSegmentLength(6));
                }
                fields[count] = decode_vlq(bytes, &mut cursor)?;
                count += 1;
            }
            if count != 1 && count != 4 && count != 5 {
                return Err(SourceMapError::BadSegmentLength(count));
            }

            gen_col += fields[0];
            let source = if count >= 4 {
                src_idx += fields[1];
                src_line += fields[2];
                src_col += fields[3];
                let name_index = if count == 5 {
                    name_idx += fields[4];
                    Some(checked_u32(name_idx)?)
                } else {
                    None
                };
                Some(SourceRef {
                    source_index: checked_u32(src_idx)?,
                    line: checked_u32(src_line)?,
                    column: checked_u32(src_col)?,
                    name_index,
                })
            } else {
                None
            };
            segments.push(Segment {
                generated_column: checked_u32(gen_col)?,
                source,
            });
        }
        lines.push(segments);
    }
    Ok(lines)
}

/// Encodes per-line segments back into a `mappings` string. Segments must
/// be ordered by generated column within each line.
pub fn encode_mappings(lines: &[Vec<Segment>]) -> String {
    let mut out = String::new();
    let mut src_idx: i64 = 0;
    let mut src_line: i64 = 0;
    let mut src_col: i64 = 0;
    let mut name_idx: i64 = 0;

    for (line_no, segments) in lines.iter().enumerate() {
        if line_no > 0 {
            out.push(';');
        }
        let mut gen_col: i64 = 0;
        for (seg_no, seg) in segments.iter().enumerate() {
            if seg_no > 0 {
                out.push(',');
            }
            encode_vlq(seg.generated_column as i64 - gen_col, &mut out);
            gen_col = seg.generated_column as i64;
            if let Some(sref) = &seg.source {
                encode_vlq(sref.source_index as i64 - src_idx, &mut out);
                src_idx = sref.source_index as i64;
                encode_vlq(sref.line as i64 - src_line, &mut out);
                src_line = sref.line as i64;
                encode_vlq(sref.column as i64 - src_col, &mut out);
                src_col = sref.column as i64;
                if let Some(name) = sref.name_index {
                    encode_vlq(name as i64 - name_idx, &mut out);
                    name_idx = name as i64;
                }
            }
        }
    }
    out
}

fn checked_u32(value: i64) -> Result<u32, SourceMapError> {
    u32::try_from(value).map_err(|_| SourceMapError::OutOfRange)
}
