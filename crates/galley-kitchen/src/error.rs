//! Error taxonomy for cooking and the kitchen at large.
//!
//! `CookError` is the per-URL failure: it aborts only the cook of the
//! offending URL and bubbles to whoever awaited it, carrying the trace
//! of the reference that caused the URL to be cooked. It is `Clone` so
//! every waiter on a shared in-flight cook can hold the same failure.

use galley_graph::{AssetUrl, LineIndex, Position, SourceMapError, UrlError};
use thiserror::Error;

/// What went wrong while cooking one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CookErrorKind {
    /// No plugin resolved a specifier. Fatal for the reference.
    ResolutionFailed,
    /// Content could not be found (404-class).
    LoadNotFound,
    /// Content exists but may not be served, e.g. a directory (403-class).
    LoadForbidden,
    /// A transform hook failed to parse content.
    ParseError,
    /// The compile-cache lock was held too long. Not retried.
    CacheLockTimeout,
    /// Cancellation was observed.
    Aborted,
    /// A plugin hook failed for a reason of its own.
    Plugin,
}

impl CookErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolutionFailed => "RESOLUTION_FAILED",
            Self::LoadNotFound => "LOAD_NOT_FOUND",
            Self::LoadForbidden => "LOAD_FORBIDDEN",
            Self::ParseError => "PARSE_ERROR",
            Self::CacheLockTimeout => "CACHE_LOCK_TIMEOUT",
            Self::Aborted => "ABORTED",
            Self::Plugin => "PLUGIN_ERROR",
        }
    }

    /// HTTP status an HTTP-facing caller should map this to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::LoadNotFound => 404,
            Self::LoadForbidden => 403,
            _ => 500,
        }
    }
}

/// Failure of one URL's cook, with the reference trace attached.
#[derive(Debug, Clone)]
pub struct CookError {
    pub kind: CookErrorKind,
    pub message: String,
    /// URL whose cook failed, when known.
    pub url: Option<AssetUrl>,
    /// Specifier as written, for resolution failures.
    pub specifier: Option<String>,
    /// `parent:line:column` of the reference that pulled the URL in.
    pub trace: Option<String>,
    /// Position inside the failing content, for parse errors.
    pub position: Option<Position>,
    /// Rendered source context, for parse errors.
    pub code_frame: Option<String>,
}

impl CookError {
    fn new(kind: CookErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            url: None,
            specifier: None,
            trace: None,
            position: None,
            code_frame: None,
        }
    }

    pub fn resolution_failed(specifier: impl Into<String>) -> Self {
        let specifier = specifier.into();
        let mut err = Self::new(
            CookErrorKind::ResolutionFailed,
            format!("no plugin resolved {specifier:?}"),
        );
        err.specifier = Some(specifier);
        err
    }

    pub fn load_not_found(url: AssetUrl) -> Self {
        let mut err = Self::new(CookErrorKind::LoadNotFound, format!("{url} not found"));
        err.url = Some(url);
        err
    }

    pub fn load_forbidden(url: AssetUrl, reason: impl Into<String>) -> Self {
        let mut err = Self::new(CookErrorKind::LoadForbidden, reason);
        err.url = Some(url);
        err
    }

    /// Parse failure at a position, with a code frame rendered from the
    /// content being parsed.
    pub fn parse_error(
        url: AssetUrl,
        message: impl Into<String>,
        position: Position,
        source: &str,
    ) -> Self {
        let mut err = Self::new(CookErrorKind::ParseError, message);
        err.code_frame = Some(code_frame(source, position));
        err.url = Some(url);
        err.position = Some(position);
        err
    }

    pub fn cache_lock_timeout(artifact: impl Into<String>) -> Self {
        Self::new(
            CookErrorKind::CacheLockTimeout,
            format!("compile lock not acquired in time for {}", artifact.into()),
        )
    }

    pub fn aborted() -> Self {
        Self::new(CookErrorKind::Aborted, "operation cancelled")
    }

    pub fn plugin(plugin_name: &str, message: impl Into<String>) -> Self {
        Self::new(
            CookErrorKind::Plugin,
            format!("plugin {plugin_name}: {}", message.into()),
        )
    }

    /// Attaches the trace of the reference that caused this cook, unless
    /// a deeper trace is already set.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        if self.trace.is_none() {
            self.trace = Some(trace.into());
        }
        self
    }

    pub fn with_url(mut self, url: AssetUrl) -> Self {
        if self.url.is_none() {
            self.url = Some(url);
        }
        self
    }
}

impl std::fmt::Display for CookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;
        if let Some(trace) = &self.trace {
            write!(f, " (referenced from {trace})")?;
        }
        if let Some(frame) = &self.code_frame {
            write!(f, "\n{frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CookError {}

/// Result alias used by plugin hooks and the cook pipeline.
pub type CookResult<T> = std::result::Result<T, CookError>;

/// Renders a few lines of source context with a caret under the column.
///
/// ```text
///   9 | <div>
///  10 |   <script type=module">
///     |                ^
///  11 | </div>
/// ```
pub fn code_frame(source: &str, position: Position) -> String {
    const CONTEXT: u32 = 2;
    let index = LineIndex::new(source);
    let first = position.line.saturating_sub(CONTEXT);
    let last = (position.line + CONTEXT).min(index.line_count().saturating_sub(1) as u32);
    let gutter = (last + 1).to_string().len();

    let mut out = String::new();
    for line in first..=last {
        let Some((start, end)) = index.line_span(line as usize, source.len()) else {
            break;
        };
        let text = &source[start..end];
        out.push_str(&format!("{:>gutter$} | {}\n", line + 1, text));
        if line == position.line {
            let caret_col = (position.column as usize).min(text.len());
            out.push_str(&format!(
                "{:>gutter$} | {}^\n",
                "",
                " ".repeat(caret_col)
            ));
        }
    }
    out
}

/// Errors of the kitchen outside one URL's cook: setup, persistence,
/// build-driver failures.
#[derive(Debug, Error)]
pub enum KitchenError {
    #[error(transparent)]
    Cook(#[from] CookError),

    #[error(transparent)]
    Url(#[from] UrlError),

    #[error(transparent)]
    SourceMap(#[from] SourceMapError),

    #[error("cache I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no entry points to build")]
    NoEntryPoints,
}

/// Result alias for kitchen-level operations.
pub type Result<T> = std::result::Result<T, KitchenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_trace() {
        let err = CookError::resolution_failed("#wat")
            .with_trace("file:///src/main.html:3:12");
        let text = err.to_string();
        assert!(text.starts_with("RESOLUTION_FAILED"), "{text}");
        assert!(text.contains("referenced from file:///src/main.html:3:12"));
    }

    #[test]
    fn test_with_trace_keeps_deepest() {
        let err = CookError::load_not_found(AssetUrl::parse("file:///a.js").unwrap())
            .with_trace("deep")
            .with_trace("shallow");
        assert_eq!(err.trace.as_deref(), Some("deep"));
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(CookErrorKind::LoadNotFound.http_status(), 404);
        assert_eq!(CookErrorKind::LoadForbidden.http_status(), 403);
        assert_eq!(CookErrorKind::ParseError.http_status(), 500);
    }

    #[test]
    fn test_code_frame_caret_lands_on_column() {
        let source = "line one\nline two\nline three\n";
        let frame = code_frame(source, Position::new(1, 5));
        assert!(frame.contains("2 | line two"), "{frame}");
        let caret_line = frame
            .lines()
            .find(|line| line.contains('^'))
            .expect("caret line");
        assert_eq!(caret_line.chars().filter(|&c| c == '^').count(), 1);
        assert!(frame.contains("1 | line one"));
        assert!(frame.contains("3 | line three"));
    }
}
