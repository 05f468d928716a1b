//! Built-in reference scanners.
//!
//! These find specifier mentions in HTML, JS and CSS text. They are
//! positional scanners, not parsers: fast, byte-oriented, tolerant of
//! anything they do not understand. Language transforms proper are
//! plugin territory; the engine only needs to know where the edges are.

pub mod css;
pub mod html;
pub mod js;

pub use css::scan_css;
pub use html::{HtmlScan, InlineRegion, ScanError, scan_html};
pub use js::{JsScan, scan_js};
