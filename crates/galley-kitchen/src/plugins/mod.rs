//! Built-in plugins: the default pipeline stack.
//!
//! `fs` resolves and loads `file:` URLs; `html`, `css` and `js` walk
//! content for references and virtualize inline regions. User plugins
//! registered before these win `resolve`/`load`; registered after, they
//! see the scanners' output.

mod css;
mod fs;
mod html;
mod js;

pub use css::CssPlugin;
pub use fs::FileSystemPlugin;
pub use html::HtmlPlugin;
pub use js::JsPlugin;

use crate::plugin::SharedPlugin;

/// The default stack, in pipeline order.
pub fn builtin_plugins() -> Vec<SharedPlugin> {
    vec![
        std::sync::Arc::new(FileSystemPlugin::new()),
        std::sync::Arc::new(HtmlPlugin::new()),
        std::sync::Arc::new(CssPlugin::new()),
        std::sync::Arc::new(JsPlugin::new()),
    ]
}
