//! JS scanner: import/export specifiers, `new URL`, workers, hot markers.
//!
//! Regex-based mention scanning over source text. This deliberately does
//! not parse JavaScript; a language-transform plugin that does can
//! register richer references through the same context API and they
//! will be deduplicated by position.

use once_cell::sync::Lazy;
use regex::Regex;

use galley_graph::{
    AssetSubtype, AssetType, HotPolicy, LineIndex, Mention, ReferenceKind,
};

static STATIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    // `import x from "y"`, `import "y"`, `export ... from "y"`
    Regex::new(
        r#"(?m)^\s*(?:import|export)\b[^'";]*?\bfrom\s*['"]([^'"]+)['"]|^\s*import\s*['"]([^'"]+)['"]"#,
    )
    .expect("static import regex")
});

static DYNAMIC_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\(\s*['"]([^'"]+)['"]"#).expect("dynamic import regex"));

static NEW_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"new\s+URL\(\s*['"]([^'"]+)['"]\s*,\s*import\.meta\.url"#)
        .expect("new URL regex")
});

static WORKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"new\s+(SharedWorker|Worker)\(\s*['"]([^'"]+)['"]"#).expect("worker regex")
});

static SERVICE_WORKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"serviceWorker\s*\.\s*register\(\s*['"]([^'"]+)['"]"#)
        .expect("service worker regex")
});

static HOT_ACCEPT_DEP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\.meta\.hot\.accept\(\s*['"]([^'"]+)['"]"#).expect("hot accept regex")
});

static HOT_ACCEPT_SELF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import\.meta\.hot\.accept\(\s*[\)f]"#).expect("hot self regex"));

static HOT_DECLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import\.meta\.hot\.decline\(\s*\)"#).expect("hot decline regex"));

/// Mentions plus node-level hot markers found in one module.
#[derive(Debug, Clone, Default)]
pub struct JsScan {
    pub mentions: Vec<Mention>,
    /// `import.meta.hot.accept()` with no specifier: the module patches
    /// itself.
    pub hot_accept_self: bool,
    /// `import.meta.hot.decline()`: updates through here force reloads.
    pub hot_decline: bool,
}

pub fn scan_js(source: &str, is_module: bool) -> JsScan {
    let index = LineIndex::new(source);
    let mut scan = JsScan::default();

    // hot-accepted specifiers attach an edge marker to the matching
    // import mention below
    let accepted: Vec<&str> = HOT_ACCEPT_DEP
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect();
    scan.hot_accept_self = HOT_ACCEPT_SELF.is_match(source);
    scan.hot_decline = HOT_DECLINE.is_match(source);

    if is_module {
        for caps in STATIC_IMPORT.captures_iter(source) {
            let group = caps.get(1).or_else(|| caps.get(2));
            let Some(spec) = group else { continue };
            let mut mention = Mention::new(
                ReferenceKind::JsImportExport,
                spec.as_str(),
                index.position_of(spec.start()),
            )
            .subtype("static")
            .expected_type(AssetType::JsModule);
            if accepted.contains(&spec.as_str()) {
                mention = mention.hot(HotPolicy::Accept);
            }
            scan.mentions.push(mention);
        }
        for caps in DYNAMIC_IMPORT.captures_iter(source) {
            let spec = caps.get(1).expect("capture group");
            let mut mention = Mention::new(
                ReferenceKind::JsImportExport,
                spec.as_str(),
                index.position_of(spec.start()),
            )
            .subtype("dynamic")
            .expected_type(AssetType::JsModule);
            if accepted.contains(&spec.as_str()) {
                mention = mention.hot(HotPolicy::Accept);
            }
            scan.mentions.push(mention);
        }
    }

    for caps in NEW_URL.captures_iter(source) {
        let spec = caps.get(1).expect("capture group");
        scan.mentions.push(Mention::new(
            ReferenceKind::NewUrl,
            spec.as_str(),
            index.position_of(spec.start()),
        ));
    }

    for caps in WORKER.captures_iter(source) {
        let kind = caps.get(1).expect("capture group");
        let spec = caps.get(2).expect("capture group");
        let subtype = if kind.as_str() == "SharedWorker" {
            AssetSubtype::SharedWorker
        } else {
            AssetSubtype::Worker
        };
        scan.mentions.push(
            Mention::new(
                ReferenceKind::ServiceWorkerRegistration,
                spec.as_str(),
                index.position_of(spec.start()),
            )
            .expected_type(AssetType::JsClassic)
            .expected_subtype(subtype),
        );
    }

    for caps in SERVICE_WORKER.captures_iter(source) {
        let spec = caps.get(1).expect("capture group");
        scan.mentions.push(
            Mention::new(
                ReferenceKind::ServiceWorkerRegistration,
                spec.as_str(),
                index.position_of(spec.start()),
            )
            .expected_type(AssetType::JsClassic)
            .expected_subtype(AssetSubtype::ServiceWorker),
        );
    }

    scan
}
