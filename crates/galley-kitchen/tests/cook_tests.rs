//! End-to-end cooking over a real source tree.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use galley_config::Scenario;
use galley_graph::{AssetType, AssetUrl};
use galley_kitchen::{CookErrorKind, Kitchen};

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn kitchen_for(dir: &Path) -> Kitchen {
    let root = AssetUrl::from_dir_path(dir).unwrap();
    Kitchen::builder(Scenario::Dev, root)
        .with_builtin_plugins()
        .build()
}

fn file_url(dir: &Path, name: &str) -> AssetUrl {
    AssetUrl::from_file_path(dir.join(name)).unwrap()
}

#[tokio::test]
async fn test_cook_entry_closes_the_graph() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        r#"<html><head><link rel="stylesheet" href="./style.css"></head>
<body><script type="module" src="./app.js"></script></body></html>"#,
    );
    write(dir.path(), "style.css", ".hero { background: url(./hero.png) }");
    write(dir.path(), "hero.png", "not-really-a-png");
    write(dir.path(), "app.js", "import { greet } from './dep.js'\ngreet()\n");
    write(dir.path(), "dep.js", "export const greet = () => {}\n");

    let kitchen = kitchen_for(dir.path());
    let entry = kitchen.cook_entry("./main.html").await.unwrap();
    assert_eq!(entry, file_url(dir.path(), "main.html"));

    let graph = kitchen.graph();
    let main = graph.get(&entry).unwrap();
    assert_eq!(main.asset_type, AssetType::Html);
    assert!(main.meta.is_entry_point);

    let deps = graph.dependencies(&entry);
    assert!(deps.contains(&file_url(dir.path(), "style.css")));
    assert!(deps.contains(&file_url(dir.path(), "app.js")));

    let app = graph.get(&file_url(dir.path(), "app.js")).unwrap();
    assert_eq!(app.asset_type, AssetType::JsModule);
    assert_eq!(
        graph.dependencies(&app.url),
        vec![file_url(dir.path(), "dep.js")]
    );

    let css_deps = graph.dependencies(&file_url(dir.path(), "style.css"));
    assert_eq!(css_deps, vec![file_url(dir.path(), "hero.png")]);

    assert!(graph.check_dependents_inverse());
}

#[tokio::test]
async fn test_inline_regions_become_synthetic_nodes() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        "<html><head><style>body { color: red }</style></head>\
<body><script type=\"module\">console.log('hi')</script></body></html>",
    );

    let kitchen = kitchen_for(dir.path());
    let entry = kitchen.cook_entry("./main.html").await.unwrap();
    let graph = kitchen.graph();

    let style_url = file_url(dir.path(), "main.html@0.css");
    let script_url = file_url(dir.path(), "main.html@1.js");

    let style = graph.get(&style_url).unwrap();
    assert!(style.meta.is_inline);
    assert_eq!(style.asset_type, AssetType::Css);
    assert_eq!(style.content.as_text(), Some("body { color: red }"));

    let script = graph.get(&script_url).unwrap();
    assert!(script.meta.is_inline);
    assert_eq!(script.asset_type, AssetType::JsModule);

    // the owner was rewritten to reference the synthetic URLs
    let main = graph.get(&entry).unwrap();
    let html = main.content.as_text().unwrap();
    assert!(html.contains(r#"<link rel="stylesheet" href="main.html@0.css">"#), "{html}");
    assert!(html.contains(r#"<script type="module" src="main.html@1.js"></script>"#), "{html}");
    assert!(!html.contains("color: red"), "{html}");

    let deps = graph.dependencies(&entry);
    assert!(deps.contains(&style_url));
    assert!(deps.contains(&script_url));
}

#[tokio::test]
async fn test_inline_url_is_stable_across_content_edits() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        "<html><style>body { color: red }</style></html>",
    );

    let kitchen = kitchen_for(dir.path());
    let entry = kitchen.cook_entry("./main.html").await.unwrap();
    let style_url = file_url(dir.path(), "main.html@0.css");
    assert!(kitchen.graph().contains(&style_url));

    write(
        dir.path(),
        "main.html",
        "<html><style>body { color: blue }</style></html>",
    );
    kitchen.recook(&entry).await.unwrap();

    let style = kitchen.graph().get(&style_url).unwrap();
    assert_eq!(style.content.as_text(), Some("body { color: blue }"));
}

#[tokio::test]
async fn test_removed_inline_region_is_pruned() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        "<html><style>body { color: red }</style></html>",
    );

    let kitchen = kitchen_for(dir.path());
    let entry = kitchen.cook_entry("./main.html").await.unwrap();
    let style_url = file_url(dir.path(), "main.html@0.css");
    assert!(kitchen.graph().contains(&style_url));

    write(dir.path(), "main.html", "<html><p>no styles left</p></html>");
    let diff = kitchen.recook(&entry).await.unwrap();
    assert!(diff.pruned.contains(&style_url));
    assert!(!kitchen.graph().contains(&style_url));
}

#[tokio::test]
async fn test_missing_file_reports_not_found_with_trace() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        "<html>\n<script type=\"module\" src=\"./ghost.js\"></script>\n</html>",
    );

    let kitchen = kitchen_for(dir.path());
    let err = kitchen.cook_entry("./main.html").await.unwrap_err();
    assert_eq!(err.kind, CookErrorKind::LoadNotFound);
    let trace = err.trace.expect("trace attached");
    assert!(trace.contains("main.html"), "{trace}");
}

#[tokio::test]
async fn test_bare_import_fails_resolution() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app.js", "import { signal } from 'preact'\n");

    let kitchen = kitchen_for(dir.path());
    let err = kitchen.cook_entry("./app.js").await.unwrap_err();
    assert_eq!(err.kind, CookErrorKind::ResolutionFailed);
    assert_eq!(err.specifier.as_deref(), Some("preact"));
    assert!(err.trace.unwrap().contains("app.js"));
}

#[tokio::test]
async fn test_directory_load_is_forbidden() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("assets")).unwrap();
    write(dir.path(), "main.html", "<img src=\"./assets\">");

    let kitchen = kitchen_for(dir.path());
    let err = kitchen.cook_entry("./main.html").await.unwrap_err();
    assert_eq!(err.kind, CookErrorKind::LoadForbidden);
}

#[tokio::test]
async fn test_mutual_imports_terminate() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.js", "import './b.js'\nexport const a = 1\n");
    write(dir.path(), "b.js", "import './a.js'\nexport const b = 2\n");

    let kitchen = kitchen_for(dir.path());
    kitchen.cook_entry("./a.js").await.unwrap();

    let graph = kitchen.graph();
    let a = file_url(dir.path(), "a.js");
    let b = file_url(dir.path(), "b.js");
    assert_eq!(graph.dependencies(&a), vec![b.clone()]);
    assert_eq!(graph.dependencies(&b), vec![a]);
    assert!(graph.check_dependents_inverse());
}

#[tokio::test]
async fn test_recook_diffs_removed_dependency() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        r#"<link rel="stylesheet" href="./style.css"><script type="module" src="./app.js"></script>"#,
    );
    write(dir.path(), "style.css", "body {}");
    write(dir.path(), "app.js", "export {}\n");

    let kitchen = kitchen_for(dir.path());
    let entry = kitchen.cook_entry("./main.html").await.unwrap();

    write(
        dir.path(),
        "main.html",
        r#"<script type="module" src="./app.js"></script>"#,
    );
    let diff = kitchen.recook(&entry).await.unwrap();
    assert_eq!(diff.removed, vec![file_url(dir.path(), "style.css")]);
    // a real file is kept in the graph even with zero dependents
    assert!(kitchen.graph().contains(&file_url(dir.path(), "style.css")));
    assert!(diff.pruned.is_empty());
}

#[tokio::test]
async fn test_resolution_is_idempotent_across_cooks() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.html", r#"<img src="./logo.png">"#);
    write(dir.path(), "logo.png", "png-bytes");

    let kitchen = kitchen_for(dir.path());
    let entry = kitchen.cook_entry("./main.html").await.unwrap();
    let first: Vec<_> = kitchen.graph().dependencies(&entry);
    kitchen.recook(&entry).await.unwrap();
    let second: Vec<_> = kitchen.graph().dependencies(&entry);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_worker_reference_types_the_target_as_classic() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app.js", "const w = new Worker('./worker.js')\n");
    write(dir.path(), "worker.js", "self.onmessage = () => {}\n");

    let kitchen = kitchen_for(dir.path());
    kitchen.cook_entry("./app.js").await.unwrap();

    let worker = kitchen
        .graph()
        .get(&file_url(dir.path(), "worker.js"))
        .unwrap();
    assert_eq!(worker.asset_type, AssetType::JsClassic);
}

#[tokio::test]
async fn test_hot_markers_land_on_graph() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "app.js",
        "import './dep.js'\nimport.meta.hot.accept()\n",
    );
    write(dir.path(), "dep.js", "export {}\nimport.meta.hot.decline()\n");

    let kitchen = kitchen_for(dir.path());
    kitchen.cook_entry("./app.js").await.unwrap();

    let graph = kitchen.graph();
    assert!(graph.get(&file_url(dir.path(), "app.js")).unwrap().meta.hot_accept_self);
    assert!(graph.get(&file_url(dir.path(), "dep.js")).unwrap().meta.hot_decline);
}
