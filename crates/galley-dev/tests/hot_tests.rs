//! Hot-reload decisions over a real cooked graph.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use galley_config::Scenario;
use galley_dev::{FileEvent, FileEventKind, HotDecision, HotMessage, HotReloader};
use galley_graph::AssetUrl;
use galley_kitchen::Kitchen;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn file_url(dir: &Path, name: &str) -> AssetUrl {
    AssetUrl::from_file_path(dir.join(name)).unwrap()
}

async fn cooked_reloader(dir: &Path, entry: &str) -> HotReloader {
    let root = AssetUrl::from_dir_path(dir).unwrap();
    let kitchen = Kitchen::builder(Scenario::Dev, root)
        .with_builtin_plugins()
        .build();
    kitchen.cook_entry(entry).await.unwrap();
    HotReloader::new(kitchen)
}

#[tokio::test]
async fn test_stylesheet_change_is_absorbed() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        r#"<script type="module" src="./a.js"></script>"#,
    );
    write(dir.path(), "a.js", "import.meta.hot.accept()\nimport './b.css'\n");
    write(dir.path(), "b.css", "body {}");

    let reloader = cooked_reloader(dir.path(), "./main.html").await;
    let decision = reloader.decide(&file_url(dir.path(), "b.css"));
    match decision {
        HotDecision::HotUpdate { url, accepted_path } => {
            assert_eq!(url, file_url(dir.path(), "b.css"));
            assert_eq!(
                accepted_path,
                vec![file_url(dir.path(), "b.css"), file_url(dir.path(), "a.js")]
            );
        }
        other => panic!("expected hot update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_classic_script_change_forces_reload() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.html", r#"<script src="./legacy.js"></script>"#);
    write(dir.path(), "legacy.js", "var x = 1");

    let reloader = cooked_reloader(dir.path(), "./main.html").await;
    let decision = reloader.decide(&file_url(dir.path(), "legacy.js"));
    assert!(matches!(decision, HotDecision::FullReload { .. }), "{decision:?}");
}

#[tokio::test]
async fn test_unaccepted_module_reaches_top_and_reloads() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        r#"<script type="module" src="./app.js"></script>"#,
    );
    write(dir.path(), "app.js", "export {}\n");

    let reloader = cooked_reloader(dir.path(), "./main.html").await;
    let decision = reloader.decide(&file_url(dir.path(), "app.js"));
    assert!(matches!(decision, HotDecision::FullReload { .. }), "{decision:?}");
}

#[tokio::test]
async fn test_edge_acceptance_absorbs_module_update() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        r#"<script type="module" src="./app.js"></script>"#,
    );
    write(
        dir.path(),
        "app.js",
        "import './dep.js'\nimport.meta.hot.accept('./dep.js')\n",
    );
    write(dir.path(), "dep.js", "export const x = 1\n");

    let reloader = cooked_reloader(dir.path(), "./main.html").await;
    let decision = reloader.decide(&file_url(dir.path(), "dep.js"));
    match decision {
        HotDecision::HotUpdate { accepted_path, .. } => {
            assert_eq!(
                accepted_path,
                vec![file_url(dir.path(), "dep.js"), file_url(dir.path(), "app.js")]
            );
        }
        other => panic!("expected hot update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_self_accepting_module_patches_itself() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        r#"<script type="module" src="./app.js"></script>"#,
    );
    write(dir.path(), "app.js", "import.meta.hot.accept()\nexport {}\n");

    let reloader = cooked_reloader(dir.path(), "./main.html").await;
    let decision = reloader.decide(&file_url(dir.path(), "app.js"));
    match decision {
        HotDecision::HotUpdate { accepted_path, .. } => {
            assert_eq!(accepted_path, vec![file_url(dir.path(), "app.js")]);
        }
        other => panic!("expected hot update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_declined_node_forces_reload() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        r#"<script type="module" src="./app.js"></script>"#,
    );
    write(dir.path(), "app.js", "import.meta.hot.decline()\nexport {}\n");

    let reloader = cooked_reloader(dir.path(), "./main.html").await;
    let decision = reloader.decide(&file_url(dir.path(), "app.js"));
    assert!(matches!(decision, HotDecision::FullReload { .. }));
}

#[tokio::test]
async fn test_update_event_recooks_and_notifies() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        r#"<script type="module" src="./a.js"></script>"#,
    );
    write(dir.path(), "a.js", "import.meta.hot.accept()\nimport './b.css'\n");
    write(dir.path(), "b.css", "body { color: red }");

    let reloader = cooked_reloader(dir.path(), "./main.html").await;

    write(dir.path(), "b.css", "body { color: blue }");
    let messages = reloader
        .handle_event(&FileEvent::new(
            dir.path().join("b.css"),
            FileEventKind::Updated,
        ))
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert!(matches!(messages[0], HotMessage::HotUpdate { .. }), "{messages:?}");

    // the graph picked up the new content
    let css = reloader
        .kitchen()
        .graph()
        .get(&file_url(dir.path(), "b.css"))
        .unwrap();
    assert_eq!(css.content.as_text(), Some("body { color: blue }"));
}

#[tokio::test]
async fn test_removed_inline_region_emits_cleanup() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        "<html><style>body { color: red }</style></html>",
    );

    let reloader = cooked_reloader(dir.path(), "./main.html").await;
    let inline_url = file_url(dir.path(), "main.html@0.css");
    assert!(reloader.kitchen().graph().contains(&inline_url));

    write(dir.path(), "main.html", "<html><p>plain now</p></html>");
    let messages = reloader
        .handle_event(&FileEvent::new(
            dir.path().join("main.html"),
            FileEventKind::Updated,
        ))
        .await
        .unwrap();

    assert!(
        messages
            .iter()
            .any(|message| matches!(message, HotMessage::Cleanup { url } if *url == inline_url)),
        "{messages:?}"
    );
}

#[tokio::test]
async fn test_removed_file_emits_cleanup_and_reload() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.html",
        r#"<link rel="stylesheet" href="./style.css">"#,
    );
    write(dir.path(), "style.css", "body {}");

    let reloader = cooked_reloader(dir.path(), "./main.html").await;
    fs::remove_file(dir.path().join("style.css")).unwrap();

    let messages = reloader
        .handle_event(&FileEvent::new(
            dir.path().join("style.css"),
            FileEventKind::Removed,
        ))
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert!(matches!(messages[0], HotMessage::Cleanup { .. }));
    assert!(matches!(messages[1], HotMessage::FullReload { .. }));
}

#[tokio::test]
async fn test_events_outside_the_graph_are_ignored() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.html", "<p>nothing referenced</p>");

    let reloader = cooked_reloader(dir.path(), "./main.html").await;
    let messages = reloader
        .handle_event(&FileEvent::new(
            dir.path().join("unrelated.txt"),
            FileEventKind::Added,
        ))
        .await
        .unwrap();
    assert!(messages.is_empty());
}
