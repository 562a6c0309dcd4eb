//! Ingestion from enqueue through indexing to search

mod helper;

use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;

use helper::{InMemorySource, create_test_store, package, version};
use modsearch::config::{Config, DeploymentMode};
use modsearch::exclusion::{
    EXCLUDED_PREFIXES, ExclusionRegistry, ExclusionStore, ProxyRemoved, populate_excluded,
};
use modsearch::fetch::handler::FetchOutcome;
use modsearch::fetch::{FetchHandler, ModuleSource, ProxyClient};
use modsearch::queue::new_queue;
use modsearch::store::Store;

fn handler(
    source: Arc<dyn ModuleSource>,
    store: &Arc<Store>,
    proxy_removed: ProxyRemoved,
) -> FetchHandler {
    let exclusions = ExclusionRegistry::new(store.clone(), Arc::new(proxy_removed));
    FetchHandler::new(
        source,
        store.clone(),
        Arc::new(exclusions),
        Duration::from_secs(10),
    )
}

fn terms(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn local_queue_indexes_enqueued_versions() {
    let (_temp_dir, store) = create_test_store();
    let source = Arc::new(
        InMemorySource::new()
            .with_version(version(
                "example.com/yaml",
                "v1.0.0",
                vec![package("example.com/yaml", "", "Package yaml decodes YAML.")],
            ))
            .with_version(version(
                "example.com/yaml",
                "v1.1.0",
                vec![package("example.com/yaml", "", "Package yaml decodes YAML.")],
            ))
            .with_version(version(
                "example.com/toml",
                "v0.3.0",
                vec![package("example.com/toml", "", "Package toml decodes TOML.")],
            )),
    );
    let config = Config {
        workers: 3,
        queue_capacity: 2,
        ..Config::default()
    };
    let queue = new_queue(
        DeploymentMode::Local,
        &config,
        handler(source.clone(), &store, ProxyRemoved::default()),
    )
    .unwrap();

    for (module_path, v) in [
        ("example.com/yaml", "v1.0.0"),
        ("example.com/yaml", "v1.1.0"),
        ("example.com/toml", "v0.3.0"),
        ("example.com/missing", "v1.0.0"),
    ] {
        queue.enqueue(module_path, v).await.unwrap();
    }
    queue.close().await;

    assert_eq!(source.requests().len(), 4);
    assert_eq!(store.document_count(None).unwrap(), 3);

    let results = store.search(&terms(&["yaml"]), 10, 0).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].package.version, "v1.1.0");
    assert_eq!(results[0].num_results, 1);
}

#[tokio::test]
async fn excluded_prefix_blocks_enqueue() {
    let (_temp_dir, store) = create_test_store();
    store
        .insert_excluded_prefix("github.com/x/y", "tester", "author requested")
        .unwrap();
    assert!(store.is_excluded("github.com/x/y").unwrap());

    let source = Arc::new(InMemorySource::new().with_version(version(
        "github.com/x/y/z",
        "v1.0.0",
        vec![package("github.com/x/y/z", "", "Package z.")],
    )));
    let queue = new_queue(
        DeploymentMode::Local,
        &Config::default(),
        handler(source.clone(), &store, ProxyRemoved::default()),
    )
    .unwrap();

    queue.enqueue("github.com/x/y", "v1.0.0").await.unwrap();
    queue.enqueue("github.com/x/y/z", "v1.0.0").await.unwrap();
    queue.close().await;

    assert!(source.requests().is_empty());
    assert_eq!(store.document_count(None).unwrap(), 0);
}

#[tokio::test]
async fn proxy_removed_versions_are_not_fetched() {
    let (_temp_dir, store) = create_test_store();
    let source = Arc::new(
        InMemorySource::new()
            .with_version(version(
                "example.com/m",
                "v1.0.0",
                vec![package("example.com/m", "", "Package m.")],
            ))
            .with_version(version(
                "example.com/m",
                "v1.0.1",
                vec![package("example.com/m", "", "Package m.")],
            )),
    );
    let removed = ProxyRemoved::from_lines(["example.com/m@v1.0.0"]);
    let queue = new_queue(
        DeploymentMode::Local,
        &Config::default(),
        handler(source.clone(), &store, removed),
    )
    .unwrap();

    queue.enqueue("example.com/m", "v1.0.0").await.unwrap();
    queue.enqueue("example.com/m", "v1.0.1").await.unwrap();
    queue.close().await;

    assert_eq!(source.requests(), vec!["example.com/m@v1.0.1".to_string()]);
}

#[test]
fn seeding_twice_keeps_one_record_per_prefix() {
    let (_temp_dir, store) = create_test_store();

    populate_excluded(&*store, "etl").unwrap();
    populate_excluded(&*store, "etl").unwrap();

    let stored = store.excluded_prefixes().unwrap();
    assert_eq!(stored.len(), EXCLUDED_PREFIXES.len());
    assert!(store.is_excluded("gioui.org/ui/app").unwrap());
    assert!(!store.is_excluded("gioui.org/uikit").unwrap());
}

#[tokio::test]
async fn proxy_client_feeds_the_index() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/github.com/!burnt!sushi/toml/@v/v0.3.1.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "modulePath": "github.com/BurntSushi/toml",
                "version": "v0.3.1",
                "commitTime": "2018-08-15T10:47:33Z",
                "readmeContents": "TOML parser for Go with reflection.",
                "packages": [{
                    "path": "github.com/BurntSushi/toml",
                    "suffix": "",
                    "name": "toml",
                    "synopsis": "Package toml provides facilities for decoding and encoding TOML configuration files via reflection.",
                    "licenses": [{ "types": ["MIT"], "filePath": "COPYING" }],
                    "imports": ["bufio", "reflect"]
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (_temp_dir, store) = create_test_store();
    let source = Arc::new(ProxyClient::new(&server.url()).unwrap());
    let handler = handler(source, &store, ProxyRemoved::default());

    let outcome = handler
        .handle("github.com/BurntSushi/toml", "v0.3.1")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outcome, FetchOutcome::Indexed { packages: 1 });

    let results = store.search(&terms(&["toml"]), 10, 0).unwrap();
    assert_eq!(results.len(), 1);
    let hit = &results[0].package;
    assert_eq!(hit.path, "github.com/BurntSushi/toml");
    assert_eq!(hit.licenses[0].types, vec!["MIT"]);
    assert!(results[0].rank > 0.0);
}

#[tokio::test]
async fn managed_queue_dispatches_only_allowed_tasks() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/queues/dev-fetch-tasks/tasks")
        .match_body(Matcher::Json(json!({
            "modulePath": "example.com/m",
            "version": "v1.0.0"
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let (_temp_dir, store) = create_test_store();
    populate_excluded(&*store, "etl").unwrap();
    let config = Config {
        task_endpoint: Some(server.url()),
        ..Config::default()
    };
    let source = Arc::new(InMemorySource::new());
    let queue = new_queue(
        DeploymentMode::Managed,
        &config,
        handler(source.clone(), &store, ProxyRemoved::default()),
    )
    .unwrap();

    queue.enqueue("example.com/m", "v1.0.0").await.unwrap();
    queue
        .enqueue("github.com/clevergo/clevergo", "v1.2.0")
        .await
        .unwrap();
    queue.close().await;

    mock.assert_async().await;
    assert!(source.requests().is_empty());
}
