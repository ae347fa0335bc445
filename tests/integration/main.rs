//! Integration tests for Canopy

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn canopy() -> Command {
        cargo_bin_cmd!("canopy")
    }

    #[test]
    fn help_displays() {
        canopy()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("subtree lookup server"));
    }

    #[test]
    fn version_displays() {
        canopy()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("canopy"));
    }

    #[test]
    fn invalid_config_rejected() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "sources = 5").unwrap();

        canopy()
            .args(["--config", path.to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn invalid_listen_rejected() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        std::fs::write(&config, "").unwrap();

        canopy()
            .args(["--config", config.to_str().unwrap(), "--listen", "nonsense"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid listen address"));
    }
}

mod service_tests {
    use canopy::config::Config;
    use canopy::service::TreeService;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const SAMPLE: &str = "id,name,parent\n1,root,\n2,a,1\n3,b,1\n4,c,2\n";

    fn service_over(content: &str) -> (TempDir, TreeService) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tree1.csv");
        std::fs::write(&path, content).unwrap();

        let mut config = Config::default();
        config.sources = HashMap::from([("tree1".to_string(), path)]);
        let service = TreeService::new(&config);
        (temp, service)
    }

    async fn wait_warm(service: &TreeService) {
        for _ in 0..400 {
            if !service.store().is_refreshing("tree1") && service.store().get("tree1").is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("cache never warmed");
    }

    #[tokio::test]
    async fn full_refresh_cycle() {
        let (temp, service) = service_over(SAMPLE);

        // Cold: answered by a scoped pass, cache warming behind it.
        let cold = service.lookup("tree1", 1).await.unwrap().unwrap();
        assert_eq!(cold.children.len(), 2);
        wait_warm(&service).await;
        let first_snapshot = service.store().get("tree1").unwrap();

        // Warm: served straight from the snapshot.
        let warm = service.lookup("tree1", 1).await.unwrap().unwrap();
        assert_eq!(warm, cold);
        assert!(Arc::ptr_eq(
            &first_snapshot,
            &service.store().get("tree1").unwrap()
        ));

        // Rewrite the source; mtime moves forward, snapshot goes stale.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        std::fs::write(
            temp.path().join("tree1.csv"),
            format!("{SAMPLE}5,d,3\n"),
        )
        .unwrap();

        // Stale: the scoped answer already sees the new row.
        let stale = service.lookup("tree1", 3).await.unwrap().unwrap();
        assert_eq!(stale.children.len(), 1);
        assert_eq!(stale.children[0].name, "d");

        // And the background rebuild commits a fresh snapshot.
        for _ in 0..400 {
            let snapshot = service.store().get("tree1").unwrap();
            if !Arc::ptr_eq(&first_snapshot, &snapshot) && !service.store().is_refreshing("tree1")
            {
                assert_eq!(snapshot.index.len(), 5);
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("stale snapshot was never replaced");
    }

    #[tokio::test]
    async fn lookups_hit_independent_sources() {
        let temp = TempDir::new().unwrap();
        let mut sources = HashMap::new();
        for name in ["tree1", "tree2"] {
            let path = temp.path().join(format!("{name}.csv"));
            std::fs::write(&path, SAMPLE).unwrap();
            sources.insert(name.to_string(), path);
        }
        let mut config = Config::default();
        config.sources = sources;
        let service = TreeService::new(&config);

        let a = service.lookup("tree1", 2).await.unwrap().unwrap();
        let b = service.lookup("tree2", 2).await.unwrap().unwrap();
        assert_eq!(a, b);

        // Breaking one source leaves the other serving.
        std::fs::remove_file(temp.path().join("tree2.csv")).unwrap();
        assert!(service.lookup("tree2", 2).await.is_err());
        assert!(service.lookup("tree1", 2).await.unwrap().is_some());
    }
}

mod http_tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use canopy::config::Config;
    use canopy::server;
    use canopy::service::TreeService;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    #[tokio::test]
    async fn lookup_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tree1.csv");
        std::fs::write(&path, "id,name,parent\n1,root,\n2,a,1\n3,b,1\n4,c,2\n").unwrap();

        let mut config = Config::default();
        config.sources = HashMap::from([("tree1".to_string(), path)]);
        let app = server::router(Arc::new(TreeService::new(&config)));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/tree")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "tree": "tree1", "id": "2" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["tree"]["name"], "a");
        assert_eq!(body["tree"]["children"][0]["id"], 4);
    }
}

mod properties {
    use canopy::rows::Record;
    use canopy::tree::{BuildScope, BuildStep, TreeBuilder};
    use proptest::prelude::*;

    /// Ordered forests: ids strictly increasing, each parent drawn from
    /// an earlier id or absent.
    fn forests() -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec(any::<(u8, bool)>(), 1..48).prop_map(|seeds| {
            seeds
                .into_iter()
                .enumerate()
                .map(|(i, (pick, is_root))| {
                    let id = i as u64 + 1;
                    let parent = if is_root || i == 0 {
                        None
                    } else {
                        Some(u64::from(pick) % i as u64 + 1)
                    };
                    Record {
                        id,
                        name: format!("n{id}"),
                        parent,
                    }
                })
                .collect()
        })
    }

    proptest! {
        /// A scoped pass reconstructs exactly the subtree the full pass
        /// would hand out for the same root.
        #[test]
        fn scoped_matches_full_subtree(records in forests(), root_pick: u8) {
            let root = u64::from(root_pick) % records.len() as u64 + 1;

            let mut full = TreeBuilder::new(BuildScope::Full);
            for record in records.clone() {
                prop_assert!(full.push(record).is_ok());
            }

            let mut scoped = TreeBuilder::new(BuildScope::Subtree(root));
            for record in records {
                match scoped.push(record) {
                    Ok(BuildStep::Continue) => {}
                    Ok(BuildStep::Complete) => break,
                    Err(violation) => prop_assert!(false, "unexpected violation {violation:?}"),
                }
            }

            prop_assert_eq!(full.finish().get(root), scoped.finish().get(root));
        }

        /// Every id indexed by a full pass either is a root or hangs off
        /// exactly one parent's child list.
        #[test]
        fn forest_attachment_is_exclusive(records in forests()) {
            let mut builder = TreeBuilder::new(BuildScope::Full);
            for record in records.clone() {
                prop_assert!(builder.push(record).is_ok());
            }
            let index = builder.finish();

            for record in &records {
                let mut appearances = 0;
                for other in &records {
                    if let Some(parent) = index.get(other.id) {
                        appearances += parent
                            .children
                            .iter()
                            .filter(|child| child.id == record.id)
                            .count();
                    }
                }
                let expected = usize::from(record.parent.is_some());
                prop_assert_eq!(appearances, expected);
            }
        }
    }
}
