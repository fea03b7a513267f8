use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dremiofetcher::{
    models::{RawField, RawFieldType},
    CancelToken, CatalogDiscovery, CatalogService, DataType, DiscoveryParams, FetcherError,
    RawNode, ResourceKind,
};

#[derive(Default)]
struct MockCatalogService {
    root: Vec<RawNode>,
    by_path: HashMap<Vec<String>, RawNode>,
    by_id: HashMap<String, RawNode>,
    unauthorized_paths: Vec<Vec<String>>,
    expired_session: bool,
    endless_folders: bool,
    calls: Mutex<Vec<String>>,
}

impl MockCatalogService {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogService for MockCatalogService {
    async fn login(&self, _username: &str, _password: &str) -> dremiofetcher::Result<String> {
        Ok("token".into())
    }

    async fn root(&self) -> dremiofetcher::Result<Vec<RawNode>> {
        self.calls.lock().unwrap().push("root".into());
        if self.expired_session {
            return Err(FetcherError::Authentication("catalog root: HTTP 401".into()));
        }
        Ok(self.root.clone())
    }

    async fn by_path(&self, path: &[String]) -> dremiofetcher::Result<RawNode> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("path:{}", path.join("/")));
        if self.unauthorized_paths.iter().any(|p| p == path) {
            return Err(FetcherError::Forbidden(format!("{}: HTTP 403", path.join("/"))));
        }
        if self.endless_folders {
            let mut child_path = path.to_vec();
            child_path.push("nested".into());
            return Ok(RawNode {
                path: path.to_vec(),
                entity_type: Some("folder".into()),
                children: vec![container(&child_path, "FOLDER")],
                ..Default::default()
            });
        }
        self.by_path
            .get(path)
            .cloned()
            .ok_or_else(|| FetcherError::NotFound(path.join("/")))
    }

    async fn by_id(&self, id: &str) -> dremiofetcher::Result<RawNode> {
        self.calls.lock().unwrap().push(format!("id:{id}"));
        self.by_id
            .get(id)
            .cloned()
            .ok_or_else(|| FetcherError::Api {
                status: 500,
                body: "boom".into(),
            })
    }

    async fn health(&self) -> dremiofetcher::Result<()> {
        Ok(())
    }
}

fn segments(path: &[&str]) -> Vec<String> {
    path.iter().map(|s| s.to_string()).collect()
}

fn container(path: &[String], container_type: &str) -> RawNode {
    RawNode {
        id: format!("id-{}", path.join("-")),
        path: path.to_vec(),
        node_type: Some("CONTAINER".into()),
        container_type: Some(container_type.into()),
        ..Default::default()
    }
}

fn dataset(id: &str, path: &[String]) -> RawNode {
    RawNode {
        id: id.into(),
        path: path.to_vec(),
        node_type: Some("DATASET".into()),
        dataset_type: Some("VIRTUAL".into()),
        ..Default::default()
    }
}

fn field(name: &str, native: &str) -> RawField {
    RawField {
        name: Some(name.into()),
        field_type: RawFieldType {
            name: Some(native.into()),
        },
        description: None,
    }
}

fn lookup(path: &[String], entity_type: &str, children: Vec<RawNode>) -> RawNode {
    RawNode {
        path: path.to_vec(),
        entity_type: Some(entity_type.into()),
        children,
        ..Default::default()
    }
}

fn analytics_catalog() -> MockCatalogService {
    let analytics = segments(&["Analytics"]);
    let sales = segments(&["Analytics", "Sales"]);
    let orders = segments(&["Analytics", "Sales", "orders"]);

    let mut service = MockCatalogService {
        root: vec![container(&analytics, "SPACE")],
        ..Default::default()
    };
    service.by_path.insert(
        analytics.clone(),
        lookup(&analytics, "space", vec![container(&sales, "FOLDER")]),
    );
    service.by_path.insert(
        sales.clone(),
        lookup(&sales, "folder", vec![dataset("ds-orders", &orders)]),
    );
    service.by_id.insert(
        "ds-orders".into(),
        RawNode {
            id: "ds-orders".into(),
            path: orders,
            entity_type: Some("dataset".into()),
            fields: vec![field("order_id", "BIGINT"), field("amount", "DECIMAL")],
            ..Default::default()
        },
    );
    service
}

type Outcome = dremiofetcher::Result<dremiofetcher::Discovery>;

async fn discover(service: MockCatalogService) -> (Arc<MockCatalogService>, Outcome) {
    let service = Arc::new(service);
    let discovery = CatalogDiscovery::new(service.clone(), DiscoveryParams::default());
    let result = discovery.discover_all(&CancelToken::new()).await;
    (service, result)
}

#[tokio::test]
async fn discovers_space_folder_and_dataset() {
    let (_, result) = discover(analytics_catalog()).await;
    let discovery = result.expect("discovery succeeds");

    assert!(discovery.warnings.is_empty(), "{:?}", discovery.warnings);
    let kinds: Vec<_> = discovery.resources.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![ResourceKind::Space, ResourceKind::Folder, ResourceKind::Dataset]
    );

    let orders = &discovery.resources[2];
    assert_eq!(orders.path, segments(&["Analytics", "Sales", "orders"]));
    assert_eq!(orders.id, "ds-orders");
    let columns = orders.schema().expect("datasets carry a schema");
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].data_type, DataType::Bigint);
    assert_eq!(columns[1].data_type, DataType::Decimal);
    assert_eq!(columns[1].ordinal_position, 2);

    assert!(discovery.resources[0].schema().is_none());
    assert!(discovery.resources[1].schema().is_none());
}

#[tokio::test]
async fn circular_references_terminate_with_unique_paths() {
    let mut service = analytics_catalog();
    let analytics = segments(&["Analytics"]);
    let sales = segments(&["Analytics", "Sales"]);
    let orders = segments(&["Analytics", "Sales", "orders"]);
    // Sales lists its own ancestor, itself and a duplicate dataset entry.
    service.by_path.insert(
        sales.clone(),
        lookup(
            &sales,
            "folder",
            vec![
                container(&analytics, "SPACE"),
                container(&sales, "FOLDER"),
                dataset("ds-orders", &orders),
                dataset("ds-orders", &orders),
            ],
        ),
    );
    // The root also repeats the space.
    service.root.push(container(&analytics, "SPACE"));

    let (service, result) = discover(service).await;
    let discovery = result.expect("discovery succeeds");

    assert_eq!(discovery.resources.len(), 3);
    let mut paths: Vec<_> = discovery.resources.iter().map(|r| r.path.clone()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 3);

    let schema_fetches = service
        .calls()
        .iter()
        .filter(|c| c.as_str() == "id:ds-orders")
        .count();
    assert_eq!(schema_fetches, 1);
}

#[tokio::test]
async fn unreachable_container_is_skipped_and_siblings_continue() {
    let mut service = analytics_catalog();
    let broken = segments(&["Broken"]);
    service.root.insert(0, container(&broken, "SOURCE"));

    let (_, result) = discover(service).await;
    let discovery = result.expect("discovery succeeds");

    assert_eq!(discovery.resources.len(), 4);
    assert_eq!(discovery.resources[0].kind, ResourceKind::Source);
    assert_eq!(discovery.warnings.len(), 1);
    assert!(discovery.warnings[0].contains("Broken"));
}

#[tokio::test]
async fn failed_schema_fetch_yields_empty_schema() {
    let mut service = analytics_catalog();
    service.by_id.clear();

    let (service, result) = discover(service).await;
    let discovery = result.expect("discovery succeeds");

    let orders = discovery
        .resources
        .iter()
        .find(|r| r.kind == ResourceKind::Dataset)
        .expect("dataset still reported");
    assert_eq!(orders.schema(), Some(&[][..]));
    assert_eq!(discovery.warnings.len(), 1);
    assert_eq!(
        service.calls().iter().filter(|c| c.starts_with("id:")).count(),
        1
    );
}

#[tokio::test]
async fn dataset_without_id_is_resolved_by_path() {
    let loose = segments(&["Lake", "events"]);
    let lake = segments(&["Lake"]);
    let mut service = MockCatalogService {
        root: vec![container(&lake, "SOURCE")],
        ..Default::default()
    };
    service
        .by_path
        .insert(lake.clone(), lookup(&lake, "source", vec![dataset("", &loose)]));
    service.by_path.insert(
        loose.clone(),
        RawNode {
            path: loose.clone(),
            entity_type: Some("dataset".into()),
            fields: vec![field("ts", "TIMESTAMP")],
            ..Default::default()
        },
    );

    let (service, result) = discover(service).await;
    let discovery = result.expect("discovery succeeds");

    assert_eq!(discovery.resources[1].columns()[0].data_type, DataType::Timestamp);
    assert!(service.calls().contains(&"path:Lake/events".to_string()));
}

#[tokio::test]
async fn forbidden_folder_is_skipped_with_a_warning() {
    let mut service = analytics_catalog();
    service
        .unauthorized_paths
        .push(segments(&["Analytics", "Sales"]));

    let (_, result) = discover(service).await;
    let discovery = result.expect("a forbidden folder does not abort discovery");

    let paths: Vec<_> = discovery.resources.iter().map(|r| r.path.join("/")).collect();
    assert_eq!(paths, vec!["Analytics", "Analytics/Sales"]);
    assert_eq!(discovery.warnings.len(), 1);
    assert!(discovery.warnings[0].contains("Analytics.Sales"));
}

#[tokio::test]
async fn forbidden_space_does_not_hide_its_siblings() {
    let mut service = analytics_catalog();
    let restricted = segments(&["Restricted"]);
    service.root.insert(0, container(&restricted, "SPACE"));
    service.unauthorized_paths.push(restricted);

    let (service, result) = discover(service).await;
    let discovery = result.expect("discovery succeeds");

    let paths: Vec<_> = discovery.resources.iter().map(|r| r.path.join("/")).collect();
    assert!(paths.contains(&"Restricted".to_string()));
    assert!(paths.contains(&"Analytics/Sales/orders".to_string()));
    assert_eq!(discovery.resources.len(), 4);
    assert_eq!(discovery.warnings.len(), 1);
    assert!(discovery.warnings[0].contains("HTTP 403"));
    assert!(service.calls().contains(&"id:ds-orders".to_string()));
}

#[tokio::test]
async fn rejected_session_aborts_the_walk() {
    let mut service = analytics_catalog();
    service.expired_session = true;

    let (service, result) = discover(service).await;
    assert!(matches!(result, Err(FetcherError::Authentication(_))));
    assert_eq!(service.calls(), vec!["root".to_string()]);
}

#[tokio::test]
async fn depth_limit_stops_self_nesting_catalogs() {
    let service = Arc::new(MockCatalogService {
        root: vec![container(&segments(&["Deep"]), "SPACE")],
        endless_folders: true,
        ..Default::default()
    });
    let discovery = CatalogDiscovery::new(service.clone(), DiscoveryParams { max_depth: 5 });

    let result = discovery
        .discover_all(&CancelToken::new())
        .await
        .expect("discovery succeeds");

    assert_eq!(result.resources.len(), 5);
    assert_eq!(result.resources.last().unwrap().path.len(), 5);
    assert_eq!(result.warnings.len(), 1);
}

#[tokio::test]
async fn cancelled_token_stops_before_visiting() {
    let service = Arc::new(analytics_catalog());
    let discovery = CatalogDiscovery::new(service, DiscoveryParams::default());
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = discovery.discover_all(&cancel).await;
    assert!(matches!(result, Err(FetcherError::Cancelled)));
}

#[tokio::test]
async fn unknown_item_types_are_skipped() {
    let mut service = analytics_catalog();
    service.root.push(RawNode {
        id: "fn-1".into(),
        path: segments(&["udf"]),
        node_type: Some("FUNCTION".into()),
        ..Default::default()
    });

    let (_, result) = discover(service).await;
    let discovery = result.expect("discovery succeeds");
    assert_eq!(discovery.resources.len(), 3);
    assert_eq!(discovery.warnings.len(), 1);
}
