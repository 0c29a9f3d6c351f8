//! Azure DevOps Client Integration Tests
//!
//! Runs the REST client against a local HTTP server and checks the requests
//! it sends and how it reads the answers.

mod support;

use std::sync::atomic::{AtomicU64, Ordering};

use indiana::tracker::build_document;
use indiana::{
    materialize, AzureDevOpsClient, CreationOutcome, NodePath, TrackerError, WorkItemSpec,
    WorkItemTracker,
};
use support::{Captured, MockServer};

const PROJECT: &str = "Fabrikam Fiber";

/// Basic auth header for an empty user and the token `pat`.
const AUTHORIZATION: &str = "Basic OnBhdA==";

fn client(server: &MockServer) -> AzureDevOpsClient {
    AzureDevOpsClient::new("pat", "contoso", PROJECT).unwrap().with_api_url(server.url())
}

fn create_error(status: u16, body: &str) -> TrackerError {
    let server = MockServer::respond(status, body);
    let document = build_document(&WorkItemSpec::new("Login", "Task"), None);
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(client(&server).create_work_item(&document, PROJECT, "Task")).unwrap_err()
}

/// Ids `1..=count` in WIQL form, titles "Item N" in batch form.
fn listing_handler(count: u64) -> impl Fn(&Captured) -> (u16, String) + Send + Sync {
    move |request| {
        if request.path.contains("/_apis/wit/wiql") {
            let refs: Vec<_> = (1..=count).map(|id| serde_json::json!({ "id": id })).collect();
            return (200, serde_json::json!({ "workItems": refs }).to_string());
        }

        let ids = request
            .path
            .split("ids=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap_or_default();
        let value: Vec<_> = ids
            .split(',')
            .rev()
            .map(|id| {
                serde_json::json!({
                    "id": id.parse::<u64>().unwrap(),
                    "fields": { "System.Title": format!("Item {id}") }
                })
            })
            .collect();
        (200, serde_json::json!({ "count": value.len(), "value": value }).to_string())
    }
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_sends_patch_document() {
    let server = MockServer::respond(200, r#"{ "id": 42, "rev": 1, "url": "https://x/42" }"#);
    let spec = WorkItemSpec::new("Login", "User Story").with_description("Sign in");
    let document = build_document(&spec, None);

    let created = client(&server).create_work_item(&document, PROJECT, "User Story").await.unwrap();

    assert_eq!(created.id, 42);
    assert_eq!(created.url.as_deref(), Some("https://x/42"));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(
        request.path,
        "/contoso/Fabrikam%20Fiber/_apis/wit/workitems/$User%20Story?api-version=7.1"
    );
    assert_eq!(request.header("content-type"), Some("application/json-patch+json"));
    assert_eq!(request.header("authorization"), Some(AUTHORIZATION));

    let body = request.json();
    let ops = body.as_array().unwrap();
    assert_eq!(ops[0]["op"], "add");
    assert_eq!(ops[0]["path"], "/fields/System.Title");
    assert_eq!(ops[0]["value"], "Login");
}

#[tokio::test]
async fn test_create_with_unreadable_body_is_invalid_response() {
    let server = MockServer::respond(200, "not json");
    let document = build_document(&WorkItemSpec::new("Login", "Task"), None);

    let err = client(&server).create_work_item(&document, PROJECT, "Task").await.unwrap_err();

    assert!(matches!(err, TrackerError::InvalidResponse(_)));
}

// ============================================================================
// Status mapping
// ============================================================================

#[test]
fn test_unauthorized_statuses() {
    assert!(matches!(create_error(401, ""), TrackerError::Unauthorized));
    assert!(matches!(create_error(403, "{}"), TrackerError::Unauthorized));
}

#[test]
fn test_rate_limited_status() {
    assert!(matches!(create_error(429, ""), TrackerError::RateLimited));
}

#[test]
fn test_not_found_carries_message() {
    let err = create_error(404, r#"{ "message": "TF200016: project does not exist" }"#);
    match err {
        TrackerError::NotFound(message) => assert_eq!(message, "TF200016: project does not exist"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_other_statuses_carry_status_and_message() {
    let body = r#"{ "message": "VS402323: Work item type BadType does not exist." }"#;
    let err = create_error(400, body);
    match err {
        TrackerError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "VS402323: Work item type BadType does not exist.");
        }
        other => panic!("unexpected error: {other}"),
    }

    match create_error(500, "") {
        TrackerError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "no response body");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Query
// ============================================================================

#[tokio::test]
async fn test_query_fetches_titles_in_batches() {
    let server = MockServer::start(listing_handler(250));

    let items = client(&server).query_work_items(PROJECT).await.unwrap();

    assert_eq!(items.len(), 250);
    assert_eq!(items[0].id, 1);
    assert_eq!(items[0].title, "Item 1");
    assert!(items.windows(2).all(|w| w[0].id < w[1].id));

    let requests = server.requests();
    let wiql: Vec<_> = requests.iter().filter(|r| r.path.contains("/wiql")).collect();
    assert_eq!(wiql.len(), 1);
    assert_eq!(wiql[0].method, "POST");
    assert_eq!(wiql[0].path, "/contoso/Fabrikam%20Fiber/_apis/wit/wiql?api-version=7.1");
    let query = wiql[0].json()["query"].as_str().unwrap().to_string();
    assert!(query.contains("[System.TeamProject] = 'Fabrikam Fiber'"));

    let mut batch_sizes: Vec<usize> = requests
        .iter()
        .filter(|r| r.method == "GET")
        .map(|r| {
            assert!(r.path.starts_with("/contoso/_apis/wit/workitems?ids="));
            assert_eq!(r.header("authorization"), Some(AUTHORIZATION));
            r.path.split("ids=").nth(1).unwrap().split('&').next().unwrap().split(',').count()
        })
        .collect();
    batch_sizes.sort_unstable();
    assert_eq!(batch_sizes, [50, 200]);
}

#[tokio::test]
async fn test_query_without_results_skips_batch_fetch() {
    let server = MockServer::start(listing_handler(0));

    let items = client(&server).query_work_items(PROJECT).await.unwrap();

    assert!(items.is_empty());
    assert_eq!(server.requests().len(), 1);
}

// ============================================================================
// Materializing over HTTP
// ============================================================================

#[tokio::test]
async fn test_materialize_links_children_by_rest_url() {
    let next_id = AtomicU64::new(1);
    let server = MockServer::start(move |request| {
        if request.path.contains("$BadType") {
            return (400, r#"{ "message": "Work item type BadType does not exist." }"#.to_string());
        }
        let id = next_id.fetch_add(1, Ordering::SeqCst);
        (200, format!(r#"{{ "id": {id} }}"#))
    });
    let tracker = client(&server);
    let forest = vec![
        WorkItemSpec::new("Epic1", "Epic").with_child(WorkItemSpec::new("Task1", "Task")),
        WorkItemSpec::new("Bad", "BadType").with_child(WorkItemSpec::new("Orphan", "Task")),
    ];

    let report = materialize(&tracker, &forest, PROJECT).await;

    let requests = server.requests();
    assert_eq!(requests.len(), 4);

    let relation = |request: &Captured| -> Option<String> {
        request
            .json()
            .as_array()
            .unwrap()
            .iter()
            .find(|op| op["path"] == "/relations/-")
            .map(|op| op["value"]["url"].as_str().unwrap().to_string())
    };
    let expected = format!("{}/contoso/Fabrikam%20Fiber/_apis/wit/workItems/1", server.url());
    assert_eq!(relation(&requests[1]), Some(expected));
    assert_eq!(relation(&requests[3]), None);

    let bad = report.get(&NodePath::root(1)).unwrap();
    match &bad.outcome {
        CreationOutcome::Failed { reason } => assert!(reason.contains("BadType does not exist")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(report.get(&NodePath::from(vec![1, 0])).unwrap().is_orphan());
}
