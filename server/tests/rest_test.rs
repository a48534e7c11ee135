use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use kernel::{CreateResource, ErrorReply, RepairReport, Resource, UpdateResource};
use reqwest::{Client, StatusCode};
use serde_json::json;
use server::config::Config;
use server::domain::Storage;
use server::mirror::FsMirror;
use server::service::ResourceService;
use server::sqlite::Sqlite;
use server::AppState;
use tempfile::TempDir;
use test_context::{test_context, AsyncTestContext};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot::{self, Sender};
use tokio::task::JoinHandle;
use uuid::Uuid;

struct DrywallAsyncContext {
    root: TempDir,
    _data: TempDir,
    addr: SocketAddr,
    base: String,
    client: Client,
    shutdown: Sender<()>,
    join: JoinHandle<()>,
}

fn test_config(root: &TempDir, data: &TempDir) -> Config {
    Config {
        root: root.path().to_path_buf(),
        database: data.path().join(format!("{}.db", Uuid::new_v4())),
        timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

impl DrywallAsyncContext {
    async fn launch(root: TempDir, data: TempDir, config: Config, state: AppState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (send, recv) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let app = server::create_routes(state, &config);
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    recv.await.unwrap_or_default();
                })
                .await
                .unwrap();
        });

        DrywallAsyncContext {
            root,
            _data: data,
            addr,
            base: format!("http://{addr}"),
            client: Client::new(),
            shutdown: send,
            join: task,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn mirror_file(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    async fn create(&self, name: &str, content: &[u8]) -> reqwest::Response {
        let body = CreateResource {
            name: name.to_owned(),
            content: kernel::encode_content(content),
            content_type: "text/plain".to_owned(),
        };
        self.client
            .post(self.url("/resources"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

impl AsyncTestContext for DrywallAsyncContext {
    async fn setup() -> DrywallAsyncContext {
        let root = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let config = test_config(&root, &data);
        let state = AppState::open(&config).unwrap();
        DrywallAsyncContext::launch(root, data, config, state).await
    }

    async fn teardown(self) {
        self.shutdown.send(()).unwrap_or_default();
        self.join.await.unwrap_or_default();
    }
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn readme_lifecycle(ctx: &mut DrywallAsyncContext) {
    // Arrange
    let body = json!({"name": "readme", "content": "aGVsbG8=", "content_type": "text/plain"});

    // Act
    let created = ctx
        .client
        .post(ctx.url("/resources"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let created_status = created.status();
    let created: serde_json::Value = created.json().await.unwrap();

    let fetched = ctx
        .client
        .get(ctx.url("/resources/readme"))
        .send()
        .await
        .unwrap();
    let fetched_status = fetched.status();
    let fetched: Resource = fetched.json().await.unwrap();

    let deleted = ctx
        .client
        .delete(ctx.url("/resources/readme"))
        .send()
        .await
        .unwrap();

    let gone = ctx
        .client
        .get(ctx.url("/resources/readme"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(created_status, StatusCode::CREATED);
    assert!(created["id"].is_i64());
    assert_eq!(fetched_status, StatusCode::OK);
    assert_eq!(fetched.decoded_content().unwrap(), b"hello");
    assert_eq!(fetched.content_type, "text/plain");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    let error: ErrorReply = gone.json().await.unwrap();
    assert_eq!(error.error, "not_found");
    assert!(!ctx.mirror_file("readme").exists());
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn create_writes_mirror_file(ctx: &mut DrywallAsyncContext) {
    // Arrange
    let content = [0u8, 1, 2, 3, 254, 255];

    // Act
    let response = ctx.create("data.bin", &content).await;

    // Assert
    assert_eq!(response.status(), StatusCode::CREATED);
    let on_disk = tokio::fs::read(ctx.mirror_file("data.bin")).await.unwrap();
    assert_eq!(on_disk, content);
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn create_duplicate_conflicts(ctx: &mut DrywallAsyncContext) {
    // Arrange
    ctx.create("readme", b"hello").await;

    // Act
    let response = ctx.create("readme", b"other").await;

    // Assert
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error: ErrorReply = response.json().await.unwrap();
    assert_eq!(error.error, "conflict");
    let on_disk = tokio::fs::read(ctx.mirror_file("readme")).await.unwrap();
    assert_eq!(on_disk, b"hello");
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn create_traversal_name_rejected(ctx: &mut DrywallAsyncContext) {
    // Arrange

    // Act
    let response = ctx.create("../etc/passwd", b"root").await;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorReply = response.json().await.unwrap();
    assert_eq!(error.error, "invalid_name");
    let list: Vec<Resource> = ctx
        .client
        .get(ctx.url("/resources"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.is_empty());
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn encoded_traversal_in_path_rejected(ctx: &mut DrywallAsyncContext) {
    // Arrange

    // Act
    let response = ctx
        .client
        .get(ctx.url("/resources/..%2Fetc%2Fpasswd"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn create_invalid_base64_rejected(ctx: &mut DrywallAsyncContext) {
    // Arrange
    let body = json!({"name": "readme", "content": "%%%", "content_type": "text/plain"});

    // Act
    let response = ctx
        .client
        .post(ctx.url("/resources"))
        .json(&body)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorReply = response.json().await.unwrap();
    assert_eq!(error.error, "invalid_content");
    assert!(!ctx.mirror_file("readme").exists());
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn update_replaces_content(ctx: &mut DrywallAsyncContext) {
    // Arrange
    ctx.create("readme", b"hello").await;
    let body = UpdateResource {
        content: kernel::encode_content(b"# hello"),
        content_type: "text/markdown".to_owned(),
    };

    // Act
    let response = ctx
        .client
        .put(ctx.url("/resources/readme"))
        .json(&body)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Resource = response.json().await.unwrap();
    assert_eq!(updated.content_type, "text/markdown");
    assert_eq!(updated.decoded_content().unwrap(), b"# hello");
    assert!(updated.warning.is_none());
    let on_disk = tokio::fs::read(ctx.mirror_file("readme")).await.unwrap();
    assert_eq!(on_disk, b"# hello");
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn update_missing_not_found(ctx: &mut DrywallAsyncContext) {
    // Arrange
    let body = UpdateResource {
        content: kernel::encode_content(b"x"),
        content_type: "text/plain".to_owned(),
    };

    // Act
    let response = ctx
        .client
        .put(ctx.url("/resources/missing"))
        .json(&body)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!ctx.mirror_file("missing").exists());
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn delete_missing_not_found(ctx: &mut DrywallAsyncContext) {
    // Arrange
    tokio::fs::write(ctx.mirror_file("stray"), b"stray")
        .await
        .unwrap();

    // Act
    let response = ctx
        .client
        .delete(ctx.url("/resources/stray"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(ctx.mirror_file("stray").exists());
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn list_returns_all_resources(ctx: &mut DrywallAsyncContext) {
    // Arrange
    ctx.create("b", b"2").await;
    ctx.create("a", b"1").await;

    // Act
    let response = ctx
        .client
        .get(ctx.url("/resources"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let list: Vec<Resource> = response.json().await.unwrap();
    let names: Vec<&str> = list.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn content_served_with_declared_type(ctx: &mut DrywallAsyncContext) {
    // Arrange
    ctx.create("readme", b"hello").await;

    // Act
    let response = ctx
        .client
        .get(ctx.url("/resources/readme/content"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"hello");
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn responses_carry_protocol_version(ctx: &mut DrywallAsyncContext) {
    // Arrange

    // Act
    let response = ctx
        .client
        .get(ctx.url("/resources/missing"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(
        response.headers()[kernel::PROTOCOL_HEADER],
        kernel::PROTOCOL_VERSION
    );
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn repair_restores_deleted_mirror(ctx: &mut DrywallAsyncContext) {
    // Arrange
    ctx.create("readme", b"hello").await;
    tokio::fs::remove_file(ctx.mirror_file("readme"))
        .await
        .unwrap();

    // Act
    let response = ctx
        .client
        .post(ctx.url("/repair"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let report: RepairReport = response.json().await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.rewritten, 1);
    let on_disk = tokio::fs::read(ctx.mirror_file("readme")).await.unwrap();
    assert_eq!(on_disk, b"hello");
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn concurrent_creates_single_winner(ctx: &mut DrywallAsyncContext) {
    // Arrange
    let ctx = &*ctx;
    let attempts = (0..8u8).map(|i| async move { ctx.create("contended", &[i]).await });

    // Act
    let responses = join_all(attempts).await;

    // Assert
    let statuses: Vec<StatusCode> = responses.iter().map(reqwest::Response::status).collect();
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CREATED).count(),
        1
    );
    assert!(statuses
        .iter()
        .all(|s| *s == StatusCode::CREATED || *s == StatusCode::CONFLICT));
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn openapi_document_served(ctx: &mut DrywallAsyncContext) {
    // Arrange

    // Act
    let response = ctx
        .client
        .get(ctx.url("/api-docs/openapi.json"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = response.json().await.unwrap();
    assert!(doc["paths"]["/resources/{name}"].is_object());
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn create_missing_field_rejected(ctx: &mut DrywallAsyncContext) {
    // Arrange
    let body = json!({"name": "readme", "content": "aGVsbG8="});

    // Act
    let response = ctx
        .client
        .post(ctx.url("/resources"))
        .json(&body)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorReply = response.json().await.unwrap();
    assert_eq!(error.error, "invalid_content");
    assert!(error.message.contains("content_type"));
    assert!(!ctx.mirror_file("readme").exists());
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn create_malformed_json_rejected(ctx: &mut DrywallAsyncContext) {
    // Arrange

    // Act
    let response = ctx
        .client
        .post(ctx.url("/resources"))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("name=readme&content=hello")
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorReply = response.json().await.unwrap();
    assert_eq!(error.error, "invalid_content");
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn update_without_json_content_type_rejected(ctx: &mut DrywallAsyncContext) {
    // Arrange
    ctx.create("readme", b"hello").await;

    // Act
    let response = ctx
        .client
        .put(ctx.url("/resources/readme"))
        .body(r#"{"content":"Ynll","content_type":"text/plain"}"#)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorReply = response.json().await.unwrap();
    assert_eq!(error.error, "invalid_content");
    let on_disk = tokio::fs::read(ctx.mirror_file("readme")).await.unwrap();
    assert_eq!(on_disk, b"hello");
}

#[test_context(DrywallAsyncContext)]
#[tokio::test]
async fn update_with_unwritable_mirror_warns(ctx: &mut DrywallAsyncContext) {
    // Arrange
    ctx.create("readme", b"hello").await;
    std::fs::remove_dir_all(ctx.root.path()).unwrap();
    let body = UpdateResource {
        content: kernel::encode_content(b"bye"),
        content_type: "text/plain".to_owned(),
    };

    // Act
    let response = ctx
        .client
        .put(ctx.url("/resources/readme"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    let updated: Resource = response.json().await.unwrap();

    let fetched: Resource = ctx
        .client
        .get(ctx.url("/resources/readme"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert!(updated.warning.is_some());
    assert_eq!(updated.decoded_content().unwrap(), b"bye");
    assert_eq!(fetched.decoded_content().unwrap(), b"bye");
    assert!(fetched.warning.is_none());
}

#[tokio::test]
async fn slow_operation_reported_unavailable() {
    // Arrange
    let root = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let config = Config {
        timeout: Duration::from_millis(300),
        ..test_config(&root, &data)
    };
    let database = config.database.clone();
    // the store waits far longer for its lock than the handler waits for the store
    let storage = Sqlite::new(&database, Duration::from_secs(30));
    storage.new_database().unwrap();
    let service = ResourceService::new(storage, FsMirror::new(&config.root));
    let state = AppState::new(Arc::new(service), config.timeout);
    let ctx = DrywallAsyncContext::launch(root, data, config, state).await;

    let holder = rusqlite::Connection::open(&database).unwrap();
    holder.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    // Act
    let response = ctx.client.get(ctx.url("/resources")).send().await.unwrap();
    let status = response.status();
    let error: ErrorReply = response.json().await.unwrap();
    holder.execute_batch("ROLLBACK;").unwrap();
    drop(holder);

    // Assert
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error.error, "unavailable");
    ctx.teardown().await;
}

#[tokio::test]
async fn stalled_request_body_times_out() {
    // Arrange
    let root = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let config = Config {
        request_timeout: Duration::from_millis(300),
        ..test_config(&root, &data)
    };
    let state = AppState::open(&config).unwrap();
    let ctx = DrywallAsyncContext::launch(root, data, config, state).await;
    let mut stream = TcpStream::connect(ctx.addr).await.unwrap();
    // announces more body than is ever sent
    let head = "POST /resources HTTP/1.1\r\n\
                Host: localhost\r\n\
                Content-Type: application/json\r\n\
                Content-Length: 100\r\n\r\n\
                {\"name\":";

    // Act
    stream.write_all(head.as_bytes()).await.unwrap();
    let mut buf = vec![0u8; 1024];
    let read = tokio::time::timeout(Duration::from_secs(10), stream.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    drop(stream);

    // Assert
    let reply = String::from_utf8_lossy(&buf[..read]);
    assert!(reply.starts_with("HTTP/1.1 408"), "{reply}");
    assert!(!ctx.mirror_file("readme").exists());
    ctx.teardown().await;
}
