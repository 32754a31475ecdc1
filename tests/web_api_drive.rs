//! Web API Drive Tests
//!
//! Integration tests for the drive endpoints and the debug introspection
//! endpoints.

use std::io::{Cursor, Read};
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::Value;
use singledrive::drive::FilesystemMirror;
use singledrive::tree::NodeRepository;
use singledrive::web::handlers::AppState;
use singledrive::web::router::{create_health_router, create_router};
use singledrive::Database;
use tempfile::TempDir;

const TEST_MAX_UPLOAD: u64 = 1024 * 1024;

/// Create a test server with an in-memory database and a temp storage root.
async fn create_test_server() -> (TestServer, Database, FilesystemMirror, TempDir) {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let temp = TempDir::new().expect("Failed to create temp dir");
    let mirror =
        FilesystemMirror::new(temp.path().join("storage")).expect("Failed to create mirror");

    let app_state = Arc::new(AppState::new(db.clone(), mirror.clone(), TEST_MAX_UPLOAD));
    let router = create_router(app_state, &[]).merge(create_health_router());

    let server = TestServer::new(router).expect("Failed to create test server");

    (server, db, mirror, temp)
}

/// Upload `content` as `file_name` into `dir`.
async fn upload(server: &TestServer, dir: &str, file_name: &str, content: &[u8]) -> Value {
    let form = MultipartForm::new()
        .add_text("path", dir)
        .add_part("file", Part::bytes(content.to_vec()).file_name(file_name));

    let response = server.post("/upload").multipart(form).await;
    response.assert_status_ok();
    response.json::<Value>()["data"].clone()
}

/// Upload `a/b/c.txt` with 10 bytes.
async fn seed_abc(server: &TestServer) -> Value {
    upload(server, "a/b", "c.txt", b"0123456789").await
}

// ============================================================================
// Health and index
// ============================================================================

#[tokio::test]
async fn test_health_and_index() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");

    let response = server.get("/").await;
    response.assert_status_ok();
    assert!(response.text().contains("singledrive"));
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_creates_parent_directories() {
    let (server, db, mirror, _temp) = create_test_server().await;

    let data = seed_abc(&server).await;
    assert_eq!(data["path"], "a/b/c.txt");
    assert_eq!(data["name"], "c.txt");
    assert_eq!(data["size"], 10);
    assert_eq!(data["created"], true);

    let repo = NodeRepository::new(db.pool());
    assert!(repo.get_by_path("a").await.unwrap().unwrap().is_dir);
    assert!(repo.get_by_path("a/b").await.unwrap().unwrap().is_dir);
    assert_eq!(mirror.read("a/b/c.txt").unwrap(), b"0123456789");
}

#[tokio::test]
async fn test_upload_overwrite_keeps_id() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let first = seed_abc(&server).await;
    let second = upload(&server, "a/b", "c.txt", b"short").await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["size"], 5);
    assert_eq!(second["created"], false);
}

#[tokio::test]
async fn test_upload_with_meta_name_and_size() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let form = MultipartForm::new()
        .add_text("meta", r#"{"name": "renamed.txt", "size": 3}"#)
        .add_part("file", Part::bytes(b"abc".to_vec()).file_name("original.txt"));

    let response = server.post("/upload").multipart(form).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["path"], "renamed.txt");
}

#[tokio::test]
async fn test_upload_size_mismatch() {
    let (server, db, mirror, _temp) = create_test_server().await;

    let form = MultipartForm::new()
        .add_text("meta", r#"{"size": 99}"#)
        .add_part("file", Part::bytes(b"abc".to_vec()).file_name("x.txt"));

    let response = server.post("/upload").multipart(form).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(NodeRepository::new(db.pool()).count().await.unwrap(), 0);
    assert!(!mirror.exists("x.txt"));
}

#[tokio::test]
async fn test_upload_without_file() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let form = MultipartForm::new().add_text("path", "a");
    let response = server.post("/upload").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_invalid_path() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let form = MultipartForm::new()
        .add_text("path", "../escape")
        .add_part("file", Part::bytes(b"abc".to_vec()).file_name("x.txt"));

    let response = server.post("/upload").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_by_parent_id() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let response = server.post("/createdir").add_query_param("path", "docs").await;
    response.assert_status_ok();
    let dir_id = response.json::<Value>()["data"]["id"].as_i64().unwrap();

    let form = MultipartForm::new()
        .add_text("parent_id", dir_id.to_string())
        .add_part("file", Part::bytes(b"pdf".to_vec()).file_name("cv.pdf"));

    let response = server.post("/upload").multipart(form).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["path"], "docs/cv.pdf");
}

#[tokio::test]
async fn test_upload_over_limit() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let big = vec![0u8; (TEST_MAX_UPLOAD + 1) as usize];
    let form = MultipartForm::new().add_part("file", Part::bytes(big).file_name("big.bin"));

    let response = server.post("/upload").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_tree() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;
    upload(&server, "", "top.txt", b"t").await;

    let response = server.get("/list").await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    let data = &json["data"];

    assert_eq!(data["total"], 4);
    let roots = data["roots"].as_array().unwrap();
    assert_eq!(roots.len(), 2);

    let a = roots.iter().find(|n| n["path"] == "a").unwrap();
    assert_eq!(a["is_dir"], true);
    assert_eq!(a["children"][0]["name"], "b");
    assert_eq!(a["children"][0]["children"][0]["name"], "c.txt");
    assert_eq!(a["children"][0]["children"][0]["size"], 10);
}

#[tokio::test]
async fn test_list_flat() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    for format in ["simple", "flat"] {
        let response = server.get("/list").add_query_param("format", format).await;
        response.assert_status_ok();
        let items = response.json::<Value>()["data"].as_array().unwrap().clone();
        let paths: Vec<&str> = items.iter().map(|n| n["path"].as_str().unwrap()).collect();
        assert_eq!(paths, vec!["a", "a/b", "a/b/c.txt"]);
    }
}

#[tokio::test]
async fn test_list_empty() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let response = server.get("/list").await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    let data = &json["data"];
    assert_eq!(data["total"], 0);
    assert!(data["roots"].as_array().unwrap().is_empty());
}

// ============================================================================
// Directories
// ============================================================================

#[tokio::test]
async fn test_create_dir_idempotent() {
    let (server, _db, mirror, _temp) = create_test_server().await;

    let response = server.post("/createdir").add_query_param("path", "x/y").await;
    response.assert_status_ok();
    let first = response.json::<Value>()["data"].clone();
    assert_eq!(first["created"], true);
    assert!(mirror.exists("x/y"));

    let response = server.post("/createdir").add_query_param("path", "x/y").await;
    response.assert_status_ok();
    let second = response.json::<Value>()["data"].clone();
    assert_eq!(second["created"], false);
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["message"], "directory already exists");

    let response = server.get("/debug/closure").await;
    assert_eq!(response.json::<Value>()["data"]["count"], 3);
}

#[tokio::test]
async fn test_create_dir_over_file_conflicts() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    let response = server
        .post("/createdir")
        .add_query_param("path", "a/b/c.txt")
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_dir_under_file_conflicts() {
    let (server, db, mirror, _temp) = create_test_server().await;
    upload(&server, "", "f", b"x").await;

    let response = server.post("/createdir").add_query_param("path", "f/g").await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"]["code"], "CONFLICT");

    assert_eq!(mirror.read("f").unwrap(), b"x");
    assert_eq!(NodeRepository::new(db.pool()).count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_create_dir_missing_param() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let response = server.post("/createdir").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Rename and move
// ============================================================================

#[tokio::test]
async fn test_rename_file() {
    let (server, _db, mirror, _temp) = create_test_server().await;
    let uploaded = seed_abc(&server).await;

    let response = server
        .put("/rename")
        .add_query_param("oldName", "a/b/c.txt")
        .add_query_param("newName", "d.txt")
        .await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    let data = &json["data"];
    assert_eq!(data["id"], uploaded["id"]);
    assert_eq!(data["old_path"], "a/b/c.txt");
    assert_eq!(data["new_path"], "a/b/d.txt");

    assert!(mirror.exists("a/b/d.txt"));
    assert!(!mirror.exists("a/b/c.txt"));
}

#[tokio::test]
async fn test_rename_directory_rewrites_descendants() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    let response = server
        .put("/rename")
        .add_query_param("oldName", "a")
        .add_query_param("newName", "z")
        .await;
    response.assert_status_ok();

    let response = server.get("/list").add_query_param("format", "flat").await;
    let items = response.json::<Value>()["data"].as_array().unwrap().clone();
    let paths: Vec<&str> = items.iter().map(|n| n["path"].as_str().unwrap()).collect();
    assert_eq!(paths, vec!["z", "z/b", "z/b/c.txt"]);
}

#[tokio::test]
async fn test_rename_collision_and_missing() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;
    upload(&server, "a/b", "d.txt", b"d").await;

    let response = server
        .put("/rename")
        .add_query_param("oldName", "a/b/c.txt")
        .add_query_param("newName", "d.txt")
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = server
        .put("/rename")
        .add_query_param("oldName", "a/missing.txt")
        .add_query_param("newName", "e.txt")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .put("/rename")
        .add_query_param("oldName", "a/b/c.txt")
        .add_query_param("newName", "sub/e.txt")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rename_empty_param_is_validation_error() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let response = server
        .put("/rename")
        .add_query_param("oldName", "")
        .add_query_param("newName", "x")
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let json = response.json::<Value>();
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_move_to_root() {
    let (server, _db, mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    let response = server
        .put("/move")
        .add_query_param("oldpath", "a/b")
        .add_query_param("newparent", "")
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["new_path"], "b");

    assert_eq!(mirror.read("b/c.txt").unwrap(), b"0123456789");
    assert!(!mirror.exists("a/b"));

    let response = server.get("/debug/closure").await;
    let items = response.json::<Value>()["data"]["items"]
        .as_array()
        .unwrap()
        .clone();
    assert!(!items
        .iter()
        .any(|row| row["ancestor_path"] == "a" && row["descendant_path"] != "a"));
    assert!(items.iter().any(|row| row["ancestor_path"] == "b"
        && row["descendant_path"] == "b/c.txt"
        && row["depth"] == 1));
}

#[tokio::test]
async fn test_move_into_own_subtree_rejected() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    let response = server
        .put("/move")
        .add_query_param("oldpath", "a")
        .add_query_param("newparent", "a/b")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_move_errors() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;
    upload(&server, "", "c.txt", b"root").await;

    // Missing destination parent.
    let response = server
        .put("/move")
        .add_query_param("oldpath", "a/b/c.txt")
        .add_query_param("newparent", "nowhere")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    // Destination is a file.
    let response = server
        .put("/move")
        .add_query_param("oldpath", "a/b")
        .add_query_param("newparent", "c.txt")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Name already taken at the destination.
    let response = server
        .put("/move")
        .add_query_param("oldpath", "a/b/c.txt")
        .add_query_param("newparent", "")
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_file() {
    let (server, db, mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    let response = server
        .delete("/delete")
        .add_query_param("name", "a/b/c.txt")
        .await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    let data = &json["data"];
    assert_eq!(data["nodes_removed"], 1);
    assert!(data.get("warning").is_none());

    assert!(!mirror.exists("a/b/c.txt"));
    let repo = NodeRepository::new(db.pool());
    assert_eq!(repo.count().await.unwrap(), 2);
    assert_eq!(repo.list_edges().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_delete_non_empty_directory_conflicts() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    let response = server.delete("/delete").add_query_param("name", "a").await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_missing() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let response = server.delete("/delete").add_query_param("name", "ghost").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_dir_removes_subtree() {
    let (server, db, mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;
    upload(&server, "", "keep.txt", b"k").await;

    let response = server
        .delete("/deletedir")
        .add_query_param("dirname", "a")
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["nodes_removed"], 3);

    assert!(!mirror.exists("a"));
    let repo = NodeRepository::new(db.pool());
    assert_eq!(repo.count().await.unwrap(), 1);
    assert_eq!(repo.list_edges().await.unwrap().len(), 1);
}

// ============================================================================
// Download and info
// ============================================================================

#[tokio::test]
async fn test_download_file() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    let response = server
        .get("/download")
        .add_query_param("name", "a/b/c.txt")
        .await;
    response.assert_status_ok();

    assert_eq!(response.header(header::CONTENT_TYPE), "text/plain");
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION),
        "attachment; filename=\"c.txt\""
    );
    assert_eq!(&response.as_bytes()[..], b"0123456789");
}

#[tokio::test]
async fn test_download_directory_as_zip() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    for (route, param) in [("/download", "name"), ("/downloaddir", "dirname")] {
        let response = server.get(route).add_query_param(param, "a").await;
        response.assert_status_ok();
        assert_eq!(response.header(header::CONTENT_TYPE), "application/zip");
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            "attachment; filename=\"a.zip\""
        );

        let mut archive = zip::ZipArchive::new(Cursor::new(response.as_bytes().to_vec())).unwrap();
        let mut content = String::new();
        archive
            .by_name("b/c.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "0123456789");
    }
}

#[tokio::test]
async fn test_download_dir_of_file_rejected() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    let response = server
        .get("/downloaddir")
        .add_query_param("dirname", "a/b/c.txt")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_missing() {
    let (server, _db, _mirror, _temp) = create_test_server().await;

    let response = server.get("/download").add_query_param("name", "nope.txt").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_info() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    let response = server.get("/info").add_query_param("name", "a/b/c.txt").await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    let data = &json["data"];
    assert_eq!(data["name"], "c.txt");
    assert_eq!(data["size"], 10);
    assert_eq!(data["is_directory"], false);

    let response = server.get("/info").add_query_param("name", "a").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["is_directory"], true);

    let response = server.get("/info").add_query_param("name", "zzz").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

// ============================================================================
// Debug introspection
// ============================================================================

#[tokio::test]
async fn test_debug_nodes_and_closure() {
    let (server, _db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    let response = server.get("/debug/nodes").await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    let data = &json["data"];
    assert_eq!(data["count"], 3);

    let response = server.get("/debug/closure").await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    let data = &json["data"];
    assert_eq!(data["count"], 6);

    let deepest = data["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["depth"] == 2)
        .unwrap();
    assert_eq!(deepest["ancestor_path"], "a");
    assert_eq!(deepest["descendant_path"], "a/b/c.txt");
    assert_eq!(deepest["descendant_size"], 10);
}

#[tokio::test]
async fn test_debug_subtree() {
    let (server, db, _mirror, _temp) = create_test_server().await;
    seed_abc(&server).await;

    let b = NodeRepository::new(db.pool())
        .get_by_path("a/b")
        .await
        .unwrap()
        .unwrap();

    let response = server.get(&format!("/debug/subtree/{}", b.id)).await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    let data = &json["data"];
    assert_eq!(data["root_id"], b.id);
    assert_eq!(data["count"], 2);

    let response = server.get("/debug/subtree/9999").await;
    response.assert_status(StatusCode::NOT_FOUND);
}
