//! HTTP tests for the consent API
//!
//! Every test runs the real router, template renderer and pipeline against
//! in-memory index and artifact stores.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use lopdf::{dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use consent_core::{
    MemoryArtifactStore, MemoryIndex, PipelineConfig, SubmissionBuilder,
};
use consent_pdf::TemplateRenderer;

use crate::router;
use crate::state::AppState;

fn write_template(dir: &Path) -> PathBuf {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        b"BT /F1 14 Tf 72 740 Td (Case Study Consent Form) Tj ET".to_vec(),
    ));
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join("case_study_consent.pdf");
    doc.save(&path).unwrap();
    path
}

struct TestApp {
    server: TestServer,
    index: Arc<MemoryIndex>,
    _dir: tempfile::TempDir,
}

fn create_test_app_with_template(template: Option<&str>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let template_path = match template {
        Some(name) => dir.path().join(name),
        None => write_template(dir.path()),
    };

    let index = Arc::new(MemoryIndex::new());
    let state = AppState::new(
        Arc::new(TemplateRenderer::new(template_path)),
        Arc::new(MemoryArtifactStore::new()),
        index.clone(),
        None,
        SubmissionBuilder::default(),
        PipelineConfig::default(),
    );

    TestApp {
        server: TestServer::new(router(Arc::new(state))).unwrap(),
        index,
        _dir: dir,
    }
}

fn create_test_app() -> TestApp {
    create_test_app_with_template(None)
}

fn verbal_form(mrn: &str) -> Value {
    json!({
        "first_name": "Jane",
        "last_name": "Doe",
        "date_of_birth": "1961-04-12",
        "medical_record_number": mrn,
        "email": "jane.doe@example.com",
        "phone": "(555) 123-4567",
        "address": "12 Orchard Lane",
        "city": "San Angelo",
        "state": "TX",
        "zip_code": "76901",
        "verbal_authorization": true,
        "employee_first_name": "Sam",
        "employee_last_name": "Rivera",
        "employee_email": "sam.rivera@samc.com",
        "employee_department": "Cardiology",
        "case_study_diagnosis": "Takotsubo cardiomyopathy"
    })
}

async fn open_session(server: &TestServer) -> String {
    let response = server.post("/api/sessions").await;
    response.assert_status(StatusCode::CREATED);
    let json = response.json::<Value>();
    json["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_returns_200() {
    let app = create_test_app();
    let response = app.server.get("/health").await;
    response.assert_status_ok();

    let json = response.json::<Value>();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "consent-api");
}

#[tokio::test]
async fn test_states_lists_fifty_entries() {
    let app = create_test_app();
    let response = app.server.get("/api/states").await;
    response.assert_status_ok();

    let json = response.json::<Value>();
    let states = json.as_array().unwrap();
    assert_eq!(states.len(), 50);
    assert!(states
        .iter()
        .any(|s| s["code"] == "TX" && s["name"] == "Texas"));
}

#[tokio::test]
async fn test_new_session_awaits_input() {
    let app = create_test_app();
    let id = open_session(&app.server).await;

    let response = app.server.get(&format!("/api/sessions/{}", id)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["state"], "awaiting_input");
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let app = create_test_app();
    let response = app
        .server
        .get("/api/sessions/00000000-0000-0000-0000-000000000000")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_fresh_mrn_commits_and_artifact_is_downloadable() {
    let app = create_test_app();
    let id = open_session(&app.server).await;

    let response = app
        .server
        .post(&format!("/api/sessions/{}/submit", id))
        .json(&verbal_form("4412"))
        .await;
    response.assert_status(StatusCode::CREATED);

    let json = response.json::<Value>();
    assert_eq!(json["outcome"], "committed");
    assert_eq!(json["session"]["state"], "committed");
    let storage_path = json["storage_path"].as_str().unwrap().to_string();
    assert!(storage_path.starts_with("consent-forms/Doe_Jane_4412_"));
    assert!(storage_path.ends_with(".pdf"));

    let artifact = app
        .server
        .get(&format!("/api/artifacts/{}", storage_path))
        .await;
    artifact.assert_status_ok();
    assert!(artifact.as_bytes().starts_with(b"%PDF"));
    assert_eq!(app.index.count_for("4412").await, 1);
}

#[tokio::test]
async fn test_duplicate_mrn_conflicts_until_confirmed() {
    let app = create_test_app();
    let first = open_session(&app.server).await;
    app.server
        .post(&format!("/api/sessions/{}/submit", first))
        .json(&verbal_form("4412"))
        .await
        .assert_status(StatusCode::CREATED);

    let second = open_session(&app.server).await;
    let response = app
        .server
        .post(&format!("/api/sessions/{}/submit", second))
        .json(&verbal_form("4412"))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let json = response.json::<Value>();
    assert_eq!(json["outcome"], "conflict");
    assert_eq!(json["duplicates"].as_array().unwrap().len(), 1);
    assert_eq!(json["session"]["state"], "pending_conflict_decision");
    assert_eq!(app.index.count_for("4412").await, 1);

    let confirmed = app
        .server
        .post(&format!("/api/sessions/{}/confirm", second))
        .await;
    confirmed.assert_status(StatusCode::CREATED);
    assert_eq!(confirmed.json::<Value>()["outcome"], "committed");

    let listing = app.server.get("/api/submissions?mrn=4412").await;
    listing.assert_status_ok();
    assert_eq!(listing.json::<Value>().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_abandon_discards_pending_record() {
    let app = create_test_app();
    let first = open_session(&app.server).await;
    app.server
        .post(&format!("/api/sessions/{}/submit", first))
        .json(&verbal_form("77"))
        .await
        .assert_status(StatusCode::CREATED);

    let second = open_session(&app.server).await;
    app.server
        .post(&format!("/api/sessions/{}/submit", second))
        .json(&verbal_form("77"))
        .await
        .assert_status(StatusCode::CONFLICT);

    let abandoned = app
        .server
        .post(&format!("/api/sessions/{}/abandon", second))
        .await;
    abandoned.assert_status_ok();
    assert_eq!(abandoned.json::<Value>()["state"], "abandoned");

    let confirm = app
        .server
        .post(&format!("/api/sessions/{}/confirm", second))
        .await;
    confirm.assert_status(StatusCode::CONFLICT);
    assert_eq!(confirm.json::<Value>()["code"], "INVALID_TRANSITION");
    assert_eq!(app.index.count_for("77").await, 1);

    let reset = app
        .server
        .post(&format!("/api/sessions/{}/reset", second))
        .await;
    reset.assert_status_ok();
    assert_eq!(reset.json::<Value>()["state"], "awaiting_input");
}

#[tokio::test]
async fn test_invalid_form_lists_field_errors() {
    let app = create_test_app();
    let id = open_session(&app.server).await;

    let mut form = verbal_form("12A");
    form["employee_email"] = json!("sam.rivera@gmail.com");
    form["state"] = json!("ZZ");

    let response = app
        .server
        .post(&format!("/api/sessions/{}/submit", id))
        .json(&form)
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let json = response.json::<Value>();
    assert_eq!(json["code"], "VALIDATION_FAILED");
    let fields: Vec<&str> = json["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(
        fields,
        vec!["medical_record_number", "state", "employee_email"]
    );
    assert!(app.index.is_empty().await);
}

#[tokio::test]
async fn test_missing_authorization_is_rejected() {
    let app = create_test_app();
    let id = open_session(&app.server).await;

    let mut form = verbal_form("4412");
    form["verbal_authorization"] = json!(false);

    let response = app
        .server
        .post(&format!("/api/sessions/{}/submit", id))
        .json(&form)
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["fields"][0]["field"], "signature");
}

#[tokio::test]
async fn test_missing_template_fails_without_leaving_input_state() {
    let app = create_test_app_with_template(Some("missing.pdf"));
    let id = open_session(&app.server).await;

    let response = app
        .server
        .post(&format!("/api/sessions/{}/submit", id))
        .json(&verbal_form("4412"))
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);

    let json = response.json::<Value>();
    assert_eq!(json["outcome"], "failure");
    assert_eq!(json["reason"], "document render failed");
    assert_eq!(json["session"]["state"], "awaiting_input");
    assert!(app.index.is_empty().await);
}

#[tokio::test]
async fn test_submissions_requires_mrn() {
    let app = create_test_app();
    let response = app.server.get("/api/submissions?mrn=%20").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_artifact_is_404() {
    let app = create_test_app();
    let response = app.server.get("/api/artifacts/consent-forms/none.pdf").await;
    response.assert_status(StatusCode::NOT_FOUND);
}
