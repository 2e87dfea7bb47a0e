use std::fs;
use std::path::PathBuf;

use serde_json::json;
use szuru_core::{DryRun, Safety, SzuruClient};
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

struct Fixture {
    server: MockServer,
    source: TempDir,
    failsafe: TempDir,
}

impl Fixture {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            source: tempdir().unwrap(),
            failsafe: tempdir().unwrap(),
        }
    }

    fn uploader(&self, dry_run: DryRun, remove_source: bool) -> Uploader {
        let client = SzuruClient::new(&self.server.uri(), "secret", false, dry_run).unwrap();
        Uploader::new(
            client,
            UploadOptions {
                tags: vec!["cat".to_string()],
                safety: Safety::Safe,
                remove_source,
                failsafe_dir: self.failsafe.path().to_path_buf(),
            },
        )
    }

    fn write_media(&self, relative: &str, content: &[u8]) -> PathBuf {
        let file = self.source.path().join(relative);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, content).unwrap();
        file
    }

    async fn mock_stage(&self, token: &str) {
        Mock::given(method("POST"))
            .and(path("/api/uploads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": token})))
            .mount(&self.server)
            .await;
    }

    async fn mock_reverse_search(&self, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/api/posts/reverse-search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}

#[tokio::test]
async fn new_file_is_finalized_with_similar_posts_as_relations() {
    let fixture = Fixture::new().await;
    let file = fixture.write_media("cat.png", b"pixels");
    fixture.mock_stage("abc").await;
    fixture
        .mock_reverse_search(json!({
            "exactPost": null,
            "similarPosts": [{"post": {"id": 7}}]
        }))
        .await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .and(body_json(json!({
            "tags": ["cat"],
            "safety": "safe",
            "relations": [7],
            "contentToken": "abc"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let outcome = fixture
        .uploader(DryRun::INACTIVE, false)
        .process_file(&file)
        .await;

    assert_eq!(outcome, UploadOutcome::Uploaded);
    assert!(file.exists());
}

#[tokio::test]
async fn exact_match_skips_finalize_and_removes_source_when_requested() {
    let fixture = Fixture::new().await;
    let file = fixture.write_media("cat.png", b"pixels");
    fixture.mock_stage("abc").await;
    fixture
        .mock_reverse_search(json!({
            "exactPost": {"id": 42},
            "similarPosts": []
        }))
        .await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .expect(0)
        .mount(&fixture.server)
        .await;

    let outcome = fixture
        .uploader(DryRun::INACTIVE, true)
        .process_file(&file)
        .await;

    assert_eq!(outcome, UploadOutcome::SkippedDuplicate);
    assert!(!file.exists());
}

#[tokio::test]
async fn stage_failure_routes_file_to_failsafe() {
    let fixture = Fixture::new().await;
    let file = fixture.write_media("cat.png", b"pixels");
    Mock::given(method("POST"))
        .and(path("/api/uploads"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"description": "broken"})))
        .mount(&fixture.server)
        .await;

    let outcome = fixture
        .uploader(DryRun::INACTIVE, false)
        .process_file(&file)
        .await;

    assert_eq!(outcome, UploadOutcome::Failed);
    assert!(file.exists());
    assert_eq!(
        fs::read(fixture.failsafe.path().join("cat.png")).unwrap(),
        b"pixels"
    );
}

#[tokio::test]
async fn similarity_check_failure_routes_file_to_failsafe() {
    let fixture = Fixture::new().await;
    let file = fixture.write_media("cat.png", b"pixels");
    fixture.mock_stage("abc").await;
    Mock::given(method("POST"))
        .and(path("/api/posts/reverse-search"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"description": "index down"})))
        .mount(&fixture.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .expect(0)
        .mount(&fixture.server)
        .await;

    let outcome = fixture
        .uploader(DryRun::INACTIVE, false)
        .process_file(&file)
        .await;

    assert_eq!(outcome, UploadOutcome::Failed);
    assert!(file.exists());
    assert_eq!(
        fs::read(fixture.failsafe.path().join("cat.png")).unwrap(),
        b"pixels"
    );
}

#[tokio::test]
async fn finalize_failure_routes_file_to_failsafe() {
    let fixture = Fixture::new().await;
    let file = fixture.write_media("cat.png", b"pixels");
    fixture.mock_stage("abc").await;
    fixture
        .mock_reverse_search(json!({"exactPost": null, "similarPosts": []}))
        .await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"description": "bad tag"})))
        .mount(&fixture.server)
        .await;

    let outcome = fixture
        .uploader(DryRun::INACTIVE, false)
        .process_file(&file)
        .await;

    assert_eq!(outcome, UploadOutcome::Failed);
    assert!(file.exists());
    assert_eq!(
        fs::read(fixture.failsafe.path().join("cat.png")).unwrap(),
        b"pixels"
    );
}

#[tokio::test]
async fn dry_run_exercises_decisions_without_side_effects() {
    let fixture = Fixture::new().await;
    let file = fixture.write_media("cat.png", b"pixels");
    fixture.mock_stage("abc").await;
    fixture
        .mock_reverse_search(json!({
            "exactPost": null,
            "similarPosts": [{"post": {"id": 7}}]
        }))
        .await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .expect(0)
        .mount(&fixture.server)
        .await;

    let outcome = fixture
        .uploader(DryRun::ACTIVE, true)
        .process_file(&file)
        .await;

    assert_eq!(outcome, UploadOutcome::Uploaded);
    assert!(file.exists());
}

#[tokio::test]
async fn one_failure_does_not_halt_the_batch() {
    let fixture = Fixture::new().await;
    fixture.write_media("a.png", b"first");
    fixture.write_media("b.png", b"second");
    // The first staging attempt is rejected, every later one succeeds.
    Mock::given(method("POST"))
        .and(path("/api/uploads"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"description": "broken"})))
        .up_to_n_times(1)
        .mount(&fixture.server)
        .await;
    fixture.mock_stage("abc").await;
    fixture
        .mock_reverse_search(json!({"exactPost": null, "similarPosts": []}))
        .await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .mount(&fixture.server)
        .await;

    let summary = fixture
        .uploader(DryRun::INACTIVE, false)
        .run(&[fixture.source.path().to_path_buf()])
        .await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.uploaded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(fs::read_dir(fixture.failsafe.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn empty_root_reports_zero_items() {
    let fixture = Fixture::new().await;

    let summary = fixture
        .uploader(DryRun::INACTIVE, false)
        .run(&[fixture.source.path().to_path_buf()])
        .await;

    assert_eq!(summary, RunSummary::default());
}

#[tokio::test]
async fn run_sweeps_emptied_directories_but_keeps_the_root() {
    let fixture = Fixture::new().await;
    fixture.write_media("sub/cat.png", b"pixels");
    fixture.mock_stage("abc").await;
    fixture
        .mock_reverse_search(json!({
            "exactPost": {"id": 42},
            "similarPosts": []
        }))
        .await;

    let summary = fixture
        .uploader(DryRun::INACTIVE, true)
        .run(&[fixture.source.path().to_path_buf()])
        .await;

    assert_eq!(summary.skipped_duplicates, 1);
    assert!(!fixture.source.path().join("sub").exists());
    assert!(fixture.source.path().exists());
}

#[tokio::test]
async fn delete_range_reports_per_id_failures_and_continues() {
    let fixture = Fixture::new().await;
    for id in [1u64, 3] {
        Mock::given(method("DELETE"))
            .and(path(format!("/api/post/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&fixture.server)
            .await;
    }
    Mock::given(method("DELETE"))
        .and(path("/api/post/2"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"description": "gone"})))
        .mount(&fixture.server)
        .await;

    let client = SzuruClient::new(&fixture.server.uri(), "secret", false, DryRun::INACTIVE).unwrap();
    let deleted = delete_range(&client, 1, 3).await;

    assert_eq!(deleted, 2);
}
