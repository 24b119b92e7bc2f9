//! Integration tests for harvest runs
//!
//! These tests use wiremock to serve listing, detail and PDF pages and run
//! the coordinator end-to-end against a temporary data directory.

mod common;

use async_trait::async_trait;
use common::*;
use policy_harvest::archive::{Manifest, MANIFEST_FILE};
use policy_harvest::crawler::{Coordinator, RunOptions};
use policy_harvest::lock::{lock_path, RunLock};
use policy_harvest::notify::{DeliveryStatus, NotificationReceipt, Notifier};
use policy_harvest::storage::{ArchiveRecord, Storage};
use policy_harvest::{HarvestError, ModuleStatus, RunMode, RunStatus};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Remembers which documents it was asked to deliver
#[derive(Clone, Default)]
struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, records: &[ArchiveRecord]) -> Vec<NotificationReceipt> {
        let mut delivered = self.delivered.lock().unwrap();
        records
            .iter()
            .map(|record| {
                delivered.push(record.doc_id.clone());
                NotificationReceipt {
                    channel: "test".to_string(),
                    doc_id: record.doc_id.clone(),
                    status: DeliveryStatus::Delivered,
                    response: None,
                }
            })
            .collect()
    }
}

fn options(mode: RunMode) -> RunOptions {
    RunOptions {
        mode: Some(mode),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_thirty_references_two_new_with_default_threshold() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path(), &[ModuleSpec::new("central")], 3);

    mount_listing(&server, "central", 30).await;
    mount_detail(&server, "central", 5, 1).await;
    mount_detail(&server, "central", 17, 1).await;
    seed_known(
        &dir.path().join("harvest.db"),
        "central",
        (1..=30).filter(|n| *n != 5 && *n != 17),
    );

    let mut coordinator = Coordinator::new(config, options(RunMode::Incremental), "hash").unwrap();
    let summary = coordinator.run().await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.record.new_doc_count, 2);
    assert_eq!(summary.record.total_scanned_count, 30);

    let module = summary.module("central").unwrap();
    assert_eq!(module.archived.len(), 2);
    assert_eq!(module.resets, 2);
    assert_eq!(module.status, ModuleStatus::Completed);
    assert_eq!(module.last_page_reached, 3);

    // Three pages of ten; nothing past the last one is requested
    assert_eq!(request_count(&server, &listing_path("central", 3)).await, 1);
    assert_eq!(request_count(&server, &listing_path("central", 4)).await, 0);

    let archived: Vec<_> = module.archived.iter().map(|r| r.doc_id.as_str()).collect();
    assert_eq!(archived, vec!["t005", "t017"]);
}

#[tokio::test]
async fn test_incremental_stops_early_and_full_finds_the_rest() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(
        &server.uri(),
        dir.path(),
        &[ModuleSpec::new("central").threshold(5)],
        3,
    );

    mount_listing(&server, "central", 30).await;
    mount_detail(&server, "central", 25, 1).await;
    seed_known(
        &dir.path().join("harvest.db"),
        "central",
        (1..=30).filter(|n| *n != 25),
    );

    let mut coordinator =
        Coordinator::new(config.clone(), options(RunMode::Incremental), "hash").unwrap();
    let summary = coordinator.run().await.unwrap();

    // Known limitation: the new document sits behind five known ones
    assert!(summary.is_success());
    assert_eq!(summary.record.new_doc_count, 0);
    assert_eq!(summary.record.total_scanned_count, 5);
    assert_eq!(summary.module("central").unwrap().status, ModuleStatus::StoppedEarly);
    assert_eq!(request_count(&server, &listing_path("central", 2)).await, 0);
    drop(coordinator);

    let mut coordinator = Coordinator::new(config, options(RunMode::Full), "hash").unwrap();
    let summary = coordinator.run().await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.record.mode, RunMode::Full);
    assert_eq!(summary.record.new_doc_count, 1);
    assert_eq!(summary.record.total_scanned_count, 30);
    let module = summary.module("central").unwrap();
    assert_eq!(module.status, ModuleStatus::Completed);
    assert_eq!(module.archived[0].doc_id, "t025");
    assert!(module.resume_page.is_none());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path(), &[ModuleSpec::new("central")], 3);

    mount_listing(&server, "central", 3).await;
    for n in 1..=3 {
        mount_detail(&server, "central", n, 1).await;
    }

    let notifier = RecordingNotifier::default();

    let mut coordinator = Coordinator::new(config.clone(), RunOptions::default(), "hash")
        .unwrap()
        .with_notifier(Box::new(notifier.clone()));
    let first = coordinator.run().await.unwrap();
    assert!(first.is_success());
    assert_eq!(first.record.new_doc_count, 3);
    assert_eq!(first.receipts.len(), 3);
    drop(coordinator);

    let mut coordinator = Coordinator::new(config, RunOptions::default(), "hash")
        .unwrap()
        .with_notifier(Box::new(notifier.clone()));
    let second = coordinator.run().await.unwrap();
    assert!(second.is_success());
    assert_eq!(second.record.new_doc_count, 0);
    assert_eq!(second.record.total_scanned_count, 3);
    assert!(second.receipts.is_empty());

    assert_eq!(coordinator.storage().count_archive_records().unwrap(), 3);
    assert_eq!(notifier.delivered.lock().unwrap().len(), 3);

    let manifest = Manifest::new(dir.path().join(MANIFEST_FILE));
    assert_eq!(manifest.read_all().unwrap().len(), 3);

    let html = dir
        .path()
        .join("central")
        .join(format!("2024-01-05_{}.html", doc_title(1)));
    assert!(html.exists());

    let latest = coordinator.storage().get_latest_run().unwrap().unwrap();
    assert_eq!(latest.run_id, second.record.run_id);
    assert_eq!(latest.status, RunStatus::Success);
}

#[tokio::test]
async fn test_orphan_file_is_reused_after_crash() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path(), &[ModuleSpec::new("central")], 3);

    mount_listing(&server, "central", 1).await;
    mount_detail(&server, "central", 1, 1).await;

    // Artifact written, but the run died before the manifest append
    let filename = format!("2024-01-05_{}.html", doc_title(1));
    let module_dir = dir.path().join("central");
    std::fs::create_dir_all(&module_dir).unwrap();
    std::fs::write(module_dir.join(&filename), "partial").unwrap();

    let mut coordinator = Coordinator::new(config, RunOptions::default(), "hash").unwrap();
    let summary = coordinator.run().await.unwrap();

    let record = &summary.module("central").unwrap().archived[0];
    assert_eq!(record.local_html_path, format!("central/{}", filename));
    let content = std::fs::read_to_string(module_dir.join(&filename)).unwrap();
    assert!(content.contains("trs_editor_view"));
    assert_eq!(std::fs::read_dir(&module_dir).unwrap().count(), 1);
}

#[tokio::test]
async fn test_manifest_entry_rolls_forward_on_startup() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path(), &[ModuleSpec::new("central")], 3);

    mount_listing(&server, "central", 1).await;
    mount_detail(&server, "central", 1, 0).await;

    // Artifact and manifest line written, database commit lost
    let relative = format!("central/2024-01-05_{}.html", doc_title(1));
    std::fs::create_dir_all(dir.path().join("central")).unwrap();
    std::fs::write(dir.path().join(&relative), "<html></html>").unwrap();
    Manifest::new(dir.path().join(MANIFEST_FILE))
        .append(&ArchiveRecord {
            module_id: "central".to_string(),
            doc_id: doc_id(1),
            title: doc_title(1),
            publish_date: Some("2024-01-05".to_string()),
            source_url: format!("{}{}", server.uri(), detail_path("central", 1)),
            local_html_path: relative,
            local_pdf_path: None,
            doc_number: None,
            department: None,
            asset_note: None,
            fetched_at: chrono::Utc::now(),
        })
        .unwrap();

    let mut coordinator = Coordinator::new(config, RunOptions::default(), "hash").unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.recovery.rolled_forward, 1);
    assert_eq!(summary.record.new_doc_count, 0);
    assert!(coordinator.storage().is_known("central", "t001").unwrap());
}

#[tokio::test]
async fn test_transient_listing_failures_are_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path(), &[ModuleSpec::new("central")], 3);

    Mock::given(method("GET"))
        .and(path(listing_path("central", 1)))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_listing(&server, "central", 2).await;
    mount_detail(&server, "central", 1, 1).await;
    mount_detail(&server, "central", 2, 1).await;

    let mut coordinator = Coordinator::new(config, RunOptions::default(), "hash").unwrap();
    let summary = coordinator.run().await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.record.new_doc_count, 2);
    assert_eq!(request_count(&server, &listing_path("central", 1)).await, 3);
}

#[tokio::test]
async fn test_persistent_failure_uses_exact_attempt_budget() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path(), &[ModuleSpec::new("central")], 3);

    mount_listing(&server, "central", 2).await;
    mount_detail(&server, "central", 1, 1).await;
    Mock::given(method("GET"))
        .and(path(detail_path("central", 2)))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let mut coordinator = Coordinator::new(config, RunOptions::default(), "hash").unwrap();
    let summary = coordinator.run().await.unwrap();

    // Document skips are reported but do not fail the run
    assert!(summary.is_success());
    assert_eq!(summary.record.new_doc_count, 1);
    assert_eq!(summary.module("central").unwrap().skipped, 1);
    assert!(summary
        .record
        .error_summary
        .iter()
        .any(|line| line.starts_with("central/t002: fetch failed")));

    // Skipped documents stay unknown so the next run tries again
    assert!(!coordinator.storage().is_known("central", "t002").unwrap());
}

#[tokio::test]
async fn test_failed_module_does_not_stop_others() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(
        &server.uri(),
        dir.path(),
        &[ModuleSpec::new("broken"), ModuleSpec::new("central")],
        2,
    );

    // Nothing mounted for "broken": its start page is a 404
    mount_listing(&server, "central", 1).await;
    mount_detail(&server, "central", 1, 1).await;

    let notifier = RecordingNotifier::default();
    let mut coordinator = Coordinator::new(config, RunOptions::default(), "hash")
        .unwrap()
        .with_notifier(Box::new(notifier.clone()));
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.record.status, RunStatus::Failed);
    assert!(!summary.record.interrupted);
    assert_eq!(summary.module("broken").unwrap().status, ModuleStatus::Failed);
    assert_eq!(summary.module("central").unwrap().status, ModuleStatus::Completed);
    assert_eq!(summary.record.new_doc_count, 1);
    assert_eq!(summary.record.modules_processed, vec!["broken", "central"]);
    assert!(summary
        .record
        .error_summary
        .iter()
        .any(|line| line.starts_with("broken: listing unreachable")));

    // Notifications only follow successful runs
    assert!(notifier.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_pdf_is_flagged_not_archived() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path(), &[ModuleSpec::new("central")], 3);

    mount_listing(&server, "central", 2).await;
    Mock::given(method("GET"))
        .and(path(detail_path("central", 1)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(detail_html(&doc_title(1), Some("/files/big.pdf"))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(detail_path("central", 2)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(detail_html(&doc_title(2), Some("/files/small.pdf"))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/big.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'%'; 4096]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/small.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 small".to_vec()))
        .mount(&server)
        .await;

    let mut coordinator = Coordinator::new(config, RunOptions::default(), "hash").unwrap();
    let summary = coordinator.run().await.unwrap();
    assert_eq!(summary.record.new_doc_count, 2);

    let big = coordinator
        .storage()
        .get_archive_record("central", "t001")
        .unwrap()
        .unwrap();
    assert!(big.local_pdf_path.is_none());
    assert!(big.asset_note.as_deref().unwrap().starts_with("pdf skipped"));

    let small = coordinator
        .storage()
        .get_archive_record("central", "t002")
        .unwrap()
        .unwrap();
    let pdf = small.local_pdf_path.unwrap();
    assert_eq!(pdf, format!("central/2024-01-05_{}.pdf", doc_title(2)));
    assert_eq!(std::fs::read(dir.path().join(pdf)).unwrap(), b"%PDF-1.4 small");
    assert!(small.asset_note.is_none());
}

#[tokio::test]
async fn test_interrupt_finishes_current_document() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path(), &[ModuleSpec::new("central")], 3);

    mount_listing(&server, "central", 3).await;
    mount_detail(&server, "central", 2, 0).await;
    mount_detail(&server, "central", 3, 0).await;

    let mut coordinator = Coordinator::new(config, options(RunMode::Full), "hash").unwrap();
    let interrupt = coordinator.interrupt_handle();

    // Ctrl+C arrives while the first document is being fetched
    let body = detail_html(&doc_title(1), None);
    Mock::given(method("GET"))
        .and(path(detail_path("central", 1)))
        .respond_with(move |_: &Request| {
            interrupt.store(true, Ordering::SeqCst);
            ResponseTemplate::new(200).set_body_string(body.clone())
        })
        .expect(1)
        .mount(&server)
        .await;

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.record.status, RunStatus::Failed);
    assert!(summary.record.interrupted);
    assert_eq!(summary.record.status_label(), "failed (interrupted)");
    assert_eq!(summary.record.new_doc_count, 1);

    let module = summary.module("central").unwrap();
    assert_eq!(module.status, ModuleStatus::Interrupted);
    assert_eq!(module.resume_page, Some(1));
    assert!(coordinator.storage().is_known("central", "t001").unwrap());

    let progress = coordinator.storage().load_module_progress("central").unwrap();
    assert_eq!(progress.resume_page, Some(1));
}

#[tokio::test]
async fn test_held_lock_fails_fast() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path(), &[ModuleSpec::new("central")], 3);

    let _held = RunLock::acquire(dir.path(), &["central".to_string()]).unwrap();

    let mut coordinator = Coordinator::new(config, RunOptions::default(), "hash").unwrap();
    let result = coordinator.run().await;

    assert!(matches!(result, Err(HarvestError::Lock(_))));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_lock_left_by_dead_process_does_not_block() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path(), &[ModuleSpec::new("central")], 3);

    mount_listing(&server, "central", 3).await;
    for n in 1..=3 {
        mount_detail(&server, "central", n, 1).await;
    }

    // Left behind by a killed run; the pid is beyond any Linux pid_max
    let stale = lock_path(dir.path(), "central");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, "pid=4194305\nstarted=2024-01-05T00:00:00Z\n").unwrap();

    let mut coordinator = Coordinator::new(config, options(RunMode::Incremental), "hash").unwrap();
    let summary = coordinator.run().await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.archived().count(), 3);
    assert!(!stale.exists());
}

#[tokio::test]
async fn test_unknown_module_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = test_config("http://127.0.0.1:9", dir.path(), &[ModuleSpec::new("central")], 1);

    let options = RunOptions {
        modules: vec!["elsewhere".to_string()],
        ..Default::default()
    };
    let result = Coordinator::new(config, options, "hash");
    assert!(matches!(result, Err(HarvestError::UnknownModule(id)) if id == "elsewhere"));
}
