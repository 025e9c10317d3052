mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{harness, CannedDispatcher, FixedIntent, RecordingTransport, Setup};
use mediaflow_core::catalog::{ENDPOINT_AUDIO_CONCATENATE, ENDPOINT_TOOLKIT_TEST, ENDPOINT_VIDEO_THUMBNAIL};
use mediaflow_core::error::CoreError;
use mediaflow_core::uploads::FileClass;
use mediaflow_db::models::status::{JobStatus, MessageRole};
use mediaflow_db::repositories::ConversationRepo;
use mediaflow_pipeline::error::StoreError;
use mediaflow_pipeline::JobKind;
use serde_json::json;

#[tokio::test]
async fn successful_dispatch_completes_job_and_records_reply() {
    let h = harness(Setup {
        dispatcher: Some(Arc::new(CannedDispatcher(Ok(json!({"response": "pong"}))))),
        ..Setup::default()
    })
    .await;
    let conversation = h.conversation().await;

    let job = h
        .run(
            Some(conversation),
            JobKind::Intent {
                message: "Teste die API".into(),
                uploads: vec![],
            },
        )
        .await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.endpoint, ENDPOINT_TOOLKIT_TEST);
    assert_eq!(job.result, Some(json!({"response": "pong"})));

    let messages = ConversationRepo::list_messages(&h.pool, conversation).await.unwrap();
    let reply = messages.last().unwrap();
    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.data.as_ref().unwrap()["result"], json!({"response": "pong"}));
}

#[tokio::test]
async fn dispatch_error_fails_job_without_result() {
    let h = harness(Setup {
        dispatcher: Some(Arc::new(CannedDispatcher(Err("HTTP 400: bad media_url".into())))),
        ..Setup::default()
    })
    .await;

    let job = h.run_message("Teste die API", vec![]).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.result.is_none());
    assert!(job.status_message.contains("HTTP 400: bad media_url"), "{}", job.status_message);
}

#[tokio::test]
async fn low_confidence_asks_to_rephrase() {
    let h = harness(Setup::default()).await;
    let conversation = h.conversation().await;

    let job = h
        .run(
            Some(conversation),
            JobKind::Intent {
                message: "hallo".into(),
                uploads: vec![],
            },
        )
        .await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.status_message.contains("rephrase"));
    assert!(h.transport.calls().is_empty());

    let messages = ConversationRepo::list_messages(&h.pool, conversation).await.unwrap();
    assert!(messages.last().unwrap().text.contains("rephrase"));
}

#[tokio::test]
async fn api_test_succeeds_when_backend_unreachable() {
    let h = harness(Setup {
        transport: RecordingTransport::unreachable(),
        ..Setup::default()
    })
    .await;

    let job = h.run_message("Teste die API", vec![]).await;

    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert_eq!(result["status"], json!("online"));
    assert_eq!(result["mode"], json!("mock"));
    assert_eq!(h.transport.calls(), vec!["GET /v1/toolkit/endpoints"]);
}

#[tokio::test]
async fn api_test_reports_live_capabilities() {
    let h = harness(Setup {
        transport: RecordingTransport::ok(json!({"endpoints": ["/audio-mixing"]})),
        ..Setup::default()
    })
    .await;

    let job = h.run_message("Teste die API", vec![]).await;

    let result = job.result.unwrap();
    assert_eq!(result["mode"], json!("live"));
    assert_eq!(result["endpoints"], json!({"endpoints": ["/audio-mixing"]}));
}

#[tokio::test]
async fn three_identical_uploads_concatenate_locally_in_order() {
    let h = harness(Setup::default()).await;
    let file = h.upload("clip.mp3", b"ABC", FileClass::Audio);
    let uploads = vec![file.clone(), file.clone(), file];

    let job = h.run_message("Füge die Dateien zusammen", uploads).await;

    assert_eq!(job.status, JobStatus::Completed, "{}", job.status_message);
    assert_eq!(job.endpoint, ENDPOINT_AUDIO_CONCATENATE);
    let result = job.result.unwrap();
    assert_eq!(result["source"], json!("local"));
    assert_eq!(result["size"], json!(9));

    let stored = result["stored_filename"].as_str().unwrap();
    let bytes = std::fs::read(h.paths.path_for(stored)).unwrap();
    assert_eq!(bytes, b"ABCABCABC");
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn concatenation_goes_remote_without_ffmpeg() {
    let h = harness(Setup {
        ffmpeg: false,
        ..Setup::default()
    })
    .await;
    let file = h.upload("clip.mp3", b"ABC", FileClass::Audio);

    let job = h
        .run_message("merge these", vec![file.clone(), file.clone(), file])
        .await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result, Some(json!({"response": "remote"})));
    assert_eq!(h.transport.calls(), vec![format!("POST {ENDPOINT_AUDIO_CONCATENATE}")]);
}

#[tokio::test]
async fn missing_upload_file_fails_with_file_not_found() {
    let h = harness(Setup::default()).await;
    let a = h.upload("a.mp3", b"A", FileClass::Audio);
    let b = h.upload("b.mp3", b"B", FileClass::Audio);
    std::fs::remove_file(h.paths.path_for(&b.stored_filename)).unwrap();

    let job = h.run_message("combine", vec![a, b]).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.status_message.contains("file not found"), "{}", job.status_message);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn single_file_concatenation_runs_locally() {
    let h = harness(Setup {
        intent: Some(FixedIntent::new(
            ENDPOINT_AUDIO_CONCATENATE,
            json!({"audio_urls": ["http://localhost:5000/uploads/solo.mp3"]}),
        )),
        ..Setup::default()
    })
    .await;
    h.upload("solo.mp3", b"ABC", FileClass::Audio);

    let job = h.run_message("join it", vec![]).await;

    assert_eq!(job.status, JobStatus::Completed, "{}", job.status_message);
    let result = job.result.unwrap();
    assert_eq!(result["source"], json!("local"));
    let stored = result["stored_filename"].as_str().unwrap();
    assert_eq!(std::fs::read(h.paths.path_for(stored)).unwrap(), b"ABC");
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn failing_screenshot_tool_fails_job_without_remote_call() {
    let h = harness(Setup {
        broken_tools: true,
        ..Setup::default()
    })
    .await;

    let job = h.run_message("Screenshot von https://github.com", vec![]).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.result.is_none());
    assert!(
        job.status_message.contains("website screenshot failed"),
        "{}",
        job.status_message
    );
    assert!(job.status_message.contains("page crashed"), "{}", job.status_message);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn failing_frame_grab_fails_job_without_remote_call() {
    let h = harness(Setup {
        broken_tools: true,
        intent: Some(FixedIntent::new(
            ENDPOINT_VIDEO_THUMBNAIL,
            json!({"video_url": "http://localhost:5000/uploads/clip.mp4"}),
        )),
        ..Setup::default()
    })
    .await;
    h.upload("clip.mp4", b"VIDEO", FileClass::Video);

    let job = h.run_message("thumbnail please", vec![]).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(
        job.status_message.contains("thumbnail extraction failed"),
        "{}",
        job.status_message
    );
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn video_share_urls_are_fetched_before_dispatch() {
    let h = harness(Setup::default()).await;

    let job = h
        .run_message("transcribe https://www.youtube.com/watch?v=abc", vec![])
        .await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        job.params["media_url"],
        json!("http://localhost:5000/uploads/fetched.mp4")
    );
}

#[tokio::test]
async fn failed_fetch_fails_job() {
    let h = harness(Setup::default()).await;

    let job = h.run_message("transcribe https://youtu.be/broken", vec![]).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.status_message.starts_with("video download failed"));
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn terminal_jobs_reject_further_writes() {
    let h = harness(Setup {
        dispatcher: Some(Arc::new(CannedDispatcher(Ok(json!({}))))),
        ..Setup::default()
    })
    .await;
    let job = h.run_message("Teste die API", vec![]).await;
    assert_eq!(job.status, JobStatus::Completed);

    assert_matches!(
        h.store.fail(job.id, "late").await,
        Err(StoreError::Core(CoreError::Conflict(_)))
    );
    assert_matches!(
        h.store.progress(job.id, 50, "late").await,
        Err(StoreError::Core(CoreError::Conflict(_)))
    );
    let after = h.store.get(job.id).await.unwrap().unwrap();
    assert_eq!(after.status, JobStatus::Completed);
    assert_eq!(after.progress, 100);
}
