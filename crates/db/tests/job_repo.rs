use mediaflow_db::models::job::{CreateJob, INITIAL_STATUS_MESSAGE, PENDING_ENDPOINT};
use mediaflow_db::models::status::JobStatus;
use mediaflow_db::repositories::JobRepo;
use serde_json::json;
use sqlx::SqlitePool;

fn new_job(title: &str) -> CreateJob {
    CreateJob {
        title: title.to_string(),
        endpoint: PENDING_ENDPOINT.to_string(),
        params: json!({}),
        conversation_id: None,
        message_id: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn created_job_is_pending_at_zero(pool: SqlitePool) {
    let job = JobRepo::create(&pool, &new_job("first")).await.unwrap();

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.progress, 0);
    assert_eq!(job.status_message, INITIAL_STATUS_MESSAGE);
    assert_eq!(job.endpoint, PENDING_ENDPOINT);
    assert!(job.result.is_none());

    let found = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(found.id, job.id);
}

#[sqlx::test(migrations = "./migrations")]
async fn progress_never_moves_backwards(pool: SqlitePool) {
    let job = JobRepo::create(&pool, &new_job("p")).await.unwrap();

    assert!(JobRepo::update_progress(&pool, job.id, 60, "dispatching").await.unwrap());
    assert!(JobRepo::update_progress(&pool, job.id, 20, "late write").await.unwrap());

    let found = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(found.status, JobStatus::Processing);
    assert_eq!(found.progress, 60);
    assert_eq!(found.status_message, "late write");
}

#[sqlx::test(migrations = "./migrations")]
async fn completion_sets_result_and_full_progress(pool: SqlitePool) {
    let job = JobRepo::create(&pool, &new_job("c")).await.unwrap();
    JobRepo::set_operation(&pool, job.id, "/transcribe", &json!({"media_url": "x"}))
        .await
        .unwrap();

    assert!(JobRepo::complete(&pool, job.id, &json!({"text": "hi"})).await.unwrap());

    let found = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(found.status, JobStatus::Completed);
    assert_eq!(found.progress, 100);
    assert_eq!(found.endpoint, "/transcribe");
    assert_eq!(found.params, json!({"media_url": "x"}));
    assert_eq!(found.result, Some(json!({"text": "hi"})));
}

#[sqlx::test(migrations = "./migrations")]
async fn terminal_jobs_reject_further_writes(pool: SqlitePool) {
    let job = JobRepo::create(&pool, &new_job("t")).await.unwrap();
    assert!(JobRepo::fail(&pool, job.id, "boom").await.unwrap());

    assert!(!JobRepo::update_progress(&pool, job.id, 50, "again").await.unwrap());
    assert!(!JobRepo::complete(&pool, job.id, &json!({})).await.unwrap());
    assert!(!JobRepo::fail(&pool, job.id, "twice").await.unwrap());
    assert!(!JobRepo::set_operation(&pool, job.id, "/x", &json!({})).await.unwrap());

    let found = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(found.status, JobStatus::Failed);
    assert_eq!(found.status_message, "boom");
    assert!(found.result.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn writes_to_unknown_job_affect_nothing(pool: SqlitePool) {
    let id = uuid::Uuid::new_v4();
    assert!(!JobRepo::update_progress(&pool, id, 10, "x").await.unwrap());
    assert!(JobRepo::find_by_id(&pool, id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn list_recent_is_newest_first_and_bounded(pool: SqlitePool) {
    for i in 0..5 {
        JobRepo::create(&pool, &new_job(&format!("job {i}"))).await.unwrap();
    }

    let jobs = JobRepo::list_recent(&pool, Some(3)).await.unwrap();
    let titles: Vec<_> = jobs.iter().map(|j| j.title.as_str()).collect();
    assert_eq!(titles, vec!["job 4", "job 3", "job 2"]);

    assert_eq!(JobRepo::list_recent(&pool, None).await.unwrap().len(), 5);
}
