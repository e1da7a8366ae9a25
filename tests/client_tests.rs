// tests/client_tests.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use lessons_frontend::{
    backend::{
        Backend, Filter, Identity, MemoryBackend, ObjectStorage, Query, Row, TableService, to_row,
    },
    config::Config,
    error::AppError,
    models::{attempt::ContentRef, parent_override::ParentOverrideForm, profile::Role},
    services::{ClientSettings, LessonsClient},
};
use serde_json::json;

struct TestClient {
    backend: Arc<MemoryBackend>,
    client: LessonsClient,
}

fn row(value: serde_json::Value) -> Row {
    to_row(&value).unwrap()
}

fn test_client() -> TestClient {
    let backend = Arc::new(MemoryBackend::new());
    let client = LessonsClient::new(
        Backend::from_shared(backend.clone()),
        reqwest::Client::new(),
        ClientSettings::from(&Config::default()),
    );
    TestClient { backend, client }
}

async fn add_member(backend: &MemoryBackend, name: &str, role: &str) -> Identity {
    let user = backend
        .add_user(&format!("{}@example.com", name), "password123")
        .await;
    backend
        .seed(
            "profiles",
            vec![row(json!({
                "user_id": user.id,
                "display_name": name,
                "role": role,
            }))],
        )
        .await;
    user
}

/// Week 1 with two lessons for each of two kids.
async fn seed_week(backend: &MemoryBackend, kid_a: &str, kid_b: &str) {
    backend
        .seed(
            "weeks",
            vec![
                row(json!({"id": 1, "label": "Week 1", "start_date": "2024-09-02", "end_date": "2024-09-08"})),
                row(json!({"id": 2, "label": "Week 2", "start_date": "2024-09-09", "end_date": "2024-09-15"})),
            ],
        )
        .await;
    backend
        .seed(
            "lessons",
            vec![
                row(json!({"id": 10, "week_id": 1, "title": "Fractions", "for_user": kid_a})),
                row(json!({"id": 11, "week_id": 1, "title": "Decimals", "for_user": kid_a})),
                row(json!({"id": 12, "week_id": 1, "title": "Volcanoes", "for_user": kid_b})),
                row(json!({"id": 20, "week_id": 2, "title": "Poetry", "for_user": kid_b})),
            ],
        )
        .await;
}

// --- Weeks & lessons ---

#[tokio::test]
async fn test_active_week_and_week_listing() {
    let t = test_client();
    seed_week(&t.backend, "a", "b").await;

    let day = NaiveDate::from_ymd_opt(2024, 9, 11).unwrap();
    let active = t.client.get_active_week_on(day).await.unwrap().unwrap();
    assert_eq!(active.id, 2);
    assert!(active.contains(day));

    let gap = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    assert!(t.client.get_active_week_on(gap).await.unwrap().is_none());

    let weeks = t.client.list_weeks(None).await.unwrap();
    let ids: Vec<i64> = weeks.iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![2, 1]);

    let latest = t.client.list_weeks(Some(1)).await.unwrap();
    assert_eq!(latest.len(), 1);
}

#[tokio::test]
async fn test_students_only_see_their_own_lessons() {
    let t = test_client();
    let kid = add_member(&t.backend, "kid", "student").await;
    let sibling = add_member(&t.backend, "sibling", "student").await;
    seed_week(&t.backend, &kid.id, &sibling.id).await;

    t.backend.sign_in_as(kid.clone()).await;
    let lessons = t.client.list_lessons_for_current_user(1).await.unwrap();

    let ids: Vec<i64> = lessons.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![10, 11]);
    assert!(lessons.iter().all(|l| l.for_user == kid.id));
}

#[tokio::test]
async fn test_parents_see_every_lesson() {
    let t = test_client();
    let parent = add_member(&t.backend, "parent", "parent").await;
    seed_week(&t.backend, "a", "b").await;

    t.backend.sign_in_as(parent).await;
    let lessons = t.client.list_lessons_for_current_user(1).await.unwrap();
    assert_eq!(lessons.len(), 3);

    let grouped = t.client.list_all_lessons(1).await.unwrap();
    let order: Vec<(String, i64)> = grouped.iter().map(|l| (l.for_user.clone(), l.id)).collect();
    assert_eq!(
        order,
        vec![
            ("a".to_string(), 10),
            ("a".to_string(), 11),
            ("b".to_string(), 12)
        ]
    );
}

#[tokio::test]
async fn test_no_user_or_profile_means_no_lessons() {
    let t = test_client();
    seed_week(&t.backend, "a", "b").await;

    assert!(t.client.list_lessons_for_current_user(1).await.unwrap().is_empty());

    let stranger = t.backend.add_user("stranger@example.com", "pw").await;
    t.backend.sign_in_as(stranger).await;
    assert!(t.client.list_lessons_for_current_user(1).await.unwrap().is_empty());
    assert_eq!(t.backend.call_count("select", "lessons").await, 0);
}

#[tokio::test]
async fn test_list_students() {
    let t = test_client();
    add_member(&t.backend, "kid", "student").await;
    add_member(&t.backend, "parent", "parent").await;

    let students = t.client.list_students().await.unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].display_name, "kid");
    assert_eq!(students[0].role, Role::Student);
}

// --- Auth ---

#[tokio::test]
async fn test_password_sign_in_and_profile() {
    let t = test_client();
    let parent = add_member(&t.backend, "parent", "parent").await;

    let err = t
        .client
        .sign_in_with_password("parent@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AuthError(_)));
    assert!(t.client.current_user_with_profile().await.unwrap().is_none());

    let session = t
        .client
        .sign_in_with_password("parent@example.com", "password123")
        .await
        .unwrap();
    assert_eq!(session.user.id, parent.id);

    let me = t.client.current_user_with_profile().await.unwrap().unwrap();
    assert_eq!(me.profile.unwrap().role, Role::Parent);
    assert!(t.client.require_parent().await.is_ok());

    t.client.sign_out().await.unwrap();
    assert!(matches!(
        t.client.require_parent().await,
        Err(AppError::AuthError(_))
    ));
}

#[tokio::test]
async fn test_students_are_not_parents() {
    let t = test_client();
    let kid = add_member(&t.backend, "kid", "student").await;
    t.backend.sign_in_as(kid).await;

    assert!(matches!(
        t.client.require_parent().await,
        Err(AppError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_email_code_uses_configured_redirect() {
    let t = test_client();

    t.client.sign_in_with_email_code("kid@example.com").await.unwrap();
    let sent = t.backend.codes_sent().await;
    assert_eq!(
        sent,
        vec![(
            "kid@example.com".to_string(),
            Config::default().email_redirect_to
        )]
    );

    let err = t.client.sign_in_with_email_code("not-an-email").await.unwrap_err();
    assert!(matches!(err, AppError::AuthError(msg) if msg.contains("email")));
}

// --- Attempts ---

#[tokio::test]
async fn test_start_then_submit_attempt() {
    let t = test_client();
    let kid = add_member(&t.backend, "kid", "student").await;
    t.backend.sign_in_as(kid.clone()).await;

    let attempt = t.client.start_attempt(ContentRef::Lesson(10)).await.unwrap();
    assert_eq!(attempt.user_id, kid.id);
    assert_eq!(attempt.content, ContentRef::Lesson(10));
    assert!(!attempt.is_submitted());

    let submitted = t
        .client
        .submit_attempt(attempt.id, 8.0, Some(json!({"q1": "right"})))
        .await
        .unwrap();
    assert!(submitted.is_submitted());
    assert_eq!(submitted.score, Some(8.0));

    // Submitted attempts are never changed again.
    let again = t.client.submit_attempt(attempt.id, 10.0, None).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
    let stored = t.backend.rows("attempts").await;
    assert_eq!(stored[0]["score"], json!(8.0));
}

#[tokio::test]
async fn test_start_attempt_requires_sign_in() {
    let t = test_client();
    let err = t.client.start_attempt(ContentRef::Test(3)).await.unwrap_err();
    assert!(matches!(err, AppError::AuthError(_)));
    assert_eq!(t.backend.call_count("insert", "attempts").await, 0);
}

#[tokio::test]
async fn test_record_attempt_stores_exactly_one_target() {
    let t = test_client();

    let attempt = t
        .client
        .record_attempt(ContentRef::Test(5), "kid-1", 9.5)
        .await
        .unwrap();
    assert_eq!(attempt.content, ContentRef::Test(5));
    assert!(attempt.is_submitted());

    let stored = &t.backend.rows("attempts").await[0];
    assert_eq!(stored["test_id"], json!(5));
    assert!(stored["lesson_id"].is_null());
}

#[tokio::test]
async fn test_list_attempts() {
    let t = test_client();
    seed_week(&t.backend, "kid-1", "kid-2").await;
    for (lesson, user) in [(10, "kid-1"), (11, "kid-1"), (12, "kid-2"), (20, "kid-2")] {
        t.client
            .record_attempt(ContentRef::Lesson(lesson), user, 1.0)
            .await
            .unwrap();
    }

    let for_lessons = t.client.list_attempts_for_lessons(&[10, 12]).await.unwrap();
    assert_eq!(for_lessons.len(), 2);

    let before = t.backend.calls().await.len();
    assert!(t.client.list_attempts_for_lessons(&[]).await.unwrap().is_empty());
    assert_eq!(t.backend.calls().await.len(), before);

    let kid_two_week_one = t
        .client
        .list_attempts_for_user(Some("kid-2"), Some(1))
        .await
        .unwrap();
    assert_eq!(kid_two_week_one.len(), 1);
    assert_eq!(kid_two_week_one[0].content, ContentRef::Lesson(12));

    let everyone = t.client.list_attempts_for_user(None, None).await.unwrap();
    assert_eq!(everyone.len(), 4);

    assert!(t
        .client
        .list_attempts_for_user(None, Some(99))
        .await
        .unwrap()
        .is_empty());
}

// --- Retakes ---

#[tokio::test]
async fn test_retake_needs_submission_and_grant() {
    let t = test_client();

    let status = t.client.get_retake_status("kid-1", 10).await.unwrap();
    assert!(!status.can_retake);

    t.client.grant_retake("kid-1", 10).await.unwrap();
    assert!(!t.client.get_retake_status("kid-1", 10).await.unwrap().can_retake);

    t.client
        .record_attempt(ContentRef::Lesson(10), "kid-1", 4.0)
        .await
        .unwrap();
    assert!(t.client.get_retake_status("kid-1", 10).await.unwrap().can_retake);

    // Grants are per user and lesson.
    assert!(!t.client.get_retake_status("kid-2", 10).await.unwrap().can_retake);
    assert!(!t.client.get_retake_status("kid-1", 11).await.unwrap().can_retake);
}

#[tokio::test]
async fn test_one_grant_is_consumed_once() {
    let t = test_client();
    t.client.grant_retake("kid-1", 10).await.unwrap();

    assert!(t.client.use_one_retake("kid-1", 10).await.unwrap());
    assert!(!t.client.use_one_retake("kid-1", 10).await.unwrap());

    let grants = t.backend.rows("retake_grants").await;
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0]["used"], json!(true));
}

#[tokio::test]
async fn test_two_grants_allow_two_retakes() {
    let t = test_client();
    t.client.grant_retake("kid-1", 10).await.unwrap();
    t.client.grant_retake("kid-1", 10).await.unwrap();

    assert!(t.client.use_one_retake("kid-1", 10).await.unwrap());
    assert!(t.client.use_one_retake("kid-1", 10).await.unwrap());
    assert!(!t.client.use_one_retake("kid-1", 10).await.unwrap());
}

#[tokio::test]
async fn test_retake_backend_failure_reports_false() {
    let t = test_client();
    t.client.grant_retake("kid-1", 10).await.unwrap();

    t.backend.set_fail_writes(true);
    assert!(!t.client.use_one_retake("kid-1", 10).await.unwrap());

    t.backend.set_fail_writes(false);
    assert!(t.client.use_one_retake("kid-1", 10).await.unwrap());
}

// --- Parent overrides ---

#[tokio::test]
async fn test_override_is_created_then_replaced() {
    let t = test_client();

    let first = ParentOverrideForm {
        completed: true,
        score: "85".to_string(),
        attempts: String::new(),
        note: "worked on paper".to_string(),
    };
    let saved = t.client.save_override(10, "kid-1", first).await.unwrap();
    assert_eq!(saved.score_override, Some(85.0));
    assert_eq!(saved.attempts_override, None);

    let reverted = t
        .client
        .save_override(10, "kid-1", ParentOverrideForm::cleared())
        .await
        .unwrap();
    assert!(!reverted.completed);
    assert_eq!(reverted.score_override, None);
    assert_eq!(reverted.notes, None);

    assert_eq!(t.backend.rows("lesson_parent_overrides").await.len(), 1);
    let stored = t.client.get_override(10, "kid-1").await.unwrap().unwrap();
    assert_eq!(stored, reverted);
    assert!(t.client.get_override(10, "kid-2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_override_numbers_are_rejected_before_saving() {
    let t = test_client();
    let form = ParentOverrideForm {
        attempts: "two".to_string(),
        ..ParentOverrideForm::default()
    };

    let err = t.client.save_override(10, "kid-1", form).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(t.backend.call_count("upsert", "lesson_parent_overrides").await, 0);
}

#[tokio::test]
async fn test_provider_error_is_surfaced_and_save_can_be_retried() {
    let t = test_client();
    t.backend.set_fail_writes(true);

    let err = t
        .client
        .save_override(10, "kid-1", ParentOverrideForm::cleared())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Backend(msg) if msg.contains("simulated")));
    assert!(!t.client.override_save_in_flight(10, "kid-1"));

    t.backend.set_fail_writes(false);
    assert!(
        t.client
            .save_override(10, "kid-1", ParentOverrideForm::cleared())
            .await
            .is_ok()
    );
}

/// Delays upserts so a save stays in flight.
struct SlowUpserts {
    inner: Arc<MemoryBackend>,
    delay: Duration,
}

#[async_trait]
impl TableService for SlowUpserts {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, AppError> {
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, AppError> {
        self.inner.insert(table, rows).await
    }

    async fn update(
        &self,
        table: &str,
        patch: Row,
        filters: &[Filter],
    ) -> Result<Vec<Row>, AppError> {
        self.inner.update(table, patch, filters).await
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Row>,
        on_conflict: &[&str],
    ) -> Result<Vec<Row>, AppError> {
        tokio::time::sleep(self.delay).await;
        self.inner.upsert(table, rows, on_conflict).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_double_submit_is_refused_while_saving() {
    let memory = Arc::new(MemoryBackend::new());
    let backend = Backend {
        auth: memory.clone(),
        tables: Arc::new(SlowUpserts {
            inner: memory.clone(),
            delay: Duration::from_millis(200),
        }),
        storage: memory.clone(),
    };
    let client = LessonsClient::new(
        backend,
        reqwest::Client::new(),
        ClientSettings::from(&Config::default()),
    );

    let form = ParentOverrideForm {
        completed: true,
        ..ParentOverrideForm::default()
    };
    let (first, second, other_student) = tokio::join!(
        client.save_override(10, "kid-1", form.clone()),
        client.save_override(10, "kid-1", form.clone()),
        client.save_override(10, "kid-2", form.clone()),
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(AppError::Conflict(_))));
    assert!(other_student.is_ok());
    assert!(!client.override_save_in_flight(10, "kid-1"));
    assert_eq!(memory.call_count("upsert", "lesson_parent_overrides").await, 2);

    // Once the first save settled the pair is free again.
    assert!(client.save_override(10, "kid-1", form).await.is_ok());
}

// --- Content ---

#[tokio::test]
async fn test_signed_url_is_scoped_to_content_bucket() {
    let t = test_client();
    let settings = ClientSettings::from(&Config::default());

    let url = t
        .backend
        .create_signed_download_url(
            &settings.content_bucket,
            "lessons/week1/fractions.md",
            settings.signed_url_ttl,
        )
        .await
        .unwrap();

    assert!(url.path().ends_with("/content/lessons/week1/fractions.md"));
    assert_eq!(url.query(), Some("expires_in=120"));
}
