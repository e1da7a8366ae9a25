// src/backend/memory.rs

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use super::{
    AuthService, Filter, FilterOp, Identity, ObjectStorage, Query, Row, Session, TableService,
    ident::ensure_identifier,
};
use crate::error::AppError;

const SIMULATED_FAILURE: &str = "network error (simulated)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub table: String,
}

#[derive(Default)]
struct AuthState {
    users: HashMap<String, (String, Identity)>,
    session: Option<Session>,
    codes_sent: Vec<(String, String)>,
}

/// In-process stand-in for the hosted backend.
///
/// Backs the offline mode of the binary and the test suite. Reads and
/// writes can be made to fail to exercise the error paths.
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    auth: Mutex<AuthState>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    public_base: Url,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            auth: Mutex::new(AuthState::default()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            public_base: Url::parse("http://127.0.0.1/storage/v1/object/")
                .expect("static url is valid"),
        }
    }

    /// Base that signed download links point at.
    pub fn with_public_base(mut self, base: Url) -> Self {
        self.public_base = base;
        self
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }

    /// Registers a password user and returns its identity.
    pub async fn add_user(&self, email: &str, password: &str) -> Identity {
        let identity = Identity {
            id: format!("user-{}", self.next_id.fetch_add(1, AtomicOrdering::SeqCst)),
            email: Some(email.to_string()),
        };
        self.auth
            .lock()
            .await
            .users
            .insert(email.to_string(), (password.to_string(), identity.clone()));
        identity
    }

    /// Puts `identity` in the current session without a password check.
    pub async fn sign_in_as(&self, identity: Identity) {
        self.auth.lock().await.session = Some(Session {
            access_token: format!("token-{}", identity.id),
            user: identity,
        });
    }

    /// Emails a sign-in code was requested for, with their redirect targets.
    pub async fn codes_sent(&self) -> Vec<(String, String)> {
        self.auth.lock().await.codes_sent.clone()
    }

    /// Seeds rows directly, bypassing failure injection and the call log.
    pub async fn seed(&self, table: &str, rows: Vec<Row>) {
        let mut tables = self.tables.lock().await;
        let stored = tables.entry(table.to_string()).or_default();
        for row in rows {
            stored.push(self.with_id(row));
        }
    }

    /// Snapshot of a table, bypassing failure injection and the call log.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    /// Number of `op` calls against `table`, failed ones included.
    pub async fn call_count(&self, op: &str, table: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.op == op && c.table == table)
            .count()
    }

    async fn record(&self, op: &'static str, table: &str) -> Result<(), AppError> {
        ensure_identifier(table)?;
        self.calls.lock().await.push(Call {
            op,
            table: table.to_string(),
        });

        let failing = match op {
            "select" => self.fail_reads.load(AtomicOrdering::SeqCst),
            _ => self.fail_writes.load(AtomicOrdering::SeqCst),
        };
        if failing {
            return Err(AppError::Backend(SIMULATED_FAILURE.to_string()));
        }
        Ok(())
    }

    fn with_id(&self, mut row: Row) -> Row {
        if !row.contains_key("id") {
            let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
            row.insert("id".to_string(), Value::from(id));
        }
        row
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    let cell = row.get(&filter.column).unwrap_or(&Value::Null);
    let ord = || compare(cell, &filter.value);
    match filter.op {
        FilterOp::Eq => ord() == Some(Ordering::Equal),
        FilterOp::Neq => !cell.is_null() && ord() != Some(Ordering::Equal),
        FilterOp::Lt => ord() == Some(Ordering::Less),
        FilterOp::Lte => matches!(ord(), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Gt => ord() == Some(Ordering::Greater),
        FilterOp::Gte => matches!(ord(), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::In => filter
            .value
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .any(|v| compare(cell, v) == Some(Ordering::Equal))
            })
            .unwrap_or(false),
        FilterOp::IsNull => cell.is_null(),
        FilterOp::NotNull => !cell.is_null(),
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches(row, f))
}

/// Nulls sort last in either direction.
fn order_rows(rows: &mut [Row], query: &Query) {
    rows.sort_by(|a, b| {
        for order in &query.order {
            let left = a.get(&order.column).unwrap_or(&Value::Null);
            let right = b.get(&order.column).unwrap_or(&Value::Null);
            let ord = match (left.is_null(), right.is_null()) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => {
                    let ord = compare(left, right).unwrap_or(Ordering::Equal);
                    if order.ascending { ord } else { ord.reverse() }
                }
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn merge(target: &mut Row, patch: &Row) {
    for (column, value) in patch {
        target.insert(column.clone(), value.clone());
    }
}

#[async_trait]
impl TableService for MemoryBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, AppError> {
        self.record("select", table).await?;

        let tables = self.tables.lock().await;
        let mut rows: Vec<Row> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| matches_all(r, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        order_rows(&mut rows, query);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, AppError> {
        self.record("insert", table).await?;

        let mut tables = self.tables.lock().await;
        let stored = tables.entry(table.to_string()).or_default();
        let inserted: Vec<Row> = rows.into_iter().map(|r| self.with_id(r)).collect();
        stored.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn update(
        &self,
        table: &str,
        patch: Row,
        filters: &[Filter],
    ) -> Result<Vec<Row>, AppError> {
        self.record("update", table).await?;

        let mut tables = self.tables.lock().await;
        let mut affected = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| matches_all(r, filters)) {
                merge(row, &patch);
                affected.push(row.clone());
            }
        }
        Ok(affected)
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Row>,
        on_conflict: &[&str],
    ) -> Result<Vec<Row>, AppError> {
        self.record("upsert", table).await?;

        let mut tables = self.tables.lock().await;
        let stored = tables.entry(table.to_string()).or_default();
        let mut result = Vec::with_capacity(rows.len());

        for row in rows {
            let existing = stored.iter_mut().find(|candidate| {
                on_conflict.iter().all(|key| {
                    let left = candidate.get(*key).unwrap_or(&Value::Null);
                    let right = row.get(*key).unwrap_or(&Value::Null);
                    !left.is_null() && compare(left, right) == Some(Ordering::Equal)
                })
            });

            match existing {
                Some(current) => {
                    merge(current, &row);
                    result.push(current.clone());
                }
                None => {
                    let row = self.with_id(row);
                    stored.push(row.clone());
                    result.push(row);
                }
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl AuthService for MemoryBackend {
    async fn sign_in_with_email_code(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AppError> {
        if !email.contains('@') {
            return Err(AppError::AuthError("Unable to validate email address".to_string()));
        }
        self.auth
            .lock()
            .await
            .codes_sent
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, AppError> {
        let mut auth = self.auth.lock().await;
        let identity = match auth.users.get(email) {
            Some((expected, identity)) if expected == password => identity.clone(),
            _ => return Ok(None),
        };
        let session = Session {
            access_token: format!("token-{}", identity.id),
            user: identity,
        };
        auth.session = Some(session.clone());
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.auth.lock().await.session = None;
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<Identity>, AppError> {
        Ok(self.auth.lock().await.session.as_ref().map(|s| s.user.clone()))
    }
}

#[async_trait]
impl ObjectStorage for MemoryBackend {
    async fn create_signed_download_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<Url, AppError> {
        let bucket = ensure_identifier(bucket)?;
        let mut url = self
            .public_base
            .join(&format!("{}/{}", bucket, path.trim_start_matches('/')))
            .map_err(|e| AppError::BadRequest(format!("invalid object path: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("expires_in", &ttl.as_secs().to_string());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::to_row;
    use serde_json::json;

    fn row(value: Value) -> Row {
        to_row(&value).unwrap()
    }

    #[tokio::test]
    async fn select_applies_filters_order_and_limit() {
        let backend = MemoryBackend::new();
        backend
            .seed(
                "weeks",
                vec![
                    row(json!({"id": 1, "start_date": "2024-09-02", "end_date": "2024-09-08"})),
                    row(json!({"id": 2, "start_date": "2024-09-09", "end_date": "2024-09-15"})),
                    row(json!({"id": 3, "start_date": "2024-09-16", "end_date": "2024-09-22"})),
                ],
            )
            .await;

        let query = Query::new()
            .filter(Filter::gte("start_date", "2024-09-09"))
            .order_by("start_date", false)
            .limit(1);
        let rows = backend.select("weeks", &query).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(3));
    }

    #[tokio::test]
    async fn in_and_null_filters() {
        let backend = MemoryBackend::new();
        backend
            .seed(
                "attempts",
                vec![
                    row(json!({"lesson_id": 1, "submitted_at": null})),
                    row(json!({"lesson_id": 2, "submitted_at": "2024-09-10T10:00:00Z"})),
                    row(json!({"lesson_id": 3, "submitted_at": "2024-09-10T11:00:00Z"})),
                ],
            )
            .await;

        let query = Query::new()
            .filter(Filter::is_in("lesson_id", [1, 2]))
            .filter(Filter::not_null("submitted_at"));
        let rows = backend.select("attempts", &query).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["lesson_id"], json!(2));
    }

    #[tokio::test]
    async fn upsert_merges_on_conflict_keys() {
        let backend = MemoryBackend::new();
        let keys = ["lesson_id", "student_id"];

        backend
            .upsert("overrides", vec![row(json!({"lesson_id": 1, "student_id": "s", "completed": false}))], &keys)
            .await
            .unwrap();
        let second = backend
            .upsert("overrides", vec![row(json!({"lesson_id": 1, "student_id": "s", "completed": true}))], &keys)
            .await
            .unwrap();

        let stored = backend.rows("overrides").await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["completed"], json!(true));
        assert_eq!(second[0]["id"], stored[0]["id"]);
    }

    #[tokio::test]
    async fn failing_writes_are_still_logged() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);

        let err = backend
            .insert("attempts", vec![row(json!({"score": 1}))])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Backend(_)));
        assert_eq!(backend.call_count("insert", "attempts").await, 1);
        assert!(backend.rows("attempts").await.is_empty());
    }
}
