// src/backend/mod.rs

//! Seams to the hosted backend.
//!
//! Auth, tabular data and object storage are consumed through the three
//! traits below and never re-implemented. `GatewayClient` talks to a real
//! deployment over HTTP, `MemoryBackend` keeps everything in process.

pub mod gateway;
pub mod ident;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

use crate::error::AppError;

pub use gateway::GatewayClient;
pub use memory::MemoryBackend;

/// One table row as the backend returns it.
pub type Row = serde_json::Map<String, Value>;

/// Authenticated user as reported by the Auth Service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    IsNull,
    NotNull,
}

/// A single column predicate. `value` is unused by `IsNull`/`NotNull`
/// and holds an array for `In`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

impl Filter {
    fn new(column: &str, op: FilterOp, value: Value) -> Self {
        Self {
            column: column.to_string(),
            op,
            value,
        }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value.into())
    }

    pub fn neq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Neq, value.into())
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Lte, value.into())
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Gte, value.into())
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Lt, value.into())
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Gt, value.into())
    }

    pub fn is_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect::<Vec<Value>>();
        Self::new(column, FilterOp::In, Value::Array(values))
    }

    pub fn is_null(column: &str) -> Self {
        Self::new(column, FilterOp::IsNull, Value::Null)
    }

    pub fn not_null(column: &str) -> Self {
        Self::new(column, FilterOp::NotNull, Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Filters, ordering and limit for a `select`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order: Vec<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Sends a one-time sign-in code/link to `email`.
    async fn sign_in_with_email_code(&self, email: &str, redirect_to: &str)
    -> Result<(), AppError>;

    /// `Ok(None)` when the credentials are rejected.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;

    async fn current_user(&self) -> Result<Option<Identity>, AppError>;
}

#[async_trait]
pub trait TableService: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, AppError>;

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, AppError>;

    /// Applies `patch` to every row matching `filters` and returns the
    /// affected rows. An empty result means nothing matched.
    async fn update(&self, table: &str, patch: Row, filters: &[Filter])
    -> Result<Vec<Row>, AppError>;

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Row>,
        on_conflict: &[&str],
    ) -> Result<Vec<Row>, AppError>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn create_signed_download_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<Url, AppError>;
}

/// The backend handle owned by the composition root and passed to every
/// component that needs it.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthService>,
    pub tables: Arc<dyn TableService>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl Backend {
    /// Wraps one object that implements all three services.
    pub fn from_shared<T>(inner: Arc<T>) -> Self
    where
        T: AuthService + TableService + ObjectStorage + 'static,
    {
        Self {
            auth: inner.clone(),
            tables: inner.clone(),
            storage: inner,
        }
    }
}

/// Serializes a record into a row.
pub fn to_row<T: Serialize>(record: &T) -> Result<Row, AppError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::InternalServerError(format!(
            "record did not serialize to an object: {}",
            other
        ))),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, AppError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, AppError> {
    rows.into_iter().map(from_row).collect()
}

/// "maybe single": zero rows is `None`, more than one is a contract error.
pub fn maybe_single<T: DeserializeOwned>(mut rows: Vec<Row>) -> Result<Option<T>, AppError> {
    match rows.len() {
        0 => Ok(None),
        1 => from_row(rows.remove(0)).map(Some),
        n => Err(AppError::Backend(format!(
            "expected at most one row, got {}",
            n
        ))),
    }
}
