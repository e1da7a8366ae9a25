// src/backend/gateway.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tokio::sync::RwLock;
use url::Url;

use super::{
    AuthService, Filter, Identity, ObjectStorage, Query, Row, Session, TableService,
    ident::ensure_identifier,
};
use crate::error::AppError;

/// HTTP client for the hosted backend's JSON gateway.
///
/// Every request carries the public `apikey`; once a password sign-in
/// succeeds the session's bearer token is attached as well. The session
/// lives as long as this client (one per front-end process).
pub struct GatewayClient {
    http: Client,
    base: Url,
    anon_key: String,
    session: RwLock<Option<Session>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrlBody {
    signed_url: String,
}

#[derive(Serialize)]
struct UpdateBody<'a> {
    patch: Row,
    filters: &'a [Filter],
}

impl GatewayClient {
    pub fn new(http: Client, base_url: &str, anon_key: &str) -> Result<Self, AppError> {
        // Url::join drops the last path segment unless the base ends with '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized)
            .map_err(|e| AppError::BadRequest(format!("invalid backend url: {}", e)))?;

        if base.scheme() != "https" && base.scheme() != "http" {
            return Err(AppError::BadRequest(format!(
                "backend url must be http(s), got {}",
                base.scheme()
            )));
        }

        Ok(Self {
            http,
            base,
            anon_key: anon_key.to_string(),
            session: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base
            .join(path)
            .map_err(|e| AppError::InternalServerError(format!("bad endpoint {}: {}", path, e)))
    }

    fn table_endpoint(&self, table: &str, action: &str) -> Result<Url, AppError> {
        let table = ensure_identifier(table)?;
        self.endpoint(&format!("data/v1/{}/{}", table, action))
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("apikey", &self.anon_key);
        match self.session.read().await.as_ref() {
            Some(session) => builder.bearer_auth(&session.access_token),
            None => builder.bearer_auth(&self.anon_key),
        }
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<Response, AppError> {
        let request = self.authorized(self.http.post(url).json(body)).await;
        Ok(request.send().await?)
    }

    async fn rows(&self, url: Url, body: &serde_json::Value) -> Result<Vec<Row>, AppError> {
        let response = self.post_json(url, body).await?;
        parse_json(response).await
    }
}

/// Turns a non-2xx response into the provider's own message.
async fn provider_error(response: Response) -> AppError {
    let status = response.status();
    match response.text().await {
        Ok(text) => match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => AppError::Backend(body.error),
            Err(_) if !text.trim().is_empty() => AppError::Backend(text),
            Err(_) => AppError::Backend(format!("backend responded with {}", status)),
        },
        Err(e) => AppError::from(e),
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    if !response.status().is_success() {
        return Err(provider_error(response).await);
    }
    Ok(response.json::<T>().await?)
}

/// Wrong email or password, as opposed to an account that cannot sign in yet.
fn is_invalid_credentials(msg: &str) -> bool {
    msg.to_ascii_lowercase().contains("invalid login credentials")
}

fn auth_rejection(err: AppError) -> AppError {
    match err {
        AppError::Backend(msg) => AppError::AuthError(msg),
        other => other,
    }
}

#[async_trait]
impl AuthService for GatewayClient {
    async fn sign_in_with_email_code(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AppError> {
        let url = self.endpoint("auth/v1/otp")?;
        let response = self
            .post_json(url, &json!({ "email": email, "redirect_to": redirect_to }))
            .await?;

        if !response.status().is_success() {
            return Err(auth_rejection(provider_error(response).await));
        }
        tracing::info!("Sign-in code requested for {}", email);
        Ok(())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, AppError> {
        let url = self.endpoint("auth/v1/token")?;
        let response = self
            .post_json(url, &json!({ "email": email, "password": password }))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let err = provider_error(response).await;
            let bad_credentials = match &err {
                AppError::Backend(msg) => {
                    status == StatusCode::UNAUTHORIZED
                        || (status == StatusCode::BAD_REQUEST && is_invalid_credentials(msg))
                }
                _ => false,
            };
            if bad_credentials {
                return Ok(None);
            }
            return Err(auth_rejection(err));
        }

        let session: Session = response.json().await?;
        *self.session.write().await = Some(session.clone());
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        let url = self.endpoint("auth/v1/logout")?;
        let result = self.post_json(url, &json!({})).await;
        // The local session is dropped even if the backend call fails.
        self.session.write().await.take();

        let response = result?;
        if !response.status().is_success() && response.status() != StatusCode::UNAUTHORIZED {
            return Err(provider_error(response).await);
        }
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<Identity>, AppError> {
        if self.session.read().await.is_none() {
            return Ok(None);
        }

        let url = self.endpoint("auth/v1/user")?;
        let response = self.authorized(self.http.get(url)).await.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        parse_json(response).await.map(Some)
    }
}

#[async_trait]
impl TableService for GatewayClient {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, AppError> {
        for filter in &query.filters {
            ensure_identifier(&filter.column)?;
        }
        for order in &query.order {
            ensure_identifier(&order.column)?;
        }
        let url = self.table_endpoint(table, "select")?;
        self.rows(url, &serde_json::to_value(query)?).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, AppError> {
        let url = self.table_endpoint(table, "insert")?;
        self.rows(url, &json!({ "rows": rows })).await
    }

    async fn update(
        &self,
        table: &str,
        patch: Row,
        filters: &[Filter],
    ) -> Result<Vec<Row>, AppError> {
        for filter in filters {
            ensure_identifier(&filter.column)?;
        }
        let url = self.table_endpoint(table, "update")?;
        let body = serde_json::to_value(UpdateBody { patch, filters })?;
        self.rows(url, &body).await
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Row>,
        on_conflict: &[&str],
    ) -> Result<Vec<Row>, AppError> {
        for key in on_conflict {
            ensure_identifier(key)?;
        }
        let url = self.table_endpoint(table, "upsert")?;
        self.rows(url, &json!({ "rows": rows, "on_conflict": on_conflict }))
            .await
    }
}

#[async_trait]
impl ObjectStorage for GatewayClient {
    async fn create_signed_download_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<Url, AppError> {
        let bucket = ensure_identifier(bucket)?;
        let url = self.endpoint(&format!("storage/v1/sign/{}", bucket))?;
        let response = self
            .post_json(url, &json!({ "path": path, "expires_in": ttl.as_secs() }))
            .await?;
        let body: SignedUrlBody = parse_json(response).await?;

        // The gateway may hand back a path relative to its own root.
        self.base
            .join(body.signed_url.trim_start_matches('/'))
            .map_err(|e| AppError::Backend(format!("invalid signed url: {}", e)))
    }
}
