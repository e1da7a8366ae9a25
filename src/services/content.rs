// src/services/content.rs

use super::LessonsClient;
use crate::error::AppError;

impl LessonsClient {
    /// Fetches a stored text object (lesson body) through a short-lived
    /// signed link.
    pub async fn fetch_signed_text(&self, path: &str) -> Result<String, AppError> {
        let url = self
            .backend
            .storage
            .create_signed_download_url(
                &self.settings.content_bucket,
                path,
                self.settings.signed_url_ttl,
            )
            .await?;

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Backend(format!(
                "content fetch for '{}' failed with {}",
                path,
                response.status()
            )));
        }
        Ok(response.text().await?)
    }
}
