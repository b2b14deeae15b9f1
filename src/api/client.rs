use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use url::Url;

use super::error::FetchError;
use super::types::{Dish, DishesPage, Tag, TagId};
use crate::config::Config;
use crate::feed::{Page, PageSource};

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Client for the recipe API.
///
/// Cheap to clone (reqwest's client is reference counted), so fetch tasks
/// take their own copy.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base: Url,
    timeout_secs: u64,
    max_retries: u32,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let base = validate_base_url(&config.api_url)?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("dishdeck/", env!("CARGO_PKG_VERSION")))
            .build()?;

        tracing::debug!(base_url = %base, "API client configured");

        Ok(Self {
            client,
            base,
            timeout_secs: config.request_timeout_secs.max(1),
            max_retries: config.max_retries,
        })
    }

    /// Fetch one page of dishes for a tag.
    pub async fn dishes_page(&self, tag: TagId, page: u32) -> Result<Page<Dish>, FetchError> {
        let mut url = self.endpoint(&["dishes"])?;
        url.query_pairs_mut()
            .append_pair("tag", &tag.to_string())
            .append_pair("page", &page.to_string());

        let page: DishesPage = self.get_json(url).await?;
        Ok(page.into())
    }

    /// Fetch a single dish by id.
    pub async fn dish(&self, id: i64) -> Result<Dish, FetchError> {
        let url = self.endpoint(&["dishes", &id.to_string()])?;
        self.get_json(url).await
    }

    /// Fetch every tag.
    pub async fn tags(&self) -> Result<Vec<Tag>, FetchError> {
        let url = self.endpoint(&["tags"])?;
        self.get_json(url).await
    }

    /// Delete a tag. Not retried: a replayed DELETE after a lost response
    /// would report a spurious 404.
    pub async fn delete_tag(&self, id: TagId) -> Result<(), FetchError> {
        let url = self.endpoint(&["tags", &id.to_string()])?;
        let response = self.send(self.client.delete(url)).await?;
        tracing::info!(tag = id, "Tag deleted");
        drop(response);
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET with retry for transient failures.
    /// Uses exponential backoff: 1s, 2s, 4s, ... up to `max_retries`.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let mut retry_count = 0;

        loop {
            let attempt = async {
                let response = self.send(self.client.get(url.clone())).await?;
                let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
                Ok::<T, FetchError>(serde_json::from_slice(&bytes)?)
            };

            match attempt.await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry_count < self.max_retries => {
                    let delay = 1u64 << retry_count.min(5);
                    tracing::debug!(
                        url = %url,
                        error = %e,
                        retry = retry_count + 1,
                        delay_secs = delay,
                        "Retrying request after transient error"
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    retry_count += 1;
                }
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, FetchError> {
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), request.send())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout_secs))??;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }
        Ok(response)
    }
}

impl PageSource for ApiClient {
    type Item = Dish;

    fn fetch_page(
        &self,
        tag: TagId,
        page: u32,
    ) -> impl Future<Output = Result<Page<Dish>, FetchError>> + Send {
        self.dishes_page(tag, page)
    }
}

/// Parse the configured base URL, requiring HTTPS except for localhost.
fn validate_base_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|_| FetchError::InvalidUrl)?;

    match url.scheme() {
        "https" => Ok(url),
        "http" => {
            let is_localhost = matches!(
                url.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("[::1]")
            );
            if is_localhost {
                tracing::warn!(base_url = %url, "Using non-HTTPS API base URL (localhost only)");
                Ok(url)
            } else {
                tracing::error!(base_url = %url, "Rejecting non-HTTPS API base URL");
                Err(FetchError::InsecureBaseUrl)
            }
        }
        _ => Err(FetchError::InvalidUrl),
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
