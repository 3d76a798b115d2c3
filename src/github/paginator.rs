use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::github::rate_limiter::RateLimiter;

/// GitHub caps list endpoints such as pull request files at 3000 entries.
const MAX_PAGES: u32 = 30;

/// Walks a list endpoint page by page, following `rel="next"` links.
pub struct Paginator<'a> {
    client: &'a Client,
    rate_limiter: &'a RateLimiter,
    max_pages: u32,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a Client, rate_limiter: &'a RateLimiter) -> Self {
        Self {
            client,
            rate_limiter,
            max_pages: MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub async fn fetch_all<T: DeserializeOwned>(&self, endpoint: &str, per_page: u32) -> Result<Vec<T>> {
        let mut items = Vec::new();

        for page in 1..=self.max_pages {
            let url = page_url(endpoint, per_page, page);
            self.rate_limiter.wait().await;

            tracing::debug!("GET {}", url);
            let response = self.client.get(&url).send().await?;
            self.rate_limiter.update_from_headers(response.headers()).await;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::GitHubApi {
                    status: status.as_u16(),
                    message: format!("GET {} failed: {}", url, body),
                });
            }

            let more = has_next_page(response.headers());
            let batch: Vec<T> = response.json().await?;
            let full = batch.len() >= per_page as usize;
            items.extend(batch);

            if !more || !full {
                return Ok(items);
            }
        }

        tracing::warn!(
            "Stopped after {} pages of {}, results may be incomplete",
            self.max_pages,
            endpoint
        );
        Ok(items)
    }
}

fn page_url(endpoint: &str, per_page: u32, page: u32) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{}{}per_page={}&page={}", endpoint, separator, per_page, page)
}

fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get("link")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("rel=\"next\""))
}
