//! Listing page retrieval.

use tracing::{debug, instrument};

use super::IndexError;
use crate::download::HttpClient;

/// Fetches the raw HTML of a listing page.
///
/// The page is fetched once; failures are reported rather than retried.
///
/// # Errors
///
/// Returns [`IndexError::InvalidBaseUrl`] for malformed URLs,
/// [`IndexError::HttpStatus`] for non-success responses and
/// [`IndexError::Fetch`] for transport failures.
#[instrument(skip(client))]
pub async fn fetch_listing(client: &HttpClient, url: &str) -> Result<String, IndexError> {
    url::Url::parse(url).map_err(|e| IndexError::invalid_base_url(url, e))?;

    let response = client
        .inner()
        .get(url)
        .send()
        .await
        .map_err(|source| IndexError::Fetch {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(IndexError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|source| IndexError::Fetch {
        url: url.to_string(),
        source,
    })?;
    debug!(bytes = body.len(), "fetched listing page");
    Ok(body)
}
