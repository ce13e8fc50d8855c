use crate::error::ScrapeError;
use std::time::Duration;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches the car list page. A transport error, a timeout or a non-success
/// status all abort the run before anything is written.
pub async fn fetch_page(url: &str) -> Result<String, ScrapeError> {
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(body)
}
