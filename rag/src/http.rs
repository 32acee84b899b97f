use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::from_str;

use crate::error::{Error, Result};

/// Header pair attached to a request, e.g. an API key.
pub type Header<'a> = (&'a str, &'a str);

pub fn post_json<T: DeserializeOwned, B: Serialize>(
    url: &str,
    headers: &[Header<'_>],
    body: &B,
    timeout: Duration,
) -> Result<T> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Http(e.to_string()))?;
    let mut req = client.post(url).header(CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    tracing::debug!(url, "POST");
    let resp = req
        .json(body)
        .send()
        .map_err(|e| Error::Http(format!("POST {} failed: {}", url, e)))?;
    let status = resp.status();
    let text = resp.text().unwrap_or_default();
    if !status.is_success() {
        return Err(Error::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }
    from_str::<T>(&text)
        .map_err(|e| Error::Http(format!("POST {} decode failed: {} | {}", url, e, text)))
}
