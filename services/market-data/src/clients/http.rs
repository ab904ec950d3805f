//! Request helpers
//!
//! Every failure is mapped to `DataError::Gateway` with the request URL as
//! context, so an error event names the source that broke.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use types::errors::DataError;

/// Client shared by all feeds.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

async fn send(request: RequestBuilder) -> Result<reqwest::Response, DataError> {
    let response = request
        .send()
        .await
        .map_err(|err| DataError::gateway("can't make request", err))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DataError::Gateway(format!(
            "bad respond status {status} from {}",
            response.url()
        )));
    }
    Ok(response)
}

pub async fn fetch_bytes(request: RequestBuilder) -> Result<Vec<u8>, DataError> {
    let response = send(request).await?;
    let url = response.url().to_string();
    response
        .bytes()
        .await
        .map(|body| body.to_vec())
        .map_err(|err| DataError::gateway(&format!("can't read body of {url}"), err))
}

pub async fn fetch_text(request: RequestBuilder) -> Result<String, DataError> {
    let response = send(request).await?;
    let url = response.url().to_string();
    response
        .text()
        .await
        .map_err(|err| DataError::gateway(&format!("can't read body of {url}"), err))
}

pub async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, DataError> {
    let response = send(request).await?;
    let url = response.url().to_string();
    response
        .json()
        .await
        .map_err(|err| DataError::gateway(&format!("can't parse json from {url}"), err))
}
