#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_derive::Deserialize;
use tokio::time;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ApiError;

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// HTTP client with bounded automatic retry. Network-level failures (no
/// response received) are retried for every method; a received 5xx is
/// retried only for idempotent requests, so a send can never run the
/// assistant twice. Backoff is linear: the Nth retry waits N backoff units.
pub struct TransportClient {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
    max_retries: u32,
    backoff_unit: Duration,
}

impl TransportClient {
    pub fn from_config() -> TransportClient {
        let timeout = Config::get(ConfigKey::RequestTimeout)
            .parse::<u64>()
            .unwrap_or(30000);
        let max_retries = Config::get(ConfigKey::MaxRetries)
            .parse::<u32>()
            .unwrap_or(3);
        let backoff = Config::get(ConfigKey::RetryBackoff)
            .parse::<u64>()
            .unwrap_or(1000);

        return TransportClient::new(
            &Config::get(ConfigKey::ApiURL),
            Duration::from_millis(timeout),
            max_retries,
            Duration::from_millis(backoff),
        );
    }

    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        max_retries: u32,
        backoff_unit: Duration,
    ) -> TransportClient {
        return TransportClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            request_timeout,
            max_retries,
            backoff_unit,
        };
    }

    pub fn base_url(&self) -> &str {
        return &self.base_url;
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let res = self
            .execute(reqwest::Method::GET, path, query, None::<&()>)
            .await?;

        return res.json::<T>().await.map_err(|err| {
            return ApiError::NetworkUnreachable(err.to_string());
        });
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let res = self
            .execute(reqwest::Method::POST, path, &[], Some(body))
            .await?;

        return res.json::<T>().await.map_err(|err| {
            return ApiError::NetworkUnreachable(err.to_string());
        });
    }

    async fn execute<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        let idempotent = method == reqwest::Method::GET;
        let url = format!("{base}{path}", base = self.base_url);
        let mut attempt: u32 = 0;

        loop {
            let mut req = self
                .client
                .request(method.clone(), &url)
                .timeout(self.request_timeout);
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            let err = match req.send().await {
                Ok(res) => {
                    let status = res.status();
                    if status.is_success() {
                        return Ok(res);
                    }

                    let detail = read_detail(res).await;
                    if !status.is_server_error() {
                        return Err(ApiError::ClientError {
                            status: status.as_u16(),
                            detail,
                        });
                    }

                    let err = ApiError::ServerError {
                        status: status.as_u16(),
                        detail,
                    };
                    if !idempotent {
                        // A response arrived, so the server may already have
                        // acted on the request.
                        return Err(err);
                    }
                    err
                }
                Err(send_err) => classify(send_err),
            };

            if attempt >= self.max_retries {
                tracing::error!(
                    error = %err,
                    attempts = attempt + 1,
                    url = url.as_str(),
                    "Request failed after all retries"
                );
                return Err(err);
            }

            attempt += 1;
            tracing::warn!(error = %err, attempt = attempt, url = url.as_str(), "Request failed, retrying");
            time::sleep(self.backoff_unit * attempt).await;
        }
    }
}

async fn read_detail(res: reqwest::Response) -> String {
    if let Ok(body) = res.json::<ErrorBody>().await {
        if let Some(detail) = body.detail {
            return detail;
        }
    }

    return "The server could not process the request".to_string();
}

fn classify(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout;
    }

    return ApiError::NetworkUnreachable(err.to_string());
}
