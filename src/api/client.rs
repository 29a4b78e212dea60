use crate::config;
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use bytes::Bytes;
use reqwest::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

/// Authenticated JSON client. Transient failures (timeouts, connection
/// errors, 429 and 5xx gateway statuses) are retried with exponential
/// backoff; every other non-2xx response fails at once.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

pub fn is_transient_status(status: StatusCode) -> bool {
    config::RETRY_STATUS_CODES.contains(&status)
}

pub fn backoff_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    let base =
        Duration::from_secs_f32(config::RETRY_DELAY_BASE_SECS * 2.0_f32.powi(attempt as i32));
    match retry_after {
        Some(server_hint) if server_hint > base => server_hint,
        _ => base,
    }
}

fn retry_after_hint(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl ApiClient {
    pub fn new(base_url: &str, credentials: Credentials) -> AppResult<Self> {
        if credentials.access_key.trim().is_empty() || credentials.secret_key.trim().is_empty() {
            return Err(AppError::ConfigError(
                "API access key and secret key are both required".to_string(),
            ));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config::HTTP_CONNECT_TIMEOUT))
            .build()
            .map_err(AppError::from)?;
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub async fn get<T>(
        &self,
        endpoint: &'static str,
        params: &[(String, String)],
        timeout: Duration,
    ) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let bytes = self
            .fetch_internal(Method::GET, endpoint, Some(params), None, timeout)
            .await?;
        decode(&bytes, endpoint)
    }

    pub async fn post<T>(&self, endpoint: &'static str, payload: &Value, timeout: Duration) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let bytes = self
            .fetch_internal(Method::POST, endpoint, None, Some(payload), timeout)
            .await?;
        decode(&bytes, endpoint)
    }

    async fn fetch_internal(
        &self,
        method: Method,
        endpoint: &'static str,
        params: Option<&[(String, String)]>,
        json_payload: Option<&Value>,
        timeout: Duration,
    ) -> AppResult<Bytes> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut last_error: Option<AppError> = None;

        for attempt in 0..=config::MAX_RETRIES {
            let mut request_builder = self
                .client
                .request(method.clone(), &url)
                .basic_auth(&self.credentials.access_key, Some(&self.credentials.secret_key))
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .timeout(timeout);
            if let Some(p) = params {
                request_builder = request_builder.query(p);
            }
            if let Some(payload) = json_payload {
                request_builder = request_builder.json(payload);
            }

            let log_prefix = format!("API Req {} {} (Try {})", method, endpoint, attempt + 1);
            let mut retry_after = None;

            match request_builder.send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        return resp.bytes().await.map_err(|e| {
                            log(
                                LogLevel::Warning,
                                &format!("{} - Error reading success response body: {}", log_prefix, e),
                            );
                            AppError::from(e)
                        });
                    }

                    retry_after = retry_after_hint(&resp);
                    let error = handle_http_error(resp, status, endpoint).await;
                    if !is_transient_status(status) {
                        log(
                            LogLevel::Error,
                            &format!("{} Failed with non-retryable status {}", log_prefix, status),
                        );
                        return Err(error);
                    }

                    log(LogLevel::Warning, &format!("{} Failed: {}", log_prefix, error));
                    last_error = Some(error);
                }
                Err(e) => {
                    let context_str = if e.is_timeout() {
                        "Timeout"
                    } else if e.is_connect() {
                        "Connection"
                    } else {
                        "Request"
                    };
                    let error_message = format!("{} Error: {}", context_str, e);
                    let retryable = e.is_timeout() || e.is_connect() || e.is_request();
                    let app_error = if e.is_timeout() {
                        AppError::Timeout(format!("{} {}", log_prefix, error_message))
                    } else {
                        AppError::from(e)
                    };
                    log(LogLevel::Warning, &format!("{} {}", log_prefix, error_message));
                    if !retryable {
                        return Err(app_error);
                    }
                    last_error = Some(app_error);
                }
            }

            if attempt < config::MAX_RETRIES {
                sleep(backoff_delay(attempt, retry_after)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::Unexpected(format!(
                "Request failed after {} attempts for {}",
                config::MAX_RETRIES + 1,
                url
            ))
        }))
    }
}

fn decode<T: DeserializeOwned>(bytes: &Bytes, endpoint: &str) -> AppResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        let snippet_len = bytes.len().min(200);
        let snippet = String::from_utf8_lossy(&bytes[..snippet_len]);
        log(
            LogLevel::Error,
            &format!(
                "Fail parse API response for {} Type {}: {}. Snippet: '{}'",
                endpoint,
                std::any::type_name::<T>(),
                e,
                snippet
            ),
        );
        AppError::from(e)
    })
}

async fn handle_http_error(resp: Response, status: StatusCode, endpoint: &str) -> AppError {
    let resp_text = resp
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    let error_message = format!(
        "HTTP {} ({}). Body: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Status"),
        resp_text
            .chars()
            .take(config::ERROR_BODY_SNIPPET_CHARS)
            .collect::<String>()
    );

    AppError::api_error(status.as_u16(), error_message, endpoint)
}
