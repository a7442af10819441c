use std::time::{Duration, Instant};

use reqwest::Method;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{join_url, LauncherConfig};
use crate::errors::{LauncherError, Result};

pub fn build_http_client(timeout: Duration, connect_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .user_agent(concat!("ceremeet-launcher/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!("falling back to default http client: {}", err);
            reqwest::Client::new()
        })
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &LauncherConfig) -> Self {
        Self {
            client: build_http_client(config.request_timeout(), config.connect_timeout()),
            base_url: config.api_base_url.clone(),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> Result<T> {
        self.request(Method::GET, path, Option::<()>::None, token)
            .await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: B,
        token: Option<&str>,
    ) -> Result<T> {
        self.request(Method::POST, path, Some(body), token).await
    }

    /// Round-trip time of a bare request to the API host; any HTTP status counts.
    pub async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        let response = self.client.head(&self.base_url).send().await?;
        tracing::trace!("ping {} -> {}", self.base_url, response.status());
        Ok(started.elapsed())
    }

    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
        token: Option<&str>,
    ) -> Result<T> {
        let url = join_url(&self.base_url, path);
        let mut request = self.client.request(method.clone(), &url);

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = body.as_ref() {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LauncherError::Auth(format!(
                "{} {} rejected: {}",
                method,
                path,
                status.as_u16()
            )));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::debug!("{} {} failed with {}: {}", method, url, status, text);
            return Err(LauncherError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let value = response.json::<T>().await?;
        Ok(value)
    }
}
