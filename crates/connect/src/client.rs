//! Reqwest-backed remote gateway.

use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Response;
use serde::Serialize;

use ledgerly_core::records::{Item, Report};
use ledgerly_core::sync::{GatewayResult, RemoteGateway};

use crate::errors::ConnectError;
use crate::types::{ApiErrorBody, ItemPayload, RemoteIdResponse, ReportPayload};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ConnectClient {
    http: reqwest::Client,
    base_url: String,
}

impl ConnectClient {
    pub fn new(base_url: &str, api_token: &str) -> Result<Self, ConnectError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_token))
            .map_err(|_| ConnectError::Api {
                status: 0,
                message: "API token contains invalid header characters".to_string(),
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: Response) -> Result<Response, ConnectError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        Err(ConnectError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn post_for_id<T: Serialize>(&self, path: &str, body: &T) -> Result<String, ConnectError> {
        debug!("POST {}", path);
        let response = self.http.post(self.url(path)).json(body).send().await?;
        let response = Self::check(response).await?;
        let parsed: RemoteIdResponse = response.json().await?;
        Ok(parsed.id)
    }

    async fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<(), ConnectError> {
        debug!("PUT {}", path);
        let response = self.http.put(self.url(path)).json(body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), ConnectError> {
        debug!("DELETE {}", path);
        let response = self.http.delete(self.url(path)).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteGateway for ConnectClient {
    async fn create_report(&self, report: &Report) -> GatewayResult<String> {
        Ok(self
            .post_for_id("/v1/reports", &ReportPayload::from(report))
            .await?)
    }

    async fn update_report(&self, remote_id: &str, report: &Report) -> GatewayResult<()> {
        Ok(self
            .put(
                &format!("/v1/reports/{}", remote_id),
                &ReportPayload::from(report),
            )
            .await?)
    }

    async fn delete_report(&self, remote_id: &str) -> GatewayResult<()> {
        Ok(self.delete(&format!("/v1/reports/{}", remote_id)).await?)
    }

    async fn create_item(&self, parent_remote_id: &str, item: &Item) -> GatewayResult<String> {
        Ok(self
            .post_for_id(
                &format!("/v1/reports/{}/items", parent_remote_id),
                &ItemPayload::from(item),
            )
            .await?)
    }

    async fn update_item(&self, remote_id: &str, item: &Item) -> GatewayResult<()> {
        Ok(self
            .put(&format!("/v1/items/{}", remote_id), &ItemPayload::from(item))
            .await?)
    }

    async fn delete_item(&self, remote_id: &str) -> GatewayResult<()> {
        Ok(self.delete(&format!("/v1/items/{}", remote_id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ConnectClient::new("https://api.example.com/", "token").unwrap();
        assert_eq!(client.url("/v1/reports"), "https://api.example.com/v1/reports");
    }
}
