use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Client, Url, redirect};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::nest::{Devices, FetchError, Structure};

pub const DEFAULT_API_URL: &str = "https://developer-api.nest.com";

// The API redirects every call to a per-account host at least once.
const MAX_REDIRECTS: usize = 5;

/// Read access to the thermostat service.
///
/// Each call returns the complete current collection or an error. Implementations
/// do not retry.
#[async_trait]
pub trait ThermostatApi: Send + Sync {
    async fn fetch_structures(&self) -> Result<HashMap<String, Structure>, FetchError>;

    async fn fetch_devices(&self) -> Result<Devices, FetchError>;
}

#[async_trait]
impl<T: ThermostatApi + ?Sized> ThermostatApi for Arc<T> {
    async fn fetch_structures(&self) -> Result<HashMap<String, Structure>, FetchError> {
        (**self).fetch_structures().await
    }

    async fn fetch_devices(&self) -> Result<Devices, FetchError> {
        (**self).fetch_devices().await
    }
}

#[derive(Debug, Clone)]
pub struct NestClient {
    client: Client,
    base_url: String,
    token: String,
}

impl NestClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> reqwest::Result<Self> {
        // Redirects are followed by hand: reqwest strips the Authorization
        // header when the target host differs, and the API always moves hosts.
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        path: &str,
    ) -> Result<T, FetchError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| FetchError::new(resource, format!("invalid url: {e}")))?;

        for _ in 0..=MAX_REDIRECTS {
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&self.token)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| FetchError::new(resource, format!("request failed: {e}")))?;

            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        FetchError::new(resource, format!("{status} without a location header"))
                    })?;
                url = url
                    .join(location)
                    .map_err(|e| FetchError::new(resource, format!("invalid redirect: {e}")))?;
                debug!(resource, %url, "following redirect");
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(FetchError::new(
                    resource,
                    format!("unexpected status {status}: {}", body.trim()),
                ));
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| FetchError::new(resource, format!("invalid response body: {e}")));
        }

        Err(FetchError::new(
            resource,
            format!("more than {MAX_REDIRECTS} redirects"),
        ))
    }
}

#[async_trait]
impl ThermostatApi for NestClient {
    async fn fetch_structures(&self) -> Result<HashMap<String, Structure>, FetchError> {
        self.get_json("structures", "/structures").await
    }

    async fn fetch_devices(&self) -> Result<Devices, FetchError> {
        self.get_json("devices", "/devices").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nest::{HvacState, Occupancy};

    fn client_for(server: &mockito::ServerGuard) -> NestClient {
        NestClient::new(&server.url(), "c.token", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetch_structures_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/structures")
            .match_header("authorization", "Bearer c.token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"s1":{"structure_id":"s1","name":"Home","away":"away"}}"#)
            .create_async()
            .await;

        let structures = client_for(&server).fetch_structures().await.unwrap();

        assert_eq!(structures.len(), 1);
        assert_eq!(structures["s1"].name, "Home");
        assert_eq!(structures["s1"].away, Occupancy::Away);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn redirect_keeps_credential() {
        let mut server = mockito::Server::new_async().await;
        let redirect = server
            .mock("GET", "/devices")
            .with_status(307)
            .with_header("location", "/shard-42/devices")
            .create_async()
            .await;
        let target = server
            .mock("GET", "/shard-42/devices")
            .match_header("authorization", "Bearer c.token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"thermostats":{"t1":{"device_id":"t1","name":"Hallway","structure_id":"s1","hvac_state":"cooling"}}}"#,
            )
            .create_async()
            .await;

        let devices = client_for(&server).fetch_devices().await.unwrap();

        assert_eq!(devices.thermostats["t1"].hvac_state, HvacState::Cooling);
        redirect.assert_async().await;
        target.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/structures")
            .with_status(401)
            .with_body(r#"{"error":"unauthorized"}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_structures().await.unwrap_err();

        assert_eq!(err.resource, "structures");
        assert!(err.message.contains("401"));
    }

    #[tokio::test]
    async fn malformed_body_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/devices")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{not json")
            .create_async()
            .await;

        let err = client_for(&server).fetch_devices().await.unwrap_err();

        assert_eq!(err.resource, "devices");
    }

    #[tokio::test]
    async fn redirect_loop_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/structures")
            .with_status(307)
            .with_header("location", "/structures")
            .expect_at_least(1)
            .create_async()
            .await;

        let err = client_for(&server).fetch_structures().await.unwrap_err();

        assert!(err.message.contains("redirects"));
    }

    #[tokio::test]
    async fn unreachable_host_is_fetch_error() {
        let client =
            NestClient::new("http://127.0.0.1:1", "c.token", Duration::from_secs(1)).unwrap();

        assert!(client.fetch_structures().await.is_err());
    }
}
