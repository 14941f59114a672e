use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use crate::api::domain::TelemetryApi;
use crate::message::domain::{AggregatedPoint, ApiResponse, Device, Farm, Summary};
use crate::system::domain::{ErrorType, System};


/// Cliente HTTP de la API del backend, autenticado con Bearer.
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    token: String,
}


impl HttpApi {
    pub fn new(system: &System) -> Result<Self, ErrorType> {
        let base_url = Url::parse(system.api_base_url.trim_end_matches('/'))
            .map_err(|e| ErrorType::Endpoint(format!("{}: {e}", system.api_base_url)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(system.http_timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| ErrorType::Endpoint(e.to_string()))?;

        Ok(Self { client, base_url, token: system.auth_token.clone() })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ErrorType> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ErrorType::Endpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_data<T: DeserializeOwned>(&self,
                                           segments: &[&str],
                                           query: &[(&str, &str)]) -> Result<Option<T>, ErrorType> {
        let url = self.url(segments)?;
        debug!("Debug: GET {}", url);

        let response = self.client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        let envelope: ApiResponse<T> = response.json().await?;
        Ok(envelope.data)
    }
}


#[async_trait]
impl TelemetryApi for HttpApi {
    async fn farms(&self) -> Result<Vec<Farm>, ErrorType> {
        Ok(self.get_data(&["farms"], &[]).await?.unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn devices(&self, farm_id: &str) -> Result<Vec<Device>, ErrorType> {
        Ok(self.get_data(&["devices"], &[("farmId", farm_id)]).await?.unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn summary(&self, farm_id: &str) -> Result<Option<Summary>, ErrorType> {
        self.get_data(&["reports", "summary"], &[("farmId", farm_id)]).await
    }

    #[instrument(skip(self))]
    async fn aggregated(&self,
                        device_id: &str,
                        field: &str,
                        window: &str) -> Result<Vec<AggregatedPoint>, ErrorType> {
        Ok(self
            .get_data(&["devices", device_id, "data", "aggregated"],
                      &[("field", field), ("window", window)])
            .await?
            .unwrap_or_default())
    }
}
