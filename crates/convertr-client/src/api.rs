//! HTTP client for the conversion server

use anyhow::Context;
use bytes::Bytes;
use convertr_core::constants::API_PREFIX;
use convertr_core::models::{
    ConversionOptions, ConvertAccepted, ConvertRequest, FormatTag, JobStatusResponse,
    SupportedFormatsResponse, UploadResponse,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ApiError;

/// The parts of the server's error body the client uses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/upload`
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    /// Absolute URL for a location the server handed out, which may be
    /// relative to the server root
    pub fn resolve(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            format!("{}/{}", self.base_url, location.trim_start_matches('/'))
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let (message, code) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body.error, body.code),
            Err(_) if text.is_empty() => (status.to_string(), None),
            Err(_) => (text, None),
        };
        Err(ApiError::Status {
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// `POST /upload` with a single file part
    pub async fn upload(&self, file_name: &str, data: Bytes) -> Result<UploadResponse, ApiError> {
        let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        self.json(self.client.post(self.build_url("/upload")).multipart(form))
            .await
    }

    /// `POST /convert` in asynchronous mode
    pub async fn convert(
        &self,
        file_id: Uuid,
        target: &FormatTag,
        options: Option<&ConversionOptions>,
    ) -> Result<ConvertAccepted, ApiError> {
        let body = ConvertRequest {
            file_id,
            target_format: target.to_string(),
            options: options.cloned(),
        };
        self.json(self.client.post(self.build_url("/convert")).json(&body))
            .await
    }

    pub async fn job_status(&self, job_id: Uuid) -> Result<JobStatusResponse, ApiError> {
        self.json(self.client.get(self.build_url(&format!("/jobs/{}", job_id))))
            .await
    }

    pub async fn supported_formats(
        &self,
        source: &FormatTag,
    ) -> Result<SupportedFormatsResponse, ApiError> {
        let path = format!("/supported-formats/{}", source.extension());
        self.json(self.client.get(self.build_url(&path))).await
    }

    /// Fetch converted bytes from a download location
    pub async fn download(&self, location: &str) -> Result<Bytes, ApiError> {
        let response = self.send(self.client.get(self.resolve(location))).await?;
        Ok(response.bytes().await?)
    }
}
