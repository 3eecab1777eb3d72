// Oadin daemon client implementation
//
// One async method per daemon endpoint, all funnelled through `request`.
// Streaming endpoints share `stream`, which hands the body to the line reader.

use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::streaming::{
    finished_flag, read_event_stream, status_sentinel, StreamEvent, StreamSummary,
};
use crate::config::{ClientConfig, EXPORT_FILE_NAME};
use crate::errors::{ErrorKind, OadinError, Result};

/// Header key forwarded as a query parameter by the smartvision endpoint
const ENV_TYPE_KEY: &str = "env_type";

/// HTTP client for the local Oadin daemon
#[derive(Debug, Clone)]
pub struct OadinClient {
    client: Client,
    base_url: String,
    origin: String,
    product_dir: PathBuf,
}

impl OadinClient {
    /// Create a client for the given API version on the default loopback endpoint
    pub fn new(version: &str) -> Result<Self> {
        Self::from_config(&ClientConfig::with_version(version))
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().build().map_err(|e| {
            OadinError::new(
                ErrorKind::Transport,
                format!("Failed to build HTTP client: {}", e),
            )
        })?;

        let base_url = config.base_url();
        debug!(base_url = %base_url, "Created Oadin client");

        Ok(Self {
            client,
            base_url,
            origin: config.origin(),
            product_dir: config.product_dir()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn product_dir(&self) -> &Path {
        &self.product_dir
    }

    /// Absolute URL for an endpoint path; leading slashes are dropped
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    fn build_request<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<reqwest::RequestBuilder>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint_url(path);
        debug!(method = %method, url = %url, "Request URL");

        let mut builder = self.client.request(method, &url);
        if let Some(body) = body {
            let json = serde_json::to_string(body).map_err(|e| {
                OadinError::new(
                    ErrorKind::Serialization,
                    format!("Failed to serialize request body: {}", e),
                )
            })?;
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(json);
        }
        Ok(builder)
    }

    async fn send_checked(builder: reqwest::RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(OadinError::new(
                ErrorKind::Status(status.as_u16()),
                format!("Status: {} Body: {}", status, error_body),
            ));
        }
        Ok(response)
    }

    /// Send a request and return the raw response body
    ///
    /// Any failure is wrapped as "request <VERB> <path> failed: <cause>".
    pub async fn request<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        let context = format!("request {} {} failed", method, path.trim_start_matches('/'));
        self.request_once(method, path, body)
            .await
            .map_err(|e| e.context(context))
    }

    async fn request_once<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        let builder = self.build_request(method, path, body)?;
        let response = Self::send_checked(builder).await?;
        Ok(response.text().await?)
    }

    async fn get(&self, path: &str) -> Result<String> {
        self.request::<Value>(Method::GET, path, None).await
    }

    async fn send_json<B>(&self, method: Method, path: &str, body: &B) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        self.request(method, path, Some(body)).await
    }

    /// POST a body to a streaming endpoint and feed each line to `on_event`
    ///
    /// Failures before the body starts are returned; failures inside the body
    /// arrive as `StreamEvent::Error`.
    pub async fn stream<B, P, F>(
        &self,
        path: &str,
        body: &B,
        is_complete: P,
        on_event: F,
    ) -> Result<StreamSummary>
    where
        B: Serialize + ?Sized,
        P: Fn(&Value) -> Result<bool>,
        F: FnMut(StreamEvent),
    {
        let context = format!("stream POST {} failed", path.trim_start_matches('/'));

        let builder = self
            .build_request(Method::POST, path, Some(body))
            .map_err(|e| e.context(&context))?;
        let response = Self::send_checked(builder)
            .await
            .map_err(|e| e.context(&context))?;

        Ok(read_event_stream(response.bytes_stream(), is_complete, on_event).await)
    }

    // Services

    pub async fn get_services(&self) -> Result<String> {
        self.get("/service").await
    }

    pub async fn install_service<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::POST, "/service", data).await
    }

    pub async fn update_service<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::PUT, "/service", data).await
    }

    // Models

    pub async fn get_models(&self) -> Result<String> {
        self.get("/model").await
    }

    pub async fn install_model<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::POST, "/model", data).await
    }

    /// Install a model, reporting progress until `status` is "success" or "error"
    pub async fn install_model_stream<B, F>(&self, data: &B, on_event: F) -> Result<StreamSummary>
    where
        B: Serialize + ?Sized,
        F: FnMut(StreamEvent),
    {
        self.stream("model/stream", data, status_sentinel, on_event)
            .await
    }

    pub async fn cancel_install_model<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::POST, "/model/stream/cancel", data)
            .await
    }

    pub async fn delete_model<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::DELETE, "/model", data).await
    }

    pub async fn get_available_models(&self) -> Result<String> {
        self.get("/services/models").await
    }

    pub async fn get_recommended_models(&self) -> Result<String> {
        self.get("/model/recommend").await
    }

    pub async fn get_supported_models(&self) -> Result<String> {
        self.get("/model/support").await
    }

    /// Supported smartvision models; only the `env_type` header is forwarded, as a query parameter
    ///
    /// Pass headers in a defined order (a slice or `BTreeMap`) when several
    /// spellings of `env_type` may be present.
    pub async fn get_smartvision_supported_models<I, K, V>(&self, headers: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let path = format!("/model/support/smartvision?{}", env_type_query(headers));
        self.get(&path).await
    }

    // Service providers

    pub async fn get_service_providers(&self) -> Result<String> {
        self.get("/service_provider").await
    }

    pub async fn add_service_provider<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::POST, "/service_provider", data).await
    }

    pub async fn update_service_provider<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::PUT, "/service_provider", data).await
    }

    pub async fn delete_service_provider<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::DELETE, "/service_provider", data)
            .await
    }

    // Config import/export

    /// Read a JSON file and hand it to the daemon's import endpoint
    pub async fn import_config(&self, file_path: &Path) -> Result<String> {
        let contents = tokio::fs::read_to_string(file_path).await.map_err(|e| {
            OadinError::io(format!("Failed to read {}", file_path.display()), e)
        })?;
        let document: Value = serde_json::from_str(&contents).map_err(|e| {
            OadinError::parse(format!("Invalid JSON in {}", file_path.display()), e)
        })?;

        self.send_json(Method::POST, "/config/import", &document)
            .await
    }

    /// Fetch the daemon's exported config and write it to `<product_dir>/.oadin`
    pub async fn export_config(&self, data: Option<&Value>) -> Result<PathBuf> {
        let path = self
            .write_exported_config(data)
            .await
            .map_err(|e| e.context("export config failed"))?;
        info!(path = %path.display(), "Exported daemon config");
        Ok(path)
    }

    async fn write_exported_config(&self, data: Option<&Value>) -> Result<PathBuf> {
        let config = self.request(Method::GET, "/config/export", data).await?;

        tokio::fs::create_dir_all(&self.product_dir)
            .await
            .map_err(|e| {
                OadinError::io(format!("Failed to create {}", self.product_dir.display()), e)
            })?;

        let path = self.product_dir.join(EXPORT_FILE_NAME);
        tokio::fs::write(&path, config)
            .await
            .map_err(|e| OadinError::io(format!("Failed to write {}", path.display()), e))?;
        Ok(path)
    }

    // Inference services

    pub async fn chat<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::POST, "services/chat", data).await
    }

    /// Streaming chat; stops after the first document with `finished: true`
    pub async fn chat_stream<B, F>(&self, data: &B, on_event: F) -> Result<StreamSummary>
    where
        B: Serialize + ?Sized,
        F: FnMut(StreamEvent),
    {
        self.stream("services/chat", data, finished_flag, on_event)
            .await
    }

    pub async fn generate<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::POST, "services/generate", data).await
    }

    /// Streaming generate; stops after `status` is "success" or "error"
    pub async fn generate_stream<B, F>(&self, data: &B, on_event: F) -> Result<StreamSummary>
    where
        B: Serialize + ?Sized,
        F: FnMut(StreamEvent),
    {
        self.stream("services/generate", data, status_sentinel, on_event)
            .await
    }

    pub async fn embed<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::POST, "/services/embed", data).await
    }

    pub async fn text_to_image<B: Serialize + ?Sized>(&self, data: &B) -> Result<String> {
        self.send_json(Method::POST, "/services/text-to-image", data)
            .await
    }

    /// Probe the daemon root; non-success status is `false`, no connection is an error
    pub async fn is_available(&self) -> Result<bool> {
        let url = format!("{}/", self.origin);
        debug!(url = %url, "Checking daemon availability");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OadinError::from(e).context("check Oadin status failed"))?;
        Ok(response.status().is_success())
    }
}

/// Build the smartvision query string from header pairs, in iteration order
///
/// Keys match `env_type` ignoring ASCII case. Matching spellings collapse into
/// one parameter named after the first one seen; the last value wins. Values
/// are form-encoded, so a space becomes `+`.
fn env_type_query<I, K, V>(headers: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut param: Option<(String, String)> = None;
    for (key, value) in headers {
        let key = key.as_ref();
        if key.eq_ignore_ascii_case(ENV_TYPE_KEY) {
            let name = match param.take() {
                Some((name, _)) => name,
                None => key.to_string(),
            };
            param = Some((name, value.as_ref().to_string()));
        }
    }

    match param {
        Some((name, value)) => format!("{}={}", form_encode(&name), form_encode(&value)),
        None => String::new(),
    }
}

fn form_encode(text: &str) -> String {
    urlencoding::encode(text).replace("%20", "+")
}
