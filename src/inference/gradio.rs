//! HTTP client for a Gradio-hosted Space.
//!
//! Predictions use the two-step call API: a `POST` to `gradio_api/call/<api>` queues the job and
//! returns an event id, then a `GET` on `gradio_api/call/<api>/<event_id>` streams server-sent
//! events until a `complete` (or `error`) event arrives. Files are uploaded first and referenced
//! by their server-side path.

use crate::config::Config;
use crate::inference::{InferenceClient, InferenceError, value_to_text};
use async_trait::async_trait;
use reqwest::{Client, Method, multipart};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;

const ECHO_API: &str = "/predict_1";
const EMBED_API: &str = "/predict_2";
const ASK_API: &str = "/predict";

/// Reference to a file already uploaded to the Space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileData {
    /// Server-side path returned by the upload endpoint.
    pub path: String,
    /// Original file name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orig_name: Option<String>,
    meta: FileMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct FileMeta {
    #[serde(rename = "_type")]
    kind: &'static str,
}

impl FileData {
    fn new(path: String, orig_name: Option<String>) -> Self {
        Self {
            path,
            orig_name,
            meta: FileMeta {
                kind: "gradio.FileData",
            },
        }
    }
}

#[derive(Deserialize)]
struct QueuedCall {
    event_id: String,
}

/// Lightweight HTTP client for a single Space.
pub struct GradioClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
}

impl GradioClient {
    /// Construct a client for the Space served at `base_url`.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, InferenceError> {
        let client = Client::builder().user_agent("doc-gateway/0.1").build()?;
        let base_url = normalize_base_url(base_url).map_err(InferenceError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_token = token.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized inference client"
        );
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, InferenceError> {
        let url = config
            .inference_url
            .clone()
            .unwrap_or_else(|| space_base_url(&config.inference_space));
        Self::new(&url, config.inference_token.clone())
    }

    /// Run the named API function with positional `data` and return its first output.
    pub async fn predict(&self, api_name: &str, data: Vec<Value>) -> Result<Value, InferenceError> {
        let endpoint = api_name.trim_start_matches('/');
        let response = self
            .request(Method::POST, &format!("gradio_api/call/{endpoint}"))
            .json(&json!({ "data": data }))
            .send()
            .await?;
        let response = self.ensure_success(response, api_name).await?;
        let QueuedCall { event_id } = response.json().await?;
        tracing::debug!(api = api_name, event_id = %event_id, "Prediction queued");

        let response = self
            .request(
                Method::GET,
                &format!("gradio_api/call/{endpoint}/{event_id}"),
            )
            .send()
            .await?;
        let response = self.ensure_success(response, api_name).await?;
        let body = response.text().await?;
        parse_event_stream(&body).inspect_err(|error| {
            tracing::error!(api = api_name, error = %error, "Prediction failed");
        })
    }

    /// Upload a local file so it can be passed to a prediction.
    pub async fn upload_file(&self, path: &Path) -> Result<FileData, InferenceError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| InferenceError::File {
                path: path.display().to_string(),
                source,
            })?;
        let orig_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let part = multipart::Part::bytes(bytes)
            .file_name(orig_name.clone().unwrap_or_else(|| "upload".to_string()));
        let form = multipart::Form::new().part("files", part);

        let response = self
            .request(Method::POST, "gradio_api/upload")
            .multipart(form)
            .send()
            .await?;
        let response = self.ensure_success(response, "upload").await?;
        let uploaded: Vec<String> = response.json().await?;
        let server_path = uploaded
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::Protocol("upload returned no file paths".into()))?;
        tracing::debug!(local = %path.display(), remote = %server_path, "File uploaded");
        Ok(FileData::new(server_path, orig_name))
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(token) = &self.token
            && !token.is_empty()
        {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn ensure_success(
        &self,
        response: reqwest::Response,
        api_name: &str,
    ) -> Result<reqwest::Response, InferenceError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = InferenceError::UnexpectedStatus { status, body };
        tracing::error!(api = api_name, error = %error, "Inference request failed");
        Err(error)
    }
}

#[async_trait]
impl InferenceClient for GradioClient {
    async fn echo(&self, text: &str) -> Result<String, InferenceError> {
        self.predict(ECHO_API, vec![json!(text)])
            .await
            .map(value_to_text)
    }

    async fn embed(&self, file: &Path) -> Result<String, InferenceError> {
        let handle = self.upload_file(file).await?;
        let data = serde_json::to_value(&handle)
            .map_err(|err| InferenceError::Protocol(err.to_string()))?;
        self.predict(EMBED_API, vec![data])
            .await
            .map(value_to_text)
    }

    async fn ask(&self, question: &str) -> Result<Value, InferenceError> {
        self.predict(ASK_API, vec![json!(question)]).await
    }
}

/// Public URL of a Hugging Face Space given its `owner/name` id.
///
/// Values that already look like URLs are returned unchanged.
pub fn space_base_url(space: &str) -> String {
    let space = space.trim();
    if space.starts_with("http://") || space.starts_with("https://") {
        return space.to_string();
    }
    let host: String = space
        .chars()
        .map(|c| match c {
            '/' | '_' | '.' => '-',
            other => other.to_ascii_lowercase(),
        })
        .collect();
    format!("https://{host}.hf.space")
}

/// Extract the result of a finished call from a server-sent event stream.
fn parse_event_stream(body: &str) -> Result<Value, InferenceError> {
    let mut event = "";
    for line in body.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = name.trim();
        } else if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            match event {
                "complete" => {
                    let value: Value = serde_json::from_str(data).map_err(|err| {
                        InferenceError::Protocol(format!("invalid completion payload: {err}"))
                    })?;
                    return Ok(match value {
                        Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
                        other => other,
                    });
                }
                "error" => {
                    let message = match data {
                        "" | "null" => "remote function raised an error".to_string(),
                        other => other.to_string(),
                    };
                    return Err(InferenceError::Remote(message));
                }
                _ => {}
            }
        }
    }
    Err(InferenceError::Protocol(
        "event stream ended without a result".into(),
    ))
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
