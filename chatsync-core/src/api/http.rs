//! HTTP client for the conversation backend's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::types::{
    ConversationDetail, ConversationSummary, Document, DocumentId, Message, MessageRole,
    UploadFile,
};

use super::ConversationApi;

#[derive(Serialize)]
struct CreateConversationRequest<'a> {
    first_message: &'a str,
    #[serde(skip_serializing_if = "no_ids")]
    doc_ids: &'a [DocumentId],
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    content: &'a str,
    role: MessageRole,
    #[serde(skip_serializing_if = "no_ids")]
    doc_ids: &'a [DocumentId],
}

fn no_ids(ids: &&[DocumentId]) -> bool {
    ids.is_empty()
}

#[derive(Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

/// REST client for the conversation backend
pub struct HttpApi {
    http_client: reqwest::Client,
    /// `base_url` + API prefix, e.g. `http://localhost:8000/api/v1`
    api_root: String,
    base_url: String,
}

impl HttpApi {
    /// Create a client from server configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_root: config.api_root(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn conversation_url(&self, id: &str) -> String {
        format!("{}/conversations/{}", self.api_root, urlencoding::encode(id))
    }
}

/// Map a non-success status to an error, keeping the body for diagnostics.
async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(what.to_string()));
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let response = check_status(response, what).await?;
    response
        .json()
        .await
        .map_err(|e| Error::Http(format!("failed to parse {} response: {}", what, e)))
}

fn mime_for(filename: &str) -> &'static str {
    if filename.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

#[async_trait]
impl ConversationApi for HttpApi {
    async fn create_conversation(
        &self,
        first_message: &str,
        doc_ids: &[DocumentId],
    ) -> Result<ConversationDetail> {
        let url = format!("{}/conversations/", self.api_root);
        let response = self
            .http_client
            .post(&url)
            .json(&CreateConversationRequest {
                first_message,
                doc_ids,
            })
            .send()
            .await?;
        read_json(response, "conversation").await
    }

    async fn list_conversations(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>> {
        let url = format!("{}/conversations/", self.api_root);
        let response = self
            .http_client
            .get(&url)
            .query(&[("skip", skip), ("limit", limit)])
            .send()
            .await?;
        read_json(response, "conversations").await
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail> {
        let response = self
            .http_client
            .get(self.conversation_url(id))
            .send()
            .await?;
        read_json(response, &format!("conversation {}", id)).await
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        doc_ids: &[DocumentId],
    ) -> Result<Message> {
        let url = format!("{}/messages", self.conversation_url(conversation_id));
        let response = self
            .http_client
            .post(&url)
            .json(&SendMessageRequest {
                content,
                role: MessageRole::User,
                doc_ids,
            })
            .send()
            .await?;
        read_json(response, &format!("conversation {}", conversation_id)).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let response = self
            .http_client
            .delete(self.conversation_url(id))
            .send()
            .await?;
        check_status(response, &format!("conversation {}", id)).await?;
        Ok(())
    }

    async fn upload_document(&self, conversation_id: &str, file: &UploadFile) -> Result<Document> {
        let url = format!("{}/documents/", self.api_root);
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str(mime_for(&file.filename))?;
        let form = Form::new()
            .text("conversation_id", conversation_id.to_string())
            .part("file", part);

        tracing::debug!(
            conversation_id = %conversation_id,
            filename = %file.filename,
            bytes = file.bytes.len(),
            "Uploading document"
        );
        let response = self.http_client.post(&url).multipart(form).send().await?;
        read_json(response, &format!("conversation {}", conversation_id)).await
    }

    async fn list_documents(&self, conversation_id: &str) -> Result<Vec<Document>> {
        let url = format!(
            "{}/documents/{}",
            self.api_root,
            urlencoding::encode(conversation_id)
        );
        let response = self.http_client.get(&url).send().await?;
        read_json(response, &format!("documents of {}", conversation_id)).await
    }

    async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let health: HealthResponse = response.json().await?;
        Ok(health.status == "ok" || health.status == "healthy")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let api = HttpApi::new(&ServerConfig {
            base_url: "http://example.test:8000/".to_string(),
            ..ServerConfig::default()
        })
        .unwrap();
        assert_eq!(api.api_root(), "http://example.test:8000/api/v1");
        assert_eq!(
            api.conversation_url("a b"),
            "http://example.test:8000/api/v1/conversations/a%20b"
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ServerConfig {
            base_url: "ftp://example.test".to_string(),
            ..ServerConfig::default()
        };
        assert!(HttpApi::new(&config).is_err());
    }

    #[test]
    fn test_send_request_shape() {
        let body = serde_json::to_value(SendMessageRequest {
            content: "hi",
            role: MessageRole::User,
            doc_ids: &[],
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"content": "hi", "role": "user"}));

        let ids = vec!["d1".to_string()];
        let body = serde_json::to_value(CreateConversationRequest {
            first_message: "hello",
            doc_ids: &ids,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"first_message": "hello", "doc_ids": ["d1"]})
        );
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("Report.PDF"), "application/pdf");
        assert_eq!(mime_for("notes.txt"), "application/octet-stream");
    }
}
