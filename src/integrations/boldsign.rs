//! BoldSign e-signature client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::integrations::{IntegrationError, VendorHttp};

const VENDOR: &str = "BoldSign";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signer {
    pub name: String,
    pub email_address: String,
}

/// A signature request built from documents reachable by URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub signers: Vec<Signer>,
    pub file_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentDocument {
    pub document_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatus {
    pub document_id: String,
    pub status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBody<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    signers: Vec<SignerBody<'a>>,
    file_urls: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignerBody<'a> {
    name: &'a str,
    email_address: &'a str,
    signer_type: &'static str,
}

#[derive(Clone)]
pub struct BoldSignClient {
    http: VendorHttp,
    api_base: String,
    api_key: String,
}

impl BoldSignClient {
    pub fn new(api_base: &str, api_key: String, timeout: Duration) -> Result<Self, IntegrationError> {
        Ok(Self {
            http: VendorHttp::new(VENDOR, timeout)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Send a document for signature. Not retried: a repeat would mail the signers twice.
    pub async fn send_document(&self, request: &SignatureRequest) -> Result<SentDocument, IntegrationError> {
        let body = SendBody {
            title: &request.title,
            message: request.message.as_deref(),
            signers: request
                .signers
                .iter()
                .map(|s| SignerBody { name: &s.name, email_address: &s.email_address, signer_type: "Signer" })
                .collect(),
            file_urls: &request.file_urls,
        };

        let req = self
            .http
            .client()
            .post(format!("{}/v1/document/send", self.api_base))
            .header("X-API-KEY", &self.api_key)
            .json(&body);
        self.http.send_json(req).await
    }

    pub async fn document_status(&self, document_id: &str) -> Result<DocumentStatus, IntegrationError> {
        let req = self
            .http
            .client()
            .get(format!("{}/v1/document/properties", self.api_base))
            .header("X-API-KEY", &self.api_key)
            .query(&[("documentId", document_id)]);
        self.http.send_json(req).await
    }
}
