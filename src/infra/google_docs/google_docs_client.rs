// =============================================================================
// GOOGLE DOCS CLIENT WITH SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// Lists Google Docs through the Drive v3 API and fetches their bodies through
// the Docs v1 API.
//
// **Authentication Options:**
//
// 1. **Service Account (recommended):**
//    - Create a service account in Google Cloud Console and download a JSON key
//    - Enable the Google Drive API and the Google Docs API for the project
//    - Share the documents (or a folder) with the service account email
//    - Set `GOOGLE_SERVICE_ACCOUNT_KEY` (path to the key file) or
//      `GOOGLE_SERVICE_ACCOUNT_JSON` (the key content itself)
//
// 2. **Pre-issued access token:**
//    - Set `GOOGLE_ACCESS_TOKEN` to an OAuth2 token that already carries the
//      drive.metadata.readonly and documents.readonly scopes
//    - The token is used as-is and never refreshed

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::core::documents::{
    DocumentListing, DocumentPage, DocumentSource, SourceDocument, StructuralElement,
};
use crate::core::errors::RagError;
use crate::infra::http::{ensure_success, request_error};
use async_trait::async_trait;

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const DOCS_URL: &str = "https://docs.googleapis.com/v1/documents";
const GOOGLE_DOC_MIME_TYPE: &str = "application/vnd.google-apps.document";
const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/drive.metadata.readonly",
    "https://www.googleapis.com/auth/documents.readonly",
];

// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// The service account email (used as issuer in JWT).
    client_email: String,

    /// The private key in PEM format.
    private_key: String,

    /// The token URI (where to exchange JWT for access token).
    token_uri: String,
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    /// Space-separated list of scopes.
    scope: String,
    aud: String,
    iat: u64,
    /// Max 1 hour after `iat`.
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// Authenticator that handles OAuth2 with service account credentials.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    /// `client` is used for the token exchange; pass the one carrying the
    /// configured timeout.
    pub async fn from_file(path: &str, client: Client) -> Result<Self, RagError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RagError::Config(format!("failed to read service account key {}: {}", path, e))
        })?;
        Self::from_json(&content, client)
    }

    pub fn from_json(json: &str, client: Client) -> Result<Self, RagError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)
            .map_err(|e| RagError::Config(format!("invalid service account key: {}", e)))?;
        Ok(Self {
            credentials,
            client,
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Gets a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String, RagError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let (new_token, lifetime) = self.fetch_new_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(CachedToken {
                token: new_token.clone(),
                expires_at: SystemTime::now() + lifetime,
            });
        }

        Ok(new_token)
    }

    async fn fetch_new_token(&self) -> Result<(String, Duration), RagError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RagError::Config(format!("system clock error: {}", e)))?
            .as_secs();

        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: SCOPES.join(" "),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| RagError::Config(format!("invalid service account private key: {}", e)))?;
        let jwt = encode(&header, &claims, &key)
            .map_err(|e| RagError::Config(format!("failed to sign token request: {}", e)))?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .map_err(|e| request_error("Google OAuth", e))?;

        let response = ensure_success("Google OAuth", response).await?;
        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| request_error("Google OAuth", e))?;

        // Refresh a little early rather than trusting the full lifetime.
        let lifetime = token_response
            .expires_in
            .map(|secs| Duration::from_secs(secs.saturating_sub(300)))
            .unwrap_or(Duration::from_secs(55 * 60));

        tracing::debug!(
            account = %self.credentials.client_email,
            "Obtained Google access token"
        );

        Ok((token_response.access_token, lifetime))
    }
}

/// How requests to Google are authorized.
pub enum GoogleAuth {
    ServiceAccount(ServiceAccountAuth),
    AccessToken(String),
}

impl GoogleAuth {
    async fn bearer_token(&self) -> Result<String, RagError> {
        match self {
            GoogleAuth::ServiceAccount(auth) => auth.get_access_token().await,
            GoogleAuth::AccessToken(token) => Ok(token.clone()),
        }
    }
}

// =============================================================================
// GOOGLE API RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDocument {
    document_id: String,
    #[serde(default)]
    title: String,
    body: Option<Body>,
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(default)]
    content: Vec<ApiStructuralElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStructuralElement {
    paragraph: Option<Paragraph>,
    table: Option<Table>,
    table_of_contents: Option<TableOfContents>,
}

#[derive(Debug, Deserialize)]
struct Paragraph {
    #[serde(default)]
    elements: Vec<ParagraphElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphElement {
    text_run: Option<TextRun>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Table {
    #[serde(default)]
    table_rows: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableRow {
    #[serde(default)]
    table_cells: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    content: Vec<ApiStructuralElement>,
}

#[derive(Debug, Deserialize)]
struct TableOfContents {
    #[serde(default)]
    content: Vec<ApiStructuralElement>,
}

impl From<ApiStructuralElement> for StructuralElement {
    fn from(element: ApiStructuralElement) -> Self {
        if let Some(paragraph) = element.paragraph {
            let runs = paragraph
                .elements
                .into_iter()
                .filter_map(|e| e.text_run.and_then(|run| run.content))
                .collect();
            return StructuralElement::Paragraph(runs);
        }

        if let Some(table) = element.table {
            let rows = table
                .table_rows
                .into_iter()
                .map(|row| {
                    row.table_cells
                        .into_iter()
                        .map(|cell| convert_elements(cell.content))
                        .collect()
                })
                .collect();
            return StructuralElement::Table(rows);
        }

        if let Some(toc) = element.table_of_contents {
            return StructuralElement::TableOfContents(convert_elements(toc.content));
        }

        StructuralElement::Other
    }
}

fn convert_elements(elements: Vec<ApiStructuralElement>) -> Vec<StructuralElement> {
    elements.into_iter().map(StructuralElement::from).collect()
}

impl From<ApiDocument> for SourceDocument {
    fn from(document: ApiDocument) -> Self {
        SourceDocument {
            id: document.document_id,
            title: document.title,
            body: document
                .body
                .map(|body| convert_elements(body.content))
                .unwrap_or_default(),
        }
    }
}

// =============================================================================
// GOOGLE DOCS CLIENT
// =============================================================================

/// Lists and fetches Google Docs visible to the authorized principal.
pub struct GoogleDocsClient {
    client: Client,
    auth: GoogleAuth,
}

impl GoogleDocsClient {
    /// Picks credentials from the environment: a service account key file,
    /// inline service account JSON, or a pre-issued access token, in that order.
    /// Token exchange and API calls share one client with `timeout` applied.
    pub async fn from_env(timeout: Duration) -> Result<Self, RagError> {
        let client = http_client(timeout)?;

        let auth = if let Ok(path) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            GoogleAuth::ServiceAccount(ServiceAccountAuth::from_file(&path, client.clone()).await?)
        } else if let Ok(json) = std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
            GoogleAuth::ServiceAccount(ServiceAccountAuth::from_json(&json, client.clone())?)
        } else if let Ok(token) = std::env::var("GOOGLE_ACCESS_TOKEN") {
            GoogleAuth::AccessToken(token)
        } else {
            return Err(RagError::Config(
                "Set GOOGLE_SERVICE_ACCOUNT_KEY, GOOGLE_SERVICE_ACCOUNT_JSON or GOOGLE_ACCESS_TOKEN"
                    .to_string(),
            ));
        };

        Ok(Self { client, auth })
    }
}

fn http_client(timeout: Duration) -> Result<Client, RagError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RagError::Config(format!("failed to build HTTP client: {}", e)))
}

#[async_trait]
impl DocumentSource for GoogleDocsClient {
    async fn list_documents(
        &self,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, RagError> {
        let token = self.auth.bearer_token().await?;
        let query = format!("mimeType='{}'", GOOGLE_DOC_MIME_TYPE);
        let page_size = page_size.to_string();

        let mut params = vec![
            ("q", query.as_str()),
            ("pageSize", page_size.as_str()),
            ("fields", "nextPageToken, files(id, name)"),
        ];
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token));
        }

        let response = self
            .client
            .get(DRIVE_FILES_URL)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
            .map_err(|e| request_error("Google Drive", e))?;

        let response = ensure_success("Google Drive", response).await?;
        let listing: FileList = response
            .json()
            .await
            .map_err(|e| request_error("Google Drive", e))?;

        tracing::debug!(
            files = listing.files.len(),
            has_more = listing.next_page_token.is_some(),
            "Listed Google Docs"
        );

        Ok(listing.into())
    }

    async fn fetch_document(&self, document_id: &str) -> Result<SourceDocument, RagError> {
        let token = self.auth.bearer_token().await?;
        let url = format!("{}/{}", DOCS_URL, document_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| request_error("Google Docs", e))?;

        let response = ensure_success("Google Docs", response).await?;
        let document: ApiDocument = response
            .json()
            .await
            .map_err(|e| request_error("Google Docs", e))?;

        tracing::debug!(document_id, title = %document.title, "Fetched Google Doc");

        Ok(document.into())
    }
}

impl From<FileList> for DocumentPage {
    fn from(listing: FileList) -> Self {
        DocumentPage {
            documents: listing
                .files
                .into_iter()
                .map(|file| DocumentListing {
                    id: file.id,
                    title: file.name,
                })
                .collect(),
            next_page_token: listing.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}
