use std::fmt;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::dry_run::DryRun;

/// Post id reported by `create_post` when dry-run suppresses the request.
pub const DRY_RUN_POST_ID: u64 = 0;

#[derive(Debug, Error)]
pub enum SzuruError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("remote rejected request: {0}")]
    Rejected(String),
    #[error("unexpected response ({status}): {body}")]
    Unexpected { status: StatusCode, body: String },
}

/// Client for a szurubooru instance. Immutable for the whole run: the API
/// url, auth token, offline flag and dry-run gate are fixed at construction.
#[derive(Clone)]
pub struct SzuruClient {
    http: Client,
    api_url: Url,
    token: String,
    offline: bool,
    dry_run: DryRun,
}

impl SzuruClient {
    pub fn new(
        address: &str,
        token: impl Into<String>,
        offline: bool,
        dry_run: DryRun,
    ) -> Result<Self, SzuruError> {
        let api_url = Url::parse(&format!("{}/api/", address.trim_end_matches('/')))?;
        Ok(Self {
            http: Client::new(),
            api_url,
            token: token.into(),
            offline,
            dry_run,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn dry_run(&self) -> DryRun {
        self.dry_run
    }

    /// Stages raw content on the temporary uploads endpoint and returns the
    /// content token referencing it. Staged content is transient server
    /// state, so this is not gated by dry-run.
    pub async fn upload_temporary(
        &self,
        content: Vec<u8>,
        file_name: &str,
    ) -> Result<String, SzuruError> {
        let part = Part::bytes(content).file_name(file_name.to_string());
        let form = Form::new().part("content", part);
        let response = self
            .request(reqwest::Method::POST, "uploads")?
            .multipart(form)
            .send()
            .await?;
        let upload: TemporaryUpload = Self::handle_response(response).await?;
        Ok(upload.token)
    }

    /// Reverse-searches the staged content. `exact_post` is `None` when no
    /// byte-identical post exists on the server.
    pub async fn reverse_search(&self, content_token: &str) -> Result<ReverseSearch, SzuruError> {
        let response = self
            .request(reqwest::Method::POST, "posts/reverse-search")?
            .json(&ReverseSearchRequest { content_token })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Finalizes the staged content into a post and returns its id. Gated:
    /// in dry-run the request is never issued and [`DRY_RUN_POST_ID`] is
    /// returned so callers can keep branching on a concrete id.
    pub async fn create_post(
        &self,
        content_token: &str,
        tags: &[String],
        safety: Safety,
        relations: &[u64],
    ) -> Result<u64, SzuruError> {
        if self.dry_run.is_active() {
            return Ok(DRY_RUN_POST_ID);
        }
        let response = self
            .request(reqwest::Method::POST, "posts")?
            .json(&CreatePostRequest {
                tags,
                safety,
                relations,
                content_token,
            })
            .send()
            .await?;
        let created: CreatedPost = Self::handle_response(response).await?;
        Ok(created.id)
    }

    /// Deletes an existing post. Gated by dry-run.
    pub async fn delete_post(&self, id: u64) -> Result<(), SzuruError> {
        if self.dry_run.is_active() {
            return Ok(());
        }
        let response = self
            .request(reqwest::Method::DELETE, &format!("post/{id}"))?
            .json(&DeletePostRequest { version: "1" })
            .send()
            .await?;
        Self::handle_response::<serde_json::Value>(response).await?;
        Ok(())
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, SzuruError> {
        let url = self.api_url.join(path)?;
        Ok(self
            .http
            .request(method, url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json"))
    }

    /// The service reports failures as a JSON body carrying a `description`
    /// field, sometimes with a 2xx status, so the body is inspected before
    /// the expected payload is decoded.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SzuruError> {
        let status = response.status();
        let body = response.text().await?;
        if let Ok(rejection) = serde_json::from_str::<Rejection>(&body) {
            return Err(SzuruError::Rejected(rejection.description));
        }
        serde_json::from_str(&body).map_err(|_| SzuruError::Unexpected { status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Safety {
    Safe,
    Unsafe,
}

impl fmt::Display for Safety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Safety::Safe => "safe",
            Safety::Unsafe => "unsafe",
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseSearch {
    pub exact_post: Option<PostRef>,
    #[serde(default)]
    pub similar_posts: Vec<SimilarPost>,
}

impl ReverseSearch {
    pub fn similar_ids(&self) -> Vec<u64> {
        self.similar_posts.iter().map(|entry| entry.post.id).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SimilarPost {
    #[serde(default)]
    pub distance: Option<f64>,
    pub post: PostRef,
}

#[derive(Debug, Deserialize)]
pub struct PostRef {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
struct TemporaryUpload {
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Rejection {
    description: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReverseSearchRequest<'a> {
    content_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest<'a> {
    tags: &'a [String],
    safety: Safety,
    relations: &'a [u64],
    content_token: &'a str,
}

// The service expects the resource version as a string.
#[derive(Serialize)]
struct DeletePostRequest {
    version: &'static str,
}
