//! HTTP client for the AdopPet backend.
//!
//! Endpoints are grouped the way the backend routes them:
//!
//! ```rust,no_run
//! use adoppet_client::api::{Client, PostCreate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("http://localhost:8000")?.with_access_token("token");
//!
//! let me = client.users().me().await?;
//! let feed = client.posts().feed().await?;
//! let history = client.chat().messages("42").await?;
//!
//! let post = PostCreate {
//!     title: "Luna".into(),
//!     description: "Calm cat".into(),
//!     details: None,
//! };
//! client.posts().create(&post, None).await?;
//! # Ok(())
//! # }
//! ```

mod types;

pub use types::{FeedPost, OwnPost, PostCreate, PostImage, PostUpdate, UserProfile};

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use url::Url;

use crate::chat::ChatMessage;
use crate::config::AppConfig;
use crate::error::{Error, Result};

/// HTTP client for the backend API.
#[derive(Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    access_token: Option<String>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.access_token.is_some())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend (e.g., "http://localhost:8000")
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a new client with a custom reqwest client.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("{base_url} cannot be used as a base URL")));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            http,
            access_token: None,
        })
    }

    /// Build a client from resolved configuration (base URL, timeout, token).
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        let client = Self::with_client(&config.backend.base_url, http)?;
        Ok(match config.access_token() {
            Some(token) => client.with_access_token(token),
            None => client,
        })
    }

    /// Attach the viewer's access token; sent as a bearer token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the access token, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the Users API.
    pub fn users(&self) -> UsersApi<'_> {
        UsersApi { client: self }
    }

    /// Access the Posts API.
    pub fn posts(&self) -> PostsApi<'_> {
        PostsApi { client: self }
    }

    /// Access the Chat API.
    pub fn chat(&self) -> ChatApi<'_> {
        ChatApi { client: self }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve path segments against the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("{} cannot be used as a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%method, %url, "Backend request");
        let builder = self.http.request(method, url);
        Ok(match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(status = status.as_u16(), url = %response.url(), "Backend rejected credentials");
            return Err(Error::Unauthorized {
                status: status.as_u16(),
            });
        }
        let url = response.url().clone();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".into());
        tracing::warn!(status = status.as_u16(), %url, %message, "Backend request failed");
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

// =============================================================================
// Users API
// =============================================================================

/// Users API client.
#[derive(Debug)]
pub struct UsersApi<'a> {
    client: &'a Client,
}

impl UsersApi<'_> {
    /// Fetch the authenticated viewer.
    pub async fn me(&self) -> Result<UserProfile> {
        let response = self
            .client
            .request(Method::GET, &["users", "me"])?
            .send()
            .await?;
        Client::handle_response(response).await
    }
}

// =============================================================================
// Posts API
// =============================================================================

/// Posts API client.
#[derive(Debug)]
pub struct PostsApi<'a> {
    client: &'a Client,
}

impl PostsApi<'_> {
    /// List the public feed.
    pub async fn feed(&self) -> Result<Vec<FeedPost>> {
        let response = self
            .client
            .request(Method::GET, &["posts", "feed", "all"])?
            .send()
            .await?;
        Client::handle_response(response).await
    }

    /// List the viewer's own posts.
    pub async fn mine(&self) -> Result<Vec<OwnPost>> {
        let response = self
            .client
            .request(Method::GET, &["posts", "user", "me"])?
            .send()
            .await?;
        Client::handle_response(response).await
    }

    /// Publish a new post, optionally with a picture.
    ///
    /// Sent as `multipart/form-data`; `details` is left out when unset.
    pub async fn create(&self, post: &PostCreate, image: Option<PostImage>) -> Result<()> {
        let mut form = Form::new()
            .text("title", post.title.clone())
            .text("description", post.description.clone());
        if let Some(details) = &post.details {
            form = form.text("details", details.clone());
        }
        if let Some(image) = image {
            let mime = image.mime();
            let part = Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(&mime)?;
            form = form.part("file", part);
        }

        let response = self
            .client
            .request(Method::POST, &["posts", ""])?
            .multipart(form)
            .send()
            .await?;
        Client::check_status(response).await?;
        tracing::info!(name: "posts.created", title = %post.title, "Post created");
        Ok(())
    }

    /// Delete one of the viewer's posts.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .request(Method::DELETE, &["posts", id])?
            .send()
            .await?;
        Client::check_status(response).await?;
        tracing::info!(name: "posts.deleted", post_id = %id, "Post deleted");
        Ok(())
    }

    /// Update title, description and details of a post.
    pub async fn update(&self, id: &str, update: &PostUpdate) -> Result<()> {
        let response = self
            .client
            .request(Method::PUT, &["posts", id])?
            .form(update)
            .send()
            .await?;
        Client::check_status(response).await?;
        tracing::info!(name: "posts.updated", post_id = %id, "Post updated");
        Ok(())
    }
}

// =============================================================================
// Chat API
// =============================================================================

/// Chat API client.
#[derive(Debug)]
pub struct ChatApi<'a> {
    client: &'a Client,
}

impl ChatApi<'_> {
    /// Conversation history with `peer_id`, oldest first.
    pub async fn messages(&self, peer_id: &str) -> Result<Vec<ChatMessage>> {
        let response = self
            .client
            .request(Method::GET, &["chat", "messages", peer_id])?
            .send()
            .await?;
        Client::handle_response(response).await
    }

    /// Streaming endpoint for `peer_id`; the scheme mirrors the base URL.
    pub fn socket_url(&self, peer_id: &str) -> Result<Url> {
        let mut url = self.client.endpoint(&["chat", "ws", peer_id])?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(Error::Config(format!(
                    "unsupported backend scheme for streaming: {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::Config(format!("cannot switch {url} to {scheme}")))?;
        Ok(url)
    }
}
