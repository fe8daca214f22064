//! Preview server: renders the feed, profile and chat fragments as pages.
//!
//! The browser's `access_token` cookie is forwarded to the backend as a bearer
//! token. Requests without a usable token, or rejected by the backend, are
//! sent to the login view. `/chat/ws/{peer_id}` relays the conversation
//! stream, and `/static` serves the stylesheet and chat script.

mod relay;

pub use relay::{CLOSE_FORBIDDEN, CLOSE_UPSTREAM_FAILED};

use axum::{
    Extension, Form, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::{Client, PostCreate, PostImage, PostUpdate};
use crate::chat::{ChatSurface, Participant};
use crate::config::AppConfig;
use crate::error::Error;
use crate::render::{
    HtmlChatPane, html_shell, render_create_form, render_edit_form, render_feed,
    render_profile_header, render_profile_posts,
};

/// Upload limit for `POST /posts`.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Cookie the auth service sets on login.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Shared state for the preview server.
#[derive(Debug, Clone)]
pub struct ServerState {
    pub config: Arc<AppConfig>,
    /// Connection pool reused by every per-request [`Client`].
    pub http: reqwest::Client,
}

impl ServerState {
    pub fn new(config: Arc<AppConfig>) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, http })
    }
}

/// Start the preview server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = ServerState::new(Arc::clone(&config))?;
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        backend = %config.backend.base_url,
        "Preview server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the router; exposed for tests.
pub fn build_router(state: ServerState) -> Router {
    // backend timeout plus headroom for rendering
    let timeout_duration = state.config.timeout() + Duration::from_secs(5);

    let pages = Router::new()
        .route("/", get(feed_page))
        .route("/profile", get(profile_page))
        .route("/fragments/feed", get(feed_fragment))
        .route("/fragments/profile/posts", get(profile_posts_fragment))
        .route("/fragments/posts/{id}/edit", get(edit_form_fragment))
        .route(
            "/fragments/posts/{id}",
            axum::routing::put(update_post).delete(delete_post),
        )
        .route("/fragments/chat/{peer_id}", get(chat_fragment))
        .route("/posts/create", get(create_page))
        .route(
            "/posts",
            axum::routing::post(create_post).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/chat/ws/{peer_id}", get(chat_socket))
        .nest_service("/static", ServeDir::new(&state.config.server.static_dir))
        .merge(pages)
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let duration = timeout_duration;
                async move {
                    match tokio::time::timeout(duration, next.run(req)).await {
                        Ok(res) => res,
                        Err(_) => {
                            (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
                        }
                    }
                }
            },
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Per-request backend access, inserted by [`session_middleware`].
#[derive(Debug, Clone)]
struct BackendSession {
    client: Client,
    htmx: bool,
    login_url: String,
    default_avatar: String,
    htmx_src: String,
}

impl BackendSession {
    /// Map a backend failure onto the page response.
    fn fail(&self, err: &Error, action: &'static str) -> PageError {
        if err.is_unauthorized() {
            return PageError::Login {
                htmx: self.htmx,
                login_url: self.login_url.clone(),
            };
        }
        error!(error = %err, action, "Backend request failed");
        PageError::Backend(format!("Could not {action}"))
    }

    async fn viewer(&self) -> Result<Participant, PageError> {
        let profile = self
            .client
            .users()
            .me()
            .await
            .map_err(|e| self.fail(&e, "load your profile"))?;
        Ok(Participant::from_profile(profile, &self.default_avatar))
    }
}

fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().trim().to_owned())
        .filter(|t| !t.is_empty())
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .is_some_and(|v| v.as_bytes() == b"true")
}

async fn session_middleware(
    State(state): State<ServerState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let htmx = is_htmx(request.headers());
    let login_url = state.config.auth.login_url.clone();

    let Some(token) = session_token(&jar) else {
        return PageError::Login { htmx, login_url }.into_response();
    };

    let client = match Client::with_client(&state.config.backend.base_url, state.http.clone()) {
        Ok(client) => client.with_access_token(token),
        Err(e) => {
            error!(error = %e, "Invalid backend URL");
            return PageError::Backend("Backend is misconfigured".to_string()).into_response();
        }
    };

    request.extensions_mut().insert(BackendSession {
        client,
        htmx,
        login_url,
        default_avatar: state.config.ui.default_avatar.clone(),
        htmx_src: state.config.ui.htmx_src.clone(),
    });
    next.run(request).await
}

#[derive(Debug)]
enum PageError {
    /// Send the viewer to the login view.
    Login { htmx: bool, login_url: String },
    /// Backend failure, reported as 502.
    Backend(String),
    /// Rejected form, re-rendered with its error.
    Invalid(Html<String>),
    NotFound,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            Self::Login {
                htmx: true,
                login_url,
            } => (StatusCode::OK, [("HX-Redirect", login_url)]).into_response(),
            Self::Login {
                htmx: false,
                login_url,
            } => Redirect::to(&login_url).into_response(),
            Self::Backend(message) => (StatusCode::BAD_GATEWAY, message).into_response(),
            Self::Invalid(page) => (StatusCode::BAD_REQUEST, page).into_response(),
            Self::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pages
// ─────────────────────────────────────────────────────────────────────────────

/// GET / - Feed page with an empty chat window.
async fn feed_page(
    Extension(session): Extension<BackendSession>,
) -> Result<Html<String>, PageError> {
    let cards = feed_cards(&session).await?;
    let chat = HtmlChatPane::new().render();
    let content = format!(
        r#"<section id="feed-container" hx-get="/fragments/feed" hx-trigger="refresh">{cards}</section>
<div id="chat-root">{chat}</div>"#
    );
    Ok(Html(html_shell("Feed", &session.htmx_src, &content)))
}

/// GET /profile - Viewer header and own posts.
async fn profile_page(
    Extension(session): Extension<BackendSession>,
) -> Result<Html<String>, PageError> {
    let viewer = session.viewer().await?;
    let posts = own_posts(&session).await?;
    let content = format!(
        r#"{header}
<section id="profile-posts">{posts}</section>
<div id="edit-modal"></div>"#,
        header = render_profile_header(&viewer),
    );
    Ok(Html(html_shell("Profile", &session.htmx_src, &content)))
}

/// GET /posts/create - Empty new post form.
async fn create_page(Extension(session): Extension<BackendSession>) -> Html<String> {
    let form = render_create_form(&PostCreate::default(), None);
    Html(html_shell("New post", &session.htmx_src, &form))
}

/// POST /posts - Forward the form to the backend, then back to the feed.
///
/// Missing fields and backend rejections re-render the form with the
/// submitted values; an expired session still goes to the login view.
async fn create_post(
    Extension(session): Extension<BackendSession>,
    multipart: Multipart,
) -> Result<Redirect, PageError> {
    let invalid = |post: &PostCreate, message: &str| {
        let form = render_create_form(post, Some(message));
        PageError::Invalid(Html(html_shell("New post", &session.htmx_src, &form)))
    };

    let (post, image) = match read_create_form(multipart).await {
        Ok(parts) => parts,
        Err(e) => {
            warn!(error = %e, "Unreadable post form");
            return Err(invalid(&PostCreate::default(), "The form could not be read"));
        }
    };
    if let Some(field) = post.missing_field() {
        return Err(invalid(&post, &format!("The {field} is required")));
    }

    match session.client.posts().create(&post, image).await {
        Ok(()) => Ok(Redirect::to("/")),
        Err(e) if e.is_unauthorized() => Err(session.fail(&e, "create the post")),
        Err(e) => {
            error!(error = %e, "Backend request failed");
            Err(invalid(&post, "Could not create the post"))
        }
    }
}

/// Split the multipart body into text fields and the optional picture.
/// An empty file input counts as no picture.
async fn read_create_form(
    mut multipart: Multipart,
) -> Result<(PostCreate, Option<PostImage>), axum::extract::multipart::MultipartError> {
    let mut post = PostCreate::default();
    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "title" => post.title = field.text().await?,
            "description" => post.description = field.text().await?,
            "details" => {
                let details = field.text().await?;
                post.details = Some(details).filter(|d| !d.trim().is_empty());
            }
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                if !file_name.is_empty() && !bytes.is_empty() {
                    image = Some(PostImage {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok((post, image))
}

// ─────────────────────────────────────────────────────────────────────────────
// Fragments
// ─────────────────────────────────────────────────────────────────────────────

async fn feed_cards(session: &BackendSession) -> Result<String, PageError> {
    // viewer first, so the viewer's own posts get no message button
    let viewer = session.viewer().await?;
    let posts = session
        .client
        .posts()
        .feed()
        .await
        .map_err(|e| session.fail(&e, "load the feed"))?;
    Ok(render_feed(&posts, Some(&viewer), &session.default_avatar))
}

async fn own_posts(session: &BackendSession) -> Result<String, PageError> {
    let posts = session
        .client
        .posts()
        .mine()
        .await
        .map_err(|e| session.fail(&e, "load your posts"))?;
    Ok(render_profile_posts(&posts, &session.default_avatar))
}

/// GET /fragments/feed
async fn feed_fragment(
    Extension(session): Extension<BackendSession>,
) -> Result<Html<String>, PageError> {
    Ok(Html(feed_cards(&session).await?))
}

/// GET /fragments/profile/posts
async fn profile_posts_fragment(
    Extension(session): Extension<BackendSession>,
) -> Result<Html<String>, PageError> {
    Ok(Html(own_posts(&session).await?))
}

/// GET /fragments/posts/{id}/edit - Edit form for one of the viewer's posts.
async fn edit_form_fragment(
    Extension(session): Extension<BackendSession>,
    Path(id): Path<String>,
) -> Result<Html<String>, PageError> {
    let posts = session
        .client
        .posts()
        .mine()
        .await
        .map_err(|e| session.fail(&e, "load your posts"))?;
    let post = posts
        .iter()
        .find(|p| p.id == id)
        .ok_or(PageError::NotFound)?;
    Ok(Html(render_edit_form(post)))
}

/// PUT /fragments/posts/{id} - Save the edit form, return the refreshed list.
async fn update_post(
    Extension(session): Extension<BackendSession>,
    Path(id): Path<String>,
    Form(update): Form<PostUpdate>,
) -> Result<Html<String>, PageError> {
    session
        .client
        .posts()
        .update(&id, &update)
        .await
        .map_err(|e| session.fail(&e, "update the post"))?;
    Ok(Html(own_posts(&session).await?))
}

/// DELETE /fragments/posts/{id} - The card is swapped for the empty body.
async fn delete_post(
    Extension(session): Extension<BackendSession>,
    Path(id): Path<String>,
) -> Result<Html<String>, PageError> {
    session
        .client
        .posts()
        .delete(&id)
        .await
        .map_err(|e| session.fail(&e, "delete the post"))?;
    Ok(Html(String::new()))
}

/// GET /chat/ws/{peer_id} - Relay to the backend conversation stream.
///
/// Sits outside the session middleware: a socket cannot follow a redirect, so
/// a missing session is reported with close code 4003 after the upgrade.
async fn chat_socket(
    State(state): State<ServerState>,
    jar: CookieJar,
    Path(peer_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = session_token(&jar);
    ws.on_upgrade(move |socket| relay::run(socket, state, token, peer_id))
}

#[derive(Debug, Deserialize)]
struct ChatQuery {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

/// GET /fragments/chat/{peer_id} - Chat window hydrated with history.
async fn chat_fragment(
    Extension(session): Extension<BackendSession>,
    Path(peer_id): Path<String>,
    Query(query): Query<ChatQuery>,
) -> Result<Html<String>, PageError> {
    let viewer = session.viewer().await?;
    if viewer.id == peer_id {
        return Err(PageError::NotFound);
    }

    let peer = Participant::new(
        peer_id.clone(),
        query.name.unwrap_or_else(|| "User".to_string()),
        query
            .avatar
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| session.default_avatar.clone()),
    );

    let history = session
        .client
        .chat()
        .messages(&peer_id)
        .await
        .map_err(|e| session.fail(&e, "load the conversation"))?;

    let mut pane = HtmlChatPane::new();
    pane.show(&peer);
    for message in &history {
        pane.append(&message.to_bubble(&viewer.id));
    }
    Ok(Html(pane.render()))
}
