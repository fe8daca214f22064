//! In-process stand-in for the AdopPet backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router,
    extract::{
        Multipart, Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, COOKIE},
    },
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::json;

pub const TOKEN: &str = "good-token";

/// Requests the fake backend saw.
#[derive(Debug, Default)]
pub struct Recorded {
    pub updates: Mutex<Vec<(String, HashMap<String, String>)>>,
    pub deletes: Mutex<Vec<String>>,
    pub creates: Mutex<Vec<CreatedPost>>,
}

/// Multipart body of one `POST /posts/`.
#[derive(Debug, Default, Clone)]
pub struct CreatedPost {
    pub fields: HashMap<String, String>,
    /// `(file name, content type, bytes)` of the attached picture.
    pub file: Option<(String, String, Vec<u8>)>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

macro_rules! require_auth {
    ($headers:expr) => {
        if !authorized(&$headers) {
            return (StatusCode::UNAUTHORIZED, "Not authenticated").into_response();
        }
    };
}

async fn me(headers: HeaderMap) -> Response {
    require_auth!(headers);
    Json(json!({"id": "7", "name": "Sam", "profile_image": null})).into_response()
}

async fn feed(headers: HeaderMap) -> Response {
    require_auth!(headers);
    Json(json!([
        {
            "user_id": "7",
            "user_name": "Sam",
            "title": "My cat",
            "description": "Mine"
        },
        {
            "user_id": "42",
            "user_name": "Alex",
            "user_profile_image": "/img/alex.png",
            "image_url": "/img/rex.png",
            "title": "Rex <3",
            "description": "Friendly dog"
        }
    ]))
    .into_response()
}

async fn mine(headers: HeaderMap) -> Response {
    require_auth!(headers);
    Json(json!([
        {"id": "p1", "title": "My cat", "description": "Mine", "details": "Indoor"},
        {"id": "p2"}
    ]))
    .into_response()
}

async fn update(
    State(recorded): State<Arc<Recorded>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    require_auth!(headers);
    if id == "missing" {
        return (StatusCode::NOT_FOUND, "Post not found").into_response();
    }
    recorded.updates.lock().unwrap().push((id, form));
    StatusCode::OK.into_response()
}

async fn delete(
    State(recorded): State<Arc<Recorded>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    require_auth!(headers);
    if id == "missing" {
        return (StatusCode::NOT_FOUND, "Post not found").into_response();
    }
    if id == "broken" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database down").into_response();
    }
    recorded.deletes.lock().unwrap().push(id);
    StatusCode::NO_CONTENT.into_response()
}

async fn create(
    State(recorded): State<Arc<Recorded>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    require_auth!(headers);
    let mut created = CreatedPost::default();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap().to_vec();
            created.file = Some((file_name, content_type, bytes));
        } else {
            created.fields.insert(name, field.text().await.unwrap());
        }
    }
    if created.fields.get("title").is_some_and(|t| t == "explode") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "storage down").into_response();
    }
    recorded.creates.lock().unwrap().push(created);
    Json(json!({"message": "ok", "post": {"id": "p3"}})).into_response()
}

/// Chat socket: greets with one peer message, echoes text as the viewer's.
/// Upgrades need the `access_token` cookie.
async fn chat_socket(
    headers: HeaderMap,
    Path(peer): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let cookie_ok = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(&format!("access_token={TOKEN}")));
    if !cookie_ok {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    ws.on_upgrade(move |socket| echo_socket(socket, peer))
}

async fn echo_socket(mut socket: WebSocket, peer: String) {
    let greeting = json!({"id": "live1", "sender_id": peer, "content": "hi <3"});
    if socket
        .send(Message::Text(greeting.to_string().into()))
        .await
        .is_err()
    {
        return;
    }
    let _ = socket.send(Message::Text("not json".into())).await;

    let mut echoed = 0;
    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                echoed += 1;
                let echo = json!({
                    "id": format!("echo{echoed}"),
                    "sender_id": "7",
                    "content": text.as_str(),
                });
                if socket
                    .send(Message::Text(echo.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn messages(headers: HeaderMap, Path(peer): Path<String>) -> Response {
    require_auth!(headers);
    if peer == "forbidden" {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    Json(json!([
        {"id": "m1", "sender_id": peer, "receiver_id": "7", "content": "hi <b>there</b>", "timestamp": "2024-05-01T10:00:00"},
        {"id": "m2", "sender_id": "7", "receiver_id": peer, "content": "hello"}
    ]))
    .into_response()
}

/// Serve the fake backend on a loopback port. Returns its base URL.
pub async fn spawn_backend() -> (String, Arc<Recorded>) {
    let recorded = Arc::new(Recorded::default());
    let app = Router::new()
        .route("/users/me", get(me))
        .route("/posts/feed/all", get(feed))
        .route("/posts/user/me", get(mine))
        .route("/posts/", post(create))
        .route("/posts/{id}", put(update).delete(delete))
        .route("/chat/messages/{peer}", get(messages))
        .route("/chat/ws/{peer}", get(chat_socket))
        .with_state(Arc::clone(&recorded));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), recorded)
}
