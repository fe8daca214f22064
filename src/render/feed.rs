//! Feed cards.

use std::fmt::Write as _;

use url::form_urlencoded;

use super::{encode_segment, escape_html};
use crate::api::FeedPost;
use crate::chat::Participant;

const UNKNOWN_AUTHOR: &str = "User";

/// Render the public feed.
///
/// Posts written by someone other than `viewer` get a "Send message" button
/// that loads the chat window for their author.
pub fn render_feed(
    posts: &[FeedPost],
    viewer: Option<&Participant>,
    default_avatar: &str,
) -> String {
    let mut out = String::new();
    for post in posts {
        render_card(&mut out, post, viewer, default_avatar);
    }
    out
}

fn render_card(
    out: &mut String,
    post: &FeedPost,
    viewer: Option<&Participant>,
    default_avatar: &str,
) {
    let avatar = post
        .user_profile_image
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(default_avatar);
    let name = post
        .user_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_AUTHOR);
    let is_mine = viewer.is_some_and(|v| v.id == post.user_id);

    let message_button = if is_mine {
        String::new()
    } else {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("name", name)
            .append_pair("avatar", avatar)
            .finish();
        let path = format!("/fragments/chat/{}?{query}", encode_segment(&post.user_id));
        format!(
            r##"<button class="post-message-btn" data-user-id="{id}" data-user-name="{name}" data-user-avatar="{avatar}" hx-get="{path}" hx-target="#chat-root" hx-swap="innerHTML">Send message</button>"##,
            id = escape_html(&post.user_id),
            name = escape_html(name),
            avatar = escape_html(avatar),
            path = escape_html(&path),
        )
    };

    let image = post
        .image_url
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|url| format!(r#"<img src="{}" class="post-image">"#, escape_html(url)))
        .unwrap_or_default();

    let _ = write!(
        out,
        r#"<div class="post-card">
    <div class="post-header">
        <div class="post-user">
            <img src="{avatar}" class="post-avatar">
            <span class="post-username">{name}</span>
        </div>
        {message_button}
    </div>
    {image}
    <div class="post-content">
        <h3>{title}</h3>
        <p>{description}</p>
    </div>
</div>
"#,
        avatar = escape_html(avatar),
        name = escape_html(name),
        title = escape_html(&post.title),
        description = escape_html(&post.description),
    );
}
