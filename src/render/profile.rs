//! Profile page: viewer header, own posts, edit form.

use std::fmt::Write as _;

use super::{encode_segment, escape_html};
use crate::api::{OwnPost, PostCreate};
use crate::chat::Participant;

/// Avatar and name at the top of the profile page.
pub fn render_profile_header(viewer: &Participant) -> String {
    format!(
        r#"<div class="profile-header">
    <img id="profile-avatar" src="{avatar}" class="profile-avatar">
    <h2 id="profile-name">{name}</h2>
</div>"#,
        avatar = escape_html(&viewer.avatar),
        name = escape_html(&viewer.name),
    )
}

/// The viewer's posts, each with edit and delete controls.
///
/// Delete asks for confirmation (`hx-confirm`) before the request fires.
pub fn render_profile_posts(posts: &[OwnPost], default_image: &str) -> String {
    if posts.is_empty() {
        return r#"<p class="profile-empty">You have no posts yet.</p>"#.to_string();
    }

    let mut out = String::new();
    for post in posts {
        let id = encode_segment(&post.id);
        let image = post
            .image_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(default_image);
        let title = post.title.as_deref().unwrap_or_default();
        let alt = if title.is_empty() { "Post" } else { title };
        let heading = if title.is_empty() { "Untitled" } else { title };

        let _ = write!(
            out,
            r##"<div class="profile-post" id="post-{id}">
    <img src="{image}" alt="{alt}">
    <div class="post-overlay">
        <button class="edit-btn" hx-get="/fragments/posts/{id}/edit" hx-target="#edit-modal" hx-swap="innerHTML">Edit</button>
        <button class="delete-btn" hx-delete="/fragments/posts/{id}" hx-confirm="Are you sure you want to delete this post?" hx-target="#post-{id}" hx-swap="outerHTML">Delete</button>
    </div>
    <div class="profile-post-info">
        <h4>{heading}</h4>
        <p>{description}</p>
    </div>
</div>
"##,
            id = escape_html(&id),
            image = escape_html(image),
            alt = escape_html(alt),
            heading = escape_html(heading),
            description = escape_html(post.description.as_deref().unwrap_or_default()),
        );
    }
    out
}

/// Edit modal for one post, prefilled with its current values.
pub fn render_edit_form(post: &OwnPost) -> String {
    let id = encode_segment(&post.id);
    format!(
        r##"<form id="edit-form" class="edit-modal" hx-put="/fragments/posts/{id}" hx-target="#profile-posts" hx-swap="innerHTML">
    <label>Title <input name="title" value="{title}"></label>
    <label>Description <textarea name="description">{description}</textarea></label>
    <label>Details <textarea name="details">{details}</textarea></label>
    <button type="submit">Save</button>
</form>"##,
        id = escape_html(&id),
        title = escape_html(post.title.as_deref().unwrap_or_default()),
        description = escape_html(post.description.as_deref().unwrap_or_default()),
        details = escape_html(post.details.as_deref().unwrap_or_default()),
    )
}

/// New post form. Posted as `multipart/form-data` so a picture can ride along.
///
/// `values` refills the fields after a rejected submit.
pub fn render_create_form(values: &PostCreate, error: Option<&str>) -> String {
    let error = error
        .map(|e| format!(r#"<p class="form-error">{}</p>"#, escape_html(e)))
        .unwrap_or_default();
    format!(
        r#"<form id="create-form" class="create-post" method="post" action="/posts" enctype="multipart/form-data">
    {error}
    <label>Title <input name="title" value="{title}" required></label>
    <label>Description <textarea name="description" required>{description}</textarea></label>
    <label>Details <textarea name="details">{details}</textarea></label>
    <label>Picture <input type="file" name="file" accept="image/*"></label>
    <button type="submit">Publish</button>
</form>"#,
        title = escape_html(&values.title),
        description = escape_html(&values.description),
        details = escape_html(values.details.as_deref().unwrap_or_default()),
    )
}
