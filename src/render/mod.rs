//! HTML fragments for the feed, profile and chat views.
//!
//! Fragments are plain strings meant to be swapped into the page by HTMX.
//! Every value that comes from the backend goes through [`escape_html`].

mod chat;
mod feed;
mod profile;

pub use chat::{HtmlChatPane, render_bubble};
pub use feed::render_feed;
pub use profile::{render_create_form, render_edit_form, render_profile_header, render_profile_posts};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// htmx build used when `ui.htmx_src` is not configured.
pub const DEFAULT_HTMX_SRC: &str = "https://unpkg.com/htmx.org@2.0.8/dist/htmx.min.js";

/// Characters that cannot appear raw in one path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode an id for use as a single URL path segment.
pub(crate) fn encode_segment(id: &str) -> String {
    utf8_percent_encode(id, PATH_SEGMENT).to_string()
}

/// Escape HTML special characters (text and attribute values).
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Generate the HTML shell for a page.
///
/// `htmx_src` is the htmx script URL; the stylesheet and chat script are
/// served from `/static`.
pub fn html_shell(title: &str, htmx_src: &str, content: &str) -> String {
    let title = escape_html(title);
    let htmx_src = escape_html(htmx_src);
    format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} - AdopPet</title>
    <script src="{htmx_src}"></script>
    <script src="/static/chat.js" defer></script>
    <link rel="stylesheet" href="/static/app.css">
</head>
<body>
    <header class="app-header">
        <a href="/" class="brand">AdopPet</a>
        <nav hx-boost="true">
            <a href="/">Feed</a>
            <a href="/posts/create">New post</a>
            <a href="/profile">Profile</a>
        </nav>
    </header>
    <main id="app">
        {content}
    </main>
</body>
</html>"#)
}
