//! Request and response types for the backend REST API.

use serde::{Deserialize, Serialize};

/// The authenticated viewer, as returned by `GET /users/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    /// Opaque user id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Avatar URL, if the user uploaded one.
    #[serde(default)]
    pub profile_image: Option<String>,
}

/// A post in the public feed (`GET /posts/feed/all`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedPost {
    /// Author id.
    pub user_id: String,
    /// Author display name.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Author avatar URL.
    #[serde(default)]
    pub user_profile_image: Option<String>,
    /// Attached picture.
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// One of the viewer's own posts (`GET /posts/user/me`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnPost {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Form body for `PUT /posts/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PostUpdate {
    pub title: String,
    pub description: String,
    pub details: String,
}

impl PostUpdate {
    /// Start from the current values of a post.
    pub fn from_post(post: &OwnPost) -> Self {
        Self {
            title: post.title.clone().unwrap_or_default(),
            description: post.description.clone().unwrap_or_default(),
            details: post.details.clone().unwrap_or_default(),
        }
    }

    /// Replace the fields that are `Some`.
    #[must_use]
    pub fn merge(
        mut self,
        title: Option<String>,
        description: Option<String>,
        details: Option<String>,
    ) -> Self {
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(details) = details {
            self.details = details;
        }
        self
    }
}

/// Text fields of `POST /posts/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostCreate {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl PostCreate {
    /// First missing required field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.title.trim().is_empty() {
            Some("title")
        } else if self.description.trim().is_empty() {
            Some("description")
        } else {
            None
        }
    }
}

/// Picture attached to a new post.
#[derive(Clone, PartialEq, Eq)]
pub struct PostImage {
    pub file_name: String,
    /// MIME type; guessed from `file_name` when `None`.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PostImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostImage")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl PostImage {
    /// Declared content type, else a guess from the file extension.
    pub fn mime(&self) -> String {
        self.content_type
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(&self.file_name)
                    .first_or_octet_stream()
                    .to_string()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_post_optional_fields() {
        let json = r#"{"user_id":"7","title":"Luna","description":"Calm cat"}"#;
        let post: FeedPost = serde_json::from_str(json).unwrap();
        assert_eq!(post.user_id, "7");
        assert!(post.user_name.is_none());
        assert!(post.image_url.is_none());
    }

    #[test]
    fn test_post_update_merge_keeps_unset_fields() {
        let post = OwnPost {
            id: "p1".into(),
            title: Some("Rex".into()),
            description: Some("Good dog".into()),
            details: None,
            image_url: None,
        };

        let update = PostUpdate::from_post(&post).merge(None, None, Some("Vaccinated".into()));

        assert_eq!(update.title, "Rex");
        assert_eq!(update.description, "Good dog");
        assert_eq!(update.details, "Vaccinated");
    }

    #[test]
    fn test_post_create_required_fields() {
        let mut post = PostCreate {
            title: " ".into(),
            description: "Calm".into(),
            details: None,
        };
        assert_eq!(post.missing_field(), Some("title"));
        post.title = "Luna".into();
        assert_eq!(post.missing_field(), None);
        post.description.clear();
        assert_eq!(post.missing_field(), Some("description"));
    }

    #[test]
    fn test_image_mime_guess() {
        let image = PostImage {
            file_name: "luna.png".into(),
            content_type: None,
            bytes: vec![1, 2, 3],
        };
        assert_eq!(image.mime(), "image/png");
        assert!(format!("{image:?}").contains("len: 3"));

        let declared = PostImage {
            content_type: Some("image/webp".into()),
            ..image
        };
        assert_eq!(declared.mime(), "image/webp");
    }
}
