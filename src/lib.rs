//! AdopPet client
//!
//! Client-side companion for the AdopPet backend: browse the feed, manage
//! your own posts, and hold one direct-message conversation at a time.
//!
//! # Architecture
//!
//! - **API**: typed HTTP client for the backend (`reqwest`)
//! - **Chat**: session manager owning the single active conversation and its
//!   WebSocket stream
//! - **Render**: HTML fragments for the feed, profile and chat window
//! - **Server**: Axum preview server that serves those fragments to a browser,
//!   relays the chat socket and accepts new posts
//!
//! # Modules
//!
//! - [`api`]: backend endpoints and wire types
//! - [`chat`]: conversation lifecycle, transport seam, surfaces
//! - [`config`]: layered configuration
//! - [`render`]: HTML fragment rendering
//! - [`server`]: preview server
//! - [`terminal`]: line-oriented chat surface for the CLI

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod render;
pub mod server;
pub mod terminal;

pub use error::{Error, Result};
