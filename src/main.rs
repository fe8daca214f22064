//! AdopPet command-line client.
//!
//! Entry point for the terminal front end and the preview server.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_fields_in_debug)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use adoppet_client::api::{Client, PostCreate, PostImage, PostUpdate};
use adoppet_client::chat::{ChatSessionManager, Participant, WsConnector};
use adoppet_client::config::{AppConfig, ConfigArgs};
use adoppet_client::render::{render_feed, render_profile_posts};
use adoppet_client::server::start_server;
use adoppet_client::terminal::TerminalSurface;

/// AdopPet CLI
#[derive(Parser, Debug)]
#[command(name = "adoppet", version)]
#[command(about = "Browse the AdopPet feed, manage your posts and chat", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the signed-in user
    Me,
    /// List the public feed
    Feed {
        /// Print the rendered HTML fragment instead of text
        #[arg(long)]
        html: bool,
    },
    /// List your own posts
    Posts {
        /// Print the rendered HTML fragment instead of text
        #[arg(long)]
        html: bool,
    },
    /// Publish a new post
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        #[arg(long)]
        details: Option<String>,

        /// Picture to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete one of your posts
    Delete {
        /// Post id
        id: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Edit one of your posts; omitted fields keep their current value
    Update {
        /// Post id
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        details: Option<String>,
    },
    /// Chat with another user
    Chat {
        /// The other user's id
        peer_id: String,

        /// Display name shown in the header
        #[arg(long)]
        name: Option<String>,

        /// Avatar URL
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Start the preview server
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long, short)]
        port: Option<u16>,

        /// Directory served under /static
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env (if present)
    let _ = dotenv();

    // Initialize tracing (M-LOG-STRUCTURED)
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        name: "config.loaded",
        backend = %config.backend.base_url,
        authenticated = config.access_token().is_some(),
        "Configuration loaded"
    );

    match run(cli.command, config.clone()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let unauthorized = e
                .downcast_ref::<adoppet_client::Error>()
                .is_some_and(adoppet_client::Error::is_unauthorized);
            if unauthorized {
                eprintln!(
                    "Not signed in. Log in at {} and pass the access_token cookie with --token.",
                    login_url(&config)
                );
                return ExitCode::from(2);
            }
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Absolute login URL, resolved against the backend when relative.
fn login_url(config: &AppConfig) -> String {
    Url::parse(&config.backend.base_url)
        .and_then(|base| base.join(&config.auth.login_url))
        .map_or_else(|_| config.auth.login_url.clone(), String::from)
}

async fn run(command: Commands, config: AppConfig) -> anyhow::Result<()> {
    let default_avatar = config.ui.default_avatar.as_str();
    let connect = || Client::from_config(&config);

    match command {
        Commands::Serve {
            host,
            port,
            static_dir,
        } => {
            let mut config = config.clone();
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(dir) = static_dir {
                config.server.static_dir = dir;
            }
            start_server(Arc::new(config)).await?;
        }
        Commands::Me => {
            let client = connect()?;
            let me = client.users().me().await?;
            let viewer = Participant::from_profile(me, default_avatar);
            println!("{} ({})", viewer.name, viewer.id);
            println!("avatar: {}", viewer.avatar);
        }
        Commands::Feed { html } => {
            let client = connect()?;
            let viewer = Participant::from_profile(client.users().me().await?, default_avatar);
            let posts = client.posts().feed().await?;
            if html {
                println!("{}", render_feed(&posts, Some(&viewer), default_avatar));
            } else {
                for post in &posts {
                    let name = post.user_name.as_deref().unwrap_or("User");
                    let mine = if post.user_id == viewer.id { " (you)" } else { "" };
                    println!("[{}] {name}{mine}: {}", post.user_id, post.title);
                    if !post.description.is_empty() {
                        println!("    {}", post.description);
                    }
                }
            }
        }
        Commands::Posts { html } => {
            let client = connect()?;
            let posts = client.posts().mine().await?;
            if html {
                println!("{}", render_profile_posts(&posts, default_avatar));
            } else if posts.is_empty() {
                println!("You have no posts yet.");
            } else {
                for post in &posts {
                    println!(
                        "{}\t{}\t{}",
                        post.id,
                        post.title.as_deref().unwrap_or("Untitled"),
                        post.description.as_deref().unwrap_or_default()
                    );
                }
            }
        }
        Commands::Create {
            title,
            description,
            details,
            image,
        } => {
            let post = PostCreate {
                title,
                description,
                details: details.filter(|d| !d.trim().is_empty()),
            };
            if let Some(field) = post.missing_field() {
                bail!("The {field} cannot be empty");
            }
            let image = match image {
                Some(path) => Some(read_image(&path).await?),
                None => None,
            };
            connect()?.posts().create(&post, image).await?;
            println!("Published {}.", post.title);
        }
        Commands::Delete { id, yes } => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            if !yes && !confirm(&mut lines, &format!("Delete post {id}? [y/N] ")).await? {
                println!("Cancelled.");
                return Ok(());
            }
            connect()?.posts().delete(&id).await?;
            println!("Deleted post {id}.");
        }
        Commands::Update {
            id,
            title,
            description,
            details,
        } => {
            let client = connect()?;
            let posts = client.posts().mine().await?;
            let post = posts
                .iter()
                .find(|p| p.id == id)
                .with_context(|| format!("You have no post with id {id}"))?;
            let update = PostUpdate::from_post(post).merge(title, description, details);
            client.posts().update(&id, &update).await?;
            println!("Updated post {id}.");
        }
        Commands::Chat {
            peer_id,
            name,
            avatar,
        } => {
            let client = connect()?;
            let viewer = Participant::from_profile(client.users().me().await?, default_avatar);
            let peer = Participant::new(
                peer_id,
                name.unwrap_or_else(|| "User".to_string()),
                avatar.unwrap_or_else(|| default_avatar.to_string()),
            );
            chat(client, viewer, peer).await?;
        }
    }
    Ok(())
}

/// Load a picture for upload; the content type is guessed from the extension.
async fn read_image(path: &Path) -> anyhow::Result<PostImage> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Could not read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} is not a file", path.display()))?;
    Ok(PostImage {
        file_name,
        content_type: None,
        bytes,
    })
}

async fn confirm(lines: &mut Lines<BufReader<Stdin>>, prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────────────────────────────────────

/// One line of chat input.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Message(&'a str),
    Open { id: &'a str, name: Option<&'a str> },
    Close,
    Quit,
}

fn parse_chat_input(line: &str) -> ChatInput<'_> {
    let trimmed = line.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some(("/open", rest)) => {
            let rest = rest.trim();
            match rest.split_once(char::is_whitespace) {
                Some((id, name)) => ChatInput::Open {
                    id,
                    name: Some(name.trim()),
                },
                None => ChatInput::Open { id: rest, name: None },
            }
        }
        _ => match trimmed {
            "/close" => ChatInput::Close,
            "/quit" | "/exit" => ChatInput::Quit,
            _ => ChatInput::Message(line),
        },
    }
}

async fn chat(client: Client, viewer: Participant, peer: Participant) -> anyhow::Result<()> {
    if peer.id == viewer.id {
        bail!("You cannot start a conversation with yourself");
    }
    let default_avatar = peer.avatar.clone();

    let mut manager = ChatSessionManager::new(
        viewer,
        WsConnector::new(client.clone()),
        Arc::new(client),
        TerminalSurface::new(std::io::stdout()),
    );
    manager.open(peer);
    println!("Type a message and press enter. /open <id> [name], /close, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_chat_input(&line) {
                    ChatInput::Quit => break,
                    ChatInput::Close => manager.close(),
                    ChatInput::Open { id, name } => {
                        if id.is_empty() || id == manager.viewer().id {
                            warn!(peer_id = %id, "Ignoring /open for this id");
                            continue;
                        }
                        manager.open(Participant::new(
                            id,
                            name.unwrap_or("User"),
                            default_avatar.as_str(),
                        ));
                    }
                    ChatInput::Message(text) => {
                        if !text.trim().is_empty() && !manager.send(text) {
                            println!("(not sent: no open conversation or not connected yet)");
                        }
                    }
                }
            }
            Some(event) = manager.next_event() => {
                manager.handle_event(event);
            }
        }
    }

    manager.close();
    Ok(())
}
