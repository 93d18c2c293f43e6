//! Command-line front end for the forum client.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use forum_client::api::types::{PageQuery, TargetType, VoteType};
use forum_client::api::{ApiClient, ApiResponse};
use forum_client::config::validation::validate_config;
use forum_client::config::{load_config, ClientConfig, ConfigError};
use forum_client::notifications::{
    DesktopAlert, DesktopNotifier, NotificationCenter, ReconnectPolicy, WebSocketChannel,
};
use forum_client::observability::{logging, metrics};
use forum_client::votes::{VoteController, VoteCounts, VoteOutcome};

#[derive(Parser)]
#[command(name = "forum-client")]
#[command(about = "Resilient client for the forum API", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `api.base_url`
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PageArgs {
    #[arg(long)]
    page: Option<u32>,

    #[arg(long)]
    page_size: Option<u32>,

    #[arg(long)]
    cursor: Option<String>,
}

impl From<PageArgs> for PageQuery {
    fn from(args: PageArgs) -> Self {
        PageQuery {
            page: args.page,
            page_size: args.page_size,
            cursor: args.cursor,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List posts
    Posts {
        #[command(flatten)]
        paging: PageArgs,
    },
    /// List comments on a post
    Comments {
        post_id: String,
        #[command(flatten)]
        paging: PageArgs,
    },
    /// Search posts and comments
    Search {
        query: String,
        #[command(flatten)]
        paging: PageArgs,
    },
    /// Vote on a post or comment (repeat a vote to remove it)
    Vote {
        target_id: String,
        /// up or down
        vote: VoteType,
        #[arg(long, default_value = "post")]
        target: TargetType,
        /// Current upvotes, for the displayed score
        #[arg(long, default_value_t = 0)]
        upvotes: i64,
        /// Current downvotes, for the displayed score
        #[arg(long, default_value_t = 0)]
        downvotes: i64,
    },
    /// Stream live notifications until Ctrl-C
    Watch {
        /// Override `live_channel.url`
        #[arg(long)]
        url: Option<String>,
    },
}

/// Prints alerts to stdout.
struct TerminalNotifier;

impl DesktopNotifier for TerminalNotifier {
    fn notify(&self, alert: &DesktopAlert) {
        let marker = if alert.require_interaction { "!" } else { "*" };
        println!("{} {}: {}", marker, alert.title, alert.body);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    logging::init(&config.observability);
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let client = ApiClient::new(&config)?;

    match cli.command {
        Commands::Posts { paging } => {
            let res = client.list_posts(&paging.into()).await?;
            print_response(&res)?;
        }
        Commands::Comments { post_id, paging } => {
            let res = client.list_comments(&post_id, &paging.into()).await?;
            print_response(&res)?;
        }
        Commands::Search { query, paging } => {
            let res = client.search(&query, &paging.into()).await?;
            print_response(&res)?;
        }
        Commands::Vote {
            target_id,
            vote,
            target,
            upvotes,
            downvotes,
        } => {
            let controller = VoteController::new(
                target_id,
                target,
                VoteCounts::new(upvotes, downvotes),
                Arc::new(client),
            )
            .with_config(&config.votes);

            let outcome = controller.submit_vote(vote).await;
            let state = controller.state();
            match outcome {
                VoteOutcome::Confirmed(v) => {
                    let shown = v.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string());
                    println!("Vote recorded: {} (score {})", shown, state.score());
                }
                VoteOutcome::RolledBack | VoteOutcome::Discarded => {
                    eprintln!("Vote failed; score stays at {}", state.score());
                    std::process::exit(1);
                }
            }
        }
        Commands::Watch { url } => {
            let url = url
                .or_else(|| config.live_channel.url.clone())
                .ok_or("no live channel URL; pass --url or set live_channel.url")?;

            let center = NotificationCenter::with_parts(
                &config.notifications,
                Arc::new(forum_client::notifications::SystemClock),
                Arc::new(TerminalNotifier),
            );
            center.attach_channel(
                WebSocketChannel::new(url.as_str()),
                ReconnectPolicy::from(&config.live_channel),
            );
            tracing::info!(url = %url, "Watching notifications, Ctrl-C to stop");

            tokio::signal::ctrl_c().await?;
            center.teardown().await;
            println!("{} notifications, {} unread", center.len(), center.unread_count());
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<ClientConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
        validate_config(&config).map_err(ConfigError::Validation)?;
    }
    Ok(config)
}

fn print_response<T: Serialize>(res: &ApiResponse<T>) -> Result<(), Box<dyn std::error::Error>> {
    if res.is_fallback() {
        eprintln!("Warning: API unavailable, showing cached data");
    }
    println!("{}", serde_json::to_string_pretty(&res.data)?);
    Ok(())
}
