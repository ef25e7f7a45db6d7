use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use stashreview::models::{DiffReport, LineType, PullRequest, PullRequestRef};
use stashreview::{ClientConfig, Config, StashClient};

#[derive(Parser, Debug)]
#[command(name = "stashreview")]
#[command(version = "0.1.0")]
#[command(about = "Read and annotate Stash pull requests")]
struct Cli {
    /// Request timeout in milliseconds (overrides STASH_TIMEOUT_MS)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Accept any TLS certificate (overrides STASH_ACCEPT_ANY_SSL)
    #[arg(long)]
    accept_any_ssl: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct PullRequestArgs {
    /// Project key
    #[arg(short, long)]
    project: String,

    /// Repository slug
    #[arg(short, long)]
    repository: String,

    /// Pull request id
    #[arg(long = "pr")]
    pull_request: String,
}

impl PullRequestArgs {
    fn reference(&self) -> PullRequestRef {
        PullRequestRef::new(&self.project, &self.repository, &self.pull_request)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a user
    User { slug: String },

    /// Show the pull request and its diffs
    Review {
        #[command(flatten)]
        pr: PullRequestArgs,
    },

    /// List the comments on a file of the pull request
    Comments {
        #[command(flatten)]
        pr: PullRequestArgs,

        #[arg(long)]
        path: String,
    },

    /// Post a comment on the pull request
    Comment {
        #[command(flatten)]
        pr: PullRequestArgs,

        message: String,

        /// Anchor the comment on this file
        #[arg(long, requires = "line")]
        path: Option<String>,

        #[arg(long, requires = "path")]
        line: Option<i64>,

        /// CONTEXT or ADDED
        #[arg(long, default_value = "ADDED")]
        line_type: LineType,
    },

    /// Delete one of the comments on a file
    DeleteComment {
        #[command(flatten)]
        pr: PullRequestArgs,

        #[arg(long)]
        path: String,

        id: i64,
    },

    /// Approve the pull request
    Approve {
        #[command(flatten)]
        pr: PullRequestArgs,
    },

    /// Withdraw the approval
    ResetApproval {
        #[command(flatten)]
        pr: PullRequestArgs,
    },

    /// Add a user to the reviewers
    AddReviewer {
        #[command(flatten)]
        pr: PullRequestArgs,

        slug: String,
    },
}

#[derive(Serialize)]
struct Review {
    pull_request: PullRequest,
    diffs: DiffReport,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("stashreview=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Cli::parse();

    // Load configuration, CLI flags win over the environment
    let config = Config::from_env()?;
    let mut client_config = ClientConfig::from(&config);
    if let Some(timeout_ms) = args.timeout_ms {
        client_config.timeout = std::time::Duration::from_millis(timeout_ms);
    }
    if args.accept_any_ssl {
        client_config.verify_tls = false;
    }

    // Initialize client
    let client = StashClient::new(client_config)?;
    tracing::debug!("Using Stash at {}", client.base_url());

    match args.command {
        Command::User { slug } => {
            let user = client.get_user(&slug).await?;
            print_json(&user)?;
        }
        Command::Review { pr } => {
            let reference = pr.reference();
            let (pull_request, diffs) = futures::future::try_join(
                client.get_pull_request(&reference),
                client.get_pull_request_diffs(&reference),
            )
            .await?;
            tracing::info!(
                "{} has {} reviewers and {} diff lines",
                reference,
                pull_request.reviewers().len(),
                diffs.len()
            );
            print_json(&Review {
                pull_request,
                diffs,
            })?;
        }
        Command::Comments { pr, path } => {
            let comments = client.get_pull_request_comments(&pr.reference(), &path).await?;
            print_json(&comments)?;
        }
        Command::Comment {
            pr,
            message,
            path,
            line,
            line_type,
        } => {
            let reference = pr.reference();
            match (path, line) {
                (Some(path), Some(line)) => {
                    client
                        .post_comment_line_on_pull_request(&reference, &message, &path, line, line_type)
                        .await?
                }
                _ => client.post_comment_on_pull_request(&reference, &message).await?,
            }
            tracing::info!("Comment posted on {}", reference);
        }
        Command::DeleteComment { pr, path, id } => {
            let reference = pr.reference();
            let comments = client.get_pull_request_comments(&reference, &path).await?;
            let comment = comments
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| anyhow::anyhow!("No comment {} on {} in {}", id, path, reference))?;
            client.delete_pull_request_comment(&reference, comment).await?;
            tracing::info!("Comment {} deleted from {}", id, reference);
        }
        Command::Approve { pr } => {
            client.approve_pull_request(&pr.reference()).await?;
        }
        Command::ResetApproval { pr } => {
            client.reset_pull_request_approval(&pr.reference()).await?;
        }
        Command::AddReviewer { pr, slug } => {
            let reference = pr.reference();
            let (user, mut pull_request) = futures::future::try_join(
                client.get_user(&slug),
                client.get_pull_request(&reference),
            )
            .await?;

            if !pull_request.add_reviewer(user) {
                tracing::info!("{} already reviews {}", slug, reference);
                return Ok(());
            }
            // the reviewer list is replaced as a whole
            client
                .add_pull_request_reviewer(&reference, pull_request.version, pull_request.reviewers())
                .await?;
            tracing::info!("{} added as reviewer of {}", slug, reference);
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
