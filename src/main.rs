use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use fnstore::models::{AppInfo, FnpackAppDetail};
use fnstore::validators::validate_app_info;
use fnstore::workflows::{self, IssueOutcome};
use fnstore::{CatalogUpdater, Config, FnpackTarget, WorkflowContext};

#[derive(Parser, Debug)]
#[command(name = "fnstore")]
#[command(version = "0.1.0")]
#[command(about = "Maintain the community app catalog and its CI workflows")]
struct Args {
    /// Catalog repository root (overrides CATALOG_ROOT)
    #[arg(long, global = true)]
    catalog_root: Option<PathBuf>,

    /// Concurrent repository fetches (overrides CONCURRENCY_LIMIT)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Output format for previews and listings
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manifest-style apps listed in apps.json
    #[command(subcommand)]
    Apps(AppsCommand),
    /// FnDepot repositories listed in fnpacks.json
    #[command(subcommand)]
    Fnpack(FnpackCommand),
    /// Process a submission issue (reads ISSUE_NUMBER, REPO_OWNER, REPO_NAME)
    #[command(subcommand)]
    Issue(IssueCommand),
    /// Validate catalog changes of a pull request (reads PR_NUMBER, REPO_OWNER, REPO_NAME)
    ValidatePr,
    /// Check a submission offline and report whether the id is already listed
    Validate {
        id: String,
        name: String,
        repo: String,
    },
}

#[derive(Subcommand, Debug)]
enum AppsCommand {
    Add { id: String, name: String, repo: String },
    Remove { id: String },
    List,
    Preview { repo: String },
    /// Refresh the details of one listed app
    Update { id: String },
    BatchUpdate,
}

#[derive(Subcommand, Debug)]
enum FnpackCommand {
    Add {
        repo: String,
        /// Only this app key from fnpack.json
        #[arg(long)]
        key: Option<String>,
    },
    /// Refresh a listed repository, by key or URL
    Update {
        target: String,
        #[arg(long)]
        key: Option<String>,
    },
    BatchUpdate,
    Preview {
        repo: String,
        #[arg(long)]
        key: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum IssueCommand {
    App,
    Fnpack,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("fnstore=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(root) = &args.catalog_root {
        config.catalog_root = root.clone();
    }
    if let Some(limit) = args.concurrency {
        anyhow::ensure!(limit > 0, "--concurrency must be at least 1");
        config.concurrency_limit = limit;
    }

    let updater = CatalogUpdater::from_config(&config)?.with_progress(!args.no_progress);

    match &args.command {
        Command::Apps(cmd) => run_apps(&updater, cmd, args.format).await,
        Command::Fnpack(cmd) => run_fnpack(&updater, cmd, args.format).await,
        Command::Issue(cmd) => run_issue(&updater, cmd).await,
        Command::ValidatePr => run_validate_pr(&updater).await,
        Command::Validate { id, name, repo } => run_validate(&updater, id, name, repo).await,
    }
}

async fn run_apps(
    updater: &CatalogUpdater,
    cmd: &AppsCommand,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        AppsCommand::Add { id, name, repo } => {
            if !updater.add_app(id, name, repo)? {
                anyhow::bail!("App {} is already listed", id);
            }
            println!("Added {} ({})", name, id);
        }
        AppsCommand::Remove { id } => {
            if !updater.remove_app(id)? {
                anyhow::bail!("App {} not found", id);
            }
            println!("Removed {}", id);
        }
        AppsCommand::List => {
            let apps = updater.list_apps();
            if format == OutputFormat::Json {
                print_json(&apps)?;
            } else if apps.is_empty() {
                println!("No apps listed");
            } else {
                for (i, app) in apps.iter().enumerate() {
                    println!("{}. {} ({}) - {}", i + 1, app.name, app.id, app.repository);
                }
            }
        }
        AppsCommand::Preview { repo } => {
            let info = updater.preview_app(repo).await?;
            match format {
                OutputFormat::Json => print_json(&info)?,
                OutputFormat::Text => print!("{}", format_app_info(&info)),
            }
        }
        AppsCommand::Update { id } => {
            let entry = updater
                .apps()
                .find_app(id)
                .ok_or_else(|| anyhow::anyhow!("App {} not found in apps.json", id))?;
            let detail = updater.update_app(&entry).await?;
            println!("Updated {} to version {}", detail.id, detail.info.version);
        }
        AppsCommand::BatchUpdate => {
            let report = updater.batch_update_apps().await?;
            for failure in &report.failed {
                eprintln!("  {}: {}", failure.id, failure.reason);
            }
            println!("{}", report);
        }
    }
    Ok(())
}

async fn run_fnpack(
    updater: &CatalogUpdater,
    cmd: &FnpackCommand,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        FnpackCommand::Add { repo, key } => match updater.add_fnpack(repo, key.as_deref()).await? {
            Some(apps) => println!("Added {} apps from {}", apps.len(), repo),
            None => anyhow::bail!("Fnpack repository {} is already listed", repo),
        },
        FnpackCommand::Update { target, key } => {
            let apps = updater
                .update_fnpack(&FnpackTarget::parse(target), key.as_deref())
                .await?;
            println!("Updated {} apps", apps.len());
        }
        FnpackCommand::BatchUpdate => {
            let report = updater.batch_update_fnpacks().await?;
            for failure in &report.failed {
                eprintln!("  {}: {}", failure.id, failure.reason);
            }
            println!("{}", report);
        }
        FnpackCommand::Preview { repo, key } => {
            let apps = updater.preview_fnpack(repo, key.as_deref()).await?;
            match format {
                OutputFormat::Json => print_json(&apps)?,
                OutputFormat::Text => {
                    for (i, app) in apps.iter().enumerate() {
                        println!("\n{}. {}", i + 1, app.name);
                        print!("{}", format_fnpack_app(app));
                    }
                }
            }
        }
    }
    Ok(())
}

async fn run_issue(updater: &CatalogUpdater, cmd: &IssueCommand) -> anyhow::Result<()> {
    let ctx = WorkflowContext::from_env("ISSUE_NUMBER")?;
    let github = updater.github();

    let outcome = match cmd {
        IssueCommand::App => workflows::process_app_issue(github, updater, &ctx).await?,
        IssueCommand::Fnpack => workflows::process_fnpack_issue(github, updater, &ctx).await?,
    };

    match outcome {
        IssueOutcome::AlreadyProcessed => println!("Issue #{} already processed", ctx.number),
        IssueOutcome::Accepted { id } => println!("Issue #{} accepted: {}", ctx.number, id),
        IssueOutcome::Rejected { .. } => println!("Issue #{} rejected", ctx.number),
    }
    Ok(())
}

async fn run_validate_pr(updater: &CatalogUpdater) -> anyhow::Result<()> {
    let ctx = WorkflowContext::from_env("PR_NUMBER")?;
    let report = workflows::validate_pr(updater.github(), updater, &ctx).await?;

    for id in &report.deleted {
        println!("Removed: {}", id);
    }
    for check in &report.checked {
        let status = if check.exists { "updates existing entry" } else { "new entry" };
        println!("{} ({}): {}", check.id, status, check.notes.join(", "));
    }
    for error in &report.errors {
        eprintln!("error: {}", error);
    }

    anyhow::ensure!(report.is_valid(), "PR #{} failed validation", ctx.number);
    println!("PR #{} passed validation", ctx.number);
    Ok(())
}

async fn run_validate(
    updater: &CatalogUpdater,
    id: &str,
    name: &str,
    repo: &str,
) -> anyhow::Result<()> {
    validate_app_info(id, name, repo)?;
    println!("Validation passed");

    match (std::env::var("REPO_OWNER"), std::env::var("REPO_NAME")) {
        (Ok(owner), Ok(catalog)) => {
            if workflows::check_app_id_exists(updater.github(), &owner, &catalog, id).await {
                println!("App id {} already exists", id);
            }
        }
        _ => tracing::debug!("REPO_OWNER/REPO_NAME unset, skipping existence check"),
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_app_info(info: &AppInfo) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}\n", "-".repeat(40)));
    output.push_str(&format!("description: {}\n", info.description));
    output.push_str(&format!("version: {}\n", info.version));
    output.push_str(&format!("iconUrl: {}\n", info.icon_url));
    output.push_str(&format!("downloadUrl: {}\n", info.download_url));
    output.push_str(&format!("screenshots: {}\n", info.screenshots.len()));
    output.push_str(&format!("author: {}\n", info.author));
    output.push_str(&format!("stars: {} / forks: {}\n", info.stars, info.forks));
    output.push_str(&format!("category: {}\n", info.category));
    output.push_str(&format!(
        "lastUpdate: {}\n",
        info.last_update.as_deref().unwrap_or("-")
    ));
    output.push_str(&format!("{}\n", "-".repeat(40)));
    output
}

fn format_fnpack_app(app: &FnpackAppDetail) -> String {
    let mut output = String::new();
    output.push_str(&format!("  id: {}\n", app.id));
    output.push_str(&format!("  version: {}\n", app.version));
    output.push_str(&format!("  description: {}\n", app.description));
    output.push_str(&format!("  category: {}\n", app.category));
    output.push_str(&format!("  author: {}\n", app.author));
    output.push_str(&format!("  iconUrl: {}\n", app.icon_url));
    output.push_str(&format!("  downloadUrl: {}\n", app.download_url));
    output.push_str(&format!("  screenshots: {}\n", app.screenshots.len()));
    output
}
