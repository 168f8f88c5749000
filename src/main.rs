//! `family-tree` command-line front end.
//!
//! Usage:
//!   family-tree list [--search <TERM>] [--min-generation <N>]
//!   family-tree generations
//!   family-tree export --format csv|json [--out <PATH>]
//!   family-tree push <CSV_FILE>
//!   family-tree config show | set-url <URL> | set-mirror <URL>

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use family_tree_lib::config::{config_path, load_config, load_config_from, save_config, Config};
use family_tree_lib::export::{export, export_file_name, ExportFormat};
use family_tree_lib::session::{Session, SyncAttempt};
use family_tree_lib::{parse_genealogy_csv, FamilyGraph, Member, SyncError, SyncFailure};

#[derive(Parser, Debug)]
#[command(name = "family-tree")]
#[command(about = "Browse, export, and sync the family records spreadsheet")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List members, optionally filtered.
    List {
        /// Free-text filter (case and whitespace insensitive).
        #[arg(long, short)]
        search: Option<String>,

        /// Hide members below this generation.
        #[arg(long, default_value_t = 0)]
        min_generation: u32,
    },

    /// Show the generations present in the dataset.
    Generations,

    /// Write a backup of the current dataset.
    Export {
        #[arg(long, short, default_value = "csv")]
        format: ExportFormat,

        /// Output path. Defaults to family_tree_backup_<date>.<ext>.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Replace the remote records with a local CSV file.
    Push {
        file: PathBuf,
    },

    /// Inspect or change the stored configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    /// Set the Apps Script endpoint used for reads and writes.
    SetUrl { url: String },
    /// Set the published CSV mirror used when the endpoint is unavailable.
    SetMirror { url: String },
}

fn print_member(graph: &FamilyGraph, m: &Member) {
    let generation = m
        .generation
        .map(|g| format!("G{}", g))
        .unwrap_or_else(|| "-".to_string());
    let (father, mother) = graph.parent_names(m);
    let mut line = format!("{:<4} {:<8} {}", generation, m.gender.as_str(), m.name);
    if let Some(courtesy) = &m.courtesy_name {
        line.push_str(&format!(" ({})", courtesy));
    }
    if !father.is_empty() {
        line.push_str(&format!("  father: {}", father));
    }
    if !mother.is_empty() {
        line.push_str(&format!("  mother: {}", mother));
    }
    if let Some(spouse) = &m.spouse_name {
        line.push_str(&format!("  spouse: {}", spouse));
    }
    println!("{}", line);
}

fn report_failure(err: &SyncError) {
    let failure = SyncFailure::from(err);
    eprintln!("Sync failed: {}", failure.message);
    eprintln!("  {}", failure.recovery_suggestion);
}

/// Config as stored on disk, without environment overrides.
fn stored_config() -> anyhow::Result<Config> {
    let path = config_path().map_err(anyhow::Error::msg)?;
    load_config_from(&path).map_err(anyhow::Error::msg)
}

async fn open_session(config: &Config) -> anyhow::Result<Session> {
    let session = Session::open(config)
        .await
        .context("Failed to set up remote sources")?;
    let summary = session.summary();
    if summary.fallback {
        let label = if summary.source.is_remote() {
            "read-only CSV mirror"
        } else {
            "bundled dataset"
        };
        log::warn!("Using {}: {}", label, summary.fallback_reasons.join("; "));
    }
    Ok(session)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    match args.command {
        Command::List {
            search,
            min_generation,
        } => {
            let session = open_session(&config).await?;
            let graph = session.graph();
            let hits = graph.search(search.as_deref().unwrap_or(""), min_generation);
            let mut shown = 0;
            for m in hits.into_iter().filter(|m| !m.is_root()) {
                print_member(graph, m);
                shown += 1;
            }
            println!("{} of {} members", shown, graph.member_count());
        }

        Command::Generations => {
            let session = open_session(&config).await?;
            let generations = session.graph().available_generations();
            if generations.is_empty() {
                println!("No generations recorded");
            }
            for g in generations {
                let count = session
                    .graph()
                    .display_members()
                    .filter(|m| m.generation == Some(g))
                    .count();
                println!("G{:<4} {} members", g, count);
            }
        }

        Command::Export { format, out } => {
            let session = open_session(&config).await?;
            let body = export(session.graph(), format)?;
            let path = out.unwrap_or_else(|| {
                PathBuf::from(export_file_name(format, chrono::Local::now().date_naive()))
            });
            std::fs::write(&path, body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Exported {} members to {}",
                session.graph().member_count(),
                path.display()
            );
        }

        Command::Push { file } => {
            if config.script_url.is_none() {
                bail!("No script URL configured. Run `family-tree config set-url <url>` first");
            }
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let members = parse_genealogy_csv(&text)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            let graph = FamilyGraph::from_members(members);

            let mut session = open_session(&config).await?;
            match session.import(graph).await {
                SyncAttempt::Synced { count } => {
                    println!(
                        "Pushed {} members (version {})",
                        count,
                        session.version().unwrap_or("-")
                    );
                }
                SyncAttempt::Failed(err) => {
                    report_failure(&err);
                    std::process::exit(1);
                }
                SyncAttempt::Skipped => bail!("No remote store configured"),
            }
        }

        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("# {}", config_path().map_err(anyhow::Error::msg)?.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::SetUrl { url } => {
                url::Url::parse(&url).with_context(|| format!("Invalid URL: {url}"))?;
                let mut stored = stored_config()?;
                stored.script_url = Some(url);
                save_config(&stored).map_err(anyhow::Error::msg)?;
                println!("Script URL saved");
            }
            ConfigAction::SetMirror { url } => {
                url::Url::parse(&url).with_context(|| format!("Invalid URL: {url}"))?;
                let mut stored = stored_config()?;
                stored.csv_mirror_url = Some(url);
                save_config(&stored).map_err(anyhow::Error::msg)?;
                println!("CSV mirror URL saved");
            }
        },
    }

    Ok(())
}
