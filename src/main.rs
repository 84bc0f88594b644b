use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use repoagent::cache::ResponseCache;
use repoagent::config::Config;
use repoagent::git_cmd;
use repoagent::llm::{self, GeminiClient};
use repoagent::prompt;
use repoagent::selector;
use repoagent::session::{PromptOutcome, Session};
use repoagent::state::AgentState;

#[derive(Parser)]
#[command(
    name = "repoagent",
    version,
    about = "AI repository assistant",
    long_about = "Manage local clones, chat with Gemini, and analyze projects with budget-bounded file context."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage local repository clones
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },

    /// List and select Gemini models
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    /// Send a message to Gemini, optionally with a file as context
    Chat {
        /// Message or question
        message: String,

        /// Relative path of a file in the active repo to include as context
        #[arg(short, long)]
        file: Option<String>,

        /// Skip the cost confirmation for paid models
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Analyze a project or subdirectory with Gemini
    Analyze {
        /// Local repo to analyze (defaults to the active repo)
        #[arg(short, long)]
        repo: Option<String>,

        /// Relative subdirectory to focus the analysis on
        #[arg(short, long)]
        path: Option<String>,

        /// Skip the cost confirmation for paid models
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Clone a git repository into the managed directory
    Clone {
        /// Repository URL (HTTPS or SSH)
        url: String,

        /// Optional local directory name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List managed local repositories
    List,

    /// Set a local repository as active
    Select {
        /// Repository name to activate
        name: String,
    },

    /// Show the currently active repository
    Current,

    /// Clear the active repository selection
    Unselect,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// List available Gemini models with tier info
    List,

    /// Select the default Gemini model
    Select {
        /// API model name (e.g. 'models/gemini-1.5-flash-latest')
        name: String,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Delete all cached responses
    Clear,

    /// Remove expired entries, keeping valid ones
    Cleanup,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a default config file
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;
    let mut state = AgentState::load();

    if llm::api_key_from_env().is_none() {
        eprintln!(
            "{}",
            "warning: GEMINI_API_KEY is not set; AI commands will not work".yellow()
        );
    }

    match cli.command {
        None => show_status(&config, &state),

        Some(Commands::Repo { command }) => match command {
            RepoCommands::Clone { url, name } => {
                let repos_base = config.repos.base_path();
                let dir_name =
                    git_cmd::clone_repo(&url, name.as_deref(), &repos_base, cli.verbose)?;
                if state.active_repo.is_none() && state.set_active_repo(&dir_name, &repos_base)? {
                    println!(
                        "{}",
                        format!("Repository '{dir_name}' set as active automatically.").blue()
                    );
                }
            }
            RepoCommands::List => {
                let repos_base = config.repos.base_path();
                let repos = git_cmd::list_local_repos(&repos_base);
                if repos.is_empty() {
                    println!("No repositories found. Use `repo clone` to add one.");
                } else {
                    for repo in &repos {
                        if state.active_repo.as_deref() == Some(repo.as_str()) {
                            println!("{} {}", "●".green(), repo.green().bold());
                        } else {
                            println!("  {repo}");
                        }
                    }
                }
            }
            RepoCommands::Select { name } => {
                let repos_base = config.repos.base_path();
                if state.set_active_repo(&name, &repos_base)? {
                    println!("{}", format!("Active repository is now: {name}").green());
                } else {
                    bail!(
                        "could not activate '{}': {} does not exist",
                        name,
                        repos_base.join(&name).display()
                    );
                }
            }
            RepoCommands::Current => match &state.active_repo {
                Some(name) => {
                    println!("Active repository: {}", name.green().bold());
                    println!(
                        "  Path: {}",
                        config.repos.base_path().join(name).display().to_string().dimmed()
                    );
                }
                None => println!("No active repository selected."),
            },
            RepoCommands::Unselect => {
                state.clear_active_repo()?;
                println!("{}", "Active repository cleared.".yellow());
            }
        },

        Some(Commands::Model { command }) => match command {
            ModelCommands::List => {
                let client = GeminiClient::new(llm::api_key_from_env(), &config.llm.api_base)?;
                let tiers = llm::load_tier_table(&llm::default_tier_table_path());
                let models = client.available_models(&tiers)?;
                if models.is_empty() {
                    println!("{}", "No usable models returned by the API.".yellow());
                } else {
                    for model in &models {
                        let tier = model.tier.tier_label();
                        let tier_styled = if tier.starts_with("free") || tier.contains("gemma") {
                            tier.green()
                        } else if tier.contains("paid") {
                            tier.red().bold()
                        } else {
                            tier.dimmed()
                        };
                        let notes = model.tier.notes.as_deref().unwrap_or("");
                        println!("{:<52} {:<18} {}", model.name.cyan(), tier_styled, notes);
                    }
                }
                match &state.selected_model {
                    Some(model) => println!("\nSelected model: {}", model.green().bold()),
                    None => println!(
                        "\n{}",
                        "No default model selected; one will be chosen automatically.".yellow()
                    ),
                }
            }
            ModelCommands::Select { name } => {
                let client = GeminiClient::new(llm::api_key_from_env(), &config.llm.api_base)?;
                let tiers = llm::load_tier_table(&llm::default_tier_table_path());
                let models = client.available_models(&tiers)?;
                if !models.iter().any(|m| m.name == name) {
                    bail!("model '{}' not found in the available model list", name);
                }
                state.selected_model = Some(name.clone());
                state.save()?;
                println!(
                    "{}",
                    format!("Default model set to {name}. It will be used on the next query.")
                        .green()
                );
            }
        },

        Some(Commands::Chat { message, file, yes }) => {
            let final_prompt = match file {
                Some(rel_path) => {
                    let repo_path = state
                        .active_repo_path(&config.repos.base_path())
                        .context("no active repo; use `repo select` to use --file")?;
                    let full_path = repo_path.join(&rel_path);
                    if !full_path.is_file() {
                        bail!("file '{}' does not exist", full_path.display());
                    }
                    let content =
                        selector::read_text_lossy(&full_path, prompt::MAX_CHAT_FILE_CHARS + 1)
                            .with_context(|| format!("Failed to read {}", full_path.display()))?;
                    prompt::build_file_context_prompt(&rel_path, &content, &message)
                }
                None => message,
            };

            let session = Session::open(&config, &mut state, yes, cli.verbose)?;
            let outcome = session.send(&final_prompt)?;
            print_outcome("Gemini response", &outcome);
        }

        Some(Commands::Analyze { repo, path, yes }) => {
            let repos_base = config.repos.base_path();
            let (repo_root, repo_name) = match repo {
                Some(name) => {
                    let root = repos_base.join(&name);
                    if !root.is_dir() {
                        bail!("repo '{}' not found under {}", name, repos_base.display());
                    }
                    (root, name)
                }
                None => {
                    let root = state
                        .active_repo_path(&repos_base)
                        .context("no active repo; use `repo select` or --repo")?;
                    let name = state.active_repo.clone().unwrap_or_default();
                    (root, name)
                }
            };

            let (scan_root, focus) = match &path {
                Some(sub) => {
                    let scan = repo_root.join(sub);
                    if !scan.is_dir() {
                        bail!("subdirectory '{}' does not exist in '{}'", sub, repo_name);
                    }
                    (
                        scan,
                        format!("the subdirectory '{sub}' of project '{repo_name}'"),
                    )
                }
                None => (repo_root.clone(), format!("the project '{repo_name}'")),
            };

            println!("{}", format!("Analyzing {focus}...").blue().bold());
            let bundle =
                selector::select_files(&scan_root, &repo_root, &config.selection, cli.verbose)?;
            if bundle.is_empty() {
                bail!("no files survived selection; nothing to send for analysis");
            }
            println!(
                "Sending {} file(s) to Gemini for analysis...",
                bundle.len()
            );

            let final_prompt = prompt::build_analysis_prompt(&focus, &bundle);
            let session = Session::open(&config, &mut state, yes, cli.verbose)?;
            let outcome = session.send(&final_prompt)?;
            print_outcome(&format!("Analysis of {focus}"), &outcome);
        }

        Some(Commands::Cache { command }) => {
            let cache = ResponseCache::new(
                ResponseCache::default_store_path(),
                config.cache.expiration_seconds,
            );
            match command {
                CacheCommands::Clear => {
                    cache.clear();
                    println!("{}", "Response cache cleared.".green());
                }
                CacheCommands::Cleanup => {
                    cache.cleanup_expired();
                    println!(
                        "{}",
                        format!("Expired entries removed; {} live entries kept.", cache.live_entries())
                            .green()
                    );
                }
            }
        }

        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => repoagent::config::show_config()?,
            ConfigCommands::Init => {
                let path: PathBuf = Config::create_default()?;
                println!("Wrote default config to {}", path.display());
            }
        },
    }

    Ok(())
}

fn show_status(config: &Config, state: &AgentState) {
    println!("{}", "=== repoagent status ===".magenta().bold());
    match &state.active_repo {
        Some(repo) => {
            println!("Active repository: {}", repo.green().bold());
            println!(
                "Repos base path  : {}",
                config.repos.base_path().display().to_string().dimmed()
            );
        }
        None => {
            println!("Active repository: {}", "none selected".yellow());
            println!("  Use `repo select <name>` to pick one.");
        }
    }
    match &state.selected_model {
        Some(model) => {
            let tiers = llm::load_tier_table(&llm::default_tier_table_path());
            let tier = tiers
                .get(model)
                .map(|t| t.tier_label().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!(
                "Default model    : {} (tier: {})",
                model.green().bold(),
                tier.yellow()
            );
        }
        None => {
            println!(
                "Default model    : {}",
                "none selected (one will be chosen automatically)".yellow()
            );
            println!("  Use `model list` and `model select <name>` to choose.");
        }
    }
    println!("\nRun `repoagent --help` to see all commands.");
}

fn print_outcome(title: &str, outcome: &PromptOutcome) {
    match outcome {
        PromptOutcome::Declined(message) => println!("{}", message.yellow()),
        other => {
            println!("\n{}", format!("── {title} ──").cyan());
            println!("{}", other.text());
        }
    }
}
