//! Command-line interface for styleforge.
//!
//! The CLI is a thin shell over [`AppContext`]: it assembles inputs, drives
//! the pipeline, and prints progress. All orchestration logic lives in the
//! library. The CLI owns its tokio runtime; library consumers bring their
//! own.

use anyhow::{Context as _, Result, anyhow, bail};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::context::{AppContext, THEME_KEY};
use crate::gateway::{DEFAULT_BASE_URL, DEFAULT_MODEL, LocalHttpGateway};
use crate::history::EditSource;
use crate::logging;
use crate::orchestrator::PipelineEvent;
use crate::persist::JsonFileStore;
use crate::types::ThemeMode;

/// styleforge - restyle document sets through a local generation backend
#[derive(Parser)]
#[command(name = "styleforge")]
#[command(about = "Rewrite a set of documents into a shared style")]
#[command(long_about = r#"
styleforge takes up to four text documents plus a natural-language style
request and produces a shared stylesheet plus one rewritten document per
input, driving a local Ollama-compatible generation server.

EXAMPLES:
  # Restyle two documents with a freeform request
  styleforge run notes.txt draft.txt --prompt "austere, academic, navy accents"

  # Restyle using a catalog template
  styleforge run notes.txt --template tpl-editorial --out restyled/

  # Inspect past runs
  styleforge history list --json

  # Manage the template catalog
  styleforge templates save "House style" "match our brand voice"
  styleforge templates search editorial

  # List models offered by the local backend
  styleforge models
"#)]
#[command(version)]
pub struct Cli {
    /// Directory for persisted state (default: platform data dir)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Base URL of the generation backend
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Model to use for generation calls
    #[arg(long, global = true, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Enable debug-level logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the restyle pipeline over a set of documents
    Run {
        /// Input documents (at most four are admitted)
        files: Vec<PathBuf>,

        /// Freeform style request
        #[arg(long, conflicts_with = "template")]
        prompt: Option<String>,

        /// Id of a catalog template to use as the style request
        #[arg(long)]
        template: Option<String>,

        /// Destination directory for generated artifacts
        #[arg(long, default_value = "restyled")]
        out: PathBuf,
    },

    /// Inspect or prune the persisted run history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// Manage the style template catalog
    Templates {
        #[command(subcommand)]
        command: TemplateCommands,
    },

    /// List models offered by the local backend
    Models,

    /// Get or set the persisted theme preference
    Theme {
        #[command(subcommand)]
        command: ThemeCommands,
    },
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// Print retained runs, newest first
    List {
        /// Emit the full records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete one run record
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// Print the catalog
    List,
    /// Create a user-authored template
    Save { name: String, prompt: String },
    /// Toggle the like flag on a template
    Like { id: String },
    /// Rename a user-authored template
    Rename { id: String, name: String },
    /// Delete a user-authored template
    Delete { id: String },
    /// Case-insensitive search over names and prompts
    Search { query: String },
}

#[derive(Subcommand)]
pub enum ThemeCommands {
    Get,
    Set { mode: String },
}

/// CLI entry point: parses arguments, sets up logging, and runs the
/// selected command on a fresh runtime.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose).map_err(|e| anyhow!("failed to init logging: {e}"))?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(execute(cli))
}

fn state_dir(cli: &Cli) -> Result<Utf8PathBuf> {
    let dir = match &cli.state_dir {
        Some(dir) => dir.clone(),
        None => dirs::data_dir()
            .ok_or_else(|| anyhow!("no platform data directory; pass --state-dir"))?
            .join("styleforge"),
    };
    Utf8PathBuf::from_path_buf(dir).map_err(|dir| anyhow!("state dir is not UTF-8: {dir:?}"))
}

fn build_context(cli: &Cli) -> Result<AppContext> {
    let store = Arc::new(JsonFileStore::new(state_dir(cli)?));
    let gateway = Arc::new(
        LocalHttpGateway::new(Some(cli.base_url.clone()))
            .context("failed to construct generation gateway")?,
    );
    Ok(AppContext::new(store, gateway, cli.model.clone()))
}

async fn execute(cli: Cli) -> Result<()> {
    let mut ctx = build_context(&cli)?;

    match cli.command {
        Commands::Run {
            ref files,
            ref prompt,
            ref template,
            ref out,
        } => run_pipeline(&mut ctx, files, prompt.as_deref(), template.as_deref(), out).await,
        Commands::History { command } => history_command(&mut ctx, command),
        Commands::Templates { command } => template_command(&mut ctx, command),
        Commands::Models => {
            let models = ctx.list_models().await;
            if models.is_empty() {
                println!("no local models reported");
            }
            for model in models {
                match model.parameter_size {
                    Some(size) => println!("{} ({size})", model.name),
                    None => println!("{}", model.name),
                }
            }
            Ok(())
        }
        Commands::Theme { command } => theme_command(&mut ctx, command),
    }
}

async fn run_pipeline(
    ctx: &mut AppContext,
    files: &[PathBuf],
    prompt: Option<&str>,
    template: Option<&str>,
    out: &std::path::Path,
) -> Result<()> {
    for path in files {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input: {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("input path has no UTF-8 file name: {}", path.display()))?;
        ctx.add_file(name, content, EditSource::UserEdit);
    }

    match (prompt, template) {
        (Some(prompt), _) => {
            ctx.set_prompt(prompt, EditSource::UserEdit, std::time::Instant::now());
        }
        (None, Some(id)) => ctx.apply_template(id, EditSource::UserEdit)?,
        (None, None) => bail!("provide a style request via --prompt or --template"),
    }

    let (sender, mut receiver) = mpsc::unbounded_channel();
    ctx.set_event_sink(sender);
    let printer = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                PipelineEvent::Progress(message) => println!("{message}"),
                PipelineEvent::Warning(warning) => eprintln!("warning: {warning}"),
                PipelineEvent::StateChanged(state) => {
                    tracing::debug!(state = %state, "pipeline state changed");
                }
            }
        }
    });

    let result = ctx.generate().await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            printer.abort();
            return Err(e).context("restyle run failed");
        }
    };

    let dest = Utf8PathBuf::from_path_buf(out.to_path_buf())
        .map_err(|dir| anyhow!("output dir is not UTF-8: {dir:?}"))?;
    let written = ctx.save_all_artifacts(&dest)?;
    for path in &written {
        println!("wrote {path}");
    }

    if !outcome.warnings.is_empty() {
        eprintln!("run completed with warnings; it was not added to the run history");
    } else if let Some(id) = &outcome.record_id {
        println!("recorded as {id}");
    }

    printer.abort();
    Ok(())
}

fn history_command(ctx: &mut AppContext, command: HistoryCommands) -> Result<()> {
    match command {
        HistoryCommands::List { json } => {
            let runs = ctx.runs();
            if json {
                println!("{}", serde_json::to_string_pretty(&runs)?);
            } else if runs.is_empty() {
                println!("no runs recorded");
            } else {
                for run in runs {
                    println!(
                        "{}  {}  {} artifact(s)  {}",
                        run.id,
                        run.created_at.format("%Y-%m-%d %H:%M:%S"),
                        run.artifacts.len(),
                        run.prompt
                    );
                }
            }
        }
        HistoryCommands::Remove { id } => ctx.remove_run(&id),
    }
    Ok(())
}

fn template_command(ctx: &mut AppContext, command: TemplateCommands) -> Result<()> {
    match command {
        TemplateCommands::List => {
            for template in ctx.templates().list() {
                print_template(template);
            }
        }
        TemplateCommands::Save { name, prompt } => {
            let id = ctx.templates_mut().save(name, prompt);
            println!("saved as {id}");
        }
        TemplateCommands::Like { id } => ctx.templates_mut().like(&id)?,
        TemplateCommands::Rename { id, name } => ctx.templates_mut().rename(&id, name)?,
        TemplateCommands::Delete { id } => ctx.templates_mut().delete(&id)?,
        TemplateCommands::Search { query } => {
            for template in ctx.templates().search(&query) {
                print_template(template);
            }
        }
    }
    Ok(())
}

fn print_template(template: &crate::types::StyleTemplate) {
    let origin = if template.is_user_authored {
        "user"
    } else {
        "built-in"
    };
    println!(
        "{}  [{}] {} ({} likes)\n    {}",
        template.id, origin, template.name, template.like_count, template.prompt
    );
}

fn theme_command(ctx: &mut AppContext, command: ThemeCommands) -> Result<()> {
    match command {
        ThemeCommands::Get => println!("{}", ctx.theme().as_str()),
        ThemeCommands::Set { mode } => {
            let mode: ThemeMode = mode.parse().map_err(|e: String| anyhow!(e))?;
            ctx.set_theme(mode);
            tracing::debug!(key = THEME_KEY, value = mode.as_str(), "theme persisted");
        }
    }
    Ok(())
}
