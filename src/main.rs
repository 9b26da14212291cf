use anyhow::Context;
use clap::Parser;
use llm_apply::{
    ChatClient, ConfigResolver, Environment, FileSelector, Pipeline, PresetKind, SettingsLayer,
    DEFAULT_CONFIG_FILE,
};
use std::io;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "llm-apply",
    version,
    author,
    about = "Process files using an OpenAI-compatible chat API",
    long_about = "Apply a natural-language action to files using an OpenAI-compatible chat API.\n\n\
    Settings are taken from command-line flags, then the environment \
    (API_KEY, MODEL, API_BASE_URL, ACTION, IN_PLACE), then config.yaml in the \
    current directory or $XDG_CONFIG_HOME. Files matched by .gitignore are skipped.\n\n\
    USAGE EXAMPLES:\n  \
      # Summarize a file\n  \
      llm-apply notes.md\n\n  \
      # Refactor every Python file in place\n  \
      llm-apply --preset refactor --in-place 'src/**/*.py'\n\n  \
      # See which files would be touched\n  \
      llm-apply --dry '**/*.rs'"
)]
struct Cli {
    /// File paths or glob patterns to process
    #[arg(value_name = "FILE", required_unless_present = "list_presets")]
    files: Vec<String>,

    /// Path to the configuration YAML file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, value_name = "PATH")]
    config: PathBuf,

    /// Custom action to perform
    #[arg(short, long, value_name = "TEXT")]
    action: Option<String>,

    /// Built-in action to perform (ignored when --action is given)
    #[arg(short, long, value_enum)]
    preset: Option<CliPreset>,

    /// List built-in presets and exit
    #[arg(long)]
    list_presets: bool,

    /// Edit the files in-place instead of printing the output
    #[arg(short, long)]
    in_place: bool,

    /// Show which files would be modified without making changes
    #[arg(short = 'n', long)]
    dry: bool,

    /// Set a custom API base URL
    #[arg(short = 'u', long, value_name = "URL")]
    api_base_url: Option<String>,

    /// Model to use
    #[arg(short, long, value_name = "NAME")]
    model: Option<String>,

    /// API key (prefer the API_KEY environment variable)
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliPreset {
    /// Short summary of the file
    Summarize,
    /// Behavior-preserving cleanup
    Refactor,
    /// Add documentation comments
    Document,
    /// Plain-language explanation
    Explain,
    /// Fix likely bugs
    FixBugs,
    /// Append unit tests
    AddTests,
    /// Translate comments to English
    TranslateComments,
}

impl From<CliPreset> for PresetKind {
    fn from(p: CliPreset) -> Self {
        match p {
            CliPreset::Summarize => Self::Summarize,
            CliPreset::Refactor => Self::Refactor,
            CliPreset::Document => Self::Document,
            CliPreset::Explain => Self::Explain,
            CliPreset::FixBugs => Self::FixBugs,
            CliPreset::AddTests => Self::AddTests,
            CliPreset::TranslateComments => Self::TranslateComments,
        }
    }
}

impl Cli {
    /// Values given explicitly on the command line.
    fn overrides(&self) -> SettingsLayer {
        let action = self
            .action
            .clone()
            .filter(|a| !a.is_empty())
            .or_else(|| {
                self.preset
                    .map(|p| PresetKind::from(p).action().to_string())
            });

        SettingsLayer {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            api_base_url: self.api_base_url.clone(),
            action,
            in_place: self.in_place.then_some(true),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    if cli.list_presets {
        for kind in PresetKind::all() {
            println!("{:<20} {}", kind.id(), kind.description());
        }
        return Ok(());
    }

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;

    let settings = ConfigResolver::new(Environment::capture(), &cwd)
        .resolve(cli.overrides(), &cli.config)
        .context("Failed to load configuration")?;

    let files = FileSelector::new(&cwd)
        .select(cli.files.as_slice())
        .context("Failed to expand file patterns")?;
    debug!("Selected {} path(s)", files.len());

    let stats = Pipeline::new(settings, ChatClient::new())
        .dry_run(cli.dry)
        .run(&files, &mut io::stdout().lock())
        .context("Failed to write output")?;
    debug!(?stats, "Run finished");

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("llm_apply=warn"),
        1 => EnvFilter::new("llm_apply=info"),
        2 => EnvFilter::new("llm_apply=debug"),
        _ => EnvFilter::new("llm_apply=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(io::stderr),
        )
        .init();

    Ok(())
}
