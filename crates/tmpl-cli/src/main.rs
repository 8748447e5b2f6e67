mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tmpl",
    about = "Compile, validate and render YAML document templates",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from tmpl.yaml or .git/)
    #[arg(long, global = true, env = "TMPL_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every template in the input directory to JSON artifacts
    Compile {
        #[command(flatten)]
        dirs: cmd::DirArgs,

        /// Log each compiled file
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Compile once, then recompile templates as they change (Ctrl-C stops)
    Watch {
        #[command(flatten)]
        dirs: cmd::DirArgs,

        /// Polling interval in milliseconds (default: from tmpl.yaml)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Check template files for structural problems
    Validate {
        /// Template files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print a template's compiled form as JSON
    Show { file: PathBuf },

    /// Render a template into a markdown document
    Render {
        /// Template file (omit when using --id)
        #[arg(required_unless_present = "id", conflicts_with = "id")]
        file: Option<PathBuf>,

        /// Template id, looked up in the configured input directory
        #[arg(long)]
        id: Option<String>,

        /// Context file (JSON or YAML)
        #[arg(long, short = 'c')]
        context: PathBuf,

        /// Write the document here instead of stdout
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Render a free-form template using the helper functions
    Expand {
        file: PathBuf,

        /// Context file (JSON or YAML)
        #[arg(long, short = 'c')]
        context: PathBuf,
    },

    /// Inspect and validate tmpl.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Watch { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Compile { dirs, verbose } => cmd::compile::run(&root, &dirs, verbose, cli.json),
        Commands::Watch { dirs, interval_ms } => cmd::watch::run(&root, &dirs, interval_ms, cli.json),
        Commands::Validate { files } => cmd::validate::run(&files, cli.json),
        Commands::Show { file } => cmd::show::run(&file),
        Commands::Render {
            file,
            id,
            context,
            out,
        } => cmd::render::run(
            &root,
            file.as_deref(),
            id.as_deref(),
            &context,
            out.as_deref(),
        ),
        Commands::Expand { file, context } => cmd::expand::run(&file, &context),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
