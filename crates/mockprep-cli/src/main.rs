//! mockprep CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "mockprep",
    version,
    about = "Adaptive mock-interview coaching and answer scoring"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a list of answers through evaluation and coaching
    Run {
        /// Path to a .toml question bank or a directory of banks
        #[arg(long)]
        bank: PathBuf,

        /// TOML file with the answers to replay
        #[arg(long)]
        answers: PathBuf,

        /// Scorer provider name (default: from config)
        #[arg(long)]
        provider: Option<String>,

        /// Scorer model (default: from config)
        #[arg(long)]
        model: Option<String>,

        /// Candidate user id
        #[arg(long, default_value = "local-user")]
        user: String,

        /// Role being interviewed for
        #[arg(long, default_value = "Software Engineer")]
        role: String,

        /// Interview mode: technical, behavioral, system_design, mixed
        #[arg(long, default_value = "technical")]
        mode: String,

        /// Starting difficulty: easy, medium, hard
        #[arg(long, default_value = "medium")]
        difficulty: String,

        /// Preferred question category
        #[arg(long)]
        category: Option<String>,

        /// Where to write the JSON session report
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the output validator on raw scorer output
    Parse {
        /// File holding the raw model reply
        #[arg(long)]
        input: PathBuf,

        /// Print the recovered evaluation as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a saved session report
    Report {
        /// Session report JSON
        file: PathBuf,

        /// Output format: markdown, json
        #[arg(long, default_value = "markdown")]
        format: String,
    },

    /// Validate question bank TOML files
    Validate {
        /// Path to bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// List available scorer models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example question bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mockprep=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            bank,
            answers,
            provider,
            model,
            user,
            role,
            mode,
            difficulty,
            category,
            output,
            config,
        } => {
            commands::run::execute(commands::run::RunArgs {
                bank,
                answers,
                provider,
                model,
                user,
                role,
                mode,
                difficulty,
                category,
                output,
                config,
            })
            .await
        }
        Commands::Parse { input, json } => commands::parse::execute(input, json),
        Commands::Report { file, format } => commands::report::execute(file, format),
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
