//! nah - native application host.
//!
//! Composes and inspects deterministic launch contracts for installed
//! applications. The contract is printed for a spawn layer to consume;
//! nah itself never executes the application.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use nah::cli;

/// nah - native application host
#[derive(Parser)]
#[command(name = "nah")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// NAH root directory (defaults to $NAH_ROOT, then ~/.nah)
    #[arg(long, global = true)]
    root: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose and print the launch contract for an app
    Contract(cli::ContractArgs),

    /// List installed applications or runtimes
    List(cli::ListArgs),

    /// Inspect an installed application
    Show(cli::ShowArgs),

    /// Print installation paths for an app
    Which(cli::WhichArgs),

    /// Manage host profiles
    #[command(subcommand)]
    Profile(cli::ProfileCommands),

    /// Inspect or generate binary manifests
    #[command(subcommand)]
    Manifest(cli::ManifestCommands),

    /// Print host facts
    Host,

    /// Generate shell completion script
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    // Diagnostics go to stderr so envelopes on stdout stay parseable.
    // -v lowers the filter to DEBUG; RUST_LOG wins over both.
    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        // {:#} includes the context chain.
        tracing::error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = cli.root.as_deref();

    match cli.command {
        Commands::Contract(args) => cli::cmd_contract(root, args),

        Commands::List(args) => cli::cmd_list(root, args),

        Commands::Show(args) => cli::cmd_show(root, args),

        Commands::Which(args) => cli::cmd_which(root, args),

        Commands::Profile(command) => cli::cmd_profile(root, command),

        Commands::Manifest(command) => cli::cmd_manifest(command),

        Commands::Host => cli::cmd_host(root),

        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "nah", &mut std::io::stdout());
            Ok(())
        }
    }
}
