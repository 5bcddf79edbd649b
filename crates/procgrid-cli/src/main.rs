use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "procgrid",
    about = "procgrid — process desired-state resolver",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Resolver configuration (TOML). Built-in defaults when omitted.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show declared and container-facing ports for a process
    Ports {
        /// Process snapshot (JSON)
        #[arg(short, long)]
        snapshot: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Run the quota validator chain against a process.
    ///
    /// Organization and space quotas (with current usage) are read from the
    /// snapshot. Exits non-zero when any policy rejects the process.
    Validate {
        #[arg(short, long)]
        snapshot: String,
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Build the desired long-running-process descriptor
    Desire {
        #[arg(short, long)]
        snapshot: String,
        #[arg(short, long, default_value = "json")]
        format: String,
    },
    /// Print the effective resolver configuration as TOML
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("procgrid=info".parse()?)
        )
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ports { snapshot, format } => commands::ports::ports(&snapshot, &format),
        Commands::Validate { snapshot, format } => commands::validate::validate(&snapshot, &format, &config),
        Commands::Desire { snapshot, format } => commands::desire::desire(&snapshot, &format, &config),
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
