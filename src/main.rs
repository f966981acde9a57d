//! terms CLI: forward-chaining inference over a persistent knowledge base.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use terms_engine::config::EngineConfig;
use terms_engine::engine::Engine;
use terms_engine::program::{Op, PredicateDoc, Program, Report};

#[derive(Parser)]
#[command(name = "terms", version, about = "Forward-chaining inference engine")]
struct Cli {
    /// Data directory for persistent storage.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Engine config file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new terms data directory.
    Init,

    /// Run a JSON program against the knowledge base.
    Run {
        /// Path to the JSON program.
        #[arg(long)]
        file: PathBuf,

        /// Print reports as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Ask a conjunctive question read from a JSON array of patterns.
    Ask {
        #[arg(long)]
        file: PathBuf,
    },

    /// Advance the clock by one.
    Tick,

    /// Show engine info and statistics.
    Info,

    /// List term names.
    Terms {
        /// Only terms below this type.
        #[arg(long)]
        under: Option<String>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir.clone();
    }

    match cli.command {
        Commands::Init => {
            let data_dir = config
                .data_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".terms"));
            config.data_dir = Some(data_dir.clone());
            if let Some(path) = &cli.config {
                config.save(path)?;
            }
            let engine = Engine::open(config)?;
            println!("Initialized terms at {}", data_dir.display());
            print!("{}", engine.info()?);
        }

        Commands::Run { file, json } => {
            let engine = Engine::open(config)?;
            let program = Program::load(&file)?;
            for op in &program.ops {
                let report = op.execute(&engine)?;
                print_report(&report, json)?;
            }
            if !engine.config().autocommit {
                engine.persist()?;
            }
        }

        Commands::Ask { file } => {
            let engine = Engine::open(config)?;
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let patterns: Vec<PredicateDoc> = serde_json::from_str(&content).into_diagnostic()?;
            let report = Op::Ask { patterns }.execute(&engine)?;
            print_report(&report, false)?;
        }

        Commands::Tick => {
            let engine = Engine::open(config)?;
            let now = engine.tick()?;
            if !engine.config().autocommit {
                engine.persist()?;
            }
            println!("now {now}");
        }

        Commands::Info => {
            let engine = Engine::open(config)?;
            print!("{}", engine.info()?);
        }

        Commands::Terms { under } => {
            let engine = Engine::open(config)?;
            let names = engine.terms_under(under.as_deref())?;
            if names.is_empty() {
                println!("No terms found.");
            } else {
                for name in names {
                    println!("{name}");
                }
            }
        }
    }

    Ok(())
}

fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report).into_diagnostic()?);
    } else {
        println!("{report}");
    }
    Ok(())
}
