use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use chorus::api::{self, AppState};
use chorus::commands::HELP;
use chorus::engine::{Outcome, Reply};
use chorus::routing::RoutingDecision;
use chorus::{Config, Dispatcher};

#[derive(Parser)]
#[command(name = "chorus")]
#[command(about = "Route questions to agent personas and fuse their answers", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Agent registry (YAML or JSON), overrides the config file
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route one question and print the answer
    Ask {
        #[arg(help = "Question text, or @agent: text")]
        text: Vec<String>,
    },
    /// Interactive session
    Repl,
    /// Serve the HTTP status API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// List registered agents
    Agents,
}

fn setup_logging() {
    let mut builder = env_logger::Builder::new();
    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(registry) = cli.registry {
        config.registry_path = Some(registry);
    }
    let dispatcher = Arc::new(
        Dispatcher::init(config)
            .await
            .context("Failed to start dispatcher")?,
    );

    let result = match cli.command {
        Commands::Ask { text } => ask(&dispatcher, &text.join(" ")).await,
        Commands::Repl => repl(&dispatcher).await,
        Commands::Serve { port } => serve(dispatcher.clone(), port).await,
        Commands::Agents => {
            print_outcome(dispatcher.handle_line("/agents").await?);
            Ok(())
        }
    };

    dispatcher.close().await.context("Failed to persist state")?;
    result
}

async fn ask(dispatcher: &Dispatcher, text: &str) -> Result<()> {
    let outcome = dispatcher.handle_line(text).await?;
    print_outcome(outcome);
    Ok(())
}

async fn repl(dispatcher: &Dispatcher) -> Result<()> {
    dispatcher.start_health_checks();
    println!("chorus {} ({} agents). Type /quit to exit.", env!("CARGO_PKG_VERSION"), dispatcher.registry().len());
    println!("{}\n", HELP);

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match dispatcher.handle_line(&line).await {
            Ok(Outcome::Quit) => break,
            Ok(outcome) => print_outcome(outcome),
            Err(e) => eprintln!("error: {}", e),
        }
        if let Err(e) = dispatcher.flush() {
            log::warn!("could not persist state: {}", e);
        }
    }
    Ok(())
}

async fn serve(dispatcher: Arc<Dispatcher>, port: u16) -> Result<()> {
    dispatcher.start_health_checks();
    api::serve(AppState { dispatcher }, port).await
}

fn print_outcome(outcome: Outcome) {
    match outcome {
        Outcome::Reply(reply) => print_reply(&reply),
        Outcome::Info(text) => println!("{}", text),
        Outcome::Quit | Outcome::Nothing => {}
    }
}

fn print_reply(reply: &Reply) {
    match &reply.decision {
        RoutingDecision::Single { target } => match target.as_agent() {
            Some(agent_id) => println!("[{}] {}", agent_id, reply.text),
            None => println!("{}", reply.text),
        },
        RoutingDecision::Fusion { .. } => println!("{}", reply.text),
    }
}
