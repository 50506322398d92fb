//! Game Review - Analyzes chess games with a UCI engine.
//!
//! Positions are evaluated by an external engine (Stockfish by default)
//! and every move is classified by how much it gave away.

mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chess_analysis::{
    AnalysisScheduler, AnalyzerConfig, EngineSession, GameAnalyzer, GameRecord, ProcessLauncher,
    START_FEN,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "game-review")]
#[command(about = "Chess game review using a UCI engine")]
struct Cli {
    /// Path to the configuration file (defaults to ./analyzer.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Engine executable, overriding the configuration
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single position and print the engine lines as JSON
    Evaluate {
        /// Position in FEN
        #[arg(long)]
        fen: String,
        /// Search depth
        #[arg(short, long)]
        depth: Option<u32>,
    },
    /// Review a game given as a list of UCI moves
    Review {
        /// Moves in UCI notation (e.g. e2e4 e7e5)
        #[arg(long, num_args = 1.., required = true)]
        moves: Vec<String>,
        /// Starting position in FEN
        #[arg(long, default_value = START_FEN)]
        fen: String,
        /// Search depth per position
        #[arg(short, long)]
        depth: Option<u32>,
        /// Write the full review as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Game identifier
        #[arg(long, default_value = "game")]
        id: String,
        /// White player name
        #[arg(long, default_value = "White")]
        white: String,
        /// Black player name
        #[arg(long, default_value = "Black")]
        black: String,
        /// Game result (1-0, 0-1, 1/2-1/2 or *)
        #[arg(long, default_value = "*")]
        result: String,
    },
}

impl Commands {
    fn depth(&self) -> Option<u32> {
        match self {
            Commands::Evaluate { depth, .. } | Commands::Review { depth, .. } => *depth,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AnalyzerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(engine) = cli.engine {
        config.engine.path = Some(engine);
    }

    if let Some(depth) = cli.command.depth() {
        config.analysis.depth = depth;
    }

    let analyzer = build_analyzer(&config);
    tracing::info!("Engine: {:?}", config.engine.engine_path());

    // The engine is shut down on every path out of here, including errors.
    let outcome = run(&analyzer, cli.command).await;
    analyzer.shutdown().await;
    outcome
}

fn build_analyzer(config: &AnalyzerConfig) -> GameAnalyzer {
    let launcher = Arc::new(ProcessLauncher::new(config.engine.engine_path()));
    let session = EngineSession::new(launcher, config.engine.session_config());
    let scheduler = Arc::new(AnalysisScheduler::new(
        session,
        config.scheduler.scheduler_config(),
    ));
    GameAnalyzer::new(scheduler, config.analysis.clone())
}

async fn run(analyzer: &GameAnalyzer, command: Commands) -> anyhow::Result<()> {
    let depth = analyzer.config().depth;
    match command {
        Commands::Evaluate { fen, .. } => {
            analyzer.start().await.context("starting engine")?;
            let eval = analyzer
                .evaluate_position(&fen)
                .await
                .context("evaluating position")?;
            println!("{}", serde_json::to_string_pretty(&eval)?);
        }
        Commands::Review {
            moves,
            fen,
            output,
            id,
            white,
            black,
            result,
            ..
        } => {
            let mut record = GameRecord::replay(analyzer.rules(), &fen, &moves)?;
            record.game_id = id;
            record.white_player = white;
            record.black_player = black;
            record.result = result;

            analyzer.start().await.context("starting engine")?;
            tracing::info!("Reviewing {} moves at depth {}", record.plies.len(), depth);

            let analysis = analyzer
                .analyze_game(&record)
                .await
                .context("analyzing game")?;
            print!("{}", report::format_summary(&analysis));

            if let Some(path) = output {
                let engine_name = analyzer.engine_name().await;
                report::write_json(&path, engine_name.as_deref(), depth, &analysis)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("\nReview written to {}", path.display());
            }
        }
    }
    Ok(())
}
