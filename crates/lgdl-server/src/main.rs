//! `lgdl` - validate and compile game definitions offline, or serve them
//! over HTTP (§6.6). Mirrors the `dsl_cli` shape: a `clap` derive `Cli`
//! with one subcommand per lifecycle stage, a shared `--format` flag, and
//! a process exit code that's zero only when the command fully succeeded.

use lgdl_server::{loader, routes, state};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "lgdl")]
#[command(author = "lgdl")]
#[command(version)]
#[command(about = "LGDL runtime: validate, compile, and serve language-game definitions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json, text, or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and compile a game file, reporting errors without registering it
    Validate {
        /// Path to the game's YAML source
        file: PathBuf,
    },
    /// Compile a game file and print a summary of its IR
    Compile {
        /// Path to the game's YAML source
        file: PathBuf,
    },
    /// Serve one or more games over HTTP
    Serve {
        /// Directory of `<id>.yaml` game files (with optional co-located
        /// `<id>.contract.json`)
        #[arg(long, default_value = "games")]
        games_dir: PathBuf,

        #[arg(long, env = "SERVER_PORT", default_value_t = 8080)]
        port: u16,

        /// Game the legacy `POST /move` route falls back to; defaults to
        /// whichever game was loaded first
        #[arg(long)]
        default_game: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => cmd_validate(&file, cli.format),
        Commands::Compile { file } => cmd_compile(&file, cli.format),
        Commands::Serve {
            games_dir,
            port,
            default_game,
        } => {
            let rt = tokio::runtime::Runtime::new().map_err(|e| format!("failed to start tokio runtime: {e}"));
            match rt {
                Ok(rt) => rt.block_on(cmd_serve(games_dir, port, default_game)),
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!(r#"{{"error": "{}"}}"#, e.replace('"', "\\\""));
            } else {
                eprintln!("{}: {}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

fn cmd_validate(file: &std::path::Path, format: OutputFormat) -> Result<(), String> {
    let ast = lgdl_ast::load_game(file).map_err(|e| e.to_string())?;

    match lgdl_ir::compile_game(&ast) {
        Ok(game) => {
            match format {
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "valid": true,
                        "id": game.id,
                        "moves": game.moves.len(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                }
                OutputFormat::Text | OutputFormat::Pretty => {
                    println!(
                        "{} {} compiled cleanly ({} moves)",
                        "OK".green().bold(),
                        game.id,
                        game.moves.len()
                    );
                }
            }
            Ok(())
        }
        Err(errors) => {
            match format {
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "valid": false,
                        "errors": errors.iter().map(|e| serde_json::json!({
                            "code": e.code,
                            "message": e.message,
                        })).collect::<Vec<_>>(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                }
                OutputFormat::Text | OutputFormat::Pretty => {
                    for e in &errors {
                        println!("{} {}: {}", "ERROR".red().bold(), e.code, e.message);
                    }
                }
            }
            Err(format!("{} error(s) found", errors.len()))
        }
    }
}

fn cmd_compile(file: &std::path::Path, format: OutputFormat) -> Result<(), String> {
    let ast = lgdl_ast::load_game(file).map_err(|e| e.to_string())?;
    let game = lgdl_ir::compile_game(&ast).map_err(|errors| {
        errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    })?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": game.id,
                "name": game.name,
                "version": game.version,
                "source_hash": game.source_hash,
                "moves": game.moves.iter().map(|m| serde_json::json!({
                    "id": m.id,
                    "threshold": m.threshold,
                    "slots": m.slot_order,
                    "triggers": m.triggers.len(),
                })).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        }
        OutputFormat::Text | OutputFormat::Pretty => {
            println!(
                "{} {} v{} ({})",
                "OK".green().bold(),
                game.name,
                game.version,
                game.source_hash
            );
            for m in &game.moves {
                println!(
                    "  [{}] threshold={} slots={:?} triggers={}",
                    m.id,
                    m.threshold,
                    m.slot_order,
                    m.triggers.len()
                );
            }
        }
    }
    Ok(())
}

async fn cmd_serve(games_dir: PathBuf, port: u16, default_game: Option<String>) -> Result<(), String> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lgdl_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = lgdl_engine::RuntimeConfig::from_env();
    tracing::info!(dev_mode = config.dev_mode, learning_enabled = config.learning_enabled, "starting lgdl server");

    let registry = Arc::new(lgdl_engine::GameRegistry::new());
    let loaded = loader::load_games_dir(&registry, &games_dir).map_err(|e| e.to_string())?;
    if loaded.is_empty() {
        return Err(format!("no game files found under {}", games_dir.display()));
    }
    tracing::info!(count = loaded.len(), "games loaded");

    let state: Arc<dyn lgdl_state::StateStore> = match config.state_backend {
        lgdl_engine::StateBackend::Postgres => {
            let database_url = std::env::var("DATABASE_URL")
                .map_err(|_| "DATABASE_URL must be set when LGDL_STATE_BACKEND=postgres".to_string())?;
            let pool = sqlx::PgPool::connect(&database_url)
                .await
                .map_err(|e| format!("failed to connect to the state database: {e}"))?;
            tracing::info!("connected to postgres state backend");
            Arc::new(lgdl_state::PgStateStore::new(pool))
        }
        lgdl_engine::StateBackend::Memory => Arc::new(lgdl_state::InMemoryStateStore::new()),
    };

    let cache_path = std::env::var("LGDL_EMBEDDING_CACHE_PATH").ok();
    let cache = match (config.embedding_cache_enabled, cache_path) {
        (true, Some(path)) => {
            Arc::new(lgdl_embed::VectorCache::open(&path).map_err(|e| format!("failed to open embedding cache: {e}"))?)
        }
        _ => Arc::new(lgdl_embed::VectorCache::in_memory()),
    };
    let matcher = Arc::new(lgdl_match::CascadeMatcher::new(
        Arc::new(lgdl_embed::OfflineVectorizer::new()),
        cache,
    ));
    let metrics = Arc::new(lgdl_metrics::MetricsRegistry::new());

    let mut engine = lgdl_engine::TurnEngine::new(registry.clone(), state, matcher, metrics, config.clone());
    if config.learning_enabled {
        engine = engine.with_learning(Arc::new(lgdl_learn::LearningStore::new()));
    }
    let engine = Arc::new(engine);

    let default_game_id = default_game.or_else(|| loaded.keys().next().cloned());

    let app_state = Arc::new(state::AppState {
        engine,
        registry,
        dev_mode: config.dev_mode,
        default_game_id,
        loaded,
    });

    let app = routes::build_router(app_state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind to {addr}: {e}"))?;
    tracing::info!("lgdl server listening on {addr}");
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server error: {e}"))?;
    Ok(())
}
