mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use commands::config::ConfigAction;
use commands::daemon::RunOptions;

#[derive(Parser)]
#[command(name = "coach")]
#[command(about = "Adaptive study coaching engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive a scripted study session through the coaching engine
    Simulate {
        /// Scenario file (JSON: user_id, plan, ticks)
        scenario: PathBuf,
        /// Write the session to this database instead of memory
        #[arg(long, conflicts_with = "persist")]
        db: Option<PathBuf>,
        /// Write the session to the default database
        #[arg(long)]
        persist: bool,
    },
    /// Run the coaching daemon in the foreground over every unfinished session
    Run {
        /// Database to coach from (default location if omitted)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Start a new session from this plan (JSON list of {title, duration_minutes})
        #[arg(long)]
        plan: Option<PathBuf>,
        /// Learner the new session belongs to
        #[arg(long, default_value = "learner", requires = "plan")]
        user: String,
        /// Queue these sensor readings (JSON list of {focus, fatigue})
        #[arg(long)]
        readings: Option<PathBuf>,
    },
    /// Show a session's current schedule
    Schedule {
        session_id: Uuid,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show a session's schedule change history
    History {
        session_id: Uuid,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show every coaching decision made for a session
    Decisions {
        session_id: Uuid,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List stored sessions
    Sessions {
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    match cli.command {
        Commands::Simulate {
            scenario,
            db,
            persist,
        } => commands::simulate::handle_simulate_command(&scenario, db, persist).await,
        Commands::Run {
            db,
            plan,
            user,
            readings,
        } => {
            commands::daemon::handle_run_command(RunOptions {
                db,
                plan,
                user,
                readings,
            })
            .await
        }
        Commands::Schedule { session_id, db } => {
            commands::session::handle_schedule_command(session_id, db)
        }
        Commands::History { session_id, db } => {
            commands::session::handle_history_command(session_id, db)
        }
        Commands::Decisions { session_id, db } => {
            commands::session::handle_decisions_command(session_id, db)
        }
        Commands::Sessions { db } => commands::session::handle_sessions_command(db),
        Commands::Config { action } => commands::config::handle_config_command(action),
    }
}
