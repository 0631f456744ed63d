//! Command-line front end for the habit tracker core.
//!
//! # Responsibility
//! - Probe core linkage, print a month grid and run one command.
//! - Resolve settings from flags first, then the environment.

use aura_core::{
    CoreConfig, DateKey, Database, GeminiClient, HabitTracker, Identity, MonthKey, MonthlyRecord,
    SqliteHabitRepository,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aura", about = "Track monthly habits from the terminal", version)]
struct Cli {
    /// Habit store file (default: AURA_DB_PATH or a temp-dir file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Write rolling logs into this absolute directory
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print core ping and version
    Probe,

    /// Print the habit grid of a month
    Show {
        #[arg(long, env = "AURA_USER")]
        user: String,
        /// Month as YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<String>,
    },

    /// Add the starter habits to an empty month
    Seed {
        #[arg(long, env = "AURA_USER")]
        user: String,
        #[arg(long)]
        month: Option<String>,
    },

    /// Run one natural-language command
    Run {
        #[arg(long, env = "AURA_USER")]
        user: String,
        /// Date used for "today" as YYYY-MM-DD (default: local date)
        #[arg(long)]
        today: Option<String>,
        /// What to do, e.g. "log meditation for yesterday"
        utterance: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = CoreConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(log_dir) = cli.log_dir.as_deref() {
        aura_core::init_logging(&config.log_level, log_dir)?;
    }

    match cli.command {
        Commands::Probe => {
            println!("aura_core ping={}", aura_core::ping());
            println!("aura_core version={}", aura_core::core_version());
            Ok(())
        }
        Commands::Show { user, month } => {
            let month = month_or_current(month.as_deref())?;
            with_tracker(&config, &user, month, |tracker| {
                print_month(tracker.record());
                Ok(())
            })
        }
        Commands::Seed { user, month } => {
            let month = month_or_current(month.as_deref())?;
            with_tracker(&config, &user, month, |tracker| {
                let added = tracker.seed_starter_habits()?;
                println!("added {added} starter habit(s)");
                print_month(tracker.record());
                Ok(())
            })
        }
        Commands::Run {
            user,
            today,
            utterance,
        } => {
            let today = match today {
                Some(raw) => DateKey::parse(&raw)?,
                None => DateKey::from_date(Local::now().date_naive())?,
            };
            let utterance = utterance.join(" ");
            with_tracker(&config, &user, today.month(), |tracker| {
                let outcome = tracker.run_command(&utterance, today);
                println!("{}", outcome.message);
                if outcome.applied {
                    print_month(tracker.record());
                }
                Ok(())
            })
        }
    }
}

fn month_or_current(raw: Option<&str>) -> Result<MonthKey, Box<dyn Error>> {
    match raw {
        Some(raw) => Ok(MonthKey::parse(raw)?),
        None => Ok(DateKey::from_date(Local::now().date_naive())?.month()),
    }
}

fn with_tracker(
    config: &CoreConfig,
    user: &str,
    month: MonthKey,
    f: impl FnOnce(
        &mut HabitTracker<SqliteHabitRepository<'_>, GeminiClient>,
    ) -> Result<(), Box<dyn Error>>,
) -> Result<(), Box<dyn Error>> {
    let identity = Identity::new(user).ok_or("a non-blank --user is required")?;
    let db = Database::open(&config.db_path)?;
    let result = {
        let repo = SqliteHabitRepository::new(db.conn(), &identity);
        let mut tracker = HabitTracker::new(
            repo,
            GeminiClient::new(&config.language),
            month,
            config.habit_cap,
        );
        tracker.open_month(month)?;
        f(&mut tracker)
    };
    db.close()?;
    result
}

fn print_month(record: &MonthlyRecord) {
    let days = record.month_key.dates();
    println!("{}", record.month_key);
    for habit in &record.habits {
        let row: String = days
            .iter()
            .map(|day| if habit.is_completed(*day) { 'x' } else { '.' })
            .collect();
        let name = if habit.name.is_empty() {
            "(unnamed)"
        } else {
            habit.name.as_str()
        };
        println!("  {row}  {name} [{}]", habit.completed_days());
    }
    if !record.note.is_empty() {
        println!("notes:\n{}", record.note);
    }
    if !record.reflection.is_empty() {
        println!("reflection:\n{}", record.reflection);
    }
}
