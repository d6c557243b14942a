//! The `lingua` command-line interface over a JSON state snapshot.

use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lingua", version, about = "CEFR lesson grading and spaced repetition")]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every stateful command.
#[derive(Args, Clone, Debug)]
pub struct GlobalOpts {
    /// State snapshot file, created on first write
    #[arg(long, global = true, default_value = "./lingua-state.json")]
    pub state: PathBuf,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Acting user id
    #[arg(long, global = true, default_value = "1")]
    pub user: i64,

    /// Pin the clock to an RFC 3339 timestamp instead of the current time
    #[arg(long, global = true)]
    pub now: Option<DateTime<Utc>>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate lesson content or an import file
    Validate {
        /// Import file, directory of import files, or a lesson content file
        #[arg(long)]
        path: PathBuf,

        /// Treat `path` as raw content of this lesson type
        #[arg(long)]
        kind: Option<String>,
    },

    /// Import modules into the state file
    Import {
        /// Import file or directory
        #[arg(long)]
        path: PathBuf,
    },

    /// Start a lesson
    Enter {
        #[arg(long)]
        lesson: i64,
    },

    /// Grade a submission
    Grade {
        #[arg(long)]
        lesson: i64,

        /// Answers as JSON, e.g. '{"0": 1, "1": "four"}'
        #[arg(long, conflicts_with = "answers_file")]
        answers: Option<String>,

        /// Read answers from a JSON file
        #[arg(long)]
        answers_file: Option<PathBuf>,
    },

    /// Show the cards due in a card lesson
    Due {
        #[arg(long)]
        lesson: i64,

        /// Shuffle seed, for reproducible ordering
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Rate one card direction
    Review {
        #[arg(long)]
        lesson: i64,

        #[arg(long)]
        word: i64,

        /// src-tgt or tgt-src
        #[arg(long, default_value = "src-tgt")]
        direction: String,

        /// 0 (again), 2 (hard), 4 (good) or 5 (easy)
        #[arg(long)]
        quality: u8,
    },

    /// Explain whether a module is open
    Access {
        #[arg(long)]
        module: i64,
    },

    /// Show learner statistics
    Stats {
        /// Also report attempts and mistakes for this lesson
        #[arg(long)]
        lesson: Option<i64>,
    },

    /// Preview the interval each rating would give a card
    Plan {
        #[arg(long, default_value = "0")]
        repetitions: u32,

        #[arg(long, default_value = "0")]
        interval: u32,

        #[arg(long, default_value = "2.5")]
        ease: f64,

        #[arg(long, default_value = "0")]
        session_attempts: u32,
    },
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        .from_env_lossy();
    let filter = match "lingua=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = cli.global;

    let result = match cli.command {
        Commands::Validate { path, kind } => commands::validate::execute(path, kind),
        Commands::Import { path } => commands::import::execute(&global, path).await,
        Commands::Enter { lesson } => commands::enter::execute(&global, lesson).await,
        Commands::Grade {
            lesson,
            answers,
            answers_file,
        } => commands::grade::execute(&global, lesson, answers, answers_file).await,
        Commands::Due { lesson, seed } => commands::due::execute(&global, lesson, seed).await,
        Commands::Review {
            lesson,
            word,
            direction,
            quality,
        } => commands::review::execute(&global, lesson, word, direction, quality).await,
        Commands::Access { module } => commands::access::execute(&global, module).await,
        Commands::Stats { lesson } => commands::stats::execute(&global, lesson).await,
        Commands::Plan {
            repetitions,
            interval,
            ease,
            session_attempts,
        } => commands::plan::execute(&global, repetitions, interval, ease, session_attempts),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
