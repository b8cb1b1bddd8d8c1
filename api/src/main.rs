use std::{
    io::stdout,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::PathBuf,
};

use api::{start_api, ApiContext};
use anyhow::bail;
use clap::{Parser, Subcommand};
use passforge_core::{
    history::{
        feed::HistoryFeed, memory::InMemoryHistoryStore, sqlite::SqliteHistoryStore, HistoryStore,
    },
    pwd::DefaultPasswordGenerator,
    tracer::init_tracer,
    CharacterClasses, DEFAULT_HISTORY_LIMIT, DEFAULT_LENGTH,
};
use tracing::{debug, warn};

// Mods

mod api;
mod cmd;

// Main

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracer(args.log_filter.clone())?;
    args.check_history_db()?;
    match args.history_db {
        Some(path) => {
            debug!(db.path = %path.display(), "using sqlite history store");
            let store = SqliteHistoryStore::open(path)?;
            run(args.cmd, store).await
        }
        None => {
            debug!("using in-memory history store");
            run(args.cmd, InMemoryHistoryStore::default()).await
        }
    }
}

async fn run<STORE: HistoryStore + 'static>(cmd: Command, store: STORE) -> anyhow::Result<()> {
    let feed = HistoryFeed::new(store);
    match cmd {
        Command::Gen(args) => {
            cmd::generate(
                args.length,
                args.classes(),
                &DefaultPasswordGenerator,
                &feed,
                &mut stdout(),
            )
            .await
        }
        Command::History(args) => cmd::print_history(args.limit, &feed, &mut stdout()).await,
        Command::Serve(args) => {
            let ctx = ApiContext {
                feed,
                generator: DefaultPasswordGenerator,
            };
            start_api(args.bind_addr, ctx).await
        }
    }
}

// Args

#[derive(Clone, Debug, Eq, Parser, PartialEq)]
#[command(version, about = "Password generator with a recent-history log")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
    #[arg(
        long,
        env,
        global = true,
        long_help = "Path to SQLite history database (history is kept in memory if not specified)"
    )]
    history_db: Option<PathBuf>,
    #[arg(
        long,
        env,
        global = true,
        default_value = "passforge_api=info,passforge_core=info,warn",
        long_help = "Log filter (https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#directives)"
    )]
    log_filter: String,
}

impl Args {
    fn check_history_db(&self) -> anyhow::Result<()> {
        if self.history_db.is_some() {
            return Ok(());
        }
        match self.cmd {
            Command::Gen(_) => {
                warn!("no history database specified, password will not be persisted");
                Ok(())
            }
            Command::History(_) => bail!("history requires --history-db"),
            Command::Serve(_) => {
                warn!("no history database specified, history will be lost on shutdown");
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Subcommand)]
enum Command {
    #[command(about = "Generate a password and print it")]
    Gen(GenArgs),
    #[command(about = "Print most recent generated passwords")]
    History(HistoryArgs),
    #[command(about = "Start API server")]
    Serve(ServeArgs),
}

#[derive(clap::Args, Clone, Debug, Eq, PartialEq)]
struct GenArgs {
    #[arg(short, long, default_value_t = DEFAULT_LENGTH, long_help = "Length of the password")]
    length: usize,
    #[arg(long, long_help = "Exclude lowercase letters (a-z)")]
    no_lowercase: bool,
    #[arg(long, long_help = "Exclude digits (0-9)")]
    no_numbers: bool,
    #[arg(long, long_help = "Exclude symbols")]
    no_symbols: bool,
    #[arg(long, long_help = "Exclude uppercase letters (A-Z)")]
    no_uppercase: bool,
}

impl GenArgs {
    fn classes(&self) -> CharacterClasses {
        CharacterClasses {
            lowercase: !self.no_lowercase,
            numbers: !self.no_numbers,
            symbols: !self.no_symbols,
            uppercase: !self.no_uppercase,
        }
    }
}

#[derive(clap::Args, Clone, Debug, Eq, PartialEq)]
struct HistoryArgs {
    #[arg(
        short = 'n',
        long,
        default_value_t = DEFAULT_HISTORY_LIMIT,
        long_help = "Number of records to print"
    )]
    limit: usize,
}

#[derive(clap::Args, Clone, Debug, Eq, PartialEq)]
struct ServeArgs {
    #[arg(
        long,
        env,
        default_value = "0.0.0.0:8080",
        long_help = "Address on which listen requests"
    )]
    bind_addr: SocketAddr,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(0, 0, 0, 0), 8080)),
        }
    }
}

// Tests
