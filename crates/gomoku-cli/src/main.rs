use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gomoku_client::api::{GameApi, HttpGameApi};
use gomoku_client::archive;
use gomoku_client::config::{ClientConfig, StoredUser};
use gomoku_client::presence::{
    FileStore, KeyValueStore, NavigationHistory, USER_KEY, game_log_path,
};
use gomoku_core::protocol::CreateGame;
use tracing_subscriber::EnvFilter;

mod play;
mod render;

#[derive(Parser)]
#[command(name = "gomoku")]
#[command(about = "Play gomoku against the server or a friend", long_about = None)]
struct Cli {
    /// REST API host, e.g. https://gomoku.example
    #[arg(long, env = "GOMOKU_API", default_value = "")]
    api: String,

    /// WebSocket base; derived from the API host when omitted
    #[arg(long, env = "GOMOKU_WS")]
    ws: Option<String>,

    /// Bearer token; falls back to the remembered login
    #[arg(long, env = "GOMOKU_TOKEN")]
    token: Option<String>,

    #[arg(long, env = "GOMOKU_USER_ID")]
    user_id: Option<String>,

    #[arg(long, env = "GOMOKU_USER_NAME")]
    user_name: Option<String>,

    /// Where navigation state and the login are remembered
    #[arg(long, env = "GOMOKU_STATE_FILE", default_value = ".gomoku-state.json")]
    state_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remember credentials for later runs
    Login,
    /// Forget the remembered credentials
    Logout,
    /// Games in progress
    List,
    /// Finished games
    History,
    /// Start a new game and play it
    Create {
        #[arg(long, default_value_t = 15)]
        size: usize,
        /// Wait for a second player instead of playing both colours
        #[arg(long)]
        multi: bool,
    },
    /// Take a free seat in a game and play it
    Join { game_id: String },
    /// Return to a game you are seated in
    Play { game_id: String },
    /// Replay a finished game
    Log { game_id: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FileStore::open(&cli.state_file)?;

    match cli.command {
        Command::Login => {
            let (Some(user_id), Some(user_name), Some(token)) =
                (cli.user_id, cli.user_name, cli.token)
            else {
                return Err("login needs --user-id, --user-name and --token".into());
            };
            let user = StoredUser {
                user_id,
                user_name,
                token,
            };
            user.save(&mut store);
            println!("Logged in as {}.", user.user_name);
            return Ok(());
        }
        Command::Logout => {
            store.remove(USER_KEY);
            println!("Logged out.");
            return Ok(());
        }
        _ => {}
    }

    let user = resolve_user(&mut store, cli.user_id, cli.user_name, cli.token)?;
    let mut config = ClientConfig::new(cli.api, user.token.clone());
    if let Some(ws) = cli.ws {
        config = config.with_ws_base(ws);
    }
    let api = HttpGameApi::new(&config.api_base, &config.token);

    match cli.command {
        Command::List => {
            let games = api.list_active().await?;
            if games.is_empty() {
                println!("No games in progress.");
            }
            for game in &games {
                println!("{}", archive::active_line(game));
            }
        }
        Command::History => {
            let games = api.list_completed().await?;
            if games.is_empty() {
                println!("No finished games yet.");
            }
            for game in &games {
                println!("{}", archive::completed_line(game));
            }
        }
        Command::Create { size, multi } => {
            let snapshot = api
                .create_game(CreateGame {
                    size: [size, size],
                    is_multi: multi,
                })
                .await?;
            println!("Created game {}.", snapshot.id);
            let game_id = snapshot.id.clone();
            play::run(&config, api, user.identity(), store, &game_id, Some(snapshot), false)
                .await?;
        }
        Command::Join { game_id } => {
            play::run(&config, api, user.identity(), store, &game_id, None, true).await?;
        }
        Command::Play { game_id } => {
            play::run(&config, api, user.identity(), store, &game_id, None, false).await?;
        }
        Command::Log { game_id } => {
            NavigationHistory::new(store).visit(&game_log_path(&game_id));
            let session = archive::load_game_log(&api, &game_id).await?;
            render::print_replay(&session);
        }
        Command::Login | Command::Logout => {}
    }
    Ok(())
}

/// Flags win over the remembered login, field by field.
fn resolve_user(
    store: &mut FileStore,
    user_id: Option<String>,
    user_name: Option<String>,
    token: Option<String>,
) -> Result<StoredUser, Box<dyn std::error::Error>> {
    let stored = StoredUser::load(store);
    let user_id = user_id.or_else(|| stored.as_ref().map(|u| u.user_id.clone()));
    let user_name = user_name.or_else(|| stored.as_ref().map(|u| u.user_name.clone()));
    let token = token.or_else(|| stored.as_ref().map(|u| u.token.clone()));

    match (user_id, user_name, token) {
        (Some(user_id), Some(user_name), Some(token)) => Ok(StoredUser {
            user_id,
            user_name,
            token,
        }),
        _ => Err(
            "not logged in: run `gomoku login` or pass --user-id, --user-name and --token".into(),
        ),
    }
}
