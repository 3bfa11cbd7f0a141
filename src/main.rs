use clap::{Parser, Subcommand};
use one2many::config::{ClientConfig, MediaSources};
use one2many::peer::ServerConfig;
use one2many::signaling::signaling_url;
use one2many::{logger, ClientError, SessionState, UserCommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

#[derive(Parser, Debug)]
#[command(
    name = "one2many",
    version,
    about = "Presenter/viewer client for a one-to-many WebRTC media server"
)]
struct Cli {
    /// Media server host; the socket goes to wss://<host>/call
    #[arg(long, env = "ONE2MANY_HOST", default_value = "localhost:8443")]
    host: String,

    /// Full signaling URL, overrides --host
    #[arg(long, env = "ONE2MANY_URL")]
    url: Option<String>,

    /// STUN server, repeatable
    #[arg(long = "stun")]
    stun: Vec<String>,

    #[arg(long, requires_all = ["turn_username", "turn_credential"])]
    turn: Option<String>,

    #[arg(long)]
    turn_username: Option<String>,

    #[arg(long)]
    turn_credential: Option<String>,

    /// Where stats dumps are written
    #[arg(long, env = "ONE2MANY_STATS_DIR", default_value = ".")]
    stats_dir: PathBuf,

    #[arg(long, default_value_t = 1000)]
    stats_interval_ms: u64,

    /// Log filter, e.g. `one2many=trace,webrtc=info`
    #[arg(long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish media to the server
    Presenter {
        /// VP8 video in an IVF file, played in a loop
        #[arg(long)]
        video: Option<PathBuf>,
        /// Opus audio in an OGG file, played in a loop (silence otherwise)
        #[arg(long)]
        audio: Option<PathBuf>,
        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Watch the current presenter
    Viewer {
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Read presenter/viewer/stop/quit lines from stdin
    Console,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let cli = Cli::parse();
    logger::init(cli.log.as_deref());

    let config = build_config(&cli)?;
    tracing::info!(url = %config.signaling_url, "connecting");
    let (client, inbound) = one2many::connect(config).await?;
    let states = client.subscribe();
    let (commands, command_rx) = mpsc::unbounded_channel();

    match cli.command {
        Command::Presenter { duration, .. } => {
            let _ = commands.send(UserCommand::Presenter);
            tokio::spawn(finish_session(commands.clone(), states, duration));
        }
        Command::Viewer { duration } => {
            let _ = commands.send(UserCommand::Viewer);
            tokio::spawn(finish_session(commands.clone(), states, duration));
        }
        Command::Console => {
            tokio::spawn(read_console(commands.clone()));
        }
    }
    tokio::spawn(quit_on_ctrl_c(commands));

    client.run(inbound, command_rx).await
}

fn build_config(cli: &Cli) -> Result<ClientConfig, ClientError> {
    let target = cli.url.as_deref().unwrap_or(&cli.host);
    let mut servers: Vec<ServerConfig> = cli.stun.iter().map(ServerConfig::stun).collect();
    if let Some(turn) = &cli.turn {
        servers.push(ServerConfig::turn(
            turn,
            cli.turn_username.clone(),
            cli.turn_credential.clone(),
        ));
    }
    let media = match &cli.command {
        Command::Presenter { video, audio, .. } => MediaSources {
            video: video.clone(),
            audio: audio.clone(),
        },
        _ => MediaSources::default(),
    };

    Ok(ClientConfig::new(signaling_url(target)?)
        .with_ice_servers(servers)?
        .with_stats_interval(Duration::from_millis(cli.stats_interval_ms))?
        .with_stats_dir(&cli.stats_dir)
        .with_media(media))
}

/// Quits once a one-shot session is over, or after `duration` seconds
async fn finish_session(
    commands: mpsc::UnboundedSender<UserCommand>,
    mut states: watch::Receiver<SessionState>,
    duration: Option<u64>,
) {
    // first change: the session started, or failed to
    if states.changed().await.is_err() {
        return;
    }
    if *states.borrow_and_update() != SessionState::Idle {
        let ended = states.wait_for(|s| *s == SessionState::Idle);
        match duration {
            Some(secs) => {
                if tokio::time::timeout(Duration::from_secs(secs), ended)
                    .await
                    .is_err()
                {
                    tracing::info!(secs, "duration elapsed, stopping");
                }
            }
            None => {
                let _ = ended.await;
            }
        }
    }
    let _ = commands.send(UserCommand::Quit);
}

async fn read_console(commands: mpsc::UnboundedSender<UserCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<UserCommand>() {
            Ok(command) => {
                if commands.send(command).is_err() || command == UserCommand::Quit {
                    return;
                }
            }
            Err(e) => tracing::warn!("{e}"),
        }
    }
    let _ = commands.send(UserCommand::Quit);
}

async fn quit_on_ctrl_c(commands: mpsc::UnboundedSender<UserCommand>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("interrupted, stopping");
        let _ = commands.send(UserCommand::Quit);
    }
}
