use clap::Parser;
use client::config::PlayerConfig;
use client::connection;
use client::policy::ChaseAndShoot;
use client::supervisor::{self, ShutdownPath};
use log::info;
use shared::TeamSide;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file; defaults are used when omitted
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Server address to connect to
    #[arg(short = 's', long)]
    server: Option<String>,

    /// Team side to play for (home or away)
    #[arg(short = 't', long)]
    team: Option<TeamSide>,

    /// Shirt number, 1 to 11
    #[arg(short = 'n', long)]
    number: Option<u32>,

    /// Per-turn decision deadline in milliseconds
    #[arg(short = 'd', long)]
    turn_deadline_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<PlayerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => PlayerConfig::load(path)?,
            None => PlayerConfig::default(),
        };

        if let Some(server) = self.server {
            config.server_address = server;
        }
        if let Some(team) = self.team {
            config.team_side = team;
        }
        if let Some(number) = self.number {
            config.number = number;
        }
        if let Some(deadline) = self.turn_deadline_ms {
            config.timing.turn_deadline_ms = Some(deadline);
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config()?;

    let player = config.identity().to_string();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(move |buf, record| {
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                buf.timestamp(),
                record.level(),
                player,
                record.args()
            )
        })
        .init();
    let shutdown_timeout = config.timing.shutdown_timeout();

    // Blocking-pool work still running at exit is abandoned after the shutdown timeout
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run(config));
    runtime.shutdown_timeout(shutdown_timeout);
    result
}

async fn run(config: PlayerConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Starting player {} of the {} team against {}",
        config.number, config.team_side, config.server_address
    );

    let (done, mut session) = connection::connect(&config).await?;
    session.on_new_turn(ChaseAndShoot::new(session.identity()))?;

    let path = supervisor::supervise(
        session,
        done,
        supervisor::ctrl_c(),
        config.timing.shutdown_timeout(),
    )
    .await;

    if path == ShutdownPath::SessionEnded {
        info!("Match over");
    }
    Ok(())
}
