use clap::Parser;
use log::{error, info};
use server::config::Settings;
use server::network::{Server, ServerResult};
use shared::DEFAULT_PORT;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON settings file; missing fields keep their defaults
    #[arg(short = 's', long)]
    settings: Option<PathBuf>,

    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Override the board width
    #[arg(long)]
    width: Option<i32>,

    /// Override the board height
    #[arg(long)]
    height: Option<i32>,

    /// Override the milliseconds per tick
    #[arg(long)]
    ms_per_frame: Option<u64>,

    /// Override the food kept per snake
    #[arg(long)]
    food_density: Option<usize>,

    /// Override the share of a dead snake turned into food
    #[arg(long)]
    recycle_rate: Option<f32>,

    /// Turn on the multi-cell growth after eating
    #[arg(long)]
    alt_game_play: bool,
}

impl Args {
    fn settings(&self) -> ServerResult<Settings> {
        let mut settings = match &self.settings {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if let Some(width) = self.width {
            settings.board_width = width;
        }
        if let Some(height) = self.height {
            settings.board_height = height;
        }
        if let Some(ms) = self.ms_per_frame {
            settings.ms_per_frame = ms;
        }
        if let Some(density) = self.food_density {
            settings.food_density = density;
        }
        if let Some(rate) = self.recycle_rate {
            settings.snake_recycle_rate = rate;
        }
        if self.alt_game_play {
            settings.enable_alt_game_play = true;
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> ServerResult<()> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let settings = match args.settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Refusing to start: {}", e);
            return Err(e);
        }
    };

    info!(
        "Board {}x{}, {} ms per tick, food density {}, recycle rate {}, alternate game play {}",
        settings.board_width,
        settings.board_height,
        settings.ms_per_frame,
        settings.food_density,
        settings.snake_recycle_rate,
        if settings.enable_alt_game_play { "on" } else { "off" }
    );

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, settings).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
