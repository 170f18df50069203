//! Headless bot for poking at a running server.
//!
//! Connects, sends a name, then steers its snake with random perpendicular
//! turns while logging what the server streams back.

use clap::Parser;
use log::{debug, info, warn};
use rand::Rng;
use shared::{
    encode_direction_command, Direction, LineBuffer, Startup, WorldUpdate, DEFAULT_PORT,
};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{interval, timeout};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{DEFAULT_PORT}"))]
    server: String,

    /// Display name sent during the handshake
    #[arg(short = 'n', long, default_value = "bot")]
    name: String,

    /// Milliseconds between turn attempts
    #[arg(short = 't', long, default_value = "500")]
    turn_every: u64,

    /// Stop after this many seconds
    #[arg(short = 'd', long, default_value = "30")]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);
    stream.write_all(format!("{}\n", args.name).as_bytes()).await?;

    let mut frames = LineBuffer::new();
    let mut pending: Vec<String> = Vec::new();
    let mut chunk = [0u8; 4096];

    while pending.len() < 3 {
        let n = timeout(Duration::from_secs(5), stream.read(&mut chunk)).await??;
        if n == 0 {
            warn!("Server closed the connection during the handshake");
            return Ok(());
        }
        pending.extend(frames.push(&chunk[..n])?);
    }
    let rest = pending.split_off(3);
    let startup = Startup::parse(&pending).ok_or("malformed startup reply")?;
    info!(
        "Playing as {} on a {}x{} board",
        startup.id, startup.width, startup.height
    );

    let mut heading: Option<Direction> = None;
    let mut lengths: HashMap<i32, usize> = HashMap::new();
    let mut food: HashSet<i32> = HashSet::new();
    let mut rng = rand::thread_rng();
    let mut turns = interval(Duration::from_millis(args.turn_every));
    let deadline = tokio::time::sleep(Duration::from_secs(args.duration));
    tokio::pin!(deadline);

    let mut handle = |line: &str, heading: &mut Option<Direction>| -> bool {
        match WorldUpdate::decode(line) {
            Ok(WorldUpdate::Snake(snake)) if snake.is_dead() => {
                lengths.remove(&snake.id);
                if snake.id == startup.id {
                    info!("Our snake died");
                    return false;
                }
            }
            Ok(WorldUpdate::Snake(snake)) => {
                if snake.id == startup.id {
                    *heading = snake.heading();
                }
                lengths.insert(snake.id, snake.cells().len());
            }
            Ok(WorldUpdate::Food(f)) if f.is_eaten() => {
                food.remove(&f.id);
            }
            Ok(WorldUpdate::Food(f)) => {
                food.insert(f.id);
            }
            Err(e) => debug!("Unreadable line {:?}: {}", line, e),
        }
        true
    };

    for line in &rest {
        if !handle(line, &mut heading) {
            return Ok(());
        }
    }

    loop {
        tokio::select! {
            read = stream.read(&mut chunk) => {
                let n = read?;
                if n == 0 {
                    info!("Server closed the connection");
                    break;
                }
                for line in frames.push(&chunk[..n])? {
                    if !handle(&line, &mut heading) {
                        return Ok(());
                    }
                }
            }
            _ = turns.tick() => {
                if let Some(current) = heading {
                    let turn = if rng.gen_bool(0.5) {
                        Direction::ALL[(current.code() as usize) % 4]
                    } else {
                        Direction::ALL[(current.code() as usize + 2) % 4]
                    };
                    debug!("Turning {:?} -> {:?}", current, turn);
                    stream.write_all(encode_direction_command(turn).as_bytes()).await?;
                }
            }
            _ = &mut deadline => {
                info!("Time is up");
                break;
            }
        }
    }

    info!(
        "{} snakes and {} food on the board at exit",
        lengths.len(),
        food.len()
    );
    Ok(())
}
