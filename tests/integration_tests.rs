//! Integration tests for the snake server
//!
//! These tests validate cross-component interactions and real TCP behavior.

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::Settings;
use server::game::GameState;
use server::network::Server;
use server::world::{IdAllocator, Occupant, World};
use shared::{
    encode_direction_command, Food, LineBuffer, Point, Snake, Startup, WorldUpdate, NO_OCCUPANT,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

type ServerLines = Lines<BufReader<OwnedReadHalf>>;

async fn start_server(settings: Settings) -> (SocketAddr, Arc<Mutex<GameState>>) {
    let server = Server::new("127.0.0.1:0", settings)
        .await
        .expect("Failed to bind test server");
    let addr = server.local_addr().unwrap();
    let game = server.game();
    tokio::spawn(server.run());
    (addr, game)
}

async fn read_line(lines: &mut ServerLines) -> String {
    timeout(Duration::from_secs(5), lines.next_line())
        .await
        .expect("Timed out waiting for the server")
        .expect("Read failed")
        .expect("Server closed the connection")
}

async fn join(addr: SocketAddr, name: &str) -> (ServerLines, OwnedWriteHalf, Startup) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    write_half
        .write_all(format!("{name}\n").as_bytes())
        .await
        .unwrap();

    let mut startup = Vec::new();
    for _ in 0..3 {
        startup.push(read_line(&mut lines).await);
    }
    let startup = Startup::parse(&startup).expect("Malformed startup reply");
    (lines, write_half, startup)
}

/// Reads broadcast lines until one describes the given live snake.
async fn next_snake(lines: &mut ServerLines, id: i32) -> Snake {
    loop {
        let line = read_line(lines).await;
        if let Ok(WorldUpdate::Snake(snake)) = WorldUpdate::decode(&line) {
            if snake.id == id && !snake.is_dead() {
                return snake;
            }
        }
    }
}

/// WORLD MODEL SCENARIOS
mod world_scenario_tests {
    use super::*;

    /// Food and a fresh snake claim exactly their cells
    #[test]
    fn food_and_snake_occupy_cells() {
        let mut world = World::new(150, 150);
        world.apply_food_update(Food::new(1, Point::new(1, 2)));
        world.apply_snake_update(Snake::new(2, "Dummy", Point::new(2, 2), Point::new(2, 1)));

        assert_eq!(world.cell(Point::new(1, 2)).unwrap().id(), 1);
        assert_eq!(world.cell(Point::new(2, 1)).unwrap().id(), 2);
        assert_eq!(world.cell(Point::new(2, 2)).unwrap().id(), 2);
        assert_eq!(world.claimed_cells(), 3);
    }

    /// A move claims the new head and releases the old tail
    #[test]
    fn snake_move_releases_tail() {
        let mut world = World::new(150, 150);
        world.apply_snake_update(Snake::new(2, "Dummy", Point::new(2, 2), Point::new(2, 1)));
        world.apply_snake_update(Snake::new(2, "Dummy", Point::new(3, 2), Point::new(2, 2)));

        assert_eq!(world.cell(Point::new(3, 2)).unwrap().id(), 2);
        assert_eq!(world.cell(Point::new(2, 2)).unwrap().id(), 2);
        assert_eq!(world.cell(Point::new(2, 1)).unwrap().id(), NO_OCCUPANT);
        assert_eq!(world.cells_with(Occupant::Snake(2)).len(), 2);
    }

    /// Growing onto food and then eating it bumps the score by one
    #[test]
    fn snake_eats_food() {
        let mut world = World::new(150, 150);
        world.apply_food_update(Food::new(1, Point::new(11, 11)));
        world.apply_snake_update(Snake::new(1, "Solid", Point::new(10, 11), Point::new(9, 11)));
        let before = world.score(1).unwrap();

        world.apply_snake_update(Snake::new(1, "Solid", Point::new(11, 11), Point::new(9, 11)));
        world.apply_food_update(Food::eaten(1));

        assert_eq!(world.food().len(), 0);
        assert_eq!(world.score(1), Some(before + 1));
    }

    /// Dead snakes leave food behind and free every cell they held
    #[test]
    fn death_turns_body_into_food() {
        let mut game = GameState::with_rng(Settings::default(), StdRng::seed_from_u64(5));
        game.world
            .apply_snake_update(Snake::new(0, "doomed", Point::new(1, 40), Point::new(10, 40)));

        let report = game.tick();

        assert_eq!(report.dead.len(), 1);
        assert!(game.world.snakes().is_empty());
        // 10 cells at the default 0.5 rate
        assert_eq!(game.world.food().len(), 5);
        assert_eq!(game.world.claimed_cells(), 5);
        assert!(game
            .world
            .food()
            .values()
            .all(|food| food.loc.y == 40 && (1..=10).contains(&food.loc.x)));
    }

    /// Food never spawns beyond the density target
    #[test]
    fn food_spawn_respects_density() {
        let settings = Settings {
            food_density: 3,
            ..Settings::default()
        };
        let mut game = GameState::with_rng(settings, StdRng::seed_from_u64(5));
        game.add_player("a");
        game.add_player("b");

        let spawned = (0..20).filter_map(|_| game.spawn_food()).count();
        assert_eq!(spawned, 6);
        assert_eq!(game.world.food().len(), 6);
    }

    /// Ids are shared between players and food
    #[test]
    fn ids_are_never_reused_across_kinds() {
        let mut world = World::new(60, 60);
        let mut ids = IdAllocator::new();
        let mut rng = StdRng::seed_from_u64(5);

        let snake_id = ids.next_id();
        world.place_new_snake(snake_id, "a", &mut rng).unwrap();
        let food = world.spawn_random_food(&mut ids, &mut rng).unwrap();

        assert_ne!(food.id, snake_id);
        assert_eq!(ids.peek(), food.id + 1);
    }
}

/// PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// A handshake reply split across reads is reassembled
    #[test]
    fn startup_reply_across_reads() {
        let mut frames = LineBuffer::new();
        let mut messages = Vec::new();
        for chunk in [&b"0\n15"[..], b"0\n1", b"50\n"] {
            messages.extend(frames.push(chunk).unwrap());
        }

        assert_eq!(
            Startup::parse(&messages),
            Some(Startup {
                id: 0,
                width: 150,
                height: 150
            })
        );
    }

    /// Lines rendered from a tick decode back into the same records
    #[test]
    fn tick_report_decodes_line_by_line() {
        let mut game = GameState::with_rng(Settings::default(), StdRng::seed_from_u64(9));
        game.add_player("Alice");
        game.spawn_food();
        let report = game.tick();
        let wire = report.to_wire().unwrap();

        let decoded: Vec<WorldUpdate> = wire
            .lines()
            .map(|line| WorldUpdate::decode(line).unwrap())
            .collect();

        assert_eq!(decoded.len(), 2);
        match &decoded[0] {
            WorldUpdate::Snake(snake) => {
                assert_eq!(snake.id, report.snakes[0].id);
                assert_eq!(snake.vertices, report.snakes[0].vertices);
            }
            other => panic!("Expected a snake first, got {other:?}"),
        }
        assert_eq!(decoded[1], WorldUpdate::Food(report.food[0].clone()));

        let raw: serde_json::Value = serde_json::from_str(wire.lines().next().unwrap()).unwrap();
        assert_eq!(raw["ID"], 0);
        assert_eq!(raw["name"], "Alice");
        assert!(raw.get("length").is_none());
    }
}

/// CLIENT-SERVER INTEGRATION TESTS
mod client_server_tests {
    use super::*;

    /// The first player is id 0 and learns the board size
    #[tokio::test]
    async fn handshake_assigns_first_id() {
        let (addr, game) = start_server(Settings::default()).await;

        let (_lines, _writer, startup) = join(addr, "Alice").await;

        assert_eq!(
            startup,
            Startup {
                id: 0,
                width: 150,
                height: 150
            }
        );
        let game = game.lock().await;
        assert_eq!(game.world.snake(0).unwrap().name, "Alice");
    }

    /// A name trickling in over several writes still completes the handshake
    #[tokio::test]
    async fn handshake_across_partial_writes() {
        let (addr, _game) = start_server(Settings::default()).await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        write_half.write_all(b"Al").await.unwrap();
        write_half.flush().await.unwrap();
        sleep(Duration::from_millis(50)).await;
        write_half.write_all(b"ice\r\n").await.unwrap();

        assert_eq!(read_line(&mut lines).await, "0");
        assert_eq!(read_line(&mut lines).await, "150");
        assert_eq!(read_line(&mut lines).await, "150");
    }

    /// Players joining one after another get consecutive ids
    #[tokio::test]
    async fn second_player_gets_next_id() {
        let (addr, _game) = start_server(Settings::default()).await;

        let (_l1, _w1, first) = join(addr, "Alice").await;
        let (_l2, _w2, second) = join(addr, "Bob").await;

        assert_eq!(first.id, 0);
        assert_eq!(second.id, 1);
    }

    /// Every tick streams the player's own snake back
    #[tokio::test]
    async fn broadcast_contains_own_snake() {
        let (addr, _game) = start_server(Settings::default()).await;
        let (mut lines, _writer, startup) = join(addr, "Alice").await;

        let snake = next_snake(&mut lines, startup.id).await;

        assert_eq!(snake.name, "Alice");
        assert!(snake.vertices.len() >= 2);
    }

    /// A direction command turns the snake on a following tick
    #[tokio::test]
    async fn direction_command_turns_snake() {
        let (addr, game) = start_server(Settings::default()).await;
        let (_lines, mut writer, startup) = join(addr, "Alice").await;

        let current = game.lock().await.world.heading(startup.id).unwrap();
        let turn = shared::Direction::ALL
            .into_iter()
            .find(|d| !d.is_parallel(current))
            .unwrap();
        writer
            .write_all(encode_direction_command(turn).as_bytes())
            .await
            .unwrap();

        let turned = timeout(Duration::from_secs(5), async {
            loop {
                if game.lock().await.world.heading(startup.id) == Some(turn) {
                    break;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert_ok!(turned);
    }

    /// Garbage after the handshake is ignored and the stream keeps flowing
    #[tokio::test]
    async fn malformed_commands_keep_connection() {
        let (addr, _game) = start_server(Settings::default()).await;
        let (mut lines, mut writer, startup) = join(addr, "Alice").await;

        writer
            .write_all(b"hello\n(9)\n(\n\n(abc)\n")
            .await
            .unwrap();

        let snake = next_snake(&mut lines, startup.id).await;
        assert_eq!(snake.id, startup.id);
    }

    /// Connections that never send a name get no world updates
    #[tokio::test]
    async fn unnamed_connection_gets_no_broadcast() {
        let (addr, game) = start_server(Settings::default()).await;
        let (_l, _w, _startup) = join(addr, "Alice").await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut lines = BufReader::new(stream).lines();

        let waited = timeout(Duration::from_millis(300), lines.next_line()).await;
        assert_err!(waited);
        assert_eq!(game.lock().await.world.snakes().len(), 1);
    }
}

/// STRESS AND ERROR HANDLING TESTS
mod stress_tests {
    use super::*;
    use std::collections::HashSet;

    /// Many concurrent handshakes all get distinct ids
    #[tokio::test]
    async fn concurrent_handshakes() {
        let (addr, game) = start_server(Settings::default()).await;

        let handles: Vec<_> = (0..20)
            .map(|n| tokio::spawn(async move { join(addr, &format!("p{n}")).await.2.id }))
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }

        // Food shares the id counter, so only distinctness is guaranteed
        assert_eq!(ids.len(), 20);
        assert!(ids.iter().all(|id| *id >= 0));
        assert!(game.lock().await.world.snakes().len() <= 20);
    }

    /// A client vanishing mid-stream does not disturb the others
    #[tokio::test]
    async fn abrupt_disconnect_is_harmless() {
        let (addr, _game) = start_server(Settings::default()).await;
        let (mut lines, _writer, startup) = join(addr, "stays").await;

        let (gone_lines, gone_writer, _) = join(addr, "leaves").await;
        drop(gone_lines);
        drop(gone_writer);

        for _ in 0..3 {
            next_snake(&mut lines, startup.id).await;
        }
    }

    /// An endless unterminated message gets the connection dropped
    #[tokio::test]
    async fn oversized_message_closes_connection() {
        let (addr, _game) = start_server(Settings::default()).await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let flood = vec![b'x'; 70 * 1024];
        // The server may hang up before the whole flood is written
        let _ = write_half.write_all(&flood).await;

        let closed = timeout(Duration::from_secs(5), lines.next_line())
            .await
            .expect("Server kept the connection open");
        assert!(matches!(closed, Ok(None) | Err(_)));
    }
}
