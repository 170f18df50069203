//! # Snake Server Library
//!
//! This library provides the authoritative server for a multiplayer grid
//! snake game. It owns the only copy of the board, advances every snake on a
//! fixed tick and streams the resulting snakes and food to all connected
//! clients as newline-delimited JSON.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every movement, collision, growth and death is decided here. Clients only
//! send a display name once and heading requests afterwards; they render
//! whatever the server reports.
//!
//! ### Connection Management
//! Handles the lifecycle of each TCP connection:
//! - Name handshake and snake placement
//! - Heading requests, validated against the snake's current axis
//! - Disconnection detection and registry cleanup
//!
//! ### State Broadcasting
//! After every tick all live snakes, newly dead snakes, active food and newly
//! eaten food are sent to every connection that finished the handshake.
//!
//! ## Architecture Design
//!
//! ### One World Lock
//! The game state sits behind a single async mutex. The tick loop, the food
//! loop and every connection's message handling take that lock, so the
//! board is always observed between whole operations.
//!
//! ### Per-Connection Queues
//! Each connection owns a bounded outbound channel drained by its own
//! writer task. Broadcasts only enqueue and no lock is ever held across
//! socket I/O. A client that falls a full queue behind is pruned.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Settings file loading and validation.
//!
//! ### World Module (`world`)
//! The cell grid, the snake and food maps, the scoreboard, placement of new
//! snakes and food, and recycling of dead bodies into food.
//!
//! ### Game Module (`game`)
//! The tick: movement, collisions, growth, death, the alternate multi-cell
//! game play and food spawn pacing.
//!
//! ### Session Module (`session`)
//! The per-connection protocol state machine.
//!
//! ### Client Manager Module (`client_manager`)
//! Registry of open connections and broadcast fan-out.
//!
//! ### Network Module (`network`)
//! TCP accept loop, reader and writer tasks, tick and food loops.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::Settings;
//! use server::network::{Server, ServerResult};
//!
//! #[tokio::main]
//! async fn main() -> ServerResult<()> {
//!     let settings = Settings::load("settings.json")?;
//!     let server = Server::new("0.0.0.0:11000", settings).await?;
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod session;
pub mod world;
