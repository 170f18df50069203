//! Types shared by the snake server and its clients: grid geometry, the snake
//! and food records, newline framing and the message codecs.

pub mod entities;
pub mod framing;
pub mod geometry;
pub mod protocol;

pub use entities::{Color, Food, Snake};
pub use framing::{FrameError, LineBuffer};
pub use geometry::{Direction, Point, SENTINEL};
pub use protocol::{
    encode_direction_command, encode_line, parse_direction_command, Startup, WorldUpdate,
};

/// Well-known listening port of the server.
pub const DEFAULT_PORT: u16 = 11000;

/// Occupant id reported for an empty cell.
pub const NO_OCCUPANT: i32 = -1;
