//! Logical messages of the line protocol.
//!
//! Handshake: the client sends its display name, the server answers with the
//! assigned id and the board size, one integer per line. Afterwards the
//! client sends `(<heading code>)` lines and the server streams one JSON
//! record per line for every snake and food it wants the client to know about.

use crate::entities::{Food, Snake};
use crate::geometry::Direction;
use serde::{Deserialize, Serialize};

/// Server reply to the name message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Startup {
    pub id: i32,
    pub width: i32,
    pub height: i32,
}

impl Startup {
    pub fn encode(&self) -> String {
        format!("{}\n{}\n{}\n", self.id, self.width, self.height)
    }

    /// Rebuilds the reply from its first three messages.
    pub fn parse(messages: &[String]) -> Option<Startup> {
        let [id, width, height] = messages else {
            return None;
        };
        Some(Startup {
            id: id.trim().parse().ok()?,
            width: width.trim().parse().ok()?,
            height: height.trim().parse().ok()?,
        })
    }
}

/// Extracts the heading from a `(<code>)` command. Text around the
/// parentheses is tolerated; anything unparseable yields `None`.
pub fn parse_direction_command(message: &str) -> Option<Direction> {
    let open = message.find('(')?;
    let close = message[open + 1..].find(')')? + open + 1;
    let code: i32 = message[open + 1..close].trim().parse().ok()?;
    Direction::from_code(code)
}

pub fn encode_direction_command(direction: Direction) -> String {
    format!("({})\n", direction.code())
}

/// A steady-state record received from the server. Snake records are told
/// apart from food records by their `vertices` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorldUpdate {
    Snake(Snake),
    Food(Food),
}

impl WorldUpdate {
    pub fn decode(message: &str) -> Result<WorldUpdate, serde_json::Error> {
        serde_json::from_str(message)
    }
}

/// Serializes a record as one newline-terminated message.
pub fn encode_line<T: Serialize>(record: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}
