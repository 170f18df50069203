//! Server settings
//!
//! Settings come from an optional JSON file; every field left out falls back
//! to its default. Command line flags are applied on top by the binary.
//! Anything that fails to load or validate stops the server before the
//! simulation starts.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Smallest board that fits a freshly spawned snake plus the wall ring.
pub const MIN_BOARD_SIZE: i32 = 20;

/// Largest board side accepted, keeping the cell count well inside `i32`.
pub const MAX_BOARD_SIZE: i32 = 4096;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unable to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Settings {
    pub board_width: i32,
    pub board_height: i32,
    /// Milliseconds between simulation ticks
    #[serde(rename = "MSPerFrame")]
    pub ms_per_frame: u64,
    /// Food items kept on the board per live snake
    pub food_density: usize,
    /// Share of a dead snake's cells that turn into food
    pub snake_recycle_rate: f32,
    /// Eat up to three extra cells per tick after a food
    pub enable_alt_game_play: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            board_width: 150,
            board_height: 150,
            ms_per_frame: 33,
            food_density: 2,
            snake_recycle_rate: 0.5,
            enable_alt_game_play: false,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str, origin: &str) -> Result<Self, SettingsError> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|source| SettingsError::Parse {
                path: origin.to_string(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json(&json, &display)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        check_board_side("BoardWidth", self.board_width)?;
        check_board_side("BoardHeight", self.board_height)?;
        if self.ms_per_frame == 0 {
            return Err(SettingsError::Invalid {
                field: "MSPerFrame",
                reason: "must be positive".to_string(),
            });
        }
        if !self.snake_recycle_rate.is_finite() || !(0.0..=1.0).contains(&self.snake_recycle_rate)
        {
            return Err(SettingsError::Invalid {
                field: "SnakeRecycleRate",
                reason: format!("must be within 0..=1, got {}", self.snake_recycle_rate),
            });
        }
        Ok(())
    }

    /// Number of cells inside the wall ring.
    pub fn interior_cells(&self) -> usize {
        ((self.board_width - 2).max(0) * (self.board_height - 2).max(0)) as usize
    }
}

fn check_board_side(field: &'static str, value: i32) -> Result<(), SettingsError> {
    if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&value) {
        return Err(SettingsError::Invalid {
            field,
            reason: format!("must be within {MIN_BOARD_SIZE}..={MAX_BOARD_SIZE}, got {value}"),
        });
    }
    Ok(())
}
