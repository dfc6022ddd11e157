//! Player configuration
//!
//! A `PlayerConfig` is read from an optional JSON file and then patched with
//! command-line overrides by the binary. Missing keys fall back to defaults,
//! so `{}` is a valid configuration for player 1 of the home team.

use crate::error::ConfigError;
use serde::Deserialize;
use shared::{
    Point, TeamSide, FIELD_WIDTH, MAX_PLAYER_NUMBER, MIN_PLAYER_NUMBER, PLAYER_SIZE,
};
use std::fmt;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Arena address, `host:port`
    pub server_address: String,
    pub team_side: TeamSide,
    pub number: u32,
    /// Derived from the player number when absent
    pub initial_position: Option<Point>,
    pub timing: TimingConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:8080".to_string(),
            team_side: TeamSide::Home,
            number: MIN_PLAYER_NUMBER,
            initial_position: None,
            timing: TimingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Per-turn decision budget; no deadline when unset
    pub turn_deadline_ms: Option<u64>,
    pub ack_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    /// Server silence after which the session is considered over
    pub server_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            turn_deadline_ms: None,
            ack_timeout_ms: 500,
            handshake_timeout_ms: 3_000,
            server_timeout_ms: 10_000,
            shutdown_timeout_ms: 2_000,
        }
    }
}

impl TimingConfig {
    pub fn turn_deadline(&self) -> Option<Duration> {
        self.turn_deadline_ms.map(Duration::from_millis)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_millis(self.server_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("turn_deadline_ms", self.turn_deadline_ms.unwrap_or(1)),
            ("ack_timeout_ms", self.ack_timeout_ms),
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("server_timeout_ms", self.server_timeout_ms),
            ("shutdown_timeout_ms", self.shutdown_timeout_ms),
        ];

        match required.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(ConfigError::ZeroTimeout(*name)),
            None => Ok(()),
        }
    }
}

/// Who this client plays as. Sent in the handshake and handed to policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub team_side: TeamSide,
    pub number: u32,
    pub initial_position: Point,
}

/// Short tag such as `away-7`, used to tell player processes apart in logs
impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.team_side, self.number)
    }
}

impl PlayerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Lines players up a quarter into their own half, spaced by number.
    pub fn starting_position(&self) -> Point {
        if let Some(position) = self.initial_position {
            return position;
        }

        let x = FIELD_WIDTH / 4;
        let y = self.number as i32 * PLAYER_SIZE * 2;

        match self.team_side {
            TeamSide::Home => Point::new(x, y),
            TeamSide::Away => Point::new(FIELD_WIDTH - x, y),
        }
    }

    pub fn identity(&self) -> PlayerIdentity {
        PlayerIdentity {
            team_side: self.team_side,
            number: self.number,
            initial_position: self.starting_position(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_PLAYER_NUMBER..=MAX_PLAYER_NUMBER).contains(&self.number) {
            return Err(ConfigError::InvalidNumber(self.number));
        }

        let position = self.starting_position();
        if !position.is_inside_field() {
            return Err(ConfigError::InvalidPosition(position));
        }

        self.timing.validate()
    }
}
