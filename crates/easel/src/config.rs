//! Server configuration: defaults, JSON file loading, validation.
//!
//! Every knob lives here so operators can tune the game without a
//! rebuild. A missing or unreadable config file falls back to defaults
//! with a warning; an *invalid* config is a hard error — silently
//! "fixing" a bad value would hide operator mistakes.
//!
//! Durations are plain seconds in the file (`"pong_wait": 60`).

use std::path::Path;
use std::time::Duration;

use easel_game::{PointsConfig, RoomSettings};
use easel_hub::Liveness;
use serde::{Deserialize, Serialize};

/// The configuration failed validation.
#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// The full configuration tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub websocket: WebSocketConfig,
    pub game: GameConfig,
    pub points: PointsConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    pub word_bank: WordBankConfig,
}

/// HTTP front-door settings. The timeouts are consumed by the external
/// HTTP layer; the core only validates and passes them through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Seconds.
    pub read_timeout: u64,
    /// Seconds.
    pub write_timeout: u64,
    /// Seconds.
    pub idle_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            read_timeout: 15,
            write_timeout: 15,
            idle_timeout: 60,
        }
    }
}

/// WebSocket transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    /// Maximum inbound frame size in bytes.
    pub max_message_size: usize,
    /// Seconds without traffic (or a pong) before a connection dies.
    pub pong_wait: u64,
    /// Seconds between pings. Must be shorter than `pong_wait`.
    pub ping_period: u64,
    /// Seconds allowed per outbound write.
    pub write_wait: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024,
            write_buffer_size: 1024,
            max_message_size: 512,
            pong_wait: 60,
            ping_period: 54,
            write_wait: 10,
        }
    }
}

/// Game rules and room housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub max_players_per_room: usize,
    pub min_players_to_start: usize,
    /// Seconds.
    pub round_duration: u64,
    pub max_rounds: u32,
    /// Seconds between room cleanup sweeps.
    pub room_cleanup_interval: u64,
    /// Seconds of inactivity before a room is deleted.
    pub inactive_room_timeout: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players_per_room: 8,
            min_players_to_start: 2,
            round_duration: 60,
            max_rounds: 5,
            room_cleanup_interval: 5 * 60,
            inactive_room_timeout: 30 * 60,
        }
    }
}

/// Token-bucket limits for the HTTP front door.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_size: 10,
        }
    }
}

/// CORS settings for the HTTP front door.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".into()],
            allowed_methods: vec![
                "GET".into(),
                "POST".into(),
                "PUT".into(),
                "DELETE".into(),
                "OPTIONS".into(),
            ],
            allowed_headers: vec![
                "Origin".into(),
                "Content-Type".into(),
                "Accept".into(),
                "Authorization".into(),
            ],
        }
    }
}

/// Word-list file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WordBankConfig {
    pub easy_words_file: String,
    pub medium_words_file: String,
    pub hard_words_file: String,
}

impl Default for WordBankConfig {
    fn default() -> Self {
        Self {
            easy_words_file: "data/words.json".into(),
            medium_words_file: "data/words.json".into(),
            hard_words_file: "data/words.json".into(),
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file.
    ///
    /// A missing or unparsable file logs a warning and yields defaults;
    /// a file that parses but fails validation is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = match std::fs::read(path) {
            Ok(data) => match serde_json::from_slice::<Self>(&data) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "config file unparsable, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config file unreadable, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every cross-field and range constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game.max_players_per_room < 2 {
            return Err(ConfigError("max players per room must be at least 2".into()));
        }
        if self.game.min_players_to_start < 2 {
            return Err(ConfigError("min players to start must be at least 2".into()));
        }
        if self.game.min_players_to_start > self.game.max_players_per_room {
            return Err(ConfigError(
                "min players to start cannot exceed max players per room".into(),
            ));
        }
        if self.game.round_duration == 0 {
            return Err(ConfigError("round duration must be positive".into()));
        }
        if self.game.max_rounds == 0 {
            return Err(ConfigError("max rounds must be positive".into()));
        }
        if self.points.base_guess_points == 0 {
            return Err(ConfigError("base guess points must be positive".into()));
        }
        if self.websocket.read_buffer_size == 0 || self.websocket.write_buffer_size == 0 {
            return Err(ConfigError("websocket buffer sizes must be positive".into()));
        }
        if self.websocket.max_message_size == 0 {
            return Err(ConfigError("websocket max message size must be positive".into()));
        }
        if self.websocket.ping_period >= self.websocket.pong_wait {
            return Err(ConfigError("ping period must be shorter than pong wait".into()));
        }
        if self.rate_limit.requests_per_minute == 0 || self.rate_limit.burst_size == 0 {
            return Err(ConfigError("rate limit values must be positive".into()));
        }
        Ok(())
    }

    /// Connection heartbeat settings derived from the websocket section.
    pub fn liveness(&self) -> Liveness {
        Liveness {
            pong_wait: Duration::from_secs(self.websocket.pong_wait),
            ping_period: Duration::from_secs(self.websocket.ping_period),
            write_wait: Duration::from_secs(self.websocket.write_wait),
        }
    }

    pub fn room_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.game.room_cleanup_interval)
    }

    pub fn inactive_room_timeout(&self) -> Duration {
        Duration::from_secs(self.game.inactive_room_timeout)
    }

    /// Settings used when a room is created without explicit options
    /// (matchmaking's auto-created lobbies).
    pub fn default_room_settings(&self) -> RoomSettings {
        RoomSettings {
            max_players: self.game.max_players_per_room,
            min_players: self.game.min_players_to_start,
            round_seconds: self.game.round_duration,
            max_rounds: self.game.max_rounds,
            ..RoomSettings::default()
        }
    }

    /// The word-list files, deduplicated (the default points all three
    /// difficulties at one file).
    pub fn word_files(&self) -> Vec<&str> {
        let mut files = vec![
            self.word_bank.easy_words_file.as_str(),
            self.word_bank.medium_words_file.as_str(),
            self.word_bank.hard_words_file.as_str(),
        ];
        files.dedup();
        files.sort_unstable();
        files.dedup();
        files
    }
}
