use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DICTIONARY: &str = "data/dictionary.txt";

/// Everything the coordinator needs to start a game server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub seed: u64,
    /// Length of an active round.
    pub round_duration: Duration,
    /// Pre-round interval between two rounds.
    pub pause_duration: Duration,
    /// Pre-authored grids; random grids when absent.
    pub matrix_file: Option<PathBuf>,
    pub dictionary_file: Option<PathBuf>,
    pub max_players: usize,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn dictionary_path(&self) -> PathBuf {
        self.dictionary_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DICTIONARY))
    }
}

/// Parses a round length given in (possibly fractional) minutes.
pub fn parse_round_minutes(value: &str) -> Result<Duration, String> {
    let minutes: f64 = value.trim().parse().map_err(|e| format!("{}", e))?;
    if !(minutes.is_finite() && minutes > 0.0) {
        return Err("duration must be a positive number of minutes".to_string());
    }
    match Duration::try_from_secs_f64(minutes * 60.0) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        Ok(_) => Err("duration is too short".to_string()),
        Err(_) => Err(format!("duration of {} minutes is too long", minutes)),
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            seed: 0,
            round_duration: Duration::from_secs(180),
            pause_duration: Duration::from_secs(10),
            matrix_file: None,
            dictionary_file: None,
            max_players: 32,
        }
    }
}
