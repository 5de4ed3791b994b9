//! Application-level configuration loading: difficulty presets, hint timings and avatars.

use std::{collections::HashMap, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{
    board::BoardSettings,
    model::{Difficulty, DifficultyPreset},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PHASE_PUZZLE_CONFIG_PATH";

const DEFAULT_PRESET_AVATARS: [&str; 12] = [
    "elephant",
    "lion",
    "unicorn",
    "dragon",
    "owl",
    "fox",
    "panda",
    "penguin",
    "butterfly",
    "bee",
    "rocket",
    "star",
];

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    difficulties: HashMap<Difficulty, DifficultyPreset>,
    /// Delay before a broadcast hint is cleared from the session.
    pub hint_clear: Duration,
    /// How long the correct zone stays highlighted after repeated misses.
    pub hint_zone: Duration,
    /// How long a player engine survives without an open device stream.
    pub engine_idle_grace: Duration,
    /// Wrong drops of one card before its zone is highlighted.
    pub wrong_attempts_for_hint: u32,
    /// Rows returned by player leaderboard reads.
    pub leaderboard_limit: usize,
    /// Archived leaderboards listed to the facilitator.
    pub saved_leaderboards_limit: usize,
    preset_avatars: Vec<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        presets = app_config.difficulties.len(),
                        avatars = app_config.preset_avatars.len(),
                        "loaded game configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Timer and quote count for `difficulty`.
    pub fn preset(&self, difficulty: Difficulty) -> DifficultyPreset {
        self.difficulties
            .get(&difficulty)
            .copied()
            .unwrap_or_else(|| difficulty.default_preset())
    }

    /// Whether `id` names one of the configured preset avatars.
    pub fn is_preset_avatar(&self, id: &str) -> bool {
        self.preset_avatars.iter().any(|avatar| avatar == id)
    }

    /// Preset avatar ids offered at join.
    pub fn preset_avatars(&self) -> &[String] {
        &self.preset_avatars
    }

    /// Hint-zone settings handed to every new puzzle board.
    pub fn board_settings(&self) -> BoardSettings {
        BoardSettings {
            wrong_attempts_for_hint: self.wrong_attempts_for_hint,
            hint_zone_duration: self.hint_zone,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    difficulties: HashMap<Difficulty, RawPreset>,
    hint_clear_secs: Option<u64>,
    hint_zone_millis: Option<u64>,
    engine_idle_grace_secs: Option<u64>,
    wrong_attempts_for_hint: Option<u32>,
    leaderboard_limit: Option<usize>,
    saved_leaderboards_limit: Option<usize>,
    preset_avatars: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of one difficulty override.
struct RawPreset {
    timer_seconds: u32,
    quote_count: usize,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let difficulties = value
            .difficulties
            .into_iter()
            .map(|(level, preset)| {
                (
                    level,
                    DifficultyPreset {
                        timer_seconds: preset.timer_seconds,
                        quote_count: preset.quote_count,
                    },
                )
            })
            .collect();
        Self {
            difficulties,
            hint_clear: Duration::from_secs(value.hint_clear_secs.unwrap_or(10)),
            hint_zone: Duration::from_millis(value.hint_zone_millis.unwrap_or(3_000)),
            engine_idle_grace: Duration::from_secs(value.engine_idle_grace_secs.unwrap_or(30)),
            wrong_attempts_for_hint: value.wrong_attempts_for_hint.unwrap_or(2).max(1),
            leaderboard_limit: value.leaderboard_limit.unwrap_or(10),
            saved_leaderboards_limit: value.saved_leaderboards_limit.unwrap_or(20),
            preset_avatars: value.preset_avatars.unwrap_or_else(|| {
                DEFAULT_PRESET_AVATARS
                    .iter()
                    .map(|id| (*id).to_string())
                    .collect()
            }),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_built_in_presets() {
        let config = AppConfig::default();
        assert_eq!(config.preset(Difficulty::Hard).timer_seconds, 300);
        assert_eq!(config.preset(Difficulty::Easy).quote_count, 8);
        assert_eq!(config.hint_clear, Duration::from_secs(10));
        assert_eq!(config.engine_idle_grace, Duration::from_secs(30));
        assert_eq!(config.board_settings(), BoardSettings::default());
        assert!(config.is_preset_avatar("owl"));
        assert!(!config.is_preset_avatar("kraken"));
    }

    #[test]
    fn partial_file_overrides_only_listed_keys() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "difficulties": { "medium": { "timer_seconds": 420, "quote_count": 12 } },
                 "hint_clear_secs": 4 }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(
            config.preset(Difficulty::Medium),
            DifficultyPreset {
                timer_seconds: 420,
                quote_count: 12
            }
        );
        assert_eq!(config.preset(Difficulty::Hard).quote_count, 24);
        assert_eq!(config.hint_clear, Duration::from_secs(4));
        assert_eq!(config.leaderboard_limit, 10);
    }
}
