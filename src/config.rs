use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::ai::CpuDifficulty;
use crate::game::GameMode;

/// 各个延时（毫秒）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Timings {
    /// 配对成功的两张牌停留多久再结算。
    pub match_reveal_ms: u32,
    pub mismatch_reveal_ms: u32,
    /// 轮到电脑后、开始思考前的固定等待。
    pub cpu_turn_delay_ms: u32,
    /// 电脑两次翻牌之间的间隔。
    pub cpu_flip_gap_ms: u32,
    pub game_over_delay_ms: u32,
    pub peer_poll_ms: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            match_reveal_ms: 1000,
            mismatch_reveal_ms: 1500,
            cpu_turn_delay_ms: 1000,
            cpu_flip_gap_ms: 1000,
            game_over_delay_ms: 500,
            peer_poll_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    pub pair_count: usize,
    #[serde(with = "mode_name")]
    pub mode: GameMode,
    pub difficulty: CpuDifficulty,
    pub timings: Timings,
    pub join_timeout_ms: u64,
    pub log_level: String,
    /// 固定种子用于复现牌局，缺省时取系统熵。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            pair_count: 6,
            mode: GameMode::SinglePlayer,
            difficulty: CpuDifficulty::default(),
            timings: Timings::default(),
            join_timeout_ms: 12_000,
            log_level: "info".to_string(),
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, String> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| format!("invalid game config: {}", e))
    }

    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

/// 配置里的模式写成界面上的字符串（`singlePlayer` / `twoPlayer` / `online`）。
mod mode_name {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::game::GameMode;

    pub fn serialize<S: Serializer>(mode: &GameMode, serializer: S) -> Result<S::Ok, S::Error> {
        let name = match mode {
            GameMode::SinglePlayer => "singlePlayer",
            GameMode::TwoPlayer => "twoPlayer",
            GameMode::Online { .. } => "online",
        };
        serializer.serialize_str(name)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<GameMode, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| D::Error::custom(format!("unknown game mode \"{name}\"")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = GameConfig::from_json("{}").expect("config");
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.pair_count, 6);
        assert_eq!(config.timings.mismatch_reveal_ms, 1500);
        assert_eq!(GameConfig::from_json("  ").expect("config"), GameConfig::default());
    }

    #[test]
    fn partial_json_overrides_fields() {
        let config = GameConfig::from_json(
            r#"{"pairCount": 10, "mode": "twoPlayer", "difficulty": "expert",
                "timings": {"matchRevealMs": 200}, "logLevel": "debug", "seed": 9}"#,
        )
        .expect("config");

        assert_eq!(config.pair_count, 10);
        assert_eq!(config.mode, GameMode::TwoPlayer);
        assert_eq!(config.difficulty, CpuDifficulty::Impossible);
        assert_eq!(config.timings.match_reveal_ms, 200);
        assert_eq!(config.timings.mismatch_reveal_ms, 1500);
        assert_eq!(config.level_filter(), LevelFilter::Debug);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn unknown_mode_is_an_error() {
        assert!(GameConfig::from_json(r#"{"mode": "arcade"}"#).is_err());
        let bad_level = GameConfig {
            log_level: "chatty".into(),
            ..GameConfig::default()
        };
        assert_eq!(bad_level.level_filter(), LevelFilter::Info);
    }
}
