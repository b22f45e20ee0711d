//! 对局核心：卡池、棋盘状态、翻牌规则与计时。

pub mod catalog;
pub mod rules;
pub mod state;
pub mod timer;

pub use catalog::{CatalogEntry, CATALOG_SIZE};
pub use rules::{checked_pair_count, clamp_pair_count, MatchEngine, RuleError};
pub use state::{
    Board,
    Card,
    FlipOrigin,
    GameEvent,
    GameMode,
    GamePhase,
    GameState,
    Outcome,
    PeerRole,
    PlayerSlot,
    PokemonId,
    Position,
    Scores,
};
pub use timer::{format_elapsed, GameClock};
