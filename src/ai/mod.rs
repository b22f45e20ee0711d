//! 电脑对手：记忆模型与按难度的走法选择。

pub mod memory;
pub mod opponent;

pub use memory::CpuMemory;
pub use opponent::{
    CpuDifficulty, CpuMove, CpuOpponent, CpuProfile, CpuStats, MoveKind, ThinkingTime,
};
