use std::str::FromStr;

use log::debug;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::memory::CpuMemory;
use crate::game::{Board, PokemonId, Position};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CpuDifficulty {
    Easy,
    #[default]
    #[serde(alias = "normal")]
    Medium,
    Hard,
    #[serde(alias = "expert")]
    Impossible,
}

impl FromStr for CpuDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(CpuDifficulty::Easy),
            "medium" | "normal" => Ok(CpuDifficulty::Medium),
            "hard" => Ok(CpuDifficulty::Hard),
            "impossible" | "expert" => Ok(CpuDifficulty::Impossible),
            _ => Err(()),
        }
    }
}

/// 思考时间区间（毫秒，闭区间）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingTime {
    pub min_ms: u32,
    pub max_ms: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CpuProfile {
    /// 看到一张牌后记住它的概率。
    pub memory_retention: f64,
    /// 每步选择“聪明走法”的概率。
    pub smart_move_rate: f64,
    pub thinking_time: ThinkingTime,
}

impl CpuProfile {
    pub fn from_difficulty(difficulty: CpuDifficulty) -> Self {
        let (memory_retention, smart_move_rate, min_ms, max_ms) = match difficulty {
            CpuDifficulty::Easy => (0.3, 0.4, 1000, 2000),
            CpuDifficulty::Medium => (0.6, 0.7, 800, 1500),
            CpuDifficulty::Hard => (0.85, 0.9, 600, 1200),
            CpuDifficulty::Impossible => (1.0, 1.0, 500, 1000),
        };
        Self {
            memory_retention,
            smart_move_rate,
            thinking_time: ThinkingTime { min_ms, max_ms },
        }
    }
}

impl Default for CpuProfile {
    fn default() -> Self {
        CpuProfile::from_difficulty(CpuDifficulty::default())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MoveKind {
    /// 两张都来自记忆。
    KnownPair,
    /// 随机翻第一张，记忆里有它的另一半。
    PartialKnown,
    SemiRandom,
    Random,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CpuMove {
    pub first: Position,
    pub second: Position,
    pub kind: MoveKind,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    pub moves_made: u32,
    pub smart_moves: u32,
    pub pairs_found: u32,
    pub smart_move_percentage: u32,
}

/// 单人模式中的电脑对手：带遗忘的记忆 + 按难度掷骰的走法选择。
pub struct CpuOpponent {
    profile: CpuProfile,
    memory: CpuMemory,
    moves_made: u32,
    smart_moves: u32,
    pairs_found: u32,
    rng: SmallRng,
}

impl CpuOpponent {
    pub fn new(profile: CpuProfile) -> Self {
        Self::with_rng(profile, SmallRng::from_entropy())
    }

    pub fn with_seed(profile: CpuProfile, seed: u64) -> Self {
        Self::with_rng(profile, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(profile: CpuProfile, rng: SmallRng) -> Self {
        Self {
            profile,
            memory: CpuMemory::new(),
            moves_made: 0,
            smart_moves: 0,
            pairs_found: 0,
            rng,
        }
    }

    pub fn profile(&self) -> &CpuProfile {
        &self.profile
    }

    pub fn set_profile(&mut self, profile: CpuProfile) {
        self.profile = profile;
    }

    pub fn memory(&self) -> &CpuMemory {
        &self.memory
    }

    /// 以 `memory_retention` 的概率记住这张牌，返回是否真的记下了。
    pub fn observe(&mut self, pokemon_id: PokemonId, position: Position) -> bool {
        let retention = self.profile.memory_retention.clamp(0.0, 1.0);
        if !self.rng.gen_bool(retention) {
            return false;
        }
        self.memory.record(pokemon_id, position)
    }

    pub fn forget(&mut self, pokemon_id: PokemonId) {
        self.memory.forget(pokemon_id);
    }

    pub fn choose_move(&mut self, board: &Board) -> Option<CpuMove> {
        let available = board.available_positions();
        if available.len() < 2 {
            return None;
        }

        self.moves_made += 1;
        let smart = self
            .rng
            .gen_bool(self.profile.smart_move_rate.clamp(0.0, 1.0));
        let chosen = if smart {
            self.smart_moves += 1;
            self.smart_move(board, &available)
        } else {
            self.random_move(&available)
        };

        if let Some(chosen) = &chosen {
            debug!(
                "[CPU] {:?}: {} and {}",
                chosen.kind, chosen.first, chosen.second
            );
        }
        chosen
    }

    fn smart_move(&mut self, board: &Board, available: &[Position]) -> Option<CpuMove> {
        let known = self.memory.known_pairs(board);
        if let Some((_, first, second)) = known.choose(&mut self.rng) {
            return Some(CpuMove {
                first: *first,
                second: *second,
                kind: MoveKind::KnownPair,
            });
        }

        let first = *available.choose(&mut self.rng)?;
        if let Some(pokemon_id) = board.pokemon_at(first) {
            let partners = self.memory.available_partners(board, pokemon_id, first);
            if let Some(second) = partners.first() {
                return Some(CpuMove {
                    first,
                    second: *second,
                    kind: MoveKind::PartialKnown,
                });
            }
        }

        let others: Vec<Position> = available
            .iter()
            .copied()
            .filter(|position| *position != first)
            .collect();
        let second = *others.choose(&mut self.rng)?;
        Some(CpuMove {
            first,
            second,
            kind: MoveKind::SemiRandom,
        })
    }

    fn random_move(&mut self, available: &[Position]) -> Option<CpuMove> {
        let mut picks = available.choose_multiple(&mut self.rng, 2).copied();
        let first = picks.next()?;
        let second = picks.next()?;
        Some(CpuMove {
            first,
            second,
            kind: MoveKind::Random,
        })
    }

    /// 本回合的思考时间（毫秒）。
    pub fn thinking_delay_ms(&mut self) -> u32 {
        let ThinkingTime { min_ms, max_ms } = self.profile.thinking_time;
        if max_ms <= min_ms {
            return min_ms;
        }
        self.rng.gen_range(min_ms..=max_ms)
    }

    pub fn record_pair_found(&mut self) {
        self.pairs_found += 1;
    }

    pub fn stats(&self) -> CpuStats {
        let smart_move_percentage = if self.moves_made == 0 {
            0
        } else {
            (f64::from(self.smart_moves) * 100.0 / f64::from(self.moves_made)).round() as u32
        };
        CpuStats {
            moves_made: self.moves_made,
            smart_moves: self.smart_moves,
            pairs_found: self.pairs_found,
            smart_move_percentage,
        }
    }

    /// 新牌局：清空记忆与统计。
    pub fn reset(&mut self) {
        self.memory.clear();
        self.moves_made = 0;
        self.smart_moves = 0;
        self.pairs_found = 0;
    }
}

impl Default for CpuOpponent {
    fn default() -> Self {
        CpuOpponent::new(CpuProfile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{catalog, Card};

    fn board(ids: &[PokemonId]) -> Board {
        Board::new(
            ids.iter()
                .map(|id| Card::face_down(catalog::lookup(*id).expect("catalog entry")))
                .collect(),
        )
    }

    fn observe_all(cpu: &mut CpuOpponent, board: &Board, indices: &[usize]) {
        for index in indices {
            let pos = board.position(*index).expect("pos");
            cpu.observe(board.pokemon_at(pos).expect("id"), pos);
        }
    }

    #[test]
    fn difficulty_parses_aliases() {
        assert_eq!("Normal".parse(), Ok(CpuDifficulty::Medium));
        assert_eq!("expert".parse(), Ok(CpuDifficulty::Impossible));
        assert_eq!(" hard ".parse(), Ok(CpuDifficulty::Hard));
        assert!("godlike".parse::<CpuDifficulty>().is_err());

        let easy = CpuProfile::from_difficulty(CpuDifficulty::Easy);
        assert_eq!(easy.memory_retention, 0.3);
        assert_eq!(easy.thinking_time, ThinkingTime { min_ms: 1000, max_ms: 2000 });
    }

    #[test]
    fn smart_cpu_takes_a_remembered_pair() {
        let board = board(&[4, 9, 4, 9, 12, 12]);
        let mut cpu = CpuOpponent::with_seed(CpuProfile::from_difficulty(CpuDifficulty::Impossible), 11);
        observe_all(&mut cpu, &board, &[0, 2]);

        let chosen = cpu.choose_move(&board).expect("a move should be available");
        assert_eq!(chosen.kind, MoveKind::KnownPair);
        assert_eq!(chosen.first, board.position(0).expect("pos"));
        assert_eq!(chosen.second, board.position(2).expect("pos"));
    }

    #[test]
    fn smart_cpu_completes_partial_knowledge() {
        let board = board(&[4, 4]);
        let mut cpu = CpuOpponent::with_seed(CpuProfile::from_difficulty(CpuDifficulty::Impossible), 5);
        observe_all(&mut cpu, &board, &[1]);

        // 只剩一对：随机翻到 0 时走 PartialKnown，翻到 1 时没有搭档。
        let chosen = cpu.choose_move(&board).expect("move");
        assert!(matches!(chosen.kind, MoveKind::PartialKnown | MoveKind::SemiRandom));
        assert_ne!(chosen.first, chosen.second);
    }

    #[test]
    fn forgetful_cpu_remembers_nothing() {
        let board = board(&[1, 1, 2, 2]);
        let profile = CpuProfile {
            memory_retention: 0.0,
            smart_move_rate: 0.0,
            thinking_time: ThinkingTime { min_ms: 10, max_ms: 10 },
        };
        let mut cpu = CpuOpponent::with_seed(profile, 3);
        observe_all(&mut cpu, &board, &[0, 1, 2, 3]);
        assert!(cpu.memory().is_empty());

        let chosen = cpu.choose_move(&board).expect("move");
        assert_eq!(chosen.kind, MoveKind::Random);
        assert_ne!(chosen.first, chosen.second);
        assert_eq!(cpu.thinking_delay_ms(), 10);
    }

    #[test]
    fn no_move_with_fewer_than_two_cards() {
        let mut board = board(&[1, 1, 2, 2]);
        for index in 0..3 {
            board.set_matched(board.position(index).expect("pos"));
        }
        let mut cpu = CpuOpponent::with_seed(CpuProfile::default(), 1);
        assert!(cpu.choose_move(&board).is_none());
        assert_eq!(cpu.stats().moves_made, 0);
    }

    #[test]
    fn thinking_delay_stays_in_range() {
        let mut cpu = CpuOpponent::with_seed(CpuProfile::from_difficulty(CpuDifficulty::Hard), 21);
        for _ in 0..50 {
            let delay = cpu.thinking_delay_ms();
            assert!((600..=1200).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn stats_report_rounded_smart_percentage() {
        let board = board(&[1, 1, 2, 2, 3, 3]);
        let mut cpu = CpuOpponent::with_seed(CpuProfile::from_difficulty(CpuDifficulty::Impossible), 8);
        for _ in 0..3 {
            cpu.choose_move(&board);
        }
        cpu.record_pair_found();

        let stats = cpu.stats();
        assert_eq!(stats.moves_made, 3);
        assert_eq!(stats.smart_moves, 3);
        assert_eq!(stats.pairs_found, 1);
        assert_eq!(stats.smart_move_percentage, 100);

        cpu.reset();
        assert_eq!(cpu.stats(), CpuStats::default());
    }
}
