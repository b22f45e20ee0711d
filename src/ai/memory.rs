use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::game::{Board, PokemonId, Position};

/// CPU 记住的牌位：身份 -> 按记住顺序排列的位置。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CpuMemory {
    recalled: BTreeMap<PokemonId, Vec<Position>>,
}

impl CpuMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个位置，已记住的位置不会重复；返回是否新增。
    pub fn record(&mut self, pokemon_id: PokemonId, position: Position) -> bool {
        let positions = self.recalled.entry(pokemon_id).or_default();
        if positions.contains(&position) {
            return false;
        }
        positions.push(position);
        true
    }

    pub fn forget(&mut self, pokemon_id: PokemonId) -> bool {
        self.recalled.remove(&pokemon_id).is_some()
    }

    pub fn clear(&mut self) {
        self.recalled.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.recalled.is_empty()
    }

    pub fn len(&self) -> usize {
        self.recalled.len()
    }

    pub fn positions(&self, pokemon_id: PokemonId) -> &[Position] {
        self.recalled
            .get(&pokemon_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 至少记住了两个仍可翻位置的身份，各取前两个可用位置。
    pub fn known_pairs(&self, board: &Board) -> Vec<(PokemonId, Position, Position)> {
        self.recalled
            .iter()
            .filter_map(|(id, positions)| {
                let mut available = positions
                    .iter()
                    .copied()
                    .filter(|position| board.is_available(*position));
                let first = available.next()?;
                let second = available.next()?;
                Some((*id, first, second))
            })
            .collect()
    }

    /// 与 `exclude` 同身份、且仍可翻的已记住位置。
    pub fn available_partners(
        &self,
        board: &Board,
        pokemon_id: PokemonId,
        exclude: Position,
    ) -> Vec<Position> {
        self.positions(pokemon_id)
            .iter()
            .copied()
            .filter(|position| *position != exclude && board.is_available(*position))
            .collect()
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

    #[test]
    fn record_is_idempotent() {
        let board = board(&[5, 5]);
        let mut memory = CpuMemory::new();
        let pos = board.position(0).expect("pos");

        assert!(memory.record(5, pos));
        assert!(!memory.record(5, pos));
        assert_eq!(memory.positions(5), &[pos]);
    }

    #[test]
    fn forget_drops_every_position() {
        let board = board(&[5, 5]);
        let mut memory = CpuMemory::new();
        memory.record(5, board.position(0).expect("pos"));
        memory.record(5, board.position(1).expect("pos"));

        assert!(memory.forget(5));
        assert!(memory.positions(5).is_empty());
        assert!(!memory.forget(5));
    }

    #[test]
    fn known_pairs_skip_unavailable_positions() {
        let mut board = board(&[3, 3, 8, 8]);
        let mut memory = CpuMemory::new();
        for index in 0..4 {
            let pos = board.position(index).expect("pos");
            memory.record(board.pokemon_at(pos).expect("id"), pos);
        }
        board.set_matched(board.position(2).expect("pos"));

        let pairs = memory.known_pairs(&board);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, 3);
    }
}
