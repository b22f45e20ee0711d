use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{
    catalog::{self, CATALOG_SIZE},
    state::{
        Board, Card, FlipOrigin, GameEvent, GameMode, GamePhase, GameState, Outcome,
        PlayerSlot, Position,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    InvalidConfiguration { requested: usize, max: usize },
    InvalidDeal { reason: String },
}

/// 翻牌被拒绝的原因，仅用于调试日志。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlipRejection {
    NotInPlay,
    Locked,
    NotEntitled,
    OutOfBounds,
    AlreadyRevealed,
}

pub fn checked_pair_count(requested: usize) -> Result<usize, RuleError> {
    if (1..=CATALOG_SIZE).contains(&requested) {
        Ok(requested)
    } else {
        Err(RuleError::InvalidConfiguration {
            requested,
            max: CATALOG_SIZE,
        })
    }
}

pub fn clamp_pair_count(requested: usize) -> usize {
    requested.clamp(1, CATALOG_SIZE)
}

pub struct MatchEngine {
    state: GameState,
    rng: SmallRng,
}

impl MatchEngine {
    pub fn new(mode: GameMode) -> Self {
        Self {
            state: GameState::new(mode),
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(mode: GameMode, seed: u64) -> Self {
        Self {
            state: GameState::new(mode),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn board(&self) -> &Board {
        &self.state.board
    }

    pub fn mode(&self) -> GameMode {
        self.state.mode
    }

    pub fn set_mode(&mut self, mode: GameMode) {
        self.state.mode = mode;
    }

    /// 丢弃当前对局，回到 Idle。
    pub fn reset(&mut self) {
        self.state = GameState::new(self.state.mode);
    }

    pub fn deal(&mut self, pair_count: usize) -> Vec<GameEvent> {
        let pairs = checked_pair_count(pair_count).unwrap_or_else(|error| {
            let clamped = clamp_pair_count(pair_count);
            warn!("[ENGINE] {:?}, clamping to {}", error, clamped);
            clamped
        });

        let mut cards: Vec<Card> = catalog::entries()
            .choose_multiple(&mut self.rng, pairs)
            .flat_map(|entry| [Card::face_down(entry), Card::face_down(entry)])
            .collect();
        cards.shuffle(&mut self.rng);

        info!("[ENGINE] Dealt {} pairs ({} cards)", pairs, cards.len());
        self.install(Board::new(cards), PlayerSlot::One)
    }

    /// 安装房主发来的牌局。
    pub fn load_deal(
        &mut self,
        cards: Vec<Card>,
        current_player: PlayerSlot,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let board = Board::from_dealt(cards).map_err(|reason| RuleError::InvalidDeal { reason })?;
        info!(
            "[ENGINE] Loaded remote deal of {} pairs, {} to move",
            board.pair_count(),
            current_player
        );
        Ok(self.install(board, current_player))
    }

    fn install(&mut self, board: Board, current_player: PlayerSlot) -> Vec<GameEvent> {
        let event = GameEvent::Dealt {
            pair_count: board.pair_count(),
            current_player,
        };
        self.state = GameState::dealt(self.state.mode, board, current_player);
        self.state.record_event(event.clone());
        vec![event]
    }

    pub fn flip(&mut self, index: usize, origin: FlipOrigin) -> Vec<GameEvent> {
        match self.admit(index, origin) {
            Ok(position) => self.reveal(position),
            Err(reason) => {
                debug!(
                    "[ENGINE] Flip {} from {:?} ignored: {:?}",
                    index, origin, reason
                );
                Vec::new()
            }
        }
    }

    fn admit(&self, index: usize, origin: FlipOrigin) -> Result<Position, FlipRejection> {
        let state = &self.state;
        if state.phase != GamePhase::InPlay {
            return Err(FlipRejection::NotInPlay);
        }
        if state.is_locked {
            return Err(FlipRejection::Locked);
        }

        let current = state.current_player;
        let entitled = match (state.mode, origin) {
            (GameMode::SinglePlayer, FlipOrigin::Local) => current == PlayerSlot::One,
            (GameMode::SinglePlayer, FlipOrigin::Cpu) => current == PlayerSlot::Two,
            (GameMode::TwoPlayer, FlipOrigin::Local) => true,
            (GameMode::Online { role }, FlipOrigin::Local) => {
                role.map(|role| role.player_number()) == Some(current)
            }
            (GameMode::Online { .. }, FlipOrigin::Remote) => true,
            _ => false,
        };
        if !entitled {
            return Err(FlipRejection::NotEntitled);
        }

        let position = state
            .board
            .position(index)
            .ok_or(FlipRejection::OutOfBounds)?;
        if !state.board.is_available(position) {
            return Err(FlipRejection::AlreadyRevealed);
        }
        Ok(position)
    }

    fn reveal(&mut self, position: Position) -> Vec<GameEvent> {
        let player = self.state.current_player;
        let mut events = Vec::new();

        self.state.board.set_flipped(position, true);
        self.state.revealed.push(position);
        if let Some(pokemon_id) = self.state.board.pokemon_at(position) {
            events.push(GameEvent::CardFlipped {
                position,
                pokemon_id,
                player,
            });
        }

        if let [first, second] = self.state.revealed[..] {
            self.state.is_locked = true;
            let matching = self.state.board.pokemon_at(first) == self.state.board.pokemon_at(second);
            events.push(GameEvent::PairRevealed {
                first,
                second,
                matching,
            });
        }

        for event in &events {
            self.state.record_event(event.clone());
        }
        events
    }

    pub fn has_pending_pair(&self) -> bool {
        self.state.revealed.len() == 2
    }

    pub fn evaluate_pair(&mut self) -> Vec<GameEvent> {
        let (first, second) = match self.state.revealed[..] {
            [first, second] => (first, second),
            _ => return Vec::new(),
        };
        self.state.revealed.clear();

        let player = self.state.current_player;
        let board = &mut self.state.board;
        let mut events = Vec::new();

        match (board.pokemon_at(first), board.pokemon_at(second)) {
            (Some(a), Some(b)) if a == b => {
                board.set_matched(first);
                board.set_matched(second);
                let score = self.state.scores.increment(player);
                self.state.matched_pair_count += 1;
                events.push(GameEvent::PairMatched {
                    first,
                    second,
                    pokemon_id: a,
                    player,
                    score,
                });

                if self.state.matched_pair_count == self.state.total_pairs() {
                    let outcome = Outcome::from_scores(&self.state.scores);
                    self.state.phase = GamePhase::GameOver;
                    self.state.outcome = Some(outcome);
                    info!(
                        "[ENGINE] Game over: {:?} ({} - {})",
                        outcome, self.state.scores.player1, self.state.scores.player2
                    );
                    events.push(GameEvent::GameOver {
                        outcome,
                        scores: self.state.scores,
                    });
                }
            }
            _ => {
                board.set_flipped(first, false);
                board.set_flipped(second, false);
                let next = player.opponent();
                self.state.current_player = next;
                events.push(GameEvent::PairMismatched { first, second });
                events.push(GameEvent::TurnChanged { player: next });
            }
        }
        self.state.is_locked = false;

        for event in &events {
            self.state.record_event(event.clone());
        }
        events
    }

    /// 应用对端的回合切换；已是当前玩家时不产生事件。
    pub fn apply_turn_change(&mut self, player: PlayerSlot) -> Vec<GameEvent> {
        if !self.state.is_in_play() || self.state.current_player == player {
            return Vec::new();
        }
        self.state.current_player = player;
        if self.state.revealed.is_empty() {
            self.state.is_locked = false;
        }
        let event = GameEvent::TurnChanged { player };
        self.state.record_event(event.clone());
        vec![event]
    }
}
