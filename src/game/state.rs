use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::catalog::CatalogEntry;

/// 卡牌身份（图鉴编号）。
pub type PokemonId = u16;

/// 玩家座位，序列化为数字 1 或 2。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    pub fn opponent(self) -> Self {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            PlayerSlot::One => 1,
            PlayerSlot::Two => 2,
        }
    }
}

impl TryFrom<u8> for PlayerSlot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PlayerSlot::One),
            2 => Ok(PlayerSlot::Two),
            other => Err(format!("player must be 1 or 2, got {other}")),
        }
    }
}

impl From<PlayerSlot> for u8 {
    fn from(slot: PlayerSlot) -> Self {
        slot.number()
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.number())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scores {
    pub player1: u32,
    pub player2: u32,
}

impl Scores {
    pub fn get(&self, player: PlayerSlot) -> u32 {
        match player {
            PlayerSlot::One => self.player1,
            PlayerSlot::Two => self.player2,
        }
    }

    pub fn increment(&mut self, player: PlayerSlot) -> u32 {
        let slot = match player {
            PlayerSlot::One => &mut self.player1,
            PlayerSlot::Two => &mut self.player2,
        };
        *slot += 1;
        *slot
    }
}

/// 在线对局中的身份：房主发牌并执先手。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    Host,
    Guest,
}

impl PeerRole {
    pub fn player_number(self) -> PlayerSlot {
        match self {
            PeerRole::Host => PlayerSlot::One,
            PeerRole::Guest => PlayerSlot::Two,
        }
    }
}

/// 游戏模式。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GameMode {
    #[default]
    SinglePlayer,
    TwoPlayer,
    Online {
        #[serde(default)]
        role: Option<PeerRole>,
    },
}

impl GameMode {
    /// 在线模式下本机的座位，其余模式为 `None`。
    pub fn player_number(&self) -> Option<PlayerSlot> {
        match self {
            GameMode::Online { role } => role.map(PeerRole::player_number),
            _ => None,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, GameMode::Online { .. })
    }
}

impl FromStr for GameMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "singleplayer" | "single" | "cpu" => Ok(GameMode::SinglePlayer),
            "twoplayer" | "local" | "versus" => Ok(GameMode::TwoPlayer),
            "online" => Ok(GameMode::Online { role: None }),
            _ => Err(()),
        }
    }
}

/// 翻牌请求的来源，决定准入规则。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FlipOrigin {
    Local,
    Cpu,
    Remote,
}

/// 经过边界检查的棋盘下标，只能由 [`Board::position`] 构造。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Position(usize);

impl Position {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub pokemon_id: PokemonId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub is_flipped: bool,
    #[serde(default)]
    pub is_matched: bool,
}

impl Card {
    pub fn face_down(entry: &CatalogEntry) -> Self {
        Self {
            pokemon_id: entry.id,
            name: entry.name.clone(),
            image: entry.image.clone(),
            is_flipped: false,
            is_matched: false,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.is_flipped && !self.is_matched
    }
}

/// 棋盘：2N 张牌，每个身份恰好出现两次。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Board {
    cards: Vec<Card>,
}

impl Board {
    pub fn new(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// 校验来自对端的牌面，并把所有牌重置为背面朝上。
    pub fn from_dealt(mut cards: Vec<Card>) -> Result<Self, String> {
        if cards.is_empty() {
            return Err("deal contains no cards".into());
        }
        if cards.len() % 2 != 0 {
            return Err(format!("deal has an odd number of cards ({})", cards.len()));
        }

        let mut counts: HashMap<PokemonId, usize> = HashMap::new();
        for card in &cards {
            *counts.entry(card.pokemon_id).or_default() += 1;
        }
        if let Some((id, count)) = counts.iter().find(|(_, count)| **count != 2) {
            return Err(format!("pokemon {id} appears {count} times"));
        }

        for card in &mut cards {
            card.is_flipped = false;
            card.is_matched = false;
        }
        Ok(Self { cards })
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn pair_count(&self) -> usize {
        self.cards.len() / 2
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn position(&self, index: usize) -> Option<Position> {
        (index < self.cards.len()).then_some(Position(index))
    }

    pub fn card(&self, position: Position) -> Option<&Card> {
        self.cards.get(position.0)
    }

    pub fn pokemon_at(&self, position: Position) -> Option<PokemonId> {
        self.card(position).map(|card| card.pokemon_id)
    }

    pub fn is_available(&self, position: Position) -> bool {
        self.card(position).is_some_and(Card::is_available)
    }

    pub fn available_positions(&self) -> Vec<Position> {
        self.cards
            .iter()
            .enumerate()
            .filter(|(_, card)| card.is_available())
            .map(|(index, _)| Position(index))
            .collect()
    }

    /// 已翻开但尚未配对的牌。
    pub fn revealed_positions(&self) -> Vec<Position> {
        self.cards
            .iter()
            .enumerate()
            .filter(|(_, card)| card.is_flipped && !card.is_matched)
            .map(|(index, _)| Position(index))
            .collect()
    }

    pub(crate) fn set_flipped(&mut self, position: Position, flipped: bool) {
        if let Some(card) = self.cards.get_mut(position.0) {
            card.is_flipped = flipped;
        }
    }

    pub(crate) fn set_matched(&mut self, position: Position) {
        if let Some(card) = self.cards.get_mut(position.0) {
            card.is_matched = true;
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GamePhase {
    #[default]
    Idle,
    InPlay,
    GameOver,
}

/// 对局结果。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "result", content = "player", rename_all = "lowercase")]
pub enum Outcome {
    Winner(PlayerSlot),
    Draw,
}

impl Outcome {
    pub fn from_scores(scores: &Scores) -> Self {
        match scores.player1.cmp(&scores.player2) {
            std::cmp::Ordering::Greater => Outcome::Winner(PlayerSlot::One),
            std::cmp::Ordering::Less => Outcome::Winner(PlayerSlot::Two),
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    pub fn winner(&self) -> Option<PlayerSlot> {
        match self {
            Outcome::Winner(player) => Some(*player),
            Outcome::Draw => None,
        }
    }
}

/// 引擎事件流，由会话层转换成渲染调用。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    Dealt {
        pair_count: usize,
        current_player: PlayerSlot,
    },
    CardFlipped {
        position: Position,
        pokemon_id: PokemonId,
        player: PlayerSlot,
    },
    PairRevealed {
        first: Position,
        second: Position,
        matching: bool,
    },
    PairMatched {
        first: Position,
        second: Position,
        pokemon_id: PokemonId,
        player: PlayerSlot,
        score: u32,
    },
    PairMismatched {
        first: Position,
        second: Position,
    },
    TurnChanged {
        player: PlayerSlot,
    },
    GameOver {
        outcome: Outcome,
        scores: Scores,
    },
}

/// 游戏整体状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub board: Board,
    pub current_player: PlayerSlot,
    pub scores: Scores,
    pub matched_pair_count: usize,
    pub is_locked: bool,
    pub mode: GameMode,
    pub phase: GamePhase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revealed: Vec<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
}

impl GameState {
    pub fn new(mode: GameMode) -> Self {
        Self {
            board: Board::default(),
            current_player: PlayerSlot::One,
            scores: Scores::default(),
            matched_pair_count: 0,
            is_locked: false,
            mode,
            phase: GamePhase::Idle,
            revealed: Vec::new(),
            outcome: None,
            event_log: Vec::new(),
        }
    }

    pub fn dealt(mode: GameMode, board: Board, current_player: PlayerSlot) -> Self {
        Self {
            board,
            current_player,
            phase: GamePhase::InPlay,
            ..Self::new(mode)
        }
    }

    pub fn player_number(&self) -> Option<PlayerSlot> {
        self.mode.player_number()
    }

    pub fn total_pairs(&self) -> usize {
        self.board.pair_count()
    }

    pub fn is_in_play(&self) -> bool {
        self.phase == GamePhase::InPlay
    }

    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(GameMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog;

    fn pair_cards(ids: &[PokemonId]) -> Vec<Card> {
        ids.iter()
            .map(|id| Card::face_down(catalog::lookup(*id).expect("catalog entry")))
            .collect()
    }

    #[test]
    fn player_slot_serializes_as_number() {
        let json = serde_json::to_string(&PlayerSlot::Two).expect("serialize");
        assert_eq!(json, "2");
        let parsed: PlayerSlot = serde_json::from_str("1").expect("deserialize");
        assert_eq!(parsed, PlayerSlot::One);
        assert!(serde_json::from_str::<PlayerSlot>("3").is_err());
    }

    #[test]
    fn outcome_uses_strict_score_comparison() {
        let draw = Scores { player1: 3, player2: 3 };
        let p2 = Scores { player1: 2, player2: 4 };
        assert_eq!(Outcome::from_scores(&draw), Outcome::Draw);
        assert_eq!(Outcome::from_scores(&p2), Outcome::Winner(PlayerSlot::Two));
        assert_eq!(Outcome::from_scores(&p2).winner(), Some(PlayerSlot::Two));
    }

    #[test]
    fn mode_parses_from_ui_strings() {
        assert_eq!("singlePlayer".parse(), Ok(GameMode::SinglePlayer));
        assert_eq!("twoPlayer".parse(), Ok(GameMode::TwoPlayer));
        assert_eq!("online".parse(), Ok(GameMode::Online { role: None }));
        assert!("arcade".parse::<GameMode>().is_err());
        let host = GameMode::Online {
            role: Some(PeerRole::Host),
        };
        assert_eq!(host.player_number(), Some(PlayerSlot::One));
        assert_eq!(GameMode::TwoPlayer.player_number(), None);
    }

    #[test]
    fn board_positions_are_bounds_checked() {
        let board = Board::new(pair_cards(&[1, 1]));
        assert!(board.position(1).is_some());
        assert!(board.position(2).is_none());
        assert_eq!(board.available_positions().len(), 2);
    }

    #[test]
    fn dealt_board_rejects_broken_pairs() {
        assert!(Board::from_dealt(Vec::new()).is_err());
        assert!(Board::from_dealt(pair_cards(&[1, 1, 2])).is_err());
        assert!(Board::from_dealt(pair_cards(&[1, 1, 1, 1])).is_err());

        let mut cards = pair_cards(&[4, 7, 7, 4]);
        cards[0].is_flipped = true;
        cards[1].is_matched = true;
        let board = Board::from_dealt(cards).expect("valid deal");
        assert!(board.cards().iter().all(Card::is_available));
    }

    #[test]
    fn card_uses_camel_case_wire_names() {
        let card = Card::face_down(catalog::lookup(1).expect("catalog entry"));
        let value = serde_json::to_value(&card).expect("serialize");
        assert_eq!(value["pokemonId"], 1);
        assert_eq!(value["isFlipped"], false);
        assert_eq!(value["isMatched"], false);
    }
}
