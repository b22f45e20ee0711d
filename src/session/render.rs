use crate::game::{Card, Outcome, PlayerSlot, Scores};
use crate::net::ConnectionState;

/// 界面协作者。引擎不持有任何界面状态，会话层把事件翻译成这些调用。
pub trait Renderer {
    fn render_board(&mut self, cards: &[Card]);

    fn set_score(&mut self, player: PlayerSlot, value: u32);

    fn set_turn_indicator(&mut self, player: PlayerSlot);

    fn show_transient_message(&mut self, text: &str);

    fn show_game_over(&mut self, outcome: Outcome, scores: Scores);

    fn set_connection_status(&mut self, _state: ConnectionState) {}
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Board(Vec<Card>),
        Score(PlayerSlot, u32),
        Turn(PlayerSlot),
        Message(String),
        GameOver(Outcome, Scores),
        Connection(ConnectionState),
    }

    /// 记录所有调用，测试里用来断言界面行为。
    #[derive(Debug, Default)]
    pub struct RecordingRenderer {
        pub calls: Vec<Call>,
    }

    impl RecordingRenderer {
        pub fn last_board(&self) -> Option<&Vec<Card>> {
            self.calls.iter().rev().find_map(|call| match call {
                Call::Board(cards) => Some(cards),
                _ => None,
            })
        }

        pub fn messages(&self) -> Vec<&str> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Message(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect()
        }

        pub fn game_overs(&self) -> usize {
            self.calls
                .iter()
                .filter(|call| matches!(call, Call::GameOver(..)))
                .count()
        }
    }

    impl Renderer for RecordingRenderer {
        fn render_board(&mut self, cards: &[Card]) {
            self.calls.push(Call::Board(cards.to_vec()));
        }

        fn set_score(&mut self, player: PlayerSlot, value: u32) {
            self.calls.push(Call::Score(player, value));
        }

        fn set_turn_indicator(&mut self, player: PlayerSlot) {
            self.calls.push(Call::Turn(player));
        }

        fn show_transient_message(&mut self, text: &str) {
            self.calls.push(Call::Message(text.to_string()));
        }

        fn show_game_over(&mut self, outcome: Outcome, scores: Scores) {
            self.calls.push(Call::GameOver(outcome, scores));
        }

        fn set_connection_status(&mut self, state: ConnectionState) {
            self.calls.push(Call::Connection(state));
        }
    }
}
