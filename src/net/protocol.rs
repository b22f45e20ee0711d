use serde::{Deserialize, Serialize};

use crate::game::{Card, PlayerSlot};

/// 对端之间的消息（JSON，`type` 字段区分）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum PeerMessage {
    /// 房主发牌
    #[serde(rename = "INIT_GAME")]
    InitGame {
        cards: Vec<Card>,
        #[serde(rename = "currentPlayer")]
        current_player: PlayerSlot,
    },

    #[serde(rename = "CARD_FLIP")]
    CardFlip { index: usize },

    #[serde(rename = "TURN_CHANGE")]
    TurnChange {
        #[serde(rename = "currentPlayer")]
        current_player: PlayerSlot,
    },
}

impl PeerMessage {
    pub fn encode(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| format!("JSON serialize error: {}", e))
    }

    pub fn decode(payload: &str) -> Result<Self, String> {
        serde_json::from_str(payload.trim()).map_err(|e| format!("JSON parse error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog;

    #[test]
    fn messages_use_screaming_type_tags() {
        let flip = PeerMessage::CardFlip { index: 7 }.encode().expect("encode");
        assert_eq!(flip, r#"{"type":"CARD_FLIP","index":7}"#);

        let turn = PeerMessage::TurnChange {
            current_player: PlayerSlot::Two,
        }
        .encode()
        .expect("encode");
        assert_eq!(turn, r#"{"type":"TURN_CHANGE","currentPlayer":2}"#);
    }

    #[test]
    fn init_game_accepts_browser_payload() {
        let payload = r#"{
            "type": "INIT_GAME",
            "cards": [
                {"pokemonId": 25, "name": "pikachu", "image": "p.png", "isFlipped": false, "isMatched": false},
                {"pokemonId": 25, "name": "pikachu", "image": "p.png", "isFlipped": false, "isMatched": false}
            ],
            "currentPlayer": 1
        }"#;
        match PeerMessage::decode(payload).expect("decode") {
            PeerMessage::InitGame {
                cards,
                current_player,
            } => {
                assert_eq!(cards.len(), 2);
                assert_eq!(cards[0].pokemon_id, 25);
                assert_eq!(current_player, PlayerSlot::One);
            }
            other => panic!("unexpected message {other:?}"),
        }

        let card = Card::face_down(catalog::lookup(3).expect("entry"));
        let message = PeerMessage::InitGame {
            cards: vec![card.clone(), card],
            current_player: PlayerSlot::One,
        };
        let decoded = PeerMessage::decode(&message.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, message);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(PeerMessage::decode("not json").is_err());
        assert!(PeerMessage::decode(r#"{"type":"CHAT","text":"hi"}"#).is_err());
        assert!(PeerMessage::decode(r#"{"type":"TURN_CHANGE","currentPlayer":3}"#).is_err());
        assert!(PeerMessage::decode(r#"{"type":"CARD_FLIP","index":-1}"#).is_err());
    }
}
