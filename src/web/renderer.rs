use log::{debug, warn};
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::js_sys::{Array, Function, Reflect};

use crate::game::{Card, Outcome, PlayerSlot, Scores};
use crate::net::ConnectionState;
use crate::session::Renderer;

/// 把渲染调用转给页面传入的 JS 对象（`renderBoard`、`setScore` 等方法）。
pub struct JsRenderer {
    target: JsValue,
}

impl JsRenderer {
    pub fn new(target: JsValue) -> Self {
        Self { target }
    }

    fn call(&self, method: &str, args: &[JsValue]) {
        let function = match Reflect::get(&self.target, &JsValue::from_str(method)) {
            Ok(value) if value.is_function() => value.unchecked_into::<Function>(),
            _ => {
                debug!("[RENDER] renderer has no {} method", method);
                return;
            }
        };
        let args: Array = args.iter().collect();
        if let Err(error) = function.apply(&self.target, &args) {
            warn!("[RENDER] {} threw: {:?}", method, error);
        }
    }

    fn encode<T: Serialize + ?Sized>(value: &T) -> JsValue {
        to_value(value).unwrap_or_else(|error| {
            warn!("[RENDER] could not convert value: {}", error);
            JsValue::UNDEFINED
        })
    }
}

impl Renderer for JsRenderer {
    fn render_board(&mut self, cards: &[Card]) {
        self.call("renderBoard", &[Self::encode(cards)]);
    }

    fn set_score(&mut self, player: PlayerSlot, value: u32) {
        self.call("setScore", &[player.number().into(), value.into()]);
    }

    fn set_turn_indicator(&mut self, player: PlayerSlot) {
        self.call("setTurnIndicator", &[player.number().into()]);
    }

    fn show_transient_message(&mut self, text: &str) {
        self.call("showTransientMessage", &[JsValue::from_str(text)]);
    }

    fn show_game_over(&mut self, outcome: Outcome, scores: Scores) {
        self.call(
            "showGameOver",
            &[Self::encode(&outcome), Self::encode(&scores)],
        );
    }

    fn set_connection_status(&mut self, state: ConnectionState) {
        self.call("setConnectionStatus", &[Self::encode(&state)]);
    }
}
