pub mod ai;
pub mod config;
pub mod game;
pub mod net;
pub mod session;
pub mod utils;
pub mod web;

use gloo_timers::future::TimeoutFuture;
use log::warn;
use serde_wasm_bindgen::to_value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

pub use ai::{CpuDifficulty, CpuOpponent, CpuProfile, CpuStats, MoveKind};
pub use config::{GameConfig, Timings};
pub use game::{
    Board, Card, FlipOrigin, GameEvent, GameMode, GamePhase, GameState, MatchEngine, Outcome,
    PeerRole, PlayerSlot, Position, RuleError, Scores,
};
pub use net::{NetError, PeerMessage, PeerTransport, RoomCode};
pub use session::{GameSession, Renderer};
use utils::now_ms;
use web::{JsRenderer, PeerJsTransport};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
}

type BrowserSession = GameSession<JsRenderer, PeerJsTransport>;

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

struct Inner {
    session: RefCell<BrowserSession>,
    /// 每次重新安排唤醒都会换票，旧的定时器醒来后什么也不做。
    ticket: Cell<u64>,
}

#[wasm_bindgen]
pub struct MemoryGame {
    inner: Rc<Inner>,
}

#[wasm_bindgen]
impl MemoryGame {
    #[wasm_bindgen(constructor)]
    pub fn new(renderer: JsValue, config_json: Option<String>) -> Result<MemoryGame, JsValue> {
        let config = match config_json {
            Some(json) => GameConfig::from_json(&json).map_err(serde_to_js_error)?,
            None => GameConfig::default(),
        };
        utils::init_logging(config.level_filter());

        let session = GameSession::new(config, JsRenderer::new(renderer));
        Ok(MemoryGame {
            inner: Rc::new(Inner {
                session: RefCell::new(session),
                ticket: Cell::new(0),
            }),
        })
    }

    #[wasm_bindgen(js_name = startGame)]
    pub fn start_game(&self) -> Result<(), JsValue> {
        self.with_session(|session| session.start_game(now_ms()))?
            .map_err(serde_to_js_error)
    }

    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&self, mode: &str) -> Result<(), JsValue> {
        let mode = GameMode::from_str(mode)
            .map_err(|_| JsValue::from_str(&format!("unknown game mode \"{mode}\"")))?;
        self.with_session(|session| session.set_mode(mode))
    }

    #[wasm_bindgen(js_name = setDifficulty)]
    pub fn set_difficulty(&self, level: &str) -> Result<(), JsValue> {
        let difficulty = CpuDifficulty::from_str(level)
            .map_err(|_| JsValue::from_str(&format!("unknown difficulty \"{level}\"")))?;
        self.with_session(|session| session.set_difficulty(difficulty))
    }

    #[wasm_bindgen(js_name = setPairCount)]
    pub fn set_pair_count(&self, pair_count: usize) -> Result<(), JsValue> {
        self.with_session(|session| session.set_pair_count(pair_count))?
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = flipCard)]
    pub fn flip_card(&self, index: usize) -> Result<(), JsValue> {
        self.with_session(|session| session.click(index, now_ms()))
    }

    #[wasm_bindgen(js_name = createRoom)]
    pub fn create_room(&self) -> Result<String, JsValue> {
        let code = self
            .with_session(|session| session.create_room(PeerJsTransport::new(), now_ms()))?
            .map_err(serde_to_js_error)?;
        Ok(code.code().to_string())
    }

    #[wasm_bindgen(js_name = joinRoom)]
    pub fn join_room(&self, input: &str) -> Result<String, JsValue> {
        let code = self
            .with_session(|session| session.join_room(input, PeerJsTransport::new(), now_ms()))?
            .map_err(serde_to_js_error)?;
        Ok(code.code().to_string())
    }

    pub fn disconnect(&self) -> Result<(), JsValue> {
        self.with_session(|session| session.disconnect())
    }

    #[wasm_bindgen(js_name = stateJson)]
    pub fn state_json(&self) -> Result<String, JsValue> {
        let session = self.borrow()?;
        serde_json::to_string(session.state()).map_err(serde_to_js_error)
    }

    #[wasm_bindgen(js_name = cpuStats)]
    pub fn cpu_stats(&self) -> Result<JsValue, JsValue> {
        let session = self.borrow()?;
        to_value(&session.cpu_stats()).map_err(JsValue::from)
    }

    /// `mm:ss`
    #[wasm_bindgen(js_name = elapsedTime)]
    pub fn elapsed_time(&self) -> Result<String, JsValue> {
        Ok(self.borrow()?.elapsed_formatted(now_ms()))
    }

    #[wasm_bindgen(js_name = roomCode)]
    pub fn room_code(&self) -> Result<Option<String>, JsValue> {
        Ok(self.borrow()?.room().map(|code| code.code().to_string()))
    }
}

impl MemoryGame {
    fn borrow(&self) -> Result<std::cell::Ref<'_, BrowserSession>, JsValue> {
        self.inner
            .session
            .try_borrow()
            .map_err(|_| JsValue::from_str("game is busy"))
    }

    /// 渲染回调里再次调用本对象会拿不到借用，此时返回错误而不是 panic。
    fn with_session<F, O>(&self, action: F) -> Result<O, JsValue>
    where
        F: FnOnce(&mut BrowserSession) -> O,
    {
        let output = {
            let mut session = self
                .inner
                .session
                .try_borrow_mut()
                .map_err(|_| JsValue::from_str("game is busy"))?;
            action(&mut session)
        };
        schedule_pump(&self.inner);
        Ok(output)
    }
}

/// 按会话给出的下一个时刻安排一次 `advance`。
fn schedule_pump(inner: &Rc<Inner>) {
    let ticket = inner.ticket.get().wrapping_add(1);
    inner.ticket.set(ticket);

    let now = now_ms();
    let wakeup = match inner.session.try_borrow() {
        Ok(session) => session.next_wakeup(now),
        Err(_) => return,
    };
    let Some(at) = wakeup else {
        return;
    };
    let delay = (at - now).max(0.0).ceil() as u32;
    let weak: Weak<Inner> = Rc::downgrade(inner);

    spawn_local(async move {
        TimeoutFuture::new(delay).await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if inner.ticket.get() != ticket {
            return;
        }
        match inner.session.try_borrow_mut() {
            Ok(mut session) => session.advance(now_ms()),
            Err(_) => warn!("[SESSION] Session busy, retrying on the next wakeup"),
        }
        schedule_pump(&inner);
    });
}

/// 清理玩家输入的房间码，无效时返回错误。
#[wasm_bindgen(js_name = sanitizeRoomCode)]
pub fn sanitize_room_code(input: &str) -> Result<String, JsValue> {
    RoomCode::parse(input)
        .map(String::from)
        .map_err(serde_to_js_error)
}
