use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::VecDeque;

use super::render::Renderer;
use super::scheduler::{Scheduler, Task};
use crate::ai::{CpuDifficulty, CpuOpponent, CpuProfile, CpuStats};
use crate::config::GameConfig;
use crate::game::{
    checked_pair_count, FlipOrigin, GameClock, GameEvent, GameMode, GameState, MatchEngine,
    PeerRole, PlayerSlot, RuleError,
};
use crate::net::{
    ConnectionState, NetError, PeerMessage, PeerSync, PeerTransport, RoomCode, SyncEvent,
};

/// 一局游戏的全部协作者：引擎、电脑对手、对端连接、界面与延时任务。
///
/// 时间一律由调用方以毫秒传入，会话本身不读时钟。
pub struct GameSession<R: Renderer, T: PeerTransport> {
    config: GameConfig,
    engine: MatchEngine,
    cpu: CpuOpponent,
    renderer: R,
    scheduler: Scheduler,
    peer: Option<PeerSync<T>>,
    inbox: VecDeque<PeerMessage>,
    clock: GameClock,
    rng: SmallRng,
}

impl<R: Renderer, T: PeerTransport> GameSession<R, T> {
    pub fn new(config: GameConfig, renderer: R) -> Self {
        let profile = CpuProfile::from_difficulty(config.difficulty);
        let (engine, cpu, rng) = match config.seed {
            Some(seed) => (
                MatchEngine::with_seed(config.mode, seed),
                CpuOpponent::with_seed(profile, seed.wrapping_add(1)),
                SmallRng::seed_from_u64(seed.wrapping_add(2)),
            ),
            None => (
                MatchEngine::new(config.mode),
                CpuOpponent::new(profile),
                SmallRng::from_entropy(),
            ),
        };
        Self {
            config,
            engine,
            cpu,
            renderer,
            scheduler: Scheduler::new(),
            peer: None,
            inbox: VecDeque::new(),
            clock: GameClock::default(),
            rng,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        self.engine.state()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn cpu_stats(&self) -> CpuStats {
        self.cpu.stats()
    }

    pub fn generation(&self) -> u64 {
        self.scheduler.generation()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.peer
            .as_ref()
            .map(PeerSync::state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn room(&self) -> Option<&RoomCode> {
        self.peer.as_ref().map(PeerSync::room)
    }

    pub fn elapsed_ms(&self, now: f64) -> u64 {
        self.clock.elapsed_ms(now)
    }

    pub fn elapsed_formatted(&self, now: f64) -> String {
        self.clock.formatted(now)
    }

    // ---- 设置 ----

    /// 切换模式：丢弃当前对局与连接，清空棋盘，等待重新开始。
    pub fn set_mode(&mut self, mode: GameMode) {
        info!("[SESSION] Switching to {:?}", mode);
        self.cancel_pending();
        self.inbox.clear();
        self.drop_peer();
        self.config.mode = mode;
        self.engine.set_mode(mode);
        self.engine.reset();
        self.cpu.reset();
        self.clock.reset();
        self.render_all();
    }

    pub fn set_difficulty(&mut self, difficulty: CpuDifficulty) {
        self.config.difficulty = difficulty;
        self.cpu.set_profile(CpuProfile::from_difficulty(difficulty));
    }

    /// 下一次发牌生效。
    pub fn set_pair_count(&mut self, pair_count: usize) -> Result<(), RuleError> {
        self.config.pair_count = checked_pair_count(pair_count)?;
        Ok(())
    }

    // ---- 对局 ----

    pub fn start_game(&mut self, now: f64) -> Result<(), NetError> {
        if let GameMode::Online { role } = self.engine.mode() {
            let connected = self.peer.as_ref().is_some_and(PeerSync::is_connected);
            if !connected {
                self.renderer
                    .show_transient_message("Create or join a room first");
                return Err(NetError::NotConnected);
            }
            if role == Some(PeerRole::Guest) {
                self.renderer
                    .show_transient_message("Waiting for the host to start the game");
                return Ok(());
            }
        }

        self.cancel_pending();
        self.inbox.clear();
        self.cpu.reset();
        self.engine.deal(self.config.pair_count);
        self.clock.start(now);
        self.render_all();

        if self.is_host() {
            let message = PeerMessage::InitGame {
                cards: self.engine.board().cards().to_vec(),
                current_player: self.engine.state().current_player,
            };
            self.send(&message);
        }
        Ok(())
    }

    pub fn click(&mut self, index: usize, now: f64) {
        let events = self.engine.flip(index, FlipOrigin::Local);
        self.handle_flip(events, FlipOrigin::Local, now);
    }

    // ---- 联机 ----

    pub fn create_room(&mut self, transport: T, now: f64) -> Result<RoomCode, NetError> {
        self.leave_game();
        let code = RoomCode::generate(&mut self.rng);
        let peer = PeerSync::host(transport, code.clone()).map_err(|error| {
            self.report_failure(&error);
            error
        })?;
        self.peer = Some(peer);
        self.enter_online(PeerRole::Host, ConnectionState::Listening);
        debug!("[SESSION] Room {} open at {}", code, now);
        Ok(code)
    }

    pub fn join_room(&mut self, input: &str, transport: T, now: f64) -> Result<RoomCode, NetError> {
        let code = RoomCode::parse(input).map_err(|error| {
            self.renderer.show_transient_message(&error.to_string());
            error
        })?;
        self.leave_game();
        let peer = PeerSync::join(transport, code.clone(), now, self.config.join_timeout_ms)
            .map_err(|error| {
                self.report_failure(&error);
                error
            })?;
        self.peer = Some(peer);
        self.enter_online(PeerRole::Guest, ConnectionState::Connecting);
        Ok(code)
    }

    pub fn disconnect(&mut self) {
        if self.peer.is_none() {
            return;
        }
        info!("[SESSION] Disconnecting on request");
        self.set_mode(GameMode::SinglePlayer);
        self.renderer.show_transient_message("Disconnected");
    }

    // ---- 推进 ----

    /// 处理到期的一切：对端事件、入站消息与延时任务。
    pub fn advance(&mut self, now: f64) {
        self.pump_peer(now);
        loop {
            self.drain_inbox(now);
            match self.scheduler.pop_due(now) {
                Some(task) => self.run(task, now),
                None => break,
            }
        }
    }

    /// 下一次需要调用 `advance` 的时刻；没有连接也没有任务时为 `None`。
    pub fn next_wakeup(&self, now: f64) -> Option<f64> {
        let poll = self
            .peer
            .as_ref()
            .map(|_| now + f64::from(self.config.timings.peer_poll_ms));
        match (self.scheduler.next_due(), poll) {
            (Some(due), Some(poll)) => Some(due.min(poll)),
            (due, poll) => due.or(poll),
        }
    }

    fn run(&mut self, task: Task, now: f64) {
        debug!("[SESSION] Running {:?}", task);
        match task {
            Task::SettlePair { origin } => self.settle(origin, now),
            Task::CpuTurn => self.cpu_turn(now),
            Task::CpuSecondFlip { index } => {
                if self.cpu_to_move() {
                    let events = self.engine.flip(index, FlipOrigin::Cpu);
                    self.handle_flip(events, FlipOrigin::Cpu, now);
                }
            }
            Task::AnnounceGameOver => {
                let state = self.engine.state();
                if let Some(outcome) = state.outcome {
                    let scores = state.scores;
                    self.renderer.show_game_over(outcome, scores);
                }
            }
        }
    }

    fn handle_flip(&mut self, events: Vec<GameEvent>, origin: FlipOrigin, now: f64) {
        if events.is_empty() {
            return;
        }
        for event in &events {
            match *event {
                GameEvent::CardFlipped {
                    position,
                    pokemon_id,
                    ..
                } => {
                    if origin == FlipOrigin::Cpu {
                        self.cpu.observe(pokemon_id, position);
                    }
                    if origin == FlipOrigin::Local && self.engine.mode().is_online() {
                        self.send(&PeerMessage::CardFlip {
                            index: position.index(),
                        });
                    }
                }
                GameEvent::PairRevealed { matching, .. } => {
                    let timings = self.config.timings;
                    let delay = if matching {
                        timings.match_reveal_ms
                    } else {
                        timings.mismatch_reveal_ms
                    };
                    self.scheduler
                        .schedule(now, delay, Task::SettlePair { origin });
                }
                _ => {}
            }
        }
        self.renderer.render_board(self.engine.board().cards());
    }

    fn settle(&mut self, origin: FlipOrigin, now: f64) {
        let events = self.engine.evaluate_pair();
        let single_player = self.engine.mode() == GameMode::SinglePlayer;

        for event in &events {
            match *event {
                GameEvent::PairMatched {
                    pokemon_id,
                    player,
                    score,
                    ..
                } => {
                    self.cpu.forget(pokemon_id);
                    if single_player && player == PlayerSlot::Two {
                        self.cpu.record_pair_found();
                    }
                    self.renderer.set_score(player, score);
                    self.renderer.show_transient_message("Pair found!");
                }
                GameEvent::TurnChanged { player } => {
                    self.renderer.set_turn_indicator(player);
                    if origin == FlipOrigin::Local && self.engine.mode().is_online() {
                        self.send(&PeerMessage::TurnChange {
                            current_player: player,
                        });
                    }
                }
                GameEvent::GameOver { .. } => {
                    self.clock.stop(now);
                    self.scheduler.schedule(
                        now,
                        self.config.timings.game_over_delay_ms,
                        Task::AnnounceGameOver,
                    );
                }
                _ => {}
            }
        }
        if !events.is_empty() {
            self.renderer.render_board(self.engine.board().cards());
        }

        if self.cpu_to_move() && !self.scheduler.contains(Task::CpuTurn) {
            let delay = self
                .config
                .timings
                .cpu_turn_delay_ms
                .saturating_add(self.cpu.thinking_delay_ms());
            self.scheduler.schedule(now, delay, Task::CpuTurn);
        }
    }

    fn cpu_turn(&mut self, now: f64) {
        if !self.cpu_to_move() {
            return;
        }
        match self.cpu.choose_move(self.engine.board()) {
            Some(chosen) => {
                let events = self.engine.flip(chosen.first.index(), FlipOrigin::Cpu);
                self.handle_flip(events, FlipOrigin::Cpu, now);
                self.scheduler.schedule(
                    now,
                    self.config.timings.cpu_flip_gap_ms,
                    Task::CpuSecondFlip {
                        index: chosen.second.index(),
                    },
                );
            }
            None => warn!("[CPU] Fewer than two cards left, skipping turn"),
        }
    }

    fn cpu_to_move(&self) -> bool {
        let state = self.engine.state();
        state.mode == GameMode::SinglePlayer
            && state.is_in_play()
            && state.current_player == PlayerSlot::Two
    }

    // ---- 对端 ----

    fn pump_peer(&mut self, now: f64) {
        let events = match self.peer.as_mut() {
            Some(peer) => peer.poll(now),
            None => return,
        };
        for event in events {
            match event {
                SyncEvent::Connected => self.on_connected(now),
                SyncEvent::Message(message) => self.inbox.push_back(message),
                SyncEvent::Failed(error) => {
                    self.cancel_pending();
                    self.inbox.clear();
                    self.drop_peer();
                    self.report_failure(&error);
                    return;
                }
                SyncEvent::Closed => {
                    warn!("[SESSION] Peer left, falling back to single player");
                    self.set_mode(GameMode::SinglePlayer);
                    self.renderer
                        .show_transient_message("The connection was closed. The game is over.");
                    return;
                }
            }
        }
    }

    fn on_connected(&mut self, now: f64) {
        self.renderer
            .set_connection_status(ConnectionState::Connected);
        if self.is_host() {
            self.renderer
                .show_transient_message("Player 2 connected");
            if let Err(error) = self.start_game(now) {
                warn!("[SESSION] Could not deal for the guest: {}", error);
            }
        } else {
            self.renderer
                .show_transient_message("Connected, waiting for the host to start the game");
        }
    }

    /// 引擎解锁时按顺序应用对端消息，保证不会插进一次待结算的翻牌中间。
    fn drain_inbox(&mut self, now: f64) {
        while !self.engine.state().is_locked {
            let Some(message) = self.inbox.pop_front() else {
                break;
            };
            self.apply_remote(message, now);
        }
    }

    fn apply_remote(&mut self, message: PeerMessage, now: f64) {
        match message {
            PeerMessage::InitGame {
                cards,
                current_player,
            } => {
                if self.is_host() {
                    warn!("[SESSION] Host ignores INIT_GAME from guest");
                    return;
                }
                self.cancel_pending();
                self.cpu.reset();
                match self.engine.load_deal(cards, current_player) {
                    Ok(_) => {
                        self.clock.start(now);
                        self.render_all();
                    }
                    Err(error) => {
                        warn!("[SESSION] Rejected deal from host: {:?}", error);
                        self.renderer
                            .show_transient_message("Received an invalid board from the host");
                    }
                }
            }
            PeerMessage::CardFlip { index } => {
                // 自己回合里到达的翻牌来自已被丢弃的局面。
                let state = self.engine.state();
                if state.player_number() == Some(state.current_player) {
                    debug!("[SESSION] Dropping CARD_FLIP {} during our own turn", index);
                    return;
                }
                let events = self.engine.flip(index, FlipOrigin::Remote);
                self.handle_flip(events, FlipOrigin::Remote, now);
            }
            PeerMessage::TurnChange { current_player } => {
                if !self.engine.apply_turn_change(current_player).is_empty() {
                    self.renderer.set_turn_indicator(current_player);
                }
            }
        }
    }

    fn send(&mut self, message: &PeerMessage) {
        if let Some(peer) = self.peer.as_mut() {
            if let Err(error) = peer.send(message) {
                warn!("[SESSION] Could not send {:?}: {}", message, error);
            }
        }
    }

    fn is_host(&self) -> bool {
        self.engine.state().player_number() == Some(PlayerSlot::One)
            && self.peer.as_ref().map(PeerSync::role) == Some(PeerRole::Host)
    }

    fn enter_online(&mut self, role: PeerRole, status: ConnectionState) {
        let mode = GameMode::Online { role: Some(role) };
        self.config.mode = mode;
        self.engine.set_mode(mode);
        self.renderer.set_connection_status(status);
        self.render_all();
    }

    /// 离开当前对局与连接，但保持在线模式，供创建或加入房间使用。
    fn leave_game(&mut self) {
        self.cancel_pending();
        self.inbox.clear();
        self.drop_peer();
        let mode = GameMode::Online { role: None };
        self.config.mode = mode;
        self.engine.set_mode(mode);
        self.engine.reset();
        self.cpu.reset();
        self.clock.reset();
    }

    fn report_failure(&mut self, error: &NetError) {
        warn!("[SESSION] {}", error);
        self.renderer.show_transient_message(&error.to_string());
        self.renderer.set_connection_status(ConnectionState::Closed);
    }

    fn drop_peer(&mut self) {
        if let Some(mut peer) = self.peer.take() {
            peer.disconnect();
            self.renderer
                .set_connection_status(ConnectionState::Disconnected);
        }
    }

    fn cancel_pending(&mut self) {
        let generation = self.scheduler.cancel_all();
        debug!("[SESSION] Pending tasks cancelled (generation {})", generation);
    }

    fn render_all(&mut self) {
        let state = self.engine.state();
        self.renderer.render_board(state.board.cards());
        self.renderer.set_score(PlayerSlot::One, state.scores.player1);
        self.renderer.set_score(PlayerSlot::Two, state.scores.player2);
        self.renderer.set_turn_indicator(state.current_player);
    }
}
