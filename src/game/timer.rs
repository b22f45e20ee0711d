use serde::{Deserialize, Serialize};

/// 对局计时：发牌时开始，终局时停止。时间由调用方传入（毫秒）。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct GameClock {
    started_at: Option<f64>,
    stopped_at: Option<f64>,
}

impl GameClock {
    pub fn start(&mut self, now_ms: f64) {
        self.started_at = Some(now_ms);
        self.stopped_at = None;
    }

    pub fn stop(&mut self, now_ms: f64) {
        if self.is_running() {
            self.stopped_at = Some(now_ms);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.stopped_at.is_none()
    }

    pub fn elapsed_ms(&self, now_ms: f64) -> u64 {
        match self.started_at {
            Some(start) => (self.stopped_at.unwrap_or(now_ms) - start).max(0.0) as u64,
            None => 0,
        }
    }

    pub fn formatted(&self, now_ms: f64) -> String {
        format_elapsed(self.elapsed_ms(now_ms))
    }
}

/// 格式化为 `mm:ss`。
pub fn format_elapsed(elapsed_ms: u64) -> String {
    let total_seconds = elapsed_ms / 1000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
