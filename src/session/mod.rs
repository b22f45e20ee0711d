//! 会话层：把引擎事件翻译成界面调用，并驱动电脑回合与联机同步的延时任务。

pub mod game_session;
pub mod render;
pub mod scheduler;

pub use game_session::GameSession;
pub use render::Renderer;
pub use scheduler::{Scheduler, Task};
