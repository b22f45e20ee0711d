//! 浏览器侧的协作者实现：JS 渲染对象与 PeerJS 传输。

pub mod peerjs;
pub mod renderer;

pub use peerjs::PeerJsTransport;
pub use renderer::JsRenderer;
