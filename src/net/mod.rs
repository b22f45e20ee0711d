//! 联机对战：房间码、消息协议、传输抽象与连接状态。

pub mod error;
pub mod loopback;
pub mod protocol;
pub mod room;
pub mod sync;
pub mod transport;

pub use error::NetError;
pub use loopback::{LoopbackNetwork, LoopbackTransport};
pub use protocol::PeerMessage;
pub use room::{sanitize, RoomCode, ROOM_CODE_LEN, ROOM_NAMESPACE};
pub use sync::{PeerSync, SyncEvent};
pub use transport::{ConnectionState, PeerTransport, TransportEvent};
