use serde::{Deserialize, Serialize};
use std::fmt;

/// 联机过程中可恢复的错误，玩家重试即可。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum NetError {
    ConnectionError { reason: String },
    ConnectionTimeout { waited_ms: u64 },
    RoomNotFound { room: String },
    InvalidRoomCode { input: String },
    NotConnected,
}

impl NetError {
    pub fn connection(reason: impl Into<String>) -> Self {
        NetError::ConnectionError {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::ConnectionError { reason } => write!(f, "connection error: {reason}"),
            NetError::ConnectionTimeout { waited_ms } => {
                write!(f, "no answer from the room after {}s", waited_ms / 1000)
            }
            NetError::RoomNotFound { room } => write!(f, "room {room} does not exist"),
            NetError::InvalidRoomCode { input } => {
                write!(f, "\"{input}\" is not a valid room code")
            }
            NetError::NotConnected => write!(f, "not connected to a peer"),
        }
    }
}

impl std::error::Error for NetError {}
