use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::NetError;

/// 传输层地址的命名空间前缀。
pub const ROOM_NAMESPACE: &str = "pokemon-memory-";
pub const ROOM_CODE_LEN: usize = 9;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 9 位 36 进制房间码。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let code = (0..ROOM_CODE_LEN)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        RoomCode(code)
    }

    /// 接受玩家输入：去空白、去前缀、去非字母数字后必须正好 9 位。
    pub fn parse(input: &str) -> Result<Self, NetError> {
        let code = sanitize(input);
        if code.chars().count() == ROOM_CODE_LEN {
            Ok(RoomCode(code))
        } else {
            Err(NetError::InvalidRoomCode {
                input: input.to_string(),
            })
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// 传输层使用的完整地址。
    pub fn address(&self) -> String {
        format!("{ROOM_NAMESPACE}{}", self.0)
    }
}

pub fn sanitize(input: &str) -> String {
    let trimmed = input.trim();
    let stripped = trimmed.strip_prefix(ROOM_NAMESPACE).unwrap_or(trimmed);
    stripped
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = NetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RoomCode::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}
