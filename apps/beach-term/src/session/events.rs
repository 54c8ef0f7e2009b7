//! Payloads exchanged with the terminal proxy over the shared transport.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::secret::SessionSecret;

pub mod name {
    pub const HOST: &str = "host";
    pub const SHARE_ROOM: &str = "shareRoom";
    pub const TOKEN: &str = "token";
    pub const DATA: &str = "data";
    pub const SHARE_ROOM_DATA: &str = "shareRoomData";
    pub const RESIZE: &str = "resize";
    pub const ROOM: &str = "room";
    pub const LOGOUT: &str = "logout";
    pub const DISCONNECT: &str = transport_bus::DISCONNECT_EVENT;
}

/// Server-assigned identifier binding a session's traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRequest {
    pub uuid: String,
    pub userid: String,
    pub secret: SessionSecret,
    pub size: [u16; 2],
    #[serde(rename = "type")]
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRoomRequest {
    #[serde(rename = "shareRoomID")]
    pub share_room_id: String,
    pub secret: SessionSecret,
    pub size: [u16; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub token: String,
    pub secret: SessionSecret,
    pub size: [u16; 2],
}

/// `room` event. A reply without a room never binds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAssigned {
    pub secret: SessionSecret,
    #[serde(default)]
    pub room: Option<RoomId>,
}

/// Output for a room, used by both `data` and `shareRoomData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomOutput {
    pub data: String,
    #[serde(default)]
    pub room: Option<RoomId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutNotice {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub room: Option<RoomId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFrame {
    pub data: String,
    pub room: RoomId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeFrame {
    pub cols: u16,
    pub rows: u16,
}

pub fn encode<T: Serialize>(payload: &T) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(payload).map(Bytes::from)
}

pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(payload)
}
