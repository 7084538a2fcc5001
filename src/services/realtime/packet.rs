// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Engine packet: `<type>[payload]`, where a `4` (message) payload is a
//! Socket.IO packet `<type>[<namespace>,][<ack id>][<json>]`.
//! Binary packets are not used by the status channel and are rejected.

use serde::Deserialize;
use serde_json::Value;

/// Default Socket.IO namespace.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Handshake payload of an Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings
    #[serde(default)]
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong
    #[serde(default)]
    pub ping_timeout: u64,
}

/// Transport-level packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenInfo),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
}

impl SocketPacketKind {
    fn code(self) -> char {
        match self {
            SocketPacketKind::Connect => '0',
            SocketPacketKind::Disconnect => '1',
            SocketPacketKind::Event => '2',
            SocketPacketKind::Ack => '3',
            SocketPacketKind::ConnectError => '4',
        }
    }
}

/// Socket.IO packet carried inside an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: SocketPacketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    fn new(kind: SocketPacketKind, data: Option<Value>) -> Self {
        Self {
            kind,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ack_id: None,
            data,
        }
    }

    /// CONNECT to the default namespace with an auth payload.
    pub fn connect(auth: Value) -> Self {
        Self::new(SocketPacketKind::Connect, Some(auth))
    }

    pub fn disconnect() -> Self {
        Self::new(SocketPacketKind::Disconnect, None)
    }

    /// EVENT `[name, ...args]`.
    pub fn event(name: &str, args: impl IntoIterator<Item = Value>) -> Self {
        let mut array = vec![Value::String(name.to_string())];
        array.extend(args);
        Self::new(SocketPacketKind::Event, Some(Value::Array(array)))
    }

    /// Event name and arguments, for EVENT packets.
    pub fn as_event(&self) -> Option<(&str, &[Value])> {
        if self.kind != SocketPacketKind::Event {
            return None;
        }
        match self.data.as_ref()? {
            Value::Array(items) => {
                let (name, args) = items.split_first()?;
                Some((name.as_str()?, args))
            }
            _ => None,
        }
    }

    /// Error message carried by a CONNECT_ERROR packet.
    pub fn error_message(&self) -> Option<String> {
        match self.data.as_ref()? {
            Value::String(message) => Some(message.clone()),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,

    #[error("unknown packet type `{0}`")]
    UnknownType(char),

    #[error("binary packets are not supported")]
    Binary,

    #[error("invalid ack id")]
    InvalidAckId,

    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
}

/// Decode one text frame.
pub fn decode(frame: &str) -> Result<EnginePacket, PacketError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let payload = chars.as_str();

    match kind {
        '0' => serde_json::from_str(payload)
            .map(EnginePacket::Open)
            .map_err(|e| PacketError::InvalidJson(e.to_string())),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(payload.to_string())),
        '3' => Ok(EnginePacket::Pong(payload.to_string())),
        '4' => decode_socket(payload).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(PacketError::UnknownType(other)),
    }
}

fn decode_socket(payload: &str) -> Result<SocketPacket, PacketError> {
    let mut chars = payload.chars();
    let kind = match chars.next().ok_or(PacketError::Empty)? {
        '0' => SocketPacketKind::Connect,
        '1' => SocketPacketKind::Disconnect,
        '2' => SocketPacketKind::Event,
        '3' => SocketPacketKind::Ack,
        '4' => SocketPacketKind::ConnectError,
        '5' | '6' => return Err(PacketError::Binary),
        other => return Err(PacketError::UnknownType(other)),
    };
    let mut rest = chars.as_str();

    let mut namespace = DEFAULT_NAMESPACE.to_string();
    if rest.starts_with('/') {
        match rest.find(',') {
            Some(end) => {
                namespace = rest[..end].to_string();
                rest = &rest[end + 1..];
            }
            None => {
                namespace = rest.to_string();
                rest = "";
            }
        }
    }

    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let ack_id = if digits > 0 {
        Some(
            rest[..digits]
                .parse()
                .map_err(|_| PacketError::InvalidAckId)?,
        )
    } else {
        None
    };
    rest = &rest[digits..];

    let data = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str(rest).map_err(|e| PacketError::InvalidJson(e.to_string()))?)
    };

    Ok(SocketPacket {
        kind,
        namespace,
        ack_id,
        data,
    })
}

/// Encode one packet as a text frame.
pub fn encode(packet: &EnginePacket) -> String {
    match packet {
        // Clients never send `open`; render the sid for completeness
        EnginePacket::Open(info) => format!("0{{\"sid\":{}}}", Value::String(info.sid.clone())),
        EnginePacket::Close => "1".to_string(),
        EnginePacket::Ping(data) => format!("2{}", data),
        EnginePacket::Pong(data) => format!("3{}", data),
        EnginePacket::Message(socket) => format!("4{}", encode_socket(socket)),
        EnginePacket::Upgrade => "5".to_string(),
        EnginePacket::Noop => "6".to_string(),
    }
}

fn encode_socket(packet: &SocketPacket) -> String {
    let mut out = String::new();
    out.push(packet.kind.code());
    if packet.namespace != DEFAULT_NAMESPACE {
        out.push_str(&packet.namespace);
        out.push(',');
    }
    if let Some(id) = packet.ack_id {
        out.push_str(&id.to_string());
    }
    if let Some(data) = &packet.data {
        out.push_str(&data.to_string());
    }
    out
}
