//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Every WebSocket text frame carries one Engine.IO packet: a single type
//! digit followed by its payload. Message packets (`4`) wrap a Socket.IO
//! packet of the form
//! `<type>[<namespace>,][<ack id>][<json>]`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// The default (root) namespace
pub const DEFAULT_NAMESPACE: &str = "/";

/// Engine.IO open handshake payload
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

fn protocol(message: impl Into<String>) -> Error {
    Error::Protocol {
        message: message.into(),
    }
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or_else(|| protocol("empty packet"))?;
        let payload = chars.as_str();

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(payload)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(payload.to_string())),
            '3' => Ok(Self::Pong(payload.to_string())),
            '4' => Ok(Self::Message(SocketPacket::decode(payload)?)),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(protocol(format!("unknown engine packet type {other:?}"))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Open(handshake) => format!(
                "0{{\"sid\":{},\"upgrades\":[],\"pingInterval\":{},\"pingTimeout\":{}}}",
                Value::String(handshake.sid.clone()),
                handshake.ping_interval,
                handshake.ping_timeout
            ),
            Self::Close => "1".to_string(),
            Self::Ping(payload) => format!("2{payload}"),
            Self::Pong(payload) => format!("3{payload}"),
            Self::Message(packet) => format!("4{}", packet.encode()),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }
}

impl SocketPacket {
    /// Connect request for a namespace
    pub fn connect(namespace: &str) -> Self {
        Self::Connect {
            namespace: namespace.to_string(),
            data: None,
        }
    }

    /// Event on the root namespace without ack
    pub fn event(name: &str, args: Vec<Value>) -> Self {
        Self::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            id: None,
            name: name.to_string(),
            args,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Ack { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or_else(|| protocol("empty socket packet"))?;
        let mut rest = chars.as_str();

        if kind == '5' || kind == '6' {
            return Err(protocol("binary packets are not supported"));
        }

        let mut namespace = DEFAULT_NAMESPACE.to_string();
        if rest.starts_with('/') {
            match rest.find(',') {
                Some(comma) => {
                    namespace = rest[..comma].to_string();
                    rest = &rest[comma + 1..];
                }
                None => {
                    namespace = rest.to_string();
                    rest = "";
                }
            }
        }

        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        let id = if digits > 0 {
            let parsed = rest[..digits]
                .parse::<u64>()
                .map_err(|e| protocol(format!("bad ack id: {e}")))?;
            rest = &rest[digits..];
            Some(parsed)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest)?)
        };

        match kind {
            '0' => Ok(Self::Connect { namespace, data }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let Some(Value::Array(mut items)) = data else {
                    return Err(protocol("event payload must be an array"));
                };
                if items.is_empty() {
                    return Err(protocol("event payload is missing a name"));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(protocol("event name must be a string"));
                };
                Ok(Self::Event {
                    namespace,
                    id,
                    name,
                    args: items,
                })
            }
            '3' => {
                let id = id.ok_or_else(|| protocol("ack without id"))?;
                let args = match data {
                    Some(Value::Array(items)) => items,
                    None => Vec::new(),
                    Some(_) => return Err(protocol("ack payload must be an array")),
                };
                Ok(Self::Ack { namespace, id, args })
            }
            '4' => Ok(Self::ConnectError { namespace, data }),
            other => Err(protocol(format!("unknown socket packet type {other:?}"))),
        }
    }

    pub fn encode(&self) -> String {
        let (kind, id, data) = match self {
            Self::Connect { data, .. } => ('0', None, data.clone()),
            Self::Disconnect { .. } => ('1', None, None),
            Self::Event { id, name, args, .. } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                ('2', *id, Some(Value::Array(items)))
            }
            Self::Ack { id, args, .. } => ('3', Some(*id), Some(Value::Array(args.clone()))),
            Self::ConnectError { data, .. } => ('4', None, data.clone()),
        };

        let mut out = String::new();
        out.push(kind);
        let namespace = self.namespace();
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = data {
            out.push_str(&data.to_string());
        }
        out
    }
}
