//! Text wire formats.
//!
//! | Message        | Direction          | Format                                  |
//! |----------------|--------------------|-----------------------------------------|
//! | handshake      | client → server    | `READY`                                 |
//! | handshake reply| server → client    | `{ordinal} {port}` or `FULL`            |
//! | input          | client → server    | `{name} {tag} {x} {y}`                  |
//! | snapshot       | server → client    | `{name} {tag} {x} {y};` per entity      |
//! | peer position  | peer ↔ peer        | `{id}:{x},{y}` records joined with `;`  |
//!
//! Parsing never panics; any malformed field yields a [`ProtocolError`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::world::{EntityKind, EntityStore};

pub const HANDSHAKE_REQUEST: &str = "READY";
pub const SERVER_FULL_REPLY: &str = "FULL";

/// Reported position that asks the server to delete the entity.
pub const DELETION_SENTINEL: (f64, f64) = (-1.0, -1.0);

/// Largest datagram any message is expected to need.
pub const MAX_MESSAGE_SIZE: usize = 8192;

pub const PLAYER_NAME_PREFIX: &str = "Player";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid number in field `{field}`: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Name of the player entity owned by the peer with `ordinal`.
pub fn player_name(ordinal: u32) -> String {
    format!("{PLAYER_NAME_PREFIX}{ordinal}")
}

pub fn is_player_name(name: &str) -> bool {
    name.starts_with(PLAYER_NAME_PREFIX)
}

fn field<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<&'a str, ProtocolError> {
    parts.next().ok_or(ProtocolError::MissingField(name))
}

fn number<T: FromStr>(raw: &str, name: &'static str) -> Result<T, ProtocolError> {
    raw.parse().map_err(|_| ProtocolError::InvalidNumber {
        field: name,
        value: raw.to_string(),
    })
}

/// Like [`number`], but NaN and infinities are malformed too.
fn coordinate(raw: &str, name: &'static str) -> Result<f64, ProtocolError> {
    let value: f64 = number(raw, name)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ProtocolError::InvalidNumber {
            field: name,
            value: raw.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeReply {
    pub ordinal: u32,
    pub port: u16,
}

impl fmt::Display for HandshakeReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ordinal, self.port)
    }
}

impl FromStr for HandshakeReply {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let mut parts = s.split_whitespace();
        let ordinal = number(field(&mut parts, "ordinal")?, "ordinal")?;
        let port = number(field(&mut parts, "port")?, "port")?;

        Ok(Self { ordinal, port })
    }
}

/// A client's report of its own entity.
#[derive(Debug, Clone, PartialEq)]
pub struct InputMessage {
    pub name: String,
    pub kind_tag: u64,
    pub x: f64,
    pub y: f64,
}

impl InputMessage {
    pub fn new(name: impl Into<String>, kind: EntityKind, x: f64, y: f64) -> Self {
        Self {
            name: name.into(),
            kind_tag: kind.tag(),
            x,
            y,
        }
    }

    pub fn deletion(name: impl Into<String>, kind: EntityKind) -> Self {
        Self::new(name, kind, DELETION_SENTINEL.0, DELETION_SENTINEL.1)
    }

    pub fn is_deletion(&self) -> bool {
        (self.x, self.y) == DELETION_SENTINEL
    }

    pub fn kind(&self) -> EntityKind {
        EntityKind::from_tag(self.kind_tag)
    }
}

impl fmt::Display for InputMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.name, self.kind_tag, self.x, self.y)
    }
}

impl FromStr for InputMessage {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let mut parts = s.split_whitespace();
        let name = field(&mut parts, "name")?.to_string();
        let kind_tag = number(field(&mut parts, "tag")?, "tag")?;
        let x = coordinate(field(&mut parts, "x")?, "x")?;
        let y = coordinate(field(&mut parts, "y")?, "y")?;

        Ok(Self {
            name,
            kind_tag,
            x,
            y,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub name: String,
    pub kind_tag: u64,
    pub x: f64,
    pub y: f64,
}

impl SnapshotEntry {
    pub fn kind(&self) -> EntityKind {
        EntityKind::from_tag(self.kind_tag)
    }

    pub fn is_deletion(&self) -> bool {
        (self.x, self.y) == DELETION_SENTINEL
    }
}

/// Positions of every synchronized entity at the moment a reply was composed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Captures every synchronized entity in `store`, sorted by name.
    pub fn capture(store: &EntityStore) -> Self {
        let mut entries: Vec<SnapshotEntry> = store
            .iter()
            .filter(|entity| entity.kind().is_synchronized())
            .map(|entity| SnapshotEntry {
                name: entity.name().to_string(),
                kind_tag: entity.kind().tag(),
                x: entity.rect.x,
                y: entity.rect.y,
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Self { entries }
    }

    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} {} {} {};", e.name, e.kind_tag, e.x, e.y))
            .collect()
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut entries = Vec::new();

        for record in text.split(';') {
            let record = record.trim();
            if record.is_empty() {
                continue;
            }

            let message: InputMessage = record.parse()?;
            entries.push(SnapshotEntry {
                name: message.name,
                kind_tag: message.kind_tag,
                x: message.x,
                y: message.y,
            });
        }

        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `name → (kind tag, x, y)`.
    pub fn to_map(&self) -> HashMap<String, (u64, f64, f64)> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), (e.kind_tag, e.x, e.y)))
            .collect()
    }
}

/// Legacy direct-pair position record.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerPosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

impl PeerPosition {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
        }
    }

    pub fn encode_all(records: &[PeerPosition]) -> String {
        records
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Parses every record, keeping the well-formed ones and the errors apart.
    pub fn parse_all(text: &str) -> (Vec<PeerPosition>, Vec<ProtocolError>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();

        for raw in text.split(';').map(str::trim).filter(|r| !r.is_empty()) {
            match raw.parse() {
                Ok(record) => records.push(record),
                Err(e) => errors.push(e),
            }
        }

        (records, errors)
    }
}

impl fmt::Display for PeerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{}", self.id, self.x, self.y)
    }
}

impl FromStr for PeerPosition {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (id, coords) = s.split_once(':').ok_or(ProtocolError::MissingField("x"))?;
        let (x, y) = coords
            .split_once(',')
            .ok_or(ProtocolError::MissingField("y"))?;

        Ok(Self {
            id: id.to_string(),
            x: coordinate(x.trim(), "x")?,
            y: coordinate(y.trim(), "y")?,
        })
    }
}
