//! Wire format of the coach channel.
//!
//! Server messages are parenthesised trees of atoms, e.g.
//! `(ok look 120 ((b) 0.5 -3.2 0 0) ((p "base_left" 7) 10.1 3.4 0 0 0 0))`.
//! [`parse`] turns such a line into a [`MessageNode`] tree in one recursive-descent pass.
//! Outgoing traffic is built from the fixed set of [`Command`] templates instead.
//!
//! The typed helpers at the bottom of this module ([`WorldSnapshot`], [`HearMessage`],
//! [`team_names`]) validate the shape of a message body once so that handlers never index
//! positionally into raw trees.

use std::fmt::{self, Display};

use crate::error::{Result, TrainerError};
use crate::geometry::Vector2;

/// A parsed message: either a bare atom or a parenthesised list.
///
/// Quoted strings are stored as atoms with the quotes stripped.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageNode {
    /// A token or quoted string
    Atom(String),
    /// A parenthesised sequence
    List(Vec<MessageNode>),
}

impl MessageNode {
    /// Builds an atom that displays back to the same text.
    ///
    /// The wire format has no escapes, so text starting with `"`, or holding a `"` together
    /// with whitespace or parentheses, cannot be written and is rejected.
    ///
    /// # Errors
    /// [`TrainerError::MalformedMessage`] for such text.
    pub fn atom(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.starts_with('"') || (Self::needs_quotes(&s) && s.contains('"')) {
            return Err(TrainerError::malformed(s, "atom cannot be written without escapes"));
        }
        Ok(MessageNode::Atom(s))
    }

    /// Returns the atom text, `None` for lists
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            MessageNode::Atom(s) => Some(s),
            MessageNode::List(_) => None,
        }
    }

    /// Returns the list items, `None` for atoms
    pub fn as_list(&self) -> Option<&[MessageNode]> {
        match self {
            MessageNode::Atom(_) => None,
            MessageNode::List(items) => Some(items),
        }
    }

    fn needs_quotes(s: &str) -> bool {
        s.is_empty()
            || s
                .chars()
                .any(|c| c.is_ascii_whitespace() || c == '(' || c == ')')
    }
}

impl Display for MessageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageNode::Atom(s) if Self::needs_quotes(s) => write!(f, "\"{s}\""),
            MessageNode::Atom(s) => write!(f, "{s}"),
            MessageNode::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parses one complete server message.
///
/// The whole input must be consumed: a missing opening parenthesis, an unterminated list or
/// trailing characters after the closing parenthesis are all [`TrainerError::MalformedMessage`].
pub fn parse(text: &str) -> Result<MessageNode> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(TrainerError::malformed(text, "message must start with '('"));
    }
    let (items, end) = parse_list(text, 1)?;
    if end != bytes.len() {
        return Err(TrainerError::malformed(text, "trailing characters"));
    }
    Ok(MessageNode::List(items))
}

/// Parses list items starting right after an opening parenthesis.
/// Returns the items and the index just past the matching `)`.
fn parse_list(text: &str, mut ind: usize) -> Result<(Vec<MessageNode>, usize)> {
    let bytes = text.as_bytes();
    let mut items = Vec::new();
    loop {
        let Some(&c) = bytes.get(ind) else {
            return Err(TrainerError::malformed(text, "unterminated list"));
        };
        match c {
            b'"' => {
                let start = ind + 1;
                let Some(len) = bytes[start..].iter().position(|&b| b == b'"') else {
                    return Err(TrainerError::malformed(text, "unterminated string"));
                };
                items.push(MessageNode::Atom(text[start..start + len].to_string()));
                ind = start + len + 1;
            }
            b'(' => {
                let (inner, next) = parse_list(text, ind + 1)?;
                items.push(MessageNode::List(inner));
                ind = next;
            }
            b')' => return Ok((items, ind + 1)),
            c if c.is_ascii_whitespace() => ind += 1,
            _ => {
                let start = ind;
                while let Some(&b) = bytes.get(ind) {
                    if b.is_ascii_whitespace() || b == b'(' || b == b')' {
                        break;
                    }
                    ind += 1;
                }
                items.push(MessageNode::Atom(text[start..ind].to_string()));
            }
        }
    }
}

/// Outgoing coach commands.
///
/// `Display` renders the exact bytes expected by the server (without the NUL terminator).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `(init (version 8.0))`
    Init,
    /// `(ear on)`
    EarOn,
    /// `(team_names)`
    TeamNames,
    /// `(look)`
    Look,
    /// `(move (player <team> <unum>) <x> <y>)`
    MovePlayer {
        /// Team name
        team: String,
        /// Uniform number
        unum: u8,
        /// Target position
        pos: Vector2,
    },
    /// `(move (ball) <x> <y> 0.0 0.0 0.0)`
    MoveBall(Vector2),
    /// `(recover)`
    Recover,
    /// `(change_mode <mode>)`
    ChangeMode(String),
    /// `(say <text>)`
    Say(String),
    /// `(disconnect_player <team> <unum>)`
    DisconnectPlayer {
        /// Team name
        team: String,
        /// Uniform number
        unum: u8,
    },
    /// `(bye)`
    Bye,
}

impl Command {
    /// `(change_mode play_on)`
    pub fn play_on() -> Self {
        Command::ChangeMode("play_on".to_string())
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Init => write!(f, "(init (version 8.0))"),
            Command::EarOn => write!(f, "(ear on)"),
            Command::TeamNames => write!(f, "(team_names)"),
            Command::Look => write!(f, "(look)"),
            Command::MovePlayer { team, unum, pos } => {
                write!(f, "(move (player {team} {unum}) {:.6} {:.6})", pos.x, pos.y)
            }
            Command::MoveBall(pos) => {
                write!(f, "(move (ball) {:.6} {:.6} 0.0 0.0 0.0)", pos.x, pos.y)
            }
            Command::Recover => write!(f, "(recover)"),
            Command::ChangeMode(mode) => write!(f, "(change_mode {mode})"),
            Command::Say(text) => write!(f, "(say {text})"),
            Command::DisconnectPlayer { team, unum } => {
                write!(f, "(disconnect_player {team} {unum})")
            }
            Command::Bye => write!(f, "(bye)"),
        }
    }
}

/// A player entry of a `look` / `see_global` snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSighting {
    /// Team name
    pub team: String,
    /// Uniform number
    pub unum: u8,
    /// Reported position
    pub position: Vector2,
}

/// Global view carried by `(ok look ...)` and `(see_global ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    /// Simulation time of the snapshot
    pub time: u32,
    /// Ball position, if the ball entry was present
    pub ball: Option<Vector2>,
    /// Every player on the field
    pub players: Vec<PlayerSighting>,
}

/// Number of entries (time, ball, two goals) preceding the players in a look reply.
pub const LOOK_PREFIX_LEN: usize = 4;

impl WorldSnapshot {
    /// Extracts a snapshot from the body following `ok look` or `see_global`.
    pub fn from_body(body: &[MessageNode]) -> Result<WorldSnapshot> {
        let time = body
            .first()
            .and_then(MessageNode::as_atom)
            .and_then(|t| t.parse::<u32>().ok())
            .ok_or_else(|| TrainerError::malformed(render(body), "missing snapshot time"))?;

        let mut ball = None;
        let mut players = Vec::new();
        for obj in &body[1..] {
            let Some([kind, data @ ..]) = obj.as_list() else {
                return Err(TrainerError::malformed(render(body), "object is not a list"));
            };
            let Some(kind) = kind.as_list() else {
                return Err(TrainerError::malformed(render(body), "object type is not a list"));
            };
            match kind.first().and_then(MessageNode::as_atom) {
                Some(k) if k.starts_with('g') => continue,
                Some(k) if k.starts_with('b') => {
                    ball = Some(extract_point(data).ok_or_else(|| {
                        TrainerError::malformed(render(body), "bad ball position")
                    })?);
                }
                Some(k) if k.starts_with('p') => {
                    let team = kind.get(1).and_then(MessageNode::as_atom);
                    let unum = kind
                        .get(2)
                        .and_then(MessageNode::as_atom)
                        .and_then(|n| n.parse::<u8>().ok());
                    let position = extract_point(data);
                    match (team, unum, position) {
                        (Some(team), Some(unum), Some(position)) => {
                            players.push(PlayerSighting {
                                team: team.to_string(),
                                unum,
                                position,
                            })
                        }
                        _ => {
                            return Err(TrainerError::malformed(
                                render(body),
                                "bad player entry",
                            ))
                        }
                    }
                }
                _ => return Err(TrainerError::malformed(render(body), "unknown object type")),
            }
        }
        Ok(WorldSnapshot {
            time,
            ball,
            players,
        })
    }
}

fn extract_point(data: &[MessageNode]) -> Option<Vector2> {
    let x = data.first()?.as_atom()?.parse::<f64>().ok()?;
    let y = data.get(1)?.as_atom()?.parse::<f64>().ok()?;
    Some(Vector2::new(x, y))
}

fn render(body: &[MessageNode]) -> String {
    MessageNode::List(body.to_vec()).to_string()
}

/// Team names listed in an `(ok team_names (team l <name>) (team r <name>))` body.
pub fn team_names(body: &[MessageNode]) -> Vec<String> {
    body.iter()
        .filter_map(|entry| match entry.as_list()? {
            [_, _, name] => name.as_atom().map(str::to_string),
            _ => None,
        })
        .collect()
}

/// Application message heard on the coach channel.
#[derive(Debug, Clone, PartialEq)]
pub struct HearMessage {
    /// Simulation time
    pub time: String,
    /// Sending player's team
    pub team: String,
    /// Sending player's unum, as sent
    pub unum: String,
    /// Payload with its length prefix removed
    pub payload: String,
}

impl HearMessage {
    /// Extracts a player message from a `hear` body.
    ///
    /// Returns `None` for referee/coach messages or payloads whose length prefix is not a digit.
    /// The payload's first character is its length; the text following it is cut to that length.
    pub fn from_body(body: &[MessageNode]) -> Option<HearMessage> {
        let [time, sender, payload] = body else {
            return None;
        };
        let [_, team, unum, ..] = sender.as_list()? else {
            return None;
        };
        let raw = payload.as_atom()?;
        let mut chars = raw.chars();
        let length = chars.next()?.to_digit(10)? as usize;
        let text: String = chars.take(length).collect();
        Some(HearMessage {
            time: time.as_atom()?.to_string(),
            team: team.as_atom()?.to_string(),
            unum: unum.as_atom()?.to_string(),
            payload: text,
        })
    }
}
