//! Prefix based dispatch of server messages.
//!
//! A [`HandlerRegistry`] maps literal token prefixes such as `["ok", "look"]` to a handler
//! value. The registry does not call anything itself: [`HandlerRegistry::dispatch`] returns the
//! selected handler together with the message suffix, and the owner runs it with whatever state
//! it needs. Handlers are therefore plain data (usually a small `Copy` enum).
//!
//! Subscriptions churn while a match goes through its phases (team names, connection checks,
//! game loop), so registering over an existing prefix simply replaces its handler.

use tracing::{debug, trace};

use crate::message::MessageNode;

/// Ordered table of `prefix -> handler` entries.
#[derive(Debug, Clone)]
pub struct HandlerRegistry<H> {
    entries: Vec<(Vec<String>, H)>,
}

impl<H> Default for HandlerRegistry<H> {
    fn default() -> Self {
        HandlerRegistry {
            entries: Vec::new(),
        }
    }
}

impl<H: Clone> HandlerRegistry<H> {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for messages starting with `prefix`.
    ///
    /// An entry with the same prefix is replaced in place; its position is kept.
    pub fn register(&mut self, prefix: &[&str], handler: H) {
        match self.position(prefix) {
            Some(i) => {
                trace!(?prefix, "updating handler");
                self.entries[i].1 = handler;
            }
            None => self
                .entries
                .push((prefix.iter().map(|s| s.to_string()).collect(), handler)),
        }
    }

    /// Removes the entry registered for exactly `prefix`. Returns whether one existed.
    pub fn unregister(&mut self, prefix: &[&str]) -> bool {
        match self.position(prefix) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Number of registered prefixes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Selects the handler for `message` and returns it with the remaining suffix.
    ///
    /// Among the entries whose prefix literally matches the leading atoms of the message, the
    /// longest prefix wins; equal lengths cannot occur since a prefix is stored at most once.
    /// Returns `None` (after a debug line) when nothing matches: unknown message kinds are
    /// expected and simply dropped.
    pub fn dispatch<'m>(&self, message: &'m [MessageNode]) -> Option<(H, &'m [MessageNode])> {
        let best = self
            .entries
            .iter()
            .filter(|(prefix, _)| Self::matches(prefix, message))
            .fold(None, |best: Option<&(Vec<String>, H)>, entry| match best {
                Some(b) if b.0.len() >= entry.0.len() => Some(b),
                _ => Some(entry),
            });
        match best {
            Some((prefix, handler)) => Some((handler.clone(), &message[prefix.len()..])),
            None => {
                debug!(
                    head = %message
                        .iter()
                        .take(2)
                        .map(MessageNode::to_string)
                        .collect::<Vec<_>>()
                        .join(" "),
                    "unhandled message"
                );
                None
            }
        }
    }

    fn matches(prefix: &[String], message: &[MessageNode]) -> bool {
        prefix.len() <= message.len()
            && prefix
                .iter()
                .zip(message)
                .all(|(p, m)| m.as_atom() == Some(p.as_str()))
    }

    fn position(&self, prefix: &[&str]) -> Option<usize> {
        self.entries
            .iter()
            .position(|(p, _)| p.len() == prefix.len() && p.iter().zip(prefix).all(|(a, b)| a == b))
    }
}
