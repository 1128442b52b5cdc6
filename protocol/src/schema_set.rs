//! Schemas bound to each side of a connection.

use std::collections::BTreeMap;

use schema::{schema_set_hash, SchemaHash, SchemaType};
use wire::Handshake;

/// The state type and named messages one side publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SideSchema {
    state: SchemaType,
    messages: BTreeMap<String, SchemaType>,
}

impl SideSchema {
    /// Creates a side with the given state type and no messages.
    #[must_use]
    pub const fn new(state: SchemaType) -> Self {
        Self {
            state,
            messages: BTreeMap::new(),
        }
    }

    /// Adds a message type, replacing any previous type with the same name.
    #[must_use]
    pub fn message(mut self, name: impl Into<String>, ty: SchemaType) -> Self {
        self.messages.insert(name.into(), ty);
        self
    }

    #[must_use]
    pub const fn state(&self) -> &SchemaType {
        &self.state
    }

    #[must_use]
    pub const fn messages(&self) -> &BTreeMap<String, SchemaType> {
        &self.messages
    }

    /// Structural hash over the state type and every message.
    #[must_use]
    pub fn hash(&self) -> SchemaHash {
        schema_set_hash(
            &self.state,
            self.messages.iter().map(|(name, ty)| (name.as_str(), ty)),
        )
    }
}

/// The full schema set of a client/server protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtocolSchema {
    /// What clients publish and send.
    pub client: SideSchema,
    /// What the server publishes and sends.
    pub server: SideSchema,
}

impl ProtocolSchema {
    #[must_use]
    pub const fn new(client: SideSchema, server: SideSchema) -> Self {
        Self { client, server }
    }

    /// Returns the handshake both peers must agree on.
    #[must_use]
    pub fn handshake(&self) -> Handshake {
        Handshake::new(self.client.hash().to_hex(), self.server.hash().to_hex())
    }
}

/// Message ids for one side: names in sorted order, id = position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTable {
    entries: Vec<(String, SchemaType)>,
}

impl MessageTable {
    /// Builds the table for `side`.
    #[must_use]
    pub fn new(side: &SideSchema) -> Self {
        // BTreeMap iteration is already sorted by name.
        let entries = side
            .messages()
            .iter()
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the id and type of the message called `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<(u32, &SchemaType)> {
        let idx = self
            .entries
            .binary_search_by(|(entry, _)| entry.as_str().cmp(name))
            .ok()?;
        let id = u32::try_from(idx).ok()?;
        Some((id, &self.entries[idx].1))
    }

    /// Returns the name and type of message `id`.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<(&str, &SchemaType)> {
        let (name, ty) = self.entries.get(usize::try_from(id).ok()?)?;
        Some((name.as_str(), ty))
    }
}
