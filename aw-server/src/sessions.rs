use std::collections::BTreeMap;

use aw_sim::{BodyState, EditorId, PenetrationConfig, PenetrationResolver};
use aw_utils::ClientId;
use bevy::prelude::Resource;

#[derive(Debug, Clone)]
pub struct Session {
    pub editor: EditorId,
    /// Last committed body state; unset until the first move arrives.
    pub body: Option<BodyState>,
    pub on_ground: bool,
}

impl Session {
    pub fn new(username: &str) -> Self {
        Self {
            editor: EditorId::new(username),
            body: None,
            on_ground: false,
        }
    }
}

/// Connected clients, keyed by connection.
#[derive(Resource, Default, Debug)]
pub struct Sessions {
    sessions: BTreeMap<ClientId, Session>,
}

impl Sessions {
    /// Registers a client. Fails when the username is already online.
    pub fn join(&mut self, client: ClientId, username: &str) -> bool {
        if self.sessions.values().any(|s| s.editor.as_str() == username) {
            return false;
        }
        self.sessions.insert(client, Session::new(username));
        true
    }

    pub fn leave(&mut self, client: ClientId) -> Option<Session> {
        self.sessions.remove(&client)
    }

    pub fn get(&self, client: ClientId) -> Option<&Session> {
        self.sessions.get(&client)
    }

    pub fn get_mut(&mut self, client: ClientId) -> Option<&mut Session> {
        self.sessions.get_mut(&client)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClientId, &Session)> {
        self.sessions.iter().map(|(id, s)| (*id, s))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ClientId, &mut Session)> {
        self.sessions.iter_mut().map(|(id, s)| (*id, s))
    }

    pub fn client_of(&self, editor: &EditorId) -> Option<ClientId> {
        self.iter()
            .find(|(_, s)| &s.editor == editor)
            .map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Per-client penetration backstop state.
#[derive(Resource, Debug)]
pub struct BodyGuard(pub PenetrationResolver<ClientId>);

impl BodyGuard {
    pub fn new(config: PenetrationConfig) -> Self {
        Self(PenetrationResolver::new(config))
    }
}
