//! Participant store: authoritative participant table

use std::collections::HashMap;

use parking_lot::{RwLock, RwLockWriteGuard};

use super::player::Participant;
use super::PlayerId;

/// Table of live participants keyed by id.
///
/// Readers only ever get copies; the map itself never leaves this module.
#[derive(Default)]
pub struct ParticipantStore {
    players: RwLock<HashMap<PlayerId, Participant>>,
}

/// Exclusive access for compound updates spanning several stores
pub struct ParticipantsMut<'a> {
    players: RwLockWriteGuard<'a, HashMap<PlayerId, Participant>>,
}

impl ParticipantsMut<'_> {
    pub fn insert(&mut self, participant: Participant) {
        self.players.insert(participant.id, participant);
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<Participant> {
        self.players.remove(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Apply `f` to the participant if present; returns its result
    pub fn mutate<R>(&mut self, id: PlayerId, f: impl FnOnce(&mut Participant) -> R) -> Option<R> {
        self.players.get_mut(&id).map(f)
    }
}

impl ParticipantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self) -> ParticipantsMut<'_> {
        ParticipantsMut {
            players: self.players.write(),
        }
    }

    pub fn insert(&self, participant: Participant) {
        self.write().insert(participant);
    }

    pub fn remove(&self, id: PlayerId) -> Option<Participant> {
        self.write().remove(id)
    }

    /// Apply `f` under exclusive access. Returns whether `id` existed.
    pub fn mutate(&self, id: PlayerId, f: impl FnOnce(&mut Participant)) -> bool {
        self.write().mutate(id, f).is_some()
    }

    pub fn get(&self, id: PlayerId) -> Option<Participant> {
        self.players.read().get(&id).cloned()
    }

    /// Point-in-time copy of every participant, in no particular order
    pub fn snapshot(&self) -> Vec<Participant> {
        self.players.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::Position;

    fn participant(id: PlayerId) -> Participant {
        Participant::new(id, format!("p{id}"), "red".into(), Position::default(), 100.0)
    }

    #[test]
    fn mutate_reports_presence() {
        let store = ParticipantStore::new();
        store.insert(participant(1));

        assert!(store.mutate(1, |p| p.rotation_y = 1.5));
        assert!(!store.mutate(2, |p| p.rotation_y = 1.5));
        assert_eq!(store.get(1).map(|p| p.rotation_y), Some(1.5));
    }

    #[test]
    fn snapshot_is_detached_from_the_store() {
        let store = ParticipantStore::new();
        store.insert(participant(1));
        store.insert(participant(2));

        let snapshot = store.snapshot();
        store.remove(1);
        store.mutate(2, |p| p.health = 10.0);

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|p| p.health == 100.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let store = ParticipantStore::new();
        store.insert(participant(3));
        assert!(store.remove(3).is_some());
        assert!(store.remove(3).is_none());
        assert!(store.is_empty());
    }
}
