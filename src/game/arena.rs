//! Arena service: owns the three shared tables and every compound update.
//!
//! Lock order is always connections -> participants -> scores. The spawn RNG
//! lock is innermost and only held for a single draw.

use std::sync::Arc;

use tracing::{debug, info};

use super::combat::{CombatSystem, HitResult};
use super::connection::Connection;
use super::player::{Participant, Position, SpawnArea};
use super::registry::ConnectionRegistry;
use super::scores::{ScoreEntry, ScoreTable};
use super::store::ParticipantStore;
use super::PlayerId;
use crate::config::GameConfig;

/// Longest accepted name or color, after trimming
pub const MAX_LABEL_CHARS: usize = 32;

fn valid_label(label: &str) -> bool {
    !label.is_empty() && label.chars().count() <= MAX_LABEL_CHARS
}

/// Why a registration was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("name and color must be non-empty and at most {} characters", MAX_LABEL_CHARS)]
    Malformed,

    #[error("connection already registered as player {0}")]
    AlreadyRegistered(PlayerId),
}

/// Movement to apply to a participant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    /// `None` keeps the current position
    pub position: Option<Position>,
    pub rotation_x: f32,
    pub rotation_y: f32,
}

pub struct Arena {
    config: GameConfig,
    spawns: SpawnArea,
    connections: ConnectionRegistry,
    participants: ParticipantStore,
    scores: ScoreTable,
}

impl Arena {
    pub fn new(config: GameConfig) -> Self {
        Self {
            spawns: SpawnArea::new(&config),
            config,
            connections: ConnectionRegistry::new(),
            participants: ParticipantStore::new(),
            scores: ScoreTable::new(),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn spawns(&self) -> &SpawnArea {
        &self.spawns
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn participants(&self) -> &ParticipantStore {
        &self.participants
    }

    pub fn scores(&self) -> &ScoreTable {
        &self.scores
    }

    /// Create a participant for `conn`, bind it in all three tables and in
    /// the connection's session, atomically with respect to readers.
    pub fn register(
        &self,
        conn: &Arc<Connection>,
        name: &str,
        color: &str,
    ) -> Result<Participant, RegisterError> {
        let (name, color) = (name.trim(), color.trim());
        if !valid_label(name) || !valid_label(color) {
            return Err(RegisterError::Malformed);
        }
        if let Some(existing) = conn.session().player_id() {
            return Err(RegisterError::AlreadyRegistered(existing));
        }

        let spawn = self.spawns.random_position();

        let mut conns = self.connections.write();
        let mut players = self.participants.write();
        let mut scores = self.scores.lock();

        let mut id = self.spawns.random_id();
        while players.contains(id) || conns.contains(id) {
            debug!(player_id = id, "Participant id collision, drawing again");
            id = self.spawns.random_id();
        }

        conn.session()
            .bind(id)
            .map_err(RegisterError::AlreadyRegistered)?;

        let participant = Participant::new(
            id,
            name.to_string(),
            color.to_string(),
            spawn,
            self.config.max_health,
        );
        conns.add(id, conn.clone());
        players.insert(participant.clone());
        scores.insert(id);

        info!(player_id = id, conn_id = %conn.id(), name = %participant.name, "Participant registered");
        Ok(participant)
    }

    /// Move a participant. False when `id` is not live.
    pub fn update_location(&self, id: PlayerId, movement: Movement) -> bool {
        self.participants.mutate(id, |p| {
            if let Some(position) = movement.position {
                p.position = position;
            }
            p.rotation_x = movement.rotation_x;
            p.rotation_y = movement.rotation_y;
        })
    }

    /// Resolve one damage event. `None` when the target is not live.
    ///
    /// `damage` must already be validated.
    pub fn damage(&self, caster_id: PlayerId, target_id: PlayerId, damage: f32) -> Option<HitResult> {
        let mut players = self.participants.write();
        let (target, killed) = players.mutate(target_id, |target| {
            let killed = CombatSystem::strike(target, damage, self.config.max_health, || {
                self.spawns.random_position()
            });
            (target.clone(), killed)
        })?;

        let credited = CombatSystem::earns_credit(caster_id, target_id, killed)
            && self.scores.lock().increment(caster_id);
        drop(players);

        if killed {
            info!(caster_id, target_id, credited, "Participant killed and respawned");
        }

        Some(HitResult {
            caster_id,
            target,
            killed,
            credited,
        })
    }

    /// Remove the participant bound to `conn` from every table.
    ///
    /// Returns its last state, or `None` if the connection never registered
    /// or was already removed.
    pub fn disconnect(&self, conn: &Connection) -> Option<Participant> {
        let id = conn.session().player_id()?;

        let mut conns = self.connections.write();
        let mut players = self.participants.write();
        let mut scores = self.scores.lock();

        conns.remove(id);
        scores.remove(id);
        let departed = players.remove(id);

        if departed.is_some() {
            info!(player_id = id, conn_id = %conn.id(), "Participant removed");
        }
        departed
    }

    pub fn snapshot(&self) -> Vec<Participant> {
        self.participants.snapshot()
    }

    pub fn scoreboard(&self) -> Vec<ScoreEntry> {
        self.scores.snapshot()
    }

    /// Force-close every registered connection
    pub fn close_all(&self) {
        self.connections.close_all();
    }
}
