//! Combat rules - damage validation, kills and respawn

use super::player::{Participant, Position};
use super::PlayerId;

/// Damage amounts the arena refuses to apply
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum DamageError {
    #[error("damage must be finite, got {0}")]
    NotFinite(f32),

    #[error("damage must not be negative, got {0}")]
    Negative(f32),
}

/// Result of resolving one damage event against its target
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub caster_id: PlayerId,
    /// Target state after damage and any respawn
    pub target: Participant,
    pub killed: bool,
    /// Whether the caster earned a point for this hit
    pub credited: bool,
}

/// Combat rules shared by the damage handler
pub struct CombatSystem;

impl CombatSystem {
    /// Reject damage that would heal or poison the health value
    pub fn validate_damage(amount: f32) -> Result<f32, DamageError> {
        if !amount.is_finite() {
            Err(DamageError::NotFinite(amount))
        } else if amount < 0.0 {
            Err(DamageError::Negative(amount))
        } else {
            Ok(amount)
        }
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = current_health - damage;
        (new_health, new_health <= 0.0)
    }

    /// Damage `target` and respawn it in the same step if it died, so the
    /// negative intermediate health is never visible. Returns whether it died.
    pub fn strike(
        target: &mut Participant,
        damage: f32,
        max_health: f32,
        respawn_at: impl FnOnce() -> Position,
    ) -> bool {
        let (health, killed) = Self::apply_damage(target.health, damage);
        if killed {
            Self::respawn(target, max_health, respawn_at());
        } else {
            target.health = health;
        }
        killed
    }

    pub fn respawn(target: &mut Participant, max_health: f32, position: Position) {
        target.health = max_health;
        target.position = position;
    }

    /// Kills only score when someone else landed them
    pub fn earns_credit(caster_id: PlayerId, target_id: PlayerId, killed: bool) -> bool {
        killed && caster_id != target_id
    }
}
