/// Events emitted during a session tick or interaction.
/// The presentation layer consumes these for animation/sound.

use crate::domain::entity::{EntityId, EntityKind};
use crate::sim::session::Outcome;

#[derive(Clone, Debug)]
pub enum GameEvent {
    EntitySpawned { id: EntityId, kind: EntityKind, x: f32, y: f32 },
    /// Lifetime or bounds removal (not player-caused).
    EntityExpired { id: EntityId },
    /// A bug took a hit and survived; flash it.
    BugHit { id: EntityId, health: u32, x: f32, y: f32 },
    /// A bug was destroyed by the player.
    BugSquashed {
        id: EntityId,
        kind: EntityKind,
        x: f32,
        y: f32,
        points: u32,
        combo: u32,
    },
    PowerUpCollected { id: EntityId },
    BuffStarted,
    /// One bug removed by the vanish sequence.
    BuffZap { id: EntityId, points: u32, x: f32, y: f32 },
    BuffEnded,
    TimerTick { seconds_left: u32 },
    SessionEnded { outcome: Outcome },
}
