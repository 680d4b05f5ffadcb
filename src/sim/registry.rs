/// The authoritative set of live entities.
///
/// Single source of truth for population counts and footprint queries.
/// Iteration order is insertion order. Removal is idempotent: the
/// expiry reap and a player interaction may both try to remove the same
/// entity within one tick, and the second attempt must be a silent
/// no-op.

use crate::domain::entity::{Entity, EntityId, EntityKind};
use crate::domain::spawn::SpawnCensus;

pub struct EntityRegistry {
    entities: Vec<Entity>,
    next_id: EntityId,
}

impl EntityRegistry {
    pub fn new() -> Self {
        EntityRegistry {
            entities: Vec::new(),
            next_id: 1,
        }
    }

    /// Ids are unique for the life of the registry, never reused.
    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// Remove by id. Absent ids are a no-op and return None.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let idx = self.entities.iter().position(|e| e.id == id)?;
        Some(self.entities.remove(idx))
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity> {
        self.entities.iter_mut()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn count_of(&self, kind: EntityKind) -> usize {
        self.entities.iter().filter(|e| e.kind == kind).count()
    }

    /// Combined footprint of live entities of `kind`.
    pub fn total_area(&self, kind: EntityKind) -> f32 {
        self.entities
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.area())
            .sum()
    }

    pub fn ids_of_bugs(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|e| e.kind.is_bug())
            .map(|e| e.id)
            .collect()
    }

    pub fn census(&self) -> SpawnCensus {
        SpawnCensus {
            bosses: self.count_of(EntityKind::BossBug),
            powerups: self.count_of(EntityKind::PowerUp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::Viewport;

    fn bug_at(reg: &mut EntityRegistry, x: f32, w: f32, h: f32, kind: EntityKind) -> EntityId {
        let id = reg.allocate_id();
        reg.add(Entity {
            id,
            kind,
            x,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            health: 1,
            width: w,
            height: h,
            ttl_ms: None,
            time_to_reproduce_ms: None,
            born_at_ms: 0,
        });
        id
    }

    #[test]
    fn ids_are_never_reused() {
        let mut reg = EntityRegistry::new();
        let a = bug_at(&mut reg, 0.0, 4.0, 2.0, EntityKind::NormalBug);
        reg.remove(a);
        let b = bug_at(&mut reg, 0.0, 4.0, 2.0, EntityKind::NormalBug);
        assert_ne!(a, b);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut reg = EntityRegistry::new();
        let id = bug_at(&mut reg, 0.0, 4.0, 2.0, EntityKind::NormalBug);
        assert!(reg.remove(id).is_some());
        assert!(reg.remove(id).is_none());
        assert!(reg.remove(9999).is_none());
        assert_eq!(reg.iter().count(), 0);
    }

    #[test]
    fn iteration_keeps_insertion_order() {
        let mut reg = EntityRegistry::new();
        let a = bug_at(&mut reg, 0.0, 4.0, 2.0, EntityKind::NormalBug);
        let b = bug_at(&mut reg, 0.0, 4.0, 2.0, EntityKind::BossBug);
        let c = bug_at(&mut reg, 0.0, 4.0, 2.0, EntityKind::NormalBug);
        let ids: Vec<_> = reg.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn area_query_filters_by_kind() {
        let mut reg = EntityRegistry::new();
        bug_at(&mut reg, 0.0, 50.0, 50.0, EntityKind::NormalBug);
        bug_at(&mut reg, 0.0, 50.0, 50.0, EntityKind::NormalBug);
        bug_at(&mut reg, 0.0, 8.0, 3.0, EntityKind::BossBug);
        let vp = Viewport::new(100.0, 100.0);
        let ratio = reg.total_area(EntityKind::NormalBug) / vp.area();
        assert!((ratio - 0.5).abs() < 1e-6);
        assert_eq!(reg.count_of(EntityKind::BossBug), 1);
        assert_eq!(reg.census(), SpawnCensus { bosses: 1, powerups: 0 });
    }
}
