/// GameSession: the orchestrating state machine for one round.
///
/// ## Phases
///
///   NotStarted → Running → (Paused → Running)* → Ended(Win|Lose)
///
/// Paused is only entered by the buff vanish sequence; the spawn
/// scheduler, entity motion, and the countdown timer are all frozen
/// while it runs.
///
/// ## Scheduling model
///
/// The session is passive: the host calls `tick` once per frame with
/// the measured delta and `timer_tick` once per wall-clock second.
/// Both entry points take the `Generation` token issued by `start()`.
/// Every `start()`/`stop()` bumps the generation, so a callback armed
/// against an older session detects it is stale and no-ops instead of
/// mutating fresh state. `stop()` is idempotent, so the frame path (area
/// overrun) and the timer path (expiry) may both reach it in the same
/// tick.
///
/// All randomness flows through the injected `StdRng`, so a seeded
/// session replays an identical round.

use std::collections::VecDeque;
use std::fmt;

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::RulesConfig;
use crate::domain::entity::{Entity, EntityId, EntityKind, Viewport};
use crate::domain::score::ScoreEngine;
use crate::domain::spawn::SpawnScheduler;
use crate::sim::event::GameEvent;
use crate::sim::highscore::ScoreStore;
use crate::sim::registry::EntityRegistry;

/// Gap between removals in the buff vanish sequence.
const VANISH_STEP_MS: i64 = 150;
/// Particles per squashed bug / boss.
const BURST_NORMAL: usize = 15;
const BURST_BOSS: usize = 50;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    Win,
    Lose,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    NotStarted,
    Running,
    Paused,
    Ended(Outcome),
}

/// Token issued by `start()`; stale tokens make late callbacks inert.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Generation(u64);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StartError {
    /// The play area has zero width or height. The caller must fix the
    /// viewport and try again; the session never left NotStarted.
    InvalidViewport,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::InvalidViewport => write!(f, "play area has zero width or height"),
        }
    }
}

impl std::error::Error for StartError {}

struct VanishSequence {
    queue: VecDeque<EntityId>,
    time_to_next_ms: i64,
}

pub struct GameSession {
    rules: RulesConfig,
    phase: Phase,
    generation: u64,
    viewport: Viewport,
    /// Session clock in ms; frozen while Paused.
    clock_ms: u64,
    time_left_secs: u32,
    buff_inventory: u32,
    registry: EntityRegistry,
    scheduler: SpawnScheduler,
    score: ScoreEngine,
    vanish: Option<VanishSequence>,
    store: Box<dyn ScoreStore>,
    rng: StdRng,
}

impl GameSession {
    /// The stored high score is read exactly once, here.
    pub fn new(rules: RulesConfig, store: Box<dyn ScoreStore>, rng: StdRng) -> Self {
        let high = store.get();
        GameSession {
            phase: Phase::NotStarted,
            generation: 0,
            viewport: Viewport::new(0.0, 0.0),
            clock_ms: 0,
            time_left_secs: rules.round_secs,
            buff_inventory: 0,
            registry: EntityRegistry::new(),
            scheduler: SpawnScheduler::new(&rules),
            score: ScoreEngine::new(rules.combo_window_ms, high),
            vanish: None,
            store,
            rng,
            rules,
        }
    }

    // ── Lifecycle ──

    /// Reset everything and enter Running. Works from any phase, so a
    /// restart implicitly cancels the previous round: the returned
    /// token supersedes all earlier ones.
    pub fn start(&mut self, viewport: Viewport) -> Result<Generation, StartError> {
        if viewport.is_degenerate() {
            return Err(StartError::InvalidViewport);
        }
        self.generation += 1;
        self.viewport = viewport;
        self.clock_ms = 0;
        self.time_left_secs = self.rules.round_secs;
        self.buff_inventory = 0;
        self.vanish = None;
        self.registry = EntityRegistry::new();
        self.scheduler = SpawnScheduler::new(&self.rules);
        self.score = ScoreEngine::new(self.rules.combo_window_ms, self.score.high_score());
        self.phase = Phase::Running;
        Ok(Generation(self.generation))
    }

    /// Terminal transition. Idempotent: both the frame path and the
    /// timer path may call this in the same tick.
    pub fn stop(&mut self, outcome: Outcome) -> Vec<GameEvent> {
        if !matches!(self.phase, Phase::Running | Phase::Paused) {
            return Vec::new();
        }
        self.generation += 1;
        self.vanish = None;
        self.registry.clear();
        if let Some(high) = self.score.commit_high_score() {
            self.store.put(high);
        }
        self.phase = Phase::Ended(outcome);
        vec![GameEvent::SessionEnded { outcome }]
    }

    // ── Per-frame update ──

    pub fn tick(&mut self, gen: Generation, dt_ms: u64) -> Vec<GameEvent> {
        if gen.0 != self.generation {
            return Vec::new();
        }
        match self.phase {
            Phase::Running => self.tick_running(dt_ms),
            Phase::Paused => self.tick_vanish(dt_ms),
            _ => Vec::new(),
        }
    }

    fn tick_running(&mut self, dt_ms: u64) -> Vec<GameEvent> {
        let mut events = Vec::new();
        self.clock_ms += dt_ms;

        // 1. Spawn
        let census = self.registry.census();
        if let Some(kind) = self.scheduler.tick(dt_ms, census, &mut self.rng) {
            let ev = match kind {
                EntityKind::PowerUp => self.spawn_powerup(),
                EntityKind::BossBug => self.spawn_boss(),
                _ => self.spawn_bug(),
            };
            events.push(ev);
        }

        // 2. Motion and countdowns
        for e in self.registry.iter_mut() {
            e.advance(dt_ms);
        }

        // 3. Reproduction
        if self.rules.reproduction {
            self.resolve_reproduction(&mut events);
        }

        // 4. Reap expired entities
        let expired: Vec<EntityId> = self
            .registry
            .iter()
            .filter(|e| e.is_expired(&self.viewport))
            .map(|e| e.id)
            .collect();
        for id in expired {
            self.registry.remove(id);
            events.push(GameEvent::EntityExpired { id });
        }

        // 5. Infestation overrun
        let footprint = self.registry.total_area(EntityKind::NormalBug);
        if footprint / self.viewport.area() >= self.rules.area_loss_ratio {
            events.extend(self.stop(Outcome::Lose));
        }

        events
    }

    fn tick_vanish(&mut self, dt_ms: u64) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(vanish) = self.vanish.as_mut() else {
            self.phase = Phase::Running;
            return events;
        };

        vanish.time_to_next_ms -= dt_ms as i64;
        while vanish.time_to_next_ms <= 0 {
            let Some(id) = vanish.queue.pop_front() else {
                break;
            };
            vanish.time_to_next_ms += VANISH_STEP_MS;
            if let Some(dead) = self.registry.remove(id) {
                let base = match dead.kind {
                    EntityKind::BossBug => self.rules.boss_points,
                    _ => self.rules.bug_points,
                };
                let points = self.score.award(base, self.clock_ms);
                let (x, y) = dead.center();
                events.push(GameEvent::BuffZap { id, points, x, y });
            }
        }

        if vanish.queue.is_empty() {
            self.vanish = None;
            self.phase = Phase::Running;
            events.push(GameEvent::BuffEnded);
        }
        events
    }

    // ── One-second countdown ──

    /// Frozen while Paused: a vanish sequence does not eat round time.
    pub fn timer_tick(&mut self, gen: Generation) -> Vec<GameEvent> {
        if gen.0 != self.generation || self.phase != Phase::Running {
            return Vec::new();
        }
        self.time_left_secs = self.time_left_secs.saturating_sub(1);
        let mut events = vec![GameEvent::TimerTick {
            seconds_left: self.time_left_secs,
        }];
        if self.time_left_secs == 0 {
            events.extend(self.stop(Outcome::Win));
        }
        events
    }

    // ── Player interactions ──

    /// Hit the entity under the player's click. A click may race the
    /// expiry reap, so an absent id is a legitimate no-op.
    pub fn squash(&mut self, id: EntityId) -> Vec<GameEvent> {
        if self.phase != Phase::Running {
            return Vec::new();
        }
        let mut events = Vec::new();
        let Some(entity) = self.registry.get_mut(id) else {
            return events;
        };
        if !entity.kind.is_bug() || entity.health == 0 {
            return events;
        }
        let remaining = entity.apply_hit();
        if remaining > 0 {
            let (x, y) = entity.center();
            events.push(GameEvent::BugHit { id, health: remaining, x, y });
            return events;
        }

        let Some(dead) = self.registry.remove(id) else {
            return events;
        };
        let base = match dead.kind {
            EntityKind::BossBug => self.rules.boss_points,
            _ => self.rules.bug_points,
        };
        let points = self.score.award(base, self.clock_ms);
        let (cx, cy) = dead.center();
        events.push(GameEvent::BugSquashed {
            id,
            kind: dead.kind,
            x: cx,
            y: cy,
            points,
            combo: self.score.combo(),
        });

        let burst = if dead.kind == EntityKind::BossBug {
            BURST_BOSS
        } else {
            BURST_NORMAL
        };
        self.burst_particles(cx, cy, burst, &mut events);

        // one power-up on screen at a time
        if self.registry.count_of(EntityKind::PowerUp) == 0
            && self.rng.gen_bool(self.rules.powerup_drop_chance)
        {
            let pid = self.registry.allocate_id();
            let p = Entity::powerup_at(
                pid,
                self.viewport,
                (cx, cy),
                (self.rules.powerup_w, self.rules.powerup_h),
                self.rules.powerup_ttl_ms as i64,
                self.clock_ms,
            );
            events.push(GameEvent::EntitySpawned {
                id: pid,
                kind: EntityKind::PowerUp,
                x: p.x,
                y: p.y,
            });
            self.registry.add(p);
        }

        events
    }

    /// Bank the clicked power-up as a buff charge.
    pub fn collect_powerup(&mut self, id: EntityId) -> Vec<GameEvent> {
        if self.phase != Phase::Running {
            return Vec::new();
        }
        match self.registry.get(id) {
            Some(e) if e.kind == EntityKind::PowerUp => {}
            _ => return Vec::new(),
        }
        self.registry.remove(id);
        self.buff_inventory += 1;
        vec![GameEvent::PowerUpCollected { id }]
    }

    /// Consume one banked charge: pause the round and clear the field
    /// one bug at a time. No bugs on screen keeps the charge.
    pub fn use_buff(&mut self) -> Vec<GameEvent> {
        if self.phase != Phase::Running || self.buff_inventory == 0 {
            return Vec::new();
        }
        let queue = self.registry.ids_of_bugs();
        if queue.is_empty() {
            return Vec::new();
        }
        self.buff_inventory -= 1;
        self.phase = Phase::Paused;
        self.vanish = Some(VanishSequence {
            queue: queue.into(),
            time_to_next_ms: VANISH_STEP_MS,
        });
        vec![GameEvent::BuffStarted]
    }

    // ── Spawning helpers ──

    fn spawn_bug(&mut self) -> GameEvent {
        let id = self.registry.allocate_id();
        let reproduce_after = self.reproduce_countdown();
        let e = Entity::bug(
            id,
            self.viewport,
            self.scheduler.speed(),
            (self.rules.bug_w, self.rules.bug_h),
            reproduce_after,
            &mut self.rng,
            self.clock_ms,
        );
        let ev = GameEvent::EntitySpawned { id, kind: e.kind, x: e.x, y: e.y };
        self.registry.add(e);
        ev
    }

    fn spawn_boss(&mut self) -> GameEvent {
        let id = self.registry.allocate_id();
        let e = Entity::boss(
            id,
            self.viewport,
            self.scheduler.speed(),
            (self.rules.boss_w, self.rules.boss_h),
            self.rules.boss_health,
            &mut self.rng,
            self.clock_ms,
        );
        let ev = GameEvent::EntitySpawned { id, kind: e.kind, x: e.x, y: e.y };
        self.registry.add(e);
        ev
    }

    fn spawn_powerup(&mut self) -> GameEvent {
        let id = self.registry.allocate_id();
        let e = Entity::powerup(
            id,
            self.viewport,
            (self.rules.powerup_w, self.rules.powerup_h),
            self.rules.powerup_ttl_ms as i64,
            &mut self.rng,
            self.clock_ms,
        );
        let ev = GameEvent::EntitySpawned { id, kind: e.kind, x: e.x, y: e.y };
        self.registry.add(e);
        ev
    }

    fn reproduce_countdown(&mut self) -> Option<i64> {
        if !self.rules.reproduction {
            return None;
        }
        let min = self.rules.reproduce_min_ms as i64;
        let max = self.rules.reproduce_max_ms as i64;
        Some(self.rng.gen_range(min..=max))
    }

    /// Every breeding bug whose countdown elapsed spawns one child and
    /// re-arms with a fresh random countdown. This is the exponential
    /// pressure behind the overrun loss.
    fn resolve_reproduction(&mut self, events: &mut Vec<GameEvent>) {
        let due: Vec<EntityId> = self
            .registry
            .iter()
            .filter(|e| {
                e.kind == EntityKind::NormalBug
                    && e.time_to_reproduce_ms.map_or(false, |t| t <= 0)
            })
            .map(|e| e.id)
            .collect();

        for pid in due {
            let fresh = self.reproduce_countdown();
            let parent = match self.registry.get_mut(pid) {
                Some(p) => {
                    p.time_to_reproduce_ms = fresh;
                    p.clone()
                }
                None => continue,
            };
            let id = self.registry.allocate_id();
            let child_countdown = match self.reproduce_countdown() {
                Some(t) => t,
                None => continue,
            };
            let child = Entity::child_bug(
                id,
                &parent,
                self.viewport,
                (self.rules.bug_w, self.rules.bug_h),
                child_countdown,
                &mut self.rng,
                self.clock_ms,
            );
            events.push(GameEvent::EntitySpawned {
                id,
                kind: child.kind,
                x: child.x,
                y: child.y,
            });
            self.registry.add(child);
        }
    }

    fn burst_particles(&mut self, x: f32, y: f32, count: usize, events: &mut Vec<GameEvent>) {
        for _ in 0..count {
            let id = self.registry.allocate_id();
            let p = Entity::particle(id, x, y, &mut self.rng, self.clock_ms);
            events.push(GameEvent::EntitySpawned { id, kind: p.kind, x: p.x, y: p.y });
            self.registry.add(p);
        }
    }

    // ── Queries for the presentation layer ──

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn score(&self) -> u32 {
        self.score.score()
    }

    pub fn combo(&self) -> u32 {
        self.score.combo()
    }

    pub fn high_score(&self) -> u32 {
        self.score.high_score()
    }

    pub fn time_left_secs(&self) -> u32 {
        self.time_left_secs
    }

    pub fn buff_inventory(&self) -> u32 {
        self.buff_inventory
    }

    pub fn difficulty_level(&self) -> u32 {
        self.scheduler.level()
    }

    /// Session clock in ms (frozen while Paused). Lets the renderer
    /// relate entity ages to the simulation's own time.
    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn entities(&self) -> std::slice::Iter<'_, Entity> {
        self.registry.iter()
    }

    /// Topmost (most recently spawned) clickable entity at a point.
    pub fn entity_at(&self, x: f32, y: f32) -> Option<(EntityId, EntityKind)> {
        self.registry
            .iter()
            .rev()
            .find(|e| e.kind != EntityKind::Particle && e.contains(x, y))
            .map(|e| (e.id, e.kind))
    }
}

// ══════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::highscore::MemStore;
    use rand::SeedableRng;

    /// Quiet baseline: no bosses, no power-ups, no breeding, so tests
    /// opt in to exactly the mechanics they exercise.
    fn quiet_rules() -> RulesConfig {
        let mut r = RulesConfig::default();
        r.boss_chance = 0.0;
        r.powerup_chance = 0.0;
        r.powerup_drop_chance = 0.0;
        r.reproduction = false;
        r
    }

    fn session(rules: RulesConfig, high: u32) -> (GameSession, MemStore) {
        let store = MemStore::new(high);
        let s = GameSession::new(
            rules,
            Box::new(store.clone()),
            StdRng::seed_from_u64(0xCAFE),
        );
        (s, store)
    }

    fn vp() -> Viewport {
        Viewport::new(200.0, 100.0)
    }

    fn spawned_ids(events: &[GameEvent], kind: EntityKind) -> Vec<EntityId> {
        events
            .iter()
            .filter_map(|e| match e {
                GameEvent::EntitySpawned { id, kind: k, .. } if *k == kind => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Tick until `count` bugs have spawned; returns their ids.
    fn spawn_bugs(s: &mut GameSession, gen: Generation, count: usize) -> Vec<EntityId> {
        let mut ids = Vec::new();
        ids.extend(spawned_ids(&s.tick(gen, 16), EntityKind::NormalBug));
        while ids.len() < count {
            ids.extend(spawned_ids(&s.tick(gen, 2000), EntityKind::NormalBug));
        }
        ids
    }

    #[test]
    fn refuses_degenerate_viewport() {
        let (mut s, _) = session(quiet_rules(), 0);
        assert_eq!(
            s.start(Viewport::new(0.0, 0.0)),
            Err(StartError::InvalidViewport)
        );
        assert_eq!(s.phase(), Phase::NotStarted);
        assert_eq!(
            s.start(Viewport::new(80.0, 0.0)),
            Err(StartError::InvalidViewport)
        );
        assert_eq!(s.phase(), Phase::NotStarted);
    }

    #[test]
    fn full_round_with_no_scoring_is_a_win() {
        let (mut s, store) = session(quiet_rules(), 0);
        let gen = s.start(vp()).unwrap();
        for i in 0..60 {
            assert_eq!(s.phase(), Phase::Running, "ended early at second {i}");
            s.timer_tick(gen);
        }
        assert_eq!(s.phase(), Phase::Ended(Outcome::Win));
        assert_eq!(s.score(), 0);
        assert_eq!(store.get(), 0);
        assert_eq!(s.entities().count(), 0);
    }

    #[test]
    fn squashes_inside_combo_window_multiply() {
        let (mut s, _) = session(quiet_rules(), 0);
        let gen = s.start(vp()).unwrap();
        let ids = spawn_bugs(&mut s, gen, 2);

        // both squashes at the same session clock: well inside 1500ms
        let ev1 = s.squash(ids[0]);
        let ev2 = s.squash(ids[1]);
        assert!(matches!(
            ev1.first(),
            Some(GameEvent::BugSquashed { points: 10, combo: 1, .. })
        ));
        assert!(matches!(
            ev2.first(),
            Some(GameEvent::BugSquashed { points: 20, combo: 2, .. })
        ));
        assert_eq!(s.score(), 30);
        assert_eq!(s.combo(), 2);
    }

    #[test]
    fn combo_resets_after_a_quiet_gap() {
        let (mut s, _) = session(quiet_rules(), 0);
        let gen = s.start(vp()).unwrap();
        let ids = spawn_bugs(&mut s, gen, 2);
        s.squash(ids[0]);
        // 2000ms of quiet exceeds the 1500ms window
        s.tick(gen, 2000);
        let ev = s.squash(ids[1]);
        assert!(matches!(
            ev.first(),
            Some(GameEvent::BugSquashed { points: 10, combo: 1, .. })
        ));
    }

    #[test]
    fn boss_takes_hits_then_dies_once() {
        let mut rules = quiet_rules();
        rules.boss_chance = 1.0;
        rules.boss_health = 3;
        let (mut s, _) = session(rules, 0);
        let gen = s.start(vp()).unwrap();
        let ev = s.tick(gen, 16);
        let boss = spawned_ids(&ev, EntityKind::BossBug)[0];

        assert!(matches!(
            s.squash(boss).first(),
            Some(GameEvent::BugHit { health: 2, .. })
        ));
        assert!(matches!(
            s.squash(boss).first(),
            Some(GameEvent::BugHit { health: 1, .. })
        ));
        let kill = s.squash(boss);
        assert!(matches!(
            kill.first(),
            Some(GameEvent::BugSquashed { points: 50, .. })
        ));
        // boss bursts are bigger than normal ones
        assert_eq!(spawned_ids(&kill, EntityKind::Particle).len(), 50);

        // the id is gone: further squashes are no-ops
        assert!(s.squash(boss).is_empty());
        assert_eq!(s.score(), 50);
    }

    #[test]
    fn squash_on_unknown_id_is_a_noop() {
        let (mut s, _) = session(quiet_rules(), 0);
        let gen = s.start(vp()).unwrap();
        s.tick(gen, 16);
        assert!(s.squash(424242).is_empty());
        assert_eq!(s.score(), 0);
    }

    #[test]
    fn area_overrun_loses_the_round() {
        let mut rules = quiet_rules();
        rules.bug_w = 50.0;
        rules.bug_h = 50.0;
        let (mut s, _) = session(rules, 0);
        // 100x100 screen: three 50x50 bugs hit the 0.75 threshold
        let gen = s.start(Viewport::new(100.0, 100.0)).unwrap();
        let mut events = s.tick(gen, 16);
        events.extend(s.tick(gen, 2000));
        assert_eq!(s.phase(), Phase::Running);
        events.extend(s.tick(gen, 2000));
        assert_eq!(s.phase(), Phase::Ended(Outcome::Lose));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::SessionEnded { outcome: Outcome::Lose })));
        assert_eq!(s.entities().count(), 0);
    }

    #[test]
    fn bugs_reproduce_on_their_countdown() {
        let mut rules = quiet_rules();
        rules.reproduction = true;
        rules.reproduce_min_ms = 100;
        rules.reproduce_max_ms = 100;
        let (mut s, _) = session(rules, 0);
        let gen = s.start(vp()).unwrap();
        let ev = s.tick(gen, 16);
        assert_eq!(spawned_ids(&ev, EntityKind::NormalBug).len(), 1);

        let ev = s.tick(gen, 100);
        let children = spawned_ids(&ev, EntityKind::NormalBug);
        assert_eq!(children.len(), 1, "countdown elapsed, expected one child");
        assert_eq!(s.entities().filter(|e| e.kind == EntityKind::NormalBug).count(), 2);
    }

    #[test]
    fn stale_generation_callbacks_are_inert() {
        let (mut s, _) = session(quiet_rules(), 0);
        let old = s.start(vp()).unwrap();
        let fresh = s.start(vp()).unwrap();
        assert_ne!(old, fresh);

        assert!(s.tick(old, 5000).is_empty());
        assert!(s.timer_tick(old).is_empty());
        assert_eq!(s.time_left_secs(), 60);
        assert_eq!(s.entities().count(), 0);

        // the fresh token still drives the session
        assert!(!s.tick(fresh, 16).is_empty());
        assert!(!s.timer_tick(fresh).is_empty());
        assert_eq!(s.time_left_secs(), 59);
    }

    #[test]
    fn stop_is_idempotent_and_commits_once() {
        let (mut s, store) = session(quiet_rules(), 0);
        let gen = s.start(vp()).unwrap();
        let ids = spawn_bugs(&mut s, gen, 1);
        s.squash(ids[0]);
        assert_eq!(s.score(), 10);

        let first = s.stop(Outcome::Win);
        assert!(matches!(
            first.first(),
            Some(GameEvent::SessionEnded { outcome: Outcome::Win })
        ));
        assert_eq!(store.get(), 10);

        // second stop: no events, no state change, same persisted value
        assert!(s.stop(Outcome::Lose).is_empty());
        assert_eq!(s.phase(), Phase::Ended(Outcome::Win));
        assert_eq!(store.get(), 10);

        // ticks after stop are inert too
        assert!(s.tick(gen, 16).is_empty());
        assert!(s.timer_tick(gen).is_empty());
    }

    #[test]
    fn high_score_keeps_the_maximum() {
        let (mut s, store) = session(quiet_rules(), 50);
        let gen = s.start(vp()).unwrap();
        let ids = spawn_bugs(&mut s, gen, 1);
        s.squash(ids[0]); // 10 points, below the stored 50
        s.stop(Outcome::Win);
        assert_eq!(store.get(), 50);
        assert_eq!(s.high_score(), 50);
    }

    #[test]
    fn dropped_powerup_banks_and_buff_clears_the_field() {
        let mut rules = quiet_rules();
        rules.powerup_drop_chance = 1.0;
        let (mut s, _) = session(rules, 0);
        let gen = s.start(vp()).unwrap();
        let ids = spawn_bugs(&mut s, gen, 2);

        // squashing always drops a power-up at chance 1.0
        let ev = s.squash(ids[0]);
        let pu = spawned_ids(&ev, EntityKind::PowerUp);
        assert_eq!(pu.len(), 1);

        assert!(matches!(
            s.collect_powerup(pu[0]).first(),
            Some(GameEvent::PowerUpCollected { .. })
        ));
        assert_eq!(s.buff_inventory(), 1);

        let ev = s.use_buff();
        assert!(matches!(ev.first(), Some(GameEvent::BuffStarted)));
        assert_eq!(s.phase(), Phase::Paused);
        assert_eq!(s.buff_inventory(), 0);

        // the countdown timer is frozen during the sequence
        let before = s.time_left_secs();
        assert!(s.timer_tick(gen).is_empty());
        assert_eq!(s.time_left_secs(), before);

        // squashes are ignored while paused
        assert!(s.squash(ids[1]).is_empty());

        // one vanish step clears the only remaining bug and resumes
        let score_before = s.score();
        let ev = s.tick(gen, 150);
        assert!(ev.iter().any(|e| matches!(e, GameEvent::BuffZap { .. })));
        assert!(ev.iter().any(|e| matches!(e, GameEvent::BuffEnded)));
        assert_eq!(s.phase(), Phase::Running);
        assert!(s.score() > score_before);
        assert_eq!(
            s.entities().filter(|e| e.kind.is_bug()).count(),
            0
        );
    }

    #[test]
    fn buff_without_inventory_or_targets_is_a_noop() {
        let (mut s, _) = session(quiet_rules(), 0);
        let _gen = s.start(vp()).unwrap();
        assert!(s.use_buff().is_empty()); // no inventory

        // bank a charge on an empty field: charge is kept
        let mut rules = quiet_rules();
        rules.powerup_chance = 1.0;
        let (mut s, _) = session(rules, 0);
        let gen2 = s.start(vp()).unwrap();
        let ev = s.tick(gen2, 16);
        let pu = spawned_ids(&ev, EntityKind::PowerUp);
        assert_eq!(pu.len(), 1);
        s.collect_powerup(pu[0]);
        assert!(s.use_buff().is_empty()); // no bugs to zap
        assert_eq!(s.buff_inventory(), 1);
    }

    #[test]
    fn collecting_a_bug_or_missing_id_is_a_noop() {
        let (mut s, _) = session(quiet_rules(), 0);
        let gen = s.start(vp()).unwrap();
        let ids = spawn_bugs(&mut s, gen, 1);
        assert!(s.collect_powerup(ids[0]).is_empty());
        assert!(s.collect_powerup(999).is_empty());
        assert_eq!(s.buff_inventory(), 0);
    }

    #[test]
    fn powerup_expires_by_lifetime() {
        let mut rules = quiet_rules();
        rules.powerup_chance = 1.0;
        rules.powerup_ttl_ms = 300;
        let (mut s, _) = session(rules, 0);
        let gen = s.start(vp()).unwrap();
        let ev = s.tick(gen, 16);
        let pu = spawned_ids(&ev, EntityKind::PowerUp)[0];

        let ev = s.tick(gen, 300);
        assert!(ev
            .iter()
            .any(|e| matches!(e, GameEvent::EntityExpired { id } if *id == pu)));
        // collecting after expiry is a no-op
        assert!(s.collect_powerup(pu).is_empty());
    }

    #[test]
    fn hit_test_finds_the_topmost_entity() {
        let mut rules = quiet_rules();
        rules.powerup_chance = 1.0;
        let (mut s, _) = session(rules, 0);
        let gen = s.start(vp()).unwrap();
        let ev = s.tick(gen, 16);
        let pu = spawned_ids(&ev, EntityKind::PowerUp)[0];
        let e = s.entities().find(|e| e.id == pu).unwrap().clone();
        assert_eq!(
            s.entity_at(e.x + 0.5, e.y + 0.5),
            Some((pu, EntityKind::PowerUp))
        );
        assert_eq!(s.entity_at(-50.0, -50.0), None);
    }
}
