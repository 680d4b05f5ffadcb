/// Spawn scheduling and the difficulty ramp.
///
/// The scheduler owns two countdowns: one to the next spawn, one to the
/// next ramp step. Ramp steps tighten the spawn interval toward a floor
/// and raise bug speed toward a cap, each by a fixed increment, and
/// only ever in that direction.
///
/// Kind selection is weighted random against a census of the live
/// population: at most one boss and one power-up may be alive at a
/// time, so those rolls only happen when their slot is free.

use rand::Rng;

use crate::config::RulesConfig;
use crate::domain::entity::EntityKind;

/// What the scheduler needs to know about the live population.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpawnCensus {
    pub bosses: usize,
    pub powerups: usize,
}

pub struct SpawnScheduler {
    time_to_next_spawn_ms: i64,
    time_to_ramp_ms: i64,
    interval_ms: u32,
    speed: f32,
    level: u32,

    interval_floor_ms: u32,
    interval_step_ms: u32,
    speed_cap: f32,
    speed_step: f32,
    cadence_ms: u32,
    boss_chance: f64,
    powerup_chance: f64,
}

impl SpawnScheduler {
    pub fn new(rules: &RulesConfig) -> Self {
        SpawnScheduler {
            // first spawn fires on the first tick
            time_to_next_spawn_ms: 0,
            time_to_ramp_ms: rules.difficulty_cadence_ms as i64,
            interval_ms: rules.spawn_interval_ms,
            speed: rules.speed,
            level: 0,
            interval_floor_ms: rules.spawn_interval_floor_ms,
            interval_step_ms: rules.spawn_interval_step_ms,
            speed_cap: rules.speed_cap,
            speed_step: rules.speed_step,
            cadence_ms: rules.difficulty_cadence_ms,
            boss_chance: rules.boss_chance,
            powerup_chance: rules.powerup_chance,
        }
    }

    /// Advance both countdowns; returns the kind to spawn when the
    /// spawn countdown elapses.
    pub fn tick(
        &mut self,
        dt_ms: u64,
        census: SpawnCensus,
        rng: &mut impl Rng,
    ) -> Option<EntityKind> {
        self.time_to_ramp_ms -= dt_ms as i64;
        while self.time_to_ramp_ms <= 0 {
            self.ramp();
            self.time_to_ramp_ms += self.cadence_ms as i64;
        }

        self.time_to_next_spawn_ms -= dt_ms as i64;
        if self.time_to_next_spawn_ms > 0 {
            return None;
        }
        self.time_to_next_spawn_ms = self.interval_ms as i64;
        Some(self.choose_kind(census, rng))
    }

    fn ramp(&mut self) {
        if self.interval_ms > self.interval_floor_ms {
            self.interval_ms = self
                .interval_ms
                .saturating_sub(self.interval_step_ms)
                .max(self.interval_floor_ms);
        }
        if self.speed < self.speed_cap {
            self.speed = (self.speed + self.speed_step).min(self.speed_cap);
        }
        self.level += 1;
    }

    fn choose_kind(&self, census: SpawnCensus, rng: &mut impl Rng) -> EntityKind {
        if census.powerups == 0 && rng.gen_bool(self.powerup_chance) {
            EntityKind::PowerUp
        } else if census.bosses == 0 && rng.gen_bool(self.boss_chance) {
            EntityKind::BossBug
        } else {
            EntityKind::NormalBug
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    #[allow(dead_code)] // exercised by tests
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Number of ramp steps taken so far.
    pub fn level(&self) -> u32 {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rules() -> RulesConfig {
        RulesConfig::default()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn first_spawn_fires_immediately_then_waits() {
        let mut s = SpawnScheduler::new(&rules());
        let mut r = rng();
        assert!(s.tick(16, SpawnCensus::default(), &mut r).is_some());
        assert!(s.tick(16, SpawnCensus::default(), &mut r).is_none());
        // countdown was re-armed to the full interval
        assert!(s.tick(1999, SpawnCensus::default(), &mut r).is_some());
    }

    #[test]
    fn ramp_is_monotonic_to_floor_and_cap() {
        let mut s = SpawnScheduler::new(&rules());
        let mut r = rng();
        let mut last_interval = s.interval_ms();
        let mut last_speed = s.speed();
        // 200 ramp steps is far past both limits
        for _ in 0..200 {
            let _ = s.tick(5000, SpawnCensus::default(), &mut r);
            assert!(s.interval_ms() <= last_interval);
            assert!(s.speed() >= last_speed);
            last_interval = s.interval_ms();
            last_speed = s.speed();
        }
        assert_eq!(s.interval_ms(), rules().spawn_interval_floor_ms);
        assert!((s.speed() - rules().speed_cap).abs() < 1e-6);
        assert_eq!(s.level(), 200);
    }

    #[test]
    fn boss_and_powerup_respect_exclusivity() {
        let mut cfg = rules();
        cfg.powerup_chance = 1.0;
        cfg.boss_chance = 1.0;
        let mut s = SpawnScheduler::new(&cfg);
        let mut r = rng();

        // empty field: power-up roll wins first
        let k = s.tick(16, SpawnCensus::default(), &mut r).unwrap();
        assert_eq!(k, EntityKind::PowerUp);

        // power-up slot taken: boss roll wins
        let census = SpawnCensus { bosses: 0, powerups: 1 };
        let k = s.tick(5000, census, &mut r).unwrap();
        assert_eq!(k, EntityKind::BossBug);

        // both slots taken: only normal bugs remain
        let census = SpawnCensus { bosses: 1, powerups: 1 };
        let k = s.tick(5000, census, &mut r).unwrap();
        assert_eq!(k, EntityKind::NormalBug);
    }

    #[test]
    fn zero_chances_always_spawn_normal_bugs() {
        let mut cfg = rules();
        cfg.powerup_chance = 0.0;
        cfg.boss_chance = 0.0;
        let mut s = SpawnScheduler::new(&cfg);
        let mut r = rng();
        for _ in 0..50 {
            let k = s.tick(5000, SpawnCensus::default(), &mut r).unwrap();
            assert_eq!(k, EntityKind::NormalBug);
        }
    }
}
