/// Entities: normal bugs, boss bugs, power-ups, particles.
///
/// Pure data plus the motion/decay rules that advance it. All positions
/// are in abstract screen units with the origin at the top-left of the
/// play area; the presentation layer decides what a unit looks like.
///
/// Motion is frame-rate independent: velocities are stored in units per
/// 16ms reference frame and scaled by the measured delta on every
/// advance.

use rand::Rng;

pub type EntityId = u64;

/// How far outside an edge a crossing bug spawns.
const SPAWN_OFFSET: f32 = 80.0;
/// How far outside the play area an entity may drift before removal.
const DESPAWN_MARGIN: f32 = 100.0;
/// Boss bugs lumber at a fraction of the current bug speed.
const BOSS_SPEED_FACTOR: f32 = 0.7;
/// Particle burst tuning, per squashed bug.
const PARTICLE_SPREAD: f32 = 8.0;
const PARTICLE_GRAVITY: f32 = 0.1;
const PARTICLE_TTL_MS: i64 = 480;
/// Child bugs land within this box around the parent.
const CHILD_SCATTER: f32 = 100.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntityKind {
    NormalBug,
    BossBug,
    PowerUp,
    Particle,
}

impl EntityKind {
    pub fn is_bug(self) -> bool {
        matches!(self, EntityKind::NormalBug | EntityKind::BossBug)
    }
}

/// Dimensions of the play area, fixed at session start.
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Viewport { width, height }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

#[derive(Clone, Debug)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Remaining hits to destroy. Zero = scheduled for removal.
    pub health: u32,
    pub width: f32,
    pub height: f32,
    /// Countdown to removal in ms (power-ups, particles).
    pub ttl_ms: Option<i64>,
    /// Countdown to spawning a child bug in ms (breeding bugs).
    pub time_to_reproduce_ms: Option<i64>,
    /// Session clock at creation.
    pub born_at_ms: u64,
}

impl Entity {
    /// A normal bug entering from a random edge, crossing toward the
    /// opposite one.
    pub fn bug(
        id: EntityId,
        vp: Viewport,
        speed: f32,
        size: (f32, f32),
        reproduce_after: Option<i64>,
        rng: &mut impl Rng,
        now_ms: u64,
    ) -> Self {
        let (x, y, vx, vy) = crossing_course(vp, speed, rng);
        Entity {
            id,
            kind: EntityKind::NormalBug,
            x,
            y,
            vx,
            vy,
            health: 1,
            width: size.0,
            height: size.1,
            ttl_ms: None,
            time_to_reproduce_ms: reproduce_after,
            born_at_ms: now_ms,
        }
    }

    /// A boss bug: same crossing course, slower, multiple hits.
    pub fn boss(
        id: EntityId,
        vp: Viewport,
        speed: f32,
        size: (f32, f32),
        health: u32,
        rng: &mut impl Rng,
        now_ms: u64,
    ) -> Self {
        let (x, y, vx, vy) = crossing_course(vp, speed * BOSS_SPEED_FACTOR, rng);
        Entity {
            id,
            kind: EntityKind::BossBug,
            x,
            y,
            vx,
            vy,
            health,
            width: size.0,
            height: size.1,
            ttl_ms: None,
            time_to_reproduce_ms: None,
            born_at_ms: now_ms,
        }
    }

    /// A power-up placed statically, bounding box fully inside the play
    /// area, removed by lifetime rather than bounds-exit.
    pub fn powerup(
        id: EntityId,
        vp: Viewport,
        size: (f32, f32),
        ttl_ms: i64,
        rng: &mut impl Rng,
        now_ms: u64,
    ) -> Self {
        let x = sample_inside(vp.width, size.0, rng);
        let y = sample_inside(vp.height, size.1, rng);
        Entity::powerup_at(id, vp, (x, y), size, ttl_ms, now_ms)
    }

    /// A power-up dropped at a specific point (clamped into bounds).
    pub fn powerup_at(
        id: EntityId,
        vp: Viewport,
        pos: (f32, f32),
        size: (f32, f32),
        ttl_ms: i64,
        now_ms: u64,
    ) -> Self {
        Entity {
            id,
            kind: EntityKind::PowerUp,
            x: clamp_inside(pos.0, vp.width, size.0),
            y: clamp_inside(pos.1, vp.height, size.1),
            vx: 0.0,
            vy: 0.0,
            health: 1,
            width: size.0,
            height: size.1,
            ttl_ms: Some(ttl_ms),
            time_to_reproduce_ms: None,
            born_at_ms: now_ms,
        }
    }

    /// A child bug scattered around its parent, clamped into bounds.
    pub fn child_bug(
        id: EntityId,
        parent: &Entity,
        vp: Viewport,
        size: (f32, f32),
        reproduce_after: i64,
        rng: &mut impl Rng,
        now_ms: u64,
    ) -> Self {
        let x = parent.x + rng.gen_range(-CHILD_SCATTER..=CHILD_SCATTER);
        let y = parent.y + rng.gen_range(-CHILD_SCATTER..=CHILD_SCATTER);
        Entity {
            id,
            kind: EntityKind::NormalBug,
            x: clamp_inside(x, vp.width, size.0),
            y: clamp_inside(y, vp.height, size.1),
            vx: 0.0,
            vy: 0.0,
            health: 1,
            width: size.0,
            height: size.1,
            ttl_ms: None,
            time_to_reproduce_ms: Some(reproduce_after),
            born_at_ms: now_ms,
        }
    }

    /// One debris particle of a squash burst.
    pub fn particle(id: EntityId, x: f32, y: f32, rng: &mut impl Rng, now_ms: u64) -> Self {
        Entity {
            id,
            kind: EntityKind::Particle,
            x,
            y,
            vx: (rng.gen::<f32>() - 0.5) * PARTICLE_SPREAD,
            vy: (rng.gen::<f32>() - 0.5) * PARTICLE_SPREAD,
            health: 1,
            width: 1.0,
            height: 1.0,
            ttl_ms: Some(PARTICLE_TTL_MS),
            time_to_reproduce_ms: None,
            born_at_ms: now_ms,
        }
    }

    // ── Per-tick update ──

    /// Advance position and countdowns by `dt_ms`.
    pub fn advance(&mut self, dt_ms: u64) {
        let scale = dt_ms as f32 / 16.0;
        self.x += self.vx * scale;
        self.y += self.vy * scale;
        if self.kind == EntityKind::Particle {
            self.vy += PARTICLE_GRAVITY * scale;
        }
        if let Some(t) = self.ttl_ms.as_mut() {
            *t -= dt_ms as i64;
        }
        if let Some(t) = self.time_to_reproduce_ms.as_mut() {
            *t -= dt_ms as i64;
        }
    }

    /// Has this entity run its course (lifetime spent, or drifted far
    /// enough off-screen)?
    pub fn is_expired(&self, vp: &Viewport) -> bool {
        let ttl_spent = self.ttl_ms.map_or(false, |t| t <= 0);
        match self.kind {
            EntityKind::PowerUp => ttl_spent,
            _ => ttl_spent || self.out_of_bounds(vp),
        }
    }

    fn out_of_bounds(&self, vp: &Viewport) -> bool {
        self.x < -DESPAWN_MARGIN
            || self.x > vp.width + DESPAWN_MARGIN
            || self.y < -DESPAWN_MARGIN
            || self.y > vp.height + DESPAWN_MARGIN
    }

    /// Take one hit. Returns remaining health (never underflows).
    pub fn apply_hit(&mut self) -> u32 {
        self.health = self.health.saturating_sub(1);
        self.health
    }

    // ── Geometry ──

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

// ── Spawn geometry ──

/// Pick a spawn point just outside a random edge and a velocity toward
/// a random point on the opposite edge.
///
/// The spawn point is always outside the play area and the target on
/// the far side, so the two can never coincide, but the distance guard
/// stays: a zero-length course must never produce NaN velocity.
fn crossing_course(vp: Viewport, speed: f32, rng: &mut impl Rng) -> (f32, f32, f32, f32) {
    let (sx, sy, mut tx, mut ty) = match rng.gen_range(0..4u8) {
        // left edge → right edge
        0 => (
            -SPAWN_OFFSET,
            rng.gen::<f32>() * vp.height,
            vp.width,
            rng.gen::<f32>() * vp.height,
        ),
        // right edge → left edge
        1 => (
            vp.width + SPAWN_OFFSET,
            rng.gen::<f32>() * vp.height,
            -SPAWN_OFFSET,
            rng.gen::<f32>() * vp.height,
        ),
        // top edge → bottom edge
        2 => (
            rng.gen::<f32>() * vp.width,
            -SPAWN_OFFSET,
            rng.gen::<f32>() * vp.width,
            vp.height,
        ),
        // bottom edge → top edge
        _ => (
            rng.gen::<f32>() * vp.width,
            vp.height + SPAWN_OFFSET,
            rng.gen::<f32>() * vp.width,
            -SPAWN_OFFSET,
        ),
    };

    let mut dx = tx - sx;
    let mut dy = ty - sy;
    let mut dist = (dx * dx + dy * dy).sqrt();
    while dist == 0.0 {
        tx = rng.gen::<f32>() * vp.width;
        ty = rng.gen::<f32>() * vp.height;
        dx = tx - sx;
        dy = ty - sy;
        dist = (dx * dx + dy * dy).sqrt();
    }

    (sx, sy, dx / dist * speed, dy / dist * speed)
}

/// Uniform coordinate such that `[v, v + size)` fits in `[0, dim)`.
fn sample_inside(dim: f32, size: f32, rng: &mut impl Rng) -> f32 {
    if dim <= size {
        return 0.0;
    }
    rng.gen::<f32>() * (dim - size)
}

fn clamp_inside(v: f32, dim: f32, size: f32) -> f32 {
    v.max(0.0).min((dim - size).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0xB065)
    }

    fn vp() -> Viewport {
        Viewport::new(200.0, 100.0)
    }

    #[test]
    fn crossing_bug_has_finite_unit_course() {
        let mut r = rng();
        for _ in 0..200 {
            let e = Entity::bug(1, vp(), 1.5, (4.0, 2.0), None, &mut r, 0);
            assert!(e.x.is_finite() && e.y.is_finite());
            assert!(e.vx.is_finite() && e.vy.is_finite());
            let mag = (e.vx * e.vx + e.vy * e.vy).sqrt();
            assert!((mag - 1.5).abs() < 1e-3, "speed was {mag}");
        }
    }

    #[test]
    fn boss_moves_slower_than_bugs() {
        let mut r = rng();
        let b = Entity::boss(1, vp(), 2.0, (8.0, 3.0), 5, &mut r, 0);
        let mag = (b.vx * b.vx + b.vy * b.vy).sqrt();
        assert!((mag - 1.4).abs() < 1e-3);
    }

    #[test]
    fn advance_scales_with_delta() {
        let mut e = Entity {
            id: 1,
            kind: EntityKind::NormalBug,
            x: 0.0,
            y: 0.0,
            vx: 1.0,
            vy: 0.0,
            health: 1,
            width: 4.0,
            height: 2.0,
            ttl_ms: None,
            time_to_reproduce_ms: Some(100),
            born_at_ms: 0,
        };
        e.advance(32); // two reference frames
        assert!((e.x - 2.0).abs() < 1e-6);
        assert_eq!(e.time_to_reproduce_ms, Some(68));
    }

    #[test]
    fn expiry_by_bounds_and_ttl() {
        let mut r = rng();
        let mut e = Entity::bug(1, vp(), 1.0, (4.0, 2.0), None, &mut r, 0);
        assert!(!e.is_expired(&vp())); // spawn offset is inside the despawn margin
        e.x = -101.0;
        assert!(e.is_expired(&vp()));

        let mut p = Entity::powerup(2, vp(), (3.0, 1.0), 50, &mut r, 0);
        assert!(!p.is_expired(&vp()));
        p.advance(50);
        assert!(p.is_expired(&vp()));
    }

    #[test]
    fn powerup_fits_inside_container() {
        let mut r = rng();
        for _ in 0..100 {
            let p = Entity::powerup(1, vp(), (3.0, 1.0), 1000, &mut r, 0);
            assert!(p.x >= 0.0 && p.x + p.width <= vp().width);
            assert!(p.y >= 0.0 && p.y + p.height <= vp().height);
            assert_eq!(p.vx, 0.0);
            assert_eq!(p.vy, 0.0);
        }
    }

    #[test]
    fn child_scatters_near_parent_within_bounds() {
        let mut r = rng();
        let parent = Entity::bug(1, vp(), 1.0, (4.0, 2.0), Some(5000), &mut r, 0);
        for _ in 0..100 {
            let c = Entity::child_bug(2, &parent, vp(), (4.0, 2.0), 6000, &mut r, 10);
            assert!(c.x >= 0.0 && c.x + c.width <= vp().width);
            assert!(c.y >= 0.0 && c.y + c.height <= vp().height);
            assert!(c.time_to_reproduce_ms.is_some());
        }
    }

    #[test]
    fn hit_never_underflows() {
        let mut r = rng();
        let mut b = Entity::boss(1, vp(), 1.0, (8.0, 3.0), 2, &mut r, 0);
        assert_eq!(b.apply_hit(), 1);
        assert_eq!(b.apply_hit(), 0);
        assert_eq!(b.apply_hit(), 0);
    }

    #[test]
    fn particle_falls_and_fades() {
        let mut r = rng();
        let mut p = Entity::particle(1, 10.0, 10.0, &mut r, 0);
        let vy0 = p.vy;
        p.advance(16);
        assert!(p.vy > vy0);
        for _ in 0..30 {
            p.advance(16);
        }
        assert!(p.is_expired(&vp()));
    }

    #[test]
    fn hit_test_uses_bounding_box() {
        let p = Entity::powerup_at(1, vp(), (10.0, 10.0), (3.0, 1.0), 1000, 0);
        assert!(p.contains(10.0, 10.0));
        assert!(p.contains(12.9, 10.5));
        assert!(!p.contains(13.0, 10.0));
        assert!(!p.contains(10.0, 11.0));
    }
}
