/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
/// Every tunable of a round lives in `[rules]`; `[general]` holds the
/// optional RNG seed for reproducible sessions.

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub rules: RulesConfig,
    /// Fixed RNG seed. None = fresh entropy each run.
    pub seed: Option<u64>,
}

/// All gameplay tunables for one round.
#[derive(Clone, Debug)]
pub struct RulesConfig {
    pub round_secs: u32,
    pub spawn_interval_ms: u32,        // starting gap between spawns
    pub spawn_interval_floor_ms: u32,  // ramp never tightens below this
    pub spawn_interval_step_ms: u32,
    pub speed: f32,                    // starting bug speed (units per 16ms frame)
    pub speed_cap: f32,
    pub speed_step: f32,
    pub difficulty_cadence_ms: u32,    // gap between ramp steps
    pub combo_window_ms: u64,
    pub bug_points: u32,
    pub boss_points: u32,
    pub boss_health: u32,
    pub boss_chance: f64,
    pub powerup_chance: f64,
    pub powerup_drop_chance: f64,      // rolled on every squashed bug
    pub powerup_ttl_ms: u32,
    pub reproduction: bool,
    pub reproduce_min_ms: u32,
    pub reproduce_max_ms: u32,
    pub area_loss_ratio: f32,          // infestation footprint that loses the round
    pub bug_w: f32,
    pub bug_h: f32,
    pub boss_w: f32,
    pub boss_h: f32,
    pub powerup_w: f32,
    pub powerup_h: f32,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    rules: TomlRules,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlRules {
    #[serde(default = "default_round_secs")]
    round_secs: u32,
    #[serde(default = "default_spawn_interval")]
    spawn_interval_ms: u32,
    #[serde(default = "default_spawn_floor")]
    spawn_interval_floor_ms: u32,
    #[serde(default = "default_spawn_step")]
    spawn_interval_step_ms: u32,
    #[serde(default = "default_speed")]
    speed: f32,
    #[serde(default = "default_speed_cap")]
    speed_cap: f32,
    #[serde(default = "default_speed_step")]
    speed_step: f32,
    #[serde(default = "default_cadence")]
    difficulty_cadence_ms: u32,
    #[serde(default = "default_combo_window")]
    combo_window_ms: u64,
    #[serde(default = "default_bug_points")]
    bug_points: u32,
    #[serde(default = "default_boss_points")]
    boss_points: u32,
    #[serde(default = "default_boss_health")]
    boss_health: u32,
    #[serde(default = "default_boss_chance")]
    boss_chance: f64,
    #[serde(default = "default_powerup_chance")]
    powerup_chance: f64,
    #[serde(default = "default_drop_chance")]
    powerup_drop_chance: f64,
    #[serde(default = "default_powerup_ttl")]
    powerup_ttl_ms: u32,
    #[serde(default = "default_reproduction")]
    reproduction: bool,
    #[serde(default = "default_reproduce_min")]
    reproduce_min_ms: u32,
    #[serde(default = "default_reproduce_max")]
    reproduce_max_ms: u32,
    #[serde(default = "default_area_loss")]
    area_loss_ratio: f32,
    #[serde(default = "default_bug_w")]
    bug_w: f32,
    #[serde(default = "default_bug_h")]
    bug_h: f32,
    #[serde(default = "default_boss_w")]
    boss_w: f32,
    #[serde(default = "default_boss_h")]
    boss_h: f32,
    #[serde(default = "default_powerup_w")]
    powerup_w: f32,
    #[serde(default = "default_powerup_h")]
    powerup_h: f32,
}

#[derive(Deserialize, Debug, Default)]
struct TomlGeneral {
    #[serde(default)]
    seed: Option<u64>,
}

// ── Defaults ──

fn default_round_secs() -> u32 { 60 }
fn default_spawn_interval() -> u32 { 2000 }
fn default_spawn_floor() -> u32 { 500 }
fn default_spawn_step() -> u32 { 50 }
fn default_speed() -> f32 { 0.8 }
fn default_speed_cap() -> f32 { 3.0 }
fn default_speed_step() -> f32 { 0.05 }
fn default_cadence() -> u32 { 5000 }
fn default_combo_window() -> u64 { 1500 }
fn default_bug_points() -> u32 { 10 }
fn default_boss_points() -> u32 { 50 }
fn default_boss_health() -> u32 { 5 }
fn default_boss_chance() -> f64 { 0.10 }
fn default_powerup_chance() -> f64 { 0.10 }
fn default_drop_chance() -> f64 { 0.10 }
fn default_powerup_ttl() -> u32 { 6000 }
fn default_reproduction() -> bool { true }
fn default_reproduce_min() -> u32 { 5000 }
fn default_reproduce_max() -> u32 { 7000 }
fn default_area_loss() -> f32 { 0.75 }
fn default_bug_w() -> f32 { 4.0 }
fn default_bug_h() -> f32 { 2.0 }
fn default_boss_w() -> f32 { 8.0 }
fn default_boss_h() -> f32 { 3.0 }
fn default_powerup_w() -> f32 { 3.0 }
fn default_powerup_h() -> f32 { 1.0 }

impl Default for TomlRules {
    fn default() -> Self {
        TomlRules {
            round_secs: default_round_secs(),
            spawn_interval_ms: default_spawn_interval(),
            spawn_interval_floor_ms: default_spawn_floor(),
            spawn_interval_step_ms: default_spawn_step(),
            speed: default_speed(),
            speed_cap: default_speed_cap(),
            speed_step: default_speed_step(),
            difficulty_cadence_ms: default_cadence(),
            combo_window_ms: default_combo_window(),
            bug_points: default_bug_points(),
            boss_points: default_boss_points(),
            boss_health: default_boss_health(),
            boss_chance: default_boss_chance(),
            powerup_chance: default_powerup_chance(),
            powerup_drop_chance: default_drop_chance(),
            powerup_ttl_ms: default_powerup_ttl(),
            reproduction: default_reproduction(),
            reproduce_min_ms: default_reproduce_min(),
            reproduce_max_ms: default_reproduce_max(),
            area_loss_ratio: default_area_loss(),
            bug_w: default_bug_w(),
            bug_h: default_bug_h(),
            boss_w: default_boss_w(),
            boss_h: default_boss_h(),
            powerup_w: default_powerup_w(),
            powerup_h: default_powerup_h(),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig::from_toml(TomlRules::default())
    }
}

impl RulesConfig {
    /// A zero-cadence ramp or a zero-health boss would wedge the
    /// simulation; inverted reproduce ranges and out-of-range
    /// probabilities would panic at sample time; a zero loss ratio
    /// would end a round before the first spawn.
    fn from_toml(t: TomlRules) -> Self {
        RulesConfig {
            round_secs: t.round_secs,
            spawn_interval_ms: t.spawn_interval_ms,
            spawn_interval_floor_ms: t.spawn_interval_floor_ms,
            spawn_interval_step_ms: t.spawn_interval_step_ms,
            speed: t.speed,
            speed_cap: t.speed_cap,
            speed_step: t.speed_step,
            difficulty_cadence_ms: t.difficulty_cadence_ms.max(1),
            combo_window_ms: t.combo_window_ms,
            bug_points: t.bug_points,
            boss_points: t.boss_points,
            boss_health: t.boss_health.max(1),
            boss_chance: t.boss_chance.clamp(0.0, 1.0),
            powerup_chance: t.powerup_chance.clamp(0.0, 1.0),
            powerup_drop_chance: t.powerup_drop_chance.clamp(0.0, 1.0),
            powerup_ttl_ms: t.powerup_ttl_ms,
            reproduction: t.reproduction,
            reproduce_min_ms: t.reproduce_min_ms,
            reproduce_max_ms: t.reproduce_max_ms.max(t.reproduce_min_ms),
            area_loss_ratio: t.area_loss_ratio.max(0.01),
            bug_w: t.bug_w,
            bug_h: t.bug_h,
            boss_w: t.boss_w,
            boss_h: t.boss_h,
            powerup_w: t.powerup_w,
            powerup_h: t.powerup_h,
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let toml_cfg = load_toml(&candidate_dirs());
        GameConfig {
            rules: RulesConfig::from_toml(toml_cfg.rules),
            seed: toml_cfg.general.seed,
        }
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        // Resolve symlinks so an installed binary still finds its config.
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        eprintln!("Warning: config.toml parse error: {e}");
                        eprintln!("Using default settings.");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    eprintln!("Warning: could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: TomlConfig = toml::from_str("").unwrap();
        let seed = cfg.general.seed;
        let rules = RulesConfig::from_toml(cfg.rules);
        assert_eq!(rules.round_secs, 60);
        assert_eq!(rules.spawn_interval_ms, 2000);
        assert!((rules.speed - 0.8).abs() < f32::EPSILON);
        assert_eq!(seed, None);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg: TomlConfig = toml::from_str(
            "[rules]\nround_secs = 90\nboss_health = 8\n\n[general]\nseed = 7\n",
        )
        .unwrap();
        let seed = cfg.general.seed;
        let rules = RulesConfig::from_toml(cfg.rules);
        assert_eq!(rules.round_secs, 90);
        assert_eq!(rules.boss_health, 8);
        assert_eq!(rules.combo_window_ms, 1500);
        assert_eq!(seed, Some(7));
    }

    #[test]
    fn degenerate_values_are_clamped() {
        let cfg: TomlConfig = toml::from_str(
            "[rules]\ndifficulty_cadence_ms = 0\nboss_health = 0\nreproduce_min_ms = 9000\nreproduce_max_ms = 100\nboss_chance = 3.5\narea_loss_ratio = 0.0\n",
        )
        .unwrap();
        let rules = RulesConfig::from_toml(cfg.rules);
        assert_eq!(rules.difficulty_cadence_ms, 1);
        assert_eq!(rules.boss_health, 1);
        assert!(rules.reproduce_max_ms >= rules.reproduce_min_ms);
        assert!(rules.boss_chance <= 1.0);
        assert!(rules.area_loss_ratio > 0.0);
    }
}
