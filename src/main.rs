/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use rand::rngs::StdRng;
use rand::SeedableRng;

use config::GameConfig;
use domain::entity::{EntityKind, Viewport};
use sim::event::GameEvent;
use sim::highscore::FileStore;
use sim::session::{GameSession, Generation, Outcome, Phase, StartError};
use ui::input::InputState;
use ui::renderer::{Renderer, HUD_ROWS};
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(16);
const TIMER_SECOND: Duration = Duration::from_secs(1);

const KEYS_START: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_BUFF: &[KeyCode] = &[KeyCode::Char('b'), KeyCode::Char('B')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q')];

fn main() {
    let cfg = GameConfig::load();
    let rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut session = GameSession::new(cfg.rules, Box::new(FileStore::new()), rng);

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = SoundEngine::new();

    let result = game_loop(&mut session, &mut renderer, sound.as_ref());

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing Bug Smasher!");
    println!("High score: {}", session.high_score());
}

fn game_loop(
    session: &mut GameSession,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut input = InputState::new();
    let mut gen: Option<Generation> = None;
    let mut last_frame = Instant::now();
    let mut timer_acc = Duration::ZERO;

    loop {
        input.drain_events();
        if input.ctrl_c_pressed() {
            break;
        }

        match session.phase() {
            // ── Title / result screens ──
            Phase::NotStarted | Phase::Ended(_) => {
                if input.any_pressed(KEYS_QUIT) || input.was_pressed(KeyCode::Esc) {
                    break;
                }
                if input.any_pressed(KEYS_START) {
                    if let Some(g) = try_start(session, renderer) {
                        gen = Some(g);
                        timer_acc = Duration::ZERO;
                        last_frame = Instant::now();
                        if let Some(sfx) = sound {
                            sfx.play_start();
                        }
                    }
                }
            }

            // ── In play ──
            Phase::Running | Phase::Paused => {
                if input.any_pressed(KEYS_QUIT) || input.was_pressed(KeyCode::Esc) {
                    // abandoning mid-round forfeits it
                    let events = session.stop(Outcome::Lose);
                    process_sound_events(sound, &events);
                    renderer.note_events(&events);
                }
                for &(col, row) in input.clicks() {
                    let events = route_click(session, col, row);
                    process_sound_events(sound, &events);
                    renderer.note_events(&events);
                }
                if input.any_pressed(KEYS_BUFF) {
                    let events = session.use_buff();
                    process_sound_events(sound, &events);
                    renderer.note_events(&events);
                }
            }
        }

        // Frame update + 1-second countdown, both keyed to the current
        // generation: after a stop or restart, the old token goes inert.
        let dt = last_frame.elapsed();
        last_frame = Instant::now();
        if let Some(g) = gen {
            let mut events = session.tick(g, dt.as_millis() as u64);
            timer_acc += dt;
            while timer_acc >= TIMER_SECOND {
                timer_acc -= TIMER_SECOND;
                events.extend(session.timer_tick(g));
            }
            process_sound_events(sound, &events);
            renderer.note_events(&events);
        }

        renderer.render(session)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Start a round sized to the current terminal.
fn try_start(session: &mut GameSession, renderer: &mut Renderer) -> Option<Generation> {
    let (cols, rows) = crossterm::terminal::size().unwrap_or((0, 0));
    let vp = Viewport::new(cols as f32, rows.saturating_sub(HUD_ROWS) as f32);
    match session.start(vp) {
        Ok(g) => {
            renderer.clear_status();
            Some(g)
        }
        Err(StartError::InvalidViewport) => {
            renderer.set_status("cannot size the play area; resize the terminal and try again");
            None
        }
    }
}

/// Map a terminal click onto the entity under it.
fn route_click(session: &mut GameSession, col: u16, row: u16) -> Vec<GameEvent> {
    if row < HUD_ROWS {
        return Vec::new();
    }
    // aim at the center of the clicked cell
    let x = col as f32 + 0.5;
    let y = (row - HUD_ROWS) as f32 + 0.5;
    match session.entity_at(x, y) {
        Some((id, EntityKind::PowerUp)) => session.collect_powerup(id),
        Some((id, _)) => session.squash(id),
        None => Vec::new(),
    }
}

fn process_sound_events(sound: Option<&SoundEngine>, events: &[GameEvent]) {
    let sfx = match sound {
        Some(s) => s,
        None => return,
    };
    for event in events {
        match event {
            GameEvent::BugSquashed { .. } => sfx.play_squash(),
            GameEvent::BugHit { .. } => sfx.play_boss_hit(),
            GameEvent::PowerUpCollected { .. } => sfx.play_powerup(),
            GameEvent::BuffZap { .. } => sfx.play_zap(),
            GameEvent::SessionEnded { .. } => sfx.play_game_over(),
            _ => {}
        }
    }
}
