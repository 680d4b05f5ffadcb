/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// Each frame is built into a front buffer of cells, compared against
/// the previous frame, and only changed cells are written to the
/// terminal, all commands batched with `queue!` and flushed once.
/// That keeps the per-frame output small enough for the decorative
/// rain to animate without flicker.
///
/// Terminal cells map 1:1 to simulation units: the play area starts
/// below the one-row HUD.

use std::io::{self, BufWriter, Write};
use std::time::{Duration, Instant};

use crossterm::{
    cursor::{self, MoveTo},
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::entity::EntityKind;
use crate::sim::event::GameEvent;
use crate::sim::session::{GameSession, Outcome, Phase};

/// Rows reserved above the play area.
pub const HUD_ROWS: u16 = 1;

const FLASH_DURATION: Duration = Duration::from_millis(120);
const SHAKE_DURATION: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, PartialEq)]
struct Cell {
    ch: char,
    fg: Color,
}

const BLANK: Cell = Cell { ch: ' ', fg: Color::Reset };
/// Sentinel that differs from every drawable cell, forcing a full diff.
const INVALID: Cell = Cell { ch: '\0', fg: Color::Magenta };

struct Flash {
    x: u16,
    y: u16,
    until: Instant,
}

pub struct Renderer {
    cols: u16,
    rows: u16,
    front: Vec<Cell>,
    back: Vec<Cell>,
    rain: MatrixRain,
    flashes: Vec<Flash>,
    shake_until: Option<Instant>,
    frame: u64,
    status: Option<String>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            cols: 0,
            rows: 0,
            front: Vec::new(),
            back: Vec::new(),
            rain: MatrixRain::new(),
            flashes: Vec::new(),
            shake_until: None,
            frame: 0,
            status: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            io::stdout(),
            EnterAlternateScreen,
            cursor::Hide,
            EnableMouseCapture,
            Clear(ClearType::All)
        )
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            io::stdout(),
            DisableMouseCapture,
            cursor::Show,
            LeaveAlternateScreen,
            ResetColor
        )?;
        terminal::disable_raw_mode()
    }

    /// One-line message for the title screen (e.g. a start failure).
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = Some(msg.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Fold a tick's events into transient visual effects.
    pub fn note_events(&mut self, events: &[GameEvent]) {
        let now = Instant::now();
        for ev in events {
            match ev {
                GameEvent::BugHit { x, y, .. } => self.flashes.push(Flash {
                    x: x.round().max(0.0) as u16,
                    y: y.round().max(0.0) as u16,
                    until: now + FLASH_DURATION,
                }),
                GameEvent::BugSquashed { kind: EntityKind::BossBug, .. } => {
                    self.shake_until = Some(now + SHAKE_DURATION);
                }
                GameEvent::BuffZap { x, y, .. } => self.flashes.push(Flash {
                    x: x.round().max(0.0) as u16,
                    y: y.round().max(0.0) as u16,
                    until: now + FLASH_DURATION,
                }),
                _ => {}
            }
        }
    }

    // ── Frame assembly ──

    pub fn render(&mut self, session: &GameSession) -> io::Result<()> {
        self.frame = self.frame.wrapping_add(1);
        self.sync_size()?;
        if self.cols < 20 || self.rows < 6 {
            return Ok(()); // too small to draw anything sensible
        }

        self.front.fill(BLANK);
        self.draw_rain();

        match session.phase() {
            Phase::NotStarted => self.draw_title(session),
            Phase::Ended(outcome) => self.draw_result(session, outcome),
            Phase::Running | Phase::Paused => {
                self.draw_hud(session);
                self.draw_entities(session);
                self.draw_flashes();
                if session.phase() == Phase::Paused {
                    self.draw_centered(self.rows / 2, "*** Z A P ***", Color::Yellow);
                }
            }
        }

        self.flush_diff()
    }

    fn sync_size(&mut self) -> io::Result<()> {
        let (cols, rows) = terminal::size()?;
        if cols != self.cols || rows != self.rows {
            self.cols = cols;
            self.rows = rows;
            let len = cols as usize * rows as usize;
            self.front = vec![BLANK; len];
            self.back = vec![INVALID; len];
            self.rain.resize(cols as usize);
            execute!(io::stdout(), Clear(ClearType::All))?;
        }
        Ok(())
    }

    fn put(&mut self, col: i32, row: i32, ch: char, fg: Color) {
        if col < 0 || row < 0 || col >= self.cols as i32 || row >= self.rows as i32 {
            return;
        }
        self.front[row as usize * self.cols as usize + col as usize] = Cell { ch, fg };
    }

    fn put_str(&mut self, col: i32, row: i32, text: &str, fg: Color) {
        for (i, ch) in text.chars().enumerate() {
            self.put(col + i as i32, row, ch, fg);
        }
    }

    fn draw_centered(&mut self, row: u16, text: &str, fg: Color) {
        let col = (self.cols as i32 - text.chars().count() as i32) / 2;
        self.put_str(col, row as i32, text, fg);
    }

    // ── Layers ──

    fn draw_rain(&mut self) {
        self.rain.step(self.frame, self.rows as usize);
        let heads: Vec<(usize, u16)> = self.rain.drops.iter().copied().enumerate().collect();
        for (col, head) in heads {
            for t in 0..6i32 {
                let row = head as i32 - t;
                if row < HUD_ROWS as i32 {
                    continue;
                }
                // stable per-cell digit so the trail doesn't boil
                let digit = if (col as i32 * 31 + row * 17) % 2 == 0 { '0' } else { '1' };
                let fg = if t == 0 { Color::Green } else { Color::DarkGreen };
                self.put(col as i32, row, digit, fg);
            }
        }
    }

    fn draw_hud(&mut self, session: &GameSession) {
        let hud = format!(
            " SCORE {:<6} COMBO x{:<3} TIME {:>3}s  BUFFS {}  HI {:<6} LVL {:<2}  [click]squash [b]zap",
            session.score(),
            session.combo(),
            session.time_left_secs(),
            session.buff_inventory(),
            session.high_score(),
            session.difficulty_level(),
        );
        self.put_str(0, 0, &hud, Color::Cyan);
    }

    fn draw_entities(&mut self, session: &GameSession) {
        let shake = match self.shake_until {
            Some(t) if Instant::now() < t => {
                if self.frame % 2 == 0 { 1 } else { -1 }
            }
            _ => 0,
        };

        let clock = session.clock_ms();
        for e in session.entities() {
            // freshly hatched bugs render dim for a beat
            let young = clock.saturating_sub(e.born_at_ms) < 300;
            let (glyph, fg) = match e.kind {
                EntityKind::NormalBug => {
                    ('¤', if young { Color::DarkGreen } else { Color::Green })
                }
                EntityKind::BossBug => ('█', if young { Color::DarkRed } else { Color::Red }),
                EntityKind::PowerUp => ('♦', Color::Yellow),
                EntityKind::Particle => ('·', Color::DarkYellow),
            };
            let x0 = e.x.round() as i32 + shake;
            let y0 = e.y.round() as i32 + HUD_ROWS as i32;
            for dy in 0..e.height.ceil() as i32 {
                for dx in 0..e.width.ceil() as i32 {
                    self.put(x0 + dx, y0 + dy, glyph, fg);
                }
            }
        }
    }

    fn draw_flashes(&mut self) {
        let now = Instant::now();
        self.flashes.retain(|f| f.until > now);
        let marks: Vec<(i32, i32)> = self
            .flashes
            .iter()
            .map(|f| (f.x as i32, f.y as i32 + HUD_ROWS as i32))
            .collect();
        for (x, y) in marks {
            self.put(x, y, '*', Color::White);
        }
    }

    fn draw_title(&mut self, session: &GameSession) {
        let mid = self.rows / 2;
        self.draw_centered(mid.saturating_sub(4), "B U G   S M A S H E R", Color::Green);
        self.draw_centered(
            mid.saturating_sub(2),
            "squash the infestation before it spreads",
            Color::DarkGreen,
        );
        self.draw_centered(
            mid,
            &format!("high score: {}", session.high_score()),
            Color::Cyan,
        );
        self.draw_centered(mid + 2, "[enter] start    [q] quit", Color::White);
        if let Some(msg) = self.status.clone() {
            self.draw_centered(mid + 4, &msg, Color::Red);
        }
    }

    fn draw_result(&mut self, session: &GameSession, outcome: Outcome) {
        let mid = self.rows / 2;
        match outcome {
            Outcome::Win => {
                self.draw_centered(mid.saturating_sub(3), "TIME!  INFESTATION CONTAINED", Color::Green)
            }
            Outcome::Lose => {
                self.draw_centered(mid.saturating_sub(3), "OVERRUN!  THE BUGS COVER EVERYTHING", Color::Red)
            }
        }
        self.draw_centered(
            mid.saturating_sub(1),
            &format!("final score: {}", session.score()),
            Color::White,
        );
        self.draw_centered(
            mid,
            &format!("high score:  {}", session.high_score()),
            Color::Cyan,
        );
        self.draw_centered(mid + 2, "[enter] play again    [q] quit", Color::White);
    }

    // ── Diff + flush ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut out = BufWriter::new(io::stdout());
        let mut last_fg = None;
        for idx in 0..self.front.len() {
            let cell = self.front[idx];
            if cell == self.back[idx] {
                continue;
            }
            let col = (idx % self.cols as usize) as u16;
            let row = (idx / self.cols as usize) as u16;
            queue!(out, MoveTo(col, row))?;
            if last_fg != Some(cell.fg) {
                queue!(out, SetForegroundColor(cell.fg))?;
                last_fg = Some(cell.fg);
            }
            queue!(out, Print(cell.ch))?;
        }
        out.flush()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }
}

// ── Decorative rain ──

/// Falling binary columns behind the play area. Purely cosmetic; never
/// touches game state.
struct MatrixRain {
    drops: Vec<u16>,
    rng: StdRng,
}

impl MatrixRain {
    fn new() -> Self {
        MatrixRain {
            drops: Vec::new(),
            rng: StdRng::from_entropy(),
        }
    }

    fn resize(&mut self, cols: usize) {
        self.drops.resize(cols, 1);
    }

    fn step(&mut self, frame: u64, rows: usize) {
        // advance every third frame to roughly match a 50ms cadence
        if frame % 3 != 0 {
            return;
        }
        for d in self.drops.iter_mut() {
            *d = d.saturating_add(1);
            if *d as usize > rows && self.rng.gen::<f32>() > 0.975 {
                *d = 0;
            }
        }
    }
}
