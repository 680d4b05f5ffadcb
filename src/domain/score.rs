/// Combo and score state machine.
///
/// Scoring events close together multiply: each event inside the combo
/// window bumps the multiplier by one, a gap resets it to 1. Score only
/// ever grows during a session; the high score is read once at
/// construction and handed back (if beaten) at session end for the
/// caller to persist.

pub struct ScoreEngine {
    score: u32,
    combo: u32,
    last_event_ms: Option<u64>,
    window_ms: u64,
    high_score: u32,
}

impl ScoreEngine {
    pub fn new(window_ms: u64, high_score: u32) -> Self {
        ScoreEngine {
            score: 0,
            combo: 1,
            last_event_ms: None,
            window_ms,
            high_score,
        }
    }

    /// Register a scoring event at session clock `now_ms` and award
    /// `base * combo` points. Returns the points awarded.
    pub fn award(&mut self, base: u32, now_ms: u64) -> u32 {
        match self.last_event_ms {
            Some(prev) if now_ms.saturating_sub(prev) < self.window_ms => self.combo += 1,
            _ => self.combo = 1,
        }
        self.last_event_ms = Some(now_ms);
        let points = base.saturating_mul(self.combo);
        self.score = self.score.saturating_add(points);
        points
    }

    /// Settle the high score at session end. Returns the new record if
    /// this session beat the old one, for the caller to persist.
    pub fn commit_high_score(&mut self) -> Option<u32> {
        if self.score > self.high_score {
            self.high_score = self.score;
            Some(self.high_score)
        } else {
            None
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combo_increments_inside_window() {
        let mut s = ScoreEngine::new(1500, 0);
        assert_eq!(s.award(10, 0), 10);
        assert_eq!(s.award(10, 1000), 20); // combo 2
        assert_eq!(s.award(10, 2400), 30); // combo 3, gap 1400
        assert_eq!(s.score(), 60);
        assert_eq!(s.combo(), 3);
    }

    #[test]
    fn combo_resets_at_window_boundary() {
        let mut s = ScoreEngine::new(1500, 0);
        s.award(10, 0);
        // exactly the window is outside it
        assert_eq!(s.award(10, 1500), 10);
        assert_eq!(s.combo(), 1);
        // one ms under keeps the chain
        assert_eq!(s.award(10, 2999), 20);
    }

    #[test]
    fn score_is_monotonic() {
        let mut s = ScoreEngine::new(1500, 0);
        let mut prev = 0;
        for t in 0..50u64 {
            s.award(7, t * 700);
            assert!(s.score() >= prev);
            prev = s.score();
        }
    }

    #[test]
    fn commit_reports_only_improvements() {
        let mut s = ScoreEngine::new(1500, 50);
        s.award(30, 0);
        assert_eq!(s.commit_high_score(), None); // 30 did not beat 50
        assert_eq!(s.high_score(), 50);

        let mut s = ScoreEngine::new(1500, 50);
        s.award(80, 0);
        assert_eq!(s.commit_high_score(), Some(80));
        assert_eq!(s.high_score(), 80);
    }
}
