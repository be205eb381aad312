use crate::quiz::Mode;

/// Streaks longer than this get a badge next to the score.
pub const STREAK_BADGE_AFTER: u32 = 2;

/// Score, streak and the activity the chat is currently playing.
///
/// Owned by the chat's dialogue state and only changed through
/// [`apply_answer`] and [`SessionState::with_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionState {
    pub score: u32,
    pub streak: u32,
    pub active_mode: Mode,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            score: 0,
            streak: 0,
            active_mode: Mode::Addition,
        }
    }
}

impl SessionState {
    pub fn with_mode(self, active_mode: Mode) -> Self {
        Self {
            active_mode,
            ..self
        }
    }

    pub fn shows_streak_badge(&self) -> bool {
        self.streak > STREAK_BADGE_AFTER
    }
}

/// Folds one answer's score delta into the session.
///
/// The score never drops below zero; a positive delta extends the streak and
/// anything else resets it.
pub fn apply_answer(state: SessionState, score_delta: i32) -> SessionState {
    let score = (i64::from(state.score) + i64::from(score_delta)).clamp(0, i64::from(u32::MAX));
    let streak = if score_delta > 0 { state.streak + 1 } else { 0 };
    SessionState {
        score: score as u32,
        streak,
        ..state
    }
}

/// Identifies one story request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LoadTicket(u64);

/// Bookkeeping for story requests that complete after the chat may have moved on.
///
/// Each request gets a fresh ticket. A result is only worth showing if its
/// ticket is still the pending one when it arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoryLoads {
    issued: u64,
    pending: Option<LoadTicket>,
}

impl StoryLoads {
    /// Starts a new request, superseding any pending one.
    pub fn begin(&mut self) -> LoadTicket {
        self.issued += 1;
        let ticket = LoadTicket(self.issued);
        self.pending = Some(ticket);
        ticket
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Forgets the pending request; its result will be discarded.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Returns `true` if `ticket` is the pending request, and clears it.
    pub fn finish(&mut self, ticket: LoadTicket) -> bool {
        if self.pending == Some(ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}
