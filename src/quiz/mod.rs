pub mod addition;
pub mod options;
pub mod session;
pub mod story;
pub mod subtraction;

use addition::AdditionProblem;
use story::StoryProblem;
use subtraction::SubtractionProblem;

/// Every activity works towards this number.
pub const TARGET: i32 = 10;

pub const DRILL_REWARD: i32 = 10;
pub const STORY_REWARD: i32 = 15;
pub const WRONG_PENALTY: i32 = -5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mode {
    Addition,
    Subtraction,
    Story,
}

impl Mode {
    pub fn title(&self) -> &'static str {
        match self {
            Mode::Addition => addition::TITLE,
            Mode::Subtraction => subtraction::TITLE,
            Mode::Story => story::TITLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Problem {
    Addition(AdditionProblem),
    Subtraction(SubtractionProblem),
    Story(StoryProblem),
}

impl Problem {
    pub fn mode(&self) -> Mode {
        match self {
            Problem::Addition(_) => Mode::Addition,
            Problem::Subtraction(_) => Mode::Subtraction,
            Problem::Story(_) => Mode::Story,
        }
    }

    pub fn options(&self) -> &[i32] {
        match self {
            Problem::Addition(problem) => &problem.options,
            Problem::Subtraction(problem) => &problem.options,
            Problem::Story(problem) => &problem.options,
        }
    }

    pub fn correct_answer(&self) -> i32 {
        match self {
            Problem::Addition(problem) => problem.correct_answer,
            Problem::Subtraction(problem) => problem.correct_answer,
            Problem::Story(problem) => problem.correct_answer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub is_correct: bool,
    pub score_delta: i32,
}

/// Judges `selected` against `problem`.
pub fn check_answer(problem: &Problem, selected: i32) -> Verdict {
    let (is_correct, reward) = match problem {
        Problem::Addition(problem) => (problem.is_correct(selected), DRILL_REWARD),
        Problem::Subtraction(problem) => (problem.is_correct(selected), DRILL_REWARD),
        Problem::Story(problem) => (problem.is_correct(selected), STORY_REWARD),
    };
    Verdict {
        is_correct,
        score_delta: if is_correct { reward } else { WRONG_PENALTY },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AnswerState {
    Unanswered,
    Answered { correct: bool },
}

/// One problem on screen. It takes a single answer and then stays locked
/// until the caller replaces it with a new round.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Round {
    problem: Problem,
    state: AnswerState,
}

impl Round {
    pub fn new(problem: Problem) -> Self {
        Self {
            problem,
            state: AnswerState::Unanswered,
        }
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn state(&self) -> AnswerState {
        self.state
    }

    /// Records the first answer. Later answers return `None` and change nothing.
    pub fn submit(&mut self, selected: i32) -> Option<Verdict> {
        if self.state != AnswerState::Unanswered {
            return None;
        }
        let verdict = check_answer(&self.problem, selected);
        self.state = AnswerState::Answered {
            correct: verdict.is_correct,
        };
        Some(verdict)
    }
}
