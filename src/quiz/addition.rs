use rand::Rng;

use crate::quiz::options::{generate_options_in, DEFAULT_RANGE, OPTION_COUNT};
use crate::quiz::TARGET;

pub const TITLE: &str = "凑十法 (加法)";
pub const INSTRUCTIONS: &str = "找出哪个数字能凑成 10！";

/// `operand + ? = 10`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdditionProblem {
    pub operand: i32,
    pub correct_answer: i32,
    pub options: [i32; OPTION_COUNT],
}

impl AdditionProblem {
    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let operand = rng.gen_range(DEFAULT_RANGE);
        Self::with_operand(operand, rng)
    }

    pub fn with_operand<R: Rng + ?Sized>(operand: i32, rng: &mut R) -> Self {
        let correct_answer = TARGET - operand;
        Self {
            operand,
            correct_answer,
            options: generate_options_in(correct_answer, DEFAULT_RANGE, rng),
        }
    }

    pub fn is_correct(&self, selected: i32) -> bool {
        self.operand + selected == TARGET
    }

    pub fn formula(&self) -> String {
        format!("{} + ? = {}", self.operand, TARGET)
    }
}

pub fn next_addition_problem() -> AdditionProblem {
    let problem = AdditionProblem::random_with(&mut rand::thread_rng());
    log::debug!("Generated addition problem: {}", problem.formula());
    problem
}
