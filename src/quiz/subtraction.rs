use rand::Rng;

use crate::quiz::options::{generate_options_in, DEFAULT_RANGE, OPTION_COUNT};
use crate::quiz::TARGET;

pub const TITLE: &str = "减法挑战 (减到10)";
pub const INSTRUCTIONS: &str = "减去一个数，让结果等于 10！";

/// `start_value - ? = 10`, with `start_value` in 11..=19.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SubtractionProblem {
    pub start_value: i32,
    pub correct_answer: i32,
    pub options: [i32; OPTION_COUNT],
}

impl SubtractionProblem {
    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let difference = rng.gen_range(DEFAULT_RANGE);
        Self::with_difference(difference, rng)
    }

    pub fn with_difference<R: Rng + ?Sized>(difference: i32, rng: &mut R) -> Self {
        Self {
            start_value: TARGET + difference,
            correct_answer: difference,
            options: generate_options_in(difference, DEFAULT_RANGE, rng),
        }
    }

    pub fn is_correct(&self, selected: i32) -> bool {
        self.start_value - selected == TARGET
    }

    pub fn formula(&self) -> String {
        format!("{} - ? = {}", self.start_value, TARGET)
    }
}

pub fn next_subtraction_problem() -> SubtractionProblem {
    let problem = SubtractionProblem::random_with(&mut rand::thread_rng());
    log::debug!("Generated subtraction problem: {}", problem.formula());
    problem
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn every_difference_comes_down_to_ten() {
        let mut rng = StdRng::seed_from_u64(4);
        for difference in 1..=9 {
            let problem = SubtractionProblem::with_difference(difference, &mut rng);
            assert_eq!(problem.start_value, 10 + difference);
            assert!((11..=19).contains(&problem.start_value));
            assert_eq!(problem.correct_answer, difference);
            assert_eq!(problem.start_value - problem.correct_answer, 10);
            assert!(problem.options.contains(&difference));
        }
    }

    #[test]
    fn random_problems_hold_their_invariants() {
        for _ in 0..200 {
            let problem = next_subtraction_problem();
            assert!((11..=19).contains(&problem.start_value));
            assert_eq!(problem.start_value - problem.correct_answer, 10);
            assert!(problem.options.contains(&problem.correct_answer));
        }
    }

    #[test]
    fn seventeen_minus_seven() {
        let problem = SubtractionProblem::with_difference(7, &mut StdRng::seed_from_u64(8));
        assert_eq!(problem.start_value, 17);
        assert!(problem.is_correct(7));
        assert!(!problem.is_correct(6));
        assert_eq!(problem.formula(), "17 - ? = 10");
    }
}
