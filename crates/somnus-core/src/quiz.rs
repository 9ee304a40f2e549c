//! Math quiz that gates dismissal of a firing alarm.
//!
//! Each question is a small addition with four distinct positive choices.
//! A wrong answer keeps the user on the same question.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of choices offered per question.
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub a: u32,
    pub b: u32,
    pub options: Vec<u32>,
}

impl QuizQuestion {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let a = rng.gen_range(1..=20);
        let b = rng.gen_range(1..=10);
        let answer = a + b;

        let mut options = vec![answer];
        while options.len() < OPTION_COUNT {
            let wrong = i64::from(answer) + rng.gen_range(-5..=5);
            if wrong <= 0 || wrong == i64::from(answer) {
                continue;
            }
            let wrong = wrong as u32;
            if !options.contains(&wrong) {
                options.push(wrong);
            }
        }
        options.shuffle(rng);

        Self { a, b, options }
    }

    pub fn answer(&self) -> u32 {
        self.a + self.b
    }

    pub fn prompt(&self) -> String {
        format!("{} + {}", self.a, self.b)
    }
}

/// Outcome of submitting one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizAnswer {
    /// Right answer; `next` is the index of the question now shown.
    Correct { next: usize },
    Incorrect,
    /// Every question answered.
    Solved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathQuiz {
    questions: Vec<QuizQuestion>,
    current: usize,
}

impl MathQuiz {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Self {
        let questions = (0..count).map(|_| QuizQuestion::generate(rng)).collect();
        Self {
            questions,
            current: 0,
        }
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current)
    }

    pub fn is_solved(&self) -> bool {
        self.current >= self.questions.len()
    }

    pub fn answer(&mut self, choice: u32) -> QuizAnswer {
        let Some(question) = self.current_question() else {
            return QuizAnswer::Solved;
        };
        if question.answer() != choice {
            return QuizAnswer::Incorrect;
        }
        self.current += 1;
        if self.is_solved() {
            QuizAnswer::Solved
        } else {
            QuizAnswer::Correct { next: self.current }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn questions_have_distinct_positive_options_including_answer() {
        let mut rng = Pcg64::seed_from_u64(7);
        for _ in 0..500 {
            let q = QuizQuestion::generate(&mut rng);
            assert!((1..=20).contains(&q.a));
            assert!((1..=10).contains(&q.b));
            assert_eq!(q.options.len(), OPTION_COUNT);
            assert!(q.options.contains(&q.answer()));
            let mut sorted = q.options.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), OPTION_COUNT);
            for option in &q.options {
                assert!(*option > 0);
                assert!(option.abs_diff(q.answer()) <= 5);
            }
        }
    }

    #[test]
    fn wrong_answer_stays_on_question() {
        let mut quiz = MathQuiz::generate(&mut Pcg64::seed_from_u64(1), 3);
        let wrong = quiz.current_question().unwrap().answer() + 100;
        assert_eq!(quiz.answer(wrong), QuizAnswer::Incorrect);
        assert_eq!(quiz.current_index(), 0);
        assert!(!quiz.is_solved());
    }

    #[test]
    fn answering_all_questions_solves_quiz() {
        let mut quiz = MathQuiz::generate(&mut Pcg64::seed_from_u64(2), 3);
        let first = quiz.current_question().unwrap().answer();
        assert_eq!(quiz.answer(first), QuizAnswer::Correct { next: 1 });
        let second = quiz.current_question().unwrap().answer();
        assert_eq!(quiz.answer(second), QuizAnswer::Correct { next: 2 });
        let third = quiz.current_question().unwrap().answer();
        assert_eq!(quiz.answer(third), QuizAnswer::Solved);
        assert!(quiz.is_solved());
        assert_eq!(quiz.answer(0), QuizAnswer::Solved);
    }

    #[test]
    fn same_seed_same_quiz() {
        let a = MathQuiz::generate(&mut Pcg64::seed_from_u64(42), 3);
        let b = MathQuiz::generate(&mut Pcg64::seed_from_u64(42), 3);
        assert_eq!(a, b);
        assert_eq!(a.questions()[0].prompt(), format!("{} + {}", a.questions()[0].a, a.questions()[0].b));
    }
}
