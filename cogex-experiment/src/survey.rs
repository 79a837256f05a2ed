use cogex_core::FrameAction;
use cogex_timing::ClockValue;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A question as written in a trial file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSpec {
    #[serde(default)]
    pub name: String,
    pub prompt: String,
}

/// A question bound to the action that reveals it.
#[derive(Debug, Clone, PartialEq)]
pub struct Question<A> {
    pub name: String,
    pub action: A,
}

/// Reveal actions for a list of written questions.
pub fn reveal_questions(specs: &[QuestionSpec]) -> Vec<Question<FrameAction>> {
    specs
        .iter()
        .enumerate()
        .map(|(index, q)| Question {
            name: q.name.clone(),
            action: FrameAction::RevealQuestion {
                index,
                name: q.name.clone(),
                prompt: q.prompt.clone(),
            },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub question: usize,
    pub name: String,
    pub answer: String,
    pub presented: ClockValue,
    pub at: ClockValue,
}

impl Answer {
    pub fn response_time(&self) -> Duration {
        self.at.saturating_duration_since(self.presented)
    }
}

/// Questions revealed one at a time, in listed order.
#[derive(Debug, Clone)]
pub struct QuestionSequence<A> {
    questions: Vec<Question<A>>,
    next: usize,
    open: Option<(usize, ClockValue)>,
}

impl<A> QuestionSequence<A> {
    pub fn new(questions: Vec<Question<A>>) -> Self {
        Self {
            questions,
            next: 0,
            open: None,
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Opens the next question at `at`. Returns `None` when none remain.
    pub fn present_next(&mut self, at: ClockValue) -> Option<&Question<A>> {
        let index = self.next;
        let question = self.questions.get(index)?;
        self.next += 1;
        self.open = Some((index, at));
        Some(question)
    }

    /// Answers the open question. Returns `None` if no question is open.
    pub fn answer(&mut self, answer: String, at: ClockValue) -> Option<Answer> {
        let (index, presented) = self.open.take()?;
        Some(Answer {
            question: index,
            name: self.questions[index].name.clone(),
            answer,
            presented,
            at,
        })
    }

    pub fn remaining(&self) -> usize {
        self.questions.len() - self.next + usize::from(self.open.is_some())
    }
}

impl<A> Default for QuestionSequence<A> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<QuestionSpec> {
        serde_json::from_str(
            r#"[
                {"name": "familiar", "prompt": "Did you know this song?"},
                {"prompt": "How much did you like it?"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn questions_open_in_listed_order() {
        let mut seq = QuestionSequence::new(reveal_questions(&specs()));
        assert_eq!(seq.remaining(), 2);

        let first = seq.present_next(ClockValue::from_millis(0)).unwrap();
        assert_eq!(first.name, "familiar");
        let answer = seq.answer("yes".into(), ClockValue::from_millis(1_250)).unwrap();
        assert_eq!(answer.question, 0);
        assert_eq!(answer.response_time(), Duration::from_millis(1_250));

        let second = seq.present_next(ClockValue::from_millis(1_250)).unwrap();
        assert!(matches!(second.action, FrameAction::RevealQuestion { index: 1, .. }));
        assert_eq!(seq.remaining(), 1);
        seq.answer("4".into(), ClockValue::from_millis(2_000)).unwrap();
        assert_eq!(seq.remaining(), 0);
        assert!(seq.present_next(ClockValue::from_millis(2_000)).is_none());
    }

    #[test]
    fn answer_without_open_question_is_ignored() {
        let mut seq: QuestionSequence<FrameAction> = QuestionSequence::default();
        assert!(seq.answer("x".into(), ClockValue::ZERO).is_none());
        assert!(seq.is_empty());
    }
}
