pub use crate::config::*;
use crate::pipeline::SurveyData;

use log::{info, warn};
use std::collections::{HashMap, HashSet};

/// A builder for assembling a survey snapshot.
///
/// The loaders push entities one by one; the snapshot is read-only once built.
///
/// ```
/// use dialect_survey::builder::Builder;
/// use dialect_survey::*;
///
/// let mut builder = Builder::new();
/// builder.add_user(User {
///     id: 1,
///     birth_year: Some(1987),
///     gender: Some("f".to_string()),
///     state: Some("MA".to_string()),
///     language: None,
/// });
/// builder.add_choice(Choice { id: 10, question_id: 2, value: "soda".to_string() });
/// builder.add_response(Response {
///     id: 100,
///     user_id: 1,
///     question_id: 2,
///     choice_id: Some(10),
///     other: None,
/// });
/// let data = builder.build();
/// assert_eq!(data.num_responses(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    _users: Vec<User>,
    _questions: Vec<Question>,
    _choices: Vec<Choice>,
    _responses: Vec<Response>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn add_user(&mut self, user: User) {
        self._users.push(user);
    }

    pub fn add_question(&mut self, question: Question) {
        self._questions.push(question);
    }

    pub fn add_choice(&mut self, choice: Choice) {
        self._choices.push(choice);
    }

    pub fn add_response(&mut self, response: Response) {
        self._responses.push(response);
    }

    /// Indexes the entities.
    ///
    /// When an id appears more than once, the first entity is kept. Questions
    /// that come without a list of choices get the labels of the choices table,
    /// in the order of that table.
    pub fn build(self) -> SurveyData {
        let mut users: HashMap<UserId, User> = HashMap::new();
        let mut dup_users: usize = 0;
        for u in self._users.into_iter() {
            if users.contains_key(&u.id) {
                dup_users += 1;
            } else {
                users.insert(u.id, u);
            }
        }

        let mut choices: HashMap<ChoiceId, Choice> = HashMap::new();
        let mut labels: HashMap<QuestionId, Vec<String>> = HashMap::new();
        let mut dup_choices: usize = 0;
        for c in self._choices.into_iter() {
            if choices.contains_key(&c.id) {
                dup_choices += 1;
                continue;
            }
            let l = labels.entry(c.question_id).or_default();
            if !l.contains(&c.value) {
                l.push(c.value.clone());
            }
            choices.insert(c.id, c);
        }

        let mut seen_questions: HashSet<QuestionId> = HashSet::new();
        let mut questions: Vec<Question> = Vec::new();
        for mut q in self._questions.into_iter() {
            if !seen_questions.insert(q.id) {
                continue;
            }
            if q.choices.is_empty() {
                q.choices = labels.get(&q.id).cloned().unwrap_or_default();
            }
            questions.push(q);
        }

        if dup_users > 0 || dup_choices > 0 {
            warn!(
                "build: ignored {} duplicated users and {} duplicated choices",
                dup_users, dup_choices
            );
        }
        info!(
            "build: {} users, {} questions, {} choices, {} responses",
            users.len(),
            questions.len(),
            choices.len(),
            self._responses.len()
        );
        SurveyData::new(users, questions, choices, self._responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entity_wins_and_labels_are_filled() {
        let mut b = Builder::new();
        for (id, year) in [(1, 1980), (1, 1990)] {
            b.add_user(User {
                id,
                birth_year: Some(year),
                gender: None,
                state: None,
                language: None,
            });
        }
        b.add_question(Question {
            id: 2,
            text: "soda?".to_string(),
            choices: vec![],
        });
        for (id, v) in [(10, "soda"), (11, "pop"), (12, "soda"), (10, "coke")] {
            b.add_choice(Choice {
                id,
                question_id: 2,
                value: v.to_string(),
            });
        }
        let data = b.build();
        assert_eq!(data.user(1).and_then(|u| u.birth_year), Some(1980));
        assert_eq!(data.choice(10).map(|c| c.value.as_str()), Some("soda"));
        assert_eq!(
            data.question(2).map(|q| q.choices.clone()),
            Some(vec!["soda".to_string(), "pop".to_string()])
        );
    }
}
