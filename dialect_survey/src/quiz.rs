use std::collections::BTreeMap;

use log::{debug, info};

use crate::config::*;
use crate::features::FeatureSpace;
use crate::scoring::RegionClassifier;

const BANK: [(QuestionId, &str, &[&str]); 10] = [
    (
        303,
        "What do you call the drink made with milk + ice cream?",
        &[
            "milkshake/shake",
            "frappe",
            "cabinet",
            "velvet",
            "thick shake",
            "other",
        ],
    ),
    (
        300,
        "Grass between sidewalk + road?",
        &[
            "berm",
            "parking",
            "tree lawn",
            "terrace",
            "curb strip",
            "beltway",
            "verge",
            "other",
        ],
    ),
    (
        335,
        "What is \u{201c}the City\u{201d}?",
        &["New York City", "Boston", "DC", "LA", "Chicago", "other"],
    ),
    (
        358,
        "Drive-through liquor store?",
        &[
            "party barn",
            "brew thru",
            "bootlegger",
            "beer barn",
            "beverage barn",
            "no special term",
            "never heard",
            "other",
        ],
    ),
    (
        316,
        "Diagonal across the street?",
        &[
            "kitty-corner",
            "kitacorner",
            "catercorner",
            "catty-corner",
            "kitty cross",
            "kitty wampus",
            "diagonal",
            "other",
        ],
    ),
    (
        350,
        "Night before Halloween?",
        &[
            "mischief night",
            "devil's night",
            "cabbage night",
            "goosy night",
            "gate night",
            "trick night",
            "I have no word",
            "other",
        ],
    ),
    (
        343,
        "Thing you drink water from in school?",
        &[
            "bubbler",
            "drinking fountain",
            "water fountain",
            "water bubbler",
            "other",
        ],
    ),
    (
        319,
        "General term for a big road you drive fast on?",
        &[
            "highway",
            "freeway",
            "parkway",
            "turnpike",
            "expressway",
            "throughway/thru-way",
            "other",
        ],
    ),
    (
        302,
        "Median of a divided highway?",
        &[
            "median",
            "median strip",
            "neutral ground",
            "mall",
            "traffic island",
            "island",
            "park strip",
            "other",
        ],
    ),
    (
        305,
        "Glow-in-the-dark bug?",
        &[
            "lightning bug",
            "firefly",
            "both",
            "peenie wallie",
            "I have no word",
            "other",
        ],
    ),
];

const REGION_INFO: [(&str, &str); 7] = [
    ("The West", "Your dialect aligns with the Western United States, including California, Oregon, Washington, and the Mountain states."),
    ("North Central", "Your dialect matches the North Central region, including Wisconsin, Minnesota, and parts of the Upper Midwest."),
    ("Northern New England", "Your speech patterns align with Northern New England, including Vermont, New Hampshire, and Maine."),
    ("The North", "Your dialect is characteristic of the Northern United States, including Pennsylvania, Ohio, and parts of the Great Lakes region."),
    ("Greater New York City", "Your dialect matches the Greater New York City area, including New York City and surrounding areas."),
    ("Midland", "Your dialect aligns with the Midland region, a transitional area between North and South."),
    ("The South", "Your speech patterns match the Southern United States dialect region."),
];

/// The questions of the dialect quiz, in the order they are asked.
pub fn question_bank() -> Vec<Question> {
    BANK.iter()
        .map(|(id, text, choices)| Question {
            id: *id,
            text: text.to_string(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
        })
        .collect()
}

/// A short description of a region, if it is one of the known regions.
pub fn region_description(region: &str) -> Option<&'static str> {
    REGION_INFO
        .iter()
        .find(|(r, _)| *r == region)
        .map(|(_, d)| *d)
}

/// The answers of one person taking the quiz.
///
/// A session is owned by whoever runs the quiz; nothing is shared between sessions.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<Question>,
    space: FeatureSpace,
    answers: BTreeMap<QuestionId, String>,
}

impl QuizSession {
    pub fn new() -> QuizSession {
        QuizSession::with_questions(question_bank())
    }

    pub fn with_questions(questions: Vec<Question>) -> QuizSession {
        let space = FeatureSpace::new(&questions);
        QuizSession {
            questions,
            space,
            answers: BTreeMap::new(),
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn feature_space(&self) -> &FeatureSpace {
        &self.space
    }

    pub fn answers(&self) -> &BTreeMap<QuestionId, String> {
        &self.answers
    }

    /// Records the answer to a question, replacing any previous answer.
    pub fn answer(&mut self, question_id: QuestionId, label: &str) -> Result<(), DialectError> {
        let q = self
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or(DialectError::UnknownQuestion(question_id))?;
        if !q.choices.iter().any(|c| c == label) {
            return Err(DialectError::UnknownChoice {
                question: question_id,
                label: label.to_string(),
            });
        }
        debug!("answer: {} -> {:?}", question_id, label);
        self.answers.insert(question_id, label.to_string());
        Ok(())
    }

    /// The questions without an answer yet, in the order of the quiz.
    pub fn remaining(&self) -> Vec<QuestionId> {
        self.questions
            .iter()
            .filter(|q| !self.answers.contains_key(&q.id))
            .map(|q| q.id)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining().is_empty()
    }

    pub fn reset(&mut self) {
        self.answers.clear();
    }

    /// Scores the session. All the questions must have been answered.
    pub fn predict(&self, classifier: &dyn RegionClassifier) -> Result<Prediction, DialectError> {
        let missing = self.remaining();
        if !missing.is_empty() {
            return Err(DialectError::IncompleteQuiz { missing });
        }
        let vector = self.space.vectorize(&self.answers);
        info!(
            "predict: {} answers, {} active features",
            self.answers.len(),
            vector.count_active()
        );
        Ok(classifier.score(&self.space, &vector))
    }
}

impl Default for QuizSession {
    fn default() -> Self {
        QuizSession::new()
    }
}
