// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

pub type UserId = u64;
pub type QuestionId = u32;
pub type ChoiceId = u64;

/// A survey respondent.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub birth_year: Option<i32>,
    pub gender: Option<String>,
    pub state: Option<String>,
    pub language: Option<String>,
}

/// A question of the survey, with its allowed choice labels in display order.
///
/// Free text ("other") is always implicitly allowed, whether or not it appears
/// in the list.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub choices: Vec<String>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Choice {
    pub id: ChoiceId,
    pub question_id: QuestionId,
    pub value: String,
}

/// One answer of one user to one question.
///
/// The choice reference is optional: some answers are only free text.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Response {
    pub id: u64,
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub choice_id: Option<ChoiceId>,
    pub other: Option<String>,
}

// ******** Output data structures *********

/// The outcome of scoring one completed quiz.
#[derive(PartialEq, Debug, Clone)]
pub struct Prediction {
    pub region: String,
    /// Share of the predicted region in the total score, in percent.
    pub confidence: f64,
    /// All the regions with their final scores, in enumeration order.
    pub scores: Vec<(String, f64)>,
}

impl Prediction {
    /// The scores sorted from best to worst, each with its share of the total in percent.
    ///
    /// Equal scores keep their enumeration order.
    pub fn breakdown(&self) -> Vec<(String, f64)> {
        let total: f64 = self.scores.iter().map(|(_, s)| s).sum();
        let mut res: Vec<(String, f64)> = self
            .scores
            .iter()
            .map(|(r, s)| {
                let pct = if total > 0.0 { s / total * 100.0 } else { 0.0 };
                (r.clone(), pct)
            })
            .collect();
        res.sort_by(|a, b| b.1.total_cmp(&a.1));
        res
    }
}

/// Errors that prevent an operation of this crate from completing.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum DialectError {
    /// The quiz was scored before all the questions were answered.
    IncompleteQuiz { missing: Vec<QuestionId> },
    UnknownQuestion(QuestionId),
    UnknownChoice { question: QuestionId, label: String },
    InvalidRule { pattern: String, message: String },
    EmptyRegionSet,
    UnknownRegion { feature: String, region: String },
    /// The smoothing constant must be finite and positive.
    InvalidSmoothing(String),
    /// Weights must be finite and non-negative.
    InvalidWeight { feature: String, region: String, weight: String },
}

impl Error for DialectError {}

impl Display for DialectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialectError::IncompleteQuiz { missing } => write!(
                f,
                "the quiz is not complete, {} question(s) left: {:?}",
                missing.len(),
                missing
            ),
            DialectError::UnknownQuestion(qid) => write!(f, "unknown question {}", qid),
            DialectError::UnknownChoice { question, label } => {
                write!(f, "{:?} is not a choice of question {}", label, question)
            }
            DialectError::InvalidRule { pattern, message } => {
                write!(f, "invalid normalization pattern {:?}: {}", pattern, message)
            }
            DialectError::EmptyRegionSet => write!(f, "the scoring model has no region"),
            DialectError::UnknownRegion { feature, region } => write!(
                f,
                "feature {:?} gives weight to {:?}, which is not a declared region",
                feature, region
            ),
            DialectError::InvalidSmoothing(v) => write!(
                f,
                "the smoothing of the scoring model must be a positive number, got {}",
                v
            ),
            DialectError::InvalidWeight {
                feature,
                region,
                weight,
            } => write!(
                f,
                "feature {:?} gives weight {} to {:?}: weights must be non-negative numbers",
                feature, weight, region
            ),
        }
    }
}

// ********* Configuration **********

/// One canonicalization rule: text matching `pattern` is rewritten with `replacement`.
///
/// The replacement may refer to capture groups (`$1`).
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct RuleSpec {
    pub pattern: String,
    pub replacement: String,
}

impl RuleSpec {
    pub fn new(pattern: &str, replacement: &str) -> RuleSpec {
        RuleSpec {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }
}

/// Folds the spellings of "roly poly" (rolly-poly, rollie pollie...) into one term.
pub const ROLY_POLY_PATTERN: &str = r"(?i)^(roly|rollie|rolly|roley)[\s\-]*poly.*$";

pub fn default_rules() -> Vec<RuleSpec> {
    vec![RuleSpec::new(ROLY_POLY_PATTERN, "roly poly")]
}

/// The parameters of the aggregation analyses.
#[derive(PartialEq, Debug, Clone)]
pub struct AnalysisSettings {
    /// "What do you call a sweetened carbonated beverage?"
    pub usage_question_id: QuestionId,
    pub top_terms: usize,
    pub diversity_question_id: QuestionId,
    pub diversity_terms: Vec<String>,
    /// "What do you call the creature that rolls into a ball?"
    pub cohort_question_id: QuestionId,
    /// Terms under this share of the responses are dropped from the cohort table.
    pub minimum_term_share: f64,
}

impl AnalysisSettings {
    pub fn default_settings() -> AnalysisSettings {
        AnalysisSettings {
            usage_question_id: 2,
            top_terms: 5,
            diversity_question_id: 2,
            diversity_terms: vec!["soda".to_string(), "pop".to_string()],
            cohort_question_id: 21,
            minimum_term_share: 0.05,
        }
    }
}
