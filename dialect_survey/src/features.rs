use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::config::*;

/// A (question, choice label) pair usable as a binary indicator.
#[derive(PartialEq, Eq, Debug, Clone, Hash)]
pub struct Feature {
    pub question_id: QuestionId,
    pub label: String,
}

impl Feature {
    /// The key of the feature, as used by the weight tables: `{question_id}_{label}`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.question_id, self.label)
    }
}

/// All the features, in a fixed order: questions in the order given, then
/// choices in the order of each question.
#[derive(Debug, Clone)]
pub struct FeatureSpace {
    features: Vec<Feature>,
    index: HashMap<(QuestionId, String), usize>,
}

impl FeatureSpace {
    pub fn new(questions: &[Question]) -> FeatureSpace {
        let mut features: Vec<Feature> = Vec::new();
        let mut index: HashMap<(QuestionId, String), usize> = HashMap::new();
        for q in questions.iter() {
            for label in q.choices.iter() {
                let k = (q.id, label.clone());
                // A label listed twice maps to its first position.
                if index.contains_key(&k) {
                    continue;
                }
                index.insert(k, features.len());
                features.push(Feature {
                    question_id: q.id,
                    label: label.clone(),
                });
            }
        }
        FeatureSpace { features, index }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn position(&self, question_id: QuestionId, label: &str) -> Option<usize> {
        self.index.get(&(question_id, label.to_string())).cloned()
    }

    /// The one-hot vector of a set of answers.
    ///
    /// Answers to unknown questions, or with a label that is not a listed choice,
    /// do not set any feature.
    pub fn vectorize(&self, answers: &BTreeMap<QuestionId, String>) -> FeatureVector {
        let mut bits = vec![0u8; self.features.len()];
        for (qid, label) in answers.iter() {
            match self.position(*qid, label) {
                Some(pos) => bits[pos] = 1,
                None => debug!("vectorize: no feature for {}_{}", qid, label),
            }
        }
        FeatureVector(bits)
    }
}

/// An indicator vector aligned with a feature space.
#[derive(PartialEq, Eq, Debug, Clone, Hash)]
pub struct FeatureVector(pub Vec<u8>);

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The positions set to 1, in increasing order.
    pub fn active(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(idx, b)| if *b == 1 { Some(idx) } else { None })
    }

    pub fn count_active(&self) -> usize {
        self.active().count()
    }
}
