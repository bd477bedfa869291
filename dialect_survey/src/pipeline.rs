use log::{debug, info, warn};

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::config::*;
use crate::normalize::TermNormalizer;
use crate::stats::{decade_of, percentages, round1, shannon_entropy, Cohort};

/// A read-only snapshot of the survey tables.
#[derive(Debug, Clone)]
pub struct SurveyData {
    users: HashMap<UserId, User>,
    questions: Vec<Question>,
    choices: HashMap<ChoiceId, Choice>,
    responses: Vec<Response>,
}

// One response with its metadata. Missing metadata stays None.
#[derive(Debug, Clone, Copy)]
struct JoinedRow<'a> {
    response: &'a Response,
    user: Option<&'a User>,
    choice: Option<&'a Choice>,
}

impl<'a> JoinedRow<'a> {
    fn term(&self, normalizer: &TermNormalizer) -> Option<String> {
        normalizer.term(
            self.choice.map(|c| c.value.as_str()),
            self.response.other.as_deref(),
        )
    }

    fn birth_year(&self) -> Option<i32> {
        self.user.and_then(|u| u.birth_year)
    }
}

/// Which terms to report in the usage-over-time analysis.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum TermSelection {
    /// The most frequent terms overall.
    Top(usize),
    /// An explicit list of terms.
    Terms(Vec<String>),
}

#[derive(PartialEq, Debug, Clone)]
pub struct DecadeTermShare {
    pub decade: i32,
    pub term: String,
    pub count: usize,
    /// Share of the responses of that decade, rounded to one decimal.
    pub percent: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct UsageOverTime {
    pub question_id: QuestionId,
    /// Rows for the selected terms, by decade then term.
    pub rows: Vec<DecadeTermShare>,
    /// The most frequent terms, most frequent first.
    pub top_terms: Vec<String>,
    pub selected_terms: Vec<String>,
    /// Every term seen, sorted.
    pub all_terms: Vec<String>,
}

#[derive(Debug, Clone)]
struct DiversityRow {
    state: String,
    birth_year: Option<i32>,
    gender: Option<String>,
    term: String,
}

/// The responses of the lexical diversity analysis, joined once.
///
/// Filtering by birth year or gender only reruns the aggregation.
#[derive(Debug, Clone)]
pub struct DiversityFrame {
    question_id: QuestionId,
    terms: Vec<String>,
    rows: Vec<DiversityRow>,
}

/// Restricts the rows of a diversity frame. None means no restriction.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct DiversityFilter {
    /// Inclusive range of birth years.
    pub birth_years: Option<(i32, i32)>,
    pub genders: Option<BTreeSet<String>>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct StateDiversity {
    pub state: String,
    pub responses: usize,
    /// None when the state has no response left after filtering.
    pub entropy: Option<f64>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct TermShare {
    pub term: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CohortRow {
    pub cohort: Cohort,
    pub total: usize,
    /// One entry per retained term, in the order of `CohortUsage::terms`.
    /// The percentages of a row sum to 100.
    pub shares: Vec<TermShare>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CohortUsage {
    pub question_id: QuestionId,
    pub current_year: i32,
    /// The terms above the minimum share, sorted.
    pub terms: Vec<String>,
    /// Number of distinct terms dropped by the minimum share.
    pub dropped_terms: usize,
    /// Non-empty cohorts, youngest first.
    pub rows: Vec<CohortRow>,
}

impl CohortUsage {
    /// How often each retained term was given, all cohorts together.
    ///
    /// Most frequent first; ties by term.
    pub fn term_distribution(&self) -> Vec<TermShare> {
        let counts: Vec<usize> = (0..self.terms.len())
            .map(|idx| self.rows.iter().map(|r| r.shares[idx].count).sum())
            .collect();
        let pcts = percentages(&counts);
        let mut res: Vec<TermShare> = self
            .terms
            .iter()
            .zip(counts.iter().zip(pcts))
            .map(|(term, (count, percent))| TermShare {
                term: term.clone(),
                count: *count,
                percent,
            })
            .collect();
        res.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
        res
    }
}

impl SurveyData {
    pub fn new(
        users: HashMap<UserId, User>,
        questions: Vec<Question>,
        choices: HashMap<ChoiceId, Choice>,
        responses: Vec<Response>,
    ) -> SurveyData {
        SurveyData {
            users,
            questions,
            choices,
            responses,
        }
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_choices(&self) -> usize {
        self.choices.len()
    }

    pub fn num_responses(&self) -> usize {
        self.responses.len()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn choice(&self, id: ChoiceId) -> Option<&Choice> {
        self.choices.get(&id)
    }

    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    // Left join of the responses to one question with users and choices.
    fn join(&self, question_id: QuestionId, analysis: &str) -> Vec<JoinedRow<'_>> {
        let mut missing_users: usize = 0;
        let mut missing_choices: usize = 0;
        let rows: Vec<JoinedRow> = self
            .responses
            .iter()
            .filter(|r| r.question_id == question_id)
            .map(|r| {
                let user = self.users.get(&r.user_id);
                if user.is_none() {
                    missing_users += 1;
                }
                let choice = r.choice_id.and_then(|cid| {
                    let c = self.choices.get(&cid);
                    if c.is_none() {
                        missing_choices += 1;
                    }
                    c
                });
                JoinedRow {
                    response: r,
                    user,
                    choice,
                }
            })
            .collect();
        if missing_users > 0 || missing_choices > 0 {
            warn!(
                "{}: question {}: {} responses with an unknown user, {} with an unknown choice",
                analysis, question_id, missing_users, missing_choices
            );
        }
        debug!(
            "{}: question {}: {} joined responses",
            analysis,
            question_id,
            rows.len()
        );
        rows
    }

    /// Share of each term per birth decade.
    ///
    /// Percentages are relative to all the responses of the decade, including
    /// the terms that are not selected.
    pub fn usage_over_time(
        &self,
        question_id: QuestionId,
        normalizer: &TermNormalizer,
        selection: &TermSelection,
    ) -> UsageOverTime {
        let mut counts: BTreeMap<(i32, String), usize> = BTreeMap::new();
        let mut decade_totals: HashMap<i32, usize> = HashMap::new();
        let mut term_totals: HashMap<String, usize> = HashMap::new();
        let mut dropped: usize = 0;
        for row in self.join(question_id, "usage_over_time") {
            let (year, term) = match (row.birth_year(), row.term(normalizer)) {
                (Some(y), Some(t)) => (y, t),
                _ => {
                    dropped += 1;
                    continue;
                }
            };
            let decade = decade_of(year);
            *decade_totals.entry(decade).or_default() += 1;
            *term_totals.entry(term.clone()).or_default() += 1;
            *counts.entry((decade, term)).or_default() += 1;
        }
        if dropped > 0 {
            info!(
                "usage_over_time: dropped {} responses without birth year or term",
                dropped
            );
        }

        let mut ranked: Vec<(&String, &usize)> = term_totals.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let top_n = match selection {
            TermSelection::Top(k) => *k,
            TermSelection::Terms(_) => 5,
        };
        let top_terms: Vec<String> = ranked.iter().take(top_n).map(|p| p.0.clone()).collect();
        let selected_terms: Vec<String> = match selection {
            TermSelection::Top(_) => top_terms.clone(),
            TermSelection::Terms(ts) => ts
                .iter()
                .map(|t| normalizer.canonicalize(&t.trim().to_lowercase()))
                .collect(),
        };
        let selected: HashSet<&String> = selected_terms.iter().collect();

        let rows: Vec<DecadeTermShare> = counts
            .iter()
            .filter(|((_, term), _)| selected.contains(term))
            .map(|((decade, term), count)| {
                let total = decade_totals.get(decade).cloned().unwrap_or(0);
                DecadeTermShare {
                    decade: *decade,
                    term: term.clone(),
                    count: *count,
                    percent: round1(*count as f64 / total as f64 * 100.0),
                }
            })
            .collect();

        let mut all_terms: Vec<String> = term_totals.into_keys().collect();
        all_terms.sort();

        UsageOverTime {
            question_id,
            rows,
            top_terms,
            selected_terms,
            all_terms,
        }
    }

    /// Joins the responses that use one of the given terms and have a state.
    pub fn diversity_frame(
        &self,
        question_id: QuestionId,
        terms: &[String],
        normalizer: &TermNormalizer,
    ) -> DiversityFrame {
        // Requested terms go through the same folding as the answers.
        let terms: Vec<String> = terms
            .iter()
            .map(|t| normalizer.canonicalize(&t.trim().to_lowercase()))
            .collect();
        let mut rows: Vec<DiversityRow> = Vec::new();
        for row in self.join(question_id, "lexical_diversity") {
            let term = match row.term(normalizer) {
                Some(t) if terms.contains(&t) => t,
                _ => continue,
            };
            let user = match row.user {
                Some(u) => u,
                None => continue,
            };
            let state = match user.state.as_deref().map(|s| s.trim()) {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => continue,
            };
            rows.push(DiversityRow {
                state,
                birth_year: user.birth_year,
                gender: user.gender.clone(),
                term,
            });
        }
        info!(
            "lexical_diversity: question {}: {} responses using {:?}",
            question_id,
            rows.len(),
            terms
        );
        DiversityFrame {
            question_id,
            terms,
            rows,
        }
    }

    /// The cohort by term contingency table, in row percentages.
    pub fn age_cohort_usage(
        &self,
        question_id: QuestionId,
        current_year: i32,
        normalizer: &TermNormalizer,
        minimum_share: f64,
    ) -> CohortUsage {
        let mut kept: Vec<(Cohort, String)> = Vec::new();
        for row in self.join(question_id, "age_cohort_usage") {
            let cohort = row
                .birth_year()
                .map(|y| Cohort::from_birth_year(y, current_year));
            if let (Some(c), Some(t)) = (cohort, row.term(normalizer)) {
                kept.push((c, t));
            }
        }

        let mut term_counts: BTreeMap<&String, usize> = BTreeMap::new();
        for (_, t) in kept.iter() {
            *term_counts.entry(t).or_default() += 1;
        }
        let threshold = kept.len() as f64 * minimum_share;
        let terms: Vec<String> = term_counts
            .iter()
            .filter(|(_, c)| **c as f64 >= threshold)
            .map(|(t, _)| (*t).clone())
            .collect();
        let dropped_terms = term_counts.len() - terms.len();
        debug!(
            "age_cohort_usage: retained {:?}, dropped {} terms under {}",
            terms, dropped_terms, threshold
        );

        let term_idx: HashMap<&String, usize> =
            terms.iter().enumerate().map(|(i, t)| (t, i)).collect();
        let mut table: BTreeMap<Cohort, Vec<usize>> = BTreeMap::new();
        for (c, t) in kept.iter() {
            if let Some(idx) = term_idx.get(t) {
                table.entry(*c).or_insert_with(|| vec![0; terms.len()])[*idx] += 1;
            }
        }

        // BTreeMap order on Cohort is youngest to oldest.
        let rows: Vec<CohortRow> = table
            .into_iter()
            .map(|(cohort, counts)| {
                let pcts = percentages(&counts);
                CohortRow {
                    cohort,
                    total: counts.iter().sum(),
                    shares: terms
                        .iter()
                        .zip(counts.iter().zip(pcts))
                        .map(|(term, (count, percent))| TermShare {
                            term: term.clone(),
                            count: *count,
                            percent,
                        })
                        .collect(),
                }
            })
            .collect();

        info!(
            "age_cohort_usage: question {}: {} responses in {} cohorts, {} terms",
            question_id,
            rows.iter().map(|r| r.total).sum::<usize>(),
            rows.len(),
            terms.len()
        );
        CohortUsage {
            question_id,
            current_year,
            terms,
            dropped_terms,
            rows,
        }
    }
}

impl DiversityFrame {
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The smallest and largest birth years, to use as default range.
    pub fn birth_year_bounds(&self) -> Option<(i32, i32)> {
        let years = self.rows.iter().filter_map(|r| r.birth_year);
        let min = years.clone().min()?;
        let max = years.max()?;
        Some((min, max))
    }

    /// The genders present in the frame plus the standard codes, sorted.
    pub fn gender_options(&self) -> Vec<String> {
        let mut res: BTreeSet<String> = ["f", "m", "o", "x"].iter().map(|s| s.to_string()).collect();
        res.extend(self.rows.iter().filter_map(|r| r.gender.clone()));
        res.into_iter().collect()
    }

    /// Entropy of the term distribution of every state of the frame.
    ///
    /// States left without any response by the filter are reported with no entropy.
    pub fn entropy_by_state(&self, filter: &DiversityFilter) -> Vec<StateDiversity> {
        let mut counts: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for r in self.rows.iter() {
            let entry = counts
                .entry(r.state.as_str())
                .or_insert_with(|| vec![0; self.terms.len()]);
            if !filter.accepts(r) {
                continue;
            }
            if let Some(idx) = self.terms.iter().position(|t| *t == r.term) {
                entry[idx] += 1;
            }
        }
        counts
            .into_iter()
            .map(|(state, cs)| StateDiversity {
                state: state.to_string(),
                responses: cs.iter().sum(),
                entropy: shannon_entropy(&cs),
            })
            .collect()
    }
}

impl DiversityFilter {
    fn accepts(&self, row: &DiversityRow) -> bool {
        if let Some((lo, hi)) = self.birth_years {
            match row.birth_year {
                Some(y) if y >= lo && y <= hi => {}
                _ => return false,
            }
        }
        if let Some(gs) = &self.genders {
            match &row.gender {
                Some(g) if gs.contains(g) => {}
                _ => return false,
            }
        }
        true
    }
}
