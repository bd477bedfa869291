use log::debug;
use regex::Regex;

use crate::config::*;

#[derive(Debug, Clone)]
struct CompiledRule {
    regex: Regex,
    replacement: String,
}

/// Turns the raw fields of a response into a canonical term.
///
/// The rules are tried in order. The first rule that matches rewrites the term
/// and the remaining rules are skipped.
#[derive(Debug, Clone)]
pub struct TermNormalizer {
    rules: Vec<CompiledRule>,
}

impl TermNormalizer {
    /// A normalizer that only trims and lower-cases.
    pub fn plain() -> TermNormalizer {
        TermNormalizer { rules: Vec::new() }
    }

    pub fn new(rules: &[RuleSpec]) -> Result<TermNormalizer, DialectError> {
        let mut compiled: Vec<CompiledRule> = Vec::new();
        for r in rules.iter() {
            let regex = Regex::new(&r.pattern).map_err(|e| DialectError::InvalidRule {
                pattern: r.pattern.clone(),
                message: e.to_string(),
            })?;
            compiled.push(CompiledRule {
                regex,
                replacement: r.replacement.clone(),
            });
        }
        Ok(TermNormalizer { rules: compiled })
    }

    pub fn with_default_rules() -> TermNormalizer {
        // The built-in patterns are constants.
        TermNormalizer::new(&default_rules()).unwrap_or_else(|_| TermNormalizer::plain())
    }

    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    /// The canonical term for a coded value and a free-text value.
    ///
    /// The coded value wins when it is present and not blank. Returns None when
    /// neither field carries any text.
    pub fn term(&self, value: Option<&str>, other: Option<&str>) -> Option<String> {
        let raw = [value, other]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())?;
        Some(self.canonicalize(&raw.to_lowercase()))
    }

    /// Applies the variant folding rules to an already case-folded text.
    pub fn canonicalize(&self, text: &str) -> String {
        for rule in self.rules.iter() {
            if rule.regex.is_match(text) {
                let res = rule
                    .regex
                    .replace_all(text, rule.replacement.as_str())
                    .to_string();
                debug!("canonicalize: {:?} -> {:?}", text, res);
                return res;
            }
        }
        text.to_string()
    }
}
