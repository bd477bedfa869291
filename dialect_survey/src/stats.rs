// Small statistics primitives shared by the analyses.

/// The decade of a year: 1987 -> 1980.
pub fn decade_of(year: i32) -> i32 {
    year.div_euclid(10) * 10
}

/// The age groups of the respondents, from the youngest to the oldest.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Cohort {
    GenZUnder18,
    GenZ18To24,
    Millennial25To34,
    Millennial35To44,
    GenX45To54,
    Boomer55To64,
    Boomer65Plus,
}

impl Cohort {
    pub const ALL: [Cohort; 7] = [
        Cohort::GenZUnder18,
        Cohort::GenZ18To24,
        Cohort::Millennial25To34,
        Cohort::Millennial35To44,
        Cohort::GenX45To54,
        Cohort::Boomer55To64,
        Cohort::Boomer65Plus,
    ];

    pub fn from_age(age: i32) -> Cohort {
        match age {
            a if a < 18 => Cohort::GenZUnder18,
            a if a < 25 => Cohort::GenZ18To24,
            a if a < 35 => Cohort::Millennial25To34,
            a if a < 45 => Cohort::Millennial35To44,
            a if a < 55 => Cohort::GenX45To54,
            a if a < 65 => Cohort::Boomer55To64,
            _ => Cohort::Boomer65Plus,
        }
    }

    pub fn from_birth_year(birth_year: i32, current_year: i32) -> Cohort {
        Cohort::from_age(current_year - birth_year)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Cohort::GenZUnder18 => "Gen Z (Under 18)",
            Cohort::GenZ18To24 => "Gen Z (18\u{2013}24)",
            Cohort::Millennial25To34 => "Millennial (25\u{2013}34)",
            Cohort::Millennial35To44 => "Millennial (35\u{2013}44)",
            Cohort::GenX45To54 => "Gen X (45\u{2013}54)",
            Cohort::Boomer55To64 => "Boomer (55\u{2013}64)",
            Cohort::Boomer65Plus => "Boomer (65+)",
        }
    }
}

/// Shannon entropy, in bits, of the distribution given by the counts.
///
/// Zero counts are ignored. Returns None when there is no observation at all:
/// the entropy of an empty group is undefined, not zero.
pub fn shannon_entropy(counts: &[usize]) -> Option<f64> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return None;
    }
    let n = total as f64;
    let h: f64 = counts
        .iter()
        .filter(|c| **c > 0)
        .map(|c| {
            let p = *c as f64 / n;
            -p * p.log2()
        })
        .sum();
    // A single term gives -0.0.
    Some(h.max(0.0))
}

/// Each count as a percentage of the sum of the counts.
pub fn percentages(counts: &[usize]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    counts
        .iter()
        .map(|c| {
            if total == 0 {
                0.0
            } else {
                *c as f64 / total as f64 * 100.0
            }
        })
        .collect()
}

pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
