/*!

Core of the dialect survey tools: turning raw survey answers into canonical
terms, predicting a dialect region from quiz answers, and the aggregations
behind the charts (usage over time, lexical diversity, age groups).

Everything in this crate is a pure computation over an in-memory snapshot.
Reading the tables and fetching them is left to the caller.

```
use dialect_survey::*;

let mut session = QuizSession::new();
for q in question_bank() {
    session.answer(q.id, &q.choices[0])?;
}
let prediction = session.predict(&WeightTable::default_model())?;
assert!(prediction.confidence < 100.0);
# Ok::<(), DialectError>(())
```

See the [manual] for the details of each analysis.
*/

pub mod builder;
mod config;
mod features;
pub mod manual;
mod normalize;
mod pipeline;
mod quiz;
mod scoring;
mod stats;

pub use crate::config::*;
pub use crate::features::{Feature, FeatureSpace, FeatureVector};
pub use crate::normalize::TermNormalizer;
pub use crate::pipeline::{
    CohortRow, CohortUsage, DecadeTermShare, DiversityFilter, DiversityFrame, StateDiversity,
    SurveyData, TermSelection, TermShare, UsageOverTime,
};
pub use crate::quiz::{question_bank, region_description, QuizSession};
pub use crate::scoring::{
    RegionClassifier, WeightTable, DEFAULT_REGIONS, DEFAULT_SMOOTHING,
};
pub use crate::stats::{decade_of, percentages, round1, shannon_entropy, Cohort};
