use log::{debug, info, warn};

use dialect_survey::*;
use snafu::{prelude::*, Snafu};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod config_reader;
pub mod fetch;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod quiz_prompt;
pub mod tables;

use crate::args::{Args, Command};
use crate::survey::config_reader::*;
use crate::survey::fetch::{DatasetCache, HttpFetcher};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile { source: std::io::Error, path: String },
    #[snafu(display("Error writing file {path}"))]
    WritingFile { source: std::io::Error, path: String },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet {name} in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("The {table} table in {path} has no header row"))]
    EmptyTable { table: String, path: String },
    #[snafu(display("Error reading CSV file {path}"))]
    CsvRead { source: csv::Error, path: String },
    #[snafu(display("The {table} table in {path} has no column {column:?}"))]
    MissingColumn {
        table: String,
        column: String,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the results"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display(
        "Missing data reference for the {table} table: add it under \"dataFiles\" in the configuration file"
    ))]
    MissingDataReference { table: String },
    #[snafu(display("Error downloading {url}"))]
    Fetching { source: reqwest::Error, url: String },
    #[snafu(display("Invalid configuration in {path}: {source}"))]
    InvalidSettings {
        source: DialectError,
        path: String,
    },
    #[snafu(display("{source}"))]
    Quiz { source: DialectError },
    #[snafu(display("Error reading the answers"))]
    ReadingInput { source: std::io::Error },
    #[snafu(display("Error writing the output"))]
    WritingOutput { source: std::io::Error },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

fn prediction_to_json(p: &Prediction) -> JSValue {
    let breakdown: Vec<JSValue> = p
        .breakdown()
        .iter()
        .map(|(region, pct)| {
            let score = p
                .scores
                .iter()
                .find(|(r, _)| r == region)
                .map(|(_, s)| *s)
                .unwrap_or(0.0);
            json!({"region": region, "score": score, "percent": pct})
        })
        .collect();
    json!({
        "region": p.region,
        "description": region_description(&p.region),
        "confidence": p.confidence,
        "scores": breakdown,
    })
}

fn usage_to_json(u: &UsageOverTime) -> JSValue {
    let rows: Vec<JSValue> = u
        .rows
        .iter()
        .map(|r| json!({"decade": r.decade, "term": r.term, "count": r.count, "percent": r.percent}))
        .collect();
    json!({
        "questionId": u.question_id,
        "topTerms": u.top_terms,
        "selectedTerms": u.selected_terms,
        "allTerms": u.all_terms,
        "rows": rows,
    })
}

fn diversity_to_json(
    frame: &DiversityFrame,
    filter: &DiversityFilter,
    states: &[StateDiversity],
) -> JSValue {
    let states_js: Vec<JSValue> = states
        .iter()
        .map(|s| json!({"state": s.state, "responses": s.responses, "entropy": s.entropy}))
        .collect();
    json!({
        "questionId": frame.question_id(),
        "terms": frame.terms(),
        "filter": {
            "birthYears": filter.birth_years.map(|(lo, hi)| vec![lo, hi]),
            "genders": filter.genders,
        },
        "birthYearBounds": frame.birth_year_bounds().map(|(lo, hi)| vec![lo, hi]),
        "genderOptions": frame.gender_options(),
        "states": states_js,
    })
}

fn cohorts_to_json(c: &CohortUsage) -> JSValue {
    let cohorts: Vec<JSValue> = c
        .rows
        .iter()
        .map(|r| {
            let shares: Vec<JSValue> = r
                .shares
                .iter()
                .map(|s| json!({"term": s.term, "count": s.count, "percent": s.percent}))
                .collect();
            json!({"cohort": r.cohort.label(), "total": r.total, "shares": shares})
        })
        .collect();
    let distribution: Vec<JSValue> = c
        .term_distribution()
        .iter()
        .map(|s| json!({"term": s.term, "count": s.count, "percent": s.percent}))
        .collect();
    json!({
        "questionId": c.question_id,
        "currentYear": c.current_year,
        "terms": c.terms,
        "droppedTerms": c.dropped_terms,
        "cohorts": cohorts,
        "distribution": distribution,
    })
}

fn write_output(js: &JSValue, out: Option<&str>) -> SurveyResult<String> {
    let pretty = serde_json::to_string_pretty(js).context(SerializingJsonSnafu {})?;
    match out {
        None | Some("stdout") | Some("") => println!("{}", pretty),
        Some(path) => {
            info!("Writing summary to {:?}", path);
            fs::write(path, &pretty).context(WritingFileSnafu { path })?;
        }
    }
    Ok(pretty)
}

/// Reads a reference summary and normalizes its formatting.
pub fn read_summary(path: &str) -> SurveyResult<String> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    serde_json::to_string_pretty(&js).context(SerializingJsonSnafu {})
}

/// Fails when the computed summary differs from the reference, after printing the differences.
pub fn check_summary(pretty_js_stats: &str, reference_path: &str) -> SurveyResult<()> {
    let pretty_js_summary_ref = read_summary(reference_path)?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference summary {:?}", reference_path);
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_stats, "\n");
        whatever!("Difference detected between calculated summary and reference summary")
    }
    info!("The summary matches the reference {:?}", reference_path);
    Ok(())
}

/// Parses a QUESTION=CHOICE answer given on the command line.
fn parse_answer_flag(s: &str) -> SurveyResult<(QuestionId, String)> {
    let (q, label) = match s.split_once('=') {
        Some(x) => x,
        None => whatever!("Expected QUESTION=CHOICE, got {:?}", s),
    };
    let qid = match q.trim().parse::<QuestionId>() {
        Ok(x) => x,
        Err(_) => whatever!("Not a question id: {:?}", q),
    };
    Ok((qid, label.trim().to_string()))
}

/// Reads answers from a JSON object mapping question ids to choice labels.
pub fn read_answers(path: &str) -> SurveyResult<Vec<(QuestionId, String)>> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: BTreeMap<String, String> =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    let mut res: Vec<(QuestionId, String)> = Vec::new();
    for (q, label) in js.into_iter() {
        match q.trim().parse::<QuestionId>() {
            Ok(qid) => res.push((qid, label)),
            Err(_) => whatever!("{}: not a question id: {:?}", path, q),
        }
    }
    Ok(res)
}

fn print_prediction<W: Write>(p: &Prediction, out: &mut W) -> io::Result<()> {
    writeln!(out, "Your predicted dialect region: {}", p.region)?;
    if let Some(d) = region_description(&p.region) {
        writeln!(out, "{}", d)?;
    }
    writeln!(out, "Confidence: {:.1}%", p.confidence)?;
    writeln!(out)?;
    writeln!(out, "Regional match scores:")?;
    for (region, pct) in p.breakdown() {
        writeln!(out, "  {}: {:.1}%", region, pct)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "Results are predictions based on common speech patterns and may not reflect individual variation."
    )
}

fn run_quiz(
    settings: &Settings,
    answers_path: Option<&str>,
    answer_flags: &[String],
    as_json: bool,
) -> SurveyResult<()> {
    let mut session = QuizSession::new();
    if let Some(p) = answers_path {
        for (qid, label) in read_answers(p)? {
            session.answer(qid, &label).context(QuizSnafu {})?;
        }
    }
    for a in answer_flags.iter() {
        let (qid, label) = parse_answer_flag(a)?;
        session.answer(qid, &label).context(QuizSnafu {})?;
    }
    if !session.is_complete() {
        let stdin = io::stdin();
        let stdout = io::stdout();
        quiz_prompt::ask_remaining(&mut session, &mut stdin.lock(), &mut stdout.lock())?;
    }
    let prediction = session.predict(&settings.model).context(QuizSnafu {})?;
    debug!("run_quiz: prediction {:?}", prediction);
    if as_json {
        write_output(&prediction_to_json(&prediction), None)?;
    } else {
        let stdout = io::stdout();
        print_prediction(&prediction, &mut stdout.lock()).context(WritingOutputSnafu {})?;
    }
    Ok(())
}

fn term_selection(terms: &[String], top: Option<usize>, settings: &Settings) -> TermSelection {
    if terms.is_empty() {
        TermSelection::Top(top.unwrap_or(settings.analyses.top_terms))
    } else {
        TermSelection::Terms(terms.to_vec())
    }
}

/// Missing flags select the whole frame: its birth-year bounds and all its gender options.
/// Respondents without a birth year or a gender never pass this filter.
fn diversity_filter(
    frame: &DiversityFrame,
    min_year: Option<i32>,
    max_year: Option<i32>,
    genders: &[String],
) -> DiversityFilter {
    let bounds = frame.birth_year_bounds();
    let lo = min_year.or(bounds.map(|b| b.0)).unwrap_or(i32::MIN);
    let hi = max_year.or(bounds.map(|b| b.1)).unwrap_or(i32::MAX);
    let genders: BTreeSet<String> = if genders.is_empty() {
        frame.gender_options().into_iter().collect()
    } else {
        genders.iter().map(|g| g.trim().to_string()).collect()
    };
    DiversityFilter {
        birth_years: Some((lo, hi)),
        genders: Some(genders),
    }
}

fn diversity_terms(terms: &[String], settings: &Settings) -> Vec<String> {
    if terms.is_empty() {
        settings.analyses.diversity_terms.clone()
    } else {
        terms.to_vec()
    }
}

/// Runs all the analyses with the settings of the configuration.
pub fn build_summary_js(settings: &Settings, data: &SurveyData, current_year: i32) -> JSValue {
    let a = &settings.analyses;
    let usage = data.usage_over_time(
        a.usage_question_id,
        &settings.normalizer,
        &TermSelection::Top(a.top_terms),
    );
    let frame = data.diversity_frame(a.diversity_question_id, &a.diversity_terms, &settings.normalizer);
    let filter = diversity_filter(&frame, None, None, &[]);
    let states = frame.entropy_by_state(&filter);
    let cohorts = data.age_cohort_usage(
        a.cohort_question_id,
        current_year,
        &settings.normalizer,
        a.minimum_term_share,
    );
    json!({
        "dataset": {
            "users": data.num_users(),
            "questions": data.questions().len(),
            "choices": data.num_choices(),
            "responses": data.num_responses(),
        },
        "usageOverTime": usage_to_json(&usage),
        "lexicalDiversity": diversity_to_json(&frame, &filter, &states),
        "ageCohorts": cohorts_to_json(&cohorts),
    })
}

pub fn run(args: &Args) -> SurveyResult<()> {
    let settings = load_settings(args.config.as_deref())?;

    if let Command::Quiz {
        answers,
        answer,
        json,
    } = &args.command
    {
        return run_quiz(&settings, answers.as_deref(), answer, *json);
    }

    let mut cache = DatasetCache::new(settings.cache_dir.clone(), HttpFetcher::new()?);
    let data = cache.load(&settings)?;

    match &args.command {
        Command::Quiz { .. } => Ok(()),
        Command::Usage {
            question,
            terms,
            top,
        } => {
            let usage = data.usage_over_time(
                question.unwrap_or(settings.analyses.usage_question_id),
                &settings.normalizer,
                &term_selection(terms, *top, &settings),
            );
            write_output(&usage_to_json(&usage), None).map(|_| ())
        }
        Command::Diversity {
            question,
            terms,
            min_year,
            max_year,
            genders,
        } => {
            let frame = data.diversity_frame(
                question.unwrap_or(settings.analyses.diversity_question_id),
                &diversity_terms(terms, &settings),
                &settings.normalizer,
            );
            let filter = diversity_filter(&frame, *min_year, *max_year, genders);
            let states = frame.entropy_by_state(&filter);
            write_output(&diversity_to_json(&frame, &filter, &states), None).map(|_| ())
        }
        Command::Cohorts {
            question,
            current_year,
            min_share,
        } => {
            let min_share = match min_share {
                Some(share) => check_share(*share, "--min-share")?,
                None => settings.analyses.minimum_term_share,
            };
            let usage = data.age_cohort_usage(
                question.unwrap_or(settings.analyses.cohort_question_id),
                settings.current_year(*current_year),
                &settings.normalizer,
                min_share,
            );
            write_output(&cohorts_to_json(&usage), None).map(|_| ())
        }
        Command::Report {
            out,
            reference,
            current_year,
        } => {
            let js = build_summary_js(&settings, &data, settings.current_year(*current_year));
            let pretty = write_output(&js, out.as_deref())?;
            if let Some(r) = reference {
                check_summary(&pretty, r)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::fetch::tests::FakeFetcher;
    use std::path::Path;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    const USERS: &str = "id,year,gender,state,language
1,1985.0,f,MA,English
2,1987,m,MA,English
3,1992,f,OH,
4,1995,m,OH,English
5,2001,f,IL,Spanish
6,,x,IL,
7,,f,OH,
8,1990,,OH,English
";

    const QUESTIONS: &str = "id,text
2,What is your generic term for a sweetened carbonated beverage?
21,What do you call the little gray creature that rolls up into a ball when you touch it?
";

    const CHOICES: &str = "id,question_id,value
10,2,soda
11,2,pop
12,2,coke
20,21,roly poly
21,21,pill bug
";

    const RESPONSES: &str = "id,user_id,question_id,choice_id,other
100,1,2,10,
101,2,2,10,
102,3,2,11,
103,4,2,10,
104,5,2,,Pop
105,6,2,12,
106,42,2,10,
107,1,21,20,
108,2,21,,Rolly Poly
109,3,21,21,
110,4,21,20,
111,5,21,20,
112,6,21,21,
113,7,2,10,
114,8,2,10,
";

    fn write_dataset(dir: &Path) -> String {
        for (name, content) in [
            ("users.csv", USERS),
            ("questions.csv", QUESTIONS),
            ("choices.csv", CHOICES),
            ("responses.csv", RESPONSES),
        ] {
            fs::write(dir.join(name), content).unwrap();
        }
        let config = json!({
            "dataFiles": {
                "users": "users.csv",
                "questions": "questions.csv",
                "choices": {"reference": "choices.csv", "provider": "csv"},
                "responses": "responses.csv",
            },
            "cacheDirectory": "cache",
            "analyses": {"currentYear": 2025},
        });
        let p = dir.join("dialect_app.json");
        fs::write(&p, config.to_string()).unwrap();
        p.display().to_string()
    }

    fn load(config_path: &str) -> (Settings, std::rc::Rc<SurveyData>) {
        let settings = read_settings(config_path).unwrap();
        let mut cache = DatasetCache::new(settings.cache_dir.clone(), FakeFetcher::failing());
        let data = cache.load(&settings).unwrap();
        (settings, data)
    }

    #[test]
    fn summary_of_a_small_dataset() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_dataset(dir.path());
        let (settings, data) = load(&config_path);
        assert_eq!(data.num_users(), 8);
        assert_eq!(data.num_responses(), 15);

        let js = build_summary_js(&settings, &data, settings.current_year(None));

        let usage = &js["usageOverTime"];
        assert_eq!(usage["topTerms"], json!(["soda", "pop"]));
        assert_eq!(
            usage["rows"][0],
            json!({"decade": 1980, "term": "soda", "count": 2, "percent": 100.0})
        );

        let states = js["lexicalDiversity"]["states"].as_array().unwrap();
        let got: Vec<(&str, Option<f64>)> = states
            .iter()
            .map(|s| (s["state"].as_str().unwrap(), s["entropy"].as_f64()))
            .collect();
        assert_eq!(got, vec![("IL", Some(0.0)), ("MA", Some(0.0)), ("OH", Some(1.0))]);
        // Users 7 and 8 (no birth year, no gender) are outside the default filter.
        assert_eq!(states[2]["responses"], json!(2));
        let filter = &js["lexicalDiversity"]["filter"];
        assert_eq!(filter["birthYears"], json!([1985, 2001]));
        assert_eq!(filter["genders"], json!(["f", "m", "o", "x"]));

        let cohorts = &js["ageCohorts"];
        assert_eq!(cohorts["currentYear"], json!(2025));
        assert_eq!(cohorts["terms"], json!(["pill bug", "roly poly"]));
        let labels: Vec<&str> = cohorts["cohorts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["cohort"].as_str().unwrap())
            .collect();
        assert_eq!(
            labels,
            vec!["Gen Z (18\u{2013}24)", "Millennial (25\u{2013}34)", "Millennial (35\u{2013}44)"]
        );
        assert_eq!(cohorts["distribution"][0]["term"], json!("roly poly"));
        assert_eq!(cohorts["distribution"][0]["count"], json!(4));
    }

    #[test]
    fn reference_check() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_dataset(dir.path());
        let (settings, data) = load(&config_path);
        let js = build_summary_js(&settings, &data, 2025);
        let out = dir.path().join("summary.json").display().to_string();
        let pretty = write_output(&js, Some(out.as_str())).unwrap();

        assert!(check_summary(&pretty, &out).is_ok());

        let mut other = js.clone();
        other["ageCohorts"]["currentYear"] = json!(1999);
        let other_path = dir.path().join("other.json");
        fs::write(&other_path, other.to_string()).unwrap();
        assert!(check_summary(&pretty, &other_path.display().to_string()).is_err());
    }

    #[test]
    fn answers_from_flags_and_files() {
        assert_eq!(
            parse_answer_flag("303 = frappe").unwrap(),
            (303, "frappe".to_string())
        );
        assert!(parse_answer_flag("303").is_err());
        assert!(parse_answer_flag("x=frappe").is_err());

        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("answers.json");
        fs::write(&p, r#"{"303": "frappe", "300": "tree lawn"}"#).unwrap();
        let answers = read_answers(&p.display().to_string()).unwrap();
        assert_eq!(
            answers,
            vec![(300, "tree lawn".to_string()), (303, "frappe".to_string())]
        );
    }

    #[test]
    fn prediction_output() {
        let mut session = QuizSession::new();
        for q in question_bank() {
            let label = if q.id == 335 { "LA" } else { "other" };
            session.answer(q.id, label).unwrap();
        }
        let p = session.predict(&WeightTable::default_model()).unwrap();
        let js = prediction_to_json(&p);
        assert_eq!(js["region"], json!("The West"));
        assert_eq!(js["scores"][0]["region"], json!("The West"));
        assert_eq!(js["scores"].as_array().unwrap().len(), 7);

        let mut buf: Vec<u8> = Vec::new();
        print_prediction(&p, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Your predicted dialect region: The West\n"));
        assert!(text.contains("Confidence: 57.1%"));
    }

    #[test]
    fn filters_from_flags() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_dataset(dir.path());
        let (settings, data) = load(&config_path);
        let frame = data.diversity_frame(2, &settings.analyses.diversity_terms, &settings.normalizer);

        let all = diversity_filter(&frame, None, None, &[]);
        assert_eq!(all.birth_years, Some((1985, 2001)));
        let genders: Vec<&str> = all.genders.iter().flatten().map(|g| g.as_str()).collect();
        assert_eq!(genders, vec!["f", "m", "o", "x"]);
        let oh = frame
            .entropy_by_state(&all)
            .into_iter()
            .find(|s| s.state == "OH")
            .unwrap();
        assert_eq!(oh.responses, 2);

        let f = diversity_filter(&frame, Some(1990), None, &["f".to_string()]);
        assert_eq!(f.birth_years, Some((1990, 2001)));
        assert_eq!(f.genders.map(|g| g.len()), Some(1));
    }
}
