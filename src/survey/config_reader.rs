use crate::survey::*;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "dialect_app.json";
pub const DEFAULT_CACHE_DIRECTORY: &str = "data";

/// The tables of the survey, in the order they are loaded.
pub const TABLES: [&str; 4] = ["users", "questions", "choices", "responses"];

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    /// A local path, a Google Drive link or file id, or any http(s) URL.
    pub reference: String,
    /// csv or xlsx. Inferred from the extension of the reference when missing.
    pub provider: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataSourceEntry {
    Reference(String),
    Detailed(DataSource),
}

impl DataSourceEntry {
    fn to_source(&self) -> DataSource {
        match self {
            DataSourceEntry::Reference(r) => DataSource {
                reference: r.clone(),
                provider: None,
                excel_worksheet_name: None,
            },
            DataSourceEntry::Detailed(ds) => ds.clone(),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub pattern: String,
    pub replacement: String,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysesConfig {
    #[serde(rename = "usageQuestionId")]
    pub usage_question_id: Option<QuestionId>,
    #[serde(rename = "topTerms")]
    pub top_terms: Option<usize>,
    #[serde(rename = "diversityQuestionId")]
    pub diversity_question_id: Option<QuestionId>,
    #[serde(rename = "diversityTerms")]
    pub diversity_terms: Option<Vec<String>>,
    #[serde(rename = "cohortQuestionId")]
    pub cohort_question_id: Option<QuestionId>,
    #[serde(rename = "minimumTermShare")]
    pub minimum_term_share: Option<f64>,
    #[serde(rename = "currentYear")]
    pub current_year: Option<i32>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ScoringModelConfig {
    pub regions: Vec<String>,
    pub smoothing: Option<f64>,
    /// Feature key ({question}_{choice}) to the weight of each region.
    pub weights: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "dataFiles", default)]
    pub data_files: BTreeMap<String, DataSourceEntry>,
    #[serde(rename = "cacheDirectory")]
    pub cache_directory: Option<String>,
    #[serde(rename = "normalizationRules")]
    pub normalization_rules: Option<Vec<RuleConfig>>,
    #[serde(rename = "scoringModel")]
    pub scoring_model: Option<String>,
    #[serde(default)]
    pub analyses: AnalysesConfig,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Provider {
    Csv,
    Xlsx,
}

impl Provider {
    pub fn extension(&self) -> &'static str {
        match self {
            Provider::Csv => "csv",
            Provider::Xlsx => "xlsx",
        }
    }
}

impl DataSource {
    pub fn provider(&self) -> SurveyResult<Provider> {
        match self.provider.as_deref().map(|s| s.trim().to_lowercase()) {
            Some(p) if p == "csv" => Ok(Provider::Csv),
            Some(p) if p == "xlsx" || p == "excel" => Ok(Provider::Xlsx),
            Some(p) => whatever!("Unknown provider {:?} for {:?}", p, self.reference),
            None if self.reference.to_lowercase().ends_with(".xlsx") => Ok(Provider::Xlsx),
            None => Ok(Provider::Csv),
        }
    }
}

/// The validated configuration of the application.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sources: BTreeMap<String, DataSource>,
    /// Relative references and paths are resolved against this directory.
    pub base_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub normalizer: TermNormalizer,
    pub model: WeightTable,
    pub analyses: AnalysisSettings,
    pub current_year: Option<i32>,
}

impl Settings {
    pub fn defaults(base_dir: &Path) -> Settings {
        Settings {
            sources: BTreeMap::new(),
            base_dir: base_dir.to_path_buf(),
            cache_dir: base_dir.join(DEFAULT_CACHE_DIRECTORY),
            normalizer: TermNormalizer::with_default_rules(),
            model: WeightTable::default_model(),
            analyses: AnalysisSettings::default_settings(),
            current_year: None,
        }
    }

    pub fn source(&self, table: &str) -> SurveyResult<&DataSource> {
        self.sources
            .get(table)
            .context(MissingDataReferenceSnafu { table })
    }

    /// The year used to compute ages: the override, then the configuration, then today.
    pub fn current_year(&self, year_override: Option<i32>) -> i32 {
        year_override
            .or(self.current_year)
            .unwrap_or_else(|| chrono::Local::now().year())
    }
}

/// Loads the configuration file, or the default settings when there is none.
pub fn load_settings(path: Option<&str>) -> SurveyResult<Settings> {
    match path {
        Some(p) => read_settings(p),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => read_settings(DEFAULT_CONFIG_PATH),
        None => {
            info!(
                "No configuration file {:?} found, using the default settings",
                DEFAULT_CONFIG_PATH
            );
            Ok(Settings::defaults(Path::new(".")))
        }
    }
}

pub fn read_settings(path: &str) -> SurveyResult<Settings> {
    info!("Reading configuration from {:?}", path);
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: AppConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_settings: {:?}", config);
    let parent = Path::new(path).parent().context(MissingParentDirSnafu {})?;
    let base_dir = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    validate_config(&config, base_dir, path)
}

fn read_scoring_model(path: &Path) -> SurveyResult<WeightTable> {
    let p = path.display().to_string();
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path: p.clone() })?;
    let model: ScoringModelConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path: p.clone() })?;
    let weights: Vec<(String, Vec<(String, f64)>)> = model
        .weights
        .into_iter()
        .map(|(feature, ws)| (feature, ws.into_iter().collect()))
        .collect();
    WeightTable::new(
        &model.regions,
        &weights,
        model.smoothing.unwrap_or(DEFAULT_SMOOTHING),
    )
    .context(InvalidSettingsSnafu { path: p })
}

/// A minimum term share must lie in [0, 1].
pub fn check_share(share: f64, origin: &str) -> SurveyResult<f64> {
    if !(0.0..=1.0).contains(&share) {
        whatever!(
            "{}: the minimum term share must be between 0 and 1, got {}",
            origin,
            share
        )
    }
    Ok(share)
}

pub fn validate_config(config: &AppConfig, base_dir: &Path, path: &str) -> SurveyResult<Settings> {
    let mut settings = Settings::defaults(base_dir);

    for (table, entry) in config.data_files.iter() {
        if !TABLES.contains(&table.as_str()) {
            warn!("{}: ignoring unknown table {:?} in dataFiles", path, table);
            continue;
        }
        let source = entry.to_source();
        // Fails early on unknown providers.
        source.provider()?;
        settings.sources.insert(table.clone(), source);
    }

    if let Some(dir) = &config.cache_directory {
        settings.cache_dir = base_dir.join(dir);
    }

    if let Some(rules) = &config.normalization_rules {
        let specs: Vec<RuleSpec> = rules
            .iter()
            .map(|r| RuleSpec::new(&r.pattern, &r.replacement))
            .collect();
        settings.normalizer = TermNormalizer::new(&specs).context(InvalidSettingsSnafu { path })?;
    }

    if let Some(model_path) = &config.scoring_model {
        settings.model = read_scoring_model(&base_dir.join(model_path))?;
    }

    let a = &config.analyses;
    let defaults = AnalysisSettings::default_settings();
    let minimum_term_share = check_share(
        a.minimum_term_share.unwrap_or(defaults.minimum_term_share),
        &format!("{} (minimumTermShare)", path),
    )?;
    settings.analyses = AnalysisSettings {
        usage_question_id: a.usage_question_id.unwrap_or(defaults.usage_question_id),
        top_terms: a.top_terms.unwrap_or(defaults.top_terms),
        diversity_question_id: a
            .diversity_question_id
            .unwrap_or(defaults.diversity_question_id),
        diversity_terms: a
            .diversity_terms
            .clone()
            .unwrap_or(defaults.diversity_terms),
        cohort_question_id: a.cohort_question_id.unwrap_or(defaults.cohort_question_id),
        minimum_term_share,
    };
    settings.current_year = a.current_year;

    info!(
        "Configuration: {} data files, cache in {:?}, {} normalization rules, {} regions",
        settings.sources.len(),
        settings.cache_dir,
        settings.normalizer.num_rules(),
        settings.model.regions().len()
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> AppConfig {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn data_files_as_strings_or_objects() {
        let config = parse(
            r#"{
                "dataFiles": {
                    "users": "https://drive.google.com/file/d/1AbCdEfGhIjKlMnOpQrStUvWxYz012345/view",
                    "responses": {"reference": "responses.xlsx", "excelWorksheetName": "Sheet2"},
                    "choices": {"reference": "choices.dat", "provider": "csv"},
                    "extra": "extra.csv"
                }
            }"#,
        );
        let settings = validate_config(&config, Path::new("/tmp/survey"), "test.json").unwrap();
        assert_eq!(settings.sources.len(), 3);
        let responses = settings.source("responses").unwrap();
        assert_eq!(responses.provider().unwrap(), Provider::Xlsx);
        assert_eq!(responses.excel_worksheet_name.as_deref(), Some("Sheet2"));
        assert_eq!(settings.source("choices").unwrap().provider().unwrap(), Provider::Csv);
        assert_eq!(settings.source("users").unwrap().provider().unwrap(), Provider::Csv);
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/survey/data"));

        let err = settings.source("questions").unwrap_err();
        assert!(err.to_string().contains("dataFiles"));
        assert!(err.to_string().contains("questions"));
    }

    #[test]
    fn defaults_without_configuration() {
        let config = parse("{}");
        let settings = validate_config(&config, Path::new("."), "test.json").unwrap();
        assert_eq!(settings.analyses, AnalysisSettings::default_settings());
        assert_eq!(settings.normalizer.num_rules(), 1);
        assert_eq!(settings.model.regions().len(), 7);
        assert_eq!(settings.current_year(Some(2020)), 2020);
        assert!(settings.current_year(None) >= 2024);
    }

    #[test]
    fn analyses_and_rules() {
        let config = parse(
            r#"{
                "cacheDirectory": "cache",
                "normalizationRules": [
                    {"pattern": "^sody$", "replacement": "soda"},
                    {"pattern": "(?i)^pill ?bug.*$", "replacement": "pill bug"}
                ],
                "analyses": {"topTerms": 3, "diversityTerms": ["soda", "coke"], "currentYear": 2021}
            }"#,
        );
        let settings = validate_config(&config, Path::new("conf"), "test.json").unwrap();
        assert_eq!(settings.cache_dir, PathBuf::from("conf/cache"));
        assert_eq!(settings.normalizer.num_rules(), 2);
        assert_eq!(settings.normalizer.canonicalize("pillbugs"), "pill bug");
        assert_eq!(settings.analyses.top_terms, 3);
        assert_eq!(settings.analyses.diversity_terms, vec!["soda", "coke"]);
        assert_eq!(settings.analyses.cohort_question_id, 21);
        assert_eq!(settings.current_year(None), 2021);
    }

    #[test]
    fn invalid_configurations() {
        let bad_rule = parse(r#"{"normalizationRules": [{"pattern": "(", "replacement": "x"}]}"#);
        assert!(validate_config(&bad_rule, Path::new("."), "test.json").is_err());

        let bad_provider = parse(r#"{"dataFiles": {"users": {"reference": "u.txt", "provider": "parquet"}}}"#);
        assert!(validate_config(&bad_provider, Path::new("."), "test.json").is_err());

        let bad_share = parse(r#"{"analyses": {"minimumTermShare": 5}}"#);
        assert!(validate_config(&bad_share, Path::new("."), "test.json").is_err());
    }

    #[test]
    fn share_bounds() {
        assert_eq!(check_share(0.0, "--min-share").unwrap(), 0.0);
        assert_eq!(check_share(1.0, "--min-share").unwrap(), 1.0);
        assert_eq!(check_share(0.05, "--min-share").unwrap(), 0.05);
        let err = check_share(1.5, "--min-share").unwrap_err();
        assert!(err.to_string().contains("--min-share"));
        assert!(check_share(-0.1, "--min-share").is_err());
        assert!(check_share(f64::NAN, "--min-share").is_err());
    }

    #[test]
    fn scoring_model_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("model.json"),
            r#"{"regions": ["East", "West"], "weights": {"319_freeway": {"West": 2.0}}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("bad_model.json"),
            r#"{"regions": ["East"], "weights": {"319_freeway": {"West": 2.0}}}"#,
        )
        .unwrap();
        let config_path = dir.path().join("dialect_app.json");
        fs::write(&config_path, r#"{"scoringModel": "model.json"}"#).unwrap();
        let settings = read_settings(&config_path.display().to_string()).unwrap();
        assert_eq!(settings.model.regions(), &["East".to_string(), "West".to_string()]);
        assert_eq!(settings.model.smoothing(), DEFAULT_SMOOTHING);

        fs::write(&config_path, r#"{"scoringModel": "bad_model.json"}"#).unwrap();
        assert!(read_settings(&config_path.display().to_string()).is_err());

        // Smoothing and weights outside their domain.
        for (name, model) in [
            (
                "zero_smoothing.json",
                r#"{"regions": ["East", "West"], "weights": {}, "smoothing": 0}"#,
            ),
            (
                "negative_weight.json",
                r#"{"regions": ["East", "West"], "weights": {"319_freeway": {"East": -3.0}}}"#,
            ),
        ] {
            fs::write(dir.path().join(name), model).unwrap();
            fs::write(&config_path, format!(r#"{{"scoringModel": "{}"}}"#, name)).unwrap();
            let err = read_settings(&config_path.display().to_string()).unwrap_err();
            assert!(matches!(err, SurveyError::InvalidSettings { .. }), "{}", name);
        }
    }
}
