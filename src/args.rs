use clap::{Parser, Subcommand};

/// Explore the English dialect survey: take the region quiz or compute the
/// aggregations behind the charts.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration file. It lists where the four survey tables are
    /// located, and optionally the normalization rules, the scoring model and the analysis settings.
    /// Defaults to dialect_app.json in the current directory, if it exists.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Answer the 10 questions of the quiz and get a predicted dialect region.
    Quiz {
        /// (file path) A JSON file with the answers, for example {"303": "frappe", "300": "tree lawn"}.
        #[clap(short, long, value_parser)]
        answers: Option<String>,
        /// (QUESTION=CHOICE, repeatable) An answer, for example --answer 303=frappe. Questions left
        /// without an answer are asked interactively.
        #[clap(long = "answer", value_parser)]
        answer: Vec<String>,
        /// Print the prediction in JSON format instead of text.
        #[clap(long, takes_value = false)]
        json: bool,
    },
    /// Share of each term by birth decade.
    Usage {
        /// (default from the configuration, 2) The question to analyse.
        #[clap(long, value_parser)]
        question: Option<u32>,
        /// (list of comma-separated terms) The terms to report, instead of the most frequent ones.
        #[clap(long, value_parser, value_delimiter = ',')]
        terms: Vec<String>,
        /// (default 5) How many of the most frequent terms to report.
        #[clap(long, value_parser)]
        top: Option<usize>,
    },
    /// Lexical diversity (Shannon entropy) of a set of terms in each state.
    Diversity {
        /// (default from the configuration, 2) The question to analyse.
        #[clap(long, value_parser)]
        question: Option<u32>,
        /// (list of comma-separated terms, default soda,pop) The competing terms.
        #[clap(long, value_parser, value_delimiter = ',')]
        terms: Vec<String>,
        /// Only keep respondents born this year or later.
        #[clap(long, value_parser)]
        min_year: Option<i32>,
        /// Only keep respondents born this year or earlier.
        #[clap(long, value_parser)]
        max_year: Option<i32>,
        /// (list of comma-separated gender codes, default all) Only keep respondents with these genders.
        #[clap(long = "gender", value_parser, value_delimiter = ',')]
        genders: Vec<String>,
    },
    /// Usage of each term by age group, and the overall distribution of the terms.
    Cohorts {
        /// (default from the configuration, 21) The question to analyse.
        #[clap(long, value_parser)]
        question: Option<u32>,
        /// (default: the current year) The year used to compute the age of the respondents.
        #[clap(long, value_parser)]
        current_year: Option<i32>,
        /// (between 0 and 1, default 0.05) Terms used by a smaller share of the respondents are dropped.
        #[clap(long, value_parser)]
        min_share: Option<f64>,
    },
    /// Runs all the analyses with the settings of the configuration and writes a JSON summary.
    Report {
        /// (file path, 'stdout' or empty) Where to write the summary.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (file path) A reference summary in JSON format. If provided, the program checks that the
        /// computed summary matches the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
        /// (default: the current year) The year used to compute the age of the respondents.
        #[clap(long, value_parser)]
        current_year: Option<i32>,
    },
}
