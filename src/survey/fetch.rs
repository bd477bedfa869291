// Resolution of the data references and the local cache of downloaded tables.

use crate::survey::config_reader::{Provider, Settings, TABLES};
use crate::survey::io_common::simplify_file_name;
use crate::survey::*;

use dialect_survey::builder::Builder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

const DRIVE_ID_PATTERN: &str = r"(?:id=|/d/|open\?id=|file/d/)([A-Za-z0-9_-]{25,})";
const BARE_ID_PATTERN: &str = r"^[A-Za-z0-9_-]{25,}$";
const MANIFEST_FILE: &str = "manifest.json";

/// Where the content of a table comes from.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Location {
    Local(PathBuf),
    Remote(String),
}

impl Location {
    fn key(&self) -> String {
        match self {
            Location::Local(p) => format!("file:{}", p.display()),
            Location::Remote(url) => url.clone(),
        }
    }
}

pub fn drive_download_url(file_id: &str) -> String {
    format!(
        "https://drive.google.com/uc?export=download&confirm=t&id={}",
        file_id
    )
}

fn compile(pattern: &str) -> SurveyResult<Regex> {
    Regex::new(pattern).with_whatever_context(|_| format!("Invalid pattern {:?}", pattern))
}

/// Resolves a data reference to a local file or a URL to download.
///
/// An existing local path is read in place. Google Drive links and bare Drive
/// file ids become direct download URLs. Other http(s) URLs are used as they are.
pub fn resolve_reference(reference: &str, base_dir: &Path) -> SurveyResult<Location> {
    let r = reference.trim();
    if r.is_empty() {
        whatever!("Empty data reference")
    }
    let local = base_dir.join(r);
    if local.exists() {
        return Ok(Location::Local(local));
    }
    if let Some(c) = compile(DRIVE_ID_PATTERN)?.captures(r) {
        if let Some(id) = c.get(1) {
            return Ok(Location::Remote(drive_download_url(id.as_str())));
        }
    }
    if r.starts_with("http://") || r.starts_with("https://") {
        return Ok(Location::Remote(r.to_string()));
    }
    if compile(BARE_ID_PATTERN)?.is_match(r) {
        return Ok(Location::Remote(drive_download_url(r)));
    }
    // Neither a file nor a link. Reading it will report the missing file.
    Ok(Location::Local(local))
}

/// Downloads the content of a URL into a file.
pub trait Fetcher {
    fn fetch(&self, url: &str, dest: &Path) -> SurveyResult<()>;
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> SurveyResult<HttpFetcher> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .whatever_context("Error building the HTTP client")?;
        Ok(HttpFetcher { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> SurveyResult<()> {
        let start = std::time::Instant::now();
        info!("Downloading {}", url);
        let mut resp = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .context(FetchingSnafu { url })?;
        // Drive answers with an HTML page when the file is not shared or too large to scan.
        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/html"))
            .unwrap_or(false);
        if is_html {
            whatever!(
                "{} returned a web page instead of a data file: check that the file is shared publicly",
                url
            )
        }
        let dest_s = dest.display().to_string();
        let mut file = File::create(dest).context(WritingFileSnafu { path: dest_s })?;
        let num_bytes = resp.copy_to(&mut file).context(FetchingSnafu { url })?;
        info!(
            "Downloaded {} bytes in {:.2}s from {}",
            num_bytes,
            start.elapsed().as_secs_f32(),
            url
        );
        Ok(())
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
struct ManifestEntry {
    location: String,
    file: String,
}

#[derive(PartialEq, Eq, Debug, Clone, Default, Serialize, Deserialize)]
struct Manifest {
    tables: BTreeMap<String, ManifestEntry>,
}

/// The local copies of the remote tables, and the snapshot built from them.
///
/// A table is downloaded again only when its resolved location changes.
/// The snapshot is built once per process for a given set of locations.
pub struct DatasetCache<F: Fetcher> {
    dir: PathBuf,
    fetcher: F,
    loaded: Option<(Vec<String>, Rc<SurveyData>)>,
}

impl<F: Fetcher> DatasetCache<F> {
    pub fn new(dir: PathBuf, fetcher: F) -> DatasetCache<F> {
        DatasetCache {
            dir,
            fetcher,
            loaded: None,
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn read_manifest(&self) -> Manifest {
        let path = self.manifest_path();
        if !path.exists() {
            return Manifest::default();
        }
        match fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<Manifest>(&s).ok())
        {
            Some(m) => m,
            None => {
                warn!("Ignoring unreadable cache manifest {:?}", path);
                Manifest::default()
            }
        }
    }

    fn write_manifest(&self, manifest: &Manifest) -> SurveyResult<()> {
        let path = self.manifest_path();
        let s = serde_json::to_string_pretty(manifest).context(SerializingJsonSnafu {})?;
        fs::write(&path, s).context(WritingFileSnafu {
            path: path.display().to_string(),
        })
    }

    /// A local file with the content of the table.
    pub fn materialize(&self, table: &str, location: &Location, provider: Provider) -> SurveyResult<PathBuf> {
        let url = match location {
            Location::Local(p) => return Ok(p.clone()),
            Location::Remote(url) => url,
        };
        fs::create_dir_all(&self.dir).context(WritingFileSnafu {
            path: self.dir.display().to_string(),
        })?;
        let file_name = format!("{}.{}", table, provider.extension());
        let dest = self.dir.join(&file_name);
        let entry = ManifestEntry {
            location: url.clone(),
            file: file_name.clone(),
        };

        let mut manifest = self.read_manifest();
        if manifest.tables.get(table) == Some(&entry) && dest.exists() {
            info!("Using the cached copy {:?} of {}", dest, url);
            return Ok(dest);
        }

        // Download next to the destination, and only replace it once complete.
        let part = self.dir.join(format!("{}.part", file_name));
        if let Err(e) = self.fetcher.fetch(url, &part) {
            if part.exists() {
                if let Err(rm) = fs::remove_file(&part) {
                    warn!("Could not remove {:?}: {}", part, rm);
                }
            }
            return Err(e);
        }
        fs::rename(&part, &dest).context(WritingFileSnafu {
            path: dest.display().to_string(),
        })?;
        manifest.tables.insert(table.to_string(), entry);
        self.write_manifest(&manifest)?;
        debug!("materialize: {} -> {}", url, simplify_file_name(&dest));
        Ok(dest)
    }

    /// The snapshot of the four tables described by the settings.
    ///
    /// Fails without a partial snapshot if any table cannot be obtained.
    pub fn load(&mut self, settings: &Settings) -> SurveyResult<Rc<SurveyData>> {
        let mut plan: Vec<(&str, Location, Provider, Option<String>)> = Vec::new();
        for table in TABLES {
            let source = settings.source(table)?;
            let location = resolve_reference(&source.reference, &settings.base_dir)?;
            debug!("load: {} -> {:?}", table, location);
            plan.push((
                table,
                location,
                source.provider()?,
                source.excel_worksheet_name.clone(),
            ));
        }
        let key: Vec<String> = plan.iter().map(|(_, l, _, _)| l.key()).collect();
        if let Some((loaded_key, data)) = &self.loaded {
            if *loaded_key == key {
                debug!("load: reusing the loaded snapshot");
                return Ok(data.clone());
            }
        }

        let mut builder = Builder::new();
        for (table, location, provider, worksheet) in plan.iter() {
            let path = self.materialize(table, location, *provider)?;
            let raw = match provider {
                Provider::Csv => io_csv::read_csv_table(table, &path)?,
                Provider::Xlsx => io_excel::read_excel_table(table, &path, worksheet.as_deref())?,
            };
            tables::add_table(&raw, &mut builder)?;
        }
        let data = Rc::new(builder.build());
        info!(
            "Loaded {} users, {} questions, {} choices, {} responses",
            data.num_users(),
            data.questions().len(),
            data.num_choices(),
            data.num_responses()
        );
        self.loaded = Some((key, data.clone()));
        Ok(data)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Serves fixed contents, or fails, and records the requested URLs.
    pub struct FakeFetcher {
        pub contents: BTreeMap<String, String>,
        pub fail: bool,
        pub calls: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn serving(contents: &[(&str, &str)]) -> FakeFetcher {
            FakeFetcher {
                contents: contents
                    .iter()
                    .map(|(u, c)| (u.to_string(), c.to_string()))
                    .collect(),
                fail: false,
                calls: RefCell::new(Vec::new()),
            }
        }

        pub fn failing() -> FakeFetcher {
            FakeFetcher {
                contents: BTreeMap::new(),
                fail: true,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Fetcher for FakeFetcher {
        fn fetch(&self, url: &str, dest: &Path) -> SurveyResult<()> {
            self.calls.borrow_mut().push(url.to_string());
            // Leave a partial file behind, as an interrupted download would.
            fs::write(dest, "id,ye").unwrap();
            if self.fail {
                whatever!("connection reset while downloading {}", url)
            }
            match self.contents.get(url) {
                Some(c) => {
                    fs::write(dest, c).unwrap();
                    Ok(())
                }
                None => whatever!("404 for {}", url),
            }
        }
    }

    const ID_A: &str = "1AbCdEfGhIjKlMnOpQrStUvWxYz012345";
    const ID_B: &str = "1ZyXwVuTsRqPoNmLkJiHgFeDcBa543210";

    #[test]
    fn references() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("users.csv"), "id\n").unwrap();
        let base = dir.path();

        assert_eq!(
            resolve_reference("users.csv", base).unwrap(),
            Location::Local(base.join("users.csv"))
        );
        let expected = Location::Remote(drive_download_url(ID_A));
        for r in [
            format!("https://drive.google.com/file/d/{}/view?usp=sharing", ID_A),
            format!("https://drive.google.com/open?id={}", ID_A),
            format!("https://drive.google.com/uc?id={}&export=download", ID_A),
            format!("  {} ", ID_A),
        ] {
            assert_eq!(resolve_reference(&r, base).unwrap(), expected, "{}", r);
        }
        assert_eq!(
            resolve_reference("https://example.org/survey/users.csv", base).unwrap(),
            Location::Remote("https://example.org/survey/users.csv".to_string())
        );
        assert_eq!(
            resolve_reference("missing/users.csv", base).unwrap(),
            Location::Local(base.join("missing/users.csv"))
        );
        assert!(resolve_reference("  ", base).is_err());
    }

    #[test]
    fn downloads_are_cached_by_location() {
        let dir = tempfile::tempdir().unwrap();
        let url_a = drive_download_url(ID_A);
        let url_b = drive_download_url(ID_B);
        let fetcher = FakeFetcher::serving(&[(url_a.as_str(), "id\n1\n"), (url_b.as_str(), "id\n2\n")]);
        let cache = DatasetCache::new(dir.path().join("cache"), fetcher);

        let loc_a = Location::Remote(url_a.clone());
        let p1 = cache.materialize("users", &loc_a, Provider::Csv).unwrap();
        let p2 = cache.materialize("users", &loc_a, Provider::Csv).unwrap();
        assert_eq!(p1, p2);
        assert_eq!(cache.fetcher.calls.borrow().len(), 1);
        assert_eq!(fs::read_to_string(&p1).unwrap(), "id\n1\n");
        assert!(dir.path().join("cache").join(MANIFEST_FILE).exists());

        // A new reference for the same table replaces the cached copy.
        let p3 = cache
            .materialize("users", &Location::Remote(url_b.clone()), Provider::Csv)
            .unwrap();
        assert_eq!(p3, p1);
        assert_eq!(cache.fetcher.calls.borrow().len(), 2);
        assert_eq!(fs::read_to_string(&p3).unwrap(), "id\n2\n");

        // Local files are never copied.
        let local = Location::Local(dir.path().join("users.csv"));
        assert_eq!(
            cache.materialize("users", &local, Provider::Csv).unwrap(),
            dir.path().join("users.csv")
        );
        assert_eq!(cache.fetcher.calls.borrow().len(), 2);
    }

    #[test]
    fn failed_download_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let cache = DatasetCache::new(cache_dir.clone(), FakeFetcher::failing());
        let loc = Location::Remote(drive_download_url(ID_A));
        assert!(cache.materialize("users", &loc, Provider::Csv).is_err());
        assert!(!cache_dir.join("users.csv").exists());
        assert!(!cache_dir.join("users.csv.part").exists());
        assert!(!cache_dir.join(MANIFEST_FILE).exists());
    }

    #[test]
    fn snapshot_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let url = drive_download_url(ID_A);
        let fetcher = FakeFetcher::serving(&[(url.as_str(), "id,user_id,question_id,choice_id,other\n1,1,2,10,\n")]);
        for (name, content) in [
            ("users.csv", "id,year,gender,state\n1,1987,f,MA\n"),
            ("questions.csv", "id,text\n2,Soda?\n"),
            ("choices.csv", "id,question_id,value\n10,2,soda\n"),
        ] {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let config_path = dir.path().join("dialect_app.json");
        fs::write(
            &config_path,
            format!(
                r#"{{"dataFiles": {{"users": "users.csv", "questions": "questions.csv", "choices": "choices.csv", "responses": "{}"}}}}"#,
                ID_A
            ),
        )
        .unwrap();
        let settings = read_settings(&config_path.display().to_string()).unwrap();
        let mut cache = DatasetCache::new(settings.cache_dir.clone(), fetcher);
        let d1 = cache.load(&settings).unwrap();
        let d2 = cache.load(&settings).unwrap();
        assert!(Rc::ptr_eq(&d1, &d2));
        assert_eq!(d1.num_responses(), 1);
        assert_eq!(d1.question(2).map(|q| q.choices.clone()), Some(vec!["soda".to_string()]));
        assert_eq!(cache.fetcher.calls.borrow().len(), 1);
        assert!(dir.path().join("data").join("responses.csv").exists());
    }

    #[test]
    fn missing_table_reference() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("dialect_app.json");
        fs::write(&config_path, r#"{"dataFiles": {"users": "users.csv"}}"#).unwrap();
        let settings = read_settings(&config_path.display().to_string()).unwrap();
        let mut cache = DatasetCache::new(settings.cache_dir.clone(), FakeFetcher::failing());
        let err = cache.load(&settings).unwrap_err();
        assert!(matches!(err, SurveyError::MissingDataReference { .. }));
        assert!(cache.fetcher.calls.borrow().is_empty());
    }
}
