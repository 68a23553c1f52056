use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use zip::write::SimpleFileOptions;

use nmrshift_migrate::app::{Migration, RunOptions, Source};
use nmrshift_migrate::config::{Config, ConfigLoader};
use nmrshift_migrate::error::{IssueKind, MigrateError};
use nmrshift_migrate::fetch::{Download, Fetcher};
use nmrshift_migrate::fs_util::ZipExtractor;
use nmrshift_migrate::layout::Layout;
use nmrshift_migrate::nmredata::RawRecord;

const EXPORT_URL: &str = "https://export.example/nmrshiftdb2.nmredata.sd";

#[derive(Default)]
struct MockFetcher {
    responses: BTreeMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), body);
        self
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, url: &str) -> Result<Download, MigrateError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.responses.get(url) {
            Some(bytes) => Ok(Download {
                file_name: None,
                bytes: bytes.clone(),
            }),
            None => Err(MigrateError::HttpStatus {
                status: 404,
                message: "not found".to_string(),
            }),
        }
    }
}

fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn entry(authors: &str, id: &str, name: Option<&str>, links: &[&str]) -> String {
    let mut attributes = vec![
        ("NMREDATA_VERSION".to_string(), "1.1\\".to_string()),
        ("NMREDATA_AUTHOR".to_string(), authors.to_string()),
        ("NMREDATA_SOLVENT".to_string(), "D2O\\".to_string()),
        ("NMREDATA_TEMPERATURE".to_string(), "298 K\\".to_string()),
        ("NMREDATA_ID".to_string(), format!("DB_ID={id}\\")),
    ];
    if let Some(name) = name {
        attributes.push(("CHEMNAME".to_string(), name.to_string()));
    }
    for (idx, link) in links.iter().enumerate() {
        attributes.push((
            format!("NMREDATA_1D_{idx}"),
            format!("Spectrum_Location={link}\\"),
        ));
    }
    RawRecord::from_attributes(attributes).to_sd()
}

fn export() -> Vec<u8> {
    [
        entry(
            "Jane Roe: Hexoses",
            "10002",
            Some("Glucose"),
            &[
                "https://raw.example/10002_1H.zip",
                "https://raw.example/missing.zip",
            ],
        ),
        entry(
            "Jane Roe",
            "10002",
            Some("Glucose; dextrose"),
            &["https://raw.example/10002_13C.zip"],
        ),
        entry("Jane Roe", "10004", None, &[]),
        entry("Nadine Kümmerer", "20003", Some("Water"), &[]),
    ]
    .concat()
    .into_bytes()
}

fn fetcher() -> MockFetcher {
    MockFetcher::default()
        .with(EXPORT_URL, export())
        .with(
            "https://raw.example/10002_1H.zip",
            zip_bytes(&[
                ("10002_1H/10002/1/acqu", "$$ /u/nmr/10002/1/acqu\n"),
                ("10002_1H/10002/1/fid", "fid"),
            ]),
        )
        .with(
            "https://raw.example/10002_13C.zip",
            zip_bytes(&[("2/acqu", "$$ /u/nmr/10002/2/acqu\n"), ("2/ser", "ser")]),
        )
}

fn migration(temp: &tempfile::TempDir) -> Migration<MockFetcher, ZipExtractor> {
    migration_with(temp, fetcher())
}

fn migration_with(
    temp: &tempfile::TempDir,
    fetcher: MockFetcher,
) -> Migration<MockFetcher, ZipExtractor> {
    let layout = Layout::new(Utf8PathBuf::from_path_buf(temp.path().join("output")).unwrap());
    let config = ConfigLoader::resolve_config(Config::default()).unwrap();
    Migration::new(layout, config, fetcher, ZipExtractor)
}

#[test]
fn full_run_builds_the_submission_tree() {
    let temp = tempfile::tempdir().unwrap();
    let migration = migration(&temp);
    let report = migration
        .run(&Source::Url(EXPORT_URL.to_string()), RunOptions::default())
        .unwrap();

    assert_eq!(report.records, 4);
    assert_eq!(report.projects, 2);
    assert_eq!(report.samples, 2);
    assert_eq!(report.unique_molecules, 2);
    assert_eq!(report.spectra, 3);
    assert_eq!(report.issues_of(IssueKind::Network).count(), 1);
    assert_eq!(report.issues_of(IssueKind::MalformedRecord).count(), 1);
    assert_eq!(report.issues.len(), 2);

    let layout = migration.layout();
    let sample = layout.sample_dir(false, "Jane Roe", "10002_Glucose_D2O");
    assert!(sample.join("10002_Glucose_D2O_298.nmredata").is_file());
    assert!(sample.join("1/fid").is_file());
    assert!(sample.join("2/ser").is_file());
    assert!(!sample.join("10002_1H").exists());
    assert!(!sample.join("10002_13C").exists());
    assert!(
        layout
            .sample_dir(true, "Nadine Kümmerer", "20003_Water_D2O")
            .join("20003_Water_D2O_298.nmredata")
            .is_file()
    );
    assert!(layout.root().join("nmrshiftdb2.nmredata.sd").is_file());
}

#[test]
fn rerun_requires_resume() {
    let temp = tempfile::tempdir().unwrap();
    let source = Source::Url(EXPORT_URL.to_string());
    migration(&temp).run(&source, RunOptions::default()).unwrap();

    let err = migration(&temp)
        .run(&source, RunOptions::default())
        .unwrap_err();
    assert_matches!(err, MigrateError::OutputExists(_));

    let report = migration(&temp)
        .run(&source, RunOptions { resume: true })
        .unwrap();
    assert_eq!(report.projects, 0);
    assert_eq!(report.samples, 0);
    assert_eq!(report.spectra, 3);
}

#[test]
fn unreachable_export_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let err = migration(&temp)
        .run(
            &Source::Url("https://export.example/gone.sd".to_string()),
            RunOptions::default(),
        )
        .unwrap_err();
    assert_matches!(err, MigrateError::SourceUnreachable(_));

    let layout = Layout::new(Utf8PathBuf::from_path_buf(temp.path().join("output")).unwrap());
    for root in layout.group_roots() {
        assert!(!root.as_std_path().exists());
    }

    let report = migration(&temp)
        .run(&Source::Url(EXPORT_URL.to_string()), RunOptions::default())
        .unwrap();
    assert_eq!(report.projects, 2);
}

#[test]
fn local_export_file_is_read_without_fetching() {
    let temp = tempfile::tempdir().unwrap();
    let export_path = temp.path().join("export.sd");
    std::fs::write(&export_path, entry("Jane Roe", "7", Some("Water"), &[])).unwrap();

    let migration = migration(&temp);
    let report = migration
        .run(
            &Source::File(Utf8PathBuf::from_path_buf(export_path).unwrap()),
            RunOptions::default(),
        )
        .unwrap();
    assert_eq!(report.samples, 1);
    assert!(report.issues.is_empty());
    assert!(!migration.layout().root().join("nmrshiftdb2.nmredata.sd").exists());
}

#[test]
fn same_named_downloads_are_kept_side_by_side() {
    let temp = tempfile::tempdir().unwrap();
    let export_path = temp.path().join("export.sd");
    std::fs::write(
        &export_path,
        entry(
            "Jane Roe",
            "10002",
            Some("Glucose"),
            &[
                "https://raw.example/spectrum/1/rawdata",
                "https://raw.example/spectrum/2/rawdata",
            ],
        ),
    )
    .unwrap();
    let fetcher = MockFetcher::default()
        .with(
            "https://raw.example/spectrum/1/rawdata",
            zip_bytes(&[("1/acqu", "$$ /u/nmr/10002/1/acqu\n"), ("1/fid", "fid")]),
        )
        .with(
            "https://raw.example/spectrum/2/rawdata",
            zip_bytes(&[("2/acqu", "$$ /u/nmr/10002/2/acqu\n"), ("2/ser", "ser")]),
        );

    let migration = migration_with(&temp, fetcher);
    let report = migration
        .run(
            &Source::File(Utf8PathBuf::from_path_buf(export_path).unwrap()),
            RunOptions::default(),
        )
        .unwrap();

    assert_eq!(report.spectra, 2);
    assert!(report.issues.is_empty());
    let sample = migration
        .layout()
        .sample_dir(false, "Jane Roe", "10002_Glucose_D2O");
    assert!(sample.join("1/fid").is_file());
    assert!(sample.join("2/ser").is_file());
}
