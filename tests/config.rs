use std::io::Write;

use assert_matches::assert_matches;

use nmrshift_migrate::config::{ConfigLoader, DEFAULT_SOURCE_URL};
use nmrshift_migrate::error::MigrateError;

#[test]
fn file_overrides_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "record_extension": "sd",
            "review_authors": ["Jane Roe"],
            "archive_pattern": "(?i)\\.(zip|jdx\\.zip)$",
            "dataset_exclusions": [],
            "max_descent_depth": 4
        }}"#
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(file.path().to_str()).unwrap();
    assert_eq!(resolved.source_url, DEFAULT_SOURCE_URL);
    assert_eq!(resolved.record_extension, "sd");
    assert!(resolved.review_authors.contains("Jane Roe"));
    assert!(resolved.dataset_exclusions.is_empty());
    assert_eq!(resolved.max_descent_depth, 4);
    assert_eq!(resolved.max_unpack_sweeps, 8);
    assert!(resolved.archive_pattern.is_match("a.JDX.zip"));
}

#[test]
fn unreadable_explicit_config_is_an_error() {
    let err = ConfigLoader::resolve(Some("/nonexistent/nmrshift-migrate.json")).unwrap_err();
    assert_matches!(err, MigrateError::ConfigRead(_));
}

#[test]
fn invalid_json_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    let err = ConfigLoader::resolve(file.path().to_str()).unwrap_err();
    assert_matches!(err, MigrateError::ConfigParse(_));
}
