use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

pub const DEFAULT_CONFIG_FILE: &str = "nmrshift-migrate.json";
pub const DEFAULT_SOURCE_URL: &str = "https://nmrshiftdb.nmr.uni-koeln.de/nmrshiftdb2.nmredata.sd";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub record_extension: Option<String>,
    #[serde(default)]
    pub tags: Option<TagNames>,
    #[serde(default)]
    pub review_authors: Option<Vec<String>>,
    #[serde(default)]
    pub author_aliases: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub name_exemptions: Option<Vec<String>>,
    #[serde(default)]
    pub archive_pattern: Option<String>,
    #[serde(default)]
    pub dataset_exclusions: Option<Vec<String>>,
    #[serde(default)]
    pub max_descent_depth: Option<usize>,
    #[serde(default)]
    pub max_unpack_sweeps: Option<usize>,
}

/// Tag names the identifier deriver reads from each record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TagNames {
    #[serde(default = "default_name_tag")]
    pub name: String,
    #[serde(default = "default_solvent_tag")]
    pub solvent: String,
    #[serde(default = "default_temperature_tag")]
    pub temperature: String,
    #[serde(default = "default_identifier_tag")]
    pub identifier: String,
    /// When unset, authorship is read from the second attribute of the record.
    #[serde(default)]
    pub authors: Option<String>,
}

impl Default for TagNames {
    fn default() -> Self {
        Self {
            name: default_name_tag(),
            solvent: default_solvent_tag(),
            temperature: default_temperature_tag(),
            identifier: default_identifier_tag(),
            authors: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub source_url: String,
    pub record_extension: String,
    pub tags: TagNames,
    pub review_authors: BTreeSet<String>,
    pub author_aliases: BTreeMap<String, String>,
    pub name_exemptions: Vec<String>,
    pub archive_pattern: Regex,
    pub dataset_exclusions: BTreeSet<String>,
    pub max_descent_depth: usize,
    pub max_unpack_sweeps: usize,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, MigrateError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MigrateError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| MigrateError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, MigrateError> {
        let pattern = config
            .archive_pattern
            .unwrap_or_else(|| r"(?i)\.zip$".to_string());
        let archive_pattern =
            Regex::new(&pattern).map_err(|err| MigrateError::InvalidPattern(err.to_string()))?;

        Ok(ResolvedConfig {
            source_url: config
                .source_url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            record_extension: config
                .record_extension
                .unwrap_or_else(|| "nmredata".to_string()),
            tags: config.tags.unwrap_or_default(),
            review_authors: config
                .review_authors
                .unwrap_or_else(default_review_authors)
                .into_iter()
                .collect(),
            author_aliases: config.author_aliases.unwrap_or_else(default_author_aliases),
            name_exemptions: config.name_exemptions.unwrap_or_else(default_name_exemptions),
            archive_pattern,
            dataset_exclusions: config
                .dataset_exclusions
                .unwrap_or_else(|| vec!["60003332_1H".to_string()])
                .into_iter()
                .collect(),
            max_descent_depth: config.max_descent_depth.unwrap_or(16),
            max_unpack_sweeps: config.max_unpack_sweeps.unwrap_or(8),
        })
    }
}

pub fn default_review_authors() -> Vec<String> {
    vec!["Nadine Kümmerer".to_string()]
}

pub fn default_author_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Nadine Kuemmerer".to_string(), "Nadine Kümmerer".to_string()),
        ("Nadine Kümerer".to_string(), "Nadine Kümmerer".to_string()),
    ])
}

pub fn default_name_exemptions() -> Vec<String> {
    vec![
        "Glucose; methyl 2,3,4,6-tetra-O-methyl-".to_string(),
        "Galactose; methyl 2,3,4,6-tetra-O-methyl-".to_string(),
        "Mannose; methyl 2,3,4,6-tetra-O-methyl-".to_string(),
    ]
}

fn default_name_tag() -> String {
    "CHEMNAME".to_string()
}

fn default_solvent_tag() -> String {
    "NMREDATA_SOLVENT".to_string()
}

fn default_temperature_tag() -> String {
    "NMREDATA_TEMPERATURE".to_string()
}

fn default_identifier_tag() -> String {
    "NMREDATA_ID".to_string()
}
