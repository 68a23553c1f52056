use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{ResolvedConfig, TagNames};
use crate::error::MigrateError;
use crate::nmredata::RawRecord;

pub const UNKNOWN_TEMPERATURE: &str = "unknown";

const DB_ID_MARKER: &str = "DB_ID=";
const INCHI_MARKER: &str = "InChI";
const IUPAC_MARKER: &str = "IUPAC from";
const SYNONYM_SEPARATOR: &str = "; ";

static SPECTRUM_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Spectrum_Location=(https?://[^\s\\]+)").expect("static pattern")
});

/// Stable NMRShiftDB identifier of a molecule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MoleculeId(String);

impl MoleculeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MoleculeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MoleculeId {
    type Err = MigrateError;

    /// Parses the numeric suffix of a `DB_ID=` marker anywhere in the value.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let start = value
            .find(DB_ID_MARKER)
            .map(|idx| idx + DB_ID_MARKER.len())
            .ok_or_else(|| MigrateError::MalformedRecord(format!("no {DB_ID_MARKER} in {value:?}")))?;
        let digits: String = value[start..]
            .chars()
            .take_while(|ch| ch.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            return Err(MigrateError::MalformedRecord(format!(
                "{DB_ID_MARKER} without a number in {value:?}"
            )));
        }
        Ok(Self(digits))
    }
}

/// A record with its path-safe identifiers derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub molecule_id: MoleculeId,
    pub chemical_name: String,
    pub solvent: String,
    pub temperature: String,
    pub authors: String,
    pub sample_name: String,
    pub spectrum_links: Vec<String>,
    pub raw: RawRecord,
}

impl Record {
    pub fn record_file_name(&self, extension: &str) -> String {
        format!("{}_{}.{extension}", self.sample_name, self.temperature)
    }
}

/// Turns raw attribute mappings into [`Record`]s.
#[derive(Debug, Clone)]
pub struct IdentifierDeriver {
    tags: TagNames,
    author_aliases: BTreeMap<String, String>,
    name_exemptions: Vec<String>,
}

impl IdentifierDeriver {
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            tags: config.tags.clone(),
            author_aliases: config.author_aliases.clone(),
            name_exemptions: config.name_exemptions.clone(),
        }
    }

    pub fn derive(&self, raw: RawRecord) -> Result<Record, MigrateError> {
        let chemical_name = chemical_name(
            mandatory(&raw, &self.tags.name)?,
            &self.name_exemptions,
        );
        let solvent = solvent(mandatory(&raw, &self.tags.solvent)?);
        let temperature = temperature(raw.get(&self.tags.temperature));
        let molecule_id: MoleculeId = mandatory(&raw, &self.tags.identifier)?.parse()?;

        let author_value = match &self.tags.authors {
            Some(tag) => mandatory(&raw, tag)?,
            None => raw
                .nth(1)
                .map(|(_, value)| value)
                .ok_or_else(|| MigrateError::MalformedRecord("no authorship attribute".to_string()))?,
        };
        let authors = authors(author_value, &self.author_aliases);
        if authors.is_empty() {
            return Err(MigrateError::MalformedRecord("empty author group".to_string()));
        }

        let sample_name = format!("{molecule_id}_{chemical_name}_{solvent}");
        let spectrum_links = spectrum_links(raw.text());

        Ok(Record {
            molecule_id,
            chemical_name,
            solvent,
            temperature,
            authors,
            sample_name,
            spectrum_links,
            raw,
        })
    }
}

/// Flags author groups whose metadata needs manual review.
#[derive(Debug, Clone, Default)]
pub struct IssueClassifier {
    denylist: BTreeSet<String>,
}

impl IssueClassifier {
    pub fn new(denylist: BTreeSet<String>) -> Self {
        Self { denylist }
    }

    pub fn needs_review(&self, authors: &str) -> bool {
        self.denylist.contains(authors)
    }
}

fn mandatory<'a>(raw: &'a RawRecord, tag: &str) -> Result<&'a str, MigrateError> {
    match raw.get(tag) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(MigrateError::MalformedRecord(format!("empty <{tag}>"))),
        None => Err(MigrateError::MalformedRecord(format!("missing <{tag}>"))),
    }
}

fn first_line(value: &str) -> &str {
    value.lines().next().unwrap_or_default().trim()
}

pub fn chemical_name(value: &str, exemptions: &[String]) -> String {
    let decoded = decode_entities(first_line(value));
    let name = decoded.as_str();
    let truncated = if name.starts_with(INCHI_MARKER) {
        name.split(' ').next().unwrap_or(name)
    } else if let Some(idx) = name.find(IUPAC_MARKER) {
        name[..idx].trim_end()
    } else if let Some(idx) = name.find(SYNONYM_SEPARATOR) {
        if exemptions.iter().any(|exempt| name.starts_with(exempt.as_str())) {
            name
        } else {
            &name[..idx]
        }
    } else {
        name
    };
    truncated.replace('/', "\\")
}

pub fn solvent(value: &str) -> String {
    let mut solvent = first_line(value).replace('/', ", ");
    solvent.pop();
    solvent
}

pub fn temperature(value: Option<&str>) -> String {
    value
        .map(first_line)
        .and_then(|line| line.split(' ').next())
        .filter(|temp| !temp.is_empty())
        .map(|temp| temp.replace('/', "\\"))
        .unwrap_or_else(|| UNKNOWN_TEMPERATURE.to_string())
}

pub fn authors(value: &str, aliases: &BTreeMap<String, String>) -> String {
    let line = first_line(value);
    let line = match line.find(':') {
        Some(idx) => line[..idx].trim_end(),
        None => line,
    };
    let mut authors = line.to_string();
    for (misspelling, canonical) in aliases {
        authors = authors.replace(misspelling.as_str(), canonical);
    }
    authors.replace('/', "\\")
}

pub fn spectrum_links(text: &str) -> Vec<String> {
    SPECTRUM_LINK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|url| url.as_str().to_string())
        .collect()
}

/// Decodes HTML character references, named (`&alpha;`, `&prime;`) and
/// numeric. Unknown entities are left as written.
pub fn decode_entities(value: &str) -> String {
    html_escape::decode_html_entities(value).into_owned()
}
