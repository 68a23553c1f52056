//! Reader for the NMReData SD export.
//!
//! An export is a sequence of entries terminated by `$$$$` lines. Each entry
//! is a molfile block followed by tagged data items:
//!
//! ```text
//! > <CHEMNAME>
//! Glucose
//!
//! ```
//!
//! The tag order is significant: the export places authorship in the second
//! data item, so attributes are kept in declaration order.

const TERMINATOR: &str = "$$$$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    text: String,
    attributes: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new(text: String, attributes: Vec<(String, String)>) -> Self {
        Self { text, attributes }
    }

    /// Builds a record from data items alone, rendering them as an SD entry.
    pub fn from_attributes<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let attributes: Vec<(String, String)> = attributes
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let mut text = String::from("\n  nmrshift-migrate\n\n  0  0  0  0  0  0  0  0  0  0999 V2000\nM  END\n");
        for (key, value) in &attributes {
            text.push_str(&format!("> <{key}>\n{value}\n\n"));
        }
        Self { text, attributes }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == tag)
            .map(|(_, value)| value.as_str())
    }

    pub fn nth(&self, index: usize) -> Option<(&str, &str)> {
        self.attributes
            .get(index)
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// The entry serialized back as a self-contained SD file.
    pub fn to_sd(&self) -> String {
        let mut out = self.text.clone();
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(TERMINATOR);
        out.push('\n');
        out
    }
}

/// Splits an export into its entries. Blank chunks (such as the tail after
/// the final terminator) are dropped.
pub fn parse_records(text: &str) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if line.trim_end() == TERMINATOR {
            if !current.trim().is_empty() {
                records.push(parse_entry(std::mem::take(&mut current)));
            }
            current.clear();
            continue;
        }
        current.push_str(line);
    }
    if !current.trim().is_empty() {
        records.push(parse_entry(current));
    }
    records
}

fn parse_entry(text: String) -> RawRecord {
    let mut attributes = Vec::new();
    let mut open: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(tag) = tag_name(line) {
            if let Some((key, values)) = open.take() {
                attributes.push((key, values.join("\n")));
            }
            open = Some((tag.to_string(), Vec::new()));
            continue;
        }
        if line.trim().is_empty() {
            if let Some((key, values)) = open.take() {
                attributes.push((key, values.join("\n")));
            }
            continue;
        }
        if let Some((_, values)) = open.as_mut() {
            values.push(line);
        }
    }
    if let Some((key, values)) = open.take() {
        attributes.push((key, values.join("\n")));
    }

    RawRecord::new(text, attributes)
}

fn tag_name(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('>')?;
    let start = rest.find('<')? + 1;
    let len = rest[start..].find('>')?;
    Some(&rest[start..start + len])
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
10002
  CDK

  1  0  0  0  0  0  0  0  0  0999 V2000
M  END
> <NMREDATA_VERSION>
1.1\\

> <NMREDATA_ASSIGNMENT>
Jane Roe; John Doe: A study of sugars\\

> <CHEMNAME>
Glucose

$$$$
20003
M  END
>  <CHEMNAME>  (2)
Water
second line

$$$$
";

    #[test]
    fn splits_entries_and_keeps_order() {
        let records = parse_records(EXPORT);
        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.nth(0), Some(("NMREDATA_VERSION", "1.1\\")));
        assert_eq!(first.nth(1).map(|(key, _)| key), Some("NMREDATA_ASSIGNMENT"));
        assert_eq!(first.get("CHEMNAME"), Some("Glucose"));
        assert!(first.text().starts_with("10002\n"));
    }

    #[test]
    fn multi_line_values_and_decorated_tags() {
        let records = parse_records(EXPORT);
        assert_eq!(records[1].get("CHEMNAME"), Some("Water\nsecond line"));
    }

    #[test]
    fn sd_output_is_terminated() {
        let records = parse_records(EXPORT);
        let sd = records[1].to_sd();
        assert!(sd.ends_with("$$$$\n"));
        assert_eq!(parse_records(&sd), vec![records[1].clone()]);
    }

    #[test]
    fn synthesized_records_parse_back() {
        let record = RawRecord::from_attributes([("CHEMNAME", "Ethanol"), ("AUTHOR", "A")]);
        let parsed = parse_records(&record.to_sd());
        assert_eq!(parsed[0].attributes(), record.attributes());
    }
}
