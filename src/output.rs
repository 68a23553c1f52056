use std::io::{self, Write};

use serde::Serialize;

use crate::report::RunReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Summary,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct SummaryOutput;

impl SummaryOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        Self::write_report(&mut stdout, report)
    }

    pub fn write_report(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let reset = "\x1b[0m";

        writeln!(out, "{cyan}NMRShiftDB migration summary{reset}")?;
        writeln!(out, "records in export:              {}", report.records)?;
        writeln!(out, "{green}projects (author groups):       {}{reset}", report.projects)?;
        writeln!(out, "{green}unique molecules:               {}{reset}", report.unique_molecules)?;
        writeln!(out, "{green}studies (samples):              {}{reset}", report.samples)?;
        writeln!(out, "{green}datasets (spectrum links):      {}{reset}", report.spectra)?;

        if report.issues.is_empty() {
            return Ok(());
        }
        writeln!(
            out,
            "{yellow}{} item(s) need manual handling:{reset}",
            report.issues.len()
        )?;
        for issue in &report.issues {
            writeln!(out, "{yellow}  [{}] {}{reset}", issue.kind, issue.subject)?;
            writeln!(out, "      {}", issue.message)?;
        }
        Ok(())
    }
}
