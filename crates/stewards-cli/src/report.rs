//! Summary of the incidents recorded in the store.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use stewards_core::{AnnotationRecord, Incident};

/// Label used when a row has no usable value for a grouping column.
const UNKNOWN: &str = "(unknown)";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub rows: usize,
    pub documents: usize,
    pub with_penalty: usize,
    pub with_contact: usize,
    pub by_year: BTreeMap<String, usize>,
    pub by_grand_prix: BTreeMap<String, usize>,
}

pub fn build_report(records: &[AnnotationRecord]) -> Report {
    let mut report = Report {
        rows: records.len(),
        ..Default::default()
    };
    let mut documents = BTreeSet::new();

    for incident in records.iter().map(Incident::from_record) {
        if let Some(doc) = incident.source_document {
            documents.insert(doc);
        }
        if incident.penalty_given.is_some() {
            report.with_penalty += 1;
        }
        if incident.was_contact_made == Some(true) {
            report.with_contact += 1;
        }
        let year = incident
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());
        *report.by_year.entry(year).or_default() += 1;
        let grand_prix = incident.grand_prix.unwrap_or_else(|| UNKNOWN.to_string());
        *report.by_grand_prix.entry(grand_prix).or_default() += 1;
    }

    report.documents = documents.len();
    report
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Incidents:      {}", self.rows)?;
        writeln!(f, "Documents:      {}", self.documents)?;
        writeln!(f, "With penalty:   {}", self.with_penalty)?;
        writeln!(f, "Contact made:   {}", self.with_contact)?;

        writeln!(f, "\nBy year:")?;
        for (year, count) in &self.by_year {
            writeln!(f, "  {year:<30} {count}")?;
        }

        // Busiest events first, ties alphabetical.
        let mut events: Vec<_> = self.by_grand_prix.iter().collect();
        events.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        write!(f, "\nBy grand prix:")?;
        for (name, count) in events {
            write!(f, "\n  {name:<30} {count}")?;
        }
        Ok(())
    }
}
