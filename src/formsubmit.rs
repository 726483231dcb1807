//! Delivery of posted form data, behind the `FormSubmissionService`
//! trait so that rendering and hosting do not care what happens to a
//! submission.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::apachelog::open_for_append;

/// The name of the decoy field. Browsers leave it empty since it is
/// never visible; naive spam bots fill in anything that looks like a
/// name field.
pub const HONEYPOT_FIELD: &str = "name-honey";

/// Why a submission could not be delivered. Deliberately a single
/// case: the user is only ever told that it failed, the cause goes to
/// the logs.
#[derive(Debug, thiserror::Error)]
#[error("submission failed: {0:#}")]
pub struct SubmissionError(#[from] anyhow::Error);

/// The posted field/value pairs, in wire order. Keys are the field
/// labels (see `FormField::wire_key`); a key can repeat, checkbox
/// groups post one pair per checked entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormData(Vec<(String, String)>);

impl FormData {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> FormData {
        FormData(pairs)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// The first value posted under `key`, if any.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Every value posted under `key`, in order.
    pub fn all<'s>(&'s self, key: &'s str) -> impl Iterator<Item = &'s str> {
        self.0.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// True when the decoy field was filled in, the mark of an
    /// automated submission.
    pub fn honeypot_triggered(&self) -> bool {
        self.first(HONEYPOT_FIELD).map_or(false, |v| !v.is_empty())
    }
}

/// Where accepted submissions go. `spreadsheet_id` and `sheet_name`
/// are pass-through hints for backends that mirror submissions into a
/// spreadsheet; backends without that concept ignore them.
///
/// Implementations must treat a submission with a triggered honeypot
/// (`FormData::honeypot_triggered`) as spam: return `Ok(())` without
/// delivering anything, so that bots cannot tell they were caught.
pub trait FormSubmissionService {
    fn submit(
        &self,
        data: &FormData,
        spreadsheet_id: Option<&str>,
        sheet_name: Option<&str>,
    ) -> Result<(), SubmissionError>;
}

#[derive(Serialize)]
struct SpoolRecord<'t> {
    timestamp: String,
    subject: &'t str,
    spreadsheet_id: Option<&'t str>,
    sheet_name: Option<&'t str>,
    pairs: &'t [(String, String)],
}

/// The shipped delivery backend: appends one JSON line per accepted
/// submission to a spool file, for a separate mailer or importer to
/// pick up.
pub struct SpoolSubmissionService {
    out: Mutex<Box<BufWriter<File>>>,
}

impl SpoolSubmissionService {
    pub fn open(path: String) -> Result<SpoolSubmissionService> {
        Ok(SpoolSubmissionService {
            out: Mutex::new(open_for_append(path)?),
        })
    }
}

impl FormSubmissionService for SpoolSubmissionService {
    fn submit(
        &self,
        data: &FormData,
        spreadsheet_id: Option<&str>,
        sheet_name: Option<&str>,
    ) -> Result<(), SubmissionError> {
        if data.honeypot_triggered() {
            return Ok(());
        }
        // The subject travels as a hidden field, thus is part of the
        // posted data like everything else.
        let record = SpoolRecord {
            timestamp: Utc::now().to_rfc3339(),
            subject: data.first("subject").unwrap_or(""),
            spreadsheet_id,
            sheet_name,
            pairs: data.pairs(),
        };
        let mut line = serde_json::to_string(&record).context(
            "serializing submission record")?;
        line.push('\n');
        let mut out = self.out.lock().expect("die too if poisoned");
        out.write_all(line.as_bytes()).context(
            "writing to submissions spool")?;
        out.flush().context("flushing submissions spool")?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::webutils::randomidstring;

    fn data(pairs: &[(&str, &str)]) -> FormData {
        FormData::from_pairs(
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn t_first_and_all() {
        let d = data(&[
            ("Full Name", "Jane"),
            ("Toppings", "Cheese"),
            ("Toppings", "Olives"),
        ]);
        assert_eq!(d.first("Full Name"), Some("Jane"));
        assert_eq!(d.first("Toppings"), Some("Cheese"));
        assert_eq!(d.first("Missing"), None);
        assert_eq!(d.all("Toppings").collect::<Vec<_>>(),
                   vec!["Cheese", "Olives"]);
        assert_eq!(d.all("Missing").count(), 0);
    }

    #[test]
    fn t_honeypot_triggered() {
        assert!(!data(&[("Full Name", "Jane")]).honeypot_triggered());
        assert!(!data(&[(HONEYPOT_FIELD, "")]).honeypot_triggered());
        assert!(data(&[(HONEYPOT_FIELD, "Bob")]).honeypot_triggered());
    }

    fn tmp_spool_path() -> String {
        std::env::temp_dir()
            .join(format!("formsite-spool-{}.log", randomidstring().unwrap()))
            .to_str().unwrap().to_string()
    }

    #[test]
    fn t_spool_appends_json_lines() {
        let path = tmp_spool_path();
        let service = SpoolSubmissionService::open(path.clone()).unwrap();
        service.submit(
            &data(&[("subject", "Contact request"),
                    ("Full Name", "Jane"),
                    (HONEYPOT_FIELD, "")]),
            Some("sheet-id-1"),
            None,
        ).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["subject"], "Contact request");
        assert_eq!(record["spreadsheet_id"], "sheet-id-1");
        assert_eq!(record["sheet_name"], serde_json::Value::Null);
        assert_eq!(record["pairs"][1][0], "Full Name");
        assert_eq!(record["pairs"][1][1], "Jane");
    }

    #[test]
    fn t_spool_silently_drops_honeypot_submissions() {
        let path = tmp_spool_path();
        let service = SpoolSubmissionService::open(path.clone()).unwrap();
        service.submit(
            &data(&[("subject", "Contact request"),
                    (HONEYPOT_FIELD, "Bob")]),
            None,
            None,
        ).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(contents, "");
    }
}
