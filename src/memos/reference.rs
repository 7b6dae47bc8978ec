//! Reference-number generation.
//!
//! Format: `IMTS/YYYY/DEPT/SEQ`, e.g. `IMTS/2026/REGI/014`. The sequence
//! is per year and department and continues from the highest existing
//! reference.

use std::sync::OnceLock;

use chrono::{Datelike, Utc};
use regex::Regex;

use crate::error::DatabaseError;
use crate::store::Database;

const PREFIX: &str = "IMTS";

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^IMTS/\d{4}/[^/]+/(\d+)$").expect("reference regex"))
}

/// Department code used in references: first four characters, uppercased.
pub fn department_code(department: &str) -> String {
    department.chars().take(4).collect::<String>().to_uppercase()
}

/// The `LIKE` pattern matching all references for a year + department.
pub fn reference_pattern(year: i32, dept_code: &str) -> String {
    format!("{PREFIX}/{year}/{dept_code}/%")
}

/// Parse the trailing sequence number out of a well-formed reference.
fn parse_sequence(reference: &str) -> Option<u32> {
    reference_regex()
        .captures(reference)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Build the reference following `previous` (or the first of the series).
pub fn next_reference(previous: Option<&str>, year: i32, dept_code: &str) -> String {
    let next_seq = previous
        .and_then(parse_sequence)
        .map(|seq| seq + 1)
        .unwrap_or(1);
    format!("{PREFIX}/{year}/{dept_code}/{next_seq:03}")
}

/// Generate the next reference number for a department.
pub async fn generate(db: &dyn Database, department: &str) -> Result<String, DatabaseError> {
    let year = Utc::now().year();
    let code = department_code(department);
    let latest = db.latest_reference_like(&reference_pattern(year, &code)).await?;
    Ok(next_reference(latest.as_deref(), year, &code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn department_code_truncates_and_uppercases() {
        assert_eq!(department_code("Registry"), "REGI");
        assert_eq!(department_code("hr"), "HR");
        assert_eq!(department_code("Information Technology"), "INFO");
    }

    #[test]
    fn first_reference_of_series() {
        assert_eq!(next_reference(None, 2026, "REGI"), "IMTS/2026/REGI/001");
    }

    #[test]
    fn sequence_continues_from_previous() {
        assert_eq!(
            next_reference(Some("IMTS/2026/REGI/014"), 2026, "REGI"),
            "IMTS/2026/REGI/015"
        );
    }

    #[test]
    fn sequence_grows_past_three_digits() {
        assert_eq!(
            next_reference(Some("IMTS/2026/REGI/999"), 2026, "REGI"),
            "IMTS/2026/REGI/1000"
        );
    }

    #[test]
    fn unparsable_previous_restarts_at_one() {
        assert_eq!(
            next_reference(Some("IMTS/2026/REGI/old"), 2026, "REGI"),
            "IMTS/2026/REGI/001"
        );
    }

    #[test]
    fn pattern_scopes_year_and_department() {
        assert_eq!(reference_pattern(2026, "HR"), "IMTS/2026/HR/%");
    }
}
