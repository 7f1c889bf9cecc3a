use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::guest::Side;

/// The only accepted upload shape. Free-text name lists are rejected; the
/// app offers this exact template as a download instead.
pub const TEMPLATE_COLUMNS: [&str; 5] = ["Name", "Email", "Phone", "Side", "Household ID"];

pub const TEMPLATE_MISMATCH_ERROR: &str =
    "This file doesn't match our template. Download the guest list template and try again.";
pub const EMPTY_FILE_ERROR: &str = "The uploaded file is empty.";

const DELIMITER_CANDIDATES: [char; 4] = [',', '\t', ';', '|'];
const SAMPLE_LINES: usize = 5;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ParsedGuest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub side: Side,
    /// The side text exactly as uploaded, so unrecognized labels can be
    /// mapped interactively afterwards.
    pub raw_side: Option<String>,
    pub household_id: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ParsedGuest {
    pub fn is_importable(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ImportResult {
    pub guests: Vec<ParsedGuest>,
    pub success: bool,
    pub error: Option<String>,
    /// Raw side labels that didn't resolve to a known side, deduplicated,
    /// for the follow-up "map 'Family' to bride or groom" step.
    pub unique_sides: Vec<String>,
}

impl ImportResult {
    fn failure(error: &str) -> Self {
        ImportResult {
            guests: Vec::new(),
            success: false,
            error: Some(error.to_string()),
            unique_sides: Vec::new(),
        }
    }
}

/// Parses an uploaded guest file against the fixed template. Pure and
/// idempotent; the caller decides what to do with rows carrying errors.
pub fn parse_guest_file(text: &str) -> ImportResult {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return ImportResult::failure(EMPTY_FILE_ERROR);
    }

    let Some(delimiter) = detect_delimiter(&lines) else {
        return ImportResult::failure(TEMPLATE_MISMATCH_ERROR);
    };

    let header_cells: Vec<&str> = lines[0].split(delimiter).collect();
    let Some(leading_blanks) = validate_header(&header_cells) else {
        return ImportResult::failure(TEMPLATE_MISMATCH_ERROR);
    };

    let mut guests = Vec::new();
    let mut unique_sides: Vec<String> = Vec::new();

    for line in &lines[1..] {
        let cells: Vec<&str> = line.split(delimiter).collect();
        let field = |index: usize| -> &str {
            cells.get(leading_blanks + index).map(|c| c.trim()).unwrap_or("")
        };

        // Rows of nothing but delimiters are skipped, not flagged.
        if (0..TEMPLATE_COLUMNS.len()).all(|i| field(i).is_empty()) {
            continue;
        }

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let name = field(0).to_string();
        if name.is_empty() {
            errors.push("Name is required".to_string());
        }

        let email = field(1);
        if !email.is_empty() && !EMAIL_REGEX.is_match(email) {
            warnings.push(format!("\"{}\" doesn't look like a valid email", email));
        }

        let raw_side = field(3);
        let side = normalize_side(raw_side);
        if side == Side::Unknown
            && !raw_side.is_empty()
            && !raw_side.eq_ignore_ascii_case("unknown")
            && !unique_sides.iter().any(|s| s == raw_side)
        {
            unique_sides.push(raw_side.to_string());
        }

        guests.push(ParsedGuest {
            name,
            email: non_empty(email),
            phone: non_empty(field(2)),
            side,
            raw_side: non_empty(raw_side),
            household_id: non_empty(field(4)),
            errors,
            warnings,
        });
    }

    ImportResult {
        guests,
        success: true,
        error: None,
        unique_sides,
    }
}

/// Picks the delimiter whose per-line counts are consistent (within ±1 of
/// the mean) across the sampled lines, preferring the most frequent one.
/// None means the file isn't delimited at all.
fn detect_delimiter(lines: &[&str]) -> Option<char> {
    let sample: Vec<&str> = lines.iter().take(SAMPLE_LINES).copied().collect();

    let mut best: Option<(char, f64)> = None;
    for candidate in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| line.matches(candidate).count())
            .collect();
        let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        if mean < 1.0 {
            continue;
        }
        if counts.iter().any(|&c| (c as f64 - mean).abs() > 1.0) {
            continue;
        }
        if best.map(|(_, best_mean)| mean > best_mean).unwrap_or(true) {
            best = Some((candidate, mean));
        }
    }

    best.map(|(delimiter, _)| delimiter)
}

/// Checks the header row against the template, ignoring any leading blank
/// columns. Returns how many leading blanks to strip from every data row,
/// or None when the header doesn't match.
fn validate_header(cells: &[&str]) -> Option<usize> {
    let leading_blanks = cells.iter().take_while(|c| c.trim().is_empty()).count();

    let mut meaningful: Vec<&str> = cells[leading_blanks..].iter().map(|c| c.trim()).collect();
    while meaningful.last().map(|c| c.is_empty()).unwrap_or(false) {
        meaningful.pop();
    }

    if meaningful.len() != TEMPLATE_COLUMNS.len() {
        return None;
    }
    for (cell, expected) in meaningful.iter().zip(TEMPLATE_COLUMNS.iter()) {
        if !cell.eq_ignore_ascii_case(expected) {
            return None;
        }
    }
    Some(leading_blanks)
}

/// Maps free-form side text onto the closed enum. Substring matching keeps
/// "Bride's side" and "Team Groom" working; single letters are accepted as
/// shorthand.
pub fn normalize_side(raw: &str) -> Side {
    let lower = raw.trim().to_lowercase();
    if lower.is_empty() {
        return Side::Unknown;
    }
    if lower == "b" {
        return Side::Bride;
    }
    if lower == "g" {
        return Side::Groom;
    }
    let has_bride = lower.contains("bride");
    let has_groom = lower.contains("groom");
    if lower.contains("both") || (has_bride && has_groom) {
        return Side::Both;
    }
    if has_bride {
        return Side::Bride;
    }
    if has_groom {
        return Side::Groom;
    }
    Side::Unknown
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Name,Email,Phone,Side,Household ID";

    #[test]
    fn round_trip_of_valid_rows() {
        let text = format!(
            "{HEADER}\n\
             Jane Doe,jane@x.com,555-1111,Bride,hh1\n\
             John Roe,john@x.com,555-2222,Groom,hh1\n\
             Ada Byron,,,Both,"
        );
        let result = parse_guest_file(&text);

        assert!(result.success);
        assert_eq!(result.error, None);
        assert_eq!(result.guests.len(), 3);
        assert!(result.guests.iter().all(|g| g.errors.is_empty()));
        assert!(result.guests.iter().all(|g| g.warnings.is_empty()));
        assert!(result.unique_sides.is_empty());

        assert_eq!(result.guests[0].name, "Jane Doe");
        assert_eq!(result.guests[0].side, Side::Bride);
        assert_eq!(result.guests[0].household_id.as_deref(), Some("hh1"));
        assert_eq!(result.guests[2].side, Side::Both);
        assert_eq!(result.guests[2].email, None);
    }

    #[test]
    fn spec_scenario_two_rows() {
        let text = "Name,Email,Phone,Side,Household ID\nJane Doe,jane@x.com,555-1111,Bride,hh1\n,bad-email,,Family,";
        let result = parse_guest_file(text);

        assert!(result.success);
        assert_eq!(result.guests.len(), 2);

        let jane = &result.guests[0];
        assert!(jane.errors.is_empty());
        assert!(jane.warnings.is_empty());

        let nameless = &result.guests[1];
        assert_eq!(nameless.errors, vec!["Name is required".to_string()]);
        assert_eq!(nameless.warnings.len(), 1);
        assert!(!nameless.is_importable());
        assert_eq!(nameless.side, Side::Unknown);
        assert_eq!(nameless.raw_side.as_deref(), Some("Family"));

        assert_eq!(result.unique_sides, vec!["Family".to_string()]);
    }

    #[test]
    fn header_missing_a_column_is_rejected() {
        let result = parse_guest_file("Name,Email,Phone,Side\nJane,j@x.com,1,Bride");

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(TEMPLATE_MISMATCH_ERROR));
        assert!(result.guests.is_empty());
    }

    #[test]
    fn header_match_is_case_insensitive() {
        let result = parse_guest_file("name,EMAIL,Phone,side,HOUSEHOLD id\nJane,,,,");
        assert!(result.success);
        assert_eq!(result.guests.len(), 1);
    }

    #[test]
    fn wrong_column_order_is_rejected() {
        let result = parse_guest_file("Email,Name,Phone,Side,Household ID\nj@x.com,Jane,,,");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(TEMPLATE_MISMATCH_ERROR));
    }

    #[test]
    fn empty_input_is_its_own_error() {
        for text in ["", "   \n  \n"] {
            let result = parse_guest_file(text);
            assert!(!result.success);
            assert_eq!(result.error.as_deref(), Some(EMPTY_FILE_ERROR));
        }
    }

    #[test]
    fn free_text_name_list_is_rejected() {
        let result = parse_guest_file("Jane Doe\nJohn Roe\nAda Byron");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(TEMPLATE_MISMATCH_ERROR));
    }

    #[test]
    fn tab_and_semicolon_and_pipe_delimiters_are_detected() {
        for delimiter in ['\t', ';', '|'] {
            let header = HEADER.replace(',', &delimiter.to_string());
            let row: String = ["Jane", "j@x.com", "555", "Bride", "hh1"].join(&delimiter.to_string());
            let result = parse_guest_file(&format!("{header}\n{row}"));
            assert!(result.success, "delimiter {delimiter:?} should parse");
            assert_eq!(result.guests.len(), 1);
            assert_eq!(result.guests[0].side, Side::Bride);
        }
    }

    #[test]
    fn inconsistent_delimiter_counts_are_rejected() {
        let result = parse_guest_file("a,b\nc,d,e,f,g,h,i,j\nk,l\n");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(TEMPLATE_MISMATCH_ERROR));
    }

    #[test]
    fn leading_blank_columns_are_stripped_from_header_and_rows() {
        let text = ",,Name,Email,Phone,Side,Household ID\n,,Jane,j@x.com,555,Bride,hh1";
        let result = parse_guest_file(text);

        assert!(result.success);
        assert_eq!(result.guests.len(), 1);
        assert_eq!(result.guests[0].name, "Jane");
        assert_eq!(result.guests[0].household_id.as_deref(), Some("hh1"));
    }

    #[test]
    fn all_empty_rows_are_skipped_silently() {
        let text = format!("{HEADER}\nJane,,,,\n,,,,\n\nJohn,,,,");
        let result = parse_guest_file(&text);

        assert!(result.success);
        assert_eq!(result.guests.len(), 2);
    }

    #[test]
    fn bad_email_is_a_warning_not_an_error() {
        let text = format!("{HEADER}\nJane Doe,not-an-email,,,");
        let result = parse_guest_file(&text);

        let jane = &result.guests[0];
        assert!(jane.errors.is_empty());
        assert_eq!(jane.warnings.len(), 1);
        assert!(jane.is_importable());
    }

    #[test]
    fn side_normalization() {
        assert_eq!(normalize_side("Bride"), Side::Bride);
        assert_eq!(normalize_side("bride's side"), Side::Bride);
        assert_eq!(normalize_side("b"), Side::Bride);
        assert_eq!(normalize_side("Team Groom"), Side::Groom);
        assert_eq!(normalize_side("g"), Side::Groom);
        assert_eq!(normalize_side("Both"), Side::Both);
        assert_eq!(normalize_side("bride & groom"), Side::Both);
        assert_eq!(normalize_side(""), Side::Unknown);
        assert_eq!(normalize_side("Family"), Side::Unknown);
    }

    #[test]
    fn unique_sides_skips_recognized_and_literal_unknown() {
        let text = format!(
            "{HEADER}\n\
             A,,,Bride,\n\
             B,,,Family,\n\
             C,,,family,\n\
             D,,,Family,\n\
             E,,,unknown,\n\
             F,,,Friends,"
        );
        let result = parse_guest_file(&text);

        assert_eq!(
            result.unique_sides,
            vec!["Family".to_string(), "family".to_string(), "Friends".to_string()]
        );
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = format!("{HEADER}\nJane,j@x.com,555,Bride,hh1\n,,,Family,");
        assert_eq!(parse_guest_file(&text), parse_guest_file(&text));
    }
}
