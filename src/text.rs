//! Pulling dates and order identifiers out of page text.

use std::sync::LazyLock;

use regex::Regex;

/// Folder name used when page 1 carries no date.
pub const UNDATED_FOLDER: &str = "sin_fecha";

/// Sale references, as printed on the labels: `Venta: S123456`.
static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Venta:\s*(S\d+)").expect("failed to compile regex")
});

/// Day/month/year dates with 1-2 digit day and month.
static DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").expect("failed to compile regex")
});

/// Every identifier in `text`, in the order it appears.
pub fn extract_identifiers(text: &str) -> Vec<String> {
    IDENTIFIER_REGEX
        .captures_iter(text)
        .map(|caps| caps[1].to_owned())
        .collect()
}

/// The first `D/M/YYYY` date in `text`, as `YYYY-MM-DD`.
pub fn extract_date(text: &str) -> Option<String> {
    let caps = DATE_REGEX.captures(text)?;
    Some(format!("{}-{:0>2}-{:0>2}", &caps[3], &caps[2], &caps[1]))
}

/// The output folder name for a document whose first page reads `text`.
pub fn folder_name(first_page_text: &str) -> String {
    extract_date(first_page_text).unwrap_or_else(|| UNDATED_FOLDER.to_owned())
}
