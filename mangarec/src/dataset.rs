//! Parsing of the delimited item feature dataset.
//!
//! The dataset is a header row followed by one row per item:
//!
//! ```text
//! id,title,average_score,<other>,Action,Comedy,...,4-koma,f1,f2,...
//! ```
//!
//! Columns from `genre_start` up to the sentinel column are binary genre
//! flags. The sentinel column and everything after it are numeric features.
//! Bad rows are recorded as [`RowIssue`]s and skipped; only a dataset with no
//! usable rows at all is an error.

use std::collections::{BTreeSet, HashMap};

use crate::error::{RecError, Result};
use crate::model::{ItemFeatures, ItemId};

/// Column layout of the feature dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetLayout {
    pub delimiter: char,
    pub id_column: usize,
    pub title_column: usize,
    pub score_column: usize,
    /// First genre flag column.
    pub genre_start: usize,
    /// Header name of the first numeric feature column.
    pub sentinel: String,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            delimiter: ',',
            id_column: 0,
            title_column: 1,
            score_column: 2,
            genre_start: 4,
            sentinel: "4-koma".to_string(),
        }
    }
}

/// A row that was skipped or adjusted during parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIssue {
    /// 1-based line number in the raw dataset.
    pub line: usize,
    pub reason: String,
}

/// Output of [`parse_dataset`].
#[derive(Debug, Clone, Default)]
pub struct ParsedDataset {
    pub items: Vec<ItemFeatures>,
    pub issues: Vec<RowIssue>,
}

/// Parse a raw dataset into item features.
///
/// A later row with an already-seen id replaces the earlier one.
///
/// # Errors
///
/// Returns [`RecError::Config`] if the dataset has no data rows, the header
/// lacks the sentinel column, or no row could be parsed.
pub fn parse_dataset(raw: &str, layout: &DatasetLayout) -> Result<ParsedDataset> {
    let mut lines = raw.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());
    let Some((_, header)) = lines.next() else {
        return Err(RecError::Config("dataset is empty".to_string()));
    };

    let headers: Vec<&str> = header.split(layout.delimiter).map(str::trim).collect();
    let sentinel = headers.iter().position(|h| *h == layout.sentinel).ok_or_else(|| {
        RecError::Config(format!("dataset header lacks the '{}' column", layout.sentinel))
    })?;
    if layout.genre_start > sentinel {
        return Err(RecError::Config(format!(
            "genre columns start at {} but the '{}' column is at {sentinel}",
            layout.genre_start, layout.sentinel
        )));
    }
    let genre_headers = &headers[layout.genre_start..sentinel];

    let mut parsed = ParsedDataset::default();
    let mut positions: HashMap<ItemId, usize> = HashMap::new();
    let mut dimension: Option<usize> = None;
    let mut rows = 0usize;

    for (index, line) in lines {
        rows += 1;
        let line_no = index + 1;
        let values: Vec<&str> = line.split(layout.delimiter).map(str::trim).collect();
        let mut issue = |reason: String| parsed.issues.push(RowIssue { line: line_no, reason });

        let raw_id = values.get(layout.id_column).copied().unwrap_or_default();
        let id = match raw_id.parse::<i64>() {
            Ok(id) if id > 0 => id as ItemId,
            _ => {
                issue(format!("invalid id '{raw_id}'"));
                continue;
            }
        };

        let features: Vec<f64> = values
            .get(sentinel..)
            .unwrap_or_default()
            .iter()
            .map(|v| v.parse::<f64>().ok().filter(|f| f.is_finite()).unwrap_or(0.0))
            .collect();
        if features.is_empty() {
            issue(format!("no features for id {id}"));
            continue;
        }
        match dimension {
            Some(dim) if dim != features.len() => {
                issue(format!(
                    "id {id} has {} features, expected {dim}",
                    features.len()
                ));
                continue;
            }
            Some(_) => {}
            None => dimension = Some(features.len()),
        }

        let raw_score = values.get(layout.score_column).copied().unwrap_or_default();
        let average_score = match raw_score.parse::<f64>() {
            Ok(score) if (0.0..=100.0).contains(&score) => score,
            _ => {
                issue(format!("invalid score '{raw_score}' for id {id}, using 0"));
                0.0
            }
        };

        let genres: BTreeSet<String> = genre_headers
            .iter()
            .enumerate()
            .filter(|(offset, _)| values.get(layout.genre_start + offset) == Some(&"1"))
            .map(|(_, name)| name.to_string())
            .collect();

        let title = match values.get(layout.title_column) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("Unknown Title {id}"),
        };

        let item = ItemFeatures { id, title, average_score, genres, features };
        match positions.get(&id) {
            Some(&at) => {
                issue(format!("duplicate id {id}, replacing earlier row"));
                parsed.items[at] = item;
            }
            None => {
                positions.insert(id, parsed.items.len());
                parsed.items.push(item);
            }
        }
    }

    if rows == 0 {
        return Err(RecError::Config("dataset has a header but no rows".to_string()));
    }
    if parsed.items.is_empty() {
        return Err(RecError::Config(format!(
            "no valid items loaded ({} rows rejected)",
            parsed.issues.len()
        )));
    }
    Ok(parsed)
}
