//! Question cues and table shape signals shared by the deterministic fallbacks.
//!
//! Everything here is keyword matching over the question plus simple checks
//! on the current table. Cues are deliberately narrow: a missed cue costs an
//! extra step, a false cue can end reasoning early.
use crate::table::{Table, Value};
use regex::Regex;

/// Which end of an ordering the question asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Most,
    Least,
}

const MOST_WORDS: &[&str] = &[
    "most", "highest", "largest", "biggest", "greatest", "maximum", "max", "best",
];
const LEAST_WORDS: &[&str] = &[
    "least", "fewest", "lowest", "smallest", "minimum", "min", "worst",
];
const FREQUENCY_WORDS: &[&str] = &["common", "frequent", "frequently", "often", "popular"];
const AGGREGATION_WORDS: &[&str] = &[
    "most", "least", "fewest", "many", "count", "number", "highest", "lowest", "largest",
    "smallest", "biggest", "greatest", "maximum", "minimum", "max", "min", "best", "worst",
    "common", "frequent", "popular",
];
const NOT_ATTRIBUTES: &[&str] = &[
    "is", "was", "are", "were", "has", "had", "have", "did", "does", "do", "the", "a", "an",
    "of", "in", "on", "one", "ones", "row", "rows", "column", "columns", "table",
];
const NUMBER_WORDS: &[(&str, usize)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
];

/// Lowercased alphanumeric words in order.
pub fn words(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Superlative direction, if the question has one.
pub fn superlative(question: &str) -> Option<Direction> {
    let words = words(question);
    if words.iter().any(|word| MOST_WORDS.contains(&word.as_str())) {
        return Some(Direction::Most);
    }
    if words.iter().any(|word| LEAST_WORDS.contains(&word.as_str())) {
        return Some(Direction::Least);
    }
    None
}

/// Row limit implied by phrases like "top 3" or "first three".
pub fn row_limit(question: &str) -> Option<usize> {
    let pattern = Regex::new(
        r"(?i)\b(?:top|first|leading)\s+(\d+|one|two|three|four|five|six|seven|eight|nine|ten)\b",
    )
    .expect("regex for row limit phrases");
    let raw = pattern.captures(question)?.get(1)?.as_str().to_lowercase();
    let limit = raw.parse::<usize>().ok().or_else(|| {
        NUMBER_WORDS
            .iter()
            .find(|(word, _)| *word == raw)
            .map(|(_, value)| *value)
    })?;
    (limit > 0).then_some(limit)
}

/// Attribute nouns the question asks about ("what country", "per team").
pub fn attribute_mentions(question: &str) -> Vec<String> {
    let pattern = Regex::new(r"(?i)\b(?:what|which|each|per|every|by)\s+([a-z][a-z-]*)")
        .expect("regex for attribute mentions");
    let mut mentions = Vec::new();
    for cap in pattern.captures_iter(question) {
        let word = cap
            .get(1)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_default();
        if word.is_empty() || NOT_ATTRIBUTES.contains(&word.as_str()) {
            continue;
        }
        if !mentions.contains(&word) {
            mentions.push(word);
        }
    }
    mentions
}

/// True when `word` names `column`, ignoring case and a plural suffix.
pub fn names_column(word: &str, column: &str) -> bool {
    let word = word.to_lowercase();
    let column = column.to_lowercase();
    word == column
        || word.strip_suffix('s') == Some(column.as_str())
        || word.strip_suffix("es") == Some(column.as_str())
        || column.strip_suffix('s') == Some(word.as_str())
}

/// Columns named in the question, with the word position of each mention.
pub fn column_mentions(question: &str, table: &Table) -> Vec<(usize, String)> {
    let question_words = words(question);
    let mut mentions = Vec::new();
    for column in table.columns() {
        let column_words = words(column);
        if column_words.is_empty() || column_words.len() > question_words.len() {
            continue;
        }
        let last = column_words.len() - 1;
        for start in 0..=question_words.len() - column_words.len() {
            let matched = column_words.iter().enumerate().all(|(offset, part)| {
                let word = &question_words[start + offset];
                if offset == last {
                    names_column(word, part)
                } else {
                    word == part
                }
            });
            if matched {
                mentions.push((start, column.clone()));
            }
        }
    }
    mentions.sort();
    mentions
}

/// Word positions of aggregation keywords ("most", "how many", ...).
pub fn aggregation_positions(question: &str) -> Vec<usize> {
    words(question)
        .iter()
        .enumerate()
        .filter(|(_, word)| AGGREGATION_WORDS.contains(&word.as_str()))
        .map(|(idx, _)| idx)
        .collect()
}

/// Pick the mentioned column nearest to an aggregation keyword.
pub fn nearest_mention<F>(question: &str, table: &Table, accept: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let keywords = aggregation_positions(question);
    column_mentions(question, table)
        .into_iter()
        .filter(|(_, column)| accept(column))
        .min_by_key(|(pos, _)| {
            keywords
                .iter()
                .map(|keyword| keyword.abs_diff(*pos))
                .min()
                .unwrap_or(usize::MAX)
        })
        .map(|(_, column)| column)
}

/// Does the question ask which category occurs most or least often?
pub fn asks_frequency(question: &str, table: &Table) -> bool {
    let lower = question.to_lowercase();
    if lower.contains("how many") || lower.contains("number of") {
        return true;
    }
    let question_words = words(question);
    if question_words
        .iter()
        .any(|word| FREQUENCY_WORDS.contains(&word.as_str()))
    {
        return true;
    }
    // "most X" counts X unless X is itself a numeric column ("most points").
    question_words.iter().enumerate().any(|(idx, word)| {
        if !matches!(word.as_str(), "most" | "least" | "fewest") {
            return false;
        }
        match question_words.get(idx + 1) {
            Some(next) => !table
                .columns()
                .iter()
                .any(|column| names_column(next, column) && is_numeric_column(table, column)),
            None => false,
        }
    })
}

/// Every value in the column is numeric (and there is at least one row).
pub fn is_numeric_column(table: &Table, column: &str) -> bool {
    match table.column_values(column) {
        Some(values) if !values.is_empty() => values.iter().all(|value| value.as_f64().is_some()),
        _ => false,
    }
}

/// Some value of the column occurs more than once.
pub fn has_repeats(table: &Table, column: &str) -> bool {
    table.has_column(column) && table.distinct_count(column) < table.row_count()
}

pub fn is_count_name(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    lower == "count" || lower.ends_with(" count") || lower.ends_with("_count")
}

/// A count-style column: count-like name, numeric values, alongside other columns.
pub fn count_column(table: &Table) -> Option<String> {
    if table.column_count() < 2 {
        return None;
    }
    table
        .columns()
        .iter()
        .find(|column| is_count_name(column) && is_numeric_column(table, column))
        .cloned()
}

/// Row position holding the strictly largest (or smallest) value of `column`.
pub fn strict_extreme(table: &Table, column: &str, direction: Direction) -> Option<usize> {
    let values = table.column_values(column)?;
    let mut best: Option<(usize, f64)> = None;
    let mut tied = false;
    for (idx, value) in values.iter().enumerate() {
        let number = value.as_f64()?;
        match best {
            None => best = Some((idx, number)),
            Some((_, current)) => {
                let better = match direction {
                    Direction::Most => number > current,
                    Direction::Least => number < current,
                };
                if better {
                    best = Some((idx, number));
                    tied = false;
                } else if number == current {
                    tied = true;
                }
            }
        }
    }
    if tied {
        return None;
    }
    best.map(|(idx, _)| idx)
}

/// First row holding the largest (or smallest) value; ties go to the earliest row.
pub fn first_extreme(table: &Table, column: &str, direction: Direction) -> Option<usize> {
    let values = table.column_values(column)?;
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in values.iter().enumerate() {
        let Some(number) = value.as_f64() else {
            continue;
        };
        let better = match (best, direction) {
            (None, _) => true,
            (Some((_, current)), Direction::Most) => number > current,
            (Some((_, current)), Direction::Least) => number < current,
        };
        if better {
            best = Some((idx, number));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Parenthesized tokens extracted from the column where they occur most.
///
/// Returns the source column and one token per row (`None` when a row has none).
pub fn derived_tokens(table: &Table) -> Option<(String, Vec<Option<String>>)> {
    let pattern = Regex::new(r"\(([^()]+)\)").expect("regex for parenthesized tokens");
    let mut best: Option<(usize, String, Vec<Option<String>>)> = None;
    for column in table.columns() {
        let tokens: Vec<Option<String>> = table
            .rows()
            .iter()
            .map(|row| match row.get(column) {
                Some(Value::Text(text)) => pattern
                    .captures(text)
                    .and_then(|cap| cap.get(1))
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|token| !token.is_empty()),
                _ => None,
            })
            .collect();
        let hits = tokens.iter().filter(|token| token.is_some()).count();
        if hits == 0 {
            continue;
        }
        let better = match &best {
            Some((count, _, _)) => hits > *count,
            None => true,
        };
        if better {
            best = Some((hits, column.clone(), tokens));
        }
    }
    best.map(|(_, column, tokens)| (column, tokens))
}

/// An attribute the question asks about that is not a column yet.
pub fn missing_attribute(question: &str, table: &Table) -> Option<String> {
    attribute_mentions(question).into_iter().find(|word| {
        !table
            .columns()
            .iter()
            .any(|column| names_column(word, column) || names_column(column, word))
    })
}

/// "country" -> "Country".
pub fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUESTION: &str = "What country has the most cyclists in the top 3?";

    fn cyclists() -> Table {
        Table::from_grid(
            ["Rank", "Cyclist", "Country"],
            vec![
                vec![Value::int(1), Value::text("Alejandro (ESP)"), Value::text("ESP")],
                vec![Value::int(2), Value::text("Davide (ITA)"), Value::text("ITA")],
                vec![Value::int(3), Value::text("Paolo (ITA)"), Value::text("ITA")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn superlatives_and_limits() {
        assert_eq!(superlative(QUESTION), Some(Direction::Most));
        assert_eq!(superlative("Who had the lowest time?"), Some(Direction::Least));
        assert_eq!(superlative("Who won?"), None);
        assert_eq!(row_limit(QUESTION), Some(3));
        assert_eq!(row_limit("among the first five riders"), Some(5));
        assert_eq!(row_limit("top riders"), None);
    }

    #[test]
    fn attribute_mentions_skip_function_words() {
        assert_eq!(attribute_mentions(QUESTION), ["country"]);
        assert!(attribute_mentions("Which is the best?").is_empty());
    }

    #[test]
    fn column_mentions_tolerate_plurals() {
        let mentions = column_mentions(QUESTION, &cyclists());
        assert_eq!(
            mentions,
            vec![(1, "Country".to_string()), (5, "Cyclist".to_string())]
        );
    }

    #[test]
    fn nearest_mention_respects_filter() {
        let table = cyclists();
        let any = nearest_mention(QUESTION, &table, |_| true);
        assert_eq!(any.as_deref(), Some("Cyclist"));
        let grouped = nearest_mention(QUESTION, &table, |column| has_repeats(&table, column));
        assert_eq!(grouped.as_deref(), Some("Country"));
    }

    #[test]
    fn frequency_cue_ignores_numeric_targets() {
        let table = Table::from_grid(
            ["Team", "Points"],
            vec![vec![Value::text("Red"), Value::int(3)]],
        )
        .unwrap();
        assert!(!asks_frequency("Which team scored the most points?", &table));
        assert!(asks_frequency("Which team has the most players?", &table));
        assert!(asks_frequency("How many teams are there?", &table));
    }

    #[test]
    fn strict_extreme_requires_unique_winner() {
        let table = Table::from_grid(
            ["Country", "Count"],
            vec![
                vec![Value::text("ESP"), Value::int(1)],
                vec![Value::text("ITA"), Value::int(2)],
                vec![Value::text("FRA"), Value::int(2)],
            ],
        )
        .unwrap();
        assert_eq!(strict_extreme(&table, "Count", Direction::Most), None);
        assert_eq!(strict_extreme(&table, "Count", Direction::Least), Some(0));
        assert_eq!(first_extreme(&table, "Count", Direction::Most), Some(1));
    }

    #[test]
    fn derived_tokens_use_parenthesized_text() {
        let (column, tokens) = derived_tokens(&cyclists()).expect("tokens");
        assert_eq!(column, "Cyclist");
        assert_eq!(tokens[1].as_deref(), Some("ITA"));
    }

    #[test]
    fn missing_attribute_checks_columns() {
        let table = Table::from_grid(["Rank", "Cyclist"], Vec::new()).unwrap();
        assert_eq!(missing_attribute(QUESTION, &table).as_deref(), Some("country"));
        assert_eq!(missing_attribute(QUESTION, &cyclists()), None);
    }

    #[test]
    fn count_column_needs_a_companion() {
        assert_eq!(count_column(&cyclists()), None);
        let single = Table::from_grid(["Count"], vec![vec![Value::int(1)]]).unwrap();
        assert_eq!(count_column(&single), None);
    }
}
