//! Normalized operation fingerprints for loop detection.
//!
//! A fingerprint hashes the operation kind plus a canonical JSON rendering of
//! its arguments with object keys sorted. Strings are hashed exactly as given,
//! since column names may differ only in surrounding whitespace. Two proposals
//! with the same fingerprint would produce the same step.
use crate::ops::Operation;
use crate::util::sha256_hex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(operation: &Operation) -> Self {
        let arguments = serde_json::to_value(operation)
            .ok()
            .and_then(|value| value.get("arguments").cloned())
            .unwrap_or(serde_json::Value::Null);
        let canonical = canonical_json(&arguments);
        let material = format!("{}|{}", operation.kind(), canonical);
        Self(sha256_hex(material.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading hex digits for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(&String, &serde_json::Value)> = map.iter().collect();
            entries.sort_by(|left, right| left.0.cmp(right.0));
            let body = entries
                .into_iter()
                .map(|(key, value)| format!("{key:?}:{}", canonical_json(value)))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{body}}}")
        }
        serde_json::Value::Array(items) => format!(
            "[{}]",
            items.iter().map(canonical_json).collect::<Vec<_>>().join(",")
        ),
        serde_json::Value::String(text) => format!("{text:?}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Table, Value};

    #[test]
    fn identical_operations_share_a_fingerprint() {
        assert_eq!(
            Fingerprint::of(&Operation::group_by("Country")),
            Fingerprint::of(&Operation::group_by("Country"))
        );
    }

    #[test]
    fn whitespace_in_column_names_is_significant() {
        let table = Table::from_grid(
            ["Rank", " Rank"],
            vec![
                vec![Value::int(1), Value::int(2)],
                vec![Value::int(2), Value::int(1)],
            ],
        )
        .unwrap();
        let plain = Operation::sort_by("Rank", false);
        let padded = Operation::sort_by(" Rank", false);
        assert_ne!(plain.apply(&table).unwrap(), padded.apply(&table).unwrap());
        assert_ne!(Fingerprint::of(&plain), Fingerprint::of(&padded));
    }

    #[test]
    fn arguments_and_kind_both_matter() {
        let rows = Fingerprint::of(&Operation::select_row(vec![1, 2]));
        assert_ne!(rows, Fingerprint::of(&Operation::select_row(vec![2, 1])));
        assert_ne!(
            Fingerprint::of(&Operation::sort_by("Rank", true)),
            Fingerprint::of(&Operation::sort_by("Rank", false))
        );
        assert_ne!(
            Fingerprint::of(&Operation::group_by("Rank")),
            Fingerprint::of(&Operation::sort_by("Rank", true))
        );
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let left: serde_json::Value = serde_json::from_str(r#"{"b":1,"a":["x"]}"#).unwrap();
        let right: serde_json::Value = serde_json::from_str(r#"{"a":["x"],"b":1}"#).unwrap();
        assert_eq!(canonical_json(&left), canonical_json(&right));
        let padded: serde_json::Value = serde_json::from_str(r#"{"a":[" x "],"b":1}"#).unwrap();
        assert_ne!(canonical_json(&left), canonical_json(&padded));
    }
}
