use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid datapoint record at position {position}: {reason}")]
    InvalidRecord { position: usize, reason: String },

    #[error("dataset provider error: {0:#}")]
    Provider(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDatapoint {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub target: Value,
}

impl EvaluationDatapoint {
    pub fn new(data: Value, target: Value) -> Self {
        Self { data, target }
    }

    pub fn from_record(position: usize, record: Value) -> Result<Self, DatasetError> {
        if !record.is_object() {
            return Err(DatasetError::InvalidRecord {
                position,
                reason: format!("expected an object, got {}", kind_of(&record)),
            });
        }
        serde_json::from_value(record).map_err(|e| DatasetError::InvalidRecord {
            position,
            reason: e.to_string(),
        })
    }
}

pub fn datapoints_from_records(
    records: impl IntoIterator<Item = Value>,
) -> Result<Vec<EvaluationDatapoint>, DatasetError> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| EvaluationDatapoint::from_record(i, record))
        .collect()
}

pub fn load_datapoints(path: &Path) -> Result<Vec<EvaluationDatapoint>, DatasetError> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset file {}", path.display()))
        .map_err(DatasetError::Provider)?;

    if text.trim_start().starts_with('[') {
        let records: Vec<Value> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {} as a JSON array", path.display()))
            .map_err(DatasetError::Provider)?;
        return datapoints_from_records(records);
    }

    text.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            let record: Value =
                serde_json::from_str(line).map_err(|e| DatasetError::InvalidRecord {
                    position: i,
                    reason: e.to_string(),
                })?;
            EvaluationDatapoint::from_record(i, record)
        })
        .collect()
}

/// `slice` clamps its bounds to `[0, len)` instead of failing.
pub trait EvaluationDataset: Send + Sync {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Result<EvaluationDatapoint, DatasetError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slice(&self, start: i64, end: i64) -> Result<Vec<EvaluationDatapoint>, DatasetError> {
        let len = self.len();
        let start = start.max(0) as usize;
        let end = end.clamp(0, i64::try_from(len).unwrap_or(i64::MAX)) as usize;
        (start..end).map(|i| self.get(i)).collect()
    }
}

impl EvaluationDataset for Vec<EvaluationDatapoint> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Result<EvaluationDatapoint, DatasetError> {
        self.as_slice()
            .get(index)
            .cloned()
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.as_slice().len(),
            })
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(n: usize) -> Vec<EvaluationDatapoint> {
        (0..n)
            .map(|i| EvaluationDatapoint::new(json!({ "i": i }), json!(i * 10)))
            .collect()
    }

    struct Squares {
        n: usize,
    }

    impl EvaluationDataset for Squares {
        fn len(&self) -> usize {
            self.n
        }

        fn get(&self, index: usize) -> Result<EvaluationDatapoint, DatasetError> {
            if index >= self.n {
                return Err(DatasetError::IndexOutOfRange { index, len: self.n });
            }
            Ok(EvaluationDatapoint::new(json!(index), json!(index * index)))
        }
    }

    #[test]
    fn test_get_out_of_range() {
        let ds = sample(3);
        assert_eq!(EvaluationDataset::get(&ds, 2).unwrap().target, json!(20));
        let err = EvaluationDataset::get(&ds, 3).unwrap_err();
        assert!(matches!(err, DatasetError::IndexOutOfRange { index: 3, len: 3 }));
    }

    #[test]
    fn test_slice_clamps_bounds() {
        let ds = sample(4);
        let all = ds.slice(-5, 100).unwrap();
        assert_eq!(all, ds);

        let tail = ds.slice(2, 10).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].data, json!({ "i": 2 }));

        assert!(ds.slice(3, 1).unwrap().is_empty());
        assert!(ds.slice(10, 20).unwrap().is_empty());
        assert!(ds.slice(-3, -1).unwrap().is_empty());
    }

    #[test]
    fn test_slice_on_external_provider() {
        let ds = Squares { n: 5 };
        let window = ds.slice(-1, 3).unwrap();
        let targets: Vec<_> = window.iter().map(|p| p.target.clone()).collect();
        assert_eq!(targets, vec![json!(0), json!(1), json!(4)]);
        assert_eq!(ds.slice(4, 9).unwrap().len(), 1);
        assert!(ds.get(5).is_err());
    }

    #[test]
    fn test_records_coerced() {
        let points = datapoints_from_records(vec![
            json!({ "data": { "q": "2+2" }, "target": "4" }),
            json!({ "data": "only data" }),
        ])
        .unwrap();
        assert_eq!(points[0].data, json!({ "q": "2+2" }));
        assert_eq!(points[1].target, Value::Null);
    }

    #[test]
    fn test_load_json_array_and_lines() {
        let dir = tempfile::tempdir().unwrap();

        let array = dir.path().join("points.json");
        std::fs::write(&array, r#"[{"data": 1, "target": 2}, {"data": 3, "target": 4}]"#).unwrap();
        let points = load_datapoints(&array).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1], EvaluationDatapoint::new(json!(3), json!(4)));

        let lines = dir.path().join("points.jsonl");
        std::fs::write(&lines, "{\"data\": \"a\"}\n\n{\"data\": \"b\", \"target\": \"b\"}\n").unwrap();
        let points = load_datapoints(&lines).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].target, json!("b"));

        let broken = dir.path().join("broken.jsonl");
        std::fs::write(&broken, "{\"data\": 1}\n\n\nnot json\n").unwrap();
        let err = load_datapoints(&broken).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidRecord { position: 1, .. }));

        let bad_array = dir.path().join("bad.json");
        std::fs::write(&bad_array, r#"[{"data": 1}, 7]"#).unwrap();
        let err = load_datapoints(&bad_array).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidRecord { position: 1, .. }));

        let missing = load_datapoints(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, DatasetError::Provider(_)));
    }

    #[test]
    fn test_invalid_records_rejected() {
        let err = datapoints_from_records(vec![json!({ "data": 1 }), json!([1, 2])]).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidRecord { position: 1, .. }));

        let err = datapoints_from_records(vec![json!({ "data": 1 }), json!(null)]).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidRecord { position: 1, .. }));
    }

    #[test]
    fn test_extra_record_keys_dropped() {
        let points = datapoints_from_records(vec![json!({
            "data": { "q": 1 },
            "target": { "a": 2 },
            "id": "dp-1",
            "createdAt": "2024-01-01"
        })])
        .unwrap();
        assert_eq!(
            points,
            vec![EvaluationDatapoint::new(json!({ "q": 1 }), json!({ "a": 2 }))]
        );
        let round = serde_json::to_value(&points[0]).unwrap();
        assert_eq!(round, json!({ "data": { "q": 1 }, "target": { "a": 2 } }));
    }
}
