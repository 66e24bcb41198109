use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub type Scores = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Scalar(f64),
    Structured(BTreeMap<String, f64>),
}

impl Score {
    pub fn merge_into(self, evaluator_name: &str, scores: &mut Scores) {
        match self {
            Score::Scalar(value) => {
                scores.insert(evaluator_name.to_string(), value);
            }
            Score::Structured(values) => scores.extend(values),
        }
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        Score::Scalar(value)
    }
}

impl From<f32> for Score {
    fn from(value: f32) -> Self {
        Score::Scalar(value as f64)
    }
}

impl From<i64> for Score {
    fn from(value: i64) -> Self {
        Score::Scalar(value as f64)
    }
}

impl From<i32> for Score {
    fn from(value: i32) -> Self {
        Score::Scalar(value as f64)
    }
}

impl From<bool> for Score {
    fn from(value: bool) -> Self {
        Score::Scalar(if value { 1.0 } else { 0.0 })
    }
}

impl From<BTreeMap<String, f64>> for Score {
    fn from(values: BTreeMap<String, f64>) -> Self {
        Score::Structured(values)
    }
}

impl From<HashMap<String, f64>> for Score {
    fn from(values: HashMap<String, f64>) -> Self {
        Score::Structured(values.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, f64); N]> for Score {
    fn from(values: [(&str, f64); N]) -> Self {
        Score::Structured(values.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResultDatapoint {
    pub executor_output: Value,
    pub data: Value,
    pub target: Value,
    pub scores: Scores,
}
