use std::sync::Arc;

use super::callable::Evaluator;

#[derive(Clone)]
pub struct NamedEvaluator {
    pub name: String,
    pub evaluator: Arc<dyn Evaluator>,
}

#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    entries: Vec<NamedEvaluator>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, evaluator: Arc<dyn Evaluator>) -> &str {
        let position = self.entries.len() + 1;
        let name = match evaluator.name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("evaluator_{}", position),
        };
        self.entries.push(NamedEvaluator { name, evaluator });
        &self.entries[position - 1].name
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedEvaluator> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Arc<dyn Evaluator>> for EvaluatorRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Evaluator>>>(iter: I) -> Self {
        let mut registry = Self::new();
        for evaluator in iter {
            registry.register(evaluator);
        }
        registry
    }
}
