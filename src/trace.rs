use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

pub const CURRENT_TRACING_VERSION: &str = "0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanType {
    #[default]
    Default,
    Llm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub template_name: String,
    pub timestamp: DateTime<Utc>,
    pub span_id: Uuid,
    #[serde(default)]
    pub value: Option<EventValue>,
}

impl Event {
    pub fn new(
        name: impl Into<String>,
        span_id: Uuid,
        timestamp: Option<DateTime<Utc>>,
        value: Option<EventValue>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            template_name: name.into(),
            timestamp: timestamp.unwrap_or_else(Utc::now),
            span_id,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateEvent {
    pub name: String,
    pub evaluator: String,
    pub data: Map<String, Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl EvaluateEvent {
    pub fn new(
        name: impl Into<String>,
        evaluator: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            evaluator: evaluator.into(),
            data,
            timestamp: Some(Utc::now()),
            env: HashMap::new(),
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub version: String,
    pub span_type: SpanType,
    pub id: Uuid,
    pub trace_id: Uuid,
    #[serde(default)]
    pub parent_span_id: Option<Uuid>,
    pub name: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub evaluate_events: Vec<EvaluateEvent>,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// Maps merge and lists append unless `override_existing` is set.
#[derive(Debug, Clone, Default)]
pub struct SpanUpdate {
    pub end_time: Option<DateTime<Utc>>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub metadata: Option<Map<String, Value>>,
    pub attributes: Option<Map<String, Value>>,
    pub evaluate_events: Option<Vec<EvaluateEvent>>,
    pub events: Option<Vec<Event>>,
    pub override_existing: bool,
}

impl Span {
    pub fn new(name: impl Into<String>, trace_id: Uuid) -> Self {
        Self {
            version: CURRENT_TRACING_VERSION.to_string(),
            span_type: SpanType::Default,
            id: Uuid::new_v4(),
            trace_id,
            parent_span_id: None,
            name: name.into(),
            start_time: Utc::now(),
            end_time: None,
            attributes: Map::new(),
            input: None,
            output: None,
            metadata: Map::new(),
            evaluate_events: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut span = Self::new(name, self.trace_id);
        span.parent_span_id = Some(self.id);
        span
    }

    pub fn with_type(mut self, span_type: SpanType) -> Self {
        self.span_type = span_type;
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn update(&mut self, update: SpanUpdate) {
        self.end_time = Some(update.end_time.unwrap_or_else(Utc::now));
        self.input = update.input;
        self.output = update.output;

        if update.override_existing {
            self.metadata = update.metadata.unwrap_or_default();
            self.attributes = update.attributes.unwrap_or_default();
            self.evaluate_events = update.evaluate_events.unwrap_or_default();
            self.events = update.events.unwrap_or_default();
        } else {
            self.metadata.extend(update.metadata.unwrap_or_default());
            self.attributes.extend(update.attributes.unwrap_or_default());
            self.evaluate_events
                .extend(update.evaluate_events.unwrap_or_default());
            self.events.extend(update.events.unwrap_or_default());
        }
    }

    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn event(&mut self, name: impl Into<String>, value: Option<EventValue>) -> &Event {
        self.events.push(Event::new(name, self.id, None, value));
        &self.events[self.events.len() - 1]
    }

    pub fn add_evaluate_event(&mut self, event: EvaluateEvent) {
        self.evaluate_events.push(event);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub id: Uuid,
    pub version: String,
    pub success: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Trace {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            version: CURRENT_TRACING_VERSION.to_string(),
            success: true,
            user_id: None,
            session_id: None,
            release: None,
            metadata: Map::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    pub fn span(&self, name: impl Into<String>) -> Span {
        Span::new(name, self.id)
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceRecord {
    Span(Box<Span>),
    Trace(Trace),
}

impl From<Span> for TraceRecord {
    fn from(span: Span) -> Self {
        TraceRecord::Span(Box::new(span))
    }
}

impl From<Trace> for TraceRecord {
    fn from(trace: Trace) -> Self {
        TraceRecord::Trace(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_span_wire_shape() {
        let trace = Trace::new();
        let span = trace.span("llm-call").with_type(SpanType::Llm);
        let value = serde_json::to_value(&span).unwrap();
        assert_eq!(value["spanType"], "LLM");
        assert_eq!(value["traceId"], json!(trace.id.to_string()));
        assert_eq!(value["version"], CURRENT_TRACING_VERSION);
        assert!(value["endTime"].is_null());
        assert_eq!(value["events"], json!([]));
    }

    #[test]
    fn test_child_span_links_parent() {
        let root = Span::new("root", Uuid::new_v4());
        let child = root.child("step");
        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.parent_span_id, Some(root.id));
    }

    #[test]
    fn test_update_merges_by_default() {
        let mut span = Span::new("s", Uuid::new_v4());
        span.metadata = map(json!({ "a": 1, "b": 2 }));
        span.event("first", None);

        span.update(SpanUpdate {
            output: Some(json!("out")),
            metadata: Some(map(json!({ "b": 3, "c": 4 }))),
            events: Some(vec![Event::new("second", span.id, None, None)]),
            ..Default::default()
        });

        assert!(span.is_ended());
        assert_eq!(span.output, Some(json!("out")));
        assert_eq!(Value::Object(span.metadata.clone()), json!({ "a": 1, "b": 3, "c": 4 }));
        assert_eq!(span.events.len(), 2);
    }

    #[test]
    fn test_update_override_replaces() {
        let mut span = Span::new("s", Uuid::new_v4()).with_input(json!("in"));
        span.metadata = map(json!({ "a": 1 }));
        span.attributes = map(json!({ "x": true }));
        span.event("first", Some(EventValue::Int(1)));

        span.update(SpanUpdate {
            metadata: Some(map(json!({ "z": 0 }))),
            override_existing: true,
            ..Default::default()
        });

        assert_eq!(Value::Object(span.metadata.clone()), json!({ "z": 0 }));
        assert!(span.attributes.is_empty());
        assert!(span.events.is_empty());
        assert!(span.input.is_none());
    }

    #[test]
    fn test_event_values_untagged() {
        let span_id = Uuid::new_v4();
        let event = Event::new("rating", span_id, None, Some(EventValue::Float(4.5)));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["templateName"], "rating");
        assert_eq!(value["value"], json!(4.5));
        assert_eq!(value["spanId"], json!(span_id.to_string()));

        let flag: EventValue = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(flag, EventValue::Bool(true));
        let count: EventValue = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(count, EventValue::Int(3));
    }

    #[test]
    fn test_trace_record_serializes_inner() {
        let trace = Trace::new().with_session("s-1").with_user("u-1");
        let records: Vec<TraceRecord> = vec![trace.span("a").into(), trace.clone().into()];
        let value = serde_json::to_value(&records).unwrap();
        assert_eq!(value[0]["name"], "a");
        assert_eq!(value[1]["sessionId"], "s-1");
        assert_eq!(value[1]["success"], true);
    }
}
