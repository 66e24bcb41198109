use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use super::score::Score;

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, data: &Value) -> Result<Value>;
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    // None means anonymous; the registry assigns evaluator_{n}.
    fn name(&self) -> Option<&str> {
        None
    }

    async fn evaluate(&self, output: &Value, target: &Value) -> Result<Score>;
}

pub struct FnExecutor<F> {
    f: F,
}

pub fn executor_fn<F, Fut>(f: F) -> FnExecutor<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    FnExecutor { f }
}

#[async_trait]
impl<F, Fut> Executor for FnExecutor<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn execute(&self, data: &Value) -> Result<Value> {
        (self.f)(data.clone()).await
    }
}

pub struct BlockingExecutor<F> {
    f: Arc<F>,
}

pub fn blocking_executor<F>(f: F) -> BlockingExecutor<F>
where
    F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
{
    BlockingExecutor { f: Arc::new(f) }
}

#[async_trait]
impl<F> Executor for BlockingExecutor<F>
where
    F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
{
    async fn execute(&self, data: &Value) -> Result<Value> {
        let f = Arc::clone(&self.f);
        let data = data.clone();
        tokio::task::spawn_blocking(move || f(data))
            .await
            .context("blocking executor panicked")?
    }
}

pub struct FnEvaluator<F> {
    name: Option<String>,
    f: F,
}

pub fn evaluator_fn<F, Fut, S>(f: F) -> FnEvaluator<F>
where
    F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S>> + Send + 'static,
    S: Into<Score> + Send + 'static,
{
    FnEvaluator { name: None, f }
}

impl<F> FnEvaluator<F> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[async_trait]
impl<F, Fut, S> Evaluator for FnEvaluator<F>
where
    F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S>> + Send + 'static,
    S: Into<Score> + Send + 'static,
{
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn evaluate(&self, output: &Value, target: &Value) -> Result<Score> {
        (self.f)(output.clone(), target.clone()).await.map(Into::into)
    }
}

pub struct BlockingEvaluator<F> {
    name: Option<String>,
    f: Arc<F>,
}

pub fn blocking_evaluator<F, S>(f: F) -> BlockingEvaluator<F>
where
    F: Fn(&Value, &Value) -> Result<S> + Send + Sync + 'static,
    S: Into<Score> + Send + 'static,
{
    BlockingEvaluator {
        name: None,
        f: Arc::new(f),
    }
}

impl<F> BlockingEvaluator<F> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[async_trait]
impl<F, S> Evaluator for BlockingEvaluator<F>
where
    F: Fn(&Value, &Value) -> Result<S> + Send + Sync + 'static,
    S: Into<Score> + Send + 'static,
{
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn evaluate(&self, output: &Value, target: &Value) -> Result<Score> {
        let f = Arc::clone(&self.f);
        let output = output.clone();
        let target = target.clone();
        tokio::task::spawn_blocking(move || f(&output, &target).map(Into::into))
            .await
            .context("blocking evaluator panicked")?
    }
}

pub struct ExactMatch;

#[async_trait]
impl Evaluator for ExactMatch {
    fn name(&self) -> Option<&str> {
        Some("exact_match")
    }

    async fn evaluate(&self, output: &Value, target: &Value) -> Result<Score> {
        Ok(Score::from(output == target))
    }
}
