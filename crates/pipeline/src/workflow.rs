//! Scenario execution.
//!
//! Steps run strictly in declared order against a variable context seeded
//! with the caller's inputs. Each finished step adds its result to the
//! context under its id, so later templates can refer to
//! `{{step_id.field}}`. The first failing step aborts the scenario.

use std::sync::Arc;

use async_trait::async_trait;
use mediaflow_core::scenario::{Scenario, Step, StepKind};
use mediaflow_core::template::{resolve_string, resolve_value};
use mediaflow_core::types::Params;
use serde_json::{json, Value};

use crate::dispatcher::OperationDispatcher;
use crate::error::WorkflowError;
use crate::local::LocalExecutor;
use crate::registry::ScenarioRegistry;
use crate::text_gen::TextGenerator;

/// Notified before each step runs, e.g. to report job progress.
#[async_trait]
pub trait StepObserver: Send + Sync {
    async fn step_started(&self, index: usize, total: usize, step: &Step);
}

/// Observer that ignores every notification.
pub struct NoopObserver;

#[async_trait]
impl StepObserver for NoopObserver {
    async fn step_started(&self, _index: usize, _total: usize, _step: &Step) {}
}

pub struct WorkflowEngine {
    registry: Arc<ScenarioRegistry>,
    dispatcher: Arc<dyn OperationDispatcher>,
    local: LocalExecutor,
    text: Option<Arc<dyn TextGenerator>>,
}

impl WorkflowEngine {
    pub fn new(
        registry: Arc<ScenarioRegistry>,
        dispatcher: Arc<dyn OperationDispatcher>,
        local: LocalExecutor,
        text: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            local,
            text,
        }
    }

    pub fn registry(&self) -> &Arc<ScenarioRegistry> {
        &self.registry
    }

    pub async fn execute(&self, scenario_id: &str, inputs: Params) -> Result<Params, WorkflowError> {
        self.execute_observed(scenario_id, inputs, &NoopObserver).await
    }

    /// Run a registered scenario. Returns the results keyed by step id.
    pub async fn execute_observed(
        &self,
        scenario_id: &str,
        inputs: Params,
        observer: &dyn StepObserver,
    ) -> Result<Params, WorkflowError> {
        let scenario = self
            .registry
            .get(scenario_id)
            .await
            .ok_or_else(|| WorkflowError::ScenarioNotFound(scenario_id.to_string()))?;
        self.run(scenario_id, &scenario, inputs, observer).await
    }

    pub async fn run(
        &self,
        scenario_id: &str,
        scenario: &Scenario,
        inputs: Params,
        observer: &dyn StepObserver,
    ) -> Result<Params, WorkflowError> {
        let mut context = inputs;
        let mut results = Params::new();
        let total = scenario.steps.len();

        for (index, step) in scenario.steps.iter().enumerate() {
            tracing::info!(
                scenario = scenario_id,
                step = %step.id,
                step_type = step.kind.type_name(),
                "Executing step"
            );
            observer.step_started(index, total, step).await;

            let result = self.run_step(step, &context).await.map_err(|message| {
                tracing::error!(scenario = scenario_id, step = %step.id, error = %message, "Step failed");
                WorkflowError::StepFailed {
                    step_id: step.id.clone(),
                    message,
                }
            })?;

            context.insert(step.id.clone(), result.clone());
            results.insert(step.id.clone(), result);
            tracing::info!(scenario = scenario_id, step = %step.id, "Step completed");
        }

        Ok(results)
    }

    async fn run_step(&self, step: &Step, context: &Params) -> Result<Value, String> {
        let params = resolve_value(&step.params, context);

        match &step.kind {
            StepKind::RemoteCall { endpoint } => {
                let params = params.as_object().cloned().unwrap_or_default();
                self.dispatcher
                    .call_remote(endpoint, params)
                    .await
                    .map_err(|e| e.to_string())
            }
            StepKind::TextTask { prompt } => {
                let generator = self
                    .text
                    .as_ref()
                    .ok_or_else(|| "text generation is not configured".to_string())?;
                let prompt = match resolve_string(prompt, context) {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                let text = generator.generate(&prompt, false).await.map_err(|e| e.to_string())?;
                Ok(json!({ "text": text }))
            }
            StepKind::LocalTask { function } => self
                .local
                .run_function(*function, params)
                .await
                .map_err(|e| e.to_string()),
        }
    }
}
