//! Job orchestration: dispatch, local overrides, intent extraction,
//! scenario execution and the background job runner.

pub mod dispatcher;
pub mod error;
pub mod fetch;
pub mod intent;
pub mod local;
pub mod registry;
pub mod router;
pub mod runner;
pub mod store;
pub mod text_gen;
pub mod tools;
pub mod workflow;

pub use dispatcher::{Dispatcher, OperationDispatcher};
pub use error::{DispatchError, JobError, LocalTaskError, StoreError, WorkflowError};
pub use registry::ScenarioRegistry;
pub use runner::{JobKind, JobRunner};
pub use store::JobStore;
pub use workflow::WorkflowEngine;
