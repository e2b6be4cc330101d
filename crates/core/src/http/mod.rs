//! Resilient HTTP request handling

pub mod interceptor;
pub mod pipeline;
pub mod recovery;

pub use interceptor::RequestLifecycleInterceptor;
pub use pipeline::{ResilientPipeline, ResilientPipelineBuilder};
pub use recovery::{Attempt, RecoveryState, ResponseRecoveryStateMachine};
