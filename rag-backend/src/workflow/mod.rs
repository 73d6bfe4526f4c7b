//! Request pipeline: routing, query optimization, agent execution, and
//! answer generation, coordinated by the stream orchestrator.

pub mod agent;
pub mod executor;
pub mod generator;
pub mod optimizer;
pub mod orchestrator;
pub mod router;


pub use agent::{AgentRunner, ReactAgentLoop};
pub use executor::ToolExecutor;
pub use generator::{AnswerGenerator, GenerationContext, GeneratorStrategy, build_generator};
pub use optimizer::QueryOptimizer;
pub use orchestrator::{ChatRequest, StreamOrchestrator};
