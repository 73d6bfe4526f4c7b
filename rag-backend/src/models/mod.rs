pub mod chat;

pub use chat::{ContextBundle, RoutingDecision, Turn, TurnRole};
