pub mod keywords;
pub mod router;

pub use router::{IntentRouter, RouteExplanation, RouteTarget, RoutingDecision, ScoredTarget};
