pub mod analyzers;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod nbfc_matcher;
pub mod policies;
pub mod prompts;
pub mod recommendations;

pub use engine::EligibilityEngine;
