// CV-to-vacancy match analysis.
//
// extractor / normalizer turn an upload into comparable text, prompt_builder
// and validator wrap the AI call, heuristic is the keyword fallback, and
// orchestrator ties them together before store persists the result.

pub mod extractor;
pub mod handlers;
pub mod heuristic;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod prompt_builder;
pub mod prompts;
pub mod store;
pub mod validator;
