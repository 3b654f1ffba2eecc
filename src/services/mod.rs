pub mod conversation;
pub mod orchestrator;
pub mod prompts;
pub mod registry;
pub mod reply;
pub mod store;
pub mod tabular;
