pub mod agent_loop;
pub mod assembly;
pub mod chat;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod store;
pub mod tools;

pub use error::ReportError;
