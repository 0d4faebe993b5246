pub mod ai_service;
pub mod models;

pub use ai_service::{AiProvider, QaService};
pub use models::{AiConfig, AiMessage};
