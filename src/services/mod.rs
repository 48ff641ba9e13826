pub mod llm;
pub mod prompts;
pub mod rate_limit;
pub mod reports;
pub mod structurer;
pub mod validation;
