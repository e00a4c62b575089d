pub mod config;
pub mod mcp;
pub mod onboarding;
