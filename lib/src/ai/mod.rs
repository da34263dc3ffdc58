// lib/src/ai/mod.rs
//! Assistant features: symptom triage, chat and the MCP tool server.

pub mod analysis;
pub mod chat;
pub mod mcp;

pub use analysis::{AnalysisReport, SymptomAnalyzer, Urgency};
pub use chat::{ChatMessage, ChatReply, ChatService, Speaker};
pub use mcp::{JsonRpcRequest, JsonRpcResponse, McpServer};
