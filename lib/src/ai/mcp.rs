// lib/src/ai/mcp.rs
//! A JSON-RPC 2.0 tool server speaking the Model Context Protocol subset
//! `initialize`, `tools/list` and `tools/call`.

use chrono::{DateTime, Utc};
use models::medical::SlotQuery;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::analysis::SymptomAnalyzer;
use crate::context::TenantScope;
use crate::scheduling::SchedulingService;
use crate::users::UserService;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const TOOL_FAILED: i64 = -32000;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        JsonRpcResponse { jsonrpc: "2.0".into(), id, result: Some(result), error: None }
    }

    fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        JsonRpcResponse { jsonrpc: "2.0".into(), id, result: None, error: Some(JsonRpcError { code, message: message.into() }) }
    }
}

#[derive(Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct AnalyzeArgs {
    symptoms: String,
}

#[derive(Deserialize)]
struct ListDoctorsArgs {
    #[serde(default)]
    specialization: Option<String>,
}

#[derive(Deserialize)]
struct FindSlotsArgs {
    #[serde(default)]
    doctor_id: Option<Uuid>,
    #[serde(default)]
    from: Option<DateTime<Utc>>,
    #[serde(default)]
    to: Option<DateTime<Utc>>,
}

enum ToolError {
    InvalidParams(String),
    Failed(String),
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidParams(format!("invalid arguments: {e}")))
}

fn tool_descriptors() -> Value {
    json!([
        {
            "name": "analyze_symptoms",
            "description": "Triage free-text symptoms into an urgency level and suggested specialties.",
            "inputSchema": {
                "type": "object",
                "properties": { "symptoms": { "type": "string" } },
                "required": ["symptoms"]
            }
        },
        {
            "name": "list_doctors",
            "description": "List the hospital's doctors, optionally filtered by specialization.",
            "inputSchema": {
                "type": "object",
                "properties": { "specialization": { "type": "string" } }
            }
        },
        {
            "name": "find_available_slots",
            "description": "Find bookable slots, optionally for one doctor and time window.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "doctor_id": { "type": "string", "format": "uuid" },
                    "from": { "type": "string", "format": "date-time" },
                    "to": { "type": "string", "format": "date-time" }
                }
            }
        }
    ])
}

#[derive(Debug, Clone)]
pub struct McpServer {
    analyzer: SymptomAnalyzer,
    users: UserService,
    scheduling: SchedulingService,
}

impl McpServer {
    pub fn new(analyzer: SymptomAnalyzer, users: UserService, scheduling: SchedulingService) -> Self {
        McpServer { analyzer, users, scheduling }
    }

    /// Handles one raw JSON-RPC message. Hospital tools need `scope`.
    pub async fn handle_value(&self, scope: Option<&TenantScope>, raw: Value) -> JsonRpcResponse {
        let id = raw.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(raw) {
            Ok(request) => self.handle(scope, request).await,
            Err(e) => JsonRpcResponse::err(id, INVALID_REQUEST, format!("invalid request: {e}")),
        }
    }

    pub async fn handle(&self, scope: Option<&TenantScope>, request: JsonRpcRequest) -> JsonRpcResponse {
        if request.jsonrpc.as_deref() != Some("2.0") {
            return JsonRpcResponse::err(request.id, INVALID_REQUEST, "jsonrpc must be \"2.0\"");
        }
        debug!(method = %request.method, "mcp request");
        match request.method.as_str() {
            "initialize" => JsonRpcResponse::ok(
                request.id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "medcor", "version": env!("CARGO_PKG_VERSION") }
                }),
            ),
            "tools/list" => JsonRpcResponse::ok(request.id, json!({ "tools": tool_descriptors() })),
            "tools/call" => {
                let call: ToolCall = match serde_json::from_value(request.params) {
                    Ok(call) => call,
                    Err(e) => return JsonRpcResponse::err(request.id, INVALID_PARAMS, format!("invalid params: {e}")),
                };
                match self.call_tool(scope, call).await {
                    Ok(output) => JsonRpcResponse::ok(
                        request.id,
                        json!({
                            "content": [{ "type": "text", "text": output.to_string() }],
                            "structuredContent": output,
                            "isError": false
                        }),
                    ),
                    Err(ToolError::InvalidParams(message)) => JsonRpcResponse::err(request.id, INVALID_PARAMS, message),
                    Err(ToolError::Failed(message)) => JsonRpcResponse::err(request.id, TOOL_FAILED, message),
                }
            }
            other => JsonRpcResponse::err(request.id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
        }
    }

    async fn call_tool(&self, scope: Option<&TenantScope>, call: ToolCall) -> Result<Value, ToolError> {
        let hospital = || scope.ok_or_else(|| ToolError::Failed("this tool needs a hospital context".into()));
        match call.name.as_str() {
            "analyze_symptoms" => {
                let args: AnalyzeArgs = parse_args(call.arguments)?;
                if args.symptoms.trim().is_empty() {
                    return Err(ToolError::InvalidParams("symptoms must not be empty".into()));
                }
                to_value(&self.analyzer.analyze(&args.symptoms))
            }
            "list_doctors" => {
                let args: ListDoctorsArgs = parse_args(call.arguments)?;
                let scope = hospital()?;
                let doctors = self
                    .users
                    .list_doctors(scope, args.specialization.as_deref())
                    .await
                    .map_err(|e| ToolError::Failed(e.to_string()))?;
                to_value(&doctors)
            }
            "find_available_slots" => {
                let args: FindSlotsArgs = parse_args(call.arguments)?;
                let scope = hospital()?;
                let query = SlotQuery { doctor_id: args.doctor_id, from: args.from, to: args.to };
                let slots = self
                    .scheduling
                    .list_available_slots(scope, &query)
                    .await
                    .map_err(|e| ToolError::Failed(e.to_string()))?;
                to_value(&slots)
            }
            other => Err(ToolError::InvalidParams(format!("unknown tool: {other}"))),
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Failed(e.to_string()))
}
