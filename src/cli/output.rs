//! output formatting utilities for scriptable CLI output
//!
//! uses JSON-RPC 2.0 format for machine-readable output:
//! - success: {"jsonrpc": "2.0", "result": {...}, "id": null}
//! - error: {"jsonrpc": "2.0", "error": {"code": N, "message": "...", "data": {...}}, "id": null}

use std::collections::BTreeMap;
use std::io::IsTerminal;

use serde::Serialize;

use crate::engine::{Diagnostic, VisibilityState};
use crate::form::FieldProblem;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// human-readable text output
    Text,
    /// machine-readable JSON-RPC 2.0 output
    Json,
    /// no output on success (errors still go to stderr)
    Quiet,
}

impl OutputMode {
    /// priority: quiet > json > no_json > auto-detect
    pub fn from_flags(json: bool, no_json: bool, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        if json {
            return Self::Json;
        }
        if no_json {
            return Self::Text;
        }
        // auto-detect: JSON when stdout is not a TTY (piped)
        if !std::io::stdout().is_terminal() {
            Self::Json
        } else {
            Self::Text
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::Quiet)
    }
}

/// JSON-RPC 2.0 success response
#[derive(Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub result: T,
    /// null for CLI responses (no request id)
    pub id: Option<String>,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result,
            id: None,
        }
    }
}

/// JSON-RPC 2.0 error response
#[derive(Serialize)]
pub struct JsonRpcError {
    pub jsonrpc: &'static str,
    pub error: RpcError,
    pub id: Option<String>,
}

#[derive(Serialize)]
pub struct RpcError {
    /// exit code offset by -32000 (application error range)
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ErrorData>,
}

#[derive(Serialize)]
pub struct ErrorData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problems: Option<Vec<FieldProblem>>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            error: RpcError {
                code: to_jsonrpc_code(code),
                message: message.into(),
                data: None,
            },
            id: None,
        }
    }

    pub fn with_suggestions(code: i32, message: impl Into<String>, suggestions: Vec<String>) -> Self {
        let mut error = Self::new(code, message);
        if !suggestions.is_empty() {
            error.error.data = Some(ErrorData {
                suggestions: Some(suggestions),
                problems: None,
            });
        }
        error
    }

    pub fn with_problems(code: i32, message: impl Into<String>, problems: Vec<FieldProblem>) -> Self {
        let mut error = Self::new(code, message);
        error.error.data = Some(ErrorData {
            suggestions: None,
            problems: Some(problems),
        });
        error
    }
}

/// JSON-RPC reserves -32000 to -32099 for server/application errors
pub fn to_jsonrpc_code(exit_code: i32) -> i32 {
    -32000 - exit_code
}

pub fn from_jsonrpc_code(rpc_code: i32) -> i32 {
    -(rpc_code + 32000)
}

// ============================================================================
// Result data structures
// ============================================================================

/// result of `verify`
#[derive(Serialize)]
pub struct VerifyData {
    pub form: String,
    pub fields: usize,
    /// fields carrying conditional logic
    pub conditional: usize,
    pub errors: usize,
    pub warnings: usize,
    pub problems: Vec<FieldProblem>,
}

/// result of `eval`
#[derive(Serialize)]
pub struct EvalData {
    pub form: String,
    pub visibility: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl EvalData {
    pub fn new(form: String, states: BTreeMap<String, VisibilityState>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            form,
            visibility: states
                .into_iter()
                .map(|(id, state)| (id, state.is_visible))
                .collect(),
            diagnostics,
        }
    }
}

// ============================================================================
// Output functions
// ============================================================================

/// print JSON-RPC success response to stdout
pub fn print_json<T: Serialize>(data: &T) {
    let response = JsonRpcResponse::new(data);
    if let Ok(json) = serde_json::to_string(&response) {
        println!("{}", json);
    }
}

/// print JSON-RPC error to stdout
pub fn print_json_error(code: i32, message: &str) {
    print_error_value(&JsonRpcError::new(code, message));
}

pub fn print_json_error_with_suggestions(code: i32, message: &str, suggestions: Vec<String>) {
    print_error_value(&JsonRpcError::with_suggestions(code, message, suggestions));
}

pub fn print_json_error_with_problems(code: i32, message: &str, problems: Vec<FieldProblem>) {
    print_error_value(&JsonRpcError::with_problems(code, message, problems));
}

fn print_error_value(error: &JsonRpcError) {
    if let Ok(json) = serde_json::to_string(error) {
        println!("{}", json);
    }
}
