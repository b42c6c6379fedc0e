//! JSON-lines driver over stdin/stdout.
//!
//! One request per line, one response per line:
//!
//! ```text
//! {"id": 1, "method": "list_tools"}
//! {"id": 2, "method": "call", "tool": "read_note", "arguments": {"knowledge_base_name": "kb", "path": "a.md"}}
//! ```
//!
//! Responses echo `id` and carry either `result` or `error`.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::tools::{error_response, tool_definitions, ToolRouter};
use kbvault_core::Error;

fn reply(id: Value, payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.contains_key("error") => {
            let error = map.remove("error").unwrap_or(Value::Null);
            json!({ "id": id, "error": error })
        }
        result => json!({ "id": id, "result": result }),
    }
}

/// Handle one input line. Blank lines produce no response.
pub async fn handle_line(router: &ToolRouter, line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let request: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "driver: unparseable request line");
            let err = Error::InvalidInput(format!("request is not valid JSON: {e}"));
            return Some(reply(Value::Null, error_response(&err)));
        }
    };

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");
    debug!(method = %method, "driver: request");

    let payload = match method {
        "list_tools" => json!({ "tools": tool_definitions() }),
        "call" => match request.get("tool").and_then(Value::as_str) {
            Some(tool) => {
                let arguments = request.get("arguments").cloned().unwrap_or(Value::Null);
                router.call(tool, arguments).await
            }
            None => error_response(&Error::InvalidInput(
                "call requests need a 'tool' name".to_string(),
            )),
        },
        other => error_response(&Error::InvalidInput(format!("Unknown method: '{other}'"))),
    };
    Some(reply(id, payload))
}

/// Serve requests from stdin until EOF.
pub async fn run_stdio(router: &ToolRouter) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if let Some(response) = handle_line(router, &line).await {
            let mut out = response.to_string();
            out.push('\n');
            stdout.write_all(out.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbvault_store::MemoryStorage;
    use std::sync::Arc;

    fn router() -> ToolRouter {
        ToolRouter::new(Arc::new(MemoryStorage::new()), ".knowledge-bases")
    }

    #[tokio::test]
    async fn test_blank_line_ignored() {
        assert!(handle_line(&router(), "   ").await.is_none());
    }

    #[tokio::test]
    async fn test_list_tools() {
        let out = handle_line(&router(), r#"{"id": 7, "method": "list_tools"}"#)
            .await
            .unwrap();
        assert_eq!(out["id"], 7);
        assert_eq!(out["result"]["tools"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_call_success_and_error_envelopes() {
        let r = router();
        let ok = handle_line(
            &r,
            r#"{"id": "a", "method": "call", "tool": "add_knowledge_base", "arguments": {"name": "kb", "subfolder": "kb"}}"#,
        )
        .await
        .unwrap();
        assert_eq!(ok["id"], "a");
        assert_eq!(ok["result"]["knowledge_base"]["subfolder"], "kb");

        let err = handle_line(
            &r,
            r#"{"id": "b", "method": "call", "tool": "read_note", "arguments": {"knowledge_base_name": "kb", "path": "missing"}}"#,
        )
        .await
        .unwrap();
        assert_eq!(err["error"]["kind"], "NoteNotFound");
        assert!(err.get("result").is_none());
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        let r = router();
        let out = handle_line(&r, "{oops").await.unwrap();
        assert_eq!(out["id"], Value::Null);
        assert_eq!(out["error"]["kind"], "InvalidInput");

        let out = handle_line(&r, r#"{"id": 1, "method": "call"}"#).await.unwrap();
        assert_eq!(out["error"]["kind"], "InvalidInput");

        let out = handle_line(&r, r#"{"id": 1, "method": "shutdown"}"#).await.unwrap();
        assert_eq!(out["error"]["kind"], "InvalidInput");
    }
}
