//! MCP command - expose portctl tools to AI agents.
//!
//! Speaks newline-delimited JSON-RPC 2.0 on stdin/stdout. Logs go to stderr
//! so they never interleave with protocol messages.

use anyhow::Result;
use portctl_core::{FilterCriteria, NativeProcessManager, Scanner};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use super::{load_config, manager};

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

pub async fn serve() -> Result<()> {
    let server = Server::new(manager());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!("MCP server listening on stdio");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = server.handle_line(&line).await {
            let mut out = serde_json::to_string(&response)?;
            out.push('\n');
            stdout.write_all(out.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    info!("stdin closed, MCP server exiting");
    Ok(())
}

struct Server {
    pm: NativeProcessManager,
}

impl Server {
    fn new(pm: NativeProcessManager) -> Self {
        Self { pm }
    }

    /// Handle one raw message. Notifications get no response.
    async fn handle_line(&self, line: &str) -> Option<Value> {
        let message: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => return Some(error_response(Value::Null, PARSE_ERROR, &format!("Parse error: {}", e))),
        };

        let Some(method) = message.get("method").and_then(Value::as_str) else {
            let id = message.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(id, INVALID_REQUEST, "Invalid request"));
        };
        let Some(id) = message.get("id").cloned() else {
            debug!(method = method, "Ignoring notification");
            return None;
        };
        let params = message.get("params").cloned().unwrap_or_else(|| json!({}));

        debug!(method = method, "MCP request");
        let outcome = match method {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "portctl", "version": env!("CARGO_PKG_VERSION") },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(&params).await,
            other => Err((METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        };

        Some(match outcome {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err((code, msg)) => error_response(id, code, &msg),
        })
    }

    async fn call_tool(&self, params: &Value) -> std::result::Result<Value, (i64, String)> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or((INVALID_PARAMS, "Missing tool name".to_string()))?;
        let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let result = match name {
            "list_processes" => self.list_processes(&args).await,
            "kill_process" => self.kill_process(&args).await,
            "scan_ports" => scan_ports(&args).await,
            "get_system_stats" => self.system_stats().await,
            other => return Err((INVALID_PARAMS, format!("Unknown tool: {}", other))),
        };

        Ok(match result {
            Ok(text) => tool_result(text, false),
            Err(text) => tool_result(text, true),
        })
    }

    async fn list_processes(&self, args: &Value) -> std::result::Result<String, String> {
        let records = match port_arg(args, "port")? {
            Some(port) => self.pm.list_on_port(port).await,
            None => self.pm.list_all().await,
        }
        .map_err(|e| format!("Error getting processes: {}", e))?;

        let records = match args.get("service").and_then(Value::as_str) {
            Some(service) if !service.is_empty() => {
                let criteria = FilterCriteria {
                    service: Some(service.to_string()),
                    ..Default::default()
                };
                self.pm.filter(&records, &criteria)
            }
            _ => records,
        };

        serde_json::to_string_pretty(&records).map_err(|e| e.to_string())
    }

    async fn kill_process(&self, args: &Value) -> std::result::Result<String, String> {
        let force = args.get("force").and_then(Value::as_bool).unwrap_or(false);

        if let Some(pid) = args.get("pid").and_then(Value::as_u64) {
            let pid = u32::try_from(pid).map_err(|_| format!("Invalid PID: {}", pid))?;
            return match self.pm.kill(pid, force).await {
                Ok(()) => Ok(format!("Successfully killed process with PID {}", pid)),
                Err(e) => Err(format!("Failed to kill PID {}: {}", pid, e)),
            };
        }

        let Some(port) = port_arg(args, "port")? else {
            return Err("Must provide either 'pid' or 'port'".to_string());
        };

        let records = self
            .pm
            .list_on_port(port)
            .await
            .map_err(|e| format!("Error finding processes on port {}: {}", port, e))?;
        if records.is_empty() {
            return Ok(format!("No processes found on port {}", port));
        }

        let pids: Vec<u32> = records.iter().map(|r| r.pid).collect();
        let results = self.pm.kill_many(&pids, force).await;
        let killed = results.values().filter(|r| r.is_ok()).count();
        let errors: Vec<String> = results
            .iter()
            .filter_map(|(pid, r)| r.as_ref().err().map(|e| format!("PID {}: {}", pid, e)))
            .collect();

        let mut msg = format!("Killed {}/{} processes on port {}", killed, results.len(), port);
        if !errors.is_empty() {
            msg.push_str(&format!("\nErrors: {}", errors.join("; ")));
        }
        Ok(msg)
    }

    async fn system_stats(&self) -> std::result::Result<String, String> {
        let stats = self
            .pm
            .stats()
            .await
            .map_err(|e| format!("Error getting stats: {}", e))?;
        serde_json::to_string_pretty(&stats).map_err(|e| e.to_string())
    }
}

async fn scan_ports(args: &Value) -> std::result::Result<String, String> {
    let host = args
        .get("host")
        .and_then(Value::as_str)
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost");
    let start = port_arg(args, "start_port")?.unwrap_or(1);
    let end = port_arg(args, "end_port")?.unwrap_or(1000);
    if start > end {
        return Err(format!("start_port {} is greater than end_port {}", start, end));
    }

    let config = load_config().await;
    let ports: Vec<u16> = (start..=end).collect();
    let results = Scanner::new(config.scan.concurrent, config.scan.timeout)
        .scan(host, &ports)
        .await;
    let open: Vec<_> = results.into_iter().filter(|r| r.is_open()).collect();

    serde_json::to_string_pretty(&open)
        .map(|body| format!("Open ports on {}:\n{}", host, body))
        .map_err(|e| e.to_string())
}

/// Optional port argument; present but outside 1-65535 is an error.
fn port_arg(args: &Value, key: &str) -> std::result::Result<Option<u16>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .filter(|&p| p > 0)
            .map(Some)
            .ok_or_else(|| format!("Invalid {}: {}", key, v)),
    }
}

fn tool_result(text: String, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "list_processes",
            "description": "List running processes, optionally filtered by port or service",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "port": { "type": "number", "description": "Specific port to check" },
                    "service": { "type": "string", "description": "Filter by service name (e.g., 'node', 'python')" }
                }
            }
        },
        {
            "name": "kill_process",
            "description": "Kill a process by PID or Port",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "pid": { "type": "number", "description": "Process ID to kill" },
                    "port": { "type": "number", "description": "Port number to kill processes on" },
                    "force": { "type": "boolean", "description": "Force kill (SIGKILL)" }
                }
            }
        },
        {
            "name": "scan_ports",
            "description": "Scan for open ports on a host",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "host": { "type": "string", "description": "Host to scan (default: localhost)" },
                    "start_port": { "type": "number", "description": "Start of port range" },
                    "end_port": { "type": "number", "description": "End of port range" }
                }
            }
        },
        {
            "name": "get_system_stats",
            "description": "Get system resource usage and statistics",
            "inputSchema": { "type": "object", "properties": {} }
        }
    ])
}
