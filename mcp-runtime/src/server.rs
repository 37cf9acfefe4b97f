//! MCP server over stdio: JSON-RPC routing, one task per tool call, a single
//! writer task, and request cancellation.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::protocol::{
    Framing, JSONRPC_VERSION, ReadError, RpcError, error_response, read_message,
    success_response, write_message,
};

pub const MCP_SERVER_NAME: &str = "linode-mcp";
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2024-11-05", "2025-03-26", "2025-06-18"];

pub struct McpServer {
    dispatcher: Dispatcher,
    in_flight: Mutex<HashMap<String, CancellationToken>>,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn serve_stdio(self: Arc<Self>) -> Result<(), String> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();
        self.serve(reader, writer).await.map_err(|e| e.to_string())
    }

    /// Serve until the reader hits EOF, then drain in-flight calls.
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, writer: W) -> Result<(), std::io::Error>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<(Value, Framing)>();
        let writer_task = tokio::spawn(write_loop(writer, rx));
        let mut tasks = JoinSet::new();

        tracing::info!(
            server = MCP_SERVER_NAME,
            version = env!("CARGO_PKG_VERSION"),
            tools = self.dispatcher.registry().len(),
            accounts = self.dispatcher.accounts().len(),
            "mcp server ready"
        );

        loop {
            let (incoming, framing) = match read_message(&mut reader).await {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(ReadError::Malformed { framing, message }) => {
                    tracing::warn!(error = %message, "unreadable message");
                    let response = error_response(Value::Null, RpcError::parse_error(message));
                    let _ = tx.send((response, framing));
                    continue;
                }
                Err(ReadError::Io(err)) => return Err(err),
            };

            // Claim tool-call ids here so a cancel on the next line finds them.
            let prepared = self.prepare(incoming);
            if prepared.has_calls() {
                let server = Arc::clone(&self);
                let tx = tx.clone();
                tasks.spawn(async move {
                    if let Some(response) = server.respond(prepared).await {
                        let _ = tx.send((response, framing));
                    }
                });
            } else if let Some(response) = self.respond(prepared).await {
                let _ = tx.send((response, framing));
            }
        }

        while tasks.join_next().await.is_some() {}
        drop(tx);
        match writer_task.await {
            Ok(result) => result,
            Err(join_err) => Err(std::io::Error::other(join_err.to_string())),
        }
    }

    /// Single message or batch. `None` when nothing needs answering.
    pub async fn handle_incoming_message(self: &Arc<Self>, incoming: Value) -> Option<Value> {
        let prepared = self.prepare(incoming);
        self.respond(prepared).await
    }

    fn prepare(&self, incoming: Value) -> Prepared {
        match incoming {
            Value::Array(batch) if batch.is_empty() => Prepared::EmptyBatch,
            Value::Array(batch) => {
                Prepared::Batch(batch.into_iter().map(|item| self.slot(item)).collect())
            }
            single => Prepared::Single(self.slot(single)),
        }
    }

    fn slot(&self, message: Value) -> Slot {
        let Some(id) = tool_call_id(&message) else {
            return Slot::Other(message);
        };
        match self.claim(&id) {
            Some(cancel) => Slot::Call {
                params: message.get("params").cloned().unwrap_or(Value::Null),
                id,
                cancel,
            },
            None => Slot::Duplicate(id),
        }
    }

    async fn respond(self: &Arc<Self>, prepared: Prepared) -> Option<Value> {
        let slots = match prepared {
            Prepared::Single(slot) => return self.answer(slot).await,
            Prepared::EmptyBatch => {
                return Some(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
            }
            Prepared::Batch(slots) => slots,
        };

        // Tool calls inside a batch run concurrently like any other call.
        let mut calls = JoinSet::new();
        let mut responses = Vec::new();
        for slot in slots {
            if slot.is_call() {
                let server = Arc::clone(self);
                calls.spawn(async move { server.answer(slot).await });
            } else if let Some(response) = self.answer(slot).await {
                responses.push(response);
            }
        }
        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok(Some(response)) => responses.push(response),
                Ok(None) => {}
                Err(err) => tracing::error!(error = %err, "batched tool call task failed"),
            }
        }

        if responses.is_empty() {
            None
        } else {
            Some(Value::Array(responses))
        }
    }

    async fn answer(&self, slot: Slot) -> Option<Value> {
        match slot {
            Slot::Call { id, params, cancel } => {
                let result = self.call_tool(&id, params, cancel).await;
                Some(match result {
                    Ok(payload) => success_response(id, payload),
                    Err(err) => error_response(id, err),
                })
            }
            Slot::Duplicate(id) => {
                let err = duplicate_call(&id);
                Some(error_response(id, err))
            }
            Slot::Other(message) => self.handle_single_message(message).await,
        }
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // A response to a request we never send.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        if let Some(id) = obj.get("id").cloned() {
            let result = self.handle_request(&id, method, params).await;
            Some(match result {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            })
        } else {
            self.handle_notification(method, params);
            None
        }
    }

    fn handle_notification(&self, method: &str, params: Value) {
        match method {
            "notifications/cancelled" => {
                let Some(request_id) = params.get("requestId") else {
                    return;
                };
                let key = request_key(request_id);
                let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(token) = in_flight.get(&key) {
                    let reason = params.get("reason").and_then(Value::as_str).unwrap_or("");
                    tracing::info!(request_id = %key, reason, "cancelling tool call");
                    token.cancel();
                }
            }
            "notifications/initialized" => tracing::debug!("client initialized"),
            // Unknown notifications are ignored.
            _ => {}
        }
    }

    async fn handle_request(
        &self,
        id: &Value,
        method: &str,
        params: Value,
    ) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.dispatcher.registry().tools_list_payload()),
            "tools/call" => match self.claim(id) {
                Some(cancel) => self.call_tool(id, params, cancel).await,
                None => Err(duplicate_call(id)),
            },
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self, params: &Value) -> Value {
        let requested = params.get("protocolVersion").and_then(Value::as_str);
        let protocol_version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(MCP_PROTOCOL_VERSION);
        let current = self
            .dispatcher
            .accounts()
            .current_name()
            .unwrap_or_else(|| "none".to_string());
        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": format!(
                "Tools operate on the current Linode account ({current}). Use linode_account_list to see configured accounts and linode_account_switch to change the current one."
            )
        })
    }

    /// Runs a claimed call and always releases its id.
    async fn call_tool(
        &self,
        id: &Value,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<Value, RpcError> {
        let result = self.run_tool_call(params, cancel).await;
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&request_key(id));
        result
    }

    async fn run_tool_call(
        &self,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;
        let arguments = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            None | Some(Value::Null) => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call field 'arguments' must be an object",
                ));
            }
        };

        let result = self.dispatcher.dispatch(name, arguments, cancel).await?;
        serde_json::to_value(&result)
            .map_err(|e| RpcError::internal(format!("failed to encode tool result: {e}")))
    }

    /// A fresh cancellation token for `id`, or `None` while a call with the
    /// same id is still running.
    fn claim(&self, id: &Value) -> Option<CancellationToken> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        match in_flight.entry(request_key(id)) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => Some(slot.insert(CancellationToken::new()).clone()),
        }
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// A parsed message whose tool calls are already registered for cancellation.
enum Prepared {
    Single(Slot),
    Batch(Vec<Slot>),
    EmptyBatch,
}

impl Prepared {
    fn has_calls(&self) -> bool {
        match self {
            Prepared::Single(slot) => slot.is_call(),
            Prepared::Batch(slots) => slots.iter().any(Slot::is_call),
            Prepared::EmptyBatch => false,
        }
    }
}

enum Slot {
    Call {
        id: Value,
        params: Value,
        cancel: CancellationToken,
    },
    Duplicate(Value),
    Other(Value),
}

impl Slot {
    fn is_call(&self) -> bool {
        matches!(self, Slot::Call { .. })
    }
}

fn request_key(id: &Value) -> String {
    id.to_string()
}

fn duplicate_call(id: &Value) -> RpcError {
    RpcError::invalid_request(format!(
        "request id {} is already in flight",
        request_key(id)
    ))
}

/// The id of a `tools/call` request, if `incoming` is one.
fn tool_call_id(incoming: &Value) -> Option<Value> {
    let obj = incoming.as_object()?;
    if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION)
        || obj.get("method").and_then(Value::as_str) != Some("tools/call")
    {
        return None;
    }
    obj.get("id").cloned()
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<(Value, Framing)>,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    while let Some((message, framing)) = rx.recv().await {
        write_message(&mut writer, &message, framing).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{AccountEntry, AccountManager};
    use crate::dispatch::CallContext;
    use crate::protocol::{INVALID_PARAMS, METHOD_NOT_FOUND, REQUEST_CANCELLED};
    use crate::registry::{ToolRegistration, ToolRegistry};
    use linode_mcp_core::AccountConfig;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn server() -> Arc<McpServer> {
        let registry = ToolRegistry::from_registrations(vec![
            ToolRegistration::new(
                "linode_echo_get",
                "echo",
                json!({ "type": "object" }),
                |ctx: CallContext| async move { Ok(format!("hello from {}", ctx.account().name())) },
            ),
            ToolRegistration::new(
                "linode_slow_get",
                "slow",
                json!({ "type": "object" }),
                |_ctx: CallContext| async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("late".to_string())
                },
            ),
        ])
        .unwrap();
        let accounts = AccountManager::new();
        accounts
            .add(
                AccountEntry::new(
                    "main",
                    &AccountConfig {
                        label: "Main".to_string(),
                        token: "t".to_string(),
                        api_url: Some("http://127.0.0.1:9".to_string()),
                    },
                    Duration::from_secs(5),
                )
                .unwrap(),
            )
            .unwrap();
        accounts.switch("main").unwrap();
        Arc::new(McpServer::new(Dispatcher::new(
            Arc::new(registry),
            Arc::new(accounts),
            Duration::from_secs(60),
        )))
    }

    /// Feed newline-delimited input and collect every response line.
    async fn session(server: Arc<McpServer>, input: &str) -> Vec<Value> {
        let (writer, mut output) = tokio::io::duplex(1 << 20);
        server
            .serve(BufReader::new(input.as_bytes()), writer)
            .await
            .unwrap();
        let mut raw = String::new();
        output.read_to_string(&mut raw).await.unwrap();
        raw.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn by_id(responses: &[Value], id: i64) -> &Value {
        responses
            .iter()
            .find(|r| r["id"] == json!(id))
            .unwrap_or_else(|| panic!("no response for id {id}: {responses:?}"))
    }

    #[tokio::test]
    async fn handshake_and_listing() {
        let input = [
            json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}),
            json!({"jsonrpc":"2.0","method":"notifications/initialized"}),
            json!({"jsonrpc":"2.0","id":2,"method":"tools/list"}),
            json!({"jsonrpc":"2.0","id":3,"method":"ping"}),
            json!({"jsonrpc":"2.0","id":4,"method":"resources/list"}),
        ]
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");
        let responses = session(server(), &input).await;
        assert_eq!(responses.len(), 4);

        let init = by_id(&responses, 1);
        assert_eq!(init["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(init["result"]["serverInfo"]["name"], MCP_SERVER_NAME);

        let tools = by_id(&responses, 2)["result"]["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "linode_echo_get");

        assert_eq!(by_id(&responses, 3)["result"], json!({}));
        assert_eq!(by_id(&responses, 4)["result"]["resources"], json!([]));
    }

    #[tokio::test]
    async fn unsupported_protocol_version_falls_back() {
        let input = json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}).to_string();
        let responses = session(server(), &input).await;
        assert_eq!(responses[0]["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn tool_call_round_trip_and_bad_params() {
        let input = [
            json!({"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"linode_echo_get","arguments":{}}}),
            json!({"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"arguments":{}}}),
            json!({"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"linode_echo_get","arguments":[1]}}),
            json!({"jsonrpc":"2.0","id":4,"method":"nope"}),
        ]
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");
        let server = server();
        let responses = session(Arc::clone(&server), &input).await;

        let ok = by_id(&responses, 1);
        assert_eq!(ok["result"]["isError"], false);
        assert_eq!(ok["result"]["content"][0]["text"], "hello from main");
        assert_eq!(by_id(&responses, 2)["error"]["code"], INVALID_PARAMS);
        assert_eq!(by_id(&responses, 3)["error"]["code"], INVALID_PARAMS);
        assert_eq!(by_id(&responses, 4)["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(server.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn cancelled_notification_aborts_matching_call() {
        let input = [
            json!({"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"linode_slow_get"}}),
            json!({"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":7,"reason":"user"}}),
        ]
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");
        let server = server();
        let responses = session(Arc::clone(&server), &input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 7);
        assert_eq!(responses[0]["error"]["code"], REQUEST_CANCELLED);
        assert!(responses[0].get("result").is_none());
        assert_eq!(server.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn batches_answer_as_one_array() {
        let input = json!([
            {"jsonrpc":"2.0","id":1,"method":"ping"},
            {"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"linode_echo_get"}},
            {"jsonrpc":"2.0","method":"notifications/initialized"}
        ])
        .to_string();
        let responses = session(server(), &input).await;
        assert_eq!(responses.len(), 1);
        let batch = responses[0].as_array().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(by_id(batch, 2)["result"]["isError"], false);

        let responses = session(server(), "[]").await;
        assert_eq!(responses[0]["error"]["code"], crate::protocol::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_in_flight_id_is_rejected_and_original_stays_cancellable() {
        let input = [
            json!({"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"linode_slow_get"}}),
            json!({"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"linode_echo_get"}}),
            json!({"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":7}}),
        ]
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");
        let server = server();
        let responses = session(Arc::clone(&server), &input).await;
        assert_eq!(responses.len(), 2);
        let mut codes: Vec<i64> = responses
            .iter()
            .map(|r| r["error"]["code"].as_i64().unwrap())
            .collect();
        codes.sort_unstable();
        assert_eq!(codes, vec![REQUEST_CANCELLED, crate::protocol::INVALID_REQUEST]);
        assert!(responses.iter().all(|r| r["id"] == 7));
        assert_eq!(server.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn cancel_right_after_a_batch_reaches_its_call() {
        let input = [
            json!([
                {"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"linode_slow_get"}},
                {"jsonrpc":"2.0","id":10,"method":"ping"}
            ]),
            json!({"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":9}}),
        ]
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");
        let server = server();
        let responses = session(Arc::clone(&server), &input).await;
        assert_eq!(responses.len(), 1);
        let batch = responses[0].as_array().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(by_id(batch, 9)["error"]["code"], REQUEST_CANCELLED);
        assert_eq!(by_id(batch, 10)["result"], json!({}));
        assert_eq!(server.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn oversized_content_length_gets_parse_error() {
        let input = format!("Content-Length: {}\r\n\r\n", usize::MAX);
        let (writer, mut output) = tokio::io::duplex(1 << 16);
        server()
            .serve(BufReader::new(input.as_bytes()), writer)
            .await
            .unwrap();
        let mut raw = String::new();
        output.read_to_string(&mut raw).await.unwrap();
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        let response: Value = serde_json::from_str(body).unwrap();
        assert_eq!(response["error"]["code"], crate::protocol::PARSE_ERROR);
    }

    #[tokio::test]
    async fn garbage_line_gets_parse_error_and_session_continues() {
        let input = format!(
            "{{not json\n{}",
            json!({"jsonrpc":"2.0","id":1,"method":"ping"})
        );
        let responses = session(server(), &input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], crate::protocol::PARSE_ERROR);
        assert_eq!(by_id(&responses, 1)["result"], json!({}));
    }

    #[tokio::test]
    async fn content_length_requests_get_content_length_responses() {
        let body = json!({"jsonrpc":"2.0","id":1,"method":"ping"}).to_string();
        let input = format!("Content-Length: {}\r\n\r\n{body}", body.len());
        let (writer, mut output) = tokio::io::duplex(1 << 16);
        server()
            .serve(BufReader::new(input.as_bytes()), writer)
            .await
            .unwrap();
        let mut raw = String::new();
        output.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("Content-Length: "));
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        let response: Value = serde_json::from_str(body).unwrap();
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"], json!({}));
    }
}
