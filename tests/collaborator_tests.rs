//! Tests for the network clients against local stand-in servers
//!
//! Each HTTP test serves exactly one canned response from a loopback
//! listener and hands back the raw request it received.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use vmagent::agent::{ModelClient, ModelError, Role, ToolCallRequest, Turn};
use vmagent::grpc::{GrpcVmManager, VmError, VmManager};
use vmagent::ollama::ChatClient;
use vmagent::sandbox::{CodeExecutor, ExecuteRequest, ExecutionError, HttpCodeExecutor};
use vmagent::tools::{
    default_registry, ExecuteCodeTool, ExecutionDefaults, StartVmTool, ToolInvoker,
};

async fn serve_once(status_line: &'static str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = body.to_string();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        request
    });

    (format!("http://{}", addr), handle)
}

/// Read headers, then as much body as Content-Length announces
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn executor() -> HttpCodeExecutor {
    HttpCodeExecutor::new(
        std::time::Duration::from_secs(5),
        std::time::Duration::from_secs(10),
    )
    .unwrap()
}

fn hello_request() -> ExecuteRequest {
    let mut files = BTreeMap::new();
    files.insert("main.py".to_string(), "print('hi')".to_string());
    ExecuteRequest {
        lang: "python".to_string(),
        files,
        entry_point: "main.py".to_string(),
        dependencies: vec!["requests".to_string()],
        timeout: 30,
    }
}

#[tokio::test]
async fn test_execute_success() {
    let (addr, server) =
        serve_once("200 OK", r#"{"output":"hi\n","error":null,"status":"success"}"#).await;

    let output = executor().execute(&addr, &hello_request()).await.unwrap();
    assert_eq!(output.output.as_deref(), Some("hi\n"));
    assert_eq!(output.status_text(), "success");
    assert_eq!(output.render(), "Status: success\nOutput:\nhi\n\nError:\n");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /execute "), "request: {}", request);
    assert!(request.contains(r#""entry_point":"main.py""#));
    assert!(request.contains(r#""dependencies":["requests"]"#));
    assert!(request.contains(r#""timeout":30"#));
}

#[tokio::test]
async fn test_execute_error_status() {
    let (addr, server) = serve_once("500 Internal Server Error", "sandbox crashed").await;

    let err = executor().execute(&addr, &hello_request()).await.unwrap_err();
    match err {
        ExecutionError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "sandbox crashed");
        }
        other => panic!("expected status error, got {:?}", other),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_execute_malformed_body() {
    let (addr, server) = serve_once("200 OK", "not json").await;

    let err = executor().execute(&addr, &hello_request()).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Decode(_)), "got {:?}", err);
    server.await.unwrap();
}

#[tokio::test]
async fn test_chat_client_native_tool_call() {
    let (addr, server) = serve_once(
        "200 OK",
        r#"{"model":"qwen3","message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"start_vm","arguments":{"vm_name":"test"}}}]},"done":true}"#,
    )
    .await;

    let transcript = vec![Turn::system("You control VMs."), Turn::user("Start a VM named test")];
    let tools = vec![StartVmTool::definition(), ExecuteCodeTool::definition()];

    let turn = ChatClient::new(addr)
        .complete("qwen3", &transcript, &tools)
        .await
        .unwrap();

    assert_eq!(turn.role, Role::Assistant);
    assert!(turn.content.is_none());
    assert_eq!(turn.tool_calls.len(), 1);
    assert!(turn.tool_calls[0].id.starts_with("call_"));
    assert_eq!(turn.tool_calls[0].tool_name, "start_vm");
    assert_eq!(turn.tool_calls[0].arguments, json!({"vm_name": "test"}));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/chat "), "request: {}", request);
    assert!(request.contains(r#""stream":false"#));
    assert!(request.contains(r#""name":"execute_code_in_vm""#));
    assert!(request.contains("Start a VM named test"));
}

#[tokio::test]
async fn test_chat_client_sends_tool_results() {
    let (addr, server) = serve_once(
        "200 OK",
        r#"{"message":{"role":"assistant","content":"The VM is up at 10.0.0.5."},"done":true}"#,
    )
    .await;

    let transcript = vec![
        Turn::system("sys"),
        Turn::user("Start a VM named test"),
        Turn::assistant_with_calls(
            "",
            vec![ToolCallRequest::new("c1", "start_vm", json!({"vm_name": "test"}))],
        ),
        Turn::tool("c1", "start_vm", r#"{"vm_id":"vm-1","ip_address":"10.0.0.5"}"#),
    ];

    let turn = ChatClient::new(addr)
        .complete("qwen3", &transcript, &[StartVmTool::definition()])
        .await
        .unwrap();
    assert_eq!(turn.text(), "The VM is up at 10.0.0.5.");
    assert!(!turn.has_tool_calls());

    let request = server.await.unwrap();
    assert!(request.contains(r#""role":"tool""#));
    assert!(request.contains(r#""tool_name":"start_vm""#));
}

#[tokio::test]
async fn test_chat_client_error_status() {
    let (addr, server) = serve_once("404 Not Found", r#"{"error":"model 'nope' not found"}"#).await;

    let err = ChatClient::new(addr)
        .complete("nope", &[Turn::user("hi")], &[])
        .await
        .unwrap_err();
    match err {
        ModelError::Status { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_vm_service_unreachable() {
    let vms = GrpcVmManager::new("127.0.0.1:1");
    let err = vms.start_vm("test").await.unwrap_err();
    assert!(matches!(err, VmError::Transport(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_vm_service_unreachable_reported_as_tool_result() {
    let registry = default_registry(
        Arc::new(GrpcVmManager::new("127.0.0.1:1")),
        Arc::new(executor()),
        ExecutionDefaults {
            code_server_addr: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        },
    )
    .unwrap();

    let result = ToolInvoker::new(registry)
        .invoke(&ToolCallRequest::new("c1", "start_vm", json!({"vm_name": "test"})))
        .await;

    assert!(!result.succeeded);
    assert_eq!(result.tool_call_id, "c1");
    assert!(result.content.contains("failed"), "content: {}", result.content);
}
