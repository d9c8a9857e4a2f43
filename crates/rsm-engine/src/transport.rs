//! Transports carrying tool calls to a server and JSON text back.
//!
//! Two flavours are provided: an in-process transport that calls a
//! [`ToolServer`] directly, and a stdio transport that talks to a tool-server
//! child process over line-delimited JSON. [`serve_stdio`] is the server side
//! of that line protocol.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use rsm_types::{transport_error, RsmError, RsmResult};

use crate::protocol::{ToolReply, ToolRequest, LIST_TOOLS};
use crate::server::ToolServer;

/// Carries a single tool call and returns the raw JSON text of the result.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn call(&self, tool: &str, params: Value) -> RsmResult<String>;

    /// Short description used in logs.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// In-process
// ---------------------------------------------------------------------------

/// Calls a [`ToolServer`] living in the same process.
pub struct InProcessTransport<S: ToolServer> {
    server: Arc<S>,
}

impl<S: ToolServer> InProcessTransport<S> {
    pub fn new(server: S) -> Self {
        Self {
            server: Arc::new(server),
        }
    }
}

#[async_trait]
impl<S: ToolServer> ToolTransport for InProcessTransport<S> {
    async fn call(&self, tool: &str, params: Value) -> RsmResult<String> {
        let value = self
            .server
            .call_tool(tool, params)
            .await
            .map_err(|e| transport_error!("{} rejected {tool}: {e}", self.server.name()))?;
        Ok(serde_json::to_string(&value)?)
    }

    fn describe(&self) -> String {
        format!("in-process:{}", self.server.name())
    }
}

// ---------------------------------------------------------------------------
// Stdio child process
// ---------------------------------------------------------------------------

struct StdioChild {
    // Held so the process is killed when the transport is dropped.
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// Talks to a tool server running as a child process.
///
/// The child is spawned on the first call and reused afterwards. Calls are
/// serialised: one request line out, one reply line back. When the pipe
/// breaks, a reply cannot be parsed, or its id does not match the request,
/// the child is discarded and the call fails. The next call spawns a fresh
/// process.
pub struct StdioTransport {
    program: String,
    args: Vec<String>,
    child: Mutex<Option<StdioChild>>,
    next_id: AtomicU64,
}

impl StdioTransport {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Build from a whitespace-separated command line.
    pub fn from_command_line(command: &str) -> RsmResult<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| RsmError::Config("empty tool-server command".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    fn spawn(&self) -> RsmResult<StdioChild> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| transport_error!("failed to spawn {}: {e}", self.program))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| transport_error!("{} has no stdin pipe", self.program))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| transport_error!("{} has no stdout pipe", self.program))?;

        info!(program = %self.program, "spawned tool server");
        Ok(StdioChild {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    async fn round_trip(child: &mut StdioChild, request: &ToolRequest) -> RsmResult<ToolReply> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        child
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| transport_error!("write to tool server failed: {e}"))?;
        child
            .stdin
            .flush()
            .await
            .map_err(|e| transport_error!("flush to tool server failed: {e}"))?;

        let reply_line = child
            .stdout
            .next_line()
            .await
            .map_err(|e| transport_error!("read from tool server failed: {e}"))?
            .ok_or_else(|| transport_error!("tool server closed its output"))?;

        let reply: ToolReply =
            serde_json::from_str(&reply_line).map_err(|e| RsmError::MalformedResponse {
                tool: request.tool.clone(),
                message: format!("unreadable reply frame: {e}"),
            })?;
        if reply.id != request.id {
            return Err(transport_error!(
                "reply id {} does not match request id {}",
                reply.id,
                request.id
            ));
        }
        Ok(reply)
    }
}

#[async_trait]
impl ToolTransport for StdioTransport {
    async fn call(&self, tool: &str, params: Value) -> RsmResult<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = ToolRequest {
            id,
            tool: tool.to_string(),
            params,
        };

        let mut guard = self.child.lock().await;
        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }
        let Some(child) = guard.as_mut() else {
            return Err(transport_error!("tool server is not running"));
        };

        let reply = match Self::round_trip(child, &request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(program = %self.program, error = %e, "dropping tool server after failed call");
                *guard = None;
                return Err(e);
            }
        };
        drop(guard);

        match (reply.result, reply.error) {
            (_, Some(error)) => Err(transport_error!("{tool} failed remotely: {error}")),
            (Some(result), None) => Ok(serde_json::to_string(&result)?),
            (None, None) => Err(transport_error!("reply to {tool} carried neither result nor error")),
        }
    }

    fn describe(&self) -> String {
        format!("stdio:{}", self.program)
    }
}

// ---------------------------------------------------------------------------
// Server side of the line protocol
// ---------------------------------------------------------------------------

async fn handle_line<S: ToolServer + ?Sized>(server: &S, line: &str) -> ToolReply {
    let request: ToolRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return ToolReply::failure(0, format!("malformed request: {e}")),
    };
    debug!(id = request.id, tool = %request.tool, "tool request");

    if request.tool == LIST_TOOLS {
        return ToolReply::success(request.id, json!(server.tools()));
    }
    match server.call_tool(&request.tool, request.params).await {
        Ok(result) => ToolReply::success(request.id, result),
        Err(e) => ToolReply::failure(request.id, e.to_string()),
    }
}

/// Answer line-delimited requests from `reader` on `writer` until EOF.
pub async fn serve_lines<S, R, W>(server: &S, reader: R, mut writer: W) -> RsmResult<()>
where
    S: ToolServer + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(server, &line).await;
        let mut out = serde_json::to_string(&reply)?;
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Serve `server` on this process's stdin/stdout.
pub async fn serve_stdio<S: ToolServer + ?Sized>(server: &S) -> RsmResult<()> {
    info!(server = server.name(), "serving tools on stdio");
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_lines(server, stdin, stdout).await?;
    info!(server = server.name(), "stdin closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::OptimizationServer;

    #[tokio::test]
    async fn in_process_returns_json_text() {
        let transport = InProcessTransport::new(OptimizationServer::new());
        let text = transport
            .call("suggest_doe_points", json!({"num_variables": 1, "num_levels": 3}))
            .await
            .unwrap();
        assert_eq!(text, "[[0.0],[0.5],[1.0]]");
    }

    #[tokio::test]
    async fn in_process_maps_tool_errors_to_transport_failures() {
        let transport = InProcessTransport::new(OptimizationServer::new());
        let err = transport.call("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, RsmError::Transport(_)));
    }

    #[tokio::test]
    async fn serve_lines_answers_each_request() {
        let input = concat!(
            r#"{"id": 1, "tool": "suggest_doe_points", "params": {"num_variables": 1, "num_levels": 2}}"#,
            "\n\n",
            r#"{"id": 2, "tool": "list_tools"}"#,
            "\n",
            r#"{"id": 3, "tool": "missing"}"#,
            "\n",
            "not json\n",
        );
        let mut output = Vec::new();
        serve_lines(&OptimizationServer::new(), input.as_bytes(), &mut output)
            .await
            .unwrap();

        let replies: Vec<ToolReply> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[0].result, Some(json!([[0.0], [1.0]])));
        assert_eq!(replies[1].result.as_ref().unwrap().as_array().unwrap().len(), 4);
        assert!(replies[2].error.as_ref().unwrap().contains("unknown tool"));
        assert_eq!(replies[3].id, 0);
        assert!(replies[3].error.is_some());
    }

    #[tokio::test]
    async fn stdio_spawn_failure_is_a_transport_failure() {
        let transport = StdioTransport::new("/nonexistent/rsm-tool-server", Vec::new());
        let err = tokio_test::assert_err!(transport.call("suggest_doe_points", json!({})).await);
        assert!(matches!(err, RsmError::Transport(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdio_rejects_reply_without_payload() {
        // `cat` echoes the request frame back: right id, but no result or error.
        let transport = StdioTransport::new("cat", Vec::new());
        let err = transport
            .call("suggest_doe_points", json!({"num_variables": 2, "num_levels": 2}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("neither result nor error"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdio_stray_frame_restarts_the_child() {
        // The first child emits one unsolicited frame; every child then
        // answers each request in order.
        let script = r#"if [ ! -e "$1" ]; then : > "$1"; echo '{"id":0,"result":0.0}'; fi
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed 's/^{"id":\([0-9]*\).*/\1/')
  echo "{\"id\":$id,\"result\":1.5}"
done"#;
        let marker = std::env::temp_dir().join(format!("rsm-stray-{}", uuid::Uuid::new_v4()));
        let transport = StdioTransport::new(
            "sh",
            vec![
                "-c".to_string(),
                script.to_string(),
                "sh".to_string(),
                marker.display().to_string(),
            ],
        );

        let err = tokio_test::assert_err!(transport.call("collect_measurement", json!({})).await);
        assert_eq!(err.kind(), "transport_failure");
        assert!(err.to_string().contains("does not match"));

        for _ in 0..3 {
            let text = tokio_test::assert_ok!(transport.call("collect_measurement", json!({})).await);
            assert_eq!(text, "1.5");
        }
        let _ = std::fs::remove_file(&marker);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdio_unparseable_reply_is_malformed() {
        let script = r#"while IFS= read -r line; do echo 'this is not json'; done"#;
        let transport = StdioTransport::new("sh", vec!["-c".to_string(), script.to_string()]);

        let err = tokio_test::assert_err!(transport.call("fit_response_surface", json!({})).await);
        assert_eq!(err.kind(), "malformed_response");
        match err {
            RsmError::MalformedResponse { tool, .. } => assert_eq!(tool, "fit_response_surface"),
            other => panic!("unexpected error: {other:?}"),
        }

        // The child was discarded; a fresh one is spawned and fails the same way.
        let again = tokio_test::assert_err!(transport.call("fit_response_surface", json!({})).await);
        assert_eq!(again.kind(), "malformed_response");
    }

    #[test]
    fn command_line_parsing() {
        let transport = StdioTransport::from_command_line("rsm-measurement-server --quiet").unwrap();
        assert_eq!(transport.describe(), "stdio:rsm-measurement-server");
        assert!(StdioTransport::from_command_line("   ").is_err());
    }
}
