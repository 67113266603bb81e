//! Line-delimited request/response server.
//!
//! Each input line is one JSON request; each request gets exactly one JSON
//! response line, flushed before the next line is read.

use evoagent_evolution::OptimizationConfig;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::UnixStream;
use tracing::{debug, error, info, warn};

use crate::handlers::{
    CommandsHandler, EvaluateHandler, MutateHandler, OptimizeHandler, PingHandler,
};
use crate::{BridgeError, CommandHandler, HandlerRegistry, Request, Response, Result};

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Server name reported by `info`
    pub server_name: String,
    /// Server version
    pub version: String,
    /// Seed used by requests that carry none
    pub seed: Option<u64>,
    /// Parameters used when an `optimize` request omits them
    pub optimize_defaults: OptimizationConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_name: "evoagent".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            seed: None,
            optimize_defaults: OptimizationConfig::default(),
        }
    }
}

/// Serves registered commands over a line-delimited stream.
pub struct Bridge {
    config: BridgeConfig,
    registry: HandlerRegistry,
}

impl Bridge {
    /// Create a bridge with default config.
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    /// Create a bridge with custom config and the built-in commands registered.
    pub fn with_config(config: BridgeConfig) -> Self {
        let mut bridge = Self {
            config,
            registry: HandlerRegistry::new(),
        };
        bridge.register_builtin_commands();
        bridge
    }

    /// Get the bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Get the handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Register an extra command. Must happen before serving.
    pub fn register(&mut self, name: impl Into<String>, handler: impl CommandHandler + 'static) {
        self.registry.register(name, handler);
        let names = self.command_names();
        self.registry.register("commands", CommandsHandler::new(names));
    }

    fn command_names(&self) -> Vec<String> {
        let mut names = self.registry.names();
        if !names.iter().any(|n| n == "commands") {
            names.push("commands".to_string());
            names.sort();
        }
        names
    }

    fn register_builtin_commands(&mut self) {
        let seed = self.config.seed;
        let defaults = self.config.optimize_defaults.clone();
        let rate = defaults.mutation_rate;

        self.registry.register("optimize", OptimizeHandler::new(defaults, seed));
        self.registry.register("evaluate", EvaluateHandler::new(seed));
        self.registry.register("mutate", MutateHandler::new(rate, seed));
        self.registry.register("ping", PingHandler);

        let names = self.command_names();
        self.registry.register("commands", CommandsHandler::new(names));
    }

    /// Dispatch a parsed request to its handler.
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request { command, data } = request;
        let Some(handler) = self.registry.get(&command) else {
            let err = BridgeError::UnknownCommand(command.clone());
            warn!("{}", err);
            return Response::err(Some(command), &err);
        };

        debug!("Dispatching command: {}", command);
        match handler.handle(data).await {
            Ok(result) => Response::ok(command, result),
            Err(err) => {
                error!("Command {} failed: {}", command, err);
                Response::err(Some(command), &err)
            }
        }
    }

    /// Handle one raw input line.
    pub async fn handle_line(&self, line: &str) -> Response {
        match Request::parse(line) {
            Ok(request) => self.dispatch(request).await,
            Err(err) => {
                error!("Failed to parse request: {}", err);
                Response::err(None, &err)
            }
        }
    }

    /// Serve requests until the reader is exhausted.
    ///
    /// Returns the number of responses written. Blank lines are skipped; a
    /// line that is not valid UTF-8 gets a parse error response.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        let mut handled = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.handle_line(line).await
                }
                Err(e) => {
                    let err = BridgeError::Parse(format!("invalid UTF-8: {}", e));
                    error!("Failed to decode request: {}", err);
                    Response::err(None, &err)
                }
            };
            write_response(&mut writer, &response).await?;
            handled += 1;
        }

        Ok(handled)
    }

    /// Serve on stdin/stdout.
    pub async fn start_with_stdio(&self) -> Result<()> {
        info!(
            "Starting {} bridge v{} (stdio transport)",
            self.config.server_name, self.config.version
        );

        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = BufWriter::new(tokio::io::stdout());
        let handled = self.serve(stdin, stdout).await?;

        info!("Input closed after {} requests, bridge stopped", handled);
        Ok(())
    }

    /// Serve on a Unix socket, one connection at a time.
    pub async fn start_with_socket(&self, socket_path: &std::path::Path) -> Result<()> {
        info!(
            "Starting {} bridge v{} (socket transport at {})",
            self.config.server_name,
            self.config.version,
            socket_path.display()
        );

        // Remove a stale socket file
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }

        let listener = tokio::net::UnixListener::bind(socket_path)?;

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            if let Err(e) = self.handle_connection(stream).await {
                                error!("Connection failed: {}", e);
                            }
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    break;
                }
            }
        }

        info!("Bridge stopped");
        Ok(())
    }

    async fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        let (reader, writer) = stream.into_split();
        let handled = self.serve(BufReader::new(reader), BufWriter::new(writer)).await?;
        debug!("Connection closed after {} requests", handled);
        Ok(())
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_response<W>(writer: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = serde_json::to_string(response)?;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    async fn run_lines(bridge: &Bridge, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        bridge.serve(input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn seeded_bridge() -> Bridge {
        Bridge::with_config(BridgeConfig {
            seed: Some(17),
            ..Default::default()
        })
    }

    #[test]
    fn test_builtin_commands_registered() {
        let bridge = Bridge::new();
        assert_eq!(
            bridge.registry().names(),
            vec!["commands", "evaluate", "mutate", "optimize", "ping"]
        );
    }

    #[test]
    fn test_bridge_config_default() {
        let config = BridgeConfig::default();
        assert_eq!(config.server_name, "evoagent");
        assert!(!config.version.is_empty());
        assert!(config.seed.is_none());
        assert_eq!(config.optimize_defaults.population_size, 10);
    }

    #[tokio::test]
    async fn test_optimize_line() {
        let bridge = seeded_bridge();
        let input = r#"{"command":"optimize","data":{"population_size":4,"max_generations":3,"threshold":0.0,"agent_instruction":{"systemPrompt":"x"}}}"#;
        let responses = run_lines(&bridge, &format!("{}\n", input)).await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["success"], true);
        assert_eq!(responses[0]["command"], "optimize");
        assert_eq!(responses[0]["result"]["generations_run"], 1);
        assert_eq!(responses[0]["result"]["converged"], true);
    }

    #[tokio::test]
    async fn test_unknown_command_then_continue() {
        let bridge = seeded_bridge();
        let input = "{\"command\":\"nope\",\"data\":{}}\n{\"command\":\"ping\",\"data\":{}}\n";
        let responses = run_lines(&bridge, input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["success"], false);
        assert!(!responses[0]["error"].as_str().unwrap().is_empty());
        assert_eq!(responses[1]["success"], true);
        assert_eq!(responses[1]["result"]["status"], "pong");
    }

    #[tokio::test]
    async fn test_malformed_line_then_continue() {
        let bridge = seeded_bridge();
        let input = "this is not json\n{\"command\":\"ping\"}\n";
        let responses = run_lines(&bridge, input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["success"], false);
        assert!(responses[0].get("command").is_none());
        assert!(responses[0]["error"].as_str().unwrap().starts_with("Parse error"));
        assert_eq!(responses[1]["success"], true);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_then_continue() {
        let bridge = seeded_bridge();
        let input: &[u8] = b"{\"command\":\"ping\"}\n{\"command\":\"p\xffng\"}\n{\"command\":\"ping\"}\n";
        let mut output = Vec::new();
        let handled = bridge.serve(input, &mut output).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(handled, 3);
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["success"], true);
        assert_eq!(responses[1]["success"], false);
        assert!(responses[1]["error"].as_str().unwrap().starts_with("Parse error"));
        assert_eq!(responses[2]["success"], true);
        assert_eq!(responses[2]["result"]["status"], "pong");
    }

    #[tokio::test]
    async fn test_blank_lines_skipped() {
        let bridge = seeded_bridge();
        let mut output = Vec::new();
        let handled = bridge
            .serve("\n   \n{\"command\":\"ping\"}\n\n".as_bytes(), &mut output)
            .await
            .unwrap();

        assert_eq!(handled, 1);
        assert_eq!(String::from_utf8(output).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_reports_error() {
        let bridge = seeded_bridge();
        let input = concat!(
            "{\"command\":\"optimize\",\"data\":{\"population_size\":0}}\n",
            "{\"command\":\"optimize\",\"data\":{\"mutation_rate\":2.5}}\n",
            "{\"command\":\"ping\"}\n",
        );
        let responses = run_lines(&bridge, input).await;

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["success"], false);
        assert_eq!(responses[0]["command"], "optimize");
        assert!(responses[0]["error"].as_str().unwrap().contains("population_size"));
        assert!(responses[1]["error"].as_str().unwrap().contains("mutation_rate"));
        assert_eq!(responses[2]["success"], true);
    }

    #[tokio::test]
    async fn test_seeded_optimize_is_reproducible() {
        let bridge = seeded_bridge();
        let line = "{\"command\":\"optimize\",\"data\":{\"population_size\":5,\"max_generations\":8,\"agent_instruction\":{\"systemPrompt\":\"Help users.\"}}}\n";
        let responses = run_lines(&bridge, &format!("{}{}", line, line)).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0], responses[1]);

        let result = &responses[0]["result"];
        let best = result["best_score"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&best));
        for record in result["history"].as_array().unwrap() {
            assert!(record["best_score"].as_f64().unwrap() <= best);
        }
    }

    #[tokio::test]
    async fn test_commands_lists_registered() {
        let bridge = Bridge::new();
        let response = bridge.handle_line("{\"command\":\"commands\"}").await;

        assert!(response.success);
        let result = response.result.unwrap();
        assert!(result["commands"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c == "optimize"));
    }

    struct Fail;

    #[async_trait]
    impl CommandHandler for Fail {
        async fn handle(&self, _data: Value) -> Result<Value> {
            Err(BridgeError::Handler("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_custom_handler_failure() {
        let mut bridge = Bridge::new();
        bridge.register("fail", Fail);

        let response = bridge.handle_line("{\"command\":\"fail\",\"data\":{}}").await;
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": false, "command": "fail", "error": "Handler failed: boom"})
        );

        let listed = bridge.handle_line("{\"command\":\"commands\"}").await;
        assert!(listed.result.unwrap()["commands"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c == "fail"));
    }
}
