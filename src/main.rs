//! Call one tool on a stdio MCP server and print the text it returns.

use anyhow::{Context, Result};
use clap::Parser;
use notebook_mcp_client::config::{default_server_path, DEFAULT_TOOL_NAME};
use notebook_mcp_client::{run_session, Config, LogLevel};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "list_notebooks")]
#[command(about = "List notebooks through a stdio MCP server", long_about = None)]
struct Cli {
    /// Server executable (defaults to ~/.local/bin/notebooklm-mcp)
    #[arg(short, long)]
    server: Option<PathBuf>,

    /// Argument passed to the server; repeat for several
    #[arg(long = "arg")]
    args: Vec<String>,

    /// Tool to invoke
    #[arg(short, long, default_value = DEFAULT_TOOL_NAME)]
    tool: String,

    /// Tool arguments as a JSON object
    #[arg(long, default_value = "{}")]
    arguments: String,

    /// Seconds to wait for each response, 0 to wait forever
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let tool_arguments: serde_json::Value = serde_json::from_str(&self.arguments)
            .with_context(|| format!("Invalid --arguments JSON: {}", self.arguments))?;
        if !tool_arguments.is_object() {
            anyhow::bail!("--arguments must be a JSON object, got {}", tool_arguments);
        }

        Ok(Config {
            server_path: self.server.unwrap_or_else(default_server_path),
            args: self.args,
            tool_name: self.tool,
            tool_arguments,
            response_timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            log_level: self.log_level,
            ..Config::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;

    // Logs go to stderr; stdout carries only the tool output
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(config.log_level))
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = tokio::io::stdout();
    run_session(&config, &mut stdout)
        .await
        .with_context(|| format!("Session with {} failed", config.server_path.display()))?;

    Ok(())
}
