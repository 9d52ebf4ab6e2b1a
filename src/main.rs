use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use proxy_wasm_harness::runner::{HookCall, ProxyWasmRunner};

/// Drive a proxy-wasm filter module through synthetic or real HTTP traffic.
#[derive(Parser)]
#[command(name = "proxy-wasm-harness", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single lifecycle hook from a JSON hook-call payload
    Hook(RunArgs),
    /// Run the four-hook flow with a real outbound fetch to a target URL
    Flow {
        #[command(flatten)]
        args: RunArgs,
        /// Target URL for the outbound fetch between request and response hooks
        #[arg(long)]
        target: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the compiled guest module (.wasm)
    #[arg(long)]
    module: PathBuf,

    /// Path to a JSON hook-call payload (hook, request, response, properties)
    #[arg(long)]
    call: PathBuf,

    /// VM configuration string exposed to proxy_on_vm_start
    #[arg(long)]
    vm_config: Option<String>,

    /// Plugin configuration string exposed to proxy_on_configure
    #[arg(long)]
    plugin_config: Option<String>,
}

impl RunArgs {
    fn build_runner(&self) -> anyhow::Result<(ProxyWasmRunner, HookCall)> {
        let module_bytes = std::fs::read(&self.module)
            .with_context(|| format!("failed to read module {}", self.module.display()))?;
        let call_json = std::fs::read_to_string(&self.call)
            .with_context(|| format!("failed to read hook call {}", self.call.display()))?;
        let call: HookCall =
            serde_json::from_str(&call_json).context("invalid hook-call payload")?;

        let mut runner = ProxyWasmRunner::new()?;
        runner.set_configuration(self.vm_config.clone(), self.plugin_config.clone());
        runner.load(&module_bytes)?;
        info!("module loaded from {}", self.module.display());

        Ok((runner, call))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Hook(args) => {
            let (mut runner, call) = args.build_runner()?;
            let result = runner.call_hook(&call)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Flow { args, target } => {
            let (mut runner, call) = args.build_runner()?;
            let result = runner.call_full_flow(&call, &target).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}
