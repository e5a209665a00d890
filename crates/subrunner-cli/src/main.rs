//! subrunner - 1 セッション分だけサブスクリプションを読む CLI
//!
//! ```text
//! subrunner run <projectId> <subscriptionId> [--json]
//! ```
//!
//! Exit codes: 0 clean completion, 1 transport failure, 2 usage/config error.

mod config;
mod observability;
mod shutdown;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use subrunner_core::app::{ForwardingHandler, MessageHandler, SessionBuilder, SessionReport};
use subrunner_core::impls::{LocalContentStore, SpoolSource};
use tokio_util::sync::CancellationToken;

use crate::config::CliConfig;

const USAGE: &str = "usage: subrunner run <projectId> <subscriptionId> [--json]";

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    project_id: String,
    subscription_id: String,
    json: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<RunArgs> {
    let mut args = args.into_iter();
    match args.next().as_deref() {
        Some("run") => {}
        Some(other) => bail!("unknown command {other:?}"),
        None => bail!("missing command"),
    }

    let mut json = false;
    let mut positional = Vec::new();
    for arg in args {
        match arg.as_str() {
            "--json" => json = true,
            flag if flag.starts_with("--") => bail!("unknown flag {flag:?}"),
            _ => positional.push(arg),
        }
    }
    let [project_id, subscription_id] = <[String; 2]>::try_from(positional)
        .map_err(|got| anyhow::anyhow!("expected 2 arguments, got {}", got.len()))?;
    Ok(RunArgs {
        project_id,
        subscription_id,
        json,
    })
}

fn print_report(report: &SessionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report).context("encode report")?);
    } else {
        println!("Received {} messages", report.processed);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    observability::init_tracing();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    let config = match CliConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };

    match run(args, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: RunArgs, config: CliConfig) -> Result<ExitCode> {
    let source = Arc::new(SpoolSource::new(
        &config.spool_dir,
        &args.project_id,
        &args.subscription_id,
    ));
    let handler: Arc<dyn MessageHandler> = match &config.store_root {
        Some(root) => Arc::new(ForwardingHandler::new(
            Arc::new(LocalContentStore::new(root)),
            config.bucket.clone(),
        )),
        None => Arc::new(ForwardingHandler::log_only()),
    };

    let session = SessionBuilder::new(source, handler)
        .config(config.session)
        .build()
        .context("build session")?;
    tracing::info!(
        session_id = %session.id(),
        project = %args.project_id,
        subscription = %args.subscription_id,
        "starting"
    );

    let shutdown = CancellationToken::new();
    shutdown::cancel_on_signal(shutdown.clone());

    match session.run(shutdown).await {
        Ok(report) => {
            print_report(&report, args.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            print_report(e.report(), args.json)?;
            eprintln!("{}: {e}", e.kind());
            Ok(ExitCode::from(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<RunArgs> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn run_with_ids() {
        let got = args(&["run", "proj", "sub"]).unwrap();
        assert_eq!(
            got,
            RunArgs {
                project_id: "proj".into(),
                subscription_id: "sub".into(),
                json: false,
            }
        );
    }

    #[test]
    fn json_flag_anywhere() {
        assert!(args(&["run", "--json", "proj", "sub"]).unwrap().json);
        assert!(args(&["run", "proj", "sub", "--json"]).unwrap().json);
    }

    #[test]
    fn bad_invocations_are_rejected() {
        assert!(args(&[]).is_err());
        assert!(args(&["pull", "proj", "sub"]).is_err());
        assert!(args(&["run", "proj"]).is_err());
        assert!(args(&["run", "a", "b", "c"]).is_err());
        assert!(args(&["run", "a", "b", "--verbose"]).is_err());
    }
}
