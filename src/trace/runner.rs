// Trace runner - executes the platform path-tracing utility
//
// Every failure mode (missing tool, timeout, abnormal exit) degrades to
// "no hops found" instead of an error, so callers always get text back.

use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::{TraceSettings, TraceStrategy, TraceTarget};

/// Runs one bounded trace per call
#[derive(Debug, Clone)]
pub struct TraceRunner {
    strategy: TraceStrategy,
    settings: TraceSettings,
    program: Option<String>,
}

impl TraceRunner {
    pub fn new(strategy: TraceStrategy, settings: TraceSettings) -> Self {
        TraceRunner {
            strategy,
            settings,
            program: None,
        }
    }

    /// Use a different executable than the strategy's default
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn strategy(&self) -> TraceStrategy {
        self.strategy
    }

    pub fn settings(&self) -> &TraceSettings {
        &self.settings
    }

    pub fn program(&self) -> &str {
        self.program
            .as_deref()
            .unwrap_or_else(|| self.strategy.program())
    }

    /// Trace the route to `target` and return the hop lines of the output.
    ///
    /// Returns an empty string when the utility cannot be started or exits
    /// unsuccessfully. On timeout the process is killed and whatever was
    /// printed so far is returned.
    pub async fn run(&self, target: &TraceTarget) -> String {
        let program = self.program();
        let args = self.strategy.args(target, &self.settings);
        tracing::info!("Executing {} {} ({})", program, args.join(" "), self.strategy);

        let mut child = match Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to execute {}: {}", program, e);
                return String::new();
            }
        };

        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            tracing::warn!("{} started without captured output", program);
            return String::new();
        };

        // One deadline covers reading the pipes and reaping the process
        let deadline = tokio::time::Instant::now() + self.settings.process_timeout;

        let mut out = Vec::new();
        let mut err = Vec::new();
        let read_all = async {
            let (o, e) = tokio::join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err));
            o.and(e)
        };

        let mut status = None;
        if let Ok(read) = tokio::time::timeout_at(deadline, read_all).await {
            if let Err(e) = read {
                tracing::warn!("Failed reading {} output: {}", program, e);
            }
            status = tokio::time::timeout_at(deadline, child.wait()).await.ok();
        }

        if !err.is_empty() {
            tracing::debug!("{} stderr:\n{}", program, String::from_utf8_lossy(&err));
        }

        match status {
            Some(Ok(exit)) if exit.success() => {}
            Some(Ok(exit)) => {
                tracing::warn!("{} exited abnormally: {}", program, exit);
                return String::new();
            }
            Some(Err(e)) => {
                tracing::warn!("Failed waiting for {}: {}", program, e);
                return String::new();
            }
            None => {
                tracing::warn!(
                    "{} to {} timed out after {:?}, using partial output",
                    program,
                    target,
                    self.settings.process_timeout
                );
                if let Err(e) = child.start_kill() {
                    tracing::debug!("Failed to kill {}: {}", program, e);
                }
                if let Err(e) = child.wait().await {
                    tracing::debug!("Failed reaping {}: {}", program, e);
                }
            }
        }

        let stdout = String::from_utf8_lossy(&out);
        tracing::debug!("{} output:\n{}", program, stdout);

        self.strategy.strip_banner(&stdout).join("\n")
    }
}
