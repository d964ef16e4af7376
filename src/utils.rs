use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::execution::{Execution, ExecutionMode};
use crate::logging::{ExecSink, exec_error, exec_info};
use crate::webhook::PushEvent;
use crate::{ConfigStore, RuleConfig, ServerConfig, SharedState};

/// Every rule matching both repository name and branch, in configured order.
pub fn find_matching_rules<'a>(
    config: &'a ServerConfig,
    repo_name: &'a str,
    branch: &'a str,
) -> impl Iterator<Item = &'a RuleConfig> + 'a {
    config
        .rules
        .iter()
        .filter(move |rule| rule.matches(repo_name, branch))
}

/// Run one command string through `sh -c` and log its outcome.
///
/// The log destination is read from the active configuration once the
/// command has finished, so a reload in between is honoured.
pub async fn run_command(
    config: &ConfigStore,
    project_name: &str,
    command: &str,
    mode: ExecutionMode,
) -> Execution {
    let mut execution = Execution::start(project_name, command, mode);
    debug!("Running {:?} command {}: {}", mode, execution.id, command);

    let result = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .output()
        .await;

    match result {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            if output.status.success() {
                execution.mark_success(stdout);
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stderr = stderr.trim_end();
                let error = if stderr.is_empty() {
                    output.status.to_string()
                } else {
                    format!("{}: {}", output.status, stderr)
                };
                execution.mark_failed(stdout, error);
            }
        }
        Err(e) => execution.mark_failed(String::new(), format!("failed to start: {}", e)),
    }
    debug!(
        "Command {} finished as {:?} after {} ms",
        execution.id,
        execution.status,
        execution.duration_ms().unwrap_or_default()
    );

    log_execution(
        ExecSink::from_exec_to_std(config.current().exec_to_std),
        &execution,
    );
    execution
}

fn log_execution(sink: ExecSink, execution: &Execution) {
    match &execution.error {
        None => {
            exec_info(sink, &format!("command executed: `{}`", execution.command));
            exec_info(sink, &format!("output: {}", execution.output));
        }
        Some(error) => {
            exec_error(sink, &format!("output before error: {}", execution.output));
            exec_error(sink, &format!("error: {}", error));
        }
    }
}

/// What one push event led to
#[derive(Debug, Default)]
pub struct DispatchSummary {
    pub branch: String,
    pub matched_rules: usize,
    /// Reports of inline commands, in the order they ran.
    pub executions: Vec<Execution>,
    /// Number of commands launched in the background.
    pub detached: usize,
}

/// Resolve a push event against the active rules and run every matched command.
///
/// Inline commands are awaited one after the other; detached commands are
/// spawned and left to finish on their own. A failing command never stops
/// the ones after it.
pub async fn dispatch_event(state: &SharedState, event: &PushEvent) -> DispatchSummary {
    let config = state.config.current();
    let repo_name = event.repository.name.as_str();
    let branch = event.branch();

    info!("hook ref: {}", event.git_ref);
    info!("branch: {}", branch);

    let mut summary = DispatchSummary {
        branch: branch.to_string(),
        ..Default::default()
    };

    for rule in find_matching_rules(&config, repo_name, branch) {
        summary.matched_rules += 1;
        let mode = ExecutionMode::from_detached(rule.detached);

        for command in &rule.commands {
            info!("Webhook triggered for project '{}'", rule.name);
            match mode {
                ExecutionMode::Detached => {
                    let task_state = Arc::clone(state);
                    let project_name = rule.name.clone();
                    let command = command.clone();
                    tokio::spawn(async move {
                        run_command(&task_state.config, &project_name, &command, mode).await;
                    });
                    summary.detached += 1;
                }
                ExecutionMode::Inline => {
                    let execution = run_command(&state.config, &rule.name, command, mode).await;
                    summary.executions.push(execution);
                }
            }
        }
    }

    if summary.matched_rules == 0 {
        warn!(
            "No matching rule for repository '{}' and branch '{}', skipping.",
            repo_name, branch
        );
    }

    summary
}
