use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::eval::{ApprovalCache, PermissionEvaluator, RuleMatch};
use crate::exec::{CommandExecutor, Confirm, ExecutionResult};
use crate::logging;

/// One agent session: its evaluator, approval cache, and executor.
///
/// Each session owns a fresh [`ApprovalCache`]; answers given in one
/// session are invisible to every other.
pub struct Session {
    evaluator: PermissionEvaluator,
    executor: CommandExecutor,
}

impl Session {
    pub fn new(evaluator: PermissionEvaluator, executor: CommandExecutor) -> Self {
        Self {
            evaluator,
            executor,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let evaluator = PermissionEvaluator::from_config(config, Arc::new(ApprovalCache::new()));
        let mut executor = CommandExecutor::new().with_auto_approve(config.settings.auto_approve);
        if let Some(secs) = config.settings.timeout_secs {
            executor = executor.with_timeout(Duration::from_secs(secs));
        }
        Self::new(evaluator, executor)
    }

    pub fn evaluator(&self) -> &PermissionEvaluator {
        &self.evaluator
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Evaluate and log, without running anything.
    pub fn check(&self, command: &str) -> RuleMatch {
        let result = self.evaluator.check(command);
        logging::log_decision(command, &result);
        result
    }

    /// Evaluate `command`, log the decision, and act on it.
    pub async fn run(&self, command: &str, confirm: &dyn Confirm) -> ExecutionResult {
        let result = self.check(command);
        self.executor.execute(command, result.decision, confirm).await
    }

    /// Cache an approval; returns rules to write back when `persist` is set.
    pub fn approve(&mut self, command: &str, persist: bool) -> Vec<String> {
        self.evaluator.approve(command, persist)
    }

    pub fn deny(&mut self, command: &str, persist: bool) -> Vec<String> {
        self.evaluator.deny(command, persist)
    }
}
