//! Guard conditions (`only_if` / `not_if`)
//!
//! A guard gates whether a resource's action runs at all. The test is
//! either a shell command (satisfied when it exits zero) or a predicate
//! over the node. A command that cannot be executed counts as not
//! satisfied unless the guard is marked strict, in which case the error
//! is fatal.

use crate::error::{Error, Result};
use crate::node::Node;
use crate::shell::ShellCommand;
use std::fmt;
use std::sync::Arc;

/// Which way the guard gates the action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    /// Run the action only if the test is satisfied
    OnlyIf,
    /// Skip the action if the test is satisfied
    NotIf,
}

/// The test a guard evaluates
#[derive(Clone)]
pub enum GuardTest {
    /// Shell command; satisfied when it exits zero
    Command(ShellCommand),
    /// Predicate over the node's current attributes
    Predicate(Arc<dyn Fn(&Node) -> bool + Send + Sync>),
}

impl fmt::Debug for GuardTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(cmd) => f.debug_tuple("Command").field(&cmd.command).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A single `only_if` or `not_if` condition on a resource
#[derive(Debug, Clone)]
pub struct Guard {
    pub kind: GuardKind,
    pub test: GuardTest,
    /// Treat a command that fails to execute as a fatal error instead
    /// of an unsatisfied test
    pub strict: bool,
}

impl Guard {
    pub fn only_if_command(command: ShellCommand) -> Self {
        Self {
            kind: GuardKind::OnlyIf,
            test: GuardTest::Command(command),
            strict: false,
        }
    }

    pub fn not_if_command(command: ShellCommand) -> Self {
        Self {
            kind: GuardKind::NotIf,
            test: GuardTest::Command(command),
            strict: false,
        }
    }

    pub fn only_if(predicate: impl Fn(&Node) -> bool + Send + Sync + 'static) -> Self {
        Self {
            kind: GuardKind::OnlyIf,
            test: GuardTest::Predicate(Arc::new(predicate)),
            strict: false,
        }
    }

    pub fn not_if(predicate: impl Fn(&Node) -> bool + Send + Sync + 'static) -> Self {
        Self {
            kind: GuardKind::NotIf,
            test: GuardTest::Predicate(Arc::new(predicate)),
            strict: false,
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Whether the gated action should proceed
    pub fn passes(&self, node: &Node) -> Result<bool> {
        let satisfied = self.satisfied(node)?;
        Ok(match self.kind {
            GuardKind::OnlyIf => satisfied,
            GuardKind::NotIf => !satisfied,
        })
    }

    fn satisfied(&self, node: &Node) -> Result<bool> {
        match &self.test {
            GuardTest::Predicate(predicate) => Ok(predicate(node)),
            GuardTest::Command(command) => match command.run() {
                Ok(output) => Ok(output.success),
                Err(Error::Io(err)) if self.strict => {
                    Err(Error::GuardExecution(err.to_string()))
                }
                Err(err) if self.strict => Err(err),
                Err(err) => {
                    log::warn!(
                        "guard command '{}' could not be evaluated, treating as unsatisfied: {err}",
                        command.command
                    );
                    Ok(false)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn node() -> Node {
        Node::new("latte")
    }

    #[test]
    fn only_if_true_passes_and_not_if_true_blocks() {
        let command = || ShellCommand::new("true");
        assert!(Guard::only_if_command(command()).passes(&node()).unwrap());
        assert!(!Guard::not_if_command(command()).passes(&node()).unwrap());
    }

    #[test]
    fn only_if_false_blocks_and_not_if_false_passes() {
        let command = || ShellCommand::new("false");
        assert!(!Guard::only_if_command(command()).passes(&node()).unwrap());
        assert!(Guard::not_if_command(command()).passes(&node()).unwrap());
    }

    #[test]
    fn predicate_guards_see_the_node() {
        let mut n = node();
        n.set_normal("role", serde_json::json!("db"));
        let guard = Guard::only_if(|node| node.get_str("role") == Some("db"));
        assert!(guard.passes(&n).unwrap());
    }

    #[test]
    fn timed_out_guard_counts_as_unsatisfied() {
        let command = ShellCommand::new("sleep 30").timeout(Duration::from_millis(50));
        // only_if unsatisfied => action blocked
        assert!(!Guard::only_if_command(command.clone()).passes(&node()).unwrap());
        // not_if unsatisfied => action proceeds
        assert!(Guard::not_if_command(command).passes(&node()).unwrap());
    }

    #[test]
    fn strict_guard_surfaces_execution_errors() {
        let command = ShellCommand::new("sleep 30").timeout(Duration::from_millis(50));
        let err = Guard::only_if_command(command)
            .strict()
            .passes(&node())
            .unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));
    }
}
