//! The convergence runner
//!
//! Walks the resource collection in order: evaluates guards, resolves a
//! provider, loads current state, runs the action, tracks updates, and
//! drives the notification protocol. Immediate notifications run their
//! target inline (cascading transitively); delayed notifications queue
//! until every resource has been processed, then fire once per
//! `(target, action)` pair in first-encounter order.

use crate::collection::ResourceCollection;
use crate::error::{Error, Result};
use crate::guard::GuardKind;
use crate::node::Node;
use crate::notification::Timing;
use crate::provider::{ActionOutcome, ProviderContext, ProviderResolver};
use crate::report::{FailureDetail, OutcomeState, ResourceOutcome, RunReport};
use crate::resource::{Action, Resource, ResourceId};
use chrono::Utc;
use std::collections::HashSet;
use std::time::Instant;

/// Single-run convergence driver
pub struct Runner<'a> {
    node: &'a Node,
    resolver: &'a dyn ProviderResolver,
    collection: &'a mut ResourceCollection,
    outcomes: Vec<ResourceOutcome>,
    delayed: Vec<QueuedNotification>,
    failure: Option<FailureDetail>,
}

#[derive(Debug, Clone)]
struct QueuedNotification {
    notifying: ResourceId,
    target: ResourceId,
    action: Action,
}

impl<'a> Runner<'a> {
    pub fn new(
        node: &'a Node,
        collection: &'a mut ResourceCollection,
        resolver: &'a dyn ProviderResolver,
    ) -> Self {
        let outcomes = collection
            .iter()
            .map(|resource| ResourceOutcome {
                resource: resource.id().clone(),
                action: resource.action().to_string(),
                state: OutcomeState::Pending,
                current: None,
                error: None,
                ignored: false,
                source_line: resource.source_line().map(str::to_string),
            })
            .collect();
        Self {
            node,
            resolver,
            collection,
            outcomes,
            delayed: Vec::new(),
            failure: None,
        }
    }

    /// Converge every resource, then fire the delayed queue. The report
    /// is produced even when the run aborts; `failure` carries the
    /// fatal error detail in that case.
    pub fn converge(mut self) -> RunReport {
        let started_at = Utc::now();
        let clock = Instant::now();

        log::info!(
            "starting convergence run for node '{}' ({} resources)",
            self.node.name(),
            self.collection.len()
        );

        let mut aborted = false;
        for idx in 0..self.collection.len() {
            if let Err(err) = self.run_resource(idx, None) {
                log::error!("run aborted: {err}");
                aborted = true;
                break;
            }
        }

        if !aborted {
            if let Err(err) = self.fire_delayed() {
                log::error!("run aborted while firing delayed notifications: {err}");
            }
        }

        let finished_at = Utc::now();
        RunReport {
            node_name: self.node.name().to_string(),
            attributes: self.node.merged(),
            started_at,
            finished_at,
            elapsed_seconds: clock.elapsed().as_secs_f64(),
            resources: self.outcomes,
            failure: self.failure,
        }
    }

    /// Run one resource, with `action_override` set for notified runs
    fn run_resource(&mut self, idx: usize, action_override: Option<Action>) -> Result<()> {
        let resource = self.collection.at(idx).clone();
        let action = action_override.unwrap_or_else(|| resource.action().clone());

        if !self.guards_pass(idx, &resource, &action)? {
            return Ok(());
        }

        if action.is_nothing() {
            self.settle(idx, OutcomeState::Unchanged);
            return Ok(());
        }

        let mut provider = match self.resolver.resolve(self.node, &resource) {
            Ok(provider) => provider,
            Err(err) => return self.fail(idx, &resource, &action, err),
        };

        let ctx = ProviderContext { node: self.node };
        let current = match provider.load_current(&resource, &ctx) {
            Ok(current) => current,
            Err(err) => return self.fail(idx, &resource, &action, err),
        };
        // Keep the observed state around even if the action fails
        self.outcomes[idx].current = current.clone();

        match provider.run_action(&resource, current.as_ref(), &action, &ctx) {
            Err(err) => self.fail(idx, &resource, &action, err),
            Ok(ActionOutcome::Unchanged) => {
                log::debug!("{resource} ({action}) already converged");
                self.settle(idx, OutcomeState::Unchanged);
                Ok(())
            }
            Ok(ActionOutcome::Changed { description }) => {
                log::info!("{resource} ({action}) updated: {description}");
                self.collection.at_mut(idx).mark_updated();
                self.outcomes[idx].state = OutcomeState::Updated;
                self.process_notifications(&resource)
            }
        }
    }

    /// Evaluate `not_if` guards, then `only_if` guards. Returns whether
    /// the action should run; a blocked action is recorded as skipped.
    fn guards_pass(&mut self, idx: usize, resource: &Resource, action: &Action) -> Result<bool> {
        for kind in [GuardKind::NotIf, GuardKind::OnlyIf] {
            for guard in resource.guards().iter().filter(|g| g.kind == kind) {
                match guard.passes(self.node) {
                    Ok(true) => {}
                    Ok(false) => {
                        log::info!("{resource} ({action}) skipped by guard");
                        self.settle(idx, OutcomeState::Skipped);
                        return Ok(false);
                    }
                    Err(err) => {
                        self.fail(idx, resource, action, err)?;
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Record a failure. With `ignore_failure` the error is swallowed
    /// and the run continues; otherwise it becomes the run's fatal
    /// failure and propagates.
    fn fail(&mut self, idx: usize, resource: &Resource, action: &Action, err: Error) -> Result<()> {
        let err = match err {
            already @ Error::ActionFailed { .. } => already,
            other => Error::ActionFailed {
                resource: resource.id().to_string(),
                action: action.to_string(),
                source: other.into(),
            },
        };

        self.outcomes[idx].state = OutcomeState::Failed;
        self.outcomes[idx].error = Some(err.to_string());
        self.outcomes[idx].ignored = resource.ignore_failure();

        if resource.ignore_failure() {
            log::warn!("{resource} failed but ignore_failure is set, continuing: {err}");
            return Ok(());
        }

        if let Some(line) = resource.source_line() {
            log::error!("{resource} ({action}) failed, declared at {line}");
        }
        self.failure = Some(FailureDetail {
            resource: resource.id().clone(),
            action: action.to_string(),
            message: err.to_string(),
            source_line: resource.source_line().map(str::to_string),
        });
        Err(err)
    }

    /// Fire the notifications of a resource that actually changed
    fn process_notifications(&mut self, resource: &Resource) -> Result<()> {
        for notification in resource.notifications().to_vec() {
            match notification.timing {
                Timing::Immediate => {
                    let Some(target_idx) = self.collection.position(&notification.target) else {
                        let err = Error::NotificationTargetMissing {
                            notifying: resource.id().to_string(),
                            target: notification.target.to_string(),
                        };
                        let idx = self.collection.position(resource.id()).unwrap_or(0);
                        // Ok here means the notifying resource ignores failures
                        self.fail(idx, resource, &notification.action, err)?;
                        continue;
                    };
                    log::info!(
                        "{resource} notifies {} ({}) immediately",
                        notification.target,
                        notification.action
                    );
                    self.run_resource(target_idx, Some(notification.action))?;
                }
                Timing::Delayed => {
                    log::debug!(
                        "{resource} queues delayed notification to {} ({})",
                        notification.target,
                        notification.action
                    );
                    self.delayed.push(QueuedNotification {
                        notifying: resource.id().clone(),
                        target: notification.target,
                        action: notification.action,
                    });
                }
            }
        }
        Ok(())
    }

    /// Fire queued delayed notifications in encounter order, once per
    /// `(target, action)` pair. A target that changes may queue further
    /// delayed notifications, so the queue is drained until empty.
    fn fire_delayed(&mut self) -> Result<()> {
        if self.delayed.is_empty() {
            return Ok(());
        }

        log::info!("firing {} delayed notification(s)", self.delayed.len());
        let mut seen: HashSet<(ResourceId, Action)> = HashSet::new();
        while !self.delayed.is_empty() {
            let queued = std::mem::take(&mut self.delayed);
            for entry in queued {
                if !seen.insert((entry.target.clone(), entry.action.clone())) {
                    continue;
                }
                let Some(target_idx) = self.collection.position(&entry.target) else {
                    let err = Error::NotificationTargetMissing {
                        notifying: entry.notifying.to_string(),
                        target: entry.target.to_string(),
                    };
                    match self.collection.position(&entry.notifying) {
                        Some(idx) => {
                            let notifying = self.collection.at(idx).clone();
                            self.fail(idx, &notifying, &entry.action, err)?;
                            continue;
                        }
                        None => return Err(err),
                    }
                };
                self.run_resource(target_idx, Some(entry.action))?;
            }
        }
        Ok(())
    }

    /// Record a terminal state without downgrading a stronger one
    fn settle(&mut self, idx: usize, state: OutcomeState) {
        let current = &self.outcomes[idx].state;
        let keep = matches!(current, OutcomeState::Updated | OutcomeState::Failed)
            || (matches!(current, OutcomeState::Unchanged) && state == OutcomeState::Skipped);
        if !keep {
            self.outcomes[idx].state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::Guard;
    use crate::notification::Notification;
    use crate::provider::{CurrentState, Provider};
    use crate::shell::ShellCommand;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Scripted provider: records every action in a shared log and
    /// reports changed/unchanged/failure per the resource's attributes.
    #[derive(Debug)]
    struct ScriptedProvider {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Provider for ScriptedProvider {
        fn load_current(
            &mut self,
            resource: &Resource,
            _ctx: &ProviderContext<'_>,
        ) -> crate::error::Result<Option<CurrentState>> {
            Ok(Some(CurrentState::new().with(
                "observed",
                json!(resource.name()),
            )))
        }

        fn run_action(
            &mut self,
            resource: &Resource,
            _current: Option<&CurrentState>,
            action: &Action,
            _ctx: &ProviderContext<'_>,
        ) -> crate::error::Result<ActionOutcome> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{action}", resource.name()));
            if resource.attribute("fail").and_then(|v| v.as_bool()) == Some(true) {
                return Err(Error::ActionFailed {
                    resource: resource.id().to_string(),
                    action: action.to_string(),
                    source: anyhow!("scripted failure"),
                });
            }
            if resource.attribute("changes").and_then(|v| v.as_bool()) == Some(false) {
                Ok(ActionOutcome::Unchanged)
            } else {
                Ok(ActionOutcome::changed("scripted change"))
            }
        }
    }

    struct ScriptedResolver {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ProviderResolver for ScriptedResolver {
        fn resolve(
            &self,
            _node: &Node,
            _resource: &Resource,
        ) -> crate::error::Result<Box<dyn Provider>> {
            Ok(Box::new(ScriptedProvider {
                log: Arc::clone(&self.log),
            }))
        }
    }

    fn harness() -> (Node, Arc<Mutex<Vec<String>>>, ScriptedResolver) {
        let node = Node::new("latte");
        let log = Arc::new(Mutex::new(Vec::new()));
        let resolver = ScriptedResolver {
            log: Arc::clone(&log),
        };
        (node, log, resolver)
    }

    fn step(name: &str) -> Resource {
        Resource::declare("step", name).action("run").build().unwrap()
    }

    fn taken(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn resources_run_in_declaration_order() {
        let (node, log, resolver) = harness();
        let mut collection = ResourceCollection::new();
        collection.declare(step("a"));
        collection.declare(step("b"));
        collection.declare(step("c"));

        let report = Runner::new(&node, &mut collection, &resolver).converge();
        assert!(report.success());
        assert_eq!(taken(&log), ["a:run", "b:run", "c:run"]);
        assert_eq!(report.summary().updated, 3);
    }

    #[test]
    fn not_if_true_skips_without_invoking_the_provider() {
        let (node, log, resolver) = harness();
        let mut collection = ResourceCollection::new();
        collection.declare(
            Resource::declare("step", "guarded")
                .action("run")
                .guard(Guard::not_if_command(ShellCommand::new("true")))
                .build()
                .unwrap(),
        );

        let report = Runner::new(&node, &mut collection, &resolver).converge();
        assert!(taken(&log).is_empty());
        assert_eq!(report.resources[0].state, OutcomeState::Skipped);
        assert!(!collection.lookup("step[guarded]").unwrap().updated());
    }

    #[test]
    fn only_if_false_skips() {
        let (node, log, resolver) = harness();
        let mut collection = ResourceCollection::new();
        collection.declare(
            Resource::declare("step", "guarded")
                .action("run")
                .guard(Guard::only_if(|_| false))
                .build()
                .unwrap(),
        );

        let report = Runner::new(&node, &mut collection, &resolver).converge();
        assert!(taken(&log).is_empty());
        assert_eq!(report.resources[0].state, OutcomeState::Skipped);
        assert!(report.success());
    }

    #[test]
    fn unchanged_resources_fire_no_notifications() {
        let (node, log, resolver) = harness();
        let mut collection = ResourceCollection::new();
        collection.declare(
            Resource::declare("step", "quiet")
                .action("run")
                .attribute("changes", json!(false))
                .notifies(Notification::new(
                    ResourceId::new("step", "target"),
                    Action::new("run"),
                    Timing::Delayed,
                ))
                .build()
                .unwrap(),
        );
        collection.declare(
            Resource::declare("step", "target")
                .action(Action::nothing())
                .build()
                .unwrap(),
        );

        let report = Runner::new(&node, &mut collection, &resolver).converge();
        assert_eq!(taken(&log), ["quiet:run"]);
        assert_eq!(report.resources[0].state, OutcomeState::Unchanged);
        assert_eq!(report.resources[1].state, OutcomeState::Unchanged);
    }

    #[test]
    fn immediate_notification_runs_before_the_next_resource() {
        let (node, log, resolver) = harness();
        let mut collection = ResourceCollection::new();
        collection.declare(
            Resource::declare("step", "a")
                .action("run")
                .notifies(Notification::new(
                    ResourceId::new("step", "c"),
                    Action::new("reload"),
                    Timing::Immediate,
                ))
                .build()
                .unwrap(),
        );
        collection.declare(step("b"));
        collection.declare(
            Resource::declare("step", "c")
                .action(Action::nothing())
                .build()
                .unwrap(),
        );

        let report = Runner::new(&node, &mut collection, &resolver).converge();
        assert!(report.success());
        assert_eq!(taken(&log), ["a:run", "c:reload", "b:run"]);
    }

    #[test]
    fn immediate_notifications_cascade_transitively() {
        let (node, log, resolver) = harness();
        let mut collection = ResourceCollection::new();
        collection.declare(
            Resource::declare("step", "a")
                .action("run")
                .notifies(Notification::new(
                    ResourceId::new("step", "b"),
                    Action::new("reload"),
                    Timing::Immediate,
                ))
                .build()
                .unwrap(),
        );
        collection.declare(
            Resource::declare("step", "b")
                .action(Action::nothing())
                .notifies(Notification::new(
                    ResourceId::new("step", "c"),
                    Action::new("restart"),
                    Timing::Immediate,
                ))
                .build()
                .unwrap(),
        );
        collection.declare(
            Resource::declare("step", "c")
                .action(Action::nothing())
                .build()
                .unwrap(),
        );

        let _report = Runner::new(&node, &mut collection, &resolver).converge();
        assert_eq!(taken(&log), ["a:run", "b:reload", "c:restart"]);
    }

    #[test]
    fn delayed_notifications_dedup_to_first_encounter() {
        let (node, log, resolver) = harness();
        let mut collection = ResourceCollection::new();
        let notify_b = || {
            Notification::new(
                ResourceId::new("step", "b"),
                Action::new("restart"),
                Timing::Delayed,
            )
        };
        collection.declare(
            Resource::declare("step", "a")
                .action("run")
                .notifies(notify_b())
                .build()
                .unwrap(),
        );
        collection.declare(
            Resource::declare("step", "b")
                .action(Action::nothing())
                .build()
                .unwrap(),
        );
        collection.declare(
            Resource::declare("step", "c")
                .action("run")
                .notifies(notify_b())
                .notifies(Notification::new(
                    ResourceId::new("step", "d"),
                    Action::new("restart"),
                    Timing::Delayed,
                ))
                .build()
                .unwrap(),
        );
        collection.declare(
            Resource::declare("step", "d")
                .action(Action::nothing())
                .build()
                .unwrap(),
        );

        let report = Runner::new(&node, &mut collection, &resolver).converge();
        assert!(report.success());
        // b restarts exactly once, at the first-queued position, after
        // every resource in the collection has run
        assert_eq!(
            taken(&log),
            ["a:run", "c:run", "b:restart", "d:restart"]
        );
        assert_eq!(report.resources[1].state, OutcomeState::Updated);
    }

    #[test]
    fn delayed_notifications_queued_while_firing_still_run() {
        let (node, log, resolver) = harness();
        let mut collection = ResourceCollection::new();
        collection.declare(
            Resource::declare("step", "a")
                .action("run")
                .notifies(Notification::new(
                    ResourceId::new("step", "b"),
                    Action::new("restart"),
                    Timing::Delayed,
                ))
                .build()
                .unwrap(),
        );
        // b only runs when notified, and queues a further delayed
        // notification while the delayed phase is already firing
        collection.declare(
            Resource::declare("step", "b")
                .action(Action::nothing())
                .notifies(Notification::new(
                    ResourceId::new("step", "c"),
                    Action::new("restart"),
                    Timing::Delayed,
                ))
                .build()
                .unwrap(),
        );
        collection.declare(
            Resource::declare("step", "c")
                .action(Action::nothing())
                .build()
                .unwrap(),
        );

        let report = Runner::new(&node, &mut collection, &resolver).converge();
        assert!(report.success());
        assert_eq!(taken(&log), ["a:run", "b:restart", "c:restart"]);
        assert_eq!(report.resources[2].state, OutcomeState::Updated);
    }

    #[test]
    fn failure_aborts_the_run_and_is_captured_in_the_report() {
        let (node, log, resolver) = harness();
        let mut collection = ResourceCollection::new();
        collection.declare(step("a"));
        collection.declare(
            Resource::declare("step", "boom")
                .action("run")
                .attribute("fail", json!(true))
                .build()
                .unwrap(),
        );
        collection.declare(step("never"));

        let report = Runner::new(&node, &mut collection, &resolver).converge();
        assert!(!report.success());
        assert_eq!(taken(&log), ["a:run", "boom:run"]);
        assert_eq!(report.resources[1].state, OutcomeState::Failed);
        assert!(report.resources[1].error.as_deref().unwrap().contains("scripted failure"));
        // current state loaded before the action stays in the report
        assert!(report.resources[1].current.is_some());
        assert_eq!(report.resources[2].state, OutcomeState::Pending);
        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.resource, ResourceId::new("step", "boom"));
        assert_eq!(failure.action, "run");
    }

    #[test]
    fn ignore_failure_swallows_the_error_and_continues() {
        let (node, log, resolver) = harness();
        let mut collection = ResourceCollection::new();
        collection.declare(
            Resource::declare("step", "boom")
                .action("run")
                .attribute("fail", json!(true))
                .ignore_failure(true)
                .build()
                .unwrap(),
        );
        collection.declare(step("after"));

        let report = Runner::new(&node, &mut collection, &resolver).converge();
        assert!(report.success());
        assert_eq!(taken(&log), ["boom:run", "after:run"]);
        assert_eq!(report.resources[0].state, OutcomeState::Failed);
        assert!(report.resources[0].ignored);
        assert!(!collection.lookup("step[boom]").unwrap().updated());
    }

    #[test]
    fn missing_notification_target_is_fatal() {
        let (node, _log, resolver) = harness();
        let mut collection = ResourceCollection::new();
        collection.declare(
            Resource::declare("step", "a")
                .action("run")
                .notifies(Notification::new(
                    ResourceId::new("service", "ghost"),
                    Action::new("restart"),
                    Timing::Immediate,
                ))
                .build()
                .unwrap(),
        );

        let report = Runner::new(&node, &mut collection, &resolver).converge();
        assert!(!report.success());
        let failure = report.failure.unwrap();
        assert!(failure.message.contains("service[ghost]"));
    }
}
