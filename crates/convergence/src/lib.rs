//! # Convergence
//!
//! The convergence engine of a configuration-management agent: declared
//! resources, platform-resolved providers, guard conditions, and the
//! notification graph that lets one resource's change trigger others.
//!
//! ## Core Concepts
//!
//! - **Node**: the managed machine, with a three-tier attribute store
//!   (`default` < `normal` < `override`, merged on read)
//! - **Resource**: a declared unit of desired state
//! - **Provider**: the executor bound to one resource for one run
//! - **ResourceCollection**: resources in declaration order, with
//!   overwrite-in-place on re-declaration
//! - **Runner**: walks the collection, evaluates guards, runs actions,
//!   and drives immediate/delayed notifications
//! - **RunReport**: structured result handed to persistence/reporting
//!
//! ## Example
//!
//! ```ignore
//! use convergence::{Node, Resource, ResourceCollection, Runner};
//!
//! let node = Node::new("web1");
//! let mut collection = ResourceCollection::new();
//! collection.declare(
//!     Resource::declare("file", "/etc/motd")
//!         .action("create")
//!         .attribute("content", serde_json::json!("managed"))
//!         .build()?,
//! );
//!
//! // resolver maps (platform, version, type) -> provider
//! let report = Runner::new(&node, &mut collection, &resolver).converge();
//! assert!(report.success());
//! ```
//!
//! The engine is deliberately single-threaded: resource order is a
//! user-visible contract, later resources may depend on earlier side
//! effects.

pub mod collection;
pub mod error;
pub mod guard;
pub mod node;
pub mod notification;
pub mod provider;
pub mod report;
pub mod resource;
pub mod runner;
pub mod shell;

// Re-export main types at crate root
pub use collection::ResourceCollection;
pub use error::{Error, Result};
pub use guard::{Guard, GuardKind, GuardTest};
pub use node::Node;
pub use notification::{Notification, Timing};
pub use provider::{ActionOutcome, CurrentState, Provider, ProviderContext, ProviderResolver};
pub use report::{FailureDetail, OutcomeState, ResourceOutcome, RunReport, RunSummary};
pub use resource::{Action, Resource, ResourceBuilder, ResourceId};
pub use runner::Runner;
pub use shell::{CommandOutput, ShellCommand};
