//! Content publishing and versioning engine.
//!
//! Leaf-first: the component tree and version stores work inside a caller's
//! transaction, the diff engine is pure, the lifecycle controller owns page
//! status, and the two services tie them together one transaction per call.

pub mod component_tree;
pub mod diff;
mod error;
pub mod lifecycle;
mod page_service;
mod publishing;
pub mod version_store;

pub use diff::{
    ComponentDiff, DiffStrategy, DiffStrategyKind, DiffSummary, FieldChange, IdentityDiff,
    ModifiedComponent, PositionalDiff, VersionDiff,
};
pub use error::{ContentError, ContentResult};
pub use lifecycle::{
    ApprovalPolicy, Lifecycle, Transition, TransitionContext, TransitionRequest, Trigger,
};
pub use page_service::{PageService, SavedPage};
pub use publishing::{ApprovalOutcome, OverduePage, PublishingService};
