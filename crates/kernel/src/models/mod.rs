//! Data models.

pub mod component;
pub mod page;
pub mod version;
pub mod workflow;

pub use component::{ComponentInput, PageComponent, normalize_components};
pub use page::{CreatePage, Page, PageFilter, PageStatus, UpdatePage, is_valid_slug};
pub use version::{PageVersion, VersionComponent, VersionMetadata, VersionSummary};
pub use workflow::{ApprovalStatus, PendingApproval, PublishingWorkflow};
