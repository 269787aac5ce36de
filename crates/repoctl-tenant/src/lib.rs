//! Tenant/CI lifecycle (§4.4 "Tenant/CI lifecycle"): create an
//! unloaded tenant for an external CI submission, cancel it, load an
//! existing one, and the monitor-facing stalled-notification read
//! model (§4.5).
//!
//! Split the same way `repoctl-scheduler`/`repoctl-intake` split pure
//! decision logic from database orchestration: `duplicate`, `offset`,
//! and `stalled`'s pure half are directly testable; `create`, `cancel`,
//! `load`, and `start` do the database/subprocess/filesystem work.

pub mod cancel;
pub mod create;
pub mod duplicate;
pub mod email;
pub mod load;
pub mod offset;
pub mod start;
pub mod stalled;

pub use cancel::{cancel_by_id, cancel_by_service, cancel_by_service_unconditional};
pub use create::{CreateOutcome, create_unloaded_tenant};
pub use load::load_tenant;
pub use stalled::{StalledTenant, stalled_notifications};
