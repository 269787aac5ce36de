//! Build-result intake (§4.3 "Build-result intake"): consumes a
//! result-request manifest posted by an agent and transitions the
//! matching `build` row, or logs and ignores it if the session has
//! expired.
//!
//! Split the way `repoctl-scheduler` splits pure decision logic from
//! database orchestration: `validate`, `result_kind`, `skip`,
//! `interrupt`, and `recipients` are pure and directly testable;
//! `intake` does the database work and talks to the injected
//! `EmailSink`/`ServiceClient` collaborators.

pub mod email;
pub mod intake;
pub mod interrupt;
pub mod recipients;
pub mod result_kind;
pub mod skip;
pub mod validate;

pub use intake::IntakeProcessor;
