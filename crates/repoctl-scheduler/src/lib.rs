//! Build task scheduler (§4.2 "Build scheduler"): answers an agent's
//! `?build-task` request by running pre-checks, searching buildable
//! packages for a dispatchable tuple, persisting the selection inside a
//! serializable transaction, and notifying the owning tenant's service.
//!
//! Split the way `repoctl-loader` splits resolution from orchestration:
//! `precheck`, `select`, `interactive`, and `auxiliary` are pure and
//! database-free so the selection invariants in §8 are directly
//! testable; `dispatch` and `delay` do the actual database work.

pub mod auxiliary;
pub mod delay;
pub mod dispatch;
pub mod interactive;
pub mod notify;
pub mod precheck;
pub mod select;

pub use dispatch::Dispatcher;
