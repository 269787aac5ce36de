//! Core data model and wire types for `repoctl`: primitives (version
//! ordering, timestamps, sessions, challenges) and the persisted
//! entities (tenant, repository, package, build, public key) described
//! by the data model, plus the manifest/protocol shapes `repoctl-db`,
//! `repoctl-loader`, `repoctl-scheduler`, `repoctl-intake`, and
//! `repoctl-tenant` build on.

pub mod build;
pub mod challenge;
pub mod manifest;
pub mod package;
pub mod protocol;
pub mod repository;
pub mod scheduling;
pub mod session;
pub mod tenant;
pub mod timestamp;
pub mod version;

pub use build::{Build, BuildState, ChecksumTriple, ForceState, OperationResult, ResultStatus};
pub use challenge::Challenge;
pub use package::{
    Dependency, DependencyAlternative, DependencyGroup, EmailKind, Package, PackageConfig,
    PackageEmail, PublicKey, ResolvedDependency, TestDependency, TestKind, UnbuildableReason,
};
pub use repository::{Certificate, Repository, RepositoryInvariantViolation};
pub use scheduling::{
    BuildTargetConfig, RebuildPriority, TargetConfigMap, derive_config_name, fits_ram_budget,
    glob_match, pick_rebuild_candidate,
};
pub use session::{Session, SessionParseError, SessionParts};
pub use tenant::{BuildToolchain, DuplicateTenantMode, Tenant, TenantService};
pub use timestamp::{DaytimeWindow, Duration, Timestamp};
pub use version::{Version, VersionConstraint};
