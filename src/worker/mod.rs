//! Worker lifecycle
//!
//! Version pinning, the registration contract, the host seam and the
//! update coordinator that ties them together.

pub mod contract;
pub mod coordinator;
pub mod host;
pub mod version;

pub use contract::{check_cache_control, ContractViolation};
pub use coordinator::{AvailableUpdate, Phase, Registration, UpdateCoordinator, BRICK_WARNING};
pub use host::{
    LocalWorkerHost, UpdateViaCache, WorkerEvent, WorkerHost, WorkerInstallation, WorkerState,
};
pub use version::{versioned_url, Version, VersionStyle, DEFAULT_VERSION_LENGTH};
