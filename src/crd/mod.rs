//! Custom Resource Definitions used by the reconciler
//!
//! The reconciler owns the spec of [`Infrastructure`] and reads its owner,
//! the [`Shoot`].

mod infrastructure;
mod shoot;
mod types;

pub use infrastructure::{Infrastructure, InfrastructureSpec, InfrastructureStatus};
pub use shoot::{Hibernation, Networking, Shoot, ShootProvider, ShootSpec, ShootStatus};
pub use types::{
    preserve_unknown_fields, LastError, LastOperation, LastOperationState, LastOperationType,
    SecretReference,
};
