//! Controller implementation for Shoot resources
//!
//! Controllers follow the Kubernetes controller pattern: observe the shoot,
//! drive its Infrastructure towards the desired state, requeue.

mod shoot;

pub use shoot::{
    deploy_shoot, destroy_shoot, error_policy, reconcile, Context, ContextBuilder,
};
