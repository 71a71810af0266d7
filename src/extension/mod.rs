//! Generic primitives for extension resources
//!
//! Extension resources are namespaced objects whose spec is written by this
//! crate and whose status is written by an out-of-process extension
//! controller. Everything here is generic over [`ExtensionObject`]:
//!
//! - [`create_or_update`] - fetch-or-initialize, mutate, one write
//! - [`check_extension_object`] - readiness of a published status
//! - [`wait_until_ready`] / [`wait_until_deleted`] - bounded convergence waits
//! - [`delete_extension`] - confirm and delete

mod store;

pub use store::{KubeStore, ObjectStore};

#[cfg(test)]
pub(crate) use store::MemoryStore;

use std::fmt::Debug;

use kube::core::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::WaitOptions;
use crate::crd::{Infrastructure, LastError, LastOperation};
use crate::wait::poll_until_converged;
use crate::{Error, Result, ANNOTATION_CONFIRM_DELETION, ANNOTATION_OPERATION};

/// A namespaced resource reconciled by an extension controller
pub trait ExtensionObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// A zero-valued object with only its identity set
    fn empty(namespace: &str, name: &str) -> Self;

    /// Last operation reported by the extension controller
    fn last_operation(&self) -> Option<&LastOperation>;

    /// Last error reported by the extension controller
    fn last_error(&self) -> Option<&LastError>;

    /// Generation the extension controller last acted on
    fn observed_generation(&self) -> Option<i64>;
}

impl ExtensionObject for Infrastructure {
    fn empty(namespace: &str, name: &str) -> Self {
        let mut infra = Infrastructure::new(name, Default::default());
        infra.metadata.namespace = Some(namespace.to_string());
        infra
    }

    fn last_operation(&self) -> Option<&LastOperation> {
        self.status.as_ref().and_then(|s| s.last_operation.as_ref())
    }

    fn last_error(&self) -> Option<&LastError> {
        self.status.as_ref().and_then(|s| s.last_error.as_ref())
    }

    fn observed_generation(&self) -> Option<i64> {
        self.status.as_ref().and_then(|s| s.observed_generation)
    }
}

/// Which write [`create_or_update`] issued
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyResult {
    /// The object did not exist and was created
    Created,
    /// The object existed and was replaced
    Updated,
}

/// `namespace/name` of an object, used in diagnostics
pub fn object_key<K: ResourceExt>(obj: &K) -> String {
    format!(
        "{}/{}",
        obj.namespace().unwrap_or_default(),
        obj.name_any()
    )
}

/// Create or update the object `namespace/name`
///
/// The current object is fetched, or a zero-valued one with only identity set
/// is used when absent. `mutate` edits it in place; exactly one create or
/// replace follows. Changing the identity inside `mutate` is rejected before
/// anything is written.
pub async fn create_or_update<K, F>(
    store: &dyn ObjectStore<K>,
    namespace: &str,
    name: &str,
    mutate: F,
) -> Result<(K, ApplyResult)>
where
    K: ExtensionObject,
    F: FnOnce(&mut K) -> Result<()> + Send,
{
    let existing = store.get(namespace, name).await?;
    let exists = existing.is_some();
    let mut obj = existing.unwrap_or_else(|| K::empty(namespace, name));

    mutate(&mut obj)?;

    if obj.meta().name.as_deref() != Some(name) || obj.meta().namespace.as_deref() != Some(namespace)
    {
        return Err(Error::validation(format!(
            "mutation changed identity of {} {}/{}",
            K::kind(&()),
            namespace,
            name
        )));
    }

    if exists {
        let updated = store.replace(namespace, name, &obj).await?;
        debug!(kind = %K::kind(&()), %namespace, object = %name, "replaced extension resource");
        Ok((updated, ApplyResult::Updated))
    } else {
        let created = store.create(namespace, &obj).await?;
        info!(kind = %K::kind(&()), %namespace, object = %name, "created extension resource");
        Ok((created, ApplyResult::Created))
    }
}

/// Check whether an extension controller has converged on `obj`
///
/// Returns [`Error::Extension`] when a `lastError` is published and
/// [`Error::NotReady`] for every other reason the object is not ready yet.
pub fn check_extension_object<K: ExtensionObject>(obj: &K) -> Result<()> {
    let kind = K::kind(&()).to_string();
    let key = object_key(obj);

    if let Some(generation) = obj.meta().generation {
        if obj.observed_generation() != Some(generation) {
            return Err(Error::not_ready(
                kind,
                key,
                format!(
                    "observed generation {:?} does not match generation {}",
                    obj.observed_generation(),
                    generation
                ),
            ));
        }
    }

    if let Some(op) = obj.annotations().get(ANNOTATION_OPERATION) {
        return Err(Error::not_ready(
            kind,
            key,
            format!("operation annotation {op:?} still present"),
        ));
    }

    if let Some(last_error) = obj.last_error() {
        return Err(Error::Extension {
            kind,
            name: key,
            message: last_error.description.clone(),
            codes: last_error.codes.clone(),
        });
    }

    match obj.last_operation() {
        Some(op) if op.succeeded() => Ok(()),
        Some(op) => Err(Error::not_ready(
            kind,
            key,
            format!("last operation {} is {}", op.type_, op.state),
        )),
        None => Err(Error::not_ready(kind, key, "no last operation reported yet")),
    }
}

/// Wait until `namespace/name` exists and passes [`check_extension_object`]
///
/// Returns the ready object.
pub async fn wait_until_ready<K: ExtensionObject>(
    store: &dyn ObjectStore<K>,
    namespace: &str,
    name: &str,
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<K> {
    let kind = K::kind(&()).to_string();
    let key = format!("{namespace}/{name}");

    let outcome = poll_until_converged(
        move || store.get(namespace, name),
        |obj: Option<&K>| match obj {
            Some(obj) => check_extension_object(obj).map(|()| true),
            None => Ok(false),
        },
        options.interval,
        options.timeout,
        cancel,
    )
    .await?;

    outcome
        .into_result(&kind, &key)?
        .ok_or_else(|| Error::internal(format!("{kind} {key} converged without a snapshot")))
}

/// Wait until `namespace/name` no longer exists
///
/// A `lastError` on the still-present object becomes the timeout diagnostic.
pub async fn wait_until_deleted<K: ExtensionObject>(
    store: &dyn ObjectStore<K>,
    namespace: &str,
    name: &str,
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let kind = K::kind(&()).to_string();
    let key = format!("{namespace}/{name}");

    let outcome = poll_until_converged(
        move || store.get(namespace, name),
        |obj: Option<&K>| match obj.and_then(|o| o.last_error()) {
            Some(last_error) => Err(Error::Extension {
                kind: kind.clone(),
                name: key.clone(),
                message: last_error.description.clone(),
                codes: last_error.codes.clone(),
            }),
            None => Ok(obj.is_none()),
        },
        options.interval,
        options.timeout,
        cancel,
    )
    .await?;

    outcome.into_result(&kind, &key).map(|_| ())
}

/// Confirm and delete `namespace/name`
///
/// The deletion confirmation annotation is added first if the object exists
/// and lacks it. An absent object is success.
pub async fn delete_extension<K: ExtensionObject>(
    store: &dyn ObjectStore<K>,
    namespace: &str,
    name: &str,
) -> Result<()> {
    let Some(mut obj) = store.get(namespace, name).await? else {
        debug!(kind = %K::kind(&()), %namespace, object = %name, "extension resource already gone");
        return Ok(());
    };

    if obj.annotations().get(ANNOTATION_CONFIRM_DELETION).map(String::as_str) != Some("true") {
        obj.annotations_mut()
            .insert(ANNOTATION_CONFIRM_DELETION.to_string(), "true".to_string());
        match store.replace(namespace, name, &obj).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        }
    }

    store.delete(namespace, name).await?;
    info!(kind = %K::kind(&()), %namespace, object = %name, "deleted extension resource");
    Ok(())
}
