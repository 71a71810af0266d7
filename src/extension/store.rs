//! Object store abstraction for extension resources

use std::marker::PhantomData;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;

use super::ExtensionObject;
use crate::{Result, FIELD_MANAGER};

/// CRUD access to one kind of namespaced extension resource
///
/// Not-found is not an error for reads and deletes: `get` returns `Ok(None)`
/// and `delete` returns `Ok(())`.
#[async_trait]
pub trait ObjectStore<K: ExtensionObject>: Send + Sync {
    /// Fetch `namespace/name`, or `None` if it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    /// Create `obj` in `namespace`
    async fn create(&self, namespace: &str, obj: &K) -> Result<K>;

    /// Replace `namespace/name` with `obj`
    async fn replace(&self, namespace: &str, name: &str, obj: &K) -> Result<K>;

    /// Delete `namespace/name`
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}

/// [`ObjectStore`] backed by the Kubernetes API
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ExtensionObject> KubeStore<K> {
    /// Create a store using the given kube Client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl<K: ExtensionObject> ObjectStore<K> for KubeStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn create(&self, namespace: &str, obj: &K) -> Result<K> {
        Ok(self.api(namespace).create(&post_params(), obj).await?)
    }

    async fn replace(&self, namespace: &str, name: &str, obj: &K) -> Result<K> {
        Ok(self.api(namespace).replace(name, &post_params(), obj).await?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        match self.api(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryStore;
