//! Registered resource kinds.
//!
//! Only kinds listed here can be loaded. Workload kinds additionally expose
//! the container list of their pod template through [`Workload`].

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::TypeMeta;
use crate::value::Value;

/// KindInfo describes a registered kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindInfo {
    pub api_version: &'static str,
    pub kind: &'static str,
    /// Whether objects of this kind live in a namespace.
    pub namespaced: bool,
}

const fn namespaced(api_version: &'static str, kind: &'static str) -> KindInfo {
    KindInfo {
        api_version,
        kind,
        namespaced: true,
    }
}

const fn cluster_scoped(api_version: &'static str, kind: &'static str) -> KindInfo {
    KindInfo {
        api_version,
        kind,
        namespaced: false,
    }
}

const KINDS: &[KindInfo] = &[
    namespaced("v1", "Pod"),
    namespaced("v1", "Service"),
    namespaced("v1", "ServiceAccount"),
    namespaced("v1", "ConfigMap"),
    namespaced("v1", "Secret"),
    namespaced("v1", "Endpoints"),
    namespaced("v1", "LimitRange"),
    namespaced("v1", "ResourceQuota"),
    namespaced("v1", "PersistentVolumeClaim"),
    namespaced("v1", "ReplicationController"),
    cluster_scoped("v1", "Namespace"),
    cluster_scoped("v1", "PersistentVolume"),
    cluster_scoped("v1", "List"),
    namespaced("apps/v1", "Deployment"),
    namespaced("apps/v1", "StatefulSet"),
    namespaced("apps/v1", "DaemonSet"),
    namespaced("apps/v1", "ReplicaSet"),
    namespaced("apps/v1", "ControllerRevision"),
    namespaced("batch/v1", "Job"),
    namespaced("batch/v1", "CronJob"),
];

static REGISTRY: Lazy<HashMap<(&'static str, &'static str), KindInfo>> = Lazy::new(|| {
    KINDS
        .iter()
        .map(|info| ((info.api_version, info.kind), *info))
        .collect()
});

/// Looks up a registered kind.
pub fn lookup(type_meta: &TypeMeta) -> Option<KindInfo> {
    REGISTRY
        .get(&(type_meta.api_version.as_str(), type_meta.kind.as_str()))
        .copied()
}

/// Workload is implemented by kinds whose pod template carries a container list.
pub trait Workload: Sync {
    fn api_version(&self) -> &'static str;

    fn kind(&self) -> &'static str;

    /// Field path from the object root to the pod template's containers.
    fn containers_path(&self) -> &'static [&'static str] {
        &["spec", "template", "spec", "containers"]
    }

    /// Returns the container list of `body`, or `None` if the object has none.
    fn containers_mut<'a>(&self, body: &'a mut Value) -> Option<&'a mut Vec<Value>> {
        body.lookup_mut(self.containers_path())
            .and_then(Value::as_list_mut)
    }
}

/// apps/v1 Deployment.
pub struct Deployment;

impl Workload for Deployment {
    fn api_version(&self) -> &'static str {
        "apps/v1"
    }

    fn kind(&self) -> &'static str {
        "Deployment"
    }
}

/// batch/v1 Job.
pub struct Job;

impl Workload for Job {
    fn api_version(&self) -> &'static str {
        "batch/v1"
    }

    fn kind(&self) -> &'static str {
        "Job"
    }
}

static WORKLOADS: &[&dyn Workload] = &[&Deployment, &Job];

/// Returns the workload capability for a kind, if it has one.
pub fn workload(type_meta: &TypeMeta) -> Option<&'static dyn Workload> {
    WORKLOADS
        .iter()
        .copied()
        .find(|w| w.api_version() == type_meta.api_version && w.kind() == type_meta.kind)
}
