//! Which spinlock protects which resource
use std::collections::BTreeMap;

use crate::{model::ResourceId, policy::SpinlockPolicy};

/// Maps resources to the [`SpinlockPolicy`] protecting them.
///
/// Resources without an explicit assignment are protected by the default
/// policy. An [`Analyzer`](crate::Analyzer) borrows the registry for its whole
/// lifetime, so the assignment can't change in the middle of an analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockAssignment {
    default: SpinlockPolicy,
    assigned: BTreeMap<ResourceId, SpinlockPolicy>,
}

impl LockAssignment {
    /// Construct a `LockAssignment` protecting every resource with `default`.
    pub fn new(default: SpinlockPolicy) -> Self {
        Self {
            default,
            assigned: BTreeMap::new(),
        }
    }

    /// Associate `resource` with `policy`, returning the policy it was
    /// previously associated with (not counting the default one).
    pub fn protect_resource_with(
        &mut self,
        resource: ResourceId,
        policy: SpinlockPolicy,
    ) -> Option<SpinlockPolicy> {
        log::trace!("protect_resource_with({resource}, {policy:?})");
        self.assigned.insert(resource, policy)
    }

    /// Get the policy protecting `resource`.
    pub fn resource_spinlock(&self, resource: ResourceId) -> &SpinlockPolicy {
        self.assigned.get(&resource).unwrap_or(&self.default)
    }

    /// Get the policy protecting the resources that weren't assigned one
    /// explicitly.
    #[inline]
    pub fn default_policy(&self) -> &SpinlockPolicy {
        &self.default
    }

    pub fn set_default_policy(&mut self, policy: SpinlockPolicy) {
        self.default = policy;
    }

    /// Iterate over the explicit assignments in ascending resource order.
    pub fn assignments(&self) -> impl Iterator<Item = (ResourceId, &SpinlockPolicy)> + '_ {
        self.assigned.iter().map(|(&id, policy)| (id, policy))
    }

    /// Remove all explicit assignments. The default policy is left unchanged.
    pub fn clear(&mut self) {
        self.assigned.clear();
    }
}
