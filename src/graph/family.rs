use std::sync::Arc;

use crate::{any::TypeInfo, instance::Instance};

/// Every instance of one service type, in registration order.
pub struct ServiceFamily {
    service_type: TypeInfo,
    instances: Vec<Arc<Instance>>,
    default: Option<Arc<Instance>>,
}

impl ServiceFamily {
    /// The default is the last instance explicitly marked as default, else the last registered one.
    pub(crate) fn new(service_type: TypeInfo, instances: Vec<Arc<Instance>>) -> Self {
        let default = instances
            .iter()
            .rev()
            .find(|instance| instance.is_default)
            .or_else(|| instances.last())
            .cloned();
        Self {
            service_type,
            instances,
            default,
        }
    }

    #[inline]
    #[must_use]
    pub fn service_type(&self) -> &TypeInfo {
        &self.service_type
    }

    #[inline]
    #[must_use]
    pub fn instances(&self) -> &[Arc<Instance>] {
        &self.instances
    }

    #[inline]
    #[must_use]
    pub fn default(&self) -> Option<&Arc<Instance>> {
        self.default.as_ref()
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Arc<Instance>> {
        self.instances.iter().find(|instance| &*instance.name == name)
    }
}
