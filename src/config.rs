use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use crate::{
    any::{Object, TypeInfo},
    scope::DisposalLock,
};

/// Produces the value an unresolved ignorable parameter receives.
pub type DefaultValue = fn() -> Object;

fn default_object<T: Default + Send + Sync + 'static>() -> Object {
    Arc::new(T::default())
}

fn unix_epoch() -> Object {
    Arc::new(SystemTime::UNIX_EPOCH)
}

fn now() -> Object {
    Arc::new(Instant::now())
}

/// Where compiled build plans come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Generate and compile in memory, nothing is written.
    #[default]
    Dynamic,
    /// Precompiled source is read back from `output_path` when it still matches the registrations,
    /// and rewritten when missing or stale.
    Auto,
    /// Precompiled source is always rewritten to `output_path`.
    Static,
}

/// Config for a container
/// ## Fields
/// - `compile`:
///   If `false`, every instance is built by direct recursion and no frame chain is compiled.
/// - `ignorable_types`:
///   Parameter types a constructor may leave unresolved when nothing better is available.
///   An unresolved one receives the value its entry produces.
#[derive(Clone, Debug)]
pub struct Config {
    pub compile: bool,
    pub load_mode: LoadMode,
    pub output_path: PathBuf,
    pub ignorable_types: BTreeMap<TypeInfo, DefaultValue>,
    pub disposal_lock: DisposalLock,
}

impl Config {
    #[inline]
    #[must_use]
    pub fn is_ignorable(&self, service_type: &TypeInfo) -> bool {
        self.ignorable_types.contains_key(service_type)
    }

    pub(crate) fn ignorable_default(&self, service_type: &TypeInfo) -> Option<Object> {
        self.ignorable_types.get(service_type).map(|default| default())
    }

    #[must_use]
    pub fn with_ignorable<T: Default + Send + Sync + 'static>(mut self) -> Self {
        self.ignorable_types.insert(TypeInfo::of::<T>(), default_object::<T>);
        self
    }

    #[must_use]
    pub fn with_load_mode(mut self, load_mode: LoadMode, output_path: impl Into<PathBuf>) -> Self {
        self.load_mode = load_mode;
        self.output_path = output_path.into();
        self
    }

    #[must_use]
    pub fn without_compilation(mut self) -> Self {
        self.compile = false;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compile: true,
            load_mode: LoadMode::default(),
            output_path: PathBuf::from("generated"),
            ignorable_types: BTreeMap::from([
                (TypeInfo::of::<Duration>(), default_object::<Duration> as DefaultValue),
                (TypeInfo::of::<SystemTime>(), unix_epoch as DefaultValue),
                (TypeInfo::of::<Instant>(), now as DefaultValue),
            ]),
            disposal_lock: DisposalLock::default(),
        }
    }
}
