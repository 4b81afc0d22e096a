//! # Module Registry
//!
//! The registry maps module names to factories with declared dependencies and builds each
//! module lazily, the first time something asks for it.
//!
//! ## Resolution Rules
//!
//! - A module's dependencies are resolved depth-first, in declaration order, and each
//!   dependency's factory has completed before the dependent's factory starts.
//! - Each name has at most one resolution in flight and at most one cached instance.
//!   Concurrent [`require`](ModuleRegistry::require) calls share the same in-flight
//!   resolution, so a factory runs exactly once no matter how many callers race for it.
//! - A failed resolution is handed to every waiter and then forgotten, so the next
//!   `require` starts over. Nothing partial is ever cached.
//! - A name can be redefined until its first resolution starts. After that, `define`
//!   is rejected with [`RegistryError::AlreadyResolved`].
//!
//! ## Cycles
//!
//! [`detect_cycles`](ModuleRegistry::detect_cycles) walks the *declared* graph and reports
//! every cycle it finds as a warning. Resolving a module whose dependency closure contains a
//! cycle fails with [`RegistryError::DependencyCycle`] instead of waiting on itself forever.
//!
//! ```rust
//! use admin_runtime::registry::ModuleRegistry;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = ModuleRegistry::new();
//! registry.define_value("greeting", String::from("hello")).unwrap();
//! registry
//!     .define("shout", &["greeting"], |deps| async move {
//!         let greeting = deps.get::<String>("greeting").map_err(|e| e.to_string())?;
//!         Ok::<_, String>(greeting.to_uppercase())
//!     })
//!     .unwrap();
//!
//! let shout = registry.require::<String>("shout").await.unwrap();
//! assert_eq!(shout.as_str(), "HELLO");
//! # }
//! ```

use crate::error::RegistryError;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// A resolved module, type-erased. Use [`Dependencies::get`] or
/// [`ModuleRegistry::require`] to get it back as a concrete type.
pub type Instance = Arc<dyn Any + Send + Sync>;

type FactoryFuture = BoxFuture<'static, Result<Instance, String>>;
type Factory = Arc<dyn Fn(Dependencies) -> FactoryFuture + Send + Sync>;
type Resolution = Shared<BoxFuture<'static, Result<Instance, RegistryError>>>;

#[derive(Clone)]
struct Descriptor {
    dependencies: Vec<String>,
    factory: Factory,
}

enum Slot {
    Pending(Resolution),
    Ready(Instance),
}

#[derive(Default)]
struct Inner {
    descriptors: BTreeMap<String, Descriptor>,
    slots: HashMap<String, Slot>,
}

/// The resolved dependencies handed to a factory, keyed by module name.
pub struct Dependencies {
    instances: HashMap<String, Instance>,
}

impl Dependencies {
    /// Fetch a dependency as a concrete type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        let instance = self
            .instances
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::MissingModule(name.to_string()))?;
        downcast(name, instance)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Lazily-resolving service registry.
///
/// Cheap to clone; clones share the same descriptors and cache. Construct one per session
/// and pass it by reference to whatever needs it.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module factory under `name`.
    ///
    /// The factory receives the resolved `dependencies` and may be async. It is invoked at
    /// most once per successful resolution.
    pub fn define<T, E, F, Fut>(
        &self,
        name: impl Into<String>,
        dependencies: &[&str],
        factory: F,
    ) -> Result<(), RegistryError>
    where
        T: Any + Send + Sync,
        E: std::fmt::Display,
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let name = name.into();
        let factory: Factory = Arc::new(move |deps| {
            let pending = factory(deps);
            async move {
                pending
                    .await
                    .map(|value| Arc::new(value) as Instance)
                    .map_err(|e| e.to_string())
            }
            .boxed()
        });

        let mut inner = self.lock();
        if inner.slots.contains_key(&name) {
            warn!(module = %name, "Rejected redefinition of resolved module");
            return Err(RegistryError::AlreadyResolved(name));
        }
        let descriptor = Descriptor {
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            factory,
        };
        if inner.descriptors.insert(name.clone(), descriptor).is_some() {
            debug!(module = %name, "Replaced module definition");
        } else {
            debug!(module = %name, ?dependencies, "Defined module");
        }
        Ok(())
    }

    /// Register an already-built value with no dependencies.
    pub fn define_value<T>(&self, name: impl Into<String>, value: T) -> Result<(), RegistryError>
    where
        T: Any + Send + Sync + Clone,
    {
        self.define(name, &[], move |_| {
            let value = value.clone();
            async move { Ok::<_, std::convert::Infallible>(value) }
        })
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.lock().descriptors.contains_key(name)
    }

    /// Whether `name` has a cached instance (a pending resolution does not count).
    pub fn is_resolved(&self, name: &str) -> bool {
        matches!(self.lock().slots.get(name), Some(Slot::Ready(_)))
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().descriptors.keys().cloned().collect()
    }

    /// Resolve `name` and downcast it to `T`.
    pub async fn require<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        let instance = self.resolve(name).await?;
        downcast(name, instance)
    }

    /// Resolve several modules in parallel. Fails with the first error encountered.
    pub async fn require_many(
        &self,
        names: &[&str],
    ) -> Result<HashMap<String, Instance>, RegistryError> {
        let pending = names.iter().map(|name| {
            let name = name.to_string();
            let resolution = self.resolve(&name);
            async move { resolution.await.map(|instance| (name, instance)) }
        });
        future::join_all(pending).await.into_iter().collect()
    }

    /// Walk the declared dependency graph and return every cycle found.
    ///
    /// Each returned path lists the nodes of one cycle exactly once, in dependency order.
    /// Cycles are logged as warnings; this never fails.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let inner = self.lock();
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        for name in inner.descriptors.keys() {
            let mut path = Vec::new();
            walk_cycles(name, &inner.descriptors, &mut visited, &mut path, &mut cycles);
        }
        for cycle in &cycles {
            warn!(cycle = %cycle.join(" -> "), "Dependency cycle in module definitions");
        }
        cycles
    }

    fn resolve(&self, name: &str) -> BoxFuture<'static, Result<Instance, RegistryError>> {
        let mut inner = self.lock();
        match inner.slots.get(name) {
            Some(Slot::Ready(instance)) => return future::ready(Ok(instance.clone())).boxed(),
            Some(Slot::Pending(resolution)) => return resolution.clone().boxed(),
            None => {}
        }

        let Some(descriptor) = inner.descriptors.get(name).cloned() else {
            return future::ready(Err(RegistryError::MissingModule(name.to_string()))).boxed();
        };
        if let Some(path) = cycle_through(name, &inner.descriptors) {
            warn!(module = name, cycle = %path.join(" -> "), "Refusing to resolve cyclic module");
            return future::ready(Err(RegistryError::DependencyCycle {
                module: name.to_string(),
                path,
            }))
            .boxed();
        }

        let registry = self.clone();
        let module = name.to_string();
        let resolution = async move {
            let result = registry.build(&module, descriptor).await;
            registry.settle(&module, &result);
            result
        }
        .boxed()
        .shared();

        inner
            .slots
            .insert(name.to_string(), Slot::Pending(resolution.clone()));
        resolution.boxed()
    }

    async fn build(&self, module: &str, descriptor: Descriptor) -> Result<Instance, RegistryError> {
        let mut instances = HashMap::new();
        for dependency in &descriptor.dependencies {
            let instance = self.resolve(dependency).await.map_err(|e| {
                RegistryError::Resolution {
                    module: module.to_string(),
                    reason: format!("dependency `{dependency}` failed: {e}"),
                }
            })?;
            instances.insert(dependency.clone(), instance);
        }

        debug!(module, "Invoking factory");
        let factory = descriptor.factory.clone();
        let invoked = std::panic::catch_unwind(AssertUnwindSafe(|| {
            factory(Dependencies { instances })
        }));
        let outcome = match invoked {
            Ok(pending) => AssertUnwindSafe(pending).catch_unwind().await,
            Err(panic) => Err(panic),
        };

        match outcome {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(reason)) => Err(RegistryError::Resolution {
                module: module.to_string(),
                reason,
            }),
            Err(panic) => Err(RegistryError::Resolution {
                module: module.to_string(),
                reason: panic_message(panic.as_ref()),
            }),
        }
    }

    fn settle(&self, module: &str, result: &Result<Instance, RegistryError>) {
        let mut inner = self.lock();
        match result {
            Ok(instance) => {
                inner
                    .slots
                    .insert(module.to_string(), Slot::Ready(instance.clone()));
                info!(module, "Module resolved");
            }
            Err(e) => {
                inner.slots.remove(module);
                warn!(module, error = %e, "Module resolution failed");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn downcast<T: Any + Send + Sync>(name: &str, instance: Instance) -> Result<Arc<T>, RegistryError> {
    instance
        .downcast::<T>()
        .map_err(|_| RegistryError::TypeMismatch {
            module: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("factory panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("factory panicked: {msg}")
    } else {
        "factory panicked".to_string()
    }
}

fn walk_cycles(
    name: &str,
    descriptors: &BTreeMap<String, Descriptor>,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
    cycles: &mut Vec<Vec<String>>,
) {
    if let Some(pos) = path.iter().position(|n| n == name) {
        cycles.push(path[pos..].to_vec());
        return;
    }
    if visited.contains(name) {
        return;
    }

    path.push(name.to_string());
    if let Some(descriptor) = descriptors.get(name) {
        for dependency in &descriptor.dependencies {
            walk_cycles(dependency, descriptors, visited, path, cycles);
        }
    }
    path.pop();
    visited.insert(name.to_string());
}

/// First cycle reachable from `start`, if any.
fn cycle_through(start: &str, descriptors: &BTreeMap<String, Descriptor>) -> Option<Vec<String>> {
    let mut cycles = Vec::new();
    let mut visited = HashSet::new();
    let mut path = Vec::new();
    walk_cycles(start, descriptors, &mut visited, &mut path, &mut cycles);
    cycles.into_iter().next()
}
