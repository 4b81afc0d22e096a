//! # Admin Runtime
//!
//! The client-side orchestration runtime behind the category admin. It owns the parts of the
//! admin with real invariants: building interdependent services on demand, opening and closing
//! overlays without leaking scroll locks or listeners, keeping one observable, persisted copy
//! of cross-component state, and talking to the server with one retry policy.
//!
//! ## Architecture Overview
//!
//! Leaves first:
//!
//! 1. **[`ResilientClient`]** - retry/backoff and error classification over a [`Transport`]
//! 2. **[`ModuleRegistry`]** - named factories with declared dependencies, resolved lazily and once
//! 3. **[`ReactiveStore`]** + **[`SelectionCoordinator`]** - persisted, observable state and the
//!    product-scoped category selection
//! 4. **[`Overlay`]** + **[`ComponentLifecycle`]** - the modal state machine and its variant hooks
//!
//! The application crate composes these into user operations; nothing here knows what a
//! category endpoint looks like.
//!
//! ## Quick Example
//!
//! ```rust
//! use admin_runtime::store::{MemoryStorage, ReactiveStore, DEFAULT_STATE_KEY};
//! use std::sync::Arc;
//!
//! let store = ReactiveStore::load(Arc::new(MemoryStorage::new()), DEFAULT_STATE_KEY);
//! store.subscribe(|state| {
//!     println!("product is now {:?}", state.current_product_id);
//!     Ok(())
//! });
//! store.set_current_product(Some("SKU-1".into()));
//! ```
//!
//! ## Concurrency Model
//!
//! - Everything is `Send + Sync` and meant to be shared by `Arc` or cheap `Clone`
//! - Locks are never held across an `.await`
//! - Store notifications are synchronous, in registration order
//! - Overlapping loads of the same slot are told apart with a [`GenerationCounter`]
//!
//! ## Testing
//!
//! See [`mock`] for the in-memory transport, and [`lifecycle::HeadlessDocument`] /
//! [`lifecycle::HeadlessSurface`] for driving overlays without a real page.

pub mod error;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod mock;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod tracing;

pub use error::{HttpError, LifecycleError, NetworkError, RegistryError, StoreError, SubscriberError};
pub use events::EventBus;
pub use http::{ApiResponse, HttpRequest, Method, ResilientClient, RetryPolicy, Transport};
pub use lifecycle::{ComponentLifecycle, LifecycleState, Overlay, OverlayConfig, Transition};
pub use registry::{Dependencies, ModuleRegistry};
pub use scheduler::{Debouncer, Generation, GenerationCounter, Scheduler};
pub use store::{ReactiveStore, SelectionCoordinator};
