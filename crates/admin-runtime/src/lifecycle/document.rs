//! Handles onto the host document and onto the element an overlay controls.
//!
//! Overlays never look elements up by themselves; the element handle and the document are
//! injected at construction time. That keeps the state machine testable without a browser:
//! [`HeadlessDocument`] and [`HeadlessSurface`] are in-memory implementations that record
//! what happened to them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Transient listeners an overlay installs while it is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListenerKind {
    EscapeKey,
    EnterKey,
    OutsideClick,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// The page-level resources overlays share: scroll position, body scroll lock and
/// event listener registration.
pub trait Document: Send + Sync {
    fn scroll_offset(&self) -> f64;
    fn scroll_to(&self, offset: f64);
    fn set_scroll_locked(&self, locked: bool);
    fn add_listener(&self, owner: &str, kind: ListenerKind) -> ListenerId;
    fn remove_listener(&self, id: ListenerId);
}

/// The element an overlay shows and hides.
pub trait Surface: Send + Sync {
    fn element_id(&self) -> &str;
    fn reveal(&self);
    fn conceal(&self);
    /// Move focus to the first focusable descendant. Returns `false` when there is none.
    fn focus_first_focusable(&self) -> bool;
    fn focus_self(&self);
    fn reposition(&self) {}
}

/// Removes its listener when dropped.
pub struct ListenerGuard {
    document: Arc<dyn Document>,
    id: ListenerId,
    kind: ListenerKind,
}

impl ListenerGuard {
    pub fn install(document: Arc<dyn Document>, owner: &str, kind: ListenerKind) -> Self {
        let id = document.add_listener(owner, kind);
        Self { document, id, kind }
    }

    pub fn kind(&self) -> ListenerKind {
        self.kind
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.document.remove_listener(self.id);
    }
}

/// In-memory [`Document`].
#[derive(Default)]
pub struct HeadlessDocument {
    offset: Mutex<f64>,
    locked: AtomicBool,
    next_listener: AtomicU64,
    listeners: Mutex<BTreeMap<ListenerId, (String, ListenerKind)>>,
}

impl HeadlessDocument {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_scroll_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Number of listeners currently registered, across all owners.
    pub fn active_listeners(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or_default()
    }

    pub fn listeners_of(&self, owner: &str) -> Vec<ListenerKind> {
        self.listeners
            .lock()
            .map(|l| {
                l.values()
                    .filter(|(o, _)| o == owner)
                    .map(|(_, kind)| *kind)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Document for HeadlessDocument {
    fn scroll_offset(&self) -> f64 {
        self.offset.lock().map(|o| *o).unwrap_or_default()
    }

    fn scroll_to(&self, offset: f64) {
        if let Ok(mut current) = self.offset.lock() {
            *current = offset;
        }
    }

    fn set_scroll_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    fn add_listener(&self, owner: &str, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(id, (owner.to_string(), kind));
        }
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.remove(&id);
        }
    }
}

/// In-memory [`Surface`].
pub struct HeadlessSurface {
    id: String,
    has_focusable: bool,
    visible: AtomicBool,
    focused: Mutex<Option<String>>,
    reveals: AtomicUsize,
    repositions: AtomicUsize,
}

impl HeadlessSurface {
    /// A surface whose first focusable descendant is `#{id}-first`.
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(id.into(), true))
    }

    /// A surface with no focusable descendants.
    pub fn without_focusable(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(id.into(), false))
    }

    fn build(id: String, has_focusable: bool) -> Self {
        Self {
            id,
            has_focusable,
            visible: AtomicBool::new(false),
            focused: Mutex::new(None),
            reveals: AtomicUsize::new(0),
            repositions: AtomicUsize::new(0),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn focused(&self) -> Option<String> {
        self.focused.lock().ok().and_then(|f| f.clone())
    }

    pub fn reveal_count(&self) -> usize {
        self.reveals.load(Ordering::SeqCst)
    }

    pub fn reposition_count(&self) -> usize {
        self.repositions.load(Ordering::SeqCst)
    }

    fn set_focus(&self, target: String) {
        if let Ok(mut focused) = self.focused.lock() {
            *focused = Some(target);
        }
    }
}

impl Surface for HeadlessSurface {
    fn element_id(&self) -> &str {
        &self.id
    }

    fn reveal(&self) {
        self.reveals.fetch_add(1, Ordering::SeqCst);
        self.visible.store(true, Ordering::SeqCst);
    }

    fn conceal(&self) {
        self.visible.store(false, Ordering::SeqCst);
        if let Ok(mut focused) = self.focused.lock() {
            *focused = None;
        }
    }

    fn focus_first_focusable(&self) -> bool {
        if self.has_focusable {
            self.set_focus(format!("{}-first", self.id));
        }
        self.has_focusable
    }

    fn focus_self(&self) {
        self.set_focus(self.id.clone());
    }

    fn reposition(&self) {
        self.repositions.fetch_add(1, Ordering::SeqCst);
    }
}
