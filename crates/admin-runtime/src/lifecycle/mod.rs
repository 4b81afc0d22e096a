//! # Overlay Lifecycle
//!
//! Every modal or overlay goes through the same state machine:
//!
//! ```text
//! Hidden --show()--> Showing --(hooks ok)--> Visible --hide()--> Hiding --(hooks done)--> Hidden
//! ```
//!
//! The state machine lives in [`Overlay`]. What differs between overlay variants (validation
//! before opening, what to do on Enter, which event to announce on close) lives in a
//! [`ComponentLifecycle`] implementation that the overlay is composed with.
//!
//! ## Guarantees
//!
//! - One transition at a time. `show()` while showing, visible or hiding, and `hide()` while
//!   not visible, return [`Transition::Ignored`] without running any hook.
//! - A failing `before_show` leaves the overlay `Hidden` with nothing acquired.
//! - `hide()` always tears down: listeners are removed, the element is concealed and the
//!   scroll lock is released even when a hook fails, panics, or the `hide()` future is
//!   dropped half way.
//!
//! The side effects an overlay holds while visible (scroll lock, listeners) are RAII guards,
//! so releasing them is a matter of dropping them.

pub mod document;
pub mod scroll;

pub use document::*;
pub use scroll::*;

use crate::error::LifecycleError;
use async_trait::async_trait;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Variant-specific behavior of an overlay.
///
/// All hooks have no-op defaults. Hooks take `&self`; variants that keep form state use
/// interior mutability.
#[async_trait]
pub trait ComponentLifecycle: Send + Sync + 'static {
    /// Data handed to `show()`.
    type Input: Send + Sync + 'static;
    /// Result handed to `hide()`. `Default` is the result of a dismissal (Escape, outside click).
    type Output: Send + Sync + Default + 'static;
    type Error: Display + Send + Sync + 'static;

    /// Runs before anything is acquired. An error cancels the `show()`.
    async fn before_show(&self, _data: &Self::Input) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn after_show(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Must settle any in-flight submission; the overlay does not assume there is none.
    async fn before_hide(&self, _result: &Self::Output) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Runs after teardown. Typically announces the result as a domain event.
    async fn after_hide(&self, _result: Self::Output) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Primary action for the Enter key. Return `true` when the caller should submit.
    async fn handle_enter_key(&self) -> Result<bool, Self::Error> {
        Ok(false)
    }

    fn is_submitting(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Hidden,
    Showing,
    Visible,
    Hiding,
}

/// Outcome of a `show()` or `hide()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Completed,
    /// Another transition was in flight, or the overlay was already in the target state.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Dismissed,
    /// The variant accepted Enter; the caller should run its primary action.
    PrimaryAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayConfig {
    pub close_on_escape: bool,
    pub close_on_outside_click: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            close_on_escape: true,
            close_on_outside_click: true,
        }
    }
}

struct Held {
    _scroll: ScrollGuard,
    listeners: Vec<ListenerGuard>,
}

/// State machine wrapper around a [`ComponentLifecycle`] variant.
pub struct Overlay<C: ComponentLifecycle> {
    component: Arc<C>,
    surface: Arc<dyn Surface>,
    document: Arc<dyn Document>,
    scroll: ScrollLock,
    config: OverlayConfig,
    state: Mutex<LifecycleState>,
    held: Mutex<Option<Held>>,
}

impl<C: ComponentLifecycle> Overlay<C> {
    pub fn new(
        component: Arc<C>,
        surface: Arc<dyn Surface>,
        document: Arc<dyn Document>,
        scroll: ScrollLock,
        config: OverlayConfig,
    ) -> Self {
        Self {
            component,
            surface,
            document,
            scroll,
            config,
            state: Mutex::new(LifecycleState::Hidden),
            held: Mutex::new(None),
        }
    }

    pub fn component(&self) -> &Arc<C> {
        &self.component
    }

    pub fn name(&self) -> &str {
        self.surface.element_id()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state_lock()
    }

    pub fn is_visible(&self) -> bool {
        self.state() == LifecycleState::Visible
    }

    pub fn listening_for(&self, kind: ListenerKind) -> bool {
        lock(&self.held)
            .as_ref()
            .map(|held| held.listeners.iter().any(|l| l.kind() == kind))
            .unwrap_or(false)
    }

    pub async fn show(&self, data: C::Input) -> Result<Transition, LifecycleError> {
        if !self.begin(LifecycleState::Hidden, LifecycleState::Showing) {
            debug!(overlay = self.name(), state = ?self.state(), "show ignored");
            return Ok(Transition::Ignored);
        }
        let mut rollback = Rollback::new(self);

        self.component
            .before_show(&data)
            .await
            .map_err(|e| self.hook_failed("before_show", e))?;

        let scroll = self.scroll.acquire(self.name());
        rollback.revealed = true;
        self.surface.reveal();

        let mut kinds = vec![ListenerKind::EnterKey, ListenerKind::Resize];
        if self.config.close_on_escape {
            kinds.push(ListenerKind::EscapeKey);
        }
        if self.config.close_on_outside_click {
            kinds.push(ListenerKind::OutsideClick);
        }
        let listeners = kinds
            .into_iter()
            .map(|kind| ListenerGuard::install(self.document.clone(), self.name(), kind))
            .collect();
        *lock(&self.held) = Some(Held {
            _scroll: scroll,
            listeners,
        });

        if !self.surface.focus_first_focusable() {
            self.surface.focus_self();
        }

        self.component
            .after_show()
            .await
            .map_err(|e| self.hook_failed("after_show", e))?;

        rollback.disarm();
        self.set_state(LifecycleState::Visible);
        info!(overlay = self.name(), "Shown");
        Ok(Transition::Completed)
    }

    pub async fn hide(&self, result: C::Output) -> Result<Transition, LifecycleError> {
        if !self.begin(LifecycleState::Visible, LifecycleState::Hiding) {
            debug!(overlay = self.name(), state = ?self.state(), "hide ignored");
            return Ok(Transition::Ignored);
        }
        let mut rollback = Rollback::new(self);
        rollback.revealed = true;

        let before = self.component.before_hide(&result).await;

        // Teardown happens whatever the hook said.
        rollback.teardown();

        if let Err(e) = before {
            return Err(self.hook_failed("before_hide", e));
        }
        let after = self.component.after_hide(result).await;
        rollback.disarm();
        self.set_state(LifecycleState::Hidden);
        after.map_err(|e| self.hook_failed("after_hide", e))?;

        info!(overlay = self.name(), "Hidden");
        Ok(Transition::Completed)
    }

    /// Route a key press to the overlay.
    pub async fn handle_key(&self, key: Key) -> Result<KeyOutcome, LifecycleError> {
        match key {
            Key::Escape if self.listening_for(ListenerKind::EscapeKey) => {
                self.dismiss().await
            }
            Key::Enter if self.is_visible() && !self.component.is_submitting() => {
                let accepted = self
                    .component
                    .handle_enter_key()
                    .await
                    .map_err(|e| self.hook_failed("handle_enter_key", e))?;
                Ok(if accepted {
                    KeyOutcome::PrimaryAction
                } else {
                    KeyOutcome::Ignored
                })
            }
            _ => Ok(KeyOutcome::Ignored),
        }
    }

    /// A click on the backdrop, outside the overlay's content.
    pub async fn handle_outside_click(&self) -> Result<KeyOutcome, LifecycleError> {
        if self.listening_for(ListenerKind::OutsideClick) {
            self.dismiss().await
        } else {
            Ok(KeyOutcome::Ignored)
        }
    }

    pub fn handle_resize(&self) {
        if self.listening_for(ListenerKind::Resize) {
            self.surface.reposition();
        }
    }

    async fn dismiss(&self) -> Result<KeyOutcome, LifecycleError> {
        match self.hide(C::Output::default()).await? {
            Transition::Completed => Ok(KeyOutcome::Dismissed),
            Transition::Ignored => Ok(KeyOutcome::Ignored),
        }
    }

    fn begin(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let mut state = self.state_lock();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    fn set_state(&self, next: LifecycleState) {
        *self.state_lock() = next;
    }

    fn state_lock(&self) -> MutexGuard<'_, LifecycleState> {
        lock(&self.state)
    }

    fn hook_failed(&self, hook: &'static str, error: impl Display) -> LifecycleError {
        warn!(overlay = self.name(), hook, error = %error, "Lifecycle hook failed");
        LifecycleError::HookFailed {
            component: self.name().to_string(),
            hook,
            reason: error.to_string(),
        }
    }
}

/// Puts the overlay back to `Hidden` with nothing held, unless disarmed.
///
/// Runs on every early return, on panics inside hooks, and when the transition future is
/// dropped before completing.
struct Rollback<'a, C: ComponentLifecycle> {
    overlay: &'a Overlay<C>,
    revealed: bool,
    armed: bool,
}

impl<'a, C: ComponentLifecycle> Rollback<'a, C> {
    fn new(overlay: &'a Overlay<C>) -> Self {
        Self {
            overlay,
            revealed: false,
            armed: true,
        }
    }

    fn teardown(&mut self) {
        let held = lock(&self.overlay.held).take();
        drop(held);
        if self.revealed {
            self.overlay.surface.conceal();
            self.revealed = false;
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C: ComponentLifecycle> Drop for Rollback<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            self.teardown();
            self.overlay.set_state(LifecycleState::Hidden);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Probe {
        refuse_show: AtomicBool,
        fail_before_hide: AtomicBool,
        before_show_calls: AtomicUsize,
        after_hide_results: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl ComponentLifecycle for Probe {
        type Input = ();
        type Output = Option<String>;
        type Error = String;

        async fn before_show(&self, _: &()) -> Result<(), String> {
            self.before_show_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.refuse_show.load(Ordering::SeqCst) {
                return Err("not now".into());
            }
            Ok(())
        }

        async fn before_hide(&self, _: &Option<String>) -> Result<(), String> {
            if self.fail_before_hide.load(Ordering::SeqCst) {
                return Err("hook exploded".into());
            }
            Ok(())
        }

        async fn after_hide(&self, result: Option<String>) -> Result<(), String> {
            self.after_hide_results.lock().unwrap().push(result);
            Ok(())
        }
    }

    fn overlay(
        config: OverlayConfig,
    ) -> (Overlay<Probe>, Arc<HeadlessDocument>, Arc<HeadlessSurface>) {
        let document = HeadlessDocument::new();
        let surface = HeadlessSurface::new("probe-modal");
        let overlay = Overlay::new(
            Arc::new(Probe::default()),
            surface.clone(),
            document.clone(),
            ScrollLock::new(document.clone()),
            config,
        );
        (overlay, document, surface)
    }

    #[tokio::test]
    async fn test_show_then_hide() {
        let (overlay, document, surface) = overlay(OverlayConfig::default());

        assert_eq!(overlay.show(()).await.unwrap(), Transition::Completed);
        assert_eq!(overlay.state(), LifecycleState::Visible);
        assert!(surface.is_visible());
        assert!(document.is_scroll_locked());
        assert_eq!(surface.focused().as_deref(), Some("probe-modal-first"));
        assert_eq!(document.active_listeners(), 4);

        let done = overlay.hide(Some("saved".into())).await.unwrap();
        assert_eq!(done, Transition::Completed);
        assert_eq!(overlay.state(), LifecycleState::Hidden);
        assert!(!surface.is_visible());
        assert!(!document.is_scroll_locked());
        assert_eq!(document.active_listeners(), 0);
        assert_eq!(
            *overlay.component().after_hide_results.lock().unwrap(),
            vec![Some("saved".to_string())]
        );
    }

    #[tokio::test]
    async fn test_concurrent_show_runs_hooks_once() {
        let (overlay, _, surface) = overlay(OverlayConfig::default());

        let (first, second) = tokio::join!(overlay.show(()), overlay.show(()));
        assert_eq!(first.unwrap(), Transition::Completed);
        assert_eq!(second.unwrap(), Transition::Ignored);
        assert_eq!(overlay.component().before_show_calls.load(Ordering::SeqCst), 1);
        assert_eq!(surface.reveal_count(), 1);

        assert_eq!(overlay.show(()).await.unwrap(), Transition::Ignored);
    }

    #[tokio::test]
    async fn test_hide_while_hidden_is_ignored() {
        let (overlay, _, _) = overlay(OverlayConfig::default());
        assert_eq!(overlay.hide(None).await.unwrap(), Transition::Ignored);
        assert!(overlay.component().after_hide_results.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refused_show_acquires_nothing() {
        let (overlay, document, surface) = overlay(OverlayConfig::default());
        overlay.component().refuse_show.store(true, Ordering::SeqCst);

        let err = overlay.show(()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::HookFailed { hook: "before_show", .. }));
        assert_eq!(overlay.state(), LifecycleState::Hidden);
        assert!(!surface.is_visible());
        assert!(!document.is_scroll_locked());
        assert_eq!(document.active_listeners(), 0);
    }

    #[tokio::test]
    async fn test_failing_before_hide_never_leaks() {
        let (overlay, document, _) = overlay(OverlayConfig::default());
        document.scroll_to(250.0);

        for cycle in 0..6 {
            overlay
                .component()
                .fail_before_hide
                .store(cycle % 2 == 0, Ordering::SeqCst);
            overlay.show(()).await.unwrap();
            let _ = overlay.hide(None).await;

            assert_eq!(overlay.state(), LifecycleState::Hidden);
            assert_eq!(document.active_listeners(), 0);
            assert!(!document.is_scroll_locked());
            assert_eq!(document.scroll_offset(), 250.0);
        }
        // after_hide only runs for the hides whose before_hide succeeded
        assert_eq!(overlay.component().after_hide_results.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_dropped_show_future_rolls_back() {
        let (overlay, document, _) = overlay(OverlayConfig::default());
        let pending = overlay.show(());
        let _ = tokio::time::timeout(Duration::from_millis(1), pending).await;

        assert_eq!(overlay.state(), LifecycleState::Hidden);
        assert!(!document.is_scroll_locked());
        assert_eq!(overlay.show(()).await.unwrap(), Transition::Completed);
    }

    #[tokio::test]
    async fn test_escape_respects_config() {
        let (overlay, document, _) = overlay(OverlayConfig {
            close_on_escape: false,
            close_on_outside_click: false,
        });
        overlay.show(()).await.unwrap();
        assert_eq!(document.active_listeners(), 2);

        assert_eq!(overlay.handle_key(Key::Escape).await.unwrap(), KeyOutcome::Ignored);
        assert_eq!(overlay.handle_outside_click().await.unwrap(), KeyOutcome::Ignored);
        assert!(overlay.is_visible());

        let (overlay, _, _) = self::overlay(OverlayConfig::default());
        overlay.show(()).await.unwrap();
        assert_eq!(overlay.handle_key(Key::Escape).await.unwrap(), KeyOutcome::Dismissed);
        assert_eq!(overlay.state(), LifecycleState::Hidden);
        assert_eq!(
            *overlay.component().after_hide_results.lock().unwrap(),
            vec![None]
        );
    }

    #[tokio::test]
    async fn test_focus_falls_back_to_container() {
        let document = HeadlessDocument::new();
        let surface = HeadlessSurface::without_focusable("bare");
        let overlay = Overlay::new(
            Arc::new(Probe::default()),
            surface.clone(),
            document.clone(),
            ScrollLock::new(document.clone()),
            OverlayConfig::default(),
        );
        overlay.show(()).await.unwrap();
        assert_eq!(surface.focused().as_deref(), Some("bare"));
    }
}
