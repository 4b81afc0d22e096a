//! Handles onto the page the admin runs in.

use crate::modals::{CREATION_MODAL_ID, DELETION_MODAL_ID};
use admin_runtime::lifecycle::{Document, HeadlessDocument, HeadlessSurface, Surface};
use std::sync::Arc;

/// The document and the dialog elements, located once and injected everywhere else.
#[derive(Clone)]
pub struct AdminPage {
    pub document: Arc<dyn Document>,
    pub creation_modal: Arc<dyn Surface>,
    pub deletion_modal: Arc<dyn Surface>,
}

/// A page with no browser behind it. Keeps the concrete handles so they can be inspected.
#[derive(Clone)]
pub struct HeadlessPage {
    pub document: Arc<HeadlessDocument>,
    pub creation_modal: Arc<HeadlessSurface>,
    pub deletion_modal: Arc<HeadlessSurface>,
}

impl HeadlessPage {
    pub fn new() -> Self {
        Self {
            document: HeadlessDocument::new(),
            creation_modal: HeadlessSurface::new(CREATION_MODAL_ID),
            deletion_modal: HeadlessSurface::new(DELETION_MODAL_ID),
        }
    }

    pub fn page(&self) -> AdminPage {
        AdminPage {
            document: self.document.clone(),
            creation_modal: self.creation_modal.clone(),
            deletion_modal: self.deletion_modal.clone(),
        }
    }
}

impl Default for HeadlessPage {
    fn default() -> Self {
        Self::new()
    }
}
