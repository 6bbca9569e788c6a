//! Shared UI state
//!
//! The only state shared between views is whether the navigation drawer is
//! shown. It is written through [`UiStore::set_nav_show`] and nothing else.

use std::sync::Arc;
use tokio::sync::watch;

/// Owned store handed to every view that needs it
#[derive(Debug, Clone)]
pub struct UiStore {
    nav_show: Arc<watch::Sender<bool>>,
}

impl UiStore {
    pub fn new(nav_show: bool) -> Self {
        let (tx, _) = watch::channel(nav_show);
        Self {
            nav_show: Arc::new(tx),
        }
    }

    /// Whether the navigation drawer is visible
    pub fn nav_show(&self) -> bool {
        *self.nav_show.borrow()
    }

    /// The single mutation on shared UI state
    pub fn set_nav_show(&self, value: bool) {
        let previous = self.nav_show.send_replace(value);
        if previous != value {
            tracing::debug!(nav_show = value, "Navigation drawer toggled");
        }
    }

    /// Observe drawer changes
    pub fn watch_nav_show(&self) -> watch::Receiver<bool> {
        self.nav_show.subscribe()
    }
}

impl Default for UiStore {
    fn default() -> Self {
        Self::new(false)
    }
}
