//! Dashboard UI
//!
//! - [`router`]: maps the three literal paths to views
//! - [`store`]: the navigation-drawer flag, the only shared UI state
//! - [`views`]: terminal rendering of headers, drawer and log lines

pub mod router;
pub mod store;
pub mod views;

pub use router::{route_for, View, ROUTES};
pub use store::UiStore;
pub use views::{render_header, render_nav, render_payload, render_status, LogFormat};
