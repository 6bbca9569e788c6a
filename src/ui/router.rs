//! View routing
//!
//! A static table of three literal paths. No dynamic segments, no guards.

use std::fmt;

/// The dashboard views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Live log stream
    LogPage,
    /// Elevator overview; the default view
    ElevatorInfo,
    /// Robot overview
    RobotInfo,
}

/// Path → view table, in drawer order
pub const ROUTES: &[(&str, View)] = &[
    ("/log", View::LogPage),
    ("/", View::ElevatorInfo),
    ("/robot", View::RobotInfo),
];

/// Resolve a path to its view
///
/// Paths are matched literally; anything not in [`ROUTES`] yields `None`.
pub fn route_for(path: &str) -> Option<View> {
    ROUTES
        .iter()
        .find(|(route, _)| *route == path)
        .map(|(_, view)| *view)
}

impl View {
    /// The path this view is mounted at
    pub fn path(&self) -> &'static str {
        match self {
            View::LogPage => "/log",
            View::ElevatorInfo => "/",
            View::RobotInfo => "/robot",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            View::LogPage => "Log",
            View::ElevatorInfo => "Elevator Info",
            View::RobotInfo => "Robot Info",
        }
    }

    /// Whether this view consumes the live-log stream
    pub fn streams_log(&self) -> bool {
        matches!(self, View::LogPage)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
