use crate::types::LogBatch;

/// What the panel is currently showing. Exactly one variant is active.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Error(String),
    Content(LogBatch),
}

impl ViewState {
    pub fn name(&self) -> &'static str {
        match self {
            ViewState::Loading => "loading",
            ViewState::Error(_) => "error",
            ViewState::Content(_) => "content",
        }
    }
}

/// Why a fetch was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// User action. Always shows the loading state first.
    Explicit,
    /// Timer tick. Fetches silently once there is something on screen.
    Ambient,
}
