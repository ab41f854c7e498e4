//! GUI module for the recording indicator (Linux only)
//!
//! Uses Wayland layer-shell for proper overlay behavior on Linux.

pub mod layer_shell;

use std::thread::{self, JoinHandle};

use tokio::sync::broadcast;
use tracing::warn;

use crate::cli::args::IndicatorPosition;
use crate::domain::recording::StateUpdate;

pub use layer_shell::{run_indicator, LayerShellError};

/// Run the indicator on its own thread.
///
/// Failure to reach a layer-shell compositor is logged and otherwise ignored:
/// recording carries on without the overlay.
pub fn spawn_indicator(
    position: IndicatorPosition,
    updates: broadcast::Receiver<StateUpdate>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = run_indicator(position, updates) {
            warn!(error = %e, "recording indicator unavailable");
        }
    })
}
