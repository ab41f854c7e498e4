//! Recording lifecycle state machine

use std::fmt;
use thiserror::Error;

/// Recording session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Stopping,
    Stopped,
    Failed,
}

impl RecordingState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Whether a capture process may still be alive in this state
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Stopping)
    }

    /// Whether the session is finished and needs a reset before recording again
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot pushed to the on-screen indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateUpdate {
    pub state: RecordingState,
    pub elapsed_ms: u64,
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: RecordingState,
    pub action: String,
}

/// Recording lifecycle entity.
///
/// State machine:
///   IDLE -> RECORDING (begin)
///   RECORDING -> STOPPING (request_stop)
///   STOPPING -> STOPPING (request_stop, retry)
///   STOPPING -> STOPPED (finish_stop)
///   RECORDING -> STOPPED (process_exited)
///   RECORDING | STOPPING -> FAILED (fail)
///   STOPPED | FAILED -> IDLE (reset)
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    state: RecordingState,
}

impl RecordingLifecycle {
    /// Create a new lifecycle in idle state
    pub fn new() -> Self {
        Self {
            state: RecordingState::Idle,
        }
    }

    /// Get the current state
    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == RecordingState::Idle
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    fn invalid(&self, action: &str) -> InvalidStateTransition {
        InvalidStateTransition {
            current_state: self.state,
            action: action.to_string(),
        }
    }

    /// Check that recording may begin, without transitioning
    pub fn check_begin(&self) -> Result<(), InvalidStateTransition> {
        if self.state != RecordingState::Idle {
            return Err(self.invalid("start recording"));
        }
        Ok(())
    }

    /// Transition from IDLE to RECORDING
    pub fn begin(&mut self) -> Result<(), InvalidStateTransition> {
        self.check_begin()?;
        self.state = RecordingState::Recording;
        Ok(())
    }

    /// Transition from RECORDING (or STOPPING, on retry) to STOPPING
    pub fn request_stop(&mut self) -> Result<(), InvalidStateTransition> {
        if !self.state.is_active() {
            return Err(self.invalid("stop recording"));
        }
        self.state = RecordingState::Stopping;
        Ok(())
    }

    /// Transition from STOPPING to STOPPED
    pub fn finish_stop(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != RecordingState::Stopping {
            return Err(self.invalid("finish stopping"));
        }
        self.state = RecordingState::Stopped;
        Ok(())
    }

    /// Transition from RECORDING to STOPPED when the process ends on its own
    pub fn process_exited(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != RecordingState::Recording {
            return Err(self.invalid("record an unexpected exit"));
        }
        self.state = RecordingState::Stopped;
        Ok(())
    }

    /// Transition from RECORDING or STOPPING to FAILED
    pub fn fail(&mut self) -> Result<(), InvalidStateTransition> {
        if !self.state.is_active() {
            return Err(self.invalid("mark the recording failed"));
        }
        self.state = RecordingState::Failed;
        Ok(())
    }

    /// Transition from STOPPED or FAILED back to IDLE
    pub fn reset(&mut self) -> Result<(), InvalidStateTransition> {
        if !self.state.is_finished() {
            return Err(self.invalid("reset"));
        }
        self.state = RecordingState::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lifecycle_is_idle() {
        let lifecycle = RecordingLifecycle::new();
        assert!(lifecycle.is_idle());
        assert!(!lifecycle.is_recording());
    }

    #[test]
    fn begin_from_idle() {
        let mut lifecycle = RecordingLifecycle::new();
        assert!(lifecycle.begin().is_ok());
        assert!(lifecycle.is_recording());
    }

    #[test]
    fn begin_while_recording_or_stopping_fails() {
        let mut lifecycle = RecordingLifecycle::new();
        lifecycle.begin().unwrap();

        let err = lifecycle.begin().unwrap_err();
        assert_eq!(err.current_state, RecordingState::Recording);
        assert!(err.action.contains("start recording"));

        lifecycle.request_stop().unwrap();
        let err = lifecycle.begin().unwrap_err();
        assert_eq!(err.current_state, RecordingState::Stopping);
    }

    #[test]
    fn stop_from_idle_fails() {
        let mut lifecycle = RecordingLifecycle::new();
        let err = lifecycle.request_stop().unwrap_err();
        assert_eq!(err.current_state, RecordingState::Idle);
    }

    #[test]
    fn stop_can_be_retried_while_stopping() {
        let mut lifecycle = RecordingLifecycle::new();
        lifecycle.begin().unwrap();
        lifecycle.request_stop().unwrap();
        assert!(lifecycle.request_stop().is_ok());
        assert_eq!(lifecycle.state(), RecordingState::Stopping);
    }

    #[test]
    fn graceful_stop_cycle() {
        let mut lifecycle = RecordingLifecycle::new();
        lifecycle.begin().unwrap();
        lifecycle.request_stop().unwrap();
        lifecycle.finish_stop().unwrap();
        assert_eq!(lifecycle.state(), RecordingState::Stopped);

        // Stopped is terminal until reset
        assert!(lifecycle.begin().is_err());
        assert!(lifecycle.request_stop().is_err());
        lifecycle.reset().unwrap();
        assert!(lifecycle.begin().is_ok());
    }

    #[test]
    fn process_exit_only_counts_while_recording() {
        let mut lifecycle = RecordingLifecycle::new();
        lifecycle.begin().unwrap();
        assert!(lifecycle.process_exited().is_ok());
        assert_eq!(lifecycle.state(), RecordingState::Stopped);

        // A second exit report is rejected: the transition happens once
        assert!(lifecycle.process_exited().is_err());
    }

    #[test]
    fn process_exit_while_stopping_is_left_to_the_stopper() {
        let mut lifecycle = RecordingLifecycle::new();
        lifecycle.begin().unwrap();
        lifecycle.request_stop().unwrap();
        assert!(lifecycle.process_exited().is_err());
        assert_eq!(lifecycle.state(), RecordingState::Stopping);
    }

    #[test]
    fn fail_from_active_states_only() {
        let mut lifecycle = RecordingLifecycle::new();
        assert!(lifecycle.fail().is_err());
        lifecycle.begin().unwrap();
        lifecycle.fail().unwrap();
        assert_eq!(lifecycle.state(), RecordingState::Failed);
        lifecycle.reset().unwrap();
        assert!(lifecycle.is_idle());
    }

    #[test]
    fn reset_from_idle_fails() {
        let mut lifecycle = RecordingLifecycle::new();
        assert!(lifecycle.reset().is_err());
    }

    #[test]
    fn state_display() {
        assert_eq!(RecordingState::Idle.to_string(), "idle");
        assert_eq!(RecordingState::Recording.to_string(), "recording");
        assert_eq!(RecordingState::Stopping.to_string(), "stopping");
        assert_eq!(RecordingState::Stopped.to_string(), "stopped");
        assert_eq!(RecordingState::Failed.to_string(), "failed");
    }

    #[test]
    fn error_display() {
        let err = InvalidStateTransition {
            current_state: RecordingState::Stopped,
            action: "stop recording".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("stop recording"));
        assert!(msg.contains("stopped"));
    }
}
