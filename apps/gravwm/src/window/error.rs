use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::{debug, error, warn};
use x11rb::protocol::xproto::Window;

/// Lookup failures of control operations. These abort the single operation
/// and are logged as warnings; the window manager keeps running.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WmError {
    #[error("Unknown client window {0:#x}")]
    UnknownClient(Window),

    #[error("Unknown view {0}")]
    UnknownView(usize),

    #[error("Unknown tag {0}")]
    UnknownTag(usize),

    #[error("Unknown gravity {0}")]
    UnknownGravity(usize),

    #[error("Unknown screen {0}")]
    UnknownScreen(usize),

    #[error("Client {0:#x} is not floating")]
    NotFloating(Window),

    #[error("Invalid {what}: {value}")]
    InvalidArgument { what: &'static str, value: u32 },

    #[error("Can't remove {0}")]
    Protected(&'static str),

    #[error("Name error: {0}")]
    Name(#[from] gravwm_proto::ProtoError),

    #[error("Tag limit of {0} reached")]
    TooManyTags(usize),
}

/// X request opcodes whose errors are expected races
const X_SET_INPUT_FOCUS: u8 = 42;

/// Error tracking for X11 operations
pub struct ErrorTracker {
    x11_errors: AtomicU64,
    window_errors: AtomicU64,
    control_errors: AtomicU64,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self {
            x11_errors: AtomicU64::new(0),
            window_errors: AtomicU64::new(0),
            control_errors: AtomicU64::new(0),
        }
    }

    /// Protocol error delivered as an event. Clients vanish at any time, so
    /// these are only logged at debug level.
    pub fn record_protocol_error(&self, major_opcode: u8, error_kind: impl std::fmt::Debug, bad_value: u32) {
        if major_opcode == X_SET_INPUT_FOCUS {
            return;
        }
        self.x11_errors.fetch_add(1, Ordering::Relaxed);
        debug!("X11 error {:?} in request {} on {:#x}", error_kind, major_opcode, bad_value);
    }

    pub fn record_x11_error(&self, operation: &str, error: impl std::fmt::Display) {
        self.x11_errors.fetch_add(1, Ordering::Relaxed);
        error!("X11 error in {}: {}", operation, error);
    }

    pub fn record_window_error(&self, operation: &str, error: impl std::fmt::Display) {
        self.window_errors.fetch_add(1, Ordering::Relaxed);
        warn!("Window management error in {}: {}", operation, error);
    }

    pub fn record_control_error(&self, message: &str, error: &WmError) {
        self.control_errors.fetch_add(1, Ordering::Relaxed);
        warn!("Ignoring {}: {}", message, error);
    }

    pub fn warn_if_failed<T, E: std::fmt::Display>(
        &self,
        result: Result<T, E>,
        operation: &str,
        category: ErrorCategory,
    ) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                match category {
                    ErrorCategory::X11 => self.record_x11_error(operation, e),
                    ErrorCategory::Window => self.record_window_error(operation, e),
                }
                None
            }
        }
    }

    pub fn health_check(&self) -> HealthStatus {
        let x11 = self.x11_errors.load(Ordering::Relaxed);
        let win = self.window_errors.load(Ordering::Relaxed);
        let control = self.control_errors.load(Ordering::Relaxed);

        HealthStatus {
            x11_errors: x11,
            window_errors: win,
            control_errors: control,
            is_healthy: win < 10,
        }
    }
}

pub enum ErrorCategory {
    X11,
    Window,
}

pub struct HealthStatus {
    pub x11_errors: u64,
    pub window_errors: u64,
    pub control_errors: u64,
    pub is_healthy: bool,
}

impl Default for ErrorTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Log and ignore X11 errors (for cleanup operations)
pub fn log_and_ignore<T, E: std::fmt::Display>(result: Result<T, E>, operation: &str) {
    if let Err(e) = result {
        debug!("Ignoring error in {}: {}", operation, e);
    }
}
