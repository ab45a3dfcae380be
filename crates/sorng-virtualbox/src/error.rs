//! Error types for the VirtualBox management crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `VBOX_E_OBJECT_NOT_FOUND`: the requested object does not exist.
pub const VBOX_E_OBJECT_NOT_FOUND: i64 = 0x80BB_0001;
/// `VBOX_E_INVALID_VM_STATE`: the machine is in a state that forbids the call.
pub const VBOX_E_INVALID_VM_STATE: i64 = 0x80BB_0002;
/// `VBOX_E_INVALID_OBJECT_STATE`: returned by `lockMachine` when another
/// session already holds the machine.
pub const VBOX_E_INVALID_OBJECT_STATE: i64 = 0x80BB_0007;

/// Error kinds for VirtualBox operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VBoxErrorKind {
    /// A required argument is missing or malformed. Never reaches the hypervisor.
    InvalidInput,
    /// The target machine is not registered.
    MachineNotFound,
    /// The operation needs the machine powered off / running and it is not,
    /// or the machine is inaccessible.
    InvalidMachineState,
    /// Another session already holds a conflicting lock on the machine.
    LockContention,
    /// Unrecognised controller type, network mode, clipboard / DND mode or
    /// graphics controller.
    UnsupportedOption,
    /// A medium is already attached at the requested controller/port/device.
    TargetOccupied,
    /// An asynchronous hypervisor task completed with a non-zero result code.
    HypervisorTaskFailed,
    /// Any other management API failure; the message is passed through verbatim.
    HypervisorCallFailed,
    /// A progress wait elapsed before the task completed.
    Timeout,
}

/// VirtualBox management error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VBoxError {
    pub kind: VBoxErrorKind,
    pub message: String,
    /// Raw hypervisor result code, when the failure carried one.
    #[serde(default)]
    pub code: Option<i64>,
}

impl fmt::Display for VBoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)?;
        if let Some(code) = self.code {
            write!(f, " (code {:#x})", code)?;
        }
        Ok(())
    }
}

impl std::error::Error for VBoxError {}

impl VBoxError {
    pub fn new(kind: VBoxErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(kind: VBoxErrorKind, message: impl Into<String>, code: i64) -> Self {
        Self {
            kind,
            message: message.into(),
            code: Some(code),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(VBoxErrorKind::InvalidInput, message)
    }

    pub fn invalid_state(vm: &str, current: &str, expected: &str) -> Self {
        Self::new(
            VBoxErrorKind::InvalidMachineState,
            format!("VM '{}' is in state '{}', expected {}", vm, current, expected),
        )
    }

    pub fn lock_contention(vm: &str, detail: &str) -> Self {
        Self::with_code(
            VBoxErrorKind::LockContention,
            format!("VM '{}' is locked by another session: {}", vm, detail),
            VBOX_E_INVALID_OBJECT_STATE,
        )
    }

    pub fn unsupported(what: &str, value: &str) -> Self {
        Self::new(
            VBoxErrorKind::UnsupportedOption,
            format!("Unsupported {} '{}'", what, value),
        )
    }

    pub fn target_occupied(controller: &str, port: i32, device: i32) -> Self {
        Self::new(
            VBoxErrorKind::TargetOccupied,
            format!(
                "Medium already attached at {} port {} device {}",
                controller, port, device
            ),
        )
    }

    pub fn task_failed(code: i64) -> Self {
        Self::with_code(
            VBoxErrorKind::HypervisorTaskFailed,
            format!("VirtualBox progress failed: resultCode={}", code),
            code,
        )
    }

    pub fn call_failed(message: impl Into<String>) -> Self {
        Self::new(VBoxErrorKind::HypervisorCallFailed, message)
    }

    pub fn timeout(op: &str) -> Self {
        Self::new(
            VBoxErrorKind::Timeout,
            format!("Operation '{}' timed out", op),
        )
    }

    /// Whether this error was raised before any hypervisor mutation happened.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self.kind,
            VBoxErrorKind::InvalidInput
                | VBoxErrorKind::UnsupportedOption
                | VBoxErrorKind::TargetOccupied
        )
    }
}

/// Convert a `VBoxError` into a plain `String` for Tauri command returns.
impl From<VBoxError> for String {
    fn from(e: VBoxError) -> String {
        e.to_string()
    }
}

/// Convenience alias.
pub type VBoxResult<T> = Result<T, VBoxError>;
