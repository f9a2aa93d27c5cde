use std::fmt;

/// Everything the validating table can reject a call for, plus the faults
/// both tables raise for call-boundary misuse that C would leave undefined.
///
/// All of these are synchronous and non-fatal: the entry reports once to the
/// [`ErrorSink`] and returns the zero value of the method's return type. The
/// backend is never invoked for a rejected call.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Non-lifecycle method invoked on an already-consumed builder.
    StaleBuilderUse { ty: String, method: String },
    /// Raw integer is not one of the enum's declared values.
    InvalidEnumValue {
        ty: String,
        method: String,
        arg: String,
        value: u32,
    },
    /// Raw integer has bits outside the bitmask's declared set.
    InvalidBitmaskValue {
        ty: String,
        method: String,
        arg: String,
        value: u32,
    },
    /// The backend's per-method hook rejected the call.
    CustomValidationFailure { ty: String, method: String },
    /// Call-boundary misuse; raised by both tables.
    Fault {
        ty: String,
        method: String,
        kind: FaultKind,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FaultKind {
    /// Target handle is null, stale, or was never registered.
    UnknownHandle,
    /// Method id out of range for the target's type.
    UnknownMethod,
    ArityMismatch { expected: usize, got: usize },
    /// Argument value shape does not match the declaration.
    ArgumentShape { arg: String },
    /// Backend returned a value shape the declaration does not allow.
    ResultShape,
    /// Instance registry is out of handle slots.
    OutOfSlots,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::StaleBuilderUse { ty, method } => {
                write!(f, "{ty}.{method}: builder already consumed")
            }
            DispatchError::InvalidEnumValue {
                ty,
                method,
                arg,
                value,
            } => write!(f, "{ty}.{method}: {value:#x} is not a valid value for enum argument '{arg}'"),
            DispatchError::InvalidBitmaskValue {
                ty,
                method,
                arg,
                value,
            } => write!(f, "{ty}.{method}: {value:#x} has undeclared bits for bitmask argument '{arg}'"),
            DispatchError::CustomValidationFailure { ty, method } => {
                write!(f, "{ty}.{method}: rejected by method-specific validation")
            }
            DispatchError::Fault { ty, method, kind } => {
                write!(f, "{ty}.{method}: ")?;
                match kind {
                    FaultKind::UnknownHandle => write!(f, "unknown object handle"),
                    FaultKind::UnknownMethod => write!(f, "unknown method"),
                    FaultKind::ArityMismatch { expected, got } => {
                        write!(f, "expected {expected} arguments, got {got}")
                    }
                    FaultKind::ArgumentShape { arg } => {
                        write!(f, "argument '{arg}' has the wrong shape")
                    }
                    FaultKind::ResultShape => write!(f, "backend result has the wrong shape"),
                    FaultKind::OutOfSlots => write!(f, "ran out of handle slots"),
                }
            }
        }
    }
}

/// Convenient crate-wide result type.
pub type Result<T, E = DispatchError> = std::result::Result<T, E>;

/// Where validation failures go. A failure is reported exactly once and
/// control returns to the caller; the sink decides whether anything is
/// fatal.
pub trait ErrorSink {
    fn report(&mut self, err: &DispatchError);
}

/// Default sink: one diagnostic line per failure through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&mut self, err: &DispatchError) {
        tracing::error!(target: "sabaki", "{err}");
    }
}
