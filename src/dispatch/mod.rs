//! Call routing: proc tables, the context that owns them, and everything a
//! call passes through on its way to the backend.

pub mod context;
pub mod error;
pub mod instances;
pub mod table;
pub mod types;

pub use context::Context;
pub use error::{DispatchError, ErrorSink, FaultKind, LogSink, Result};
pub use instances::{InstanceRegistry, Lifecycle, ObjectRecord};
pub use table::{CallState, ProcFn, ProcTable};
pub use types::{
    BackendArg, BackendKey, BackendRet, BitmaskValue, DispatchMode, EnumValue, RawArg, RawRet,
};
