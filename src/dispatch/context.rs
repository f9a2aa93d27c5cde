use std::sync::Arc;

use crate::backend::Backend;
use crate::dispatch::error::{DispatchError, ErrorSink, FaultKind, LogSink};
use crate::dispatch::instances::InstanceRegistry;
use crate::dispatch::table::{CallState, ProcTable};
use crate::dispatch::types::{BackendKey, DispatchMode, RawArg, RawRet};
use crate::schema::{MethodId, Schema, TypeId};
use crate::utils::RawHandle;

/// Owns one schema's worth of dispatch machinery: both proc tables, the
/// instance registry, the backend, and the error sink.
///
/// There is no process-global table; a host constructs a context, picks a
/// [`DispatchMode`], and routes every call through [`Context::call`].
/// Because calls take `&mut self`, the active table can never change while
/// a call is in flight, and per-object single-writer access within one
/// context is enforced by the borrow checker. Sharing one context across
/// threads is the caller's synchronization problem, as is the atomicity of
/// the backend's reference counts.
pub struct Context {
    schema: Arc<Schema>,
    validating: ProcTable,
    passthrough: ProcTable,
    mode: DispatchMode,
    instances: InstanceRegistry,
    backend: Box<dyn Backend>,
    sink: Box<dyn ErrorSink>,
}

impl Context {
    /// Build both tables from the schema and start in the given mode.
    pub fn new(schema: Arc<Schema>, backend: Box<dyn Backend>, mode: DispatchMode) -> Self {
        Self::with_sink(schema, backend, mode, Box::new(LogSink))
    }

    /// As [`Context::new`], with a caller-supplied error sink.
    pub fn with_sink(
        schema: Arc<Schema>,
        backend: Box<dyn Backend>,
        mode: DispatchMode,
        sink: Box<dyn ErrorSink>,
    ) -> Self {
        let validating = ProcTable::new(&schema, DispatchMode::Validating);
        let passthrough = ProcTable::new(&schema, DispatchMode::Passthrough);
        Self {
            schema,
            validating,
            passthrough,
            mode,
            instances: InstanceRegistry::new(),
            backend,
            sink,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Swap which table serves subsequent calls. Wholesale: every entry
    /// switches at once, call sites are untouched.
    pub fn set_mode(&mut self, mode: DispatchMode) {
        self.mode = mode;
    }

    /// Register an externally created object (typically the device) so it
    /// can be the target of calls.
    pub fn register_root(&mut self, ty: TypeId, backend: BackendKey) -> Option<RawHandle> {
        let is_builder = self.schema.object(ty)?.is_builder;
        self.instances.register(ty, is_builder, backend)
    }

    /// Consumption state of a builder object, if the handle is live.
    pub fn was_consumed(&self, handle: RawHandle) -> Option<bool> {
        self.instances.get(handle).map(|r| r.was_consumed())
    }

    /// Invoke a method on an object through the active table.
    ///
    /// The entry is looked up from the target's concrete type; on any
    /// rejection the backend is not called, the failure is reported to the
    /// sink, and the zero value of the declared return type comes back.
    pub fn call(&mut self, target: RawHandle, method: MethodId, args: &[RawArg<'_>]) -> RawRet {
        let (ty, ty_name) = match self.instances.get(target) {
            Some(record) => (record.ty, self.schema.type_name(record.ty).to_string()),
            None => {
                self.sink.report(&DispatchError::Fault {
                    ty: "<unknown>".to_string(),
                    method: "<unknown>".to_string(),
                    kind: FaultKind::UnknownHandle,
                });
                return RawRet::Unit;
            }
        };

        let slot = match self.schema.proc_slot(ty, method) {
            Some(slot) => slot,
            None => {
                self.sink.report(&DispatchError::Fault {
                    ty: ty_name,
                    method: format!("#{}", method.0),
                    kind: FaultKind::UnknownMethod,
                });
                return RawRet::Unit;
            }
        };

        let table = match self.mode {
            DispatchMode::Validating => &self.validating,
            DispatchMode::Passthrough => &self.passthrough,
        };

        // Table layout matches Schema::proc_slot by construction.
        let proc = match table.proc(slot) {
            Some(proc) => proc,
            None => {
                self.sink.report(&DispatchError::Fault {
                    ty: ty_name,
                    method: format!("#{}", method.0),
                    kind: FaultKind::UnknownMethod,
                });
                return RawRet::Unit;
            }
        };

        let mut state = CallState {
            instances: &mut self.instances,
            backend: self.backend.as_mut(),
            sink: self.sink.as_mut(),
        };
        proc(&mut state, target, args)
    }

    /// Name-based convenience over [`Context::call`].
    pub fn call_by_name(
        &mut self,
        target: RawHandle,
        method: &str,
        args: &[RawArg<'_>],
    ) -> RawRet {
        let ty = match self.instances.get(target) {
            Some(record) => record.ty,
            None => {
                self.sink.report(&DispatchError::Fault {
                    ty: "<unknown>".to_string(),
                    method: method.to_string(),
                    kind: FaultKind::UnknownHandle,
                });
                return RawRet::Unit;
            }
        };
        match self.schema.find_method(ty, method) {
            Some(id) => self.call(target, id, args),
            None => {
                self.sink.report(&DispatchError::Fault {
                    ty: self.schema.type_name(ty).to_string(),
                    method: method.to_string(),
                    kind: FaultKind::UnknownMethod,
                });
                RawRet::Unit
            }
        }
    }
}
