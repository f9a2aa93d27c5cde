//! The seam between the dispatch layer and whatever actually executes
//! commands. A backend speaks [`BackendKey`]s only; handle management and
//! lifecycle tracking stay on the dispatch side.

use crate::dispatch::types::{BackendArg, BackendKey, BackendRet};
use crate::schema::{MethodDesc, MethodId, NativeKind, ReturnType, TypeId};

/// Identifies the method being forwarded, descriptor included, so a backend
/// can dispatch however it likes (match on ids, read the name, inspect the
/// declared shape).
#[derive(Clone, Copy)]
pub struct MethodRef<'a> {
    pub ty: TypeId,
    pub method: MethodId,
    pub desc: &'a MethodDesc,
}

/// Implemented by the object provider. Every declared method must be
/// handled by `call`; the arguments arrive already converted to their
/// tagged representations in declared order.
pub trait Backend {
    fn call(
        &mut self,
        method: MethodRef<'_>,
        target: BackendKey,
        args: &[BackendArg<'_>],
    ) -> BackendRet;

    /// Method-specific validation hook. Runs only for methods flagged for
    /// custom validation, only after the base checks passed. Returning
    /// false rejects the call before `call` is reached.
    fn validate(
        &self,
        method: MethodRef<'_>,
        target: BackendKey,
        args: &[BackendArg<'_>],
    ) -> bool {
        let _ = (method, target, args);
        true
    }
}

/// Backend that accepts every call and manufactures fresh keys for object
/// results. Useful as a stand-in while bringing up a host, and in tests
/// that only care about dispatch behavior.
#[derive(Debug)]
pub struct NullBackend {
    next_key: BackendKey,
}

impl NullBackend {
    pub fn new() -> Self {
        Self { next_key: 1 }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for NullBackend {
    fn call(
        &mut self,
        method: MethodRef<'_>,
        _target: BackendKey,
        _args: &[BackendArg<'_>],
    ) -> BackendRet {
        match method.desc.ret {
            ReturnType::Void => BackendRet::None,
            ReturnType::Native(NativeKind::U32) | ReturnType::Native(NativeKind::Char) => {
                BackendRet::U32(0)
            }
            ReturnType::Native(NativeKind::I32) => BackendRet::I32(0),
            ReturnType::Native(NativeKind::F32) => BackendRet::F32(0.0),
            ReturnType::Native(NativeKind::Bool) => BackendRet::Bool(false),
            ReturnType::Object(_) => {
                let key = self.next_key;
                self.next_key += 1;
                BackendRet::Object(key)
            }
        }
    }
}
