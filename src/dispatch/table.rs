//! Proc table assembly.
//!
//! Both tables are built once from the schema: one boxed entry per declared
//! (object, method) pair, stored flat and indexed by the schema's proc slot.
//! Every entry, validating or not, has the same shape, which is what lets a
//! context swap tables wholesale without touching call sites.

use std::sync::Arc;

use crate::backend::{Backend, MethodRef};
use crate::dispatch::error::{DispatchError, ErrorSink, FaultKind, Result};
use crate::dispatch::instances::{InstanceRegistry, ObjectRecord};
use crate::dispatch::types::{
    BackendArg, BackendRet, BitmaskValue, DispatchMode, EnumValue, RawArg, RawRet,
};
use crate::schema::{
    Annotation, ArgType, MethodDesc, MethodId, MethodTraits, NativeKind, ReturnType, Schema,
    TypeId,
};
use crate::utils::RawHandle;

/// Mutable state an entry runs against. Split out so the table itself stays
/// borrow-free while a call is in flight.
pub struct CallState<'a> {
    pub instances: &'a mut InstanceRegistry,
    pub backend: &'a mut dyn Backend,
    pub sink: &'a mut dyn ErrorSink,
}

/// Uniform entry signature shared by both tables.
pub type ProcFn =
    Box<dyn Fn(&mut CallState<'_>, RawHandle, &[RawArg<'_>]) -> RawRet + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgCheck {
    None,
    Enum(TypeId),
    Bitmask(TypeId),
}

/// Everything an entry needs that can be decided at table build time.
struct EntryPlan {
    ty: TypeId,
    method: MethodId,
    builder_self: bool,
    traits: MethodTraits,
    checks: Vec<ArgCheck>,
    ret: ReturnType,
    ty_name: String,
    method_name: String,
}

impl EntryPlan {
    fn new(ty: TypeId, method: MethodId, ty_name: &str, is_builder: bool, desc: &MethodDesc) -> Self {
        let checks = desc
            .args
            .iter()
            .map(|a| match (a.annotation, a.ty) {
                (Annotation::Value, ArgType::Enum(id)) => ArgCheck::Enum(id),
                (Annotation::Value, ArgType::Bitmask(id)) => ArgCheck::Bitmask(id),
                _ => ArgCheck::None,
            })
            .collect();

        Self {
            ty,
            method,
            builder_self: is_builder,
            traits: desc.traits,
            checks,
            ret: desc.ret,
            ty_name: ty_name.to_string(),
            method_name: desc.name.to_string(),
        }
    }

    fn stale(&self) -> DispatchError {
        DispatchError::StaleBuilderUse {
            ty: self.ty_name.clone(),
            method: self.method_name.clone(),
        }
    }

    fn invalid_enum(&self, arg: &str, value: u32) -> DispatchError {
        DispatchError::InvalidEnumValue {
            ty: self.ty_name.clone(),
            method: self.method_name.clone(),
            arg: arg.to_string(),
            value,
        }
    }

    fn invalid_bitmask(&self, arg: &str, value: u32) -> DispatchError {
        DispatchError::InvalidBitmaskValue {
            ty: self.ty_name.clone(),
            method: self.method_name.clone(),
            arg: arg.to_string(),
            value,
        }
    }

    fn custom_failure(&self) -> DispatchError {
        DispatchError::CustomValidationFailure {
            ty: self.ty_name.clone(),
            method: self.method_name.clone(),
        }
    }

    fn fault(&self, kind: FaultKind) -> DispatchError {
        DispatchError::Fault {
            ty: self.ty_name.clone(),
            method: self.method_name.clone(),
            kind,
        }
    }
}

/// The autogenerated part of entry validation: builder consumption state,
/// then every enum/bitmask argument in declared order, short-circuiting on
/// the first failure. Pure predicate; no mutation, no backend call.
fn validate_base(
    schema: &Schema,
    plan: &EntryPlan,
    desc: &MethodDesc,
    record: &ObjectRecord,
    args: &[RawArg<'_>],
) -> Result<()> {
    if plan.builder_self && !plan.traits.contains(MethodTraits::LIFECYCLE) && record.was_consumed()
    {
        return Err(plan.stale());
    }

    if args.len() != plan.checks.len() {
        return Err(plan.fault(FaultKind::ArityMismatch {
            expected: plan.checks.len(),
            got: args.len(),
        }));
    }

    for (i, check) in plan.checks.iter().enumerate() {
        let arg_name = || desc.args[i].name.as_str();
        match check {
            ArgCheck::None => {}
            ArgCheck::Enum(id) => {
                let raw = match args[i].as_u32() {
                    Some(raw) => raw,
                    None => {
                        return Err(plan.fault(FaultKind::ArgumentShape {
                            arg: arg_name().to_string(),
                        }))
                    }
                };
                if !schema.enum_type(*id).map_or(false, |e| e.is_valid(raw)) {
                    return Err(plan.invalid_enum(arg_name(), raw));
                }
            }
            ArgCheck::Bitmask(id) => {
                let raw = match args[i].as_u32() {
                    Some(raw) => raw,
                    None => {
                        return Err(plan.fault(FaultKind::ArgumentShape {
                            arg: arg_name().to_string(),
                        }))
                    }
                };
                if !schema.bitmask(*id).map_or(false, |b| b.is_valid(raw)) {
                    return Err(plan.invalid_bitmask(arg_name(), raw));
                }
            }
        }
    }

    Ok(())
}

/// Mechanical representation conversion: raw integers become tagged
/// enum/bitmask values, handles become backend keys. Total over well-shaped
/// input; a shape mismatch is a fault, never a reinterpretation.
fn convert_args<'a>(
    plan: &EntryPlan,
    desc: &MethodDesc,
    instances: &InstanceRegistry,
    args: &'a [RawArg<'a>],
) -> Result<Vec<BackendArg<'a>>> {
    if args.len() != desc.args.len() {
        return Err(plan.fault(FaultKind::ArityMismatch {
            expected: desc.args.len(),
            got: args.len(),
        }));
    }

    let mut out = Vec::with_capacity(args.len());
    for (arg, decl) in args.iter().zip(&desc.args) {
        let converted = match (decl.annotation, decl.ty, *arg) {
            (Annotation::Value, ArgType::Native(NativeKind::U32), RawArg::U32(v)) => {
                BackendArg::U32(v)
            }
            (Annotation::Value, ArgType::Native(NativeKind::I32), RawArg::I32(v)) => {
                BackendArg::I32(v)
            }
            (Annotation::Value, ArgType::Native(NativeKind::F32), RawArg::F32(v)) => {
                BackendArg::F32(v)
            }
            (Annotation::Value, ArgType::Native(NativeKind::Bool), RawArg::Bool(v)) => {
                BackendArg::Bool(v)
            }
            (Annotation::Value, ArgType::Enum(ty), RawArg::U32(v)) => {
                BackendArg::Enum(EnumValue { ty, raw: v })
            }
            (Annotation::Value, ArgType::Bitmask(ty), RawArg::U32(v)) => {
                BackendArg::Bitmask(BitmaskValue { ty, bits: v })
            }
            (Annotation::Value, ArgType::Object(_), RawArg::Object(h)) => match instances.get(h) {
                Some(record) => BackendArg::Object(record.backend),
                None => return Err(plan.fault(FaultKind::UnknownHandle)),
            },
            // Slice contents are not range-checked at this layer, even for
            // enum/bitmask element types.
            (Annotation::Slice, ArgType::Native(NativeKind::U32), RawArg::U32Slice(s))
            | (Annotation::Slice, ArgType::Enum(_), RawArg::U32Slice(s))
            | (Annotation::Slice, ArgType::Bitmask(_), RawArg::U32Slice(s)) => {
                BackendArg::U32Slice(s)
            }
            (Annotation::Slice, ArgType::Object(_), RawArg::ObjectSlice(handles)) => {
                let mut keys = Vec::with_capacity(handles.len());
                for h in handles {
                    match instances.get(*h) {
                        Some(record) => keys.push(record.backend),
                        None => return Err(plan.fault(FaultKind::UnknownHandle)),
                    }
                }
                BackendArg::ObjectSlice(keys)
            }
            (Annotation::Str, ArgType::Native(NativeKind::Char), RawArg::Str(s)) => {
                BackendArg::Str(s)
            }
            _ => {
                return Err(plan.fault(FaultKind::ArgumentShape {
                    arg: decl.name.clone(),
                }))
            }
        };
        out.push(converted);
    }

    Ok(out)
}

/// Translate the backend's result into the caller-facing value. Object
/// results are registered and handed back as fresh handles; builders start
/// unconsumed.
fn translate_ret(
    schema: &Schema,
    plan: &EntryPlan,
    instances: &mut InstanceRegistry,
    ret: BackendRet,
) -> Result<RawRet> {
    match (plan.ret, ret) {
        (ReturnType::Void, _) => Ok(RawRet::Unit),
        (ReturnType::Native(NativeKind::U32), BackendRet::U32(v)) => Ok(RawRet::U32(v)),
        (ReturnType::Native(NativeKind::Char), BackendRet::U32(v)) => Ok(RawRet::U32(v)),
        (ReturnType::Native(NativeKind::I32), BackendRet::I32(v)) => Ok(RawRet::I32(v)),
        (ReturnType::Native(NativeKind::F32), BackendRet::F32(v)) => Ok(RawRet::F32(v)),
        (ReturnType::Native(NativeKind::Bool), BackendRet::Bool(v)) => Ok(RawRet::Bool(v)),
        (ReturnType::Object(ty), BackendRet::Object(key)) => {
            let is_builder = schema.object(ty).map_or(false, |o| o.is_builder);
            match instances.register(ty, is_builder, key) {
                Some(h) => Ok(RawRet::Object(h)),
                None => Err(plan.fault(FaultKind::OutOfSlots)),
            }
        }
        _ => Err(plan.fault(FaultKind::ResultShape)),
    }
}

/// Entry without validation: convert and forward, nothing else. Builder
/// consumption state is still advanced on a finalizer so a later table swap
/// sees coherent lifecycle state.
fn passthrough_entry(schema: Arc<Schema>, plan: EntryPlan) -> ProcFn {
    Box::new(move |st, target, args| {
        let outcome = (|| {
            let desc = match schema.method(plan.ty, plan.method) {
                Some(desc) => desc,
                None => return Err(plan.fault(FaultKind::UnknownMethod)),
            };
            let record = match st.instances.get(target) {
                Some(record) => *record,
                None => return Err(plan.fault(FaultKind::UnknownHandle)),
            };

            let converted = convert_args(&plan, desc, st.instances, args)?;
            let mref = MethodRef {
                ty: plan.ty,
                method: plan.method,
                desc,
            };
            let ret = st.backend.call(mref, record.backend, &converted);

            if plan.traits.contains(MethodTraits::FINALIZER) {
                if let Some(record) = st.instances.get_mut(target) {
                    record.mark_consumed();
                }
            }

            translate_ret(&schema, &plan, st.instances, ret)
        })();

        match outcome {
            Ok(ret) => ret,
            Err(err) => {
                st.sink.report(&err);
                RawRet::zeroed(plan.ret)
            }
        }
    })
}

/// Entry with validation: base checks, then the backend's hook where the
/// method opted in, and only then the same forwarding as the passthrough
/// entry. On failure the backend is never reached and the caller gets the
/// zero value of the declared return type.
fn validating_entry(schema: Arc<Schema>, plan: EntryPlan) -> ProcFn {
    Box::new(move |st, target, args| {
        let outcome = (|| {
            let desc = match schema.method(plan.ty, plan.method) {
                Some(desc) => desc,
                None => return Err(plan.fault(FaultKind::UnknownMethod)),
            };
            let record = match st.instances.get(target) {
                Some(record) => *record,
                None => return Err(plan.fault(FaultKind::UnknownHandle)),
            };

            validate_base(&schema, &plan, desc, &record, args)?;

            let converted = convert_args(&plan, desc, st.instances, args)?;
            let mref = MethodRef {
                ty: plan.ty,
                method: plan.method,
                desc,
            };

            if plan.traits.contains(MethodTraits::CUSTOM_VALIDATION)
                && !st.backend.validate(mref, record.backend, &converted)
            {
                return Err(plan.custom_failure());
            }

            let ret = st.backend.call(mref, record.backend, &converted);

            if plan.traits.contains(MethodTraits::FINALIZER) {
                if let Some(record) = st.instances.get_mut(target) {
                    record.mark_consumed();
                }
            }

            translate_ret(&schema, &plan, st.instances, ret)
        })();

        match outcome {
            Ok(ret) => ret,
            Err(err) => {
                st.sink.report(&err);
                RawRet::zeroed(plan.ret)
            }
        }
    })
}

/// A flat table of entries, one per declared (object, method) pair, laid
/// out in proc-slot order.
pub struct ProcTable {
    mode: DispatchMode,
    procs: Vec<ProcFn>,
}

impl ProcTable {
    pub fn new(schema: &Arc<Schema>, mode: DispatchMode) -> ProcTable {
        let mut procs = Vec::with_capacity(schema.proc_count());
        for (ty, obj) in schema.objects() {
            for (i, desc) in obj.methods.iter().enumerate() {
                let plan =
                    EntryPlan::new(ty, MethodId(i as u16), &obj.name, obj.is_builder, desc);
                procs.push(match mode {
                    DispatchMode::Validating => validating_entry(schema.clone(), plan),
                    DispatchMode::Passthrough => passthrough_entry(schema.clone(), plan),
                });
            }
        }
        debug_assert_eq!(procs.len(), schema.proc_count());
        ProcTable { mode, procs }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    pub(crate) fn proc(&self, slot: usize) -> Option<&ProcFn> {
        self.procs.get(slot)
    }
}
