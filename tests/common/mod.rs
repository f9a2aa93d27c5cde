#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use sabaki::{
    ArgDesc, ArgType, Backend, BackendArg, BackendKey, BackendRet, Context, DispatchError,
    DispatchMode, ErrorSink, MethodId, MethodRef, NativeKind, RawHandle, ReturnType, Schema,
    TypeId,
};

/// Shared record of everything the backend saw. Kept behind `Rc` so tests
/// can inspect it after the backend moved into the context.
#[derive(Default)]
pub struct CallLog {
    pub calls: Vec<(TypeId, MethodId)>,
    pub validates: usize,
}

impl CallLog {
    pub fn count(&self) -> usize {
        self.calls.len()
    }
}

/// Backend that records every forwarded call and hook invocation, and
/// otherwise behaves like the null backend.
pub struct RecordingBackend {
    pub log: Rc<RefCell<CallLog>>,
    pub accept_hook: bool,
    next_key: BackendKey,
}

impl RecordingBackend {
    pub fn new(log: Rc<RefCell<CallLog>>, accept_hook: bool) -> Self {
        Self {
            log,
            accept_hook,
            next_key: 1,
        }
    }
}

impl Backend for RecordingBackend {
    fn call(
        &mut self,
        method: MethodRef<'_>,
        _target: BackendKey,
        _args: &[BackendArg<'_>],
    ) -> BackendRet {
        self.log.borrow_mut().calls.push((method.ty, method.method));
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

    fn validate(
        &self,
        _method: MethodRef<'_>,
        _target: BackendKey,
        _args: &[BackendArg<'_>],
    ) -> bool {
        self.log.borrow_mut().validates += 1;
        self.accept_hook
    }
}

/// Sink that stores every reported failure for inspection.
pub struct CaptureSink {
    pub errors: Rc<RefCell<Vec<DispatchError>>>,
}

impl ErrorSink for CaptureSink {
    fn report(&mut self, err: &DispatchError) {
        self.errors.borrow_mut().push(err.clone());
    }
}

/// The command-API shaped schema the integration tests drive: a device
/// with factory methods, a queue and command buffer behind builders, a
/// shader-stage enum and a stage bitmask.
pub struct Sample {
    pub schema: Arc<Schema>,
    pub device: TypeId,
    pub queue: TypeId,
    pub queue_builder: TypeId,
    pub command_buffer: TypeId,
    pub command_buffer_builder: TypeId,
    pub shader_stage: TypeId,
    pub stage_bits: TypeId,

    pub create_command_buffer_builder: MethodId,
    pub create_queue_builder: MethodId,
    pub add_stage: MethodId,
    pub set_push_constants: MethodId,
    pub set_debug_name: MethodId,
    pub cbb_get_result: MethodId,
    pub qb_get_result: MethodId,
    pub submit: MethodId,
}

pub fn sample() -> Sample {
    let mut b = Schema::builder();

    let shader_stage = b.enum_type(
        "shader_stage",
        &[("vertex", 0), ("fragment", 1), ("compute", 2)],
    );
    let stage_bits = b.bitmask(
        "shader_stage_bits",
        &[("vertex", 0x1), ("fragment", 0x2), ("compute", 0x4)],
    );

    let device = b.object("device");
    let queue = b.object("queue");
    let queue_builder = b.builder_object("queue_builder");
    let command_buffer = b.object("command_buffer");
    let command_buffer_builder = b.builder_object("command_buffer_builder");

    let create_command_buffer_builder = b.method(
        device,
        "create_command_buffer_builder",
        Vec::new(),
        ReturnType::Object(command_buffer_builder),
    );
    let create_queue_builder = b.method(
        device,
        "create_queue_builder",
        Vec::new(),
        ReturnType::Object(queue_builder),
    );

    let add_stage = b.method(
        command_buffer_builder,
        "add_stage",
        vec![ArgDesc::value("stage", ArgType::Enum(shader_stage))],
        ReturnType::Void,
    );
    let set_push_constants = b.method(
        command_buffer_builder,
        "set_push_constants",
        vec![
            ArgDesc::value("stages", ArgType::Bitmask(stage_bits)),
            ArgDesc::value("offset", ArgType::Native(NativeKind::U32)),
            ArgDesc::slice("values", ArgType::Native(NativeKind::U32)),
        ],
        ReturnType::Void,
    );
    let set_debug_name = b.method(
        command_buffer_builder,
        "set_debug_name",
        vec![ArgDesc::string("name")],
        ReturnType::Void,
    );
    let cbb_get_result = b.finalizer(
        command_buffer_builder,
        "get_result",
        Vec::new(),
        ReturnType::Object(command_buffer),
    );
    b.custom_validation(command_buffer_builder, cbb_get_result);

    let qb_get_result = b.finalizer(
        queue_builder,
        "get_result",
        Vec::new(),
        ReturnType::Object(queue),
    );

    let submit = b.method(
        queue,
        "submit",
        vec![ArgDesc::value("commands", ArgType::Object(command_buffer))],
        ReturnType::Void,
    );

    Sample {
        schema: Arc::new(b.finish()),
        device,
        queue,
        queue_builder,
        command_buffer,
        command_buffer_builder,
        shader_stage,
        stage_bits,
        create_command_buffer_builder,
        create_queue_builder,
        add_stage,
        set_push_constants,
        set_debug_name,
        cbb_get_result,
        qb_get_result,
        submit,
    }
}

pub struct Harness {
    pub ctx: Context,
    pub device: RawHandle,
    pub log: Rc<RefCell<CallLog>>,
    pub errors: Rc<RefCell<Vec<DispatchError>>>,
}

/// A ready-to-call context over the sample schema with a recording backend
/// and a capturing sink. The device is registered as the root object.
pub fn harness(sample: &Sample, mode: DispatchMode, accept_hook: bool) -> Harness {
    let log = Rc::new(RefCell::new(CallLog::default()));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let backend = RecordingBackend::new(log.clone(), accept_hook);
    let sink = CaptureSink {
        errors: errors.clone(),
    };
    let mut ctx = Context::with_sink(
        sample.schema.clone(),
        Box::new(backend),
        mode,
        Box::new(sink),
    );
    let device = ctx
        .register_root(sample.device, 100)
        .expect("device registration");
    Harness {
        ctx,
        device,
        log,
        errors,
    }
}
