//! End-to-end walkthrough: declare a small command API, route calls through
//! the validating table, trip a couple of validation failures, then swap to
//! the passthrough table for the trusted path.
//!
//! Run with `RUST_LOG=error cargo run --example record_and_submit` to see
//! the rejected calls in the log.

use std::sync::Arc;

use sabaki::{
    ArgDesc, ArgType, Context, DispatchMode, NativeKind, NullBackend, RawArg, ReturnType, Schema,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // The schema a generator would normally hand us.
    let mut b = Schema::builder();
    let stage = b.enum_type("shader_stage", &[("vertex", 0), ("fragment", 1), ("compute", 2)]);
    let stage_bits = b.bitmask(
        "shader_stage_bits",
        &[("vertex", 0x1), ("fragment", 0x2), ("compute", 0x4)],
    );

    let device = b.object("device");
    let queue = b.object("queue");
    let command_buffer = b.object("command_buffer");
    let builder_ty = b.builder_object("command_buffer_builder");

    let create_builder = b.method(
        device,
        "create_command_buffer_builder",
        Vec::new(),
        ReturnType::Object(builder_ty),
    );
    let create_queue = b.method(device, "create_queue", Vec::new(), ReturnType::Object(queue));
    let add_stage = b.method(
        builder_ty,
        "add_stage",
        vec![ArgDesc::value("stage", ArgType::Enum(stage))],
        ReturnType::Void,
    );
    let set_push_constants = b.method(
        builder_ty,
        "set_push_constants",
        vec![
            ArgDesc::value("stages", ArgType::Bitmask(stage_bits)),
            ArgDesc::value("offset", ArgType::Native(NativeKind::U32)),
            ArgDesc::slice("values", ArgType::Native(NativeKind::U32)),
        ],
        ReturnType::Void,
    );
    let get_result = b.finalizer(
        builder_ty,
        "get_result",
        Vec::new(),
        ReturnType::Object(command_buffer),
    );
    let submit = b.method(
        queue,
        "submit",
        vec![ArgDesc::value("commands", ArgType::Object(command_buffer))],
        ReturnType::Void,
    );
    let schema = Arc::new(b.finish());

    let mut ctx = Context::new(
        schema,
        Box::new(NullBackend::new()),
        DispatchMode::Validating,
    );
    let dev = ctx.register_root(device, 1).expect("register device");

    // Record a command buffer.
    let builder = ctx.call(dev, create_builder, &[]).object().unwrap();
    ctx.call(builder, add_stage, &[RawArg::U32(0)]);
    ctx.call(
        builder,
        set_push_constants,
        &[RawArg::U32(0x3), RawArg::U32(0), RawArg::U32Slice(&[1, 2, 3])],
    );
    let commands = ctx.call(builder, get_result, &[]).object().unwrap();
    println!("recorded command buffer {commands:?}");

    // Two calls the validating table rejects: an undeclared stage value,
    // and a builder that has already been consumed.
    ctx.call(builder, add_stage, &[RawArg::U32(9)]);
    ctx.call(builder, add_stage, &[RawArg::U32(0)]);
    println!(
        "builder consumed: {}",
        ctx.was_consumed(builder).unwrap_or(false)
    );

    // Trusted path: swap the whole table, no call sites change.
    ctx.set_mode(DispatchMode::Passthrough);
    let q = ctx.call(dev, create_queue, &[]).object().unwrap();
    ctx.call(q, submit, &[RawArg::Object(commands)]);
    println!("submitted through the passthrough table");
}
