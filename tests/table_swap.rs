mod common;

use common::{harness, sample};
use sabaki::{DispatchError, DispatchMode, RawArg, RawRet};

#[test]
fn both_tables_forward_valid_calls_identically() {
    let s = sample();

    let run = |mode: DispatchMode| {
        let mut h = harness(&s, mode, true);
        let builder = h
            .ctx
            .call(h.device, s.create_command_buffer_builder, &[])
            .object()
            .unwrap();
        h.ctx.call(builder, s.add_stage, &[RawArg::U32(2)]);
        h.ctx.call(
            builder,
            s.set_push_constants,
            &[RawArg::U32(0x3), RawArg::U32(4), RawArg::U32Slice(&[7, 8])],
        );
        let result = h.ctx.call(builder, s.cbb_get_result, &[]);
        (h.log.borrow().calls.clone(), result, h.errors.borrow().len())
    };

    let (validated_calls, validated_ret, validated_errors) = run(DispatchMode::Validating);
    let (raw_calls, raw_ret, raw_errors) = run(DispatchMode::Passthrough);

    // Same backend call sequence, same returned value, no failures on
    // either path.
    assert_eq!(validated_calls, raw_calls);
    assert_eq!(validated_ret, raw_ret);
    assert_eq!(validated_errors, 0);
    assert_eq!(raw_errors, 0);
}

#[test]
fn passthrough_forwards_what_validation_would_reject() {
    let s = sample();
    let mut h = harness(&s, DispatchMode::Passthrough, true);

    let builder = h
        .ctx
        .call(h.device, s.create_command_buffer_builder, &[])
        .object()
        .unwrap();
    let before = h.log.borrow().count();

    // Out-of-range enum goes straight through on the trusted table.
    h.ctx.call(builder, s.add_stage, &[RawArg::U32(42)]);
    assert_eq!(h.log.borrow().count(), before + 1);
    assert!(h.errors.borrow().is_empty());
}

#[test]
fn passthrough_never_runs_the_custom_hook() {
    let s = sample();
    let mut h = harness(&s, DispatchMode::Passthrough, false);

    let builder = h
        .ctx
        .call(h.device, s.create_command_buffer_builder, &[])
        .object()
        .unwrap();
    let ret = h.ctx.call(builder, s.cbb_get_result, &[]);

    assert_eq!(h.log.borrow().validates, 0);
    assert!(ret.object().is_some());
}

#[test]
fn mode_swap_is_wholesale_and_respects_tracked_state() {
    let s = sample();
    let mut h = harness(&s, DispatchMode::Passthrough, true);

    let builder = h
        .ctx
        .call(h.device, s.create_command_buffer_builder, &[])
        .object()
        .unwrap();
    // Finalized while running unvalidated; consumption is still tracked.
    h.ctx.call(builder, s.cbb_get_result, &[]);
    assert_eq!(h.ctx.was_consumed(builder), Some(true));

    h.ctx.set_mode(DispatchMode::Validating);
    assert_eq!(h.ctx.mode(), DispatchMode::Validating);

    let before = h.log.borrow().count();
    let ret = h.ctx.call(builder, s.add_stage, &[RawArg::U32(0)]);
    assert_eq!(ret, RawRet::Unit);
    assert_eq!(h.log.borrow().count(), before);
    assert!(matches!(
        h.errors.borrow().last(),
        Some(DispatchError::StaleBuilderUse { .. })
    ));
}

#[test]
fn call_by_name_matches_call_by_id() {
    let s = sample();
    let mut h = harness(&s, DispatchMode::Validating, true);

    let by_name = h
        .ctx
        .call_by_name(h.device, "create_command_buffer_builder", &[])
        .object()
        .unwrap();
    let by_id = h
        .ctx
        .call(h.device, s.create_command_buffer_builder, &[])
        .object()
        .unwrap();

    assert_ne!(by_name, by_id);
    assert_eq!(h.ctx.was_consumed(by_name), Some(false));
    assert_eq!(h.ctx.was_consumed(by_id), Some(false));
    assert_eq!(h.log.borrow().count(), 2);
}

#[test]
fn dangling_handles_fault_without_reaching_the_backend() {
    let s = sample();
    let mut h = harness(&s, DispatchMode::Validating, true);

    let builder = h
        .ctx
        .call(h.device, s.create_command_buffer_builder, &[])
        .object()
        .unwrap();
    let queue_handle = {
        let qb = h
            .ctx
            .call(h.device, s.create_queue_builder, &[])
            .object()
            .unwrap();
        h.ctx.call(qb, s.qb_get_result, &[]).object().unwrap()
    };
    let before = h.log.borrow().count();

    // A null command-buffer argument has no backend key to resolve to.
    h.ctx.call(
        queue_handle,
        s.submit,
        &[RawArg::Object(sabaki::RawHandle::NULL)],
    );
    assert_eq!(h.log.borrow().count(), before);
    assert!(matches!(
        h.errors.borrow().last(),
        Some(DispatchError::Fault { .. })
    ));

    // Calling through a never-registered handle faults too; on both tables.
    for mode in [DispatchMode::Validating, DispatchMode::Passthrough] {
        h.ctx.set_mode(mode);
        let bogus = sabaki::RawHandle {
            slot: 999,
            generation: 3,
        };
        h.ctx.call(bogus, s.add_stage, &[RawArg::U32(0)]);
        assert_eq!(h.log.borrow().count(), before);
    }

    let _ = builder;
}
