//! This module tests how the replay tracks call contexts and the revertable
//! state they operate on.
#![cfg(test)]

use std::collections::BTreeSet;

use tod_replayer::{
    constant::PRESTATE,
    error::{replay, Error},
    flow::AccessKind,
    opcode::Opcode,
    vm::HaltType,
};

use crate::common::{address, word, TraceBuilder, RECEIVER, SENDER};

mod common;

#[test]
fn a_reverted_store_is_not_visible_afterwards() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .call_args(Opcode::Call, 0xcc, 0)
        .enter(Opcode::Call, 7)
        .push_all(&[1, 5])
        .exec(Opcode::SStore, 2, &[])
        .push_all(&[0, 0])
        .exit(Opcode::Revert, 2, 0)
        .exec(Opcode::Pop, 1, &[])
        .call_args(Opcode::Call, 0xcc, 0)
        .enter(Opcode::Call, 7)
        .push(5)
        .exec(Opcode::SLoad, 1, &[0])
        .exit(Opcode::Stop, 0, 1)
        .stop();
    let replayer = common::analyze(trace)?;
    let result = replayer.result();

    let sstore = common::find(result, Opcode::SStore, 0);
    let sload = common::find(result, Opcode::SLoad, 0);
    assert_eq!(sload.stack_outputs()[0].depends_on(), BTreeSet::from([PRESTATE]));
    assert!(!replayer.graph().depends_on(sload.step_index(), sstore.step_index()));

    let reverted = result.context_of(sstore);
    assert!(reverted.reverted);
    assert_eq!(reverted.halt_type, Some(HaltType::Normal));
    assert!(!result.context_of(sload).reverted);
    assert_eq!(result.contexts.len(), 3);
    assert_eq!(result.call_tree.children().len(), 2);

    Ok(())
}

#[test]
fn a_store_is_visible_to_a_later_call() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .call_args(Opcode::Call, 0xcc, 0)
        .enter(Opcode::Call, 7)
        .push_all(&[1, 5])
        .exec(Opcode::SStore, 2, &[])
        .exit(Opcode::Stop, 0, 1)
        .exec(Opcode::Pop, 1, &[])
        .call_args(Opcode::Call, 0xcc, 0)
        .enter(Opcode::Call, 7)
        .push(5)
        .exec(Opcode::SLoad, 1, &[1])
        .exit(Opcode::Stop, 0, 1)
        .stop();
    let replayer = common::analyze(trace)?;
    let result = replayer.result();
    let graph = replayer.graph();

    let sstore = common::find(result, Opcode::SStore, 0).step_index();
    let sload = common::find(result, Opcode::SLoad, 0);
    assert_eq!(sload.stack_outputs()[0].depends_on(), BTreeSet::from([sstore]));

    let edges = graph.edges_between(sstore, sload.step_index());
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, AccessKind::PersistentStorage);

    // The stored value was pushed by the step before the key.
    let value_push = sstore - 2;
    assert!(graph.depends_on(sload.step_index(), value_push));

    Ok(())
}

#[test]
fn callcode_operates_on_the_callers_storage() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .call_args(Opcode::CallCode, 0xcc, 0)
        .enter(Opcode::CallCode, 7)
        .push_all(&[7, 5])
        .exec(Opcode::SStore, 2, &[])
        .exit(Opcode::Stop, 0, 1)
        .exec(Opcode::Pop, 1, &[])
        .push(5)
        .exec(Opcode::SLoad, 1, &[7])
        .stop();
    let result = common::replay(trace)?;

    let sstore = common::find(&result, Opcode::SStore, 0);
    let sload = common::find(&result, Opcode::SLoad, 0);
    assert_eq!(
        sload.stack_outputs()[0].depends_on(),
        BTreeSet::from([sstore.step_index()])
    );

    let child = result.context_of(sstore);
    assert_eq!(child.code_address, address(0xcc));
    assert_eq!(child.storage_address, address(RECEIVER));
    assert_eq!(child.msg_sender, address(RECEIVER));
    assert!(!child.is_contract_initialization);

    Ok(())
}

#[test]
fn delegatecall_keeps_the_callers_sender_and_storage() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .call_args(Opcode::DelegateCall, 0xcc, 0)
        .enter(Opcode::DelegateCall, 6)
        .exec(Opcode::Caller, 0, &[SENDER])
        .exit(Opcode::Stop, 0, 1)
        .stop();
    let result = common::replay(trace)?;

    let caller = common::find(&result, Opcode::Caller, 0);
    let child = result.context_of(caller);
    assert_eq!(child.depth, 2);
    assert_eq!(child.msg_sender, address(SENDER));
    assert_eq!(child.storage_address, address(RECEIVER));
    assert_eq!(child.code_address, address(0xcc));

    Ok(())
}

#[test]
fn running_out_of_gas_is_an_exceptional_halt() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .call_args(Opcode::Call, 0xcc, 0)
        .enter(Opcode::Call, 7)
        .push_all(&[1, 5])
        .exec(Opcode::SStore, 2, &[])
        .push_all(&[2, 3])
        .exit(Opcode::Add, 2, 0)
        .stop();
    let result = common::replay(trace)?;

    let add = common::find(&result, Opcode::Add, 0);
    let child = result.context_of(add);
    assert_eq!(child.halt_type, Some(HaltType::Exceptional));
    assert!(child.reverted);
    assert!(child.return_data.is_empty());

    Ok(())
}

#[test]
fn calls_that_do_not_enter_a_frame_stay_in_the_caller() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .call_args(Opcode::StaticCall, 0x01, 0)
        .call_without_entering(Opcode::StaticCall, 6, 1)
        .exec(Opcode::Pop, 1, &[])
        .stop();
    let result = common::replay(trace)?;

    let call = common::find(&result, Opcode::StaticCall, 0);
    assert_eq!(result.contexts.len(), 1);
    assert!(result.call_tree.children().is_empty());
    assert_eq!(call.stack_inputs().len(), 6);

    Ok(())
}

#[test]
fn creations_enter_a_placeholder_address() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .push_all(&[0, 0, 0])
        .enter(Opcode::Create, 3)
        .exit(Opcode::Stop, 0, 0xdd)
        .stop();
    let result = common::replay(trace)?;

    let (_, child) = result
        .contexts
        .iter()
        .nth(1)
        .expect("The creation entered a context");
    assert!(child.is_contract_initialization);
    assert_eq!(child.code_address, address(RECEIVER).created_contract());
    assert_eq!(child.storage_address, child.code_address);

    Ok(())
}

#[test]
fn depth_may_only_change_by_one() -> anyhow::Result<()> {
    let mut trace = TraceBuilder::new().push(1).push(2).stop();
    trace[2].depth = 3;
    let error = common::replay(trace).expect_err("The depth jump is rejected");
    let error = error.downcast::<Error>()?;

    assert_eq!(error.step_index(), Some(1));
    assert!(matches!(
        error,
        Error::Replay(located) if matches!(
            located.payload,
            replay::Error::UnexpectedDepthChange { depth: 1, next_depth: 3, .. }
        )
    ));

    Ok(())
}

#[test]
fn halting_without_leaving_the_frame_is_rejected() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .push_all(&[0, 0])
        .exec(Opcode::Return, 2, &[])
        .stop();
    let error = common::replay(trace).expect_err("The halt is rejected");
    let error = error.downcast::<Error>()?;

    assert!(matches!(
        error,
        Error::Replay(located)
            if matches!(located.payload, replay::Error::ExpectedDepthChange { depth: 1, .. })
    ));

    Ok(())
}

#[test]
fn leaving_the_root_context_is_rejected() -> anyhow::Result<()> {
    let mut trace = TraceBuilder::new().push_all(&[0, 0]).exec(Opcode::Return, 2, &[]).stop();
    trace[3].depth = 0;
    let error = common::replay(trace).expect_err("The root cannot be left");
    let error = error.downcast::<Error>()?;

    assert_eq!(error.step_index(), Some(2));
    assert!(matches!(
        error,
        Error::Replay(located)
            if matches!(located.payload, replay::Error::UnexpectedDepthChange { .. })
    ));

    Ok(())
}

#[test]
fn a_revert_restores_the_callers_storage() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .call_args(Opcode::CallCode, 0xcc, 0)
        .enter(Opcode::CallCode, 7)
        .push_all(&[1, 5])
        .exec(Opcode::SStore, 2, &[])
        .push_all(&[0, 0])
        .exit(Opcode::Revert, 2, 0)
        .exec(Opcode::Pop, 1, &[])
        .push(5)
        .exec(Opcode::SLoad, 1, &[0])
        .stop();
    let replayer = common::analyze(trace)?;
    let result = replayer.result();

    let sstore = common::find(result, Opcode::SStore, 0);
    let sload = common::find(result, Opcode::SLoad, 0);
    assert_eq!(result.context_of(sload).depth, 1);
    assert_eq!(sload.stack_outputs()[0].depends_on(), BTreeSet::from([PRESTATE]));
    assert!(!replayer.graph().depends_on(sload.step_index(), sstore.step_index()));

    Ok(())
}

#[test]
fn an_exceptional_halt_restores_the_callers_storage() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .call_args(Opcode::CallCode, 0xcc, 0)
        .enter(Opcode::CallCode, 7)
        .push_all(&[1, 5])
        .exec(Opcode::SStore, 2, &[])
        .push_all(&[2, 3])
        .exit(Opcode::Add, 2, 0)
        .exec(Opcode::Pop, 1, &[])
        .push(5)
        .exec(Opcode::SLoad, 1, &[0])
        .stop();
    let replayer = common::analyze(trace)?;
    let result = replayer.result();

    let sstore = common::find(result, Opcode::SStore, 0);
    let sload = common::find(result, Opcode::SLoad, 0);
    assert_eq!(
        result.context_of(sstore).halt_type,
        Some(HaltType::Exceptional)
    );
    assert_eq!(result.context_of(sload).depth, 1);
    assert_eq!(sload.stack_outputs()[0].depends_on(), BTreeSet::from([PRESTATE]));
    assert!(!replayer.graph().depends_on(sload.step_index(), sstore.step_index()));

    Ok(())
}

#[test]
fn returned_data_lands_in_the_callers_output_memory() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .call_args_with_output(Opcode::Call, 0xcc, 0, 0, 32)
        .enter(Opcode::Call, 7)
        .push_all(&[0x42, 0])
        .exec(Opcode::MStore, 2, &[])
        .push_all(&[32, 0])
        .exit(Opcode::Return, 2, 1)
        .exec(Opcode::Pop, 1, &[])
        .push(0)
        .exec(Opcode::MLoad, 1, &[0x42])
        .stop();
    let replayer = common::analyze(trace)?;
    let result = replayer.result();

    // The callee pushed the returned value at step 8.
    let mload = common::find(result, Opcode::MLoad, 0);
    assert_eq!(mload.stack_outputs()[0].bytes(), word(0x42));
    assert_eq!(mload.stack_outputs()[0].depends_on(), BTreeSet::from([8]));

    let edges = replayer.graph().edges_between(8, mload.step_index());
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, AccessKind::Memory);

    let callee = result.context_of(common::find(result, Opcode::MStore, 0));
    assert_eq!(callee.return_data.bytes(), word(0x42));

    Ok(())
}

#[test]
fn returned_data_can_be_copied_after_the_call() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .call_args(Opcode::Call, 0xcc, 0)
        .enter(Opcode::Call, 7)
        .push_all(&[0x42, 0])
        .exec(Opcode::MStore, 2, &[])
        .push_all(&[32, 0])
        .exit(Opcode::Return, 2, 1)
        .exec(Opcode::Pop, 1, &[])
        .exec(Opcode::ReturnDataSize, 0, &[32])
        .push_all(&[32, 0, 0])
        .exec(Opcode::ReturnDataCopy, 3, &[])
        .push(0)
        .exec(Opcode::MLoad, 1, &[0x42])
        .stop();
    let replayer = common::analyze(trace)?;
    let result = replayer.result();
    let graph = replayer.graph();

    let size = common::find(result, Opcode::ReturnDataSize, 0);
    assert_eq!(size.stack_outputs()[0].bytes(), word(32));
    assert_eq!(graph.producers_of(size.step_index()), BTreeSet::from([8]));

    let copy = common::find(result, Opcode::ReturnDataCopy, 0);
    let kinds: BTreeSet<_> = graph
        .edges_between(8, copy.step_index())
        .iter()
        .map(|edge| edge.kind)
        .collect();
    assert_eq!(kinds, BTreeSet::from([AccessKind::ReturnData]));

    let mload = common::find(result, Opcode::MLoad, 0);
    assert_eq!(mload.stack_outputs()[0].depends_on(), BTreeSet::from([8]));

    Ok(())
}

#[test]
fn a_successful_creation_leaves_no_return_data() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .push_all(&[0, 0, 0])
        .enter(Opcode::Create, 3)
        .push_all(&[0x42, 0])
        .exec(Opcode::MStore, 2, &[])
        .push_all(&[32, 0])
        .exit(Opcode::Return, 2, 0xdd)
        .exec(Opcode::ReturnDataSize, 0, &[0])
        .stop();
    let replayer = common::analyze(trace)?;
    let result = replayer.result();

    let initialization = result.context_of(common::find(result, Opcode::MStore, 0));
    assert!(initialization.is_contract_initialization);
    assert_eq!(initialization.return_data.bytes(), word(0x42));

    let size = common::find(result, Opcode::ReturnDataSize, 0);
    assert_eq!(size.stack_outputs()[0].bytes(), word(0));
    assert!(replayer.graph().producers_of(size.step_index()).is_empty());

    Ok(())
}

#[test]
fn a_revert_undoes_transient_stores() -> anyhow::Result<()> {
    let trace = TraceBuilder::new()
        .call_args(Opcode::Call, 0xcc, 0)
        .enter(Opcode::Call, 7)
        .push_all(&[1, 5])
        .exec(Opcode::TStore, 2, &[])
        .push(5)
        .exec(Opcode::TLoad, 1, &[1])
        .push_all(&[0, 0])
        .exit(Opcode::Revert, 2, 0)
        .exec(Opcode::Pop, 1, &[])
        .call_args(Opcode::Call, 0xcc, 0)
        .enter(Opcode::Call, 7)
        .push(5)
        .exec(Opcode::TLoad, 1, &[0])
        .exit(Opcode::Stop, 0, 1)
        .stop();
    let replayer = common::analyze(trace)?;
    let result = replayer.result();

    let tstore = common::find(result, Opcode::TStore, 0).step_index();
    let before = common::find(result, Opcode::TLoad, 0);
    assert_eq!(before.stack_outputs()[0].depends_on(), BTreeSet::from([tstore]));
    let edges = replayer.graph().edges_between(tstore, before.step_index());
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, AccessKind::TransientStorage);

    let after = common::find(result, Opcode::TLoad, 1);
    assert_eq!(after.stack_outputs()[0].depends_on(), BTreeSet::from([PRESTATE]));

    Ok(())
}

#[test]
fn an_absurd_recorded_depth_is_rejected() -> anyhow::Result<()> {
    let mut trace = TraceBuilder::new().push(1).push(2).stop();
    trace[2].depth = u32::MAX;
    let error = common::replay(trace).expect_err("The depth is rejected");
    let error = error.downcast::<Error>()?;

    assert_eq!(error.step_index(), Some(1));
    assert!(matches!(
        error,
        Error::Replay(located) if matches!(
            located.payload,
            replay::Error::UnexpectedDepthChange { depth: 1, next_depth: u32::MAX, .. }
        )
    ));

    Ok(())
}
