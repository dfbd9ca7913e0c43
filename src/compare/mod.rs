//! This module contains the comparison of two replays of the same transaction,
//! one executed in its normal position and one after an attacker's
//! transaction.
//!
//! Instructions from the two replays are matched by where they executed
//! rather than by their step index, as the two traces may take different
//! paths. Values are compared by their bytes alone; their provenance differs
//! between traces by construction.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use itertools::Itertools;
use tracing::info;

use crate::{
    data::{Address, ByteGroup},
    opcode::{Instruction, Opcode},
    vm::ReplayResult,
};

/// Where an instruction executed: the code it belongs to, its offset, and its
/// opcode.
pub type Location = (Address, u64, Opcode);

/// A pair of instructions, one from each replay, that executed at the same
/// location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstructionPair<'a> {
    /// The address of the code the instructions belong to.
    pub code_address: Address,

    /// The instruction from the normal replay.
    pub normal: &'a Instruction,

    /// The instruction from the attack replay.
    pub attack: &'a Instruction,
}

/// Finds the earliest instruction whose result differs between the two
/// replays even though its inputs do not.
///
/// Such an instruction read state that the attacker's transaction changed,
/// making it the source of the transaction-order dependence.
///
/// Returns [`None`] if the replays never diverge, or if they execute different
/// instructions before any such read.
#[must_use]
pub fn find_tod_source<'a>(
    normal: &'a ReplayResult,
    attack: &'a ReplayResult,
) -> Option<InstructionPair<'a>> {
    for (n, a) in normal.instructions.iter().zip(&attack.instructions) {
        let n_location = location(normal, n);
        if n_location != location(attack, a) {
            return None;
        }

        let same_inputs = same_values(n.stack_inputs(), a.stack_inputs())
            && same_value(n.memory_input(), a.memory_input());
        let same_outputs = same_values(n.stack_outputs(), a.stack_outputs())
            && same_value(n.memory_output(), a.memory_output());
        if same_inputs && !same_outputs {
            info!(
                step = n.step_index(),
                pc = n.program_counter(),
                address = %n_location.0,
                "Found the transaction-order dependence source at {}",
                n.name()
            );
            return Some(InstructionPair {
                code_address: n_location.0,
                normal:       n,
                attack:       a,
            });
        }
    }

    None
}

/// The per-opcode execution counts of one contract in both replays.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OpcodeUsage {
    /// The address of the code that was executed.
    pub code_address: Address,

    /// How many times each opcode executed in the normal replay.
    pub normal: BTreeMap<Opcode, usize>,

    /// How many times each opcode executed in the attack replay.
    pub attack: BTreeMap<Opcode, usize>,
}

/// Gets the contracts whose opcodes were executed a different number of times
/// in the two replays, ordered by address.
#[must_use]
pub fn opcode_usage_differences(normal: &ReplayResult, attack: &ReplayResult) -> Vec<OpcodeUsage> {
    let mut normal_usage = opcode_usage(normal);
    let mut attack_usage = opcode_usage(attack);
    let addresses: BTreeSet<Address> = normal_usage
        .keys()
        .chain(attack_usage.keys())
        .copied()
        .collect();

    let differences: Vec<_> = addresses
        .into_iter()
        .filter_map(|code_address| {
            let normal = normal_usage.remove(&code_address).unwrap_or_default();
            let attack = attack_usage.remove(&code_address).unwrap_or_default();
            (normal != attack).then_some(OpcodeUsage {
                code_address,
                normal,
                attack,
            })
        })
        .collect();
    info!(
        contracts = differences.len(),
        "Compared opcode usage between replays"
    );

    differences
}

fn opcode_usage(replay: &ReplayResult) -> HashMap<Address, BTreeMap<Opcode, usize>> {
    replay
        .instructions
        .iter()
        .map(|i| (replay.context_of(i).code_address, i.opcode()))
        .into_group_map()
        .into_iter()
        .map(|(address, opcodes)| (address, opcodes.into_iter().counts().into_iter().collect()))
        .collect()
}

/// A pair of matching instructions whose inputs differ between the replays.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InputChange<'a> {
    /// The matched instructions.
    pub pair: InstructionPair<'a>,

    /// How many times the location had executed before in each replay.
    pub occurrence: usize,
}

/// Finds the executions of `opcodes` whose stack or memory inputs differ
/// between the two replays, in the order they occur in the normal replay.
///
/// Executions are matched by their location and by how many times that
/// location executed before them. Executions that only happen in one of the
/// replays are not reported.
#[must_use]
pub fn instruction_input_changes<'a>(
    normal: &'a ReplayResult,
    attack: &'a ReplayResult,
    opcodes: &[Opcode],
) -> Vec<InputChange<'a>> {
    let attack_by_location: HashMap<(Location, usize), &Instruction> =
        occurrences(attack, opcodes).into_iter().collect();

    let changes: Vec<_> = occurrences(normal, opcodes)
        .into_iter()
        .filter_map(|((location, occurrence), n)| {
            let a = *attack_by_location.get(&(location, occurrence))?;
            let same = same_values(n.stack_inputs(), a.stack_inputs())
                && same_value(n.memory_input(), a.memory_input());
            (!same).then_some(InputChange {
                pair: InstructionPair {
                    code_address: location.0,
                    normal:       n,
                    attack:       a,
                },
                occurrence,
            })
        })
        .collect();
    info!(changes = changes.len(), "Compared instruction inputs between replays");

    changes
}

/// Gets the instructions in `replay` with an opcode in `opcodes`, keyed by
/// their location and occurrence count.
fn occurrences<'a>(
    replay: &'a ReplayResult,
    opcodes: &[Opcode],
) -> Vec<((Location, usize), &'a Instruction)> {
    let mut seen: HashMap<Location, usize> = HashMap::new();
    replay
        .instructions
        .iter()
        .filter(|i| opcodes.contains(&i.opcode()))
        .map(|i| {
            let location = location(replay, i);
            let count = seen.entry(location).or_default();
            let occurrence = *count;
            *count += 1;
            ((location, occurrence), i)
        })
        .collect()
}

fn location(replay: &ReplayResult, instruction: &Instruction) -> Location {
    (
        replay.context_of(instruction).code_address,
        instruction.program_counter(),
        instruction.opcode(),
    )
}

fn same_values(a: &[ByteGroup], b: &[ByteGroup]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.bytes() == b.bytes())
}

fn same_value(a: Option<&ByteGroup>, b: Option<&ByteGroup>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.bytes() == b.bytes(),
        (None, None) => true,
        _ => false,
    }
}
