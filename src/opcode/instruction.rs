//! This module contains the record of a single replayed step.

use derivative::Derivative;

use crate::{
    data::{ByteGroup, StepIndex},
    error::{
        container::Locatable,
        replay::{Error, Result},
    },
    flow::{self, Flow, MemoryWrite, StorageWrites},
    opcode::{InstructionSpec, Opcode},
    trace::{InstructionOutputOracle, TraceEvent},
    vm::{context::CallContextId, CallContext, Environment},
};

/// A single executed step of a trace, with the values it consumed and
/// produced.
///
/// Instructions are never changed once parsed. Equality and hashing ignore the
/// call context, so that instructions can be compared across the replays of
/// two different traces.
#[derive(Clone, Debug, Derivative)]
#[derivative(Eq, Hash, PartialEq)]
pub struct Instruction {
    opcode:          Opcode,
    name:            String,
    program_counter: u64,
    step_index:      StepIndex,

    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    call_context: CallContextId,

    stack_inputs:  Vec<ByteGroup>,
    stack_outputs: Vec<ByteGroup>,
    memory_input:  Option<ByteGroup>,
    memory_output: Option<ByteGroup>,
    flow:          Option<Flow>,
}

impl Instruction {
    /// Parses the instruction executed by `event` against the current state of
    /// the `environment`, using the `oracle` recorded for the following step.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the instruction's behaviour cannot be evaluated in
    /// the environment.
    pub fn parse(
        event: &TraceEvent,
        environment: &Environment,
        oracle: &InstructionOutputOracle,
    ) -> Result<Self> {
        let opcode = event.opcode;
        let step_index = environment.current_step_index();
        let call_context = environment.current_context_id();

        let mut instruction = Self {
            opcode,
            name: opcode.as_text_code(),
            program_counter: event.program_counter,
            step_index,
            call_context,
            stack_inputs: Vec::new(),
            stack_outputs: Vec::new(),
            memory_input: None,
            memory_output: None,
            flow: None,
        };

        match opcode.spec() {
            InstructionSpec::Flow(node) => {
                let evaluation =
                    flow::evaluate(&node, environment, oracle, step_index).locate(step_index)?;
                let writes = &evaluation.flow.writes;
                instruction.stack_outputs = writes
                    .stack_pushes
                    .iter()
                    .chain(writes.stack_sets.iter().map(|(_, value)| value))
                    .cloned()
                    .collect();
                instruction.stack_inputs = evaluation.stack_inputs;
                instruction.memory_input = evaluation.memory_input;
                instruction.memory_output = evaluation.memory_output;
                instruction.flow = Some(evaluation.flow);
            }
            InstructionSpec::Io(io) => {
                instruction.stack_inputs = (0..io.stack_inputs)
                    .map(|i| environment.stack().peek(i).cloned())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(Error::from)
                    .locate(step_index)?;
                instruction.stack_outputs = (0..io.stack_outputs)
                    .map(|i| {
                        oracle
                            .stack_peek(i)
                            .map(|word| ByteGroup::from_bytes(word.to_vec(), step_index))
                            .ok_or(Error::MissingOracleValue { index: i })
                    })
                    .collect::<std::result::Result<_, _>>()
                    .locate(step_index)?;
            }
        }

        Ok(instruction)
    }

    /// Gets the executed opcode.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Gets the mnemonic of the executed opcode.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the offset of the instruction in the executing code.
    #[must_use]
    pub fn program_counter(&self) -> u64 {
        self.program_counter
    }

    /// Gets the index of the step in the trace.
    #[must_use]
    pub fn step_index(&self) -> StepIndex {
        self.step_index
    }

    /// Gets the call context the instruction executed in.
    #[must_use]
    pub fn call_context(&self) -> CallContextId {
        self.call_context
    }

    /// Gets the stack items the instruction read, ordered from the top of the
    /// stack.
    #[must_use]
    pub fn stack_inputs(&self) -> &[ByteGroup] {
        &self.stack_inputs
    }

    /// Gets the stack items the instruction produced.
    #[must_use]
    pub fn stack_outputs(&self) -> &[ByteGroup] {
        &self.stack_outputs
    }

    /// Gets the memory the instruction read, if any.
    #[must_use]
    pub fn memory_input(&self) -> Option<&ByteGroup> {
        self.memory_input.as_ref()
    }

    /// Gets the memory the instruction wrote, if any.
    #[must_use]
    pub fn memory_output(&self) -> Option<&ByteGroup> {
        self.memory_output.as_ref()
    }

    /// Gets the information flow of the instruction, if its behaviour is
    /// modelled.
    #[must_use]
    pub fn flow(&self) -> Option<&Flow> {
        self.flow.as_ref()
    }

    /// Checks if the instruction's behaviour is a modelled information flow.
    #[must_use]
    pub fn implemented_flow(&self) -> bool {
        self.flow.is_some()
    }

    /// Gets the accesses made by the instruction, if its flow is modelled.
    #[must_use]
    pub fn accesses(&self) -> Option<&flow::StorageAccesses> {
        self.flow.as_ref().map(|f| &f.accesses)
    }

    /// Gets the writes made by the instruction, if its flow is modelled.
    #[must_use]
    pub fn writes(&self) -> Option<&StorageWrites> {
        self.flow.as_ref().map(|f| &f.writes)
    }

    /// Gets the stack input at `index`, counted from the top of the stack.
    fn input(&self, index: usize) -> Result<&ByteGroup> {
        self.stack_inputs
            .get(index)
            .ok_or(Error::MissingOracleValue { index })
            .locate(self.step_index)
    }

    /// Gets the `(offset, size)` of the memory this call instruction reserved
    /// for the callee's output.
    fn return_range(&self) -> Result<Option<(usize, usize)>> {
        let (offset, size) = match self.opcode {
            Opcode::Call | Opcode::CallCode => (5, 6),
            Opcode::DelegateCall | Opcode::StaticCall => (4, 5),
            _ => return Ok(None),
        };
        let offset = self.input(offset)?;
        let size = self.input(size)?.to_usize().map_err(Error::from).locate(self.step_index)?;
        if size == 0 {
            return Ok(Some((0, 0)));
        }
        let offset = offset.to_usize().map_err(Error::from).locate(self.step_index)?;
        Ok(Some((offset, size)))
    }

    /// Gets the writes to the calling frame once the `child` context that this
    /// instruction entered has exited, as part of the step at `step_index`.
    ///
    /// The result of the call (the success flag or the created address) is
    /// taken from the `oracle` and attributed to the step that exited the
    /// child. The data the child returned is copied into the reserved output
    /// memory with its provenance intact.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the result cannot be read from the oracle.
    pub fn return_writes(
        &self,
        child: &CallContext,
        oracle: &InstructionOutputOracle,
        step_index: StepIndex,
    ) -> Result<StorageWrites> {
        let mut writes = StorageWrites::new();
        writes.stack_pushes.push(result_word(oracle, step_index)?);

        if let Some((offset, size)) = self.return_range()? {
            let value = child.return_data.slice(0..size);
            if !value.is_empty() {
                writes.memory.push(MemoryWrite { offset, value });
            }
        }

        Ok(writes)
    }

    /// Gets the writes for this call or creation when it did not enter a new
    /// context, such as a call to a precompile or to an account without code.
    ///
    /// Everything is taken from the `oracle` and attributed to this
    /// instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the result cannot be read from the oracle.
    pub fn immediate_return_writes(
        &self,
        oracle: &InstructionOutputOracle,
    ) -> Result<StorageWrites> {
        let step_index = self.step_index;
        let mut writes = StorageWrites::new();
        writes.stack_pushes.push(result_word(oracle, step_index)?);

        let returned = match self.return_range()? {
            Some((offset, size)) if size > 0 => {
                let value = oracle.memory_range(offset, size, step_index);
                if let Some(value) = &value {
                    writes.memory.push(MemoryWrite {
                        offset,
                        value: value.clone(),
                    });
                }
                value.unwrap_or_default()
            }
            _ => ByteGroup::new(),
        };
        writes.sub_context_return_data = Some(returned);

        Ok(writes)
    }
}

/// Reads the value a call or creation leaves on the stack of its caller.
fn result_word(oracle: &InstructionOutputOracle, step_index: StepIndex) -> Result<ByteGroup> {
    oracle
        .stack_peek(0)
        .map(|word| ByteGroup::from_bytes(word.to_vec(), step_index))
        .ok_or(Error::MissingOracleValue { index: 0 })
        .locate(step_index)
}
