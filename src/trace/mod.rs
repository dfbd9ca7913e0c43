//! This module contains the loading of recorded execution traces.
//!
//! Traces are read as JSON lines, one object per executed step, in the format
//! emitted by EIP-3155 tracers:
//!
//! ```json
//! {"pc":0,"op":96,"stack":[],"depth":1,"memory":"0x"}
//! ```
//!
//! The `op` field may be either the opcode's byte value or its mnemonic, and
//! `memory` may be either a single hex string or an array of hex words. The
//! stack is listed bottom first. Lines that are not steps (such as the summary
//! line some tracers emit at the end) are skipped.

pub mod oracle;

use std::{io::BufRead, iter::Peekable};

pub use oracle::InstructionOutputOracle;
use serde::Deserialize;
use tracing::warn;

use crate::{
    constant::WORD_SIZE_BYTES,
    data::Word,
    error::trace::{Error, Result},
    opcode::Opcode,
};

/// A single recorded step of a trace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TraceEvent {
    /// The offset of the instruction in the executing code.
    pub program_counter: u64,

    /// The executed opcode.
    pub opcode: Opcode,

    /// The stack before the instruction executed, bottom first.
    pub stack: Vec<Word>,

    /// The call depth the instruction executed at, starting at 1.
    pub depth: u32,

    /// The memory before the instruction executed, if recorded.
    pub memory: Option<Vec<u8>>,
}

/// The opcode of a raw event, as either a byte or a mnemonic.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOpcode {
    Byte(u8),
    Name(String),
}

/// The memory of a raw event, as either one hex string or a list of words.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMemory {
    Hex(String),
    Words(Vec<String>),
}

/// A step as it appears in the trace file.
#[derive(Debug, Deserialize)]
struct RawTraceEvent {
    pc:     Option<u64>,
    op:     Option<RawOpcode>,
    #[serde(default)]
    stack:  Vec<String>,
    depth:  Option<u32>,
    memory: Option<RawMemory>,
}

impl TraceEvent {
    /// Parses the trace event on the provided `line` of a trace, whose
    /// position in the trace is `line_number`.
    ///
    /// Returns [`None`] for lines that are valid JSON but not a step.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the line is not valid JSON, or if it is a step that
    /// is malformed.
    pub fn parse_line(line_number: usize, line: &str) -> Result<Option<Self>> {
        let invalid = |message: String| Error::InvalidEvent {
            line: line_number,
            message,
        };
        let raw: RawTraceEvent =
            serde_json::from_str(line).map_err(|e| invalid(e.to_string()))?;
        let Some(program_counter) = raw.pc else {
            return Ok(None);
        };

        let opcode = match raw.op.ok_or_else(|| invalid("missing `op`".into()))? {
            RawOpcode::Byte(byte) => Opcode::from_byte(byte),
            RawOpcode::Name(name) => {
                Opcode::from_text_code(&name).ok_or(Error::UnknownOpcodeName(name))?
            }
        };
        let depth = raw.depth.ok_or_else(|| invalid("missing `depth`".into()))?;
        let stack = raw
            .stack
            .iter()
            .map(|word| parse_word(word))
            .collect::<Result<Vec<_>>>()?;
        let memory = raw.memory.map(parse_memory).transpose()?;

        Ok(Some(Self {
            program_counter,
            opcode,
            stack,
            depth,
            memory,
        }))
    }
}

/// Reads every step of the trace in `reader`.
///
/// Lines that cannot be parsed are skipped with a warning.
///
/// # Errors
///
/// Returns [`Err`] if reading from `reader` fails.
pub fn read_events(reader: impl BufRead) -> Result<Vec<TraceEvent>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::Io(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        match TraceEvent::parse_line(index + 1, &line) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => warn!(line = index + 1, "Skipping trace line without a step"),
            Err(error) => warn!(line = index + 1, %error, "Skipping malformed trace line"),
        }
    }

    Ok(events)
}

/// Parses a stack word given in hex, with or without the `0x` prefix and with
/// or without leading zeroes.
fn parse_word(word: &str) -> Result<Word> {
    let digits = word.strip_prefix("0x").unwrap_or(word);
    if digits.len() > WORD_SIZE_BYTES * 2 {
        return Err(Error::InvalidHex(word.to_string()));
    }
    let padded = format!("{digits:0>width$}", width = WORD_SIZE_BYTES * 2);
    let mut result = [0u8; WORD_SIZE_BYTES];
    hex::decode_to_slice(padded, &mut result).map_err(|_| Error::InvalidHex(word.to_string()))?;

    Ok(result)
}

fn parse_memory(memory: RawMemory) -> Result<Vec<u8>> {
    let decode = |hex_string: &str| {
        let digits = hex_string.strip_prefix("0x").unwrap_or(hex_string);
        hex::decode(digits).map_err(|_| Error::InvalidHex(hex_string.to_string()))
    };
    match memory {
        RawMemory::Hex(hex_string) => decode(&hex_string),
        RawMemory::Words(words) => {
            let mut bytes = Vec::with_capacity(words.len() * WORD_SIZE_BYTES);
            for word in &words {
                bytes.extend(decode(word)?);
            }
            Ok(bytes)
        }
    }
}

/// Pairs each event with the oracle describing the state after it.
///
/// The oracle for an event is built from the event that follows it, so the
/// trace is consumed one event ahead.
pub fn with_oracles<I>(events: I) -> WithOracles<I::IntoIter>
where
    I: IntoIterator<Item = TraceEvent>,
{
    WithOracles {
        events: events.into_iter().peekable(),
    }
}

/// The iterator returned by [`with_oracles`].
#[derive(Debug)]
pub struct WithOracles<I>
where
    I: Iterator<Item = TraceEvent>,
{
    events: Peekable<I>,
}

impl<I> Iterator for WithOracles<I>
where
    I: Iterator<Item = TraceEvent>,
{
    type Item = (TraceEvent, InstructionOutputOracle);

    fn next(&mut self) -> Option<Self::Item> {
        let event = self.events.next()?;
        let oracle = match self.events.peek() {
            Some(next) => InstructionOutputOracle::from_event(next),
            None => InstructionOutputOracle::after_last(&event),
        };
        Some((event, oracle))
    }
}

#[cfg(test)]
mod test {
    use crate::{
        error::trace::Error,
        opcode::Opcode,
        trace::{read_events, with_oracles, TraceEvent},
    };

    #[test]
    fn parses_numeric_and_named_opcodes() -> anyhow::Result<()> {
        let numeric = TraceEvent::parse_line(1, r#"{"pc":3,"op":96,"stack":[],"depth":1}"#)?
            .expect("Line is a step");
        let named = TraceEvent::parse_line(2, r#"{"pc":3,"op":"PUSH1","stack":[],"depth":1}"#)?
            .expect("Line is a step");

        assert_eq!(numeric.opcode, Opcode::Push(1));
        assert_eq!(numeric, named);
        assert_eq!(numeric.memory, None);

        Ok(())
    }

    #[test]
    fn parses_short_stack_words_bottom_first() -> anyhow::Result<()> {
        let event = TraceEvent::parse_line(
            1,
            r#"{"pc":0,"op":1,"stack":["0x1","0xff00"],"depth":2,"memory":"0x0a0b"}"#,
        )?
        .expect("Line is a step");

        assert_eq!(event.stack[0][31], 1);
        assert_eq!(event.stack[1][30..], [0xff, 0x00]);
        assert_eq!(event.memory, Some(vec![0x0a, 0x0b]));
        assert_eq!(event.depth, 2);

        Ok(())
    }

    #[test]
    fn accepts_memory_as_words() -> anyhow::Result<()> {
        let word = "00".repeat(31) + "2a";
        let line = format!(r#"{{"pc":0,"op":0,"stack":[],"depth":1,"memory":["{word}"]}}"#);
        let event = TraceEvent::parse_line(1, &line)?.expect("Line is a step");

        assert_eq!(event.memory.map(|m| m.len()), Some(32));

        Ok(())
    }

    #[test]
    fn rejects_unknown_mnemonics() {
        let result = TraceEvent::parse_line(1, r#"{"pc":0,"op":"FROB","stack":[],"depth":1}"#);
        assert_eq!(result, Err(Error::UnknownOpcodeName("FROB".into())));
    }

    #[test]
    fn skips_lines_that_are_not_steps() -> anyhow::Result<()> {
        let trace = concat!(
            r#"{"pc":0,"op":"PUSH1","stack":[],"depth":1}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"output":"","gasUsed":"0x3"}"#,
            "\n",
            r#"{"pc":2,"op":"STOP","stack":["0x1"],"depth":1}"#,
        );
        let events = read_events(trace.as_bytes())?;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].opcode, Opcode::Stop);

        Ok(())
    }

    #[test]
    fn pairs_events_with_the_next_state() -> anyhow::Result<()> {
        let trace = concat!(
            r#"{"pc":0,"op":"PUSH1","stack":[],"depth":1}"#,
            "\n",
            r#"{"pc":2,"op":"STOP","stack":["0x1"],"depth":1}"#,
        );
        let paired: Vec<_> = with_oracles(read_events(trace.as_bytes())?).collect();

        assert_eq!(paired.len(), 2);
        assert_eq!(paired[0].1.depth, Some(1));
        assert_eq!(paired[0].1.stack.len(), 1);
        assert_eq!(paired[1].1.depth, None);

        Ok(())
    }
}
