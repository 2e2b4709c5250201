// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The immutable compiled program the simulator walks, per spec.md §3 and
//! the compiler/engine contract in §6.

use std::fmt;

use crate::inst::{Instruction, Opcode, Pc};

/// A compiled regular expression program: an ordered instruction sequence
/// plus the metadata the simulator and engine façade need to run it.
///
/// Constructed once by the compiler and never mutated afterward; may be
/// shared read-only across threads (see spec.md §5).
#[derive(Clone, Debug)]
pub struct Program {
    /// The pattern text this program was compiled from, kept for
    /// diagnostics (mirrors `Program.original` in
    /// `examples/wesleywiser-regex`'s `program.rs`/`compile.rs`).
    pub original: String,
    pub insts: Vec<Instruction>,
    /// PC to begin an anchored match (`Engine::is_match`) at.
    pub start: Pc,
    /// PC to begin an unanchored search (`Engine::find`/`captures`) at;
    /// includes the compiler-emitted leading `.*?` wrapper.
    pub find_start: Pc,
    /// Always even, always >= 2. Slots `2k`/`2k+1` hold capture group
    /// `k`'s start/end; group 0 is the whole match.
    pub slot_count: usize,
}

impl Program {
    /// Builds a program from its constituent parts, per the compiler
    /// contract in spec.md §6.
    ///
    /// # Panics
    ///
    /// Panics (a precondition violation per spec.md §7, not a recoverable
    /// error) if any PC referenced by an instruction is out of range, or
    /// if `slot_count` is odd or less than 2.
    pub fn new(
        original: String,
        insts: Vec<Instruction>,
        start: Pc,
        find_start: Pc,
        slot_count: usize,
    ) -> Program {
        let prog = Program { original, insts, start, find_start, slot_count };
        prog.check_invariants();
        prog
    }

    fn check_invariants(&self) {
        assert!(self.slot_count >= 2 && self.slot_count % 2 == 0,
            "slot_count must be even and >= 2, got {}", self.slot_count);
        assert!(self.start < self.insts.len(), "start PC out of range");
        assert!(self.find_start < self.insts.len(), "find_start PC out of range");
        let len = self.insts.len();
        for (pc, inst) in self.insts.iter().enumerate() {
            assert!(inst.out < len, "instruction {} has out-of-range out={}", pc, inst.out);
            if let Opcode::Split(alt) = inst.data {
                assert!(alt < len, "instruction {} has out-of-range alt={}", pc, alt);
            }
        }
    }

    /// The number of capture groups, including the implicit whole-match
    /// group 0.
    pub fn num_captures(&self) -> usize {
        self.slot_count / 2
    }

    /// A freshly allocated, all-`None` capture slot buffer sized for this
    /// program.
    pub fn alloc_captures(&self) -> Vec<Option<usize>> {
        vec![None; self.slot_count]
    }

    /// Whether this program is anchored at the beginning of the text (the
    /// compiler emits `EmptyMatch(BeginText)` as the first instruction
    /// after `start`'s leading `Save(0)`/per-group `Save`s in that case).
    /// Lets the engine façade skip the unanchored `.*?` prefix search
    /// entirely. Walks past the compiler's leading `Save`s, since `start`
    /// itself is always the whole-match `Save(0)` wrapper, never the
    /// assertion directly.
    pub fn is_anchored_start(&self) -> bool {
        use crate::input::Assertion;
        let mut pc = self.start;
        // Bounded by instruction count: a well-formed program's leading
        // `Save` chain never revisits a PC, so this terminates long before
        // the bound in practice.
        for _ in 0..=self.insts.len() {
            match self.insts.get(pc).map(|i| &i.data) {
                Some(Opcode::Save(_)) => pc = self.insts[pc].out,
                Some(Opcode::EmptyMatch(Assertion::BeginText)) => return true,
                _ => return false,
            }
        }
        false
    }
}

/// Errors that can arise while compiling a pattern into a `Program`.
///
/// `NoMatch` is deliberately absent: per spec.md §7, "no match" is a
/// negative return value, not an error.
#[derive(Debug)]
pub enum CompileError {
    /// The pattern was rejected by the external parser.
    Syntax(regex_syntax::Error),
    /// The compiled program would exceed the configured instruction-count
    /// limit (generalizes `examples/wesleywiser-regex`'s byte-size
    /// `size_limit`/`CompiledTooBig` guard in `compile.rs`).
    TooManyInstructions(usize),
    /// The pattern declares more capture groups than this engine allows.
    TooManyCaptureGroups(usize),
    /// The parsed pattern uses a construct this engine's fixed opcode set
    /// (spec.md §3) cannot express, e.g. a look-around assertion beyond
    /// line/text/word boundaries.
    Unsupported(&'static str),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Syntax(e) => write!(f, "invalid pattern: {}", e),
            CompileError::TooManyInstructions(limit) => {
                write!(f, "compiled program exceeds the {} instruction limit", limit)
            }
            CompileError::TooManyCaptureGroups(limit) => {
                write!(f, "pattern declares more than {} capture groups", limit)
            }
            CompileError::Unsupported(what) => {
                write!(f, "unsupported pattern construct: {}", what)
            }
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Syntax(e) => Some(e),
            _ => None,
        }
    }
}

impl From<regex_syntax::Error> for CompileError {
    fn from(e: regex_syntax::Error) -> CompileError {
        CompileError::Syntax(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::Instruction;

    fn save_char_save_match() -> Program {
        // Save(0) -> Char('x') -> Save(1) -> Match
        let insts = vec![
            Instruction::new(1, Opcode::Save(0)),
            Instruction::new(2, Opcode::Char('x')),
            Instruction::new(3, Opcode::Save(1)),
            Instruction::new(3, Opcode::Match),
        ];
        Program::new("x".into(), insts, 0, 0, 2)
    }

    #[test]
    fn builds_valid_program() {
        let prog = save_char_save_match();
        assert_eq!(prog.num_captures(), 1);
        assert_eq!(prog.alloc_captures(), vec![None, None]);
    }

    #[test]
    #[should_panic(expected = "out-of-range")]
    fn rejects_out_of_range_out() {
        let insts = vec![Instruction::new(5, Opcode::Match)];
        Program::new("x".into(), insts, 0, 0, 2);
    }

    #[test]
    #[should_panic(expected = "slot_count")]
    fn rejects_odd_slot_count() {
        let insts = vec![Instruction::new(0, Opcode::Match)];
        Program::new("x".into(), insts, 0, 0, 3);
    }

    #[test]
    fn is_anchored_start_sees_past_the_leading_save() {
        // The realistic shape `compile.rs` emits: `start` is always the
        // whole-match `Save(0)` wrapper, with the assertion one hop later.
        use crate::input::Assertion;
        let insts = vec![
            Instruction::new(1, Opcode::Save(0)),
            Instruction::new(2, Opcode::EmptyMatch(Assertion::BeginText)),
            Instruction::new(3, Opcode::Save(1)),
            Instruction::new(3, Opcode::Match),
        ];
        let prog = Program::new("^".into(), insts, 0, 0, 2);
        assert!(prog.is_anchored_start());
    }

    #[test]
    fn is_anchored_start_rejects_unanchored_pattern() {
        let insts = vec![
            Instruction::new(1, Opcode::Save(0)),
            Instruction::new(2, Opcode::Char('a')),
            Instruction::new(3, Opcode::Save(1)),
            Instruction::new(3, Opcode::Match),
        ];
        let prog = Program::new("a".into(), insts, 0, 0, 2);
        assert!(!prog.is_anchored_start());
    }
}
