// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The Thompson NFA simulator: the non-backtracking, linear-time matching
//! engine described in spec.md §4. This is the core component.
//!
//! The simulator never recurses. Epsilon-closure is computed with an
//! explicit stack (`SimulatorCache::stack`), so pathologically deep or
//! cyclic epsilon subgraphs (spec.md §7, "dense Split fan-out") cannot blow
//! the native call stack.
//!
//! Priority (leftmost-first, greedy by default) falls out of two facts
//! this module leans on:
//!
//! - Within one epsilon-closure call, `Split`'s `out` branch is always
//!   walked before `alt` (the `alt` PC is pushed on the stack; `out` is
//!   followed inline), so higher-priority alternatives are discovered
//!   first.
//! - The compiler (`compile.rs`) always emits a higher-priority branch's
//!   instructions immediately after the `Split` that introduces it, so
//!   across the whole program, lower PC numbers are higher priority.
//!   `ThreadSet`'s bit-vectors are iterated in ascending order, so walking
//!   `current`/`scratch` in PC order reproduces the same priority a
//!   sparse, insertion-ordered set would have given, without needing one.

use crate::bitset::BitVector;
use crate::input::InputCursor;
use crate::inst::{Instruction, Opcode, Pc};
use crate::program::Program;
use crate::threadset::ThreadSet;

/// Reusable scratch space for one simulator run. Allocated once per call
/// site (see `engine.rs`'s `Engine`) and reset at the top of every
/// `execute`, so repeated matches against the same program don't
/// reallocate.
#[derive(Clone, Debug)]
pub struct SimulatorCache {
    threads: ThreadSet,
    /// Per-PC capture snapshot, valid only for PCs currently marked in
    /// `threads.current` (mid-step, `caps_next` plays the same role for
    /// `threads.next`).
    caps_current: Vec<Vec<Option<usize>>>,
    caps_next: Vec<Vec<Option<usize>>>,
    /// Local "don't revisit" set for a single `closure_from` call; distinct
    /// from `threads.current`, which persists for the whole round.
    visited: BitVector,
    stack: Vec<Frame>,
    working: Vec<Option<usize>>,
}

#[derive(Clone, Debug)]
enum Frame {
    Visit(Pc),
    RestoreSlot(usize, Option<usize>),
}

impl SimulatorCache {
    /// Creates a cache sized for a program with `num_insts` instructions
    /// and `slot_count` capture slots.
    pub fn new(num_insts: usize, slot_count: usize) -> SimulatorCache {
        SimulatorCache {
            threads: ThreadSet::with_capacity(num_insts),
            caps_current: vec![vec![None; slot_count]; num_insts],
            caps_next: vec![vec![None; slot_count]; num_insts],
            visited: BitVector::with_capacity(num_insts),
            stack: Vec::new(),
            working: Vec::new(),
        }
    }

    /// Resizes the cache for a (possibly different) program, if its shape
    /// changed. A no-op otherwise, which is the common case: the same
    /// compiled program matched against many inputs.
    fn resize(&mut self, num_insts: usize, slot_count: usize) {
        let same_shape = self.threads.current.capacity() == num_insts
            && self.caps_current.get(0).map(|c| c.len()) == Some(slot_count);
        if same_shape {
            return;
        }
        *self = SimulatorCache::new(num_insts, slot_count);
    }
}

/// The NFA simulator for one compiled program. Stateless itself; all
/// mutable working state lives in the caller-owned `SimulatorCache`, which
/// is what makes `Engine` safe to share across threads (spec.md §5).
pub struct Simulator<'r> {
    prog: &'r Program,
}

impl<'r> Simulator<'r> {
    pub fn new(prog: &'r Program) -> Simulator<'r> {
        Simulator { prog }
    }

    /// Runs the program starting at `start_pc` against `cursor`, writing
    /// the winning thread's capture slots into `caps` (which must have
    /// length `prog.slot_count`). Returns whether a match was found.
    ///
    /// Implements the Execute loop of spec.md §4.2 exactly: a single seed
    /// at `start_pc`, stepped forward one input unit at a time, with no
    /// re-seeding. Unanchored search is therefore entirely the compiler's
    /// responsibility (see `compile.rs`'s `find_start` wrapper): this
    /// function has no notion of "try the next start position".
    pub fn execute(
        &self,
        cache: &mut SimulatorCache,
        cursor: &mut InputCursor,
        start_pc: Pc,
        caps: &mut [Option<usize>],
    ) -> bool {
        let slot_count = self.prog.slot_count;
        cache.resize(self.prog.insts.len(), slot_count);
        cache.threads.clear();
        for c in caps.iter_mut() {
            *c = None;
        }
        let mut match_end: Option<usize> = None;

        // Step 2: seed the closure directly from start_pc.
        let seed_caps = vec![None; slot_count];
        let mut stop = false;
        self.closure_from(
            cache,
            cursor,
            start_pc,
            &seed_caps,
            caps,
            &mut match_end,
            &mut stop,
        );
        // closure_from always writes leaf captures into `caps_next`; swap
        // so `caps_current` matches the freshly populated `threads.current`.
        std::mem::swap(&mut cache.caps_current, &mut cache.caps_next);

        // Step 3: step forward while there's input left and threads alive.
        while !cursor.is_consumed() && !cache.threads.current.is_empty() {
            cache.threads.next.clear();
            let ch = cursor.current();

            let mut pc = cache.threads.current.first_set();
            while let Some(p) = pc {
                if let Some(succ) = character_transition(&self.prog.insts[p], ch) {
                    if !cache.threads.next.get(succ) {
                        cache.threads.next.set(succ);
                        cache.caps_next[succ] = cache.caps_current[p].clone();
                    }
                }
                pc = cache.threads.current.next_set(p);
            }

            cache.threads.swap_current_next();
            std::mem::swap(&mut cache.caps_current, &mut cache.caps_next);
            cursor.advance();

            self.reclose_current(cache, cursor, caps, &mut match_end);
        }

        // Step 4: one more closure so end-of-input assertions ($, \b at
        // EOI) can still promote a thread to Match, even when the loop
        // above exited because the cursor was already consumed before its
        // last closure ran.
        self.reclose_current(cache, cursor, caps, &mut match_end);

        match_end.is_some()
    }

    /// Moves the raw (un-closed) successor PCs sitting in `threads.current`
    /// into `threads.scratch`, clears `current`, then re-closes each
    /// scratch PC back into `current` -- spec.md §4.2 step 3d / step 4.
    fn reclose_current(
        &self,
        cache: &mut SimulatorCache,
        cursor: &InputCursor,
        caps: &mut [Option<usize>],
        match_end: &mut Option<usize>,
    ) {
        cache.threads.scratch.copy_from(&cache.threads.current);
        cache.threads.current.clear();
        let mut stop = false;

        let mut pc = cache.threads.scratch.first_set();
        while let Some(p) = pc {
            let seed_caps = cache.caps_current[p].clone();
            self.closure_from(cache, cursor, p, &seed_caps, caps, match_end, &mut stop);
            pc = cache.threads.scratch.next_set(p);
        }
        std::mem::swap(&mut cache.caps_current, &mut cache.caps_next);
    }

    /// Computes the epsilon-closure of `seed_pc` (carrying `seed_caps`
    /// forward), adding every reachable leaf instruction (`Char`,
    /// `ByteClass`, `AnyCharNotNL`) to `threads.current`, per spec.md
    /// §4.2's `closure_from`.
    ///
    /// `Match` is never added to the thread set; reaching it commits
    /// `caps`/`match_end` instead, provided no higher-priority thread has
    /// already done so this round (`stop`).
    ///
    /// Always writes leaf captures into `caps_next` (never `caps_current`,
    /// which the caller may still be reading as a seed source for other
    /// PCs in the same round); callers swap the two buffers once the round
    /// finishes.
    fn closure_from(
        &self,
        cache: &mut SimulatorCache,
        cursor: &InputCursor,
        seed_pc: Pc,
        seed_caps: &[Option<usize>],
        caps: &mut [Option<usize>],
        match_end: &mut Option<usize>,
        stop: &mut bool,
    ) {
        if *stop {
            return;
        }

        cache.working.clear();
        cache.working.extend_from_slice(seed_caps);
        cache.visited.clear();
        cache.stack.clear();
        cache.stack.push(Frame::Visit(seed_pc));

        while let Some(frame) = cache.stack.pop() {
            match frame {
                Frame::RestoreSlot(slot, old) => {
                    cache.working[slot] = old;
                }
                Frame::Visit(mut pc) => loop {
                    if cache.visited.get(pc) {
                        break;
                    }
                    cache.visited.set(pc);

                    match &self.prog.insts[pc].data {
                        Opcode::Jump => {
                            pc = self.prog.insts[pc].out;
                        }
                        Opcode::Split(alt) => {
                            cache.stack.push(Frame::Visit(*alt));
                            pc = self.prog.insts[pc].out;
                        }
                        Opcode::Save(slot) => {
                            let slot = *slot;
                            if slot < cache.working.len() {
                                let old = cache.working[slot];
                                cache.working[slot] = Some(cursor.pos());
                                cache.stack.push(Frame::RestoreSlot(slot, old));
                            }
                            pc = self.prog.insts[pc].out;
                        }
                        Opcode::EmptyMatch(a) => {
                            if cursor.is_empty_match(*a) {
                                pc = self.prog.insts[pc].out;
                            } else {
                                break;
                            }
                        }
                        Opcode::Match => {
                            if !*stop {
                                *match_end = Some(cursor.pos());
                                caps.copy_from_slice(&cache.working);
                                *stop = true;
                            }
                            break;
                        }
                        Opcode::Char(_) | Opcode::ByteClass(_) | Opcode::AnyCharNotNL => {
                            if !cache.threads.current.get(pc) {
                                cache.threads.current.set(pc);
                                cache.caps_next[pc].clear();
                                cache.caps_next[pc].extend_from_slice(&cache.working);
                            }
                            break;
                        }
                    }
                },
            }
        }
    }
}

/// Whether `inst` (a leaf opcode already confirmed present in a thread
/// set) consumes `ch`, and if so, its successor PC. `ch` is `None` at end
/// of input, in which case every leaf opcode fails to match.
fn character_transition(inst: &Instruction, ch: Option<u32>) -> Option<Pc> {
    let ch = ch?;
    let matches = match &inst.data {
        Opcode::Char(c) => ch == *c as u32,
        Opcode::ByteClass(bc) => ch <= 0xFF && bc.contains(ch as u8),
        Opcode::AnyCharNotNL => ch != '\n' as u32,
        _ => false,
    };
    if matches {
        Some(inst.out)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Assertion, InputMode};
    use crate::inst::ByteClass;
    use crate::program::Program;

    fn run(prog: &Program, start: Pc, input: &str) -> (bool, Vec<Option<usize>>) {
        let mut cache = SimulatorCache::new(prog.insts.len(), prog.slot_count);
        let mut cursor = InputCursor::new(input.as_bytes(), InputMode::Utf8, false);
        let mut caps = prog.alloc_captures();
        let sim = Simulator::new(prog);
        let matched = sim.execute(&mut cache, &mut cursor, start, &mut caps);
        (matched, caps)
    }

    // Scenarios 1/2 (spec.md §8): Char('a') -> EmptyMatch(EndLine) -> Match.
    fn end_line_after_a() -> Program {
        let insts = vec![
            Instruction::new(1, Opcode::Char('a')),
            Instruction::new(2, Opcode::EmptyMatch(Assertion::EndLine)),
            Instruction::new(2, Opcode::Match),
        ];
        Program::new("a$".into(), insts, 0, 0, 2)
    }

    #[test]
    fn end_of_text_assertion_matches_at_eoi() {
        assert!(run(&end_line_after_a(), 0, "a").0);
    }

    #[test]
    fn end_of_text_assertion_rejects_mid_string() {
        assert!(!run(&end_line_after_a(), 0, "ab").0);
    }

    // Scenario 3: Split(1, 2); Char('a')->3; Char('b')->3; Match.
    fn a_or_b() -> Program {
        let insts = vec![
            Instruction::new(1, Opcode::Split(2)),
            Instruction::new(3, Opcode::Char('a')),
            Instruction::new(3, Opcode::Char('b')),
            Instruction::new(3, Opcode::Match),
        ];
        Program::new("[ab]".into(), insts, 0, 0, 2)
    }

    #[test]
    fn alternation_accepts_either_branch() {
        assert!(run(&a_or_b(), 0, "a").0);
        assert!(run(&a_or_b(), 0, "b").0);
    }

    #[test]
    fn alternation_rejects_other_input() {
        assert!(!run(&a_or_b(), 0, "c").0);
    }

    // Scenario 5: Save(0) -> Char('x') -> Save(1) -> Match.
    fn save_wrapped_x() -> Program {
        let insts = vec![
            Instruction::new(1, Opcode::Save(0)),
            Instruction::new(2, Opcode::Char('x')),
            Instruction::new(3, Opcode::Save(1)),
            Instruction::new(3, Opcode::Match),
        ];
        Program::new("x".into(), insts, 0, 0, 2)
    }

    #[test]
    fn save_instructions_populate_whole_match_slots() {
        let (matched, caps) = run(&save_wrapped_x(), 0, "x");
        assert!(matched);
        assert_eq!(caps, vec![Some(0), Some(1)]);
    }

    #[test]
    fn empty_input_against_pure_match_program() {
        let insts = vec![Instruction::new(0, Opcode::Match)];
        let prog = Program::new("".into(), insts, 0, 0, 2);
        assert!(run(&prog, 0, "").0);
    }

    #[test]
    fn epsilon_self_loop_terminates() {
        // 0: Split(0, 1) -- also loops back to itself.
        // 1: Match.
        let insts = vec![
            Instruction::new(1, Opcode::Split(0)),
            Instruction::new(1, Opcode::Match),
        ];
        let prog = Program::new("".into(), insts, 0, 0, 2);
        assert!(run(&prog, 0, "").0);
    }

    #[test]
    fn dense_split_fanout_is_bounded() {
        // A chain of 64 Splits, each branching to a dead Char and
        // continuing to the next, terminating in Match. Exercises
        // spec.md §7's "dense fan-out of 64 Split instructions" case.
        let mut insts = Vec::new();
        for i in 0..64usize {
            insts.push(Instruction::new(i + 1, Opcode::Split(65 + i)));
        }
        insts.push(Instruction::new(64, Opcode::Match)); // pc 64
        for _ in 0..64 {
            insts.push(Instruction::new(64, Opcode::Char('z')));
        }
        let prog = Program::new("".into(), insts, 0, 0, 2);
        assert!(run(&prog, 0, "").0);
    }

    #[test]
    fn byte_class_matches_within_latin1_range() {
        let insts = vec![
            Instruction::new(1, Opcode::ByteClass(ByteClass::new(vec![(b'0', b'9')]))),
            Instruction::new(1, Opcode::Match),
        ];
        let prog = Program::new("[0-9]".into(), insts, 0, 0, 2);
        assert!(run(&prog, 0, "5").0);
        assert!(!run(&prog, 0, "x").0);
    }

    #[test]
    fn any_char_not_nl_rejects_newline() {
        let insts = vec![
            Instruction::new(1, Opcode::AnyCharNotNL),
            Instruction::new(1, Opcode::Match),
        ];
        let prog = Program::new(".".into(), insts, 0, 0, 2);
        assert!(run(&prog, 0, "x").0);
        assert!(!run(&prog, 0, "\n").0);
    }

    #[test]
    fn greedy_alternation_prefers_earlier_branch_captures() {
        // Split(1, 3); branch A: Save(2)->2; Char('a')->5 (higher priority,
        // lower PCs); branch B: Save(2)->4; Char('a')->5 (lower priority).
        // Both branches match "a", but branch A must win, so slot 2 must
        // end up holding its Save's position (0), not branch B's.
        let insts = vec![
            Instruction::new(1, Opcode::Split(3)), // 0
            Instruction::new(2, Opcode::Save(2)),  // 1: branch A save
            Instruction::new(5, Opcode::Char('a')), // 2: branch A char
            Instruction::new(4, Opcode::Save(2)),  // 3: branch B save
            Instruction::new(5, Opcode::Char('a')), // 4: branch B char
            Instruction::new(5, Opcode::Match),    // 5
        ];
        let prog = Program::new("(a)|(a)".into(), insts, 0, 0, 4);
        let (matched, caps) = run(&prog, 0, "a");
        assert!(matched);
        assert_eq!(caps[2], Some(0));
    }

    #[test]
    fn closure_is_idempotent_on_repeated_seed() {
        // Running execute twice against freshly-seeded caches for the same
        // program and input must agree exactly (spec.md §8's closure
        // idempotence invariant, exercised end-to-end).
        let prog = a_or_b();
        let (m1, c1) = run(&prog, 0, "a");
        let (m2, c2) = run(&prog, 0, "a");
        assert_eq!((m1, c1), (m2, c2));
    }
}
