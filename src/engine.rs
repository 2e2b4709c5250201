// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The engine façade (spec.md §4.5/§6): binds a compiled `Program`, its
//! literal prefilter, and a reusable simulator cache into the three
//! public operations `is_match`/`find`/`captures`.
//!
//! Grounded in `other_examples/2eb80173_defuz-regex__src-exec.rs.rs`'s
//! `Executor` (an engine-selection façade over a compiled `Program`) and
//! `other_examples/1ae3245a_defuz-regex__src-program.rs.rs`'s
//! `Program::exec_input` gating order -- try the literal engine first when
//! possible, else run the NFA -- simplified to this engine's fixed
//! two-tier gate, since the backtracking/DFA tiers those sources also
//! offer are non-goals here (spec.md §1).

use std::cell::RefCell;

use crate::compile;
use crate::input::{InputCursor, InputMode};
use crate::inst::Pc;
use crate::literal::{Position, Prefilter, Strategy};
use crate::nfa::{Simulator, SimulatorCache};
use crate::program::{CompileError, Program};

/// The bounds of a single match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
}

impl Match {
    /// The matched substring of `text`.
    pub fn as_str<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.end]
    }
}

/// A compiled regular expression, ready to match against input text.
///
/// `Engine` is `Send` (its `Program` and `Prefilter` are immutable and
/// freely shareable), but not `Sync`: its reusable `SimulatorCache` lives
/// behind a `RefCell` so that repeated calls on one `Engine` don't
/// reallocate, and concurrent matching therefore means one `Engine` per
/// thread (see spec.md §5 and SPEC_FULL.md §5).
pub struct Engine {
    prog: Program,
    prefilter: Prefilter,
    cache: RefCell<SimulatorCache>,
}

impl Engine {
    /// Compiles `pattern` into a ready-to-run engine. The concrete
    /// realization of spec.md §6's `compile(pattern) -> Result<Engine,
    /// CompileError>`.
    pub fn new(pattern: &str) -> Result<Engine, CompileError> {
        let prog = compile::compile(pattern)?;
        let prefilter = Prefilter::analyze(&prog);
        let cache = RefCell::new(SimulatorCache::new(prog.insts.len(), prog.slot_count));
        Ok(Engine { prog, prefilter, cache })
    }

    /// The pattern text this engine was compiled from.
    pub fn pattern(&self) -> &str {
        &self.prog.original
    }

    /// The number of capture groups, including the implicit whole-match
    /// group 0.
    pub fn num_captures(&self) -> usize {
        self.prog.num_captures()
    }

    /// Whether `input`, taken as a whole starting at position 0, matches
    /// this engine's pattern (anchored at `Program::start`).
    pub fn is_match(&self, input: &str) -> bool {
        self.run(input.as_bytes(), self.prog.start, 0).is_some()
    }

    /// Finds the leftmost unanchored match in `input`, if any.
    pub fn find(&self, input: &str) -> Option<Match> {
        let caps = self.find_captures_raw(input.as_bytes())?;
        Some(Match { start: caps[0]?, end: caps[1]? })
    }

    /// Finds the leftmost unanchored match in `input` and exposes every
    /// capture group's span.
    pub fn captures(&self, input: &str) -> Option<CaptureResult> {
        let slots = self.find_captures_raw(input.as_bytes())?;
        Some(CaptureResult { slots })
    }

    /// Implements the engine's find/captures gate (spec.md §4.4's
    /// "Engine integration"): a pattern anchored with `^`/`\A` can only
    /// ever match at position 0, so it skips both the prefilter and the
    /// compiler-emitted `.*?` unanchored prefix and runs `start` directly.
    /// Otherwise, a `Standalone` literal candidate short-circuits the NFA
    /// entirely (only valid when there are no capture groups beyond the
    /// whole match, since the literal search alone can't populate subgroup
    /// slots); a `Prefix` candidate narrows the unanchored search to only
    /// the input positions where the literal actually occurs, trying each
    /// in turn; anything else runs the compiler-emitted `.*?`-wrapped
    /// `find_start` directly.
    fn find_captures_raw(&self, bytes: &[u8]) -> Option<Vec<Option<usize>>> {
        if self.prog.is_anchored_start() {
            return self.run(bytes, self.prog.start, 0);
        }
        if self.prefilter.strategy() != Strategy::None {
            let candidate = self.prefilter.candidate().expect("a non-None strategy always has a candidate");
            match candidate.position {
                Position::Standalone if self.prog.slot_count == 2 => {
                    return self
                        .prefilter
                        .find_from(bytes, 0)
                        .map(|(s, e)| vec![Some(s), Some(e)]);
                }
                Position::Prefix => {
                    let mut start = 0;
                    loop {
                        let (lit_start, _) = self.prefilter.find_from(bytes, start)?;
                        if let Some(caps) = self.run(bytes, self.prog.start, lit_start) {
                            return Some(caps);
                        }
                        start = lit_start + 1;
                    }
                }
                _ => {}
            }
        }
        self.run(bytes, self.prog.find_start, 0)
    }

    /// Runs the simulator starting at `start_pc` with the cursor
    /// positioned at `pos`, returning the populated capture slots on a
    /// match.
    fn run(&self, bytes: &[u8], start_pc: Pc, pos: usize) -> Option<Vec<Option<usize>>> {
        let mut cache = self.cache.borrow_mut();
        let mut cursor = InputCursor::at(bytes, pos, InputMode::Utf8, false);
        let mut caps = self.prog.alloc_captures();
        let sim = Simulator::new(&self.prog);
        if sim.execute(&mut cache, &mut cursor, start_pc, &mut caps) {
            Some(caps)
        } else {
            None
        }
    }
}

/// The capture spans of one successful match, per spec.md §4.5.
/// `CaptureResult` owns a deep copy of the slot vector (no borrow back
/// into the `Engine`).
#[derive(Clone, Debug)]
pub struct CaptureResult {
    slots: Vec<Option<usize>>,
}

impl CaptureResult {
    /// The span of capture group `n` (group 0 is the whole match), or
    /// `None` if group `n` didn't participate in this match (or doesn't
    /// exist).
    pub fn get(&self, n: usize) -> Option<Match> {
        let start = *self.slots.get(2 * n)?;
        let end = *self.slots.get(2 * n + 1)?;
        match (start, end) {
            (Some(s), Some(e)) => Some(Match { start: s, end: e }),
            _ => None,
        }
    }

    /// The number of capture groups this result has slots for, including
    /// group 0.
    pub fn len(&self) -> usize {
        self.slots.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_match_anchored_at_start() {
        let re = Engine::new("abc").unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("xabc"));
    }

    #[test]
    fn find_unanchored_via_literal_prefilter() {
        let re = Engine::new("hello").unwrap();
        let m = re.find("say hello to the world").unwrap();
        assert_eq!((m.start, m.end), (4, 9));
    }

    #[test]
    fn find_unanchored_without_prefilter() {
        let re = Engine::new("a.c").unwrap();
        let m = re.find("xx abc yy").unwrap();
        assert_eq!((m.start, m.end), (3, 6));
    }

    #[test]
    fn captures_exposes_groups() {
        let re = Engine::new(r"(\d+)-(\d+)").unwrap();
        let caps = re.captures("order 12-345 today").unwrap();
        assert_eq!(caps.get(0).unwrap().as_str("order 12-345 today"), "12-345");
        assert_eq!(caps.get(1).unwrap().as_str("order 12-345 today"), "12");
        assert_eq!(caps.get(2).unwrap().as_str("order 12-345 today"), "345");
    }

    #[test]
    fn no_match_returns_none() {
        let re = Engine::new("xyz").unwrap();
        assert_eq!(re.find("abc"), None);
        assert!(re.captures("abc").is_none());
    }

    #[test]
    fn prefix_literal_narrows_search_past_false_starts() {
        // The literal "cat" occurs at 0 but isn't followed by a digit
        // there; the real match starts at the second occurrence.
        let re = Engine::new(r"cat\d").unwrap();
        let m = re.find("cat cat9").unwrap();
        assert_eq!((m.start, m.end), (4, 8));
    }

    #[test]
    fn anchored_pattern_finds_only_at_position_zero() {
        // `find` on a `^`-anchored pattern must not skip past a
        // non-matching prefix the way an unanchored search would.
        let re = Engine::new(r"^\d+").unwrap();
        assert_eq!(re.find("abc123"), None);
        let m = re.find("123abc").unwrap();
        assert_eq!((m.start, m.end), (0, 3));
    }

    #[test]
    fn bounded_repetition_matches_every_count_in_range() {
        let re = Engine::new("a{2,4}").unwrap();
        assert!(!re.is_match("a"));
        assert!(re.is_match("aa"));
        assert!(re.is_match("aaa"));
        assert!(re.is_match("aaaa"));
        let m = re.find("xaaaaax").unwrap();
        // Greedy: matches as many as allowed, not just the minimum.
        assert_eq!((m.start, m.end), (1, 5));
    }

    #[test]
    fn repeated_calls_reuse_the_cache() {
        let re = Engine::new("a+b").unwrap();
        assert!(re.is_match("aaab"));
        assert!(re.is_match("ab"));
        assert!(!re.is_match("b"));
    }
}
