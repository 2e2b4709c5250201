// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The literal prefilter (spec.md §4.4): extracts the best literal
//! candidate from a compiled `Program` and picks a search strategy for it.
//!
//! Candidate extraction walks the instruction stream directly rather than
//! the source AST (SPEC_FULL.md §4.4), in both directions: forward from
//! `Program.start` for a `Standalone`/`Prefix` run, and backward from every
//! `Match` instruction for a `Suffix` run, skipping over `Save` (which
//! doesn't consume input) in either direction. When both a prefix and a
//! suffix candidate exist, `LiteralCandidate::score()` picks the stronger
//! one. This mirrors the "single best literal" model of
//! `BuildPrefixes`/`BuildRequiredLiterals`
//! (`other_examples/4c65cd64_defuz-regex__src-literals.rs.rs`) without its
//! multi-alternate Aho-Corasick machinery, which spec.md §9 marks as a
//! future strategy, not part of this contract. `Position::Middle` is part
//! of that same future strategy (a literal run reachable from neither end)
//! and is never produced by this extraction.

use crate::boyer_moore::BoyerMoore;
use crate::inst::{Opcode, Pc};
use crate::program::Program;

/// Where a literal candidate sits relative to the overall match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    /// The literal *is* the entire pattern.
    Standalone,
    /// The literal must occur at the start of the match.
    Prefix,
    /// The literal must occur at the end of the match.
    Suffix,
    /// The literal occurs somewhere inside the match, anchored at neither
    /// end. Reserved for the multi-alternate extraction spec.md §9 defers;
    /// `extract_candidate` never produces it.
    Middle,
}

/// A literal substring extracted from a compiled program, scored against
/// spec.md §4.4's weights so the best of several candidates can be chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiteralCandidate {
    pub bytes: Vec<u8>,
    pub position: Position,
    pub min_len: usize,
    pub max_len: usize,
    pub greedy: bool,
}

impl LiteralCandidate {
    /// The scoring function of spec.md §4.4: length (weight 10/byte),
    /// position bonus, a fixed-length bonus, and a small greedy bonus.
    pub fn score(&self) -> i64 {
        let mut s = self.bytes.len() as i64 * 10;
        s += match self.position {
            Position::Standalone | Position::Prefix => 50,
            Position::Suffix => 20,
            Position::Middle => 10,
        };
        if self.min_len == self.max_len {
            s += 30;
        }
        if self.greedy {
            s += 5;
        }
        s
    }
}

/// The search strategy selected for a candidate, per spec.md §4.4's table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// The best candidate is too short to be worth a prefilter pass.
    None,
    /// `3..5` bytes: a naive substring scan.
    FixedString,
    /// `>= 5` bytes: Boyer-Moore.
    BoyerMoore,
}

fn strategy_for_len(len: usize) -> Strategy {
    if len < 3 {
        Strategy::None
    } else if len < 5 {
        Strategy::FixedString
    } else {
        Strategy::BoyerMoore
    }
}

/// A search matcher bound to a specific literal, dispatching to the
/// strategy the candidate's length selected.
#[derive(Clone, Debug)]
enum Matcher {
    FixedString(Vec<u8>),
    BoyerMoore(BoyerMoore),
}

impl Matcher {
    fn find_from(&self, text: &[u8], start: usize) -> Option<(usize, usize)> {
        match self {
            Matcher::FixedString(pat) => {
                find_naive(text, start, pat).map(|s| (s, s + pat.len()))
            }
            Matcher::BoyerMoore(bm) => {
                bm.search_from(text, start).map(|s| (s, s + bm.pattern().len()))
            }
        }
    }
}

/// Naive (no-skip-table) substring scan, used for short candidates where a
/// full Boyer-Moore table isn't worth building (spec.md §4.4's
/// `FixedString` strategy).
fn find_naive(text: &[u8], start: usize, pat: &[u8]) -> Option<usize> {
    if pat.is_empty() {
        return Some(start.min(text.len()));
    }
    if text.len() < pat.len() {
        return None;
    }
    let mut i = start;
    while i <= text.len() - pat.len() {
        if &text[i..i + pat.len()] == pat {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// The literal prefilter bound to one compiled program: the best literal
/// candidate found (if any), the strategy chosen for it, and the matcher
/// that implements that strategy.
#[derive(Clone, Debug)]
pub struct Prefilter {
    candidate: Option<LiteralCandidate>,
    strategy: Strategy,
    matcher: Option<Matcher>,
}

impl Prefilter {
    /// Extracts and scores the best literal candidate in `prog`, selecting
    /// a search strategy for it.
    pub fn analyze(prog: &Program) -> Prefilter {
        let candidate = extract_candidate(prog);
        let strategy = candidate.as_ref().map(|c| strategy_for_len(c.bytes.len())).unwrap_or(Strategy::None);
        let matcher = match (&candidate, strategy) {
            (Some(c), Strategy::FixedString) => Some(Matcher::FixedString(c.bytes.clone())),
            (Some(c), Strategy::BoyerMoore) => Some(Matcher::BoyerMoore(BoyerMoore::new(&c.bytes))),
            _ => None,
        };
        Prefilter { candidate, strategy, matcher }
    }

    /// The strategy this prefilter will use (possibly `None`, meaning the
    /// engine façade should bypass it entirely).
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The literal candidate this prefilter was built from, if any.
    pub fn candidate(&self) -> Option<&LiteralCandidate> {
        self.candidate.as_ref()
    }

    /// Finds the first occurrence of the literal candidate in
    /// `text[start..]`, returning its absolute byte range, using whichever
    /// strategy `analyze` selected. Returns `None` immediately if the
    /// strategy is `Strategy::None`.
    pub fn find_from(&self, text: &[u8], start: usize) -> Option<(usize, usize)> {
        self.matcher.as_ref().and_then(|m| m.find_from(text, start))
    }
}

/// Extracts the best literal candidate in `prog`: the forward prefix (or
/// whole-pattern) run, the backward suffix run, or whichever of the two
/// scores higher when both exist.
fn extract_candidate(prog: &Program) -> Option<LiteralCandidate> {
    let prefix = extract_prefix_candidate(prog);
    if matches!(prefix, Some(LiteralCandidate { position: Position::Standalone, .. })) {
        return prefix;
    }
    let suffix = extract_suffix_candidate(prog);
    match (prefix, suffix) {
        (Some(p), Some(s)) => Some(if s.score() > p.score() { s } else { p }),
        (Some(p), None) => Some(p),
        (None, Some(s)) => Some(s),
        (None, None) => None,
    }
}

/// Walks `prog` starting at `prog.start`, collecting the unbroken run of
/// `Char` instructions reachable by following `out` (through `Save`
/// instructions, which don't consume input and so don't break the run).
/// Stops at the first `Split`, `EmptyMatch`, `ByteClass`, `AnyCharNotNL`,
/// `Jump`, or `Match`.
fn extract_prefix_candidate(prog: &Program) -> Option<LiteralCandidate> {
    let mut bytes = Vec::new();
    let mut pc: Pc = prog.start;
    let mut scratch = [0u8; 4];
    loop {
        match &prog.insts[pc].data {
            Opcode::Save(_) => {
                pc = prog.insts[pc].out;
            }
            Opcode::Char(c) => {
                bytes.extend_from_slice(c.encode_utf8(&mut scratch).as_bytes());
                pc = prog.insts[pc].out;
            }
            Opcode::Match => {
                return if bytes.is_empty() {
                    None
                } else {
                    Some(LiteralCandidate {
                        min_len: bytes.len(),
                        max_len: bytes.len(),
                        bytes,
                        position: Position::Standalone,
                        greedy: true,
                    })
                };
            }
            Opcode::Jump | Opcode::Split(_) | Opcode::EmptyMatch(_)
            | Opcode::ByteClass(_) | Opcode::AnyCharNotNL => {
                return if bytes.is_empty() {
                    None
                } else {
                    let len = bytes.len();
                    Some(LiteralCandidate {
                        bytes,
                        position: Position::Prefix,
                        min_len: len,
                        max_len: len,
                        greedy: true,
                    })
                };
            }
        }
    }
}

/// Walks `prog` backward from every `Match` instruction, collecting the
/// unbroken run of `Char` instructions that lead into it (through `Save`,
/// and only where the predecessor is unambiguous -- a branch point with
/// more than one predecessor ends the run, since which literal actually
/// preceded the match there depends on which arm was taken). Returns the
/// highest-scoring such run, if more than one `Match` instruction has one.
fn extract_suffix_candidate(prog: &Program) -> Option<LiteralCandidate> {
    let n = prog.insts.len();
    let mut pred_count = vec![0u32; n];
    let mut pred: Vec<Option<Pc>> = vec![None; n];
    for (pc, inst) in prog.insts.iter().enumerate() {
        let mut record = |to: Pc| {
            pred_count[to] += 1;
            pred[to] = Some(pc);
        };
        record(inst.out);
        if let Opcode::Split(alt) = inst.data {
            record(alt);
        }
    }

    let mut best: Option<LiteralCandidate> = None;
    for (pc, inst) in prog.insts.iter().enumerate() {
        if !matches!(inst.data, Opcode::Match) {
            continue;
        }
        let mut chain: Vec<u8> = Vec::new();
        let mut cur = pc;
        let mut scratch = [0u8; 4];
        // Bounded by instruction count: a genuine literal run visits each
        // predecessor at most once, so this terminates long before the
        // bound in practice; the bound only guards against a malformed
        // predecessor chain.
        for _ in 0..=n {
            if pred_count[cur] != 1 {
                break;
            }
            let p = match pred[cur] {
                Some(p) => p,
                None => break,
            };
            match &prog.insts[p].data {
                Opcode::Char(c) => {
                    let mut prefix = c.encode_utf8(&mut scratch).as_bytes().to_vec();
                    prefix.extend_from_slice(&chain);
                    chain = prefix;
                    cur = p;
                }
                Opcode::Save(_) => {
                    cur = p;
                }
                _ => break,
            }
        }
        if chain.is_empty() {
            continue;
        }
        let len = chain.len();
        let candidate = LiteralCandidate {
            bytes: chain,
            position: Position::Suffix,
            min_len: len,
            max_len: len,
            greedy: true,
        };
        if best.as_ref().map_or(true, |b| candidate.score() > b.score()) {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;

    #[test]
    fn standalone_literal_scores_highest() {
        let prog = compile("hello").unwrap();
        let pf = Prefilter::analyze(&prog);
        let cand = pf.candidate().unwrap();
        assert_eq!(cand.bytes, b"hello");
        assert_eq!(cand.position, Position::Standalone);
    }

    #[test]
    fn short_literal_bypasses_prefilter() {
        let prog = compile("ab.*").unwrap();
        let pf = Prefilter::analyze(&prog);
        assert_eq!(pf.strategy(), Strategy::None);
    }

    #[test]
    fn medium_literal_uses_fixed_string() {
        let prog = compile("abcd.*").unwrap();
        let pf = Prefilter::analyze(&prog);
        assert_eq!(pf.strategy(), Strategy::FixedString);
    }

    #[test]
    fn long_literal_uses_boyer_moore() {
        let prog = compile("hello.*world").unwrap();
        let pf = Prefilter::analyze(&prog);
        assert_eq!(pf.strategy(), Strategy::BoyerMoore);
    }

    #[test]
    fn prefilter_finds_candidate_in_haystack() {
        let prog = compile("hello").unwrap();
        let pf = Prefilter::analyze(&prog);
        assert_eq!(pf.find_from(b"say hello to the world", 0), Some((4, 9)));
    }

    #[test]
    fn alternation_has_no_single_prefix_literal() {
        let prog = compile("cat|dog").unwrap();
        let pf = Prefilter::analyze(&prog);
        assert_eq!(pf.strategy(), Strategy::None);
    }

    #[test]
    fn trailing_literal_is_found_as_a_suffix_candidate() {
        let prog = compile(".*world").unwrap();
        let pf = Prefilter::analyze(&prog);
        let cand = pf.candidate().unwrap();
        assert_eq!(cand.bytes, b"world");
        assert_eq!(cand.position, Position::Suffix);
        assert_eq!(pf.find_from(b"hello world", 0), Some((6, 11)));
    }

    #[test]
    fn longer_suffix_outscores_shorter_prefix() {
        // "a" (prefix, 1 byte) loses to "worldwide" (suffix, 9 bytes) on
        // length alone, once both are scored.
        let prog = compile("a.*worldwide").unwrap();
        let pf = Prefilter::analyze(&prog);
        let cand = pf.candidate().unwrap();
        assert_eq!(cand.bytes, b"worldwide");
        assert_eq!(cand.position, Position::Suffix);
    }
}
