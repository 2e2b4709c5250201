// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lowers a parsed pattern into the bytecode `Program` the simulator runs.
//!
//! The parser/AST-to-HIR stage itself is out of scope (spec.md §1): this
//! module takes `regex-syntax`'s `Hir` as a given and is concerned only
//! with realizing the instruction-emission contract of spec.md §6. The
//! recursive-descent walk and its "entry PC + list of holes to patch"
//! technique are carried over directly from `examples/wesleywiser-regex`'s
//! `compile.rs`; only the AST type and the opcode set it emits have
//! changed.

use regex_syntax::hir::{Class, Hir, HirKind, Look, Repetition};
use regex_syntax::Parser;

use crate::inst::{ByteClass, Instruction, Opcode, Pc};
use crate::input::Assertion;
use crate::program::{CompileError, Program};

/// Upper bound on emitted instructions, generalizing
/// `examples/wesleywiser-regex`'s byte-size `size_limit`/
/// `CompiledTooBig` guard to this engine's instruction-counted programs.
const DEFAULT_SIZE_LIMIT: usize = 100_000;

/// Upper bound on capture groups a pattern may declare.
const MAX_CAPTURE_GROUPS: usize = 100;

/// Upper bound on codepoints a single character class may expand to. This
/// engine's opcode set (spec.md §3) has no generic "codepoint range"
/// instruction, so `Class::Unicode` classes are expanded into a Split
/// cascade of single `Char` instructions; `Class::Bytes` classes need no
/// such expansion, since `Opcode::ByteClass` already holds ranges.
const MAX_CLASS_CHARS: usize = 1024;

/// The number of valid Unicode scalar values: every codepoint in
/// `0..=0x10FFFF` except the UTF-16 surrogate range `0xD800..=0xDFFF`, which
/// `char` cannot represent. `.`'s HIR compiles to a Unicode class spanning
/// (almost) exactly this many codepoints.
const TOTAL_UNICODE_SCALARS: u64 = 0x110000 - 0x800;

/// The total number of codepoints a Unicode class's ranges cover.
fn unicode_class_len(u: &regex_syntax::hir::ClassUnicode) -> u64 {
    u.ranges().iter().map(|r| (r.end() as u32 - r.start() as u32 + 1) as u64).sum()
}

/// Compiles `pattern` into a runnable `Program`.
pub fn compile(pattern: &str) -> Result<Program, CompileError> {
    let hir = Parser::new().parse(pattern)?;
    let mut c = Compiler::new();

    let save0 = c.push(Opcode::Save(0));
    let body = c.compile_hir(&hir)?;
    c.patch(save0, body.start);
    let save1 = c.push(Opcode::Save(1));
    c.patch_holes(&body.holes, save1);
    let match_pc = c.push(Opcode::Match);
    c.patch(save1, match_pc);
    let start = save0;

    if c.insts.len() > c.size_limit {
        return Err(CompileError::TooManyInstructions(c.size_limit));
    }
    if c.num_capture_groups() > MAX_CAPTURE_GROUPS {
        return Err(CompileError::TooManyCaptureGroups(MAX_CAPTURE_GROUPS));
    }

    let find_start = c.push_unanchored_prefix(start);
    let slot_count = (c.max_capture_index + 1) * 2;

    Ok(Program::new(pattern.to_string(), c.insts, start, find_start, slot_count))
}

/// A compiled fragment: an entry PC and the list of dangling successor
/// fields ("holes") still waiting to be patched to whatever comes next.
struct Frag {
    start: Pc,
    holes: Vec<Hole>,
}

/// One dangling successor field of an already-emitted instruction.
enum Hole {
    /// `Instruction::out`.
    Out(Pc),
    /// The `alt` field of a `Split`.
    Alt(Pc),
}

struct Compiler {
    size_limit: usize,
    insts: Vec<Instruction>,
    max_capture_index: usize,
}

impl Compiler {
    fn new() -> Compiler {
        Compiler { size_limit: DEFAULT_SIZE_LIMIT, insts: Vec::new(), max_capture_index: 0 }
    }

    fn num_capture_groups(&self) -> usize {
        self.max_capture_index
    }

    /// Emits an instruction with a placeholder `out` (and, for `Split`,
    /// placeholder `alt`), returning its PC. Callers patch the real
    /// successor(s) in with `patch`/`patch_alt` once known.
    fn push(&mut self, data: Opcode) -> Pc {
        self.insts.push(Instruction::new(0, data));
        self.insts.len() - 1
    }

    fn patch(&mut self, pc: Pc, target: Pc) {
        self.insts[pc].out = target;
    }

    fn patch_alt(&mut self, pc: Pc, target: Pc) {
        if let Opcode::Split(ref mut alt) = self.insts[pc].data {
            *alt = target;
        }
    }

    fn patch_holes(&mut self, holes: &[Hole], target: Pc) {
        for h in holes {
            match *h {
                Hole::Out(pc) => self.patch(pc, target),
                Hole::Alt(pc) => self.patch_alt(pc, target),
            }
        }
    }

    /// An instruction that does nothing but jump to whatever comes next;
    /// used as the realization of `Hir::Empty` and of a zero-repetition
    /// (`{0,0}`) tail.
    fn compile_empty(&mut self) -> Frag {
        let pc = self.push(Opcode::Jump);
        Frag { start: pc, holes: vec![Hole::Out(pc)] }
    }

    fn compile_hir(&mut self, hir: &Hir) -> Result<Frag, CompileError> {
        match hir.kind() {
            HirKind::Empty => Ok(self.compile_empty()),
            HirKind::Literal(lit) => self.compile_literal(&lit.0),
            HirKind::Class(class) => self.compile_class(class),
            HirKind::Look(look) => self.compile_look(look),
            HirKind::Repetition(rep) => self.compile_repetition(rep),
            HirKind::Capture(cap) => {
                let index = cap.index as usize;
                if index > self.max_capture_index {
                    self.max_capture_index = index;
                }
                let save_start = self.push(Opcode::Save(2 * index));
                let body = self.compile_hir(&cap.sub)?;
                self.patch(save_start, body.start);
                let save_end = self.push(Opcode::Save(2 * index + 1));
                self.patch_holes(&body.holes, save_end);
                Ok(Frag { start: save_start, holes: vec![Hole::Out(save_end)] })
            }
            HirKind::Concat(subs) => self.compile_concat(subs),
            HirKind::Alternation(subs) => {
                self.compile_cascade(subs.len(), |c, i| c.compile_hir(&subs[i]))
            }
        }
    }

    fn compile_literal(&mut self, bytes: &[u8]) -> Result<Frag, CompileError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|_| CompileError::Unsupported("non-UTF-8 literal"))?;
        let chars: Vec<char> = s.chars().collect();
        if chars.is_empty() {
            return Ok(self.compile_empty());
        }
        let entry = self.push(Opcode::Char(chars[0]));
        let mut prev = entry;
        for &ch in &chars[1..] {
            let pc = self.push(Opcode::Char(ch));
            self.patch(prev, pc);
            prev = pc;
        }
        Ok(Frag { start: entry, holes: vec![Hole::Out(prev)] })
    }

    fn compile_class(&mut self, class: &Class) -> Result<Frag, CompileError> {
        match class {
            Class::Bytes(b) => {
                let ranges: Vec<(u8, u8)> =
                    b.iter().map(|r| (r.start(), r.end())).collect();
                let pc = self.push(Opcode::ByteClass(ByteClass::new(ranges)));
                Ok(Frag { start: pc, holes: vec![Hole::Out(pc)] })
            }
            Class::Unicode(u) => {
                // `.` (and `(?s).`) parse to a Unicode class spanning
                // (almost) every scalar value rather than a dedicated HIR
                // node, so the near-total-coverage cases are special-cased
                // onto this opcode set's dedicated `AnyCharNotNL` rather
                // than expanded one `Char` at a time, which would blow
                // `MAX_CLASS_CHARS` for every use of `.`.
                let total = unicode_class_len(u);
                if total == TOTAL_UNICODE_SCALARS {
                    return Ok(self.compile_any_char_including_newline());
                }
                if total + 1 == TOTAL_UNICODE_SCALARS
                    && !u.iter().any(|r| r.start() <= '\n' && '\n' <= r.end())
                {
                    let pc = self.push(Opcode::AnyCharNotNL);
                    return Ok(Frag { start: pc, holes: vec![Hole::Out(pc)] });
                }

                let mut chars = Vec::new();
                for range in u.iter() {
                    for c in (range.start() as u32)..=(range.end() as u32) {
                        if let Some(ch) = char::from_u32(c) {
                            chars.push(ch);
                        }
                        if chars.len() > MAX_CLASS_CHARS {
                            return Err(CompileError::TooManyInstructions(MAX_CLASS_CHARS));
                        }
                    }
                }
                if chars.is_empty() {
                    return Err(CompileError::Unsupported("empty character class"));
                }
                self.compile_cascade(chars.len(), |c, i| {
                    let pc = c.push(Opcode::Char(chars[i]));
                    Ok(Frag { start: pc, holes: vec![Hole::Out(pc)] })
                })
            }
        }
    }

    /// `(?s).`-style "any codepoint at all", built from the same
    /// `AnyCharNotNL`-plus-explicit-`\n` split used by
    /// `push_unanchored_prefix`, since this opcode set has no single
    /// instruction for it.
    fn compile_any_char_including_newline(&mut self) -> Frag {
        let split_pc = self.push(Opcode::Split(0));
        let any_nl = self.push(Opcode::AnyCharNotNL);
        self.patch(split_pc, any_nl);
        let nl = self.push(Opcode::Char('\n'));
        self.patch_alt(split_pc, nl);
        Frag { start: split_pc, holes: vec![Hole::Out(any_nl), Hole::Out(nl)] }
    }

    fn compile_look(&mut self, look: &Look) -> Result<Frag, CompileError> {
        let assertion = match look {
            Look::Start => Assertion::BeginText,
            Look::End => Assertion::EndText,
            Look::StartLF => Assertion::BeginLine,
            Look::EndLF => Assertion::EndLine,
            Look::WordUnicode | Look::WordAscii => Assertion::WordBoundary,
            Look::WordUnicodeNegate | Look::WordAsciiNegate => Assertion::NotWordBoundary,
            _ => {
                return Err(CompileError::Unsupported(
                    "lookaround beyond line/text/word boundaries",
                ))
            }
        };
        let pc = self.push(Opcode::EmptyMatch(assertion));
        Ok(Frag { start: pc, holes: vec![Hole::Out(pc)] })
    }

    fn compile_concat(&mut self, subs: &[Hir]) -> Result<Frag, CompileError> {
        if subs.is_empty() {
            return Ok(self.compile_empty());
        }
        let mut frag = self.compile_hir(&subs[0])?;
        for sub in &subs[1..] {
            let next = self.compile_hir(sub)?;
            self.patch_holes(&frag.holes, next.start);
            frag = Frag { start: frag.start, holes: next.holes };
        }
        Ok(frag)
    }

    /// Builds an `n`-way priority alternation via a cascade of `Split`
    /// instructions, each emitted *before* the branch it introduces so
    /// branch `i`'s instructions land at a higher PC than the `Split` that
    /// selects it -- the ordering the simulator's priority rule (nfa.rs)
    /// relies on. `compile_one(self, i)` compiles branch `i`.
    fn compile_cascade(
        &mut self,
        n: usize,
        mut compile_one: impl FnMut(&mut Self, usize) -> Result<Frag, CompileError>,
    ) -> Result<Frag, CompileError> {
        if n == 0 {
            return Ok(self.compile_empty());
        }
        let mut prev_split: Option<Pc> = None;
        let mut entry = None;
        let mut holes = Vec::new();
        for i in 0..n {
            if i + 1 < n {
                let split_pc = self.push(Opcode::Split(0));
                if entry.is_none() {
                    entry = Some(split_pc);
                }
                if let Some(ps) = prev_split {
                    self.patch_alt(ps, split_pc);
                }
                let frag = compile_one(self, i)?;
                self.patch(split_pc, frag.start);
                holes.extend(frag.holes);
                prev_split = Some(split_pc);
            } else {
                let frag = compile_one(self, i)?;
                if let Some(ps) = prev_split {
                    self.patch_alt(ps, frag.start);
                } else {
                    entry = Some(frag.start);
                }
                holes.extend(frag.holes);
            }
        }
        Ok(Frag { start: entry.unwrap(), holes })
    }

    fn compile_repetition(&mut self, rep: &Repetition) -> Result<Frag, CompileError> {
        let min_frag = self.compile_exact_n(&rep.sub, rep.min)?;
        let tail_frag = match rep.max {
            Some(max) if max == rep.min => self.compile_empty(),
            Some(max) => self.compile_optional_cascade(&rep.sub, max - rep.min, rep.greedy)?,
            None => self.compile_unbounded_star(&rep.sub, rep.greedy)?,
        };
        self.patch_holes(&min_frag.holes, tail_frag.start);
        Ok(Frag { start: min_frag.start, holes: tail_frag.holes })
    }

    /// Compiles `sub` repeated exactly `n` times back-to-back (the
    /// mandatory prefix of `{m,n}`/`{m,}`).
    fn compile_exact_n(&mut self, sub: &Hir, n: u32) -> Result<Frag, CompileError> {
        if n == 0 {
            return Ok(self.compile_empty());
        }
        let mut frag = self.compile_hir(sub)?;
        for _ in 1..n {
            let next = self.compile_hir(sub)?;
            self.patch_holes(&frag.holes, next.start);
            frag = Frag { start: frag.start, holes: next.holes };
        }
        Ok(frag)
    }

    /// Compiles `count` additional optional copies of `sub`, nested so
    /// skipping one also skips every copy after it -- the classic
    /// `{m,n}` expansion `examples/wesleywiser-regex`'s `compile.rs` uses,
    /// adapted to this opcode set.
    ///
    /// Each level's "skip" branch is an overall exit hole (skipping level
    /// `i` also skips every level after it). Each level's body, once
    /// matched, must flow into the *next* level's split so that copy
    /// `i+1` can still optionally follow copy `i`; only the last level's
    /// body holes become overall exit holes directly, since there's
    /// nothing left to optionally try after it.
    fn compile_optional_cascade(
        &mut self,
        sub: &Hir,
        count: u32,
        greedy: bool,
    ) -> Result<Frag, CompileError> {
        if count == 0 {
            return Ok(self.compile_empty());
        }
        let mut entry = None;
        let mut holes = Vec::new();
        let mut prev_body_holes: Option<Vec<Hole>> = None;
        for i in 0..count {
            let split_pc = self.push(Opcode::Split(0));
            if entry.is_none() {
                entry = Some(split_pc);
            }
            if let Some(prev_holes) = prev_body_holes.take() {
                self.patch_holes(&prev_holes, split_pc);
            }
            let body = self.compile_hir(sub)?;
            if greedy {
                self.patch(split_pc, body.start);
                holes.push(Hole::Alt(split_pc));
            } else {
                self.patch_alt(split_pc, body.start);
                holes.push(Hole::Out(split_pc));
            }
            if i + 1 == count {
                holes.extend(body.holes);
            } else {
                prev_body_holes = Some(body.holes);
            }
        }
        Ok(Frag { start: entry.unwrap(), holes })
    }

    /// Compiles `sub*`/`sub+??`-style unbounded repetition as a
    /// self-looping `Split`.
    fn compile_unbounded_star(&mut self, sub: &Hir, greedy: bool) -> Result<Frag, CompileError> {
        let split_pc = self.push(Opcode::Split(0));
        let body = self.compile_hir(sub)?;
        self.patch_holes(&body.holes, split_pc);
        if greedy {
            self.patch(split_pc, body.start);
            Ok(Frag { start: split_pc, holes: vec![Hole::Alt(split_pc)] })
        } else {
            self.patch_alt(split_pc, body.start);
            Ok(Frag { start: split_pc, holes: vec![Hole::Out(split_pc)] })
        }
    }

    /// Appends the compiler-inserted unanchored-search prefix (spec.md
    /// §4.5/§6's `find_start`): a lazy `.*?`-equivalent loop around
    /// `start`, built from existing opcodes since this engine has no
    /// dedicated "any byte including newline" instruction. `AnyCharNotNL`
    /// handles every non-newline codepoint; the explicit `Char('\n')`
    /// branch covers the one codepoint it excludes, so the prefix can
    /// still advance across line breaks in unanchored search.
    fn push_unanchored_prefix(&mut self, start: Pc) -> Pc {
        let l0 = self.push(Opcode::Split(0)); // out: try the pattern now; alt: advance one more char
        let l1 = self.push(Opcode::Split(0)); // out: non-newline char; alt: newline
        self.patch(l0, start);
        self.patch_alt(l0, l1);

        let any_nl = self.push(Opcode::AnyCharNotNL);
        self.patch(l1, any_nl);
        self.patch(any_nl, l0);

        let nl = self.push(Opcode::Char('\n'));
        self.patch_alt(l1, nl);
        self.patch(nl, l0);

        l0
    }
}
