// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A non-backtracking, linear-time regular expression execution engine.
//!
//! This crate implements the core of a regex matcher: a Thompson-NFA
//! bytecode virtual machine (`nfa`) driven by a positioned input cursor
//! (`input`) over an immutable compiled program (`program`/`inst`), plus a
//! literal prefilter (`literal`/`boyer_moore`) that short-circuits matching
//! when the pattern has a long required substring. `compile` lowers
//! `regex-syntax`'s parsed `Hir` into the bytecode this VM runs; `engine`
//! binds the two together into the public `Engine` type.
//!
//! The scope is deliberately narrow: the surface-level regex grammar,
//! named captures, backreferences, look-around beyond line/text/word
//! boundaries, a lazy-DFA tier, and a JIT are all out of bounds. See
//! `DESIGN.md` for the grounding behind each module.
//!
//! ```
//! use thompson_regex::Engine;
//!
//! let re = Engine::new(r"([A-Za-z0-9_]+)@([A-Za-z0-9_.]+)").unwrap();
//! assert!(re.is_match("jane@example.com")); // is_match is anchored at pos 0
//! let caps = re.captures("contact: jane@example.com").unwrap();
//! assert_eq!(caps.get(1).unwrap().as_str("contact: jane@example.com"), "jane");
//! ```
//!
//! Patterns built entirely from bare full-Unicode Perl classes (`\w`, `\d`,
//! `\s` without narrowing them to ASCII) can exceed the compiler's
//! instruction budget: the opcode set (spec.md §3) has no instruction for an
//! arbitrary codepoint range, so such a class compiles to one `Char` per
//! codepoint, and `\w` alone spans tens of thousands of them. `\d` and `\s`
//! are small enough to compile fine even unscoped. Use an explicit byte
//! range (as above) or `(?-u:...)` to scope a class to ASCII.

mod bitset;
mod boyer_moore;
mod compile;
mod engine;
mod input;
mod inst;
mod literal;
mod nfa;
mod program;
mod threadset;

pub use crate::engine::{CaptureResult, Engine, Match};
pub use crate::program::CompileError;

/// Compiles `pattern`, the free-function realization of spec.md §6's
/// `compile(pattern) -> Result<Engine, CompileError>`. Equivalent to
/// `Engine::new`; both are supported since most callers reach for the
/// constructor directly.
pub fn compile(pattern: &str) -> Result<Engine, CompileError> {
    Engine::new(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_and_match_roundtrip() {
        let re = compile("a+b").unwrap();
        assert!(re.is_match("aaab"));
        assert!(!re.is_match("c"));
    }

    #[test]
    fn find_reports_match_bounds() {
        let re = compile(r"\d{3}-\d{4}").unwrap();
        let m = re.find("call 555-1234 now").unwrap();
        assert_eq!(m.as_str("call 555-1234 now"), "555-1234");
    }

    #[test]
    fn invalid_pattern_is_a_compile_error() {
        assert!(compile("(unclosed").is_err());
    }
}
