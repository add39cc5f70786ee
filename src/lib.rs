//! # Pascal-lite
//!
//! A Pascal-family teaching compiler targeting a stack-based virtual
//! machine descended from Wirth's P-machine.
//!
//! The [`lang`] module scans source text into tokens. The [`mach`]
//! module compiles the token stream into a linear instruction buffer
//! and executes it: a recursive-descent parser type-checks and emits
//! code in one pass, and the machine interprets the result on a value
//! stack organised into lexical activation frames, with a free store
//! behind the stack for `new`/`dispose`.
//!
//! ```
//! use pascal_lite::mach::{Compiler, Machine};
//!
//! let program = Compiler::compile(
//!     "program ten; var i: integer; begin i := 7 + 3; writeln(i) end.",
//!     false,
//! )
//! .unwrap();
//! let mut out = Vec::new();
//! Machine::default().run(&program, &mut out).unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), "10\n");
//! ```

pub mod lang;
pub mod mach;
