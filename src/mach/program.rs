use super::{Datum, Instr};

/// ## A compiled program
///
/// The append-only instruction buffer produced by the compiler, plus
/// the pool of global constants the machine loads at the base of its
/// stack region. Handed to the machine by reference; nothing here is
/// ever persisted.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Program {
    code: Vec<Instr>,
    consts: Vec<Datum>,
}

impl Program {
    pub fn new(code: Vec<Instr>, consts: Vec<Datum>) -> Program {
        Program { code, consts }
    }

    pub fn code(&self) -> &[Instr] {
        &self.code
    }

    pub fn consts(&self) -> &[Datum] {
        &self.consts
    }
}
