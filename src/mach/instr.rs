use super::{Datum, Level};

/// Activation-frame layout: word offsets from the frame base, as built
/// by `call`. Procedure and function frames are the same size.
pub const FRAME_BASE: usize = 0;
pub const FRAME_OLD_FP: usize = 1;
pub const FRAME_RET_ADDR: usize = 2;
pub const FRAME_RET_VAL: usize = 3;
pub const FRAME_SIZE: usize = 4;

/// ## Machine operation codes
///
/// The machine has no general registers; every operation works on the
/// value stack. `a := 3 * b` compiles to
/// `push 3; pushvar b; eval 1; mul; pushvar a; ...`; the emitter
/// documents the exact shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    // Arithmetic and logic
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Abs,
    Odd,
    And,
    Or,
    Not,
    Lt,
    Lte,
    Equ,
    Gte,
    Gt,
    Neq,

    // Numeric conversion
    Itor,
    Itor2,
    Round,
    Trunc,

    // Math library; integer operands promote to real
    Sin,
    Atan,
    Exp,
    Log,
    Sqr,
    Sqrt,

    // Ordinal step with limit check
    Pred,
    Succ,

    // Stack control
    Dup,
    Pop,
    Push,
    PushVar,
    Eval,
    Assign,

    // Sub-range checks; the checked value stays on the stack
    LLimit,
    ULimit,

    // Control flow
    Jump,
    Jneq,
    Call,
    Enter,
    Ret,
    RetF,
    Halt,

    // I/O
    Write,
    Writeln,

    // Free store
    New,
    Dispose,
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use OpCode::*;
        let name = match self {
            Neg => "neg",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Rem => "rem",
            Abs => "abs",
            Odd => "odd",
            And => "and",
            Or => "or",
            Not => "not",
            Lt => "lt",
            Lte => "lte",
            Equ => "equ",
            Gte => "gte",
            Gt => "gt",
            Neq => "neq",
            Itor => "itor",
            Itor2 => "itor2",
            Round => "round",
            Trunc => "trunc",
            Sin => "sin",
            Atan => "atan",
            Exp => "exp",
            Log => "log",
            Sqr => "sqr",
            Sqrt => "sqrt",
            Pred => "pred",
            Succ => "succ",
            Dup => "dup",
            Pop => "pop",
            Push => "push",
            PushVar => "pushvar",
            Eval => "eval",
            Assign => "assign",
            LLimit => "llimit",
            ULimit => "ulimit",
            Jump => "jump",
            Jneq => "jneq",
            Call => "call",
            Enter => "enter",
            Ret => "ret",
            RetF => "retf",
            Halt => "halt",
            Write => "write",
            Writeln => "writeln",
            New => "new",
            Dispose => "dispose",
        };
        f.pad(name)
    }
}

/// ## An instruction
///
/// `level` is used only by the frame-relative opcodes (`pushvar`,
/// `call`); `addr` is a constant, frame offset, or code address
/// depending on the opcode. Patch-back rewrites only `addr`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instr {
    pub op: OpCode,
    pub level: Level,
    pub addr: Datum,
}

impl Instr {
    pub fn new(op: OpCode) -> Instr {
        Instr {
            op,
            level: 0,
            addr: Datum::Integer(0),
        }
    }

    pub fn value(op: OpCode, addr: impl Into<Datum>) -> Instr {
        Instr {
            op,
            level: 0,
            addr: addr.into(),
        }
    }

    pub fn frame(op: OpCode, level: Level, addr: impl Into<Datum>) -> Instr {
        Instr {
            op,
            level,
            addr: addr.into(),
        }
    }
}

impl std::fmt::Display for Instr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use OpCode::*;
        match self.op {
            // frame-relative: "op level, addr"
            PushVar | Call => write!(f, "{:8}{}, {}", self.op, self.level, self.addr),
            // operand-carrying: "op ,addr"
            Push | Pop | Eval | Assign | Pred | Succ | LLimit | ULimit | Jump | Jneq | Enter
            | Ret | RetF => write!(f, "{:8},{}", self.op, self.addr),
            _ => write!(f, "{}", self.op),
        }
    }
}
