use super::instr::{FRAME_OLD_FP, FRAME_RET_ADDR, FRAME_RET_VAL, FRAME_SIZE};
use super::{Address, Datum, FreeStore, Instr, OpCode, Program};
use std::io::Write;

/// How a run can end, other than normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    DivideByZero,
    BadFetch,
    BadDataType,
    UnknownInstr,
    StackOverflow,
    StackUnderflow,
    FreeStoreError,
    OutOfRange,
    /// The machine executed `halt`; [`Machine::run`] reports this as
    /// plain success.
    Halted,
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Fault::*;
        let s = match self {
            DivideByZero => "divide by zero",
            BadFetch => "attempt to fetch beyond the program",
            BadDataType => "wrong data type for operation",
            UnknownInstr => "undefined instruction",
            StackOverflow => "stack overflow",
            StackUnderflow => "stack underflow",
            FreeStoreError => "free store error",
            OutOfRange => "out of range",
            Halted => "halted",
        };
        write!(f, "{}", s)
    }
}

type Result<T> = std::result::Result<T, Fault>;

/// ## The P machine
///
/// A fetch-decode-execute interpreter over a single data segment of
/// datums, partitioned at construction into a stack region and a heap
/// region behind it. The stack holds activation frames linked by
/// static and dynamic links; `base(l)` walks `l` static links to find
/// an enclosing scope's frame.
///
/// Execution starts at instruction 0 with an outermost frame whose
/// return address is the program's sentinel `halt`; when the program
/// block returns, the machine fetches the sentinel and stops.
pub struct Machine {
    stack_size: usize,
    heap_size: usize,
    code: Vec<Instr>,
    data: Vec<Datum>,
    heap: FreeStore,
    pc: Address,
    prev_pc: Address,
    fp: Address,
    sp: Address,
    ir: Instr,
    trace: bool,
    ncycles: usize,
}

impl Default for Machine {
    fn default() -> Machine {
        Machine::new(1024, 3 * 1024)
    }
}

impl Machine {
    /// A machine with the given stack and heap region sizes, in datums.
    pub fn new(stack_size: usize, heap_size: usize) -> Machine {
        Machine {
            stack_size,
            heap_size,
            code: vec![],
            data: vec![Datum::Integer(0); stack_size + heap_size],
            heap: FreeStore::new(stack_size, heap_size),
            pc: 0,
            prev_pc: 0,
            fp: 0,
            sp: 0,
            ir: Instr::new(OpCode::Halt),
            trace: false,
            ncycles: 0,
        }
    }

    /// Print each instruction to standard error as it executes.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Machine cycles run since the last reset.
    pub fn cycles(&self) -> usize {
        self.ncycles
    }

    /// Load a program and run it to completion, writing `write`/
    /// `writeln` output to `out`. The first fault ends the run; a
    /// normal `halt` is `Ok`.
    pub fn run(&mut self, program: &Program, out: &mut dyn Write) -> Result<()> {
        self.reset(program);
        loop {
            match self.step(out) {
                Ok(()) => {}
                Err(Fault::Halted) => return Ok(()),
                Err(fault) => return Err(fault),
            }
        }
    }

    /// Reset to the initial state: global constants at the base of the
    /// stack region, the outermost frame above them, pc at 0.
    fn reset(&mut self, program: &Program) {
        self.code = program.code().to_vec();
        self.data = vec![Datum::Integer(0); self.stack_size + self.heap_size];
        self.heap = FreeStore::new(self.stack_size, self.heap_size);
        for (i, d) in program.consts().iter().enumerate() {
            if i < self.stack_size {
                self.data[i] = *d;
            }
        }
        let base = program.consts().len().min(self.stack_size);
        self.fp = base;
        self.sp = base + FRAME_SIZE;
        // Returning from the program block fetches the sentinel halt.
        self.data[base + FRAME_RET_ADDR] = Datum::Integer(self.code.len().saturating_sub(1) as i64);
        self.pc = 0;
        self.prev_pc = 0;
        self.ncycles = 0;
    }

    /// Fetch, decode, execute one instruction.
    fn step(&mut self, out: &mut dyn Write) -> Result<()> {
        self.prev_pc = self.pc;
        self.ir = *self.code.get(self.pc).ok_or(Fault::BadFetch)?;
        self.pc += 1;
        if self.trace {
            eprintln!("{:5}: {}", self.prev_pc, self.ir);
        }
        self.dispatch(out)?;
        self.ncycles += 1;
        debug_assert!(self.sp <= self.stack_size + self.heap_size);
        debug_assert!(self.fp == 0 || self.fp + 3 <= self.sp);
        Ok(())
    }

    // *** Register and stack plumbing

    /// Walk `lvl` static links from the current frame.
    fn base(&self, lvl: usize) -> Result<Address> {
        let mut b = self.fp;
        for _ in 0..lvl {
            b = self
                .data
                .get(b)
                .copied()
                .and_then(Datum::address)
                .ok_or(Fault::BadDataType)?;
        }
        Ok(b)
    }

    fn push(&mut self, d: Datum) -> Result<()> {
        if self.sp >= self.stack_size {
            return Err(Fault::StackOverflow);
        }
        self.data[self.sp] = d;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Datum> {
        if self.sp == 0 {
            return Err(Fault::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.data[self.sp])
    }

    fn top(&mut self) -> Result<&mut Datum> {
        if self.sp == 0 {
            return Err(Fault::StackUnderflow);
        }
        Ok(&mut self.data[self.sp - 1])
    }

    /// Is `[begin, end)` inside the data segment?
    fn range_check(&self, begin: Address, end: Address) -> Result<()> {
        if begin <= end && end <= self.data.len() {
            Ok(())
        } else {
            Err(Fault::StackOverflow)
        }
    }

    /// The instruction operand as a non-negative count or address.
    fn operand(&self) -> Result<usize> {
        self.ir.addr.address().ok_or(Fault::BadDataType)
    }

    // *** Operation groups

    fn binary_num(&mut self, fi: fn(i64, i64) -> i64, fr: fn(f64, f64) -> f64) -> Result<()> {
        use Datum::*;
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let value = match (lhs, rhs) {
            (Integer(l), Integer(r)) => Integer(fi(l, r)),
            (Real(l), Real(r)) => Real(fr(l, r)),
            (Integer(l), Real(r)) => Real(fr(l as f64, r)),
            (Real(l), Integer(r)) => Real(fr(l, r as f64)),
            _ => return Err(Fault::BadDataType),
        };
        self.push(value)
    }

    fn divide(&mut self, remainder: bool) -> Result<()> {
        use Datum::*;
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let value = match (lhs, rhs) {
            (Integer(l), Integer(r)) => {
                if r == 0 {
                    return Err(Fault::DivideByZero);
                }
                if remainder {
                    Integer(l.wrapping_rem(r))
                } else {
                    Integer(l.wrapping_div(r))
                }
            }
            (l, r) => {
                let l = l.real().ok_or(Fault::BadDataType)?;
                let r = r.real().ok_or(Fault::BadDataType)?;
                if r == 0.0 {
                    return Err(Fault::DivideByZero);
                }
                if remainder {
                    Real(l % r)
                } else {
                    Real(l / r)
                }
            }
        };
        self.push(value)
    }

    fn compare(&mut self, fi: fn(i64, i64) -> bool, fr: fn(f64, f64) -> bool) -> Result<()> {
        use Datum::*;
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let value = match (lhs, rhs) {
            (Real(_), _) | (_, Real(_)) => {
                let l = lhs.real().ok_or(Fault::BadDataType)?;
                let r = rhs.real().ok_or(Fault::BadDataType)?;
                fr(l, r)
            }
            _ => {
                let l = lhs.ordinal().ok_or(Fault::BadDataType)?;
                let r = rhs.ordinal().ok_or(Fault::BadDataType)?;
                fi(l, r)
            }
        };
        self.push(Datum::Boolean(value))
    }

    fn logic(&mut self, f: fn(bool, bool) -> bool) -> Result<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        match (lhs, rhs) {
            (Datum::Boolean(l), Datum::Boolean(r)) => self.push(Datum::Boolean(f(l, r))),
            _ => Err(Fault::BadDataType),
        }
    }

    fn math(&mut self, f: fn(f64) -> f64) -> Result<()> {
        // Integer operands promote silently.
        let v = self.pop()?.real().ok_or(Fault::BadDataType)?;
        self.push(Datum::Real(f(v)))
    }

    /// Step an ordinal datum by ±1, keeping its kind.
    fn ordinal_step(d: Datum, by: i64) -> Result<Datum> {
        use Datum::*;
        match d {
            Integer(n) => Ok(Integer(n.wrapping_add(by))),
            Boolean(b) => Ok(Boolean(b as i64 + by == 1)),
            Character(c) => match char::from_u32((c as i64 + by) as u32) {
                Some(c) => Ok(Character(c)),
                None => Err(Fault::OutOfRange),
            },
            Real(_) => Err(Fault::BadDataType),
        }
    }

    // *** Individual operations

    fn pred(&mut self) -> Result<()> {
        let limit = self.ir.addr.ordinal().ok_or(Fault::BadDataType)?;
        let v = *self.top()?;
        let o = v.ordinal().ok_or(Fault::BadDataType)?;
        if o <= limit {
            return Err(Fault::OutOfRange);
        }
        *self.top()? = Machine::ordinal_step(v, -1)?;
        Ok(())
    }

    fn succ(&mut self) -> Result<()> {
        let limit = self.ir.addr.ordinal().ok_or(Fault::BadDataType)?;
        let v = *self.top()?;
        let o = v.ordinal().ok_or(Fault::BadDataType)?;
        if o >= limit {
            return Err(Fault::OutOfRange);
        }
        *self.top()? = Machine::ordinal_step(v, 1)?;
        Ok(())
    }

    fn llimit(&mut self) -> Result<()> {
        let limit = self.ir.addr.ordinal().ok_or(Fault::BadDataType)?;
        let o = self.top()?.ordinal().ok_or(Fault::BadDataType)?;
        if o < limit {
            Err(Fault::OutOfRange)
        } else {
            Ok(())
        }
    }

    fn ulimit(&mut self) -> Result<()> {
        let limit = self.ir.addr.ordinal().ok_or(Fault::BadDataType)?;
        let o = self.top()?.ordinal().ok_or(Fault::BadDataType)?;
        if o > limit {
            Err(Fault::OutOfRange)
        } else {
            Ok(())
        }
    }

    fn pushvar(&mut self) -> Result<()> {
        let offset = match self.ir.addr {
            Datum::Integer(n) => n,
            _ => return Err(Fault::BadDataType),
        };
        let addr = self.base(self.ir.level)? as i64 + offset;
        if addr < 0 || addr as usize >= self.data.len() {
            return Err(Fault::StackOverflow);
        }
        self.push(Datum::Integer(addr))
    }

    fn eval(&mut self) -> Result<()> {
        let n = self.operand()?;
        let addr = self.pop()?.address().ok_or(Fault::BadDataType)?;
        self.range_check(addr, addr + n)?;
        for i in 0..n {
            let d = self.data[addr + i];
            self.push(d)?;
        }
        Ok(())
    }

    fn assign(&mut self) -> Result<()> {
        let n = self.operand()?;
        if self.sp < n + 1 {
            return Err(Fault::StackUnderflow);
        }
        let addr = self.data[self.sp - n - 1]
            .address()
            .ok_or(Fault::BadDataType)?;
        self.range_check(addr, addr + n)?;
        for i in 0..n {
            self.data[addr + i] = self.data[self.sp - n + i];
        }
        self.sp -= n + 1;
        Ok(())
    }

    fn jump(&mut self) -> Result<()> {
        self.pc = self.ir.addr.address().ok_or(Fault::BadFetch)?;
        Ok(())
    }

    fn jneq(&mut self) -> Result<()> {
        match self.pop()? {
            Datum::Boolean(true) => Ok(()),
            Datum::Boolean(false) => self.jump(),
            _ => Err(Fault::BadDataType),
        }
    }

    fn call(&mut self) -> Result<()> {
        let target = self.ir.addr.address().ok_or(Fault::BadFetch)?;
        let static_base = self.base(self.ir.level)?;
        let frame = self.sp;
        self.push(Datum::Integer(static_base as i64))?;
        self.push(Datum::Integer(self.fp as i64))?;
        self.push(Datum::Integer(self.pc as i64))?;
        self.push(Datum::Integer(0))?; // return slot
        self.fp = frame;
        self.pc = target;
        Ok(())
    }

    fn enter(&mut self) -> Result<()> {
        let n = self.operand()?;
        if self.sp + n > self.stack_size {
            return Err(Fault::StackOverflow);
        }
        for i in self.sp..self.sp + n {
            self.data[i] = Datum::Integer(0);
        }
        self.sp += n;
        Ok(())
    }

    /// Unlink the frame: restore pc and fp, discard the frame and `p`
    /// parameter datums.
    fn ret(&mut self) -> Result<()> {
        let p = self.operand()?;
        let frame = self.fp;
        self.range_check(frame, frame + FRAME_SIZE)?;
        if frame < p {
            return Err(Fault::StackUnderflow);
        }
        self.pc = self.data[frame + FRAME_RET_ADDR]
            .address()
            .ok_or(Fault::BadFetch)?;
        self.fp = self.data[frame + FRAME_OLD_FP]
            .address()
            .ok_or(Fault::BadDataType)?;
        self.sp = frame - p;
        Ok(())
    }

    /// `ret`, then leave the function's return-slot value on the stack.
    fn retf(&mut self) -> Result<()> {
        let frame = self.fp;
        self.range_check(frame, frame + FRAME_SIZE)?;
        let value = self.data[frame + FRAME_RET_VAL];
        self.ret()?;
        self.push(value)
    }

    /// Pop `(value, width, precision)` triples, count on top, and write
    /// them in source order.
    fn write_args(&mut self, out: &mut dyn Write) -> Result<()> {
        let count = self.pop()?.address().ok_or(Fault::BadDataType)?;
        let need = count.checked_mul(3).ok_or(Fault::StackUnderflow)?;
        if need > self.sp {
            return Err(Fault::StackUnderflow);
        }
        let start = self.sp - need;
        for i in 0..count {
            let value = self.data[start + 3 * i];
            let width = self.data[start + 3 * i + 1].address().unwrap_or(0);
            let precision = self.data[start + 3 * i + 2].address().unwrap_or(0);
            let _ = value.write(out, width, precision);
        }
        self.sp = start;
        Ok(())
    }

    fn new_store(&mut self) -> Result<()> {
        let n = self.pop()?.address().ok_or(Fault::BadDataType)?;
        // Zero on failure; the program sees a nil pointer.
        match self.heap.alloc(n) {
            Some(addr) => self.push(Datum::Integer(addr as i64)),
            None => self.push(Datum::Integer(0)),
        }
    }

    fn dispose(&mut self) -> Result<()> {
        let addr = self.pop()?.address().ok_or(Fault::BadDataType)?;
        if addr < self.stack_size {
            return Err(Fault::FreeStoreError);
        }
        self.heap.free(addr).map_err(|_| Fault::FreeStoreError)
    }

    fn dispatch(&mut self, out: &mut dyn Write) -> Result<()> {
        use OpCode::*;
        match self.ir.op {
            Neg => {
                let v = self.top()?;
                *v = match *v {
                    Datum::Integer(n) => Datum::Integer(n.wrapping_neg()),
                    Datum::Real(n) => Datum::Real(-n),
                    _ => return Err(Fault::BadDataType),
                };
                Ok(())
            }
            Add => self.binary_num(i64::wrapping_add, |l, r| l + r),
            Sub => self.binary_num(i64::wrapping_sub, |l, r| l - r),
            Mul => self.binary_num(i64::wrapping_mul, |l, r| l * r),
            Div => self.divide(false),
            Rem => self.divide(true),
            Abs => {
                let v = self.top()?;
                *v = match *v {
                    Datum::Integer(n) => Datum::Integer(n.wrapping_abs()),
                    Datum::Real(n) => Datum::Real(n.abs()),
                    _ => return Err(Fault::BadDataType),
                };
                Ok(())
            }
            Odd => {
                let v = self.top()?;
                *v = match *v {
                    Datum::Integer(n) => Datum::Boolean(n & 1 != 0),
                    _ => return Err(Fault::BadDataType),
                };
                Ok(())
            }
            And => self.logic(|l, r| l && r),
            Or => self.logic(|l, r| l || r),
            Not => {
                let v = self.top()?;
                *v = match *v {
                    Datum::Boolean(b) => Datum::Boolean(!b),
                    _ => return Err(Fault::BadDataType),
                };
                Ok(())
            }
            Lt => self.compare(|l, r| l < r, |l, r| l < r),
            Lte => self.compare(|l, r| l <= r, |l, r| l <= r),
            Equ => self.compare(|l, r| l == r, |l, r| l == r),
            Gte => self.compare(|l, r| l >= r, |l, r| l >= r),
            Gt => self.compare(|l, r| l > r, |l, r| l > r),
            Neq => self.compare(|l, r| l != r, |l, r| l != r),
            Itor => {
                let v = self.top()?;
                *v = match *v {
                    Datum::Integer(n) => Datum::Real(n as f64),
                    _ => return Err(Fault::BadDataType),
                };
                Ok(())
            }
            Itor2 => {
                if self.sp < 2 {
                    return Err(Fault::StackUnderflow);
                }
                let v = &mut self.data[self.sp - 2];
                *v = match *v {
                    Datum::Integer(n) => Datum::Real(n as f64),
                    _ => return Err(Fault::BadDataType),
                };
                Ok(())
            }
            Round => {
                let v = self.top()?;
                *v = match *v {
                    Datum::Real(n) => Datum::Integer(n.round() as i64),
                    _ => return Err(Fault::BadDataType),
                };
                Ok(())
            }
            Trunc => {
                let v = self.top()?;
                *v = match *v {
                    Datum::Real(n) => Datum::Integer(n.trunc() as i64),
                    _ => return Err(Fault::BadDataType),
                };
                Ok(())
            }
            Sin => self.math(f64::sin),
            Atan => self.math(f64::atan),
            Exp => self.math(f64::exp),
            Log => self.math(f64::ln),
            Sqr => self.math(|v| v * v),
            Sqrt => self.math(f64::sqrt),
            Pred => self.pred(),
            Succ => self.succ(),
            Dup => {
                let v = *self.top()?;
                self.push(v)
            }
            Pop => {
                let n = self.operand()?;
                if n > self.sp {
                    return Err(Fault::StackUnderflow);
                }
                self.sp -= n;
                Ok(())
            }
            Push => {
                let v = self.ir.addr;
                self.push(v)
            }
            PushVar => self.pushvar(),
            Eval => self.eval(),
            Assign => self.assign(),
            LLimit => self.llimit(),
            ULimit => self.ulimit(),
            Jump => self.jump(),
            Jneq => self.jneq(),
            Call => self.call(),
            Enter => self.enter(),
            Ret => self.ret(),
            RetF => self.retf(),
            Halt => Err(Fault::Halted),
            Write => self.write_args(out),
            Writeln => {
                self.write_args(out)?;
                let _ = writeln!(out);
                Ok(())
            }
            New => self.new_store(),
            Dispose => self.dispose(),
        }
    }
}
