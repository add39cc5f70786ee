use super::instr::FRAME_RET_VAL;
use super::symbol::{SymKind, SymValue, SymbolTable};
use super::types::{Field, SubRange, TypeDesc, TypeId, Types};
use super::{Address, Datum, Instr, Level, OpCode, Program};
use crate::lang::{Error, Token, TokenStream};

/// ## The Pascal-lite compiler
///
/// A recursive-descent parser that type-checks and emits machine code
/// in a single pass over the token stream. Productions mirror the
/// grammar; each expression production returns the type of the value
/// its emitted code leaves on the stack.
///
/// Errors are collected and parsing continues: syntactic errors advance
/// one token, semantic errors none. Emission also continues, but a
/// program compiled with errors is not meant to be executed.
pub struct Compiler<'a> {
    ts: TokenStream<'a>,
    symtbl: SymbolTable,
    types: Types,
    code: Vec<Instr>,
    consts: Vec<Datum>,
    errors: Vec<Error>,
    verbose: bool,
}

impl<'a> Compiler<'a> {
    /// Compile a whole source text. `Err` carries every diagnostic
    /// found; the error count is the compiler's exit status.
    pub fn compile(source: &'a str, verbose: bool) -> Result<Program, Vec<Error>> {
        let mut comp = Compiler::new(source, verbose);
        comp.prog_decl();
        if comp.errors.is_empty() {
            Ok(Program::new(comp.code, comp.consts))
        } else {
            Err(comp.errors)
        }
    }

    fn new(source: &'a str, verbose: bool) -> Compiler<'a> {
        let mut symtbl = SymbolTable::new();

        // Built-in type names, and the built-in constants; all at the
        // outermost level so any block may shadow them.
        symtbl.insert("integer", SymValue::type_def(0, Types::INTEGER));
        symtbl.insert("real", SymValue::type_def(0, Types::REAL));
        symtbl.insert("boolean", SymValue::type_def(0, Types::BOOLEAN));
        symtbl.insert("char", SymValue::type_def(0, Types::CHARACTER));
        symtbl.insert(
            "maxint",
            SymValue::constant(0, Datum::Integer(i64::MAX), Types::INTEGER),
        );
        symtbl.insert("nil", SymValue::constant(0, Datum::Integer(0), Types::NIL));
        symtbl.insert(
            "true",
            SymValue::constant(0, Datum::Boolean(true), Types::BOOLEAN),
        );
        symtbl.insert(
            "false",
            SymValue::constant(0, Datum::Boolean(false), Types::BOOLEAN),
        );

        Compiler {
            ts: TokenStream::new(source),
            symtbl,
            types: Types::new(),
            code: vec![],
            consts: vec![],
            errors: vec![],
            verbose,
        }
    }

    // *** Token primitives

    fn current(&self) -> &Token {
        self.ts.current()
    }

    fn next(&mut self) {
        self.ts.next();
    }

    fn peek(&self, token: &Token) -> bool {
        self.current().is_kind(token)
    }

    fn one_of(&self, stops: &[Token]) -> bool {
        stops.iter().any(|t| self.current().is_kind(t))
    }

    fn accept(&mut self, token: &Token) -> bool {
        if self.current().is_kind(token) {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> bool {
        if self.accept(token) {
            return true;
        }
        let msg = format!("expected {}, got {}", token, self.current());
        self.error(msg);
        self.next();
        false
    }

    /// Read an identifier; a syntactic error otherwise.
    fn name_ref(&mut self) -> Option<String> {
        if let Token::Identifier(id) = self.current() {
            let id = id.clone();
            self.next();
            return Some(id);
        }
        let msg = format!("expected an identifier, got {}", self.current());
        self.error(msg);
        self.next();
        None
    }

    // *** Diagnostics

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(Error::new(self.ts.line(), message));
    }

    fn error_id(&mut self, message: &str, id: &str) {
        let msg = format!("{} '{}'", message, id);
        self.error(msg);
    }

    fn warning(&self, message: &str) {
        eprintln!("p: warning: {} near line {}", message, self.ts.line());
    }

    fn note(&self, message: String) {
        if self.verbose {
            println!("p: {}", message);
        }
    }

    // *** Emitter

    fn push(&mut self, instr: Instr) -> Address {
        self.code.push(instr);
        self.code.len() - 1
    }

    fn emit(&mut self, op: OpCode) -> Address {
        self.push(Instr::new(op))
    }

    fn emit_value(&mut self, op: OpCode, addr: impl Into<Datum>) -> Address {
        self.push(Instr::value(op, addr))
    }

    fn emit_frame(&mut self, op: OpCode, level: Level, addr: impl Into<Datum>) -> Address {
        self.push(Instr::frame(op, level, addr))
    }

    /// Resolve a forward branch: point `at` to the given target.
    fn patch_to(&mut self, at: Address, target: Address) {
        self.note(format!("patching address at {} to {}", at, target));
        self.code[at].addr = Datum::Integer(target as i64);
    }

    /// Resolve a forward branch to the next instruction emitted.
    fn patch(&mut self, at: Address) {
        self.patch_to(at, self.code.len());
    }

    // *** Symbol helpers

    /// Innermost visible binding; "undefined identifier" otherwise.
    fn lookup(&mut self, id: &str) -> Option<SymValue> {
        match self.symtbl.lookup(id) {
            Some(entry) => Some(entry.clone()),
            None => {
                self.error_id("undefined identifier", id);
                None
            }
        }
    }

    /// Bind a new name; "previously defined" when the level already has
    /// one.
    fn define(&mut self, id: &str, value: SymValue) {
        if !self.symtbl.insert(id, value) {
            self.error_id("previously defined", id);
        }
    }

    // *** Types

    fn same_class(&self, lhs: TypeId, rhs: TypeId) -> bool {
        std::mem::discriminant(self.types.get(lhs)) == std::mem::discriminant(self.types.get(rhs))
    }

    /// Promote binary operands: a mixed integer/real pair converts the
    /// integer side to real.
    fn promote(&mut self, lhs: TypeId, rhs: TypeId) -> TypeId {
        if self.same_class(lhs, rhs) {
            lhs
        } else if self.types.is_integer(lhs) && self.types.is_real(rhs) {
            self.emit(OpCode::Itor2);
            rhs
        } else if self.types.is_real(lhs) && self.types.is_integer(rhs) {
            self.emit(OpCode::Itor);
            lhs
        } else {
            self.error("incompatible binary types");
            lhs
        }
    }

    /// Promote the right-hand side of an assignment to the type of the
    /// left, then bounds-check ordinal targets whose range could be
    /// exceeded. Real to integer narrows with a warning and a `round`.
    fn assign_promote(&mut self, lhs: TypeId, rhs: TypeId) {
        if self.same_class(lhs, rhs) {
            if !self.types.compatible(lhs, rhs) {
                self.error("incompatible assignment types");
            }
        } else if self.types.is_integer(lhs) && self.types.is_real(rhs) {
            self.warning("rounding real to fit in an integer");
            self.emit(OpCode::Round);
        } else if self.types.is_real(lhs) && self.types.is_integer(rhs) {
            self.emit(OpCode::Itor);
        } else {
            self.error("incompatible assignment types");
        }

        if let Some(range) = self.types.range(lhs) {
            if range != SubRange::MAX {
                self.emit_value(OpCode::LLimit, range.minimum());
                self.emit_value(OpCode::ULimit, range.maximum());
            }
        }
    }

    // *** Expressions

    /// ident | ident '(' expr-list ')'
    fn ident_factor(&mut self, level: Level, id: &str) -> TypeId {
        let entry = match self.lookup(id) {
            Some(entry) => entry,
            None => return Types::INTEGER,
        };
        match entry.kind() {
            SymKind::Constant => {
                self.emit_value(OpCode::Push, entry.value());
                entry.typ()
            }
            SymKind::Variable => {
                let typ = self.variable(level, &entry);
                self.emit_value(OpCode::Eval, self.types.size(typ));
                typ
            }
            SymKind::Function => {
                self.call_statement(level, &entry, id);
                entry.typ()
            }
            _ => {
                self.error_id("identifier is not a constant, variable or function", id);
                Types::INTEGER
            }
        }
    }

    /// A parenthesised argument for the built-in functions.
    fn built_in_arg(&mut self, level: Level) -> TypeId {
        self.expect(&Token::OpenParen);
        let typ = self.expression(level);
        self.expect(&Token::CloseParen);
        typ
    }

    /// The built-in function factors. Math-library calls on an integer
    /// produce a real; the machine promotes the operand itself.
    fn built_in_func(&mut self, level: Level) -> TypeId {
        use Token::*;
        if self.accept(&Round) {
            let typ = self.built_in_arg(level);
            if !self.types.is_real(typ) {
                let msg = format!("expected a real value, got {}", self.types.name(typ));
                self.error(msg);
            }
            self.emit(OpCode::Round);
            Types::INTEGER
        } else if self.accept(&Trunc) {
            let typ = self.built_in_arg(level);
            if !self.types.is_real(typ) {
                let msg = format!("expected a real value, got {}", self.types.name(typ));
                self.error(msg);
            }
            self.emit(OpCode::Trunc);
            Types::INTEGER
        } else if self.accept(&Abs) {
            let typ = self.built_in_arg(level);
            if !self.types.is_integer(typ) && !self.types.is_real(typ) {
                let msg = format!("expected an integer or real value, got {}", self.types.name(typ));
                self.error(msg);
            }
            self.emit(OpCode::Abs);
            typ
        } else if self.accept(&Odd) {
            let typ = self.built_in_arg(level);
            if !self.types.is_integer(typ) {
                let msg = format!("expected an integer value, got {}", self.types.name(typ));
                self.error(msg);
            }
            self.emit(OpCode::Odd);
            Types::BOOLEAN
        } else if self.accept(&Pred) {
            let typ = self.built_in_arg(level);
            let min = match self.types.range(typ) {
                Some(range) => range.minimum(),
                None => {
                    let msg = format!("expected an ordinal value, got {}", self.types.name(typ));
                    self.error(msg);
                    0
                }
            };
            self.emit_value(OpCode::Pred, min);
            typ
        } else if self.accept(&Succ) {
            let typ = self.built_in_arg(level);
            let max = match self.types.range(typ) {
                Some(range) => range.maximum(),
                None => {
                    let msg = format!("expected an ordinal value, got {}", self.types.name(typ));
                    self.error(msg);
                    0
                }
            };
            self.emit_value(OpCode::Succ, max);
            typ
        } else if self.accept(&Ord) {
            let typ = self.built_in_arg(level);
            if !self.types.is_ordinal(typ) {
                let msg = format!("expected an ordinal value, got {}", self.types.name(typ));
                self.error(msg);
            }
            Types::INTEGER
        } else if self.accept(&Sin) {
            self.math_func(level, OpCode::Sin)
        } else if self.accept(&Atan) {
            self.math_func(level, OpCode::Atan)
        } else if self.accept(&Exp) {
            self.math_func(level, OpCode::Exp)
        } else if self.accept(&Log) {
            self.math_func(level, OpCode::Log)
        } else if self.accept(&Sqr) {
            self.math_func(level, OpCode::Sqr)
        } else if self.accept(&Sqrt) {
            self.math_func(level, OpCode::Sqrt)
        } else {
            let msg = format!("expected a factor, got {}", self.current());
            self.error(msg);
            self.next();
            Types::INTEGER
        }
    }

    fn math_func(&mut self, level: Level, op: OpCode) -> TypeId {
        let typ = self.built_in_arg(level);
        if !self.types.is_integer(typ) && !self.types.is_real(typ) {
            let msg = format!("expected an integer or real value, got {}", self.types.name(typ));
            self.error(msg);
        }
        self.emit(op);
        Types::REAL
    }

    /// ident | number | string | '(' expr ')' | 'not' factor | built-in
    fn factor(&mut self, level: Level) -> TypeId {
        match self.current().clone() {
            Token::Identifier(id) => {
                self.next();
                self.ident_factor(level, &id)
            }
            Token::IntegerNum(n) => {
                self.next();
                self.emit_value(OpCode::Push, n);
                Types::INTEGER
            }
            Token::RealNum(n) => {
                self.next();
                self.emit_value(OpCode::Push, n);
                Types::REAL
            }
            Token::StringLit(s) => {
                self.next();
                self.string_literal(&s)
            }
            Token::OpenParen => {
                self.next();
                let typ = self.expression(level);
                self.expect(&Token::CloseParen);
                typ
            }
            Token::Not => {
                self.next();
                let typ = self.factor(level);
                self.emit(OpCode::Not);
                typ
            }
            _ => self.built_in_func(level),
        }
    }

    /// A one-character literal is a `char` pushed by its ordinal value;
    /// anything longer is an array of char, one push per character.
    fn string_literal(&mut self, s: &str) -> TypeId {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            self.emit_value(OpCode::Push, c as i64);
            return Types::CHARACTER;
        }
        for c in s.chars() {
            self.emit_value(OpCode::Push, c as i64);
        }
        let count = s.chars().count() as i64;
        let index = self.types.sub_range(0, count - 1);
        self.types.array(index, Types::CHARACTER)
    }

    /// factor { ( '*' | '/' | 'mod' | 'and' ) factor }
    fn term(&mut self, level: Level) -> TypeId {
        let mut lhs = self.factor(level);
        loop {
            if self.accept(&Token::Multiply) {
                let rhs = self.factor(level);
                lhs = self.promote(lhs, rhs);
                self.emit(OpCode::Mul);
            } else if self.accept(&Token::Divide) {
                let rhs = self.factor(level);
                lhs = self.promote(lhs, rhs);
                self.emit(OpCode::Div);
            } else if self.accept(&Token::Mod) {
                let rhs = self.factor(level);
                lhs = self.promote(lhs, rhs);
                self.emit(OpCode::Rem);
            } else if self.accept(&Token::And) {
                let rhs = self.factor(level);
                lhs = self.promote(lhs, rhs);
                self.emit(OpCode::And);
            } else {
                break;
            }
        }
        lhs
    }

    /// [ '+' | '-' ] term
    fn unary(&mut self, level: Level) -> TypeId {
        if self.accept(&Token::Add) {
            self.term(level)
        } else if self.accept(&Token::Subtract) {
            let typ = self.term(level);
            self.emit(OpCode::Neg);
            typ
        } else {
            self.term(level)
        }
    }

    /// unary { ( '+' | '-' | 'or' ) unary }
    fn simple_expr(&mut self, level: Level) -> TypeId {
        let mut lhs = self.unary(level);
        loop {
            if self.accept(&Token::Add) {
                let rhs = self.unary(level);
                lhs = self.promote(lhs, rhs);
                self.emit(OpCode::Add);
            } else if self.accept(&Token::Subtract) {
                let rhs = self.unary(level);
                lhs = self.promote(lhs, rhs);
                self.emit(OpCode::Sub);
            } else if self.accept(&Token::Or) {
                let rhs = self.unary(level);
                lhs = self.promote(lhs, rhs);
                self.emit(OpCode::Or);
            } else {
                break;
            }
        }
        lhs
    }

    /// simple-expr { relop simple-expr }; a comparison is boolean.
    fn expression(&mut self, level: Level) -> TypeId {
        let mut lhs = self.simple_expr(level);
        loop {
            let op = if self.accept(&Token::LTE) {
                OpCode::Lte
            } else if self.accept(&Token::LT) {
                OpCode::Lt
            } else if self.accept(&Token::GT) {
                OpCode::Gt
            } else if self.accept(&Token::GTE) {
                OpCode::Gte
            } else if self.accept(&Token::EQU) {
                OpCode::Equ
            } else if self.accept(&Token::NEQ) {
                OpCode::Neq
            } else {
                break;
            };
            let rhs = self.simple_expr(level);
            self.promote(lhs, rhs);
            self.emit(op);
            lhs = Types::BOOLEAN;
        }
        lhs
    }

    /// [ '+' | '-' ] number | constant identifier
    fn const_expr(&mut self) -> Option<(Datum, TypeId)> {
        let mut sign = 1i64;
        if self.accept(&Token::Add) {
            // unary plus is ignored
        } else if self.accept(&Token::Subtract) {
            sign = -1;
        }
        match self.current().clone() {
            Token::IntegerNum(n) => {
                self.next();
                Some((Datum::Integer(sign * n), Types::INTEGER))
            }
            Token::RealNum(n) => {
                self.next();
                Some((Datum::Real(sign as f64 * n), Types::REAL))
            }
            Token::Identifier(id) => {
                self.next();
                let entry = self.lookup(&id)?;
                if entry.kind() != SymKind::Constant {
                    self.error_id("identifier is not a constant", &id);
                    return Some((Datum::Integer(0), Types::INTEGER));
                }
                let value = match (sign, entry.value()) {
                    (-1, Datum::Integer(n)) => Datum::Integer(-n),
                    (-1, Datum::Real(n)) => Datum::Real(-n),
                    (-1, other) => {
                        self.error("cannot negate a non-numeric constant");
                        other
                    }
                    (_, other) => other,
                };
                Some((value, entry.typ()))
            }
            _ => None,
        }
    }

    // *** Variable references

    /// Push the address of a variable: `base(level delta) + offset`.
    fn emit_var_ref(&mut self, level: Level, entry: &SymValue) {
        let delta = level.saturating_sub(entry.level());
        self.emit_frame(OpCode::PushVar, delta, entry.value());
    }

    /// variable = ident [ composite { composite } ] ;
    /// composite = '[' expr-list ']' | '.' ident | '^' ;
    ///
    /// Emits the address of the referenced object and returns its type.
    fn variable(&mut self, level: Level, entry: &SymValue) -> TypeId {
        let mut typ = entry.typ();
        self.emit_var_ref(level, entry);
        loop {
            if self.accept(&Token::OpenBrkt) {
                typ = self.var_array(level, typ);
                self.expect(&Token::CloseBrkt);
            } else if self.accept(&Token::Period) {
                typ = self.var_selector(typ);
            } else if self.accept(&Token::Caret) {
                typ = match *self.types.get(typ) {
                    TypeDesc::Pointer { pointee } => {
                        // The address of the pointer is on the stack;
                        // its value is the address of the pointee.
                        self.emit_value(OpCode::Eval, 1usize);
                        pointee
                    }
                    _ => {
                        let msg = format!("expected a pointer, got {}", self.types.name(typ));
                        self.error(msg);
                        typ
                    }
                };
            } else {
                break;
            }
        }
        typ
    }

    /// One or more comma-separated array indexes. Each index is bounds
    /// checked, scaled by the element size, re-based to the low bound,
    /// and added into the running address.
    fn var_array(&mut self, level: Level, typ: TypeId) -> TypeId {
        let mut typ = typ;
        loop {
            let (index, element, range) = match *self.types.get(typ) {
                TypeDesc::Array {
                    index,
                    element,
                    range,
                    ..
                } => (index, element, range),
                _ => {
                    self.error("attempt to index into a non-array");
                    (Types::INTEGER, typ, SubRange::new(0, 0))
                }
            };
            let itype = self.expression(level);
            if !self.same_class(itype, index) {
                let msg = format!(
                    "incompatible array index type, expected {} got {}",
                    self.types.name(index),
                    self.types.name(itype)
                );
                self.error(msg);
            }
            self.emit_value(OpCode::LLimit, range.minimum());
            self.emit_value(OpCode::ULimit, range.maximum());
            let esize = self.types.size(element);
            if esize != 1 {
                self.emit_value(OpCode::Push, esize);
                self.emit(OpCode::Mul);
            }
            if range.minimum() != 0 {
                self.emit_value(OpCode::Push, range.minimum() * esize as i64);
                self.emit(OpCode::Sub);
            }
            self.emit(OpCode::Add);
            typ = element;
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        typ
    }

    /// '.' has been consumed; add the field's offset into the address.
    fn var_selector(&mut self, typ: TypeId) -> TypeId {
        let selector = match self.name_ref() {
            Some(selector) => selector,
            None => return typ,
        };
        if !matches!(self.types.get(typ), TypeDesc::Record { .. }) {
            self.error("attempted selector reference into a non-record");
            return typ;
        }
        match self.types.field(typ, &selector) {
            Some((offset, ftype)) => {
                if offset > 0 {
                    self.emit_value(OpCode::Push, offset);
                    self.emit(OpCode::Add);
                }
                ftype
            }
            None => {
                self.error_id("undefined record field", &selector);
                typ
            }
        }
    }

    // *** Statements

    /// variable := expression. With `dup` the variable's address stays
    /// on the stack after the store; the for-statement iterates on it.
    fn assign_statement(&mut self, level: Level, entry: &SymValue, id: &str, dup: bool) {
        let typ = match entry.kind() {
            // Assignment to the function name targets the return slot.
            SymKind::Function => {
                self.emit_frame(OpCode::PushVar, 0, FRAME_RET_VAL as i64);
                entry.typ()
            }
            SymKind::Variable => self.variable(level, entry),
            _ => {
                self.error_id("expected a variable or a function, got", id);
                entry.typ()
            }
        };
        if dup {
            self.emit(OpCode::Dup);
        }
        self.expect(&Token::Assign);
        let rtype = self.expression(level);
        self.assign_promote(typ, rtype);
        self.emit_value(OpCode::Assign, self.types.size(typ));
    }

    /// ident [ '(' expr-list ')' ] calls a procedure or function. The
    /// actual parameters are promoted and bounds-checked against the
    /// formal types, then `call` builds the callee's frame.
    fn call_statement(&mut self, level: Level, entry: &SymValue, id: &str) {
        let mut nparams = 0;
        if self.accept(&Token::OpenParen) {
            if !self.peek(&Token::CloseParen) {
                loop {
                    let kind = self.expression(level);
                    if let Some(&formal) = entry.params().get(nparams) {
                        self.assign_promote(formal, kind);
                    }
                    nparams += 1;
                    if !self.accept(&Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(&Token::CloseParen);
        }
        if nparams != entry.params().len() {
            let msg = format!(
                "passing {} parameters, where {} expected",
                nparams,
                entry.params().len()
            );
            self.error(msg);
        }
        if entry.kind() != SymKind::Procedure && entry.kind() != SymKind::Function {
            self.error_id("identifier is not a function or procedure", id);
        }
        let delta = level.saturating_sub(entry.level());
        self.emit_frame(OpCode::Call, delta, entry.value());
    }

    /// Assignment or procedure call, depending on what the name is.
    fn ident_statement(&mut self, level: Level, id: &str) {
        let entry = match self.lookup(id) {
            Some(entry) => entry,
            None => return,
        };
        match entry.kind() {
            SymKind::Procedure => self.call_statement(level, &entry, id),
            SymKind::Function | SymKind::Variable => {
                self.assign_statement(level, &entry, id, false)
            }
            SymKind::Constant => self.error_id("can't assign to a constant", id),
            SymKind::Type => self.error_id("expected a variable or procedure, got type", id),
        }
    }

    /// while expr do statement
    fn while_statement(&mut self, level: Level) {
        let cond_pc = self.code.len();
        self.expression(level);
        let jmp_pc = self.emit_value(OpCode::Jneq, 0usize);
        self.expect(&Token::Do);
        self.statement(level);
        self.emit_value(OpCode::Jump, cond_pc);
        self.patch(jmp_pc);
    }

    /// if expr then statement [ else statement ]
    fn if_statement(&mut self, level: Level) {
        self.expression(level);
        let jmp_pc = self.emit_value(OpCode::Jneq, 0usize);
        self.expect(&Token::Then);
        self.statement(level);

        if self.accept(&Token::Else) {
            let else_pc = self.emit_value(OpCode::Jump, 0usize);
            self.patch(jmp_pc);
            self.statement(level);
            self.patch(else_pc);
        } else {
            self.patch(jmp_pc);
        }
    }

    /// repeat statement until expr
    fn repeat_statement(&mut self, level: Level) {
        let loop_pc = self.code.len();
        self.statement(level);
        self.expect(&Token::Until);
        self.expression(level);
        self.emit_value(OpCode::Jneq, loop_pc);
    }

    /// for ident := expr ( to | downto ) expr do statement
    ///
    /// The loop keeps exactly one copy of the loop-variable address on
    /// the stack; the final `pop ,1` discards it.
    fn for_statement(&mut self, level: Level) {
        let id = match self.name_ref() {
            Some(id) => id,
            None => return,
        };
        let entry = match self.lookup(&id) {
            Some(entry) => entry,
            None => return,
        };
        self.assign_statement(level, &entry, &id, true);

        let inc: i64 = if self.accept(&Token::To) {
            1
        } else {
            self.expect(&Token::DownTo);
            -1
        };

        let cond_pc = self.code.len();
        self.emit(OpCode::Dup);
        self.emit_value(OpCode::Eval, 1usize);
        self.expression(level);
        self.emit(if inc == 1 { OpCode::Lte } else { OpCode::Gte });
        let jmp_pc = self.emit_value(OpCode::Jneq, 0usize);

        self.expect(&Token::Do);
        self.statement(level);

        self.emit(OpCode::Dup);
        self.emit(OpCode::Dup);
        self.emit_value(OpCode::Eval, 1usize);
        self.emit_value(OpCode::Push, inc);
        self.emit(OpCode::Add);
        self.emit_value(OpCode::Assign, 1usize);
        self.emit_value(OpCode::Jump, cond_pc);

        let pop_pc = self.emit_value(OpCode::Pop, 1usize);
        self.patch_to(jmp_pc, pop_pc);
    }

    /// The expression tuples of write/writeln: each value is followed
    /// by optional `: width [ : precision ]` hints, 0 when absent, and
    /// the tuple count tops the lot.
    fn write_stmt(&mut self, level: Level) {
        let mut nargs = 0i64;
        if self.accept(&Token::OpenParen) {
            loop {
                let expr = self.expression(level);
                if self.types.size(expr) != 1 {
                    self.error("cannot write a composite value");
                }
                if self.accept(&Token::Colon) {
                    let width = self.expression(level);
                    if !self.types.is_integer(width) {
                        let msg =
                            format!("expected integer width, got {}", self.types.name(width));
                        self.error(msg);
                    }
                    if self.accept(&Token::Colon) {
                        let prec = self.expression(level);
                        if !self.types.is_integer(prec) {
                            let msg =
                                format!("expected integer precision, got {}", self.types.name(prec));
                            self.error(msg);
                        }
                    } else {
                        self.emit_value(OpCode::Push, 0i64);
                    }
                } else {
                    self.emit_value(OpCode::Push, 0i64);
                    self.emit_value(OpCode::Push, 0i64);
                }
                nargs += 1;
                if !self.accept(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::CloseParen);
        }
        self.emit_value(OpCode::Push, nargs);
    }

    /// new '(' variable ')' allocates a pointee-sized block and stores
    /// its address through the pointer variable.
    fn statement_new(&mut self, level: Level) {
        self.expect(&Token::OpenParen);
        let id = match self.name_ref() {
            Some(id) => id,
            None => return,
        };
        if let Some(entry) = self.lookup(&id) {
            let typ = self.variable(level, &entry);
            match *self.types.get(typ) {
                TypeDesc::Pointer { pointee } => {
                    self.emit_value(OpCode::Push, self.types.size(pointee));
                    self.emit(OpCode::New);
                    self.emit_value(OpCode::Assign, 1usize);
                }
                _ => {
                    let msg = format!("expected a pointer, got {}", self.types.name(typ));
                    self.error(msg);
                }
            }
        }
        self.expect(&Token::CloseParen);
    }

    /// dispose '(' expr ')' frees the block the pointer refers to.
    fn statement_dispose(&mut self, level: Level) {
        self.expect(&Token::OpenParen);
        let typ = self.expression(level);
        if !matches!(self.types.get(typ), TypeDesc::Pointer { .. }) {
            let msg = format!("expected a pointer, got {}", self.types.name(typ));
            self.error(msg);
        }
        self.emit(OpCode::Dispose);
        self.expect(&Token::CloseParen);
    }

    /// The built-in procedures; an empty statement otherwise.
    fn statement_procs(&mut self, level: Level) {
        if self.accept(&Token::Write) {
            self.write_stmt(level);
            self.emit(OpCode::Write);
        } else if self.accept(&Token::Writeln) {
            self.write_stmt(level);
            self.emit(OpCode::Writeln);
        } else if self.accept(&Token::New) {
            self.statement_new(level);
        } else if self.accept(&Token::Dispose) {
            self.statement_dispose(level);
        }
        // else: the empty statement
    }

    fn statement(&mut self, level: Level) {
        if let Token::Identifier(id) = self.current() {
            let id = id.clone();
            self.next();
            self.ident_statement(level, &id);
        } else if self.accept(&Token::Begin) {
            self.statement_list(level);
            self.expect(&Token::End);
        } else if self.accept(&Token::If) {
            self.if_statement(level);
        } else if self.accept(&Token::While) {
            self.while_statement(level);
        } else if self.accept(&Token::Repeat) {
            self.repeat_statement(level);
        } else if self.accept(&Token::For) {
            self.for_statement(level);
        } else {
            self.statement_procs(level);
        }
    }

    fn statement_list(&mut self, level: Level) {
        loop {
            self.statement(level);
            if !self.accept(&Token::SemiColon) {
                break;
            }
        }
    }

    // *** Declarations

    /// const ident = const-expr { ; ident = const-expr } ;
    fn const_decl_list(&mut self, level: Level) {
        const STOPS: &[Token] = &[
            Token::TypeDecl,
            Token::VarDecl,
            Token::ProcDecl,
            Token::FuncDecl,
            Token::Begin,
        ];
        if self.accept(&Token::ConstDecl) {
            loop {
                if self.one_of(STOPS) {
                    break;
                }
                self.const_decl(level);
                if !self.accept(&Token::SemiColon) {
                    break;
                }
            }
        }
    }

    fn const_decl(&mut self, level: Level) {
        let id = match self.name_ref() {
            Some(id) => id,
            None => return,
        };
        self.expect(&Token::EQU);
        match self.const_expr() {
            Some((value, typ)) => {
                self.note(format!("constDecl {}: {}, {}", id, level, value));
                self.define(&id, SymValue::constant(level, value, typ));
            }
            None => {
                let msg = format!("expected a const-expression, got {}", self.current());
                self.error(msg);
                self.next();
            }
        }
    }

    /// type ident = type { ; ident = type } ;
    fn type_decl_list(&mut self, level: Level) {
        const STOPS: &[Token] = &[
            Token::VarDecl,
            Token::ProcDecl,
            Token::FuncDecl,
            Token::Begin,
        ];
        if self.accept(&Token::TypeDecl) {
            loop {
                if self.one_of(STOPS) {
                    break;
                }
                self.type_decl(level);
                if !self.accept(&Token::SemiColon) {
                    break;
                }
            }
        }
    }

    fn type_decl(&mut self, level: Level) {
        let id = match self.name_ref() {
            Some(id) => id,
            None => return,
        };
        self.expect(&Token::EQU);
        let typ = self.type_spec(level);
        self.note(format!("type {} = {}", id, self.types.name(typ)));
        self.define(&id, SymValue::type_def(level, typ));
    }

    /// simple-type | structured-type | pointer-type | type-name
    fn type_spec(&mut self, level: Level) -> TypeId {
        if let Token::Identifier(id) = self.current() {
            let id = id.clone();
            self.next();
            return match self.lookup(&id) {
                Some(entry) if entry.kind() == SymKind::Type => entry.typ(),
                Some(_) => {
                    self.error_id("expected a type, got", &id);
                    Types::INTEGER
                }
                None => Types::INTEGER,
            };
        }
        if self.accept(&Token::Caret) {
            let pointee = self.type_spec(level);
            return self.types.pointer(pointee);
        }
        if let Some(typ) = self.structured_type(level) {
            return typ;
        }
        self.simple_type(level)
    }

    /// A named ordinal type, or an ordinal-type declaration.
    fn simple_type(&mut self, level: Level) -> TypeId {
        if let Token::Identifier(id) = self.current() {
            let id = id.clone();
            self.next();
            return match self.lookup(&id) {
                Some(entry) if entry.kind() != SymKind::Type => {
                    self.error_id("expected a type, got", &id);
                    Types::INTEGER
                }
                Some(entry) if !self.types.is_ordinal(entry.typ()) => {
                    self.error_id("expected an ordinal type, got", &id);
                    Types::INTEGER
                }
                Some(entry) => entry.typ(),
                None => Types::INTEGER,
            };
        }
        self.ordinal_type(level)
    }

    /// '(' ident-list ')' | const-expr '..' const-expr
    fn ordinal_type(&mut self, level: Level) -> TypeId {
        if self.accept(&Token::OpenParen) {
            // An enumeration; each enumerator becomes a constant of the
            // new type.
            let ids = self.identifier_list();
            self.expect(&Token::CloseParen);
            let typ = self.types.enumeration(ids.clone());
            for (value, id) in ids.iter().enumerate() {
                self.note(format!("enumeration '{}' = {}, {}", id, value, level));
                self.define(id, SymValue::constant(level, Datum::Integer(value as i64), typ));
            }
            return typ;
        }

        match self.const_expr() {
            Some((min, _)) => {
                self.expect(&Token::Ellipsis);
                let max = match self.const_expr() {
                    Some((max, _)) => max,
                    None => {
                        let msg =
                            format!("expected a constant expression, got {}", self.current());
                        self.error(msg);
                        min
                    }
                };
                match (min, max) {
                    (Datum::Integer(lo), Datum::Integer(hi)) => {
                        if lo > hi {
                            let msg = format!(
                                "minimum sub-range value ({}) is greater than the maximum ({})",
                                lo, hi
                            );
                            self.error(msg);
                            self.types.sub_range(hi, lo)
                        } else {
                            self.types.sub_range(lo, hi)
                        }
                    }
                    (lo, hi) => {
                        let msg = format!(
                            "both sub-range values must be ordinal; {}, {}",
                            lo, hi
                        );
                        self.error(msg);
                        self.types.sub_range(0, 1)
                    }
                }
            }
            None => {
                // No branch matched: diagnose and stand in an integer
                // placeholder; nothing downstream sees a missing type.
                let msg = format!("expected a type, got {}", self.current());
                self.error(msg);
                self.next();
                Types::INTEGER
            }
        }
    }

    /// 'array' '[' simple-type-list ']' 'of' type | 'record' fields 'end'
    fn structured_type(&mut self, level: Level) -> Option<TypeId> {
        if self.accept(&Token::Array) {
            self.expect(&Token::OpenBrkt);
            let indexes = self.simple_type_list(level);
            self.expect(&Token::CloseBrkt);
            self.expect(&Token::Of);
            let element = self.type_spec(level);
            // A multi-dimensional array is an array of arrays; build it
            // inside out.
            let mut typ = element;
            for &index in indexes.iter().rev() {
                typ = self.types.array(index, typ);
            }
            Some(typ)
        } else if self.accept(&Token::Record) {
            let mut fields = vec![];
            self.field_list(level, &mut fields);
            self.expect(&Token::End);
            Some(self.types.record(fields))
        } else {
            None
        }
    }

    /// ident-list ':' type { ';' ident-list ':' type }
    fn field_list(&mut self, level: Level, fields: &mut Vec<Field>) {
        loop {
            if self.peek(&Token::End) {
                break;
            }
            let ids = self.identifier_list();
            self.expect(&Token::Colon);
            let typ = self.type_spec(level);
            for id in ids {
                if fields.iter().any(|f| f.name() == id) {
                    self.error_id("previously defined", &id);
                } else {
                    fields.push(Field::new(id, typ));
                }
            }
            if !self.accept(&Token::SemiColon) {
                break;
            }
        }
    }

    fn simple_type_list(&mut self, level: Level) -> Vec<TypeId> {
        let mut types = vec![];
        loop {
            types.push(self.simple_type(level));
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        types
    }

    fn identifier_list(&mut self) -> Vec<String> {
        let mut ids = vec![];
        loop {
            if let Some(id) = self.name_ref() {
                ids.push(id);
            }
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        ids
    }

    /// var ident-list : type { ; ident-list : type } ;
    ///
    /// Returns the block's local datum count, the operand of its
    /// `enter`.
    fn var_decl_block(&mut self, level: Level) -> usize {
        let mut idents = vec![];
        if self.accept(&Token::VarDecl) {
            self.var_decl_list(level, false, &mut idents);
        }
        idents.iter().map(|f| self.types.size(f.typ())).sum()
    }

    /// Declare variables or formal parameters. Locals are addressed
    /// upward from the end of the frame prefix; parameters sit at
    /// negative offsets before the frame, in the order pushed.
    fn var_decl_list(&mut self, level: Level, params: bool, idents: &mut Vec<Field>) {
        const STOPS: &[Token] = &[
            Token::ProcDecl,
            Token::FuncDecl,
            Token::Begin,
            Token::CloseParen,
        ];
        loop {
            if self.one_of(STOPS) {
                break;
            }
            self.var_decl(level, idents);
            if !self.accept(&Token::SemiColon) {
                break;
            }
        }

        let total: usize = idents.iter().map(|f| self.types.size(f.typ())).sum();
        let mut dx: i64 = if params {
            -(total as i64)
        } else {
            super::instr::FRAME_SIZE as i64
        };
        for id in idents.iter() {
            self.note(format!(
                "var/param {}: {}, {}, {}",
                id.name(),
                level,
                dx,
                self.types.name(id.typ())
            ));
            self.define(id.name(), SymValue::variable(level, dx, id.typ()));
            dx += self.types.size(id.typ()) as i64;
        }
    }

    fn var_decl(&mut self, level: Level, idents: &mut Vec<Field>) {
        let ids = self.identifier_list();
        self.expect(&Token::Colon);
        let typ = self.type_spec(level);
        for id in ids {
            idents.push(Field::new(id, typ));
        }
    }

    // *** Subroutines

    /// The common prefix of procedure and function declarations: the
    /// name, inserted before the body so recursion can resolve it, and
    /// the formal parameters, declared at the body's frame level.
    fn sub_prefix_decl(&mut self, level: Level, kind: SymKind) -> Option<String> {
        let id = self.name_ref()?;
        self.note(format!("subPrefixDecl {}: {}, 0", id, level));
        self.define(&id, SymValue::subroutine(kind, level));

        if self.accept(&Token::OpenParen) {
            let mut idents = vec![];
            self.var_decl_list(level + 1, true, &mut idents);
            self.expect(&Token::CloseParen);
            let params: Vec<TypeId> = idents.iter().map(|f| f.typ()).collect();
            if let Some(entry) = self.symtbl.lookup_level(&id, level) {
                entry.set_params(params);
            }
        }
        Some(id)
    }

    /// procedure ident [ ( params ) ] ; block ;
    fn proc_decl(&mut self, level: Level) {
        if let Some(id) = self.sub_prefix_decl(level, SymKind::Procedure) {
            self.expect(&Token::SemiColon);
            self.block_decl(&id, level + 1);
            self.expect(&Token::SemiColon);
        }
    }

    /// function ident [ ( params ) ] : type ; block ;
    fn func_decl(&mut self, level: Level) {
        if let Some(id) = self.sub_prefix_decl(level, SymKind::Function) {
            self.expect(&Token::Colon);
            let typ = self.type_spec(level);
            if let Some(entry) = self.symtbl.lookup_level(&id, level) {
                entry.set_type(typ);
            }
            self.expect(&Token::SemiColon);
            self.block_decl(&id, level + 1);
            self.expect(&Token::SemiColon);
        }
    }

    fn sub_decl_list(&mut self, level: Level) {
        loop {
            if self.accept(&Token::ProcDecl) {
                self.proc_decl(level);
            } else if self.accept(&Token::FuncDecl) {
                self.func_decl(level);
            } else {
                break;
            }
        }
    }

    /// [ const-decls ] [ type-decls ] [ var-decls ] [ subroutines ]
    /// begin statements end
    ///
    /// The block's code begins with a jump over any nested subroutine
    /// bodies, patched to the block's `enter`; the entry address stored
    /// in the symbol table always names that `enter`.
    fn block_decl(&mut self, id: &str, level: Level) -> Address {
        self.const_decl_list(level);
        self.type_decl_list(level);
        let dx = self.var_decl_block(level);

        let jmp_pc = self.emit_value(OpCode::Jump, 0usize);
        self.sub_decl_list(level);
        self.patch(jmp_pc);

        let addr = self.emit_value(OpCode::Enter, dx);
        let declared = level.saturating_sub(1);
        let (kind, nparams) = match self.symtbl.lookup_level(id, declared) {
            Some(entry) => {
                entry.set_value(Datum::Integer(addr as i64));
                (entry.kind(), entry.params().len())
            }
            None => (SymKind::Procedure, 0),
        };

        if self.expect(&Token::Begin) {
            self.statement_list(level);
            self.expect(&Token::End);
        }

        if kind == SymKind::Function {
            self.emit_value(OpCode::RetF, nparams);
        } else {
            self.emit_value(OpCode::Ret, nparams);
        }

        self.symtbl.purge(level);
        addr
    }

    /// program ident ; block .
    fn prog_decl(&mut self) {
        self.next(); // fetch the first token

        self.expect(&Token::ProgDecl);
        let id = self.sub_prefix_decl(0, SymKind::Procedure).unwrap_or_default();
        self.expect(&Token::SemiColon);

        let addr = self.block_decl(&id, 0);
        self.note(format!("program entry at {}", addr));
        self.expect(&Token::Period);

        // The sentinel the machine returns to when the program block's
        // frame unwinds.
        self.emit(OpCode::Halt);
    }
}
