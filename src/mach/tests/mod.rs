use super::{Compiler, Datum, Fault, Instr, Machine, OpCode, Program};

mod compile_test;
mod machine_test;
mod store_test;
mod symbol_test;
mod types_test;

fn compile(source: &str) -> Program {
    Compiler::compile(source, false).expect("program should compile")
}

fn errors(source: &str) -> usize {
    Compiler::compile(source, false)
        .expect_err("program should not compile")
        .len()
}

fn run(source: &str) -> String {
    let program = compile(source);
    let mut out = Vec::new();
    Machine::default()
        .run(&program, &mut out)
        .expect("program should run");
    String::from_utf8(out).expect("output should be utf-8")
}

fn run_fault(source: &str) -> Fault {
    let program = compile(source);
    let mut out = Vec::new();
    Machine::default()
        .run(&program, &mut out)
        .expect_err("program should fault")
}

/// Run a hand-assembled instruction sequence.
fn exec(code: Vec<Instr>) -> Result<String, Fault> {
    let program = Program::new(code, vec![]);
    let mut out = Vec::new();
    let mut machine = Machine::default();
    machine.run(&program, &mut out)?;
    Ok(String::from_utf8(out).expect("output should be utf-8"))
}
