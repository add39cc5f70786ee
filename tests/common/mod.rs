use pascal_lite::mach::{Compiler, Fault, Machine, Program};

pub fn compile(source: &str) -> Program {
    Compiler::compile(source, false).expect("program should compile")
}

/// Compile and run, returning everything the program wrote.
#[allow(dead_code)]
pub fn run(source: &str) -> String {
    let program = compile(source);
    let mut out = Vec::new();
    Machine::default()
        .run(&program, &mut out)
        .expect("program should run");
    String::from_utf8(out).expect("output should be utf-8")
}

/// Compile and run a program expected to stop on a fault.
#[allow(dead_code)]
pub fn run_fault(source: &str) -> Fault {
    let program = compile(source);
    let mut out = Vec::new();
    Machine::default()
        .run(&program, &mut out)
        .expect_err("program should fault")
}
