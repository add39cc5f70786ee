use super::*;
use OpCode::*;

/// `write` a single value with no formatting hints.
fn write_top(code: &mut Vec<Instr>) {
    code.push(Instr::value(Push, 0i64));
    code.push(Instr::value(Push, 0i64));
    code.push(Instr::value(Push, 1i64));
    code.push(Instr::new(Writeln));
}

#[test]
fn test_empty_program_is_a_bad_fetch() {
    assert_eq!(exec(vec![]), Err(Fault::BadFetch));
}

#[test]
fn test_halt_stops_the_machine() {
    assert_eq!(exec(vec![Instr::new(Halt)]), Ok(String::new()));
}

#[test]
fn test_locals_assign_and_eval() {
    let mut code = vec![
        Instr::value(Enter, 1usize),
        Instr::frame(PushVar, 0, 4i64),
        Instr::value(Push, 99i64),
        Instr::value(Assign, 1usize),
        Instr::frame(PushVar, 0, 4i64),
        Instr::value(Eval, 1usize),
    ];
    write_top(&mut code);
    code.push(Instr::new(Halt));
    assert_eq!(exec(code), Ok("99\n".to_string()));
}

#[test]
fn test_call_and_ret_balance_the_stack() {
    // A one-parameter procedure that does nothing; after the call the
    // operand stack must be exactly as before the parameter push.
    let mut code = vec![
        Instr::value(Jump, 3usize),
        Instr::value(Enter, 0usize),  // the procedure
        Instr::value(Ret, 1usize),
        Instr::value(Enter, 0usize),  // the program
        Instr::value(Push, 7i64),     // parameter
        Instr::frame(Call, 0, 1usize),
        Instr::value(Push, 42i64),
    ];
    write_top(&mut code);
    code.push(Instr::value(Ret, 0usize));
    code.push(Instr::new(Halt));
    assert_eq!(exec(code), Ok("42\n".to_string()));
}

#[test]
fn test_retf_leaves_the_return_value() {
    // A function computing parameter + 1 through its return slot.
    let mut code = vec![
        Instr::value(Jump, 9usize),
        Instr::value(Enter, 0usize),     // the function
        Instr::frame(PushVar, 0, 3i64),  // return slot
        Instr::frame(PushVar, 0, -1i64), // the parameter
        Instr::value(Eval, 1usize),
        Instr::value(Push, 1i64),
        Instr::new(Add),
        Instr::value(Assign, 1usize),
        Instr::value(RetF, 1usize),
        Instr::value(Enter, 0usize),     // the program
        Instr::value(Push, 41i64),
        Instr::frame(Call, 0, 1usize),
    ];
    write_top(&mut code);
    code.push(Instr::value(Ret, 0usize));
    code.push(Instr::new(Halt));
    assert_eq!(exec(code), Ok("42\n".to_string()));
}

#[test]
fn test_division_by_zero() {
    let code = vec![
        Instr::value(Push, 1i64),
        Instr::value(Push, 0i64),
        Instr::new(Div),
    ];
    assert_eq!(exec(code), Err(Fault::DivideByZero));

    let code = vec![
        Instr::value(Push, 1.0),
        Instr::value(Push, 0.0),
        Instr::new(Div),
    ];
    assert_eq!(exec(code), Err(Fault::DivideByZero));

    let code = vec![
        Instr::value(Push, 1i64),
        Instr::value(Push, 0i64),
        Instr::new(Rem),
    ];
    assert_eq!(exec(code), Err(Fault::DivideByZero));
}

#[test]
fn test_stack_underflow() {
    assert_eq!(exec(vec![Instr::new(Add)]), Err(Fault::StackUnderflow));
}

#[test]
fn test_limits() {
    let pass = vec![
        Instr::value(Push, 5i64),
        Instr::value(LLimit, 5i64),
        Instr::value(ULimit, 5i64),
        Instr::new(Halt),
    ];
    assert_eq!(exec(pass), Ok(String::new()));

    let low = vec![Instr::value(Push, 4i64), Instr::value(LLimit, 5i64)];
    assert_eq!(exec(low), Err(Fault::OutOfRange));

    let high = vec![Instr::value(Push, 6i64), Instr::value(ULimit, 5i64)];
    assert_eq!(exec(high), Err(Fault::OutOfRange));
}

#[test]
fn test_pred_and_succ_respect_their_limits() {
    let mut code = vec![Instr::value(Push, 2i64), Instr::value(Pred, 1i64)];
    write_top(&mut code);
    code.push(Instr::new(Halt));
    assert_eq!(exec(code), Ok("1\n".to_string()));

    let code = vec![Instr::value(Push, 1i64), Instr::value(Pred, 1i64)];
    assert_eq!(exec(code), Err(Fault::OutOfRange));

    let code = vec![Instr::value(Push, 9i64), Instr::value(Succ, 9i64)];
    assert_eq!(exec(code), Err(Fault::OutOfRange));
}

#[test]
fn test_round_of_itor_is_identity() {
    for n in [0i64, 1, -1, 42, -123_456_789] {
        let mut code = vec![
            Instr::value(Push, n),
            Instr::new(Itor),
            Instr::new(Round),
        ];
        write_top(&mut code);
        code.push(Instr::new(Halt));
        assert_eq!(exec(code), Ok(format!("{}\n", n)));
    }
}

#[test]
fn test_jneq_wants_a_boolean() {
    let code = vec![Instr::value(Push, 1i64), Instr::value(Jneq, 0usize)];
    assert_eq!(exec(code), Err(Fault::BadDataType));
}

#[test]
fn test_new_and_dispose() {
    // Allocate, write through the pointer, read back, free.
    let mut code = vec![
        Instr::value(Enter, 1usize),     // the pointer variable
        Instr::frame(PushVar, 0, 4i64),
        Instr::value(Push, 1i64),        // pointee size
        Instr::new(New),
        Instr::value(Assign, 1usize),
        Instr::frame(PushVar, 0, 4i64),
        Instr::value(Eval, 1usize),
        Instr::value(Push, 42i64),
        Instr::value(Assign, 1usize),
    ];
    // read it back
    code.push(Instr::frame(PushVar, 0, 4i64));
    code.push(Instr::value(Eval, 1usize)); // pointer value
    code.push(Instr::value(Eval, 1usize)); // pointee
    write_top(&mut code);
    code.push(Instr::frame(PushVar, 0, 4i64));
    code.push(Instr::value(Eval, 1usize));
    code.push(Instr::new(Dispose));
    code.push(Instr::new(Halt));
    assert_eq!(exec(code), Ok("42\n".to_string()));
}

#[test]
fn test_dispose_of_a_dead_block_faults() {
    let code = vec![
        Instr::value(Push, 2i64),
        Instr::new(New),
        Instr::new(Dup),
        Instr::new(Dispose),
        Instr::new(Dispose),
    ];
    assert_eq!(exec(code), Err(Fault::FreeStoreError));
}

#[test]
fn test_dispose_of_a_stack_address_faults() {
    let code = vec![Instr::value(Push, 3i64), Instr::new(Dispose)];
    assert_eq!(exec(code), Err(Fault::FreeStoreError));
}

#[test]
fn test_exhausted_store_answers_nil() {
    // The default heap is 3072 datums; a larger request yields 0.
    let mut code = vec![Instr::value(Push, 5000i64), Instr::new(New)];
    write_top(&mut code);
    code.push(Instr::new(Halt));
    assert_eq!(exec(code), Ok("0\n".to_string()));
}

#[test]
fn test_write_formatting() {
    let code = vec![
        Instr::value(Push, 5i64),
        Instr::value(Push, 4i64),  // width
        Instr::value(Push, 0i64),
        Instr::value(Push, 1.5),
        Instr::value(Push, 8i64),  // width
        Instr::value(Push, 2i64),  // precision
        Instr::value(Push, 2i64),  // count
        Instr::new(Write),
        Instr::new(Halt),
    ];
    assert_eq!(exec(code), Ok("   5    1.50".to_string()));
}

#[test]
fn test_cycles_are_counted() {
    let program = Program::new(
        vec![
            Instr::value(Push, 1i64),
            Instr::value(Push, 2i64),
            Instr::new(Add),
            Instr::new(Halt),
        ],
        vec![],
    );
    let mut machine = Machine::default();
    let mut out = Vec::new();
    machine.run(&program, &mut out).expect("runs");
    assert_eq!(machine.cycles(), 3);
}

#[test]
fn test_consts_load_below_the_stack() {
    // One pooled constant; the outermost frame sits above it.
    let mut code = vec![
        Instr::frame(PushVar, 0, -1i64), // the pooled datum
        Instr::value(Eval, 1usize),
    ];
    write_top(&mut code);
    code.push(Instr::new(Halt));
    let program = Program::new(code, vec![Datum::Integer(7)]);
    let mut machine = Machine::default();
    let mut out = Vec::new();
    machine.run(&program, &mut out).expect("runs");
    assert_eq!(String::from_utf8(out).expect("utf-8"), "7\n");
}
