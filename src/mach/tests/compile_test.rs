use super::*;

#[test]
fn test_compiling_twice_is_identical() {
    let source = "
        program twice;
        var i: integer;
        function double(n: integer): integer;
        begin double := n * 2 end;
        begin
            for i := 1 to 3 do writeln(double(i))
        end.";
    assert_eq!(compile(source), compile(source));
}

#[test]
fn test_every_call_targets_an_enter() {
    let source = "
        program calls;
        var i: integer;
        procedure noop; begin end;
        function one: integer; begin one := 1 end;
        begin noop; i := one; writeln(i) end.";
    let program = compile(source);
    let code = program.code();
    let calls: Vec<usize> = code
        .iter()
        .filter(|i| i.op == OpCode::Call)
        .map(|i| i.addr.address().expect("a code address"))
        .collect();
    assert!(!calls.is_empty());
    for target in calls {
        assert_eq!(code[target].op, OpCode::Enter);
    }
}

#[test]
fn test_every_forward_branch_is_patched() {
    let source = "
        program branches;
        var i, j: integer;
        begin
            i := 0;
            while i < 3 do begin
                if odd(i) then j := i else j := -i;
                for i := i to i do j := j + 1;
                i := i + 1
            end;
            repeat j := j - 1 until j <= 0
        end.";
    let program = compile(source);
    let code = program.code();
    for instr in code {
        if instr.op == OpCode::Jump || instr.op == OpCode::Jneq {
            let target = instr.addr.address().expect("a code address");
            // Instruction 0 is the program block's own skip jump, so no
            // branch ever legitimately points at it; a zero here would
            // be an unpatched placeholder.
            assert_ne!(target, 0);
            assert!(target < code.len());
        }
    }
}

#[test]
fn test_for_bound_test_direction() {
    let up = compile("program up; var i: integer; begin for i := 1 to 3 do write(i) end.");
    assert!(up.code().iter().any(|i| i.op == OpCode::Lte));
    assert!(!up.code().iter().any(|i| i.op == OpCode::Gte));

    let down = compile("program dn; var i: integer; begin for i := 3 downto 1 do write(i) end.");
    assert!(down.code().iter().any(|i| i.op == OpCode::Gte));
    assert!(!down.code().iter().any(|i| i.op == OpCode::Lte));
}

#[test]
fn test_subrange_assignment_emits_limit_checks() {
    let program = compile("program s; var x: 1..5; begin x := 3 end.");
    let code = program.code();
    let llimit = code
        .iter()
        .find(|i| i.op == OpCode::LLimit)
        .expect("a lower limit check");
    let ulimit = code
        .iter()
        .find(|i| i.op == OpCode::ULimit)
        .expect("an upper limit check");
    assert_eq!(llimit.addr, Datum::Integer(1));
    assert_eq!(ulimit.addr, Datum::Integer(5));
}

#[test]
fn test_full_range_assignment_emits_no_checks() {
    let program = compile("program s; var x: integer; begin x := 3 end.");
    assert!(!program
        .code()
        .iter()
        .any(|i| i.op == OpCode::LLimit || i.op == OpCode::ULimit));
}

#[test]
fn test_char_literal_pushes_its_ordinal() {
    let program = compile("program c; begin writeln('A') end.");
    assert!(program
        .code()
        .iter()
        .any(|i| i.op == OpCode::Push && i.addr == Datum::Integer(65)));
}

#[test]
fn test_mixed_sides_promote() {
    // integer on the left of a real promotes the buried operand
    let program = compile("program m; var r: real; begin r := 1 + 0.5 end.");
    assert!(program.code().iter().any(|i| i.op == OpCode::Itor2));

    // integer on the right promotes the top of stack
    let program = compile("program m; var r: real; begin r := 0.5 + 1 end.");
    assert!(program.code().iter().any(|i| i.op == OpCode::Itor));
}

#[test]
fn test_undefined_identifier() {
    assert_eq!(errors("program e; begin x end."), 1);
}

#[test]
fn test_previously_defined() {
    assert_eq!(
        errors("program e; var x: integer; x: integer; begin end."),
        1
    );
}

#[test]
fn test_assignment_type_mismatch() {
    assert_eq!(
        errors("program e; var b: boolean; begin b := 1 end."),
        1
    );
}

#[test]
fn test_wrong_parameter_count() {
    assert_eq!(
        errors("program e; procedure q(n: integer); begin end; begin q(1, 2) end."),
        1
    );
    assert_eq!(
        errors("program e; procedure q(n: integer); begin end; begin q end."),
        1
    );
}

#[test]
fn test_indexing_a_scalar() {
    assert_eq!(
        errors("program e; var i: integer; begin i[1] := 2 end."),
        1
    );
}

#[test]
fn test_assigning_to_a_constant() {
    // The parser reports the bad target and leaves ":= 2" to the usual
    // skip-one-token recovery, so later expects stumble too.
    assert!(errors("program e; const k = 1; begin k := 2 end.") >= 1);
}
