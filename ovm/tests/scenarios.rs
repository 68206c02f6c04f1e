use ovm::{ErrorKind, METHOD_TABLE, ObjType, Op, Ovm, OvmCreateInfo, R0, R1, R2, slice_idxs};

fn vm() -> Ovm {
    Ovm::new(OvmCreateInfo::default())
}

/// Applies `op` to the literal `subject` with literal operands in R1 up.
fn eval(vm: &mut Ovm, subject: &str, op: Op, args: &[&str]) -> Result<String, ErrorKind> {
    vm.news(R0, subject);
    let regs: Vec<usize> = (R1..R1 + args.len()).collect();
    for (&r, arg) in regs.iter().zip(args) {
        vm.news(r, arg);
    }
    vm.call(R0, op, &regs);
    match vm.take_error() {
        Ok(()) => vm.to_literal(R0),
        Err(kind) => Err(kind),
    }
}

fn is_true(vm: &mut Ovm, subject: &str, op: Op, arg: &str) -> bool {
    eval(vm, subject, op, &[arg]).unwrap() == "#true"
}

#[test]
fn test_integer_addition() {
    let mut vm = vm();
    vm.newc_int(R1, 2);
    vm.new_value(R0, ObjType::Integer, &[R1]);
    vm.newc_int(R2, 3);
    vm.new_value(R1, ObjType::Integer, &[R2]);
    vm.call(R0, Op::Add, &[R1]);
    assert_eq!(vm.check(), Ok(()));
    assert_eq!(vm.reg_type(R0), ObjType::Integer);
    assert_eq!(vm.integer_val(R0), 5);
}

#[test]
fn test_string_slices() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "\"hello world\"", Op::Slice, &["6", "5"]).unwrap(), "\"world\"");
    assert_eq!(eval(&mut vm, "\"hello\"", Op::Slice, &["-3", "2"]).unwrap(), "\"ll\"");
}

#[test]
fn test_slice_idxs_examples() {
    assert_eq!(slice_idxs(10, 3, 4), (3, 4));
    assert_eq!(slice_idxs(10, -3, 2), (7, 2));
    assert_eq!(slice_idxs(5, 2, -4), (0, 3));
}

#[test]
fn test_list_equality_with_array_derived_list() {
    let mut vm = vm();
    vm.news(R2, "[1, 2, 3]");
    vm.new_value(R1, ObjType::List, &[R2]);
    vm.news(R0, "(1, 2, 3)");
    vm.call(R0, Op::Eq, &[R1]);
    assert!(vm.bool_val(R0));

    assert!(!is_true(&mut vm, "(1, 2, 3)", Op::Eq, "(1, 2, 4)"));
}

#[test]
fn test_dict_at_del_count() {
    let mut vm = vm();
    vm.news(R0, "{\"a\": 1, \"b\": 2}");
    vm.push(R0);

    vm.newc_str(R1, "a");
    vm.call(R0, Op::At, &[R1]);
    assert_eq!(vm.integer_val(R0), 1);

    vm.pick(R0, 0);
    vm.call(R0, Op::Del, &[R1]);
    vm.call(R0, Op::Count, &[]);
    assert_eq!(vm.integer_val(R0), 1);

    vm.pick(R0, 0);
    vm.call(R0, Op::At, &[R1]);
    assert_eq!(vm.reg_type(R0), ObjType::Nil);

    vm.drop();
    assert_eq!(vm.check(), Ok(()));
}

#[test]
fn test_array_sort() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "[5, 3, 1, 4, 2]", Op::Sort, &[]).unwrap(), "[1, 2, 3, 4, 5]");

    let reversed: Vec<String> = (1..=20).rev().map(|i| i.to_string()).collect();
    let sorted: Vec<String> = (1..=20).map(|i| i.to_string()).collect();
    let literal = format!("[{}]", reversed.join(", "));
    assert_eq!(
        eval(&mut vm, &literal, Op::Sort, &[]).unwrap(),
        format!("[{}]", sorted.join(", "))
    );
}

#[test]
fn test_sort_output_is_non_decreasing() {
    let mut vm = vm();
    let literal = "[3.5, -1.0, 2.25, 2.25, 9.0, 0.5, -7.5, 3.5, 1.0, 4.0, 8.0, 0.0, 6.5, -2.0]";
    vm.news(R0, literal);
    vm.call(R0, Op::Sort, &[]);
    vm.push(R0);
    for i in 0..13 {
        vm.pick(R0, 0);
        vm.newc_int(R1, i);
        vm.call(R0, Op::At, &[R1]);
        vm.move_reg(R2, R0);
        vm.pick(R0, 0);
        vm.newc_int(R1, i + 1);
        vm.call(R0, Op::At, &[R1]);
        vm.call(R0, Op::Lt, &[R2]);
        assert!(!vm.bool_val(R0), "element {} exceeds its successor", i);
    }
    vm.drop();
}

#[test]
fn test_round_trip_nested_literal() {
    let mut vm = vm();
    for literal in [
        "#nil",
        "#true",
        "-12",
        "2.5",
        "\"a \\\"quoted\\\" word\"",
        "<1, #false>",
        "(1, (2, 3), ())",
        "[1, 2, <3, \"four\">]",
        "{\"k\": [1, {2: (3)}]}",
    ] {
        vm.news(R0, literal);
        let printed = vm.to_literal(R0).unwrap();
        vm.news(R1, &printed);
        vm.call(R1, Op::Eq, &[R0]);
        assert_eq!(vm.check(), Ok(()), "{literal}");
        assert!(vm.bool_val(R1), "{literal} printed as {printed}");
    }
}

#[test]
fn test_float_round_trip_is_lossy() {
    // `%Lg` keeps six significant digits and drops a zero fraction.
    let mut vm = vm();
    for (literal, printed) in [("1.0", "1"), ("3.14159265", "3.14159")] {
        vm.news(R0, literal);
        assert_eq!(vm.to_literal(R0).unwrap(), printed);
        vm.news(R1, printed);
        vm.call(R1, Op::Eq, &[R0]);
        assert_eq!(vm.check(), Ok(()));
        assert!(!vm.bool_val(R1), "{literal}");
    }
    vm.news(R0, "1.0");
    let printed = vm.to_literal(R0).unwrap();
    vm.news(R0, &printed);
    assert_eq!(vm.reg_type(R0), ObjType::Integer);
}

/// Builds a dictionary with `buckets` buckets in R0, inserting in order.
fn dict_of(vm: &mut Ovm, buckets: usize, entries: &[(i64, i64)]) {
    vm.newc_dict(R0, buckets);
    for &(key, value) in entries {
        vm.newc_int(R1, key);
        vm.newc_int(R2, value);
        vm.call(R0, Op::AtPut, &[R1, R2]);
    }
}

fn dicts_equal(vm: &mut Ovm, a: (usize, &[(i64, i64)]), b: (usize, &[(i64, i64)])) -> bool {
    dict_of(vm, a.0, a.1);
    vm.push(R0);
    dict_of(vm, b.0, b.1);
    vm.move_reg(R1, R0);
    vm.pop(R0);
    vm.call(R0, Op::Eq, &[R1]);
    assert_eq!(vm.check(), Ok(()));
    vm.bool_val(R0)
}

#[test]
fn test_dict_equality_ignores_layout() {
    let mut vm = vm();
    let entries: &[(i64, i64)] = &[(1, 10), (2, 20), (3, 30)];
    let reordered: &[(i64, i64)] = &[(3, 30), (1, 10), (2, 20)];

    assert!(dicts_equal(&mut vm, (1, entries), (1, reordered)));
    assert!(dicts_equal(&mut vm, (1, entries), (7, entries)));
    assert!(dicts_equal(&mut vm, (4, entries), (32, reordered)));
    assert!(dicts_equal(&mut vm, (3, &[]), (5, &[])));

    assert!(!dicts_equal(&mut vm, (1, entries), (1, &[(1, 10), (2, 20)])));
    assert!(!dicts_equal(&mut vm, (1, entries), (1, &[(1, 10), (2, 20), (3, 31)])));
    assert!(!dicts_equal(&mut vm, (1, entries), (1, &[(1, 10), (2, 20), (4, 30)])));
}

#[test]
fn test_dict_round_trip() {
    let mut vm = vm();
    for (buckets, entries) in [
        (1, &[(1, 1), (23, 2)][..]),
        (4, &[(1, 2)][..]),
        (32, &[(1, 1), (23, 2), (33, 3)][..]),
    ] {
        dict_of(&mut vm, buckets, entries);
        let printed = vm.to_literal(R0).unwrap();
        vm.news(R1, &printed);
        vm.call(R1, Op::Eq, &[R0]);
        assert_eq!(vm.check(), Ok(()), "{printed}");
        assert!(vm.bool_val(R1), "{printed}");
    }

    vm.news(R0, "{1: 1, 23: 2}");
    let printed = vm.to_literal(R0).unwrap();
    vm.news(R1, &printed);
    vm.call(R1, Op::Eq, &[R0]);
    assert!(vm.bool_val(R1), "{printed}");
}

#[test]
fn test_dispatch_fallback() {
    let (owner, _) = METHOD_TABLE.resolve(ObjType::Integer, Op::Hash).unwrap();
    assert_eq!(owner, ObjType::Integer);

    let mut vm = vm();
    assert_eq!(eval(&mut vm, "{1: 2}", Op::Sort, &[]), Err(ErrorKind::BadMethod));
    assert_eq!(eval(&mut vm, "#true", Op::Add, &["#true"]), Err(ErrorKind::BadMethod));
}

#[test]
fn test_sticky_error_chain() {
    let mut vm = vm();
    vm.news(R0, "[1, 2]");
    vm.newc_int(R1, 9);
    vm.call(R0, Op::At, &[R1]);
    vm.call(R0, Op::Size, &[]);
    vm.newc_int(R2, 1);
    assert_eq!(vm.errno(), Some(ErrorKind::Range));
    assert_eq!(vm.reg_type(R0), ObjType::Array);
    assert_eq!(vm.reg_type(R2), ObjType::Nil);
    vm.err_clr();
    vm.call(R0, Op::Size, &[]);
    assert_eq!(vm.integer_val(R0), 2);
}

#[test]
fn test_refcounts_balance_over_a_session() {
    let mut vm = vm();
    let baseline = vm.pool().used();
    for _ in 0..3 {
        let _ = eval(&mut vm, "[3, 1, 2]", Op::Sort, &[]);
        let _ = eval(&mut vm, "(1, 2)", Op::Append, &["(3)"]);
        let _ = eval(&mut vm, "{\"x\": 1}", Op::Keys, &[]);
        let _ = eval(&mut vm, "\"a,b\"", Op::Split, &["\",\""]);
    }
    for r in 0..8 {
        vm.newc_nil(r);
    }
    assert_eq!(vm.pool().used(), baseline);
    assert_eq!(vm.stack_depth(), 0);
}
