use super::rolling_hash;
use crate::parser::parse_int;
use crate::{ErrorKind, Loc, OpResult, Ovm, Payload, Reg};

// Arithmetic wraps on overflow.

type IntBinop = fn(i64, i64) -> OpResult<i64>;
type IntCompare = fn(i64, i64) -> bool;

fn int_binop(vm: &mut Ovm, r1: Reg, args: &[Reg], op: IntBinop) -> OpResult {
    let a = vm.integer(vm.reg(r1))?;
    let b = vm.integer(vm.arg(args, 0)?)?;
    let res = op(a, b)?;
    vm.make_int(Loc::Reg(r1), res);
    Ok(())
}

fn int_compare(vm: &mut Ovm, r1: Reg, args: &[Reg], op: IntCompare) -> OpResult {
    let a = vm.integer(vm.reg(r1))?;
    let b = vm.integer(vm.arg(args, 0)?)?;
    vm.make_bool(Loc::Reg(r1), op(a, b));
    Ok(())
}

fn int_unop(vm: &mut Ovm, r1: Reg, op: fn(i64) -> i64) -> OpResult {
    let a = vm.integer(vm.reg(r1))?;
    vm.make_int(Loc::Reg(r1), op(a));
    Ok(())
}

pub fn add(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    int_binop(vm, r1, args, |a, b| Ok(a.wrapping_add(b)))
}

pub fn sub(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    int_binop(vm, r1, args, |a, b| Ok(a.wrapping_sub(b)))
}

pub fn mult(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    int_binop(vm, r1, args, |a, b| Ok(a.wrapping_mul(b)))
}

pub fn div(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    int_binop(vm, r1, args, |a, b| {
        if b == 0 {
            return Err(ErrorKind::BadValue);
        }
        Ok(a.wrapping_div(b))
    })
}

pub fn modulo(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    int_binop(vm, r1, args, |a, b| {
        if b == 0 {
            return Err(ErrorKind::BadValue);
        }
        Ok(a.wrapping_rem(b))
    })
}

pub fn and(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    int_binop(vm, r1, args, |a, b| Ok(a & b))
}

pub fn or(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    int_binop(vm, r1, args, |a, b| Ok(a | b))
}

pub fn xor(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    int_binop(vm, r1, args, |a, b| Ok(a ^ b))
}

pub fn gt(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    int_compare(vm, r1, args, |a, b| a > b)
}

pub fn lt(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    int_compare(vm, r1, args, |a, b| a < b)
}

pub fn abs(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    int_unop(vm, r1, i64::wrapping_abs)
}

pub fn minus(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    int_unop(vm, r1, i64::wrapping_neg)
}

/// False for an operand of another type.
pub fn eq(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let a = vm.integer(vm.reg(r1))?;
    let b = vm.integer(vm.arg(args, 0)?).ok();
    vm.make_bool(Loc::Reg(r1), b == Some(a));
    Ok(())
}

pub fn hash(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let a = vm.integer(vm.reg(r1))?;
    vm.make_int(Loc::Reg(r1), rolling_hash(&a.to_le_bytes()));
    Ok(())
}

pub fn new(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let src = vm.arg(args, 0)?;
    let i = match src.map(|r| vm.pool.payload(r)) {
        Some(Payload::Boolean(b)) => i64::from(*b),
        Some(Payload::Integer(i)) => *i,
        Some(Payload::Float(f)) => *f as i64,
        Some(Payload::String(s)) => parse_int(s).ok_or(ErrorKind::BadValue)?,
        _ => return Err(ErrorKind::BadType),
    };
    vm.make_int(Loc::Reg(r1), i);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{ErrorKind, ObjType, Op, Ovm, OvmCreateInfo, R0, R1};

    fn vm() -> Ovm {
        Ovm::new(OvmCreateInfo::default())
    }

    fn binop(vm: &mut Ovm, a: i64, op: Op, b: i64) -> Result<i64, ErrorKind> {
        vm.newc_int(R0, a);
        vm.newc_int(R1, b);
        vm.try_call(R0, op, &[R1])?;
        Ok(vm.integer_val(R0))
    }

    #[test]
    fn test_arithmetic() {
        let mut vm = vm();
        assert_eq!(binop(&mut vm, 2, Op::Add, 3), Ok(5));
        assert_eq!(binop(&mut vm, 2, Op::Sub, 3), Ok(-1));
        assert_eq!(binop(&mut vm, 6, Op::Mult, 7), Ok(42));
        assert_eq!(binop(&mut vm, 7, Op::Div, 2), Ok(3));
        assert_eq!(binop(&mut vm, -7, Op::Mod, 3), Ok(-1));
        assert_eq!(binop(&mut vm, 0b1100, Op::And, 0b1010), Ok(0b1000));
        assert_eq!(binop(&mut vm, 0b1100, Op::Or, 0b1010), Ok(0b1110));
        assert_eq!(binop(&mut vm, 0b1100, Op::Xor, 0b1010), Ok(0b0110));
        assert_eq!(binop(&mut vm, i64::MAX, Op::Add, 1), Ok(i64::MIN));
    }

    #[test]
    fn test_division_by_zero() {
        let mut vm = vm();
        assert_eq!(binop(&mut vm, 1, Op::Div, 0), Err(ErrorKind::BadValue));
        vm.err_clr();
        assert_eq!(binop(&mut vm, 1, Op::Mod, 0), Err(ErrorKind::BadValue));
    }

    #[test]
    fn test_comparisons() {
        let mut vm = vm();
        vm.newc_int(R0, 3);
        vm.newc_int(R1, 2);
        vm.call(R0, Op::Gt, &[R1]);
        assert!(vm.bool_val(R0));
        vm.newc_int(R0, 3);
        vm.call(R0, Op::Lt, &[R1]);
        assert!(!vm.bool_val(R0));
        vm.newc_int(R0, 2);
        vm.call(R0, Op::Eq, &[R1]);
        assert!(vm.bool_val(R0));
    }

    #[test]
    fn test_mixed_types() {
        let mut vm = vm();
        vm.newc_int(R0, 3);
        vm.newc_float(R1, 3.0);
        assert_eq!(vm.try_call(R0, Op::Add, &[R1]), Err(ErrorKind::BadType));
        vm.err_clr();
        vm.call(R0, Op::Eq, &[R1]);
        assert!(!vm.bool_val(R0));
    }

    #[test]
    fn test_unary() {
        let mut vm = vm();
        vm.newc_int(R0, -4);
        vm.call(R0, Op::Abs, &[]);
        assert_eq!(vm.integer_val(R0), 4);
        vm.call(R0, Op::Minus, &[]);
        assert_eq!(vm.integer_val(R0), -4);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let mut vm = vm();
        vm.newc_int(R0, 12345);
        vm.call(R0, Op::Hash, &[]);
        let h = vm.integer_val(R0);
        vm.newc_int(R0, 12345);
        vm.call(R0, Op::Hash, &[]);
        assert_eq!(vm.integer_val(R0), h);
        assert!(h >= 0);
    }

    #[test]
    fn test_new_coerces() {
        let mut vm = vm();
        vm.newc_float(R1, -2.9);
        vm.new_value(R0, ObjType::Integer, &[R1]);
        assert_eq!(vm.integer_val(R0), -2);
        vm.newc_bool(R1, true);
        vm.new_value(R0, ObjType::Integer, &[R1]);
        assert_eq!(vm.integer_val(R0), 1);
        vm.newc_str(R1, "0x1F");
        vm.new_value(R0, ObjType::Integer, &[R1]);
        assert_eq!(vm.integer_val(R0), 31);
        vm.newc_str(R1, "1.5");
        vm.new_value(R0, ObjType::Integer, &[R1]);
        assert_eq!(vm.take_error(), Err(ErrorKind::BadValue));
    }
}
