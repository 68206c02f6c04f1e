use super::rolling_hash;
use crate::parser::parse_bool;
use crate::{ErrorKind, Loc, OpResult, Ovm, Payload, Reg};

type BoolOp = fn(bool, bool) -> bool;

fn logic_binop(vm: &mut Ovm, r1: Reg, args: &[Reg], op: BoolOp) -> OpResult {
    let a = vm.boolean(vm.reg(r1))?;
    let b = vm.boolean(vm.arg(args, 0)?)?;
    vm.make_bool(Loc::Reg(r1), op(a, b));
    Ok(())
}

pub fn and(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    logic_binop(vm, r1, args, |a, b| a && b)
}

pub fn or(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    logic_binop(vm, r1, args, |a, b| a || b)
}

pub fn xor(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    logic_binop(vm, r1, args, |a, b| a ^ b)
}

pub fn not(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let a = vm.boolean(vm.reg(r1))?;
    vm.make_bool(Loc::Reg(r1), !a);
    Ok(())
}

/// False, not an error, for a non-boolean operand.
pub fn eq(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let a = vm.boolean(vm.reg(r1))?;
    let b = vm.boolean(vm.arg(args, 0)?).ok();
    vm.make_bool(Loc::Reg(r1), b == Some(a));
    Ok(())
}

pub fn hash(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let a = vm.boolean(vm.reg(r1))?;
    vm.make_int(Loc::Reg(r1), rolling_hash(&[u8::from(a)]));
    Ok(())
}

pub fn new(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let src = vm.arg(args, 0)?;
    let b = match src.map(|r| vm.pool.payload(r)) {
        Some(Payload::Boolean(b)) => *b,
        Some(Payload::Integer(i)) => *i != 0,
        Some(Payload::Float(f)) => *f != 0.0,
        Some(Payload::String(s)) => parse_bool(s).ok_or(ErrorKind::BadValue)?,
        _ => return Err(ErrorKind::BadType),
    };
    vm.make_bool(Loc::Reg(r1), b);
    Ok(())
}
