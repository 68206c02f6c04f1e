use super::rolling_hash;
use crate::parser::parse_float;
use crate::{ErrorKind, Loc, OpResult, Ovm, Payload, Reg};

fn float_binop(vm: &mut Ovm, r1: Reg, args: &[Reg], op: fn(f64, f64) -> f64) -> OpResult {
    let a = vm.float(vm.reg(r1))?;
    let b = vm.float(vm.arg(args, 0)?)?;
    vm.make_float(Loc::Reg(r1), op(a, b));
    Ok(())
}

fn float_compare(vm: &mut Ovm, r1: Reg, args: &[Reg], op: fn(f64, f64) -> bool) -> OpResult {
    let a = vm.float(vm.reg(r1))?;
    let b = vm.float(vm.arg(args, 0)?)?;
    vm.make_bool(Loc::Reg(r1), op(a, b));
    Ok(())
}

pub fn add(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    float_binop(vm, r1, args, |a, b| a + b)
}

pub fn sub(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    float_binop(vm, r1, args, |a, b| a - b)
}

pub fn mult(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    float_binop(vm, r1, args, |a, b| a * b)
}

pub fn div(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    float_binop(vm, r1, args, |a, b| a / b)
}

pub fn gt(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    float_compare(vm, r1, args, |a, b| a > b)
}

pub fn lt(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    float_compare(vm, r1, args, |a, b| a < b)
}

pub fn abs(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let a = vm.float(vm.reg(r1))?;
    vm.make_float(Loc::Reg(r1), a.abs());
    Ok(())
}

pub fn minus(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let a = vm.float(vm.reg(r1))?;
    vm.make_float(Loc::Reg(r1), -a);
    Ok(())
}

pub fn eq(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let a = vm.float(vm.reg(r1))?;
    let b = vm.float(vm.arg(args, 0)?).ok();
    vm.make_bool(Loc::Reg(r1), b == Some(a));
    Ok(())
}

pub fn hash(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let a = vm.float(vm.reg(r1))?;
    vm.make_int(Loc::Reg(r1), rolling_hash(&a.to_le_bytes()));
    Ok(())
}

pub fn new(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let src = vm.arg(args, 0)?;
    let f = match src.map(|r| vm.pool.payload(r)) {
        Some(Payload::Boolean(b)) => f64::from(u8::from(*b)),
        Some(Payload::Integer(i)) => *i as f64,
        Some(Payload::Float(f)) => *f,
        Some(Payload::String(s)) => parse_float(s).ok_or(ErrorKind::BadValue)?,
        _ => return Err(ErrorKind::BadType),
    };
    vm.make_float(Loc::Reg(r1), f);
    Ok(())
}
