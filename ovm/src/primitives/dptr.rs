use super::{int_arg, list_result, slice_idxs};
use crate::{ErrorKind, Loc, ObjType, Op, OpResult, Ovm, Reg};

pub fn car(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let (car, _) = vm.dptr(vm.reg(r1))?;
    vm.assign(Loc::Reg(r1), car);
    Ok(())
}

pub fn cdr(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let (_, cdr) = vm.dptr(vm.reg(r1))?;
    vm.assign(Loc::Reg(r1), cdr);
    Ok(())
}

// ---- pair ------------------------------------------------------------------

pub fn pair_eq(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let (a_car, a_cdr) = vm.dptr(vm.reg(r1))?;
    let other = vm.arg(args, 0)?;
    let same = match vm.type_of(other) {
        ObjType::Pair => {
            let (b_car, b_cdr) = vm.dptr(other)?;
            vm.test(Op::Eq, a_car, b_car)? && vm.test(Op::Eq, a_cdr, b_cdr)?
        }
        _ => false,
    };
    vm.make_bool(Loc::Reg(r1), same);
    Ok(())
}

pub fn pair_hash(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let (car, cdr) = vm.dptr(vm.reg(r1))?;
    let h = vm.hash_value(car)?.wrapping_add(vm.hash_value(cdr)?);
    vm.make_int(Loc::Reg(r1), h);
    Ok(())
}

pub fn pair_reverse(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let (car, cdr) = vm.dptr(vm.reg(r1))?;
    vm.make_pair(Loc::Reg(r1), cdr, car);
    Ok(())
}

/// One string operand to parse, or two operands for car and cdr.
pub fn pair_new(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    match args.len() {
        1 => {
            let text = vm.string(vm.arg(args, 0)?)?.to_vec();
            vm.parse_as(Loc::Reg(r1), ObjType::Pair, &text)
        }
        2 => {
            let car = vm.arg(args, 0)?;
            let cdr = vm.arg(args, 1)?;
            vm.make_pair(Loc::Reg(r1), car, cdr);
            Ok(())
        }
        _ => Err(ErrorKind::BadValue),
    }
}

// ---- list ------------------------------------------------------------------

/// Copies the subject's cells; the operand list becomes the shared tail.
pub fn list_append(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let tail = vm.arg(args, 0)?;
    if !vm.is_list(tail) {
        return Err(ErrorKind::BadType);
    }
    let items = vm.list_items(vm.reg(r1))?;
    list_result(vm, r1, &items, tail);
    Ok(())
}

pub fn list_at(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let i = int_arg(vm, args, 0)?;
    let items = vm.list_items(vm.reg(r1))?;
    let (start, n) = slice_idxs(items.len() as i64, i, 1);
    if n != 1 {
        return Err(ErrorKind::Range);
    }
    vm.assign(Loc::Reg(r1), items[start]);
    Ok(())
}

pub fn list_eq(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let other = vm.arg(args, 0)?;
    let mut same = vm.type_of(other) == ObjType::List;
    if same {
        let a = vm.list_items(vm.reg(r1))?;
        let b = vm.list_items(other)?;
        same = a.len() == b.len();
        for (x, y) in a.into_iter().zip(b) {
            if !same {
                break;
            }
            same = vm.test(Op::Eq, x, y)?;
        }
    }
    vm.make_bool(Loc::Reg(r1), same);
    Ok(())
}

/// Keeps the elements whose counterpart in the boolean operand list is true.
pub fn list_filter(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let selectors = vm.arg(args, 0)?;
    if !vm.is_list(selectors) {
        return Err(ErrorKind::BadType);
    }
    let items = vm.list_items(vm.reg(r1))?;
    let selectors = vm.list_items(selectors)?;
    let mut kept = Vec::new();
    for (item, sel) in items.into_iter().zip(selectors) {
        if vm.boolean(sel).map_err(|_| ErrorKind::BadValue)? {
            kept.push(item);
        }
    }
    list_result(vm, r1, &kept, None);
    Ok(())
}

/// Sum of the element hashes.
pub fn list_hash(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let items = vm.list_items(vm.reg(r1))?;
    let mut h = 0i64;
    for item in items {
        h = h.wrapping_add(vm.hash_value(item)?);
    }
    vm.make_int(Loc::Reg(r1), h);
    Ok(())
}

pub fn list_reverse(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let mut items = vm.list_items(vm.reg(r1))?;
    items.reverse();
    list_result(vm, r1, &items, None);
    Ok(())
}

pub fn list_size(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let n = vm.list_items(vm.reg(r1))?.len();
    vm.make_int(Loc::Reg(r1), n as i64);
    Ok(())
}

pub fn list_slice(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let start = int_arg(vm, args, 0)?;
    let len = int_arg(vm, args, 1)?;
    let items = vm.list_items(vm.reg(r1))?;
    let (start, n) = slice_idxs(items.len() as i64, start, len);
    list_result(vm, r1, &items[start..start + n], None);
    Ok(())
}

/// A string to parse or an array to copy; two operands give car and cdr,
/// where cdr must itself be a list.
pub fn list_new(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    match args.len() {
        1 => {
            let src = vm.arg(args, 0)?;
            match vm.type_of(src) {
                ObjType::String => {
                    let text = vm.string(src)?.to_vec();
                    vm.parse_as(Loc::Reg(r1), ObjType::List, &text)
                }
                ObjType::Array => {
                    let items = vm.array(src)?.to_vec();
                    list_result(vm, r1, &items, None);
                    Ok(())
                }
                _ => Err(ErrorKind::BadType),
            }
        }
        2 => {
            let car = vm.arg(args, 0)?;
            let cdr = vm.arg(args, 1)?;
            if !vm.is_list(cdr) {
                return Err(ErrorKind::BadValue);
            }
            vm.make_list(Loc::Reg(r1), car, cdr);
            Ok(())
        }
        _ => Err(ErrorKind::BadValue),
    }
}
