use super::{ListBuilder, int_arg, rolling_hash, slice_idxs};
use crate::error::try_bytes;
use crate::{ErrorKind, Loc, OpResult, Ovm, Reg, Value};

fn subject(vm: &Ovm, r1: Reg) -> OpResult<&[u8]> {
    vm.string(vm.reg(r1))
}

fn make_slice(vm: &mut Ovm, r1: Reg, start: i64, len: i64) -> OpResult {
    let s = subject(vm, r1)?;
    let (start, len) = slice_idxs(s.len() as i64, start, len);
    let mut buf = try_bytes(len)?;
    buf.extend_from_slice(&s[start..start + len]);
    vm.make_string(Loc::Reg(r1), buf);
    Ok(())
}

pub fn append(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let a = subject(vm, r1)?;
    let b = vm.string(vm.arg(args, 0)?)?;
    let mut buf = try_bytes(a.len() + b.len())?;
    buf.extend_from_slice(a);
    buf.extend_from_slice(b);
    vm.make_string(Loc::Reg(r1), buf);
    Ok(())
}

/// Single character; empty when out of range.
pub fn at(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let i = int_arg(vm, args, 0)?;
    make_slice(vm, r1, i, 1)
}

pub fn slice(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let start = int_arg(vm, args, 0)?;
    let len = int_arg(vm, args, 1)?;
    make_slice(vm, r1, start, len)
}

pub fn eq(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let a = subject(vm, r1)?;
    let same = vm.string(vm.arg(args, 0)?).is_ok_and(|b| a == b);
    vm.make_bool(Loc::Reg(r1), same);
    Ok(())
}

pub fn gt(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let a = subject(vm, r1)?;
    let b = vm.string(vm.arg(args, 0)?)?;
    let res = a > b;
    vm.make_bool(Loc::Reg(r1), res);
    Ok(())
}

pub fn lt(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let a = subject(vm, r1)?;
    let b = vm.string(vm.arg(args, 0)?)?;
    let res = a < b;
    vm.make_bool(Loc::Reg(r1), res);
    Ok(())
}

pub fn hash(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let h = rolling_hash(subject(vm, r1)?);
    vm.make_int(Loc::Reg(r1), h);
    Ok(())
}

pub fn reverse(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let s = subject(vm, r1)?;
    let mut buf = try_bytes(s.len())?;
    buf.extend(s.iter().rev());
    vm.make_string(Loc::Reg(r1), buf);
    Ok(())
}

pub fn size(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let n = subject(vm, r1)?.len();
    vm.make_int(Loc::Reg(r1), n as i64);
    Ok(())
}

/// The subject is the separator; the operand a list whose elements are
/// joined. Strings are copied as-is, anything else is rendered.
pub fn join(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let list = vm.arg(args, 0)?;
    if !vm.is_list(list) {
        return Err(ErrorKind::BadType);
    }
    let items = vm.list_items(list)?;
    let sep = subject(vm, r1)?.to_vec();
    let mut buf = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            buf.extend_from_slice(&sep);
        }
        match vm.string(item) {
            Ok(s) => buf.extend_from_slice(s),
            Err(_) => {
                let rendered = vm.tostring(item)?;
                buf.extend_from_slice(&rendered);
            }
        }
    }
    vm.make_string(Loc::Reg(r1), buf);
    Ok(())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// List of the pieces between occurrences of the separator operand.
pub fn split(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let s = subject(vm, r1)?;
    let sep = vm.string(vm.arg(args, 0)?)?;
    if sep.is_empty() {
        return Err(ErrorKind::BadValue);
    }
    let mut pieces = Vec::new();
    let mut rest = s;
    loop {
        match find(rest, sep) {
            Some(at) => {
                pieces.push(rest[..at].to_vec());
                rest = &rest[at + sep.len()..];
            }
            None => {
                pieces.push(rest.to_vec());
                break;
            }
        }
    }
    vm.framed(2, |vm, frame| {
        let mut list = ListBuilder::new(frame.at(0));
        for piece in pieces {
            let s = vm.make_string(frame.at(1), piece);
            list.push(vm, Some(s));
        }
        let head = vm.get(frame.at(0));
        vm.assign(Loc::Reg(r1), head);
    });
    Ok(())
}

/// Literal rendering of any value.
pub fn new(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let src: Value = vm.arg(args, 0)?;
    let rendered = vm.tostring(src)?;
    vm.make_string(Loc::Reg(r1), rendered);
    Ok(())
}
