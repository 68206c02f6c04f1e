use super::dict::entry_pairs;
use super::{array_into, array_result, int_arg, slice_idxs};
use crate::{ErrorKind, Loc, ObjRef, ObjType, Op, OpResult, Ovm, Payload, Reg};

/// Arrays shorter than this are sorted in place by insertion.
const MERGE_SORT_MIN: usize = 12;

pub fn append(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let mut items = vm.array(vm.reg(r1))?.to_vec();
    items.extend_from_slice(vm.array(vm.arg(args, 0)?)?);
    array_result(vm, r1, &items)
}

fn index(vm: &Ovm, r1: Reg, args: &[Reg]) -> OpResult<(ObjRef, usize)> {
    let i = int_arg(vm, args, 0)?;
    let subject = vm.reg(r1);
    let size = vm.array(subject)?.len();
    let (start, n) = slice_idxs(size as i64, i, 1);
    match subject {
        Some(arr) if n == 1 => Ok((arr, start)),
        _ => Err(ErrorKind::Range),
    }
}

pub fn at(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let (arr, i) = index(vm, r1, args)?;
    let item = vm.get(Loc::Elem(arr, i));
    vm.assign(Loc::Reg(r1), item);
    Ok(())
}

/// Stores the second operand at the index given by the first. The subject
/// register keeps the array.
pub fn at_put(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let (arr, i) = index(vm, r1, args)?;
    let item = vm.arg(args, 1)?;
    vm.assign(Loc::Elem(arr, i), item);
    Ok(())
}

pub fn eq(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let subject = vm.reg(r1);
    let a = vm.items(subject)?.to_vec();
    let other = vm.arg(args, 0)?;
    let mut same = false;
    if vm.type_of(other) == vm.type_of(subject) {
        let b = vm.items(other)?.to_vec();
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
pub fn filter(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let selectors = vm.arg(args, 0)?;
    if !vm.is_list(selectors) {
        return Err(ErrorKind::BadType);
    }
    let flags = vm
        .list_items(selectors)?
        .into_iter()
        .map(|sel| vm.boolean(sel))
        .collect::<OpResult<Vec<_>>>()?;
    let items = vm.array(vm.reg(r1))?.to_vec();
    let kept: Vec<_> = items
        .into_iter()
        .zip(flags)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect();
    array_result(vm, r1, &kept)
}

pub fn reverse(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let mut items = vm.array(vm.reg(r1))?.to_vec();
    items.reverse();
    array_result(vm, r1, &items)
}

/// Element count; bucket count for a dictionary.
pub fn size(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let n = vm.items(vm.reg(r1))?.len();
    vm.make_int(Loc::Reg(r1), n as i64);
    Ok(())
}

pub fn slice(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let start = int_arg(vm, args, 0)?;
    let len = int_arg(vm, args, 1)?;
    let items = vm.array(vm.reg(r1))?;
    let (start, n) = slice_idxs(items.len() as i64, start, len);
    let items = items[start..start + n].to_vec();
    array_result(vm, r1, &items)
}

pub fn sort(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    sort_at(vm, Loc::Reg(r1))
}

/// Merge sort on two halves copied into scratch arrays. Ties take the left
/// element, so the sort is stable.
fn sort_at(vm: &mut Ovm, loc: Loc) -> OpResult {
    let subject = vm.get(loc);
    let items = vm.array(subject)?.to_vec();
    let Some(arr) = subject else {
        return Err(ErrorKind::BadType);
    };
    let n = items.len();
    if n < MERGE_SORT_MIN {
        return insertion_sort(vm, arr, n);
    }
    vm.framed(3, |vm, frame| {
        let half = n / 2;
        array_into(vm, frame.at(1), &items[..half])?;
        array_into(vm, frame.at(2), &items[half..])?;
        sort_at(vm, frame.at(1))?;
        sort_at(vm, frame.at(2))?;
        let left = vm.array(vm.get(frame.at(1)))?.to_vec();
        let right = vm.array(vm.get(frame.at(2)))?.to_vec();
        let out = vm.make_array(frame.at(0), n)?;
        let (mut i, mut j) = (0, 0);
        for k in 0..n {
            let take_right = if i == left.len() {
                true
            } else if j == right.len() {
                false
            } else {
                vm.test(Op::Gt, left[i], right[j])?
            };
            let item = if take_right {
                j += 1;
                right[j - 1]
            } else {
                i += 1;
                left[i - 1]
            };
            vm.assign(Loc::Elem(out, k), item);
        }
        let sorted = vm.get(frame.at(0));
        vm.assign(loc, sorted);
        Ok(())
    })
}

/// Adjacent-swap insertion sort, in place.
fn insertion_sort(vm: &mut Ovm, arr: ObjRef, n: usize) -> OpResult {
    for i in 1..n {
        let mut j = i;
        while j > 0 {
            let a = vm.get(Loc::Elem(arr, j - 1));
            let b = vm.get(Loc::Elem(arr, j));
            if !vm.test(Op::Gt, a, b)? {
                break;
            }
            if let Payload::Array(items) = vm.pool.payload_mut(arr) {
                items.swap(j - 1, j);
            }
            j -= 1;
        }
    }
    Ok(())
}

pub fn new(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let src = vm.arg(args, 0)?;
    match vm.type_of(src) {
        ObjType::Integer => {
            let n = vm.integer(src)?;
            let n = usize::try_from(n).map_err(|_| ErrorKind::BadValue)?;
            vm.make_array(Loc::Reg(r1), n)?;
            Ok(())
        }
        ObjType::String => {
            let text = vm.string(src)?.to_vec();
            vm.parse_as(Loc::Reg(r1), ObjType::Array, &text)
        }
        ObjType::Array => {
            let items = vm.array(src)?.to_vec();
            array_result(vm, r1, &items)
        }
        ObjType::Dict => {
            let pairs = entry_pairs(vm, src)?;
            array_result(vm, r1, &pairs)
        }
        ObjType::List | ObjType::Nil => {
            let items = vm.list_items(src)?;
            array_result(vm, r1, &items)
        }
        _ => Err(ErrorKind::BadType),
    }
}
