use super::list_result;
use crate::{ErrorKind, Loc, ObjRef, ObjType, Op, OpResult, Ovm, Reg, Value};

/// Locates `key` in its bucket. Returns the bucket index and, when found,
/// the link slot (bucket head or a cell's cdr) that holds the matching cell.
pub(crate) fn dict_find(vm: &mut Ovm, dict: ObjRef, key: Value) -> OpResult<(usize, Option<Loc>)> {
    let buckets = vm.dict(Some(dict))?.buckets.len();
    if buckets == 0 {
        return Err(ErrorKind::BadValue);
    }
    let h = vm.hash_value(key)?;
    let bucket = h.rem_euclid(buckets as i64) as usize;
    let mut link = Loc::Elem(dict, bucket);
    while let Some(cell) = vm.get(link) {
        let (entry, _) = vm.dptr(Some(cell))?;
        let (stored, _) = vm.dptr(entry)?;
        if vm.test(Op::Eq, stored, key)? {
            return Ok((bucket, Some(link)));
        }
        link = Loc::Cdr(cell);
    }
    Ok((bucket, None))
}

/// Replaces the value of an existing key, or prepends a new entry.
pub(crate) fn dict_insert(vm: &mut Ovm, dict: ObjRef, key: Value, value: Value) -> OpResult {
    match dict_find(vm, dict, key)? {
        (_, Some(link)) => {
            let (entry, _) = vm.dptr(vm.get(link))?;
            let entry = entry.ok_or(ErrorKind::BadValue)?;
            vm.assign(Loc::Cdr(entry), value);
        }
        (bucket, None) => {
            vm.framed(1, |vm, frame| {
                let entry = vm.make_pair(frame.at(0), key, value);
                let head = vm.get(Loc::Elem(dict, bucket));
                vm.make_list(Loc::Elem(dict, bucket), Some(entry), head);
            });
            vm.dict_mut(dict)?.count += 1;
        }
    }
    Ok(())
}

/// The (key, value) pairs in bucket order.
pub(crate) fn entry_pairs(vm: &Ovm, dict: Value) -> OpResult<Vec<Value>> {
    let mut pairs = Vec::with_capacity(vm.dict(dict)?.count);
    for head in vm.dict(dict)?.buckets.iter() {
        pairs.extend(vm.list_items(*head)?);
    }
    Ok(pairs)
}

fn subject(vm: &Ovm, r1: Reg) -> OpResult<ObjRef> {
    let v = vm.reg(r1);
    vm.dict(v)?;
    v.ok_or(ErrorKind::BadType)
}

/// Value stored under the operand key, or nil.
pub fn at(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let dict = subject(vm, r1)?;
    let key = vm.arg(args, 0)?;
    let value = match dict_find(vm, dict, key)? {
        (_, Some(link)) => {
            let (entry, _) = vm.dptr(vm.get(link))?;
            vm.dptr(entry)?.1
        }
        (_, None) => None,
    };
    vm.assign(Loc::Reg(r1), value);
    Ok(())
}

/// Inserts the second operand under the first. The subject register keeps
/// the dictionary.
pub fn at_put(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let dict = subject(vm, r1)?;
    let key = vm.arg(args, 0)?;
    let value = vm.arg(args, 1)?;
    dict_insert(vm, dict, key, value)
}

pub fn del(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let dict = subject(vm, r1)?;
    let key = vm.arg(args, 0)?;
    if let (_, Some(link)) = dict_find(vm, dict, key)? {
        let (_, next) = vm.dptr(vm.get(link))?;
        vm.assign(link, next);
        vm.dict_mut(dict)?.count -= 1;
    }
    Ok(())
}

pub fn count(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let n = vm.dict(vm.reg(r1))?.count;
    vm.make_int(Loc::Reg(r1), n as i64);
    Ok(())
}

pub fn keys(vm: &mut Ovm, r1: Reg, _args: &[Reg]) -> OpResult {
    let pairs = entry_pairs(vm, vm.reg(r1))?;
    let keys = pairs
        .into_iter()
        .map(|pair| vm.dptr(pair).map(|(key, _)| key))
        .collect::<OpResult<Vec<_>>>()?;
    list_result(vm, r1, &keys, None);
    Ok(())
}

/// True when the operand is a dictionary holding the same keys, each mapped
/// to an equal value. Bucket counts and bucket order do not matter.
pub fn eq(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let dict = subject(vm, r1)?;
    let other = vm.arg(args, 0)?;
    let mut same = false;
    if let (ObjType::Dict, Some(other)) = (vm.type_of(other), other) {
        same = vm.dict(Some(dict))?.count == vm.dict(Some(other))?.count;
        for pair in entry_pairs(vm, Some(dict))? {
            if !same {
                break;
            }
            let (key, value) = vm.dptr(pair)?;
            same = match dict_find(vm, other, key)? {
                (_, Some(link)) => {
                    let (entry, _) = vm.dptr(vm.get(link))?;
                    let stored = vm.dptr(entry)?.1;
                    vm.test(Op::Eq, value, stored)?
                }
                (_, None) => false,
            };
        }
    }
    vm.make_bool(Loc::Reg(r1), same);
    Ok(())
}

/// Merges the operand dictionary's entries into the subject.
pub fn append(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let dict = subject(vm, r1)?;
    let other = vm.arg(args, 0)?;
    let pairs = entry_pairs(vm, other)?;
    merge(vm, dict, &pairs)
}

fn merge(vm: &mut Ovm, dict: ObjRef, pairs: &[Value]) -> OpResult {
    for pair in pairs {
        if vm.type_of(*pair) != ObjType::Pair {
            return Err(ErrorKind::BadValue);
        }
        let (key, value) = vm.dptr(*pair)?;
        dict_insert(vm, dict, key, value)?;
    }
    Ok(())
}

/// A bucket count, a literal to parse, another dictionary to copy, or an
/// array or list of (key, value) pairs.
pub fn new(vm: &mut Ovm, r1: Reg, args: &[Reg]) -> OpResult {
    let src = vm.arg(args, 0)?;
    let pairs = match vm.type_of(src) {
        ObjType::Integer => {
            let n = vm.integer(src)?;
            let n = usize::try_from(n).map_err(|_| ErrorKind::BadValue)?;
            vm.make_dict(Loc::Reg(r1), n)?;
            return Ok(());
        }
        ObjType::String => {
            let text = vm.string(src)?.to_vec();
            return vm.parse_as(Loc::Reg(r1), ObjType::Dict, &text);
        }
        ObjType::Dict => entry_pairs(vm, src)?,
        ObjType::Array => vm.array(src)?.to_vec(),
        ObjType::List | ObjType::Nil => vm.list_items(src)?,
        _ => return Err(ErrorKind::BadType),
    };
    vm.framed(1, |vm, frame| {
        let dict = vm.make_dict(frame.at(0), 0)?;
        merge(vm, dict, &pairs)?;
        let dict = vm.get(frame.at(0));
        vm.assign(Loc::Reg(r1), dict);
        Ok(())
    })
}
