use crate::dispatch::MethodEntry as M;
use crate::{ErrorKind, Loc, ObjRef, ObjType, Op, OpResult, Ovm, Reg, Value};

mod array;
mod boolean;
mod dict;
mod dptr;
mod float;
mod integer;
mod nil;
mod string;

pub(crate) use dict::{dict_find, dict_insert};

use ObjType as T;

pub const METHODS: &[M] = &[
    M::new(T::Nil, Op::Append, nil::append),
    M::new(T::Nil, Op::At, nil::at),
    M::new(T::Nil, Op::Eq, nil::eq),
    M::new(T::Nil, Op::Filter, nil::filter),
    M::new(T::Nil, Op::Hash, nil::hash),
    M::new(T::Nil, Op::Reverse, nil::reverse),
    M::new(T::Nil, Op::Size, nil::size),
    M::new(T::Nil, Op::Slice, nil::slice),
    M::new(T::Boolean, Op::And, boolean::and),
    M::new(T::Boolean, Op::Eq, boolean::eq),
    M::new(T::Boolean, Op::Hash, boolean::hash),
    M::new(T::Boolean, Op::Not, boolean::not),
    M::new(T::Boolean, Op::Or, boolean::or),
    M::new(T::Boolean, Op::Xor, boolean::xor),
    M::new(T::Integer, Op::Abs, integer::abs),
    M::new(T::Integer, Op::Add, integer::add),
    M::new(T::Integer, Op::And, integer::and),
    M::new(T::Integer, Op::Div, integer::div),
    M::new(T::Integer, Op::Eq, integer::eq),
    M::new(T::Integer, Op::Gt, integer::gt),
    M::new(T::Integer, Op::Hash, integer::hash),
    M::new(T::Integer, Op::Lt, integer::lt),
    M::new(T::Integer, Op::Minus, integer::minus),
    M::new(T::Integer, Op::Mod, integer::modulo),
    M::new(T::Integer, Op::Mult, integer::mult),
    M::new(T::Integer, Op::Or, integer::or),
    M::new(T::Integer, Op::Sub, integer::sub),
    M::new(T::Integer, Op::Xor, integer::xor),
    M::new(T::Float, Op::Abs, float::abs),
    M::new(T::Float, Op::Add, float::add),
    M::new(T::Float, Op::Div, float::div),
    M::new(T::Float, Op::Eq, float::eq),
    M::new(T::Float, Op::Gt, float::gt),
    M::new(T::Float, Op::Hash, float::hash),
    M::new(T::Float, Op::Lt, float::lt),
    M::new(T::Float, Op::Minus, float::minus),
    M::new(T::Float, Op::Mult, float::mult),
    M::new(T::Float, Op::Sub, float::sub),
    M::new(T::String, Op::Append, string::append),
    M::new(T::String, Op::At, string::at),
    M::new(T::String, Op::Eq, string::eq),
    M::new(T::String, Op::Gt, string::gt),
    M::new(T::String, Op::Hash, string::hash),
    M::new(T::String, Op::Join, string::join),
    M::new(T::String, Op::Lt, string::lt),
    M::new(T::String, Op::Reverse, string::reverse),
    M::new(T::String, Op::Size, string::size),
    M::new(T::String, Op::Slice, string::slice),
    M::new(T::String, Op::Split, string::split),
    M::new(T::Dptr, Op::Car, dptr::car),
    M::new(T::Dptr, Op::Cdr, dptr::cdr),
    M::new(T::Pair, Op::Eq, dptr::pair_eq),
    M::new(T::Pair, Op::Hash, dptr::pair_hash),
    M::new(T::Pair, Op::Reverse, dptr::pair_reverse),
    M::new(T::List, Op::Append, dptr::list_append),
    M::new(T::List, Op::At, dptr::list_at),
    M::new(T::List, Op::Eq, dptr::list_eq),
    M::new(T::List, Op::Filter, dptr::list_filter),
    M::new(T::List, Op::Hash, dptr::list_hash),
    M::new(T::List, Op::Reverse, dptr::list_reverse),
    M::new(T::List, Op::Size, dptr::list_size),
    M::new(T::List, Op::Slice, dptr::list_slice),
    M::new(T::Array, Op::Append, array::append),
    M::new(T::Array, Op::At, array::at),
    M::new(T::Array, Op::AtPut, array::at_put),
    M::new(T::Array, Op::Eq, array::eq),
    M::new(T::Array, Op::Filter, array::filter),
    M::new(T::Array, Op::Reverse, array::reverse),
    M::new(T::Array, Op::Size, array::size),
    M::new(T::Array, Op::Slice, array::slice),
    M::new(T::Array, Op::Sort, array::sort),
    M::new(T::Dict, Op::Append, dict::append),
    M::new(T::Dict, Op::At, dict::at),
    M::new(T::Dict, Op::AtPut, dict::at_put),
    M::new(T::Dict, Op::Count, dict::count),
    M::new(T::Dict, Op::Del, dict::del),
    M::new(T::Dict, Op::Eq, dict::eq),
    M::new(T::Dict, Op::Keys, dict::keys),
    M::new(T::Dict, Op::Filter, bad_method),
    M::new(T::Dict, Op::Reverse, bad_method),
    M::new(T::Dict, Op::Slice, bad_method),
    M::new(T::Dict, Op::Sort, bad_method),
];

/// Blocks an inherited handler.
fn bad_method(_vm: &mut Ovm, _r1: Reg, _args: &[Reg]) -> OpResult {
    Err(ErrorKind::BadMethod)
}

/// Coercing constructor behind `Ovm::new_value`.
pub(crate) fn construct(vm: &mut Ovm, r1: Reg, ty: ObjType, args: &[Reg]) -> OpResult {
    match ty {
        T::Nil => {
            vm.put(Loc::Reg(r1), None);
            Ok(())
        }
        T::Boolean => boolean::new(vm, r1, args),
        T::Integer => integer::new(vm, r1, args),
        T::Float => float::new(vm, r1, args),
        T::String => string::new(vm, r1, args),
        T::Pair => dptr::pair_new(vm, r1, args),
        T::List => dptr::list_new(vm, r1, args),
        T::Array => array::new(vm, r1, args),
        T::Dict => dict::new(vm, r1, args),
        _ => Err(ErrorKind::BadType),
    }
}

/// Resolves `(start, len)` against a collection of `size` elements.
///
/// A negative `start` counts from the end. A negative `len` selects the
/// `-len` elements ending at `start`. The result is clamped to the
/// collection and is `(0, 0)` when nothing overlaps.
#[must_use]
pub fn slice_idxs(size: i64, start: i64, len: i64) -> (usize, usize) {
    let mut start = start;
    if start < 0 {
        start = start.saturating_add(size);
    }
    let mut end = start.saturating_add(len);
    if end < start {
        (start, end) = (end.saturating_add(1), start.saturating_add(1));
    }
    if end < 0 || start >= size {
        return (0, 0);
    }
    let start = start.max(0);
    let end = end.min(size);
    (start as usize, (end - start) as usize)
}

/// Cheap rolling hash over raw bytes.
#[must_use]
pub fn rolling_hash(bytes: &[u8]) -> i64 {
    let h = bytes.iter().fold(0u32, |h, &b| {
        (h.wrapping_mul(19) / 7).wrapping_add(u32::from(b))
    });
    i64::from(h)
}

/// Integer operand `i`, BAD_TYPE otherwise.
fn int_arg(vm: &Ovm, args: &[Reg], i: usize) -> OpResult<i64> {
    let v = vm.arg(args, i)?;
    vm.integer(v)
}

/// Builds an array holding `items` in `loc`.
pub(crate) fn array_into(vm: &mut Ovm, loc: Loc, items: &[Value]) -> OpResult<ObjRef> {
    let arr = vm.make_array(loc, items.len())?;
    for (i, item) in items.iter().enumerate() {
        vm.assign(Loc::Elem(arr, i), *item);
    }
    Ok(arr)
}

/// Replaces the subject with a new array of `items`, which may be children
/// of the subject itself.
pub(crate) fn array_result(vm: &mut Ovm, r1: Reg, items: &[Value]) -> OpResult {
    vm.framed(1, |vm, frame| {
        array_into(vm, frame.at(0), items)?;
        let arr = vm.get(frame.at(0));
        vm.assign(Loc::Reg(r1), arr);
        Ok(())
    })
}

/// Replaces the subject with a new list of `items` ending in `tail`.
pub(crate) fn list_result(vm: &mut Ovm, r1: Reg, items: &[Value], tail: Value) {
    vm.framed(1, |vm, frame| {
        let mut list = ListBuilder::new(frame.at(0));
        for item in items {
            list.push(vm, *item);
        }
        list.finish(vm, tail);
        let head = vm.get(frame.at(0));
        vm.assign(Loc::Reg(r1), head);
    });
}

/// Appends cells to a list whose head lives in a frame slot.
pub(crate) struct ListBuilder {
    tail: Loc,
}

impl ListBuilder {
    pub(crate) fn new(head: Loc) -> Self {
        Self { tail: head }
    }

    pub(crate) fn push(&mut self, vm: &mut Ovm, item: Value) {
        let cell = vm.make_list(self.tail, item, None);
        self.tail = Loc::Cdr(cell);
    }

    /// Shares `rest` as the tail of the list built so far.
    pub(crate) fn finish(self, vm: &mut Ovm, rest: Value) {
        vm.assign(self.tail, rest);
    }
}
