use log::{debug, trace};

use crate::dispatch::METHOD_TABLE;
use crate::error::{try_buffer, try_bytes};
use crate::registry::DEFAULT_DICT_SIZE;
use crate::{
    DictVal, ErrorHook, ErrorKind, Frame, ObjRef, ObjType, Op, OpResult, OperandStack, Payload,
    Pool, Value, primitives,
};

pub type Reg = usize;

pub const NUM_REGS: usize = 8;
pub const R0: Reg = 0;
pub const R1: Reg = 1;
pub const R2: Reg = 2;
pub const R3: Reg = 3;
pub const R4: Reg = 4;
pub const R5: Reg = 5;
pub const R6: Reg = 6;
pub const R7: Reg = 7;

/// Address of a value slot the VM can assign into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Loc {
    Reg(Reg),
    Stack(usize),
    Work(usize),
    Class(ObjType),
    Car(ObjRef),
    Cdr(ObjRef),
    /// Array element or dictionary bucket head
    Elem(ObjRef, usize),
}

#[derive(Debug, Clone)]
pub struct OvmCreateInfo {
    pub pool_size: usize,
    pub work_size: usize,
    pub stack_size: usize,
}

impl Default for OvmCreateInfo {
    fn default() -> Self {
        Self {
            pool_size: 1024,
            work_size: 16,
            stack_size: 256,
        }
    }
}

pub struct Ovm {
    pub(crate) pool: Pool,
    regs: [Value; NUM_REGS],
    work: Box<[Value]>,
    pub(crate) stack: OperandStack,
    classes: [Value; ObjType::COUNT],
    errno: Option<ErrorKind>,
    err_hook: Option<ErrorHook>,
}

impl Ovm {
    /// Sets up the pool, work area and operand stack, then creates one empty
    /// registry dictionary per concrete type.
    ///
    /// # Panics
    /// If the pool cannot hold the registry.
    #[must_use]
    pub fn new(info: OvmCreateInfo) -> Self {
        let concrete = ObjType::ALL.iter().filter(|ty| !ty.is_abstract()).count();
        assert!(
            info.pool_size >= concrete,
            "pool of {} slots cannot hold the class registry",
            info.pool_size
        );
        let mut vm = Self {
            pool: Pool::new(info.pool_size),
            regs: [None; NUM_REGS],
            work: vec![None; info.work_size].into_boxed_slice(),
            stack: OperandStack::new(info.stack_size),
            classes: [None; ObjType::COUNT],
            errno: None,
            err_hook: None,
        };
        for ty in ObjType::ALL.into_iter().filter(|ty| !ty.is_abstract()) {
            let dict = DictVal {
                buckets: vec![None; DEFAULT_DICT_SIZE].into_boxed_slice(),
                count: 0,
            };
            vm.make(Loc::Class(ty), Payload::Dict(dict));
        }
        debug!(
            "ovm ready: {} pool slots, {} work slots, {} stack slots",
            info.pool_size, info.work_size, info.stack_size
        );
        vm
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    // ---- sticky error ----------------------------------------------------

    #[must_use]
    pub fn errno(&self) -> Option<ErrorKind> {
        self.errno
    }

    pub fn err_clr(&mut self) {
        self.errno = None;
    }

    /// The sticky field as a `Result`, left untouched.
    pub fn check(&self) -> OpResult {
        self.errno.map_or(Ok(()), Err)
    }

    /// The sticky field as a `Result`, cleared afterwards.
    pub fn take_error(&mut self) -> OpResult {
        self.errno.take().map_or(Ok(()), Err)
    }

    pub fn set_err_hook(&mut self, hook: impl FnMut(ErrorKind) + 'static) {
        self.err_hook = Some(Box::new(hook));
    }

    pub fn clear_err_hook(&mut self) {
        self.err_hook = None;
    }

    pub(crate) fn raise(&mut self, kind: ErrorKind) {
        debug!("error raised: {kind}");
        self.errno = Some(kind);
        if let Some(hook) = self.err_hook.as_mut() {
            hook(kind);
        }
    }

    /// Runs a host-facing operation unless an error is pending, recording any
    /// failure in the sticky field.
    pub(crate) fn run(&mut self, f: impl FnOnce(&mut Self) -> OpResult) {
        if self.errno.is_some() {
            return;
        }
        if let Err(kind) = f(self) {
            self.raise(kind);
        }
    }

    // ---- reference counting ---------------------------------------------

    pub fn retain(&mut self, v: Value) {
        if let Some(r) = v {
            self.pool.inc_ref(r);
        }
    }

    /// Drops one reference. A value reaching zero is finalized and its slot
    /// recycled; children are released the same way without recursion.
    pub fn release(&mut self, v: Value) {
        let Some(mut r) = v else {
            return;
        };
        let mut pending = Vec::new();
        loop {
            if self.pool.dec_ref(r) == 0 {
                self.pool.recycle(r).finalize(&mut pending);
            }
            match pending.pop() {
                Some(next) => r = next,
                None => break,
            }
        }
    }

    fn slot_ref(&self, loc: Loc) -> &Value {
        match loc {
            Loc::Reg(r) => &self.regs[check_reg(r)],
            Loc::Stack(i) => self.stack.slot(i),
            Loc::Work(i) => &self.work[i],
            Loc::Class(ty) => &self.classes[ty as usize],
            Loc::Car(o) => match self.pool.payload(o) {
                Payload::Pair(car, _) | Payload::List(car, _) => car,
                other => panic!("car of a {}", other.obj_type()),
            },
            Loc::Cdr(o) => match self.pool.payload(o) {
                Payload::Pair(_, cdr) | Payload::List(_, cdr) => cdr,
                other => panic!("cdr of a {}", other.obj_type()),
            },
            Loc::Elem(o, i) => match self.pool.payload(o) {
                Payload::Array(items) => &items[i],
                Payload::Dict(dict) => &dict.buckets[i],
                other => panic!("element of a {}", other.obj_type()),
            },
        }
    }

    fn slot_mut(&mut self, loc: Loc) -> &mut Value {
        match loc {
            Loc::Reg(r) => &mut self.regs[check_reg(r)],
            Loc::Stack(i) => self.stack.slot_mut(i),
            Loc::Work(i) => &mut self.work[i],
            Loc::Class(ty) => &mut self.classes[ty as usize],
            Loc::Car(o) => match self.pool.payload_mut(o) {
                Payload::Pair(car, _) | Payload::List(car, _) => car,
                other => panic!("car of a {}", other.obj_type()),
            },
            Loc::Cdr(o) => match self.pool.payload_mut(o) {
                Payload::Pair(_, cdr) | Payload::List(_, cdr) => cdr,
                other => panic!("cdr of a {}", other.obj_type()),
            },
            Loc::Elem(o, i) => match self.pool.payload_mut(o) {
                Payload::Array(items) => &mut items[i],
                Payload::Dict(dict) => &mut dict.buckets[i],
                other => panic!("element of a {}", other.obj_type()),
            },
        }
    }

    /// Reads a slot without touching counts.
    #[must_use]
    pub fn get(&self, loc: Loc) -> Value {
        *self.slot_ref(loc)
    }

    /// Stores an owned reference, releasing the previous occupant.
    pub fn put(&mut self, loc: Loc, v: Value) {
        let old = std::mem::replace(self.slot_mut(loc), v);
        self.release(old);
    }

    /// Retains `v`, then replaces the slot's occupant with it.
    pub fn assign(&mut self, loc: Loc, v: Value) {
        self.retain(v);
        self.put(loc, v);
    }

    // ---- registers, stack and work area -----------------------------------

    #[must_use]
    pub fn reg(&self, r: Reg) -> Value {
        self.regs[check_reg(r)]
    }

    #[must_use]
    pub fn reg_type(&self, r: Reg) -> ObjType {
        self.type_of(self.reg(r))
    }

    #[must_use]
    pub fn type_of(&self, v: Value) -> ObjType {
        v.map_or(ObjType::Nil, |r| self.pool.payload(r).obj_type())
    }

    /// Reference count of a value; nil reports 0.
    #[must_use]
    pub fn ref_count(&self, v: Value) -> u32 {
        v.map_or(0, |r| self.pool.slot(r).ref_cnt)
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn push(&mut self, r1: Reg) {
        self.pushm(r1, 1);
    }

    /// Pushes registers `r1..r1+n`, `r1` first. Both copies stay live.
    pub fn pushm(&mut self, r1: Reg, n: usize) {
        check_range(r1, n);
        for r in r1..r1 + n {
            let v = self.regs[r];
            self.retain(v);
            self.stack.push(v);
        }
    }

    pub fn pop(&mut self, r1: Reg) {
        self.popm(r1, 1);
    }

    /// Inverse of `pushm`: the top value lands in `r1+n-1`.
    pub fn popm(&mut self, r1: Reg, n: usize) {
        check_range(r1, n);
        assert!(self.stack.depth() >= n, "operand stack underflow");
        for r in (r1..r1 + n).rev() {
            let v = self.stack.pop();
            self.put(Loc::Reg(r), v);
        }
    }

    pub fn drop(&mut self) {
        self.dropn(1);
    }

    pub fn dropn(&mut self, n: usize) {
        assert!(self.stack.depth() >= n, "operand stack underflow");
        for _ in 0..n {
            let v = self.stack.pop();
            self.release(v);
        }
    }

    /// Copies the value `ofs` slots below the stack top into `r1`.
    pub fn pick(&mut self, r1: Reg, ofs: usize) {
        let v = self.stack.peek(ofs);
        self.assign(Loc::Reg(r1), v);
    }

    pub fn move_reg(&mut self, r1: Reg, r2: Reg) {
        let v = self.reg(r2);
        self.assign(Loc::Reg(r1), v);
    }

    /// Reserves `n` nil scratch slots on the stack.
    pub fn falloc(&mut self, n: usize) -> Frame {
        self.stack.reserve(n)
    }

    /// Releases everything between the stack top and the frame pointer.
    pub fn ffree(&mut self, frame: Frame) {
        assert!(self.stack.contains_frame(frame), "stale frame pointer");
        let fp = OperandStack::frame_pointer(frame);
        while self.stack.sp() < fp {
            let v = self.stack.pop();
            self.release(v);
        }
    }

    pub fn load(&mut self, r1: Reg, idx: usize) {
        assert!(idx < self.work.len(), "work slot {idx} out of range");
        let v = self.work[idx];
        self.assign(Loc::Reg(r1), v);
    }

    pub fn store(&mut self, r1: Reg, idx: usize) {
        assert!(idx < self.work.len(), "work slot {idx} out of range");
        let v = self.reg(r1);
        self.assign(Loc::Work(idx), v);
    }

    /// Loads the registry dictionary of `ty` into `r1`.
    pub fn cl_dict(&mut self, ty: ObjType, r1: Reg) {
        let v = self.classes[ty as usize];
        self.assign(Loc::Reg(r1), v);
    }

    pub(crate) fn saving<T>(&mut self, r1: Reg, n: usize, f: impl FnOnce(&mut Self) -> T) -> T {
        self.pushm(r1, n);
        let out = f(self);
        self.popm(r1, n);
        out
    }

    pub(crate) fn framed<T>(&mut self, n: usize, f: impl FnOnce(&mut Self, Frame) -> T) -> T {
        let frame = self.falloc(n);
        let out = f(self, frame);
        self.ffree(frame);
        out
    }

    // ---- dispatch ---------------------------------------------------------

    /// Applies `op` to the value in `r1`, leaving the result in `r1`.
    /// A no-op while an error is pending.
    pub fn call(&mut self, r1: Reg, op: Op, args: &[Reg]) {
        self.run(|vm| vm.dispatch(r1, op, args));
    }

    /// `call`, reporting the sticky field as a `Result`.
    pub fn try_call(&mut self, r1: Reg, op: Op, args: &[Reg]) -> OpResult {
        self.call(r1, op, args);
        self.check()
    }

    pub(crate) fn dispatch(&mut self, r1: Reg, op: Op, args: &[Reg]) -> OpResult {
        let ty = self.reg_type(r1);
        let Some((owner, method)) = METHOD_TABLE.resolve(ty, op) else {
            trace!("{op} on {ty}: no method");
            return Err(ErrorKind::BadMethod);
        };
        trace!("{op} on {ty} resolved at {owner}");
        method(self, r1, args)
    }

    /// Operand register `i` of a call.
    pub(crate) fn arg(&self, args: &[Reg], i: usize) -> OpResult<Value> {
        match args.get(i) {
            Some(&r) if r < NUM_REGS => Ok(self.regs[r]),
            _ => Err(ErrorKind::BadReg),
        }
    }

    /// Dispatches a binary predicate on two values through R1/R2.
    pub(crate) fn test(&mut self, op: Op, a: Value, b: Value) -> OpResult<bool> {
        self.saving(R1, 2, |vm| {
            vm.assign(Loc::Reg(R1), a);
            vm.assign(Loc::Reg(R2), b);
            vm.dispatch(R1, op, &[R2])?;
            vm.boolean(vm.reg(R1))
        })
    }

    pub(crate) fn hash_value(&mut self, v: Value) -> OpResult<i64> {
        self.saving(R1, 1, |vm| {
            vm.assign(Loc::Reg(R1), v);
            vm.dispatch(R1, Op::Hash, &[])?;
            vm.integer(vm.reg(R1))
        })
    }

    // ---- construction -----------------------------------------------------

    pub(crate) fn make(&mut self, loc: Loc, payload: Payload) -> ObjRef {
        let r = self.pool.alloc(payload);
        self.put(loc, Some(r));
        r
    }

    pub(crate) fn make_bool(&mut self, loc: Loc, b: bool) -> ObjRef {
        self.make(loc, Payload::Boolean(b))
    }

    pub(crate) fn make_int(&mut self, loc: Loc, i: i64) -> ObjRef {
        self.make(loc, Payload::Integer(i))
    }

    pub(crate) fn make_float(&mut self, loc: Loc, f: f64) -> ObjRef {
        self.make(loc, Payload::Float(f))
    }

    pub(crate) fn make_string(&mut self, loc: Loc, bytes: Vec<u8>) -> ObjRef {
        self.make(loc, Payload::String(bytes.into_boxed_slice()))
    }

    pub(crate) fn make_str_copy(&mut self, loc: Loc, bytes: &[u8]) -> OpResult<ObjRef> {
        let mut buf = try_bytes(bytes.len())?;
        buf.extend_from_slice(bytes);
        Ok(self.make_string(loc, buf))
    }

    pub(crate) fn make_pair(&mut self, loc: Loc, car: Value, cdr: Value) -> ObjRef {
        self.retain(car);
        self.retain(cdr);
        self.make(loc, Payload::Pair(car, cdr))
    }

    pub(crate) fn make_list(&mut self, loc: Loc, car: Value, cdr: Value) -> ObjRef {
        self.retain(car);
        self.retain(cdr);
        self.make(loc, Payload::List(car, cdr))
    }

    pub(crate) fn make_array(&mut self, loc: Loc, size: usize) -> OpResult<ObjRef> {
        let items = try_buffer(size, None)?;
        Ok(self.make(loc, Payload::Array(items)))
    }

    /// A `size` of 0 picks the registry default.
    pub(crate) fn make_dict(&mut self, loc: Loc, size: usize) -> OpResult<ObjRef> {
        let size = match size {
            0 => self.default_dict_size()?,
            n => n,
        };
        let buckets = try_buffer(size, None)?;
        Ok(self.make(loc, Payload::Dict(DictVal { buckets, count: 0 })))
    }

    pub fn newc_nil(&mut self, r1: Reg) {
        self.run(|vm| {
            vm.put(Loc::Reg(r1), None);
            Ok(())
        });
    }

    pub fn newc_ptr(&mut self, r1: Reg, ptr: usize) {
        self.run(|vm| {
            vm.make(Loc::Reg(r1), Payload::Pointer(ptr));
            Ok(())
        });
    }

    pub fn newc_bool(&mut self, r1: Reg, b: bool) {
        self.run(|vm| {
            vm.make_bool(Loc::Reg(r1), b);
            Ok(())
        });
    }

    pub fn newc_int(&mut self, r1: Reg, i: i64) {
        self.run(|vm| {
            vm.make_int(Loc::Reg(r1), i);
            Ok(())
        });
    }

    pub fn newc_float(&mut self, r1: Reg, f: f64) {
        self.run(|vm| {
            vm.make_float(Loc::Reg(r1), f);
            Ok(())
        });
    }

    pub fn newc_str(&mut self, r1: Reg, s: impl AsRef<[u8]>) {
        self.run(|vm| vm.make_str_copy(Loc::Reg(r1), s.as_ref()).map(|_| ()));
    }

    /// Array of `size` nil elements.
    pub fn newc_array(&mut self, r1: Reg, size: usize) {
        self.run(|vm| vm.make_array(Loc::Reg(r1), size).map(|_| ()));
    }

    /// Empty dictionary with `size` buckets, 0 for the registry default.
    pub fn newc_dict(&mut self, r1: Reg, size: usize) {
        self.run(|vm| vm.make_dict(Loc::Reg(r1), size).map(|_| ()));
    }

    pub fn newc_bytes(&mut self, r1: Reg, data: &[u8]) {
        self.run(|vm| {
            let buf = copy_buffer(data)?;
            vm.make(Loc::Reg(r1), Payload::Bytes(buf));
            Ok(())
        });
    }

    pub fn newc_words(&mut self, r1: Reg, data: &[u16]) {
        self.run(|vm| {
            let buf = copy_buffer(data)?;
            vm.make(Loc::Reg(r1), Payload::Words(buf));
            Ok(())
        });
    }

    pub fn newc_dwords(&mut self, r1: Reg, data: &[u32]) {
        self.run(|vm| {
            let buf = copy_buffer(data)?;
            vm.make(Loc::Reg(r1), Payload::Dwords(buf));
            Ok(())
        });
    }

    pub fn newc_qwords(&mut self, r1: Reg, data: &[u64]) {
        self.run(|vm| {
            let buf = copy_buffer(data)?;
            vm.make(Loc::Reg(r1), Payload::Qwords(buf));
            Ok(())
        });
    }

    /// Builds a `ty` value in `r1` from the operand registers, coercing or
    /// parsing as the type allows.
    pub fn new_value(&mut self, r1: Reg, ty: ObjType, args: &[Reg]) {
        check_reg(r1);
        self.run(|vm| primitives::construct(vm, r1, ty, args));
    }

    /// Parses a literal into `r1`.
    pub fn news(&mut self, r1: Reg, text: &str) {
        check_reg(r1);
        self.run(|vm| vm.parse_literal(Loc::Reg(r1), text.as_bytes()));
    }

    /// Literal rendering of the value in `r1`.
    pub fn to_literal(&mut self, r1: Reg) -> OpResult<String> {
        let bytes = self.tostring(self.reg(r1))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // ---- typed access -----------------------------------------------------

    pub(crate) fn boolean(&self, v: Value) -> OpResult<bool> {
        match v.map(|r| self.pool.payload(r)) {
            Some(Payload::Boolean(b)) => Ok(*b),
            _ => Err(ErrorKind::BadType),
        }
    }

    pub(crate) fn integer(&self, v: Value) -> OpResult<i64> {
        match v.map(|r| self.pool.payload(r)) {
            Some(Payload::Integer(i)) => Ok(*i),
            _ => Err(ErrorKind::BadType),
        }
    }

    pub(crate) fn float(&self, v: Value) -> OpResult<f64> {
        match v.map(|r| self.pool.payload(r)) {
            Some(Payload::Float(f)) => Ok(*f),
            _ => Err(ErrorKind::BadType),
        }
    }

    pub(crate) fn string(&self, v: Value) -> OpResult<&[u8]> {
        match v.map(|r| self.pool.payload(r)) {
            Some(Payload::String(s)) => Ok(s),
            _ => Err(ErrorKind::BadType),
        }
    }

    pub(crate) fn array(&self, v: Value) -> OpResult<&[Value]> {
        match v.map(|r| self.pool.payload(r)) {
            Some(Payload::Array(items)) => Ok(items),
            _ => Err(ErrorKind::BadType),
        }
    }

    /// Array elements, or the bucket heads of a dictionary.
    pub(crate) fn items(&self, v: Value) -> OpResult<&[Value]> {
        match v.map(|r| self.pool.payload(r)) {
            Some(Payload::Array(items)) => Ok(items),
            Some(Payload::Dict(dict)) => Ok(&dict.buckets),
            _ => Err(ErrorKind::BadType),
        }
    }

    pub(crate) fn dict(&self, v: Value) -> OpResult<&DictVal> {
        match v.map(|r| self.pool.payload(r)) {
            Some(Payload::Dict(dict)) => Ok(dict),
            _ => Err(ErrorKind::BadType),
        }
    }

    pub(crate) fn dict_mut(&mut self, r: ObjRef) -> OpResult<&mut DictVal> {
        match self.pool.payload_mut(r) {
            Payload::Dict(dict) => Ok(dict),
            _ => Err(ErrorKind::BadType),
        }
    }

    /// Car and cdr of a pair or list cell.
    pub(crate) fn dptr(&self, v: Value) -> OpResult<(Value, Value)> {
        match v.map(|r| self.pool.payload(r)) {
            Some(Payload::Pair(car, cdr) | Payload::List(car, cdr)) => Ok((*car, *cdr)),
            _ => Err(ErrorKind::BadType),
        }
    }

    pub(crate) fn is_list(&self, v: Value) -> bool {
        matches!(self.type_of(v), ObjType::Nil | ObjType::List)
    }

    /// Elements of a list; nil is the empty list.
    pub(crate) fn list_items(&self, mut v: Value) -> OpResult<Vec<Value>> {
        let mut out = Vec::new();
        while v.is_some() {
            match v.map(|r| self.pool.payload(r)) {
                Some(Payload::List(car, cdr)) => {
                    out.push(*car);
                    v = *cdr;
                }
                _ => return Err(ErrorKind::BadType),
            }
        }
        Ok(out)
    }

    fn wrong_type(&self, r1: Reg, expected: ObjType) -> ! {
        panic!("register r{r1} holds {}, not {expected}", self.reg_type(r1))
    }

    /// # Panics
    /// If `r1` does not hold a pointer. The other `*_val` accessors assert
    /// their type the same way.
    #[must_use]
    pub fn ptr_val(&self, r1: Reg) -> usize {
        match self.reg(r1).map(|r| self.pool.payload(r)) {
            Some(Payload::Pointer(p)) => *p,
            _ => self.wrong_type(r1, ObjType::Pointer),
        }
    }

    #[must_use]
    pub fn bool_val(&self, r1: Reg) -> bool {
        self.boolean(self.reg(r1))
            .unwrap_or_else(|_| self.wrong_type(r1, ObjType::Boolean))
    }

    #[must_use]
    pub fn integer_val(&self, r1: Reg) -> i64 {
        self.integer(self.reg(r1))
            .unwrap_or_else(|_| self.wrong_type(r1, ObjType::Integer))
    }

    #[must_use]
    pub fn float_val(&self, r1: Reg) -> f64 {
        self.float(self.reg(r1))
            .unwrap_or_else(|_| self.wrong_type(r1, ObjType::Float))
    }

    #[must_use]
    pub fn string_val(&self, r1: Reg) -> &[u8] {
        match self.string(self.reg(r1)) {
            Ok(s) => s,
            Err(_) => self.wrong_type(r1, ObjType::String),
        }
    }

    #[must_use]
    pub fn string_size(&self, r1: Reg) -> usize {
        self.string_val(r1).len()
    }
}

impl Drop for Ovm {
    fn drop(&mut self) {
        for r in 0..NUM_REGS {
            self.put(Loc::Reg(r), None);
        }
        let depth = self.stack.depth();
        self.dropn(depth);
        for i in 0..self.work.len() {
            self.put(Loc::Work(i), None);
        }
        for ty in ObjType::ALL {
            self.put(Loc::Class(ty), None);
        }
        let leaked = self.pool.used();
        if leaked != 0 {
            debug!("ovm shutdown with {leaked} unreachable objects (reference cycles)");
        } else {
            debug!("ovm shutdown");
        }
    }
}

fn check_reg(r: Reg) -> Reg {
    assert!(r < NUM_REGS, "register index {r} out of range");
    r
}

fn check_range(r1: Reg, n: usize) {
    assert!(
        r1 < NUM_REGS && n <= NUM_REGS - r1,
        "register range r{r1}+{n} out of range"
    );
}

fn copy_buffer<T: Copy>(data: &[T]) -> OpResult<Box<[T]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(data.len()).map_err(|_| ErrorKind::Mem)?;
    buf.extend_from_slice(data);
    Ok(buf.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn vm() -> Ovm {
        Ovm::new(OvmCreateInfo {
            pool_size: 64,
            work_size: 4,
            stack_size: 32,
        })
    }

    #[test]
    fn test_registry_occupies_pool() {
        let vm = vm();
        assert_eq!(vm.pool().used(), 14);
    }

    #[test]
    fn test_retain_release_round_trip() {
        let mut vm = vm();
        vm.newc_int(R0, 5);
        let v = vm.reg(R0);
        assert_eq!(vm.ref_count(v), 1);
        vm.retain(v);
        assert_eq!(vm.ref_count(v), 2);
        vm.release(v);
        assert_eq!(vm.ref_count(v), 1);
        assert_eq!(vm.integer_val(R0), 5);
    }

    #[test]
    fn test_release_to_zero_frees_children_once() {
        let mut vm = vm();
        let before = vm.pool().used();
        vm.news(R0, "[1, <2, \"three\">, (4, 5)]");
        assert_eq!(vm.errno(), None);
        assert!(vm.pool().used() > before);
        vm.newc_nil(R0);
        assert_eq!(vm.pool().used(), before);
    }

    #[test]
    fn test_assign_self_keeps_value_alive() {
        let mut vm = vm();
        vm.newc_str(R0, "same");
        let v = vm.reg(R0);
        vm.assign(Loc::Reg(R0), v);
        assert_eq!(vm.ref_count(v), 1);
        assert_eq!(vm.string_val(R0), b"same");
    }

    #[test]
    fn test_assign_from_own_child() {
        let mut vm = vm();
        vm.news(R0, "<\"inner\", 1>");
        let (car, _) = vm.dptr(vm.reg(R0)).unwrap();
        vm.assign(Loc::Reg(R0), car);
        assert_eq!(vm.string_val(R0), b"inner");
        assert_eq!(vm.ref_count(vm.reg(R0)), 1);
    }

    #[test]
    fn test_pool_exhaustion_then_reuse() {
        let mut vm = Ovm::new(OvmCreateInfo {
            pool_size: 16,
            work_size: 1,
            stack_size: 4,
        });
        vm.newc_int(R0, 1);
        vm.newc_int(R1, 2);
        assert_eq!(vm.pool().available(), 0);
        vm.newc_nil(R0);
        assert_eq!(vm.pool().available(), 1);
        vm.newc_int(R2, 3);
        assert_eq!(vm.integer_val(R2), 3);
    }

    #[test]
    #[should_panic(expected = "object pool exhausted")]
    fn test_pool_exhaustion_is_fatal() {
        let mut vm = Ovm::new(OvmCreateInfo {
            pool_size: 14,
            work_size: 1,
            stack_size: 4,
        });
        vm.newc_int(R0, 1);
    }

    #[test]
    fn test_pushm_popm_order() {
        let mut vm = vm();
        vm.newc_int(R1, 1);
        vm.newc_int(R2, 2);
        vm.pushm(R1, 2);
        assert_eq!(vm.stack_depth(), 2);
        assert_eq!(vm.ref_count(vm.reg(R1)), 2);
        vm.newc_nil(R1);
        vm.newc_nil(R2);
        vm.popm(R1, 2);
        assert_eq!(vm.integer_val(R1), 1);
        assert_eq!(vm.integer_val(R2), 2);
        assert_eq!(vm.ref_count(vm.reg(R1)), 1);
        assert_eq!(vm.stack_depth(), 0);
    }

    #[test]
    fn test_pick_and_drop() {
        let mut vm = vm();
        vm.newc_int(R0, 10);
        vm.push(R0);
        vm.newc_int(R0, 20);
        vm.push(R0);
        vm.pick(R3, 1);
        assert_eq!(vm.integer_val(R3), 10);
        vm.pick(R4, 0);
        assert_eq!(vm.integer_val(R4), 20);
        vm.dropn(2);
        assert_eq!(vm.stack_depth(), 0);
        assert_eq!(vm.ref_count(vm.reg(R3)), 1);
    }

    #[test]
    fn test_move_shares_value() {
        let mut vm = vm();
        vm.newc_float(R5, 1.5);
        vm.move_reg(R6, R5);
        assert_eq!(vm.reg(R5), vm.reg(R6));
        assert_eq!(vm.ref_count(vm.reg(R5)), 2);
    }

    #[test]
    fn test_frame_release() {
        let mut vm = vm();
        let used = vm.pool().used();
        let frame = vm.falloc(3);
        vm.make_int(frame.at(0), 1);
        vm.make_int(frame.at(2), 3);
        assert_eq!(vm.get(frame.at(1)), None);
        assert_eq!(vm.pool().used(), used + 2);
        vm.ffree(frame);
        assert_eq!(vm.pool().used(), used);
        assert_eq!(vm.stack_depth(), 0);
    }

    #[test]
    fn test_load_store_work_area() {
        let mut vm = vm();
        vm.newc_str(R0, "kept");
        vm.store(R0, 2);
        vm.newc_nil(R0);
        vm.load(R7, 2);
        assert_eq!(vm.string_val(R7), b"kept");
    }

    #[test]
    #[should_panic(expected = "register index 8 out of range")]
    fn test_bad_register_is_fatal() {
        let vm = vm();
        let _ = vm.reg(8);
    }

    #[test]
    #[should_panic(expected = "operand stack underflow")]
    fn test_pop_empty_is_fatal() {
        let mut vm = vm();
        vm.pop(R0);
    }

    #[test]
    fn test_sticky_error_short_circuits() {
        let mut vm = vm();
        vm.newc_int(R0, 1);
        vm.newc_str(R1, "x");
        vm.call(R0, Op::Add, &[R1]);
        assert_eq!(vm.errno(), Some(ErrorKind::BadType));
        vm.newc_int(R2, 9);
        vm.call(R0, Op::Add, &[R0]);
        assert_eq!(vm.reg_type(R2), ObjType::Nil);
        assert_eq!(vm.integer_val(R0), 1);
        vm.err_clr();
        vm.call(R0, Op::Add, &[R0]);
        assert_eq!(vm.integer_val(R0), 2);
    }

    #[test]
    fn test_error_hook_fires_on_raise() {
        let mut vm = vm();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        vm.set_err_hook(move |kind| sink.borrow_mut().push(kind));
        vm.newc_bool(R0, true);
        vm.call(R0, Op::Sort, &[]);
        vm.call(R0, Op::Sort, &[]);
        assert_eq!(*seen.borrow(), vec![ErrorKind::BadMethod]);
        assert_eq!(vm.take_error(), Err(ErrorKind::BadMethod));
        assert_eq!(vm.errno(), None);
    }

    #[test]
    fn test_missing_operand_is_bad_reg() {
        let mut vm = vm();
        vm.newc_int(R0, 1);
        assert_eq!(vm.try_call(R0, Op::Add, &[]), Err(ErrorKind::BadReg));
        vm.err_clr();
        assert_eq!(vm.try_call(R0, Op::Add, &[12]), Err(ErrorKind::BadReg));
    }

    #[test]
    fn test_typed_buffers_construct() {
        let mut vm = vm();
        vm.newc_bytes(R0, &[1, 2, 3]);
        vm.newc_words(R1, &[1, 2]);
        vm.newc_dwords(R2, &[7]);
        vm.newc_qwords(R3, &[]);
        assert_eq!(vm.reg_type(R0), ObjType::Bytes);
        assert_eq!(vm.reg_type(R1), ObjType::Words);
        assert_eq!(vm.reg_type(R2), ObjType::Dwords);
        assert_eq!(vm.reg_type(R3), ObjType::Qwords);
        assert_eq!(vm.try_call(R0, Op::Size, &[]), Err(ErrorKind::BadMethod));
    }

    #[test]
    fn test_pointer_round_trip() {
        let mut vm = vm();
        vm.newc_ptr(R0, 0xdead);
        assert_eq!(vm.ptr_val(R0), 0xdead);
        assert_eq!(vm.reg_type(R0), ObjType::Pointer);
    }

    #[test]
    fn test_drop_releases_everything() {
        let mut vm = vm();
        vm.news(R0, "{\"a\": [1, 2], \"b\": (3)}");
        vm.push(R0);
        vm.store(R0, 0);
        drop(vm);
    }
}
