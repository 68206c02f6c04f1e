use crate::{ObjType, Op, OpResult, Ovm, Reg, primitives};

/// A handler receives the subject register, which it overwrites with the
/// result, and the operand registers.
pub type MethodFn = fn(&mut Ovm, Reg, &[Reg]) -> OpResult;

#[derive(Debug, Copy, Clone)]
pub struct MethodEntry {
    pub ty: ObjType,
    pub op: Op,
    pub method: MethodFn,
}

impl MethodEntry {
    pub const fn new(ty: ObjType, op: Op, method: MethodFn) -> Self {
        Self { ty, op, method }
    }
}

/// The (type x op) handler matrix.
pub struct DispatchTable {
    methods: [[Option<MethodFn>; Op::COUNT]; ObjType::COUNT],
}

impl DispatchTable {
    /// Later entries for the same cell win.
    pub const fn build(entries: &[MethodEntry]) -> Self {
        let mut methods = [[None; Op::COUNT]; ObjType::COUNT];
        let mut i = 0;
        while i < entries.len() {
            let entry = &entries[i];
            methods[entry.ty as usize][entry.op as usize] = Some(entry.method);
            i += 1;
        }
        Self { methods }
    }

    /// The handler registered directly on `ty`, without inheritance.
    #[must_use]
    pub fn get(&self, ty: ObjType, op: Op) -> Option<MethodFn> {
        self.methods[ty as usize][op as usize]
    }

    /// Walks the parent chain of `ty`, returning the first handler found and
    /// the type that defines it.
    #[must_use]
    pub fn resolve(&self, ty: ObjType, op: Op) -> Option<(ObjType, MethodFn)> {
        ty.lineage()
            .find_map(|owner| self.get(owner, op).map(|method| (owner, method)))
    }
}

pub static METHOD_TABLE: DispatchTable = DispatchTable::build(primitives::METHODS);
