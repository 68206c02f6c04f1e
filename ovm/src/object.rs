use crate::ObjType;

/// Handle to an allocated pool slot.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A value slot. `None` is nil: it owns no pool slot and carries no count.
pub type Value = Option<ObjRef>;

#[derive(Debug, Default)]
pub struct DictVal {
    pub buckets: Box<[Value]>,
    pub count: usize,
}

/// Per-type payload of a live slot. Children are owned references.
#[derive(Debug, Default)]
pub enum Payload {
    #[default]
    Free,
    Pointer(usize),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Box<[u8]>),
    Bytes(Box<[u8]>),
    Words(Box<[u16]>),
    Dwords(Box<[u32]>),
    Qwords(Box<[u64]>),
    Pair(Value, Value),
    List(Value, Value),
    Array(Box<[Value]>),
    Dict(DictVal),
}

impl Payload {
    /// Type tag of a live payload.
    ///
    /// # Panics
    /// On a recycled slot.
    #[must_use]
    pub fn obj_type(&self) -> ObjType {
        match self {
            Payload::Free => panic!("type query on a free slot"),
            Payload::Pointer(_) => ObjType::Pointer,
            Payload::Boolean(_) => ObjType::Boolean,
            Payload::Integer(_) => ObjType::Integer,
            Payload::Float(_) => ObjType::Float,
            Payload::String(_) => ObjType::String,
            Payload::Bytes(_) => ObjType::Bytes,
            Payload::Words(_) => ObjType::Words,
            Payload::Dwords(_) => ObjType::Dwords,
            Payload::Qwords(_) => ObjType::Qwords,
            Payload::Pair(..) => ObjType::Pair,
            Payload::List(..) => ObjType::List,
            Payload::Array(_) => ObjType::Array,
            Payload::Dict(_) => ObjType::Dict,
        }
    }

    /// Finalizes the payload: owned buffers are dropped, child references
    /// are handed to `out` for the caller to release.
    pub(crate) fn finalize(self, out: &mut Vec<ObjRef>) {
        match self {
            Payload::Pair(car, cdr) | Payload::List(car, cdr) => {
                out.extend(cdr);
                out.extend(car);
            }
            Payload::Array(items) => out.extend(items.iter().flatten().copied()),
            Payload::Dict(dict) => out.extend(dict.buckets.iter().flatten().copied()),
            _ => {}
        }
    }
}
