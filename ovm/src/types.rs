use std::fmt;
use std::str::FromStr;

/// Runtime type tags. The discriminant doubles as the row index of the
/// dispatch table and of the class registry.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjType {
    Object,
    Nil,
    Pointer,
    Boolean,
    Number,
    Integer,
    Float,
    Block,
    String,
    Bytes,
    Words,
    Dwords,
    Qwords,
    Dptr,
    Pair,
    List,
    Array,
    Dict,
}

impl ObjType {
    pub const COUNT: usize = 18;

    pub const ALL: [ObjType; Self::COUNT] = [
        ObjType::Object,
        ObjType::Nil,
        ObjType::Pointer,
        ObjType::Boolean,
        ObjType::Number,
        ObjType::Integer,
        ObjType::Float,
        ObjType::Block,
        ObjType::String,
        ObjType::Bytes,
        ObjType::Words,
        ObjType::Dwords,
        ObjType::Qwords,
        ObjType::Dptr,
        ObjType::Pair,
        ObjType::List,
        ObjType::Array,
        ObjType::Dict,
    ];

    /// The single parent of a type; `Object` is the root.
    #[must_use]
    pub const fn parent(self) -> Option<ObjType> {
        use ObjType::*;
        match self {
            Object => None,
            Nil | Pointer | Boolean | Number | Block | Dptr => Some(Object),
            Integer | Float => Some(Number),
            String | Bytes | Words | Dwords | Qwords | Array => Some(Block),
            Pair | List => Some(Dptr),
            Dict => Some(Array),
        }
    }

    /// Abstract types have no instances and no class registry entry.
    #[must_use]
    pub const fn is_abstract(self) -> bool {
        matches!(
            self,
            ObjType::Object | ObjType::Number | ObjType::Block | ObjType::Dptr
        )
    }

    /// Walks from `self` up to and including `Object`.
    pub fn lineage(self) -> impl Iterator<Item = ObjType> {
        std::iter::successors(Some(self), |ty| ty.parent())
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        use ObjType::*;
        match self {
            Object => "object",
            Nil => "nil",
            Pointer => "pointer",
            Boolean => "boolean",
            Number => "number",
            Integer => "integer",
            Float => "float",
            Block => "block",
            String => "string",
            Bytes => "bytes",
            Words => "words",
            Dwords => "dwords",
            Qwords => "qwords",
            Dptr => "dptr",
            Pair => "pair",
            List => "list",
            Array => "array",
            Dict => "dict",
        }
    }
}

impl fmt::Display for ObjType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operations a host may request through `Ovm::call`.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    Abs,
    Add,
    And,
    Append,
    At,
    AtPut,
    Car,
    Cdr,
    Count,
    Del,
    Div,
    Eq,
    Filter,
    Gt,
    Hash,
    Join,
    Keys,
    Lt,
    Minus,
    Mod,
    Mult,
    Not,
    Or,
    Reverse,
    Size,
    Slice,
    Sort,
    Split,
    Sub,
    Xor,
}

impl Op {
    pub const COUNT: usize = 30;

    pub const ALL: [Op; Self::COUNT] = [
        Op::Abs,
        Op::Add,
        Op::And,
        Op::Append,
        Op::At,
        Op::AtPut,
        Op::Car,
        Op::Cdr,
        Op::Count,
        Op::Del,
        Op::Div,
        Op::Eq,
        Op::Filter,
        Op::Gt,
        Op::Hash,
        Op::Join,
        Op::Keys,
        Op::Lt,
        Op::Minus,
        Op::Mod,
        Op::Mult,
        Op::Not,
        Op::Or,
        Op::Reverse,
        Op::Size,
        Op::Slice,
        Op::Sort,
        Op::Split,
        Op::Sub,
        Op::Xor,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        use Op::*;
        match self {
            Abs => "abs",
            Add => "add",
            And => "and",
            Append => "append",
            At => "at",
            AtPut => "at_put",
            Car => "car",
            Cdr => "cdr",
            Count => "count",
            Del => "del",
            Div => "div",
            Eq => "eq",
            Filter => "filter",
            Gt => "gt",
            Hash => "hash",
            Join => "join",
            Keys => "keys",
            Lt => "lt",
            Minus => "minus",
            Mod => "mod",
            Mult => "mult",
            Not => "not",
            Or => "or",
            Reverse => "reverse",
            Size => "size",
            Slice => "slice",
            Sort => "sort",
            Split => "split",
            Sub => "sub",
            Xor => "xor",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Op {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Op::ALL
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| format!("unknown operation '{s}'"))
    }
}
