mod dispatch;
mod error;
mod format;
mod object;
mod parser;
mod pool;
mod primitives;
mod registry;
mod stack;
mod types;
mod vm;

pub use dispatch::{DispatchTable, METHOD_TABLE, MethodEntry, MethodFn};
pub use error::{ErrorHook, ErrorKind, OpResult};
pub use format::NumberFormat;
pub use object::{DictVal, ObjRef, Payload, Value};
pub use parser::{delim_find, split_top_level, trim};
pub use pool::{Pool, Slot};
pub use primitives::{rolling_hash, slice_idxs};
pub use registry::{DEFAULT_DICT_SIZE, DEFAULT_SIZE, TOSTRING_FORMAT};
pub use stack::{Frame, OperandStack};
pub use types::{ObjType, Op};
pub use vm::*;
