//! Per-instance class registry: one dictionary per concrete type holding
//! string-keyed settings.

use crate::primitives::{dict_find, dict_insert};
use crate::{ErrorKind, Loc, ObjType, OpResult, Ovm, Reg, Value};

/// Printf-style template used when rendering INTEGER and FLOAT values.
pub const TOSTRING_FORMAT: &str = "tostring-format";
/// Bucket count of dictionaries created without an explicit size.
pub const DEFAULT_SIZE: &str = "default-size";
pub const DEFAULT_DICT_SIZE: usize = 32;

impl Ovm {
    /// Value stored under `key` in the registry of `ty`, nil when absent.
    ///
    /// The result is borrowed from the registry and must not outlive the next
    /// mutation of it.
    pub(crate) fn class_config(&mut self, ty: ObjType, key: &str) -> OpResult<Value> {
        let Some(dict) = self.get(Loc::Class(ty)) else {
            return Ok(None);
        };
        self.framed(1, |vm, frame| {
            vm.make_str_copy(frame.at(0), key.as_bytes())?;
            let key = vm.get(frame.at(0));
            let Some(link) = dict_find(vm, dict, key)?.1 else {
                return Ok(None);
            };
            let (entry, _) = vm.dptr(vm.get(link))?;
            Ok(vm.dptr(entry)?.1)
        })
    }

    /// The registry's `"default-size"` for dictionaries when it holds a
    /// positive integer, 32 otherwise.
    pub(crate) fn default_dict_size(&mut self) -> OpResult<usize> {
        let size = self.class_config(ObjType::Dict, DEFAULT_SIZE)?;
        Ok(match self.integer(size) {
            Ok(n) if n > 0 => usize::try_from(n).unwrap_or(DEFAULT_DICT_SIZE),
            _ => DEFAULT_DICT_SIZE,
        })
    }

    /// Stores the value of `r` under `key` in the registry of `ty`.
    /// BAD_TYPE for abstract types, which have no registry.
    pub fn set_class_config(&mut self, ty: ObjType, key: &str, r: Reg) {
        let value = self.reg(r);
        self.run(|vm| {
            let dict = vm.get(Loc::Class(ty)).ok_or(ErrorKind::BadType)?;
            vm.framed(1, |vm, frame| {
                vm.make_str_copy(frame.at(0), key.as_bytes())?;
                let key = vm.get(frame.at(0));
                dict_insert(vm, dict, key, value)
            })
        });
    }
}
