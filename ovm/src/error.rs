use thiserror::Error;

/// Recoverable error kinds recorded in the sticky error field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    #[error("out of memory")]
    Mem,
    #[error("no method for this type")]
    BadMethod,
    #[error("bad register")]
    BadReg,
    #[error("bad type")]
    BadType,
    #[error("bad value")]
    BadValue,
    #[error("out of range")]
    Range,
}

pub type OpResult<T = ()> = Result<T, ErrorKind>;

/// Called synchronously whenever the sticky field becomes set.
pub type ErrorHook = Box<dyn FnMut(ErrorKind)>;

/// Obtains an owned buffer of `len` copies of `fill`, mapping allocation
/// failure to `Mem`.
pub(crate) fn try_buffer<T: Clone>(len: usize, fill: T) -> OpResult<Box<[T]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| ErrorKind::Mem)?;
    buf.resize(len, fill);
    Ok(buf.into_boxed_slice())
}

pub(crate) fn try_bytes(capacity: usize) -> OpResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity).map_err(|_| ErrorKind::Mem)?;
    Ok(buf)
}
