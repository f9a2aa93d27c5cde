use crate::schema::{NativeKind, ReturnType, TypeId};
use crate::utils::RawHandle;

/// Opaque identifier a backend hands out for each of its objects. The
/// dispatch layer never interprets it.
pub type BackendKey = u64;

/// Which of the two parallel tables a context routes calls through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Precondition checks run before every forward.
    Validating,
    /// Forward unconditionally; for pre-validated trusted callers.
    Passthrough,
}

/// Untyped argument as it arrives at a table entry. Enum and bitmask
/// parameters travel as raw `u32`s here; they only become tagged values
/// (see [`BackendArg`]) after the entry has had its chance to check them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawArg<'a> {
    U32(u32),
    I32(i32),
    F32(f32),
    Bool(bool),
    Object(RawHandle),
    U32Slice(&'a [u32]),
    ObjectSlice(&'a [RawHandle]),
    Str(&'a str),
}

impl RawArg<'_> {
    pub(crate) fn as_u32(&self) -> Option<u32> {
        match self {
            RawArg::U32(v) => Some(*v),
            _ => None,
        }
    }
}

/// Result of a dispatched call. A failed call returns the zero value of the
/// method's declared return type and nothing else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawRet {
    Unit,
    U32(u32),
    I32(i32),
    F32(f32),
    Bool(bool),
    Object(RawHandle),
}

impl RawRet {
    /// The all-zeroes value of a declared return type.
    pub fn zeroed(ret: ReturnType) -> RawRet {
        match ret {
            ReturnType::Void => RawRet::Unit,
            ReturnType::Native(NativeKind::U32) => RawRet::U32(0),
            ReturnType::Native(NativeKind::I32) => RawRet::I32(0),
            ReturnType::Native(NativeKind::F32) => RawRet::F32(0.0),
            ReturnType::Native(NativeKind::Bool) => RawRet::Bool(false),
            ReturnType::Native(NativeKind::Char) => RawRet::U32(0),
            ReturnType::Object(_) => RawRet::Object(RawHandle::NULL),
        }
    }

    pub fn object(&self) -> Option<RawHandle> {
        match self {
            RawRet::Object(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            RawRet::U32(v) => Some(*v),
            _ => None,
        }
    }
}

/// A raw integer that has been tagged with the enum type it belongs to.
/// Produced only by the entries' post-check conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue {
    pub ty: TypeId,
    pub raw: u32,
}

/// A raw integer tagged with its bitmask type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmaskValue {
    pub ty: TypeId,
    pub bits: u32,
}

/// Argument as the backend sees it: raw integers destined for enum/bitmask
/// parameters have been tagged, object handles have been resolved to the
/// backend's own keys.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendArg<'a> {
    U32(u32),
    I32(i32),
    F32(f32),
    Bool(bool),
    Enum(EnumValue),
    Bitmask(BitmaskValue),
    Object(BackendKey),
    U32Slice(&'a [u32]),
    ObjectSlice(Vec<BackendKey>),
    Str(&'a str),
}

/// Value a backend hands back from a call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendRet {
    None,
    U32(u32),
    I32(i32),
    F32(f32),
    Bool(bool),
    Object(BackendKey),
}
