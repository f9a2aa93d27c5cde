pub mod backend;
pub mod dispatch;
pub mod schema;
pub mod utils;

pub use backend::{Backend, MethodRef, NullBackend};
pub use dispatch::*;
pub use schema::{
    Annotation, ArgDesc, ArgType, MethodDesc, MethodId, MethodTraits, NativeKind, ReturnType,
    Schema, SchemaBuilder, TypeId,
};
pub use utils::RawHandle;
