pub mod handle;

pub use handle::{Pool, RawHandle};
