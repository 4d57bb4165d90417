//! Built-in operations.

mod hypotenuse;
mod shutdown;

pub use hypotenuse::{HypotenuseOperation, HYPOTENUSE_OPERATION};
pub use shutdown::ShutdownOperation;
