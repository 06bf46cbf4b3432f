pub mod accelerator;
pub mod core;

pub use self::accelerator::{Accelerator, AcceleratorConfig};
pub use self::core::{Core, CoreId, MemoryAccesses, MemoryLevel};
