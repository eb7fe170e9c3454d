pub mod resolver;

pub use resolver::{OriginResolver, ResolvedTarget};
