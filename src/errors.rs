mod dependency_resolver;
mod instantiate;
mod instantiator;

pub use dependency_resolver::{CyclePath, ResolveErrorKind};
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;
