use crate::injector::Injectable;

/// Closed instantiation of an open generic definition.
///
/// `Definition` is the marker type registered with
/// [`crate::ContainerBuilder::register_open_generic`]. Every closed type sharing it
/// gets its own registration the first time it's requested.
///
/// ```ignore
/// struct RepositoryDef;
///
/// impl<E: Entity> ClosedGeneric for Repository<E> {
///     type Definition = RepositoryDef;
/// }
/// ```
pub trait ClosedGeneric: Injectable {
    type Definition: 'static;
}
