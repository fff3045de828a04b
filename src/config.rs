/// Config for a container
/// ## Fields
/// - `dispose_on_drop`:
///   If `true`, a scope that wasn't disposed explicitly is disposed when its last handle is dropped.
///
/// - `inherit_parent_collections`:
///   If `true`, a collection resolved in a child scope starts with the elements
///   registered for the same element type in its ancestors.
///
/// Child scopes inherit the config of their parent unless the builder overrides it.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub dispose_on_drop: bool,
    pub inherit_parent_collections: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dispose_on_drop: true,
            inherit_parent_collections: true,
        }
    }
}
