/// Failure raised by user code: a constructor, an injected method or a factory.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Argument {index} isn't of type `{expected}`")]
    Argument { index: usize, expected: &'static str },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
