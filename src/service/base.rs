/// Callable unit behind factories and finalizers.
/// `call` takes `&mut self`, so shared services are cloned before being called.
pub(crate) trait Service<Request> {
    type Response;
    type Error;

    fn call(&mut self, request: Request) -> Result<Self::Response, Self::Error>;
}
