use std::sync::Arc;

use super::base::Service;

/// Type-erased, cheaply clonable service.
pub(crate) struct BoxService<Request, Response, Error>(pub(crate) Arc<dyn Service<Request, Response = Response, Error = Error> + Send + Sync>);

impl<Request, Response, Error> BoxService<Request, Response, Error> {
    #[inline]
    #[must_use]
    pub(crate) fn new<S>(service: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Error> + Send + Sync + 'static,
    {
        Self(Arc::new(service))
    }
}

impl<Request, Response, Error> Clone for BoxService<Request, Response, Error> {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<Request, Response, Error> Service<Request> for BoxService<Request, Response, Error> {
    type Response = Response;
    type Error = Error;

    #[inline]
    fn call(&self, request: Request) -> Result<Self::Response, Self::Error> {
        self.0.call(request)
    }
}
