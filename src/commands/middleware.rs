//! Interceptor chains
//!
//! Every tree level (engine, command, group, executor) owns a [`Chain`]. At
//! dispatch the chains are concatenated root first and folded around the
//! terminal link; the first interceptor is the outermost one and decides
//! whether to call its continuation at all.
//!
//! ```ignore
//! let guard = middleware::from_fn(|request: Request, next: Next| async move {
//!     if request.interaction().member_permissions.unwrap_or(0) & ADMINISTRATOR == 0 {
//!         return Err(DispatchError::middleware(anyhow!("missing permissions")));
//!     }
//!     next(request).await
//! });
//! command.set_middleware(Chain::new().append(guard));
//! ```
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use std::future::Future;
use std::sync::Arc;

use super::context::Request;
use super::handler::BoxFuture;
use crate::core::error::DispatchError;

/// Continuation of the chain
pub type Next = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<(), DispatchError>> + Send + Sync>;

/// Wraps a continuation into a new one
pub type Interceptor = Arc<dyn Fn(Next) -> Next + Send + Sync>;

/// Ordered list of interceptors
#[derive(Clone, Default)]
pub struct Chain {
    interceptors: Vec<Interceptor>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(mut self, interceptor: Interceptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// This chain followed by `other`
    pub fn extend(&self, other: &Chain) -> Self {
        let mut interceptors = Vec::with_capacity(self.interceptors.len() + other.interceptors.len());
        interceptors.extend(self.interceptors.iter().cloned());
        interceptors.extend(other.interceptors.iter().cloned());
        Self { interceptors }
    }

    /// Fold the chain around `terminal`, first interceptor outermost
    pub fn then(&self, terminal: Next) -> Next {
        self.interceptors
            .iter()
            .rev()
            .fold(terminal, |next, interceptor| interceptor(next))
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

/// Build an interceptor from an async function of the request and its continuation
pub fn from_fn<F, Fut>(f: F) -> Interceptor
where
    F: Fn(Request, Next) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    Arc::new(move |next: Next| -> Next {
        let f = f.clone();
        Arc::new(move |request: Request| -> BoxFuture<'static, Result<(), DispatchError>> {
            Box::pin(f(request, Arc::clone(&next)))
        })
    })
}

/// Terminal link from a plain async function
pub fn terminal<F, Fut>(f: F) -> Next
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    Arc::new(move |request: Request| -> BoxFuture<'static, Result<(), DispatchError>> { Box::pin(f(request)) })
}
