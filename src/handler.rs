//! Handler and middleware contract.
//!
//! A handler receives the call's [`Content`] and must send exactly one
//! response through it ([`Content::send_result`] or [`Content::send_error`]).
//! Middleware uses the same shape: pre-middleware runs after method decode
//! and before routing and may short-circuit by sending an error and
//! returning `Err`; post-middleware runs after the handler.
//!
//! Handlers are plain functions returning a boxed future:
//!
//! ```ignore
//! fn hello_handler(content: &mut Content) -> BoxFuture<'_, Result<()>> {
//!     Box::pin(async move {
//!         let params: HelloParams = content.bind_params()?;
//!         content.send_result(&HelloResult { message: "hi".into() }, 0).await
//!     })
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use crate::content::Content;
use crate::error::Result;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for call handlers and middleware.
pub trait Handler: Send + Sync + 'static {
    /// Handle one call through its context.
    fn call<'a>(&'a self, content: &'a mut Content) -> BoxFuture<'a, Result<()>>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Content) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, content: &'a mut Content) -> BoxFuture<'a, Result<()>> {
        self(content)
    }
}
