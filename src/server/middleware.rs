// ABOUTME: Middleware chain execution: global middleware first (registration order), then per-schema
// ABOUTME: Each link decides whether to call `next` at all, short-circuiting the handler if it doesn't

//! A middleware chain is built once per dispatch from two slices (global, then
//! the route's own) and walked with an explicit index rather than nested
//! closures, so the chain stays `'static` and cheap to clone.

use super::context::Context;
use crate::error::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One link in the chain. Implemented for any
/// `Fn(Context, Next) -> BoxFuture<'static, Result<()>>` closure.
pub trait MiddlewareFn: Send + Sync {
    fn call(&self, ctx: Context, next: Next) -> BoxFuture<'static, Result<()>>;
}

impl<F> MiddlewareFn for F
where
    F: Fn(Context, Next) -> BoxFuture<'static, Result<()>> + Send + Sync,
{
    fn call(&self, ctx: Context, next: Next) -> BoxFuture<'static, Result<()>> {
        (self)(ctx, next)
    }
}

pub type Middleware = Arc<dyn MiddlewareFn>;
pub type Terminal = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// The remaining part of the chain; calling `run` consumes it.
#[derive(Clone)]
pub struct Next {
    chain: Arc<Vec<Middleware>>,
    index: usize,
    terminal: Terminal,
}

impl Next {
    pub fn new(chain: Arc<Vec<Middleware>>, terminal: Terminal) -> Self {
        Self { chain, index: 0, terminal }
    }

    pub fn run(self, ctx: Context) -> BoxFuture<'static, Result<()>> {
        if self.index < self.chain.len() {
            let mw = Arc::clone(&self.chain[self.index]);
            let next = Next {
                chain: self.chain,
                index: self.index + 1,
                terminal: self.terminal,
            };
            mw.call(ctx, next)
        } else {
            (self.terminal)(ctx)
        }
    }
}
