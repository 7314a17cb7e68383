//! Standard middlewares: request, response and access logging.
//!
//! All three log through `tracing`. Access events use the dedicated
//! [`ACCESS_TARGET`] target so subscribers can route them to a separate
//! sink from ordinary message logging.

use crate::content::Content;
use crate::error::Result;
use crate::handler::BoxFuture;

/// Event target for access-log records.
pub const ACCESS_TARGET: &str = "blobrpc::access";

/// Pre-middleware: log the decoded request head and sizes.
pub fn log_request(content: &mut Content) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        tracing::debug!(
            method = content.method(),
            rpc_size = content.req_rpc_size(),
            bin_size = content.req_bin_size(),
            "request"
        );
        Ok(())
    })
}

/// Post-middleware: log the response outcome and sizes.
pub fn log_response(content: &mut Content) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        tracing::debug!(
            method = content.method(),
            error = content.res_error(),
            rpc_size = content.res_rpc_size(),
            bin_size = content.res_bin_size(),
            "response"
        );
        Ok(())
    })
}

/// Post-middleware: one access record per call (remote host, ident, method,
/// elapsed time).
pub fn log_access(content: &mut Content) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let ident = String::from_utf8_lossy(content.auth_ident()).into_owned();
        tracing::info!(
            target: "blobrpc::access",
            remote = content.remote_host(),
            ident = %ident,
            method = content.method(),
            elapsed_ms = content.start().elapsed().as_millis() as u64,
            "access"
        );
        Ok(())
    })
}
