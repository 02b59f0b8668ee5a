//! Utility macros used internally by the exchange crate.

/// Returns early with `$error` if `$predicate` does not hold.
///
/// Like `assert!`, but for recoverable protocol checks.
///
/// ```ignore
/// ensure!(protocol.is_http11(), ProtocolError::chunked_requires_http11(protocol).into());
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
