//! Macros for reducing handler boilerplate.

/// Fulfill from a handler with a plain value.
///
/// Expands to `Ok(Resolution::Value(expr))`.
///
/// # Example
///
/// ```ignore
/// use pledge::{resolved, Runtime};
///
/// let rt = Runtime::new();
/// let doubled = rt.resolve_value(21).and_then(|v| resolved!(v * 2));
/// ```
#[macro_export]
macro_rules! resolved {
    ($value:expr) => {
        ::core::result::Result::Ok($crate::Resolution::Value($value))
    };
}

/// Reject from a handler with a formatted message.
///
/// Expands to `Err(Reason::msg(format!(..)))`.
///
/// # Example
///
/// ```ignore
/// use pledge::{rejected, Runtime};
///
/// let rt = Runtime::new();
/// let checked = rt.resolve_value(-1).and_then(|v: i32| {
///     if v < 0 {
///         return rejected!("negative input: {}", v);
///     }
///     pledge::resolved!(v)
/// });
/// ```
#[macro_export]
macro_rules! rejected {
    ($($arg:tt)+) => {
        ::core::result::Result::Err($crate::Reason::msg(::std::format!($($arg)+)))
    };
}
