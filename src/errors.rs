//! Error classification shared by every layer of the crate.

/// Trait for errors that can be classified as retryable or permanent.
///
/// Two levels of classification:
///
/// 1. **Call-level** (`is_retryable`): the same call against the same order
///    may succeed if repeated. Network failures, vendor 5xx, rate limits.
///
/// 2. **Operation-level** (`should_retry_operation`): the call will not
///    succeed as issued, but a fresh attempt (another country, another
///    provider, a new number) might.
///
/// # Examples
///
/// ```rust
/// use sms_provisioner::RetryableError;
///
/// enum VendorError {
///     Timeout,       // retry the same call
///     NoNumbers,     // try another country or vendor
///     BadApiKey,     // never works until fixed
/// }
///
/// impl RetryableError for VendorError {
///     fn is_retryable(&self) -> bool {
///         matches!(self, VendorError::Timeout)
///     }
///
///     fn should_retry_operation(&self) -> bool {
///         matches!(self, VendorError::Timeout | VendorError::NoNumbers)
///     }
/// }
/// ```
pub trait RetryableError {
    /// Returns true if this error represents a transient failure
    /// that might succeed when the same call is repeated.
    fn is_retryable(&self) -> bool;

    /// Returns true if a fresh operation might succeed.
    ///
    /// Default implementation returns the same as `is_retryable()`.
    fn should_retry_operation(&self) -> bool {
        self.is_retryable()
    }
}
