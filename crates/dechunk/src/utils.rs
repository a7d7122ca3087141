//! Utility macros shared by the crate internals.

/// Returns early with an error if a condition is not met.
///
/// Like `assert!`, but produces an `Err` instead of panicking, for bookkeeping
/// checks that must fail the current call rather than the whole process.
///
/// ```ignore
/// ensure!(end <= self.len(), ReplayError::out_of_range(end, self.len()));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
