//! I/O utilities for persistence operations.

use std::io::ErrorKind;

use crate::error::SimError;

/// Classifies I/O errors into specific SimError variants.
pub fn classify_io_error(error: std::io::Error, context: &str) -> SimError {
    match error.kind() {
        ErrorKind::StorageFull | ErrorKind::OutOfMemory => {
            SimError::DiskFull(format!("{}: {}", context, error))
        }
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
            SimError::TransientIo(format!("{}: {}", context, error))
        }
        _ => SimError::Io(format!("{}: {}", context, error)),
    }
}

/// Retries an operation while it fails with transient I/O errors.
///
/// # Arguments
/// * `operation` - Closure performing the I/O
/// * `max_retries` - Retries after the first attempt
/// * `retry_delay_ms` - Sleep between attempts
/// * `context` - Label used in log lines
pub fn retry_io_operation<F, T>(
    mut operation: F,
    max_retries: u32,
    retry_delay_ms: u64,
    context: &str,
) -> Result<T, SimError>
where
    F: FnMut() -> Result<T, SimError>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(SimError::TransientIo(msg)) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    "Transient I/O error in {} (attempt {}/{}): {}",
                    context,
                    attempt,
                    max_retries,
                    msg
                );
                if retry_delay_ms > 0 {
                    std::thread::sleep(std::time::Duration::from_millis(retry_delay_ms));
                }
            }
            Err(err) => return Err(err),
        }
    }
}
