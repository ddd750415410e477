//! Rate-limited concurrent stress driver for the Groq API.
//!
//! A [`LoadTestConfig`] names a unit of [`Work`], a dispatch rate and a
//! duration; [`run_load_test`] calls the work once per tick, waits for every
//! dispatched unit and reports success and error counts.
//!
//! ```
//! use std::time::Duration;
//! use groq_stress::{run_load_test, LoadTestConfig, WorkError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), groq_stress::StressError> {
//! let config = LoadTestConfig::new("noop", 20, Duration::from_millis(200), || async {
//!     Ok::<(), WorkError>(())
//! })?;
//! let result = run_load_test(&config).await;
//! assert_eq!(result.success_count + result.error_count, result.total_requests);
//! # Ok(())
//! # }
//! ```

/// Work units for each Groq endpoint.
pub mod cases;
/// Error types.
pub mod errors;
/// Load generator.
pub mod load;
/// Logging setup.
pub mod observability;
/// Command line settings.
pub mod settings;
/// The unit-of-work abstraction.
pub mod work;

pub use cases::suite;
pub use errors::{StressError, WorkError};
pub use load::{LoadTestConfig, LoadTestResult, run_load_test, run_load_tests};
pub use observability::{LogGuard, init_observability};
pub use settings::{LogSettings, Settings};
pub use work::{RequestOutcome, Work};
