//! Tool-use response driver
//!
//! Builds the system prompt from the editor context and the registry's
//! tool catalog, runs one model turn, and merges tool results into the
//! assistant transcript:
//!
//! - `ResponseDriver::respond`: batch, returns the whole transcript
//! - `ResponseDriver::respond_stream`: lazy fragments as the model streams
//!
//! ```rust,ignore
//! use butler_core::driver::{CodeRequest, DriverOptions, ResponseDriver};
//!
//! let driver = ResponseDriver::new(provider, registry, logger, DriverOptions::default());
//! let mut stream = driver.respond_stream(CodeRequest::new(code, "rust", "Any bugs here?"));
//! while let Some(fragment) = stream.next().await {
//!     print!("{}", fragment?);
//! }
//! ```

mod error;
mod prompt;
mod response;

pub use error::{DriverError, DriverResult};
pub use prompt::{
    build_generation_prompt, build_system_prompt, EXPLAIN_CODE_MESSAGE, FIND_BUGS_MESSAGE,
    OPTIMIZE_CODE_MESSAGE,
};
pub use response::{CodeRequest, DriverOptions, ResponseDriver, TranscriptStream};
