//! # Symbols
//!
//! Turning captured call sites into caller descriptions, and remembering the
//! answer.
//!
//! - [`FrameResolver`]: skip count -> call site -> function, file, line
//! - [`ResolutionCache`]: call site -> finished [`CallerInfo`](crate::types::CallerInfo)
//! - [`function_name`]: linkage name -> `crate::module::function`
//! - [`ProcessImage`]: symbol and line tables of the running executable

pub mod cache;
pub mod demangle;
pub mod image;
pub mod resolver;

pub use cache::ResolutionCache;
pub use demangle::function_name;
pub use image::{process_image, ImageError, ProcessImage};
pub use resolver::FrameResolver;
