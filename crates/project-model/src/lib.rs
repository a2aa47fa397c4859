//! EasyCut Project Model
//!
//! Defines the data contracts shared by the host and the render engine:
//! - **Scheme:** target encode parameters (size, codec, bitrate, fps, pad, container)
//! - **Work items:** ordered source media with trim, filters, and advanced inputs
//! - **Session config:** the immutable input of one render session
//!
//! Everything here is plain data; no encoder is ever invoked from this crate.

pub mod error;
pub mod scheme;
pub mod session;
pub mod work_item;

pub use error::*;
pub use scheme::*;
pub use session::*;
pub use work_item::*;
