//! Browser bindings for the exercise frame protocol
//!
//! Exposes the two controllers from `xframe-core` to JavaScript:
//!
//! - [`ParentFrame`]: used by the page that embeds the exercise `<iframe>`
//! - [`ExerciseFrame`]: used by the exercise document inside it
//!
//! ## Module Structure
//!
//! - `hal` - `web-sys` implementations of the platform traits
//! - `convert` - JS value ↔ JSON conversions, including upload blobs
//! - `parent` / `frame` - the `#[wasm_bindgen]` entry points

// =============================================================================
// Module declarations
// =============================================================================

pub mod convert;
mod frame;
pub mod hal;
mod parent;
pub(crate) mod util;

// =============================================================================
// Public re-exports
// =============================================================================

pub use frame::ExerciseFrame;
pub use hal::{WebEmbedded, WebHost};
pub use parent::ParentFrame;
