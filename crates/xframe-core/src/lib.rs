//! Exercise Frame Controllers
//!
//! Platform-independent state machines for both ends of the exercise frame
//! protocol:
//!
//! - [`ParentController`]: the page embedding the exercise iframe
//! - [`FrameController`]: the exercise document inside the iframe
//!
//! Both are generic over the platform traits in `xframe-hal`, so the same
//! logic runs against `web-sys` in the browser and against
//! `xframe-hal-mock` in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut parent = ParentController::new(WebHost::new(iframe)?, ParentConfig::default());
//! parent.attach()?;
//! parent.push_state(state)?; // queued until the frame is ready
//! ```

#![no_std]

extern crate alloc;

pub mod backoff;
pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod origin;
pub mod parent;
pub mod relay;

pub use backoff::ReadyBackoff;
pub use config::{FrameConfig, ParentConfig};
pub use error::{FrameError, SubmitError};
pub use frame::{FrameController, FrameEvent, FrameState};
pub use origin::OriginPolicy;
pub use parent::{CurrentAnswer, ParentController, ParentState, PendingUpload};
pub use relay::{normalize_height, HeightSink, HeightTracker};
