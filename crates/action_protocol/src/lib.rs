//! # Conveyor Action Protocol
//!
//! The contract between the Conveyor task executor and the external tools it
//! drives. Conveyor never inspects file contents: every transformation (HTML
//! minification, SCSS compilation, copying images, starting a dev server) is
//! an [`Action`] that receives resolved source paths and a destination
//! directory and reports completion or failure.
//!
//! ## Quick Start
//!
//! ```rust
//! use conveyor_action_protocol::{Action, ActionContext, ActionReport, ActionResult, Completion};
//!
//! struct Touch;
//!
//! impl Action for Touch {
//!     fn kind(&self) -> &str {
//!         "touch"
//!     }
//!
//!     fn start(&self, context: ActionContext) -> Completion {
//!         Completion::from_result((|| -> ActionResult {
//!             let dest = context.require_dest()?;
//!             std::fs::create_dir_all(dest)?;
//!             let marker = dest.join(".touched");
//!             std::fs::write(&marker, context.task.as_bytes())?;
//!             Ok(ActionReport::written(vec![marker]))
//!         })())
//!     }
//! }
//! ```
//!
//! ## Completion
//!
//! Actions either finish before [`Action::start`] returns
//! ([`Completion::Done`]) or hand back a [`DoneSignal`] that the action fires
//! later from another thread ([`Completion::Deferred`]). The deferred form
//! covers long-running work such as a dev server that is "complete" once it
//! prints its readiness marker.
//!
//! ## Modules
//!
//! - [`traits`] - The [`Action`] trait
//! - [`types`] - [`ActionContext`], [`SourceFile`] and [`ActionReport`]
//! - [`completion`] - [`Completion`], [`DoneSignal`] and [`done_channel`]
//! - [`message`] - Serializable [`CompletionMessage`] for live-reload servers

pub mod completion;
pub mod message;
pub mod traits;
pub mod types;

pub use completion::{done_channel, Completion, DoneHandle, DoneSignal};
pub use message::CompletionMessage;
pub use traits::Action;
pub use types::{ActionContext, ActionReport, ActionResult, SourceFile};
