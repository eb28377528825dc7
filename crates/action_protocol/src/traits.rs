//! The trait every unit of external work implements.

use crate::completion::Completion;
use crate::types::ActionContext;

/// A unit of external work the executor can run.
///
/// **Purpose**: Actions are the narrow seam between Conveyor and the tools
/// that actually transform files. The executor resolves a task's sources,
/// builds an [`ActionContext`] and calls [`Action::start`]; it never looks at
/// file contents itself.
///
/// **Threading**: `start` is called on a blocking-capable worker thread, so
/// implementations may do synchronous filesystem or process work directly.
/// Actions are shared between runs (and between watch-triggered re-runs), so
/// they must be `Send + Sync` and keep no per-run state in `self` unless it is
/// behind a lock.
///
/// # Example
///
/// ```rust
/// use conveyor_action_protocol::{done_channel, Action, ActionContext, ActionReport, Completion};
///
/// /// Completes from a background thread, the way a server signals readiness.
/// struct Background;
///
/// impl Action for Background {
///     fn kind(&self) -> &str {
///         "background"
///     }
///
///     fn start(&self, _context: ActionContext) -> Completion {
///         let (handle, signal) = done_channel();
///         std::thread::spawn(move || handle.complete(Ok(ActionReport::empty())));
///         Completion::Deferred(signal)
///     }
/// }
/// ```
pub trait Action: Send + Sync {
    /// Short label for logs and plan output, e.g. `"copy"` or `"command"`.
    fn kind(&self) -> &str;

    /// Start the action.
    ///
    /// Return [`Completion::Done`] when the work finished synchronously, or
    /// [`Completion::Deferred`] with a signal the action fires later.
    fn start(&self, context: ActionContext) -> Completion;
}
