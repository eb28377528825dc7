//! Synchronous and deferred action completion.

use futures::channel::oneshot;

use crate::types::ActionResult;

/// How an action reports that it has finished.
#[derive(Debug)]
pub enum Completion {
    /// The action finished before `start` returned.
    Done(ActionResult),
    /// The action will fire the paired [`DoneHandle`] later.
    Deferred(DoneSignal),
}

impl Completion {
    /// Wrap the result of synchronous work.
    pub fn from_result(result: ActionResult) -> Self {
        Self::Done(result)
    }

    /// Wait for the action to finish.
    ///
    /// A deferred action that drops its [`DoneHandle`] without completing is
    /// reported as a failure rather than hanging the run.
    pub async fn wait(self) -> ActionResult {
        match self {
            Self::Done(result) => result,
            Self::Deferred(signal) => signal.wait().await,
        }
    }
}

/// Receiving half of a deferred completion.
#[derive(Debug)]
pub struct DoneSignal {
    receiver: oneshot::Receiver<ActionResult>,
}

impl DoneSignal {
    pub async fn wait(self) -> ActionResult {
        match self.receiver.await {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(anyhow::anyhow!(
                "action dropped its completion signal without reporting a result"
            )),
        }
    }
}

/// Sending half of a deferred completion. Fire it exactly once.
#[derive(Debug)]
pub struct DoneHandle {
    sender: oneshot::Sender<ActionResult>,
}

impl DoneHandle {
    /// Report the outcome. Ignored if the executor stopped waiting.
    pub fn complete(self, result: ActionResult) {
        let _ = self.sender.send(result);
    }
}

/// Create a linked [`DoneHandle`] / [`DoneSignal`] pair.
#[must_use]
pub fn done_channel() -> (DoneHandle, DoneSignal) {
    let (sender, receiver) = oneshot::channel();
    (DoneHandle { sender }, DoneSignal { receiver })
}
