//! Cooperative event loop around a [`SessionController`].
//!
//! User actions arrive on a channel and outstanding queries are polled in the
//! same `select!`, so a [`SessionAction::NewSession`] is applied while a
//! query is still running rather than after it.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::mpsc;

use crate::chat::controller::SessionController;
use crate::client::QueryService;

/// Something the user asked the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Submit a question.
    Send(String),
    /// Clear the conversation and abandon any outstanding query.
    NewSession,
}

/// Runs `controller` until `actions` closes and every issued query settled.
///
/// Late outcomes of abandoned queries still settle, and are discarded by the
/// controller.  Returns the controller so callers can inspect the result.
pub async fn run_session<S>(
    mut controller: SessionController<S>,
    mut actions: mpsc::UnboundedReceiver<SessionAction>,
) -> SessionController<S>
where
    S: QueryService + ?Sized + 'static,
{
    let mut outstanding = FuturesUnordered::new();
    let mut open = true;
    loop {
        tokio::select! {
            action = actions.recv(), if open => match action {
                Some(SessionAction::Send(text)) => {
                    if let Some(pending) = controller.send(&text) {
                        outstanding.push(pending.resolve());
                    }
                }
                Some(SessionAction::NewSession) => controller.new_session(),
                None => {
                    tracing::debug!(outstanding = outstanding.len(), "action channel closed");
                    open = false;
                }
            },
            Some(settled) = outstanding.next(), if !outstanding.is_empty() => {
                let outcome = controller.settle(settled);
                tracing::debug!(?outcome, "query settled");
            }
            else => break,
        }
    }
    controller
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use tokio::sync::oneshot;

    use crate::chat::config::ChatConfig;
    use crate::chat::controller::SessionState;
    use crate::error::{Error, Result};
    use crate::types::{MessageStatus, QueryRequest, QueryResponse, Role};

    struct GatedService {
        gates: Mutex<VecDeque<oneshot::Receiver<Result<QueryResponse>>>>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl QueryService for GatedService {
        async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
            self.seen.lock().unwrap().push(request.query);
            let gate = self.gates.lock().unwrap().pop_front();
            match gate {
                Some(gate) => gate
                    .await
                    .unwrap_or_else(|_| Err(Error::connection("gate dropped", None))),
                None => Err(Error::connection("no gate", None)),
            }
        }
    }

    fn gated(count: usize) -> (Arc<GatedService>, Vec<oneshot::Sender<Result<QueryResponse>>>) {
        let mut senders = Vec::new();
        let mut gates = VecDeque::new();
        for _ in 0..count {
            let (tx, rx) = oneshot::channel();
            senders.push(tx);
            gates.push_back(rx);
        }
        let service = Arc::new(GatedService {
            gates: Mutex::new(gates),
            seen: Mutex::new(Vec::new()),
        });
        (service, senders)
    }

    #[tokio::test]
    async fn answers_in_order() {
        let (service, mut gates) = gated(1);
        let controller = SessionController::new(Arc::clone(&service), ChatConfig::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let loop_handle = tokio::spawn(run_session(controller, rx));

        tx.send(SessionAction::Send("orders today?".to_string()))
            .unwrap();
        gates
            .remove(0)
            .send(Ok(QueryResponse::answer("17 orders")))
            .unwrap();
        drop(tx);

        let controller = loop_handle.await.unwrap();
        assert_eq!(controller.state(), SessionState::Idle);
        let messages = controller.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].status, MessageStatus::Complete);
        assert_eq!(messages[1].text, "17 orders");
    }

    #[tokio::test]
    async fn new_session_applies_while_query_is_outstanding() {
        let (service, mut gates) = gated(2);
        let controller = SessionController::new(Arc::clone(&service), ChatConfig::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let loop_handle = tokio::spawn(run_session(controller, rx));

        tx.send(SessionAction::Send("first".to_string())).unwrap();
        tx.send(SessionAction::NewSession).unwrap();
        tx.send(SessionAction::Send("second".to_string())).unwrap();
        // Wait until both queries reached the backend before answering.
        while service.seen.lock().unwrap().len() < 2 {
            tokio::task::yield_now().await;
        }
        let second = gates.remove(1);
        gates
            .remove(0)
            .send(Ok(QueryResponse::answer("stale")))
            .unwrap();
        second.send(Ok(QueryResponse::answer("fresh"))).unwrap();
        drop(tx);

        let controller = loop_handle.await.unwrap();
        let texts: Vec<_> = controller
            .transcript()
            .messages()
            .iter()
            .map(|m| m.text.clone())
            .collect();
        assert_eq!(texts, vec!["second".to_string(), "fresh".to_string()]);
        assert_eq!(controller.stats().discarded, 1);
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn sends_during_flight_are_ignored() {
        let (service, mut gates) = gated(1);
        let controller = SessionController::new(Arc::clone(&service), ChatConfig::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let loop_handle = tokio::spawn(run_session(controller, rx));

        tx.send(SessionAction::Send("one".to_string())).unwrap();
        tx.send(SessionAction::Send("two".to_string())).unwrap();
        while service.seen.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        gates
            .remove(0)
            .send(Err(Error::timeout("slow", None)))
            .unwrap();
        drop(tx);

        let controller = loop_handle.await.unwrap();
        assert_eq!(service.seen.lock().unwrap().as_slice(), ["one".to_string()]);
        assert_eq!(controller.transcript().len(), 2);
        assert_eq!(
            controller.transcript().last().unwrap().status,
            MessageStatus::Failed
        );
        assert_eq!(controller.stats().ignored_sends, 1);
    }
}
