//! Single-flight session control.
//!
//! [`SessionController`] owns the transcript and enforces the one request in
//! flight policy.  It never awaits anything itself: [`SessionController::send`]
//! hands back a [`PendingQuery`] that the caller drives, and the caller feeds
//! the outcome back through [`SessionController::settle`].  Because every
//! mutation goes through `&mut self` on one control loop, transcript updates
//! cannot race, and a [`SessionController::new_session`] issued while a query
//! is outstanding takes effect immediately.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;

use crate::chat::config::ChatConfig;
use crate::client::QueryService;
use crate::error::Result;
use crate::observability::{
    SESSION_DISCARDED, SESSION_FAILURES, SESSION_IGNORED_SENDS, SESSION_QUERY_DURATION,
    SESSION_RESETS, SESSION_SENDS,
};
use crate::transcript::{SubscriptionId, Transcript, TranscriptObserver};
use crate::types::{Message, MessageId, MessageStatus, QueryRequest, QueryResponse};

/// Text shown in place of an answer when a query fails for any reason.
pub const FALLBACK_TEXT: &str = "Sorry, I encountered an error while processing your request. \
Please make sure the analytics backend is reachable.";

/// Whether a request is outstanding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Ready to send.
    Idle,
    /// Waiting for an answer; further sends are ignored.
    Sending,
}

/// An issued query that has not settled yet.
///
/// Dropping it abandons the request; the placeholder then stays pending
/// until [`SessionController::new_session`].
pub struct PendingQuery {
    target: MessageId,
    request: QueryRequest,
    started: Instant,
    future: BoxFuture<'static, Result<QueryResponse>>,
}

impl PendingQuery {
    /// Id of the placeholder this query will resolve.
    pub fn target(&self) -> MessageId {
        self.target
    }

    /// The request that was issued.
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    /// Wait for the backend and package the outcome for
    /// [`SessionController::settle`].
    pub async fn resolve(self) -> Settled {
        let outcome = self.future.await;
        SESSION_QUERY_DURATION.add(self.started.elapsed().as_secs_f64());
        Settled {
            target: self.target,
            outcome,
        }
    }
}

impl std::fmt::Debug for PendingQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQuery")
            .field("target", &self.target)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// The outcome of a query, addressed to its placeholder.
#[derive(Debug)]
pub struct Settled {
    /// Placeholder id.
    pub target: MessageId,
    /// What the backend said.
    pub outcome: Result<QueryResponse>,
}

/// What [`SessionController::settle`] did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The placeholder was resolved to this status.
    Applied(MessageStatus),
    /// The outcome belonged to an abandoned request and was dropped.
    Discarded,
}

/// Counters describing a session's activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Number of messages currently in the transcript.
    pub message_count: usize,
    /// Queries issued.
    pub queries_sent: u64,
    /// Sends ignored because the input was blank or a query was outstanding.
    pub ignored_sends: u64,
    /// Queries that resolved to a failure.
    pub failures: u64,
    /// Late outcomes dropped after a session reset.
    pub discarded: u64,
    /// Number of `new_session` calls.
    pub resets: u64,
}

/// Orchestrates send, settle and reset against a [`QueryService`].
pub struct SessionController<S: QueryService + ?Sized> {
    service: Arc<S>,
    config: ChatConfig,
    transcript: Transcript,
    state: SessionState,
    in_flight: Option<MessageId>,
    invalidated: HashSet<MessageId>,
    stats: SessionStats,
}

impl<S: QueryService + ?Sized + 'static> SessionController<S> {
    /// Creates an idle controller with an empty transcript.
    pub fn new(service: Arc<S>, config: ChatConfig) -> Self {
        Self {
            service,
            config,
            transcript: Transcript::new(),
            state: SessionState::Idle,
            in_flight: None,
            invalidated: HashSet::new(),
            stats: SessionStats::default(),
        }
    }

    /// Submits a question.
    ///
    /// Returns `None`, changing nothing, when the trimmed text is empty or a
    /// query is already outstanding.  Otherwise appends the user message and
    /// a pending assistant placeholder, moves to [`SessionState::Sending`],
    /// and returns the issued query.
    pub fn send(&mut self, text: &str) -> Option<PendingQuery> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("ignoring blank input");
            self.ignore_send();
            return None;
        }
        if self.state == SessionState::Sending {
            tracing::debug!(in_flight = ?self.in_flight, "ignoring send while a query is outstanding");
            self.ignore_send();
            return None;
        }

        let placeholder = Message::pending_assistant();
        let target = placeholder.id;
        if let Err(err) = self
            .transcript
            .append(Message::user(text))
            .and_then(|()| self.transcript.append(placeholder))
        {
            // Only reachable if the transcript was edited behind our back.
            tracing::warn!(error = %err, "could not append to transcript");
            self.ignore_send();
            return None;
        }

        // Ids of abandoned queries are gone from the transcript, so their
        // late outcomes settle as not found from here on.
        self.invalidated.clear();
        self.state = SessionState::Sending;
        self.in_flight = Some(target);
        self.stats.queries_sent += 1;
        SESSION_SENDS.click();

        let request = self.config.request_for(text);
        tracing::info!(%target, query = %request.query, "issuing analytics query");
        let service = Arc::clone(&self.service);
        let outbound = request.clone();
        Some(PendingQuery {
            target,
            request,
            started: Instant::now(),
            future: Box::pin(async move { service.query(outbound).await }),
        })
    }

    /// Applies the outcome of a query.
    ///
    /// Success fills the placeholder with the answer and chart; any failure
    /// fills it with [`FALLBACK_TEXT`] and marks it failed.  Outcomes for a
    /// placeholder abandoned by [`SessionController::new_session`], or no
    /// longer in the transcript, are discarded without touching anything.
    pub fn settle(&mut self, settled: Settled) -> SettleOutcome {
        let Settled { target, outcome } = settled;
        if self.invalidated.remove(&target) {
            tracing::debug!(%target, "discarding outcome of abandoned query");
            return self.discard();
        }

        let (status, text, chart) = match outcome {
            Ok(answer) if answer.success => {
                let chart = answer.chart_ref();
                (MessageStatus::Complete, answer.response, chart)
            }
            Ok(answer) => {
                tracing::warn!(%target, error = ?answer.error, "backend reported failure");
                (MessageStatus::Failed, FALLBACK_TEXT.to_string(), None)
            }
            Err(err) => {
                tracing::warn!(%target, error = %err, "analytics query failed");
                (MessageStatus::Failed, FALLBACK_TEXT.to_string(), None)
            }
        };

        match self.transcript.update_status(target, status, text, chart) {
            Ok(()) => {
                if self.in_flight == Some(target) {
                    self.in_flight = None;
                    self.state = SessionState::Idle;
                }
                if status == MessageStatus::Failed {
                    self.stats.failures += 1;
                    SESSION_FAILURES.click();
                }
                SettleOutcome::Applied(status)
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!(%target, "placeholder is gone; discarding outcome");
                self.discard()
            }
            Err(err) => {
                tracing::warn!(%target, error = %err, "could not apply query outcome");
                self.discard()
            }
        }
    }

    /// Issues `text` and waits for its outcome.
    ///
    /// Returns `None` when the send was ignored.  Callers that must stay
    /// responsive while waiting should drive [`PendingQuery`] themselves.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use askdata::chat::{ChatConfig, SessionController, SettleOutcome};
    /// # use askdata::{MessageStatus, QueryRequest, QueryResponse, QueryService, Result};
    /// struct Echo;
    ///
    /// #[async_trait::async_trait]
    /// impl QueryService for Echo {
    ///     async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
    ///         Ok(QueryResponse::answer(format!("You asked: {}", request.query)))
    ///     }
    /// }
    ///
    /// # tokio_test::block_on(async {
    /// let mut session = SessionController::new(Arc::new(Echo), ChatConfig::new());
    /// let outcome = session.send_and_settle("revenue today?").await;
    /// assert_eq!(outcome, Some(SettleOutcome::Applied(MessageStatus::Complete)));
    /// assert_eq!(session.transcript().len(), 2);
    /// # });
    /// ```
    pub async fn send_and_settle(&mut self, text: &str) -> Option<SettleOutcome> {
        let pending = self.send(text)?;
        let settled = pending.resolve().await;
        Some(self.settle(settled))
    }

    /// Starts over with an empty transcript.
    ///
    /// An outstanding query is abandoned logically: its eventual outcome is
    /// discarded.  The request itself keeps running until its owner drops it.
    pub fn new_session(&mut self) {
        if let Some(target) = self.in_flight.take() {
            tracing::info!(%target, "abandoning outstanding query");
            self.invalidated.insert(target);
        }
        self.transcript.clear();
        self.state = SessionState::Idle;
        self.stats.resets += 1;
        SESSION_RESETS.click();
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while a query is outstanding.
    pub fn is_sending(&self) -> bool {
        self.state == SessionState::Sending
    }

    /// The conversation so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Registers a transcript observer.
    pub fn subscribe(&mut self, observer: Box<dyn TranscriptObserver>) -> SubscriptionId {
        self.transcript.subscribe(observer)
    }

    /// Removes a transcript observer.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.transcript.unsubscribe(id)
    }

    /// The query collaborator.
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Enables or disables chart generation for later queries.
    pub fn set_generate_chart(&mut self, generate_chart: bool) {
        self.config.generate_chart = generate_chart;
    }

    /// Sets the chart type for later queries.
    pub fn set_chart_type(&mut self, chart_type: impl Into<String>) {
        self.config.chart_type = chart_type.into();
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            message_count: self.transcript.len(),
            ..self.stats.clone()
        }
    }

    fn ignore_send(&mut self) {
        self.stats.ignored_sends += 1;
        SESSION_IGNORED_SENDS.click();
    }

    fn discard(&mut self) -> SettleOutcome {
        self.stats.discarded += 1;
        SESSION_DISCARDED.click();
        SettleOutcome::Discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::sync::oneshot;

    use crate::error::Error;
    use crate::types::{ChartRef, Role};

    /// Answers from a script, recording every request.
    #[derive(Default)]
    struct ScriptedService {
        answers: Mutex<VecDeque<Result<QueryResponse>>>,
        requests: Mutex<Vec<QueryRequest>>,
    }

    impl ScriptedService {
        fn with(answers: Vec<Result<QueryResponse>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl QueryService for ScriptedService {
        async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
            self.requests.lock().unwrap().push(request);
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::connection("script exhausted", None)))
        }
    }

    /// Answers only when the test says so.
    struct DeferredService {
        gates: Mutex<VecDeque<oneshot::Receiver<Result<QueryResponse>>>>,
    }

    impl DeferredService {
        fn new(count: usize) -> (Arc<Self>, Vec<oneshot::Sender<Result<QueryResponse>>>) {
            let mut senders = Vec::new();
            let mut gates = VecDeque::new();
            for _ in 0..count {
                let (tx, rx) = oneshot::channel();
                senders.push(tx);
                gates.push_back(rx);
            }
            (
                Arc::new(Self {
                    gates: Mutex::new(gates),
                }),
                senders,
            )
        }
    }

    #[async_trait::async_trait]
    impl QueryService for DeferredService {
        async fn query(&self, _request: QueryRequest) -> Result<QueryResponse> {
            let gate = self.gates.lock().unwrap().pop_front();
            match gate {
                Some(gate) => gate
                    .await
                    .unwrap_or_else(|_| Err(Error::connection("gate dropped", None))),
                None => Err(Error::connection("no gate", None)),
            }
        }
    }

    fn controller<S: QueryService + 'static>(service: Arc<S>) -> SessionController<S> {
        SessionController::new(service, ChatConfig::new())
    }

    #[test]
    fn blank_input_is_ignored() {
        let mut session = controller(ScriptedService::with(vec![]));
        assert!(session.send("").is_none());
        assert!(session.send("   \n\t").is_none());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.transcript().is_empty());
        assert_eq!(session.stats().ignored_sends, 2);
    }

    #[test]
    fn send_appends_user_and_placeholder() {
        let mut session = controller(ScriptedService::with(vec![]));
        let pending = session.send("  How many orders today?  ").unwrap();

        assert_eq!(session.state(), SessionState::Sending);
        let messages = session.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "How many orders today?");
        assert_eq!(messages[0].status, MessageStatus::Complete);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].status, MessageStatus::Pending);
        assert!(messages[1].text.is_empty());
        assert_eq!(pending.target(), messages[1].id);

        let request = pending.request();
        assert_eq!(request.query, "How many orders today?");
        assert!(request.generate_chart);
        assert_eq!(request.chart_type, "auto");
    }

    #[test]
    fn send_while_sending_changes_nothing() {
        let mut session = controller(ScriptedService::with(vec![]));
        let _pending = session.send("first").unwrap();
        let before: Vec<Message> = session.transcript().messages().to_vec();

        assert!(session.send("second").is_none());
        assert_eq!(session.transcript().messages(), before.as_slice());
        assert_eq!(session.state(), SessionState::Sending);
    }

    #[tokio::test]
    async fn success_completes_placeholder() {
        let answer = QueryResponse::answer("## Revenue\n- Total: **$1,200**")
            .with_chart("/charts/revenue.png", Some("Revenue".to_string()));
        let service = ScriptedService::with(vec![Ok(answer)]);
        let mut session = controller(Arc::clone(&service));

        let outcome = session.send_and_settle("revenue?").await;
        assert_eq!(outcome, Some(SettleOutcome::Applied(MessageStatus::Complete)));
        assert_eq!(session.state(), SessionState::Idle);

        let last = session.transcript().last().unwrap();
        assert_eq!(last.status, MessageStatus::Complete);
        assert_eq!(last.text, "## Revenue\n- Total: **$1,200**");
        assert_eq!(
            last.chart,
            Some(ChartRef::new(
                "/charts/revenue.png",
                Some("Revenue".to_string())
            ))
        );
        assert_eq!(service.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_uses_fallback() {
        let service = ScriptedService::with(vec![Err(Error::connection("refused", None))]);
        let mut session = controller(service);

        let outcome = session.send_and_settle("x").await;
        assert_eq!(outcome, Some(SettleOutcome::Applied(MessageStatus::Failed)));
        assert_eq!(session.state(), SessionState::Idle);

        let messages = session.transcript().messages();
        assert_eq!(messages.len(), 2);
        let last = &messages[1];
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.status, MessageStatus::Failed);
        assert_eq!(last.text, FALLBACK_TEXT);
        assert!(last.chart.is_none());
        assert_eq!(session.stats().failures, 1);
    }

    #[tokio::test]
    async fn reported_failure_is_treated_like_transport_failure() {
        let service = ScriptedService::with(vec![Ok(
            QueryResponse::failure("no data").with_chart("/charts/x.png", None)
        )]);
        let mut session = controller(service);

        session.send_and_settle("x").await;
        let last = session.transcript().last().unwrap();
        assert_eq!(last.status, MessageStatus::Failed);
        assert_eq!(last.text, FALLBACK_TEXT);
        assert!(last.chart.is_none());
    }

    #[tokio::test]
    async fn resend_after_failure_is_a_fresh_send() {
        let service = ScriptedService::with(vec![
            Err(Error::timeout("slow", None)),
            Ok(QueryResponse::answer("42 orders")),
        ]);
        let mut session = controller(Arc::clone(&service));

        session.send_and_settle("orders?").await;
        session.send_and_settle("orders?").await;

        let statuses: Vec<_> = session
            .transcript()
            .messages()
            .iter()
            .map(|m| (m.role, m.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (Role::User, MessageStatus::Complete),
                (Role::Assistant, MessageStatus::Failed),
                (Role::User, MessageStatus::Complete),
                (Role::Assistant, MessageStatus::Complete),
            ]
        );
        assert_eq!(service.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn new_session_discards_late_answer() {
        let (service, mut gates) = DeferredService::new(1);
        let mut session = controller(service);

        let pending = session.send("a").unwrap();
        session.new_session();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.transcript().is_empty());

        gates
            .remove(0)
            .send(Ok(QueryResponse::answer("late answer")))
            .unwrap();
        let settled = pending.resolve().await;
        assert_eq!(session.settle(settled), SettleOutcome::Discarded);
        assert!(session.transcript().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.stats().discarded, 1);
    }

    #[tokio::test]
    async fn stale_answer_does_not_touch_next_query() {
        let (service, mut gates) = DeferredService::new(2);
        let mut session = controller(service);

        let stale = session.send("old question").unwrap();
        session.new_session();
        let fresh = session.send("new question").unwrap();
        assert_eq!(session.state(), SessionState::Sending);

        let second = gates.remove(1);
        let first = gates.remove(0);
        first.send(Ok(QueryResponse::answer("old answer"))).unwrap();
        let settled = stale.resolve().await;
        assert_eq!(session.settle(settled), SettleOutcome::Discarded);
        // The fresh query is still outstanding.
        assert_eq!(session.state(), SessionState::Sending);
        assert!(session.transcript().pending().is_some());

        second.send(Ok(QueryResponse::answer("new answer"))).unwrap();
        let settled = fresh.resolve().await;
        assert_eq!(
            session.settle(settled),
            SettleOutcome::Applied(MessageStatus::Complete)
        );
        let texts: Vec<_> = session
            .transcript()
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["new question", "new answer"]);
    }

    #[tokio::test]
    async fn settling_twice_is_discarded() {
        let service = ScriptedService::with(vec![Ok(QueryResponse::answer("once"))]);
        let mut session = controller(service);
        let pending = session.send("q").unwrap();
        let target = pending.target();
        let settled = pending.resolve().await;
        assert_eq!(
            session.settle(settled),
            SettleOutcome::Applied(MessageStatus::Complete)
        );
        let duplicate = Settled {
            target,
            outcome: Ok(QueryResponse::answer("twice")),
        };
        assert_eq!(session.settle(duplicate), SettleOutcome::Discarded);
        assert_eq!(session.transcript().get(target).unwrap().text, "once");
    }

    #[tokio::test]
    async fn abandoned_ids_do_not_accumulate() {
        let (service, mut gates) = DeferredService::new(3);
        let mut session = controller(service);

        let dropped = session.send("interrupted").unwrap();
        let dropped_target = dropped.target();
        drop(dropped);
        session.new_session();
        assert_eq!(session.invalidated.len(), 1);

        let stale = session.send("also abandoned").unwrap();
        assert!(session.invalidated.is_empty());
        session.new_session();
        let fresh = session.send("kept").unwrap();
        assert!(session.invalidated.is_empty());

        // The dropped query's outcome can still show up; it must not land.
        let late = Settled {
            target: dropped_target,
            outcome: Ok(QueryResponse::answer("never shown")),
        };
        assert_eq!(session.settle(late), SettleOutcome::Discarded);

        // Gates are taken in polling order, and the dropped query was never polled.
        let for_stale = gates.remove(0);
        let for_fresh = gates.remove(0);
        for_stale
            .send(Ok(QueryResponse::answer("stale")))
            .unwrap();
        let settled = stale.resolve().await;
        assert_eq!(session.settle(settled), SettleOutcome::Discarded);
        assert_eq!(session.state(), SessionState::Sending);

        for_fresh.send(Ok(QueryResponse::answer("fresh"))).unwrap();
        let settled = fresh.resolve().await;
        assert_eq!(
            session.settle(settled),
            SettleOutcome::Applied(MessageStatus::Complete)
        );
        let texts: Vec<_> = session
            .transcript()
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["kept", "fresh"]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn chart_settings_flow_into_requests() {
        let mut session = controller(ScriptedService::with(vec![]));
        session.set_generate_chart(false);
        session.set_chart_type("pie");
        let pending = session.send("q").unwrap();
        assert!(!pending.request().generate_chart);
        assert_eq!(pending.request().chart_type, "pie");
    }

    #[test]
    fn new_session_when_idle_just_clears() {
        let mut session = controller(ScriptedService::with(vec![]));
        session.new_session();
        assert!(session.transcript().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.stats().resets, 1);
    }
}
