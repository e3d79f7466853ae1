//! Search coordinator / 搜索协调器
//!
//! Turns fire-and-forget searches into something an HTTP handler can wait on.
//! State is a single slot: a new query replaces the pending one and clears
//! the previous results before the backend is invoked.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::backend::SearchBackend;
use super::query::Query;
use super::SearchError;

/// Ordered absolute paths produced by one search / 一次搜索的结果
pub type ResultSet = Arc<Vec<String>>;

/// Identifies one submitted query / 查询标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchTicket(u64);

impl SearchTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct SearchState {
    pending: Option<(SearchTicket, Query)>,
    results: Option<ResultSet>,
    failure: Option<String>,
    awaiting: bool,
    next_id: u64,
}

struct Shared {
    state: Mutex<SearchState>,
    notify: Notify,
}

impl Shared {
    fn store(state: &mut SearchState, results: Vec<String>) {
        state.results = Some(Arc::new(results));
        state.failure = None;
        state.awaiting = false;
    }

    fn complete(&self, results: Vec<String>) {
        Self::store(&mut self.state.lock(), results);
        self.notify.notify_waiters();
    }

    /// Store results only while `ticket` is pending, checked under the same lock
    fn complete_if(&self, ticket: SearchTicket, results: Vec<String>) -> bool {
        {
            let mut state = self.state.lock();
            if !Self::pending_is(&state, ticket) {
                return false;
            }
            Self::store(&mut state, results);
        }
        self.notify.notify_waiters();
        true
    }

    fn fail_if(&self, ticket: SearchTicket, message: String) -> bool {
        {
            let mut state = self.state.lock();
            if !Self::pending_is(&state, ticket) {
                return false;
            }
            state.failure = Some(message);
            state.awaiting = false;
        }
        self.notify.notify_waiters();
        true
    }

    fn pending_is(state: &SearchState, ticket: SearchTicket) -> bool {
        matches!(&state.pending, Some((t, _)) if *t == ticket)
    }

    fn is_current(&self, ticket: SearchTicket) -> bool {
        Self::pending_is(&self.state.lock(), ticket)
    }
}

/// Completion channel handed to backends / 后端回传结果的通道
#[derive(Clone)]
pub struct ResultSink {
    shared: Arc<Shared>,
}

impl ResultSink {
    /// Deliver results for `ticket`. Stale deliveries are dropped. / 提交结果，过期结果被丢弃
    pub fn deliver(&self, ticket: SearchTicket, results: Vec<String>) -> bool {
        let count = results.len();
        if !self.shared.complete_if(ticket, results) {
            tracing::debug!("Dropping {} results of superseded search #{}", count, ticket.id());
            return false;
        }
        tracing::debug!("Search #{} completed with {} results", ticket.id(), count);
        true
    }

    /// Report a failed search so waiters stop early / 报告搜索失败
    pub fn fail(&self, ticket: SearchTicket, message: impl Into<String>) -> bool {
        let message = message.into();
        if !self.shared.fail_if(ticket, message.clone()) {
            return false;
        }
        tracing::warn!("Search #{} failed: {}", ticket.id(), message);
        true
    }

    /// Uncorrelated completion: attributed to whatever query is pending / 无标识的完成通知
    pub fn on_results_ready(&self, results: Vec<String>) {
        self.shared.complete(results);
    }

    /// Whether `ticket` is still the pending query / 查询是否仍为当前查询
    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        self.shared.is_current(ticket)
    }
}

/// Mediates between request handlers and the search backend / 协调HTTP请求与搜索后端
pub struct SearchCoordinator {
    shared: Arc<Shared>,
    backend: Arc<dyn SearchBackend>,
}

impl SearchCoordinator {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SearchState::default()),
                notify: Notify::new(),
            }),
            backend,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Publish a new query and start the backend search / 发布查询并启动搜索
    ///
    /// Returns once the backend has accepted the request; results arrive later.
    pub async fn submit(&self, query: Query) -> Result<SearchTicket, SearchError> {
        let ticket = {
            let mut state = self.shared.state.lock();
            state.next_id += 1;
            let ticket = SearchTicket(state.next_id);
            if state.awaiting {
                if let Some((old, _)) = &state.pending {
                    tracing::debug!("Search #{} superseded by #{}", old.id(), ticket.id());
                }
            }
            state.results = None;
            state.failure = None;
            state.awaiting = true;
            state.pending = Some((ticket, query.clone()));
            ticket
        };

        tracing::info!(
            "Search #{} submitted to {} backend: text={:?} filters={:?}",
            ticket.id(),
            self.backend.name(),
            query.search_text,
            query.case_filters
        );

        if let Err(e) = self.backend.start_search(ticket, query, self.sink()).await {
            self.sink().fail(ticket, e.to_string());
            return Err(SearchError::Backend(e.to_string()));
        }
        Ok(ticket)
    }

    /// Uncorrelated completion entry point / 搜索完成通知
    pub fn on_results_ready(&self, results: Vec<String>) {
        self.sink().on_results_ready(results);
    }

    /// Block until results are present or `timeout` elapses / 等待搜索结果
    pub async fn wait_for_results(&self, timeout: Duration) -> Result<ResultSet, SearchError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // register before checking so a completion in between is not lost
            notified.as_mut().enable();

            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.outcome().unwrap_or(Err(SearchError::TimedOut(timeout)));
            }
        }
    }

    fn outcome(&self) -> Option<Result<ResultSet, SearchError>> {
        let state = self.shared.state.lock();
        if let Some(results) = &state.results {
            return Some(Ok(results.clone()));
        }
        state
            .failure
            .as_ref()
            .map(|message| Err(SearchError::Backend(message.clone())))
    }

    /// Latest completed result set / 最近一次完成的结果
    pub fn results(&self) -> Option<ResultSet> {
        self.shared.state.lock().results.clone()
    }

    pub fn pending_query(&self) -> Option<Query> {
        self.shared.state.lock().pending.as_ref().map(|(_, q)| q.clone())
    }

    pub fn is_awaiting(&self) -> bool {
        self.shared.state.lock().awaiting
    }

    /// Completion channel for this coordinator / 获取结果通道
    pub fn sink(&self) -> ResultSink {
        ResultSink { shared: self.shared.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Backend that records requests and never answers on its own
    #[derive(Default)]
    struct ManualBackend {
        started: Mutex<Vec<(SearchTicket, Query, ResultSink)>>,
    }

    #[async_trait]
    impl SearchBackend for ManualBackend {
        fn name(&self) -> &'static str {
            "manual"
        }

        async fn start_search(&self, ticket: SearchTicket, query: Query, sink: ResultSink) -> anyhow::Result<()> {
            self.started.lock().push((ticket, query, sink));
            Ok(())
        }
    }

    struct BrokenBackend;

    #[async_trait]
    impl SearchBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn start_search(&self, _: SearchTicket, _: Query, _: ResultSink) -> anyhow::Result<()> {
            anyhow::bail!("engine unavailable")
        }
    }

    fn query(text: &str) -> Query {
        Query::parse(text).unwrap()
    }

    #[tokio::test]
    async fn test_results_arrive_before_deadline() {
        let coordinator = SearchCoordinator::new(Arc::new(ManualBackend::default()));
        coordinator.submit(query("report")).await.unwrap();
        assert!(coordinator.is_awaiting());

        let sink = coordinator.sink();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            sink.on_results_ready(vec!["/docs/report.pdf".to_string()]);
        });

        let results = coordinator.wait_for_results(Duration::from_secs(10)).await.unwrap();
        assert_eq!(*results, vec!["/docs/report.pdf".to_string()]);
        assert!(!coordinator.is_awaiting());
    }

    #[tokio::test]
    async fn test_no_completion_times_out() {
        let coordinator = SearchCoordinator::new(Arc::new(ManualBackend::default()));
        coordinator.submit(query("report")).await.unwrap();

        let started = std::time::Instant::now();
        let outcome = coordinator.wait_for_results(Duration::from_millis(100)).await;
        assert!(matches!(outcome, Err(SearchError::TimedOut(_))));
        assert!(started.elapsed() >= Duration::from_millis(100));
        // the query stays pending until the next submit
        assert_eq!(coordinator.pending_query().unwrap().search_text, "report");
        assert!(coordinator.is_awaiting());
    }

    #[tokio::test]
    async fn test_submit_clears_previous_results() {
        let backend = Arc::new(ManualBackend::default());
        let coordinator = SearchCoordinator::new(backend.clone());

        coordinator.submit(query("first")).await.unwrap();
        coordinator.on_results_ready(vec!["/a".to_string()]);
        assert!(coordinator.results().is_some());

        coordinator.submit(query("second")).await.unwrap();
        assert!(coordinator.results().is_none());
        assert_eq!(backend.started.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_delivery_is_dropped() {
        let backend = Arc::new(ManualBackend::default());
        let coordinator = SearchCoordinator::new(backend.clone());

        let first = coordinator.submit(query("first")).await.unwrap();
        let second = coordinator.submit(query("second")).await.unwrap();
        assert_ne!(first, second);

        let sink = coordinator.sink();
        assert!(!sink.deliver(first, vec!["/old".to_string()]));
        assert!(coordinator.results().is_none());

        assert!(sink.deliver(second, vec!["/new".to_string()]));
        let results = coordinator.wait_for_results(Duration::from_millis(10)).await.unwrap();
        assert_eq!(*results, vec!["/new".to_string()]);
    }

    #[test]
    fn test_stale_delivery_never_lands_on_newer_query() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let coordinator = Arc::new(SearchCoordinator::new(Arc::new(ManualBackend::default())));

        for _ in 0..500 {
            let old = runtime.block_on(coordinator.submit(query("old"))).unwrap();
            let sink = coordinator.sink();
            let racer = std::thread::spawn(move || {
                sink.deliver(old, vec!["/stale".to_string()]);
                sink.fail(old, "late failure");
            });
            let newer = runtime.block_on(coordinator.submit(query("new"))).unwrap();
            racer.join().unwrap();

            // whatever the interleaving, the newer query is untouched
            assert!(coordinator.sink().is_current(newer));
            assert!(coordinator.results().is_none());
            assert!(coordinator.is_awaiting());
        }
    }

    #[tokio::test]
    async fn test_backend_failure_wakes_waiter() {
        let backend = Arc::new(ManualBackend::default());
        let coordinator = SearchCoordinator::new(backend.clone());
        let ticket = coordinator.submit(query("x")).await.unwrap();

        let sink = coordinator.sink();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            sink.fail(ticket, "core unreachable");
        });

        let outcome = coordinator.wait_for_results(Duration::from_secs(10)).await;
        assert!(matches!(outcome, Err(SearchError::Backend(m)) if m == "core unreachable"));
    }

    #[tokio::test]
    async fn test_backend_refusing_start() {
        let coordinator = SearchCoordinator::new(Arc::new(BrokenBackend));
        let outcome = coordinator.submit(query("x")).await;
        assert!(matches!(outcome, Err(SearchError::Backend(_))));
        assert!(!coordinator.is_awaiting());
    }
}
