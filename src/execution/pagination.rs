//! Result pagination.
//!
//! Result endpoints return at most one page per response and point at the next
//! page with an absolute URL. [`drain`] follows those links and merges every page
//! into the first one, for both JSON and CSV results.

use async_trait::async_trait;

use crate::api::ExecutionApi;
use crate::error::{Result, ResultExt};
use crate::types::{CsvResponse, ExecutionId, QueryId, ResultsPageParams, ResultsResponse};

/// A result page that may point at a following page.
pub trait Paginated: Send + Sized {
    /// Absolute URL of the next page, or `None` on the last page.
    fn next_uri(&self) -> Option<&str>;

    /// Appends `next` after the data already held and adopts its continuation.
    fn absorb(&mut self, next: Self);
}

/// Fetches continuation pages of type `P`.
#[async_trait]
pub trait PageFetcher<P: Paginated>: Send + Sync {
    async fn fetch_page(&self, next_uri: &str) -> Result<P>;
}

/// Follows continuations from `initial` until a page without one is reached.
///
/// Pages are merged in the order received. On error the partial result is
/// dropped and the error names the continuation that failed.
pub async fn drain<P, F>(initial: P, fetcher: &F) -> Result<P>
where
    P: Paginated,
    F: PageFetcher<P> + ?Sized,
{
    let mut acc = initial;
    let mut pages = 1usize;

    while let Some(next_uri) = acc.next_uri().map(str::to_owned) {
        let page = fetcher
            .fetch_page(&next_uri)
            .await
            .context(format!("fetching page {} at {}", pages + 1, next_uri))?;
        acc.absorb(page);
        pages += 1;
    }

    tracing::debug!(pages, "result pages drained");
    Ok(acc)
}

impl Paginated for ResultsResponse {
    fn next_uri(&self) -> Option<&str> {
        self.next_uri.as_deref()
    }

    /// Rows are appended; metadata stays as received on the first page.
    fn absorb(&mut self, next: Self) {
        self.result.rows.extend(next.result.rows);
        self.next_uri = next.next_uri;
        self.next_offset = next.next_offset;
    }
}

impl Paginated for CsvResponse {
    fn next_uri(&self) -> Option<&str> {
        self.next_uri.as_deref()
    }

    /// Text is appended verbatim. Continuation pages carry no header row.
    fn absorb(&mut self, next: Self) {
        self.data.push_str(&next.data);
        self.next_uri = next.next_uri;
        self.next_offset = next.next_offset;
    }
}

#[async_trait]
impl<A: ExecutionApi + ?Sized> PageFetcher<ResultsResponse> for A {
    async fn fetch_page(&self, next_uri: &str) -> Result<ResultsResponse> {
        self.get_results_page(next_uri).await
    }
}

#[async_trait]
impl<A: ExecutionApi + ?Sized> PageFetcher<CsvResponse> for A {
    async fn fetch_page(&self, next_uri: &str) -> Result<CsvResponse> {
        self.get_csv_page(next_uri).await
    }
}

/// A result representation with its own first-page endpoints.
///
/// Lets the orchestrator and the freshness check pick JSON or CSV output
/// without duplicating their control flow.
#[async_trait]
pub trait ResultFormat: Paginated + 'static {
    /// Short name used in log events.
    const NAME: &'static str;

    /// Fetches the first page of an execution's results.
    async fn first_page(api: &dyn ExecutionApi, execution_id: &ExecutionId) -> Result<Self>;

    /// Fetches the first page of the latest results of a query.
    async fn first_latest_page(
        api: &dyn ExecutionApi,
        query_id: QueryId,
        params: &ResultsPageParams,
    ) -> Result<Self>;

    /// Fetches and drains all results of an execution.
    async fn fetch_all(api: &dyn ExecutionApi, execution_id: &ExecutionId) -> Result<Self> {
        let first = Self::first_page(api, execution_id)
            .await
            .context(format!("execution {execution_id}"))?;
        Self::drain_from(api, first)
            .await
            .context(format!("execution {execution_id}"))
    }

    /// Fetches and drains the latest results of a query.
    async fn fetch_latest(
        api: &dyn ExecutionApi,
        query_id: QueryId,
        params: &ResultsPageParams,
    ) -> Result<Self> {
        let first = Self::first_latest_page(api, query_id, params)
            .await
            .context(format!("latest results of query {query_id}"))?;
        Self::drain_from(api, first)
            .await
            .context(format!("latest results of query {query_id}"))
    }

    /// Drains `first` through the continuation endpoint of this format.
    async fn drain_from(api: &dyn ExecutionApi, first: Self) -> Result<Self>;
}

#[async_trait]
impl ResultFormat for ResultsResponse {
    const NAME: &'static str = "json";

    async fn first_page(api: &dyn ExecutionApi, execution_id: &ExecutionId) -> Result<Self> {
        api.get_execution_results(execution_id, &ResultsPageParams::default())
            .await
    }

    async fn first_latest_page(
        api: &dyn ExecutionApi,
        query_id: QueryId,
        params: &ResultsPageParams,
    ) -> Result<Self> {
        api.get_latest_results(query_id, params).await
    }

    async fn drain_from(api: &dyn ExecutionApi, first: Self) -> Result<Self> {
        drain(first, api).await
    }
}

#[async_trait]
impl ResultFormat for CsvResponse {
    const NAME: &'static str = "csv";

    async fn first_page(api: &dyn ExecutionApi, execution_id: &ExecutionId) -> Result<Self> {
        api.get_execution_results_csv(execution_id, &ResultsPageParams::default())
            .await
    }

    async fn first_latest_page(
        api: &dyn ExecutionApi,
        query_id: QueryId,
        params: &ResultsPageParams,
    ) -> Result<Self> {
        api.get_latest_results_csv(query_id, params).await
    }

    async fn drain_from(api: &dyn ExecutionApi, first: Self) -> Result<Self> {
        drain(first, api).await
    }
}
