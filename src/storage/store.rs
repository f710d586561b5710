use crate::core::AppResult;
use crate::storage::document::Document;
use crate::storage::filter::Filter;
use async_trait::async_trait;

/// Storage backend behind every `DocCollection`.
///
/// A collection name identifies one partition. Each call is atomic with
/// respect to its partition; nothing spans partitions.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn insert(&self, collection: &str, document: Document) -> AppResult<()>;

    /// Returns matches in filter order (insertion order unless sorted), at most `limit`.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> AppResult<Vec<Document>>;

    /// Applies `mutate` to the first match under the partition lock and returns
    /// the stored result, or `None` when nothing matches. An error from
    /// `mutate` leaves the stored document untouched.
    async fn update_first(
        &self,
        collection: &str,
        filter: &Filter,
        mutate: &mut (dyn for<'d> FnMut(&'d mut Document) -> AppResult<()> + Send),
    ) -> AppResult<Option<Document>>;

    /// Removes matches in filter order, at most `limit`, returning how many went.
    async fn delete(&self, collection: &str, filter: &Filter, limit: Option<usize>)
    -> AppResult<usize>;

    async fn count(&self, collection: &str, filter: &Filter) -> AppResult<usize>;
}
