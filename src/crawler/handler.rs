//! User-supplied page handlers

use crate::crawler::response::Response;
use crate::output::ItemSaver;
use async_trait::async_trait;
use std::future::Future;

/// Processes one fetched resource
///
/// Handlers extract data with the response's query helpers, persist it with
/// [`ItemSaver::save_item`] and enqueue new URLs with [`Response::follow`].
/// An error aborts the run unless the spider ignores handler errors.
///
/// Any `Fn(Response, ItemSaver) -> impl Future<Output = anyhow::Result<()>>`
/// is a handler:
///
/// ```no_run
/// use sumi_spider::{Config, ItemSaver, Response, Spider};
///
/// # async fn run() -> sumi_spider::Result<()> {
/// let spider = Spider::new(
///     ["https://example.com/"],
///     |response: Response, items: ItemSaver| async move {
///         items.save_item(&serde_json::json!({ "url": response.url().as_str() })).await?;
///         for link in response.links() {
///             response.follow(&link).await?;
///         }
///         anyhow::Ok(())
///     },
///     Config::default(),
/// )?;
/// let stats = spider.run().await?;
/// println!("{} pages", stats.request_counter);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Handler: Send + Sync {
    async fn parse(&self, response: Response, items: ItemSaver) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Response, ItemSaver) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn parse(&self, response: Response, items: ItemSaver) -> anyhow::Result<()> {
        self(response, items).await
    }
}
