//! Turning resolve results into queued tasks

use super::DownloadManager;
use crate::error::Result;
use crate::types::{ItemDescriptor, ResolvedSource, TaskId, TaskOptions};

impl DownloadManager {
    /// Queue every downloadable item of a resolve result
    ///
    /// - A multi-part item becomes one task per part.
    /// - Collection members are hydrated first; a member whose lookup fails
    ///   is logged and skipped.
    /// - Every task gets `skip_if_exists`, so re-running a batch only fetches
    ///   what is missing.
    /// - `custom_filename` is honored only when a single task results.
    ///
    /// Returns the IDs of the queued tasks in order.
    pub async fn enqueue_source(&self, source: ResolvedSource, options: TaskOptions) -> Result<Vec<TaskId>> {
        let items = match source {
            ResolvedSource::SingleItem(item) => item.expand_parts(),
            ResolvedSource::Collection { title, items } => {
                tracing::info!(collection = %title, members = items.len(), "ingesting collection");
                self.hydrate_members(items).await
            }
        };

        let single = items.len() == 1;
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let mut task_options = options.clone();
            task_options.skip_if_exists = true;
            if !single {
                task_options.custom_filename = None;
            }
            ids.push(self.enqueue(item, task_options).await?);
        }
        Ok(ids)
    }

    async fn hydrate_members(&self, members: Vec<ItemDescriptor>) -> Vec<ItemDescriptor> {
        let mut items = Vec::with_capacity(members.len());
        for member in members {
            match self.resolver.hydrate(&member).await {
                Ok(item) => items.extend(item.expand_parts()),
                Err(e) => {
                    tracing::warn!(bvid = %member.bvid, error = %e, "skipping collection member");
                }
            }
        }
        items
    }
}
