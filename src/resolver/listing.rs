//! Collection listings and owner-space pagination

use super::MediaSourceResolver;
use super::reference::CollectionKind;
use super::schema::{ArchiveListData, MediaListData, OpusData, SpaceSearchData};
use crate::error::Result;
use crate::types::ItemDescriptor;

const UNTITLED: &str = "Untitled collection";

impl MediaSourceResolver {
    /// Fetch the title and members of a fixed collection
    ///
    /// Members carry no content id yet; they are hydrated through the
    /// item-detail endpoint when they are turned into tasks.
    pub async fn collection(&self, kind: CollectionKind, id: u64) -> Result<(String, Vec<ItemDescriptor>)> {
        let id_str = id.to_string();
        let page_size = self.client.config().page_size.to_string();

        let (title, items) = match kind {
            CollectionKind::Opus => {
                let data: OpusData = self
                    .client
                    .get_data("/x/space/opus/detail", &[("opus_id", id_str)])
                    .await?;
                let title = data.summary.as_ref().and_then(|s| s.title.clone());
                (title, data.archives())
            }
            CollectionKind::Season => {
                let data: ArchiveListData = self
                    .client
                    .get_data(
                        "/x/polymer/space/seasons_archives_list",
                        &[
                            ("mid", id_str),
                            ("sort_reverse", "false".to_string()),
                            ("page_num", "1".to_string()),
                            ("page_size", page_size),
                        ],
                    )
                    .await?;
                (data.meta.name, data.archives.into_iter().map(Into::into).collect())
            }
            CollectionKind::MediaList => {
                let data: MediaListData = self
                    .client
                    .get_data(
                        "/x/polymer/web-space/medialist",
                        &[("mid", id_str), ("ps", page_size), ("pn", "1".to_string())],
                    )
                    .await?;
                (data.list.info.title, data.list.ves.into_iter().map(Into::into).collect())
            }
            CollectionKind::Series | CollectionKind::List => {
                let data: ArchiveListData = self
                    .client
                    .get_data("/x/series/series", &[("series_id", id_str)])
                    .await?;
                (data.meta.name, data.archives.into_iter().map(Into::into).collect())
            }
        };

        let title = title.filter(|t| !t.is_empty()).unwrap_or_else(|| UNTITLED.to_string());
        tracing::info!(%kind, id, title = %title, count = items.len(), "collection listed");
        Ok((title, items))
    }

    /// Fetch one page (1-based) of an owner's uploads, newest first
    pub async fn space_page(&self, mid: u64, page: u32) -> Result<Vec<ItemDescriptor>> {
        let data: SpaceSearchData = self
            .client
            .get_data(
                "/x/space/arc/search",
                &[
                    ("mid", mid.to_string()),
                    ("ps", self.client.config().page_size.to_string()),
                    ("pn", page.to_string()),
                    ("order", "pubdate".to_string()),
                    ("order_avoided", "true".to_string()),
                ],
            )
            .await?;
        Ok(data.list.vlist.into_iter().map(Into::into).collect())
    }

    /// Walk every page of an owner's uploads
    ///
    /// Stops at the first empty page. A page that fails after earlier pages
    /// succeeded ends the walk with what was collected so far; only a failure
    /// on the very first page is returned as an error.
    pub async fn space_items(&self, mid: u64) -> Result<Vec<ItemDescriptor>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            match self.space_page(mid, page).await {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => {
                    tracing::debug!(mid, page, count = batch.len(), "space page fetched");
                    items.extend(batch);
                    page += 1;
                }
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        mid,
                        page,
                        collected = items.len(),
                        error = %e,
                        "space listing stopped early, keeping partial results"
                    );
                    break;
                }
            }
        }

        tracing::info!(mid, count = items.len(), "space listed");
        Ok(items)
    }
}
