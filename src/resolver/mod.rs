//! Reference resolution against the origin API
//!
//! [`MediaSourceResolver`] turns what the user pasted into descriptors:
//! - item references resolve to [`ResolvedSource::SingleItem`] (parts included,
//!   never expanded here),
//! - the five collection shapes and owner spaces resolve to
//!   [`ResolvedSource::Collection`],
//! - descriptors resolve to time-limited [`StreamSet`]s right before transfer.

mod duration;
mod listing;
mod reference;
mod schema;

pub use duration::{RawDuration, normalize as normalize_duration};
pub use reference::{CollectionKind, ItemKey, Reference};
pub use schema::CurrentUser;

use crate::client::RateLimitedClient;
use crate::error::{Error, Result};
use crate::types::{ItemDescriptor, Quality, ResolvedSource, StreamSet};
use schema::{PlayUrlData, ViewData};

/// Envelope codes the origin uses for missing, hidden or unreviewed items
const ITEM_MISSING_CODES: [i64; 3] = [-404, 62002, 62004];

/// Resolves references and descriptors through a shared [`RateLimitedClient`]
#[derive(Clone, Debug)]
pub struct MediaSourceResolver {
    client: RateLimitedClient,
}

impl MediaSourceResolver {
    /// Create a resolver using `client` for every request
    pub fn new(client: RateLimitedClient) -> Self {
        Self { client }
    }

    /// Underlying client
    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }

    /// Resolve a reference string
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for unrecognized references and missing items
    /// - [`Error::Malformed`] when the origin's payload has an unexpected shape
    /// - client errors ([`Error::RateLimited`], [`Error::Network`], ...) once retries are exhausted
    pub async fn resolve(&self, reference: &str) -> Result<ResolvedSource> {
        let parsed = Reference::parse(reference)?;
        tracing::debug!(reference, parsed = %parsed, "resolving reference");
        self.resolve_reference(&parsed).await
    }

    /// Resolve an already classified reference
    pub async fn resolve_reference(&self, reference: &Reference) -> Result<ResolvedSource> {
        match reference {
            Reference::Item(key) => Ok(ResolvedSource::SingleItem(self.item_detail(key).await?)),
            Reference::Collection { kind, id } => {
                let (title, items) = self.collection(*kind, *id).await?;
                Ok(ResolvedSource::Collection { title, items })
            }
            Reference::Space { mid } => {
                let items = self.space_items(*mid).await?;
                let title = items
                    .iter()
                    .find_map(|item| item.author.clone())
                    .unwrap_or_else(|| format!("space {mid}"));
                Ok(ResolvedSource::Collection { title, items })
            }
        }
    }

    /// Resolve a batch of references in order
    ///
    /// A failure is reported for its own reference only and never stops the batch.
    pub async fn resolve_all<S: AsRef<str>>(&self, references: &[S]) -> Vec<(String, Result<ResolvedSource>)> {
        let mut results = Vec::with_capacity(references.len());
        for reference in references {
            let reference = reference.as_ref();
            let result = self.resolve(reference).await;
            if let Err(e) = &result {
                tracing::warn!(reference, error = %e, "failed to resolve reference");
            }
            results.push((reference.to_string(), result));
        }
        results
    }

    /// Fetch the full descriptor of one item
    pub async fn item_detail(&self, key: &ItemKey) -> Result<ItemDescriptor> {
        let query = match key {
            ItemKey::Bvid(bvid) => [("bvid", bvid.clone())],
            ItemKey::Aid(aid) => [("aid", aid.to_string())],
        };

        let view: ViewData = self
            .client
            .get_data("/x/web-interface/view", &query)
            .await
            .map_err(|e| match e {
                Error::Api { code, message } if ITEM_MISSING_CODES.contains(&code) => {
                    Error::NotFound(format!("{key}: {message}"))
                }
                other => other,
            })?;

        Ok(view.into())
    }

    /// Fill in the content id of a listing entry through item detail
    ///
    /// Descriptors that already carry one are returned unchanged.
    pub async fn hydrate(&self, item: &ItemDescriptor) -> Result<ItemDescriptor> {
        if item.cid.is_some() {
            return Ok(item.clone());
        }
        self.item_detail(&ItemKey::Bvid(item.bvid.clone())).await
    }

    /// Resolve the video and audio locators of one item at `quality`
    ///
    /// Picks the video stream whose quality id equals the requested code, else
    /// the first listed one, and the first audio stream.
    pub async fn resolve_streams(&self, bvid: &str, cid: u64, quality: Quality) -> Result<StreamSet> {
        let data: PlayUrlData = self
            .client
            .get_data(
                "/x/player/playurl",
                &[
                    ("bvid", bvid.to_string()),
                    ("cid", cid.to_string()),
                    ("qn", quality.code().to_string()),
                    ("fnval", "16".to_string()),
                    ("fourk", "1".to_string()),
                ],
            )
            .await?;

        let dash = data
            .dash
            .ok_or_else(|| Error::Malformed(format!("{bvid}: no DASH streams in playurl response")))?;

        let video = dash
            .video
            .iter()
            .find(|v| v.id == quality.code())
            .or_else(|| dash.video.first())
            .ok_or_else(|| Error::Malformed(format!("{bvid}: no video stream")))?;
        let audio = dash
            .audio
            .as_ref()
            .and_then(|a| a.first())
            .ok_or_else(|| Error::Malformed(format!("{bvid}: no audio stream")))?;

        let video_url = video
            .url()
            .ok_or_else(|| Error::Malformed(format!("{bvid}: video stream has no URL")))?;
        let audio_url = audio
            .url()
            .ok_or_else(|| Error::Malformed(format!("{bvid}: audio stream has no URL")))?;

        if video.id != quality.code() {
            tracing::debug!(bvid, requested = quality.code(), served = video.id, "requested quality unavailable");
        }

        Ok(StreamSet {
            video_url: video_url.to_string(),
            audio_url: audio_url.to_string(),
            quality_code: video.id,
        })
    }

    /// Account behind the loaded session
    ///
    /// # Errors
    ///
    /// [`Error::NotLoggedIn`] unless the session was verified with
    /// [`RateLimitedClient::verify_session`].
    pub async fn current_user(&self) -> Result<CurrentUser> {
        if !self.client.is_logged_in() {
            return Err(Error::NotLoggedIn);
        }
        self.client.get_data("/x/space/myinfo", &[]).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
