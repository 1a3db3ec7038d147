//! Response payloads of the origin endpoints
//!
//! The origin has no shared collection schema, so every endpoint family gets
//! its own `data` shape. Fields the engine never reads are left out; fields
//! the origin sometimes omits default.

use super::duration::{RawDuration, normalize, normalize_opt};
use crate::types::{ItemDescriptor, Part};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Item detail: /x/web-interface/view
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ViewData {
    pub bvid: String,
    #[serde(default)]
    pub aid: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub duration: Option<RawDuration>,
    #[serde(default)]
    pub pubdate: Option<i64>,
    #[serde(default)]
    pub pic: Option<String>,
    #[serde(default)]
    pub cid: Option<u64>,
    #[serde(default)]
    pub pages: Vec<ViewPage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Owner {
    #[serde(default)]
    pub mid: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewPage {
    pub cid: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub part: String,
    #[serde(default)]
    pub duration: Option<RawDuration>,
}

impl From<ViewData> for ItemDescriptor {
    fn from(view: ViewData) -> Self {
        let parts = view
            .pages
            .into_iter()
            .enumerate()
            .map(|(i, page)| Part {
                cid: page.cid,
                page: if page.page == 0 { i as u32 + 1 } else { page.page },
                title: page.part,
                duration: normalize_opt(page.duration.as_ref()),
            })
            .collect::<Vec<_>>();
        // Items without an explicit cid play their first part
        let cid = view.cid.or_else(|| parts.first().map(|p| p.cid));
        let (owner_mid, author) = match view.owner {
            Some(owner) => (owner.mid, owner.name),
            None => (None, None),
        };

        ItemDescriptor {
            bvid: view.bvid,
            aid: view.aid,
            cid,
            title: view.title,
            parent_title: None,
            author,
            owner_mid,
            description: view.desc,
            duration: normalize_opt(view.duration.as_ref()),
            pubdate: view.pubdate,
            thumbnail: view.pic,
            parts,
        }
    }
}

// ---------------------------------------------------------------------------
// Stream locators: /x/player/playurl (DASH)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct PlayUrlData {
    #[serde(default)]
    pub dash: Option<Dash>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Dash {
    #[serde(default)]
    pub video: Vec<DashStream>,
    #[serde(default)]
    pub audio: Option<Vec<DashStream>>,
}

// The origin usually sends both spellings of the URL field
#[derive(Debug, Deserialize)]
pub(crate) struct DashStream {
    pub id: u32,
    #[serde(rename = "baseUrl", default)]
    base_url_camel: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

impl DashStream {
    pub fn url(&self) -> Option<&str> {
        self.base_url_camel.as_deref().or(self.base_url.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Shared archive entry (season, series, list, medialist)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct Archive {
    pub bvid: String,
    #[serde(default)]
    pub aid: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration: Option<RawDuration>,
    #[serde(default)]
    pub pic: Option<String>,
    #[serde(default, alias = "cover")]
    pub cover_url: Option<String>,
}

impl From<Archive> for ItemDescriptor {
    fn from(archive: Archive) -> Self {
        let mut item = ItemDescriptor::listing_entry(
            archive.bvid,
            archive.title,
            normalize_opt(archive.duration.as_ref()),
        );
        item.aid = archive.aid;
        item.thumbnail = archive.pic.or(archive.cover_url);
        item
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Meta {
    #[serde(default)]
    pub name: Option<String>,
}

/// `/x/polymer/space/seasons_archives_list` and `/x/series/series`
#[derive(Debug, Deserialize)]
pub(crate) struct ArchiveListData {
    #[serde(default)]
    pub archives: Vec<Archive>,
    #[serde(default)]
    pub meta: Meta,
}

/// `/x/polymer/web-space/medialist`
#[derive(Debug, Deserialize)]
pub(crate) struct MediaListData {
    #[serde(default)]
    pub list: MediaListBody,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MediaListBody {
    #[serde(default)]
    pub ves: Vec<Archive>,
    #[serde(default)]
    pub info: MediaListInfo,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MediaListInfo {
    #[serde(default)]
    pub title: Option<String>,
}

// ---------------------------------------------------------------------------
// Opus (post) detail: /x/space/opus/detail
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct OpusData {
    #[serde(default)]
    pub summary: Option<OpusSummary>,
    #[serde(default)]
    pub list: Vec<OpusEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpusSummary {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpusEntry {
    #[serde(default)]
    pub modules: Vec<OpusModule>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpusModule {
    #[serde(default)]
    pub module_type: String,
    #[serde(default)]
    pub major: Option<OpusMajor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpusMajor {
    #[serde(default)]
    pub archive: Option<OpusArchive>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpusArchive {
    pub bvid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration_text: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
}

impl OpusData {
    /// Archives embedded in `module_dynamic` modules, in post order
    pub fn archives(self) -> Vec<ItemDescriptor> {
        self.list
            .into_iter()
            .flat_map(|entry| entry.modules)
            .filter(|module| module.module_type == "module_dynamic")
            .filter_map(|module| module.major?.archive)
            .map(|archive| {
                let duration = match archive.duration_text {
                    Some(text) => normalize(&RawDuration::Text(text)),
                    None => normalize_opt(None),
                };
                let mut item = ItemDescriptor::listing_entry(archive.bvid, archive.title, duration);
                item.thumbnail = archive.cover;
                item
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Owner listing: /x/space/arc/search
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct SpaceSearchData {
    #[serde(default)]
    pub list: SpaceList,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SpaceList {
    #[serde(default)]
    pub vlist: Vec<SpaceVideo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpaceVideo {
    pub bvid: String,
    #[serde(default)]
    pub aid: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub mid: Option<u64>,
    #[serde(default)]
    pub length: Option<RawDuration>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub pic: Option<String>,
}

impl From<SpaceVideo> for ItemDescriptor {
    fn from(video: SpaceVideo) -> Self {
        let mut item =
            ItemDescriptor::listing_entry(video.bvid, video.title, normalize_opt(video.length.as_ref()));
        item.aid = video.aid;
        item.description = video.description;
        item.author = video.author;
        item.owner_mid = video.mid;
        item.pubdate = video.created;
        item.thumbnail = video.pic;
        item
    }
}

// ---------------------------------------------------------------------------
// Current user: /x/space/myinfo
// ---------------------------------------------------------------------------

/// Account behind the loaded session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Account id
    pub mid: u64,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Avatar URL
    #[serde(default)]
    pub face: Option<String>,
    /// Account level
    #[serde(default)]
    pub level: Option<u32>,
}
