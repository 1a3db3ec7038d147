//! Classification of user-supplied references
//!
//! A reference is whatever the user pasted: a full page URL, a short BV id,
//! a space URL. It is matched once, here, into a [`Reference`]; every later
//! step dispatches on the variant instead of re-inspecting the string.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Stable key of a single item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemKey {
    /// `BV...` identifier
    Bvid(String),
    /// Legacy numeric archive id (`av123`)
    Aid(u64),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Bvid(bvid) => f.write_str(bvid),
            ItemKey::Aid(aid) => write!(f, "av{aid}"),
        }
    }
}

/// Collection shapes; each has its own listing endpoint and schema
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionKind {
    /// `bilibili.com/opus/<id>`: a post embedding archives
    Opus,
    /// `bilibili.com/collection/<id>`: an uploader season
    Season,
    /// `bilibili.com/medialist/detail/ml<id>`
    MediaList,
    /// `bilibili.com/series/<id>`
    Series,
    /// `bilibili.com/list/<id>`
    List,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectionKind::Opus => "opus",
            CollectionKind::Season => "collection",
            CollectionKind::MediaList => "medialist",
            CollectionKind::Series => "series",
            CollectionKind::List => "list",
        };
        f.write_str(name)
    }
}

/// A parsed reference
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reference {
    /// One item (possibly multi-part)
    Item(ItemKey),
    /// A fixed collection
    Collection {
        /// Which listing endpoint to use
        kind: CollectionKind,
        /// Collection identifier from the URL
        id: u64,
    },
    /// Every item uploaded by one owner (paginated)
    Space {
        /// Owner id
        mid: u64,
    },
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Item(key) => write!(f, "item {key}"),
            Reference::Collection { kind, id } => write!(f, "{kind} {id}"),
            Reference::Space { mid } => write!(f, "space {mid}"),
        }
    }
}

struct Patterns {
    video_bvid: Regex,
    video_aid: Regex,
    collections: Vec<(Regex, CollectionKind)>,
    space: Regex,
    bare_bvid: Regex,
    bare_aid: Regex,
}

fn compile() -> std::result::Result<Patterns, regex::Error> {
    Ok(Patterns {
        video_bvid: Regex::new(r"/video/(BV[a-zA-Z0-9]+)")?,
        video_aid: Regex::new(r"/video/av(\d+)")?,
        collections: vec![
            (Regex::new(r"bilibili\.com/opus/(\d+)")?, CollectionKind::Opus),
            (Regex::new(r"bilibili\.com/collection/(\d+)")?, CollectionKind::Season),
            (Regex::new(r"bilibili\.com/medialist/detail/ml(\d+)")?, CollectionKind::MediaList),
            (Regex::new(r"bilibili\.com/series/(\d+)")?, CollectionKind::Series),
            (Regex::new(r"bilibili\.com/list/(\d+)")?, CollectionKind::List),
        ],
        space: Regex::new(r"space\.bilibili\.com/(\d+)")?,
        bare_bvid: Regex::new(r"BV[a-zA-Z0-9]+")?,
        bare_aid: Regex::new(r"^av(\d+)$")?,
    })
}

static PATTERNS: Lazy<std::result::Result<Patterns, regex::Error>> = Lazy::new(compile);

fn capture_u64(re: &Regex, input: &str) -> Option<u64> {
    re.captures(input)?.get(1)?.as_str().parse().ok()
}

impl Reference {
    /// Classify a reference string
    ///
    /// Item page URLs win over everything else, then the five collection
    /// shapes, then owner spaces, then a bare `BV` id anywhere in the input.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the input matches no known shape.
    pub fn parse(input: &str) -> Result<Self> {
        let patterns = PATTERNS
            .as_ref()
            .map_err(|e| Error::Other(format!("reference patterns failed to compile: {e}")))?;
        let input = input.trim();

        if let Some(caps) = patterns.video_bvid.captures(input) {
            return Ok(Reference::Item(ItemKey::Bvid(caps[1].to_string())));
        }
        if let Some(aid) = capture_u64(&patterns.video_aid, input) {
            return Ok(Reference::Item(ItemKey::Aid(aid)));
        }
        for (re, kind) in &patterns.collections {
            if let Some(id) = capture_u64(re, input) {
                return Ok(Reference::Collection { kind: *kind, id });
            }
        }
        if let Some(mid) = capture_u64(&patterns.space, input) {
            return Ok(Reference::Space { mid });
        }
        if let Some(m) = patterns.bare_bvid.find(input) {
            return Ok(Reference::Item(ItemKey::Bvid(m.as_str().to_string())));
        }
        if let Some(aid) = capture_u64(&patterns.bare_aid, input) {
            return Ok(Reference::Item(ItemKey::Aid(aid)));
        }

        Err(Error::NotFound(format!("unrecognized reference: {input}")))
    }
}
