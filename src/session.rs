//! Cookie-backed session store
//!
//! The login handshake happens elsewhere; this module only loads, saves and
//! clears the resulting cookie blob and turns it into a `Cookie` header.

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Cookies for the origin plus whether they were verified as a live login
#[derive(Clone, Debug, Default)]
pub struct Session {
    cookies: BTreeMap<String, String>,
    logged_in: bool,
    path: Option<PathBuf>,
}

impl Session {
    /// Session without cookies
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Session built from an in-memory cookie map
    pub fn from_cookies(cookies: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            cookies: cookies.into_iter().collect(),
            logged_in: false,
            path: None,
        }
    }

    /// Load the JSON cookie blob at `path`
    ///
    /// A missing file yields an empty session bound to `path`, so a later
    /// [`save`](Self::save) creates it. A corrupt file is logged and treated
    /// the same way.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cookies = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, String>>(&bytes) {
                Ok(map) => {
                    tracing::info!(path = %path.display(), count = map.len(), "cookies loaded");
                    map
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "cookie file is corrupt, ignoring");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read cookie file");
                BTreeMap::new()
            }
        };

        Self {
            cookies,
            logged_in: false,
            path: Some(path),
        }
    }

    /// Persist the cookies to the bound file (no-op for unbound sessions)
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&self.cookies)?;
        tokio::fs::write(path, json).await?;
        tracing::info!(path = %path.display(), "cookies saved");
        Ok(())
    }

    /// Forget all cookies and remove the bound file (logout)
    pub async fn clear(&mut self) -> Result<()> {
        self.cookies.clear();
        self.logged_in = false;
        if let Some(path) = &self.path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!("session cleared");
        Ok(())
    }

    /// Insert or replace one cookie
    pub fn set_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Whether any cookies are loaded
    pub fn has_cookies(&self) -> bool {
        !self.cookies.is_empty()
    }

    /// `Cookie` header value, or None without cookies
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Whether the cookies were verified against the origin
    pub fn logged_in(&self) -> bool {
        self.logged_in
    }

    pub(crate) fn set_logged_in(&mut self, logged_in: bool) {
        self.logged_in = logged_in;
    }

    /// Bound cookie file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cookie_header_joins_pairs() {
        let session = Session::from_cookies([
            ("SESSDATA".to_string(), "abc".to_string()),
            ("bili_jct".to_string(), "xyz".to_string()),
        ]);
        assert_eq!(session.cookie_header().as_deref(), Some("SESSDATA=abc; bili_jct=xyz"));
        assert!(Session::anonymous().cookie_header().is_none());
    }

    #[tokio::test]
    async fn save_load_and_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");

        let mut session = Session::load(&path).await;
        assert!(!session.has_cookies());
        session.set_cookie("SESSDATA", "token");
        session.save().await.unwrap();

        let reloaded = Session::load(&path).await;
        assert_eq!(reloaded.cookie_header().as_deref(), Some("SESSDATA=token"));
        assert!(!reloaded.logged_in(), "loading never implies a verified login");

        let mut reloaded = reloaded;
        reloaded.clear().await.unwrap();
        assert!(!reloaded.has_cookies());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_file_yields_empty_session() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let session = Session::load(&path).await;
        assert!(!session.has_cookies());
        assert_eq!(session.path(), Some(path.as_path()));
    }
}
