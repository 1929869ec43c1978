//! ---
//! psd_section: "02-storage"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Storage backends and the priority-ordered union registry."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use psd_common::BlobConfig;
use regex::Regex;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crate::filesystem::{filter_glob, normalized, FileSystem};
use crate::path::join;
use crate::{Result, StorageError};

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<Name>([^<]*)</Name>").expect("valid blob name regex"));
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<NextMarker>([^<]+)</NextMarker>").expect("valid blob marker regex")
});

/// Blob container exposed as a backend over the storage REST interface.
///
/// Reads are anonymous; writes and deletes require a SAS token.
#[derive(Debug, Clone)]
pub struct BlobFs {
    client: Client,
    container_url: String,
    prefix: String,
    sas_token: Option<String>,
}

impl BlobFs {
    /// Open `container` within the configured account.
    pub fn open(config: &BlobConfig, container: &str) -> Result<Self> {
        let container_url = config.container_url(container);
        Url::parse(&container_url).map_err(|_| StorageError::InvalidPath {
            path: container_url.clone(),
            reason: "container url is not a valid URL",
        })?;
        Ok(Self {
            client: Client::builder().build()?,
            container_url,
            prefix: String::new(),
            sas_token: config
                .sas_token
                .as_ref()
                .map(|token| token.trim_start_matches('?').to_owned()),
        })
    }

    /// View of a sub-directory of the container.
    pub fn open_dir(&self, path: &str) -> Result<Self> {
        let mut view = self.clone();
        view.prefix = join(&self.prefix, &normalized(path)?);
        Ok(view)
    }

    fn key(&self, path: &str) -> Result<String> {
        Ok(join(&self.prefix, &normalized(path)?))
    }

    fn url(&self, key: &str) -> Result<Url> {
        let mut url = Url::parse(&self.container_url).map_err(|_| StorageError::InvalidPath {
            path: self.container_url.clone(),
            reason: "container url is not a valid URL",
        })?;
        if !key.is_empty() {
            url.path_segments_mut()
                .map_err(|_| StorageError::InvalidPath {
                    path: self.container_url.clone(),
                    reason: "container url cannot hold a path",
                })?
                .pop_if_empty()
                .extend(key.split('/'));
        }
        self.authorize(&mut url);
        Ok(url)
    }

    fn authorize(&self, url: &mut Url) {
        if let Some(token) = &self.sas_token {
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{token}"),
                _ => token.clone(),
            };
            url.set_query(Some(&query));
        }
    }

    fn require_token(&self) -> Result<()> {
        if self.sas_token.is_none() {
            return Err(StorageError::ReadOnly {
                backend: self.describe(),
            });
        }
        Ok(())
    }

    fn check(response: Response, key: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                path: key.to_owned(),
            });
        }
        let mut url = response.url().clone();
        url.set_query(None);
        Err(StorageError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }

    /// List blob names under `prefix`; with `delimiter` only direct children.
    fn list(&self, prefix: &str, delimited: bool) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut url = Url::parse(&self.container_url).map_err(|_| StorageError::InvalidPath {
                path: self.container_url.clone(),
                reason: "container url is not a valid URL",
            })?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs
                    .append_pair("restype", "container")
                    .append_pair("comp", "list")
                    .append_pair("prefix", prefix);
                if delimited {
                    pairs.append_pair("delimiter", "/");
                }
                if let Some(marker) = &marker {
                    pairs.append_pair("marker", marker);
                }
            }
            self.authorize(&mut url);
            debug!(container = %self.container_url, prefix, "listing blobs");
            let body = Self::check(self.client.get(url).send()?, prefix)?.text()?;
            names.extend(
                NAME_RE
                    .captures_iter(&body)
                    .map(|cap| unescape_xml(&cap[1])),
            );
            marker = MARKER_RE.captures(&body).map(|cap| cap[1].to_owned());
            if marker.is_none() {
                break;
            }
        }
        Ok(names)
    }

    fn dir_prefix(&self, path: &str) -> Result<String> {
        let key = self.key(path)?;
        Ok(if key.is_empty() { key } else { format!("{key}/") })
    }
}

fn unescape_xml(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

impl FileSystem for BlobFs {
    fn describe(&self) -> String {
        if self.prefix.is_empty() {
            self.container_url.clone()
        } else {
            format!("{}/{}", self.container_url, self.prefix)
        }
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let key = self.key(path)?;
        if key.is_empty() {
            return Ok(true);
        }
        let response = self.client.head(self.url(&key)?).send()?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => self.is_dir(path),
            _ => Self::check(response, &key).map(|_| true),
        }
    }

    fn is_dir(&self, path: &str) -> Result<bool> {
        let prefix = self.dir_prefix(path)?;
        if prefix.is_empty() {
            return Ok(true);
        }
        Ok(!self.list(&prefix, true)?.is_empty())
    }

    fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let key = self.key(path)?;
        let response = Self::check(self.client.get(self.url(&key)?).send()?, path)?;
        Ok(response.bytes()?.to_vec())
    }

    fn write_bytes(&self, path: &str, data: &[u8]) -> Result<()> {
        self.require_token()?;
        let key = self.key(path)?;
        let response = self
            .client
            .put(self.url(&key)?)
            .header("x-ms-blob-type", "BlockBlob")
            .body(data.to_vec())
            .send()?;
        Self::check(response, path)?;
        Ok(())
    }

    fn make_dirs(&self, _path: &str) -> Result<()> {
        // Containers are flat; directories exist implicitly.
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        self.require_token()?;
        let key = self.key(path)?;
        Self::check(self.client.delete(self.url(&key)?).send()?, path)?;
        Ok(())
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let prefix = self.dir_prefix(path)?;
        let entries = self.list(&prefix, true)?;
        if entries.is_empty() {
            return Err(StorageError::NotFound {
                path: path.to_owned(),
            });
        }
        let names: BTreeSet<String> = entries
            .iter()
            .filter_map(|name| name.strip_prefix(prefix.as_str()))
            .map(|name| name.trim_end_matches('/').to_owned())
            .filter(|name| !name.is_empty())
            .collect();
        Ok(names.into_iter().collect())
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let prefix = self.dir_prefix("")?;
        let files = self
            .list(&prefix, false)?
            .into_iter()
            .filter_map(|name| name.strip_prefix(prefix.as_str()).map(str::to_owned));
        filter_glob(pattern, files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiles() -> BlobFs {
        BlobFs::open(&BlobConfig::default(), "profiles").unwrap()
    }

    #[test]
    fn urls_encode_each_segment() {
        let fs = profiles().open_dir("raw/usa_tamu").unwrap();
        let url = fs.url(&fs.key("demand v1.csv").unwrap()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://besciences.blob.core.windows.net/profiles/raw/usa_tamu/demand%20v1.csv"
        );
    }

    #[test]
    fn sas_token_is_appended_to_query() {
        let config = BlobConfig {
            sas_token: Some("?sv=2024&sig=abc".into()),
            ..BlobConfig::default()
        };
        let fs = BlobFs::open(&config, "scenariodata").unwrap();
        let url = fs.url("data/output/1_PG.pkl").unwrap();
        assert_eq!(url.query(), Some("sv=2024&sig=abc"));
    }

    #[test]
    fn anonymous_container_is_read_only() {
        assert!(matches!(
            profiles().write_bytes("raw/x.csv", b"x"),
            Err(StorageError::ReadOnly { .. })
        ));
    }

    #[test]
    fn listing_names_are_unescaped() {
        let body = "<Blobs><Blob><Name>raw/a&amp;b.csv</Name></Blob><BlobPrefix><Name>raw/usa_tamu/</Name></BlobPrefix></Blobs>";
        let names: Vec<String> = NAME_RE
            .captures_iter(body)
            .map(|cap| unescape_xml(&cap[1]))
            .collect();
        assert_eq!(names, vec!["raw/a&b.csv", "raw/usa_tamu/"]);
    }
}
