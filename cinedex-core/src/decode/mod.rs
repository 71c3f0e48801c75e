//! Upstream payload decoding.
//!
//! Each configured site declares its result model (`json` or `xml`); the
//! decoder issues the request through the [`Fetch`] port and normalizes
//! whichever envelope comes back into [`FilmDetail`] records. Records
//! without a positive upstream id and a name are dropped here, before
//! anything touches storage.

mod json;
mod xml;

use std::sync::Arc;

use chrono::NaiveDateTime;
use cinedex_model::{FilmDetail, FilmSource, PlayLink, PlaySource, ResultModel};

use crate::error::{EngineError, Result};
use crate::fetch::Fetch;

pub struct Decoder {
    fetcher: Arc<dyn Fetch>,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder").finish_non_exhaustive()
    }
}

impl Decoder {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self { fetcher }
    }

    /// Probe the pagination envelope for the window `h`. Negative counts
    /// and unparseable envelopes are errors; zero is a valid "nothing new".
    pub async fn page_count(&self, source: &FilmSource, h: i64) -> Result<i64> {
        let mut params = vec![("ac", "list".to_string()), ("pg", "1".to_string())];
        if h > 0 {
            params.push(("h", h.to_string()));
        }
        let body = self.fetch(source, &params).await?;
        let count = match source.result_model {
            ResultModel::Json => json::parse_page_count(&body)?,
            ResultModel::Xml => xml::parse_page_count(&body)?,
        };
        if count < 0 {
            return Err(EngineError::Decode(format!(
                "upstream reported negative page count {count}"
            )));
        }
        Ok(count)
    }

    /// Decode one listing page into normalized film records.
    pub async fn film_details(
        &self,
        source: &FilmSource,
        h: i64,
        page: i64,
    ) -> Result<Vec<FilmDetail>> {
        let mut params = vec![("ac", "videolist".to_string()), ("pg", page.to_string())];
        if h > 0 {
            params.push(("h", h.to_string()));
        }
        let body = self.fetch(source, &params).await?;
        self.parse_details(source, &body)
    }

    /// Decode specific upstream ids (comma-separated), bypassing paging.
    pub async fn film_details_by_ids(
        &self,
        source: &FilmSource,
        ids: &str,
    ) -> Result<Vec<FilmDetail>> {
        let params = vec![("ac", "videolist".to_string()), ("ids", ids.to_string())];
        let body = self.fetch(source, &params).await?;
        self.parse_details(source, &body)
    }

    /// Flat `(id, pid, name)` class list from the probe envelope, the raw
    /// material for the category tree.
    pub async fn category_entries(&self, source: &FilmSource) -> Result<Vec<(i64, i64, String)>> {
        let params = vec![("ac", "list".to_string()), ("pg", "1".to_string())];
        let body = self.fetch(source, &params).await?;
        match source.result_model {
            ResultModel::Json => json::parse_class_entries(&body),
            ResultModel::Xml => xml::parse_class_entries(&body),
        }
    }

    fn parse_details(&self, source: &FilmSource, body: &[u8]) -> Result<Vec<FilmDetail>> {
        let details = match source.result_model {
            ResultModel::Json => json::parse_details(body)?,
            ResultModel::Xml => xml::parse_details(body)?,
        };
        Ok(details.into_iter().filter(FilmDetail::is_valid).collect())
    }

    async fn fetch(&self, source: &FilmSource, params: &[(&str, String)]) -> Result<Vec<u8>> {
        let body = self.fetcher.get(&source.uri, params, None).await?;
        if body.is_empty() {
            return Err(EngineError::Decode(format!(
                "empty response body from {}",
                source.uri
            )));
        }
        Ok(body)
    }
}

/// Zip play-source names against their link blocks. Upstreams join source
/// names with `$$$`, links within a source with `#`, and episode/url with
/// `$`.
pub(crate) fn split_play_sources(play_from: &str, play_url: &str) -> Vec<PlaySource> {
    if play_url.is_empty() {
        return Vec::new();
    }
    let names: Vec<&str> = play_from.split("$$$").collect();
    play_url
        .split("$$$")
        .enumerate()
        .filter_map(|(i, block)| {
            let links = parse_links(block);
            if links.is_empty() {
                return None;
            }
            let name = names
                .get(i)
                .filter(|n| !n.is_empty())
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("line{}", i + 1));
            Some(PlaySource {
                name,
                link_list: links,
            })
        })
        .collect()
}

/// One `#`-joined link block into episode/url pairs. A token without the
/// `$` separator is a bare URL; the episode label falls back to its
/// position.
pub(crate) fn parse_links(raw: &str) -> Vec<PlayLink> {
    raw.split('#')
        .enumerate()
        .filter_map(|(i, token)| {
            let token = token.trim();
            if token.is_empty() {
                return None;
            }
            let link = match token.split_once('$') {
                Some((episode, url)) if !url.is_empty() => PlayLink {
                    episode: episode.to_string(),
                    link: url.to_string(),
                },
                _ => PlayLink {
                    episode: format!("{}", i + 1),
                    link: token.to_string(),
                },
            };
            Some(link)
        })
        .collect()
}

/// Sort initial: the upstream letter when given, else the first character
/// of the name, uppercased.
pub(crate) fn derive_initial(letter: &str, name: &str) -> String {
    let letter = letter.trim();
    if !letter.is_empty() {
        return letter.to_uppercase();
    }
    name.chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_default()
}

/// Update stamp: prefer the upstream unix field, fall back to parsing the
/// formatted time, else zero.
pub(crate) fn parse_stamp(time_add: i64, time_str: &str) -> i64 {
    if time_add > 0 {
        return time_add;
    }
    NaiveDateTime::parse_from_str(time_str.trim(), "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multi_source_playlists() {
        let sources = split_play_sources(
            "hdm3u8$$$hdyun",
            "EP1$https://a.test/1.m3u8#EP2$https://a.test/2.m3u8$$$EP1$https://b.test/1.mp4",
        );
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "hdm3u8");
        assert_eq!(sources[0].link_list.len(), 2);
        assert_eq!(sources[0].link_list[1].episode, "EP2");
        assert_eq!(sources[1].link_list[0].link, "https://b.test/1.mp4");
    }

    #[test]
    fn bare_urls_get_positional_episodes() {
        let links = parse_links("https://a.test/1.m3u8#https://a.test/2.m3u8");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].episode, "1");
        assert_eq!(links[1].episode, "2");
    }

    #[test]
    fn empty_playlist_yields_no_sources() {
        assert!(split_play_sources("hdm3u8", "").is_empty());
    }

    #[test]
    fn initial_prefers_upstream_letter() {
        assert_eq!(derive_initial("b", "Alien"), "B");
        assert_eq!(derive_initial("", "alien"), "A");
        assert_eq!(derive_initial(" ", ""), "");
    }

    #[test]
    fn stamp_falls_back_to_formatted_time() {
        assert_eq!(parse_stamp(1700000000, "garbage"), 1700000000);
        assert_eq!(parse_stamp(0, "2024-01-02 03:04:05"), 1704164645);
        assert_eq!(parse_stamp(0, "not a time"), 0);
    }
}
