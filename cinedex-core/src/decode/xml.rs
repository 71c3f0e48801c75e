//! MacCMS RSS/XML envelope decoding.
//!
//! The XML feed nests films under `<rss><list …><video>` with CDATA text
//! and carries playlists as `<dl><dd flag="…">` blocks. Pagination lives
//! in attributes on `<list>`. The class list, when present, is a flat
//! `<class><ty id="…">` sequence with no parent ids.

use cinedex_model::{FilmDetail, PlaySource};
use serde::Deserialize;

use super::{derive_initial, parse_links, parse_stamp};
use crate::error::{EngineError, Result};

#[derive(Debug, Default, Deserialize)]
struct RssDoc {
    #[serde(default)]
    list: Option<RssList>,
    #[serde(default)]
    class: Option<RssClass>,
}

#[derive(Debug, Default, Deserialize)]
struct RssList {
    #[serde(rename = "@pagecount", default)]
    pagecount: String,
    #[serde(rename = "video", default)]
    videos: Vec<RssVideo>,
}

#[derive(Debug, Default, Deserialize)]
struct RssVideo {
    #[serde(default)]
    id: String,
    #[serde(default)]
    tid: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    type_name: String,
    #[serde(default)]
    pic: String,
    #[serde(default)]
    lang: String,
    #[serde(default)]
    area: String,
    #[serde(default)]
    year: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    note: String,
    #[serde(default)]
    actor: String,
    #[serde(default)]
    director: String,
    #[serde(default)]
    des: String,
    #[serde(default)]
    last: String,
    #[serde(default)]
    dl: Option<RssDl>,
}

#[derive(Debug, Default, Deserialize)]
struct RssDl {
    #[serde(rename = "dd", default)]
    tracks: Vec<RssDd>,
}

#[derive(Debug, Default, Deserialize)]
struct RssDd {
    #[serde(rename = "@flag", default)]
    flag: String,
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct RssClass {
    #[serde(rename = "ty", default)]
    types: Vec<RssTy>,
}

#[derive(Debug, Default, Deserialize)]
struct RssTy {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "$text", default)]
    text: String,
}

fn parse_doc(body: &[u8]) -> Result<RssDoc> {
    let text = std::str::from_utf8(body)
        .map_err(|e| EngineError::Decode(format!("response is not utf-8: {e}")))?;
    quick_xml::de::from_str(text).map_err(|e| EngineError::Decode(format!("bad rss payload: {e}")))
}

pub(super) fn parse_page_count(body: &[u8]) -> Result<i64> {
    let doc = parse_doc(body)?;
    let list = doc
        .list
        .ok_or_else(|| EngineError::Decode("rss payload has no <list> element".into()))?;
    list.pagecount
        .trim()
        .parse()
        .map_err(|_| EngineError::Decode(format!("bad pagecount attribute {:?}", list.pagecount)))
}

pub(super) fn parse_class_entries(body: &[u8]) -> Result<Vec<(i64, i64, String)>> {
    let doc = parse_doc(body)?;
    Ok(doc
        .class
        .map(|c| c.types)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|ty| {
            let id: i64 = ty.id.trim().parse().ok()?;
            let name = ty.text.trim().to_string();
            // The XML class list is flat; every entry is top-level.
            (id > 0 && !name.is_empty()).then_some((id, 0, name))
        })
        .collect())
}

pub(super) fn parse_details(body: &[u8]) -> Result<Vec<FilmDetail>> {
    let doc = parse_doc(body)?;
    Ok(doc
        .list
        .map(|l| l.videos)
        .unwrap_or_default()
        .into_iter()
        .map(normalize)
        .collect())
}

fn normalize(video: RssVideo) -> FilmDetail {
    let name = video.name.trim().to_string();
    let play_sources: Vec<PlaySource> = video
        .dl
        .map(|dl| dl.tracks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|dd| {
            let links = parse_links(dd.text.trim());
            if links.is_empty() {
                return None;
            }
            let flag = dd.flag.trim();
            Some(PlaySource {
                name: if flag.is_empty() {
                    "default".to_string()
                } else {
                    flag.to_string()
                },
                link_list: links,
            })
        })
        .collect();

    FilmDetail {
        mid: video.id.trim().parse().unwrap_or_default(),
        initial: derive_initial("", &name),
        name,
        cid: video.tid.trim().parse().unwrap_or_default(),
        c_name: video.type_name,
        picture: video.pic,
        actor: video.actor,
        director: video.director,
        blurb: video.des.clone(),
        content: video.des,
        area: video.area,
        language: video.lang,
        year: video.year.trim().parse().unwrap_or_default(),
        state: video.state,
        remarks: video.note,
        play_sources,
        update_stamp: parse_stamp(0, &video.last),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="5.1">
<list page="1" pagecount="4" pagesize="20" recordcount="67">
  <video>
    <last>2024-01-02 03:04:05</last>
    <id>205</id>
    <tid>6</tid>
    <name><![CDATA[Night Patrol]]></name>
    <type>Action</type>
    <pic>https://img.test/205.jpg</pic>
    <lang>en</lang>
    <area>UK</area>
    <year>2022</year>
    <state>3</state>
    <note>EP3</note>
    <actor><![CDATA[X,Y]]></actor>
    <director><![CDATA[Z]]></director>
    <dl>
      <dd flag="hdm3u8"><![CDATA[EP1$https://cdn.test/a.m3u8#EP2$https://cdn.test/b.m3u8]]></dd>
    </dl>
    <des><![CDATA[A patrol drama.]]></des>
  </video>
</list>
<class>
  <ty id="6">Action</ty>
  <ty id="7">Comedy</ty>
</class>
</rss>"#;

    #[test]
    fn page_count_from_list_attribute() {
        assert_eq!(parse_page_count(RSS_FIXTURE.as_bytes()).unwrap(), 4);
    }

    #[test]
    fn class_entries_are_flat() {
        let entries = parse_class_entries(RSS_FIXTURE.as_bytes()).unwrap();
        assert_eq!(entries, vec![(6, 0, "Action".into()), (7, 0, "Comedy".into())]);
    }

    #[test]
    fn videos_normalize_with_playlists() {
        let details = parse_details(RSS_FIXTURE.as_bytes()).unwrap();
        assert_eq!(details.len(), 1);
        let film = &details[0];
        assert_eq!(film.mid, 205);
        assert_eq!(film.cid, 6);
        assert_eq!(film.name, "Night Patrol");
        assert_eq!(film.initial, "N");
        assert_eq!(film.update_stamp, 1704164645);
        assert_eq!(film.play_sources.len(), 1);
        assert_eq!(film.play_sources[0].name, "hdm3u8");
        assert_eq!(film.play_sources[0].link_list.len(), 2);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            parse_page_count(b"not xml at all"),
            Err(EngineError::Decode(_))
        ));
    }
}
