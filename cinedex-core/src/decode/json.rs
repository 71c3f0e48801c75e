//! MacCMS JSON envelope decoding.
//!
//! Real-world feeds are sloppy about numeric types: `pagecount` may be a
//! number on one site and `"3"` on the next. All numeric fields go
//! through tolerant deserializers that accept either.

use cinedex_model::FilmDetail;
use serde::{Deserialize, Deserializer};

use super::{derive_initial, parse_stamp, split_play_sources};
use crate::error::{EngineError, Result};

fn flex_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Str(String),
    }
    Ok(match Option::<Raw>::deserialize(d)? {
        Some(Raw::Int(v)) => v,
        Some(Raw::Float(v)) => v as i64,
        Some(Raw::Str(s)) => s.trim().parse::<i64>().unwrap_or_default(),
        None => 0,
    })
}

fn flex_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Float(f64),
        Str(String),
    }
    Ok(match Option::<Raw>::deserialize(d)? {
        Some(Raw::Float(v)) => v,
        Some(Raw::Str(s)) => s.trim().parse::<f64>().unwrap_or_default(),
        None => 0.0,
    })
}

#[derive(Debug, Default, Deserialize)]
struct VodEnvelope {
    #[serde(default, deserialize_with = "flex_i64")]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default, deserialize_with = "flex_i64")]
    pagecount: i64,
    #[serde(default)]
    list: Vec<VodItem>,
    #[serde(default)]
    class: Vec<VodClass>,
}

#[derive(Debug, Default, Deserialize)]
struct VodClass {
    #[serde(default, deserialize_with = "flex_i64")]
    type_id: i64,
    #[serde(default, deserialize_with = "flex_i64")]
    type_pid: i64,
    #[serde(default)]
    type_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct VodItem {
    #[serde(default, deserialize_with = "flex_i64")]
    vod_id: i64,
    #[serde(default, deserialize_with = "flex_i64")]
    type_id: i64,
    #[serde(default, deserialize_with = "flex_i64")]
    type_id_1: i64,
    #[serde(default)]
    type_name: String,
    #[serde(default)]
    vod_name: String,
    #[serde(default)]
    vod_sub: String,
    #[serde(default)]
    vod_letter: String,
    #[serde(default)]
    vod_class: String,
    #[serde(default)]
    vod_pic: String,
    #[serde(default)]
    vod_actor: String,
    #[serde(default)]
    vod_director: String,
    #[serde(default)]
    vod_writer: String,
    #[serde(default)]
    vod_blurb: String,
    #[serde(default)]
    vod_content: String,
    #[serde(default)]
    vod_area: String,
    #[serde(default)]
    vod_lang: String,
    #[serde(default, deserialize_with = "flex_i64")]
    vod_year: i64,
    #[serde(default)]
    vod_serial: String,
    #[serde(default)]
    vod_pubdate: String,
    #[serde(default)]
    vod_remarks: String,
    #[serde(default, deserialize_with = "flex_f64")]
    vod_douban_score: f64,
    #[serde(default, deserialize_with = "flex_i64")]
    vod_hits: i64,
    #[serde(default)]
    vod_time: String,
    #[serde(default, deserialize_with = "flex_i64")]
    vod_time_add: i64,
    #[serde(default)]
    vod_play_from: String,
    #[serde(default)]
    vod_play_url: String,
}

fn parse_envelope(body: &[u8]) -> Result<VodEnvelope> {
    let envelope: VodEnvelope = serde_json::from_slice(body)?;
    if envelope.code != 1 {
        return Err(EngineError::Decode(format!(
            "upstream rejected request: code={} msg={:?}",
            envelope.code, envelope.msg
        )));
    }
    Ok(envelope)
}

pub(super) fn parse_page_count(body: &[u8]) -> Result<i64> {
    Ok(parse_envelope(body)?.pagecount)
}

pub(super) fn parse_class_entries(body: &[u8]) -> Result<Vec<(i64, i64, String)>> {
    Ok(parse_envelope(body)?
        .class
        .into_iter()
        .filter(|c| c.type_id > 0 && !c.type_name.is_empty())
        .map(|c| (c.type_id, c.type_pid, c.type_name))
        .collect())
}

pub(super) fn parse_details(body: &[u8]) -> Result<Vec<FilmDetail>> {
    Ok(parse_envelope(body)?
        .list
        .into_iter()
        .map(normalize)
        .collect())
}

fn normalize(item: VodItem) -> FilmDetail {
    FilmDetail {
        mid: item.vod_id,
        name: item.vod_name.trim().to_string(),
        sub_title: item.vod_sub,
        initial: derive_initial(&item.vod_letter, &item.vod_name),
        cid: item.type_id,
        pid: item.type_id_1,
        c_name: item.type_name,
        class_tag: item.vod_class,
        picture: item.vod_pic,
        actor: item.vod_actor,
        director: item.vod_director,
        writer: item.vod_writer,
        blurb: item.vod_blurb,
        content: item.vod_content,
        area: item.vod_area,
        language: item.vod_lang,
        year: item.vod_year,
        state: item.vod_serial,
        release_date: item.vod_pubdate,
        remarks: item.vod_remarks,
        db_score: item.vod_douban_score,
        hits: item.vod_hits,
        play_sources: split_play_sources(&item.vod_play_from, &item.vod_play_url),
        update_stamp: parse_stamp(item.vod_time_add, &item.vod_time),
    }
}
