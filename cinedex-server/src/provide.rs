//! MacCMS-compatible read API.
//!
//! Third-party players consume `/provide/vod/` with `ac=list`,
//! `ac=videolist` or `ac=detail`; whatever happens internally they get a
//! 200 with the standard envelope. Playback is flattened the MacCMS way:
//! sources joined by `$$$`, episodes by `#`, `episode$url` pairs with `$`
//! stripped out of URLs so the delimiter survives.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::HOST;
use chrono::DateTime;
use cinedex_core::VodQuery;
use cinedex_model::{FilmDetail, PlaySource, SearchInfo};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::state::AppState;

const PAGE_SIZE: i64 = 20;
/// Site marker returned in plain list rows.
const SITE_TAG: &str = "cinedex";

#[derive(Debug, Default, Deserialize)]
pub struct ProvideParams {
    #[serde(default)]
    pub ac: Option<String>,
    #[serde(default)]
    pub t: Option<i64>,
    #[serde(default)]
    pub pg: Option<i64>,
    #[serde(default)]
    pub wd: Option<String>,
    #[serde(default)]
    pub h: Option<i64>,
    #[serde(default)]
    pub ids: Option<String>,
}

#[derive(Debug, Serialize)]
struct FilmClass {
    type_id: i64,
    type_name: String,
}

#[derive(Debug, Serialize)]
struct VodListItem {
    vod_id: i64,
    vod_name: String,
    type_id: i64,
    type_name: String,
    vod_en: String,
    vod_time: String,
    vod_remarks: String,
    vod_play_from: String,
}

#[derive(Debug, Serialize)]
struct VodDetailItem {
    vod_id: i64,
    type_id: i64,
    type_id_1: i64,
    type_name: String,
    vod_name: String,
    vod_sub: String,
    vod_en: String,
    vod_time: String,
    vod_remarks: String,
    vod_play_from: String,
    vod_play_url: String,
    vod_pic: String,
    vod_class: String,
    vod_actor: String,
    vod_director: String,
    vod_writer: String,
    vod_blurb: String,
    vod_pubdate: String,
    vod_area: String,
    vod_lang: String,
    vod_year: String,
    vod_state: String,
    vod_hits: i64,
    vod_score: String,
    vod_content: String,
}

/// `playFrom`/`playUrl` pair in MacCMS delimiter encoding.
pub(crate) fn encode_playlists(sources: &[PlaySource]) -> (String, String) {
    let play_from: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
    let play_url: Vec<String> = sources
        .iter()
        .map(|s| {
            s.link_list
                .iter()
                .map(|l| format!("{}${}", l.episode, l.link.replace('$', "")))
                .collect::<Vec<_>>()
                .join("#")
        })
        .collect();
    (play_from.join("$$$"), play_url.join("$$$"))
}

fn format_stamp(stamp: i64) -> String {
    DateTime::from_timestamp(stamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn envelope<T: Serialize>(
    msg: &str,
    page: i64,
    pagecount: i64,
    total: i64,
    list: Vec<T>,
    class: Vec<FilmClass>,
) -> Value {
    json!({
        "code": 1,
        "msg": msg,
        "page": page,
        "pagecount": pagecount,
        "limit": PAGE_SIZE.to_string(),
        "total": total,
        "list": list,
        "class": class,
    })
}

async fn class_list(state: &AppState) -> Vec<FilmClass> {
    match state.cache.category_tree().await {
        Ok(Some(tree)) => tree
            .shown()
            .into_iter()
            .map(|node| FilmClass {
                type_id: node.id,
                type_name: node.name.clone(),
            })
            .collect(),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(error = %e, "category tree unavailable");
            Vec::new()
        }
    }
}

fn list_item(info: &SearchInfo) -> VodListItem {
    VodListItem {
        vod_id: info.mid,
        vod_name: info.name.clone(),
        type_id: info.cid,
        type_name: info.c_name.clone(),
        vod_en: info.initial.clone(),
        vod_time: format_stamp(info.update_stamp),
        vod_remarks: info.remarks.clone(),
        vod_play_from: SITE_TAG.to_string(),
    }
}

/// Join the index row with the hot-store detail and any slave playback
/// tracks. A film whose detail hash has expired still answers with the
/// indexed fields.
async fn detail_item(state: &AppState, info: &SearchInfo) -> VodDetailItem {
    let detail = match state.cache.detail(info.cid, info.mid).await {
        Ok(found) => found.unwrap_or_default(),
        Err(e) => {
            warn!(mid = info.mid, error = %e, "detail lookup failed");
            FilmDetail::default()
        }
    };
    let mut sources = detail.play_sources.clone();
    match state.cache.play_sources(info.mid).await {
        Ok(extras) => {
            for extra in extras {
                if !sources.iter().any(|s| s.name == extra.name) {
                    sources.push(extra);
                }
            }
        }
        Err(e) => warn!(mid = info.mid, error = %e, "multi-source lookup failed"),
    }
    let (vod_play_from, vod_play_url) = encode_playlists(&sources);

    VodDetailItem {
        vod_id: info.mid,
        type_id: info.cid,
        type_id_1: info.pid,
        type_name: info.c_name.clone(),
        vod_name: info.name.clone(),
        vod_sub: detail.sub_title,
        vod_en: info.initial.clone(),
        vod_time: format_stamp(info.update_stamp),
        vod_remarks: info.remarks.clone(),
        vod_play_from,
        vod_play_url,
        vod_pic: detail.picture,
        vod_class: detail.class_tag,
        vod_actor: detail.actor,
        vod_director: detail.director,
        vod_writer: detail.writer,
        vod_blurb: detail.blurb,
        vod_pubdate: detail.release_date,
        vod_area: detail.area,
        vod_lang: detail.language,
        vod_year: if detail.year > 0 {
            detail.year.to_string()
        } else {
            String::new()
        },
        vod_state: detail.state,
        vod_hits: info.hits,
        vod_score: format!("{:.1}", detail.db_score),
        vod_content: detail.content,
    }
}

async fn detail_items_for_ids(state: &AppState, ids: &str) -> Vec<VodDetailItem> {
    let mut items = Vec::new();
    for raw in ids.split(',') {
        let Ok(mid) = raw.trim().parse::<i64>() else {
            continue;
        };
        match state.search.by_mid(mid).await {
            Ok(Some(info)) => items.push(detail_item(state, &info).await),
            Ok(None) => {}
            Err(e) => warn!(mid, error = %e, "search lookup failed"),
        }
    }
    items
}

pub async fn handle_provide(
    State(state): State<AppState>,
    Query(params): Query<ProvideParams>,
) -> Json<Value> {
    let class = class_list(&state).await;
    let query = VodQuery {
        type_id: params.t.unwrap_or_default(),
        page: params.pg.unwrap_or(1).max(1),
        page_size: PAGE_SIZE,
        keyword: params.wd.clone().unwrap_or_default(),
        hours: params.h.unwrap_or_default(),
    };

    match params.ac.as_deref() {
        Some("videolist") | Some("detail") => {
            if let Some(ids) = params.ids.as_deref().filter(|ids| !ids.is_empty()) {
                let list = detail_items_for_ids(&state, ids).await;
                let total = list.len() as i64;
                return Json(envelope("detail data", 1, 1, total, list, class));
            }
            // No explicit ids: serve the current page upgraded to full
            // details, for clients that expect videolist to be complete.
            let (total, rows) = match state.search.query(&query).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(error = %e, "vod query failed");
                    (0, Vec::new())
                }
            };
            let mut list = Vec::with_capacity(rows.len());
            for info in &rows {
                list.push(detail_item(&state, info).await);
            }
            let pagecount = (total + PAGE_SIZE - 1) / PAGE_SIZE;
            Json(envelope("detail data", query.page, pagecount, total, list, class))
        }
        _ => {
            let (total, rows) = match state.search.query(&query).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(error = %e, "vod query failed");
                    (0, Vec::new())
                }
            };
            let list: Vec<VodListItem> = rows.iter().map(list_item).collect();
            let pagecount = (total + PAGE_SIZE - 1) / PAGE_SIZE;
            Json(envelope("list data", query.page, pagecount, total, list, class))
        }
    }
}

/// One-tap TVBox/player configuration pointing back at this deployment.
pub async fn handle_provide_config(headers: HeaderMap) -> Json<Value> {
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("127.0.0.1");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let api = format!("{scheme}://{host}/provide/vod/");

    Json(json!({
        "spider": "",
        "wallpaper": "",
        "logo": "",
        "sites": [{
            "key": SITE_TAG,
            "name": "cinedex film library",
            "type": 1,
            "api": api,
            "searchable": 1,
            "quickSearch": 1,
            "filterable": 1,
        }],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinedex_model::PlayLink;

    #[test]
    fn playlists_encode_with_maccms_delimiters() {
        let sources = vec![
            PlaySource {
                name: "hdm3u8".into(),
                link_list: vec![
                    PlayLink {
                        episode: "EP1".into(),
                        link: "https://cdn.test/1.m3u8".into(),
                    },
                    PlayLink {
                        episode: "EP2".into(),
                        link: "https://cdn.test/2.m3u8".into(),
                    },
                ],
            },
            PlaySource {
                name: "hdyun".into(),
                link_list: vec![PlayLink {
                    episode: "EP1".into(),
                    link: "https://b.test/1.mp4".into(),
                }],
            },
        ];
        let (from, url) = encode_playlists(&sources);
        assert_eq!(from, "hdm3u8$$$hdyun");
        assert_eq!(
            url,
            "EP1$https://cdn.test/1.m3u8#EP2$https://cdn.test/2.m3u8$$$EP1$https://b.test/1.mp4"
        );
    }

    #[test]
    fn dollar_signs_are_stripped_from_urls() {
        let sources = vec![PlaySource {
            name: "odd".into(),
            link_list: vec![PlayLink {
                episode: "EP1".into(),
                link: "https://cdn.test/a$b$c.m3u8".into(),
            }],
        }];
        let (_, url) = encode_playlists(&sources);
        assert_eq!(url, "EP1$https://cdn.test/abc.m3u8");
    }

    #[test]
    fn stamps_format_as_maccms_time() {
        assert_eq!(format_stamp(1704164645), "2024-01-02 03:04:05");
        assert_eq!(format_stamp(i64::MIN), "");
    }
}
