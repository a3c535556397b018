use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::executor::{PageRequest, RequestExecutor, Sleeper, Transport};
use crate::{AppError, Result};

/// How a Slack method signals that more results exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStyle {
    /// `response_metadata.next_cursor`, fed back as `cursor`.
    Cursor,
    /// `paging.pages`, walked with a `page` counter starting at 1.
    Pages,
    /// A single call returns everything.
    Flat,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    pages: u32,
}

struct Page<R> {
    items: Vec<R>,
    next_cursor: Option<String>,
    total_pages: Option<u32>,
}

pub struct Paginator<T, S> {
    executor: RequestExecutor<T, S>,
    page_delay: Duration,
}

impl<T: Transport, S: Sleeper> Paginator<T, S> {
    pub fn new(executor: RequestExecutor<T, S>, page_delay: Duration) -> Self {
        Self {
            executor,
            page_delay,
        }
    }

    pub fn executor(&self) -> &RequestExecutor<T, S> {
        &self.executor
    }

    /// Walks every page of `request` and returns the concatenated items.
    ///
    /// `combine_key` names the array holding each page's items; `None` treats
    /// the whole body as one item. Any failure discards what was collected.
    pub fn fetch_all<R: DeserializeOwned>(
        &self,
        request: &PageRequest,
        combine_key: Option<&str>,
        style: PageStyle,
    ) -> Result<Vec<R>> {
        let items = match style {
            PageStyle::Cursor => self.fetch_cursor(request, combine_key)?,
            PageStyle::Pages => self.fetch_pages(request, combine_key)?,
            PageStyle::Flat => self.fetch_page(request, combine_key)?.items,
        };
        info!(method = %request.method, total = items.len(), "completed pagination");
        Ok(items)
    }

    fn fetch_cursor<R: DeserializeOwned>(
        &self,
        request: &PageRequest,
        combine_key: Option<&str>,
    ) -> Result<Vec<R>> {
        let mut result = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_number = 1;

        loop {
            let page_request = request.clone().opt_param("cursor", cursor.take());
            let page = self.fetch_page(&page_request, combine_key)?;
            debug!(
                method = %request.method,
                page = page_number,
                items = page.items.len(),
                "fetched page"
            );
            result.extend(page.items);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }

            page_number += 1;
            self.executor.pause(self.page_delay);
        }

        Ok(result)
    }

    fn fetch_pages<R: DeserializeOwned>(
        &self,
        request: &PageRequest,
        combine_key: Option<&str>,
    ) -> Result<Vec<R>> {
        let mut result = Vec::new();
        let mut current: u32 = 1;
        let mut total: Option<u32> = None;

        loop {
            let page_request = request.clone().with_param("page", current);
            let page = self.fetch_page(&page_request, combine_key)?;

            let pages = match total {
                Some(pages) => pages,
                None => {
                    let pages = page
                        .total_pages
                        .ok_or_else(|| AppError::MissingKey("paging.pages".to_string()))?;
                    total = Some(pages);
                    pages
                }
            };
            debug!(
                method = %request.method,
                page = current,
                pages,
                items = page.items.len(),
                "fetched page"
            );
            result.extend(page.items);

            if current >= pages {
                break;
            }
            current += 1;
            self.executor.pause(self.page_delay);
        }

        Ok(result)
    }

    fn fetch_page<R: DeserializeOwned>(
        &self,
        request: &PageRequest,
        combine_key: Option<&str>,
    ) -> Result<Page<R>> {
        let response = self.executor.execute(request)?;
        if !response.is_success() {
            return Err(AppError::Http {
                status: response.status,
                body: response.body,
            });
        }

        let body: Value =
            serde_json::from_str(&response.body).map_err(|e| AppError::JsonParse(e.to_string()))?;
        let envelope: Envelope =
            serde_json::from_value(body.clone()).map_err(|e| AppError::JsonParse(e.to_string()))?;

        if !envelope.ok {
            return Err(AppError::SlackApi(
                envelope.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        let items = match combine_key {
            Some(key) => {
                let raw = match body {
                    Value::Object(mut map) => map.remove(key),
                    _ => None,
                }
                .ok_or_else(|| AppError::MissingKey(key.to_string()))?;
                serde_json::from_value(raw).map_err(|e| AppError::JsonParse(e.to_string()))?
            }
            None => vec![serde_json::from_value(body).map_err(|e| AppError::JsonParse(e.to_string()))?],
        };

        let next_cursor = envelope
            .response_metadata
            .and_then(|meta| meta.next_cursor)
            .filter(|cursor| !cursor.trim().is_empty());

        Ok(Page {
            items,
            next_cursor,
            total_pages: envelope.paging.map(|p| p.pages),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::HttpResponse;
    use crate::testing::{RecordingSleeper, ScriptedTransport, ok_json, rate_limited, scripted_executor};
    use serde_json::json;

    fn paginator(responses: Vec<HttpResponse>) -> Paginator<ScriptedTransport, RecordingSleeper> {
        Paginator::new(scripted_executor(responses), Duration::from_secs(1))
    }

    fn cursor_page(items: &[&str], next: Option<&str>) -> HttpResponse {
        let mut body = json!({"ok": true, "channels": items.iter().map(|id| json!({"id": id})).collect::<Vec<_>>()});
        if let Some(next) = next {
            body["response_metadata"] = json!({"next_cursor": next});
        }
        ok_json(&body.to_string())
    }

    #[test]
    fn test_cursor_pagination_concatenates_in_order() {
        let p = paginator(vec![
            cursor_page(&["C1", "C2"], Some("c2")),
            cursor_page(&["C3"], Some("c3")),
            cursor_page(&["C4"], None),
        ]);
        let request = PageRequest::new("conversations.list").with_limit(100);

        let items: Vec<Value> = p
            .fetch_all(&request, Some("channels"), PageStyle::Cursor)
            .unwrap();

        let ids: Vec<&str> = items.iter().filter_map(|c| c["id"].as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2", "C3", "C4"]);

        let requests = p.executor().transport().requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].param("cursor"), None);
        assert_eq!(requests[1].param("cursor"), Some("c2"));
        assert_eq!(requests[2].param("cursor"), Some("c3"));
        assert_eq!(requests[2].param("limit"), Some("100"));

        // paced between pages, not after the last one
        assert_eq!(
            p.executor().sleeper().recorded(),
            vec![Duration::from_secs(1), Duration::from_secs(1)]
        );
    }

    #[test]
    fn test_empty_cursor_terminates() {
        let p = paginator(vec![cursor_page(&["C1"], Some("  ")), cursor_page(&["C2"], None)]);

        let items: Vec<Value> = p
            .fetch_all(&PageRequest::new("conversations.list"), Some("channels"), PageStyle::Cursor)
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(p.executor().transport().request_count(), 1);
    }

    #[test]
    fn test_logical_failure_discards_partial_results() {
        let p = paginator(vec![
            cursor_page(&["C1"], Some("next")),
            ok_json(r#"{"ok": false, "error": "invalid_cursor"}"#),
        ]);

        let err = p
            .fetch_all::<Value>(&PageRequest::new("conversations.list"), Some("channels"), PageStyle::Cursor)
            .unwrap_err();

        assert!(matches!(err, AppError::SlackApi(ref code) if code == "invalid_cursor"));
        assert!(!err.is_structural());
    }

    #[test]
    fn test_missing_combine_key_is_structural() {
        let p = paginator(vec![ok_json(r#"{"ok": true, "members": []}"#)]);

        let err = p
            .fetch_all::<Value>(&PageRequest::new("users.list"), Some("channels"), PageStyle::Cursor)
            .unwrap_err();

        assert!(matches!(err, AppError::MissingKey(ref key) if key == "channels"));
        assert!(err.is_structural());
    }

    #[test]
    fn test_http_error_status_surfaces() {
        let p = paginator(vec![HttpResponse {
            status: 503,
            retry_after: None,
            body: "unavailable".to_string(),
        }]);

        let err = p
            .fetch_all::<Value>(&PageRequest::new("users.list"), Some("members"), PageStyle::Cursor)
            .unwrap_err();

        assert!(matches!(err, AppError::Http { status: 503, .. }));
    }

    #[test]
    fn test_non_json_body_is_structural() {
        let p = paginator(vec![ok_json("<html>")]);

        let err = p
            .fetch_all::<Value>(&PageRequest::new("users.list"), Some("members"), PageStyle::Flat)
            .unwrap_err();

        assert!(matches!(err, AppError::JsonParse(_)));
    }

    #[test]
    fn test_rate_limit_inside_traversal_is_absorbed() {
        let p = paginator(vec![
            cursor_page(&["C1"], Some("c2")),
            rate_limited(Some(2)),
            cursor_page(&["C2"], None),
        ]);

        let items: Vec<Value> = p
            .fetch_all(&PageRequest::new("conversations.list"), Some("channels"), PageStyle::Cursor)
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(
            p.executor().sleeper().recorded(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2 + 5),
                Duration::from_secs(1),
            ]
        );
    }

    #[test]
    fn test_page_number_pagination() {
        let page = |n: u32, ids: &[&str]| {
            ok_json(
                &json!({
                    "ok": true,
                    "files": ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>(),
                    "paging": {"page": n, "pages": 3}
                })
                .to_string(),
            )
        };
        let p = paginator(vec![page(1, &["F1"]), page(2, &["F2", "F3"]), page(3, &["F4"])]);

        let items: Vec<Value> = p
            .fetch_all(&PageRequest::new("files.list"), Some("files"), PageStyle::Pages)
            .unwrap();

        assert_eq!(items.len(), 4);
        let pages: Vec<Option<String>> = p
            .executor()
            .transport()
            .requests()
            .iter()
            .map(|r| r.param("page").map(str::to_string))
            .collect();
        assert_eq!(
            pages,
            vec![Some("1".to_string()), Some("2".to_string()), Some("3".to_string())]
        );
    }

    #[test]
    fn test_page_number_pagination_requires_paging() {
        let p = paginator(vec![ok_json(r#"{"ok": true, "files": []}"#)]);

        let err = p
            .fetch_all::<Value>(&PageRequest::new("files.list"), Some("files"), PageStyle::Pages)
            .unwrap_err();

        assert!(matches!(err, AppError::MissingKey(ref key) if key == "paging.pages"));
    }

    #[test]
    fn test_flat_single_call() {
        let p = paginator(vec![cursor_page(&["C1", "C2"], Some("ignored"))]);

        let items: Vec<Value> = p
            .fetch_all(&PageRequest::new("conversations.list"), Some("channels"), PageStyle::Flat)
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(p.executor().transport().request_count(), 1);
        assert!(p.executor().sleeper().recorded().is_empty());
    }

    #[test]
    fn test_without_combine_key_whole_body_is_item() {
        let p = paginator(vec![ok_json(r#"{"ok": true, "channel": {"id": "C1"}}"#)]);

        let items: Vec<Value> = p
            .fetch_all(&PageRequest::new("conversations.info"), None, PageStyle::Flat)
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["channel"]["id"], "C1");
    }
}
