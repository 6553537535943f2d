use std::{collections::VecDeque, fmt, sync::Arc};

use futures::stream::{self, Stream};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::{
    client::ClientCore,
    wire::{AFTER_CURSOR_HEADER, AFTER_CURSOR_PARAM, PER_PAGE_HEADER},
    ApiRequest, RequestOptions, Result, Validate,
};

/// One page of a cursor-paginated list.
///
/// Holds what it needs to fetch the following page: the originating request
/// and options plus a shared handle to the client.
pub struct Page<T> {
    items: Vec<T>,
    per_page: String,
    after_cursor: String,
    request: ApiRequest,
    options: RequestOptions,
    core: Arc<ClientCore>,
}

impl<T: fmt::Debug> fmt::Debug for Page<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("items", &self.items)
            .field("per_page", &self.per_page)
            .field("after_cursor", &self.after_cursor)
            .finish()
    }
}

impl<T> Page<T> {
    pub(crate) fn from_response(
        items: Vec<T>,
        headers: &HeaderMap,
        request: ApiRequest,
        options: RequestOptions,
        core: Arc<ClientCore>,
    ) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_owned()
        };
        Self {
            items,
            per_page: header(PER_PAGE_HEADER),
            after_cursor: header(AFTER_CURSOR_HEADER),
            request,
            options,
            core,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub(crate) fn take_items(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    /// Cursor from `X-After-Cursor`; empty on the last page.
    pub fn after_cursor(&self) -> &str {
        &self.after_cursor
    }

    /// Raw `X-Per-Page` value; empty when absent.
    pub fn per_page(&self) -> &str {
        &self.per_page
    }

    /// `X-Per-Page` as a number, when it parses.
    pub fn per_page_hint(&self) -> Option<usize> {
        self.per_page.trim().parse().ok()
    }

    pub fn has_next_page(&self) -> bool {
        !self.after_cursor.is_empty()
    }

    /// The request that fetches the following page, if there is one.
    pub fn next_page_request(&self) -> Option<ApiRequest> {
        self.has_next_page()
            .then(|| self.request.with_query_value(AFTER_CURSOR_PARAM, &self.after_cursor))
    }
}

impl<T> Page<T>
where
    T: DeserializeOwned + Validate,
{
    /// Fetches the following page with full retry semantics.
    ///
    /// Returns `Ok(None)` without touching the network when this is the
    /// last page.
    pub async fn next_page(&self) -> Result<Option<Page<T>>> {
        let Some(request) = self.next_page_request() else {
            return Ok(None);
        };
        self.core
            .list(request, self.options.clone())
            .await
            .map(Some)
    }

    /// Streams items from this page onwards, fetching each following page
    /// only once the previous one is drained. Ends after the first error.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<T>> {
        let buffer: VecDeque<T> = self.take_items().into();
        stream::unfold((buffer, Some(self)), |(mut buffer, mut page)| async move {
            loop {
                if let Some(item) = buffer.pop_front() {
                    return Some((Ok(item), (buffer, page)));
                }
                let current = page.take()?;
                match current.next_page().await {
                    Ok(Some(mut next)) => {
                        buffer = next.take_items().into();
                        page = Some(next);
                    }
                    Ok(None) => return None,
                    Err(err) => return Some((Err(err), (buffer, None))),
                }
            }
        })
    }
}
