//! Client-side pagination over the request log.
//!
//! The log is fetched once per [`LogPaginator::load`] and cached. Rendering a
//! page is a pure projection of `(cache, page)`; the cache is never reordered.

use std::{ops::Range, sync::Arc};

use shared::protocol::LogRecord;
use tracing::{debug, info};

use crate::{
    error::log_failure,
    render::{escape_html, LogRow, TableBody},
    ClassifierApi,
};

pub const PAGE_SIZE: usize = 5;

pub const LOGS_UNAVAILABLE_MESSAGE: &str =
    "Could not load request logs. Please check that the backend is running.";

/// A page position within a collection of `total_items`. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub size: usize,
    pub total_items: usize,
}

impl Page {
    pub fn new(index: usize, size: usize, total_items: usize) -> Option<Self> {
        let page = Self {
            index,
            size,
            total_items,
        };
        (size > 0 && (1..=page.total_pages()).contains(&index)).then_some(page)
    }

    /// `ceil(total_items / size)`, but never less than one.
    pub fn total_pages(&self) -> usize {
        self.total_items.div_ceil(self.size).max(1)
    }

    pub fn range(&self) -> Range<usize> {
        let start = ((self.index - 1) * self.size).min(self.total_items);
        let end = (start + self.size).min(self.total_items);
        start..end
    }

    pub fn controls(&self) -> PageControls {
        let total_pages = self.total_pages();
        PageControls {
            current: self.index,
            total_pages,
            previous_enabled: self.index > 1,
            next_enabled: self.index < total_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageControls {
    pub current: usize,
    pub total_pages: usize,
    pub previous_enabled: bool,
    pub next_enabled: bool,
}

impl PageControls {
    pub fn label(&self) -> String {
        format!("Page {} of {}", self.current, self.total_pages)
    }

    pub fn to_html(&self) -> String {
        fn button(action: &str, text: &str, enabled: bool) -> String {
            let disabled = if enabled { "" } else { " disabled" };
            format!("<button type=\"button\" data-page-action=\"{action}\"{disabled}>{text}</button>")
        }
        format!(
            "<div class=\"pagination\">{}<span>{}</span>{}</div>",
            button("previous", "Previous", self.previous_enabled),
            escape_html(&self.label()),
            button("next", "Next", self.next_enabled),
        )
    }
}

/// Navigation requests raised by the page controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    Previous,
    Next,
    Goto(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogPageView {
    pub body: TableBody<LogRow>,
    /// `None` when the log could not be loaded.
    pub controls: Option<PageControls>,
}

impl LogPageView {
    pub fn to_html(&self) -> String {
        let mut html = self.body.to_html();
        if let Some(controls) = &self.controls {
            html.push_str(&controls.to_html());
        }
        html
    }
}

/// Projects page `index` of `entries`. `None` when `index` is out of range.
pub fn render_page(entries: &[LogRecord], index: usize, size: usize) -> Option<LogPageView> {
    let page = Page::new(index, size, entries.len())?;
    let rows = entries[page.range()].iter().map(LogRow::from).collect();
    Some(LogPageView {
        body: TableBody::Rows(rows),
        controls: Some(page.controls()),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    NotLoaded,
    Loaded { total_items: usize },
    Failed,
}

pub struct LogPaginator {
    api: Arc<dyn ClassifierApi>,
    page_size: usize,
    entries: Vec<LogRecord>,
    current_page: usize,
    status: LoadStatus,
}

impl LogPaginator {
    pub fn new(api: Arc<dyn ClassifierApi>) -> Self {
        Self {
            api,
            page_size: PAGE_SIZE,
            entries: Vec::new(),
            current_page: 1,
            status: LoadStatus::NotLoaded,
        }
    }

    /// Fetches the whole log and shows the current page. A failed load drops
    /// the cache and resets to page one; nothing is retried.
    pub async fn load(&mut self) -> LoadStatus {
        self.status = match self.api.fetch_logs().await {
            Ok(entries) => {
                info!(total_items = entries.len(), "request log loaded");
                self.entries = entries;
                let total_pages = self.current().total_pages();
                if self.current_page > total_pages {
                    self.current_page = total_pages;
                }
                LoadStatus::Loaded {
                    total_items: self.entries.len(),
                }
            }
            Err(err) => {
                log_failure("logs", &err);
                self.entries.clear();
                self.current_page = 1;
                LoadStatus::Failed
            }
        };
        self.status
    }

    pub fn entries(&self) -> &[LogRecord] {
        &self.entries
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    fn current(&self) -> Page {
        Page {
            index: self.current_page,
            size: self.page_size,
            total_items: self.entries.len(),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.current().total_pages()
    }

    /// Moves to page `index` and returns its view. Out-of-range requests are
    /// ignored and leave the current page unchanged.
    pub fn render_page(&mut self, index: usize) -> Option<LogPageView> {
        if self.status == LoadStatus::Failed {
            return None;
        }
        let view = render_page(&self.entries, index, self.page_size);
        match view {
            Some(_) => {
                debug!(page = index, "log page changed");
                self.current_page = index;
            }
            None => debug!(page = index, "ignored out-of-range page request"),
        }
        view
    }

    pub fn handle(&mut self, action: PageAction) -> Option<LogPageView> {
        let target = match action {
            PageAction::Previous => self.current_page.checked_sub(1)?,
            PageAction::Next => self.current_page + 1,
            PageAction::Goto(index) => index,
        };
        self.render_page(target)
    }

    pub fn view(&self) -> LogPageView {
        if self.status == LoadStatus::Failed {
            return LogPageView {
                body: TableBody::Fallback(LOGS_UNAVAILABLE_MESSAGE.to_string()),
                controls: None,
            };
        }
        let page = self.current();
        LogPageView {
            body: TableBody::Rows(self.entries[page.range()].iter().map(LogRow::from).collect()),
            controls: Some(page.controls()),
        }
    }
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
