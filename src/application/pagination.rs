//! Page-number pagination over ordered listings.
//!
//! Resolution is lenient: a missing or malformed page number selects the
//! first page, and a number outside `1..=num_pages` selects the last one.
//! An empty listing still has one (empty) page.

use std::num::{IntErrorKind, NonZeroU32};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page number `{0}` is not an integer")]
    NotAnInteger(String),
    #[error("page {number} is out of range 1..={num_pages}")]
    OutOfRange { number: i64, num_pages: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    total: u64,
    per_page: NonZeroU32,
}

impl Paginator {
    pub fn new(total: u64, per_page: NonZeroU32) -> Self {
        Self { total, per_page }
    }

    pub fn num_pages(&self) -> u32 {
        let per_page = u64::from(self.per_page.get());
        let pages = self.total.div_ceil(per_page).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Strict lookup used when the caller wants to surface bad numbers.
    pub fn validate(&self, raw: &str) -> Result<PageWindow, PaginationError> {
        let trimmed = raw.trim();
        let number = match trimmed.parse::<i64>() {
            Ok(number) => number,
            Err(err)
                if matches!(
                    err.kind(),
                    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
                ) =>
            {
                return Err(PaginationError::OutOfRange {
                    number: if trimmed.starts_with('-') {
                        i64::MIN
                    } else {
                        i64::MAX
                    },
                    num_pages: self.num_pages(),
                });
            }
            Err(_) => return Err(PaginationError::NotAnInteger(raw.to_string())),
        };

        let num_pages = self.num_pages();
        if number < 1 || number > i64::from(num_pages) {
            return Err(PaginationError::OutOfRange { number, num_pages });
        }

        Ok(self.window(number as u32))
    }

    /// Lenient lookup used by listing pages.
    pub fn get_page(&self, raw: Option<&str>) -> PageWindow {
        let Some(raw) = raw else {
            return self.window(1);
        };

        match self.validate(raw) {
            Ok(window) => window,
            Err(PaginationError::NotAnInteger(_)) => self.window(1),
            Err(PaginationError::OutOfRange { .. }) => self.window(self.num_pages()),
        }
    }

    fn window(&self, number: u32) -> PageWindow {
        let per_page = self.per_page.get();
        let offset = u64::from(number - 1) * u64::from(per_page);
        let remaining = self.total.saturating_sub(offset);
        let limit = remaining.min(u64::from(per_page)) as u32;

        PageWindow {
            number,
            num_pages: self.num_pages(),
            total: self.total,
            per_page,
            offset,
            limit,
        }
    }
}

/// The slice of a listing selected by a page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub total: u64,
    pub per_page: u32,
    pub offset: u64,
    pub limit: u32,
}

impl PageWindow {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous_number(&self) -> Option<u32> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn next_number(&self) -> Option<u32> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        (1..=self.num_pages).collect()
    }
}

/// Items for one page together with the window that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub window: PageWindow,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self { items, window }
    }
}
