//! Page-range arithmetic: turn a user-facing `(from, to)` pair into a
//! zero-based half-open interval over the document's pages.
//!
//! Positive values are 1-based page numbers, negative values count from the
//! end (`-1` is the last page). Only three shapes are accepted:
//!
//! | from | to | meaning | interval |
//! |------|----|---------|----------|
//! | > 0  | > 0 | pages `from..=to` | `[from-1, min(to, n))` |
//! | > 0  | 0   | page `from` through the end | `[from-1, n)` |
//! | < 0  | < 0, > from | the trailing window | `[n+from, n+to)` |
//!
//! Note the last shape is half-open at the end like the others: `-3..-1` on a
//! 10-page document selects pages 8 and 9, not 10.

use crate::error::QuizError;
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// A validated `(from, to)` page specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    from: i32,
    to: i32,
}

impl Default for PageRange {
    /// The whole document.
    fn default() -> Self {
        Self { from: 1, to: 0 }
    }
}

impl PageRange {
    /// Validate the sign pattern of `from`/`to`.
    pub fn new(from: i32, to: i32) -> Result<Self, QuizError> {
        let invalid = |reason: &str| QuizError::InvalidRange {
            from,
            to,
            reason: reason.to_string(),
        };

        match (from, to) {
            (f, t) if f > 0 && t >= 0 => Ok(Self { from, to }),
            (f, t) if f < 0 && t < 0 && t > f => Ok(Self { from, to }),
            (f, t) if f < 0 && t < 0 => Err(invalid(
                "when counting from the end, 'to' must be greater than 'from'",
            )),
            (0, _) => Err(invalid("page numbers start at 1")),
            _ => Err(invalid("'from' and 'to' mix absolute and end-relative page numbers")),
        }
    }

    pub fn from_page(&self) -> i32 {
        self.from
    }

    pub fn to_page(&self) -> i32 {
        self.to
    }

    /// Resolve against a document of `page_count` pages.
    ///
    /// Both bounds are clamped to `[0, page_count]`; the result may be empty.
    pub fn resolve(&self, page_count: usize) -> ResolvedInterval {
        let n = page_count as i64;
        let (from, to) = (self.from as i64, self.to as i64);

        let (start, end) = if from > 0 && to > 0 {
            (from - 1, to.min(n))
        } else if from > 0 {
            (from - 1, n)
        } else {
            (n + from, n + to)
        };

        ResolvedInterval {
            start: start.clamp(0, n) as usize,
            end: end.clamp(0, n) as usize,
            page_count,
        }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.from, self.to)
    }
}

impl FromStr for PageRange {
    type Err = QuizError;

    /// Parse `"5"`, `"3:7"`, `"3:"` or `"-3:-1"`.
    ///
    /// A lone page must be positive. End-relative selections need both
    /// bounds, since the negative `to` is exclusive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| -> Result<i32, QuizError> {
            part.trim().parse::<i32>().map_err(|e| {
                QuizError::InvalidConfig(format!("invalid page number '{}' in '{}': {}", part, s, e))
            })
        };

        match s.split_once(':') {
            None => {
                let page = parse(s)?;
                if page < 0 {
                    return Err(QuizError::InvalidRange {
                        from: page,
                        to: page,
                        reason: "a single page must be a positive page number; \
                                 end-relative selections need both bounds, e.g. '-3:-1'"
                            .to_string(),
                    });
                }
                PageRange::new(page, page)
            }
            Some((from, to)) if to.trim().is_empty() => PageRange::new(parse(from)?, 0),
            Some((from, to)) => PageRange::new(parse(from)?, parse(to)?),
        }
    }
}

/// A zero-based half-open page interval, already clamped to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedInterval {
    pub start: usize,
    pub end: usize,
    pub page_count: usize,
}

impl ResolvedInterval {
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Zero-based page indices in order.
    pub fn indices(&self) -> Range<usize> {
        self.start..self.end.max(self.start)
    }
}

impl fmt::Display for ResolvedInterval {
    /// 1-based and inclusive, e.g. `pages 8-9 of 10`; `no pages of 10`
    /// when empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "no pages of {}", self.page_count)
        } else {
            write!(f, "pages {}-{} of {}", self.start + 1, self.end, self.page_count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn interval(from: i32, to: i32, n: usize) -> (usize, usize) {
        let r = PageRange::new(from, to).unwrap().resolve(n);
        (r.start, r.end)
    }

    #[test]
    fn absolute_range_within_document() {
        assert_eq!(interval(2, 4, 10), (1, 4));
        assert_eq!(interval(1, 10, 10), (0, 10));
    }

    #[test]
    fn absolute_range_clamped_to_page_count() {
        assert_eq!(interval(3, 50, 10), (2, 10));
    }

    #[test]
    fn open_ended_range_runs_to_last_page() {
        assert_eq!(interval(1, 0, 7), (0, 7));
        assert_eq!(interval(5, 0, 7), (4, 7));
    }

    #[test]
    fn trailing_window_is_half_open() {
        let r = PageRange::new(-3, -1).unwrap().resolve(10);
        assert_eq!((r.start, r.end), (7, 9));
        let pages: Vec<usize> = r.indices().map(|i| i + 1).collect();
        assert_eq!(pages, vec![8, 9]);
    }

    #[test]
    fn trailing_window_longer_than_document_is_clamped() {
        assert_eq!(interval(-20, -1, 5), (0, 4));
    }

    #[test]
    fn start_past_end_is_empty() {
        let r = PageRange::new(12, 0).unwrap().resolve(10);
        assert!(r.is_empty());
        assert_eq!(r.len(), 0);
        assert_eq!(r.indices().count(), 0);
    }

    #[test]
    fn reversed_absolute_range_is_empty() {
        let r = PageRange::new(5, 2).unwrap().resolve(10);
        assert!(r.is_empty());
        assert_eq!(r.indices().count(), 0);
    }

    #[test]
    fn mixed_signs_rejected() {
        for (from, to) in [(2, -1), (-2, 3), (-1, 0), (0, 0), (0, 5)] {
            let err = PageRange::new(from, to).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRange, "({from}, {to})");
        }
    }

    #[test]
    fn negative_window_must_increase() {
        assert_eq!(PageRange::new(-1, -3).unwrap_err().kind(), ErrorKind::InvalidRange);
        assert_eq!(PageRange::new(-2, -2).unwrap_err().kind(), ErrorKind::InvalidRange);
    }

    #[test]
    fn parse_forms() {
        assert_eq!("5".parse::<PageRange>().unwrap(), PageRange::new(5, 5).unwrap());
        assert_eq!("3:7".parse::<PageRange>().unwrap(), PageRange::new(3, 7).unwrap());
        assert_eq!("3:".parse::<PageRange>().unwrap(), PageRange::new(3, 0).unwrap());
        assert_eq!("-3:-1".parse::<PageRange>().unwrap(), PageRange::new(-3, -1).unwrap());
        assert!("2:-1".parse::<PageRange>().is_err());
        assert!("abc".parse::<PageRange>().is_err());
    }

    #[test]
    fn lone_negative_page_is_rejected_with_a_hint() {
        for text in ["-1", "-2"] {
            let err = text.parse::<PageRange>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRange, "{text}");
            let msg = err.to_string();
            assert!(msg.contains("single page must be a positive"), "{msg}");
            assert!(!msg.contains("mix absolute"), "{msg}");
        }
    }

    #[test]
    fn display_is_one_based() {
        let r = PageRange::new(-3, -1).unwrap().resolve(10);
        assert_eq!(r.to_string(), "pages 8-9 of 10");
    }

    #[test]
    fn empty_interval_displays_no_pages() {
        let past_end = PageRange::new(21, 0).unwrap().resolve(10);
        assert_eq!(past_end.to_string(), "no pages of 10");
        let reversed = PageRange::new(5, 2).unwrap().resolve(10);
        assert_eq!(reversed.to_string(), "no pages of 10");
    }
}
