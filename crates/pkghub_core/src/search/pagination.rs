//! Pagination index for listing pages.
//!
//! Page numbers are 1-based; the offset of page `n` is `(n - 1) * per_page`.

use serde::Serialize;

/// One entry of the pagination index, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageLink {
    First { offset: i64 },
    Previous { offset: i64 },
    /// Gap between the window and the first or last page.
    Ellipsis,
    Page { number: i64, offset: i64, current: bool },
    Next { offset: i64 },
    Last { offset: i64 },
}

/// Position of one page within a result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// 1-based index of the first row shown; `0` when no row is shown.
    pub first: i64,
    /// 1-based index of the last row shown; `0` when no row is shown.
    pub last: i64,
    pub per_page: i64,
    pub offset: i64,
    pub current_page: i64,
    pub pages: i64,
    pub links: Vec<PageLink>,
}

/// Builds the index for `total` rows seen `per_page` at a time from `offset`.
///
/// `window` page markers are shown on each side of the current page.
/// `per_page` must be positive and `offset` non-negative; callers clamp first.
pub fn paginate(total: i64, per_page: i64, offset: i64, window: i64) -> Pagination {
    let per_page = per_page.max(1);
    let offset = offset.max(0);
    let total = total.max(0);
    let window = window.max(0);

    let current = offset / per_page + 1;
    let pages = total.saturating_add(per_page - 1) / per_page;
    // An offset past the end shows no rows.
    let (first, last) = if offset >= total {
        (0, 0)
    } else {
        (offset + 1, offset.saturating_add(per_page).min(total))
    };

    let mut links = Vec::new();
    if current > 1 {
        links.push(PageLink::First { offset: 0 });
        links.push(PageLink::Previous {
            offset: (current - 2).saturating_mul(per_page),
        });
    }

    let window_start = current.saturating_sub(window).max(1);
    let window_end = current.saturating_add(window).min(pages);
    if window_start > 1 {
        links.push(PageLink::Ellipsis);
    }
    for number in window_start..=window_end {
        links.push(PageLink::Page {
            number,
            offset: (number - 1) * per_page,
            current: number == current,
        });
    }
    if current.saturating_add(window) < pages {
        links.push(PageLink::Ellipsis);
    }

    if current < pages {
        links.push(PageLink::Next {
            offset: current * per_page,
        });
        links.push(PageLink::Last {
            offset: (pages - 1) * per_page,
        });
    }

    Pagination {
        first,
        last,
        per_page,
        offset,
        current_page: current,
        pages,
        links,
    }
}

#[cfg(test)]
mod tests {
    use super::{paginate, PageLink};

    fn page_numbers(links: &[PageLink]) -> Vec<i64> {
        links
            .iter()
            .filter_map(|link| match link {
                PageLink::Page { number, .. } => Some(*number),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn middle_page_has_all_navigation_links() {
        let page = paginate(237, 50, 100, 5);
        assert_eq!((page.first, page.last), (101, 150));
        assert_eq!(page.current_page, 3);
        assert_eq!(page.pages, 5);
        assert_eq!(page_numbers(&page.links), vec![1, 2, 3, 4, 5]);
        assert_eq!(page.links.first(), Some(&PageLink::First { offset: 0 }));
        assert_eq!(page.links[1], PageLink::Previous { offset: 50 });
        assert!(page.links.contains(&PageLink::Page {
            number: 3,
            offset: 100,
            current: true
        }));
        assert_eq!(
            &page.links[page.links.len() - 2..],
            &[PageLink::Next { offset: 150 }, PageLink::Last { offset: 200 }]
        );
        assert!(!page.links.contains(&PageLink::Ellipsis));
    }

    #[test]
    fn first_page_has_no_backward_links() {
        let page = paginate(237, 50, 0, 5);
        assert_eq!((page.first, page.last), (1, 50));
        assert!(matches!(page.links[0], PageLink::Page { number: 1, .. }));
    }

    #[test]
    fn last_partial_page_stops_at_total() {
        let page = paginate(237, 50, 200, 5);
        assert_eq!((page.first, page.last), (201, 237));
        assert_eq!(page.current_page, 5);
        assert!(!page
            .links
            .iter()
            .any(|link| matches!(link, PageLink::Next { .. } | PageLink::Last { .. })));
    }

    #[test]
    fn wide_result_sets_get_ellipses_on_both_sides() {
        let page = paginate(5_000, 50, 50 * 19, 5);
        assert_eq!(page.current_page, 20);
        assert_eq!(page_numbers(&page.links), (15..=25).collect::<Vec<_>>());
        let ellipses = page
            .links
            .iter()
            .filter(|link| **link == PageLink::Ellipsis)
            .count();
        assert_eq!(ellipses, 2);
    }

    #[test]
    fn empty_result_has_no_markers() {
        let page = paginate(0, 50, 0, 5);
        assert_eq!((page.first, page.last, page.pages), (0, 0, 0));
        assert!(page.links.is_empty());
    }

    #[test]
    fn offsets_past_the_end_show_no_rows() {
        let page = paginate(237, 50, i64::MAX, 5);
        assert_eq!((page.first, page.last), (0, 0));
        assert_eq!(page.pages, 5);
        assert_eq!(page.current_page, i64::MAX / 50 + 1);
        assert_eq!(page.links[0], PageLink::First { offset: 0 });
        assert!(page_numbers(&page.links).is_empty());
        assert!(!page
            .links
            .iter()
            .any(|link| matches!(link, PageLink::Next { .. } | PageLink::Last { .. })));

        let page = paginate(237, 50, 250, 5);
        assert_eq!((page.first, page.last), (0, 0));
    }
}
