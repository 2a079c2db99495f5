use std::fmt;

/// Longest page count shown without collapsing.
const MAX_UNCOLLAPSED: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

impl fmt::Display for PageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "{n}"),
            Self::Ellipsis => f.write_str("..."),
        }
    }
}

/// Number of pages needed for `total_items` at `page_size` per page.
pub fn total_pages(total_items: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_items.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Compressed list of page buttons for a pager.
///
/// First and last page are always present, plus one page either side of
/// `current`; every other run collapses into a single ellipsis. Pages are
/// 1-based and `current` is clamped into range.
pub fn page_window(current: u32, total: u32) -> Vec<PageItem> {
    if total == 0 {
        return Vec::new();
    }
    if total <= MAX_UNCOLLAPSED {
        return (1..=total).map(PageItem::Page).collect();
    }

    let current = current.clamp(1, total);
    let lo = current.saturating_sub(1).max(2);
    let hi = (current + 1).min(total - 1);

    let mut items = vec![PageItem::Page(1)];
    if lo > 2 {
        items.push(PageItem::Ellipsis);
    }
    items.extend((lo..=hi).map(PageItem::Page));
    if hi < total - 1 {
        items.push(PageItem::Ellipsis);
    }
    items.push(PageItem::Page(total));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageItem::{Ellipsis, Page};

    fn pages(items: &[PageItem]) -> Vec<u32> {
        items
            .iter()
            .filter_map(|i| match i {
                Page(n) => Some(*n),
                Ellipsis => None,
            })
            .collect()
    }

    #[test]
    fn small_totals_are_not_collapsed() {
        for total in 1..=7 {
            for current in 1..=total {
                let window = page_window(current, total);
                assert_eq!(window, (1..=total).map(Page).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn middle_page_collapses_both_sides() {
        assert_eq!(
            page_window(5, 10),
            vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn edges_collapse_one_side() {
        assert_eq!(page_window(1, 10), vec![Page(1), Page(2), Ellipsis, Page(10)]);
        assert_eq!(page_window(3, 10), vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(10)]);
        assert_eq!(page_window(10, 10), vec![Page(1), Ellipsis, Page(9), Page(10)]);
    }

    #[test]
    fn window_always_has_bounds_and_neighbours() {
        for total in 8..=40 {
            for current in 1..=total {
                let window = page_window(current, total);
                let shown = pages(&window);
                let lo = current.saturating_sub(1).max(2);
                let hi = (current + 1).min(total - 1);

                assert_eq!(shown.first(), Some(&1));
                assert_eq!(shown.last(), Some(&total));
                for p in lo..=hi {
                    assert!(shown.contains(&p), "page {p} missing for {current}/{total}");
                }
                // An ellipsis sits exactly where consecutive pages have a gap.
                for pair in window.windows(3) {
                    if let [Page(a), Ellipsis, Page(b)] = pair {
                        assert!(b - a > 1);
                    }
                }
                for pair in window.windows(2) {
                    if let [Page(a), Page(b)] = pair {
                        assert_eq!(b - a, 1);
                    }
                }
            }
        }
    }

    #[test]
    fn out_of_range_current_is_clamped() {
        assert_eq!(page_window(0, 10), page_window(1, 10));
        assert_eq!(page_window(99, 10), page_window(10, 10));
    }

    #[test]
    fn zero_pages_is_empty() {
        assert!(page_window(1, 0).is_empty());
        assert_eq!(total_pages(0, 20), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn ellipsis_renders_as_three_dots() {
        assert_eq!(Ellipsis.to_string(), "...");
        assert_eq!(Page(4).to_string(), "4");
    }
}
