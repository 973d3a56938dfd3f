use std::cmp::Reverse;

use super::domain::{Filters, Page, PendingAccount, SortKey};

/// Filters and sorts the working set. Pure; sorting is stable so equal keys
/// keep their load order.
pub fn apply_filters(accounts: &[PendingAccount], filters: &Filters) -> Vec<PendingAccount> {
    let needle = filters.search.trim().to_lowercase();
    let mut filtered: Vec<PendingAccount> = accounts
        .iter()
        .filter(|account| needle.is_empty() || account.matches(&needle))
        .cloned()
        .collect();

    match filters.sort {
        SortKey::Newest => filtered.sort_by_key(|account| Reverse(account.created_at)),
        SortKey::Oldest => filtered.sort_by_key(|account| account.created_at),
        SortKey::Name => filtered.sort_by_cached_key(PendingAccount::label),
    }
    filtered
}

/// Slices one page out of `accounts`; the requested page is clamped into range.
pub fn paginate(accounts: &[PendingAccount], page: usize, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let total_items = accounts.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);

    let items = accounts
        .iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .cloned()
        .collect();

    Page {
        items,
        page,
        total_pages,
        total_items,
        page_size,
    }
}
