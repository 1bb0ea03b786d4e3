use crate::models::Bookmark;

/// Bookmarks whose title contains `term`, ignoring case. An empty term keeps
/// everything. Input order is preserved.
pub fn filter_bookmarks(bookmarks: &[Bookmark], term: &str) -> Vec<Bookmark> {
    if term.is_empty() {
        return bookmarks.to_vec();
    }
    let needle = term.to_lowercase();
    bookmarks
        .iter()
        .filter(|b| b.title.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
