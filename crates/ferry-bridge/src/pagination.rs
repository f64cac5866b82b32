//! OrderedCollection builders for outbox, followers and following.
//!
//! Every collection is served as a single page: the outer collection embeds
//! its first page, and `?page` serves the page on its own.

use ferry_pub::types::{OrderedCollection, OrderedCollectionPage, default_context};

/// Outer collection with the first page embedded.
pub fn ordered_collection<T>(collection_id: &str, items: Vec<T>) -> OrderedCollection<T> {
    let mut first = ordered_collection_page(collection_id, items);
    first.context = None;
    OrderedCollection {
        context: Some(default_context()),
        id: collection_id.to_owned(),
        kind: "OrderedCollection".into(),
        total_items: first.total_items,
        first,
    }
}

/// The first (and only) page of a collection.
pub fn ordered_collection_page<T>(collection_id: &str, items: Vec<T>) -> OrderedCollectionPage<T> {
    OrderedCollectionPage {
        context: Some(default_context()),
        id: format!("{collection_id}?page=1"),
        kind: "OrderedCollectionPage".into(),
        part_of: collection_id.to_owned(),
        total_items: items.len(),
        ordered_items: items,
    }
}
