//! # Path Query Module
//!
//! Fixed-depth element lookups for the decoder.
//!
//! - A path is a list of local names in the TwoA namespace
//! - Intermediate names descend one child at a time (first match wins)
//! - The final name selects every matching child of the reached element
//! - A missing intermediate yields nothing; it is not an error

use crate::document::Element;

/// Select every element at `path` below `start`.
///
/// `select_descendants(root, &["RankOrder", "Ranks", "Rank"])` walks to the
/// first `RankOrder`, then its first `Ranks`, and yields each `Rank` child.
/// An empty path yields nothing.
pub fn select_descendants<'a>(
    start: &'a Element,
    path: &[&'a str],
) -> impl Iterator<Item = &'a Element> + use<'a> {
    let target = path.split_last().and_then(|(last, intermediate)| {
        intermediate
            .iter()
            .try_fold(start, |node, name| node.child(name))
            .map(|node| (node, *last))
    });

    target
        .into_iter()
        .flat_map(|(node, last)| node.children_named(last))
}

/// Select the first element at `path` below `start`.
#[must_use]
pub fn select_single<'a>(start: &'a Element, path: &[&'a str]) -> Option<&'a Element> {
    select_descendants(start, path).next()
}
