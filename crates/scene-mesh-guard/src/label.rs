//! The closed moderation-label set and the `visible(post, viewer, context)`
//! predicate that every feed/search read path filters through.

use scene_mesh_core::{Error, Label, Post, Result};

/// Where a visibility check is being evaluated. Spam/flagged posts are
/// treated differently depending on which context asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Feed,
    Search,
}

/// The viewer-side inputs to a visibility check. A viewer with no stated
/// preferences defaults to `show_nsfw = false`.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub did: String,
    pub show_nsfw: bool,
}

impl Viewer {
    #[must_use]
    pub fn new(did: impl Into<String>, show_nsfw: bool) -> Self {
        Self {
            did: did.into(),
            show_nsfw,
        }
    }
}

/// Validates that every label in `labels` belongs to the closed set.
///
/// `Label` is already a closed enum, so the only way this can fail is via
/// code that parses labels from an external representation (e.g. ingestion)
/// before constructing `Label` values; this entry point exists for that
/// string-based boundary.
pub fn validate(labels: &[&str]) -> Result<Vec<Label>> {
    labels
        .iter()
        .map(|raw| Label::parse(raw).ok_or_else(|| Error::InvalidLabel((*raw).to_string())))
        .collect()
}

/// Whether `post` is visible to `viewer` in `context`.
#[must_use]
pub fn visible(post: &Post, viewer: &Viewer, context: Context) -> bool {
    let is_author = post.author_did == viewer.did;

    if is_author {
        return true;
    }

    if post.has_label(Label::Hidden) {
        return false;
    }

    if post.has_label(Label::Nsfw) && !viewer.show_nsfw {
        return false;
    }

    if post.has_label(Label::Spam) || post.has_label(Label::Flagged) {
        if context == Context::Search {
            return false;
        }
    }

    true
}

/// Filters an iterator of optional posts down to those visible to `viewer`
/// in `context`. Missing entries (`None`) are dropped silently — they
/// represent dangling references from a join, not an error.
pub fn filter_visible<'a, I>(posts: I, viewer: &Viewer, context: Context) -> Vec<&'a Post>
where
    I: IntoIterator<Item = Option<&'a Post>>,
{
    posts
        .into_iter()
        .flatten()
        .filter(|post| visible(post, viewer, context))
        .collect()
}
