//! Store-agnostic filter expressions and the AND/OR predicate builder.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::PostRecord;

use super::criteria::{GlobalLogic, SearchCriteria, TagLogic};

/// A boolean predicate over posts. Evaluated in memory by [`FilterExpr::matches`]
/// or rendered to SQL by the Postgres store.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Matches every post.
    True,
    /// Case-insensitive substring match on the title.
    TitleContains(String),
    /// Author is one of the listed ids. An empty list matches nothing.
    AuthorIn(Vec<Uuid>),
    HasAllTags(Vec<String>),
    HasAnyTag(Vec<String>),
    /// Inclusive creation-time range; a missing bound is open.
    CreatedBetween {
        from: Option<OffsetDateTime>,
        to: Option<OffsetDateTime>,
    },
    /// Conjunction. Empty is true.
    And(Vec<FilterExpr>),
    /// Disjunction. Empty is false.
    Or(Vec<FilterExpr>),
}

impl FilterExpr {
    pub fn matches(&self, post: &PostRecord) -> bool {
        match self {
            FilterExpr::True => true,
            FilterExpr::TitleContains(needle) => post
                .title
                .to_lowercase()
                .contains(needle.to_lowercase().as_str()),
            FilterExpr::AuthorIn(ids) => ids.contains(&post.author_id),
            FilterExpr::HasAllTags(tags) => tags.iter().all(|tag| post.has_tag(tag)),
            FilterExpr::HasAnyTag(tags) => tags.iter().any(|tag| post.has_tag(tag)),
            FilterExpr::CreatedBetween { from, to } => {
                from.is_none_or(|from| post.created_at >= from)
                    && to.is_none_or(|to| post.created_at <= to)
            }
            FilterExpr::And(parts) => parts.iter().all(|part| part.matches(post)),
            FilterExpr::Or(parts) => parts.iter().any(|part| part.matches(post)),
        }
    }

    /// Combine fragments under `logic`. No fragments yields [`FilterExpr::True`]
    /// and a single fragment is returned unwrapped.
    pub fn combine(logic: GlobalLogic, mut parts: Vec<FilterExpr>) -> FilterExpr {
        match parts.len() {
            0 => FilterExpr::True,
            1 => parts.remove(0),
            _ => match logic {
                GlobalLogic::And => FilterExpr::And(parts),
                GlobalLogic::Or => FilterExpr::Or(parts),
            },
        }
    }
}

/// Build the filter for `criteria`.
///
/// `resolved_authors` holds the ids an `authorName` resolved to; they are
/// unioned with any explicit `authorIds`. The identity fragments (title,
/// author) and the content fragments (tags, date range) form two groups,
/// each combined by `globalLogic`, and the groups are then combined by
/// `globalLogic` as well. A group without active criteria is left out, so it
/// never changes the result.
pub fn build_filter(criteria: &SearchCriteria, resolved_authors: &[Uuid]) -> FilterExpr {
    let logic = criteria.global_logic;

    let mut identity = Vec::new();
    if let Some(title) = criteria.title.as_ref() {
        identity.push(FilterExpr::TitleContains(title.clone()));
    }
    if criteria.has_author_filter() {
        let mut ids: Vec<Uuid> = criteria.author_ids.clone();
        ids.extend_from_slice(resolved_authors);
        ids.sort_unstable();
        ids.dedup();
        identity.push(FilterExpr::AuthorIn(ids));
    }

    let mut content = Vec::new();
    if !criteria.tags.is_empty() {
        content.push(match criteria.tag_logic {
            TagLogic::And => FilterExpr::HasAllTags(criteria.tags.clone()),
            TagLogic::Or => FilterExpr::HasAnyTag(criteria.tags.clone()),
        });
    }
    if criteria.created_from.is_some() || criteria.created_to.is_some() {
        content.push(FilterExpr::CreatedBetween {
            from: criteria.created_from,
            to: criteria.created_to,
        });
    }

    let groups: Vec<FilterExpr> = [identity, content]
        .into_iter()
        .filter(|group| !group.is_empty())
        .map(|group| FilterExpr::combine(logic, group))
        .collect();

    FilterExpr::combine(logic, groups)
}
