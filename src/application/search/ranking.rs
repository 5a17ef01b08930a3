//! Result ordering shared by the in-process store and the search service.

use std::cmp::Ordering;

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::entities::PostRecord;
use crate::domain::scoring::popularity;

use super::criteria::{SortBy, SortOrder};

/// A search hit with the popularity computed at query time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPost {
    #[serde(flatten)]
    pub post: PostRecord,
    pub popularity: f64,
}

impl RankedPost {
    pub fn new(post: PostRecord, now: OffsetDateTime, gravity: f64) -> Self {
        let popularity = popularity(post.engagement_score, post.created_at, now, gravity);
        Self { post, popularity }
    }
}

/// Ordering for `sort_by`/`sort_order`, with ascending id as the tie-break in
/// both directions so pages never overlap or skip rows.
pub fn compare_posts(
    a: &PostRecord,
    b: &PostRecord,
    sort_by: SortBy,
    sort_order: SortOrder,
    now: OffsetDateTime,
    gravity: f64,
) -> Ordering {
    let primary = match sort_by {
        SortBy::Date => a.created_at.cmp(&b.created_at),
        SortBy::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortBy::Popularity => {
            let left = popularity(a.engagement_score, a.created_at, now, gravity);
            let right = popularity(b.engagement_score, b.created_at, now, gravity);
            left.total_cmp(&right)
        }
    };
    let primary = match sort_order {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

/// Sort candidates in place. Popularity keys are computed once per post.
pub fn sort_posts(
    posts: &mut [PostRecord],
    sort_by: SortBy,
    sort_order: SortOrder,
    now: OffsetDateTime,
    gravity: f64,
) {
    if sort_by == SortBy::Popularity {
        let mut keyed: Vec<(f64, PostRecord)> = posts
            .iter()
            .map(|post| {
                (
                    popularity(post.engagement_score, post.created_at, now, gravity),
                    post.clone(),
                )
            })
            .collect();
        keyed.sort_by(|(left_key, left), (right_key, right)| {
            let primary = left_key.total_cmp(right_key);
            let primary = match sort_order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then_with(|| left.id.cmp(&right.id))
        });
        for (slot, (_, post)) in posts.iter_mut().zip(keyed) {
            *slot = post;
        }
        return;
    }
    posts.sort_by(|a, b| compare_posts(a, b, sort_by, sort_order, now, gravity));
}

#[cfg(test)]
mod tests {
    use time::Duration;
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;

    fn post(id: u128, title: &str, score: f64, created_at: OffsetDateTime) -> PostRecord {
        PostRecord {
            id: Uuid::from_u128(id),
            title: title.to_string(),
            body: String::new(),
            author_id: Uuid::nil(),
            tags: Vec::new(),
            views: 0,
            likes: 0,
            dislikes: 0,
            comment_count: 0,
            engagement_score: score,
            created_at,
            updated_at: created_at,
        }
    }

    fn ids(posts: &[PostRecord]) -> Vec<u128> {
        posts.iter().map(|post| post.id.as_u128()).collect()
    }

    #[test]
    fn equal_keys_break_ties_by_ascending_id_in_both_orders() {
        let at = datetime!(2024-01-01 0:00 UTC);
        let mut posts = vec![post(3, "a", 0.0, at), post(1, "a", 0.0, at), post(2, "a", 0.0, at)];
        for order in [SortOrder::Asc, SortOrder::Desc] {
            sort_posts(&mut posts, SortBy::Date, order, at, 1.8);
            assert_eq!(ids(&posts), vec![1, 2, 3]);
        }
    }

    #[test]
    fn title_sort_ignores_case() {
        let at = datetime!(2024-01-01 0:00 UTC);
        let mut posts = vec![post(1, "beta", 0.0, at), post(2, "Alpha", 0.0, at), post(3, "Gamma", 0.0, at)];
        sort_posts(&mut posts, SortBy::Title, SortOrder::Asc, at, 1.8);
        assert_eq!(ids(&posts), vec![2, 1, 3]);
    }

    #[test]
    fn popularity_prefers_recent_items_for_equal_scores() {
        let now = datetime!(2024-06-01 12:00 UTC);
        let mut posts = vec![
            post(1, "old", 40.0, now - Duration::hours(48)),
            post(2, "new", 40.0, now - Duration::hours(1)),
        ];
        sort_posts(&mut posts, SortBy::Popularity, SortOrder::Desc, now, 1.8);
        assert_eq!(ids(&posts), vec![2, 1]);
    }

    #[test]
    fn keyed_popularity_sort_agrees_with_comparator() {
        let now = datetime!(2024-06-01 12:00 UTC);
        let mut keyed = vec![
            post(1, "a", 12.0, now - Duration::hours(3)),
            post(2, "b", 30.0, now - Duration::hours(20)),
            post(3, "c", 12.0, now - Duration::hours(3)),
            post(4, "d", -4.0, now),
        ];
        let mut compared = keyed.clone();
        sort_posts(&mut keyed, SortBy::Popularity, SortOrder::Desc, now, 1.8);
        compared.sort_by(|a, b| compare_posts(a, b, SortBy::Popularity, SortOrder::Desc, now, 1.8));
        assert_eq!(ids(&keyed), ids(&compared));
    }
}
