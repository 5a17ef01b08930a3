use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::application::repos::{PostSearchQuery, RepoError};
use crate::application::search::{FilterExpr, SortBy, SortOrder};
use crate::domain::entities::PostRecord;
use crate::infra::db::map_sqlx_error;

use super::PostgresRepositories;
use super::types::{POST_COLUMNS, PostRow};

impl PostgresRepositories {
    pub(super) async fn select_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    pub(super) async fn select_post_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM posts ORDER BY created_at, id")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    pub(super) async fn count_matching(&self, query: &PostSearchQuery) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts WHERE ");
        push_filter(&mut qb, &query.filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    pub(super) async fn select_matching(
        &self,
        query: &PostSearchQuery,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts WHERE "));
        push_filter(&mut qb, &query.filter);
        self.push_order(&mut qb, query);

        qb.push(" LIMIT ");
        qb.push_bind(i64::from(query.page.limit()));
        qb.push(" OFFSET ");
        qb.push_bind(query.page.offset() as i64);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    /// Popularity is computed in the sort expression from the bound `now`, so
    /// it matches the in-process ranking for the same inputs.
    fn push_order(&self, qb: &mut QueryBuilder<'_, Postgres>, query: &PostSearchQuery) {
        let direction = match query.sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        qb.push(" ORDER BY ");
        match query.sort_by {
            SortBy::Date => {
                qb.push("created_at ");
            }
            SortBy::Title => {
                qb.push("LOWER(title) COLLATE \"C\" ");
            }
            SortBy::Popularity => {
                qb.push("engagement_score / power(GREATEST(EXTRACT(EPOCH FROM (");
                qb.push_bind(query.now);
                qb.push(" - created_at))::float8 / 3600.0, 0) + 2.0, ");
                qb.push_bind(self.scoring().gravity);
                qb.push(") ");
            }
        }
        qb.push(direction);
        qb.push(", id ASC");
    }
}

/// Render `filter` as a SQL boolean expression over `posts`.
pub(super) fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &FilterExpr) {
    match filter {
        FilterExpr::True => {
            qb.push("TRUE");
        }
        FilterExpr::TitleContains(needle) => {
            qb.push("title ILIKE ");
            qb.push_bind(format!("%{}%", escape_like(needle)));
        }
        FilterExpr::AuthorIn(ids) if ids.is_empty() => {
            qb.push("FALSE");
        }
        FilterExpr::AuthorIn(ids) => {
            qb.push("author_id = ANY(");
            qb.push_bind(ids.clone());
            qb.push(")");
        }
        FilterExpr::HasAllTags(tags) => {
            qb.push("tags @> ");
            qb.push_bind(tags.clone());
        }
        FilterExpr::HasAnyTag(tags) => {
            qb.push("tags && ");
            qb.push_bind(tags.clone());
        }
        FilterExpr::CreatedBetween { from, to } => {
            qb.push("(TRUE");
            if let Some(from) = from {
                qb.push(" AND created_at >= ");
                qb.push_bind(*from);
            }
            if let Some(to) = to {
                qb.push(" AND created_at <= ");
                qb.push_bind(*to);
            }
            qb.push(")");
        }
        FilterExpr::And(parts) => push_junction(qb, parts, " AND ", "TRUE"),
        FilterExpr::Or(parts) => push_junction(qb, parts, " OR ", "FALSE"),
    }
}

fn push_junction(
    qb: &mut QueryBuilder<'_, Postgres>,
    parts: &[FilterExpr],
    separator: &str,
    empty: &str,
) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            qb.push(separator);
        }
        push_filter(qb, part);
    }
    qb.push(")");
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn render(filter: &FilterExpr) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("");
        push_filter(&mut qb, filter);
        qb.sql().to_string()
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn nested_expressions_are_parenthesised() {
        let filter = FilterExpr::Or(vec![
            FilterExpr::And(vec![
                FilterExpr::TitleContains("rust".into()),
                FilterExpr::AuthorIn(vec![Uuid::nil()]),
            ]),
            FilterExpr::HasAnyTag(vec!["go".into()]),
        ]);
        assert_eq!(
            render(&filter),
            "((title ILIKE $1 AND author_id = ANY($2)) OR tags && $3)"
        );
    }

    #[test]
    fn empty_author_sets_match_nothing() {
        assert_eq!(render(&FilterExpr::AuthorIn(Vec::new())), "FALSE");
        assert_eq!(render(&FilterExpr::Or(Vec::new())), "FALSE");
        assert_eq!(render(&FilterExpr::And(Vec::new())), "TRUE");
    }

    #[test]
    fn open_date_bounds_are_omitted() {
        let filter = FilterExpr::CreatedBetween {
            from: Some(datetime!(2024-01-01 0:00 UTC)),
            to: None,
        };
        assert_eq!(render(&filter), "(TRUE AND created_at >= $1)");
    }
}
