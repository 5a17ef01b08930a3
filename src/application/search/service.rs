use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{AuthorResolver, PostSearchQuery, PostsRepo};
use crate::domain::scoring::ScoringConfig;

use super::criteria::{PageLimits, SearchCriteria, SearchRequest};
use super::filter::build_filter;
use super::ranking::RankedPost;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub items: Vec<RankedPost>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Executes filtered, sorted, paginated post searches. Results carry a
/// popularity value computed for this request and are never cached.
#[derive(Clone)]
pub struct SearchService {
    posts: Arc<dyn PostsRepo>,
    authors: Arc<dyn AuthorResolver>,
    limits: PageLimits,
    scoring: ScoringConfig,
}

impl SearchService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        authors: Arc<dyn AuthorResolver>,
        limits: PageLimits,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            posts,
            authors,
            limits,
            scoring,
        }
    }

    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResults, AppError> {
        self.search_at(request, OffsetDateTime::now_utc()).await
    }

    /// Search with an explicit reference instant for popularity decay.
    pub async fn search_at(
        &self,
        request: &SearchRequest,
        now: OffsetDateTime,
    ) -> Result<SearchResults, AppError> {
        let criteria = SearchCriteria::from_request(request, &self.limits)?;
        let resolved = self.resolve_authors(&criteria).await?;
        let filter = build_filter(&criteria, &resolved);

        let query = PostSearchQuery {
            filter,
            sort_by: criteria.sort_by,
            sort_order: criteria.sort_order,
            page: criteria.page,
            now,
        };
        let page = self.posts.search_posts(&query).await?;

        debug!(
            sort_by = %criteria.sort_by,
            sort_order = %criteria.sort_order,
            page = criteria.page.page(),
            limit = criteria.page.limit(),
            total = page.total,
            "Search executed"
        );

        let gravity = self.scoring.gravity;
        Ok(SearchResults {
            items: page
                .items
                .into_iter()
                .map(|post| RankedPost::new(post, now, gravity))
                .collect(),
            total: page.total,
            page: criteria.page.page(),
            limit: criteria.page.limit(),
        })
    }

    async fn resolve_authors(&self, criteria: &SearchCriteria) -> Result<Vec<Uuid>, AppError> {
        match criteria.author_name.as_deref() {
            Some(name) => Ok(self.authors.resolve_author_ids(name).await?),
            None => Ok(Vec::new()),
        }
    }
}
