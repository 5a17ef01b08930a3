//! Ranking and search: criteria validation, predicate building, ordering.

mod criteria;
mod filter;
mod ranking;
mod service;

pub use criteria::{
    DateBound, GlobalLogic, PageLimits, SearchCriteria, SearchRequest, SortBy, SortOrder,
    TagLogic, parse_date_bound,
};
pub use filter::{FilterExpr, build_filter};
pub use ranking::{RankedPost, compare_posts, sort_posts};
pub use service::{SearchResults, SearchService};
