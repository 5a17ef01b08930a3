//! Caller-facing search input and its validated form.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{
    Date, Duration, OffsetDateTime, Time, format_description::well_known::Rfc3339,
    macros::format_description,
};
use uuid::Uuid;

use crate::application::repos::PageRequest;
use crate::domain::error::DomainError;

const DEFAULT_PAGE_LIMIT: u32 = 10;
const MAX_PAGE_LIMIT: u32 = 100;

/// How the tags of one query combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagLogic {
    /// Item must carry every listed tag.
    And,
    /// Item must carry at least one listed tag.
    #[default]
    Or,
}

/// How the identity criteria (title, author) and content criteria (tags,
/// date range) combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalLogic {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Date,
    Title,
    Popularity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

macro_rules! keyword_enum {
    ($ty:ident, $label:literal, { $($text:literal => $variant:ident),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DomainError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(DomainError::validation(format!(
                        concat!("unknown ", $label, " `{}`"),
                        other
                    ))),
                }
            }
        }
    };
}

keyword_enum!(TagLogic, "tagLogic", { "and" => And, "or" => Or });
keyword_enum!(GlobalLogic, "globalLogic", { "and" => And, "or" => Or });
keyword_enum!(SortBy, "sortBy", { "date" => Date, "title" => Title, "popularity" => Popularity });
keyword_enum!(SortOrder, "sortOrder", { "asc" => Asc, "desc" => Desc });

/// Page size bounds applied to every paginated read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_LIMIT,
            max_limit: MAX_PAGE_LIMIT,
        }
    }
}

impl PageLimits {
    /// Validate raw paging input. Missing values fall back to page 1 and the
    /// default limit; limits above the maximum are capped, not rejected.
    pub fn page_request(
        &self,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<PageRequest, DomainError> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(DomainError::validation("page must be at least 1"));
        }
        let limit = limit.unwrap_or(i64::from(self.default_limit));
        if limit < 1 {
            return Err(DomainError::validation("limit must be at least 1"));
        }
        let page = u32::try_from(page)
            .map_err(|_| DomainError::validation("page exceeds supported range"))?;
        let limit = u32::try_from(limit.min(i64::from(self.max_limit))).unwrap_or(self.max_limit);
        PageRequest::new(page, limit)
    }
}

/// Raw search input as supplied by a caller. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub author_ids: Vec<Uuid>,
    pub tags: Vec<String>,
    pub tag_logic: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub global_logic: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Search input after validation and normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub author_ids: Vec<Uuid>,
    pub tags: Vec<String>,
    pub tag_logic: TagLogic,
    pub created_from: Option<OffsetDateTime>,
    pub created_to: Option<OffsetDateTime>,
    pub global_logic: GlobalLogic,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub page: PageRequest,
}

impl SearchCriteria {
    pub fn from_request(request: &SearchRequest, limits: &PageLimits) -> Result<Self, DomainError> {
        let tag_logic = parse_keyword(request.tag_logic.as_deref())?;
        let global_logic = parse_keyword(request.global_logic.as_deref())?;
        let sort_by = parse_keyword(request.sort_by.as_deref())?;
        let sort_order = parse_keyword(request.sort_order.as_deref())?;

        let created_from = request
            .start_date
            .as_deref()
            .and_then(non_blank)
            .map(|value| parse_date_bound(value, DateBound::Start))
            .transpose()?;
        let created_to = request
            .end_date
            .as_deref()
            .and_then(non_blank)
            .map(|value| parse_date_bound(value, DateBound::End))
            .transpose()?;
        if matches!((created_from, created_to), (Some(from), Some(to)) if from > to) {
            return Err(DomainError::validation(
                "startDate must not be after endDate",
            ));
        }

        let mut tags: Vec<String> = Vec::with_capacity(request.tags.len());
        for tag in request.tags.iter().filter_map(|tag| non_blank(tag)) {
            let tag = tag.to_lowercase();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let mut author_ids = request.author_ids.clone();
        author_ids.sort_unstable();
        author_ids.dedup();

        Ok(Self {
            title: request.title.as_deref().and_then(non_blank).map(str::to_string),
            author_name: request
                .author_name
                .as_deref()
                .and_then(non_blank)
                .map(str::to_string),
            author_ids,
            tags,
            tag_logic,
            created_from,
            created_to,
            global_logic,
            sort_by,
            sort_order,
            page: limits.page_request(request.page, request.limit)?,
        })
    }

    /// True when an author criterion was supplied, by name or by id.
    pub fn has_author_filter(&self) -> bool {
        self.author_name.is_some() || !self.author_ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Start,
    End,
}

/// Accepts `YYYY-MM-DD` or RFC 3339. A date-only start covers the whole day
/// from midnight UTC; a date-only end covers it up to its last instant.
pub fn parse_date_bound(value: &str, bound: DateBound) -> Result<OffsetDateTime, DomainError> {
    let value = value.trim();
    if let Ok(instant) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(instant);
    }
    let date = Date::parse(value, format_description!("[year]-[month]-[day]")).map_err(|_| {
        DomainError::validation(format!(
            "invalid date `{value}`: expected YYYY-MM-DD or RFC 3339"
        ))
    })?;
    let start = date.with_time(Time::MIDNIGHT).assume_utc();
    Ok(match bound {
        DateBound::Start => start,
        DateBound::End => start + Duration::days(1) - Duration::nanoseconds(1),
    })
}

fn parse_keyword<T>(value: Option<&str>) -> Result<T, DomainError>
where
    T: FromStr<Err = DomainError> + Default,
{
    match value.and_then(non_blank) {
        Some(value) => value.parse(),
        None => Ok(T::default()),
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn limits() -> PageLimits {
        PageLimits::default()
    }

    #[test]
    fn defaults_apply_when_fields_are_missing() {
        let criteria =
            SearchCriteria::from_request(&SearchRequest::default(), &limits()).expect("valid");
        assert_eq!(criteria.tag_logic, TagLogic::Or);
        assert_eq!(criteria.global_logic, GlobalLogic::And);
        assert_eq!(criteria.sort_by, SortBy::Date);
        assert_eq!(criteria.sort_order, SortOrder::Desc);
        assert_eq!(criteria.page.page(), 1);
        assert_eq!(criteria.page.limit(), DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn limit_is_capped_at_maximum() {
        let request = SearchRequest {
            limit: Some(5_000),
            ..Default::default()
        };
        let criteria = SearchCriteria::from_request(&request, &limits()).expect("valid");
        assert_eq!(criteria.page.limit(), MAX_PAGE_LIMIT);
    }

    #[test]
    fn rejects_non_positive_paging() {
        for (page, limit) in [(Some(0), None), (Some(-3), None), (None, Some(0))] {
            let request = SearchRequest {
                page,
                limit,
                ..Default::default()
            };
            assert!(SearchCriteria::from_request(&request, &limits()).is_err());
        }
    }

    #[test]
    fn rejects_unknown_keywords() {
        let request = SearchRequest {
            sort_by: Some("relevance".into()),
            ..Default::default()
        };
        let err = SearchCriteria::from_request(&request, &limits()).unwrap_err();
        assert!(err.to_string().contains("sortBy"));
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let request = SearchRequest {
            tag_logic: Some("AND".into()),
            global_logic: Some("Or".into()),
            sort_order: Some("ASC".into()),
            ..Default::default()
        };
        let criteria = SearchCriteria::from_request(&request, &limits()).expect("valid");
        assert_eq!(criteria.tag_logic, TagLogic::And);
        assert_eq!(criteria.global_logic, GlobalLogic::Or);
        assert_eq!(criteria.sort_order, SortOrder::Asc);
    }

    #[test]
    fn date_only_bounds_cover_whole_days() {
        let start = parse_date_bound("2024-03-01", DateBound::Start).expect("valid");
        let end = parse_date_bound("2024-03-01", DateBound::End).expect("valid");
        assert_eq!(start, datetime!(2024-03-01 00:00 UTC));
        assert!(end > datetime!(2024-03-01 23:59:59.999 UTC));
        assert!(end < datetime!(2024-03-02 00:00 UTC));
    }

    #[test]
    fn rfc3339_bounds_are_used_verbatim() {
        let value = parse_date_bound("2024-03-01T10:30:00+02:00", DateBound::End).expect("valid");
        assert_eq!(value, datetime!(2024-03-01 08:30 UTC));
    }

    #[test]
    fn malformed_dates_are_validation_errors() {
        let request = SearchRequest {
            start_date: Some("01/03/2024".into()),
            ..Default::default()
        };
        let err = SearchCriteria::from_request(&request, &limits()).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let request = SearchRequest {
            start_date: Some("2024-04-02".into()),
            end_date: Some("2024-04-01".into()),
            ..Default::default()
        };
        assert!(SearchCriteria::from_request(&request, &limits()).is_err());
    }

    #[test]
    fn blank_strings_and_duplicate_tags_are_dropped() {
        let request = SearchRequest {
            title: Some("   ".into()),
            tags: vec!["go".into(), " ".into(), "go".into(), "rust".into()],
            ..Default::default()
        };
        let criteria = SearchCriteria::from_request(&request, &limits()).expect("valid");
        assert_eq!(criteria.title, None);
        assert_eq!(criteria.tags, vec!["go".to_string(), "rust".to_string()]);
    }
}
