//! HTTP route modules, one per API prefix.

pub mod bank;
pub mod knowledge;
pub mod question_gen;
pub mod quiz;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult};

const DEFAULT_PAGE_SIZE: i64 = 10;

/// `Json` body whose rejection is an [`ApiError`]
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query` string whose rejection is an [`ApiError`]
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// `page` / `page_size` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl Pagination {
    /// 1-based page and page size, validated against an optional size cap.
    pub fn bounds(&self, max_page_size: Option<i64>) -> ApiResult<(usize, usize)> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 1 {
            return Err(ApiError::BadRequest("page must be at least 1".to_string()));
        }
        if page_size < 1 {
            return Err(ApiError::BadRequest(
                "page_size must be at least 1".to_string(),
            ));
        }
        if let Some(max) = max_page_size {
            if page_size > max {
                return Err(ApiError::BadRequest(format!(
                    "page_size must be at most {max}"
                )));
            }
        }
        Ok((page as usize, page_size as usize))
    }
}

/// Treat blank query values as absent.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pagination(page: Option<i64>, page_size: Option<i64>) -> Pagination {
        Pagination { page, page_size }
    }

    #[test]
    fn test_pagination_defaults_and_limits() {
        assert_eq!(pagination(None, None).bounds(None).unwrap(), (1, 10));
        assert_eq!(pagination(Some(3), Some(50)).bounds(None).unwrap(), (3, 50));
        assert!(pagination(Some(0), None).bounds(None).is_err());
        assert!(pagination(None, Some(0)).bounds(None).is_err());
        assert!(pagination(None, Some(10_001)).bounds(Some(10_000)).is_err());
        assert_eq!(
            pagination(None, Some(10_000)).bounds(Some(10_000)).unwrap(),
            (1, 10_000)
        );
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(&Some(" b1 ".to_string())), Some("b1"));
        assert_eq!(non_blank(&Some("  ".to_string())), None);
        assert_eq!(non_blank(&None), None);
    }
}
