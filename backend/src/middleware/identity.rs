use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::error::AppError;

/// Header the upstream auth gateway sets once it has verified the caller.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The caller of a request, as forwarded by the auth gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

impl AuthenticatedUser {
    pub fn from_request_headers(req: &HttpRequest) -> Result<Self, AppError> {
        let raw = req
            .headers()
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Authentication("Missing user identity".to_string()))?;

        let user_id = raw
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| AppError::Authentication("Invalid user identity".to_string()))?;

        Ok(Self { user_id })
    }
}

/// Use as a handler parameter to require a caller
impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(AuthenticatedUser::from_request_headers(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn reads_forwarded_user_id() {
        let user_id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, user_id.to_string()))
            .to_http_request();

        assert_eq!(
            AuthenticatedUser::from_request_headers(&req).unwrap().user_id,
            user_id
        );
    }

    #[test]
    fn missing_or_malformed_header_is_unauthenticated() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            AuthenticatedUser::from_request_headers(&req),
            Err(AppError::Authentication(_))
        ));

        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "not-a-uuid"))
            .to_http_request();
        assert!(matches!(
            AuthenticatedUser::from_request_headers(&req),
            Err(AppError::Authentication(_))
        ));
    }
}
