//! Maps AppError onto the shared wire envelope

use crate::error::AppError;
use actix_web::HttpResponse;
use error_types::{error_codes, ErrorResponse};

fn code_for(err: &AppError) -> &'static str {
    match err {
        AppError::Unauthorized => error_codes::TOKEN_MISSING,
        AppError::Forbidden => "FORBIDDEN",
        AppError::NotFound => "NOT_FOUND",
        AppError::BadRequest(_) => "BAD_REQUEST",
        AppError::AlreadyDeleted => error_codes::MESSAGE_DELETED,
        AppError::Database(_) => error_codes::DATABASE_ERROR,
        AppError::Cache(_) => error_codes::CACHE_ERROR,
        AppError::ServiceUnavailable(_) => error_codes::SERVICE_UNAVAILABLE,
        AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
            error_codes::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_type_for(status: u16) -> &'static str {
    match status {
        400 => "BadRequestError",
        401 => "UnauthorizedError",
        403 => "ForbiddenError",
        404 => "NotFoundError",
        410 => "GoneError",
        503 => "ServiceUnavailableError",
        _ => "InternalError",
    }
}

pub fn into_response(err: AppError) -> HttpResponse {
    let status = err.status_code();

    // Internal detail stays in the logs; clients get the generic message.
    if status >= 500 {
        tracing::error!(error = %err, "request failed");
    }

    let message = if status >= 500 {
        "internal server error".to_string()
    } else {
        err.to_string()
    };

    let error_type = error_type_for(status);
    let body = ErrorResponse::new(error_type, &message, status, error_type, code_for(&err));

    HttpResponse::build(
        actix_web::http::StatusCode::from_u16(status)
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
    )
    .json(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_and_forbidden_render_distinctly() {
        let not_found = into_response(AppError::NotFound);
        let forbidden = into_response(AppError::Forbidden);

        assert_eq!(not_found.status().as_u16(), 404);
        assert_eq!(forbidden.status().as_u16(), 403);
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let resp = into_response(AppError::Database("password=hunter2 connect failed".into()));
        assert_eq!(resp.status().as_u16(), 500);
    }
}
