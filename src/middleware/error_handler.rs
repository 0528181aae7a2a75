use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpResponse, Result, dev::ServiceResponse};
use serde_json::json;

use crate::utils::error::CustomError;
use crate::utils::helpers::service_name;

/// Wrap any error response that is not already an envelope
pub fn handle_error<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    if is_envelope(&res) {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }

    let status_code = res.response().status();
    let error_message = res
        .response()
        .error()
        .map(|e| e.to_string())
        .unwrap_or_else(|| {
            status_code
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    let new_response = HttpResponse::build(status_code).json(json!({
        "success": false,
        "message": error_message,
        "httpStatusCode": status_code.as_u16(),
        "error": error_kind(status_code.canonical_reason()),
        "service": service_name(),
    }));

    let (req, _) = res.into_parts();
    let res = ServiceResponse::new(req, new_response.map_into_right_body());

    Ok(ErrorHandlerResponse::Response(res))
}

/// Responses built from `CustomError` already carry the envelope
pub(crate) fn is_envelope<B>(res: &ServiceResponse<B>) -> bool {
    res.response()
        .error()
        .and_then(|e| e.as_error::<CustomError>())
        .is_some()
}

/// "Bad Request" -> "BAD_REQUEST_ERROR"
fn error_kind(reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!("{}_ERROR", reason.to_uppercase().replace(' ', "_")),
        None => "UNKNOWN_ERROR".to_string(),
    }
}
