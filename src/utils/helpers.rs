use mongodb::bson::oid::ObjectId;

use crate::utils::error::CustomError;

/// Service name echoed in every response envelope
pub fn service_name() -> String {
    std::env::var("SERVICE_NAME").unwrap_or_else(|_| "Unknown".to_string())
}

/// Parse a hex id coming from a path or body, naming the field in the error
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, CustomError> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| CustomError::BadRequestError(format!("Invalid {} ID", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_ids_and_rejects_garbage() {
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex(), "post"), Ok(id));
        assert_eq!(
            parse_object_id("nope", "post"),
            Err(CustomError::BadRequestError("Invalid post ID".into()))
        );
    }
}
