use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// Convert validator output into a single readable validation error
pub fn validation_errors_to_app_error(errors: ValidationErrors) -> AppError {
    let mut error_messages = Vec::new();

    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let message = match error.code.as_ref() {
                "length" => "Invalid length",
                "range" => "Value out of range",
                "required" => "Field is required",
                _ => "Invalid value",
            };
            error_messages.push(format!("{}: {}", field, message));
        }
    }

    error_messages.sort();

    if error_messages.is_empty() {
        AppError::Validation("Invalid request".to_string())
    } else {
        AppError::Validation(error_messages.join(", "))
    }
}

/// Validate a request body, mapping failures to `AppError::Validation`
pub fn validate_request<T: Validate>(request: &T) -> Result<(), AppError> {
    request.validate().map_err(validation_errors_to_app_error)
}

/// Validate every element of a nested list
pub fn validate_all<T: Validate>(items: &[T]) -> Result<(), AppError> {
    items.iter().try_for_each(validate_request)
}
