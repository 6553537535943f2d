use serde::de::DeserializeOwned;

use crate::{wire::ErrorEnvelope, ApiError, HttpResponse, LedgerError, Result};

/// Required-field checks run on decoded entities when response validation
/// is enabled.
pub trait Validate {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<()> {
        for (index, item) in self.iter().enumerate() {
            item.validate().map_err(|err| match err {
                LedgerError::InvalidData(message) => {
                    LedgerError::InvalidData(format!("item {index}: {message}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> Result<()> {
        self.as_ref().map_or(Ok(()), Validate::validate)
    }
}

impl Validate for serde_json::Value {}

/// Returns the value of a required field or an `InvalidData` error naming
/// `entity` and `field`.
pub fn require<'a, V>(entity: &str, field: &str, value: &'a Option<V>) -> Result<&'a V> {
    value.as_ref().ok_or_else(|| {
        LedgerError::InvalidData(format!("{entity} is missing required field `{field}`"))
    })
}

/// Decodes a JSON body into `T`, or the API error for a non-success status.
/// The response is consumed either way.
pub(crate) fn decode_json<T>(response: HttpResponse, validate: bool) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let (status, _, body) = response.into_parts();
    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body).into());
    }

    let value = serde_json::from_slice::<T>(&body).map_err(|err| {
        LedgerError::InvalidData(format!(
            "expected {}: {err}",
            std::any::type_name::<T>()
        ))
    })?;
    if validate {
        value.validate()?;
    }
    Ok(value)
}

/// Checks the status of a response whose body carries nothing of interest.
pub(crate) fn decode_empty(response: HttpResponse) -> Result<()> {
    let (status, _, body) = response.into_parts();
    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body).into());
    }
    Ok(())
}

pub(crate) fn api_error(status: u16, body: &[u8]) -> ApiError {
    let text = String::from_utf8_lossy(body).into_owned();
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => ApiError {
            status,
            code: envelope.errors.code,
            message: envelope.errors.message,
            parameter: envelope.errors.parameter,
            body: text,
        },
        Err(_) => ApiError {
            status,
            code: None,
            message: None,
            parameter: None,
            body: text,
        },
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{header::HeaderMap, StatusCode};
    use serde::Deserialize;
    use serde_json::json;

    use super::{decode_empty, decode_json, require, Validate};
    use crate::{ApiErrorKind, HttpResponse, LedgerError, Result};

    #[derive(Debug, Deserialize)]
    struct Account {
        id: Option<String>,
        name: String,
    }

    impl Validate for Account {
        fn validate(&self) -> Result<()> {
            require("Account", "id", &self.id)?;
            Ok(())
        }
    }

    fn response(status: u16, body: serde_json::Value) -> HttpResponse {
        HttpResponse::new(
            StatusCode::from_u16(status).expect("valid status"),
            HeaderMap::new(),
            body.to_string(),
        )
    }

    #[test]
    fn decodes_success_body() {
        let account: Account = decode_json(response(200, json!({"id": "acc_1", "name": "Ops"})), true)
            .expect("must decode");
        assert_eq!(account.id.as_deref(), Some("acc_1"));
        assert_eq!(account.name, "Ops");
    }

    #[test]
    fn wrong_shape_is_invalid_data_naming_the_field() {
        let err = decode_json::<Account>(response(200, json!({"id": "acc_1"})), true)
            .expect_err("must fail");
        match err {
            LedgerError::InvalidData(message) => {
                assert!(message.contains("Account"), "{message}");
                assert!(message.contains("name"), "{message}");
            }
            other => panic!("expected invalid data, got {other:?}"),
        }
    }

    #[test]
    fn validation_failure_names_the_entity() {
        let err = decode_json::<Account>(response(200, json!({"name": "Ops"})), true)
            .expect_err("must fail validation");
        match err {
            LedgerError::InvalidData(message) => {
                assert_eq!(message, "Account is missing required field `id`");
            }
            other => panic!("expected invalid data, got {other:?}"),
        }
    }

    #[test]
    fn validation_can_be_skipped() {
        let account: Account = decode_json(response(200, json!({"name": "Ops"})), false)
            .expect("must decode without validation");
        assert!(account.id.is_none());
    }

    #[test]
    fn list_validation_reports_offending_item() {
        let body = json!([
            {"id": "acc_1", "name": "Ops"},
            {"name": "Payroll"}
        ]);
        let err = decode_json::<Vec<Account>>(response(200, body), true).expect_err("must fail");
        match err {
            LedgerError::InvalidData(message) => assert!(message.starts_with("item 1:"), "{message}"),
            other => panic!("expected invalid data, got {other:?}"),
        }
    }

    #[test]
    fn error_envelope_becomes_api_error() {
        let body = json!({
            "errors": {
                "code": "parameter_invalid",
                "message": "amount must be positive",
                "parameter": "amount"
            }
        });
        let err = decode_json::<Account>(response(422, body), true).expect_err("must fail");
        let api = err.as_api().expect("must be api error");

        assert_eq!(api.status, 422);
        assert_eq!(api.kind(), ApiErrorKind::UnprocessableEntity);
        assert_eq!(api.code.as_deref(), Some("parameter_invalid"));
        assert_eq!(api.message.as_deref(), Some("amount must be positive"));
        assert_eq!(api.parameter.as_deref(), Some("amount"));
    }

    #[test]
    fn unparseable_error_body_keeps_raw_text() {
        let response = HttpResponse::new(
            StatusCode::BAD_GATEWAY,
            HeaderMap::new(),
            "<html>upstream down</html>",
        );
        let err = decode_empty(response).expect_err("must fail");
        let api = err.as_api().expect("must be api error");

        assert_eq!(api.status, 502);
        assert!(api.code.is_none());
        assert_eq!(api.body, "<html>upstream down</html>");
    }

    #[test]
    fn empty_success_body_is_accepted() {
        let response = HttpResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), "");
        decode_empty(response).expect("must accept");
    }
}
