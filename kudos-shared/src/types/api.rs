use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ClientError;

/// Status reported when a request never produced an HTTP response.
pub const TRANSPORT_FAILURE_STATUS: u16 = 500;

/// Uniform result of every backend call: `{success, status, data|error}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(
        default,
        alias = "message",
        deserialize_with = "error_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
    /// Set when no response was received at all.
    #[serde(skip)]
    pub transport: bool,
}

/// Error bodies come either as a bare string or as `{code, message, details}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireError {
    Text(String),
    Detail {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

fn error_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<WireError>::deserialize(deserializer)? {
        Some(WireError::Text(text)) => Some(text),
        Some(WireError::Detail { code, message }) => message.or(code),
        None => None,
    })
}

impl<T> ApiEnvelope<T> {
    pub fn ok(status: u16, data: T) -> Self {
        Self {
            success: true,
            status,
            data: Some(data),
            error: None,
            transport: false,
        }
    }

    pub fn failure(status: u16, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status,
            data: None,
            error: Some(error.into()),
            transport: false,
        }
    }

    pub fn transport_failure(error: impl Into<String>) -> Self {
        Self {
            transport: true,
            ..Self::failure(TRANSPORT_FAILURE_STATUS, error)
        }
    }

    /// Override the status carried in the body with the one observed on the wire.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "request failed".to_string())
    }

    fn to_error(&self) -> ClientError {
        if self.transport {
            ClientError::Transport {
                status: self.status,
                message: self.error_message(),
            }
        } else {
            ClientError::Backend {
                status: self.status,
                message: self.error_message(),
            }
        }
    }

    pub fn into_result(self) -> Result<T, ClientError> {
        if !self.success {
            return Err(self.to_error());
        }
        self.data
            .ok_or_else(|| ClientError::Decode("response is missing `data`".to_string()))
    }

    /// For calls whose payload is irrelevant: only the success flag counts.
    pub fn into_unit_result(self) -> Result<(), ClientError> {
        if self.success {
            Ok(())
        } else {
            Err(self.to_error())
        }
    }
}

/// Payload of endpoints that wrap their data in a second `{success, data}` layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<InnerEnvelope<T>> {
    /// Collapse both layers; succeeds only when both success flags are set.
    pub fn flatten(self) -> ApiEnvelope<T> {
        let status = self.status;
        if !self.success {
            return ApiEnvelope {
                success: false,
                status,
                data: None,
                error: self.error,
                transport: self.transport,
            };
        }

        match self.data {
            Some(InnerEnvelope {
                success: true,
                data: Some(data),
                ..
            }) => ApiEnvelope::ok(status, data),
            Some(inner) => ApiEnvelope::failure(
                status,
                inner
                    .message
                    .unwrap_or_else(|| "request rejected by upstream service".to_string()),
            ),
            None => ApiEnvelope::failure(status, "response is missing `data`"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_backend_shape() {
        let env: ApiEnvelope<Vec<u32>> =
            serde_json::from_str(r#"{"success":true,"status":200,"data":[1,2]}"#).unwrap();
        assert_eq!(env.into_result().unwrap(), vec![1, 2]);
    }

    #[test]
    fn failure_without_message_gets_generic_error() {
        let env: ApiEnvelope<Vec<u32>> =
            serde_json::from_str(r#"{"success":false,"status":403}"#).unwrap();
        let err = env.into_result().unwrap_err();
        assert_eq!(
            err,
            ClientError::Backend {
                status: 403,
                message: "request failed".into()
            }
        );
    }

    #[test]
    fn structured_error_body_yields_its_message() {
        let env: ApiEnvelope<Vec<u32>> = serde_json::from_str(
            r#"{"success":false,"status":404,"error":{"code":"E0003","message":"resource not found"}}"#,
        )
        .unwrap();
        assert_eq!(
            env.into_result().unwrap_err(),
            ClientError::Backend {
                status: 404,
                message: "resource not found".into()
            }
        );

        let code_only: ApiEnvelope<Vec<u32>> =
            serde_json::from_str(r#"{"success":false,"status":500,"error":{"code":"E0001"}}"#)
                .unwrap();
        assert_eq!(code_only.error.as_deref(), Some("E0001"));

        let plain: ApiEnvelope<Vec<u32>> =
            serde_json::from_str(r#"{"success":false,"status":400,"message":"bad id"}"#).unwrap();
        assert_eq!(plain.error.as_deref(), Some("bad id"));
    }

    #[test]
    fn transport_failure_defaults_to_500() {
        let env: ApiEnvelope<()> = ApiEnvelope::transport_failure("connection refused");
        assert_eq!(env.status, 500);
        let err = env.into_unit_result().unwrap_err();
        assert!(matches!(err, ClientError::Transport { status: 500, .. }));
        assert_eq!(err.message(), "connection refused");
    }

    #[test]
    fn success_with_null_data_is_a_decode_error_but_unit_ok() {
        let env: ApiEnvelope<serde_json::Value> =
            serde_json::from_str(r#"{"success":true,"status":200,"data":null}"#).unwrap();
        assert!(env.clone().into_unit_result().is_ok());
        assert!(matches!(env.into_result(), Err(ClientError::Decode(_))));
    }

    #[test]
    fn nested_envelope_requires_both_flags() {
        let ok: ApiEnvelope<InnerEnvelope<Vec<u8>>> =
            serde_json::from_str(r#"{"success":true,"data":{"success":true,"data":[7]}}"#)
                .unwrap();
        assert_eq!(ok.flatten().into_result().unwrap(), vec![7]);

        let inner_failed: ApiEnvelope<InnerEnvelope<Vec<u8>>> = serde_json::from_str(
            r#"{"success":true,"data":{"success":false,"message":"upstream down"}}"#,
        )
        .unwrap();
        let flat = inner_failed.flatten();
        assert!(!flat.success);
        assert_eq!(flat.error.as_deref(), Some("upstream down"));

        let outer_failed: ApiEnvelope<InnerEnvelope<Vec<u8>>> =
            serde_json::from_str(r#"{"success":false,"status":502,"error":"bad gateway"}"#)
                .unwrap();
        let flat = outer_failed.flatten();
        assert!(!flat.success);
        assert_eq!(flat.status, 502);
    }
}
