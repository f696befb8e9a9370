//! Conversions from external infrastructure errors into domain errors.

use carelink_domain::CareLinkError;
use reqwest::Error as HttpError;
use tokio_tungstenite::tungstenite::Error as WsError;
use url::ParseError as UrlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CareLinkError);

impl From<InfraError> for CareLinkError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CareLinkError> for InfraError {
    fn from(value: CareLinkError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCareLinkError {
    fn into_carelink(self) -> CareLinkError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CareLinkError */
/* -------------------------------------------------------------------------- */

impl IntoCareLinkError for HttpError {
    fn into_carelink(self) -> CareLinkError {
        if self.is_timeout() {
            return CareLinkError::Network("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return CareLinkError::Network("HTTP connection failure".into());
        }

        if self.is_body() {
            return CareLinkError::Network(format!("Response body interrupted: {self}"));
        }

        if self.is_decode() {
            return CareLinkError::FetchFailed(format!("Malformed response body: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => CareLinkError::SessionExpired(message),
                429 | 500..=599 => CareLinkError::Network(message),
                _ => CareLinkError::FetchFailed(message),
            };
        }

        CareLinkError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_carelink())
    }
}

/* -------------------------------------------------------------------------- */
/* tungstenite::Error → CareLinkError */
/* -------------------------------------------------------------------------- */

impl IntoCareLinkError for WsError {
    fn into_carelink(self) -> CareLinkError {
        match self {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                CareLinkError::Network("persistent channel closed".into())
            }
            WsError::Io(err) => CareLinkError::Network(format!("persistent channel I/O: {err}")),
            WsError::Url(err) => CareLinkError::Config(format!("invalid channel URL: {err}")),
            WsError::Http(response) => {
                let status = response.status();
                let message = format!("channel handshake rejected with HTTP {}", status.as_u16());
                match status.as_u16() {
                    401 | 403 => CareLinkError::SessionExpired(message),
                    _ => CareLinkError::Network(message),
                }
            }
            other => CareLinkError::Network(format!("persistent channel error: {other}")),
        }
    }
}

impl From<WsError> for InfraError {
    fn from(value: WsError) -> Self {
        InfraError(value.into_carelink())
    }
}

/* -------------------------------------------------------------------------- */
/* url::ParseError → CareLinkError */
/* -------------------------------------------------------------------------- */

impl IntoCareLinkError for UrlError {
    fn into_carelink(self) -> CareLinkError {
        CareLinkError::Config(format!("invalid URL: {self}"))
    }
}

impl From<UrlError> for InfraError {
    fn from(value: UrlError) -> Self {
        InfraError(value.into_carelink())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn status_error(status: StatusCode) -> HttpError {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err()
    }

    #[tokio::test]
    async fn http_status_401_maps_to_session_expired() {
        let mapped: CareLinkError =
            InfraError::from(status_error(StatusCode::UNAUTHORIZED).await).into();
        match mapped {
            CareLinkError::SessionExpired(msg) => assert!(msg.contains("401")),
            other => panic!("expected session expired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn http_status_503_maps_to_network() {
        let mapped: CareLinkError =
            InfraError::from(status_error(StatusCode::SERVICE_UNAVAILABLE).await).into();
        assert!(matches!(mapped, CareLinkError::Network(_)));
    }

    #[tokio::test]
    async fn http_status_400_maps_to_fetch_failed() {
        let mapped: CareLinkError =
            InfraError::from(status_error(StatusCode::BAD_REQUEST).await).into();
        assert!(matches!(mapped, CareLinkError::FetchFailed(_)));
    }

    #[test]
    fn closed_channel_maps_to_network() {
        let mapped: CareLinkError = InfraError::from(WsError::ConnectionClosed).into();
        assert!(matches!(mapped, CareLinkError::Network(_)));
    }

    #[test]
    fn url_parse_error_maps_to_config() {
        let err = url::Url::parse("not a url").unwrap_err();
        let mapped: CareLinkError = InfraError::from(err).into();
        assert!(matches!(mapped, CareLinkError::Config(_)));
    }
}
