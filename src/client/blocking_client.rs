use std::time::Instant;

use reqwest::{self, Method};
use tracing::{error, instrument};

use super::utils::reqwest_to_scan_error;
use super::{HttpClient, Transport};
use crate::error::FeroxScanError;
use crate::requests::{raw, HttpService};
use crate::responses::AttackResponse;
use crate::std_ext::convert::AsInner;

/// concrete implementation of [`Transport`] using an underlying [`reqwest::blocking::Client`]
///
/// # Warning
///
/// [`reqwest`] rebuilds requests from structured parts, which imposes two
/// limits on byte-exact replay: an absolute-form request line is collapsed back
/// to origin-form on the wire, and any captured `Content-Length` header is
/// dropped in favor of the recomputed one. Hosts that need full request-line
/// control should bring their own [`Transport`].
///
/// # Examples
///
/// ```
/// # use feroxscan::client::{BlockingClient, HttpClient, Transport};
/// # use feroxscan::requests::{HttpService, Scheme};
/// use httpmock::prelude::*;
/// # fn main() -> Result<(), feroxscan::error::FeroxScanError> {
/// let server = MockServer::start();
/// let mocked = server.mock(|when, then| {
///     when.method(GET)
///         .path("/doctest");
///     then.status(200);
/// });
///
/// let service = HttpService::new(server.host(), server.port(), Scheme::Http);
/// let request = format!("GET /doctest HTTP/1.1\r\nHost: {}\r\n\r\n", server.address());
///
/// // bring your own client
/// let req_client = reqwest::blocking::Client::builder().build().unwrap();
///
/// let client = BlockingClient::with_client(req_client);
///
/// let response = client.send(&service, request.as_bytes())?;
///
/// assert_eq!(mocked.hits(), 1);
/// assert!(!response.is_absent());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default, Debug)]
pub struct BlockingClient {
    client: reqwest::blocking::Client,
}

impl HttpClient for BlockingClient {
    type ClientType = reqwest::blocking::Client;

    fn with_client(client: Self::ClientType) -> Self {
        Self { client }
    }
}

impl Transport for BlockingClient {
    /// replay raw request bytes through the underlying
    /// [`reqwest::blocking::Client`], timing the exchange
    ///
    /// # Errors
    ///
    /// This method fails when the raw bytes can't be interpreted as an http
    /// message, or when there was an error while sending the request or
    /// reading its response.
    #[instrument(skip_all, level = "trace")]
    fn send(
        &self,
        service: &HttpService,
        request: &[u8],
    ) -> Result<AttackResponse, FeroxScanError> {
        let reqwest_request = self.build_request(service, request)?;

        // start timer for the request
        let now = Instant::now();

        let reqwest_response = self
            .client
            .execute(reqwest_request)
            .map_err(reqwest_to_scan_error)?;

        let body = reqwest_response.bytes().map_err(|source| {
            error!(?source, "could not read response body");

            FeroxScanError::ResponseReadError { source }
        })?;

        Ok(AttackResponse::new(Some(body.to_vec()), now.elapsed()))
    }
}

impl BlockingClient {
    /// restructure raw request bytes into one that can be sent over the wire
    ///
    /// the request line yields the method and target (origin-form targets are
    /// resolved against the service descriptor), header lines are carried over
    /// verbatim except `Content-Length`, and everything past the blank line is
    /// replayed as the body
    #[instrument(skip_all, level = "trace")]
    fn build_request(
        &self,
        service: &HttpService,
        request: &[u8],
    ) -> Result<reqwest::blocking::Request, FeroxScanError> {
        let body_start = raw::head_end(request);
        let head = String::from_utf8_lossy(&request[..body_start]);
        let body = &request[body_start..];

        let mut lines = head.lines();

        let request_line = lines.next().ok_or(FeroxScanError::MalformedRequest {
            reason: "message is empty",
        })?;

        let mut parts = request_line.split_whitespace();

        let method_text = parts.next().ok_or(FeroxScanError::MalformedRequest {
            reason: "request line has no method",
        })?;

        let target = parts.next().ok_or(FeroxScanError::MalformedRequest {
            reason: "request line has no target",
        })?;

        let method = Method::from_bytes(method_text.as_bytes()).map_err(|source| {
            error!(
                method = method_text,
                %source,
                "could not parse the given http method; must be a valid http method when using a reqwest client"
            );

            FeroxScanError::MethodParseError {
                method: method_text.to_string(),
            }
        })?;

        let url = if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!(
                "{}://{}:{}{}",
                service.scheme(),
                service.host(),
                service.port(),
                target
            )
        };

        let mut builder = self.inner().request(method, url);

        for line in lines {
            if line.is_empty() {
                break;
            }

            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();

                // recomputed from the replayed body
                if name.eq_ignore_ascii_case("content-length") {
                    continue;
                }

                builder = builder.header(name, value.trim());
            }
        }

        if !body.is_empty() {
            builder = builder.body(body.to_vec());
        }

        builder.build().map_err(reqwest_to_scan_error)
    }
}

impl AsInner for BlockingClient {
    type Type = reqwest::blocking::Client;

    fn inner(&self) -> &Self::Type {
        &self.client
    }
}
