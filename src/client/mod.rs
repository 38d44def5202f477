//! blocking transport trait, with an optional implementation using [`reqwest`]
use cfg_if::cfg_if;
use dyn_clone::DynClone;

use crate::error::FeroxScanError;
use crate::requests::HttpService;
use crate::responses::AttackResponse;

cfg_if! {
    if #[cfg(feature = "blocking")] {
        mod blocking_client;
        mod utils; // maps reqwest errors to FeroxScanError

        pub use self::blocking_client::BlockingClient;
    }
}

/// marker trait for wrapped client types
pub trait HttpClient {
    /// which concrete client will be used
    type ClientType;

    /// create a new client, using [`HttpClient::ClientType`] as the base
    fn with_client(client: Self::ClientType) -> Self;
}

/// the wire: dispatches one raw request to a service and returns whatever came
/// back, timed
///
/// Implementors must preserve the request's headers and body byte-exactly and
/// must time the exchange themselves (wrap the wire call, not the parsing).
/// Detection strategies serialize their sends — a transport is never asked to
/// overlap two requests belonging to the same scan invocation.
///
/// # Errors
///
/// Implementors may error when things go awry on the wire; the scanning core
/// degrades every transport error to an inconclusive (absent) response before
/// any strategy sees it.
pub trait Transport: DynClone + Send + Sync {
    /// send raw request bytes to the service, returning the timed response
    fn send(
        &self,
        service: &HttpService,
        request: &[u8],
    ) -> Result<AttackResponse, FeroxScanError>;
}

impl Clone for Box<dyn Transport> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}
