//! Core Infrastructure
//!
//! HTTP transport and redirect resolution.

pub mod redirect;
pub mod transport;

pub use redirect::{resolve_redirect, DASHBOARD_PATH};
pub use transport::{
    encode_form, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport, MAX_RESPONSE_SIZE,
};
