//! Request correlation for the HTTP surface.
//!
//! Every response carries `x-request-id`. A caller-supplied value is kept;
//! otherwise a UUID is generated before the trace span opens, so the span and
//! the response always agree on the identifier.

use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Header used to correlate a comparison request across logs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Layer assigning a UUID request id when the caller did not send one.
#[must_use]
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer echoing the request id onto the response.
#[must_use]
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_header_is_lowercase() {
        assert_eq!(REQUEST_ID_HEADER, REQUEST_ID_HEADER.to_ascii_lowercase());
        let _ = (set_request_id_layer(), propagate_request_id_layer());
    }
}
