use std::time::Instant;

use rouille::Response;


/// What a handler hands back up: the response, plus optionally the
/// earliest instant it may be released to the client. The sleep
/// happens in the accept thread, after the worker pool slot is free
/// again.
pub struct AResponse {
    pub response: Response,
    pub sleep_until: Option<Instant>,
}

impl AResponse {
    /// Hold `response` back until `not_before` has passed.
    pub fn delayed(response: Response, not_before: Instant) -> AResponse {
        AResponse {
            response,
            sleep_until: Some(not_before),
        }
    }
}

impl From<Response> for AResponse {
    fn from(response: Response) -> Self {
        AResponse {
            response,
            sleep_until: None,
        }
    }
}
