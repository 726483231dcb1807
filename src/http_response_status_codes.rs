//! The HTTP response status codes this server actually sends.

// https://developer.mozilla.org/en-US/docs/Web/HTTP/Status

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpResponseStatusCode {
    OK200,
    Found302,
    NotModified304,
    BadRequest400,
    NotFound404,
    InternalServerError500,
    NotImplemented501,
}

impl HttpResponseStatusCode {
    pub fn code(self) -> u16 {
        match self {
            Self::OK200 => 200,
            Self::Found302 => 302,
            Self::NotModified304 => 304,
            Self::BadRequest400 => 400,
            Self::NotFound404 => 404,
            Self::InternalServerError500 => 500,
            Self::NotImplemented501 => 501,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::OK200 => "OK",
            Self::Found302 => "Found",
            Self::NotModified304 => "Not Modified",
            Self::BadRequest400 => "Bad Request",
            Self::NotFound404 => "Not Found",
            Self::InternalServerError500 => "Internal Server Error",
            Self::NotImplemented501 => "Not Implemented",
        }
    }

    pub fn desc(self) -> &'static str {
        match self {
            Self::OK200 =>
                "The request succeeded.",
            Self::Found302 =>
                "The resource is temporarily located at a different URI.",
            Self::NotModified304 =>
                "The resource has not been modified since the version the \
                 client has cached.",
            Self::BadRequest400 =>
                "The server cannot process the request due to a client error \
                 (e.g. malformed request syntax).",
            Self::NotFound404 =>
                "The server cannot find the requested resource.",
            Self::InternalServerError500 =>
                "The server has encountered a situation it does not know \
                 how to handle.",
            Self::NotImplemented501 =>
                "The request method is not supported by the server.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_codes() {
        assert_eq!(HttpResponseStatusCode::OK200.code(), 200);
        assert_eq!(HttpResponseStatusCode::NotFound404.code(), 404);
        assert_eq!(HttpResponseStatusCode::NotFound404.title(), "Not Found");
    }
}
