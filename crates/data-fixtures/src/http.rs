//! HTTP data fixtures

/// HTTP requests
pub mod request {
    use crate::define_fixture;

    define_fixture!(
        GET_COOKIE,
        "A GET request authorised by a cookie.",
        "../data/http/request_get_cookie"
    );
    define_fixture!(
        POST_AUTH,
        "A POST request with a query, a caller header, a cookie and an authorization header.",
        "../data/http/request_post_auth"
    );
}

/// HTTP responses
pub mod response {
    use crate::define_fixture;

    define_fixture!(
        OK_JSON,
        "An OK response with a JSON body.",
        "../data/http/response_json"
    );
    define_fixture!(
        OK_CHUNKED_JSON,
        "An OK response with chunked transfer encoding and a JSON body split across multiple chunks.",
        "../data/http/response_chunked_json"
    );
    define_fixture!(
        OK_HTML,
        "An OK response with an HTML body embedding a JSON script.",
        "../data/http/response_html"
    );
    define_fixture!(
        OK_TEXT_CLOSE,
        "An OK response with a text body delimited by the end of the connection.",
        "../data/http/response_text_close"
    );
    define_fixture!(
        NOT_FOUND,
        "A not found response with a JSON body.",
        "../data/http/response_not_found"
    );
}
