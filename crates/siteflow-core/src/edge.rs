//! SPA request rewrite at the CDN edge
//!
//! Requests whose last path segment does not look like a file
//! (`name.ext`) are served `/index.html` so the client-side router picks
//! the page. The rewrite never fails: anything unexpected passes the request
//! through untouched.

use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};

pub const INDEX_DOCUMENT: &str = "/index.html";

/// CloudFront Function implementing the same rule as [`rewrite_uri`].
///
/// It is associated as a `viewer-request` function rather than an
/// origin-request Lambda@Edge handler: CloudFront Functions only run on
/// viewer events, and need no us-east-1 Lambda version or replication.
/// The rewrite is unchanged; cached objects are keyed by the rewritten URI
/// either way. Attached to distributions when edge rewrite is enabled.
pub const CLOUDFRONT_FUNCTION_CODE: &str = r#"function handler(event) {
    var request = event.request;
    try {
        if (!/\/[^/]+\.[^/]+$/.test(request.uri)) {
            request.uri = '/index.html';
        }
    } catch (e) {
        // pass through unmodified
    }
    return request;
}
"#;

/// Whether the last path segment has a non-empty stem and extension.
pub fn looks_like_file(uri: &str) -> bool {
    let segment = match uri.rsplit_once('/') {
        Some((_, last)) => last,
        None => return false,
    };

    segment
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < segment.len())
}

/// Rewrite an extensionless path to `/index.html`.
pub fn rewrite_uri(uri: &str) -> String {
    if looks_like_file(uri) {
        uri.to_string()
    } else {
        INDEX_DOCUMENT.to_string()
    }
}

/// Handle a Lambda@Edge request event (`Records[0].cf.request`).
///
/// Returns the request record. When the event does not have the expected
/// shape, the event is returned as-is; when the request has no usable `uri`
/// the request is returned unmodified.
pub fn handle_event(event: Value) -> Value {
    let Some(request) = event.pointer("/Records/0/cf/request").cloned() else {
        tracing::warn!("edge event has no request record, passing through");
        return event;
    };

    rewrite_request(request)
}

/// Apply the rewrite to a request record, passing it through on any fault.
pub fn rewrite_request(request: Value) -> Value {
    pass_through_on_panic(request, |mut request| {
        let uri = request.get("uri").and_then(Value::as_str).map(str::to_string);
        if let Some(uri) = uri
            && let Some(obj) = request.as_object_mut()
        {
            obj.insert("uri".to_string(), Value::String(rewrite_uri(&uri)));
        }
        request
    })
}

/// Run `rewrite` on the request, returning the original if it panics.
fn pass_through_on_panic(request: Value, rewrite: impl FnOnce(Value) -> Value) -> Value {
    let original = request.clone();

    match panic::catch_unwind(AssertUnwindSafe(move || rewrite(request))) {
        Ok(rewritten) => rewritten,
        Err(_) => {
            tracing::error!("edge rewrite panicked, passing request through");
            original
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rewrite_examples() {
        assert_eq!(rewrite_uri("/about"), "/index.html");
        assert_eq!(rewrite_uri("/assets/logo.png"), "/assets/logo.png");
        assert_eq!(rewrite_uri("/"), "/index.html");
    }

    #[test]
    fn test_rewrite_edge_shapes() {
        let cases = [
            ("/index.html", "/index.html"),
            ("/users/42", "/index.html"),
            ("/users/42/", "/index.html"),
            ("/v1.2/docs", "/index.html"),
            ("/.env", "/index.html"),
            ("/archive.", "/index.html"),
            ("/fonts/inter.var.woff2", "/fonts/inter.var.woff2"),
            ("", "/index.html"),
        ];
        for (input, expected) in cases {
            assert_eq!(rewrite_uri(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_function_code_matches_rewrite_rule() {
        let start = CLOUDFRONT_FUNCTION_CODE.find("(!/").unwrap() + 3;
        let end = CLOUDFRONT_FUNCTION_CODE.find("/.test(").unwrap();
        // JavaScript escapes the slash; Rust regex does not need to
        let source = CLOUDFRONT_FUNCTION_CODE[start..end].replace(r"\/", "/");
        let pattern = regex::Regex::new(&source).unwrap();

        for uri in [
            "/",
            "",
            "/about",
            "/users/42/",
            "/v1.2/docs",
            "/.env",
            "/archive.",
            "/assets/logo.png",
            "/fonts/inter.var.woff2",
            "/a..b",
            "no-slash.js",
        ] {
            assert_eq!(pattern.is_match(uri), looks_like_file(uri), "uri: {uri:?}");
        }

        assert!(CLOUDFRONT_FUNCTION_CODE.contains(&format!("request.uri = '{INDEX_DOCUMENT}'")));
    }

    #[test]
    fn test_panicking_rewrite_passes_request_through() {
        let request = json!({ "uri": "/about", "method": "GET" });
        let result = pass_through_on_panic(request.clone(), |_| -> Value {
            panic!("rewrite failed");
        });
        assert_eq!(result, request);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        for uri in ["/about", "/assets/logo.png", "/", "/a/b/c", "/x.y/z", "/.hidden"] {
            let once = rewrite_uri(uri);
            assert_eq!(rewrite_uri(&once), once, "input: {uri:?}");
        }
    }

    #[test]
    fn test_handle_event_rewrites_request() {
        let event = json!({
            "Records": [{
                "cf": {
                    "request": {
                        "uri": "/dashboard/settings",
                        "method": "GET",
                        "headers": {}
                    }
                }
            }]
        });

        let request = handle_event(event);
        assert_eq!(request["uri"], "/index.html");
        assert_eq!(request["method"], "GET");
    }

    #[test]
    fn test_handle_event_keeps_asset_paths() {
        let event = json!({
            "Records": [{ "cf": { "request": { "uri": "/static/app.js" } } }]
        });

        assert_eq!(handle_event(event)["uri"], "/static/app.js");
    }

    #[test]
    fn test_malformed_event_passes_through() {
        let event = json!({ "unexpected": true });
        assert_eq!(handle_event(event.clone()), event);
    }

    #[test]
    fn test_request_without_uri_passes_through() {
        let request = json!({ "method": "GET" });
        assert_eq!(rewrite_request(request.clone()), request);

        let request = json!({ "uri": 42 });
        assert_eq!(rewrite_request(request.clone()), request);
    }
}
