//! Page shell served for every page navigation the gatekeeper lets through.
//!
//! The client bundle mounts into `#root`; the shell only tells it which
//! audience (if any) the gatekeeper verified.

use axum::extract::Request;
use axum::response::Html;

use crate::middleware::gatekeeper::SessionClaims;

/// Fallback handler for page routes.
pub async fn page_shell(request: Request) -> Html<String> {
    let audience = request
        .extensions()
        .get::<SessionClaims>()
        .map(|SessionClaims(claims)| claims.aud.as_str())
        .unwrap_or("none");
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>Settle</title></head>\n\
         <body data-session=\"{audience}\"><div id=\"root\"></div>\
         <script type=\"module\" src=\"/assets/app.js\"></script></body>\n</html>\n"
    ))
}
