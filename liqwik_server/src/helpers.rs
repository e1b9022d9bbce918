use std::{net::IpAddr, str::FromStr};

use actix_web::{http::StatusCode, HttpRequest, HttpResponse};
use log::{debug, trace};
use regex::Regex;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        let re = Regex::new(r#"for="?(?P<ip>[^;,"]+)"#).ok();
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| re.as_ref().and_then(|re| re.captures(v)))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str())
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}

/// A minimal standalone HTML page. The token links in emails land on these, so they are read in a browser rather than
/// by the web client.
pub fn html_page(status: StatusCode, title: &str, message: &str) -> HttpResponse {
    let title = escape_html(title);
    let message = escape_html(message);
    let colour = if status.is_success() { "#1b7f3b" } else { "#b3261e" };
    let body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title} | Liqwik</title></head>
<body style="font-family: sans-serif; max-width: 36rem; margin: 4rem auto; text-align: center;">
<h1 style="color: {colour};">{title}</h1>
<p>{message}</p>
</body>
</html>
"#
    );
    HttpResponse::build(status).content_type("text/html; charset=utf-8").body(body)
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod test {
    use std::net::SocketAddr;

    use actix_web::{body::MessageBody, test::TestRequest};

    use super::*;

    fn peer() -> SocketAddr {
        "10.0.0.9:4000".parse().unwrap()
    }

    #[test]
    fn remote_ip_prefers_configured_headers() {
        let req = TestRequest::default()
            .peer_addr(peer())
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .insert_header(("Forwarded", "for=198.51.100.2;proto=https"))
            .to_http_request();
        assert_eq!(get_remote_ip(&req, true, true), Some("203.0.113.7".parse().unwrap()));
        assert_eq!(get_remote_ip(&req, false, true), Some("198.51.100.2".parse().unwrap()));
        assert_eq!(get_remote_ip(&req, false, false), Some("10.0.0.9".parse().unwrap()));
    }

    #[test]
    fn html_pages_escape_their_content() {
        let res = html_page(StatusCode::NOT_FOUND, "Oops", "<script>alert(1)</script>");
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body = res.into_body().try_into_bytes().unwrap();
        let body = String::from_utf8_lossy(&body);
        assert!(body.contains("&lt;script&gt;"), "{body}");
        assert!(!body.contains("<script>"));
    }
}
