use antibanner::session::login;
use antibanner::{
    parse::parse, Credentials, Error, FetchMode, Fetcher, ParseErrorKind, Portal, Quarter,
    Settings, SnapshotStore, Term,
};

use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const DATA: &str = r#"{"data":{"registrations":[{"courseReferenceNumber":"30001","subject":"CS","courseNumber":"153","grade":"A"}]}}"#;

const LOGIN_PAGE: &str = r#"<!DOCTYPE html><html><head><title>CAS Login</title></head><body>
<form id="fm1" method="post" action="/cas/login;jsessionid=XYZ">
  <input id="username" name="username" type="text">
  <input id="password" name="password" type="password">
  <input type="hidden" name="lt" value="LT-42">
  <input type="hidden" name="execution" value="e1s1">
</form></body></html>"#;

fn respond(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}

/// A tiny CAS + registration server. The portal sets a routing cookie on the
/// first redirect and only answers with data when it comes back along with
/// the session cookie from the login POST.
fn route(method: &str, path: &str, cookies: &str, body: &str) -> String {
    let has = |c: &str| cookies.split(';').any(|kv| kv.trim() == c);
    let field = |f: &str| body.split('&').any(|kv| kv == f);
    match (method, path) {
        ("GET", p) if p.starts_with("/reset") => {
            if has("session=ok") && has("route=r1") {
                respond("200 OK", &[("Content-Type", "application/json")], DATA)
            } else {
                respond(
                    "302 Found",
                    &[("Location", "/cas/login"), ("Set-Cookie", "route=r1; Path=/")],
                    "",
                )
            }
        }
        ("GET", p) if p.starts_with("/broken") => {
            if has("session=ok") {
                respond("500 Internal Server Error", &[], "upstream exploded")
            } else {
                respond(
                    "302 Found",
                    &[("Location", "/cas/login"), ("Set-Cookie", "route=r1; Path=/")],
                    "",
                )
            }
        }
        ("GET", "/cas/login") => respond("200 OK", &[("Content-Type", "text/html")], LOGIN_PAGE),
        ("POST", "/cas/login;jsessionid=XYZ") => {
            let ok = field("username=jdoe001")
                && field("password=hunter2")
                && field("lt=LT-42")
                && field("execution=e1s1")
                && field("_eventId=submit")
                && has("route=r1");
            if ok {
                respond(
                    "302 Found",
                    &[
                        ("Location", "/reset?term=201740"),
                        ("Set-Cookie", "session=ok; Path=/"),
                    ],
                    "",
                )
            } else {
                respond("200 OK", &[("Content-Type", "text/html")], LOGIN_PAGE)
            }
        }
        ("GET", "/maintenance") => respond(
            "200 OK",
            &[("Content-Type", "text/html")],
            "<html><body>Down for maintenance</body></html>",
        ),
        _ => respond("404 Not Found", &[], "not found"),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn handle(mut stream: TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let header = |name: &str| {
        head.lines().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    };
    let length: usize = header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = buf.len().min(header_end + length);
    let body = String::from_utf8_lossy(&buf[header_end..end]).to_string();
    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default();
    let path = request_line.next().unwrap_or_default();
    let cookies = header("cookie").unwrap_or_default();

    let response = route(method, path, &cookies, &body);
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

async fn server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handle(stream));
        }
    });
    addr
}

fn creds(secret: &str) -> Credentials {
    Credentials {
        identity: "jdoe001".into(),
        secret: secret.into(),
        api_keys: HashMap::new(),
    }
}

#[tokio::test]
async fn login_carries_cookies_through_the_redirect_chain() {
    let addr = server().await;
    let target = format!("http://{addr}/reset?term=201740");
    let (session, last) = login(&target, &creds("hunter2"), None).await.unwrap();
    assert_eq!(last.status, 200);
    assert_eq!(last.body, DATA);

    let again = session.get(&target).await.unwrap();
    assert_eq!(again.body, DATA);
}

#[tokio::test]
async fn live_fetch_stores_the_payload() {
    let addr = server().await;
    let settings = Settings {
        registration_url: format!("http://{addr}/reset"),
        ..Settings::default()
    };
    let creds = creds("hunter2");
    let store = SnapshotStore::in_memory().unwrap();
    let term = Term::new(2017, Quarter::Fall);
    let fetcher = Fetcher::new(Portal::new(&settings, &creds), &store);

    let payload = fetcher.fetch(&term, FetchMode::Live).await.unwrap();
    assert_eq!(payload, DATA);
    assert_eq!(store.get("_2017Fall").unwrap().unwrap().raw_payload, DATA);
    assert_eq!(parse(&payload).unwrap()[0].grade.as_deref(), Some("A"));
}

#[tokio::test]
async fn server_error_leaves_the_stored_snapshot_alone() {
    let addr = server().await;
    let settings = Settings {
        registration_url: format!("http://{addr}/broken"),
        ..Settings::default()
    };
    let creds = creds("hunter2");
    let store = SnapshotStore::in_memory().unwrap();
    store.put("_2017Fall", DATA).unwrap();
    let term = Term::new(2017, Quarter::Fall);
    let fetcher = Fetcher::new(Portal::new(&settings, &creds), &store);

    let err = fetcher.fetch(&term, FetchMode::Live).await.unwrap_err();
    assert!(matches!(err, Error::Http(_)));
    assert_eq!(store.get("_2017Fall").unwrap().unwrap().raw_payload, DATA);
}

#[tokio::test]
async fn wrong_password_surfaces_as_a_parse_failure_not_a_session_error() {
    let addr = server().await;
    let target = format!("http://{addr}/reset?term=201740");
    let (session, last) = login(&target, &creds("wrong"), None).await.unwrap();
    assert_eq!(parse(&last.body).unwrap_err().kind, ParseErrorKind::AuthLikelyFailed);

    let again = session.get(&target).await.unwrap();
    assert_eq!(again.status, 200);
    assert!(again.body.contains("CAS Login"));
}

#[tokio::test]
async fn page_without_a_login_form_is_a_session_error() {
    let addr = server().await;
    let err = login(&format!("http://{addr}/maintenance"), &creds("hunter2"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Session(_)));
}
