use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::scrape;

use log::{debug, info};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

/// Form fields of the CAS login flow. These belong to the SSO server, not to us.
pub mod sso {
    /// Input carrying the user's netID.
    pub const IDENTITY_FIELD: &str = "username";
    /// Input carrying the password.
    pub const SECRET_FIELD: &str = "password";
    /// Hidden login ticket. Its absence means we are not looking at a login form.
    pub const TICKET_FIELD: &str = "lt";
    /// Sent when the form does not supply its own value.
    pub const PROTOCOL_FIELDS: &[(&str, &str)] = &[
        ("execution", "e1s1"),
        ("_eventId", "submit"),
        ("submit.x", "0"),
        ("submit.y", "0"),
    ];
}

/// Body of the last response in the login sequence.
#[derive(Debug, Clone)]
pub struct FinalResponse {
    pub url: Url,
    pub status: StatusCode,
    pub body: String,
}

/// Cookie-carrying client produced by a successful login.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
}

impl Session {
    pub async fn get(&self, url: &str) -> Result<FinalResponse> {
        debug!("GET {url}");
        let res = self.client.get(url).send().await?;
        read(res).await
    }

    /// Like `get`, but a non-2xx answer is an `Error::Http`.
    pub async fn fetch(&self, url: &str) -> Result<FinalResponse> {
        debug!("GET {url}");
        let res = self.client.get(url).send().await?.error_for_status()?;
        read(res).await
    }
}

async fn read(res: reqwest::Response) -> Result<FinalResponse> {
    let url = res.url().clone();
    let status = res.status();
    let body = res.text().await?;
    Ok(FinalResponse { url, status, body })
}

pub fn client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder().cookie_store(true).gzip(true);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// The POST body for the login form: every hidden input the form carries,
/// the protocol defaults it lacks, then identity and secret.
pub fn login_payload(html: &str, creds: &Credentials) -> Result<Vec<(String, String)>> {
    let mut fields = scrape::hidden_fields(html);
    if !fields.iter().any(|(name, _)| name == sso::TICKET_FIELD) {
        return Err(Error::Session(format!(
            "no login form found (missing {:?} field)",
            sso::TICKET_FIELD
        )));
    }
    for (name, value) in sso::PROTOCOL_FIELDS {
        if !fields.iter().any(|(n, _)| n == name) {
            fields.push((name.to_string(), value.to_string()));
        }
    }
    fields.push((sso::IDENTITY_FIELD.into(), creds.identity.clone()));
    fields.push((sso::SECRET_FIELD.into(), creds.secret.clone()));
    Ok(fields)
}

/// Follows `target_url` to the SSO login page and posts the credentials back.
///
/// No retries. A wrong password is not detected here: the server answers
/// with another HTML page, which shows up later as a parse failure.
pub async fn login(
    target_url: &str,
    creds: &Credentials,
    timeout: Option<Duration>,
) -> Result<(Session, FinalResponse)> {
    let client = client(timeout)?;

    info!("Connecting to the portal...");
    let landing = read(client.get(target_url).send().await?).await?;
    debug!("login page at {} ({})", landing.url, landing.status);

    let action = scrape::extract_action(&landing.body)
        .ok_or_else(|| Error::Session("no login form found".into()))?;
    let action = landing
        .url
        .join(&action)
        .map_err(|e| Error::Session(format!("bad login form action {action:?}: {e}")))?;
    let payload = login_payload(&landing.body, creds)?;

    debug!("POST {action}");
    let res = client.post(action).form(&payload).send().await?;
    let response = read(res).await?;
    debug!("login finished at {} ({})", response.url, response.status);

    Ok((Session { client }, response))
}
