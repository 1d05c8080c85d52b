//! Pages behind the older self-service portal: final grades and GPA.

use crate::config::{Settings, Term};
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::session::{self, Session};
use crate::structs::Course;
use crate::watch::parse_or_record;

use serde_json::Value;
use std::time::Duration;

async fn sso_session(settings: &Settings, creds: &Credentials) -> Result<Session> {
    let timeout = settings.timeout_secs.map(Duration::from_secs);
    let (session, _) = session::login(&settings.sso_login_url, creds, timeout).await?;
    Ok(session)
}

/// Posted final grades for `term`, read from the HTML grades table.
pub async fn final_grades(
    settings: &Settings,
    creds: &Credentials,
    term: &Term,
    journal: &Journal,
) -> Result<Vec<Course>> {
    let session = sso_session(settings, creds).await?;
    let page = session.fetch(&settings.grades_url_for(term)).await?;
    parse_or_record(journal, &term.key(), &page.body)
}

/// `overallGpa` from a GPA response, or `None` when the body is not the JSON
/// we expect (for instance when the student id does not belong to the user).
pub fn overall_gpa(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("overallGpa")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Overall GPA for the `sid` stored in the credentials file.
pub async fn gpa(settings: &Settings, creds: &Credentials) -> Result<Option<String>> {
    let sid = creds
        .api_key("sid")
        .ok_or_else(|| Error::NotifierConfig("no \"sid\" key in credentials".into()))?;
    let session = sso_session(settings, creds).await?;
    // The GPA endpoint only answers once the profile page has been loaded.
    session.get(&settings.profile_url).await?;
    let url = format!(
        "{}/viewGPAHoursList?studentId={sid}",
        settings.profile_url
    );
    let res = session.get(&url).await?;
    Ok(overall_gpa(&res.body))
}
