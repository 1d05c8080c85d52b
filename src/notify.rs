use crate::config::{Channel, Settings};
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::structs::{Course, DeliveryResult};

use log::{debug, info};
use reqwest::Client;
use std::future::Future;

const PUSHBULLET_URL: &str = "https://api.pushbullet.com/v2/pushes";
const IFTTT_URL: &str = "https://maker.ifttt.com/trigger";
pub const NO_GRADES: &str = "No grades available yet...";
const TITLE: &str = "New grades!";

/// One line per graded course, `LABEL: GRADE`, with grades lined up in a
/// column. Courses without a grade are left out.
pub fn grades_message(courses: &[Course]) -> String {
    let graded: Vec<(String, &str)> = courses
        .iter()
        .filter_map(|c| Some((format!("{}:", c.label()), c.grade.as_deref()?)))
        .collect();
    if graded.is_empty() {
        return NO_GRADES.to_string();
    }
    let width = graded.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    graded
        .iter()
        .map(|(label, grade)| format!("{label:<width$} {grade}\n"))
        .collect()
}

/// Anything that can deliver a rendered message.
pub trait Dispatch {
    fn dispatch(&self, message: &str) -> impl Future<Output = Result<DeliveryResult>>;
}

#[derive(Debug, Clone)]
enum Target {
    Pushbullet { token: String },
    Ifttt { url: String },
}

pub struct Notifier {
    client: Client,
    target: Target,
}

impl Notifier {
    /// Fails with `NotifierConfig` when the channel's key is missing from the
    /// credentials file.
    pub fn from_settings(settings: &Settings, creds: &Credentials) -> Result<Self> {
        let target = match settings.channel {
            Channel::Pushbullet => Target::Pushbullet {
                token: key(creds, "pushbullet")?.to_string(),
            },
            Channel::Ifttt => Target::Ifttt {
                url: format!(
                    "{IFTTT_URL}/{}/with/key/{}",
                    settings.ifttt_event,
                    key(creds, "ifttt")?
                ),
            },
        };
        let client = crate::session::client(settings.timeout_secs.map(std::time::Duration::from_secs))?;
        Ok(Self { client, target })
    }
}

fn key<'a>(creds: &'a Credentials, name: &str) -> Result<&'a str> {
    creds
        .api_key(name)
        .ok_or_else(|| Error::NotifierConfig(format!("no {name:?} key in credentials")))
}

impl Dispatch for Notifier {
    async fn dispatch(&self, message: &str) -> Result<DeliveryResult> {
        let req = match &self.target {
            Target::Pushbullet { token } => self
                .client
                .post(PUSHBULLET_URL)
                .basic_auth(token, Some(""))
                .form(&[("type", "note"), ("title", TITLE), ("body", message)]),
            Target::Ifttt { url } => self.client.post(url).form(&[("value1", message)]),
        };
        debug!("sending notification ({} bytes)", message.len());
        let res = req.send().await?;
        let status = res.status().as_u16();
        let body = res.text().await?;
        info!("Notification result: {status}");
        Ok(DeliveryResult { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn course(subject: &str, number: &str, grade: Option<&str>) -> Course {
        serde_json::from_value(serde_json::json!({
            "courseReferenceNumber": format!("{subject}{number}-crn"),
            "subject": subject,
            "courseNumber": number,
            "grade": grade,
        }))
        .unwrap()
    }

    #[test]
    fn graded_courses_are_aligned() {
        let courses = [
            course("CS", "100", Some("A")),
            course("MATH", "9A", None),
            course("ENGL", "1B", Some("B+")),
        ];
        assert_eq!(grades_message(&courses), "CS100:  A\nENGL1B: B+\n");
    }

    #[test]
    fn nothing_graded_yet() {
        assert_eq!(grades_message(&[course("CS", "100", None)]), NO_GRADES);
        assert_eq!(grades_message(&[]), NO_GRADES);
    }

    #[test]
    fn blank_grade_from_the_portal_counts_as_not_graded() {
        let courses = crate::parse::parse(r#"{"courses": [{"id": "C1", "grade": ""}]}"#).unwrap();
        assert_eq!(grades_message(&courses), NO_GRADES);
    }

    #[test]
    fn missing_channel_key_is_a_config_error() {
        let creds = Credentials {
            identity: "jdoe001".into(),
            secret: "pw".into(),
            api_keys: HashMap::from([("ifttt".to_string(), "k".to_string())]),
        };
        let settings = Settings::default();
        assert!(matches!(
            Notifier::from_settings(&settings, &creds),
            Err(Error::NotifierConfig(_))
        ));

        let settings = Settings {
            channel: Channel::Ifttt,
            ..Settings::default()
        };
        let notifier = Notifier::from_settings(&settings, &creds).unwrap();
        match notifier.target {
            Target::Ifttt { url } => {
                assert_eq!(url, "https://maker.ifttt.com/trigger/banner_changes/with/key/k")
            }
            other => panic!("unexpected target {other:?}"),
        }
    }
}
