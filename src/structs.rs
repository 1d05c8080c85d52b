use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

fn nullable<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn reference_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let crn = String::deserialize(d)?;
    if crn.trim().is_empty() {
        return Err(D::Error::custom("empty course reference number"));
    }
    Ok(crn)
}

// The portal sends "" for a grade that is not posted yet.
fn posted_grade<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(d)?
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(alias = "id", deserialize_with = "reference_number")]
    pub course_reference_number: String,
    #[serde(default, deserialize_with = "nullable")]
    pub subject: String,
    #[serde(default, deserialize_with = "nullable")]
    pub subject_description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub course_number: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sequence_number: String,
    #[serde(default, deserialize_with = "nullable")]
    pub course_title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub schedule_description: String,
    /// `None` until the grade is posted.
    #[serde(default, deserialize_with = "posted_grade")]
    pub grade: Option<String>,
    #[serde(default)]
    pub faculty: Vec<Instructor>,
    #[serde(default)]
    pub meeting_times: Vec<MeetingTime>,
}

impl Course {
    /// `SUBJ NUM`, falling back to the CRN when the portal omits both.
    pub fn label(&self) -> String {
        let label = format!("{}{}", self.subject, self.course_number);
        if label.is_empty() {
            self.course_reference_number.clone()
        } else {
            label
        }
    }

    pub fn primary_instructor(&self) -> Option<&Instructor> {
        self.faculty.iter().find(|i| i.primary_indicator)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instructor {
    #[serde(default, deserialize_with = "nullable")]
    pub display_name: String,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub primary_indicator: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeetingTime {
    pub begin_time: Option<String>,
    pub end_time: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub building: Option<String>,
    pub building_description: Option<String>,
    pub room: Option<String>,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
}

impl MeetingTime {
    /// Comma separated two-letter day codes, e.g. `MO,WE,FR`.
    pub fn days(&self) -> String {
        [
            (self.monday, "MO"),
            (self.tuesday, "TU"),
            (self.wednesday, "WE"),
            (self.thursday, "TH"),
            (self.friday, "FR"),
            (self.saturday, "SA"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, day)| *day)
        .collect::<Vec<_>>()
        .join(",")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub key: String,
    pub captured_at: DateTime<Utc>,
    pub raw_payload: String,
}

#[derive(Debug, Clone)]
pub struct ChangeReport {
    pub key: String,
    pub previous: Option<Snapshot>,
    pub current: Snapshot,
    pub changed: bool,
}

impl ChangeReport {
    /// Nothing was tracked for this key before this poll.
    pub fn is_first_observation(&self) -> bool {
        self.previous.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub status: u16,
    pub body: String,
}

impl DeliveryResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
