//! One poll of a term: detect, parse, and tell someone if anything moved.

use crate::config::Term;
use crate::detect::detect;
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, Source};
use crate::journal::Journal;
use crate::notify::{grades_message, Dispatch};
use crate::parse;
use crate::structs::{ChangeReport, Course, DeliveryResult};

use log::{error, warn};

#[derive(Debug)]
pub enum Delivery {
    /// Nothing changed, so nothing was sent.
    NotNeeded,
    Sent(DeliveryResult),
    /// The message is in `changes.log` instead.
    Failed(Error),
}

#[derive(Debug)]
pub struct Poll {
    pub report: ChangeReport,
    pub courses: Vec<Course>,
    pub message: Option<String>,
    pub delivery: Delivery,
}

/// Parses `payload`, keeping a copy in the error log when that fails.
pub fn parse_or_record(journal: &Journal, key: &str, payload: &str) -> Result<Vec<Course>> {
    parse::parse(payload).map_err(|e| {
        match journal.parse_failure(payload) {
            Ok(path) => error!("unreadable payload for {key} saved to {}", path.display()),
            Err(io) => error!("unreadable payload for {key}, and saving it failed: {io}"),
        }
        Error::parse(key, e)
    })
}

/// Checks `term` for changes and notifies through whatever `notifier`
/// builds. The notifier is only built once a change is known, and failing to
/// build or use it never loses the change: the snapshot is already stored
/// and the message goes to the journal.
pub async fn poll<S, N, F>(
    fetcher: &Fetcher<'_, S>,
    term: &Term,
    journal: &Journal,
    debug_dump: bool,
    notifier: F,
) -> Result<Poll>
where
    S: Source,
    N: Dispatch,
    F: FnOnce() -> Result<N>,
{
    let report = detect(fetcher, term).await?;
    let payload = &report.current.raw_payload;
    let courses = parse_or_record(journal, &report.key, payload)?;

    if debug_dump {
        let name = parse::term_description(payload).unwrap_or_else(|| term.to_string());
        if let Err(err) = journal.dump(&name, payload) {
            warn!("could not write debug dump: {err}");
        }
    }

    if !report.changed {
        journal.note(if report.is_first_observation() {
            "First run"
        } else {
            ""
        });
        return Ok(Poll {
            report,
            courses,
            message: None,
            delivery: Delivery::NotNeeded,
        });
    }

    journal.note("New changes");
    let message = grades_message(&courses);
    let delivery = match notifier() {
        Ok(notifier) => send(&notifier, &message, journal).await,
        Err(err) => Delivery::Failed(err),
    };
    if let Delivery::Failed(err) = &delivery {
        warn!("notification not delivered: {err}");
        journal.note(&format!("Notification error: {err}"));
        journal.note(&format!("Undelivered: {}", message.trim_end()));
    }

    Ok(Poll {
        report,
        courses,
        message: Some(message),
        delivery,
    })
}

async fn send<N: Dispatch>(notifier: &N, message: &str, journal: &Journal) -> Delivery {
    match notifier.dispatch(message).await {
        Ok(result) => {
            journal.note(&format!("Notification result: {}", result.status));
            if !result.is_success() {
                journal.note(&format!("Notification error: {}", result.body));
            }
            Delivery::Sent(result)
        }
        Err(err) => Delivery::Failed(err),
    }
}

/// Sends the currently stored grades for `term`, wrapped in test markers.
pub async fn test_notification<N: Dispatch>(
    courses: &[Course],
    notifier: &N,
    journal: &Journal,
) -> Result<(String, DeliveryResult)> {
    let message = format!("***TEST***\n{}***TEST***", grades_message(courses));
    let result = notifier.dispatch(&message).await?;
    journal.note(&format!("Test notification result: {}", result.status));
    Ok((message, result))
}
