use crate::config::Term;
use crate::error::Result;
use crate::fetch::{Fetcher, Source};
use crate::structs::ChangeReport;

use log::info;

/// Compares the stored payload for `term` with a fresh one.
///
/// The comparison is byte-for-byte on the raw payload: if the portal
/// reorders fields, that counts as a change.
pub async fn detect<S: Source>(fetcher: &Fetcher<'_, S>, term: &Term) -> Result<ChangeReport> {
    let key = term.key();
    let previous = fetcher.store().get(&key)?;
    let current = fetcher.refresh(term).await?;

    let changed = match &previous {
        None => {
            info!("First run for {term}, now tracking {key}");
            false
        }
        Some(previous) if previous.raw_payload == current.raw_payload => {
            info!("Nothing new for {term}");
            false
        }
        Some(_) => {
            info!("New changes for {term}");
            true
        }
    };

    Ok(ChangeReport {
        key,
        previous,
        current,
        changed,
    })
}
