//! HTML adapters for the two pages we read structurally: the SSO login form
//! and the final grades table.

use crate::error::{ParseError, ParseErrorKind};
use crate::structs::Course;

use scraper::{ElementRef, Html, Selector};

/// The first form on the page that asks for a password, or failing that the
/// first form with an `action`.
fn login_form(doc: &Html) -> Option<ElementRef<'_>> {
    let forms = Selector::parse("form[action]").ok()?;
    let password = Selector::parse("input[type='password']").ok()?;
    doc.select(&forms)
        .find(|form| form.select(&password).next().is_some())
        .or_else(|| doc.select(&forms).next())
}

/// The login form's `action` attribute, unresolved.
pub fn extract_action(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let form = login_form(&doc)?;
    Some(form.value().attr("action")?.trim().to_string())
}

/// Value of the hidden input `name` inside the login form.
pub fn extract_hidden_field(html: &str, name: &str) -> Option<String> {
    hidden_fields(html)
        .into_iter()
        .find(|(field, _)| field == name)
        .map(|(_, value)| value)
}

/// Every hidden input of the login form, in document order.
pub fn hidden_fields(html: &str) -> Vec<(String, String)> {
    let doc = Html::parse_document(html);
    let Some(form) = login_form(&doc) else {
        return Vec::new();
    };
    let Ok(sel) = Selector::parse("input") else {
        return Vec::new();
    };
    form.select(&sel)
        .filter(|input| {
            input
                .value()
                .attr("type")
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("hidden"))
        })
        .filter_map(|input| {
            let name = input.value().attr("name")?.trim();
            let value = input.value().attr("value").unwrap_or_default().trim();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Whether the page carries a grades table at all.
pub fn has_grade_table(html: &str) -> bool {
    grade_rows(&Html::parse_document(html)).is_some()
}

fn grade_rows(doc: &Html) -> Option<Vec<Vec<String>>> {
    let table_sel = Selector::parse("table.datadisplaytable").ok()?;
    let row_sel = Selector::parse(":scope > tbody > tr, :scope > tr").ok()?;
    let header_sel = Selector::parse("th").ok()?;
    let cell_sel = Selector::parse("td").ok()?;

    let table = doc.select(&table_sel).find(|table| {
        table
            .select(&header_sel)
            .any(|th| cell_text(th).eq_ignore_ascii_case("CRN"))
    })?;

    Some(
        table
            .select(&row_sel)
            .filter(|row| row.select(&header_sel).next().is_none())
            .map(|row| row.select(&cell_sel).map(cell_text).collect())
            .collect(),
    )
}

/// Parses the final grades page: one row per course with
/// CRN, subject, course, section, title, campus, grade.
pub fn parse_grade_table(html: &str) -> Result<Vec<Course>, ParseError> {
    let doc = Html::parse_document(html);
    let rows = grade_rows(&doc).ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::AuthLikelyFailed,
            "no grades table on page",
            html,
        )
    })?;

    let mut courses = Vec::new();
    for cols in rows {
        if cols.len() < 7 {
            return Err(ParseError::new(
                ParseErrorKind::Malformed,
                format!("grades row has {} columns, expected 7", cols.len()),
                html,
            ));
        }
        let mut cols = cols.into_iter();
        let mut next = || cols.next().unwrap_or_default();
        let crn = next();
        if crn.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::Malformed,
                "grades row without a CRN",
                html,
            ));
        }
        let subject = next();
        let course_number = next();
        let sequence_number = next();
        let course_title = next();
        let _campus = next();
        let grade = Some(next()).filter(|g| !g.is_empty());
        courses.push(Course {
            course_reference_number: crn,
            subject,
            subject_description: String::new(),
            course_number,
            sequence_number,
            course_title,
            schedule_description: String::new(),
            grade,
            faculty: Vec::new(),
            meeting_times: Vec::new(),
        });
    }
    Ok(courses)
}
