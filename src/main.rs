use antibanner::credentials;
use antibanner::fetch::{FetchMode, Fetcher, Portal};
use antibanner::notify::{Notifier, NO_GRADES};
use antibanner::watch::{self, Delivery};
use antibanner::{rweb, Course, Error, Journal, Settings, SnapshotStore, Term};

use chrono::Datelike;
use log::{error, info};
use std::process::ExitCode;

const USAGE: &str = "\
usage: antibanner [command] -q <quarter> -y <year> [options]

commands:
  changes        check for new registration data and notify (default)
  grades         print posted grades
  schedule       print the class schedule
  final-grades   print final grades from the grades page
  gpa            print the overall GPA (needs \"sid\" in the credentials file)

options:
  -q, --quarter <q>        fall, winter, spring, summer (or 1-4)
  -y, --year <y>           academic year, e.g. 2017
  -c, --credentials <path> credentials JSON file
      --silent             only log warnings
      --debug              verbose logging and payload dumps
      --cached             use the stored snapshot when there is one
      --test               send a test notification with the stored grades
  -h, --help               show this message
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Changes,
    Grades,
    Schedule,
    FinalGrades,
    Gpa,
}

fn next_value(
    args: &mut impl Iterator<Item = String>,
    flag: &str,
) -> std::result::Result<String, String> {
    args.next().ok_or(format!("Missing value for {flag}"))
}

fn parse_cli() -> std::result::Result<(Command, Vec<(String, String)>), String> {
    let mut command = Command::Changes;
    let mut overrides: Vec<(String, String)> = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "-q" | "--quarter" => overrides.push(("quarter".into(), next_value(&mut args, &a)?)),
            "-y" | "--year" => overrides.push(("year".into(), next_value(&mut args, &a)?)),
            "-c" | "--credentials" => {
                overrides.push(("credentials".into(), next_value(&mut args, &a)?))
            }
            "--silent" => overrides.push(("silent".into(), "true".into())),
            "--debug" => overrides.push(("debug".into(), "true".into())),
            "--cached" => overrides.push(("cached".into(), "true".into())),
            "--test" => overrides.push(("test".into(), "true".into())),
            "-h" | "--help" => {
                eprint!("{USAGE}");
                std::process::exit(0);
            }
            "changes" => command = Command::Changes,
            "grades" => command = Command::Grades,
            "schedule" => command = Command::Schedule,
            "final-grades" => command = Command::FinalGrades,
            "gpa" => command = Command::Gpa,
            _ => return Err(format!("Unknown arg: {a}")),
        }
    }
    Ok((command, overrides))
}

fn init_logging(settings: &Settings) {
    let level = if settings.debug {
        "debug"
    } else if settings.silent {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .init();
}

fn print_grades(term: &Term, courses: &[Course]) {
    if courses.is_empty() {
        println!("Oops, there is nothing available for {term} yet!");
        return;
    }
    println!("\n{term} Available Grades:");
    let mut any = false;
    for course in courses.iter().filter(|c| c.grade.is_some()) {
        any = true;
        println!(
            "Course: {} {} - {}",
            course.subject, course.course_number, course.course_title
        );
        println!("Grade: {}\n", course.grade.as_deref().unwrap_or_default());
    }
    if !any {
        println!("{NO_GRADES}");
    }
    println!("All Done!");
}

fn print_schedule(term: &Term, courses: &[Course]) {
    if courses.is_empty() {
        println!("Oops, there is nothing available for {term} yet!");
        return;
    }
    for course in courses {
        let (name, email) = course
            .primary_instructor()
            .map(|i| {
                (
                    i.display_name.as_str(),
                    i.email_address.as_deref().unwrap_or("Unavailable"),
                )
            })
            .unwrap_or(("Unavailable", "Unavailable"));
        println!("CRN: {}", course.course_reference_number);
        println!("Subject: {}", course.subject_description);
        println!("Course: {} {}", course.subject, course.course_number);
        println!("Course Description: {}", course.course_title);
        println!("Instructor: {name}");
        println!("Instructor email: {email}");
        println!("Course Category: {}", course.schedule_description);
        for times in &course.meeting_times {
            let opt = |v: &Option<String>| v.clone().unwrap_or_default();
            println!("Course start: {}", opt(&times.start_date));
            println!("Course end: {}", opt(&times.end_date));
            println!("Start time: {}", opt(&times.begin_time));
            println!("End time: {}", opt(&times.end_time));
            println!(
                "Room: {}, {} {}",
                opt(&times.building_description),
                opt(&times.building),
                opt(&times.room)
            );
            println!("Days: {}", times.days());
        }
        println!();
    }
}

async fn run(command: Command, settings: &Settings, journal: &Journal) -> antibanner::Result<()> {
    let term = || settings.term(chrono::Local::now().year());
    let creds =
        credentials::resolve_off_thread(settings.credentials.clone(), credentials::default_prompt())
            .await?;

    if command == Command::Gpa {
        match rweb::gpa(settings, &creds).await? {
            Some(gpa) => println!("{gpa}"),
            None => println!("GPA unavailable"),
        }
        return Ok(());
    }

    let term = term()?;
    if command == Command::FinalGrades {
        let courses = rweb::final_grades(settings, &creds, &term, journal).await?;
        print_grades(&term, &courses);
        return Ok(());
    }

    let store = SnapshotStore::open(&settings.store_path())?;
    let fetcher = Fetcher::new(Portal::new(settings, &creds), &store);
    let mode = if settings.cached {
        FetchMode::CachedIfPresent
    } else {
        FetchMode::Live
    };

    match command {
        Command::Grades | Command::Schedule => {
            let payload = fetcher.fetch(&term, mode).await?;
            let courses = watch::parse_or_record(journal, &term.key(), &payload)?;
            if command == Command::Grades {
                print_grades(&term, &courses);
            } else {
                print_schedule(&term, &courses);
            }
        }
        Command::Changes if settings.test => {
            let payload = fetcher.fetch(&term, FetchMode::CachedIfPresent).await?;
            let courses = watch::parse_or_record(journal, &term.key(), &payload)?;
            let notifier = Notifier::from_settings(settings, &creds)?;
            let (message, result) = watch::test_notification(&courses, &notifier, journal).await?;
            println!("{}", result.body);
            println!("{message}");
        }
        Command::Changes => {
            let poll = watch::poll(&fetcher, &term, journal, settings.debug, || {
                Notifier::from_settings(settings, &creds)
            })
            .await?;
            if poll.report.is_first_observation() {
                info!("First run for {term}");
            } else if poll.report.changed {
                info!("New changes!");
            } else {
                info!("Nothing new for {term}");
            }
            if let Delivery::Failed(err) = &poll.delivery {
                error!("{}", err.hint());
            }
        }
        Command::Gpa | Command::FinalGrades => unreachable!("handled above"),
    }

    drop(fetcher);
    store.close()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let (command, overrides) = match parse_cli() {
        Ok(parsed) => parsed,
        Err(msg) => {
            eprintln!("error: {msg}\n\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    let settings = match Settings::load(&overrides) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: {err}\n{}", err.hint());
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings);
    let journal = Journal::new(&settings.log_dir);

    if !settings.silent {
        println!("Anti-Banner v{}\n", env!("CARGO_PKG_VERSION"));
    }

    // `run` (and the store it holds) is dropped when the select finishes.
    let outcome = tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => None,
        result = run(command, &settings, &journal) => Some(result),
    };
    match outcome {
        Some(Ok(())) => ExitCode::SUCCESS,
        Some(Err(err)) => report(&journal, &err),
        None => {
            println!("\nBye!");
            // A prompt may still be blocked on stdin; don't wait for it.
            std::process::exit(130)
        }
    }
}

fn report(journal: &Journal, err: &Error) -> ExitCode {
    error!("{err}");
    journal.note(&format!("Error: {err}"));
    eprintln!("{}", err.hint());
    ExitCode::FAILURE
}
