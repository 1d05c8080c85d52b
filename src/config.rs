use crate::error::Result;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Oldest year the portal has registration data for.
pub const MIN_YEAR: i32 = 2015;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quarter {
    Fall,
    Winter,
    Spring,
    Summer,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [
        Quarter::Fall,
        Quarter::Winter,
        Quarter::Spring,
        Quarter::Summer,
    ];

    /// Accepts an English name in any case, or the menu number (1 = Fall .. 4 = Summer).
    pub fn decode(s: &str) -> Option<Quarter> {
        match s.trim().to_lowercase().as_str() {
            "fall" | "1" => Some(Quarter::Fall),
            "winter" | "2" => Some(Quarter::Winter),
            "spring" | "3" => Some(Quarter::Spring),
            "summer" | "4" => Some(Quarter::Summer),
            _ => None,
        }
    }

    /// Two-digit suffix the portal uses in term identifiers.
    pub fn code(self) -> &'static str {
        match self {
            Quarter::Winter => "10",
            Quarter::Spring => "20",
            Quarter::Summer => "30",
            Quarter::Fall => "40",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Quarter::Fall => "Fall",
            Quarter::Winter => "Winter",
            Quarter::Spring => "Spring",
            Quarter::Summer => "Summer",
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Term {
    pub year: i32,
    pub quarter: Quarter,
}

impl Term {
    pub fn new(year: i32, quarter: Quarter) -> Self {
        Self { year, quarter }
    }

    /// Snapshot store index, e.g. `_2017Fall`.
    pub fn key(&self) -> String {
        format!("_{}{}", self.year, self.quarter.name())
    }

    /// Term identifier sent to the portal, e.g. `201740`.
    pub fn code(&self) -> String {
        format!("{}{}", self.year, self.quarter.code())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quarter, self.year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Pushbullet,
    Ifttt,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub quarter: Option<String>,
    pub year: Option<i32>,
    pub credentials: Option<PathBuf>,
    pub silent: bool,
    pub debug: bool,
    pub cached: bool,
    pub test: bool,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub timeout_secs: Option<u64>,
    pub channel: Channel,
    pub ifttt_event: String,
    pub registration_url: String,
    pub sso_login_url: String,
    pub grades_url: String,
    pub profile_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quarter: None,
            year: None,
            credentials: None,
            silent: false,
            debug: false,
            cached: false,
            test: false,
            data_dir: ".data".into(),
            log_dir: ".logs".into(),
            timeout_secs: None,
            channel: Channel::Pushbullet,
            ifttt_event: "banner_changes".into(),
            registration_url:
                "https://registrationssb.ucr.edu/StudentRegistrationSsb/ssb/registrationHistory/reset"
                    .into(),
            sso_login_url: "https://bannersso.ucr.edu:443/ssomanager/c/SSB".into(),
            grades_url: "https://banweb.ucr.edu/banprod/bwskogrd.P_ViewGrde".into(),
            profile_url: "https://studentssb.ucr.edu/StudentSelfService/ssb/studentProfile"
                .into(),
        }
    }
}

impl Settings {
    /// Layers `antibanner.toml`, `AB_*` environment variables and the given
    /// overrides (highest priority) on top of the defaults.
    pub fn load(overrides: &[(String, String)]) -> Result<Settings> {
        let mut builder = Config::builder()
            .add_source(File::with_name("antibanner").required(false))
            .add_source(Environment::with_prefix("AB"));
        for (key, value) in overrides {
            builder = builder.set_override(key.as_str(), value.as_str())?;
        }
        Ok(builder.build()?.try_deserialize()?)
    }

    /// The requested term, validated against `MIN_YEAR..=current_year`.
    pub fn term(&self, current_year: i32) -> Result<Term> {
        let quarter = self
            .quarter
            .as_deref()
            .ok_or_else(|| ConfigError::NotFound("quarter".into()))?;
        let quarter = Quarter::decode(quarter)
            .ok_or_else(|| ConfigError::Message(format!("unknown quarter {quarter:?}")))?;
        let year = self.year.ok_or_else(|| ConfigError::NotFound("year".into()))?;
        if !(MIN_YEAR..=current_year).contains(&year) {
            return Err(ConfigError::Message(format!(
                "year must be between {MIN_YEAR} and {current_year}, got {year}"
            ))
            .into());
        }
        Ok(Term::new(year, quarter))
    }

    pub fn registration_url_for(&self, term: &Term) -> String {
        format!("{}?term={}", self.registration_url, term.code())
    }

    pub fn grades_url_for(&self, term: &Term) -> String {
        format!("{}?term_in={}", self.grades_url, term.code())
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("reg.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn decode_accepts_names_and_numbers() {
        assert_eq!(Quarter::decode("fall"), Some(Quarter::Fall));
        assert_eq!(Quarter::decode("WINTER"), Some(Quarter::Winter));
        assert_eq!(Quarter::decode("3"), Some(Quarter::Spring));
        assert_eq!(Quarter::decode(" 4 "), Some(Quarter::Summer));
        assert_eq!(Quarter::decode("autumn"), None);
        assert_eq!(Quarter::decode("5"), None);
    }

    #[test]
    fn keys_are_deterministic_and_distinct() {
        let mut keys = HashSet::new();
        let mut codes = HashSet::new();
        for year in 2015..2030 {
            for quarter in Quarter::ALL {
                let term = Term::new(year, quarter);
                assert_eq!(term.key(), Term::new(year, quarter).key());
                assert!(keys.insert(term.key()));
                assert!(codes.insert(term.code()));
            }
        }
        assert_eq!(Term::new(2017, Quarter::Fall).key(), "_2017Fall");
        assert_eq!(Term::new(2017, Quarter::Winter).code(), "201710");
    }

    #[test]
    fn term_validates_year_range() {
        let mut settings = Settings {
            quarter: Some("spring".into()),
            year: Some(2014),
            ..Settings::default()
        };
        assert!(settings.term(2020).is_err());
        settings.year = Some(2021);
        assert!(settings.term(2020).is_err());
        settings.year = Some(2018);
        assert_eq!(
            settings.term(2020).unwrap(),
            Term::new(2018, Quarter::Spring)
        );
    }

    #[test]
    fn term_requires_quarter() {
        let settings = Settings {
            year: Some(2018),
            ..Settings::default()
        };
        assert!(settings.term(2020).is_err());
    }

    #[test]
    fn overrides_win_over_defaults() {
        let settings = Settings::load(&[
            ("quarter".into(), "winter".into()),
            ("year".into(), "2019".into()),
            ("cached".into(), "true".into()),
            ("channel".into(), "ifttt".into()),
        ])
        .unwrap();
        assert_eq!(settings.term(2020).unwrap().code(), "201910");
        assert!(settings.cached);
        assert_eq!(settings.channel, Channel::Ifttt);
        assert_eq!(settings.ifttt_event, "banner_changes");
        assert_eq!(settings.store_path(), PathBuf::from(".data/reg.db"));
    }

    #[test]
    fn term_urls_carry_the_code() {
        let settings = Settings::default();
        let term = Term::new(2017, Quarter::Fall);
        assert!(settings.registration_url_for(&term).ends_with("reset?term=201740"));
        assert!(settings.grades_url_for(&term).ends_with("?term_in=201740"));
    }
}
