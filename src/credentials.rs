use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

/// Shorter identities are treated as an unset placeholder.
pub const MIN_IDENTITY_LEN: usize = 5;
const MAX_PROMPTS: usize = 3;

#[derive(Clone)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
    pub api_keys: HashMap<String, String>,
}

// Keep the secret out of debug output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("api_keys", &self.api_keys.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn api_key(&self, name: &str) -> Option<&str> {
        self.api_keys
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn is_complete(&self) -> bool {
        self.identity.chars().count() >= MIN_IDENTITY_LEN && !self.secret.is_empty()
    }
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(default, alias = "netID")]
    identity: String,
    #[serde(default, alias = "password")]
    secret: String,
    #[serde(flatten)]
    rest: HashMap<String, serde_json::Value>,
}

/// Source of interactively entered values.
pub trait Prompt {
    fn identity(&mut self) -> io::Result<String>;
    /// Must not echo.
    fn secret(&mut self) -> io::Result<String>;
}

pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn identity(&mut self) -> io::Result<String> {
        print!("Enter netID: ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn secret(&mut self) -> io::Result<String> {
        rpassword::prompt_password("Enter CAS password: ")
    }
}

/// Used when nobody is at the keyboard, e.g. under a scheduler.
pub struct NoPrompt;

impl Prompt for NoPrompt {
    fn identity(&mut self) -> io::Result<String> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "not interactive"))
    }

    fn secret(&mut self) -> io::Result<String> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "not interactive"))
    }
}

/// Terminal prompt when stdin is a TTY, otherwise none.
pub fn default_prompt() -> Box<dyn Prompt + Send> {
    if io::stdin().is_terminal() {
        Box::new(TerminalPrompt)
    } else {
        Box::new(NoPrompt)
    }
}

impl<P: Prompt + ?Sized> Prompt for Box<P> {
    fn identity(&mut self) -> io::Result<String> {
        (**self).identity()
    }

    fn secret(&mut self) -> io::Result<String> {
        (**self).secret()
    }
}

pub fn load_file(path: &Path) -> Result<Credentials> {
    if !path.exists() {
        return Err(Error::Credential(format!(
            "{} is not a valid path",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)?;
    let file: CredentialsFile = serde_json::from_str(&text).map_err(|e| {
        Error::Credential(format!("{} could not be parsed: {e}", path.display()))
    })?;
    let api_keys = file
        .rest
        .into_iter()
        .filter_map(|(k, v)| match v {
            serde_json::Value::String(s) => Some((k, s)),
            serde_json::Value::Number(n) => Some((k, n.to_string())),
            _ => None,
        })
        .collect();
    Ok(Credentials {
        identity: file.identity.trim().to_string(),
        secret: file.secret,
        api_keys,
    })
}

/// Loads credentials from `path` if given, then prompts for whatever is still
/// missing. Gives up after a few bad answers or when the prompt is unavailable.
pub fn resolve(path: Option<&Path>, prompt: &mut impl Prompt) -> Result<Credentials> {
    let mut creds = match path {
        Some(path) => load_file(path)?,
        None => Credentials {
            identity: String::new(),
            secret: String::new(),
            api_keys: HashMap::new(),
        },
    };

    let mut attempts = 0;
    while !creds.is_complete() {
        if attempts == MAX_PROMPTS {
            return Err(Error::Credential(
                "identity and password are both required".into(),
            ));
        }
        attempts += 1;
        let answer = if creds.identity.chars().count() < MIN_IDENTITY_LEN {
            prompt.identity().map(|s| creds.identity = s.trim().to_string())
        } else {
            prompt.secret().map(|s| creds.secret = s)
        };
        answer.map_err(|e| Error::Credential(format!("cannot prompt for credentials: {e}")))?;
    }
    log::debug!("resolved credentials for {}", creds.identity);
    Ok(creds)
}

/// `resolve` on the blocking pool, so a prompt waiting on stdin leaves the
/// runtime free to notice Ctrl-C.
pub async fn resolve_off_thread<P>(path: Option<PathBuf>, mut prompt: P) -> Result<Credentials>
where
    P: Prompt + Send + 'static,
{
    tokio::task::spawn_blocking(move || resolve(path.as_deref(), &mut prompt))
        .await
        .map_err(|e| Error::Credential(format!("credential prompt did not finish: {e}")))?
}
