use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct SocialConfig {
    pub api_port: u16,
    pub paths: SocialPaths,
    pub posts: PostConfig,
    pub session: SessionConfig,
}

impl SocialConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("SOCIAL_HOME") {
            Ok(raw) if !raw.trim().is_empty() => SocialPaths::from_base_dir(raw.trim())?,
            _ => SocialPaths::discover()?,
        };
        let api_port = env::var("SOCIAL_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        Ok(Self {
            api_port,
            paths,
            posts: PostConfig::from_env()?,
            session: SessionConfig::from_env(),
        })
    }

    pub fn new(api_port: u16, paths: SocialPaths) -> Self {
        Self {
            api_port,
            paths,
            posts: PostConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Who has to sign off on a multi-author post before it is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalPolicy {
    /// Every author except the submitter.
    #[default]
    CoAuthors,
    /// Every author, submitter included.
    AllAuthors,
}

impl FromStr for ApprovalPolicy {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "co-authors" | "coauthors" => Ok(Self::CoAuthors),
            "all-authors" | "all" => Ok(Self::AllAuthors),
            other => bail!("unknown post approval policy: {other}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostConfig {
    pub approval_policy: ApprovalPolicy,
}

impl PostConfig {
    pub fn from_env() -> Result<Self> {
        let approval_policy = match env::var("SOCIAL_POST_APPROVAL") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => ApprovalPolicy::default(),
        };
        Ok(Self { approval_policy })
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secure_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sid".into(),
            secure_cookies: false,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let cookie_name = env::var("SOCIAL_SESSION_COOKIE")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| "sid".into());
        let secure_cookies = env::var("SOCIAL_SECURE_COOKIES")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            cookie_name,
            secure_cookies,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SocialPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl SocialPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("social.db");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        })
    }
}
