use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::error::{DeskError, Result};
use crate::money::DiscountPolicy;
use crate::projection::DEFAULT_WINDOW;

// Embedded so a first run can seed the output folder.
pub const DEFAULT_COMPANY_TEMPLATE: &str = include_str!("../company.toml");

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub output_dir: String,
    pub window_size: usize,
    pub discount_policy: DiscountPolicy,
    pub currency_symbol: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_base_url: "http://localhost:4000".to_string(),
            output_dir: "~/Documents/Invoices".to_string(),
            window_size: DEFAULT_WINDOW,
            discount_policy: DiscountPolicy::Flat,
            currency_symbol: "£".to_string(),
        }
    }
}

impl Settings {
    pub fn output_root(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.output_dir))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BankDetails {
    pub account_name: String,
    pub account_number: String,
    pub sort_code: String,
}

/// Letterhead, bank details and footer printed on every document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub phone: String,
    pub address: String,
    /// Registered address used for documents created before `address_changed_on`.
    #[serde(default)]
    pub previous_address: Option<String>,
    #[serde(default)]
    pub address_changed_on: Option<NaiveDate>,
    pub bank: BankDetails,
    #[serde(default)]
    pub footer: Vec<String>,
    #[serde(default)]
    pub quote_footer: String,
}

impl CompanyProfile {
    /// The registered address as it stood when a document was created.
    pub fn address_on(&self, created_at: DateTime<Utc>) -> &str {
        match (&self.previous_address, self.address_changed_on) {
            (Some(previous), Some(changed_on)) if created_at.date_naive() < changed_on => previous,
            _ => &self.address,
        }
    }
}

impl Default for CompanyProfile {
    fn default() -> Self {
        // the embedded template is covered by a test
        toml::from_str(DEFAULT_COMPANY_TEMPLATE).unwrap_or_else(|_| CompanyProfile {
            name: String::new(),
            tagline: String::new(),
            website: String::new(),
            phone: String::new(),
            address: String::new(),
            previous_address: None,
            address_changed_on: None,
            bank: BankDetails {
                account_name: String::new(),
                account_number: String::new(),
                sort_code: String::new(),
            },
            footer: Vec::new(),
            quote_footer: String::new(),
        })
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "invoice-desk", "app") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir).ok();
        }
        return config_dir.join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

/// Saved session cookie, next to the settings file.
pub fn get_session_path() -> PathBuf {
    get_config_path().with_file_name("session")
}

pub fn load_session(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let cookie = content.trim();
    (!cookie.is_empty()).then(|| cookie.to_string())
}

pub fn save_session(path: &Path, cookie: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, cookie)?;
    Ok(())
}

pub fn clear_session(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Missing file means defaults; a file that does not parse is an error.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| DeskError::Config(format!("{}: {}", path.display(), e)))
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let toml_str = toml::to_string_pretty(settings)
        .map_err(|e| DeskError::Config(e.to_string()))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml_str)?;
    Ok(())
}

/// Reads `company.toml` under `root`, writing the default one first if absent.
pub fn load_company_profile(root: &Path) -> Result<CompanyProfile> {
    let path = root.join("company.toml");
    if !path.exists() {
        tracing::info!(path = %path.display(), "initializing default company profile");
        fs::create_dir_all(root)?;
        fs::write(&path, DEFAULT_COMPANY_TEMPLATE)?;
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| DeskError::Config(format!("{}: {}", path.display(), e)))
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_company_profile_parses() {
        let profile: CompanyProfile = toml::from_str(DEFAULT_COMPANY_TEMPLATE).unwrap();
        assert_eq!(profile.name, "Eco Voltex Ltd");
        assert_eq!(profile.address_changed_on, NaiveDate::from_ymd_opt(2025, 7, 1));
        assert_eq!(profile.footer.len(), 2);
    }

    #[test]
    fn address_switches_on_change_date() {
        let profile = CompanyProfile::default();
        let before = "2025-06-30T23:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let after = "2025-07-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(profile.address_on(before), "9a Oak Road Romford RM3 0PH");
        assert_eq!(profile.address_on(after), profile.address);
    }

    #[test]
    fn settings_default_when_missing_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        assert_eq!(load_settings(&path).unwrap(), Settings::default());

        let custom = Settings {
            api_base_url: "https://api.example.test".into(),
            window_size: 10,
            discount_policy: DiscountPolicy::Percentage,
            ..Settings::default()
        };
        save_settings(&path, &custom).unwrap();
        assert_eq!(load_settings(&path).unwrap(), custom);
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "window_size = 8\n").unwrap();
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.window_size, 8);
        assert_eq!(settings.currency_symbol, "£");
    }

    #[test]
    fn malformed_settings_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "window_size = \"many\"\n").unwrap();
        assert!(matches!(load_settings(&path), Err(DeskError::Config(_))));
    }

    #[test]
    fn company_profile_is_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let profile = load_company_profile(dir.path()).unwrap();
        assert!(dir.path().join("company.toml").exists());
        assert_eq!(profile.bank.sort_code, "20-19-97");
    }

    #[test]
    fn session_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");
        assert_eq!(load_session(&path), None);
        save_session(&path, "sid=abc\n").unwrap();
        assert_eq!(load_session(&path).as_deref(), Some("sid=abc"));
        clear_session(&path).unwrap();
        assert_eq!(load_session(&path), None);
        clear_session(&path).unwrap();
    }

    #[test]
    fn expands_tilde_only_at_start() {
        assert_eq!(expand_home_dir("/tmp/x~y"), "/tmp/x~y");
        assert!(!expand_home_dir("~/docs").starts_with('~'));
    }
}
