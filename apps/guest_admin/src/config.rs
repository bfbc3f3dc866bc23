use std::{collections::HashMap, fs, path::Path, time::Duration};

use directory_core::{DEFAULT_PAGE_SIZE, GUESTS_COLLECTION};
use tracing::warn;

pub const CONFIG_FILE: &str = "guest_admin.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_url: String,
    pub collection: String,
    pub page_size: u32,
    pub request_timeout: Duration,
    pub auth_token: Option<String>,
    pub admin_identity: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: "http://127.0.0.1:8090".into(),
            collection: GUESTS_COLLECTION.into(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(10),
            auth_token: None,
            admin_identity: None,
            admin_password: None,
        }
    }
}

impl Settings {
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_identity, &self.admin_password) {
            (Some(identity), Some(password)) => Some((identity.as_str(), password.as_str())),
            _ => None,
        }
    }
}

/// Defaults, then `guest_admin.toml` (if present), then environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    apply_file(&mut settings, Path::new(CONFIG_FILE));
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, path: &Path) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };
    match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
        Ok(file_cfg) => {
            let values = file_cfg
                .into_iter()
                .filter_map(|(key, value)| match value {
                    toml::Value::String(s) => Some((key, s)),
                    toml::Value::Integer(i) => Some((key, i.to_string())),
                    _ => None,
                })
                .collect();
            apply_values(settings, &values);
        }
        Err(err) => warn!(path = %path.display(), error = %err, "ignoring unreadable config file"),
    }
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let mut values = HashMap::new();
    if let Some(v) = lookup("POCKETBASE_URL") {
        values.insert("store_url".to_string(), v);
    }
    for key in [
        "store_url",
        "collection",
        "page_size",
        "request_timeout_ms",
        "auth_token",
        "admin_identity",
        "admin_password",
    ] {
        if let Some(v) = lookup(&format!("GUEST_ADMIN__{}", key.to_ascii_uppercase())) {
            values.insert(key.to_string(), v);
        }
    }
    apply_values(settings, &values);
}

fn apply_values(settings: &mut Settings, values: &HashMap<String, String>) {
    if let Some(v) = values.get("store_url") {
        settings.store_url = v.trim().to_string();
    }
    if let Some(v) = values.get("collection") {
        settings.collection = v.trim().to_string();
    }
    if let Some(v) = values.get("page_size") {
        match v.trim().parse::<u32>() {
            Ok(parsed) if parsed > 0 => settings.page_size = parsed,
            _ => warn!(value = %v, "ignoring invalid page_size"),
        }
    }
    if let Some(v) = values.get("request_timeout_ms") {
        match v.trim().parse::<u64>() {
            Ok(parsed) if parsed > 0 => settings.request_timeout = Duration::from_millis(parsed),
            _ => warn!(value = %v, "ignoring invalid request_timeout_ms"),
        }
    }
    if let Some(v) = values.get("auth_token") {
        settings.auth_token = non_empty(v);
    }
    if let Some(v) = values.get("admin_identity") {
        settings.admin_identity = non_empty(v);
    }
    if let Some(v) = values.get("admin_password") {
        settings.admin_password = non_empty(v);
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
