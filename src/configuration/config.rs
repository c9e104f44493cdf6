#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::env;

use clap::ArgMatches;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::IntoEnumIterator;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Eq, PartialEq, EnumIter, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    ApiURL,
    MaxRetries,
    NoStream,
    RequestTimeout,
    RetryBackoff,
    SessionID,
    Username,
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        if key == ConfigKey::Username {
            let mut user = env::var("USER").unwrap_or_else(|_| return "".to_string());
            if user.is_empty() {
                user = "You".to_string();
            }

            return user;
        }

        let res = match key {
            ConfigKey::ApiURL => "http://localhost:8000",
            ConfigKey::MaxRetries => "3",
            ConfigKey::NoStream => "false",
            ConfigKey::RequestTimeout => "30000",
            ConfigKey::RetryBackoff => "1000",
            ConfigKey::SessionID => "default",
            ConfigKey::Username => "",
        };

        return res.to_string();
    }

    /// Seeds every key with its default, then applies any matching string
    /// arguments. Flags and absent arguments are left at their defaults.
    pub fn load(matches: &ArgMatches) {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key));
        }

        for key in ConfigKey::iter() {
            if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                if !val.is_empty() {
                    Config::set(key, val);
                }
            }
        }
    }
}
