use clap::Arg;
use clap::Command;

use super::Config;
use super::ConfigKey;

#[test]
fn it_returns_defaults() {
    assert_eq!(Config::default(ConfigKey::ApiURL), "http://localhost:8000");
    assert_eq!(Config::default(ConfigKey::MaxRetries), "3");
    assert_eq!(Config::default(ConfigKey::NoStream), "false");
    assert_eq!(Config::default(ConfigKey::RequestTimeout), "30000");
    assert_eq!(Config::default(ConfigKey::RetryBackoff), "1000");
    assert_eq!(Config::default(ConfigKey::SessionID), "default");
}

#[test]
fn it_loads_defaults_and_applies_overrides() {
    let cmd = Command::new("test").arg(Arg::new("api-url").long("api-url").num_args(1));
    let matches = cmd.get_matches_from(vec!["test", "--api-url", "http://example.com:9000"]);

    Config::load(&matches);

    assert_eq!(Config::get(ConfigKey::ApiURL), "http://example.com:9000");
    assert_eq!(Config::get(ConfigKey::SessionID), "default");
    assert_eq!(Config::get(ConfigKey::MaxRetries), "3");
}
