//! HDFS client configuration file parser
//!
//! This crate parses the INI-style client configuration file read by the
//! `hdfs` tool and by `hdfsclient::SessionConfig::from_conf_file`.
//!
//! ```text
//! [global]
//! namenode host = nn1.example.com
//! namenode port = 8020
//!
//! [client]
//! user = alice
//! buffer size = 64K
//!
//! [hadoop]
//! dfs.client.read.shortcircuit = true
//! ```
//!
//! Keys are kept verbatim. The `[hadoop]` section is free-form: its entries
//! are handed to the native client untouched. Every other section only
//! accepts the options its consumer enumerates, see [`HdfsConfig::check_known`].
//!
//! # Example
//!
//! ```no_run
//! use hdfsconfig::HdfsConfig;
//!
//! let config = HdfsConfig::from_file("/etc/hadoop/hdfs-client.conf").unwrap();
//! let host = config.namenode_host().unwrap();
//! let port = config.namenode_port().unwrap();
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Section holding options shared by every consumer
pub const GLOBAL_SECTION: &str = "global";
/// Section holding client options
pub const CLIENT_SECTION: &str = "client";
/// Section whose entries are passed through to the native client
pub const HADOOP_SECTION: &str = "hadoop";

/// Well-known namenode RPC port
pub const DEFAULT_NAMENODE_PORT: u16 = 9000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read client config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Client config syntax error: {0}")]
    ParseError(String),

    #[error("Required option '{0}' not set")]
    MissingOption(String),

    #[error("Unknown option '{key}' in section [{section}]")]
    UnknownOption { section: String, key: String },

    #[error("Invalid value for '{key}': expected {expected}, got '{value}'")]
    InvalidValue {
        key: String,
        expected: &'static str,
        value: String,
    },
}

/// A value type an option can hold
pub trait ConfigValue: Sized + Clone {
    /// What a well-formed value looks like, for error messages
    const EXPECTED: &'static str;

    fn from_config_str(raw: &str) -> Option<Self>;
}

/// Byte size; accepts an optional binary unit suffix (`64K`, `128MB`, `1.5G`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size(pub u64);

impl ConfigValue for Size {
    const EXPECTED: &'static str = "size";

    fn from_config_str(raw: &str) -> Option<Self> {
        parse_size(raw).map(Size)
    }
}

/// Non-negative integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count(pub u64);

impl ConfigValue for Count {
    const EXPECTED: &'static str = "count";

    fn from_config_str(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().map(Count)
    }
}

impl ConfigValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_config_str(raw: &str) -> Option<Self> {
        const TRUTHY: &[&str] = &["true", "yes", "on", "1"];
        const FALSY: &[&str] = &["false", "no", "off", "0"];

        let raw = raw.trim();
        if TRUTHY.iter().any(|t| raw.eq_ignore_ascii_case(t)) {
            Some(true)
        } else if FALSY.iter().any(|f| raw.eq_ignore_ascii_case(f)) {
            Some(false)
        } else {
            None
        }
    }
}

impl ConfigValue for String {
    const EXPECTED: &'static str = "string";

    fn from_config_str(raw: &str) -> Option<Self> {
        Some(raw.to_owned())
    }
}

/// An option name paired with the value used when the file omits it
pub struct ConfigOption<T: ConfigValue> {
    name: &'static str,
    default: T,
}

impl<T: ConfigValue> ConfigOption<T> {
    pub const fn new(name: &'static str, default: T) -> Self {
        Self { name, default }
    }

    /// Look the option up across `sections`, falling back to the default
    /// when it is absent. A present but malformed value is an error.
    pub fn get(&self, config: &HdfsConfig, sections: &[&str]) -> Result<T, ConfigError> {
        Ok(self
            .get_opt(config, sections)?
            .unwrap_or_else(|| self.default.clone()))
    }

    /// Like [`ConfigOption::get`] but `None` when the option is absent
    pub fn get_opt(&self, config: &HdfsConfig, sections: &[&str]) -> Result<Option<T>, ConfigError> {
        let Some(raw) = config.get_with_fallback(sections, self.name) else {
            return Ok(None);
        };
        T::from_config_str(raw)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: self.name.to_string(),
                expected: T::EXPECTED,
                value: raw.to_string(),
            })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }
}

/// Unit suffixes and the power of two they scale by
const SIZE_UNITS: &[(&str, u32)] = &[
    ("", 0),
    ("B", 0),
    ("K", 10),
    ("KB", 10),
    ("M", 20),
    ("MB", 20),
    ("G", 30),
    ("GB", 30),
    ("T", 40),
    ("TB", 40),
];

/// Parse a byte size such as `4096`, `64K`, `128_MB` or `1.5G`
fn parse_size(raw: &str) -> Option<u64> {
    let cleaned: String = raw.chars().filter(|c| *c != '_' && !c.is_whitespace()).collect();
    let split = cleaned
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map_or(cleaned.len(), |(i, _)| i);
    let (number, suffix) = cleaned.split_at(split);

    let (_, shift) = SIZE_UNITS
        .iter()
        .find(|(unit, _)| suffix.eq_ignore_ascii_case(unit))?;
    let scale = 1u64 << shift;

    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(scale);
    }
    let fractional: f64 = number.parse().ok()?;
    Some((fractional * scale as f64) as u64)
}

/// A parsed client configuration file: section name to sorted key/value pairs
#[derive(Debug, Clone, Default)]
pub struct HdfsConfig {
    sections: HashMap<String, BTreeMap<String, String>>,
}

impl HdfsConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Parse configuration text
    ///
    /// Lines before the first section header belong to `[global]`. `#` and
    /// `;` start comment lines. A repeated key keeps its last value.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut section = GLOBAL_SECTION.to_string();

        for (index, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            let malformed = |what: &str| {
                ConfigError::ParseError(format!("line {}: {} '{}'", index + 1, what, line))
            };

            if line.is_empty() || line.starts_with(['#', ';']) {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| malformed("malformed section header"))?;
                section = name.to_string();
                config.sections.entry(section.clone()).or_default();
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| malformed("expected 'key = value', got"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(malformed("empty key in"));
            }

            config
                .sections
                .entry(section.clone())
                .or_default()
                .insert(key.to_string(), value.trim().to_string());
        }

        Ok(config)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }

    /// First value found for `key`, searching `sections` in order
    pub fn get_with_fallback(&self, sections: &[&str], key: &str) -> Option<&str> {
        sections.iter().find_map(|section| self.get(section, key))
    }

    /// Namenode host name or address
    pub fn namenode_host(&self) -> Result<String, ConfigError> {
        self.get_with_fallback(&[CLIENT_SECTION, GLOBAL_SECTION], "namenode host")
            .map(|s| s.to_string())
            .ok_or_else(|| ConfigError::MissingOption("namenode host".to_string()))
    }

    /// Namenode RPC port (defaults to 9000 if not specified)
    pub fn namenode_port(&self) -> Result<u16, ConfigError> {
        let port = ConfigOption::new("namenode port", Count(DEFAULT_NAMENODE_PORT as u64))
            .get(self, &[CLIENT_SECTION, GLOBAL_SECTION])?;
        u16::try_from(port.0).map_err(|_| ConfigError::InvalidValue {
            key: "namenode port".to_string(),
            expected: "port number",
            value: port.0.to_string(),
        })
    }

    /// All entries of the `[hadoop]` pass-through section
    pub fn hadoop_params(&self) -> BTreeMap<String, String> {
        self.sections
            .get(HADOOP_SECTION)
            .cloned()
            .unwrap_or_default()
    }

    /// Reject any key in `sections` that is not listed in `known`
    ///
    /// Sections absent from the file are ignored.
    pub fn check_known(&self, sections: &[&str], known: &[&str]) -> Result<(), ConfigError> {
        for section in sections {
            for key in self.keys(section) {
                if !known.contains(&key) {
                    return Err(ConfigError::UnknownOption {
                        section: section.to_string(),
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Section names present in the file, in no particular order
    pub fn sections(&self) -> Vec<&str> {
        self.sections.keys().map(String::as_str).collect()
    }

    /// Keys of `section` in sorted order; empty if the section is absent
    pub fn keys(&self, section: &str) -> Vec<&str> {
        match self.sections.get(section) {
            Some(entries) => entries.keys().map(String::as_str).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CONFIG: &str = r#"
; sample client config
namenode host = nn0

[global]
namenode host = nn1
namenode port = 8020

[client]
user = alice
buffer size = 64K
replication = 3
autoconnect = no

[hadoop]
dfs.client.read.shortcircuit = true
dfs.domain.socket.path = /var/lib/hadoop-hdfs/dn_socket
"#;

    #[test]
    fn test_parse_config() {
        let config = HdfsConfig::parse(TEST_CONFIG).unwrap();

        assert_eq!(config.get("global", "namenode host"), Some("nn1"));
        assert_eq!(config.get("client", "user"), Some("alice"));
        assert_eq!(
            config.get("hadoop", "dfs.client.read.shortcircuit"),
            Some("true")
        );
        assert_eq!(config.get("client", "missing"), None);
    }

    #[test]
    fn test_later_value_overrides_earlier_in_same_section() {
        // Keys before the first header land in [global] and are overridden
        let config = HdfsConfig::parse(TEST_CONFIG).unwrap();
        assert_eq!(config.namenode_host().unwrap(), "nn1");
    }

    #[test]
    fn test_namenode_port() {
        let config = HdfsConfig::parse(TEST_CONFIG).unwrap();
        assert_eq!(config.namenode_port().unwrap(), 8020);

        let config = HdfsConfig::parse("namenode host = nn1").unwrap();
        assert_eq!(config.namenode_port().unwrap(), DEFAULT_NAMENODE_PORT);

        let config = HdfsConfig::parse("namenode port = 70000").unwrap();
        assert!(matches!(
            config.namenode_port(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_namenode_host() {
        let config = HdfsConfig::parse("[client]\nuser = bob\n").unwrap();
        assert!(matches!(
            config.namenode_host(),
            Err(ConfigError::MissingOption(_))
        ));
    }

    #[test]
    fn test_lookup_order() {
        let config = HdfsConfig::parse(
            "[global]\nuser = root\nport = 1\n[client]\nuser = alice\n",
        )
        .unwrap();
        let order = [CLIENT_SECTION, GLOBAL_SECTION];

        assert_eq!(config.get_with_fallback(&order, "user"), Some("alice"));
        assert_eq!(config.get_with_fallback(&order, "port"), Some("1"));
        assert_eq!(config.get_with_fallback(&order, "group"), None);
        assert_eq!(config.get_with_fallback(&[GLOBAL_SECTION], "user"), Some("root"));
    }

    #[test]
    fn test_hadoop_params() {
        let config = HdfsConfig::parse(TEST_CONFIG).unwrap();
        let params = config.hadoop_params();

        assert_eq!(params.len(), 2);
        assert_eq!(
            params.get("dfs.domain.socket.path").map(String::as_str),
            Some("/var/lib/hadoop-hdfs/dn_socket")
        );
    }

    #[test]
    fn test_check_known() {
        let config = HdfsConfig::parse(TEST_CONFIG).unwrap();

        config
            .check_known(
                &["client"],
                &["user", "buffer size", "replication", "autoconnect"],
            )
            .unwrap();

        let err = config
            .check_known(&["client"], &["user", "buffer size"])
            .unwrap_err();
        match err {
            ConfigError::UnknownOption { section, key } => {
                assert_eq!(section, "client");
                assert_eq!(key, "autoconnect");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Absent sections are fine
        config.check_known(&["datanode"], &[]).unwrap();
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(
            HdfsConfig::parse("[client\nuser = a\n"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            HdfsConfig::parse("[client]\njust a line\n"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            HdfsConfig::parse("[client]\n = value\n"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_section_names() {
        let config = HdfsConfig::parse(TEST_CONFIG).unwrap();
        let mut names = config.sections();
        names.sort_unstable();
        assert_eq!(names, vec!["client", "global", "hadoop"]);
        assert_eq!(config.keys("hadoop").len(), 2);
        assert!(config.keys("datanode").is_empty());
    }

    #[test]
    fn test_size_units() {
        const MIB: u64 = 1 << 20;
        let cases = [
            ("4096", 4096),
            ("512B", 512),
            ("64k", 64 << 10),
            ("64KB", 64 << 10),
            ("128M", 128 * MIB),
            ("128_MB", 128 * MIB),
            ("2G", 2 << 30),
            ("1T", 1 << 40),
            ("0.5M", MIB / 2),
        ];
        for (raw, expected) in cases {
            assert_eq!(parse_size(raw), Some(expected), "{}", raw);
        }
        assert_eq!(parse_size("12Q"), None);
        assert_eq!(parse_size("MB"), None);
        assert_eq!(parse_size("99999999999T"), None);
    }

    #[test]
    fn test_scalar_values() {
        assert_eq!(Count::from_config_str(" 42 "), Some(Count(42)));
        assert_eq!(Count::from_config_str("-1"), None);
        assert_eq!(bool::from_config_str("YES"), Some(true));
        assert_eq!(bool::from_config_str("off"), Some(false));
        assert_eq!(bool::from_config_str("maybe"), None);
        assert_eq!(String::from_config_str("x y"), Some("x y".to_string()));
    }

    #[test]
    fn test_config_option_get() {
        let config = HdfsConfig::parse(TEST_CONFIG).unwrap();
        let sections = &[CLIENT_SECTION, GLOBAL_SECTION];

        assert_eq!(
            ConfigOption::new("buffer size", Size(0)).get(&config, sections).unwrap(),
            Size(64 << 10)
        );
        assert_eq!(
            ConfigOption::new("replication", Count(1)).get(&config, sections).unwrap(),
            Count(3)
        );
        assert!(!ConfigOption::new("autoconnect", true).get(&config, sections).unwrap());

        let block_size = ConfigOption::new("block size", Size(128 << 20));
        assert_eq!(block_size.get(&config, sections).unwrap(), Size(128 << 20));
        assert_eq!(block_size.get_opt(&config, sections).unwrap(), None);
        assert_eq!(block_size.name(), "block size");
        assert_eq!(*block_size.default_value(), Size(128 << 20));
    }

    #[test]
    fn test_config_option_invalid_value() {
        let config = HdfsConfig::parse("[client]\nreplication = three\n").unwrap();
        let opt = ConfigOption::new("replication", Count(1));

        match opt.get(&config, &["client"]) {
            Err(ConfigError::InvalidValue {
                key,
                expected,
                value,
            }) => {
                assert_eq!(key, "replication");
                assert_eq!(expected, "count");
                assert_eq!(value, "three");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
