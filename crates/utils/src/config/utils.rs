/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::{path::PathBuf, time::Duration};

use super::Config;

impl Config {
    pub fn value(&self, key: impl AsKey) -> Option<&str> {
        self.keys.get(&key.as_key()).map(|v| v.as_str())
    }

    pub fn value_require(&self, key: impl AsKey) -> super::Result<&str> {
        let key = key.as_key();
        self.keys
            .get(&key)
            .map(|v| v.as_str())
            .ok_or_else(|| format!("Missing property {key:?}."))
    }

    pub fn property<T: ParseValue>(&self, key: impl AsKey) -> super::Result<Option<T>> {
        let key = key.as_key();
        if let Some(value) = self.keys.get(&key) {
            T::parse_value(key.as_str(), value).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn property_or_static<T: ParseValue>(
        &self,
        key: impl AsKey,
        default: &str,
    ) -> super::Result<T> {
        let key = key.as_key();
        let value = self.keys.get(&key).map(|v| v.as_str()).unwrap_or(default);
        T::parse_value(key.as_str(), value)
    }

    pub fn property_require<T: ParseValue>(&self, key: impl AsKey) -> super::Result<T> {
        let key = key.as_key();
        match self.keys.get(&key) {
            Some(value) => T::parse_value(key.as_str(), value),
            None => Err(format!("Missing property {key:?}.")),
        }
    }

    pub fn values(&self, prefix: impl AsKey) -> impl Iterator<Item = (&str, &str)> {
        let full_prefix = prefix.as_prefix();
        self.keys
            .range(full_prefix.clone()..)
            .take_while(move |(key, _)| key.starts_with(&full_prefix))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn properties<T: ParseValue>(
        &self,
        prefix: impl AsKey,
    ) -> impl Iterator<Item = super::Result<(&str, T)>> {
        let full_prefix = prefix.as_key();
        let prefix = prefix.as_prefix();

        self.keys.iter().filter_map(move |(key, value)| {
            if key.starts_with(&prefix) || key == &full_prefix {
                T::parse_value(key.as_str(), value)
                    .map(|value| (key.as_str(), value))
                    .into()
            } else {
                None
            }
        })
    }

    pub fn sub_keys<'x, 'y: 'x>(&'y self, prefix: impl AsKey) -> impl Iterator<Item = &str> + 'x {
        let mut last_key = "";
        let prefix = prefix.as_prefix();

        self.keys.keys().filter_map(move |key| {
            let key = key.strip_prefix(&prefix)?;
            let key = if let Some((key, _)) = key.split_once('.') {
                key
            } else {
                key
            };
            if last_key != key {
                last_key = key;
                Some(key)
            } else {
                None
            }
        })
    }

    pub fn has_prefix(&self, prefix: impl AsKey) -> bool {
        let prefix = prefix.as_prefix();
        self.keys.keys().any(|key| key.starts_with(&prefix))
    }
}

pub trait ParseValue: Sized {
    fn parse_value(key: impl AsKey, value: &str) -> super::Result<Self>;
}

pub trait AsKey: Clone {
    fn as_key(&self) -> String;
    fn as_prefix(&self) -> String;
}

impl AsKey for &str {
    fn as_key(&self) -> String {
        self.to_string()
    }

    fn as_prefix(&self) -> String {
        format!("{self}.")
    }
}

impl AsKey for String {
    fn as_key(&self) -> String {
        self.to_string()
    }

    fn as_prefix(&self) -> String {
        format!("{self}.")
    }
}

impl<T: AsRef<str> + Clone, U: AsRef<str> + Clone> AsKey for (T, U) {
    fn as_key(&self) -> String {
        format!("{}.{}", self.0.as_ref(), self.1.as_ref())
    }

    fn as_prefix(&self) -> String {
        format!("{}.{}.", self.0.as_ref(), self.1.as_ref())
    }
}

impl<T: AsRef<str> + Clone, U: AsRef<str> + Clone, V: AsRef<str> + Clone> AsKey for (T, U, V) {
    fn as_key(&self) -> String {
        format!("{}.{}.{}", self.0.as_ref(), self.1.as_ref(), self.2.as_ref())
    }

    fn as_prefix(&self) -> String {
        format!(
            "{}.{}.{}.",
            self.0.as_ref(),
            self.1.as_ref(),
            self.2.as_ref()
        )
    }
}

impl<T: AsRef<str> + Clone, U: AsRef<str> + Clone, V: AsRef<str> + Clone, W: AsRef<str> + Clone>
    AsKey for (T, U, V, W)
{
    fn as_key(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.0.as_ref(),
            self.1.as_ref(),
            self.2.as_ref(),
            self.3.as_ref()
        )
    }

    fn as_prefix(&self) -> String {
        format!(
            "{}.{}.{}.{}.",
            self.0.as_ref(),
            self.1.as_ref(),
            self.2.as_ref(),
            self.3.as_ref()
        )
    }
}

impl ParseValue for String {
    fn parse_value(_key: impl AsKey, value: &str) -> super::Result<Self> {
        Ok(value.to_string())
    }
}

impl ParseValue for PathBuf {
    fn parse_value(_key: impl AsKey, value: &str) -> super::Result<Self> {
        Ok(PathBuf::from(value))
    }
}

impl ParseValue for bool {
    fn parse_value(key: impl AsKey, value: &str) -> super::Result<Self> {
        value
            .parse()
            .map_err(|_| format!("Invalid boolean value {:?} for property {:?}.", value, key.as_key()))
    }
}

macro_rules! impl_parse_number {
    ($($t:ty)*) => ($(
        impl ParseValue for $t {
            fn parse_value(key: impl AsKey, value: &str) -> super::Result<Self> {
                value.parse().map_err(|_| {
                    format!(
                        "Invalid numeric value {:?} for property {:?}.",
                        value,
                        key.as_key()
                    )
                })
            }
        }
    )*)
}

impl_parse_number! { u16 u32 u64 usize }

impl ParseValue for Duration {
    fn parse_value(key: impl AsKey, value: &str) -> super::Result<Self> {
        let duration = value.trim().to_ascii_lowercase();
        let (num, multiplier) = if let Some(num) = duration.strip_suffix("ms") {
            (num, 1)
        } else if let Some(num) = duration.strip_suffix('s') {
            (num, 1000)
        } else if let Some(num) = duration.strip_suffix('m') {
            (num, 60 * 1000)
        } else if let Some(num) = duration.strip_suffix('h') {
            (num, 60 * 60 * 1000)
        } else if let Some(num) = duration.strip_suffix('d') {
            (num, 24 * 60 * 60 * 1000)
        } else {
            (duration.as_str(), 1)
        };
        num.trim()
            .parse::<u64>()
            .ok()
            .and_then(|num| {
                if num > 0 {
                    Some(Duration::from_millis(num * multiplier))
                } else {
                    None
                }
            })
            .ok_or_else(|| {
                format!(
                    "Invalid duration value {:?} for property {:?}.",
                    value,
                    key.as_key()
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::AsKey;
    use crate::config::Config;

    #[test]
    fn keys_and_prefixes() {
        assert_eq!(("a", "b").as_key(), "a.b");
        assert_eq!(("a", "b").as_prefix(), "a.b.");
        assert_eq!(("a", "b", "c").as_key(), "a.b.c");
        assert_eq!(("a", "b", "c", "d").as_prefix(), "a.b.c.d.");
    }

    #[test]
    fn typed_properties() {
        let config = Config::new(
            r#"
[pool]
max-connections = 10
timeout = "5s"
lifetime = "30m"

[probe]
enable = true
"#,
        )
        .unwrap();

        assert_eq!(
            config.property::<u32>(("pool", "max-connections")).unwrap(),
            Some(10)
        );
        assert_eq!(
            config
                .property_or_static::<Duration>(("pool", "timeout"), "15s")
                .unwrap(),
            Duration::from_secs(5)
        );
        assert_eq!(
            config
                .property_or_static::<Duration>(("pool", "connect-timeout"), "15s")
                .unwrap(),
            Duration::from_secs(15)
        );
        assert_eq!(
            config
                .property::<Duration>(("pool", "lifetime"))
                .unwrap(),
            Some(Duration::from_secs(30 * 60))
        );
        assert_eq!(config.property::<bool>(("probe", "enable")).unwrap(), Some(true));
        assert_eq!(
            config
                .properties::<Duration>(("pool", "timeout"))
                .collect::<Result<Vec<_>, _>>()
                .unwrap(),
            [("pool.timeout", Duration::from_secs(5))]
        );
        assert!(config.property::<u32>(("pool", "timeout")).is_err());
        assert!(config.value_require(("probe", "nope")).is_err());
    }

    #[test]
    fn sub_key_iteration() {
        let config = Config::new(
            r#"
[directory."ldap"]
type = "ldap"

[directory."sim"]
type = "memory"

[directory."sim".options]
catalog = true
"#,
        )
        .unwrap();

        assert_eq!(
            config.sub_keys("directory").collect::<Vec<_>>(),
            ["ldap", "sim"]
        );
        assert!(config.has_prefix(("directory", "sim")));
        assert!(!config.has_prefix(("directory", "nope")));
    }
}
