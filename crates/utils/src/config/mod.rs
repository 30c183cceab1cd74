/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

pub mod utils;

use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct Config {
    pub keys: BTreeMap<String, String>,
}

pub type Result<T> = std::result::Result<T, String>;

impl Config {
    pub fn new(config: &str) -> Result<Self> {
        let mut cfg = Config {
            keys: BTreeMap::new(),
        };
        cfg.parse(config)?;
        cfg.resolve_env_macros();
        Ok(cfg)
    }

    pub fn parse(&mut self, config: &str) -> Result<()> {
        match toml::from_str::<toml::Value>(config)
            .map_err(|err| format!("Failed to parse configuration: {err}"))?
        {
            toml::Value::Table(table) => {
                for (key, value) in table {
                    self.flatten(key, value);
                }
                Ok(())
            }
            _ => Err("Invalid configuration: expected a table at the top level".to_string()),
        }
    }

    // Nested tables become dotted keys, arrays become zero-padded
    // positional sub-keys so that ordering survives the BTreeMap.
    fn flatten(&mut self, prefix: String, value: toml::Value) {
        match value {
            toml::Value::Table(table) => {
                for (key, value) in table {
                    self.flatten(format!("{prefix}.{key}"), value);
                }
            }
            toml::Value::Array(array) => {
                for (pos, value) in array.into_iter().enumerate() {
                    self.flatten(format!("{prefix}.{pos:04}"), value);
                }
            }
            toml::Value::String(string) => {
                self.keys.insert(prefix, string);
            }
            value => {
                self.keys.insert(prefix, value.to_string());
            }
        }
    }

    fn resolve_env_macros(&mut self) {
        for value in self.keys.values_mut() {
            while let Some(start) = value.find("%{env:") {
                let Some(len) = value[start + 6..].find("}%") else {
                    break;
                };
                let name = value[start + 6..start + 6 + len].to_string();
                let replacement = std::env::var(name).unwrap_or_default();
                value.replace_range(start..start + 6 + len + 2, &replacement);
            }
        }
    }
}
