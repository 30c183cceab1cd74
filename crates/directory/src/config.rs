/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use utils::config::Config;

use crate::{ldap::LdapDirectory, memory::MemoryDirectory, Directory, DirectoryInner};

pub trait ConfigDirectory {
    fn parse_directory(&self) -> utils::config::Result<Directory>;
}

impl ConfigDirectory for Config {
    fn parse_directory(&self) -> utils::config::Result<Directory> {
        let inner = match self.value(("directory", "type")).unwrap_or("ldap") {
            "ldap" => DirectoryInner::Ldap(LdapDirectory::from_config(self, "directory")?),
            "memory" => DirectoryInner::Memory(MemoryDirectory::from_config(self, "directory")?),
            other => {
                return Err(format!("Unsupported directory type: {other:?}"));
            }
        };
        Ok(Directory { inner })
    }
}

/// The home domain plus the raw include list driving working-set
/// expansion.
#[derive(Debug, Clone)]
pub struct DomainSettings {
    pub home: String,
    pub include: Vec<String>,
}

impl DomainSettings {
    pub fn from_config(config: &Config) -> utils::config::Result<Self> {
        let mut include = config
            .values(("domains", "include"))
            .map(|(_, domain)| domain.to_string())
            .collect::<Vec<_>>();
        if include.is_empty() {
            include.push("*".to_string());
        }
        Ok(DomainSettings {
            home: config.value_require(("domains", "home"))?.to_string(),
            include,
        })
    }
}
