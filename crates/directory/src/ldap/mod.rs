/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

pub mod config;
pub mod lookup;
pub mod pool;

use std::time::Duration;

use ahash::AHashMap;
use bb8::Pool;
use ldap3::LdapConnSettings;
use parking_lot::Mutex;
use utils::config::utils::{AsKey, ParseValue};

use self::pool::LdapConnectionManager;
use crate::probe::PortKind;

pub struct LdapDirectory {
    pub(crate) settings: LdapConnSettings,
    pub(crate) bind: Option<Bind>,
    pub(crate) mappings: LdapMappings,
    pub(crate) pool_settings: PoolSettings,
    pub(crate) ports: Ports,
    // Every domain is its own endpoint, so pools are created on first
    // use per (domain, port) pair.
    pub(crate) pools: Mutex<AHashMap<(String, PortKind), Pool<LdapConnectionManager>>>,
}

#[derive(Clone)]
pub(crate) struct Bind {
    pub dn: String,
    pub password: String,
}

pub(crate) struct Ports {
    pub ldap: u16,
    pub gc: u16,
}

pub(crate) struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: Option<u32>,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Default)]
pub struct LdapMappings {
    pub(crate) filter_mailbox: LdapFilter,
    pub(crate) filter_group_account: LdapFilter,
    pub(crate) filter_group_display: LdapFilter,
    pub(crate) attr_sid: String,
    pub(crate) attr_token_groups: String,
    pub(crate) attr_token_groups_global_universal: String,
    pub(crate) attr_trust_partner: String,
    pub(crate) attr_trust_direction: String,
    pub(crate) attrs_mailbox: Vec<String>,
}

#[derive(Debug, Default)]
pub struct LdapFilter {
    filter: Vec<String>,
}

impl LdapFilter {
    pub fn build(&self, value: &str) -> String {
        let value = ldap3::ldap_escape(value);
        self.filter.join(value.as_ref())
    }
}

impl ParseValue for LdapFilter {
    fn parse_value(_key: impl AsKey, value: &str) -> utils::config::Result<Self> {
        Ok(LdapFilter {
            filter: value.split('?').map(|part| part.to_string()).collect(),
        })
    }
}

impl LdapDirectory {
    pub(crate) fn url(&self, domain: &str, kind: PortKind) -> String {
        let port = match kind {
            PortKind::Directory => self.ports.ldap,
            PortKind::GlobalCatalog => self.ports.gc,
        };
        format!("ldap://{domain}:{port}")
    }

    pub(crate) fn base_dn(domain: &str) -> String {
        let mut base = String::with_capacity(domain.len() + 16);
        for part in domain.split('.').filter(|part| !part.is_empty()) {
            if !base.is_empty() {
                base.push(',');
            }
            base.push_str("DC=");
            base.push_str(part);
        }
        base
    }

    pub(crate) fn pool(&self, domain: &str, kind: PortKind) -> Pool<LdapConnectionManager> {
        let key = (domain.to_ascii_lowercase(), kind);
        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(&key) {
            return pool.clone();
        }
        let manager = LdapConnectionManager::new(
            self.url(domain, kind),
            self.settings.clone(),
            self.bind.clone(),
        );
        let pool = Pool::builder()
            .min_idle(self.pool_settings.min_connections)
            .max_size(self.pool_settings.max_connections)
            .max_lifetime(self.pool_settings.max_lifetime)
            .idle_timeout(self.pool_settings.idle_timeout)
            .connection_timeout(self.pool_settings.connect_timeout)
            .test_on_check_out(true)
            .build_unchecked(manager);
        pools.insert(key, pool.clone());
        pool
    }
}

#[cfg(test)]
mod tests {
    use utils::config::utils::ParseValue;

    use super::{LdapDirectory, LdapFilter};

    #[test]
    fn base_dn_from_domain() {
        for (domain, expect) in [
            ("corp.example.com", "DC=corp,DC=example,DC=com"),
            ("example", "DC=example"),
            ("a..b", "DC=a,DC=b"),
        ] {
            assert_eq!(LdapDirectory::base_dn(domain), expect);
        }
    }

    #[test]
    fn filter_placeholder_escaping() {
        let filter =
            LdapFilter::parse_value("filter.test", "(&(objectCategory=group)(sAMAccountName=?))")
                .unwrap();
        assert_eq!(
            filter.build("sales-team"),
            "(&(objectCategory=group)(sAMAccountName=sales-team))"
        );
        assert_eq!(
            filter.build("a(b)*c"),
            "(&(objectCategory=group)(sAMAccountName=a\\28b\\29\\2ac))"
        );
    }
}
