/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use ahash::AHashMap;
use ldap3::LdapConnSettings;
use parking_lot::Mutex;
use utils::config::{utils::AsKey, Config};

use super::{Bind, LdapDirectory, LdapMappings, PoolSettings, Ports};
use crate::probe::PortKind;

pub(crate) const DEFAULT_MAILBOX_ATTRIBUTES: &[&str] = &[
    "givenName",
    "sn",
    "displayName",
    "mail",
    "title",
    "department",
    "company",
    "physicalDeliveryOfficeName",
    "telephoneNumber",
    "mobile",
    "streetAddress",
    "l",
    "st",
    "postalCode",
    "co",
];

impl LdapDirectory {
    pub fn from_config(config: &Config, prefix: impl AsKey) -> utils::config::Result<Self> {
        let prefix = prefix.as_key();

        let mut settings = LdapConnSettings::new()
            .set_conn_timeout(config.property_or_static((&prefix, "timeout"), "30s")?);
        if config.property_or_static((&prefix, "tls.enable"), "false")? {
            settings = settings.set_starttls(true);
        }
        if config.property_or_static((&prefix, "tls.allow-invalid-certs"), "false")? {
            settings = settings.set_no_tls_verify(true);
        }

        let bind = if let Some(dn) = config.value((&prefix, "bind.dn")) {
            Some(Bind {
                dn: dn.to_string(),
                password: config.value_require((&prefix, "bind.secret"))?.to_string(),
            })
        } else {
            None
        };

        let mut attrs_mailbox = config
            .values((&prefix, "attributes"))
            .map(|(_, attr)| attr.to_string())
            .collect::<Vec<_>>();
        if attrs_mailbox.is_empty() {
            attrs_mailbox = DEFAULT_MAILBOX_ATTRIBUTES
                .iter()
                .map(|attr| attr.to_string())
                .collect();
        }

        Ok(LdapDirectory {
            settings,
            bind,
            mappings: LdapMappings {
                filter_mailbox: config.property_or_static(
                    (&prefix, "filter.mailbox"),
                    "(&(objectCategory=person)(objectClass=user)(legacyExchangeDN=?))",
                )?,
                filter_group_account: config.property_or_static(
                    (&prefix, "filter.group-account"),
                    "(&(objectCategory=group)(sAMAccountName=?))",
                )?,
                filter_group_display: config.property_or_static(
                    (&prefix, "filter.group-display"),
                    "(&(objectCategory=group)(displayName=?))",
                )?,
                attr_sid: config.property_or_static((&prefix, "attr.sid"), "objectSid")?,
                attr_token_groups: config
                    .property_or_static((&prefix, "attr.token-groups"), "tokenGroups")?,
                attr_token_groups_global_universal: config.property_or_static(
                    (&prefix, "attr.token-groups-global-universal"),
                    "tokenGroupsGlobalAndUniversal",
                )?,
                attr_trust_partner: config
                    .property_or_static((&prefix, "attr.trust-partner"), "trustPartner")?,
                attr_trust_direction: config
                    .property_or_static((&prefix, "attr.trust-direction"), "trustDirection")?,
                attrs_mailbox,
            },
            pool_settings: PoolSettings {
                max_connections: config
                    .property_or_static((&prefix, "pool.max-connections"), "10")?,
                min_connections: config
                    .property::<u32>((&prefix, "pool.min-connections"))?
                    .and_then(|min| if min > 0 { Some(min) } else { None }),
                max_lifetime: config.property_or_static((&prefix, "pool.max-lifetime"), "30m")?,
                idle_timeout: config.property_or_static((&prefix, "pool.idle-timeout"), "10m")?,
                connect_timeout: config
                    .property_or_static((&prefix, "pool.connect-timeout"), "30s")?,
            },
            ports: Ports {
                ldap: config
                    .property((&prefix, "port.ldap"))?
                    .unwrap_or_else(|| PortKind::Directory.default_port()),
                gc: config
                    .property((&prefix, "port.global-catalog"))?
                    .unwrap_or_else(|| PortKind::GlobalCatalog.default_port()),
            },
            pools: Mutex::new(AHashMap::new()),
        })
    }
}
