/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use ahash::AHashMap;
use utils::config::{utils::AsKey, Config};

use super::{MemoryDirectory, MemoryForeignPrincipal, MemoryGroup, MemoryUser};
use crate::{probe::PortKind, sid::SecurityId};

impl MemoryDirectory {
    pub fn from_config(config: &Config, prefix: impl AsKey) -> utils::config::Result<Self> {
        let prefix = prefix.as_key();
        let mut store = MemoryDirectory::default();

        for id in config.sub_keys((&prefix, "users")) {
            store.users.push(MemoryUser {
                dn: config
                    .value_require((&prefix, "users", id, "dn"))?
                    .to_string(),
                legacy_dn: config
                    .value((&prefix, "users", id, "legacy-dn"))
                    .map(|value| value.to_string()),
                domain: config
                    .value_require((&prefix, "users", id, "domain"))?
                    .to_string(),
                attributes: parse_attributes(config, (&prefix, "users", id, "attributes")),
                token_groups: parse_sids(config, (&prefix, "users", id, "token-groups"))?,
                global_universal: parse_sids(
                    config,
                    (&prefix, "users", id, "global-universal-groups"),
                )?,
            });
        }

        for id in config.sub_keys((&prefix, "groups")) {
            store.groups.push(MemoryGroup {
                domain: config
                    .value_require((&prefix, "groups", id, "domain"))?
                    .to_string(),
                account_name: config
                    .value_require((&prefix, "groups", id, "account-name"))?
                    .to_string(),
                display_name: config
                    .value((&prefix, "groups", id, "display-name"))
                    .unwrap_or_default()
                    .to_string(),
                sid: config.property_require((&prefix, "groups", id, "sid"))?,
                members: config
                    .values((&prefix, "groups", id, "members"))
                    .map(|(_, member)| member.to_string())
                    .collect(),
            });
        }

        for id in config.sub_keys((&prefix, "foreign-principals")) {
            store.principals.push(MemoryForeignPrincipal {
                domain: config
                    .value_require((&prefix, "foreign-principals", id, "domain"))?
                    .to_string(),
                dn: config
                    .value_require((&prefix, "foreign-principals", id, "dn"))?
                    .to_string(),
                sid: config.property_require((&prefix, "foreign-principals", id, "sid"))?,
            });
        }

        store.trusts = config
            .values((&prefix, "trusts"))
            .map(|(_, partner)| partner.to_string())
            .collect();

        for (key, value) in config.values((&prefix, "unreachable")) {
            let (domain, kind) = value
                .split_once(':')
                .ok_or_else(|| format!("Invalid unreachable entry {value:?} for property {key:?}."))?;
            let kind = match kind {
                "ldap" => PortKind::Directory,
                "gc" => PortKind::GlobalCatalog,
                _ => return Err(format!("Invalid port kind {kind:?} for property {key:?}.")),
            };
            store
                .unreachable
                .insert((domain.to_ascii_lowercase(), kind));
        }

        Ok(store)
    }
}

// Attribute names are normalized to lowercase, matching what the LDAP
// backend does with server responses.
fn parse_attributes(config: &Config, prefix: impl AsKey) -> AHashMap<String, Vec<String>> {
    let full_prefix = prefix.as_prefix();
    let mut attributes: AHashMap<String, Vec<String>> = AHashMap::new();
    for (key, value) in config.values(prefix.clone()) {
        let name = key.strip_prefix(&full_prefix).unwrap_or(key);
        let name = name.split_once('.').map_or(name, |(name, _)| name);
        attributes
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }
    attributes
}

fn parse_sids(config: &Config, prefix: impl AsKey) -> utils::config::Result<Vec<SecurityId>> {
    config
        .properties::<SecurityId>(prefix)
        .map(|sid| sid.map(|(_, sid)| sid))
        .collect()
}
