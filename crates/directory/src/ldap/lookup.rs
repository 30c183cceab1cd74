/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::fmt::Write;

use ahash::AHashMap;
use ldap3::{LdapConnAsync, Scope, SearchEntry, SearchOptions};

use super::LdapDirectory;
use crate::{probe::PortKind, sid::SecurityId, MailboxObject, Result};

impl LdapDirectory {
    // Reachability is proven with a size-limited query for any user
    // object rather than a bare connect, as some endpoints accept the
    // TCP handshake but never answer searches.
    pub async fn probe(&self, domain: &str, kind: PortKind) -> Result<()> {
        let (conn, mut ldap) =
            LdapConnAsync::with_settings(self.settings.clone(), &self.url(domain, kind)).await?;
        ldap3::drive!(conn);
        if let Some(bind) = &self.bind {
            ldap.simple_bind(&bind.dn, &bind.password).await?;
        }
        let base = match kind {
            PortKind::Directory => Self::base_dn(domain),
            PortKind::GlobalCatalog => String::new(),
        };
        let search = ldap
            .with_search_options(SearchOptions::new().sizelimit(1))
            .search(&base, Scope::Subtree, "(objectClass=user)", &["1.1"])
            .await?;
        let _ = ldap.unbind().await;
        // A single entry satisfies the check even when the size limit cut
        // the search short; an empty but clean result also counts.
        if search.0.is_empty() {
            search.1.success()?;
        }
        Ok(())
    }

    pub async fn search_mailbox(&self, domain: &str, legacy_dn: &str) -> Result<Vec<MailboxObject>> {
        let filter = self.mappings.filter_mailbox.build(legacy_dn);
        let pool = self.pool(domain, PortKind::GlobalCatalog);
        let mut conn = pool.get().await?;
        // Global catalog searches are rooted at the forest level.
        let (entries, _) = conn
            .search("", Scope::Subtree, &filter, &self.mappings.attrs_mailbox)
            .await?
            .success()?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let entry = SearchEntry::construct(entry);
                let mut attributes = AHashMap::with_capacity(entry.attrs.len());
                for (attr, values) in entry.attrs {
                    attributes.insert(attr.to_ascii_lowercase(), values);
                }
                MailboxObject {
                    dn: entry.dn,
                    attributes,
                }
            })
            .collect())
    }

    pub async fn token_groups(&self, domain: &str, dn: &str) -> Result<Vec<SecurityId>> {
        self.read_sid_attribute(domain, dn, &self.mappings.attr_token_groups)
            .await
    }

    pub async fn global_universal_groups(&self, domain: &str, dn: &str) -> Result<Vec<SecurityId>> {
        self.read_sid_attribute(domain, dn, &self.mappings.attr_token_groups_global_universal)
            .await
    }

    // Token groups are constructed attributes, only readable with a
    // base-scope search against the object itself on the directory port.
    async fn read_sid_attribute(
        &self,
        domain: &str,
        dn: &str,
        attr: &str,
    ) -> Result<Vec<SecurityId>> {
        let pool = self.pool(domain, PortKind::Directory);
        let mut conn = pool.get().await?;
        let (entries, _) = conn
            .search(dn, Scope::Base, "(objectClass=*)", &[attr])
            .await?
            .success()?;
        let mut sids = Vec::new();
        for entry in entries {
            collect_sids(&SearchEntry::construct(entry), attr, &mut sids);
        }
        Ok(sids)
    }

    pub async fn foreign_principals(
        &self,
        domain: &str,
        sids: &[SecurityId],
    ) -> Result<Vec<String>> {
        if sids.is_empty() {
            return Ok(Vec::new());
        }
        let mut filter = String::from("(&(objectClass=foreignSecurityPrincipal)(|");
        for sid in sids {
            let _ = write!(
                filter,
                "({}={})",
                self.mappings.attr_sid,
                sid.filter_escaped()
            );
        }
        filter.push_str("))");
        let pool = self.pool(domain, PortKind::Directory);
        let mut conn = pool.get().await?;
        let (entries, _) = conn
            .search(&Self::base_dn(domain), Scope::Subtree, &filter, &["1.1"])
            .await?
            .success()?;
        Ok(entries
            .into_iter()
            .map(|entry| SearchEntry::construct(entry).dn)
            .collect())
    }

    pub async fn groups_with_member(
        &self,
        domain: &str,
        members: &[String],
    ) -> Result<Vec<SecurityId>> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let mut filter = String::from("(&(objectCategory=group)(|");
        for member in members {
            let _ = write!(filter, "(member={})", ldap3::ldap_escape(member));
        }
        filter.push_str("))");
        let pool = self.pool(domain, PortKind::Directory);
        let mut conn = pool.get().await?;
        let (entries, _) = conn
            .search(
                &Self::base_dn(domain),
                Scope::Subtree,
                &filter,
                &[self.mappings.attr_sid.as_str()],
            )
            .await?
            .success()?;
        let mut sids = Vec::new();
        for entry in entries {
            collect_sids(&SearchEntry::construct(entry), &self.mappings.attr_sid, &mut sids);
        }
        Ok(sids)
    }

    pub async fn group_by_account_name(
        &self,
        domain: &str,
        name: &str,
    ) -> Result<Option<SecurityId>> {
        self.group_lookup(domain, self.mappings.filter_group_account.build(name))
            .await
    }

    pub async fn group_by_display_name(
        &self,
        domain: &str,
        name: &str,
    ) -> Result<Option<SecurityId>> {
        self.group_lookup(domain, self.mappings.filter_group_display.build(name))
            .await
    }

    async fn group_lookup(&self, domain: &str, filter: String) -> Result<Option<SecurityId>> {
        let pool = self.pool(domain, PortKind::Directory);
        let mut conn = pool.get().await?;
        let (entries, _) = conn
            .with_search_options(SearchOptions::new().sizelimit(1))
            .search(
                &Self::base_dn(domain),
                Scope::Subtree,
                &filter,
                &[self.mappings.attr_sid.as_str()],
            )
            .await?
            .success()?;
        let mut sids = Vec::new();
        for entry in entries {
            collect_sids(&SearchEntry::construct(entry), &self.mappings.attr_sid, &mut sids);
        }
        Ok(sids.into_iter().next())
    }

    pub async fn trusted_domains(&self, domain: &str) -> Result<Vec<String>> {
        let pool = self.pool(domain, PortKind::Directory);
        let mut conn = pool.get().await?;
        let base = format!("CN=System,{}", Self::base_dn(domain));
        let (entries, _) = conn
            .search(
                &base,
                Scope::OneLevel,
                "(objectClass=trustedDomain)",
                &[
                    self.mappings.attr_trust_partner.as_str(),
                    self.mappings.attr_trust_direction.as_str(),
                ],
            )
            .await?
            .success()?;
        let mut partners = Vec::new();
        for entry in entries {
            let entry = SearchEntry::construct(entry);
            let Some(partner) = first_attr(&entry, &self.mappings.attr_trust_partner) else {
                continue;
            };
            // Outbound trusts carry bit 0x2 of the direction mask.
            let direction = first_attr(&entry, &self.mappings.attr_trust_direction)
                .and_then(|value| value.parse::<u32>().ok())
                .unwrap_or(0);
            if direction & 2 != 0 {
                partners.push(partner.to_string());
            }
        }
        Ok(partners)
    }
}

fn first_attr<'x>(entry: &'x SearchEntry, attr: &str) -> Option<&'x str> {
    entry.attrs.iter().find_map(|(name, values)| {
        if name.eq_ignore_ascii_case(attr) {
            values.first().map(|value| value.as_str())
        } else {
            None
        }
    })
}

// Identifier values normally arrive as binary attributes, but anything
// that happens to decode as UTF-8 is reported by the protocol layer as a
// plain attribute instead, so both maps are read.
fn collect_sids(entry: &SearchEntry, attr: &str, sids: &mut Vec<SecurityId>) {
    for (name, values) in &entry.bin_attrs {
        if name.eq_ignore_ascii_case(attr) {
            for value in values {
                match SecurityId::from_bytes(value) {
                    Some(sid) => sids.push(sid),
                    None => tracing::warn!(
                        context = "directory",
                        event = "invalid",
                        attribute = %name,
                        "Skipping malformed security identifier"
                    ),
                }
            }
        }
    }
    for (name, values) in &entry.attrs {
        if name.eq_ignore_ascii_case(attr) {
            for value in values {
                match SecurityId::from_bytes(value.as_bytes()) {
                    Some(sid) => sids.push(sid),
                    None => tracing::warn!(
                        context = "directory",
                        event = "invalid",
                        attribute = %name,
                        "Skipping malformed security identifier"
                    ),
                }
            }
        }
    }
}
