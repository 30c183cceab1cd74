/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use super::{MemoryDirectory, MemoryUser};
use crate::{probe::PortKind, sid::SecurityId, DirectoryError, MailboxObject, Result};

impl MemoryDirectory {
    pub fn probe(&self, domain: &str, kind: PortKind) -> Result<()> {
        if self
            .unreachable
            .contains(&(domain.to_ascii_lowercase(), kind))
        {
            Err(DirectoryError::Timeout)
        } else {
            Ok(())
        }
    }

    pub fn search_mailbox(&self, domain: &str, legacy_dn: &str) -> Result<Vec<MailboxObject>> {
        Ok(self
            .users
            .iter()
            .filter(|user| {
                user.domain.eq_ignore_ascii_case(domain)
                    && user
                        .legacy_dn
                        .as_deref()
                        .is_some_and(|dn| dn.eq_ignore_ascii_case(legacy_dn))
            })
            .map(|user| MailboxObject {
                dn: user.dn.clone(),
                attributes: user.attributes.clone(),
            })
            .collect())
    }

    // Reading a missing object is an error rather than an empty result,
    // matching a base-scope search against an unknown distinguished name.
    pub fn token_groups(&self, domain: &str, dn: &str) -> Result<Vec<SecurityId>> {
        self.find_user(domain, dn)
            .map(|user| user.token_groups.clone())
            .ok_or_else(|| DirectoryError::invalid(format!("no such object {dn:?} in {domain:?}")))
    }

    pub fn global_universal_groups(&self, domain: &str, dn: &str) -> Result<Vec<SecurityId>> {
        self.find_user(domain, dn)
            .map(|user| user.global_universal.clone())
            .ok_or_else(|| DirectoryError::invalid(format!("no such object {dn:?} in {domain:?}")))
    }

    pub fn foreign_principals(&self, domain: &str, sids: &[SecurityId]) -> Result<Vec<String>> {
        Ok(self
            .principals
            .iter()
            .filter(|principal| {
                principal.domain.eq_ignore_ascii_case(domain) && sids.contains(&principal.sid)
            })
            .map(|principal| principal.dn.clone())
            .collect())
    }

    pub fn groups_with_member(&self, domain: &str, members: &[String]) -> Result<Vec<SecurityId>> {
        Ok(self
            .groups
            .iter()
            .filter(|group| {
                group.domain.eq_ignore_ascii_case(domain)
                    && group.members.iter().any(|member| {
                        members.iter().any(|dn| dn.eq_ignore_ascii_case(member))
                    })
            })
            .map(|group| group.sid.clone())
            .collect())
    }

    pub fn group_by_account_name(&self, domain: &str, name: &str) -> Result<Option<SecurityId>> {
        Ok(self
            .groups
            .iter()
            .find(|group| {
                group.domain.eq_ignore_ascii_case(domain)
                    && group.account_name.eq_ignore_ascii_case(name)
            })
            .map(|group| group.sid.clone()))
    }

    pub fn group_by_display_name(&self, domain: &str, name: &str) -> Result<Option<SecurityId>> {
        Ok(self
            .groups
            .iter()
            .find(|group| {
                group.domain.eq_ignore_ascii_case(domain)
                    && group.display_name.eq_ignore_ascii_case(name)
            })
            .map(|group| group.sid.clone()))
    }

    pub fn trusted_domains(&self, _domain: &str) -> Result<Vec<String>> {
        Ok(self.trusts.clone())
    }

    fn find_user(&self, domain: &str, dn: &str) -> Option<&MemoryUser> {
        self.users.iter().find(|user| {
            user.domain.eq_ignore_ascii_case(domain) && user.dn.eq_ignore_ascii_case(dn)
        })
    }
}
