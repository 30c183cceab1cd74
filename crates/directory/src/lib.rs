/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

pub mod config;
pub mod ldap;
pub mod membership;
pub mod memory;
pub mod probe;
pub mod sid;
pub mod trusts;

use ahash::AHashMap;
use ldap3::LdapError;

use crate::{ldap::LdapDirectory, memory::MemoryDirectory, probe::PortKind, sid::SecurityId};

/// A mailbox to provision, as reported by the external profile enumerator.
/// The directory fields are filled in during membership resolution and the
/// identity is dropped once its pass completes.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub address: String,
    pub proxy_addresses: Vec<String>,
    pub legacy_dn: Option<String>,
    pub dn: Option<String>,
    pub home_domain: Option<String>,
    pub attributes: AHashMap<String, Vec<String>>,
    pub sids: Vec<SecurityId>,
}

impl Identity {
    pub fn new(address: impl Into<String>) -> Self {
        Identity {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.address.as_str())
            .chain(self.proxy_addresses.iter().map(|addr| addr.as_str()))
    }

    pub fn matches_address(&self, address: &str) -> bool {
        self.addresses()
            .any(|addr| addr.eq_ignore_ascii_case(address))
    }
}

/// A user object returned by a mailbox search, with the attribute values
/// requested for variable expansion.
#[derive(Debug, Clone)]
pub struct MailboxObject {
    pub dn: String,
    pub attributes: AHashMap<String, Vec<String>>,
}

pub struct Directory {
    inner: DirectoryInner,
}

pub(crate) enum DirectoryInner {
    Ldap(LdapDirectory),
    Memory(MemoryDirectory),
}

impl Directory {
    /// Verifies that the domain answers on the given service port.
    pub async fn probe(&self, domain: &str, kind: PortKind) -> Result<()> {
        match &self.inner {
            DirectoryInner::Ldap(store) => store.probe(domain, kind).await,
            DirectoryInner::Memory(store) => store.probe(domain, kind),
        }
    }

    /// Searches one domain's global catalog for the user object holding
    /// the given legacy directory identifier. Multiple entries indicate
    /// an ambiguous identifier and are returned for the caller to judge.
    pub async fn search_mailbox(&self, domain: &str, legacy_dn: &str) -> Result<Vec<MailboxObject>> {
        match &self.inner {
            DirectoryInner::Ldap(store) => store.search_mailbox(domain, legacy_dn).await,
            DirectoryInner::Memory(store) => store.search_mailbox(domain, legacy_dn),
        }
    }

    /// Full transitive same-forest membership of an object.
    pub async fn token_groups(&self, domain: &str, dn: &str) -> Result<Vec<SecurityId>> {
        match &self.inner {
            DirectoryInner::Ldap(store) => store.token_groups(domain, dn).await,
            DirectoryInner::Memory(store) => store.token_groups(domain, dn),
        }
    }

    /// The subset of memberships that can cross a trust boundary, used as
    /// the candidate set for foreign lookups.
    pub async fn global_universal_groups(&self, domain: &str, dn: &str) -> Result<Vec<SecurityId>> {
        match &self.inner {
            DirectoryInner::Ldap(store) => store.global_universal_groups(domain, dn).await,
            DirectoryInner::Memory(store) => store.global_universal_groups(domain, dn),
        }
    }

    /// Distinguished names of the foreign-security-principal objects a
    /// trusting domain keeps for any of the given identifiers.
    pub async fn foreign_principals(
        &self,
        domain: &str,
        sids: &[SecurityId],
    ) -> Result<Vec<String>> {
        match &self.inner {
            DirectoryInner::Ldap(store) => store.foreign_principals(domain, sids).await,
            DirectoryInner::Memory(store) => store.foreign_principals(domain, sids),
        }
    }

    /// Groups listing any of the given distinguished names as a direct
    /// member. Never recursive.
    pub async fn groups_with_member(
        &self,
        domain: &str,
        members: &[String],
    ) -> Result<Vec<SecurityId>> {
        match &self.inner {
            DirectoryInner::Ldap(store) => store.groups_with_member(domain, members).await,
            DirectoryInner::Memory(store) => store.groups_with_member(domain, members),
        }
    }

    pub async fn group_by_account_name(
        &self,
        domain: &str,
        name: &str,
    ) -> Result<Option<SecurityId>> {
        match &self.inner {
            DirectoryInner::Ldap(store) => store.group_by_account_name(domain, name).await,
            DirectoryInner::Memory(store) => store.group_by_account_name(domain, name),
        }
    }

    pub async fn group_by_display_name(
        &self,
        domain: &str,
        name: &str,
    ) -> Result<Option<SecurityId>> {
        match &self.inner {
            DirectoryInner::Ldap(store) => store.group_by_display_name(domain, name).await,
            DirectoryInner::Memory(store) => store.group_by_display_name(domain, name),
        }
    }

    /// Trust partners of the given domain with an outgoing or
    /// bidirectional trust.
    pub async fn trusted_domains(&self, domain: &str) -> Result<Vec<String>> {
        match &self.inner {
            DirectoryInner::Ldap(store) => store.trusted_domains(domain).await,
            DirectoryInner::Memory(store) => store.trusted_domains(domain),
        }
    }
}

#[derive(Debug)]
pub enum DirectoryError {
    Ldap(LdapError),
    Timeout,
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

impl DirectoryError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::warn!(
            context = "directory",
            event = "error",
            reason = %reason,
            "Invalid directory data"
        );
        DirectoryError::Invalid(reason)
    }
}

impl From<LdapError> for DirectoryError {
    fn from(error: LdapError) -> Self {
        tracing::warn!(
            context = "directory",
            event = "error",
            protocol = "ldap",
            reason = %error,
            "LDAP directory error"
        );
        DirectoryError::Ldap(error)
    }
}

impl From<bb8::RunError<LdapError>> for DirectoryError {
    fn from(error: bb8::RunError<LdapError>) -> Self {
        match error {
            bb8::RunError::User(error) => error.into(),
            bb8::RunError::TimedOut => {
                tracing::warn!(
                    context = "directory",
                    event = "timeout",
                    protocol = "ldap",
                    "Connection pool timed out"
                );
                DirectoryError::Timeout
            }
        }
    }
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::Ldap(error) => write!(f, "LDAP error: {error}"),
            DirectoryError::Timeout => f.write_str("directory timed out"),
            DirectoryError::Invalid(reason) => write!(f, "invalid directory data: {reason}"),
        }
    }
}

impl std::error::Error for DirectoryError {}
