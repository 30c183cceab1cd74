/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

pub mod config;
pub mod lookup;

use ahash::{AHashMap, AHashSet};

use crate::{probe::PortKind, sid::SecurityId};

/// Config-defined directory for simulation runs and tests. Implements
/// the same operation set as the LDAP backend over fixture data,
/// including simulated unreachable ports for the connectivity checks.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    pub(crate) users: Vec<MemoryUser>,
    pub(crate) groups: Vec<MemoryGroup>,
    pub(crate) principals: Vec<MemoryForeignPrincipal>,
    pub(crate) trusts: Vec<String>,
    pub(crate) unreachable: AHashSet<(String, PortKind)>,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryUser {
    pub dn: String,
    pub legacy_dn: Option<String>,
    pub domain: String,
    pub attributes: AHashMap<String, Vec<String>>,
    pub token_groups: Vec<SecurityId>,
    pub global_universal: Vec<SecurityId>,
}

#[derive(Debug)]
pub(crate) struct MemoryGroup {
    pub domain: String,
    pub account_name: String,
    pub display_name: String,
    pub sid: SecurityId,
    pub members: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct MemoryForeignPrincipal {
    pub domain: String,
    pub dn: String,
    pub sid: SecurityId,
}
