/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use directory::{
    probe::{PortKind, ReachableDomains},
    sid::SecurityId,
    Directory,
};

/// Per-run scratch state threaded through classification and rendering.
/// Group lookups are cached by raw tag text, failures included, so each
/// unique tag costs at most one directory round trip per run. The
/// rendered set keys on template source paths so a template shared by
/// many identities is rendered once.
#[derive(Default)]
pub struct ResolutionContext {
    groups: AHashMap<String, Option<SecurityId>>,
    rendered: AHashSet<PathBuf>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn group_sid(
        &mut self,
        directory: &Directory,
        domains: &ReachableDomains,
        domain: &str,
        name: &str,
    ) -> Option<SecurityId> {
        let tag = format!("{domain} {name}");
        if let Some(cached) = self.groups.get(&tag) {
            return cached.clone();
        }

        // Tags naming a domain outside the verified working set are not
        // queried; connectivity was only established for listed domains.
        let sid = if domains.contains(PortKind::Directory, domain) {
            match directory.group_by_account_name(domain, name).await {
                Ok(Some(sid)) => Some(sid),
                Ok(None) => directory
                    .group_by_display_name(domain, name)
                    .await
                    .unwrap_or_default(),
                Err(_) => None,
            }
        } else {
            None
        };
        if sid.is_none() {
            tracing::warn!(
                context = "resolve",
                event = "group",
                domain = domain,
                group = name,
                "Group tag did not resolve to a security group"
            );
        }
        self.groups.insert(tag, sid.clone());
        sid
    }

    pub fn is_rendered(&self, path: &Path) -> bool {
        self.rendered.contains(path)
    }

    pub fn mark_rendered(&mut self, path: &Path) {
        self.rendered.insert(path.to_path_buf());
    }
}
