/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use chrono::NaiveDateTime;
use directory::{probe::ReachableDomains, sid::SecurityId, Directory};

use crate::{
    context::ResolutionContext,
    pool::{Template, TemplatePool},
    window::WindowStatus,
};

/// Bucketed view of a template pool, computed once per run against a
/// frozen clock. Indices refer into `pool.templates`; a template tagged
/// with both group and mailbox tokens appears in both buckets and is
/// deduplicated when a resolution walks them.
pub struct ClassifiedPool {
    pub pool: TemplatePool,
    pub common: Vec<usize>,
    pub group: Vec<GroupEntry>,
    pub mailbox: Vec<MailboxEntry>,
}

pub struct GroupEntry {
    pub template: usize,
    pub sids: Vec<SecurityId>,
}

pub struct MailboxEntry {
    pub template: usize,
    pub addresses: Vec<String>,
}

impl ClassifiedPool {
    pub async fn classify(
        pool: TemplatePool,
        directory: &Directory,
        domains: &ReachableDomains,
        ctx: &mut ResolutionContext,
        now: NaiveDateTime,
    ) -> Self {
        let mut common = Vec::new();
        let mut group = Vec::new();
        let mut mailbox = Vec::new();

        for (index, template) in pool.templates.iter().enumerate() {
            if !window_active(template, now) {
                tracing::debug!(
                    context = "templates",
                    event = "window",
                    flow = pool.flow.as_str(),
                    file = template.file_name.as_str(),
                    "Template is outside all of its time ranges"
                );
                continue;
            }

            let mut has_group_tag = false;
            let mut sids = Vec::new();
            for (domain, name) in template.group_tags() {
                has_group_tag = true;
                if let Some(sid) = ctx.group_sid(directory, domains, domain, name).await {
                    sids.push(sid);
                }
            }
            sids.sort_unstable();
            sids.dedup();

            let addresses = template
                .mailbox_tags()
                .map(|address| address.to_string())
                .collect::<Vec<_>>();

            if !has_group_tag && addresses.is_empty() {
                common.push(index);
                continue;
            }
            if !sids.is_empty() {
                group.push(GroupEntry {
                    template: index,
                    sids,
                });
            }
            if !addresses.is_empty() {
                mailbox.push(MailboxEntry {
                    template: index,
                    addresses,
                });
            }
        }

        ClassifiedPool {
            pool,
            common,
            group,
            mailbox,
        }
    }

    pub fn template(&self, index: usize) -> &Template {
        &self.pool.templates[index]
    }
}

// A file is valid when it has no time ranges at all or at least one of
// them covers `now`. Ranges that cannot be evaluated count as inactive.
fn window_active(template: &Template, now: NaiveDateTime) -> bool {
    let mut has_window = false;
    let mut active = false;
    for window in template.time_windows() {
        has_window = true;
        match window.evaluate(now) {
            WindowStatus::Active => active = true,
            WindowStatus::Inactive => {}
            WindowStatus::Invalid => {
                tracing::warn!(
                    context = "templates",
                    event = "window",
                    file = template.file_name.as_str(),
                    range = window.raw(),
                    "Ignoring invalid time range"
                );
            }
        }
    }
    !has_window || active
}
