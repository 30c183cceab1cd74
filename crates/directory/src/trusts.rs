/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use crate::{Directory, Result};

/// Builds the ordered domain working set from the configured include
/// list. `*` expands in place to the trust partners of the home domain,
/// a leading `-` removes a domain wherever else it appears, and the home
/// domain always comes first and cannot be removed. Trust discovery
/// errors propagate: a home forest that cannot answer is a precondition
/// failure, not something to prune.
pub async fn expand(
    directory: &Directory,
    home_domain: &str,
    include: &[String],
) -> Result<Vec<String>> {
    let removals = include
        .iter()
        .filter_map(|entry| entry.strip_prefix('-'))
        .map(|entry| entry.trim().to_ascii_lowercase())
        .collect::<Vec<_>>();
    let mut domains: Vec<String> = vec![home_domain.to_string()];

    let push = |domains: &mut Vec<String>, domain: &str| {
        let domain = domain.trim();
        if domain.is_empty()
            || removals.contains(&domain.to_ascii_lowercase())
            || domains.iter().any(|item| item.eq_ignore_ascii_case(domain))
        {
            return;
        }
        domains.push(domain.to_string());
    };

    for entry in include {
        if entry.starts_with('-') {
            continue;
        } else if entry.trim() == "*" {
            for partner in directory.trusted_domains(home_domain).await? {
                push(&mut domains, &partner);
            }
        } else {
            push(&mut domains, entry);
        }
    }

    Ok(domains)
}
