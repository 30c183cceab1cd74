/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use crate::{probe::ReachableDomains, Directory, Identity, Result};

/// Resolves the directory side of an identity: the user object behind its
/// legacy identifier, the attribute set for variable expansion and the
/// full cross-forest group membership. Returns whether the identity is
/// directory backed.
///
/// Home-forest query errors propagate; anything involving another domain
/// fails open and only narrows the result.
pub async fn resolve(
    directory: &Directory,
    domains: &ReachableDomains,
    identity: &mut Identity,
) -> Result<bool> {
    let Some(legacy_dn) = identity.legacy_dn.clone() else {
        tracing::info!(
            context = "membership",
            event = "skip",
            address = %identity.address,
            "Identity carries no directory identifier, group matching disabled"
        );
        return Ok(false);
    };

    // Candidate domains are scanned in working-set order; the first domain
    // answering with exactly one entry fixes the home domain.
    let mut home = None;
    for domain in &domains.global {
        match directory.search_mailbox(domain, &legacy_dn).await {
            Ok(entries) if entries.is_empty() => continue,
            Ok(mut entries) => {
                if entries.len() > 1 {
                    tracing::warn!(
                        context = "membership",
                        event = "ambiguous",
                        address = %identity.address,
                        domain = %domain,
                        matches = entries.len(),
                        "Legacy identifier matches more than one object, treating identity as not directory backed"
                    );
                    return Ok(false);
                }
                home = Some((domain.clone(), entries.remove(0)));
                break;
            }
            Err(err) => {
                tracing::warn!(
                    context = "membership",
                    event = "error",
                    address = %identity.address,
                    domain = %domain,
                    reason = %err,
                    "Mailbox search failed, trying the next domain"
                );
            }
        }
    }

    let Some((home_domain, object)) = home else {
        tracing::warn!(
            context = "membership",
            event = "not-found",
            address = %identity.address,
            "Legacy identifier not found in any reachable domain"
        );
        return Ok(false);
    };

    identity.dn = Some(object.dn.clone());
    identity.home_domain = Some(home_domain.clone());
    identity.attributes = object.attributes;

    let mut sids = directory.token_groups(&home_domain, &object.dn).await?;
    let candidates = directory
        .global_universal_groups(&home_domain, &object.dn)
        .await?;

    for domain in domains
        .directory
        .iter()
        .filter(|domain| !domain.eq_ignore_ascii_case(&home_domain))
    {
        if candidates.is_empty() {
            break;
        }
        match foreign_memberships(directory, domain, &candidates).await {
            Ok(mut foreign) => sids.append(&mut foreign),
            Err(err) => {
                tracing::warn!(
                    context = "membership",
                    event = "error",
                    address = %identity.address,
                    domain = %domain,
                    reason = %err,
                    "Foreign membership lookup failed, domain contributes nothing"
                );
            }
        }
    }

    sids.sort_unstable();
    sids.dedup();
    identity.sids = sids;
    Ok(true)
}

/// One pass over a trusting domain: a single batched lookup of the
/// foreign-security-principal objects standing in for the candidate
/// identifiers, then a single non-recursive search for groups holding any
/// of them as a member. Foreign principals only ever appear in
/// domain-local groups, so no transitive step exists here.
async fn foreign_memberships(
    directory: &Directory,
    domain: &str,
    candidates: &[crate::sid::SecurityId],
) -> Result<Vec<crate::sid::SecurityId>> {
    let principals = directory.foreign_principals(domain, candidates).await?;
    if principals.is_empty() {
        return Ok(Vec::new());
    }
    directory.groups_with_member(domain, &principals).await
}
