/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::{sync::Arc, time::Duration};

use directory::{
    config::ConfigDirectory,
    membership,
    probe::{DomainProber, PortKind, ReachableDomains},
    sid::SecurityId,
    trusts, Directory, Identity,
};
use utils::config::Config;

const CONFIG: &str = r#"
[directory]
type = "memory"
trusts = ["partner.example.com", "offline.example.com"]
unreachable = [
    "offline.example.com:ldap",
    "offline.example.com:gc",
    "partner.example.com:gc",
]

[directory.users.alice]
dn = "CN=Alice,OU=Staff,DC=corp,DC=example,DC=com"
legacy-dn = "/o=First Organization/ou=Exchange Administrative Group/cn=Recipients/cn=alice"
domain = "corp.example.com"
token-groups = ["S-1-5-21-1-1-1-513", "S-1-5-21-1-1-1-1104"]
global-universal-groups = ["S-1-5-21-1-1-1-1104"]

[directory.users.alice.attributes]
givenName = "Alice"
sn = "Wonder"
title = "Head of Sales"

[directory.groups.sales]
domain = "corp.example.com"
account-name = "sales"
display-name = "Sales Team"
sid = "S-1-5-21-1-1-1-1104"
members = ["CN=Alice,OU=Staff,DC=corp,DC=example,DC=com"]

[directory.groups.partner-local]
domain = "partner.example.com"
account-name = "corp-collab"
display-name = "Corp Collaboration"
sid = "S-1-5-21-2-2-2-2201"
members = ["CN=S-1-5-21-1-1-1-1104,CN=ForeignSecurityPrincipals,DC=partner,DC=example,DC=com"]

[directory.groups.partner-nested]
domain = "partner.example.com"
account-name = "corp-collab-parent"
display-name = "Corp Collaboration Parent"
sid = "S-1-5-21-2-2-2-2300"
members = ["CN=Corp Collaboration,CN=Users,DC=partner,DC=example,DC=com"]

[directory.foreign-principals.alice-fsp]
domain = "partner.example.com"
dn = "CN=S-1-5-21-1-1-1-1104,CN=ForeignSecurityPrincipals,DC=partner,DC=example,DC=com"
sid = "S-1-5-21-1-1-1-1104"
"#;

const CONFIG_AMBIGUOUS: &str = r#"
[directory]
type = "memory"

[directory.users.first]
dn = "CN=Alice,OU=Staff,DC=corp,DC=example,DC=com"
legacy-dn = "/o=Org/cn=Recipients/cn=twin"
domain = "corp.example.com"

[directory.users.second]
dn = "CN=Alice,OU=Contractors,DC=corp,DC=example,DC=com"
legacy-dn = "/o=Org/cn=Recipients/cn=twin"
domain = "corp.example.com"
"#;

fn build_directory(config: &str) -> Arc<Directory> {
    Arc::new(Config::new(config).unwrap().parse_directory().unwrap())
}

fn sid(value: &str) -> SecurityId {
    value.parse().unwrap()
}

fn alice() -> Identity {
    let mut identity = Identity::new("alice@corp.example.com");
    identity.legacy_dn = Some(
        "/o=First Organization/ou=Exchange Administrative Group/cn=Recipients/cn=alice"
            .to_string(),
    );
    identity
}

fn reachable(directory: &[&str], global: &[&str]) -> ReachableDomains {
    ReachableDomains {
        directory: directory.iter().map(|domain| domain.to_string()).collect(),
        global: global.iter().map(|domain| domain.to_string()).collect(),
    }
}

#[tokio::test]
async fn working_set_is_probed_and_pruned() {
    let directory = build_directory(CONFIG);
    let working_set = trusts::expand(&directory, "corp.example.com", &["*".to_string()])
        .await
        .unwrap();
    assert_eq!(
        working_set,
        [
            "corp.example.com",
            "partner.example.com",
            "offline.example.com"
        ]
    );

    let prober = DomainProber {
        max_parallel: 4,
        timeout: Duration::from_secs(2),
    };
    let survivors = prober
        .verify(&directory, working_set, PortKind::Directory)
        .await;
    assert_eq!(survivors, ["corp.example.com", "partner.example.com"]);
    let global = prober
        .verify(&directory, survivors.clone(), PortKind::GlobalCatalog)
        .await;
    assert_eq!(global, ["corp.example.com"]);
}

#[tokio::test]
async fn membership_crosses_one_trust_hop() {
    let directory = build_directory(CONFIG);
    let domains = reachable(
        &["corp.example.com", "partner.example.com"],
        &["corp.example.com"],
    );
    let mut identity = alice();
    assert!(membership::resolve(&directory, &domains, &mut identity)
        .await
        .unwrap());

    assert_eq!(identity.home_domain.as_deref(), Some("corp.example.com"));
    assert_eq!(
        identity.dn.as_deref(),
        Some("CN=Alice,OU=Staff,DC=corp,DC=example,DC=com")
    );
    assert_eq!(
        identity.attributes.get("givenname"),
        Some(&vec!["Alice".to_string()])
    );
    // The nested partner group never enters: foreign membership is one
    // non-recursive hop over the foreign security principals.
    assert_eq!(
        identity.sids,
        [
            sid("S-1-5-21-1-1-1-513"),
            sid("S-1-5-21-1-1-1-1104"),
            sid("S-1-5-21-2-2-2-2201")
        ]
    );
}

#[tokio::test]
async fn pruned_domain_contributes_no_membership() {
    let directory = build_directory(CONFIG);
    let domains = reachable(&["corp.example.com"], &["corp.example.com"]);
    let mut identity = alice();
    assert!(membership::resolve(&directory, &domains, &mut identity)
        .await
        .unwrap());
    assert_eq!(
        identity.sids,
        [sid("S-1-5-21-1-1-1-513"), sid("S-1-5-21-1-1-1-1104")]
    );
}

#[tokio::test]
async fn ambiguous_identifier_disables_group_matching() {
    let directory = build_directory(CONFIG_AMBIGUOUS);
    let domains = reachable(&["corp.example.com"], &["corp.example.com"]);
    let mut identity = Identity::new("twin@corp.example.com");
    identity.legacy_dn = Some("/o=Org/cn=Recipients/cn=twin".to_string());
    assert!(!membership::resolve(&directory, &domains, &mut identity)
        .await
        .unwrap());
    assert!(identity.sids.is_empty());
    assert!(identity.dn.is_none());
}

#[tokio::test]
async fn unknown_identifier_is_not_directory_backed() {
    let directory = build_directory(CONFIG);
    let domains = reachable(&["corp.example.com"], &["corp.example.com"]);
    let mut identity = Identity::new("ghost@corp.example.com");
    identity.legacy_dn = Some("/o=Org/cn=Recipients/cn=ghost".to_string());
    assert!(!membership::resolve(&directory, &domains, &mut identity)
        .await
        .unwrap());
    assert!(identity.sids.is_empty());
}

#[tokio::test]
async fn missing_identifier_skips_the_directory() {
    let directory = build_directory(CONFIG);
    let domains = reachable(&["corp.example.com"], &["corp.example.com"]);
    let mut identity = Identity::new("external@elsewhere.example.net");
    assert!(!membership::resolve(&directory, &domains, &mut identity)
        .await
        .unwrap());
    assert!(identity.attributes.is_empty());
}
