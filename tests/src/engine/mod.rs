/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::{fs, path::PathBuf, sync::Arc};

use chrono::{NaiveDate, NaiveDateTime};
use directory::{config::ConfigDirectory, probe::ReachableDomains, Identity};
use engine::{
    config::EngineSettings,
    render::{TextRenderer, GENERATED_MARKER},
    run::{self, RunEnvironment},
    store::FileStore,
    variables::AttributeVariables,
};
use utils::config::Config;

use crate::temp_dir;

const CONFIG: &str = r#"
[directory]
type = "memory"

[directory.users.alice]
dn = "CN=Alice,OU=Staff,DC=corp,DC=example,DC=com"
legacy-dn = "/o=Org/cn=Recipients/cn=alice"
domain = "corp.example.com"
token-groups = ["S-1-5-21-1-1-1-513", "S-1-5-21-1-1-1-1104"]

[directory.users.alice.attributes]
givenName = "Alice"

[directory.users.bob]
dn = "CN=Bob,OU=Staff,DC=corp,DC=example,DC=com"
legacy-dn = "/o=Org/cn=Recipients/cn=bob"
domain = "corp.example.com"
token-groups = ["S-1-5-21-1-1-1-513"]

[directory.users.bob.attributes]
givenName = "Bob"

[directory.groups.sales]
domain = "corp.example.com"
account-name = "sales"
display-name = "Sales Team"
sid = "S-1-5-21-1-1-1-1104"

[signatures]
path = "{SIG}"
formats = ["html", "text"]

[auto-reply]
path = "{OOF}"
formats = ["html"]

[templates]
extensions = ["htm"]

[output]
path = "{OUT}"

[variables.literals]
COMPANY = "Example Corp"
"#;

struct TestDirs {
    sig: PathBuf,
    oof: PathBuf,
    out: PathBuf,
}

fn dirs(name: &str) -> TestDirs {
    TestDirs {
        sig: temp_dir(&format!("{name}-sig")),
        oof: temp_dir(&format!("{name}-oof")),
        out: temp_dir(&format!("{name}-out")),
    }
}

fn build_config(dirs: &TestDirs) -> Config {
    Config::new(
        &CONFIG
            .replace("{SIG}", dirs.sig.to_str().unwrap())
            .replace("{OOF}", dirs.oof.to_str().unwrap())
            .replace("{OUT}", dirs.out.to_str().unwrap()),
    )
    .unwrap()
}

async fn build_env(config: &Config) -> (EngineSettings, RunEnvironment) {
    let settings = EngineSettings::from_config(config).unwrap();
    let writer = FileStore::open(&settings.output).await.unwrap();
    let env = RunEnvironment {
        directory: Arc::new(config.parse_directory().unwrap()),
        domains: ReachableDomains {
            directory: vec!["corp.example.com".to_string()],
            global: vec!["corp.example.com".to_string()],
        },
        variables: Box::new(AttributeVariables::from_config(config).unwrap()),
        renderer: Box::new(TextRenderer),
        writer: Box::new(writer),
    };
    (settings, env)
}

fn alice() -> Identity {
    let mut identity = Identity::new("alice@corp.example.com");
    identity.legacy_dn = Some("/o=Org/cn=Recipients/cn=alice".to_string());
    identity
}

fn bob() -> Identity {
    let mut identity = Identity::new("bob@corp.example.com");
    identity.legacy_dn = Some("/o=Org/cn=Recipients/cn=bob".to_string());
    identity
}

fn clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn read(dirs: &TestDirs, name: &str) -> String {
    fs::read_to_string(dirs.out.join(name)).unwrap()
}

fn profile(dirs: &TestDirs, name: &str) -> String {
    fs::read_to_string(dirs.out.join("profiles").join(name)).unwrap()
}

#[tokio::test]
async fn signatures_deploy_with_reuse_and_defaults() {
    let dirs = dirs("deploy");
    for (name, contents) in [
        (
            "corporate.[DefaultNew].htm",
            "Hello $MAILBOXGIVENNAME$ at $COMPANY$",
        ),
        (
            "sales.[CORP.EXAMPLE.COM Sales Team][DefaultReplyFwd].htm",
            "Sales greetings",
        ),
        ("vip.[alice@corp.example.com].htm", "Kind regards"),
        ("promo.[202412010000-202412312359].htm", "Season sale"),
    ] {
        fs::write(dirs.sig.join(name), contents).unwrap();
    }
    let config = build_config(&dirs);
    let (settings, mut env) = build_env(&config).await;

    let report = run::execute(&settings, &mut env, vec![alice(), bob()], clock())
        .await
        .unwrap();

    assert_eq!(report.identities, 2);
    assert_eq!(report.rendered, 3);
    assert_eq!(report.outcomes[0].address, "alice@corp.example.com");
    assert_eq!(report.outcomes[0].signatures, 3);
    assert_eq!(report.outcomes[1].signatures, 1);
    assert!(report.outcomes.iter().all(|outcome| outcome.directory_backed));

    // The shared artifact keeps the first render, so Bob reuses the copy
    // expanded with Alice's attributes.
    assert_eq!(
        read(&dirs, "corporate.htm"),
        format!("Hello Alice at Example Corp\n<!-- {GENERATED_MARKER} -->\n")
    );
    assert_eq!(read(&dirs, "corporate.txt"), "Hello Alice at Example Corp");
    assert!(dirs.out.join("sales.htm").exists());
    assert!(dirs.out.join("vip.txt").exists());
    assert!(!dirs.out.join("promo.htm").exists());

    assert_eq!(
        profile(&dirs, "alice@corp.example.com.signatures"),
        "new = \"corporate\"\nreply-forward = \"sales\"\n"
    );
    assert_eq!(
        profile(&dirs, "bob@corp.example.com.signatures"),
        "new = \"corporate\"\n"
    );
    assert!(!dirs
        .out
        .join("profiles")
        .join("alice@corp.example.com.autoreply")
        .exists());
}

#[tokio::test]
async fn auto_reply_roles_split() {
    let dirs = dirs("split");
    fs::write(dirs.oof.join("away.[Internal].htm"), "Away inside").unwrap();
    fs::write(dirs.oof.join("travel.[External].htm"), "Away outside").unwrap();
    let config = build_config(&dirs);
    let (settings, mut env) = build_env(&config).await;

    let report = run::execute(&settings, &mut env, vec![alice()], clock())
        .await
        .unwrap();

    assert_eq!(report.rendered, 2);
    assert!(report.outcomes[0].auto_reply);
    assert_eq!(
        profile(&dirs, "alice@corp.example.com.autoreply"),
        "internal = \"away\"\nexternal = \"travel\"\nshared = false\n"
    );
    assert!(dirs.out.join("away.htm").exists());
    assert!(dirs.out.join("travel.htm").exists());
    assert!(!dirs.out.join("away.txt").exists());
}

#[tokio::test]
async fn untagged_auto_reply_is_shared() {
    let dirs = dirs("shared");
    fs::write(dirs.oof.join("away.htm"), "Out of office").unwrap();
    let config = build_config(&dirs);
    let (settings, mut env) = build_env(&config).await;

    let report = run::execute(&settings, &mut env, vec![alice()], clock())
        .await
        .unwrap();

    assert_eq!(report.rendered, 1);
    assert_eq!(
        profile(&dirs, "alice@corp.example.com.autoreply"),
        "internal = \"away\"\nexternal = \"away\"\nshared = true\n"
    );
}

#[tokio::test]
async fn cleanup_removes_stale_generated_files() {
    let dirs = dirs("cleanup");
    fs::write(dirs.sig.join("corporate.htm"), "Current").unwrap();
    fs::write(
        dirs.out.join("stale.htm"),
        format!("Old<!-- {GENERATED_MARKER} -->"),
    )
    .unwrap();
    fs::write(dirs.out.join("stale.txt"), "Old").unwrap();
    fs::write(dirs.out.join("manual.htm"), "Hand made").unwrap();
    let config = build_config(&dirs);
    let (settings, mut env) = build_env(&config).await;

    run::execute(&settings, &mut env, vec![alice()], clock())
        .await
        .unwrap();

    assert!(dirs.out.join("corporate.htm").exists());
    assert!(!dirs.out.join("stale.htm").exists());
    assert!(!dirs.out.join("stale.txt").exists());
    assert!(dirs.out.join("manual.htm").exists());
}

#[tokio::test]
async fn reruns_are_deterministic() {
    let dirs = dirs("rerun");
    fs::write(
        dirs.sig.join("corporate.[DefaultNew].htm"),
        "Hello $MAILBOXGIVENNAME$",
    )
    .unwrap();
    fs::write(dirs.sig.join("vip.[alice@corp.example.com].htm"), "Kind regards").unwrap();
    let config = build_config(&dirs);

    let (settings, mut env) = build_env(&config).await;
    run::execute(&settings, &mut env, vec![alice(), bob()], clock())
        .await
        .unwrap();
    let first = (
        read(&dirs, "corporate.htm"),
        read(&dirs, "vip.htm"),
        profile(&dirs, "alice@corp.example.com.signatures"),
    );

    let (settings, mut env) = build_env(&config).await;
    run::execute(&settings, &mut env, vec![alice(), bob()], clock())
        .await
        .unwrap();
    assert_eq!(first.0, read(&dirs, "corporate.htm"));
    assert_eq!(first.1, read(&dirs, "vip.htm"));
    assert_eq!(
        first.2,
        profile(&dirs, "alice@corp.example.com.signatures"),
    );
}
