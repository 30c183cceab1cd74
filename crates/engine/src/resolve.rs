/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use ahash::AHashSet;
use directory::Identity;

use crate::{classify::ClassifiedPool, tag::RoleTag};

/// Ordered signature selection for one identity. Indices refer into the
/// classified pool and appear at most once each, at the position of the
/// first bucket that matched.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub templates: Vec<usize>,
    pub default_new: Option<usize>,
    pub default_reply_forward: Option<usize>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct AutoReplySelection {
    pub internal: Option<usize>,
    pub external: Option<usize>,
    pub shared: bool,
}

pub fn resolve_signatures(classified: &ClassifiedPool, identity: &Identity) -> Resolution {
    let templates = walk(classified, identity);
    let mut default_new = None;
    let mut default_reply_forward = None;
    for &index in &templates {
        let template = classified.template(index);
        if template.has_role(RoleTag::DefaultNew) {
            default_new = Some(index);
        }
        if template.has_role(RoleTag::DefaultReplyFwd) {
            default_reply_forward = Some(index);
        }
    }
    Resolution {
        templates,
        default_new,
        default_reply_forward,
    }
}

/// Walks the buckets in the same order as the signature flow but keeps
/// only the final internal and external choices. A template without an
/// `[Internal]` or `[External]` role applies to both sides; within each
/// side the last match wins, so later buckets override earlier ones.
pub fn resolve_auto_reply(
    classified: &ClassifiedPool,
    identity: &Identity,
) -> AutoReplySelection {
    let mut internal = None;
    let mut external = None;
    for index in walk(classified, identity) {
        let template = classified.template(index);
        let to_internal = template.has_role(RoleTag::Internal);
        let to_external = template.has_role(RoleTag::External);
        let both = !to_internal && !to_external;
        if to_internal || both {
            internal = Some(index);
        }
        if to_external || both {
            external = Some(index);
        }
    }
    AutoReplySelection {
        shared: internal.is_some() && internal == external,
        internal,
        external,
    }
}

// Fixed priority order: Common, then Group filtered by SID intersection,
// then Mailbox filtered by address. An identity without a directory
// mailbox has no membership to intersect and skips the Group bucket.
fn walk(classified: &ClassifiedPool, identity: &Identity) -> Vec<usize> {
    let mut seen = AHashSet::new();
    let mut matched = Vec::new();

    for &index in &classified.common {
        if seen.insert(index) {
            matched.push(index);
        }
    }
    if identity.legacy_dn.is_some() {
        for entry in &classified.group {
            if entry.sids.iter().any(|sid| identity.sids.contains(sid))
                && seen.insert(entry.template)
            {
                matched.push(entry.template);
            }
        }
    }
    for entry in &classified.mailbox {
        if entry
            .addresses
            .iter()
            .any(|address| identity.matches_address(address))
            && seen.insert(entry.template)
        {
            matched.push(entry.template);
        }
    }

    matched
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use directory::Identity;

    use crate::{
        classify::{ClassifiedPool, GroupEntry, MailboxEntry},
        pool::{Template, TemplatePool},
        tag::{TagToken, TemplateName},
        Flow,
    };

    use super::{resolve_auto_reply, resolve_signatures};

    fn template(file_name: &str) -> Template {
        let name = TemplateName::parse(file_name);
        assert!(name.warnings.is_empty(), "{:?}", name.warnings);
        Template {
            path: PathBuf::from("/templates").join(file_name),
            file_name: file_name.to_string(),
            stem: name.stem,
            target_name: name.target_name,
            tokens: name.tokens,
        }
    }

    fn group_sid(template: &Template) -> directory::sid::SecurityId {
        template
            .tokens
            .iter()
            .find_map(|token| match token {
                TagToken::Group { name, .. } => {
                    format!("S-1-5-21-0-0-0-{}", name.len()).parse().ok()
                }
                _ => None,
            })
            .unwrap()
    }

    fn classified(files: &[&str]) -> ClassifiedPool {
        let templates = files.iter().map(|name| template(name)).collect::<Vec<_>>();
        let mut common = Vec::new();
        let mut group = Vec::new();
        let mut mailbox = Vec::new();
        for (index, template) in templates.iter().enumerate() {
            let addresses = template
                .mailbox_tags()
                .map(str::to_string)
                .collect::<Vec<_>>();
            let has_group = template.group_tags().next().is_some();
            if addresses.is_empty() && !has_group {
                common.push(index);
            }
            if has_group {
                group.push(GroupEntry {
                    template: index,
                    sids: vec![group_sid(template)],
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
            pool: TemplatePool {
                flow: Flow::Signature,
                source: PathBuf::from("/templates"),
                templates,
            },
            common,
            group,
            mailbox,
        }
    }

    fn identity(address: &str, member_of: &[&Template]) -> Identity {
        Identity {
            legacy_dn: Some("/o=Org/cn=Recipients/cn=user".to_string()),
            sids: member_of.iter().map(|template| group_sid(template)).collect(),
            ..Identity::new(address)
        }
    }

    #[test]
    fn common_before_mailbox() {
        let classified = classified(&["sig.[alice@corp.local].docx", "sig.docx"]);
        let resolution =
            resolve_signatures(&classified, &Identity::new("alice@corp.local"));
        let stems = resolution
            .templates
            .iter()
            .map(|index| classified.template(*index).file_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(stems, ["sig.docx", "sig.[alice@corp.local].docx"]);
    }

    #[test]
    fn dual_tag_template_appears_once() {
        let classified = classified(&[
            "both.[CORP Sales][alice@corp.local].docx",
            "plain.docx",
        ]);
        let template = &classified.pool.templates[0];
        let member = identity("alice@corp.local", &[template]);
        let resolution = resolve_signatures(&classified, &member);
        assert_eq!(resolution.templates, [1, 0]);

        // Without the membership the same file still arrives, via the
        // mailbox bucket instead.
        let outsider = identity("alice@corp.local", &[]);
        assert_eq!(resolve_signatures(&classified, &outsider).templates, [1, 0]);
    }

    #[test]
    fn group_bucket_requires_directory_mailbox() {
        let classified = classified(&["team.[CORP Sales].docx"]);
        let template = &classified.pool.templates[0];
        let mut member = identity("bob@corp.local", &[template]);
        assert_eq!(resolve_signatures(&classified, &member).templates, [0]);

        member.legacy_dn = None;
        assert_eq!(resolve_signatures(&classified, &member).templates, []);
    }

    #[test]
    fn later_buckets_take_signature_defaults() {
        let classified = classified(&[
            "a base.[DefaultNew][DefaultReplyFwd].docx",
            "b mine.[DefaultNew][bob@corp.local].docx",
        ]);
        let resolution =
            resolve_signatures(&classified, &Identity::new("bob@corp.local"));
        assert_eq!(resolution.templates, [0, 1]);
        assert_eq!(resolution.default_new, Some(1));
        assert_eq!(resolution.default_reply_forward, Some(0));
    }

    #[test]
    fn auto_reply_roles_split_and_merge() {
        let split = classified(&["oof.[External].docx", "oof.[Internal].docx"]);
        let selection = resolve_auto_reply(&split, &Identity::new("a@corp.local"));
        assert_eq!(selection.internal, Some(1));
        assert_eq!(selection.external, Some(0));
        assert!(!selection.shared);

        let merged = classified(&["oof.docx"]);
        let selection = resolve_auto_reply(&merged, &Identity::new("a@corp.local"));
        assert_eq!(selection.internal, Some(0));
        assert_eq!(selection.external, Some(0));
        assert!(selection.shared);
    }

    #[test]
    fn specific_auto_reply_overrides_common() {
        let classified = classified(&[
            "oof.docx",
            "oof.[External][carol@corp.local].docx",
        ]);
        let selection =
            resolve_auto_reply(&classified, &Identity::new("carol@corp.local"));
        assert_eq!(selection.internal, Some(0));
        assert_eq!(selection.external, Some(1));
        assert!(!selection.shared);
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let classified = classified(&[]);
        let identity = Identity::new("nobody@corp.local");
        assert_eq!(resolve_signatures(&classified, &identity).templates, []);
        let selection = resolve_auto_reply(&classified, &identity);
        assert_eq!(selection.internal, None);
        assert!(!selection.shared);
    }
}
