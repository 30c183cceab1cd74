/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use crate::window::TimeWindow;

/// One bracket token from a template file name. The kinds are mutually
/// identifiable by shape: role literals are fixed words, time ranges are
/// two twelve-digit stamps, mailbox tokens carry an `@` and no spaces,
/// and group tokens are a domain plus a space-bearing remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagToken {
    Mailbox(String),
    Group { domain: String, name: String },
    TimeRange(TimeWindow),
    Role(RoleTag),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTag {
    DefaultNew,
    DefaultReplyFwd,
    Internal,
    External,
}

impl RoleTag {
    fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("defaultnew") {
            Some(RoleTag::DefaultNew)
        } else if token.eq_ignore_ascii_case("defaultreplyfwd") {
            Some(RoleTag::DefaultReplyFwd)
        } else if token.eq_ignore_ascii_case("internal") {
            Some(RoleTag::Internal)
        } else if token.eq_ignore_ascii_case("external") {
            Some(RoleTag::External)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTag::DefaultNew => "DefaultNew",
            RoleTag::DefaultReplyFwd => "DefaultReplyFwd",
            RoleTag::Internal => "Internal",
            RoleTag::External => "External",
        }
    }
}

/// A template file name taken apart: `base[.tagSegment].ext`, where the
/// optional tag segment must start with `[` and end with `]`. Dots inside
/// brackets never separate segments. Anything that looks like a token but
/// fits no kind is reported in `warnings` rather than silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateName {
    pub stem: String,
    pub extension: String,
    pub target_name: String,
    pub tokens: Vec<TagToken>,
    pub warnings: Vec<String>,
}

impl TemplateName {
    pub fn parse(file_name: &str) -> Self {
        let mut warnings = Vec::new();
        let segments = split_segments(file_name);

        let (stem, extension, tag_segment) = match segments.len() {
            0 | 1 => (file_name.to_string(), String::new(), None),
            len => {
                let extension = segments[len - 1];
                if extension.contains('[') || extension.contains(']') {
                    warnings.push("unbalanced brackets".to_string());
                    (file_name.to_string(), String::new(), None)
                } else {
                    let candidate = segments[len - 2];
                    if len > 2 && candidate.starts_with('[') && candidate.ends_with(']') {
                        (
                            segments[..len - 2].join("."),
                            extension.to_string(),
                            Some(candidate),
                        )
                    } else {
                        (segments[..len - 1].join("."), extension.to_string(), None)
                    }
                }
            }
        };

        if warnings.is_empty() && (stem.contains('[') || stem.contains(']')) {
            warnings.push("bracket tokens outside the tag segment are ignored".to_string());
        }

        let tokens = tag_segment
            .map(|segment| scan_tokens(segment, &mut warnings))
            .unwrap_or_default();
        let target_name = if extension.is_empty() {
            stem.clone()
        } else {
            format!("{stem}.{extension}")
        };

        TemplateName {
            stem,
            extension,
            target_name,
            tokens,
            warnings,
        }
    }
}

fn split_segments(name: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (pos, ch) in name.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                segments.push(&name[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    segments.push(&name[start..]);
    segments
}

fn scan_tokens(segment: &str, warnings: &mut Vec<String>) -> Vec<TagToken> {
    let mut tokens = Vec::new();
    let mut rest = segment;
    loop {
        let Some(open) = rest.find('[') else {
            if !rest.trim().is_empty() {
                warnings.push(format!("stray text {:?} between tokens", rest.trim()));
            }
            break;
        };
        if !rest[..open].trim().is_empty() {
            warnings.push(format!("stray text {:?} between tokens", rest[..open].trim()));
        }
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find(']') else {
            warnings.push("unterminated bracket token".to_string());
            break;
        };
        let token = &after_open[..close];
        rest = &after_open[close + 1..];
        match classify_token(token) {
            Ok(parsed) => tokens.push(parsed),
            Err(reason) => warnings.push(format!("unrecognized token [{token}]: {reason}")),
        }
    }
    tokens
}

fn classify_token(token: &str) -> Result<TagToken, &'static str> {
    // Role literals are matched first so they can never be taken for a
    // group or mailbox token.
    if let Some(role) = RoleTag::parse(token) {
        return Ok(TagToken::Role(role));
    }
    if let Some((start, end)) = token.split_once('-') {
        if start.len() == 12
            && end.len() == 12
            && start.bytes().all(|byte| byte.is_ascii_digit())
            && end.bytes().all(|byte| byte.is_ascii_digit())
        {
            return Ok(TagToken::TimeRange(TimeWindow::new(start, end)));
        }
    }
    if !token.contains(' ') {
        if let Some((local, domain)) = token.split_once('@') {
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') {
                return Ok(TagToken::Mailbox(token.to_string()));
            }
        }
        return Err("not a mailbox address, group, time range or role");
    }
    if let Some((domain, name)) = token.split_once(' ') {
        let name = name.trim();
        if !domain.is_empty() && !name.is_empty() {
            return Ok(TagToken::Group {
                domain: domain.to_string(),
                name: name.to_string(),
            });
        }
    }
    Err("not a mailbox address, group, time range or role")
}
