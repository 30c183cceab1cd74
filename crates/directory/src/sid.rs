/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::fmt::{Display, Write};
use std::str::FromStr;

/// A Windows security identifier in its binary layout: revision byte,
/// sub-authority count, 48-bit big-endian issuing authority and up to
/// fifteen little-endian 32-bit sub-authorities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecurityId {
    revision: u8,
    authority: u64,
    sub_authorities: Vec<u32>,
}

const MAX_SUB_AUTHORITIES: usize = 15;

impl SecurityId {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 8 {
            return None;
        }
        let revision = bytes[0];
        let count = bytes[1] as usize;
        if count > MAX_SUB_AUTHORITIES || bytes.len() != 8 + count * 4 {
            return None;
        }
        let mut authority = 0u64;
        for byte in &bytes[2..8] {
            authority = (authority << 8) | u64::from(*byte);
        }
        let mut sub_authorities = Vec::with_capacity(count);
        for chunk in bytes[8..].chunks_exact(4) {
            sub_authorities.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        Some(SecurityId {
            revision,
            authority,
            sub_authorities,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.sub_authorities.len() * 4);
        bytes.push(self.revision);
        bytes.push(self.sub_authorities.len() as u8);
        bytes.extend_from_slice(&self.authority.to_be_bytes()[2..]);
        for sub_authority in &self.sub_authorities {
            bytes.extend_from_slice(&sub_authority.to_le_bytes());
        }
        bytes
    }

    /// The binary form with every byte escaped for an LDAP search filter.
    pub fn filter_escaped(&self) -> String {
        let bytes = self.to_bytes();
        let mut escaped = String::with_capacity(bytes.len() * 3);
        for byte in bytes {
            let _ = write!(escaped, "\\{byte:02x}");
        }
        escaped
    }
}

impl Display for SecurityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.authority)?;
        for sub_authority in &self.sub_authorities {
            write!(f, "-{sub_authority}")?;
        }
        Ok(())
    }
}

impl FromStr for SecurityId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split('-');
        if !parts
            .next()
            .is_some_and(|part| part.eq_ignore_ascii_case("s"))
        {
            return Err(format!("Invalid security identifier {value:?}."));
        }
        let revision = parts
            .next()
            .and_then(|part| part.parse::<u8>().ok())
            .ok_or_else(|| format!("Invalid security identifier {value:?}."))?;
        let authority = parts
            .next()
            .and_then(|part| part.parse::<u64>().ok())
            .filter(|authority| *authority < (1 << 48))
            .ok_or_else(|| format!("Invalid security identifier {value:?}."))?;
        let mut sub_authorities = Vec::new();
        for part in parts {
            if sub_authorities.len() == MAX_SUB_AUTHORITIES {
                return Err(format!("Invalid security identifier {value:?}."));
            }
            sub_authorities.push(
                part.parse::<u32>()
                    .map_err(|_| format!("Invalid security identifier {value:?}."))?,
            );
        }
        Ok(SecurityId {
            revision,
            authority,
            sub_authorities,
        })
    }
}

impl utils::config::utils::ParseValue for SecurityId {
    fn parse_value(
        key: impl utils::config::utils::AsKey,
        value: &str,
    ) -> utils::config::Result<Self> {
        value
            .parse()
            .map_err(|_| format!("Invalid security identifier {:?} for property {:?}.", value, key.as_key()))
    }
}
