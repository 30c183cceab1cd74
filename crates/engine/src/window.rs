/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use chrono::NaiveDateTime;

/// A validity range from a `[YYYYMMDDHHMM-YYYYMMDDHHMM]` token, kept in
/// local naive time. Bounds that fail to parse leave the window invalid
/// rather than failing the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    raw: String,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    Active,
    Inactive,
    Invalid,
}

impl TimeWindow {
    pub fn new(start: &str, end: &str) -> Self {
        TimeWindow {
            raw: format!("{start}-{end}"),
            start: parse_stamp(start),
            end: parse_stamp(end),
        }
    }

    /// Inclusive on both bounds, minute precision. A window whose start
    /// lies after its end is invalid, not merely never active.
    pub fn evaluate(&self, now: NaiveDateTime) -> WindowStatus {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start <= end => {
                if now >= start && now <= end {
                    WindowStatus::Active
                } else {
                    WindowStatus::Inactive
                }
            }
            _ => WindowStatus::Invalid,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

fn parse_stamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M").ok()
}
