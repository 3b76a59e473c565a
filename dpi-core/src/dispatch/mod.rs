//! Reassembly-driven content-search dispatch (§4.5): a reduced matcher
//! that, given a report from the ingress-side matcher — either an inline
//! payload scan or an IP-option-carried report blob (§6) — maps report
//! offsets back to rule IDs and replays single-offset detection checks
//! against the generic per-match callback.
//!
//! The Aho-Corasick/regex engine itself is a non-goal (§1): this module
//! consumes whatever engine the deployment plugs in behind
//! `MultiPatternMatcher`.

use crate::wire::ip_option::OptionReport;

pub type RuleId = u16;

/// The per-match callback contract (§4.5): non-zero/`true` means the match
/// has been consumed and iteration should stop.
pub type OnMatch<'a> = dyn FnMut(RuleId, usize) -> bool + 'a;

/// Non-goal boundary (§1): the multi-pattern search engine itself. A real
/// deployment swaps in `aho-corasick` or a regex-set behind this trait;
/// `scan` must report every match via `on_match`, stopping as soon as it
/// returns `true`.
pub trait MultiPatternMatcher: Send + Sync {
    fn scan(&self, haystack: &[u8], on_match: &mut OnMatch<'_>);
}

/// A correct-but-not-asymptotically-optimal multi-needle matcher, good
/// enough for tests and for compiling the orchestrator's pattern-candidate
/// table (§4.7 step 2). `aho-corasick` is a drop-in replacement behind the
/// same trait.
pub struct NaiveMultiPatternMatcher {
    needles: Vec<(RuleId, Vec<u8>)>,
}

impl NaiveMultiPatternMatcher {
    pub fn new(needles: Vec<(RuleId, Vec<u8>)>) -> Self {
        Self { needles }
    }
}

impl MultiPatternMatcher for NaiveMultiPatternMatcher {
    fn scan(&self, haystack: &[u8], on_match: &mut OnMatch<'_>) {
        for (rule_id, pattern) in &self.needles {
            if pattern.is_empty() {
                continue;
            }
            let mut start = 0;
            while let Some(pos) = memchr::memmem::find(&haystack[start..], pattern) {
                let offset = start + pos;
                if on_match(*rule_id, offset) {
                    return;
                }
                start = offset + 1;
                if start >= haystack.len() {
                    break;
                }
            }
        }
    }
}

/// Replays an IP-option-carried report (§6) against `on_match`: single-
/// position reports call the callback once at their offset; range reports
/// call it once per position in `[offset, offset+length)`. Stops the
/// instant `on_match` returns `true`, per the callback contract (§4.5).
pub fn replay_ip_option_reports(reports: &[OptionReport], on_match: &mut OnMatch<'_>) {
    for report in reports {
        match report.length {
            None => {
                if on_match(report.rule_id, report.position as usize) {
                    return;
                }
            }
            Some(len) => {
                let start = report.position as usize;
                for offset in start..start + len as usize {
                    if on_match(report.rule_id, offset) {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naive_matcher_finds_every_needle_until_stopped() {
        let matcher = NaiveMultiPatternMatcher::new(vec![(1, b"GET".to_vec()), (2, b"POST".to_vec())]);
        let mut hits = Vec::new();
        matcher.scan(b"GET / POST /", &mut |rule, offset| {
            hits.push((rule, offset));
            false
        });
        assert_eq!(hits, vec![(1, 0), (2, 6)]);
    }

    #[test]
    fn naive_matcher_stops_as_soon_as_callback_returns_true() {
        let matcher = NaiveMultiPatternMatcher::new(vec![(1, b"a".to_vec())]);
        let mut hits = Vec::new();
        matcher.scan(b"aaa", &mut |rule, offset| {
            hits.push((rule, offset));
            true
        });
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn replay_single_position_report_calls_once() {
        let reports = vec![OptionReport { rule_id: 5, position: 10, length: None }];
        let mut calls = Vec::new();
        replay_ip_option_reports(&reports, &mut |rule, offset| {
            calls.push((rule, offset));
            false
        });
        assert_eq!(calls, vec![(5, 10)]);
    }

    #[test]
    fn replay_range_report_calls_once_per_position() {
        let reports = vec![OptionReport { rule_id: 5, position: 10, length: Some(3) }];
        let mut calls = Vec::new();
        replay_ip_option_reports(&reports, &mut |rule, offset| {
            calls.push((rule, offset));
            false
        });
        assert_eq!(calls, vec![(5, 10), (5, 11), (5, 12)]);
    }

    #[test]
    fn replay_stops_on_first_positive_return_mid_range() {
        let reports = vec![
            OptionReport { rule_id: 5, position: 10, length: Some(5) },
            OptionReport { rule_id: 6, position: 100, length: None },
        ];
        let mut calls = Vec::new();
        replay_ip_option_reports(&reports, &mut |rule, offset| {
            calls.push((rule, offset));
            offset == 11
        });
        assert_eq!(calls, vec![(5, 10), (5, 11)]);
    }
}
