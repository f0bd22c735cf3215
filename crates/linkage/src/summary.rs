use std::collections::BTreeMap;

use crate::index::ReferenceIndex;
use crate::model::{GroupCounts, GroupKey, LinkSummary, LinkedRecord, NearMiss};

/// Compute run totals and per-group counts from linked records.
pub fn compute_summary(linked: &[LinkedRecord], ungrouped_name: &str) -> LinkSummary {
    let mut group_counts: BTreeMap<String, GroupCounts> = BTreeMap::new();
    let mut matched = 0;
    let mut empty_details = 0;

    for l in linked {
        let group = GroupKey::from_cell(l.record.group_key.as_deref());
        let counts = group_counts
            .entry(group.label(ungrouped_name).to_string())
            .or_insert(GroupCounts { rows: 0, matched: 0 });
        counts.rows += 1;

        if l.result.matched {
            matched += 1;
            counts.matched += 1;
        } else if l.result.nearest.is_none() {
            empty_details += 1;
        }
    }

    LinkSummary {
        total_records: linked.len(),
        matched,
        unmatched: linked.len() - matched,
        empty_details,
        total_groups: group_counts.len(),
        group_counts,
    }
}

/// Unmatched records with their closest candidate, in input order.
pub fn near_misses(linked: &[LinkedRecord], index: &ReferenceIndex, ungrouped_name: &str) -> Vec<NearMiss> {
    linked
        .iter()
        .filter(|l| !l.result.matched)
        .map(|l| NearMiss {
            position: l.record.position,
            source_line: l.record.source_line,
            group: GroupKey::from_cell(l.record.group_key.as_deref())
                .label(ungrouped_name)
                .to_string(),
            detail: l.record.detail.clone(),
            nearest: l
                .result
                .nearest
                .and_then(|id| index.get(id))
                .map(|c| c.raw.clone()),
            score: l.result.score,
        })
        .collect()
}
