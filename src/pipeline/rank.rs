// src/pipeline/rank.rs

//! Stable multi-key ranking of probed entries.

use std::cmp::Ordering;

use crate::models::{Channel, ClassifyConfig};

/// Sort entries by category priority, name, throughput (descending) and
/// latency (ascending). The sort is stable: equal-key entries keep their
/// relative input order.
pub fn rank(channels: &mut [Channel], config: &ClassifyConfig) {
    let priority = |channel: &Channel| {
        config
            .category_priority
            .iter()
            .position(|category| category == &channel.category)
            .unwrap_or(usize::MAX)
    };

    channels.sort_by(|a, b| {
        priority(a)
            .cmp(&priority(b))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| {
                let a_rate = a.throughput_kbps.unwrap_or(0.0);
                let b_rate = b.throughput_kbps.unwrap_or(0.0);
                b_rate.partial_cmp(&a_rate).unwrap_or(Ordering::Equal)
            })
            .then_with(|| {
                a.latency_ms
                    .unwrap_or(u64::MAX)
                    .cmp(&b.latency_ms.unwrap_or(u64::MAX))
            })
    });
}
