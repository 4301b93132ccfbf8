use std::{cmp::Ordering, collections::HashMap};

use serde::Serialize;

use super::AggregatedRecord;

/// One row per spatial unit of the ranking table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRecord {
    pub spatial_key: String,
    /// Sum over every time bucket of the unit.
    pub consumption: f64,
    /// Mean over every time bucket of the unit.
    pub contracts: f64,
    pub consumption_per_contract: Option<f64>,
    /// `consumption / contracts`; `None` when the unit has no contracts.
    pub rate: Option<f64>,
}

#[derive(Default)]
struct Totals {
    consumption: f64,
    contracts_sum: f64,
    buckets: usize,
    ratio_sum: f64,
    ratios: usize,
}

fn by_rate(a: &RankedRecord, b: &RankedRecord) -> Ordering {
    match (a.rate, b.rate) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Reduce aggregated rows to one row per spatial key, lowest rate first.
///
/// Units are collected in order of first appearance and the sort is stable,
/// so equal rates keep that order. Units without a rate go last.
pub fn rank(records: &[AggregatedRecord]) -> Vec<RankedRecord> {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, Totals> = HashMap::new();

    for r in records {
        let t = totals.entry(r.spatial_key.as_str()).or_insert_with(|| {
            order.push(r.spatial_key.as_str());
            Totals::default()
        });
        t.consumption += r.consumption;
        t.contracts_sum += r.contracts;
        t.buckets += 1;
        if let Some(v) = r.consumption_per_contract {
            t.ratio_sum += v;
            t.ratios += 1;
        }
    }

    let mut ranked: Vec<RankedRecord> = order
        .into_iter()
        .filter_map(|key| {
            let t = totals.get(key)?;
            let contracts = t.contracts_sum / t.buckets as f64;
            let rate = if contracts > 0.0 {
                Some(t.consumption / contracts)
            } else {
                None
            };
            Some(RankedRecord {
                spatial_key: key.to_string(),
                consumption: t.consumption,
                contracts,
                consumption_per_contract: (t.ratios > 0).then(|| t.ratio_sum / t.ratios as f64),
                rate,
            })
        })
        .collect();

    ranked.sort_by(by_rate);
    ranked
}
