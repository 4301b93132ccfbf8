use std::collections::BTreeMap;

use consumption_client::domain::TimeKey;

use super::{
    granularity::{strategy, SpaceGranularity, SpatialLabels, TimeGranularity},
    AggregatedRecord, DerivedRecord, EngineError,
};

/// Running mean that ignores missing values.
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn get(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Default)]
struct Group {
    consumption: Mean,
    contracts: Mean,
    consumption_per_contract: Mean,
}

/// Collapse derived rows into one row per (spatial key, time bucket).
///
/// Consumption, contracts and the per-contract ratio are each averaged over
/// the rows of a group, never summed. Rows whose postal code has no spatial
/// key under `space` (unknown province prefixes) are dropped. Output is
/// ordered by spatial key, then time bucket.
pub fn aggregate(
    records: &[DerivedRecord],
    time: TimeGranularity,
    space: SpaceGranularity,
    labels: &SpatialLabels,
) -> Result<Vec<AggregatedRecord>, EngineError> {
    if records.is_empty() {
        return Err(EngineError::EmptyInput);
    }

    let strategy = strategy(time, space)?;
    let mut groups: BTreeMap<(String, TimeKey), Group> = BTreeMap::new();
    let mut unmapped = 0u64;

    for record in records {
        let bucket = (strategy.time_key)(&record.raw.time_key).ok_or_else(|| EngineError::ShapeMismatch {
            expected: time,
            found: record.raw.time_key.to_string(),
        })?;

        let Some(key) = (strategy.space_key)(&record.raw.postal_code, labels) else {
            unmapped += 1;
            continue;
        };

        let group = groups.entry((key, bucket)).or_default();
        group.consumption.push(Some(record.raw.consumption));
        group.contracts.push(Some(record.raw.contracts as f64));
        group.consumption_per_contract.push(record.consumption_per_contract);
    }

    if unmapped > 0 {
        metrics::counter!("aggregate_unmapped_province_rows_total").increment(unmapped);
        tracing::debug!(rows = unmapped, %space, "dropped rows without a spatial key");
    }

    Ok(groups
        .into_iter()
        .map(|((spatial_key, bucket), g)| AggregatedRecord {
            spatial_key,
            bucket,
            consumption: g.consumption.get().unwrap_or_default(),
            contracts: g.contracts.get().unwrap_or_default(),
            consumption_per_contract: g.consumption_per_contract.get(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::derive_metrics;
    use consumption_client::domain::ConsumptionRecord;
    use std::collections::{BTreeSet, HashMap};
    use time::macros::{date, datetime};

    fn monthly(postal_code: &str, month: u8, consumption: f64, contracts: i64) -> ConsumptionRecord {
        ConsumptionRecord {
            time_key: TimeKey::Month { year: 2023, month },
            postal_code: postal_code.to_string(),
            consumption,
            contracts,
        }
    }

    fn run(raw: Vec<ConsumptionRecord>, time: TimeGranularity, space: SpaceGranularity) -> Vec<AggregatedRecord> {
        let derived = derive_metrics(raw).unwrap();
        aggregate(&derived, time, space, &SpatialLabels::default()).unwrap()
    }

    fn sample() -> Vec<ConsumptionRecord> {
        vec![
            monthly("08031", 1, 100.0, 10),
            monthly("08001", 1, 300.0, 20),
            monthly("17001", 1, 50.0, 5),
            monthly("25001", 1, 40.0, 4),
            monthly("43001", 1, 60.0, 6),
            monthly("08031", 2, 120.0, 10),
            monthly("17001", 2, 70.0, 7),
        ]
    }

    #[test]
    fn groups_take_the_mean_not_the_sum() {
        let out = run(sample(), TimeGranularity::Annual, SpaceGranularity::Province);
        let barcelona_jan = out
            .iter()
            .find(|r| r.spatial_key == "Barcelona" && r.bucket.month() == 1)
            .unwrap();
        assert_eq!(barcelona_jan.consumption, 200.0);
        assert_eq!(barcelona_jan.contracts, 15.0);
        // mean of 100/10 and 300/20
        assert_eq!(barcelona_jan.consumption_per_contract, Some(12.5));
    }

    #[test]
    fn zero_contract_rows_are_excluded_from_ratio_mean() {
        let raw = vec![monthly("08031", 1, 10.0, 0), monthly("08031", 1, 20.0, 2)];
        let out = run(raw, TimeGranularity::Annual, SpaceGranularity::Region);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].consumption_per_contract, Some(10.0));
        assert_eq!(out[0].consumption, 15.0);
        assert_eq!(out[0].contracts, 1.0);
    }

    #[test]
    fn all_missing_ratios_stay_missing() {
        let raw = vec![monthly("08031", 1, 10.0, 0)];
        let out = run(raw, TimeGranularity::Annual, SpaceGranularity::PostalCode);
        assert_eq!(out[0].consumption_per_contract, None);
    }

    #[test]
    fn province_view_maps_barcelona_and_drops_unknown_prefix() {
        let raw = vec![monthly("08031", 1, 10.0, 1), monthly("99999", 1, 99.0, 1)];
        let out = run(raw, TimeGranularity::Annual, SpaceGranularity::Province);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].spatial_key, "Barcelona");
        assert_eq!(out[0].consumption, 10.0);
    }

    #[test]
    fn region_collapses_every_postal_code() {
        let out = run(sample(), TimeGranularity::Annual, SpaceGranularity::Region);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.spatial_key == "catalonia"));
        assert_eq!(out[0].consumption, (100.0 + 300.0 + 50.0 + 40.0 + 60.0) / 5.0);
        assert_eq!(out[1].consumption, (120.0 + 70.0) / 2.0);
    }

    #[test]
    fn postal_code_view_is_identity_on_keys() {
        let raw = sample();
        let codes: BTreeSet<String> = raw.iter().map(|r| r.postal_code.clone()).collect();
        let out = run(raw, TimeGranularity::Annual, SpaceGranularity::PostalCode);
        let keys: BTreeSet<String> = out.iter().map(|r| r.spatial_key.clone()).collect();
        assert_eq!(keys, codes);
        assert_eq!(out.len(), 7);
    }

    #[test]
    fn postal_code_duplicates_in_a_bucket_collapse_to_mean() {
        let raw = vec![monthly("08031", 1, 10.0, 1), monthly("08031", 1, 30.0, 3)];
        let out = run(raw, TimeGranularity::Annual, SpaceGranularity::PostalCode);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].consumption, 20.0);
    }

    #[test]
    fn province_keys_partition_postal_codes() {
        let raw = sample();
        let labels = SpatialLabels::default();
        let mut owner: HashMap<String, String> = HashMap::new();
        for r in &raw {
            let province = labels.provinces.province_of(&r.postal_code).unwrap().to_string();
            let previous = owner.insert(r.postal_code.clone(), province.clone());
            assert!(previous.map_or(true, |p| p == province));
        }
        let out = run(raw, TimeGranularity::Annual, SpaceGranularity::Province);
        let keys: BTreeSet<&str> = out.iter().map(|r| r.spatial_key.as_str()).collect();
        let expected: BTreeSet<&str> = owner.values().map(String::as_str).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn daily_buckets_are_hourly_timestamps() {
        let raw = vec![
            ConsumptionRecord {
                time_key: TimeKey::Hour(datetime!(2024-05-01 00:00:00)),
                postal_code: "08031".to_string(),
                consumption: 1.0,
                contracts: 1,
            },
            ConsumptionRecord {
                time_key: TimeKey::Hour(datetime!(2024-05-01 01:00:00)),
                postal_code: "08031".to_string(),
                consumption: 2.0,
                contracts: 1,
            },
        ];
        let out = run(raw, TimeGranularity::Daily, SpaceGranularity::Province);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].bucket, TimeKey::Hour(datetime!(2024-05-01 00:00:00)));
    }

    #[test]
    fn mismatched_time_shape_is_an_error() {
        let raw = vec![ConsumptionRecord {
            time_key: TimeKey::Day(date!(2024-05-01)),
            postal_code: "08031".to_string(),
            consumption: 1.0,
            contracts: 1,
        }];
        let derived = derive_metrics(raw).unwrap();
        let err = aggregate(&derived, TimeGranularity::Annual, SpaceGranularity::Region, &SpatialLabels::default());
        assert!(matches!(err, Err(EngineError::ShapeMismatch { expected: TimeGranularity::Annual, .. })));
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = aggregate(&[], TimeGranularity::Daily, SpaceGranularity::Region, &SpatialLabels::default());
        assert_eq!(err, Err(EngineError::EmptyInput));
    }

    #[test]
    fn aggregation_is_idempotent() {
        let derived = derive_metrics(sample()).unwrap();
        let labels = SpatialLabels::default();
        let first = aggregate(&derived, TimeGranularity::Annual, SpaceGranularity::Province, &labels).unwrap();
        let second = aggregate(&derived, TimeGranularity::Annual, SpaceGranularity::Province, &labels).unwrap();
        assert_eq!(first, second);
    }
}
