use consumption_client::domain::ConsumptionRecord;

use super::{DerivedRecord, EngineError};

/// Consumption divided by contracts; `None` when there are no contracts.
pub fn consumption_per_contract(consumption: f64, contracts: i64) -> Option<f64> {
    if contracts <= 0 {
        return None;
    }
    let ratio = consumption / contracts as f64;
    ratio.is_finite().then_some(ratio)
}

/// Attach the consumption-per-contract ratio to every raw row.
///
/// Rows without contracts carry a missing ratio rather than failing the
/// whole batch; downstream means skip them.
pub fn derive_metrics(records: Vec<ConsumptionRecord>) -> Result<Vec<DerivedRecord>, EngineError> {
    if records.is_empty() {
        return Err(EngineError::EmptyInput);
    }

    let mut missing = 0u64;
    let derived: Vec<DerivedRecord> = records
        .into_iter()
        .map(|raw| {
            let consumption_per_contract = consumption_per_contract(raw.consumption, raw.contracts);
            if consumption_per_contract.is_none() {
                missing += 1;
            }
            DerivedRecord {
                raw,
                consumption_per_contract,
            }
        })
        .collect();

    if missing > 0 {
        metrics::counter!("derive_missing_denominator_total").increment(missing);
        tracing::debug!(rows = missing, "rows without contracts have no per-contract value");
    }

    Ok(derived)
}
