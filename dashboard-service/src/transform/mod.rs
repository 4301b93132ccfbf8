use consumption_client::domain::{ConsumptionRecord, TimeKey};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("consumption must be a finite non-negative number")]
    InvalidConsumption,
    #[error("contracts must be non-negative")]
    NegativeContracts,
    #[error("postal code '{0}' is not five digits")]
    MalformedPostalCode(String),
    #[error("time key {0} out of allowed range")]
    OutOfRange(TimeKey),
}

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

/// Pure validation of a raw `ConsumptionRecord`.
///
/// Rules:
/// - consumption must be finite and non-negative.
/// - contracts must be non-negative.
/// - postal code must be exactly five ASCII digits.
/// - the time key's year must be within [2000, 2100).
pub fn validate_consumption_record(r: &ConsumptionRecord) -> Result<(), ValidationError> {
    if !r.consumption.is_finite() || r.consumption < 0.0 {
        return Err(ValidationError::InvalidConsumption);
    }

    if r.contracts < 0 {
        return Err(ValidationError::NegativeContracts);
    }

    if r.postal_code.len() != 5 || !r.postal_code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::MalformedPostalCode(r.postal_code.clone()));
    }

    let year = r.time_key.year();
    if !(MIN_YEAR..MAX_YEAR).contains(&year) {
        return Err(ValidationError::OutOfRange(r.time_key));
    }

    Ok(())
}

/// Keep the records that pass validation, counting and logging the rest.
pub fn retain_valid(records: Vec<ConsumptionRecord>) -> Vec<ConsumptionRecord> {
    records
        .into_iter()
        .filter(|r| match validate_consumption_record(r) {
            Ok(()) => true,
            Err(e) => {
                metrics::counter!("consumption_records_rejected_total").increment(1);
                tracing::warn!(error = %e, postal_code = %r.postal_code, "rejected consumption record");
                false
            }
        })
        .collect()
}
