mod consumption;

pub use consumption::{
    parse_month, ConsumptionRecord, DailyConsumption, HourlyConsumption, MonthlyConsumption,
    RowError, TimeKey, DAY_FORMAT, HOUR_FORMAT,
};
