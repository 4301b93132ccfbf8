use anyhow::{Context, Result};
use sqlx::PgPool;
use time::{Date, Duration, Month};

use crate::domain::{ConsumptionRecord, DailyConsumption, HourlyConsumption, MonthlyConsumption};

/// Hourly readings of every postal code for a single calendar day.
pub async fn hourly_consumption(pool: &PgPool, day: Date) -> Result<Vec<ConsumptionRecord>> {
    let start = day.midnight();
    let end = start + Duration::days(1);

    let rows = sqlx::query_as::<_, HourlyConsumption>(
        r#"
        SELECT
            time,
            postalcode,
            consumption::float8 AS consumption,
            contracts::int8     AS contracts
        FROM residential_consumption
        WHERE time >= $1
          AND time <  $2
        ORDER BY time
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ConsumptionRecord::from).collect())
}

/// Daily totals of every postal code for one calendar month.
pub async fn daily_consumption(pool: &PgPool, year: i32, month: u8) -> Result<Vec<ConsumptionRecord>> {
    let month = Month::try_from(month).with_context(|| format!("invalid month {month}"))?;
    let start = Date::from_calendar_date(year, month, 1)?;
    let end = match month {
        Month::December => Date::from_calendar_date(year + 1, Month::January, 1)?,
        m => Date::from_calendar_date(year, m.next(), 1)?,
    };

    let rows = sqlx::query_as::<_, DailyConsumption>(
        r#"
        SELECT
            date,
            postalcode,
            consumption::float8 AS consumption,
            contracts::int8     AS contracts
        FROM residential_consumption_aggregated
        WHERE date >= $1
          AND date <  $2
        ORDER BY date
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ConsumptionRecord::from).collect())
}

/// Monthly totals of every postal code for one year.
pub async fn monthly_consumption(pool: &PgPool, year: i32) -> Result<Vec<ConsumptionRecord>> {
    // `year` and `month` are text columns in this table; cast on the way out
    // so the row type stays typed.
    let rows = sqlx::query_as::<_, MonthlyConsumption>(
        r#"
        SELECT
            year::int4          AS year,
            month::text         AS month,
            postalcode,
            consumption::float8 AS consumption,
            contracts::int8     AS contracts
        FROM residential_consumption_monthly
        WHERE year::int4 = $1
        ORDER BY month
        "#,
    )
    .bind(year)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| ConsumptionRecord::try_from(r).map_err(anyhow::Error::from))
        .collect()
}
