use consumption_client::domain::{ConsumptionRecord, TimeKey};
use serde::Serialize;

use crate::{
    engine::{
        aggregate, derive_metrics, filter_predicate, rank, slider_range, AggregatedRecord, EngineError, Feature,
        RankedRecord, SliderRange, SpaceGranularity, SpatialLabels, TimeGranularity,
    },
    sources::{PeriodSelector, RecordSource, SourceError},
};

#[derive(thiserror::Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Dashboard-wide settings that do not change between selections.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSettings {
    pub labels: SpatialLabels,
    pub start_year: i32,
    pub top_n: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            labels: SpatialLabels::default(),
            start_year: 2021,
            top_n: 5,
        }
    }
}

/// One user selection. Built per interaction and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRequest {
    pub period: PeriodSelector,
    pub space: SpaceGranularity,
    /// Slider position; the start of the slider range when absent.
    pub position: Option<u32>,
    pub feature: Feature,
    /// Spatial keys shown in the detail table and the chart.
    pub selected: Vec<String>,
}

impl DashboardRequest {
    pub fn time(&self) -> TimeGranularity {
        self.period.granularity()
    }
}

/// Keys the dashboard preselects for each spatial granularity.
pub fn default_selection(space: SpaceGranularity, labels: &SpatialLabels) -> Vec<String> {
    match space {
        SpaceGranularity::PostalCode => vec!["08031".to_string()],
        SpaceGranularity::Province => ["Barcelona", "Lleida"]
            .into_iter()
            .filter(|name| labels.provinces.names().any(|n| n == *name))
            .map(str::to_string)
            .collect(),
        SpaceGranularity::Region => vec![labels.region_label.clone()],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapCell {
    pub spatial_key: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingTable {
    pub rows: Vec<RankedRecord>,
    /// Largest raw consumption per contract of the period; scale for the
    /// rate column.
    pub rate_ceiling: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub bucket: TimeKey,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesLine {
    pub spatial_key: String,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub x_axis: &'static str,
    pub cadence: &'static str,
    pub lines: Vec<SeriesLine>,
}

/// Everything the map, table and chart need for one selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub time: TimeGranularity,
    pub space: SpaceGranularity,
    pub feature: Feature,
    pub slider: SliderRange,
    pub position: u32,
    pub snapshot: Vec<MapCell>,
    pub ranking: RankingTable,
    pub detail: Vec<AggregatedRecord>,
    pub series: ChartSeries,
}

/// Run one full recomputation pass over the rows of the selected period.
pub fn build_view(
    records: Vec<ConsumptionRecord>,
    request: &DashboardRequest,
    settings: &DashboardSettings,
) -> Result<DashboardView, EngineError> {
    let time = request.time();
    let derived = derive_metrics(records)?;

    let rate_ceiling = derived
        .iter()
        .filter_map(|d| d.consumption_per_contract)
        .reduce(f64::max);

    let first = derived.first().ok_or(EngineError::EmptyInput)?;
    let slider = slider_range(time, &first.raw.time_key)?;
    let position = slider.check(request.position.unwrap_or(slider.min))?;
    let filter = filter_predicate(time, position)?;

    let aggregated = aggregate(&derived, time, request.space, &settings.labels)?;

    let snapshot = filter
        .select(&aggregated)
        .into_iter()
        .map(|r| MapCell {
            spatial_key: r.spatial_key.clone(),
            value: request.feature.value(r),
        })
        .collect();

    let mut rows = rank(&aggregated);
    rows.truncate(settings.top_n);

    let selected = if request.selected.is_empty() {
        default_selection(request.space, &settings.labels)
    } else {
        request.selected.clone()
    };

    let detail = filter
        .select_within(&aggregated, &selected)
        .into_iter()
        .cloned()
        .collect();

    let lines = selected
        .iter()
        .map(|key| SeriesLine {
            spatial_key: key.clone(),
            points: aggregated
                .iter()
                .filter(|r| r.spatial_key == *key)
                .map(|r| SeriesPoint {
                    bucket: r.bucket,
                    value: request.feature.value(r),
                })
                .collect(),
        })
        .collect();

    tracing::debug!(
        %time,
        space = %request.space,
        position,
        groups = aggregated.len(),
        "dashboard view computed"
    );

    Ok(DashboardView {
        time,
        space: request.space,
        feature: request.feature,
        slider,
        position,
        snapshot,
        ranking: RankingTable { rows, rate_ceiling },
        detail,
        series: ChartSeries {
            x_axis: time.x_axis(),
            cadence: time.cadence(),
            lines,
        },
    })
}

/// Fetch the selected period from `source` and build its view.
pub async fn load_view<S>(
    source: &S,
    request: &DashboardRequest,
    settings: &DashboardSettings,
) -> Result<DashboardView, DashboardError>
where
    S: RecordSource + ?Sized,
{
    let period = request.period.ensure_stored(settings.start_year)?;
    let records = source.fetch_records(&period).await?;
    Ok(build_view(records, request, settings)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn monthly(postal_code: &str, month: u8, consumption: f64, contracts: i64) -> ConsumptionRecord {
        ConsumptionRecord {
            time_key: TimeKey::Month { year: 2023, month },
            postal_code: postal_code.to_string(),
            consumption,
            contracts,
        }
    }

    fn annual_request(space: SpaceGranularity, position: Option<u32>) -> DashboardRequest {
        DashboardRequest {
            period: PeriodSelector::Year(2023),
            space,
            position,
            feature: Feature::Consumption,
            selected: Vec::new(),
        }
    }

    fn year_of_rows() -> Vec<ConsumptionRecord> {
        vec![
            monthly("08031", 1, 100.0, 10),
            monthly("08001", 1, 300.0, 20),
            monthly("25001", 1, 40.0, 2),
            monthly("17001", 1, 50.0, 10),
            monthly("08031", 3, 90.0, 10),
            monthly("25001", 3, 20.0, 2),
            monthly("99999", 3, 1.0, 1),
        ]
    }

    #[test]
    fn province_view_wires_snapshot_ranking_detail_and_series() {
        let view = build_view(
            year_of_rows(),
            &annual_request(SpaceGranularity::Province, Some(3)),
            &DashboardSettings::default(),
        )
        .unwrap();

        assert_eq!(view.position, 3);
        assert_eq!(view.slider.max, 12);

        let snapshot_keys: Vec<&str> = view.snapshot.iter().map(|c| c.spatial_key.as_str()).collect();
        assert_eq!(snapshot_keys, vec!["Barcelona", "Lleida"]);

        // Girona: 50 / 10 = 5; Barcelona: (200 + 90) / 12.5; Lleida: 60 / 2
        let ranked: Vec<&str> = view.ranking.rows.iter().map(|r| r.spatial_key.as_str()).collect();
        assert_eq!(ranked, vec!["Girona", "Barcelona", "Lleida"]);
        assert_eq!(view.ranking.rate_ceiling, Some(20.0));

        assert_eq!(view.detail.len(), 2);
        assert!(view.detail.iter().all(|r| r.bucket.month() == 3));

        assert_eq!(view.series.x_axis, "month");
        assert_eq!(view.series.lines.len(), 2);
        assert_eq!(view.series.lines[0].spatial_key, "Barcelona");
        assert_eq!(view.series.lines[0].points.len(), 2);
    }

    #[test]
    fn missing_position_defaults_to_slider_start() {
        let view = build_view(
            year_of_rows(),
            &annual_request(SpaceGranularity::Region, None),
            &DashboardSettings::default(),
        )
        .unwrap();
        assert_eq!(view.position, 1);
        assert_eq!(view.snapshot.len(), 1);
        assert_eq!(view.snapshot[0].spatial_key, "catalonia");
    }

    #[test]
    fn ranking_is_truncated_to_top_n() {
        let settings = DashboardSettings {
            top_n: 2,
            ..DashboardSettings::default()
        };
        let view = build_view(year_of_rows(), &annual_request(SpaceGranularity::PostalCode, Some(1)), &settings)
            .unwrap();
        assert_eq!(view.ranking.rows.len(), 2);
    }

    #[test]
    fn monthly_slider_is_bounded_by_month_length() {
        let rows = vec![ConsumptionRecord {
            time_key: TimeKey::Day(date!(2023-02-01)),
            postal_code: "08031".to_string(),
            consumption: 1.0,
            contracts: 1,
        }];
        let request = DashboardRequest {
            period: PeriodSelector::Month { year: 2023, month: 2 },
            space: SpaceGranularity::PostalCode,
            position: Some(30),
            feature: Feature::Contracts,
            selected: Vec::new(),
        };
        let err = build_view(rows, &request, &DashboardSettings::default()).unwrap_err();
        assert_eq!(err, EngineError::SliderOutOfRange { position: 30, min: 1, max: 28 });
    }

    #[test]
    fn daily_detail_uses_selected_keys() {
        let rows = vec![
            ConsumptionRecord {
                time_key: TimeKey::Hour(datetime!(2024-05-14 23:00:00)),
                postal_code: "08031".to_string(),
                consumption: 4.0,
                contracts: 2,
            },
            ConsumptionRecord {
                time_key: TimeKey::Hour(datetime!(2024-05-14 23:00:00)),
                postal_code: "17001".to_string(),
                consumption: 6.0,
                contracts: 0,
            },
        ];
        let request = DashboardRequest {
            period: PeriodSelector::Day(date!(2024-05-14)),
            space: SpaceGranularity::PostalCode,
            position: Some(23),
            feature: Feature::ConsumptionPerContract,
            selected: vec!["17001".to_string()],
        };
        let view = build_view(rows, &request, &DashboardSettings::default()).unwrap();
        assert_eq!(view.detail.len(), 1);
        assert_eq!(view.detail[0].spatial_key, "17001");
        assert_eq!(view.series.cadence, "hourly");
        assert_eq!(view.series.lines[0].points[0].value, None);
        assert_eq!(view.snapshot.len(), 2);
    }

    #[test]
    fn empty_period_reports_no_data() {
        let err = build_view(
            Vec::new(),
            &annual_request(SpaceGranularity::Region, None),
            &DashboardSettings::default(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::EmptyInput);
        assert_eq!(err.to_string(), "no data available");
    }

    #[test]
    fn default_selection_per_granularity() {
        let labels = SpatialLabels::default();
        assert_eq!(default_selection(SpaceGranularity::PostalCode, &labels), vec!["08031"]);
        assert_eq!(
            default_selection(SpaceGranularity::Province, &labels),
            vec!["Barcelona", "Lleida"]
        );
        assert_eq!(default_selection(SpaceGranularity::Region, &labels), vec!["catalonia"]);
    }

    struct FixedSource(Vec<ConsumptionRecord>);

    #[async_trait::async_trait]
    impl RecordSource for FixedSource {
        async fn fetch_records(&self, _period: &PeriodSelector) -> Result<Vec<ConsumptionRecord>, SourceError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn load_view_rejects_periods_before_start_year() {
        let source = FixedSource(year_of_rows());
        let request = DashboardRequest {
            period: PeriodSelector::Year(2019),
            ..annual_request(SpaceGranularity::Region, None)
        };
        let err = load_view(&source, &request, &DashboardSettings::default()).await.unwrap_err();
        assert!(matches!(err, DashboardError::Source(SourceError::BeforeStartYear { .. })));

        let ok = load_view(&source, &annual_request(SpaceGranularity::Region, None), &DashboardSettings::default())
            .await
            .unwrap();
        assert_eq!(ok.space, SpaceGranularity::Region);
    }
}
