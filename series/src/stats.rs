use serde::Serialize;

use crate::{expand::DenseSeries, RATING_COLUMNS};

pub const TOTAL_COLUMN: &str = "Total_Agitation";

/// Summary shown next to each panel of the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: &'static str,
    pub mean: f64,
    pub max: u8,
    /// Share of seconds with a non-zero value, in percent.
    pub active_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    pub categories: [ColumnStats; 4],
    pub total: ColumnStats,
}

impl SeriesStats {
    pub fn of(series: &DenseSeries) -> Self {
        let categories = std::array::from_fn(|category| {
            column_stats(
                RATING_COLUMNS[category],
                series
                    .samples
                    .iter()
                    .map(|sample| sample.category_scores[category]),
            )
        });
        let total = column_stats(
            TOTAL_COLUMN,
            series.samples.iter().map(|sample| sample.total_score),
        );

        Self { categories, total }
    }
}

fn column_stats(column: &'static str, values: impl Iterator<Item = u8>) -> ColumnStats {
    let (mut count, mut sum, mut max, mut active) = (0usize, 0u64, 0u8, 0usize);
    for value in values {
        count += 1;
        sum += u64::from(value);
        max = max.max(value);
        if value > 0 {
            active += 1;
        }
    }

    let (mean, active_pct) = match count {
        0 => (0.0, 0.0),
        count => (
            sum as f64 / count as f64,
            active as f64 / count as f64 * 100.0,
        ),
    };

    ColumnStats {
        column,
        mean,
        max,
        active_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::tests::{expand_default, record};

    #[test]
    fn summarises_each_column() {
        let series = expand_default(&[
            record(1, 0.0, 50.0, [2, 0, 0, 0]),
            record(2, 50.0, 50.0, [0, 0, 4, 1]),
        ]);
        let stats = SeriesStats::of(&series);

        assert_eq!(
            stats.categories[0],
            ColumnStats {
                column: "Aberrant_Vocalization",
                mean: 1.0,
                max: 2,
                active_pct: 50.0,
            }
        );
        assert_eq!(stats.categories[1].max, 0);
        assert_eq!(stats.categories[1].active_pct, 0.0);
        assert_eq!(stats.categories[2].mean, 2.0);
        assert_eq!(stats.total.column, TOTAL_COLUMN);
        assert_eq!(stats.total.max, 5);
        assert_eq!(stats.total.mean, 3.5);
        assert_eq!(stats.total.active_pct, 100.0);
    }
}
