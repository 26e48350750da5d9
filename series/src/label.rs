use tracing::instrument;

use crate::{expand::DenseSeries, record::ObservationRecord};

/// Paints each record's song over the seconds it covers, later rows winning.
///
/// Uses exactly the same spans as the score fill, so the label track lines up
/// with the scores sample for sample. Seconds no song covers stay `None`.
#[instrument(skip_all, level = "debug")]
pub fn propagate_labels(series: &mut DenseSeries, records: &[ObservationRecord]) {
    for record in records {
        let Some(song) = record.song_label.as_deref() else {
            continue;
        };
        let span = series.span(record);
        for sample in &mut series.samples[span] {
            sample.song_label = Some(song.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::tests::{expand_default, record};

    fn with_song(mut record: ObservationRecord, song: &str) -> ObservationRecord {
        record.song_label = Some(song.to_string());
        record
    }

    fn labels(series: &DenseSeries) -> Vec<Option<&str>> {
        series
            .samples
            .iter()
            .map(|sample| sample.song_label.as_deref())
            .collect()
    }

    #[test]
    fn later_song_overwrites_overlap() {
        let records = [
            with_song(record(1, 0.0, 6.0, [0; 4]), "Moon River"),
            with_song(record(2, 3.0, 5.0, [0; 4]), "Blue Moon"),
        ];
        let mut series = expand_default(&records);
        propagate_labels(&mut series, &records);

        assert_eq!(
            labels(&series),
            vec![
                Some("Moon River"),
                Some("Moon River"),
                Some("Moon River"),
                Some("Blue Moon"),
                Some("Blue Moon"),
                Some("Blue Moon"),
                Some("Blue Moon"),
                Some("Blue Moon"),
            ]
        );
    }

    #[test]
    fn unlabeled_records_leave_gaps() {
        let records = [
            with_song(record(1, 0.0, 2.0, [1, 0, 0, 0]), "Moon River"),
            record(2, 2.0, 2.0, [2, 0, 0, 0]),
            with_song(record(3, 5.0, 1.0, [0; 4]), "Blue Moon"),
        ];
        let mut series = expand_default(&records);
        propagate_labels(&mut series, &records);

        assert_eq!(
            labels(&series),
            vec![Some("Moon River"), Some("Moon River"), None, None, None, Some("Blue Moon")]
        );
        // labels never touch the scores
        assert_eq!(series.samples[2].category_scores, [2, 0, 0, 0]);
    }

    #[test]
    fn unlabeled_record_does_not_erase_song() {
        let records = [
            with_song(record(1, 0.0, 4.0, [0; 4]), "Moon River"),
            record(2, 1.0, 2.0, [3, 0, 0, 0]),
        ];
        let mut series = expand_default(&records);
        propagate_labels(&mut series, &records);
        assert!(labels(&series).iter().all(|label| *label == Some("Moon River")));
    }
}
