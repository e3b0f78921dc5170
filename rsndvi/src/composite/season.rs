use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::collect::{AccessToken, MetadataCatalog};
use crate::commons::basic_functions::{last_day_of_month, lookback_periods, month_after, month_of};
use crate::geo_core::BoundingBox;

/// Score given to a month nobody observed: the cloudiest value possible
const ABSENT_MONTH_SCORE: f64 = 100.0;

/// Months with data needed before a window is inferred
const MIN_POPULATED_MONTHS: usize = 3;

/// Mean cloud cover per calendar month (1-12). Months without samples are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyCloudStat {
    means: BTreeMap<u32, f64>,
}

impl MonthlyCloudStat {
    /// Aggregate `(month, cloud_cover)` samples; months outside 1..=12 are ignored
    pub fn from_samples(samples: &[(u32, f64)]) -> Self {
        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for &(month, cloud_cover) in samples {
            if !(1..=12).contains(&month) {
                continue;
            }
            let entry = sums.entry(month).or_insert((0.0, 0));
            entry.0 += cloud_cover;
            entry.1 += 1;
        }
        MonthlyCloudStat {
            means: sums
                .into_iter()
                .map(|(month, (sum, count))| (month, sum / count as f64))
                .collect(),
        }
    }

    pub fn mean(&self, month: u32) -> Option<f64> {
        self.means.get(&month).copied()
    }

    pub fn populated_months(&self) -> usize {
        self.means.len()
    }

    /// Sum of the monthly means over the window, absent months scoring 100
    pub fn window_score(&self, window: &SeasonalWindow) -> f64 {
        window
            .months()
            .iter()
            .map(|&m| self.mean(m).unwrap_or(ABSENT_MONTH_SCORE))
            .sum()
    }
}

/// Three consecutive calendar months; may wrap over the new year (11 → 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowBounds")]
pub struct SeasonalWindow {
    start_month: u32,
    end_month: u32,
}

/// Serialized form, checked before it becomes a window
#[derive(Deserialize)]
struct WindowBounds {
    start_month: u32,
    end_month: u32,
}

impl TryFrom<WindowBounds> for SeasonalWindow {
    type Error = String;

    fn try_from(bounds: WindowBounds) -> Result<Self, Self::Error> {
        SeasonalWindow::starting_at(bounds.start_month)
            .filter(|w| w.end_month == bounds.end_month)
            .ok_or_else(|| {
                format!(
                    "month {} to {} is not a 3-month window",
                    bounds.start_month, bounds.end_month
                )
            })
    }
}

impl SeasonalWindow {
    /// October to December, used when history is too thin to infer a season
    pub const FALLBACK: SeasonalWindow = SeasonalWindow {
        start_month: 10,
        end_month: 12,
    };

    /// Window beginning at `start_month` (1-12)
    pub fn starting_at(start_month: u32) -> Option<Self> {
        if !(1..=12).contains(&start_month) {
            return None;
        }
        Some(SeasonalWindow {
            start_month,
            end_month: month_after(start_month, 2),
        })
    }

    pub fn start_month(&self) -> u32 {
        self.start_month
    }

    pub fn end_month(&self) -> u32 {
        self.end_month
    }

    pub fn months(&self) -> [u32; 3] {
        [
            self.start_month,
            month_after(self.start_month, 1),
            month_after(self.start_month, 2),
        ]
    }

    /// True when the window crosses from December into January
    pub fn wraps(&self) -> bool {
        self.start_month > self.end_month
    }

    /// Concrete first and last day of the window for `year`.
    ///
    /// A wrapping window belongs to the year it ends in, so its start falls in `year - 1`.
    /// `None` when either end is outside the calendar.
    pub fn date_range(&self, year: i32) -> Option<(NaiveDate, NaiveDate)> {
        let start_year = if self.wraps() { year.checked_sub(1)? } else { year };
        let start = NaiveDate::from_ymd_opt(start_year, self.start_month, 1)?;
        let end = last_day_of_month(year, self.end_month)?;
        Some((start, end))
    }
}

impl std::fmt::Display for SeasonalWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "month {} to {}", self.start_month, self.end_month)
    }
}

/// Clearest recurring 3-month window for the given `(month, cloud_cover)` samples
pub fn compute_optimal_window(samples: &[(u32, f64)]) -> SeasonalWindow {
    optimal_window_from_stats(&MonthlyCloudStat::from_samples(samples))
}

/// Circular sliding-window minimum over the 12 months.
///
/// Starts are scanned 1..=12 and only a strictly lower score replaces the
/// current best, so ties go to the earliest start month.
pub fn optimal_window_from_stats(stats: &MonthlyCloudStat) -> SeasonalWindow {
    if stats.populated_months() < MIN_POPULATED_MONTHS {
        warn!("Not enough historical data, defaulting to the Oct-Dec window");
        return SeasonalWindow::FALLBACK;
    }

    let mut best = SeasonalWindow::FALLBACK;
    let mut best_score = f64::INFINITY;
    for start in 1..=12 {
        let Some(window) = SeasonalWindow::starting_at(start) else {
            continue;
        };
        let score = stats.window_score(&window);
        if score < best_score {
            best_score = score;
            best = window;
        }
    }

    info!("Optimal window found: {} (score {:.2})", best, best_score);
    best
}

/// Collect one `(month, cloud_cover)` sample per scene over the lookback periods.
///
/// A period whose search fails is skipped. Scenes without cloud-cover metadata
/// count as fully clouded.
pub fn gather_cloud_samples<M: MetadataCatalog + ?Sized>(
    catalog: &M,
    token: &AccessToken,
    bbox: &BoundingBox,
    today: NaiveDate,
    years: u32,
    limit: usize,
) -> Vec<(u32, f64)> {
    let mut samples = Vec::new();
    for (start, end) in lookback_periods(today, years) {
        match catalog.search(token, bbox, start, end, limit) {
            Ok(scenes) => {
                info!("Found {} historical scenes for {} to {}", scenes.len(), start, end);
                samples.extend(scenes.iter().map(|s| {
                    (
                        month_of(s.date),
                        s.cloud_cover.unwrap_or(ABSENT_MONTH_SCORE),
                    )
                }));
            }
            Err(e) => warn!("History search for {} to {} failed: {}", start, end, e),
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::scene_picker::SceneRecord;
    use crate::error::{PipelineError, Result};
    use std::cell::RefCell;

    /// Reference minimum: brute force over every start, ties to the lowest start
    fn brute_force(stats: &MonthlyCloudStat) -> SeasonalWindow {
        let mut windows: Vec<(f64, u32)> = (1..=12)
            .map(|m| (stats.window_score(&SeasonalWindow::starting_at(m).unwrap()), m))
            .collect();
        windows.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        SeasonalWindow::starting_at(windows[0].1).unwrap()
    }

    #[test]
    fn test_window_months_wrap() {
        let w = SeasonalWindow::starting_at(11).unwrap();
        assert_eq!(w.months(), [11, 12, 1]);
        assert_eq!(w.end_month(), 1);
        assert!(w.wraps());

        let w = SeasonalWindow::starting_at(12).unwrap();
        assert_eq!(w.months(), [12, 1, 2]);
        assert_eq!((w.start_month(), w.end_month()), (12, 2));

        assert!(!SeasonalWindow::starting_at(10).unwrap().wraps());
        assert!(SeasonalWindow::starting_at(0).is_none());
        assert!(SeasonalWindow::starting_at(13).is_none());
    }

    #[test]
    fn test_monthly_means() {
        let stats = MonthlyCloudStat::from_samples(&[(1, 10.0), (1, 30.0), (4, 50.0), (13, 1.0)]);
        assert_eq!(stats.mean(1), Some(20.0));
        assert_eq!(stats.mean(4), Some(50.0));
        assert_eq!(stats.mean(2), None);
        assert_eq!(stats.populated_months(), 2);
    }

    #[test]
    fn test_fallback_with_fewer_than_three_months() {
        assert_eq!(compute_optimal_window(&[]), SeasonalWindow::FALLBACK);
        assert_eq!(
            compute_optimal_window(&[(3, 0.0), (3, 0.0), (4, 1.0)]),
            SeasonalWindow::FALLBACK
        );
        let fallback = compute_optimal_window(&[(6, 0.0), (7, 0.0)]);
        assert_eq!((fallback.start_month(), fallback.end_month()), (10, 12));
    }

    #[test]
    fn test_clear_summer() {
        let mut samples: Vec<(u32, f64)> = (1..=12).map(|m| (m, 80.0)).collect();
        samples.extend([(5, 5.0), (6, 10.0), (7, 5.0)]);
        let window = compute_optimal_window(&samples);
        assert_eq!((window.start_month(), window.end_month()), (5, 7));
    }

    #[test]
    fn test_clear_winter_wraps() {
        let mut samples: Vec<(u32, f64)> = (2..=11).map(|m| (m, 70.0)).collect();
        samples.extend([(12, 2.0), (1, 3.0), (2, 1.0)]);
        let window = compute_optimal_window(&samples);
        // Feb averages (70 + 1) / 2, still clearer than Nov
        assert_eq!((window.start_month(), window.end_month()), (12, 2));
        assert_eq!(window.months(), [12, 1, 2]);
    }

    #[test]
    fn test_absent_months_score_worst() {
        // Only Jan-Mar are known and they are cloudy, but every other window
        // contains at least one absent month scored 100
        let stats = MonthlyCloudStat::from_samples(&[(1, 90.0), (2, 90.0), (3, 90.0)]);
        assert_eq!(optimal_window_from_stats(&stats), SeasonalWindow::starting_at(1).unwrap());
    }

    #[test]
    fn test_ties_go_to_lowest_start() {
        let samples: Vec<(u32, f64)> = (1..=12).map(|m| (m, 40.0)).collect();
        assert_eq!(compute_optimal_window(&samples), SeasonalWindow::starting_at(1).unwrap());

        // Windows starting at 3 and 9 tie at 0; 3 is scanned first
        let mut samples: Vec<(u32, f64)> = (1..=12).map(|m| (m, 50.0)).collect();
        samples.extend([(3, -50.0), (4, -50.0), (5, -50.0), (9, -50.0), (10, -50.0), (11, -50.0)]);
        let stats = MonthlyCloudStat::from_samples(&samples);
        assert_eq!(stats.mean(3), stats.mean(9));
        assert_eq!(optimal_window_from_stats(&stats).start_month(), 3);
    }

    #[test]
    fn test_matches_brute_force_on_synthetic_stats() {
        // Deterministic pseudo-random months and covers
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..200 {
            let mut samples = Vec::new();
            for _ in 0..30 {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let month = (state % 12) as u32 + 1;
                let cover = ((state >> 8) % 101) as f64;
                samples.push((month, cover));
            }
            let stats = MonthlyCloudStat::from_samples(&samples);
            if stats.populated_months() < 3 {
                continue;
            }
            let window = optimal_window_from_stats(&stats);
            let expected = brute_force(&stats);
            assert_eq!(window, expected);
            for m in 1..=12 {
                let other = SeasonalWindow::starting_at(m).unwrap();
                assert!(stats.window_score(&window) <= stats.window_score(&other));
            }
        }
    }

    #[test]
    fn test_date_range_plain() {
        let w = SeasonalWindow::starting_at(2).unwrap();
        let (start, end) = w.date_range(2024).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 4, 30).unwrap());
        assert_eq!(
            SeasonalWindow::FALLBACK.date_range(2021).unwrap(),
            (
                NaiveDate::from_ymd_opt(2021, 10, 1).unwrap(),
                NaiveDate::from_ymd_opt(2021, 12, 31).unwrap()
            )
        );
    }

    #[test]
    fn test_date_range_wrapping_anchors_previous_year() {
        let w = SeasonalWindow::starting_at(11).unwrap();
        let (start, end) = w.date_range(2021).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2020, 11, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2021, 1, 31).unwrap());

        let w = SeasonalWindow::starting_at(12).unwrap();
        let (start, end) = w.date_range(2021).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2020, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2021, 2, 28).unwrap());
    }

    #[test]
    fn test_date_range_out_of_calendar() {
        let wrapping = SeasonalWindow::starting_at(12).unwrap();
        assert_eq!(wrapping.date_range(i32::MIN), None);
        assert_eq!(SeasonalWindow::FALLBACK.date_range(i32::MAX), None);
        assert_eq!(SeasonalWindow::starting_at(1).unwrap().date_range(i32::MAX), None);
    }

    #[test]
    fn test_deserialize_checks_window() {
        let window: SeasonalWindow =
            serde_json::from_str(r#"{"start_month":11,"end_month":1}"#).unwrap();
        assert_eq!(window, SeasonalWindow::starting_at(11).unwrap());

        let round_trip: SeasonalWindow =
            serde_json::from_str(&serde_json::to_string(&SeasonalWindow::FALLBACK).unwrap())
                .unwrap();
        assert_eq!(round_trip, SeasonalWindow::FALLBACK);

        for bad in [
            r#"{"start_month":1,"end_month":9}"#,
            r#"{"start_month":0,"end_month":2}"#,
            r#"{"start_month":13,"end_month":3}"#,
        ] {
            let err = serde_json::from_str::<SeasonalWindow>(bad).unwrap_err();
            assert!(err.to_string().contains("not a 3-month window"), "{}", err);
        }
    }

    struct RecordingCatalog {
        calls: RefCell<Vec<(NaiveDate, NaiveDate)>>,
    }

    impl MetadataCatalog for RecordingCatalog {
        fn search(
            &self,
            _token: &AccessToken,
            _bbox: &BoundingBox,
            start: NaiveDate,
            end: NaiveDate,
            _limit: usize,
        ) -> Result<Vec<SceneRecord>> {
            let index = self.calls.borrow().len();
            self.calls.borrow_mut().push((start, end));
            if index == 1 {
                return Err(PipelineError::Catalog("timeout".into()));
            }
            Ok(vec![
                SceneRecord::new(end, Some(12.0)),
                SceneRecord::new(start, None),
            ])
        }
    }

    #[test]
    fn test_gather_cloud_samples_skips_failed_periods() {
        let catalog = RecordingCatalog {
            calls: RefCell::new(Vec::new()),
        };
        let today = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        let bbox = BoundingBox::new(0.0, 0.0, 0.25, 0.25);
        let samples =
            gather_cloud_samples(&catalog, &AccessToken::new("t"), &bbox, today, 5, 100);

        assert_eq!(catalog.calls.borrow().len(), 5);
        assert_eq!(catalog.calls.borrow()[0].1, today);
        // Four successful periods, two scenes each
        assert_eq!(samples.len(), 8);
        assert_eq!(samples[0], (7, 12.0));
        assert_eq!(samples[1].1, 100.0);
    }
}
