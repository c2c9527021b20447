//! Status bar - recent request outcomes bucketed into fixed time blocks

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::auth_file::AuthFileItem;
use super::usage_detail::UsageDetail;

pub const DEFAULT_BLOCK_COUNT: usize = 20;
pub const DEFAULT_BLOCK_MINUTES: i64 = 10;

/// One block per minute of a day
pub const MAX_BLOCK_COUNT: usize = 1440;
/// One week per block
pub const MAX_BLOCK_MINUTES: i64 = 10_080;

/// State of one display block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockState {
    Idle,
    Success,
    Failure,
    Mixed,
}

impl BlockState {
    fn classify(success: u64, failure: u64) -> Self {
        match (success, failure) {
            (0, 0) => BlockState::Idle,
            (_, 0) => BlockState::Success,
            (0, _) => BlockState::Failure,
            _ => BlockState::Mixed,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            BlockState::Idle => '.',
            BlockState::Success => '+',
            BlockState::Failure => 'x',
            BlockState::Mixed => '~',
        }
    }
}

/// Block layout: how many blocks and how much time each covers
///
/// Both values are clamped to `1..=MAX_BLOCK_COUNT` and
/// `1..=MAX_BLOCK_MINUTES`, so the window always fits a `Duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBarLayout {
    blocks: usize,
    block_duration: Duration,
}

impl StatusBarLayout {
    pub fn new(blocks: usize, block_minutes: i64) -> Self {
        let block_duration = Duration::try_minutes(block_minutes.clamp(1, MAX_BLOCK_MINUTES))
            .unwrap_or_else(|| Duration::minutes(DEFAULT_BLOCK_MINUTES));
        Self {
            blocks: blocks.clamp(1, MAX_BLOCK_COUNT),
            block_duration,
        }
    }

    #[cfg(test)]
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    pub fn window(&self) -> Duration {
        i32::try_from(self.blocks)
            .ok()
            .and_then(|blocks| self.block_duration.checked_mul(blocks))
            .unwrap_or_else(|| Duration::minutes(DEFAULT_BLOCK_COUNT as i64 * DEFAULT_BLOCK_MINUTES))
    }
}

impl Default for StatusBarLayout {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_MINUTES)
    }
}

/// Derived display data for one status bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusBarData {
    /// Oldest block first
    pub blocks: Vec<BlockState>,
    pub total_success: u64,
    pub total_failure: u64,
    /// `None` when there were no events in the window
    pub success_rate: Option<f64>,
}

impl StatusBarData {
    pub fn render(&self) -> String {
        self.blocks.iter().map(|b| b.symbol()).collect()
    }

    /// Success rate for display; `--` rather than `0%` when there is no data
    pub fn format_rate(&self) -> String {
        match self.success_rate {
            Some(rate) => format!("{:.1}%", rate),
            None => "--".to_string(),
        }
    }
}

/// Bucket the details of one source (or all of them) into the status bar
///
/// Pure: the same details, key, `now` and layout always give the same output.
pub fn calculate_status_bar_data(
    details: &[UsageDetail],
    source: Option<&str>,
    now: DateTime<Utc>,
    layout: StatusBarLayout,
) -> StatusBarData {
    bucketize(
        details.iter().filter(|d| source.map_or(true, |key| d.source == key)),
        now,
        layout,
    )
}

/// Status bar for an auth file: by auth index when known, else by file name
pub fn calculate_file_status_bar(
    details: &[UsageDetail],
    file: &AuthFileItem,
    now: DateTime<Utc>,
    layout: StatusBarLayout,
) -> StatusBarData {
    match file.auth_index.as_deref() {
        Some(index) => bucketize(
            details.iter().filter(|d| d.auth_index.as_deref() == Some(index)),
            now,
            layout,
        ),
        None => calculate_status_bar_data(details, Some(&file.name), now, layout),
    }
}

fn bucketize<'a, I>(details: I, now: DateTime<Utc>, layout: StatusBarLayout) -> StatusBarData
where
    I: Iterator<Item = &'a UsageDetail>,
{
    let mut counts = vec![(0u64, 0u64); layout.blocks];
    let window_start = now - layout.window();
    let block_ms = layout.block_duration.num_milliseconds().max(1);

    let mut total_success = 0u64;
    let mut total_failure = 0u64;

    for detail in details {
        if detail.timestamp < window_start || detail.timestamp > now {
            continue;
        }
        let age_ms = (now - detail.timestamp).num_milliseconds();
        let offset = (age_ms / block_ms) as usize;
        if offset >= layout.blocks {
            continue;
        }
        let slot = &mut counts[layout.blocks - 1 - offset];
        if detail.is_success() {
            slot.0 += 1;
            total_success += 1;
        } else {
            slot.1 += 1;
            total_failure += 1;
        }
    }

    let total = total_success + total_failure;
    let success_rate = if total > 0 {
        Some(total_success as f64 / total as f64 * 100.0)
    } else {
        None
    };

    StatusBarData {
        blocks: counts
            .into_iter()
            .map(|(s, f)| BlockState::classify(s, f))
            .collect(),
        total_success,
        total_failure,
        success_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::usage_detail::Outcome;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn detail(source: &str, minutes_ago: i64, outcome: Outcome) -> UsageDetail {
        UsageDetail {
            source: source.to_string(),
            auth_index: None,
            timestamp: now() - Duration::minutes(minutes_ago),
            outcome,
            model: "m".into(),
        }
    }

    #[test]
    fn test_success_rate() {
        let details = vec![
            detail("a", 1, Outcome::Success),
            detail("a", 2, Outcome::Success),
            detail("a", 3, Outcome::Failure),
            detail("a", 4, Outcome::Success),
            detail("b", 4, Outcome::Failure),
        ];
        let bar = calculate_status_bar_data(&details, Some("a"), now(), StatusBarLayout::default());
        assert_eq!(bar.total_success, 3);
        assert_eq!(bar.total_failure, 1);
        assert_eq!(bar.success_rate, Some(75.0));
        assert_eq!(bar.format_rate(), "75.0%");
    }

    #[test]
    fn test_empty_rate_is_placeholder() {
        let details = vec![detail("b", 1, Outcome::Success)];
        let bar = calculate_status_bar_data(&details, Some("a"), now(), StatusBarLayout::default());
        assert_eq!(bar.total_success + bar.total_failure, 0);
        assert_eq!(bar.success_rate, None);
        assert_eq!(bar.format_rate(), "--");
        assert!(bar.blocks.iter().all(|b| *b == BlockState::Idle));
    }

    #[test]
    fn test_layout_is_clamped() {
        let huge = StatusBarLayout::new(usize::MAX, i64::MAX / 1000);
        assert_eq!(huge.blocks(), MAX_BLOCK_COUNT);
        assert_eq!(huge.window(), Duration::minutes(MAX_BLOCK_COUNT as i64 * MAX_BLOCK_MINUTES));

        let tiny = StatusBarLayout::new(0, -5);
        assert_eq!(tiny.blocks(), 1);
        assert_eq!(tiny.window(), Duration::minutes(1));

        let bar = calculate_status_bar_data(&[detail("a", 1, Outcome::Success)], None, now(), huge);
        assert_eq!(bar.blocks.len(), MAX_BLOCK_COUNT);
        assert_eq!(bar.total_success, 1);
    }

    #[test]
    fn test_block_classification() {
        let layout = StatusBarLayout::new(4, 10);
        let details = vec![
            // newest block: mixed
            detail("a", 1, Outcome::Success),
            detail("a", 2, Outcome::Failure),
            // second newest: failure only
            detail("a", 15, Outcome::Failure),
            // oldest: success only
            detail("a", 35, Outcome::Success),
            // outside the window
            detail("a", 45, Outcome::Failure),
        ];
        let bar = calculate_status_bar_data(&details, None, now(), layout);
        assert_eq!(
            bar.blocks,
            vec![BlockState::Success, BlockState::Idle, BlockState::Failure, BlockState::Mixed]
        );
        assert_eq!(bar.render(), "+.x~");
        assert_eq!(bar.total_failure, 2);
    }

    #[test]
    fn test_future_details_ignored() {
        let mut future = detail("a", 0, Outcome::Success);
        future.timestamp = now() + Duration::minutes(5);
        let bar = calculate_status_bar_data(&[future], None, now(), StatusBarLayout::default());
        assert_eq!(bar.success_rate, None);
    }

    #[test]
    fn test_file_bar_uses_auth_index() {
        let mut by_index = detail("something-else", 1, Outcome::Failure);
        by_index.auth_index = Some("7".into());
        let by_name = detail("f.json", 1, Outcome::Success);
        let details = vec![by_index, by_name];

        let indexed = AuthFileItem { name: "f.json".into(), auth_index: Some("7".into()), ..Default::default() };
        let bar = calculate_file_status_bar(&details, &indexed, now(), StatusBarLayout::default());
        assert_eq!((bar.total_success, bar.total_failure), (0, 1));

        let named = AuthFileItem { name: "f.json".into(), ..Default::default() };
        let bar = calculate_file_status_bar(&details, &named, now(), StatusBarLayout::default());
        assert_eq!((bar.total_success, bar.total_failure), (1, 0));
    }

    #[test]
    fn test_deterministic() {
        let details = vec![detail("a", 1, Outcome::Success), detail("a", 30, Outcome::Failure)];
        let first = calculate_status_bar_data(&details, None, now(), StatusBarLayout::default());
        let second = calculate_status_bar_data(&details, None, now(), StatusBarLayout::default());
        assert_eq!(first, second);
    }
}
