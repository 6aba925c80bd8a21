//! Dashboard View-Models
//!
//! Shapes the recent-readings list for the browser dashboard: a page of the
//! readings table with its page strip, the status cards, and the chart series.

use data_validator::{timestamp::format_timestamp, Reading, Status, WaterLevel};
use serde::{Serialize, Serializer};

pub const RECORDS_PER_PAGE: usize = 10;
/// Page strips longer than this are collapsed with ellipses
pub const MAX_INLINE_PAGES: usize = 7;
/// Readings plotted on the distance chart
pub const CHART_WINDOW: usize = 60;
/// Readings shown on the water-level strip
pub const LEVEL_STRIP_WINDOW: usize = 20;
/// Distance that maps to a full-height bar (cm)
pub const CHART_SCALE_CM: f64 = 200.0;
pub const MIN_BAR_PERCENT: f64 = 5.0;
/// Distances below this are highlighted on the dashboard (cm)
pub const DISTANCE_WARNING_CM: f64 = 20.0;

/// Entry in the page-number strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(usize),
    Ellipsis,
}

impl Serialize for PageItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageItem::Page(n) => serializer.serialize_u64(*n as u64),
            PageItem::Ellipsis => serializer.serialize_str("..."),
        }
    }
}

/// Page-number strip for `current` out of `total` pages
///
/// Short strips list every page; long ones keep the first and last page and
/// a window around the current one.
pub fn page_numbers(current: usize, total: usize) -> Vec<PageItem> {
    if total <= MAX_INLINE_PAGES {
        return (1..=total).map(PageItem::Page).collect();
    }

    let mut pages = vec![PageItem::Page(1)];
    if current > 3 {
        pages.push(PageItem::Ellipsis);
    }

    let start = current.saturating_sub(1).max(2);
    let end = (current + 1).min(total - 1);
    pages.extend((start..=end).map(PageItem::Page));

    if current + 2 < total {
        pages.push(PageItem::Ellipsis);
    }
    pages.push(PageItem::Page(total));
    pages
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total_records: usize,
    pub total_pages: usize,
    /// 1-based index of the first record on the page, 0 when empty
    pub showing_from: usize,
    pub showing_to: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub page_numbers: Vec<PageItem>,
}

impl Pagination {
    /// Paginate `total_records`; the requested page is clamped into range
    pub fn new(total_records: usize, requested_page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total_pages = total_records.div_ceil(per_page);
        let page = requested_page.clamp(1, total_pages.max(1));

        let (showing_from, showing_to) = if total_records == 0 {
            (0, 0)
        } else {
            ((page - 1) * per_page + 1, (page * per_page).min(total_records))
        };

        Self {
            page,
            per_page,
            total_records,
            total_pages,
            showing_from,
            showing_to,
            has_previous: page > 1,
            has_next: page < total_pages,
            page_numbers: page_numbers(page, total_pages),
        }
    }

    /// The records belonging to the current page
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = ((self.page - 1) * self.per_page).min(items.len());
        let end = (start + self.per_page).min(items.len());
        &items[start..end]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCard {
    pub title: &'static str,
    pub value: String,
    pub warning: bool,
}

/// Cards for the latest reading: distance, water level, system status
pub fn status_cards(latest: Option<&Reading>) -> Vec<StatusCard> {
    let distance = StatusCard {
        title: "Ultrasonic Distance",
        value: latest.map_or("--".to_string(), |r| format!("{:.1} cm", r.distance())),
        warning: latest.is_some_and(|r| r.distance() < DISTANCE_WARNING_CM),
    };
    let water_level = StatusCard {
        title: "Water Level",
        value: latest.map_or("--".to_string(), |r| r.water_level().to_string()),
        warning: latest.is_some_and(|r| r.water_level() == WaterLevel::High),
    };
    let status = StatusCard {
        title: "System Status",
        value: latest.map_or("Offline".to_string(), |r| r.status().to_string()),
        warning: latest.is_some_and(|r| r.status() == Status::Alert),
    };

    vec![distance, water_level, status]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub timestamp: String,
    pub distance: f64,
    pub water_level: WaterLevel,
    /// Bar height as a percentage of the chart
    pub height_percent: f64,
    pub warning: bool,
}

impl ChartPoint {
    fn from_reading(reading: &Reading) -> Self {
        Self {
            timestamp: format_timestamp(&reading.timestamp()),
            distance: reading.distance(),
            water_level: reading.water_level(),
            height_percent: bar_height_percent(reading.distance()),
            warning: reading.distance() < DISTANCE_WARNING_CM,
        }
    }
}

pub fn bar_height_percent(distance_cm: f64) -> f64 {
    (distance_cm / CHART_SCALE_CM * 100.0).max(MIN_BAR_PERCENT)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    /// Oldest first
    pub distance: Vec<ChartPoint>,
    /// Tail of `distance` shown on the water-level strip
    pub water_levels: Vec<WaterLevel>,
}

/// Chart series from newest-first readings
pub fn chart(readings: &[Reading]) -> Chart {
    let distance: Vec<ChartPoint> = readings
        .iter()
        .take(CHART_WINDOW)
        .rev()
        .map(ChartPoint::from_reading)
        .collect();
    let skip = distance.len().saturating_sub(LEVEL_STRIP_WINDOW);
    let water_levels = distance[skip..].iter().map(|p| p.water_level).collect();

    Chart {
        distance,
        water_levels,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub latest: Option<Reading>,
    pub cards: Vec<StatusCard>,
    pub total_readings: usize,
    pub alert_count: usize,
    pub pagination: Pagination,
    pub records: Vec<Reading>,
    pub chart: Chart,
}

impl Dashboard {
    /// Build the dashboard from newest-first readings
    pub fn build(readings: &[Reading], page: usize) -> Self {
        let pagination = Pagination::new(readings.len(), page, RECORDS_PER_PAGE);
        let latest = readings.first();

        Self {
            latest: latest.cloned(),
            cards: status_cards(latest),
            total_readings: readings.len(),
            alert_count: readings.iter().filter(|r| r.is_alert()).count(),
            records: pagination.slice(readings).to_vec(),
            pagination,
            chart: chart(readings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use PageItem::{Ellipsis, Page};

    fn readings(n: usize) -> Vec<Reading> {
        // newest first
        (0..n)
            .map(|i| {
                let distance = if i % 3 == 0 { 8.0 } else { 100.0 + i as f64 };
                let (level, status) = if distance < 12.0 {
                    (WaterLevel::High, Status::Alert)
                } else {
                    (WaterLevel::Low, Status::Normal)
                };
                Reading::new(
                    DateTime::from_timestamp(1_700_000_000 - i as i64 * 10, 0).unwrap(),
                    distance,
                    level,
                    status,
                )
            })
            .collect()
    }

    #[test]
    fn test_short_page_strip() {
        assert_eq!(page_numbers(1, 0), vec![]);
        assert_eq!(page_numbers(2, 3), vec![Page(1), Page(2), Page(3)]);
        assert_eq!(page_numbers(7, 7).len(), 7);
    }

    #[test]
    fn test_long_page_strip() {
        assert_eq!(page_numbers(1, 10), vec![Page(1), Page(2), Ellipsis, Page(10)]);
        assert_eq!(
            page_numbers(5, 10),
            vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)]
        );
        assert_eq!(page_numbers(10, 10), vec![Page(1), Ellipsis, Page(9), Page(10)]);
        assert_eq!(
            page_numbers(3, 10),
            vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(10)]
        );
        assert_eq!(
            page_numbers(8, 10),
            vec![Page(1), Ellipsis, Page(7), Page(8), Page(9), Page(10)]
        );
    }

    #[test]
    fn test_page_item_serialization() {
        let json = serde_json::to_string(&vec![Page(1), Ellipsis, Page(9)]).unwrap();
        assert_eq!(json, r#"[1,"...",9]"#);
    }

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination::new(25, 3, 10);
        assert_eq!((p.total_pages, p.showing_from, p.showing_to), (3, 21, 25));
        assert!(p.has_previous && !p.has_next);

        let p = Pagination::new(25, 99, 10);
        assert_eq!(p.page, 3);

        let p = Pagination::new(0, 0, 10);
        assert_eq!((p.page, p.total_pages, p.showing_from, p.showing_to), (1, 0, 0, 0));
        assert!(p.slice::<u8>(&[]).is_empty());
    }

    #[test]
    fn test_pagination_slice() {
        let items: Vec<usize> = (0..25).collect();
        let p = Pagination::new(items.len(), 2, 10);
        assert_eq!(p.slice(&items), &items[10..20]);
    }

    #[test]
    fn test_status_cards() {
        let cards = status_cards(None);
        assert_eq!(cards[0].value, "--");
        assert_eq!(cards[2].value, "Offline");
        assert!(cards.iter().all(|c| !c.warning));

        let data = readings(1);
        let cards = status_cards(data.first());
        assert_eq!(cards[0].value, "8.0 cm");
        assert_eq!(cards[1].value, "HIGH");
        assert_eq!(cards[2].value, "Alert");
        assert!(cards.iter().all(|c| c.warning));
    }

    #[test]
    fn test_bar_height() {
        assert_eq!(bar_height_percent(100.0), 50.0);
        assert_eq!(bar_height_percent(2.0), MIN_BAR_PERCENT);
        assert_eq!(bar_height_percent(400.0), 200.0);
    }

    #[test]
    fn test_chart_oldest_first_and_windowed() {
        let data = readings(80);
        let chart = chart(&data);
        assert_eq!(chart.distance.len(), CHART_WINDOW);
        assert_eq!(chart.water_levels.len(), LEVEL_STRIP_WINDOW);
        assert!(chart.distance.first().unwrap().timestamp < chart.distance.last().unwrap().timestamp);
        assert_eq!(
            chart.distance.last().unwrap().timestamp,
            format_timestamp(&data[0].timestamp())
        );
    }

    #[test]
    fn test_dashboard_build() {
        let data = readings(23);
        let dashboard = Dashboard::build(&data, 3);
        assert_eq!(dashboard.total_readings, 23);
        assert_eq!(dashboard.alert_count, 8);
        assert_eq!(dashboard.records.len(), 3);
        assert_eq!(dashboard.latest.as_ref(), data.first());

        let empty = Dashboard::build(&[], 1);
        assert!(empty.latest.is_none());
        assert!(empty.records.is_empty());
        assert!(empty.chart.distance.is_empty());
    }
}
