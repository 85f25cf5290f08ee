//! Query layer: pure functions of a store snapshot and one session's
//! query state. Two modes — the paginated/sorted/filtered table and the
//! geographic bounding-box view.

use crate::types::{AreaBounds, FieldKey, FilterClause, Report, SortColumn};
use serde::Serialize;
use std::cmp::Ordering;

pub const DEFAULT_ITEMS_PER_PAGE: usize = 10;

/// Per-session query parameters. Created with defaults at session start
/// and mutated only by explicit commands.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub sort_by: Vec<SortColumn>,
    pub filters: Vec<FilterClause>,
    pub items_per_page: usize,
    pub current_page: usize,
    pub area: Option<AreaBounds>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            sort_by: Vec::new(),
            filters: Vec::new(),
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            current_page: 1,
            area: None,
        }
    }
}

/// One page of the tabular view, in the outbound wire shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePage {
    pub data: Vec<Report>,
    pub current_page: usize,
    pub items_per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub sort_by: Vec<SortColumn>,
    pub filters: Vec<FilterClause>,
}

/// Bounding-box view, in the outbound wire shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaResponse {
    pub mode: &'static str,
    pub area_data: Vec<Report>,
}

impl AreaResponse {
    pub fn new(area_data: Vec<Report>) -> Self {
        Self {
            mode: "area",
            area_data,
        }
    }
}

/// Multi-key comparator: the first column with a non-zero comparison
/// decides. Operands compare numerically when both have a numeric reading,
/// else lexicographically on their string forms.
fn compare_reports(a: &Report, b: &Report, sort_by: &[SortColumn]) -> Ordering {
    for column in sort_by {
        let left = column.id.value_of(a);
        let right = column.id.value_of(b);

        let ordering = match (left.as_number(), right.as_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => left.as_text().cmp(&right.as_text()),
        };
        let ordering = if column.desc {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Run the tabular query: filter, stable multi-key sort, page slice.
///
/// The requested page is clamped into `[1, totalPages]`, with
/// `totalPages = max(1, ceil(totalItems / itemsPerPage))`.
pub fn table_page(mut snapshot: Vec<Report>, state: &QueryState) -> TablePage {
    if !state.filters.is_empty() {
        let needles: Vec<(FieldKey, String)> = state
            .filters
            .iter()
            .map(|clause| (clause.id, clause.value.to_lowercase()))
            .collect();
        snapshot.retain(|report| {
            needles
                .iter()
                .all(|(key, needle)| key.text_of(report).to_lowercase().contains(needle.as_str()))
        });
    }

    if !state.sort_by.is_empty() {
        // Vec::sort_by is stable, so full ties keep their prior order.
        snapshot.sort_by(|a, b| compare_reports(a, b, &state.sort_by));
    }

    let total_items = snapshot.len();
    let items_per_page = state.items_per_page.max(1);
    let total_pages = total_items.div_ceil(items_per_page).max(1);
    let current_page = state.current_page.clamp(1, total_pages);

    let start = (current_page - 1) * items_per_page;
    let end = (start + items_per_page).min(total_items);
    let data = if start < total_items {
        snapshot[start..end].to_vec()
    } else {
        Vec::new()
    };

    TablePage {
        data,
        current_page,
        items_per_page,
        total_items,
        total_pages,
        sort_by: state.sort_by.to_vec(),
        filters: state.filters.to_vec(),
    }
}

/// Run the bounding-box query. An absent box answers with an empty set —
/// area queries are only ever answered against an explicit box.
pub fn area_data(snapshot: Vec<Report>, area: Option<&AreaBounds>) -> AreaResponse {
    let matched = match area {
        Some(bounds) => snapshot
            .into_iter()
            .filter(|report| bounds.contains(report.latitude, report.longitude))
            .collect(),
        None => Vec::new(),
    };
    AreaResponse::new(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StationId;
    use chrono::Utc;

    fn report(stn: &str, bearing: f64, category: &str) -> Report {
        Report {
            stn: StationId::new(stn),
            bearing,
            range: 1000.0,
            latitude: 0.0,
            longitude: 0.0,
            category: category.to_string(),
            general_type: "00".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn located(stn: &str, latitude: f64, longitude: f64) -> Report {
        Report {
            latitude,
            longitude,
            ..report(stn, 0.0, "00")
        }
    }

    fn stns(page: &TablePage) -> Vec<&str> {
        page.data.iter().map(|r| r.stn.as_str()).collect()
    }

    #[test]
    fn test_page_slice_and_totals() {
        let snapshot: Vec<Report> = (1..=5).map(|i| report(&i.to_string(), 0.0, "00")).collect();
        let state = QueryState {
            items_per_page: 2,
            current_page: 2,
            ..QueryState::default()
        };

        let page = table_page(snapshot, &state);
        assert_eq!(stns(&page), vec!["3", "4"]);
        assert_eq!(page.total_items, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.items_per_page, 2);
    }

    #[test]
    fn test_empty_snapshot_has_one_page() {
        let page = table_page(Vec::new(), &QueryState::default());
        assert!(page.data.is_empty());
        assert_eq!(page.total_items, 0);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.current_page, 1);
    }

    #[test]
    fn test_out_of_range_page_clamped() {
        let snapshot: Vec<Report> = (1..=5).map(|i| report(&i.to_string(), 0.0, "00")).collect();
        let state = QueryState {
            items_per_page: 2,
            current_page: 99,
            ..QueryState::default()
        };

        let page = table_page(snapshot, &state);
        assert_eq!(page.current_page, 3);
        assert_eq!(stns(&page), vec!["5"]);
    }

    #[test]
    fn test_numeric_sort_on_station_ids() {
        let snapshot = vec![
            report("10", 0.0, "00"),
            report("9", 0.0, "00"),
            report("100", 0.0, "00"),
        ];
        let state = QueryState {
            sort_by: vec![SortColumn {
                id: FieldKey::Stn,
                desc: false,
            }],
            ..QueryState::default()
        };

        let page = table_page(snapshot, &state);
        assert_eq!(stns(&page), vec!["9", "10", "100"]);
    }

    #[test]
    fn test_descending_sort() {
        let snapshot = vec![
            report("1", 10.0, "00"),
            report("2", 30.0, "00"),
            report("3", 20.0, "00"),
        ];
        let state = QueryState {
            sort_by: vec![SortColumn {
                id: FieldKey::Bearing,
                desc: true,
            }],
            ..QueryState::default()
        };

        let page = table_page(snapshot, &state);
        assert_eq!(stns(&page), vec!["2", "3", "1"]);
    }

    #[test]
    fn test_multi_key_sort_is_stable() {
        // All categories equal: the secondary key alone decides, and full
        // ties keep insertion order.
        let snapshot = vec![
            report("a", 30.0, "05"),
            report("b", 10.0, "05"),
            report("c", 10.0, "05"),
            report("d", 20.0, "05"),
        ];
        let state = QueryState {
            sort_by: vec![
                SortColumn {
                    id: FieldKey::Category,
                    desc: false,
                },
                SortColumn {
                    id: FieldKey::Bearing,
                    desc: false,
                },
            ],
            ..QueryState::default()
        };

        let page = table_page(snapshot, &state);
        assert_eq!(stns(&page), vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn test_filter_is_case_insensitive_substring() {
        let snapshot = vec![
            report("1", 0.0, "03"),
            report("2", 0.0, "13"),
            report("3", 0.0, "05"),
        ];
        let state = QueryState {
            filters: vec![FilterClause {
                id: FieldKey::Category,
                value: "3".to_string(),
            }],
            ..QueryState::default()
        };

        let page = table_page(snapshot, &state);
        assert_eq!(stns(&page), vec!["1", "2"]);
        assert_eq!(page.total_items, 2);
    }

    #[test]
    fn test_filters_are_anded() {
        let snapshot = vec![
            report("31", 0.0, "03"),
            report("32", 0.0, "04"),
            report("41", 0.0, "03"),
        ];
        let state = QueryState {
            filters: vec![
                FilterClause {
                    id: FieldKey::Stn,
                    value: "3".to_string(),
                },
                FilterClause {
                    id: FieldKey::Category,
                    value: "03".to_string(),
                },
            ],
            ..QueryState::default()
        };

        let page = table_page(snapshot, &state);
        assert_eq!(stns(&page), vec!["31"]);
    }

    #[test]
    fn test_area_query_boxes() {
        let snapshot = vec![located("1", 50.0, 50.0)];

        let tight = AreaBounds::new(0.0, 40.0, 0.0, 40.0);
        assert!(area_data(snapshot.clone(), Some(&tight)).area_data.is_empty());

        let wide = AreaBounds::new(0.0, 60.0, 0.0, 60.0);
        let result = area_data(snapshot.clone(), Some(&wide));
        assert_eq!(result.mode, "area");
        assert_eq!(result.area_data.len(), 1);

        let reversed = AreaBounds::new(60.0, 0.0, 60.0, 0.0);
        assert_eq!(area_data(snapshot, Some(&reversed)).area_data.len(), 1);
    }

    #[test]
    fn test_absent_area_answers_empty() {
        let snapshot = vec![located("1", 0.0, 0.0)];
        assert!(area_data(snapshot, None).area_data.is_empty());
    }

    #[test]
    fn test_wire_shape_of_table_page() {
        let state = QueryState {
            sort_by: vec![SortColumn {
                id: FieldKey::GeneralType,
                desc: true,
            }],
            ..QueryState::default()
        };
        let page = table_page(vec![report("1", 0.0, "00")], &state);
        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(json["currentPage"], 1);
        assert_eq!(json["itemsPerPage"], 10);
        assert_eq!(json["totalItems"], 1);
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["sortBy"][0]["id"], "generalType");
        assert_eq!(json["sortBy"][0]["desc"], true);
        assert_eq!(json["data"][0]["stn"], "1");
        assert_eq!(json["data"][0]["generalType"], "00");
        assert!(json["data"][0]["timestamp"].is_string());
    }
}
