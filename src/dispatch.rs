//! Client command handling: one dispatcher per session, owning that
//! session's query state and answering with the matching query result.

use crate::query::{self, AreaResponse, QueryState, TablePage};
use crate::store::LiveStore;
use crate::types::{AreaRequest, FilterClause, SortColumn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Inbound command frame, tagged by `type` on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    Next,
    Prev,
    Goto {
        page: usize,
    },
    #[serde(rename_all = "camelCase")]
    SetItemsPerPage {
        items_per_page: usize,
    },
    #[serde(rename_all = "camelCase")]
    SetSort {
        sort_by: Vec<SortColumn>,
    },
    SetFilter {
        filters: Vec<FilterClause>,
    },
    GetAreaData {
        area: AreaRequest,
    },
    Refresh,
}

/// Outbound response frame; the two shapes are distinguished by their
/// fields (`data`/pagination vs `mode: "area"`).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Table(TablePage),
    Area(AreaResponse),
}

/// Which view the session last asked for; pushed refreshes renew it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewMode {
    Table,
    Area,
}

/// Per-session command dispatcher over the shared live store.
pub struct Dispatcher {
    store: Arc<LiveStore>,
    state: QueryState,
    mode: ViewMode,
    last_total_pages: usize,
}

impl Dispatcher {
    pub fn new(store: Arc<LiveStore>) -> Self {
        Self {
            store,
            state: QueryState::default(),
            mode: ViewMode::Table,
            last_total_pages: 1,
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Apply one command and produce its response. Every mutating command
    /// resets to page 1 except the page-navigation commands themselves.
    pub fn execute(&mut self, command: Command) -> Response {
        match command {
            Command::Next => {
                self.state.current_page = self.state.current_page.saturating_add(1);
            }
            Command::Prev => {
                self.state.current_page = self.state.current_page.saturating_sub(1).max(1);
            }
            Command::Goto { page } => {
                if (1..=self.last_total_pages).contains(&page) {
                    self.state.current_page = page;
                } else {
                    tracing::debug!(page, "goto outside current bounds, ignored");
                }
            }
            Command::SetItemsPerPage { items_per_page } => {
                if items_per_page > 0 {
                    self.state.items_per_page = items_per_page;
                    self.state.current_page = 1;
                } else {
                    tracing::debug!("zero page size ignored");
                }
            }
            Command::SetSort { sort_by } => {
                self.state.sort_by = sort_by;
                self.state.current_page = 1;
            }
            Command::SetFilter { filters } => {
                self.state.filters = filters;
                self.state.current_page = 1;
            }
            Command::GetAreaData { area } => {
                // An unusable box still replaces the previous one; the
                // query then answers empty instead of erroring.
                self.state.area = area.validate();
                self.mode = ViewMode::Area;
                return Response::Area(self.run_area());
            }
            Command::Refresh => {}
        }

        self.mode = ViewMode::Table;
        Response::Table(self.run_table())
    }

    /// Re-run whichever view the session currently shows. Used for pushed
    /// refreshes when the live store changes.
    pub fn current_view(&mut self) -> Response {
        match self.mode {
            ViewMode::Table => Response::Table(self.run_table()),
            ViewMode::Area => Response::Area(self.run_area()),
        }
    }

    fn run_table(&mut self) -> TablePage {
        let page = query::table_page(self.store.snapshot(), &self.state);
        // The engine clamps the page against the freshly shaped result
        // set; keep the session state in line with what it was answered.
        self.state.current_page = page.current_page;
        self.last_total_pages = page.total_pages;
        page
    }

    fn run_area(&self) -> AreaResponse {
        query::area_data(self.store.snapshot(), self.state.area.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldKey, Report, StationId};
    use chrono::Utc;

    fn store_with(n: usize) -> Arc<LiveStore> {
        let store = Arc::new(LiveStore::new());
        for i in 1..=n {
            store.upsert(Report {
                stn: StationId::new(i.to_string()),
                bearing: i as f64,
                range: 100.0,
                latitude: 50.0,
                longitude: 50.0,
                category: "03".to_string(),
                general_type: "01".to_string(),
                timestamp: Utc::now(),
            });
        }
        store
    }

    fn table(response: Response) -> TablePage {
        match response {
            Response::Table(page) => page,
            Response::Area(_) => panic!("expected table response"),
        }
    }

    fn area(response: Response) -> AreaResponse {
        match response {
            Response::Area(data) => data,
            Response::Table(_) => panic!("expected area response"),
        }
    }

    #[test]
    fn test_command_wire_forms() {
        let cmd: Command = serde_json::from_str(r#"{"type":"next"}"#).unwrap();
        assert!(matches!(cmd, Command::Next));

        let cmd: Command = serde_json::from_str(r#"{"type":"goto","page":3}"#).unwrap();
        assert!(matches!(cmd, Command::Goto { page: 3 }));

        let cmd: Command =
            serde_json::from_str(r#"{"type":"setItemsPerPage","itemsPerPage":25}"#).unwrap();
        assert!(matches!(cmd, Command::SetItemsPerPage { items_per_page: 25 }));

        let cmd: Command =
            serde_json::from_str(r#"{"type":"setSort","sortBy":[{"id":"bearing","desc":true}]}"#)
                .unwrap();
        match cmd {
            Command::SetSort { sort_by } => {
                assert_eq!(sort_by[0].id, FieldKey::Bearing);
                assert!(sort_by[0].desc);
            }
            other => panic!("unexpected: {other:?}"),
        }

        assert!(serde_json::from_str::<Command>(r#"{"type":"selfDestruct"}"#).is_err());
    }

    #[test]
    fn test_page_navigation() {
        let mut dispatcher = Dispatcher::new(store_with(5));
        let first = table(dispatcher.execute(Command::SetItemsPerPage { items_per_page: 2 }));
        assert_eq!(first.current_page, 1);
        assert_eq!(first.total_pages, 3);

        assert_eq!(table(dispatcher.execute(Command::Next)).current_page, 2);
        assert_eq!(table(dispatcher.execute(Command::Next)).current_page, 3);
        // Past the last page: clamped, not an error.
        assert_eq!(table(dispatcher.execute(Command::Next)).current_page, 3);

        assert_eq!(table(dispatcher.execute(Command::Prev)).current_page, 2);
        assert_eq!(table(dispatcher.execute(Command::Prev)).current_page, 1);
        assert_eq!(table(dispatcher.execute(Command::Prev)).current_page, 1);
    }

    #[test]
    fn test_goto_ignored_outside_bounds() {
        let mut dispatcher = Dispatcher::new(store_with(5));
        dispatcher.execute(Command::SetItemsPerPage { items_per_page: 2 });

        assert_eq!(table(dispatcher.execute(Command::Goto { page: 3 })).current_page, 3);
        assert_eq!(table(dispatcher.execute(Command::Goto { page: 99 })).current_page, 3);
        assert_eq!(table(dispatcher.execute(Command::Goto { page: 0 })).current_page, 3);
    }

    #[test]
    fn test_mutating_commands_reset_page() {
        let mut dispatcher = Dispatcher::new(store_with(5));
        dispatcher.execute(Command::SetItemsPerPage { items_per_page: 2 });
        dispatcher.execute(Command::Goto { page: 3 });

        let sorted = table(dispatcher.execute(Command::SetSort {
            sort_by: vec![SortColumn {
                id: FieldKey::Bearing,
                desc: true,
            }],
        }));
        assert_eq!(sorted.current_page, 1);

        dispatcher.execute(Command::Goto { page: 2 });
        let filtered = table(dispatcher.execute(Command::SetFilter {
            filters: vec![FilterClause {
                id: FieldKey::Category,
                value: "3".to_string(),
            }],
        }));
        assert_eq!(filtered.current_page, 1);
        assert_eq!(filtered.total_items, 5);
    }

    #[test]
    fn test_zero_page_size_ignored() {
        let mut dispatcher = Dispatcher::new(store_with(3));
        let page = table(dispatcher.execute(Command::SetItemsPerPage { items_per_page: 0 }));
        assert_eq!(page.items_per_page, query::DEFAULT_ITEMS_PER_PAGE);
    }

    #[test]
    fn test_area_command_and_pushed_view() {
        let mut dispatcher = Dispatcher::new(store_with(2));

        let request: AreaRequest =
            serde_json::from_str(r#"{"minLat":0,"maxLat":60,"minLon":0,"maxLon":60}"#).unwrap();
        let result = area(dispatcher.execute(Command::GetAreaData { area: request }));
        assert_eq!(result.area_data.len(), 2);

        // A pushed refresh renews the area view, not the table.
        let pushed = area(dispatcher.current_view());
        assert_eq!(pushed.area_data.len(), 2);

        // An explicit refresh goes back to the tabular query.
        let refreshed = table(dispatcher.execute(Command::Refresh));
        assert_eq!(refreshed.total_items, 2);
    }

    #[test]
    fn test_invalid_area_answers_empty() {
        let mut dispatcher = Dispatcher::new(store_with(2));
        let request: AreaRequest =
            serde_json::from_str(r#"{"minLat":"x","maxLat":60,"minLon":0,"maxLon":60}"#).unwrap();
        let result = area(dispatcher.execute(Command::GetAreaData { area: request }));
        assert!(result.area_data.is_empty());
        assert!(dispatcher.state().area.is_none());
    }
}
