//! Fleet query requests and responses.

use hashfleet_core::{GpuType, GroupId, WorkId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::record::ClientRecord;
use crate::sort::{ActiveSort, SortDirection, SortField, SortSpec};

/// Page sizes the studio offers.
pub const PAGE_SIZES: [u32; 4] = [10, 20, 30, 40];

/// Default page size.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Check a page size against [`PAGE_SIZES`].
///
/// # Errors
///
/// Returns `StudioError::InvalidInput` for any other size.
pub fn validate_page_size(page_size: u32) -> Result<u32> {
    if PAGE_SIZES.contains(&page_size) {
        Ok(page_size)
    } else {
        Err(StudioError::InvalidInput(format!(
            "page size must be one of {PAGE_SIZES:?}, got {page_size}"
        )))
    }
}

/// Mining state filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MineStateFilter {
    /// Every node.
    #[default]
    All,
    /// Nodes that are mining.
    Mining,
    /// Nodes that are not mining.
    NotMining,
}

/// Filter predicates of a fleet query. Empty strings match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    /// Group.
    #[serde(default)]
    pub group_id: Option<GroupId>,
    /// Assigned work.
    #[serde(default)]
    pub work_id: Option<WorkId>,
    /// Address substring.
    #[serde(default)]
    pub miner_ip: String,
    /// Name substring.
    #[serde(default)]
    pub miner_name: String,
    /// Mining state.
    #[serde(default)]
    pub mine_state: MineStateFilter,
    /// Main coin code.
    #[serde(default)]
    pub coin: String,
    /// Pool name.
    #[serde(default)]
    pub pool: String,
    /// Wallet substring.
    #[serde(default)]
    pub wallet: String,
    /// Node software version.
    #[serde(default)]
    pub version: String,
    /// Kernel name.
    #[serde(default)]
    pub kernel: String,
    /// GPU vendor; `Empty` matches all.
    #[serde(default)]
    pub gpu_type: GpuType,
    /// GPU model.
    #[serde(default)]
    pub gpu_name: String,
    /// GPU driver.
    #[serde(default)]
    pub gpu_driver: String,
}

/// A paged, sorted, filtered fleet query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryClientsRequest {
    /// One-based page index.
    pub page_index: u32,
    /// Rows per page.
    pub page_size: u32,
    /// Filters.
    #[serde(flatten)]
    pub filter: QueryFilter,
    /// Sort field.
    pub sort_field: SortField,
    /// Sort direction.
    pub sort_direction: SortDirection,
}

impl QueryClientsRequest {
    /// The sort this request asks for.
    #[must_use]
    pub const fn sort(&self) -> ActiveSort {
        ActiveSort {
            field: self.sort_field,
            direction: self.sort_direction,
        }
    }
}

/// Online and mining counts for one coin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinSnapshot {
    /// Coin code.
    pub coin_code: String,
    /// Nodes mining this coin.
    #[serde(default)]
    pub mining_count: u32,
    /// Online nodes set to this coin.
    #[serde(default)]
    pub online_count: u32,
}

impl CoinSnapshot {
    /// Zero counts for a coin missing from a response.
    #[must_use]
    pub fn empty(coin_code: impl Into<String>) -> Self {
        Self {
            coin_code: coin_code.into(),
            mining_count: 0,
            online_count: 0,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryClientsResponse {
    /// Records of the requested page, in server order.
    #[serde(default)]
    pub data: Vec<ClientRecord>,
    /// Records matching the filter across all pages.
    #[serde(default)]
    pub total: u32,
    /// Mining nodes across the fleet.
    #[serde(default)]
    pub total_mining_count: u32,
    /// Online nodes across the fleet.
    #[serde(default)]
    pub total_online_count: u32,
    /// Per-coin counts.
    #[serde(default)]
    pub latest_snapshots: Vec<CoinSnapshot>,
}

/// The studio's mutable query state: filters, sort and page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetQuery {
    /// Filters.
    pub filter: QueryFilter,
    sort: SortSpec,
    page_index: u32,
    page_size: u32,
}

impl Default for FleetQuery {
    fn default() -> Self {
        Self::new(SortSpec::default(), DEFAULT_PAGE_SIZE)
    }
}

impl FleetQuery {
    /// A query on page 1. An unsupported page size falls back to the default.
    #[must_use]
    pub fn new(sort: SortSpec, page_size: u32) -> Self {
        Self {
            filter: QueryFilter::default(),
            sort,
            page_index: 1,
            page_size: validate_page_size(page_size).unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    /// The sort specification.
    #[must_use]
    pub const fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// The current page index.
    #[must_use]
    pub const fn page_index(&self) -> u32 {
        self.page_index
    }

    /// The current page size.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Select a sort column and go back to page 1.
    pub fn select_sort(&mut self, field: SortField) -> ActiveSort {
        self.page_index = 1;
        self.sort.select(field)
    }

    /// Change the page size and go back to page 1.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::InvalidInput` for an unsupported size.
    pub fn set_page_size(&mut self, page_size: u32) -> Result<()> {
        self.page_size = validate_page_size(page_size)?;
        self.page_index = 1;
        Ok(())
    }

    /// Jump to a page. Index 0 is treated as 1.
    pub fn set_page_index(&mut self, page_index: u32) {
        self.page_index = page_index.max(1);
    }

    /// Build the request. A work filter overrides the coin and wallet filters.
    #[must_use]
    pub fn to_request(&self) -> QueryClientsRequest {
        let mut filter = self.filter.clone();
        if filter.work_id.is_some_and(|id| !id.is_nil()) {
            filter.coin.clear();
            filter.wallet.clear();
        }
        let sort = self.sort.active();
        QueryClientsRequest {
            page_index: self.page_index,
            page_size: self.page_size,
            filter,
            sort_field: sort.field,
            sort_direction: sort.direction,
        }
    }
}
