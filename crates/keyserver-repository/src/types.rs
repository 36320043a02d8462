use keyserver_domain::ExportWindow;

/// A work item the batch controller wants persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExportBatch {
    pub region: String,
    pub window: ExportWindow,
    pub batch_num: i32,
    pub batch_size: i32,
    pub max_records: i32,
}

/// Number of exposures stored for one region inside a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionCount {
    pub region: String,
    pub count: u64,
}
