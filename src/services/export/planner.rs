use keyserver_domain::ExportWindow;
use keyserver_repository::{NewExportBatch, RegionCount};

/// Record counts of the batches needed to hold `count` records at most
/// `max_records` per batch. Every batch is full except possibly the last.
pub(crate) fn batch_record_counts(count: u64, max_records: u32) -> Vec<u64> {
    let max_records = u64::from(max_records.max(1));
    let batches = count.div_ceil(max_records);
    (0..batches)
        .map(|index| (count - index * max_records).min(max_records))
        .collect()
}

/// Work items for one window: `ceil(count / max_records)` per region, each
/// recording its 1-based position and the region's batch total.
///
/// The output depends only on the inputs, so re-planning a window yields the
/// same items.
pub(crate) fn plan_batches(
    window: ExportWindow,
    counts: &[RegionCount],
    max_records: u32,
) -> Vec<NewExportBatch> {
    let mut planned = Vec::new();
    for RegionCount { region, count } in counts {
        let batch_size = batch_record_counts(*count, max_records).len();
        let batch_size = i32::try_from(batch_size).unwrap_or(i32::MAX);
        let max_records = i32::try_from(max_records).unwrap_or(i32::MAX);

        planned.extend((1..=batch_size).map(|batch_num| NewExportBatch {
            region: region.clone(),
            window,
            batch_num,
            batch_size,
            max_records,
        }));
    }
    planned
}
