use engine_config::settings::BatchTableStrategy;
use engine_core::context::TableContext;
use tracing::trace;

/// Picks the table each produce call reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchScheduler {
    /// Round robin over tables not yet exhausted in the current round.
    SwitchTables { next: usize },
    /// Stays on one table until a read finds it exhausted. A table that is
    /// never exhausted starves the ones after it.
    ProcessAll { current: usize },
}

impl BatchScheduler {
    pub fn new(strategy: BatchTableStrategy) -> Self {
        match strategy {
            BatchTableStrategy::SwitchTables => BatchScheduler::SwitchTables { next: 0 },
            BatchTableStrategy::ProcessAllAvailableRowsFromTable => {
                BatchScheduler::ProcessAll { current: 0 }
            }
        }
    }

    /// Index of the table to read next, or `None` without tables.
    pub fn select(&mut self, tables: &mut [TableContext]) -> Option<usize> {
        let count = tables.len();
        if count == 0 {
            return None;
        }

        match self {
            BatchScheduler::SwitchTables { next } => {
                let start = *next % count;
                let candidate = (0..count)
                    .map(|step| (start + step) % count)
                    .find(|&idx| !tables[idx].is_exhausted());

                match candidate {
                    Some(idx) => Some(idx),
                    None => {
                        trace!("Every table exhausted, starting a new round");
                        tables.iter_mut().for_each(TableContext::reactivate);
                        Some(start)
                    }
                }
            }
            BatchScheduler::ProcessAll { current } => Some(*current % count),
        }
    }

    /// Records the result of reading table `index`.
    pub fn complete(&mut self, index: usize, exhausted: bool, count: usize) {
        if count == 0 {
            return;
        }
        match self {
            BatchScheduler::SwitchTables { next } => *next = (index + 1) % count,
            BatchScheduler::ProcessAll { current } => {
                if exhausted {
                    *current = (index + 1) % count;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::sql::base::metadata::{column::ColumnMetadata, table::TableMetadata};
    use engine_core::discovery::DiscoveredTable;
    use model::{
        core::{data_type::DataType, identifiers::TableId},
        pagination::position::{OffsetColumn, TablePosition},
    };

    fn contexts(names: &[&str]) -> Vec<TableContext> {
        names
            .iter()
            .map(|name| {
                let id = TableId::new("TEST", *name);
                let columns = vec![OffsetColumn::new("p_id", DataType::Int)];
                TableContext::new(DiscoveredTable {
                    metadata: TableMetadata::new(
                        id.clone(),
                        vec![ColumnMetadata::new("p_id", DataType::Int)],
                        vec!["p_id".into()],
                    ),
                    id,
                    initial_position: TablePosition::unbounded(&columns),
                    offset_columns: columns,
                })
            })
            .collect()
    }

    /// Drives the scheduler with tables that run dry after the given number
    /// of reads and returns the visiting order.
    fn visits(scheduler: &mut BatchScheduler, reads_until_dry: &[usize], calls: usize) -> Vec<usize> {
        let names: Vec<String> = (0..reads_until_dry.len()).map(|i| format!("T{i}")).collect();
        let mut tables = contexts(&names.iter().map(String::as_str).collect::<Vec<_>>());
        let mut reads = vec![0; tables.len()];
        let mut order = Vec::new();

        for _ in 0..calls {
            let idx = scheduler.select(&mut tables).unwrap();
            reads[idx] += 1;
            let exhausted = reads[idx] >= reads_until_dry[idx];
            tables[idx].mark_read(exhausted);
            scheduler.complete(idx, exhausted, tables.len());
            order.push(idx);
        }
        order
    }

    #[test]
    fn switch_tables_skips_exhausted_tables_within_a_round() {
        // 10 and 15 rows read 5 at a time.
        let mut scheduler = BatchScheduler::new(BatchTableStrategy::SwitchTables);
        assert_eq!(visits(&mut scheduler, &[2, 3], 6), vec![0, 1, 0, 1, 1, 0]);
    }

    #[test]
    fn process_all_drains_before_moving_on() {
        let mut scheduler =
            BatchScheduler::new(BatchTableStrategy::ProcessAllAvailableRowsFromTable);
        assert_eq!(visits(&mut scheduler, &[3, 2], 5), vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn no_tables_no_selection() {
        let mut scheduler = BatchScheduler::new(BatchTableStrategy::SwitchTables);
        assert_eq!(scheduler.select(&mut []), None);
    }
}
