//! Pure reconciliation pipeline
//!
//! raw tables -> cleaning -> aggregation -> cumulative join -> region
//! enrichment -> final table.
//!
//! CRITICAL: `run` is DETERMINISTIC and side-effect free. Tables go in by
//! value and come out by value; nothing is cached between runs.

use crate::aggregate::{aggregate, yearly_totals};
use crate::clean::{clean_alerts, clean_references, clean_regions, CleaningReport};
use crate::cumulative::{join_with, JoinStrategy};
use crate::records::{FinalRow, RawAlert, RawReference, RawRegion, YearlyTotal};
use crate::region::{count_unmatched_references, enrich_with, RegionLookup};
use serde::Serialize;
use tracing::info;

/// The three raw tables handed over by the loading collaborator
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub references: Vec<RawReference>,
    pub alerts: Vec<RawAlert>,
    pub regions: Vec<RawRegion>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Keep only alerts from this state (compared after normalization)
    pub state_filter: Option<String>,
    pub join_strategy: JoinStrategy,
}

/// Row counts between stages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageCounts {
    pub references: usize,
    pub alerts: usize,
    pub groups: usize,
    pub final_rows: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub rows: Vec<FinalRow>,
    pub yearly: Vec<YearlyTotal>,
    pub cleaning: CleaningReport,
    pub stages: StageCounts,
}

pub fn run(inputs: Inputs, options: &PipelineOptions) -> PipelineOutput {
    let mut cleaning = CleaningReport::default();

    let references = clean_references(inputs.references, &mut cleaning);
    let alerts = clean_alerts(inputs.alerts, options.state_filter.as_deref(), &mut cleaning);
    let regions = clean_regions(inputs.regions, &mut cleaning);

    let mut stages = StageCounts {
        references: references.len(),
        alerts: alerts.len(),
        ..StageCounts::default()
    };

    let groups = aggregate(alerts);
    stages.groups = groups.len();
    let yearly = yearly_totals(&groups);

    let lookup = RegionLookup::build(regions, &mut cleaning);
    count_unmatched_references(&lookup, &references, &mut cleaning);

    let joined = join_with(groups, &references, options.join_strategy);
    let rows = enrich_with(joined, &lookup, &mut cleaning);
    stages.final_rows = rows.len();

    info!(
        references = stages.references,
        alerts = stages.alerts,
        groups = stages.groups,
        rows = stages.final_rows,
        "pipeline complete"
    );

    PipelineOutput {
        rows,
        yearly,
        cleaning,
        stages,
    }
}
