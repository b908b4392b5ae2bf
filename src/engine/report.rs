// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use serde::Serialize;

use crate::store::CollectionReport;

/// Statistics of one finished graph run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub graph: String,
    pub mode: String,
    pub workers: usize,
    pub steps_prescribed: u64,
    pub steps_demanded: u64,
    pub steps_completed: u64,
    pub items_put: u64,
    pub items_reclaimed: u64,
    pub collections: Vec<CollectionReport>,
    /// `finished`, or the rendered error that ended the run.
    pub outcome: String,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == "finished"
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({} mode, {} workers): {} in {} ms",
            self.graph, self.mode, self.workers, self.outcome, self.duration_ms
        )?;
        writeln!(
            f,
            "  steps: {} prescribed ({} on demand), {} completed",
            self.steps_prescribed, self.steps_demanded, self.steps_completed
        )?;
        write!(
            f,
            "  items: {} put, {} reclaimed",
            self.items_put, self.items_reclaimed
        )?;
        for collection in &self.collections {
            write!(
                f,
                "\n    {}: {} put, {} reclaimed",
                collection.name, collection.puts, collection.reclaimed
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        RunReport {
            graph: "SimpleDemand".into(),
            mode: "single_threaded".into(),
            workers: 1,
            steps_prescribed: 10,
            steps_demanded: 0,
            steps_completed: 10,
            items_put: 11,
            items_reclaimed: 11,
            collections: vec![CollectionReport {
                name: "X".into(),
                puts: 11,
                reclaimed: 11,
            }],
            outcome: "finished".into(),
            duration_ms: 3,
        }
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["graph"], "SimpleDemand");
        assert_eq!(json["collections"][0]["puts"], 11);
        assert_eq!(json["outcome"], "finished");
    }

    #[test]
    fn test_display_lists_collections() {
        let rendered = report().to_string();
        assert!(rendered.starts_with("SimpleDemand (single_threaded mode, 1 workers): finished"));
        assert!(rendered.contains("X: 11 put, 11 reclaimed"));
        assert!(report().succeeded());
    }
}
