//! Admin dashboard: head counts, year-level distribution, recent
//! registrations, and the audited CSV export.

pub mod export;
pub mod router;
pub mod stats;

pub use export::{export_filename, render_csv, CsvExport, ExportError};
pub use router::{dashboard_router, DashboardApi};
pub use stats::{ActivityEntry, ActivityKind, DashboardService, DashboardStats, YearLevelCount};
