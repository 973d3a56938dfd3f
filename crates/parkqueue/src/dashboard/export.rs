//! Three-section CSV export of the dashboard figures.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use super::stats::{ActivityEntry, DashboardService, DashboardStats, YearLevelCount};
use crate::audit::AuditOutcome;
use crate::directory::{DirectoryStore, StoreError};
use crate::session::Operator;

pub const EXPORT_ACTIVITY_LIMIT: usize = 50;
const MISSING: &str = "N/A";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to finish csv: {0}")]
    Finish(String),
    #[error("csv output is not utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: String,
    pub body: String,
    pub audit: AuditOutcome,
}

/// `parkqueue-data-YYYY-MM-DD.csv`
pub fn export_filename(day: NaiveDate) -> String {
    format!("parkqueue-data-{}.csv", day.format("%Y-%m-%d"))
}

pub fn render_csv(
    stats: &DashboardStats,
    year_levels: &[YearLevelCount],
    activities: &[ActivityEntry],
) -> Result<String, ExportError> {
    let mut summary = vec![
        vec!["SUMMARY STATISTICS".to_string()],
        vec!["Metric".to_string(), "Value".to_string()],
    ];
    for (metric, value) in [
        ("Total Students", stats.total),
        ("Verified Accounts", stats.verified),
        ("Pending Approvals", stats.pending),
        ("Approved Accounts", stats.approved),
        ("Rejected Accounts", stats.rejected),
    ] {
        summary.push(vec![metric.to_string(), value.to_string()]);
    }

    let mut years = vec![
        vec!["YEAR LEVEL DISTRIBUTION".to_string()],
        vec!["Year Level".to_string(), "Count".to_string()],
    ];
    years.extend(
        year_levels
            .iter()
            .map(|level| vec![level.year_level.clone(), level.count.to_string()]),
    );

    let mut recent = vec![
        vec!["RECENT ACTIVITIES".to_string()],
        ["Date", "Time", "User", "Email", "Activity", "Status"]
            .map(String::from)
            .to_vec(),
    ];
    for activity in activities {
        let (date, time) = date_and_time(activity.created_at);
        recent.push(vec![
            date,
            time,
            activity.user.clone(),
            activity.email.clone().unwrap_or_else(|| MISSING.to_string()),
            activity.activity_label.to_string(),
            activity.approval_status.clone(),
        ]);
    }

    let sections = [
        section(&[vec!["ParkQueue Data Export".to_string()]])?,
        section(&summary)?,
        section(&years)?,
        section(&recent)?,
    ];
    Ok(sections.join("\n"))
}

/// One block of rows; blocks differ in width so each gets its own writer.
fn section(rows: &[Vec<String>]) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Finish(err.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

fn date_and_time(at: Option<DateTime<Utc>>) -> (String, String) {
    match at {
        Some(at) => (
            at.format("%Y-%m-%d").to_string(),
            at.format("%H:%M:%S").to_string(),
        ),
        None => (MISSING.to_string(), MISSING.to_string()),
    }
}

impl<S> DashboardService<S>
where
    S: DirectoryStore + 'static,
{
    /// Renders the export and appends an `export` audit entry.
    pub async fn export_csv(&self, operator: &Operator) -> Result<CsvExport, ExportError> {
        let (stats, year_levels, activities) = tokio::try_join!(
            self.stats(),
            self.year_levels(),
            self.recent_activity(EXPORT_ACTIVITY_LIMIT)
        )?;
        let body = render_csv(&stats, &year_levels, &activities)?;
        let audit = self.audit.export_data(operator, "dashboard").await;

        info!(
            admin = %operator.email,
            rows = activities.len(),
            "dashboard exported"
        );

        Ok(CsvExport {
            filename: export_filename(Utc::now().date_naive()),
            body,
            audit,
        })
    }
}
