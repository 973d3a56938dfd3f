use crate::infra::LocalNotifier;
use clap::Args;
use parkqueue::approvals::{
    ApprovalCommand, ApprovalsManager, DispatchResult, NoticeLevel, PendingAccount, SortKey,
};
use parkqueue::config::ApprovalsConfig;
use parkqueue::dashboard::DashboardService;
use parkqueue::directory::{Collection, MemoryDirectory};
use parkqueue::error::AppError;
use parkqueue::notifications::{LogMailer, MailerService};
use parkqueue::session::AdminGate;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_ADMIN_UID: &str = "demo-admin";
const DEMO_ADMIN_EMAIL: &str = "registrar@campus.edu";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Load this directory snapshot instead of the built-in sample students.
    #[arg(long)]
    pub(crate) snapshot: Option<PathBuf>,
    /// Narrow the pending list before reviewing.
    #[arg(long)]
    pub(crate) search: Option<String>,
    /// Reason recorded for the demo rejection (blank uses the default reason).
    #[arg(long)]
    pub(crate) reject_reason: Option<String>,
    /// Print the full CSV export at the end.
    #[arg(long)]
    pub(crate) print_csv: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        snapshot,
        search,
        reject_reason,
        print_csv,
    } = args;

    let directory = match snapshot {
        Some(path) => MemoryDirectory::load(path)?,
        None => sample_directory(),
    };
    let directory = Arc::new(directory);

    let mailer = Arc::new(MailerService::new(Arc::new(LogMailer::default()), None));
    let notifier = Arc::new(LocalNotifier::new(mailer));
    let manager = ApprovalsManager::new(directory.clone(), notifier, ApprovalsConfig::default());
    let dashboard = DashboardService::new(directory.clone());
    let gate = AdminGate::new(directory.clone());

    println!("ParkQueue approval demo");
    let operator = match gate.sign_in(DEMO_ADMIN_UID, DEMO_ADMIN_EMAIL).await {
        Ok(operator) => operator,
        Err(err) => {
            println!("  Sign-in refused: {}", err);
            return Ok(());
        }
    };
    println!(
        "- Signed in as {} ({}) [{}]",
        operator.display_name,
        operator.email,
        operator.initials()
    );

    let loaded = manager.dispatch(&operator, ApprovalCommand::Reload).await;
    report_notice(&loaded);
    let mut listing = manager
        .dispatch(
            &operator,
            ApprovalCommand::SortChanged {
                sort: SortKey::Oldest,
            },
        )
        .await;
    if let Some(term) = search {
        listing = manager
            .dispatch(&operator, ApprovalCommand::SearchChanged { term })
            .await;
    }
    render_listing(&listing);

    let queue = listing.snapshot.page.items.clone();
    let Some(first) = queue.first() else {
        println!("\nNo pending accounts to review.");
        return render_dashboard(&dashboard, &operator, print_csv).await;
    };

    println!("\nReviewing {}", first.label());
    let viewed = manager
        .dispatch(
            &operator,
            ApprovalCommand::View {
                account_id: first.id.clone(),
            },
        )
        .await;
    if let Some(details) = &viewed.details {
        println!("  Full name: {}", details.full_name);
        if let Some(personal) = &details.personal {
            println!(
                "  Course: {} | Year level: {}",
                personal.course.as_deref().unwrap_or("-"),
                personal.year_level.as_deref().unwrap_or("-")
            );
        }
        if let Some(vehicle) = &details.vehicle {
            println!(
                "  Vehicle: {} {} ({})",
                vehicle.brand.as_deref().unwrap_or("-"),
                vehicle.model.as_deref().unwrap_or("-"),
                vehicle.plate_number.as_deref().unwrap_or("no plate")
            );
        }
        println!("  Documents on file: {}", details.documents.len());
    }
    report_notice(&viewed);

    let approved = manager
        .dispatch(
            &operator,
            ApprovalCommand::Approve {
                account_id: first.id.clone(),
                display_label: first.label(),
                confirmed: true,
            },
        )
        .await;
    report_notice(&approved);

    if let Some(second) = queue.get(1) {
        println!("\nRejecting {}", second.label());
        manager
            .dispatch(
                &operator,
                ApprovalCommand::BeginReject {
                    account_id: second.id.clone(),
                    display_label: second.label(),
                },
            )
            .await;
        let rejected = manager
            .dispatch(
                &operator,
                ApprovalCommand::ConfirmReject {
                    reason: reject_reason,
                },
            )
            .await;
        report_notice(&rejected);
        println!("- {} account(s) still pending", rejected.snapshot.pending_count);
    }

    render_dashboard(&dashboard, &operator, print_csv).await
}

fn report_notice(result: &DispatchResult) {
    if let Some(notice) = &result.notice {
        let marker = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
            NoticeLevel::Info => "info",
        };
        println!("  [{}] {}", marker, notice.message);
    }
}

fn render_listing(result: &DispatchResult) {
    let snapshot = &result.snapshot;
    println!(
        "\nPending accounts: {} (page {}/{}, sorted by {})",
        snapshot.pending_count, snapshot.page.page, snapshot.page.total_pages, snapshot.sort
    );
    for account in &snapshot.page.items {
        println!("  - {}", listing_line(account));
    }
}

fn listing_line(account: &PendingAccount) -> String {
    let estimated = if account.created_at_estimated {
        " (date estimated)"
    } else {
        ""
    };
    format!(
        "{} <{}> id {} | registered {}{}",
        account.label(),
        account.email.as_deref().unwrap_or("no email"),
        if account.student_id.is_empty() {
            "unavailable"
        } else {
            account.student_id.as_str()
        },
        account.created_at.format("%Y-%m-%d"),
        estimated
    )
}

async fn render_dashboard(
    dashboard: &DashboardService<MemoryDirectory>,
    operator: &parkqueue::session::Operator,
    print_csv: bool,
) -> Result<(), AppError> {
    let stats = match dashboard.stats().await {
        Ok(stats) => stats,
        Err(err) => {
            println!("\nDashboard unavailable: {}", err);
            return Ok(());
        }
    };
    println!("\nDashboard");
    println!(
        "- {} students | {} verified | {} pending | {} approved | {} rejected",
        stats.total, stats.verified, stats.pending, stats.approved, stats.rejected
    );

    match dashboard.export_csv(operator).await {
        Ok(export) => {
            println!("- Export ready: {} ({} bytes)", export.filename, export.body.len());
            if print_csv {
                println!("\n{}", export.body);
            }
        }
        Err(err) => println!("- Export failed: {}", err),
    }
    Ok(())
}

fn sample_directory() -> MemoryDirectory {
    let directory = MemoryDirectory::default();
    let seeds = [
        (
            Collection::Admin,
            "admin-1",
            json!({ "email": DEMO_ADMIN_EMAIL, "name": "Campus Registrar" }),
        ),
        (
            Collection::Users,
            "stu-ana-0001",
            json!({
                "email": "ana.reyes@campus.edu",
                "displayName": "Ana Reyes",
                "first_name": "Ana",
                "last_name": "Reyes",
                "verification_submitted": true,
                "created_at": "2025-06-02T08:15:00Z",
            }),
        ),
        (
            Collection::Users,
            "stu-ben-0002",
            json!({
                "email": "ben.santos@campus.edu",
                "username": "bsantos",
                "approval_status": "pending",
                "created_at": "2025-06-04T13:40:00Z",
            }),
        ),
        (
            Collection::Users,
            "stu-cara-0003",
            json!({
                "email": "cara.lim@campus.edu",
                "first_name": "Cara",
                "approval_status": "approved",
                "is_verified": true,
                "created_at": "2025-05-28T09:00:00Z",
            }),
        ),
        (
            Collection::PersonalInfo,
            "pi-ana",
            json!({
                "user_id": "stu-ana-0001",
                "student_id": "2023-0142",
                "course": "BSIT",
                "year_level": "2nd Year",
            }),
        ),
        (
            Collection::PersonalInfo,
            "pi-cara",
            json!({ "user_id": "stu-cara-0003", "year_level": "4th Year" }),
        ),
        (
            Collection::MotorInfo,
            "mi-ana",
            json!({
                "user_id": "stu-ana-0001",
                "motorcycle_brand": "Honda",
                "motorcycle_model": "Click 125",
                "plate_number": "NBC-4821",
            }),
        ),
        (
            Collection::Documents,
            "doc-ana",
            json!({
                "user_id": "stu-ana-0001",
                "document_type": "OR/CR",
                "document_url": "https://files.campus.edu/or-cr/stu-ana-0001.pdf",
            }),
        ),
    ];

    for (collection, id, value) in seeds {
        if let Err(err) = directory.insert(collection, id, value) {
            println!("  Skipping sample record {}: {}", id, err);
        }
    }
    directory
}
