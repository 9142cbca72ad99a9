//! src/services/export_service.rs
//!
//! Background export/report jobs. The worker here talks to the engine only
//! through `ParkingService::bookings_for_user`, the plain read-only query
//! path, so a long export can never hold locks that stall booking or
//! release traffic. Delivery (mail, download links) stays outside this
//! repository; jobs produce their artifact in memory and callers poll for
//! it by job id.

use crate::models::booking::Booking;
use crate::services::parking_service::ParkingService;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

const JOB_QUEUE_DEPTH: usize = 64;

/// Lifecycle of one queued export.
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportJobStatus {
    Pending,
    Completed {
        filename: String,
        content_type: String,
        content: String,
    },
    Failed {
        error: String,
    },
}

struct ExportRequest {
    job_id: Uuid,
    user_id: Uuid,
}

/// Job registry plus the queue feeding a single worker task.
///
/// Cloning shares the registry; handlers enqueue and poll, the worker owns
/// the `ParkingService` handle it reads with.
#[derive(Clone)]
pub struct ExportJobs {
    jobs: Arc<Mutex<HashMap<Uuid, ExportJobStatus>>>,
    tx: mpsc::Sender<ExportRequest>,
}

impl ExportJobs {
    /// Spawn the worker task and return the shared handle.
    pub fn start(parking: ParkingService) -> Self {
        let (tx, mut rx) = mpsc::channel::<ExportRequest>(JOB_QUEUE_DEPTH);
        let jobs: Arc<Mutex<HashMap<Uuid, ExportJobStatus>>> = Arc::new(Mutex::new(HashMap::new()));

        let registry = jobs.clone();
        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                let outcome = match parking.bookings_for_user(req.user_id, None).await {
                    Ok(bookings) => {
                        debug!(
                            "export job {}: rendering {} bookings for user {}",
                            req.job_id,
                            bookings.len(),
                            req.user_id
                        );
                        ExportJobStatus::Completed {
                            filename: format!(
                                "parking_history_{}_{}.csv",
                                req.user_id,
                                Utc::now().format("%Y%m%d_%H%M%S")
                            ),
                            content_type: "text/csv".into(),
                            content: history_csv(&bookings),
                        }
                    }
                    Err(err) => {
                        warn!("export job {} failed: {}", req.job_id, err);
                        ExportJobStatus::Failed {
                            error: err.to_string(),
                        }
                    }
                };
                if let Ok(mut jobs) = registry.lock() {
                    jobs.insert(req.job_id, outcome);
                }
            }
        });

        Self { jobs, tx }
    }

    /// Queue a CSV export of the user's full booking history and return the
    /// job id to poll.
    pub async fn enqueue_history_export(&self, user_id: Uuid) -> Uuid {
        let job_id = Uuid::new_v4();
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(job_id, ExportJobStatus::Pending);
        }
        if self
            .tx
            .send(ExportRequest { job_id, user_id })
            .await
            .is_err()
        {
            warn!("export queue is down, failing job {job_id}");
            if let Ok(mut jobs) = self.jobs.lock() {
                jobs.insert(
                    job_id,
                    ExportJobStatus::Failed {
                        error: "export worker is not running".into(),
                    },
                );
            }
        }
        job_id
    }

    pub fn status(&self, job_id: Uuid) -> Option<ExportJobStatus> {
        self.jobs
            .lock()
            .ok()
            .and_then(|jobs| jobs.get(&job_id).cloned())
    }
}

/// Render a booking list as CSV, newest first as queried. Pure function of
/// its input.
pub fn history_csv(bookings: &[Booking]) -> String {
    let mut out = String::from("booking_id,lot_name,spot_number,parked_in,parked_out,cost\n");
    for b in bookings {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.id,
            csv_field(&b.lot_name),
            b.spot_number,
            b.start_time.format("%Y-%m-%d %H:%M"),
            b.end_time
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            b.cost.map(|c| format!("{c:.2}")).unwrap_or_default(),
        ));
    }
    out
}

/// Plain-text body of the monthly activity summary the delivery layer sends
/// out. `bookings` is whatever the caller pulled for the period; open
/// bookings contribute no spend.
pub fn monthly_report(user_id: Uuid, period: DateTime<Utc>, bookings: &[Booking]) -> String {
    let total_spent: f64 = bookings.iter().filter_map(|b| b.cost).sum();
    format!(
        "Monthly parking summary for user {user_id}\n\
         Period: {}\n\
         Total bookings: {}\n\
         Total spent: {total_spent:.2}\n",
        period.format("%B %Y"),
        bookings.len(),
    )
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
