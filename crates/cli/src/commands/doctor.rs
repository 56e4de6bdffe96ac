use serde::Serialize;

use tailor_core::config::{AppConfig, LoadOptions};
use tailor_db::{connect_with_settings, SeedDataset};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            let (connectivity, fixtures) = database_checks(&config);
            checks.push(connectivity);
            checks.push(fixtures);
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "seed_fixtures",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_fail { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_fail {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Connectivity and fixture checks share one pool so doctor opens a single
/// connection against the configured database.
fn database_checks(config: &AppConfig) -> (DoctorCheck, DoctorCheck) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let details = format!("failed to initialize async runtime: {error}");
            return (
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: details.clone(),
                },
                DoctorCheck { name: "seed_fixtures", status: CheckStatus::Skipped, details },
            );
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return (
                    DoctorCheck {
                        name: "database_connectivity",
                        status: CheckStatus::Fail,
                        details: format!("failed to connect to database: {error}"),
                    },
                    DoctorCheck {
                        name: "seed_fixtures",
                        status: CheckStatus::Skipped,
                        details: "skipped because the database is unreachable".to_string(),
                    },
                );
            }
        };

        let connectivity = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await {
            Ok(_) => DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            },
            Err(error) => DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("liveness query failed: {error}"),
            },
        };

        let fixtures = seed_fixture_check(&pool).await;
        pool.close().await;
        (connectivity, fixtures)
    })
}

async fn seed_fixture_check(pool: &tailor_db::DbPool) -> DoctorCheck {
    match SeedDataset::verify(pool).await {
        Ok(verification) if verification.all_passed() => DoctorCheck {
            name: "seed_fixtures",
            status: CheckStatus::Pass,
            details: "all seed fixtures present with expected statuses".to_string(),
        },
        Ok(verification) => {
            let failed = verification
                .checks
                .iter()
                .filter(|check| !check.passed)
                .map(|check| format!("{} ({})", check.name, check.detail))
                .collect::<Vec<_>>();
            if failed.len() == verification.checks.len() {
                DoctorCheck {
                    name: "seed_fixtures",
                    status: CheckStatus::Skipped,
                    details: "fixtures not loaded (run `tailor seed`)".to_string(),
                }
            } else {
                DoctorCheck {
                    name: "seed_fixtures",
                    status: CheckStatus::Fail,
                    details: format!("partial fixture state: {}", failed.join(", ")),
                }
            }
        }
        // A fresh database has no tables yet; that is a migrate problem,
        // not a fixture problem.
        Err(_) => DoctorCheck {
            name: "seed_fixtures",
            status: CheckStatus::Skipped,
            details: "tables missing (run `tailor migrate`)".to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
