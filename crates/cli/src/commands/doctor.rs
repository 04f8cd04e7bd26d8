use serde::Serialize;
use triage_core::config::{AppConfig, LoadOptions};
use triage_server::health::{HealthCheck, HttpReadinessProbe, ReadinessProbe};

use crate::commands::{CommandResult, EXIT_BOOTSTRAP_FAILURE, EXIT_CONFIG_FAILURE};

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

/// Never launches anything: reports what `ask` would find.
pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let (report, exit_code) = build_report(options);

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> (DoctorReport, u8) {
    let mut checks = Vec::new();

    let exit_code = match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(check_backend(&config));
            if checks.iter().all(|check| check.status == CheckStatus::Pass) {
                0
            } else {
                EXIT_BOOTSTRAP_FAILURE
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["backend_tcp", "backend_health"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
            EXIT_CONFIG_FAILURE
        }
    };

    let all_pass = exit_code == 0;
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    (DoctorReport { overall_status, summary, checks }, exit_code)
}

fn check_backend(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "backend_tcp",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    let probe = HttpReadinessProbe::from_config(config);
    let report = runtime.block_on(probe.check());

    vec![to_check("backend_tcp", report.tcp), to_check("backend_health", report.api)]
}

fn to_check(name: &'static str, check: HealthCheck) -> DoctorCheck {
    let status = match check.status {
        "ready" => CheckStatus::Pass,
        "skipped" => CheckStatus::Skipped,
        _ => CheckStatus::Fail,
    };
    DoctorCheck { name, status, details: check.detail }
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
