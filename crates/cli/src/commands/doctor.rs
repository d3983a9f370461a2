use docent_core::config::{AppConfig, LoadOptions};
use docent_core::domain::catalog::RoomId;
use docent_core::knowledge::KnowledgeBase;
use serde::Serialize;

use crate::commands::CommandResult;

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

/// Exit code 1 when any check fails. Skipped checks do not fail the report.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

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

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_api_key(&config));
            checks.push(check_grounding_file(&config));
            checks.extend(check_catalog(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["completion_api_key", "grounding_file", "catalog_load", "initial_room"] {
                checks.push(skipped(name, "skipped because configuration did not load"));
            }
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

fn check_api_key(config: &AppConfig) -> DoctorCheck {
    if config.has_api_key() {
        DoctorCheck {
            name: "completion_api_key",
            status: CheckStatus::Pass,
            details: "API key configured".to_string(),
        }
    } else {
        DoctorCheck {
            name: "completion_api_key",
            status: CheckStatus::Fail,
            details: "set DOCENT_COMPLETION_API_KEY (or OPENAI_API_KEY); every reply will be the fallback apology without it".to_string(),
        }
    }
}

fn check_grounding_file(config: &AppConfig) -> DoctorCheck {
    match &config.completion.grounding_file_id {
        Some(file_id) => DoctorCheck {
            name: "grounding_file",
            status: CheckStatus::Pass,
            details: format!("grounded calls attach `{file_id}`"),
        },
        None => skipped(
            "grounding_file",
            "no grounding file id; replies use ungrounded calls (see `docent upload-catalog`)",
        ),
    }
}

fn check_catalog(config: &AppConfig) -> Vec<DoctorCheck> {
    let knowledge = match KnowledgeBase::from_config(&config.knowledge) {
        Ok(knowledge) => knowledge,
        Err(error) => {
            return vec![
                DoctorCheck {
                    name: "catalog_load",
                    status: CheckStatus::Fail,
                    details: error.to_string(),
                },
                skipped("initial_room", "skipped because the catalog did not load"),
            ];
        }
    };

    let source = config
        .knowledge
        .path
        .as_ref()
        .map(|path| format!("`{}`", path.display()))
        .unwrap_or_else(|| "built-in catalog".to_string());
    let catalog = DoctorCheck {
        name: "catalog_load",
        status: CheckStatus::Pass,
        details: format!(
            "{source}: {} rooms, {} artworks",
            knowledge.room_count(),
            knowledge.artwork_count()
        ),
    };

    let initial_room = RoomId::new(config.conversation.initial_room.trim().to_ascii_lowercase());
    let room = match knowledge.room(&initial_room) {
        Some(room) => DoctorCheck {
            name: "initial_room",
            status: CheckStatus::Pass,
            details: format!("sessions start in `{}` ({})", room.key, room.title),
        },
        None => DoctorCheck {
            name: "initial_room",
            status: CheckStatus::Fail,
            details: format!("initial room `{initial_room}` is not in the catalog"),
        },
    };

    vec![catalog, room]
}

fn skipped(name: &'static str, details: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: details.to_string() }
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
