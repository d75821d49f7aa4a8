use crate::infra::build_service;
use clap::Args;
use siteline::error::AppError;
use siteline::workflows::underwriting::{
    AssetClass, Coordinates, UnderwritingReport, UnderwritingRequest,
};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct UnderwriteArgs {
    /// Zip code of the candidate parcel
    #[arg(long)]
    pub(crate) zip: String,
    /// State abbreviation (e.g. IA)
    #[arg(long)]
    pub(crate) state: String,
    /// County name
    #[arg(long)]
    pub(crate) county: String,
    /// Asset class: single-story, multi-story, or boat-rv
    #[arg(long, default_value = "single-story", value_parser = parse_asset_class)]
    pub(crate) asset_class: AssetClass,
    /// Gross acreage under consideration
    #[arg(long)]
    pub(crate) acres: f64,
    /// Optional parcel latitude
    #[arg(long)]
    pub(crate) lat: Option<f64>,
    /// Optional parcel longitude
    #[arg(long)]
    pub(crate) lon: Option<f64>,
    /// Rent comp CSV export to hydrate the benchmark book
    #[arg(long)]
    pub(crate) rent_csv: Option<PathBuf>,
    /// Emit the raw decision object as JSON instead of the rendered summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Rent comp CSV export to hydrate the benchmark book
    #[arg(long)]
    pub(crate) rent_csv: Option<PathBuf>,
}

pub(crate) fn parse_asset_class(raw: &str) -> Result<AssetClass, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "single-story" | "single" => Ok(AssetClass::SingleStorySelfStorage),
        "multi-story" | "multi" => Ok(AssetClass::MultiStorySelfStorage),
        "boat-rv" | "rv" | "boat" => Ok(AssetClass::BoatAndRvStorage),
        other => Err(format!(
            "unknown asset class '{other}' (expected single-story, multi-story, or boat-rv)"
        )),
    }
}

pub(crate) fn run_underwrite(args: UnderwriteArgs) -> Result<(), AppError> {
    let UnderwriteArgs {
        zip,
        state,
        county,
        asset_class,
        acres,
        lat,
        lon,
        rent_csv,
        json,
    } = args;

    let coordinates = match (lat, lon) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        _ => None,
    };

    let service = build_service(rent_csv)?;
    let report = service.underwrite(UnderwritingRequest {
        zip,
        state,
        county,
        asset_class,
        requested_acres: acres,
        coordinates,
    });

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("decision object unavailable: {err}"),
        }
    } else {
        render_report(&report);
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let service = build_service(args.rent_csv)?;

    println!("Site underwriting demo");
    println!("======================");

    println!("\n[1/2] Downtown Des Moines, fully researched card");
    let report = service.underwrite(UnderwritingRequest {
        zip: "50309".to_string(),
        state: "IA".to_string(),
        county: "Polk".to_string(),
        asset_class: AssetClass::SingleStorySelfStorage,
        requested_acres: 5.0,
        coordinates: None,
    });
    render_report(&report);

    println!("\n[2/2] West Des Moines, setbacks pending staff research");
    let report = service.underwrite(UnderwritingRequest {
        zip: "50266".to_string(),
        state: "IA".to_string(),
        county: "Dallas".to_string(),
        asset_class: AssetClass::SingleStorySelfStorage,
        requested_acres: 5.0,
        coordinates: None,
    });
    render_report(&report);

    Ok(())
}

pub(crate) fn render_report(report: &UnderwritingReport) {
    println!(
        "Decision: {} (score {:.1}, confidence {:.2}, {})",
        report.verdict.decision.label().to_uppercase(),
        report.verdict.score,
        report.verdict.confidence,
        report.completion.label()
    );
    println!(
        "Jurisdiction: {} | card {}",
        report.jurisdiction,
        if report.card.available {
            match report.card.age_days {
                Some(age) if report.card.stale => format!("{age} days old (stale)"),
                Some(age) => format!("{age} days old"),
                None => "cached".to_string(),
            }
        } else {
            "missing".to_string()
        }
    );

    if report.envelope.valid {
        println!("\nBuildability envelope");
        for entry in &report.envelope.reduction_breakdown {
            println!(
                "- {}: {:.2} acres ({})",
                entry.category.label(),
                entry.acres,
                entry.note
            );
        }
        if let (Some(net), Some(ceiling), Some(sqft)) = (
            report.envelope.net_buildable_acres,
            report.envelope.sqft_per_acre_ceiling,
            report.envelope.max_buildable_sqft,
        ) {
            println!(
                "Net buildable: {net:.2} of {:.2} acres | ceiling {ceiling:.0} sqft/acre | max {sqft:.0} sqft",
                report.envelope.gross_acres
            );
        }
    } else {
        println!(
            "\nEnvelope refused: {}",
            report
                .envelope
                .invalid_reason
                .as_deref()
                .unwrap_or("unresolved constraints")
        );
        if !report.envelope.missing_constraints.is_empty() {
            println!(
                "Missing constraints: {}",
                report.envelope.missing_constraints.join(", ")
            );
        }
    }

    if !report.assumptions.is_empty() {
        println!("\nRecorded assumptions");
        for assumption in &report.assumptions {
            println!("- {assumption}");
        }
    }

    if let Some(feasibility) = &report.feasibility {
        println!("\nFeasibility ({})", if feasibility.pass_fail { "pass" } else { "fail" });
        println!(
            "- Gross revenue ${:.0}/month at ${:.2}/sqft",
            feasibility.gross_monthly_revenue, feasibility.rent_used_per_sqft_month
        );
        println!(
            "- NOI ${:.0}/year | ${:.0}/acre/month (stressed ${:.0})",
            feasibility.noi_annual,
            feasibility.noi_per_acre_month,
            feasibility.stressed_noi_per_acre_month
        );
        println!(
            "- TDC ${:.0} | loan ${:.0} | DSCR {:.2} | yield on cost {:.1}%",
            feasibility.total_development_cost,
            feasibility.loan_amount,
            feasibility.dscr,
            feasibility.yield_on_cost * 100.0
        );
        for flaw in &feasibility.fatal_flaws {
            println!("- FATAL {}", flaw.summary());
        }
        for warning in &feasibility.warnings {
            println!("- warning {}: {}", warning.code.as_str(), warning.message);
        }
    }

    println!("\nVerdict contributions");
    for contribution in &report.verdict.weighted_contributions {
        println!(
            "- {}: {:.0} x {:.2} = {:.1}",
            contribution.dimension.label(),
            contribution.raw_score,
            contribution.weight,
            contribution.weighted
        );
    }
    for flaw in &report.verdict.fatal_flaws {
        println!("- FATAL {flaw}");
    }

    if !report.unknowns.is_empty() {
        println!("\nOpen research items");
        for unknown in &report.unknowns {
            println!(
                "- {} via {}{}",
                unknown.field,
                unknown.research_method.label(),
                if unknown.blocks_calculation {
                    " (blocks envelope)"
                } else {
                    ""
                }
            );
        }
    }

    if !report.failures.is_empty() {
        println!("\nFailure ledger");
        for event in &report.failures {
            println!(
                "- [{}] {}/{} {}: {} ({})",
                event.severity.label(),
                event.source_hub,
                event.sub_hub,
                event.failure_type,
                event.message,
                event.resolution_status.label()
            );
        }
    }

    if let Some(record_id) = &report.record_id {
        println!("\nSaved decision record {}", record_id.0);
    }
}
