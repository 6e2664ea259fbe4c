use super::{build_config, output_dir_for, shield_recording, CommandError, ShieldOutcome};
use crate::cli::ShieldArgs;
use crate::exit_codes;
use crate::output;
use nextmind_rs::{discover, DiscoverOptions, RecordingRef};

pub fn execute(args: ShieldArgs) -> i32 {
    match run(&args) {
        Ok(outcome) => {
            if !args.quiet {
                print_summary(&outcome);
            }
            if let Some(ref target) = args.report {
                let written = output::to_json(&outcome, false)
                    .and_then(|json| output::write_output(&json, Some(target.as_str())));
                if let Err(e) = written {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
            exit_codes::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e.message);
            e.code
        }
    }
}

fn run(args: &ShieldArgs) -> Result<ShieldOutcome, CommandError> {
    let recording = single_recording(args)?;
    let config = build_config(&args.stages)?;
    let out_dir = output_dir_for(&recording, &args.output, None);

    if !args.quiet {
        eprintln!("Shielding {}...", recording.raw_path.display());
    }
    shield_recording(&recording, &args.read, &config, &args.output, &out_dir)
}

fn single_recording(args: &ShieldArgs) -> Result<RecordingRef, CommandError> {
    let found = discover(&args.path, DiscoverOptions::default())?;
    let mut recordings = found.iter();
    match (recordings.next(), recordings.next()) {
        (Some(recording), None) => Ok(recording),
        _ => Err(CommandError::input(format!(
            "{} contains {} recordings; use `nextmind batch` for directories",
            args.path.display(),
            found.len()
        ))),
    }
}

fn print_summary(outcome: &ShieldOutcome) {
    let fields = outcome.metadata.fields();
    eprintln!(
        "  {} x {} ch, {} samples at {} Hz{}",
        fields.dtype,
        fields.channel_count,
        outcome.n_samples,
        fields.sample_rate,
        if outcome.metadata.is_low_confidence() {
            " (inferred, low confidence)"
        } else if outcome.metadata.is_inferred() {
            " (inferred)"
        } else {
            ""
        }
    );
    eprintln!("  Stages: {}", outcome.report.stages.join(" -> "));
    if let Some(ref artifacts) = outcome.report.artifacts {
        for channel in artifacts.channels.iter().filter(|c| !c.is_clean()) {
            eprintln!(
                "  {}: {} flagged, {} run(s){}",
                channel.name,
                channel.flagged_samples,
                channel.runs.len(),
                if channel.unrecoverable { ", unrecoverable" } else { "" }
            );
        }
    }
    eprintln!("  Wrote {}", outcome.output.display());
}
