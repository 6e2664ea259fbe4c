use super::{build_config, output_dir_for, shield_recording, CommandError};
use crate::cli::BatchArgs;
use crate::exit_codes;
use crate::output;
use nextmind_rs::{discover, DiscoverOptions, RecordingRef};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

const SHIELDED_SUFFIX: &str = "_shielded";

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum BatchItem {
    Succeeded {
        recording: String,
        input: PathBuf,
        output: PathBuf,
        flagged_samples: usize,
    },
    Failed {
        recording: String,
        input: PathBuf,
        error: String,
    },
    Skipped {
        recording: String,
        input: PathBuf,
    },
}

#[derive(Serialize)]
struct BatchSummary {
    total: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    elapsed_secs: f64,
    items: Vec<BatchItem>,
}

/// Recordings to process, leaving out earlier shielded outputs
fn resolve_recordings(args: &BatchArgs) -> Result<Vec<RecordingRef>, CommandError> {
    let options = DiscoverOptions {
        recursive: args.recursive,
        prefer_preprocessed: !args.keep_raw_eeg,
        ..Default::default()
    };
    let found = discover(&args.dir, options)?;
    let recordings: Vec<RecordingRef> = found
        .iter()
        .filter(|r| {
            let keep = !r.name().ends_with(SHIELDED_SUFFIX);
            if !keep {
                log::info!("Skipping shielded output {}", r.raw_path.display());
            }
            keep
        })
        .collect();

    if recordings.is_empty() {
        return Err(CommandError::input(format!(
            "No unshielded recordings found under {}",
            args.dir.display()
        )));
    }
    Ok(recordings)
}

pub fn execute(args: BatchArgs) -> i32 {
    let recordings = match resolve_recordings(&args) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e.message);
            return e.code;
        }
    };

    // Dry-run mode: print recording list and exit
    if args.dry_run {
        for r in &recordings {
            println!("{}", r.raw_path.display());
        }
        if !args.quiet {
            eprintln!("Found {} recording(s)", recordings.len());
        }
        return exit_codes::SUCCESS;
    }

    // Shared config is checked once, before any recording is touched
    let config = match build_config(&args.stages) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e.message);
            return e.code;
        }
    };

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.unwrap_or(0))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Error: Failed to start worker pool: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    let total = recordings.len();
    let start_time = Instant::now();
    let stop = AtomicBool::new(false);

    let items: Vec<BatchItem> = pool.install(|| {
        recordings
            .par_iter()
            .enumerate()
            .map(|(i, recording)| {
                if stop.load(Ordering::SeqCst) {
                    return BatchItem::Skipped {
                        recording: recording.name(),
                        input: recording.raw_path.clone(),
                    };
                }
                if !args.quiet {
                    eprintln!("[{}/{}] {}...", i + 1, total, recording.raw_path.display());
                }

                let out_dir = output_dir_for(recording, &args.output, Some(&args.dir));
                match shield_recording(recording, &args.read, &config, &args.output, &out_dir) {
                    Ok(outcome) => BatchItem::Succeeded {
                        recording: outcome.recording,
                        input: outcome.input,
                        output: outcome.output,
                        flagged_samples: outcome
                            .report
                            .artifacts
                            .map(|a| a.total_flagged())
                            .unwrap_or(0),
                    },
                    Err(e) => {
                        eprintln!("  Error ({}): {}", recording.name(), e.message);
                        if !args.continue_on_error {
                            stop.store(true, Ordering::SeqCst);
                        }
                        BatchItem::Failed {
                            recording: recording.name(),
                            input: recording.raw_path.clone(),
                            error: e.message,
                        }
                    }
                }
            })
            .collect()
    });

    let count = |pred: fn(&BatchItem) -> bool| items.iter().filter(|i| pred(i)).count();
    let succeeded = count(|i| matches!(i, BatchItem::Succeeded { .. }));
    let failed = count(|i| matches!(i, BatchItem::Failed { .. }));
    let skipped = count(|i| matches!(i, BatchItem::Skipped { .. }));
    let elapsed = start_time.elapsed();

    if !args.quiet {
        eprintln!(
            "Batch complete: {}/{} succeeded, {}/{} failed, {} skipped, {:.1}s",
            succeeded,
            total,
            failed,
            total,
            skipped,
            elapsed.as_secs_f64()
        );
    }

    if args.json {
        let summary = BatchSummary {
            total,
            succeeded,
            failed,
            skipped,
            elapsed_secs: elapsed.as_secs_f64(),
            items,
        };
        let written = output::to_json(&summary, false).and_then(|json| output::write_output(&json, None));
        if let Err(e) = written {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    }

    if failed == 0 {
        exit_codes::SUCCESS
    } else if succeeded > 0 {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::EXECUTION_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{OutputArgs, OutputFormat, ReadArgs, StageArgs};
    use nextmind_rs::reader::DEFAULT_MAX_PAYLOAD_BYTES;
    use nextmind_rs::SampleDtype;
    use std::fs;

    fn make_batch_args(dir: PathBuf) -> BatchArgs {
        BatchArgs {
            dir,
            recursive: false,
            keep_raw_eeg: false,
            jobs: Some(1),
            read: ReadArgs {
                sample_rate: None,
                channels: None,
                dtype_hint: None,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            },
            stages: StageArgs::default(),
            output: OutputArgs {
                out_dir: None,
                format: OutputFormat::Raw,
                dtype: SampleDtype::Float32,
            },
            continue_on_error: false,
            dry_run: false,
            json: false,
            quiet: true,
        }
    }

    #[test]
    fn test_resolve_recordings_skips_shielded_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.raw"), [0u8; 4]).unwrap();
        fs::write(tmp.path().join("a_shielded.raw"), [0u8; 4]).unwrap();

        let result = resolve_recordings(&make_batch_args(tmp.path().to_path_buf())).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name(), "a");
    }

    #[test]
    fn test_resolve_recordings_nonexistent() {
        let result = resolve_recordings(&make_batch_args(PathBuf::from("/nonexistent_dir_12345")));
        assert_eq!(result.unwrap_err().code, exit_codes::INPUT_ERROR);
    }

    #[test]
    fn test_resolve_recordings_only_shielded() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a_shielded.raw"), [0u8; 4]).unwrap();
        assert!(resolve_recordings(&make_batch_args(tmp.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_resolve_recordings_session_streams() {
        let tmp = tempfile::tempdir().unwrap();
        let session = tmp.path().join("recording").join("0");
        fs::create_dir_all(&session).unwrap();
        for stream in ["eeg", "eeg_preprocessed", "event", "stim", "target_info"] {
            fs::write(session.join(format!("{}.raw", stream)), [0u8; 4]).unwrap();
        }

        let mut args = make_batch_args(tmp.path().to_path_buf());
        let names: Vec<String> = resolve_recordings(&args).unwrap().iter().map(|r| r.name()).collect();
        assert_eq!(names, ["eeg_preprocessed"]);

        args.keep_raw_eeg = true;
        let names: Vec<String> = resolve_recordings(&args).unwrap().iter().map(|r| r.name()).collect();
        assert_eq!(names, ["eeg", "eeg_preprocessed"]);
    }

    #[test]
    fn test_resolve_recordings_recursive() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("recording").join("1");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("eeg.raw"), [0u8; 4]).unwrap();

        let mut args = make_batch_args(tmp.path().to_path_buf());
        assert!(resolve_recordings(&args).is_err());
        args.recursive = true;
        assert_eq!(resolve_recordings(&args).unwrap().len(), 1);
    }
}
