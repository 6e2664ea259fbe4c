use crate::cli::InspectArgs;
use crate::exit_codes;
use crate::output;
use nextmind_rs::mmap_utils::payload_len;
use nextmind_rs::{
    discover, read_metadata_with, DiscoverOptions, RecordingMetadata, RecordingRef, Result, StreamKind,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct InspectEntry {
    recording: String,
    stream: StreamKind,
    raw_path: PathBuf,
    inf_path: Option<PathBuf>,
    size_bytes: Option<u64>,
    n_samples: Option<u64>,
    duration_secs: Option<f64>,
    metadata: Option<RecordingMetadata>,
    error: Option<String>,
    error_kind: Option<&'static str>,
}

fn inspect_one(recording: &RecordingRef, args: &InspectArgs) -> InspectEntry {
    let mut entry = InspectEntry {
        recording: recording.name(),
        stream: recording.stream_kind(),
        raw_path: recording.raw_path.clone(),
        inf_path: recording.inf_path.clone(),
        size_bytes: None,
        n_samples: None,
        duration_secs: None,
        metadata: None,
        error: None,
        error_kind: None,
    };

    let resolved: Result<(u64, RecordingMetadata)> = payload_len(&recording.raw_path).and_then(|len| {
        let metadata = read_metadata_with(recording, &args.read.overrides(), &args.read.reader_config())?;
        Ok((len, metadata))
    });

    match resolved {
        Ok((size, metadata)) => {
            let n_samples = size.checked_div(metadata.fields().frame_bytes() as u64).unwrap_or(0);
            entry.size_bytes = Some(size);
            entry.n_samples = Some(n_samples);
            entry.duration_secs = Some(n_samples as f64 / metadata.sample_rate());
            entry.metadata = Some(metadata);
        }
        Err(e) => {
            entry.error_kind = Some(e.kind());
            entry.error = Some(e.to_string());
        }
    }
    entry
}

pub fn execute(args: InspectArgs) -> i32 {
    let options = DiscoverOptions {
        recursive: args.recursive,
        include_auxiliary: args.all_streams,
        prefer_preprocessed: !args.all_streams,
        ..Default::default()
    };
    let found = match discover(&args.path, options) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    let entries: Vec<InspectEntry> = found.iter().map(|r| inspect_one(&r, &args)).collect();

    if args.json {
        match output::to_json(&entries, args.compact) {
            Ok(json) => {
                if let Err(e) = output::write_output(&json, None) {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else {
        for entry in &entries {
            print_entry(entry);
        }
    }

    let failed = entries.iter().filter(|e| e.error.is_some()).count();
    if failed == 0 {
        exit_codes::SUCCESS
    } else if failed < entries.len() {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::INPUT_ERROR
    }
}

fn print_entry(entry: &InspectEntry) {
    if entry.stream.is_eeg() {
        println!("{}", entry.raw_path.display());
    } else {
        println!("{} ({} stream)", entry.raw_path.display(), entry.stream.name());
    }
    match (&entry.metadata, &entry.error) {
        (Some(metadata), _) => {
            let fields = metadata.fields();
            println!(
                "  {} x {} ch at {} Hz, {} samples ({:.1}s)",
                fields.dtype,
                fields.channel_count,
                fields.sample_rate,
                entry.n_samples.unwrap_or(0),
                entry.duration_secs.unwrap_or(0.0)
            );
            println!("  Channels: {}", fields.labels().join(", "));
            match metadata.inference() {
                None => println!("  Source: .inf"),
                Some(inference) => {
                    println!(
                        "  Source: inferred ({:?} confidence{}{})",
                        inference.confidence,
                        if inference.sample_rate_assumed { ", sample rate assumed" } else { "" },
                        if inference.ambiguous { ", ambiguous" } else { "" }
                    );
                    for alt in inference.alternatives.iter().take(3) {
                        println!("    also possible: {}", alt);
                    }
                }
            }
        }
        (None, Some(error)) => println!("  Error: {}", error),
        (None, None) => {}
    }
}
