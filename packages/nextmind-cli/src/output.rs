use nextmind_rs::SignalBuffer;
use std::io::Write;
use std::path::Path;

/// Write JSON string to stdout or a file ("-" also means stdout).
pub fn write_output(json: &str, output_path: Option<&str>) -> Result<(), String> {
    match output_path {
        Some(path) if path != "-" => std::fs::write(Path::new(path), json)
            .map_err(|e| format!("Failed to write output file '{}': {}", path, e)),
        _ => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .and_then(|_| handle.write_all(b"\n"))
                .map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

/// Serialize a value to JSON (pretty or compact).
pub fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String, String> {
    if compact {
        serde_json::to_string(value).map_err(|e| format!("JSON serialization failed: {}", e))
    } else {
        serde_json::to_string_pretty(value)
            .map_err(|e| format!("JSON serialization failed: {}", e))
    }
}

/// Write a buffer as CSV: a `time_s` column followed by one column per channel.
pub fn write_csv(buffer: &SignalBuffer, path: &Path) -> Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .from_path(path)
        .map_err(|e| format!("Failed to create '{}': {}", path.display(), e))?;

    let mut header = vec!["time_s".to_string()];
    header.extend(buffer.channel_names());
    writer
        .write_record(&header)
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let sample_rate = buffer.sample_rate();
    let mut row = Vec::with_capacity(buffer.n_channels() + 1);
    for (i, frame) in buffer.frames().enumerate() {
        row.clear();
        row.push(format!("{:.6}", i as f64 / sample_rate));
        row.extend(frame.iter().map(|v| v.to_string()));
        writer
            .write_record(&row)
            .map_err(|e| format!("Failed to write CSV row {}: {}", i, e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush '{}': {}", path.display(), e))
}
