use std::time::Duration;

use crate::orchestrator::RunReport;

/// Human readable elapsed time, e.g. `4.2s` or `3m 5s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{}m {}s", d.as_secs() / 60, d.as_secs() % 60)
    }
}

/// Plain-text summary of a finished run.
pub fn format_run_summary(report: &RunReport) -> String {
    let synthesis = &report.synthesis;
    let mut output = String::new();
    output.push_str(&format!("Run:         {}\n", report.run_id));
    output.push_str(&format!(
        "Paragraphs:  {} synthesized, {} skipped, {} attempts\n",
        synthesis.synthesized,
        synthesis.skipped.len(),
        synthesis.total_attempts()
    ));
    output.push_str(&format!("Audio:       {}\n", report.layout.audio.display()));
    if let Some(video) = &report.video {
        output.push_str(&format!("Video:       {}\n", video.display()));
    }
    output.push_str(&format!("Log:         {}\n", report.layout.log.display()));
    for skipped in &synthesis.skipped {
        output.push_str(&format!(
            "Skipped #{}: {} ({})\n",
            skipped.number, skipped.text, skipped.last_failure
        ));
    }
    output
}
