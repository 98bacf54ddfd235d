use std::time::Instant;

use tracing::{info, warn};

use crate::{
    error::Result,
    speech::{AttemptOutcome, BoundSynthesizer, SpeechClient},
    types::{Paragraph, ParagraphAttempts, SkippedParagraph, SynthesisReport},
};

/// Synthesize `paragraphs` one after another into the synthesizer's output.
///
/// Each paragraph gets up to `max_attempts` calls. A paragraph that never
/// completes is recorded in the report's `skipped` list and the loop moves
/// on. Only output write failures abort.
pub async fn synthesize_paragraphs<C: SpeechClient>(
    synthesizer: &mut BoundSynthesizer<C>,
    paragraphs: &[Paragraph],
    max_attempts: u32,
    run_started: Instant,
) -> Result<SynthesisReport> {
    let mut report = SynthesisReport {
        paragraphs: paragraphs.len(),
        ..SynthesisReport::default()
    };

    for paragraph in paragraphs {
        let mut attempts = 0;
        let mut completed = false;
        let mut last_failure = None;

        while attempts < max_attempts {
            attempts += 1;
            let outcome = synthesizer.speak_text(&paragraph.text).await?;
            log_attempt(paragraph, attempts, max_attempts, &outcome, run_started);

            if outcome.is_completed() {
                completed = true;
                break;
            }

            last_failure = outcome.failure_summary();
            if attempts < max_attempts {
                info!("Retrying again...");
            }
        }

        report.attempts.push(ParagraphAttempts {
            number: paragraph.number,
            attempts,
            completed,
        });

        if completed {
            report.synthesized += 1;
        } else {
            warn!(
                "Giving up on paragraph {} after {} attempts; its audio is missing from the output",
                paragraph.number, attempts
            );
            report.skipped.push(SkippedParagraph {
                number: paragraph.number,
                text: paragraph.text.clone(),
                attempts,
                last_failure: last_failure.unwrap_or_default(),
            });
        }
    }

    report.audio_bytes = synthesizer.output().bytes_written();
    Ok(report)
}

fn log_attempt(
    paragraph: &Paragraph,
    attempt: u32,
    max_attempts: u32,
    outcome: &AttemptOutcome,
    run_started: Instant,
) {
    match outcome {
        AttemptOutcome::Completed { result_id, bytes } => {
            info!(
                "Success on paragraph {}! ID: {} ({} bytes, attempt {}/{}) in {:.2} seconds",
                paragraph.number,
                result_id,
                bytes,
                attempt,
                max_attempts,
                run_started.elapsed().as_secs_f64()
            );
        }
        AttemptOutcome::Cancelled { result_id, details } => {
            warn!(
                "Failed on paragraph {} (attempt {}/{}) ID: {} after {:.2} seconds",
                paragraph.number,
                attempt,
                max_attempts,
                result_id,
                run_started.elapsed().as_secs_f64()
            );
            warn!("CANCELED: Reason={}", details.reason);
            if details.is_error() {
                if let Some(code) = details.error_code {
                    warn!("CANCELED: ErrorCode={}", code);
                }
                warn!(
                    "CANCELED: ErrorDetails=[{}]",
                    details.error_details.as_deref().unwrap_or_default()
                );
                warn!("CANCELED: Did you update the subscription info?");
            }
        }
        AttemptOutcome::TransportFailure { message } => {
            warn!(
                "Failed on paragraph {} (attempt {}/{}) after {:.2} seconds: {}",
                paragraph.number,
                attempt,
                max_attempts,
                run_started.elapsed().as_secs_f64(),
                message
            );
        }
    }
}
