//! Human-readable evaluation report

use crate::evaluator::{EvaluationResult, HealthStatus};
use std::fmt;

/// Plain-text rendering of an evaluation: uppercase section labels over `key: value` lines
pub struct EvaluationReport<'a>(pub &'a EvaluationResult);

/// Render the full report as text
pub fn generate_evaluation_report(result: &EvaluationResult) -> String {
    EvaluationReport(result).to_string()
}

fn status_label(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Degraded => "degraded",
        HealthStatus::Unhealthy => "unhealthy",
    }
}

impl fmt::Display for EvaluationReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;

        writeln!(f, "EEG CLEANING EVALUATION")?;
        writeln!(f, "Generated at: {} ms", r.generated_at_ms)?;
        writeln!(f, "Overall score: {:.1}/100", r.overall_score)?;
        writeln!(f, "Quality rating: {}", r.quality_rating)?;
        writeln!(f)?;

        let d = &r.data_info;
        writeln!(f, "RECORDING")?;
        writeln!(f, "  Channels: {}", r.channels)?;
        writeln!(f, "  Samples per channel: {}", r.samples_per_channel)?;
        writeln!(f, "  Sampling rate: {} Hz", r.sampling_rate)?;
        writeln!(f, "  Duration: {:.2} s", d.duration_seconds)?;
        writeln!(
            f,
            "  Raw: mean {:.3}, std {:.3}, min {:.3}, max {:.3}",
            d.raw.mean, d.raw.std_dev, d.raw.min, d.raw.max
        )?;
        writeln!(
            f,
            "  Cleaned: mean {:.3}, std {:.3}, min {:.3}, max {:.3}",
            d.current.mean, d.current.std_dev, d.current.min, d.current.max
        )?;
        writeln!(f)?;

        let p = &r.performance;
        writeln!(f, "PERFORMANCE")?;
        writeln!(f, "  Processing time: {:.2} ms", p.total_time_ms)?;
        match p.samples_per_second {
            Some(sps) => writeln!(f, "  Throughput: {:.0} samples/s", sps)?,
            None => writeln!(f, "  Throughput: not measurable")?,
        }
        writeln!(f, "  Efficiency: {:.1}% ({})", p.efficiency, p.rating.as_str())?;
        writeln!(f)?;

        writeln!(f, "STAGES")?;
        if r.steps.is_empty() {
            writeln!(f, "  none recorded")?;
        }
        for (step, elapsed_ms) in &r.steps {
            writeln!(f, "  {}: {:.3} ms", step, elapsed_ms)?;
        }
        writeln!(f)?;

        let q = &r.quality;
        writeln!(f, "SIGNAL QUALITY")?;
        writeln!(f, "  Score: {:.1}/100", q.score)?;
        writeln!(f, "  SNR improvement: {:.2} dB", q.snr_improvement_db)?;
        writeln!(f, "  Noise reduction: {:.2}%", q.noise_reduction)?;
        writeln!(f, "  Signal preservation: {:.2}%", q.preservation)?;
        writeln!(f, "  Correlation: {:.3} (p = {:.3e})", q.correlation, q.correlation_p_value)?;
        writeln!(f, "  RMSE: {:.3} µV", q.rmse)?;
        writeln!(f, "  Dynamic range preserved: {:.2}%", q.dynamic_range_preservation)?;
        writeln!(f)?;

        let fe = &r.filter;
        writeln!(f, "FILTER EFFECTIVENESS")?;
        writeln!(f, "  Score: {:.1}/100", fe.score)?;
        writeln!(f, "  Out-of-band reduction: {:.2}%", fe.out_of_band_reduction)?;
        writeln!(f, "  In-band preservation: {:.2}%", fe.in_band_preservation)?;
        writeln!(f, "  Line band reduction: {:.2}%", fe.notch_reduction)?;
        writeln!(f)?;

        let fd = &r.frequency;
        writeln!(f, "FREQUENCY DOMAIN")?;
        writeln!(f, "  Score: {:.1}/100", fd.score)?;
        writeln!(f, "  Dominant frequency: {:.2} Hz raw, {:.2} Hz cleaned", fd.dominant_raw, fd.dominant_current)?;
        writeln!(f, "  Frequency shift: {:.3} Hz", fd.shift)?;
        writeln!(f, "  Power retained: {:.2}%", fd.power_retained)?;
        writeln!(f, "  Spectral correlation: {:.3}", fd.spectral_correlation)?;
        writeln!(f)?;

        let a = &r.artefacts;
        writeln!(f, "ARTEFACTS")?;
        writeln!(f, "  Score: {:.1}/100", a.score)?;
        writeln!(f, "  Events: {} raw, {} cleaned", a.raw_count, a.current_count)?;
        writeln!(f, "  Count reduction: {:.2}%", a.count_reduction)?;
        writeln!(f, "  Peak amplitude reduction: {:.2}%", a.peak_reduction)?;
        writeln!(f, "  Artefact power reduction: {:.2}%", a.power_reduction)?;
        writeln!(f)?;

        let s = &r.statistics;
        writeln!(f, "STATISTICAL VALIDATION")?;
        writeln!(f, "  Score: {:.1}/100", s.integrity_score)?;
        writeln!(f, "  Variance ratio: {:.3}", s.variance_ratio)?;
        writeln!(f, "  Mean preservation: {:.2}%", s.mean_preservation * 100.0)?;
        writeln!(f, "  Skewness preservation: {:.2}%", s.skewness_preservation * 100.0)?;
        writeln!(f, "  Kurtosis preservation: {:.2}%", s.kurtosis_preservation * 100.0)?;
        writeln!(f, "  Normality p-value: {:.3e} raw, {:.3e} cleaned", s.normality_raw, s.normality_current)?;
        writeln!(
            f,
            "  Removed component: {} (Jarque-Bera {:.2})",
            if s.residual_gaussian { "gaussian" } else { "non-gaussian" },
            s.residual_jarque_bera
        )?;
        writeln!(f)?;

        let h = &r.health;
        writeln!(f, "PIPELINE HEALTH")?;
        writeln!(f, "  Score: {:.1}/100", h.score)?;
        writeln!(f, "  Status: {}", status_label(h.status))?;
        if h.issues.is_empty() && h.warnings.is_empty() {
            writeln!(f, "  No issues")?;
        }
        for issue in &h.issues {
            writeln!(f, "  Issue: {}", issue)?;
        }
        for warning in &h.warnings {
            writeln!(f, "  Warning: {}", warning)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::PipelineEvaluator;
    use crate::pipeline::StepTimings;
    use crate::processor::{PipelineStep, StepParameters, StepTiming};
    use eeg_core::load;
    use std::time::Duration;

    fn evaluation(timings: &StepTimings) -> EvaluationResult {
        let data: Vec<f64> = (0..1024).map(|i| (i as f64 * 0.3).sin() * 10.0).collect();
        let raw = load(data, 256.0).unwrap();
        PipelineEvaluator::default().evaluate(&raw, &raw, timings).unwrap()
    }

    #[test]
    fn test_report_sections() {
        let result = evaluation(&StepTimings::default());
        let report = generate_evaluation_report(&result);
        for heading in [
            "EEG CLEANING EVALUATION",
            "\nRECORDING\n",
            "\nPERFORMANCE\n",
            "\nSTAGES\n",
            "\nSIGNAL QUALITY\n",
            "\nFILTER EFFECTIVENESS\n",
            "\nFREQUENCY DOMAIN\n",
            "\nARTEFACTS\n",
            "\nSTATISTICAL VALIDATION\n",
            "\nPIPELINE HEALTH\n",
        ] {
            assert!(report.contains(heading), "missing {}", heading.trim());
        }
        assert!(report.contains(&format!("Overall score: {:.1}/100", result.overall_score)));
        assert!(report.contains(&format!("Quality rating: {}", result.quality_rating)));
        assert!(report.contains("Throughput: not measurable"));
        assert!(report.contains("Duration: 4.00 s"));
        assert!(report.contains("  none recorded"));
    }

    #[test]
    fn test_report_lists_stage_timings() {
        let timings = StepTimings {
            steps: vec![
                StepTiming {
                    step: PipelineStep::Filter,
                    elapsed: Duration::from_millis(3),
                    parameters: StepParameters::new(),
                },
                StepTiming {
                    step: PipelineStep::Separation,
                    elapsed: Duration::from_micros(250),
                    parameters: StepParameters::new(),
                },
            ],
            warnings: Vec::new(),
        };
        let report = generate_evaluation_report(&evaluation(&timings));
        assert!(report.contains("  filter: 3.000 ms"));
        assert!(report.contains("  separation: 0.250 ms"));
        assert!(!report.contains("none recorded"));
    }

    #[test]
    fn test_report_is_plain_text() {
        let report = generate_evaluation_report(&evaluation(&StepTimings::default()));
        for line in report.lines() {
            let trimmed = line.trim_start();
            assert!(!trimmed.starts_with('#'), "heading marker in {:?}", line);
            assert!(!trimmed.starts_with("- "), "list marker in {:?}", line);
            assert!(!line.contains("**"), "emphasis in {:?}", line);
            assert!(!line.contains('`'), "code span in {:?}", line);
        }
    }
}
