use std::fmt::Write;

use chrono::NaiveDate;

use super::blood_report::{BloodReportResult, LabStatus};

const REPORT_TITLE: &str = "IMED Search AI - Blood Analysis Report";

const DISCLAIMER: &str = "This interpretation is generated by AI for educational purposes. \
It is not a clinical diagnosis. Always share this analysis and your original report with your doctor.";

impl BloodReportResult {
    /// Printable Markdown report. Findings keep model order; high values are
    /// marked ↑ and low values ↓.
    pub fn to_markdown(&self, generated_on: NaiveDate) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(out, "# {REPORT_TITLE}\n");
        let _ = writeln!(out, "Generated on: {}\n", generated_on.format("%Y-%m-%d"));
        let _ = writeln!(out, "> **Medical Disclaimer:** {DISCLAIMER}\n");

        let _ = writeln!(out, "## Executive Brief\n");
        let _ = writeln!(out, "{}\n", self.summary.trim());

        let _ = writeln!(out, "## Clinical Significance\n");
        for paragraph in self
            .detailed_analysis
            .lines()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            let _ = writeln!(out, "{paragraph}\n");
        }

        let _ = writeln!(out, "## Parameter Breakdown\n");
        if self.findings.is_empty() {
            let _ = writeln!(out, "_No lab parameters were identified._\n");
        } else {
            let _ = writeln!(out, "| Parameter | Value | Unit | Reference Range | Status | Explanation |");
            let _ = writeln!(out, "|---|---|---|---|---|---|");
            for f in &self.findings {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} | {} |",
                    cell(&f.parameter),
                    cell(&f.value),
                    cell(&f.unit),
                    cell(&f.reference_range),
                    status_label(f.status),
                    cell(&f.explanation),
                );
            }
            out.push('\n');
        }

        let _ = writeln!(out, "## Doctor Consultation Prep\n");
        let _ = writeln!(out, "{}", self.recommendations.trim());
        out
    }
}

fn status_label(status: LabStatus) -> String {
    match status {
        LabStatus::High => "↑ high".to_string(),
        LabStatus::Low => "↓ low".to_string(),
        LabStatus::Normal => status.as_str().to_string(),
    }
}

/// Keep a value on one table row.
fn cell(text: &str) -> String {
    text.trim().replace('|', "\\|").replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::blood_report::LabFinding;

    fn finding(parameter: &str, status: LabStatus) -> LabFinding {
        LabFinding {
            parameter: parameter.into(),
            value: "10".into(),
            unit: "g/dL".into(),
            reference_range: "13-17".into(),
            status,
            explanation: "Carries oxygen\nin blood".into(),
        }
    }

    fn result(findings: Vec<LabFinding>) -> BloodReportResult {
        BloodReportResult {
            summary: "Mild anemia.".into(),
            findings,
            detailed_analysis: "Low hemoglobin.\n\nIron studies advised.".into(),
            recommendations: "See your physician.".into(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn report_has_all_sections_in_order() {
        let md = result(vec![finding("Hemoglobin", LabStatus::Low)]).to_markdown(date());
        let positions: Vec<usize> = [
            "# IMED Search AI",
            "Generated on: 2026-03-14",
            "## Executive Brief",
            "## Clinical Significance",
            "## Parameter Breakdown",
            "## Doctor Consultation Prep",
        ]
        .iter()
        .map(|h| md.find(h).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(md.contains("Low hemoglobin.\n\nIron studies advised.\n"));
    }

    #[test]
    fn findings_flagged_with_arrows() {
        let md = result(vec![
            finding("Hemoglobin", LabStatus::Low),
            finding("WBC", LabStatus::High),
            finding("Platelets", LabStatus::Normal),
        ])
        .to_markdown(date());
        assert!(md.contains("| Hemoglobin | 10 | g/dL | 13-17 | ↓ low | Carries oxygen in blood |"));
        assert!(md.contains("| ↑ high |"));
        assert!(md.contains("| normal |"));
        assert!(md.find("Hemoglobin").unwrap() < md.find("WBC").unwrap());
    }

    #[test]
    fn pipes_escaped_in_cells() {
        let mut f = finding("A|B", LabStatus::Normal);
        f.reference_range = "<5 | >1".into();
        let md = result(vec![f]).to_markdown(date());
        assert!(md.contains("| A\\|B |"));
    }

    #[test]
    fn empty_findings_noted() {
        let md = result(vec![]).to_markdown(date());
        assert!(md.contains("No lab parameters were identified"));
    }
}
