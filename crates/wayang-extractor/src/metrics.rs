//! Quality Metrics module
//!
//! Scores an aggregated entity table against a gold reference that only
//! covers part of the true entity population. Precision over everything
//! the model found is not computable under that assumption, so precision
//! is restricted to gold-covered items ("strict" precision).

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use wayang_core::{EntityLabel, EntityRecord};

use crate::aggregate::CanonicalEntity;
use crate::gold::GoldStandard;
use crate::repair::normalize;

/// `count / denominator * 100`, or 0 for an empty denominator
pub fn percentage(count: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        count as f64 / denominator as f64 * 100.0
    }
}

/// Harmonic mean of two percentages, 0 when both are 0
pub fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

// ============================================================================
// Report
// ============================================================================

/// A gold entity the model found with the wrong label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelMismatch {
    pub name: String,
    pub gold_label: EntityLabel,
    pub predicted_label: EntityLabel,
}

/// Result of one evaluation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    /// Number of gold entities
    pub gold_size: usize,
    /// Found with the correct label
    pub true_positives: usize,
    /// Found with the wrong label
    pub label_errors: usize,
    /// Not found at all
    pub missed: usize,
    /// `true_positives / gold_size`, in percent
    pub recall: f64,
    /// `true_positives / (true_positives + label_errors)`, in percent
    pub strict_precision: f64,
    pub f1: f64,
    /// Same value as `strict_precision`; kept for report compatibility
    pub label_accuracy: f64,
    /// Label errors in reference order
    pub mismatches: Vec<LabelMismatch>,
    /// Gold names that were not found, in reference order
    pub missed_names: Vec<String>,
}

impl EvaluationReport {
    /// Gold entities located regardless of label
    pub fn matches_found(&self) -> usize {
        self.true_positives + self.label_errors
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(40);
        let thin = "-".repeat(40);

        writeln!(f, "{rule}")?;
        writeln!(f, "       METRICS REPORT")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Gold Standard Size  : {}", self.gold_size)?;
        writeln!(f, "Matches Found       : {}", self.matches_found())?;
        writeln!(f, "Perfect Matches (TP): {}", self.true_positives)?;
        writeln!(f, "Label Errors        : {}", self.label_errors)?;
        writeln!(f, "Completely Missed   : {}", self.missed)?;
        writeln!(f, "{thin}")?;
        writeln!(f, "RECALL              : {:.2}%", self.recall)?;
        writeln!(f, "   (How many of the gold items did we find?)")?;
        writeln!(f, "{thin}")?;
        writeln!(f, "PRECISION (Strict)  : {:.2}%", self.strict_precision)?;
        writeln!(f, "   (When we found a gold item, was the label correct?)")?;
        writeln!(f, "{thin}")?;
        writeln!(f, "F1 SCORE            : {:.2}%", self.f1)?;
        writeln!(f, "{thin}")?;
        writeln!(f, "LABEL ACCURACY      : {:.2}%", self.label_accuracy)?;
        writeln!(f, "{rule}")?;

        if !self.mismatches.is_empty() {
            writeln!(f)?;
            writeln!(f, "[!] LABEL ERRORS DETECTED:")?;
            for m in &self.mismatches {
                writeln!(
                    f,
                    "    - {}: Gold {} vs Model {}",
                    m.name, m.gold_label, m.predicted_label
                )?;
            }
        }

        Ok(())
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluator for extraction quality against a gold reference
pub struct Evaluator {
    gold: GoldStandard,
}

impl Evaluator {
    pub fn new(gold: GoldStandard) -> Self {
        Self { gold }
    }

    /// Evaluate persisted entity records
    pub fn evaluate(&self, predicted: &[EntityRecord]) -> EvaluationReport {
        let lookup: HashMap<String, EntityLabel> = predicted
            .iter()
            .map(|r| (normalize(&r.name), r.label))
            .collect();
        self.score(&lookup)
    }

    /// Evaluate an in-memory aggregated table
    pub fn evaluate_table(&self, table: &[CanonicalEntity]) -> EvaluationReport {
        let lookup: HashMap<String, EntityLabel> =
            table.iter().map(|e| (e.key.clone(), e.label)).collect();
        self.score(&lookup)
    }

    fn score(&self, lookup: &HashMap<String, EntityLabel>) -> EvaluationReport {
        let mut report = EvaluationReport {
            gold_size: self.gold.len(),
            ..Default::default()
        };

        for gold in self.gold.iter() {
            match lookup.get(&gold.key()) {
                Some(&label) if label == gold.label => report.true_positives += 1,
                Some(&label) => {
                    report.label_errors += 1;
                    report.mismatches.push(LabelMismatch {
                        name: gold.name.clone(),
                        gold_label: gold.label,
                        predicted_label: label,
                    });
                }
                None => {
                    report.missed += 1;
                    report.missed_names.push(gold.name.clone());
                }
            }
        }

        report.recall = percentage(report.true_positives, report.gold_size);
        report.strict_precision = percentage(report.true_positives, report.matches_found());
        report.f1 = f1_score(report.strict_precision, report.recall);
        report.label_accuracy = report.strict_precision;
        report
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(GoldStandard::builtin())
    }
}

// ============================================================================
// Tests
// ============================================================================
