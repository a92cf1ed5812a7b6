//! Evaluation metrics for the sign classifier

use std::fmt;

/// Fraction of predictions equal to the truth
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Mean and population standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision / recall / F1 with macro and weighted averages
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Build a report for every class that appears in either truth or prediction.
    pub fn new(y_true: &[usize], y_pred: &[usize], labels: &[String]) -> Self {
        let k = labels.len();
        let mut tp = vec![0usize; k];
        let mut predicted = vec![0usize; k];
        let mut support = vec![0usize; k];

        for (&t, &p) in y_true.iter().zip(y_pred) {
            support[t] += 1;
            predicted[p] += 1;
            if t == p {
                tp[t] += 1;
            }
        }

        let classes: Vec<ClassMetrics> = (0..k)
            .filter(|&c| support[c] > 0 || predicted[c] > 0)
            .map(|c| {
                let precision = ratio(tp[c], predicted[c]);
                let recall = ratio(tp[c], support[c]);
                ClassMetrics {
                    label: labels[c].clone(),
                    precision,
                    recall,
                    f1: f1(precision, recall),
                    support: support[c],
                }
            })
            .collect();

        let total_support: usize = classes.iter().map(|c| c.support).sum();
        let n = classes.len().max(1) as f64;
        let macro_avg = ClassMetrics {
            label: "macro avg".to_string(),
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
            support: total_support,
        };

        let weighted = |f: fn(&ClassMetrics) -> f64| {
            if total_support == 0 {
                0.0
            } else {
                classes.iter().map(|c| f(c) * c.support as f64).sum::<f64>()
                    / total_support as f64
            }
        };
        let weighted_avg = ClassMetrics {
            label: "weighted avg".to_string(),
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
            support: total_support,
        };

        Self {
            classes,
            accuracy: accuracy(y_true, y_pred),
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            write_row(f, c, width)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        write_row(f, &self.macro_avg, width)?;
        write_row(f, &self.weighted_avg, width)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, c: &ClassMetrics, width: usize) -> fmt::Result {
    writeln!(
        f,
        "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        c.label, c.precision, c.recall, c.f1, c.support
    )
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 2, 1], &[0, 1, 1, 1]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_mean_std() {
        let (mean, std) = mean_std(&[0.8, 0.9, 1.0]);
        assert!((mean - 0.9).abs() < 1e-9);
        assert!((std - (0.02f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_report_per_class() {
        let labels: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let y_true = [0, 0, 1, 1, 2];
        let y_pred = [0, 1, 1, 1, 2];
        let report = ClassificationReport::new(&y_true, &y_pred, &labels);

        assert_eq!(report.classes.len(), 3);
        let a = &report.classes[0];
        assert_eq!(a.precision, 1.0);
        assert_eq!(a.recall, 0.5);
        assert_eq!(a.support, 2);
        let b = &report.classes[1];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(b.recall, 1.0);
        assert_eq!(report.accuracy, 0.8);
        assert_eq!(report.weighted_avg.support, 5);

        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("macro avg"));
    }
}
