//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the solver and CV code stays free of presentation concerns
//! - output changes are localized

use crate::domain::{QueryDataset, RankConfig};
use crate::fit::{CvOutcome, GridPoint, PointStatus};
use crate::measure::GroupScore;
use crate::query::QueryIndex;

/// Dataset shape + solver configuration.
pub fn format_run_summary(data: &QueryDataset, queries: &QueryIndex<String>, config: &RankConfig) -> String {
    let mut out = String::new();

    out.push_str("=== rankrls - query-grouped RankRLS ===\n");
    out.push_str(&format!(
        "Data: n={} | features={} | labels={} | queries={}\n",
        data.n_samples(),
        data.n_features(),
        data.y.ncols(),
        queries.query_count()
    ));

    let sizes = queries.groups().group_sizes();
    let min = sizes.iter().copied().min().unwrap_or(0);
    let max = sizes.iter().copied().max().unwrap_or(0);
    out.push_str(&format!("Query sizes: [{min}, {max}]\n"));
    out.push_str(&format!("Kernel: {}\n", fmt_kernel(config)));
    out.push('\n');

    out
}

/// Per-grid-point CV table; the selected row is starred.
pub fn format_cv_table(outcome: &CvOutcome, measure: &str) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<2}{:>14} {:>14} {:>10}", "", "regparam", measure, "scored").trim_end());
    out.push('\n');
    out.push_str(format!("{:<2}{:-<14} {:-<14} {:-<10}", "", "", "", "").trim_end());
    out.push('\n');

    for (i, point) in outcome.points.iter().enumerate() {
        let chosen = if i == outcome.best_index { "*" } else { " " };
        out.push_str(
            format!(
                "{chosen:<2}{:>14.6e} {:>14} {:>10}",
                point.regparam,
                fmt_status(&point.status),
                fmt_scored(point)
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out.push_str(&format!(
        "\nChosen regparam: {:e} ({measure}={})\n",
        outcome.regparam(),
        outcome
            .best_performance()
            .map(|v| format!("{v:.6}"))
            .unwrap_or_else(|| "n/a".to_string())
    ));
    out
}

/// Per-query hold-out scores at a single regularization value.
pub fn format_holdout_report(point: &GridPoint, queries: &QueryIndex<String>, measure: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("Leave-query-out at regparam={:e}:\n", point.regparam));
    out.push_str(format!("{:<24} {:>6} {:>12}", "qid", "n", measure).trim_end());
    out.push('\n');
    out.push_str(format!("{:-<24} {:-<6} {:-<12}", "", "", "").trim_end());
    out.push('\n');

    for (q, score) in point.group_scores.iter().enumerate() {
        let qid = queries.raw_of(q).map(String::as_str).unwrap_or("?");
        let n = queries.groups().group(q).map(<[usize]>::len).unwrap_or(0);
        let value = match score {
            GroupScore::Scored(v) => format!("{v:.6}"),
            GroupScore::Undefined => "undefined".to_string(),
        };
        out.push_str(format!("{:<24} {:>6} {:>12}", truncate(qid, 24), n, value).trim_end());
        out.push('\n');
    }

    out.push_str(&format!("Mean: {}\n", fmt_status(&point.status)));
    out
}

fn fmt_kernel(config: &RankConfig) -> String {
    use crate::kernel::KernelKind;
    match config.kernel {
        KernelKind::Linear { bias } => format!("linear (bias={bias})"),
        KernelKind::Gaussian { gamma } => format!("gaussian (gamma={gamma})"),
        KernelKind::Polynomial { gamma, coef0, degree } => {
            format!("polynomial (gamma={gamma}, coef0={coef0}, degree={degree})")
        }
        KernelKind::Precomputed => "precomputed".to_string(),
    }
}

fn fmt_status(status: &PointStatus) -> String {
    match status {
        PointStatus::Scored(v) => format!("{v:.6}"),
        PointStatus::Undefined => "undefined".to_string(),
        PointStatus::Failed(_) => "failed".to_string(),
    }
}

fn fmt_scored(point: &GridPoint) -> String {
    let scored = point.group_scores.iter().filter(|s| s.value().is_some()).count();
    format!("{scored}/{}", point.group_scores.len())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::Direction;

    fn point(regparam: f64, status: PointStatus, scores: Vec<GroupScore>) -> GridPoint {
        GridPoint {
            regparam,
            status,
            group_scores: scores,
            predictions: Vec::new(),
        }
    }

    #[test]
    fn cv_table_stars_selected_row() {
        let outcome = CvOutcome {
            points: vec![
                point(0.5, PointStatus::Scored(0.6), vec![GroupScore::Scored(0.6), GroupScore::Undefined]),
                point(1.0, PointStatus::Scored(0.9), vec![GroupScore::Scored(0.9), GroupScore::Undefined]),
            ],
            best_index: 1,
            direction: Direction::HigherIsBetter,
        };
        let table = format_cv_table(&outcome, "cindex");
        let starred: Vec<&str> = table.lines().filter(|l| l.starts_with('*')).collect();
        assert_eq!(starred.len(), 1);
        assert!(starred[0].contains("0.900000"));
        assert!(starred[0].ends_with("1/2"));
        assert!(table.contains("Chosen regparam: 1e0"));
    }

    #[test]
    fn holdout_report_lists_raw_query_ids() {
        let qids: Vec<String> = ["x", "x", "y"].iter().map(|s| s.to_string()).collect();
        let index = QueryIndex::new(&qids);
        let p = point(
            2.0,
            PointStatus::Scored(1.0),
            vec![GroupScore::Scored(1.0), GroupScore::Undefined],
        );
        let report = format_holdout_report(&p, &index, "cindex");
        assert!(report.lines().any(|l| l.starts_with('x') && l.ends_with("1.000000")));
        assert!(report.lines().any(|l| l.starts_with('y') && l.ends_with("undefined")));
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("ab", 4), "ab");
    }
}
