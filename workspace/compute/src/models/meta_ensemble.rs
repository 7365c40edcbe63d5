use crate::stats;

/// Robust hour-by-hour combination of the direct members.
///
/// Values outside 1.5 IQR of the quartiles are dropped and the median of the
/// rest is taken; if nothing survives the plain mean is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaEnsemble;

impl MetaEnsemble {
    pub fn combine(&self, members: &[Vec<f64>], hours: usize) -> Vec<f64> {
        (0..hours)
            .map(|i| {
                let values: Vec<f64> = members.iter().filter_map(|m| m.get(i).copied()).collect();
                Self::robust_center(&values).max(0.0)
            })
            .collect()
    }

    fn robust_center(values: &[f64]) -> f64 {
        let (Some(q1), Some(q3)) = (stats::percentile(values, 25.0), stats::percentile(values, 75.0)) else {
            return 0.0;
        };
        let iqr = q3 - q1;
        let (lower, upper) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

        let kept: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| (lower..=upper).contains(v))
            .collect();

        stats::median(&kept)
            .or_else(|| stats::mean(values))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outlier_is_rejected() {
        let members = vec![
            vec![30.0],
            vec![32.0],
            vec![31.0],
            vec![29.0],
            vec![33.0],
            vec![400.0],
        ];
        let combined = MetaEnsemble.combine(&members, 1);
        assert_eq!(combined, vec![31.0]);
    }

    #[test]
    fn test_short_members_are_skipped() {
        let members = vec![vec![10.0, 20.0], vec![30.0]];
        let combined = MetaEnsemble.combine(&members, 3);
        assert_eq!(combined, vec![20.0, 20.0, 0.0]);
    }
}
