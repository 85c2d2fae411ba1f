//! Confidence aggregation for OCR output.
//!
//! Values are passed through on the engine's native scale; the recogniser is
//! trusted for range, so nothing is clamped or renormalised here.

/// Arithmetic mean of `confidences`, or `0.0` when there are none.
///
/// Used for a PDF page: a page that was OCR'd but yielded nothing still
/// contributes an entry to the per-page sequence.
pub fn aggregate(confidences: &[f64]) -> f64 {
    mean(confidences).unwrap_or(0.0)
}

/// Arithmetic mean of `confidences`, or `None` when there are none.
///
/// Used for a single image, where "nothing recognised" is reported as the
/// absence of a confidence rather than zero.
pub fn mean(confidences: &[f64]) -> Option<f64> {
    if confidences.is_empty() {
        return None;
    }
    Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(aggregate(&[]), 0.0);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn single_value_is_identity() {
        for c in [0.0, 37.5, 96.0, 100.0] {
            assert_eq!(aggregate(&[c]), c);
        }
    }

    #[test]
    fn average_of_two() {
        assert_eq!(aggregate(&[90.0, 80.0]), 85.0);
    }

    #[test]
    fn out_of_range_values_pass_through() {
        assert_eq!(aggregate(&[-1.0, -1.0]), -1.0);
        assert_eq!(aggregate(&[150.0, 50.0]), 100.0);
    }
}
