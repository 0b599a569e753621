//! Median of round submissions.
//!
//! Values are sorted ascending. An odd count yields the middle value; an
//! even count yields the floor of the average of the two middle values.

use orakl_types::Answer;

/// Compute the median of `values`, or `None` for an empty slice.
///
/// # Examples
///
/// ```
/// use orakl_aggregator::median::median;
///
/// assert_eq!(median(&[10, 11]), Some(10));
/// assert_eq!(median(&[12, 10, 11]), Some(11));
/// ```
pub fn median(values: &[Answer]) -> Option<Answer> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some(floor_average(sorted[mid - 1], sorted[mid]))
    }
}

/// `floor((a + b) / 2)` without intermediate overflow.
fn floor_average(a: Answer, b: Answer) -> Answer {
    // Arithmetic shift rounds toward negative infinity.
    (a & b) + ((a ^ b) >> 1)
}
