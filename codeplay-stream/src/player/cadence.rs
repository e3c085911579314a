//! Expansion of merged inserts back into per-character keystrokes.

use codeplay_core::{ChangeRecord, Operation};

/// Offset into `duration` at which character `k` of `n` is typed.
///
/// Endpoints stay fixed. Characters in the middle land slightly ahead of a
/// linear split, about 5% of the duration at the midpoint.
pub fn typing_offset(duration: i64, k: usize, n: usize) -> i64 {
    if n < 2 {
        return 0;
    }
    let u = k as f64 / (n - 1) as f64;
    (duration as f64 * (u - 0.2 * u * (1.0 - u))).round() as i64
}

/// Split a timed multi-character insert into one insert per character.
///
/// Returns `None` for anything else, which plays as a single step.
pub fn expand(record: &ChangeRecord) -> Option<Vec<(i64, Operation)>> {
    let Operation::Insert {
        from,
        text,
        duration: Some(duration),
        ..
    } = &record.change
    else {
        return None;
    };

    let joined = text.join("\n");
    let n = joined.chars().count();
    if n < 2 {
        return None;
    }

    let mut at = *from;
    let mut buf = [0u8; 4];
    let steps = joined
        .chars()
        .enumerate()
        .map(|(k, c)| {
            let op = Operation::insert(at, c.encode_utf8(&mut buf));
            if let Operation::Insert { to, .. } = &op {
                at = *to;
            }
            (record.time + typing_offset(*duration, k, n), op)
        })
        .collect();
    Some(steps)
}
