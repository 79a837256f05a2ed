use cogex_core::PresentationEvent;
use rand::Rng;
use rand::seq::SliceRandom;
use std::time::Duration;

/// Flattens a repeated frame list into absolute offsets.
///
/// Event `k` shows frame `k % frames.len()` at `k * interval`.
pub fn frame_sequence<A: Clone>(
    frames: &[A],
    interval: Duration,
    iterations: usize,
) -> Vec<PresentationEvent<A>> {
    if frames.is_empty() {
        return Vec::new();
    }
    let Some(total) = frames.len().checked_mul(iterations) else {
        log::warn!(
            "{iterations} iterations of {} frames is too many events; sequence dropped",
            frames.len()
        );
        return Vec::new();
    };
    let step = interval.as_nanos() as u64;
    (0..total)
        .map(|k| {
            let offset = Duration::from_nanos(step.saturating_mul(k as u64));
            PresentationEvent::new(offset, frames[k % frames.len()].clone())
        })
        .collect()
}

/// Slot label for position `i`: A, B, C, ...
pub fn slot_label(i: usize) -> String {
    match u8::try_from(i) {
        Ok(n) if n < 26 => char::from(b'A' + n).to_string(),
        _ => format!("S{i}"),
    }
}

/// Places `items` into labelled slots in random order.
pub fn shuffled_layout<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<(String, T)> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.shuffle(rng);
    order
        .into_iter()
        .enumerate()
        .map(|(slot, idx)| (slot_label(slot), items[idx].clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn frames_cycle_over_iterations() {
        let seq = frame_sequence(&["a", "b", "c"], Duration::from_millis(500), 2);
        let offsets: Vec<u64> = seq.iter().map(|e| e.offset.as_millis() as u64).collect();
        let actions: Vec<&str> = seq.iter().map(|e| e.action).collect();
        assert_eq!(offsets, vec![0, 500, 1000, 1500, 2000, 2500]);
        assert_eq!(actions, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn empty_frames_or_zero_iterations_yield_nothing() {
        assert!(frame_sequence::<&str>(&[], Duration::from_secs(1), 3).is_empty());
        assert!(frame_sequence(&["a"], Duration::from_secs(1), 0).is_empty());
    }

    #[test]
    fn overflowing_iteration_count_yields_nothing() {
        assert!(frame_sequence(&["a", "b"], Duration::from_secs(1), usize::MAX).is_empty());
    }

    #[test]
    fn slot_labels() {
        assert_eq!(slot_label(0), "A");
        assert_eq!(slot_label(3), "D");
        assert_eq!(slot_label(30), "S30");
    }

    #[test]
    fn layout_is_a_permutation() {
        let faces = ["target.png", "foil1.png", "foil2.png", "foil3.png"];
        let mut rng = StdRng::seed_from_u64(7);
        let layout = shuffled_layout(&faces, &mut rng);

        let labels: Vec<&str> = layout.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C", "D"]);

        let mut placed: Vec<&str> = layout.iter().map(|(_, f)| *f).collect();
        placed.sort_unstable();
        let mut expected = faces.to_vec();
        expected.sort_unstable();
        assert_eq!(placed, expected);
    }
}
