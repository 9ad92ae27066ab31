use cuestream::buffer::DelayBuffer;

/// Small deterministic generator so the test doesn't need a rand dependency.
fn lcg(state: &mut u32) -> u32 {
    *state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    *state >> 8
}

/// What the buffer should return, from the full push history.
fn reference(history: &[f32], capacity: usize, count: usize, delay: usize) -> Vec<f32> {
    let delay = delay.min(capacity);
    let count = count.min(capacity - delay);
    let end = history.len() as isize - delay as isize;
    (end - count as isize..end)
        .map(|i| if i < 0 { 0.0 } else { history[i as usize] })
        .collect()
}

#[test]
fn zero_delay_reads_back_the_last_push() {
    let mut buffer = DelayBuffer::new(100);
    assert_eq!(buffer.capacity(), 128);

    let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
    buffer.push(&samples);
    let mut out = vec![0.0; 100];
    assert_eq!(buffer.read_delayed(&mut out, 0), 100);
    assert_eq!(out, samples);
}

#[test]
fn wrapped_reads_match_a_reference_simulation() {
    let mut buffer = DelayBuffer::new(64);
    let capacity = buffer.capacity();
    let mut history = Vec::new();
    let mut state = 7;
    let mut saw_split = false;

    for round in 0..500 {
        let len = (lcg(&mut state) % 40) as usize;
        let block: Vec<f32> = (0..len).map(|i| (round * 100 + i) as f32).collect();
        buffer.push(&block);
        history.extend_from_slice(&block);

        let count = (lcg(&mut state) % 70) as usize;
        let delay = (lcg(&mut state) % 70) as usize;
        let (first, second) = buffer.get_delayed(count, delay);
        saw_split |= !second.is_empty();

        let joined: Vec<f32> = first.iter().chain(second).copied().collect();
        assert_eq!(joined, reference(&history, capacity, count, delay), "round {round}");
    }
    assert!(saw_split);
}

#[test]
fn oversized_push_keeps_newest_samples() {
    let mut buffer = DelayBuffer::new(8);
    let samples: Vec<f32> = (0..20).map(|i| i as f32).collect();
    buffer.push(&samples);

    let (first, second) = buffer.get_delayed(8, 0);
    let joined: Vec<f32> = first.iter().chain(second).copied().collect();
    assert_eq!(joined, samples[12..].to_vec());
}

#[test]
fn clear_returns_to_silence() {
    let mut buffer = DelayBuffer::new(16);
    buffer.push(&[1.0; 10]);
    buffer.clear();
    let mut out = [5.0; 16];
    buffer.read_delayed(&mut out, 0);
    assert_eq!(out, [0.0; 16]);
}
