//! Model-agnostic decoding loops.
//!
//! A `StepModel` turns the decoder sequences generated so far into next-token
//! logits; the loops here apply the repetition penalty, keep EOS out until
//! `min_length` tokens exist, and choose tokens.

use anyhow::{anyhow, Result};

/// One decoder step for a batch of equal-length sequences.
pub trait StepModel {
    fn next_logits(&mut self, sequences: &[Vec<u32>]) -> Result<Vec<Vec<f32>>>;
}

/// Tokens generated by a decoding run, without the start token or EOS.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub tokens: Vec<u32>,
    pub finished: bool,
}

/// Scales logits of already generated tokens: positive ones shrink, negative
/// ones grow. A penalty of 1.0 is a no-op.
pub fn apply_repetition_penalty(logits: &mut [f32], generated: &[u32], penalty: f32) {
    if (penalty - 1.0).abs() < f32::EPSILON {
        return;
    }
    let mut seen: Vec<u32> = generated.to_vec();
    seen.sort_unstable();
    seen.dedup();
    for token in seen {
        if let Some(l) = logits.get_mut(token as usize) {
            *l = if *l >= 0.0 { *l / penalty } else { *l * penalty };
        }
    }
}

pub fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![f32::NEG_INFINITY; logits.len()];
    }
    let sum: f32 = logits.iter().map(|l| (l - max).exp()).sum();
    let log_sum = sum.ln() + max;
    logits.iter().map(|l| l - log_sum).collect()
}

fn block_eos(logits: &mut [f32], eos: u32, generated: usize, min_length: usize) {
    if generated < min_length {
        if let Some(l) = logits.get_mut(eos as usize) {
            *l = f32::NEG_INFINITY;
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    pub start_token: u32,
    pub eos_token: u32,
    pub max_length: usize,
    pub min_length: usize,
    pub repetition_penalty: f32,
}

/// Greedy-style loop where `choose` picks each token from the adjusted logits.
/// Sampling plugs a seeded logits processor in here.
pub fn decode_with<M, F>(model: &mut M, limits: DecodeLimits, mut choose: F) -> Result<Decoded>
where
    M: StepModel,
    F: FnMut(&[f32]) -> Result<u32>,
{
    let mut sequence = vec![limits.start_token];
    for _ in 0..limits.max_length {
        let mut logits = model
            .next_logits(std::slice::from_ref(&sequence))?
            .pop()
            .ok_or_else(|| anyhow!("decoder returned no logits"))?;
        let generated = &sequence[1..];
        apply_repetition_penalty(&mut logits, generated, limits.repetition_penalty);
        block_eos(&mut logits, limits.eos_token, generated.len(), limits.min_length);
        let token = choose(&logits)?;
        if token == limits.eos_token {
            return Ok(Decoded { tokens: sequence.split_off(1), finished: true });
        }
        sequence.push(token);
    }
    Ok(Decoded { tokens: sequence.split_off(1), finished: false })
}

struct Hypothesis {
    tokens: Vec<u32>,
    log_prob: f32,
}

impl Hypothesis {
    /// Log-probability normalised by generated length.
    fn normalized(&self) -> f32 {
        self.log_prob / (self.tokens.len().saturating_sub(1).max(1) as f32)
    }
}

/// Beam search with length-normalised scores. With `early_stopping` the search
/// ends as soon as `num_beams` hypotheses have emitted EOS; without it, once no
/// open beam can beat the best finished one.
pub fn beam_search<M: StepModel>(
    model: &mut M,
    limits: DecodeLimits,
    num_beams: usize,
    early_stopping: bool,
) -> Result<Decoded> {
    let num_beams = num_beams.max(1);
    let mut beams = vec![Hypothesis { tokens: vec![limits.start_token], log_prob: 0.0 }];
    let mut finished: Vec<(Hypothesis, f32)> = Vec::new();

    for _ in 0..limits.max_length {
        let sequences: Vec<Vec<u32>> = beams.iter().map(|b| b.tokens.clone()).collect();
        let batch_logits = model.next_logits(&sequences)?;
        if batch_logits.len() != beams.len() {
            return Err(anyhow!("decoder returned {} rows for {} beams", batch_logits.len(), beams.len()));
        }

        let mut candidates: Vec<(usize, u32, f32)> = Vec::new();
        for (b, (beam, mut logits)) in beams.iter().zip(batch_logits).enumerate() {
            let generated = &beam.tokens[1..];
            apply_repetition_penalty(&mut logits, generated, limits.repetition_penalty);
            block_eos(&mut logits, limits.eos_token, generated.len(), limits.min_length);
            let log_probs = log_softmax(&logits);
            let mut ranked: Vec<(u32, f32)> = log_probs
                .iter()
                .enumerate()
                .filter(|(_, lp)| lp.is_finite())
                .map(|(t, &lp)| (t as u32, beam.log_prob + lp))
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            candidates.extend(ranked.into_iter().take(2 * num_beams).map(|(t, s)| (b, t, s)));
        }
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut next = Vec::with_capacity(num_beams);
        for (rank, (b, token, score)) in candidates.into_iter().enumerate() {
            let mut tokens = beams[b].tokens.clone();
            tokens.push(token);
            let hyp = Hypothesis { tokens, log_prob: score };
            if token == limits.eos_token {
                // an EOS that would not have made the beam is not a hypothesis
                if rank < num_beams {
                    let norm = hyp.normalized();
                    finished.push((hyp, norm));
                }
            } else {
                next.push(hyp);
            }
            if next.len() >= num_beams {
                break;
            }
        }

        if finished.len() >= num_beams {
            let best_done = finished.iter().map(|f| f.1).fold(f32::NEG_INFINITY, f32::max);
            let best_open = next.iter().map(Hypothesis::normalized).fold(f32::NEG_INFINITY, f32::max);
            if early_stopping || best_done >= best_open {
                break;
            }
        }
        if next.is_empty() {
            break;
        }
        beams = next;
    }

    let best_finished = finished.iter().fold(None::<&(Hypothesis, f32)>, |best, cand| match best {
        Some(b) if b.1 >= cand.1 => Some(b),
        _ => Some(cand),
    });
    if let Some((hyp, _)) = best_finished {
        // drop start token and EOS
        let end = hyp.tokens.len().saturating_sub(1);
        return Ok(Decoded { tokens: hyp.tokens[1..end].to_vec(), finished: true });
    }
    let best_open = beams
        .into_iter()
        .fold(None::<Hypothesis>, |best, cand| match best {
            Some(b) if b.normalized() >= cand.normalized() => Some(b),
            _ => Some(cand),
        })
        .ok_or_else(|| anyhow!("beam search produced no hypotheses"))?;
    Ok(Decoded { tokens: best_open.tokens[1..].to_vec(), finished: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed next-token preference regardless of history.
    struct Scripted {
        vocab: usize,
        script: Vec<u32>,
        calls: usize,
    }

    impl StepModel for Scripted {
        fn next_logits(&mut self, sequences: &[Vec<u32>]) -> Result<Vec<Vec<f32>>> {
            self.calls += 1;
            Ok(sequences
                .iter()
                .map(|seq| {
                    let pos = seq.len() - 1;
                    let want = self.script.get(pos).copied().unwrap_or(1);
                    let mut logits = vec![0.0; self.vocab];
                    logits[1] = -100.0;
                    logits[want as usize] = 5.0;
                    logits
                })
                .collect())
        }
    }

    fn limits(min_length: usize) -> DecodeLimits {
        DecodeLimits { start_token: 0, eos_token: 1, max_length: 10, min_length, repetition_penalty: 1.0 }
    }

    #[test]
    fn greedy_stops_at_eos() {
        let mut model = Scripted { vocab: 6, script: vec![3, 4, 1], calls: 0 };
        let out = decode_with(&mut model, limits(0), |l| {
            Ok(l.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)).map(|(i, _)| i as u32).unwrap())
        })
        .unwrap();
        assert_eq!(out, Decoded { tokens: vec![3, 4], finished: true });
    }

    #[test]
    fn eos_is_blocked_until_min_length() {
        let mut model = Scripted { vocab: 6, script: vec![1, 1, 1, 1], calls: 0 };
        let out = decode_with(&mut model, limits(2), |l| {
            Ok(l.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)).map(|(i, _)| i as u32).unwrap())
        })
        .unwrap();
        assert!(out.finished);
        assert_eq!(out.tokens.len(), 2);
    }

    #[test]
    fn beam_search_follows_the_dominant_path() {
        let mut model = Scripted { vocab: 6, script: vec![2, 5, 3, 1], calls: 0 };
        let out = beam_search(&mut model, limits(0), 3, true).unwrap();
        assert_eq!(out, Decoded { tokens: vec![2, 5, 3], finished: true });
        assert!(model.calls <= 10);
    }

    #[test]
    fn repetition_penalty_shrinks_seen_tokens() {
        let mut logits = vec![2.0, -2.0, 2.0];
        apply_repetition_penalty(&mut logits, &[0, 1, 0], 2.0);
        assert_eq!(logits, vec![1.0, -4.0, 2.0]);
    }

    #[test]
    fn log_softmax_normalises() {
        let lp = log_softmax(&[1.0, 1.0]);
        assert!((lp[0] - 0.5f32.ln()).abs() < 1e-6);
        assert!((lp.iter().map(|l| l.exp()).sum::<f32>() - 1.0).abs() < 1e-6);
    }
}
