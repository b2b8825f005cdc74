//! Trailing-window indicators over plain value slices.
//!
//! Every function returns a vector aligned with its input; `None` marks the
//! warmup region where the window is not yet full. Each value at index `i`
//! depends only on inputs `0..=i`.

use crate::domain::ohlcv::OhlcvBar;

/// Simple moving average. Warmup: first (n-1) values are `None`.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        out.push((i + 1 >= period).then(|| sum / period as f64));
    }
    out
}

/// Exponential moving average.
///
/// k = 2/(n+1), seeded with the SMA of the first n values, then
/// EMA[i] = V[i]*k + EMA[i-1]*(1-k). Warmup: first (n-1) values.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    let mut current = 0.0;
    for (i, &v) in values.iter().enumerate() {
        if i + 1 < period {
            sum += v;
            out.push(None);
        } else if i + 1 == period {
            sum += v;
            current = sum / period as f64;
            out.push(Some(current));
        } else {
            current = v * k + current * (1.0 - k);
            out.push(Some(current));
        }
    }
    out
}

/// EMA over a series that itself has a warmup region. The seed window
/// starts at the first defined input.
fn ema_of_defined(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let Some(first) = values.iter().position(Option::is_some) else {
        return vec![None; values.len()];
    };
    let tail: Vec<f64> = values[first..].iter().map(|v| v.unwrap_or(0.0)).collect();
    let mut out = vec![None; first];
    out.extend(ema(&tail, period));
    out
}

/// Rolling sample standard deviation (n-1 denominator).
pub fn rolling_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period < 2 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / (period - 1) as f64;
            Some(var.sqrt())
        })
        .collect()
}

/// Relative change over `period` steps: V[i]/V[i-n] - 1.
pub fn pct_change(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if period == 0 || i < period {
                return None;
            }
            let base = values[i - period];
            (base != 0.0).then(|| values[i] / base - 1.0)
        })
        .collect()
}

/// Rate of change in percent: 100 * (C[i] - C[i-n]) / C[i-n].
pub fn roc(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    pct_change(closes, period)
        .into_iter()
        .map(|v| v.map(|x| x * 100.0))
        .collect()
}

/// Relative Strength Index with Wilder's smoothing.
///
/// First average is the simple mean of the first n gains/losses, then
/// avg = (prev_avg * (n-1) + current) / n. RSI = 100 when avg_loss is 0.
/// Warmup: first n values.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| c.max(0.0);
    let loss = |c: f64| (-c).max(0.0);

    let mut avg_gain = changes[..period].iter().copied().map(gain).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().copied().map(loss).sum::<f64>() / period as f64;

    let value = |g: f64, l: f64| {
        if l == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + g / l)
        }
    };

    out[period] = Some(value(avg_gain, avg_loss));
    for i in (period + 1)..closes.len() {
        let c = changes[i - 1];
        avg_gain = (avg_gain * (period - 1) as f64 + gain(c)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(c)) / period as f64;
        out[i] = Some(value(avg_gain, avg_loss));
    }
    out
}

/// Average True Range with Wilder's smoothing, seeded by the mean of the
/// first n true ranges (the first bar uses high - low).
pub fn atr(bars: &[OhlcvBar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }

    let tr: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let mut current = tr[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);
    for i in period..bars.len() {
        current = (current * (period - 1) as f64 + tr[i]) / period as f64;
        out[i] = Some(current);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// MACD line = EMA(fast) - EMA(slow); signal = EMA(signal) of the line.
/// Warmup: slow - 1 + signal - 1 values.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<Option<MacdPoint>> {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = ema_of_defined(&line, signal);

    line.iter()
        .zip(&signal_line)
        .map(|(l, s)| {
            let (line, signal) = ((*l)?, (*s)?);
            Some(MacdPoint {
                line,
                signal,
                histogram: line - signal,
            })
        })
        .collect()
}

/// Bollinger %B: (C - lower) / (upper - lower) with bands at
/// SMA(n) +/- mult * std(n). A flat window gives 0.5.
pub fn bollinger_percent_b(closes: &[f64], period: usize, mult: f64) -> Vec<Option<f64>> {
    let middle = sma(closes, period);
    let std = rolling_std(closes, period);
    closes
        .iter()
        .zip(middle.iter().zip(&std))
        .map(|(&c, (m, s))| {
            let (m, s) = ((*m)?, (*s)?);
            let width = 2.0 * mult * s;
            if width <= 0.0 {
                return Some(0.5);
            }
            Some((c - (m - mult * s)) / width)
        })
        .collect()
}
