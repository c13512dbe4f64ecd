use num_complex::Complex;
use rustfft::FftPlanner;

/// Forward radix-2 FFT of a real-valued signal (length must be a power of two).
pub fn fft_forward(signal: &[f64]) -> Vec<Complex<f64>> {
    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(&mut buffer);
    buffer
}

/// Inverse FFT, normalized by `1/n` so `ifft(fft(x)) == x`.
pub fn fft_inverse(spectrum: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut buffer = spectrum.to_vec();
    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(buffer.len());
    ifft.process(&mut buffer);
    let scale = 1.0 / buffer.len() as f64;
    for v in &mut buffer {
        *v *= scale;
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_recovers_signal() {
        let signal = vec![0.0, 2.0, 2.0, 2.0, 1.0, 1.5, 2.0, 4.0, 2.0, 2.0, 2.0, 1.0, 0.0, 0.0, 5.0, 0.0];
        let spectrum = fft_forward(&signal);
        let recovered = fft_inverse(&spectrum);
        for (&original, value) in signal.iter().zip(recovered.iter()) {
            assert!((value.re - original).abs() < 1e-6, "re mismatch: {} vs {}", value.re, original);
            assert!(value.im.abs() < 1e-6, "im not negligible: {}", value.im);
        }
    }

    #[test]
    fn round_trip_holds_for_power_of_two_lengths() {
        for n_pow in 1..=6 {
            let n = 1usize << n_pow;
            let signal: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin()).collect();
            let recovered: Vec<f64> = fft_inverse(&fft_forward(&signal)).iter().map(|c| c.re).collect();
            for (&original, value) in signal.iter().zip(recovered.iter()) {
                assert!((value - original).abs() < 1e-6);
            }
        }
    }
}
