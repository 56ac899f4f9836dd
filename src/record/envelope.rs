// Signal envelope via the Hilbert transform
// Used for the diagnostic plot next to the AIC curve

use realfft::num_complex::Complex;
use realfft::RealFftPlanner;

use super::RecordError;

/// Amplitude envelope `sqrt(x^2 + H(x)^2)` of a signal segment.
///
/// The Hilbert transform is taken in the frequency domain: positive
/// frequencies are rotated by -90 degrees, DC and Nyquist are dropped.
pub fn envelope(signal: &[f32]) -> Result<Vec<f32>, RecordError> {
    let n = signal.len();
    if n < 2 {
        return Ok(signal.iter().map(|s| s.abs()).collect());
    }

    let mut planner = RealFftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut input = signal.to_vec();
    let mut spectrum = forward.make_output_vec();
    forward
        .process(&mut input, &mut spectrum)
        .map_err(|e| RecordError::Fft(e.to_string()))?;

    let nyquist = if n % 2 == 0 { Some(n / 2) } else { None };
    for (k, bin) in spectrum.iter_mut().enumerate() {
        if k == 0 || Some(k) == nyquist {
            *bin = Complex::new(0.0, 0.0);
        } else {
            // -j * (a + jb) = b - ja
            *bin = Complex::new(bin.im, -bin.re);
        }
    }

    let mut hilbert = inverse.make_output_vec();
    inverse
        .process(&mut spectrum, &mut hilbert)
        .map_err(|e| RecordError::Fft(e.to_string()))?;

    let scale = 1.0 / n as f32;
    Ok(signal
        .iter()
        .zip(hilbert.iter())
        .map(|(&x, &h)| {
            let h = h * scale;
            (x * x + h * h).sqrt()
        })
        .collect())
}
