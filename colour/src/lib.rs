#![no_std]
//! Colour parameters of a measured spectrum
//!
//! The spectrum is integrated against analytic fits of the CIE 1931 standard observer
//! (Wyman, Sloan, Shirley, "Simple Analytic Approximations to the CIE XYZ Color Matching
//! Functions", JCGT 2013). The correlated colour temperature follows Robertson's method with the
//! isotemperature table and corrections published by Bruce Lindbloom.

use num_traits::Float;

/// A source of calibrated spectral samples.
pub trait SpectralSource {
    /// Whether the source currently holds data.
    fn is_connected(&self) -> bool;

    fn total_pixels(&self) -> usize;

    /// Finished measurement of a pixel.
    fn measurement(&self, pixel: usize) -> f64;

    /// Wavelength of a pixel in nm.
    fn wavelength(&self, pixel: usize) -> f64;
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Chromaticity {
    /// Correlated colour temperature in K, 0 if outside the table.
    pub cct: f64,
    pub x: f64,
    pub y: f64,
}

fn lobe(wavelength: f64, centre: f64, below: f64, above: f64) -> f64 {
    let t = (wavelength - centre)
        * if wavelength < centre { below } else { above };
    (-0.5 * t * t).exp()
}

/// CIE 1931 x̄ colour matching function.
pub fn x_bar(wavelength: f64) -> f64 {
    0.362 * lobe(wavelength, 442.0, 0.0624, 0.0374)
        + 1.056 * lobe(wavelength, 599.8, 0.0264, 0.0323)
        - 0.065 * lobe(wavelength, 501.1, 0.0490, 0.0382)
}

/// CIE 1931 ȳ colour matching function.
pub fn y_bar(wavelength: f64) -> f64 {
    0.821 * lobe(wavelength, 568.8, 0.0213, 0.0247)
        + 0.286 * lobe(wavelength, 530.9, 0.0613, 0.0322)
}

/// CIE 1931 z̄ colour matching function.
pub fn z_bar(wavelength: f64) -> f64 {
    1.217 * lobe(wavelength, 437.0, 0.0845, 0.0278)
        + 0.681 * lobe(wavelength, 459.0, 0.0385, 0.0725)
}

/// Integrate the source into CIE XYZ tristimulus values.
///
/// Each pixel is weighted by half the wavelength span to its neighbours.
pub fn tristimulus<S: SpectralSource + ?Sized>(source: &S) -> [f64; 3] {
    let n = source.total_pixels();
    let mut xyz = [0.0; 3];
    if n < 2 {
        return xyz;
    }

    for i in 0..n {
        let lo = if i == 0 { i } else { i - 1 };
        let hi = if i == n - 1 { i } else { i + 1 };
        let span = (source.wavelength(hi) - source.wavelength(lo)) / 2.0;
        let wavelength = source.wavelength(i);
        let value = source.measurement(i) * span;
        xyz[0] += value * x_bar(wavelength);
        xyz[1] += value * y_bar(wavelength);
        xyz[2] += value * z_bar(wavelength);
    }
    xyz
}

/// Reciprocal temperature (1/K) of the isotemperature lines.
const RT: [f64; 31] = [
    f64::MIN_POSITIVE,
    10.0e-6,
    20.0e-6,
    30.0e-6,
    40.0e-6,
    50.0e-6,
    60.0e-6,
    70.0e-6,
    80.0e-6,
    90.0e-6,
    100.0e-6,
    125.0e-6,
    150.0e-6,
    175.0e-6,
    200.0e-6,
    225.0e-6,
    250.0e-6,
    275.0e-6,
    300.0e-6,
    325.0e-6,
    350.0e-6,
    375.0e-6,
    400.0e-6,
    425.0e-6,
    450.0e-6,
    475.0e-6,
    500.0e-6,
    525.0e-6,
    550.0e-6,
    575.0e-6,
    600.0e-6,
];

/// (u, v, slope) of the isotemperature lines in the CIE 1960 UCS.
// 0.24792 replaces the 0.24702 misprint in Wyszecki & Stiles.
const UVT: [(f64, f64, f64); 31] = [
    (0.18006, 0.26352, -0.24341),
    (0.18066, 0.26589, -0.25479),
    (0.18133, 0.26846, -0.26876),
    (0.18208, 0.27119, -0.28539),
    (0.18293, 0.27407, -0.30470),
    (0.18388, 0.27709, -0.32675),
    (0.18494, 0.28021, -0.35156),
    (0.18611, 0.28342, -0.37915),
    (0.18740, 0.28668, -0.40955),
    (0.18880, 0.28997, -0.44278),
    (0.19032, 0.29326, -0.47888),
    (0.19462, 0.30141, -0.58204),
    (0.19962, 0.30921, -0.70471),
    (0.20525, 0.31647, -0.84901),
    (0.21142, 0.32312, -1.0182),
    (0.21807, 0.32909, -1.2168),
    (0.22511, 0.33439, -1.4512),
    (0.23247, 0.33904, -1.7298),
    (0.24010, 0.34308, -2.0637),
    (0.24792, 0.34655, -2.4681),
    (0.25591, 0.34951, -2.9641),
    (0.26400, 0.35200, -3.5814),
    (0.27218, 0.35407, -4.3633),
    (0.28039, 0.35577, -5.3762),
    (0.28863, 0.35714, -6.7262),
    (0.29685, 0.35823, -8.5955),
    (0.30505, 0.35907, -11.324),
    (0.31320, 0.35968, -15.628),
    (0.32129, 0.36011, -23.325),
    (0.32931, 0.36038, -40.770),
    (0.33724, 0.36051, -116.45),
];

/// Correlated colour temperature in K of a tristimulus value.
///
/// Returns 0 for a black input and for chromaticities outside the table, i.e. below
/// 1666.7 K or too far towards blue.
pub fn correlated_colour_temperature(xyz: [f64; 3]) -> f64 {
    let [x, y, z] = xyz;
    if x < 1.0e-20 && y < 1.0e-20 && z < 1.0e-20 {
        return 0.0;
    }

    let denominator = x + 15.0 * y + 3.0 * z;
    let us = 4.0 * x / denominator;
    let vs = 6.0 * y / denominator;

    let mut dm = 0.0;
    for (i, &(u, v, t)) in UVT.iter().enumerate() {
        let di = (vs - v) - t * (us - u);
        if i > 0 && ((di < 0.0 && dm >= 0.0) || (di >= 0.0 && dm < 0.0)) {
            // Lines i - 1 and i bound (us, vs)
            let tm = UVT[i - 1].2;
            let di = di / (1.0 + t * t).sqrt();
            let dm = dm / (1.0 + tm * tm).sqrt();
            let p = dm / (dm - di);
            return 1.0 / ((RT[i] - RT[i - 1]) * p + RT[i - 1]);
        }
        dm = di;
    }
    0.0
}

/// CIE xy chromaticity and correlated colour temperature of the source.
///
/// Returns `None` if the source holds no data.
pub fn chromaticity<S: SpectralSource + ?Sized>(
    source: &S,
) -> Option<Chromaticity> {
    if !source.is_connected() {
        return None;
    }

    let xyz = tristimulus(source);
    let sum: f64 = xyz.iter().sum();
    let (x, y) = if sum != 0.0 {
        (xyz[0] / sum, xyz[1] / sum)
    } else {
        (0.0, 0.0)
    };

    Some(Chromaticity {
        cct: correlated_colour_temperature(xyz),
        x,
        y,
    })
}
