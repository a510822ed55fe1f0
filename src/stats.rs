//! Stats
//!
//! Standard normal density, distribution and quantile functions, and the
//! quantile function of a normal distribution truncated below at zero.
use std::f64::consts::{FRAC_1_SQRT_2, PI, SQRT_2};

/// `1 / sqrt(pi)`
pub const FRAC_1_SQRT_PI: f64 = 0.564_189_583_547_756_3;
const SMALL_THRESHOLD: f64 = 0.468_75;
// Below this standardised location Φ underflows the quantile refinement.
const TRUNCNORM_TAIL_LIMIT: f64 = -35.0;

/// Complementary error function.
///
/// Rational Chebyshev approximation (W. J. Cody), relative error below 1e-14.
pub fn erfc(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let ax = x.abs();
    let r = if ax < SMALL_THRESHOLD {
        1.0 - erf_small(x)
    } else if ax < 4.0 {
        erfc_mid(ax)
    } else {
        erfc_large(ax)
    };
    if x < 0.0 && ax >= SMALL_THRESHOLD {
        2.0 - r
    } else {
        r
    }
}

/// Error function.
pub fn erf(x: f64) -> f64 {
    if x.abs() < SMALL_THRESHOLD {
        erf_small(x)
    } else {
        1.0 - erfc(x)
    }
}

fn erf_small(x: f64) -> f64 {
    const A: [f64; 5] = [
        3.161_123_743_870_565_6,
        113.864_154_151_050_16,
        377.485_237_685_302_0,
        3_209.377_589_138_469_5,
        0.185_777_706_184_603_15,
    ];
    const B: [f64; 4] = [
        23.601_290_952_344_122,
        244.024_637_934_444_17,
        1_282.616_526_077_372_3,
        2_844.236_833_439_170_6,
    ];
    let z = x * x;
    let mut num = A[4] * z;
    let mut den = z;
    for i in 0..3 {
        num = (num + A[i]) * z;
        den = (den + B[i]) * z;
    }
    x * (num + A[3]) / (den + B[3])
}

fn erfc_mid(ax: f64) -> f64 {
    const C: [f64; 9] = [
        0.564_188_496_988_670_1,
        8.883_149_794_388_377,
        66.119_190_637_141_63,
        298.635_138_197_400_1,
        881.952_221_241_769_1,
        1_712.047_612_634_070_7,
        2_051.078_377_826_071_6,
        1_230.339_354_797_997_2,
        2.153_115_354_744_038_3e-8,
    ];
    const D: [f64; 8] = [
        15.744_926_110_709_835,
        117.693_950_891_312_5,
        537.181_101_862_009_9,
        1_621.389_574_566_690_3,
        3_290.799_235_733_459_7,
        4_362.619_090_143_247,
        3_439.367_674_143_721_6,
        1_230.339_354_803_749_5,
    ];
    let mut num = C[8] * ax;
    let mut den = ax;
    for i in 0..7 {
        num = (num + C[i]) * ax;
        den = (den + D[i]) * ax;
    }
    let r = (num + C[7]) / (den + D[7]);
    scaled_exp(ax) * r
}

fn erfc_large(ax: f64) -> f64 {
    const P: [f64; 6] = [
        0.305_326_634_961_232_36,
        0.360_344_899_949_804_45,
        0.125_781_726_111_229_26,
        0.016_083_785_148_742_275,
        6.587_491_615_298_378e-4,
        0.016_315_387_137_302_097,
    ];
    const Q: [f64; 5] = [
        2.568_520_192_289_822,
        1.872_952_849_923_460_4,
        0.527_905_102_951_428_5,
        0.060_518_341_312_441_32,
        0.002_335_204_976_268_691_8,
    ];
    if ax >= 27.0 {
        return 0.0;
    }
    let z = 1.0 / (ax * ax);
    let mut num = P[5] * z;
    let mut den = z;
    for i in 0..4 {
        num = (num + P[i]) * z;
        den = (den + Q[i]) * z;
    }
    let r = z * (num + P[4]) / (den + Q[4]);
    let r = (FRAC_1_SQRT_PI - r) / ax;
    scaled_exp(ax) * r
}

// exp(-x^2) evaluated in two parts to limit cancellation.
fn scaled_exp(ax: f64) -> f64 {
    let ysq = (ax * 16.0).trunc() / 16.0;
    let del = (ax - ysq) * (ax + ysq);
    (-ysq * ysq).exp() * (-del).exp()
}

/// Standard normal probability density.
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Standard normal cumulative distribution.
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x * FRAC_1_SQRT_2)
}

/// Standard normal quantile function.
///
/// Acklam's rational approximation refined with one Halley step.
pub fn norm_ppf(p: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    let x = if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    let e = 0.5 * erfc(-x / SQRT_2) - p;
    let u = e * (2.0 * PI).sqrt() * (x * x / 2.0).exp();
    x - u / (1.0 + x * u / 2.0)
}

/// Quantile of a normal distribution with the given location and scale,
/// truncated below at zero.
///
/// Works from the upper tail, `P(X > x) = (1 - p) * Φ(loc / scale)`, which
/// stays finite when `loc` lies many scales below zero.
pub fn truncnorm_ppf(p: f64, loc: f64, scale: f64) -> f64 {
    let alpha = loc / scale;
    if alpha < TRUNCNORM_TAIL_LIMIT {
        // The truncated distribution tends to an exponential with rate -alpha / scale.
        return (-(1.0 - p).ln() * scale / -alpha).max(0.0);
    }
    let tail = (1.0 - p) * norm_cdf(alpha);
    (loc - scale * norm_ppf(tail)).max(0.0)
}
