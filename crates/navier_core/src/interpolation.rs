//! Reference curve lookups.
//!
//! The calibration curve has a fixed number of points; a simulation of any length
//! is mapped onto it by splitting the index range into equal fragments and
//! interpolating linearly between the two calibration points bracketing an index.

use crate::traits::ReferenceScale;

/// Number of points in the calibration curve.
pub const CALIBRATED_LENGTH: usize = 100;

/// Units per cell scale used when computing the flow quantity.
pub static UNITS: [f64; CALIBRATED_LENGTH] = [
    1.0,
    2.1092850147397257e-05,
    4.226689270581119e-05,
    9.287540160585195e-05,
    0.0003506987413857132,
    0.0005029256572015584,
    0.0006847812328487635,
    0.000893069664016366,
    0.001128520118072629,
    0.0013980538351461291,
    0.0016929134726524353,
    0.0020178845152258873,
    0.0023690166417509317,
    0.0027535269036889076,
    0.0031596242915838957,
    0.003601870033890009,
    0.004064870998263359,
    0.004563262220472097,
    0.005090042948722839,
    0.005643309094011784,
    0.005493566859513521,
    0.006838251370936632,
    0.007479238789528608,
    0.0073407418094575405,
    0.008856636472046375,
    0.009453845210373402,
    0.010277952998876572,
    0.010661286301910877,
    0.011081334203481674,
    0.012026455253362656,
    0.013140312395989895,
    0.01379524264484644,
    0.015183499082922935,
    0.016322143375873566,
    0.017194265499711037,
    0.018084285780787468,
    0.01891518570482731,
    0.020228413864970207,
    0.021157003939151764,
    0.022578390315175056,
    0.023227719590067863,
    0.02445903606712818,
    0.02534283697605133,
    0.026577722281217575,
    0.028430134057998657,
    0.029433393850922585,
    0.03128552436828613,
    0.03258998692035675,
    0.03409044072031975,
    0.03530395030975342,
    0.036498695611953735,
    0.03823975473642349,
    0.039395637810230255,
    0.04077257215976715,
    0.04280084744095802,
    0.04443170875310898,
    0.046229004859924316,
    0.04834207147359848,
    0.049048807471990585,
    0.0513426698744297,
    0.05268612131476402,
    0.05511575564742088,
    0.0565217062830925,
    0.058925844728946686,
    0.060193222016096115,
    0.06267963349819183,
    0.06483905762434006,
    0.0664413794875145,
    0.06882156431674957,
    0.07029402256011963,
    0.07218972593545914,
    0.07447746396064758,
    0.07653576135635376,
    0.0785461813211441,
    0.08105304837226868,
    0.08374454081058502,
    0.0853966698050499,
    0.08820252865552902,
    0.09006194770336151,
    0.09274501353502274,
    0.09525599330663681,
    0.09789932519197464,
    0.09991414099931717,
    0.10283256322145462,
    0.10521505028009415,
    0.10796301066875458,
    0.1102934405207634,
    0.11273065954446793,
    0.11558738350868225,
    0.11833125352859497,
    0.12124882638454437,
    0.12387516349554062,
    0.12869063019752502,
    0.1331438422203064,
    0.13661298155784607,
    0.1396646946668625,
    0.14319734275341034,
    0.14646171033382416,
    0.11126603931188583,
    1.0,
];

/// Scaled spatial position of index `i`, spread evenly over `length - 2` cells.
pub fn loop_index(i: usize, dx: f64, length: usize) -> f64 {
    i as f64 * dx * length as f64 / (length as f64 - 2.0)
}

/// Piecewise-linear interpolator over a read-only calibration curve.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceInterpolator<'a> {
    units: &'a [f64],
}

impl Default for ReferenceInterpolator<'static> {
    fn default() -> Self {
        Self { units: &UNITS }
    }
}

impl<'a> ReferenceInterpolator<'a> {
    /// `units` must hold at least one point.
    pub fn new(units: &'a [f64]) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &'a [f64] {
        self.units
    }

    /// (min, max) of the calibration curve.
    pub fn bounds(&self) -> (f64, f64) {
        self.units
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &u| {
                (lo.min(u), hi.max(u))
            })
    }

    pub fn interpolate(&self, i: usize, length: usize) -> f64 {
        let points = self.units.len();
        let last = points.saturating_sub(1);
        let fragment_length = length as f64 / points as f64;

        let base = (i * points / length.max(1)).min(last);
        let next = (base + 1).min(last);
        if next == base {
            return self.units[base];
        }

        let offset = i as f64 - (i as f64 / fragment_length).floor() * fragment_length;
        let spline_l = (offset / fragment_length).clamp(0.0, 1.0);
        let spline_r = 1.0 - spline_l;

        spline_l * self.units[next] + spline_r * self.units[base]
    }
}

impl ReferenceScale for ReferenceInterpolator<'_> {
    fn weight(&self, index: usize, length: usize) -> f64 {
        self.interpolate(index, length)
    }
}
