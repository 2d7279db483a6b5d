// Radix butterflies and the between-pass shuffle of the mixed-radix DFT.
//
// Each pass processes the whole working array: `pass2` performs n/2
// radix-2 butterflies and so on.  Twiddle factors of non-trivial group
// positions are applied by `shuffle_and_twiddle` while moving data from
// the previous pass's buffer.

use std::f64::consts::PI;

// ======================================================================
// CONST - PRIVATE

const SQRT3: f64 = 1.732050807568877293527446341505872367;

const C15: f64 = 0.30901699437494742410229341718281905886015458990289;
const S15: f64 = 0.95105651629515357211643933337938214340569863412574;
const S25: f64 = 0.58778525229247312916870595463907276859765243764316;
const C25: f64 = -0.80901699437494742410229341718281905886015458990286;

const C17: f64 = 0.62348980185873353052500488400423981063227473089641;
const C27: f64 = -0.22252093395631440428890256449679475946635556876452;
const C37: f64 = -0.90096886790241912623610231950744505116591916213184;
const S17: f64 = 0.78183148246802980870844452667405775023233451870867;
const S27: f64 = 0.97492791218182360701813168299393121723278580062000;
const S37: f64 = 0.43388373911755812047576833284835875460999072778748;

// ======================================================================
// TYPE ALIASES - CRATE

pub(crate) type Butterfly = fn(usize, usize, &mut [f64], &mut [f64]);

// ======================================================================
// FUNCTIONS - CRATE

/// Moves data of one pass group from `in_*` to `out_*`, applying the
/// twiddle factors `e^{2πi·n1·k2/gm}` computed pairwise with `sin_cos`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn shuffle_and_twiddle(
    gn: usize,
    gm: usize,
    p: usize,
    istride: usize,
    in_re: &[f64],
    in_im: &[f64],
    ostride: usize,
    out_re: &mut [f64],
    out_im: &mut [f64],
) {
    // k2 == 0, twiddle factors are 1.
    for m in 0..gn / gm {
        let inb = istride * m;
        let outb = ostride * m;

        for n1 in 0..p {
            let li = gn / gm * istride * n1;
            let lo = gn / p * ostride * n1;

            out_re[outb + lo] = in_re[inb + li];
            out_im[outb + lo] = in_im[inb + li];
        }
    }
    if gm == p {
        return;
    }

    // Other twiddle factors have to be calculated,
    // but for n1 == 0 they are always 1.
    let mut ff_re = [0.0; 7];
    let mut ff_im = [0.0; 7];
    for k2 in 1..gm / p {
        for n1 in 1..p {
            let (s, c) = (2.0 * PI * (n1 * k2) as f64 / gm as f64).sin_cos();
            ff_re[n1] = c;
            ff_im[n1] = s;
        }
        for m in 0..gn / gm {
            let inb = istride * (m + gn * p / gm * k2);
            let outb = ostride * (m + gn / gm * k2);

            out_re[outb] = in_re[inb];
            out_im[outb] = in_im[inb];
            for n1 in 1..p {
                let li = gn / gm * istride * n1;
                let lo = gn / p * ostride * n1;

                out_re[outb + lo] = ff_re[n1] * in_re[inb + li] - ff_im[n1] * in_im[inb + li];
                out_im[outb + lo] = ff_re[n1] * in_im[inb + li] + ff_im[n1] * in_re[inb + li];
            }
        }
    }
}

pub(crate) fn pass2(gn: usize, stride: usize, re: &mut [f64], im: &mut [f64]) {
    let gn = gn / 2;
    for m in 0..gn {
        let a = stride * m;
        let b = stride * (gn + m);

        let z = re[a] - re[b];
        re[a] += re[b];
        re[b] = z;

        let z = im[a] - im[b];
        im[a] += im[b];
        im[b] = z;
    }
}

pub(crate) fn pass3(gn: usize, stride: usize, re: &mut [f64], im: &mut [f64]) {
    let gn = gn / 3;
    for m in 0..gn {
        let a = stride * m;
        let b = stride * (gn + m);
        let c = stride * (2 * gn + m);

        let z1re = re[b] + re[c];
        let z1im = im[b] + im[c];
        // Multiplication by i
        let z2re = (im[c] - im[b]) * 0.5 * SQRT3;
        let z2im = (re[b] - re[c]) * 0.5 * SQRT3;

        re[c] = re[a] - (z2re + 0.5 * z1re);
        im[c] = im[a] - (z2im + 0.5 * z1im);
        re[b] = re[a] + (z2re - 0.5 * z1re);
        im[b] = im[a] + (z2im - 0.5 * z1im);
        re[a] += z1re;
        im[a] += z1im;
    }
}

pub(crate) fn pass4(gn: usize, stride: usize, re: &mut [f64], im: &mut [f64]) {
    let gn = gn / 4;
    for m in 0..gn {
        let a = stride * m;
        let b = stride * (gn + m);
        let c = stride * (2 * gn + m);
        let d = stride * (3 * gn + m);

        // Level 0
        let z = re[a] - re[c];
        re[a] += re[c];
        re[c] = z;

        let z = im[a] - im[c];
        im[a] += im[c];
        im[c] = z;

        let z = re[b] - re[d];
        re[b] += re[d];
        re[d] = z;

        let z = im[b] - im[d];
        im[b] += im[d];
        im[d] = z;

        // Level 1
        let z = re[a] - re[b];
        re[a] += re[b];
        re[b] = z;

        let z = im[a] - im[b];
        im[a] += im[b];
        im[b] = z;

        // Multiplication by i
        let z1re = -im[d];
        let z1im = re[d];
        re[d] = re[c] - z1re;
        im[d] = im[c] - z1im;
        re[c] += z1re;
        im[c] += z1im;

        // Fix bit-reversal
        re.swap(b, c);
        im.swap(b, c);
    }
}

pub(crate) fn pass5(gn: usize, stride: usize, re: &mut [f64], im: &mut [f64]) {
    let gn = gn / 5;
    for m in 0..gn {
        let a = stride * m;
        let b = stride * (gn + m);
        let c = stride * (2 * gn + m);
        let d = stride * (3 * gn + m);
        let e = stride * (4 * gn + m);

        let z0re = re[b] + re[e];
        let z0im = im[b] + im[e];
        let z1re = re[b] - re[e];
        let z1im = im[b] - im[e];
        let z2re = re[c] + re[d];
        let z2im = im[c] + im[d];
        let z3re = re[c] - re[d];
        let z3im = im[c] - im[d];

        let w0re = re[a] + C15 * z0re + C25 * z2re;
        let w0im = im[a] + C15 * z0im + C25 * z2im;
        let w1re = re[a] + C25 * z0re + C15 * z2re;
        let w1im = im[a] + C25 * z0im + C15 * z2im;
        // Multiplication by i
        let w2re = -S15 * z1im - S25 * z3im;
        let w2im = S15 * z1re + S25 * z3re;
        let w3re = -S25 * z1im + S15 * z3im;
        let w3im = S25 * z1re - S15 * z3re;

        re[b] = w0re + w2re;
        im[b] = w0im + w2im;
        re[c] = w1re + w3re;
        im[c] = w1im + w3im;
        re[d] = w1re - w3re;
        im[d] = w1im - w3im;
        re[e] = w0re - w2re;
        im[e] = w0im - w2im;
        re[a] += z0re + z2re;
        im[a] += z0im + z2im;
    }
}

pub(crate) fn pass7(gn: usize, stride: usize, re: &mut [f64], im: &mut [f64]) {
    let gn = gn / 7;
    for m in 0..gn {
        let i0 = stride * m;
        let i1 = stride * (gn + m);
        let i2 = stride * (2 * gn + m);
        let i3 = stride * (3 * gn + m);
        let i4 = stride * (4 * gn + m);
        let i5 = stride * (5 * gn + m);
        let i6 = stride * (6 * gn + m);

        let z1re = re[i1] + re[i6];
        let z1im = im[i1] + im[i6];
        let z6re = re[i1] - re[i6];
        let z6im = im[i1] - im[i6];
        let z2re = re[i2] + re[i5];
        let z2im = im[i2] + im[i5];
        let z5re = re[i2] - re[i5];
        let z5im = im[i2] - im[i5];
        let z3re = re[i3] + re[i4];
        let z3im = im[i3] + im[i4];
        let z4re = re[i3] - re[i4];
        let z4im = im[i3] - im[i4];

        let w1re = re[i0] + C17 * z1re + C27 * z2re + C37 * z3re;
        let w1im = im[i0] + C17 * z1im + C27 * z2im + C37 * z3im;
        let w2re = re[i0] + C27 * z1re + C37 * z2re + C17 * z3re;
        let w2im = im[i0] + C27 * z1im + C37 * z2im + C17 * z3im;
        let w3re = re[i0] + C37 * z1re + C17 * z2re + C27 * z3re;
        let w3im = im[i0] + C37 * z1im + C17 * z2im + C27 * z3im;
        // Multiplication by i
        let w4re = -S27 * z4im + S17 * z5im - S37 * z6im;
        let w4im = S27 * z4re - S17 * z5re + S37 * z6re;
        let w5re = S17 * z4im + S37 * z5im - S27 * z6im;
        let w5im = -S17 * z4re - S37 * z5re + S27 * z6re;
        let w6re = -S37 * z4im - S27 * z5im - S17 * z6im;
        let w6im = S37 * z4re + S27 * z5re + S17 * z6re;

        re[i1] = w1re + w6re;
        im[i1] = w1im + w6im;
        re[i2] = w2re + w5re;
        im[i2] = w2im + w5im;
        re[i3] = w3re + w4re;
        im[i3] = w3im + w4im;
        re[i4] = w3re - w4re;
        im[i4] = w3im - w4im;
        re[i5] = w2re - w5re;
        im[i5] = w2im - w5im;
        re[i6] = w1re - w6re;
        im[i6] = w1im - w6im;
        re[i0] += z1re + z2re + z3re;
        im[i0] += z1im + z2im + z3im;
    }
}

// ======================================================================
// TESTS

// Passes are exercised through `transform` round-trip and known-spectrum
// tests in the parent module; every radix appears in the size list there.
