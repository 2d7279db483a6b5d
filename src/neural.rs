//! Small fully-connected feed-forward network and the per-pixel
//! prediction driver.
//!
//! [`Network`] is a two-layer perceptron with sigmoid activation, bias
//! nodes held at 1.0 and momentum back-propagation.  Initial weights are
//! drawn from U[−0.1, 0.1] with a deterministic generator seeded with 1,
//! so training runs are reproducible.
//!
//! [`train_and_evaluate`] trains the network to map a sliding window of
//! a *training model* field onto the central pixel of a *training
//! signal* field, then evaluates it over a *result model* field.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{Error, Field, Line, ProgressFn};

// ======================================================================
// CONST - PRIVATE

/// Learning rate of the training driver.
const ETA: f64 = 0.3;

/// Momentum of the training driver.
const MOMENTUM: f64 = 0.3;

// ======================================================================
// Network - PUBLIC

/// Two-layer perceptron with bias nodes.
///
/// Layer sizes are `input+1`, `hidden+1` and `output+1`; the extra nodes
/// are biases held at 1.0 on every forward pass.
#[derive(Clone, Debug)]
pub struct Network {
    ninput: usize,
    nhidden: usize,
    noutput: usize,

    input: Vec<f64>,
    hidden: Vec<f64>,
    output: Vec<f64>,

    dhidden: Vec<f64>,
    doutput: Vec<f64>,
    target: Vec<f64>,

    // Row-major `from × to` weight matrices and their momentum
    // companions.
    winput: Vec<f64>,
    whidden: Vec<f64>,
    wpinput: Vec<f64>,
    wphidden: Vec<f64>,
}

impl Network {
    /// Creates a network with the given non-bias layer sizes and random
    /// initial weights from U[−0.1, 0.1], deterministically seeded.
    ///
    /// # Panics
    ///
    /// If any layer size is zero.
    pub fn new(input: usize, hidden: usize, output: usize) -> Self {
        assert!(input > 0 && hidden > 0 && output > 0);

        let ninput = input + 1;
        let nhidden = hidden + 1;
        let noutput = output + 1;

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut winput = vec![0.0; ninput * nhidden];
        for w in winput.iter_mut() {
            *w = (2.0 * rng.gen::<f64>() - 1.0) * 0.1;
        }
        let mut whidden = vec![0.0; nhidden * noutput];
        for w in whidden.iter_mut() {
            *w = (2.0 * rng.gen::<f64>() - 1.0) * 0.1;
        }

        Self {
            ninput,
            nhidden,
            noutput,
            input: vec![0.0; ninput],
            hidden: vec![0.0; nhidden],
            output: vec![0.0; noutput],
            dhidden: vec![0.0; nhidden],
            doutput: vec![0.0; noutput],
            target: vec![0.0; noutput],
            wpinput: vec![0.0; ninput * nhidden],
            wphidden: vec![0.0; nhidden * noutput],
            winput,
            whidden,
        }
    }

    /// Returns the non-bias input layer size.
    pub fn input_size(&self) -> usize {
        self.ninput - 1
    }

    /// Returns the non-bias output layer size.
    pub fn output_size(&self) -> usize {
        self.noutput - 1
    }

    /// Propagates one input vector and writes the outputs.
    ///
    /// # Panics
    ///
    /// If `input` or `output` lengths do not match the layer sizes.
    pub fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        assert_eq!(input.len(), self.ninput - 1);
        assert_eq!(output.len(), self.noutput - 1);

        self.input[1..].copy_from_slice(input);

        layer_forward(&mut self.input, &mut self.hidden, &self.winput, self.nhidden);
        layer_forward(&mut self.hidden, &mut self.output, &self.whidden, self.noutput);

        output.copy_from_slice(&self.output[1..]);
    }

    /// Performs one stochastic back-propagation step on a single sample
    /// and returns the L1 norms of the output and hidden deltas.
    ///
    /// # Panics
    ///
    /// If `input` or `target` lengths do not match the layer sizes.
    pub fn train_step(
        &mut self,
        input: &[f64],
        target: &[f64],
        eta: f64,
        momentum: f64,
    ) -> (f64, f64) {
        assert_eq!(input.len(), self.ninput - 1);
        assert_eq!(target.len(), self.noutput - 1);

        self.input[1..].copy_from_slice(input);
        self.target[1..].copy_from_slice(target);

        layer_forward(&mut self.input, &mut self.hidden, &self.winput, self.nhidden);
        layer_forward(&mut self.hidden, &mut self.output, &self.whidden, self.noutput);

        // OUTPUT DELTAS

        let mut err_o = 0.0;
        for j in 1..self.noutput {
            let out = self.output[j];
            let tar = self.target[j];
            self.doutput[j] = out * (1.0 - out) * (tar - out);
            err_o += self.doutput[j].abs();
        }

        // HIDDEN DELTAS

        let mut err_h = 0.0;
        for j in 1..self.nhidden {
            let h = self.hidden[j];
            let mut sum = 0.0;
            for k in 1..self.noutput {
                sum += self.doutput[k] * self.whidden[j * self.noutput + k];
            }
            self.dhidden[j] = h * (1.0 - h) * sum;
            err_h += self.dhidden[j].abs();
        }

        // WEIGHT UPDATES

        adjust_weights(
            &self.doutput,
            &mut self.hidden,
            &mut self.whidden,
            &mut self.wphidden,
            eta,
            momentum,
        );
        adjust_weights(
            &self.dhidden,
            &mut self.input,
            &mut self.winput,
            &mut self.wpinput,
            eta,
            momentum,
        );

        (err_o, err_h)
    }
}

// ======================================================================
// TrainParams - PUBLIC

/// Parameters of [`train_and_evaluate`].
#[derive(Clone, Copy, Debug)]
pub struct TrainParams {
    /// Sliding window width in pixels.
    pub width: usize,
    /// Sliding window height in pixels.
    pub height: usize,
    /// Number of hidden nodes.
    pub hidden: usize,
    /// Number of training sweeps over the field.
    pub steps: usize,
}

// ======================================================================
// FUNCTIONS - PUBLIC

/// Trains a network on (`tmodel` window → central `tsignal` pixel) pairs
/// and evaluates it over `rmodel`.
///
/// Inputs are min-max scaled to [0, 1] using the training model's
/// extremes; outputs are inversely scaled on evaluation.  Returns the
/// evaluated field (prefilled with the training signal average outside
/// the swept region) and the per-sweep training error line.
///
/// # Errors
///
/// [`Error::SizeMismatch`] when the fields' resolutions differ,
/// [`Error::UnitIncompatibility`] when their lateral units differ, and
/// [`Error::Cancelled`] when the progress callback returns `false`.
///
/// # Panics
///
/// If `params` contain a zero dimension, hidden size or step count.
pub fn train_and_evaluate(
    tmodel: &Field,
    tsignal: &Field,
    rmodel: &Field,
    params: &TrainParams,
    mut progress: Option<&mut ProgressFn>,
) -> Result<(Field, Line), Error> {
    assert!(params.width > 0 && params.height > 0);
    assert!(params.hidden > 0 && params.steps > 0);

    for other in [tsignal, rmodel] {
        if other.xres() != tmodel.xres() || other.yres() != tmodel.yres() {
            return Err(Error::SizeMismatch {
                expected: tmodel.xres() * tmodel.yres(),
                got: other.xres() * other.yres(),
            });
        }
        if other.si_unit_xy() != tmodel.si_unit_xy() {
            return Err(Error::UnitIncompatibility {
                expected: tmodel.si_unit_xy().clone(),
                got: other.si_unit_xy().clone(),
            });
        }
    }

    let xres = tmodel.xres();
    let yres = tmodel.yres();
    let width = params.width;
    let height = params.height;

    let mut network = Network::new(width * height, params.hidden, 1);
    let mut input = vec![0.0; width * height];
    let mut output = [0.0; 1];
    let mut errors = Line::new(params.steps, params.steps as f64);

    let mshift = tmodel.min();
    let sshift = tsignal.min();
    let mfactor = scale_factor(tmodel.max() - mshift);
    let sfactor = scale_factor(tsignal.max() - sshift);

    let mut result = Field::new_alike(tsignal);
    result.fill(tsignal.avg());

    // TRAINING

    for n in 0..params.steps {
        let mut err_o = 0.0;
        let mut err_h = 0.0;
        for row in height / 2..yres.saturating_sub(height / 2) {
            for col in width / 2..xres.saturating_sub(width / 2) {
                gather_window(
                    tmodel, &mut input, col, row, width, height, mfactor, mshift,
                );
                let target = [sfactor * (tsignal.get(col, row) - sshift)];
                let (eo, eh) = network.train_step(&input, &target, ETA, MOMENTUM);
                err_o = eo;
                err_h = eh;
            }
        }
        errors.data_mut()[n] = err_o + err_h;

        if let Some(progress) = progress.as_mut() {
            if !progress(n as f64 / params.steps as f64) {
                return Err(Error::Cancelled);
            }
        }
    }

    // EVALUATION

    for row in height / 2..yres.saturating_sub(height / 2) {
        for col in width / 2..xres.saturating_sub(width / 2) {
            gather_window(
                rmodel, &mut input, col, row, width, height, mfactor, mshift,
            );
            network.forward(&input, &mut output);
            result.set(col, row, output[0] / sfactor + sshift);
        }

        if let Some(progress) = progress.as_mut() {
            if !progress(row as f64 / yres as f64) {
                result.data_changed();
                return Err(Error::Cancelled);
            }
        }
    }

    result.data_changed();
    Ok((result, errors))
}

// ======================================================================
// FUNCTIONS - PRIVATE

#[inline(always)]
fn sigma(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn scale_factor(range: f64) -> f64 {
    if range > 0.0 {
        1.0 / range
    } else {
        log::warn!("flat field in network scaling, using unit factor");
        1.0
    }
}

/// Propagates one layer: `output[j] = σ(Σ_k weight[k][j]·input[k])` with
/// the bias input forced to 1.
fn layer_forward(input: &mut [f64], output: &mut [f64], weight: &[f64], nout: usize) {
    input[0] = 1.0;
    for j in 1..nout {
        let mut sum = 0.0;
        for (k, &x) in input.iter().enumerate() {
            sum += weight[k * nout + j] * x;
        }
        output[j] = sigma(sum);
    }
}

/// Applies `ΔW[k][j] = η·δ[j]·data[k] + μ·ΔW_prev[k][j]` and stores the
/// update for the momentum of the next step.
fn adjust_weights(
    delta: &[f64],
    data: &mut [f64],
    w: &mut [f64],
    oldw: &mut [f64],
    eta: f64,
    momentum: f64,
) {
    let ndelta = delta.len();
    data[0] = 1.0;
    for j in 1..ndelta {
        for (k, &x) in data.iter().enumerate() {
            let new_dw = eta * delta[j] * x + momentum * oldw[k * ndelta + j];
            w[k * ndelta + j] += new_dw;
            oldw[k * ndelta + j] = new_dw;
        }
    }
}

fn gather_window(
    field: &Field,
    input: &mut [f64],
    col: usize,
    row: usize,
    width: usize,
    height: usize,
    factor: f64,
    shift: f64,
) {
    for irow in 0..height {
        for icol in 0..width {
            let r = row + irow - height / 2;
            let c = col + icol - width / 2;
            input[irow * width + icol] = factor * (field.get(c, r) - shift);
        }
    }
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;

    // ============================================================
    // NETWORK

    #[test]
    fn construction_is_deterministic() {
        let mut a = Network::new(4, 3, 2);
        let mut b = Network::new(4, 3, 2);

        let input = [0.1, 0.9, 0.4, 0.6];
        let mut out_a = [0.0; 2];
        let mut out_b = [0.0; 2];
        a.forward(&input, &mut out_a);
        b.forward(&input, &mut out_b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn outputs_are_sigmoid_bounded() {
        let mut network = Network::new(3, 5, 2);
        let mut output = [0.0; 2];
        network.forward(&[100.0, -100.0, 0.0], &mut output);
        for &o in output.iter() {
            assert!(o > 0.0 && o < 1.0);
        }
    }

    #[test]
    fn learns_the_or_function() {
        let samples = [
            ([0.0, 0.0], [0.05]),
            ([0.0, 1.0], [0.95]),
            ([1.0, 0.0], [0.95]),
            ([1.0, 1.0], [0.95]),
        ];

        let mut network = Network::new(2, 4, 1);
        for _ in 0..5000 {
            for (input, target) in samples.iter() {
                network.train_step(input, target, 0.3, 0.3);
            }
        }

        let mut output = [0.0; 1];
        for (input, target) in samples.iter() {
            network.forward(input, &mut output);
            assert!(
                (output[0] - target[0]).abs() < 0.1,
                "OR({:?}) = {}, wanted {}",
                input,
                output[0],
                target[0],
            );
        }
    }

    #[test]
    fn xor_error_decreases_on_average() {
        let samples = [
            ([0.0, 0.0], [0.05]),
            ([0.0, 1.0], [0.95]),
            ([1.0, 0.0], [0.95]),
            ([1.0, 1.0], [0.05]),
        ];

        let mut network = Network::new(2, 4, 1);
        let mut deltas = Vec::new();
        for _ in 0..5000 {
            let mut total = 0.0;
            for (input, target) in samples.iter() {
                let (eo, eh) = network.train_step(input, target, 0.3, 0.3);
                total += eo + eh;
            }
            deltas.push(total);
        }

        let early: f64 = deltas[..100].iter().sum::<f64>() / 100.0;
        let late: f64 = deltas[deltas.len() - 100..].iter().sum::<f64>() / 100.0;
        assert!(late < early);
    }

    // ============================================================
    // DRIVER

    #[test]
    fn result_geometry_and_prefill() {
        let tmodel = test_util::random_field(12, 12, 40);
        let tsignal = test_util::random_field(12, 12, 41);
        let rmodel = test_util::random_field(12, 12, 42);

        let params = TrainParams {
            width: 3,
            height: 3,
            hidden: 3,
            steps: 2,
        };
        let (result, errors) =
            train_and_evaluate(&tmodel, &tsignal, &rmodel, &params, None).unwrap();

        assert_eq!(result.xres(), 12);
        assert_eq!(result.yres(), 12);
        assert_eq!(errors.res(), 2);

        // Pixels the window never reaches keep the signal average.
        let avg = tsignal.avg();
        assert_near!(result.get(0, 0), avg, 1e-12);
        assert_near!(result.get(11, 11), avg, 1e-12);

        // Swept pixels are predictions, not the prefill.
        assert!((result.get(6, 6) - avg).abs() > 0.0);
    }

    #[test]
    fn incompatible_resolutions_are_rejected() {
        let tmodel = Field::new(8, 8, 1.0, 1.0);
        let tsignal = Field::new(8, 4, 1.0, 1.0);

        let params = TrainParams {
            width: 3,
            height: 3,
            hidden: 2,
            steps: 1,
        };
        let result = train_and_evaluate(&tmodel, &tsignal, &tmodel, &params, None);
        assert!(matches!(result, Err(Error::SizeMismatch { .. })));
    }

    #[test]
    fn incompatible_units_are_rejected() {
        let tmodel = Field::new(8, 8, 1.0, 1.0);
        let mut tsignal = Field::new(8, 8, 1.0, 1.0);
        tsignal.set_si_unit_xy(crate::SiUnit::meter());

        let params = TrainParams {
            width: 3,
            height: 3,
            hidden: 2,
            steps: 1,
        };
        let result = train_and_evaluate(&tmodel, &tsignal, &tmodel, &params, None);
        assert!(matches!(result, Err(Error::UnitIncompatibility { .. })));
    }

    #[test]
    fn training_cancellation() {
        let tmodel = test_util::random_field(10, 10, 43);
        let mut cancel = |_: f64| false;

        let params = TrainParams {
            width: 3,
            height: 3,
            hidden: 2,
            steps: 5,
        };
        let result = train_and_evaluate(&tmodel, &tmodel, &tmodel, &params, Some(&mut cancel));
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
