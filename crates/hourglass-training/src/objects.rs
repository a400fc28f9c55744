//! Registry-resolvable training objects: learning-rate schedules, losses,
//! optimizers and metrics.
//!
//! Each object is declared in configuration either as a literal shorthand
//! (`optimizer: adam`) or as an object reference with params; both forms go
//! through the same registries, so an unknown name always fails naming the
//! path.

use crate::TrainingBackend;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, AdamWConfig, GradientsParams, Optimizer, SgdConfig};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use hourglass_config::{ConfigError, ConfigResult, ObjectRef, Params, Registry, ValueOrRef};
use hourglass_model::HourglassNetwork;

/// Learning rate as a function of the global step.
#[derive(Debug, Clone, PartialEq)]
pub enum LrSchedule {
    Constant { rate: f64 },
    ExponentialDecay { initial_rate: f64, decay_rate: f64, decay_steps: u64 },
}

impl LrSchedule {
    #[must_use]
    pub fn rate_at(&self, step: u64) -> f64 {
        match self {
            Self::Constant { rate } => *rate,
            Self::ExponentialDecay { initial_rate, decay_rate, decay_steps } => {
                let exponent = step as f64 / *decay_steps as f64;
                initial_rate * decay_rate.powf(exponent)
            }
        }
    }
}

/// Loss between predicted and target heatmaps. Elementwise, so it works in
/// either data format as long as predictions and targets agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossFn {
    Mse,
    SigmoidCrossEntropy,
}

impl LossFn {
    pub fn forward<B: Backend>(&self, pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
        match self {
            Self::Mse => MseLoss::new().forward(pred, target, Reduction::Mean),
            Self::SigmoidCrossEntropy => {
                let prob = sigmoid(pred).clamp(1e-6, 1.0 - 1e-6);
                let term = target.clone() * prob.clone().log()
                    + (target.ones_like() - target) * (prob.ones_like() - prob).log();
                term.neg().mean()
            }
        }
    }
}

/// Declarative optimizer choice; turned into a live Burn optimizer at compile
/// time.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizerSpec {
    Adam { beta_1: Option<f64>, beta_2: Option<f64>, epsilon: Option<f64> },
    AdamW { weight_decay: Option<f64> },
    Sgd,
}

/// Type-erased optimizer step over the concrete training network.
pub type ModelStepFn = Box<
    dyn FnMut(
            f64,
            HourglassNetwork<TrainingBackend>,
            GradientsParams,
        ) -> HourglassNetwork<TrainingBackend>
        + Send,
>;

impl OptimizerSpec {
    /// Instantiates the Burn optimizer and wraps its step function.
    #[must_use]
    pub fn build(&self) -> ModelStepFn {
        match self {
            Self::Adam { beta_1, beta_2, epsilon } => {
                let mut config = AdamConfig::new();
                if let Some(beta_1) = beta_1 {
                    config = config.with_beta_1(*beta_1 as f32);
                }
                if let Some(beta_2) = beta_2 {
                    config = config.with_beta_2(*beta_2 as f32);
                }
                if let Some(epsilon) = epsilon {
                    config = config.with_epsilon(*epsilon as f32);
                }
                let mut optim = config.init();
                Box::new(move |lr, model, grads| optim.step(lr, model, grads))
            }
            Self::AdamW { weight_decay } => {
                let mut config = AdamWConfig::new();
                if let Some(weight_decay) = weight_decay {
                    config = config.with_weight_decay(*weight_decay as f32);
                }
                let mut optim = config.init();
                Box::new(move |lr, model, grads| optim.step(lr, model, grads))
            }
            Self::Sgd => {
                let mut optim = SgdConfig::new().init();
                Box::new(move |lr, model, grads| optim.step(lr, model, grads))
            }
        }
    }
}

/// Host-side evaluation metric over final-stage heatmaps in NCHW order.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricFn {
    MeanAbsoluteError,
    /// Percentage of correct keypoints: a joint counts as correct when the
    /// predicted heatmap argmax lies within `threshold * heatmap_size` pixels
    /// of the target argmax. Channels with an empty target are skipped.
    Pck { threshold: f64 },
}

impl MetricFn {
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::MeanAbsoluteError => "mean_absolute_error".to_string(),
            Self::Pck { threshold } => format!("pck@{threshold}"),
        }
    }

    /// Evaluates over flattened `[batch, channels, size, size]` data.
    #[must_use]
    pub fn evaluate(&self, pred: &[f32], target: &[f32], dims: [usize; 4]) -> f64 {
        match self {
            Self::MeanAbsoluteError => {
                if pred.is_empty() {
                    return 0.0;
                }
                let sum: f64 = pred
                    .iter()
                    .zip(target.iter())
                    .map(|(p, t)| f64::from((p - t).abs()))
                    .sum();
                sum / pred.len() as f64
            }
            Self::Pck { threshold } => {
                let [batch, channels, height, width] = dims;
                let plane = height * width;
                let mut correct = 0usize;
                let mut total = 0usize;
                for bi in 0..batch {
                    for c in 0..channels {
                        let base = (bi * channels + c) * plane;
                        let target_plane = &target[base..base + plane];
                        let (t_idx, t_max) = argmax(target_plane);
                        if t_max < 0.1 {
                            continue;
                        }
                        let (p_idx, _) = argmax(&pred[base..base + plane]);
                        let dx = (p_idx % width) as f64 - (t_idx % width) as f64;
                        let dy = (p_idx / width) as f64 - (t_idx / width) as f64;
                        total += 1;
                        if (dx * dx + dy * dy).sqrt() <= threshold * height as f64 {
                            correct += 1;
                        }
                    }
                }
                if total == 0 { 1.0 } else { correct as f64 / total as f64 }
            }
        }
    }
}

fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .enumerate()
        .fold((0, f32::MIN), |acc, (i, v)| if *v > acc.1 { (i, *v) } else { acc })
}

/// The registries the train stage resolves its objects against.
#[derive(Debug)]
pub struct TrainingRegistries {
    pub schedules: Registry<(), LrSchedule>,
    pub losses: Registry<(), LossFn>,
    pub optimizers: Registry<(), OptimizerSpec>,
    pub metrics: Registry<(), MetricFn>,
}

impl Default for TrainingRegistries {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TrainingRegistries {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            schedules: schedule_registry(),
            losses: loss_registry(),
            optimizers: optimizer_registry(),
            metrics: metric_registry(),
        }
    }

    /// A literal rate is a constant schedule; a reference is resolved.
    pub fn resolve_schedule(&self, value: &ValueOrRef<f64>) -> ConfigResult<LrSchedule> {
        match value {
            ValueOrRef::Value(rate) => Ok(LrSchedule::Constant { rate: *rate }),
            ValueOrRef::Reference(reference) => self.schedules.resolve(reference, &()),
        }
    }

    pub fn resolve_loss(&self, value: &ValueOrRef<String>) -> ConfigResult<LossFn> {
        match value {
            ValueOrRef::Value(name) => self.losses.resolve(&ObjectRef::new(name.clone()), &()),
            ValueOrRef::Reference(reference) => self.losses.resolve(reference, &()),
        }
    }

    pub fn resolve_optimizer(&self, value: &ValueOrRef<String>) -> ConfigResult<OptimizerSpec> {
        match value {
            ValueOrRef::Value(name) => self.optimizers.resolve(&ObjectRef::new(name.clone()), &()),
            ValueOrRef::Reference(reference) => self.optimizers.resolve(reference, &()),
        }
    }

    pub fn resolve_metrics(&self, references: &[ObjectRef]) -> ConfigResult<Vec<MetricFn>> {
        references.iter().map(|r| self.metrics.resolve(r, &())).collect()
    }
}

#[must_use]
pub fn schedule_registry() -> Registry<(), LrSchedule> {
    let mut registry = Registry::new("schedules");
    registry.register("schedules.constant", |_, params: &Params| {
        let rate = params
            .get_f64("rate")?
            .ok_or_else(|| ConfigError::invalid("rate", "required by schedules.constant"))?;
        Ok(LrSchedule::Constant { rate })
    });
    registry.register("schedules.exponential_decay", |_, params: &Params| {
        let initial_rate = params
            .get_f64("initial_rate")?
            .ok_or_else(|| ConfigError::invalid("initial_rate", "required by schedules.exponential_decay"))?;
        let decay_rate = params
            .get_f64("decay_rate")?
            .ok_or_else(|| ConfigError::invalid("decay_rate", "required by schedules.exponential_decay"))?;
        let decay_steps = params
            .get_u64("decay_steps")?
            .ok_or_else(|| ConfigError::invalid("decay_steps", "required by schedules.exponential_decay"))?;
        if decay_steps == 0 {
            return Err(ConfigError::invalid("decay_steps", "must be >= 1"));
        }
        Ok(LrSchedule::ExponentialDecay { initial_rate, decay_rate, decay_steps })
    });
    registry
}

#[must_use]
pub fn loss_registry() -> Registry<(), LossFn> {
    let mut registry = Registry::new("losses");
    for path in ["losses.mse", "mse"] {
        registry.register(path, |_, _params: &Params| Ok(LossFn::Mse));
    }
    for path in ["losses.sigmoid_cross_entropy", "sigmoid_cross_entropy"] {
        registry.register(path, |_, _params: &Params| Ok(LossFn::SigmoidCrossEntropy));
    }
    registry
}

#[must_use]
pub fn optimizer_registry() -> Registry<(), OptimizerSpec> {
    let mut registry = Registry::new("optimizers");
    for path in ["optimizers.adam", "adam"] {
        registry.register(path, |_, params: &Params| {
            Ok(OptimizerSpec::Adam {
                beta_1: params.get_f64("beta_1")?,
                beta_2: params.get_f64("beta_2")?,
                epsilon: params.get_f64("epsilon")?,
            })
        });
    }
    for path in ["optimizers.adamw", "adamw"] {
        registry.register(path, |_, params: &Params| {
            Ok(OptimizerSpec::AdamW { weight_decay: params.get_f64("weight_decay")? })
        });
    }
    for path in ["optimizers.sgd", "sgd"] {
        registry.register(path, |_, _params: &Params| Ok(OptimizerSpec::Sgd));
    }
    registry
}

#[must_use]
pub fn metric_registry() -> Registry<(), MetricFn> {
    let mut registry = Registry::new("metrics");
    for path in ["metrics.mean_absolute_error", "mean_absolute_error"] {
        registry.register(path, |_, _params: &Params| Ok(MetricFn::MeanAbsoluteError));
    }
    for path in ["metrics.pck", "pck"] {
        registry.register(path, |_, params: &Params| {
            Ok(MetricFn::Pck { threshold: params.get_f64("threshold")?.unwrap_or(0.5) })
        });
    }
    registry
}
